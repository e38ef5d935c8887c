//! Handler for `run-once`: execute a command on exactly one contender.
//!
//! Contenders race for a named lock; the winner runs the command while
//! holding it and releases on every exit path, including command failure
//! and Ctrl-C. Losers exit successfully without running anything. With
//! `--interval` the winner additionally skips the run when a previous
//! run finished too recently, so a fleet of cron entries degrades to one
//! effective run per interval.

use chrono::{DateTime, Utc};
use tokio::process::Command;
use tracing::{info, warn};

use crate::api::Client;
use crate::cli::RunOnceArgs;
use crate::error::{Result, WaypostError};

pub async fn run(client: &Client, args: &RunOnceArgs) -> Result<()> {
    let kv = client.kv();
    let last_run_key = format!("{}_last_run", args.lock);
    let command = split_command(&args.command)?;

    // The freshness check and the timestamp write both happen under the
    // lock: the timestamp goes in before the command runs, so a crashing
    // command still counts against the interval and a contender racing
    // the release cannot re-run inside it.
    let outcome = client
        .lock()
        .run_once(&args.lock, Some(args.ttl), || async {
            if let Some(interval) = args.interval {
                let last_run = kv.try_get(&last_run_key).await?;
                let last_run = last_run.as_ref().and_then(|v| v.as_str());
                if !should_run(last_run, interval, Utc::now()) {
                    info!(lock = %args.lock, interval = interval,
                        "Last run too recent, skipping");
                    return Ok(false);
                }
                kv.set(&last_run_key, Utc::now().to_rfc3339()).await?;
            }
            execute(&command).await?;
            Ok(true)
        })
        .await?;

    if outcome.is_none() {
        info!(lock = %args.lock, "Lock held elsewhere, skipping run");
    }
    Ok(())
}

/// Runs the command, racing it against Ctrl-C. An interrupt kills the
/// child and surfaces as an error so the caller's lock release still
/// happens.
async fn execute(command: &[String]) -> Result<()> {
    info!(command = %command.join(" "), "Running command");

    let mut child = Command::new(&command[0]).args(&command[1..]).spawn()?;

    let status = tokio::select! {
        status = child.wait() => status?,
        _ = tokio::signal::ctrl_c() => {
            warn!("Interrupted, stopping command");
            child.kill().await?;
            return Err(WaypostError::Io(std::io::Error::new(
                std::io::ErrorKind::Interrupted,
                "command interrupted",
            )));
        }
    };

    if !status.success() {
        return Err(WaypostError::Io(std::io::Error::new(
            std::io::ErrorKind::Other,
            format!("command exited with {}", status),
        )));
    }
    Ok(())
}

/// A single argument is treated as a shell-quoted command line; multiple
/// arguments are taken verbatim.
fn split_command(command: &[String]) -> Result<Vec<String>> {
    let words = if command.len() == 1 {
        shell_words::split(&command[0])
            .map_err(|e| WaypostError::validation(format!("invalid command line: {}", e)))?
    } else {
        command.to_vec()
    };
    if words.is_empty() {
        return Err(WaypostError::validation("command must not be empty"));
    }
    Ok(words)
}

/// Whether enough time has passed since the recorded last run. An
/// absent or unparseable timestamp always allows the run.
fn should_run(last_run: Option<&str>, interval: i64, now: DateTime<Utc>) -> bool {
    match last_run.and_then(|raw| DateTime::parse_from_rfc3339(raw).ok()) {
        Some(last) => (now - last.with_timezone(&Utc)).num_seconds() >= interval,
        None => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::Client;
    use crate::cli::RunOnceArgs;
    use crate::transport::memory::MemoryTransport;
    use chrono::Duration;
    use std::sync::Arc;

    fn client() -> (Client, Arc<MemoryTransport>) {
        let transport = Arc::new(MemoryTransport::new());
        (
            Client::with_transport(transport.clone(), None, None),
            transport,
        )
    }

    fn args(interval: Option<i64>, command: &str) -> RunOnceArgs {
        RunOnceArgs {
            lock: "job".to_string(),
            interval,
            ttl: 60,
            command: vec![command.to_string()],
        }
    }

    #[tokio::test]
    async fn test_interval_stamp_written_before_failing_command() {
        let (client, transport) = client();

        assert!(run(&client, &args(Some(3600), "false")).await.is_err());

        // the failed run still counts against the interval
        let stamp = client.kv().try_get("job_last_run").await.unwrap();
        assert!(stamp.is_some());
        assert_eq!(transport.session_count(), 0);

        // within the interval the next invocation skips without running
        run(&client, &args(Some(3600), "true")).await.unwrap();
        let stamp_after = client.kv().try_get("job_last_run").await.unwrap();
        assert_eq!(stamp, stamp_after);
    }

    #[tokio::test]
    async fn test_run_updates_stamp_after_interval_elapsed() {
        let (client, _) = client();
        let old = (Utc::now() - Duration::seconds(7200)).to_rfc3339();
        client.kv().set("job_last_run", old.clone()).await.unwrap();

        run(&client, &args(Some(3600), "true")).await.unwrap();

        let stamp = client.kv().try_get("job_last_run").await.unwrap().unwrap();
        assert_ne!(stamp.as_str(), Some(old.as_str()));
    }

    #[tokio::test]
    async fn test_run_without_interval_leaves_no_stamp() {
        let (client, transport) = client();

        run(&client, &args(None, "true")).await.unwrap();

        assert!(client.kv().try_get("job_last_run").await.unwrap().is_none());
        assert_eq!(transport.session_count(), 0);
    }

    #[test]
    fn test_split_command_quoted() {
        let words = split_command(&["echo 'hello world'".to_string()]).unwrap();
        assert_eq!(words, vec!["echo", "hello world"]);
    }

    #[test]
    fn test_split_command_verbatim() {
        let words =
            split_command(&["backup.sh".to_string(), "--full".to_string()]).unwrap();
        assert_eq!(words, vec!["backup.sh", "--full"]);
    }

    #[test]
    fn test_split_command_empty() {
        assert!(split_command(&[String::new()]).is_err());
    }

    #[test]
    fn test_should_run_without_history() {
        assert!(should_run(None, 3600, Utc::now()));
        assert!(should_run(Some("not a timestamp"), 3600, Utc::now()));
    }

    #[test]
    fn test_should_run_respects_interval() {
        let now = Utc::now();
        let recent = (now - Duration::seconds(60)).to_rfc3339();
        let old = (now - Duration::seconds(7200)).to_rfc3339();

        assert!(!should_run(Some(&recent), 3600, now));
        assert!(should_run(Some(&old), 3600, now));
    }
}
