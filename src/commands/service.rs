//! Service registration handlers for the `register` and `deregister`
//! subcommands.

use tracing::info;

use crate::api::agent::{ServiceCheck, ServiceDefinition};
use crate::api::Client;
use crate::cli::{CheckCommands, DeregisterArgs, RegisterArgs};
use crate::error::Result;

/// Registers a service with the local agent.
pub async fn register(client: &Client, args: &RegisterArgs) -> Result<()> {
    let definition = ServiceDefinition {
        name: args.name.clone(),
        service_id: args.service_id.clone(),
        address: args.address.clone(),
        port: args.port,
        tags: args.tags.clone(),
        check: args.check.as_ref().and_then(to_check),
    };

    client.agent().service().register(definition).await?;
    info!(service = %args.name, "Service registered");
    Ok(())
}

/// Removes a service from the local agent.
pub async fn deregister(client: &Client, args: &DeregisterArgs) -> Result<()> {
    client
        .agent()
        .service()
        .deregister(&args.service_id)
        .await?;
    info!(service_id = %args.service_id, "Service deregistered");
    Ok(())
}

fn to_check(check: &CheckCommands) -> Option<ServiceCheck> {
    match check {
        CheckCommands::Check { interval, path } => Some(ServiceCheck::Script {
            path: path.clone(),
            interval: *interval,
        }),
        CheckCommands::Httpcheck { interval, url } => Some(ServiceCheck::Http {
            url: url.clone(),
            interval: *interval,
        }),
        CheckCommands::Ttl { duration } => Some(ServiceCheck::Ttl { seconds: *duration }),
        CheckCommands::NoCheck => None,
    }
}
