//! # wsctl
//!
//! Operator CLI for WebSocket sessions and gateways:
//! - purge and list sessions
//! - push messages to a connection or a channel
//! - provision registered gateways and their custom domains

use anyhow::{Context, Result, anyhow};
use apigw_ws_handler::config::{DEFAULT_GATEWAYS_TABLE, DEFAULT_SESSIONS_TABLE};
use apigw_ws_handler::management::{ApiGatewayManagement, DeliveryOutcome, MessageSender};
use apigw_ws_handler::provisioning::{AwsControlPlane, Provisioner};
use apigw_ws_handler::store::{
    DynamoGatewayRegistry, DynamoSessionStore, GatewayRegistry, SessionStore,
};
use aws_config::SdkConfig;
use clap::{ArgGroup, Parser, Subcommand};
use serde_json::Value;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Manage API Gateway WebSocket sessions and gateways
#[derive(Parser, Debug)]
#[command(name = "wsctl")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// DynamoDB table holding sessions
    #[arg(long, global = true, env = "SESSIONS_TABLE_NAME", default_value = DEFAULT_SESSIONS_TABLE)]
    sessions_table: String,

    /// DynamoDB table holding gateways
    #[arg(long, global = true, env = "GATEWAYS_TABLE_NAME", default_value = DEFAULT_GATEWAYS_TABLE)]
    gateways_table: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
enum Command {
    /// Delete every disconnected session
    ClearSessions,

    /// List connected sessions
    ListSessions {
        /// Only sessions on this channel
        #[arg(long)]
        channel: Option<String>,
    },

    /// Push a JSON message to a connection or to a whole channel
    #[command(group(ArgGroup::new("target").required(true).args(["connection_id", "channel"])))]
    Send {
        #[arg(long)]
        connection_id: Option<String>,

        #[arg(long)]
        channel: Option<String>,

        /// JSON payload
        #[arg(long)]
        data: String,
    },

    /// Create the API, routes, stage and deployment for a registered gateway
    CreateGateway {
        /// Registered gateway name
        api_name: String,
    },

    /// Create and map the custom domain of a provisioned gateway
    CreateCustomDomain {
        /// Registered gateway name
        api_name: String,
    },
}

struct Stores {
    sessions: Arc<DynamoSessionStore>,
    gateways: Arc<DynamoGatewayRegistry>,
}

impl Stores {
    fn new(sdk_config: &SdkConfig, cli: &Cli) -> Self {
        let dynamodb = aws_sdk_dynamodb::Client::new(sdk_config);
        Self {
            sessions: Arc::new(DynamoSessionStore::new(
                dynamodb.clone(),
                cli.sessions_table.clone(),
            )),
            gateways: Arc::new(DynamoGatewayRegistry::new(
                dynamodb,
                cli.gateways_table.clone(),
            )),
        }
    }
}

fn parse_payload(data: &str) -> Result<Value> {
    serde_json::from_str(data).context("--data must be valid JSON")
}

async fn send(
    sdk_config: SdkConfig,
    stores: &Stores,
    connection_id: Option<String>,
    channel: Option<String>,
    data: &str,
) -> Result<()> {
    let payload = parse_payload(data)?;
    let sender = MessageSender::new(
        Arc::new(ApiGatewayManagement::new(sdk_config)?),
        stores.sessions.clone(),
        stores.gateways.clone(),
    );

    if let Some(connection_id) = connection_id {
        let session = stores.sessions.get(&connection_id).await?;
        match sender.send_message(&session, &payload).await? {
            DeliveryOutcome::Delivered => println!("{}: delivered", connection_id),
            DeliveryOutcome::Gone => println!("{}: gone (marked disconnected)", connection_id),
        }
        return Ok(());
    }

    let channel = channel.ok_or_else(|| anyhow!("either --connection-id or --channel is required"))?;
    for (connection_id, outcome) in sender.send_to_channel(&channel, &payload).await? {
        match outcome {
            Ok(DeliveryOutcome::Delivered) => println!("{}: delivered", connection_id),
            Ok(DeliveryOutcome::Gone) => println!("{}: gone (marked disconnected)", connection_id),
            Err(e) => {
                warn!("Delivery to {} failed: {}", connection_id, e);
                println!("{}: failed", connection_id);
            }
        }
    }
    Ok(())
}

fn provisioner(sdk_config: &SdkConfig, stores: &Stores) -> Provisioner {
    let control = AwsControlPlane::new(aws_sdk_apigatewayv2::Client::new(sdk_config));
    Provisioner::new(Arc::new(control), stores.gateways.clone())
}

async fn load_gateway(stores: &Stores, api_name: &str) -> Result<apigw_ws_common::GatewayConfig> {
    stores
        .gateways
        .get(api_name)
        .await?
        .ok_or_else(|| anyhow!("gateway {} is not registered", api_name))
}

async fn run(cli: Cli) -> Result<()> {
    let sdk_config = aws_config::load_from_env().await;
    let stores = Stores::new(&sdk_config, &cli);

    match cli.command {
        Command::ClearSessions => {
            let deleted = stores.sessions.purge_disconnected().await?;
            println!("Deleted {} disconnected sessions", deleted);
        }
        Command::ListSessions { channel } => {
            for session in stores.sessions.list_connected(channel.as_deref()).await? {
                println!(
                    "{}\t{}\t{}\t{}",
                    session.connection_id,
                    session.channel_name,
                    session.user_id.as_deref().unwrap_or("-"),
                    session.request_count
                );
            }
        }
        Command::Send {
            connection_id,
            channel,
            data,
        } => send(sdk_config, &stores, connection_id, channel, &data).await?,
        Command::CreateGateway { api_name } => {
            let mut gateway = load_gateway(&stores, &api_name).await?;
            provisioner(&sdk_config, &stores)
                .create_gateway(&mut gateway)
                .await?;
            println!(
                "{}: api {} deployment {}",
                gateway.api_name,
                gateway.api_id.as_deref().unwrap_or("-"),
                gateway.deployment_id
            );
        }
        Command::CreateCustomDomain { api_name } => {
            let mut gateway = load_gateway(&stores, &api_name).await?;
            provisioner(&sdk_config, &stores)
                .create_custom_domain(&mut gateway)
                .await?;
            println!(
                "{} -> {}",
                gateway.domain_name, gateway.api_gateway_domain_name
            );
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_target(false)
        .init();

    info!("wsctl v{}", env!("CARGO_PKG_VERSION"));
    run(cli).await
}
