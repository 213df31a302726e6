use clap::{Parser, Subcommand};
use bundler_resilience::{
    chains::{wait_for, HttpRpcClient, RpcSend},
    telemetry::PublishOutcome,
    MetricRecord, ResilienceContext, Settings, U256,
};
use ethers::{
    providers::{Http, Provider},
    types::H256,
};
use serde_json::json;
use std::str::FromStr;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[clap(name = "bundler-resilience")]
#[clap(about = "Fee, capability and telemetry tooling for an ERC-4337 bundler", long_about = None)]
struct Cli {
    /// JSON-RPC endpoint, overrides the configured one
    #[clap(long, global = true)]
    rpc_url: Option<String>,

    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve the current fee estimate for the endpoint's chain
    Fees,

    /// Check which JSON-RPC methods the endpoint implements
    Probe {
        /// Methods to probe; defaults to the debug/tracing extensions
        #[clap(short, long)]
        method: Vec<String>,
    },

    /// Publish a partial gas metric record
    Publish {
        /// Chain id of the operation
        #[clap(long)]
        chain_id: Option<u64>,

        /// User operation hash
        #[clap(long)]
        user_op_hash: Option<String>,

        /// Actual gas used, decimal
        #[clap(long)]
        actual_gas: Option<String>,

        /// Bundle transaction hash
        #[clap(long)]
        tx_hash: Option<String>,
    },

    /// Wait until a transaction receipt is available
    WaitReceipt {
        /// Transaction hash
        #[clap(short, long)]
        tx_hash: String,
    },
}

const DEFAULT_PROBES: &[&str] = &[
    "debug_traceCall",
    "debug_traceTransaction",
    "eth_sendRawTransactionConditional",
];

fn parse_hash(raw: &str) -> anyhow::Result<H256> {
    H256::from_str(raw.trim_start_matches("0x"))
        .map_err(|e| anyhow::anyhow!("Invalid hash {}: {}", raw, e))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let (mut settings, load_error) = Settings::or_default(Settings::new());
    if let Some(url) = cli.rpc_url {
        settings.rpc.url = url;
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&settings.app.log_level)),
        )
        .init();

    if let Some(e) = load_error {
        warn!("Failed to load configuration, using default settings: {}", e);
    }

    // Validate settings
    if let Err(e) = settings.validate() {
        error!("Invalid settings: {}", e);
        return Err(anyhow::anyhow!(e));
    }

    let ctx = ResilienceContext::from_settings(&settings)?;
    let rpc_timeout = Duration::from_secs(settings.rpc.timeout_seconds);

    match cli.command {
        Commands::Fees => {
            let provider = Provider::<Http>::try_from(settings.rpc.url.as_str())
                .map_err(|e| anyhow::anyhow!("Failed to create provider: {}", e))?;

            let fees = ctx.fees.resolve_fees(&provider).await?;
            println!("{}", serde_json::to_string_pretty(&fees)?);
        }

        Commands::Probe { method } => {
            let client = HttpRpcClient::new(settings.rpc.url.clone(), rpc_timeout)?;

            let full_featured = ctx.capabilities.detect_full_feature_support(&client).await;
            let version = ctx.capabilities.client_version(&client).await;
            println!("Client: {}", version.as_deref().unwrap_or("unknown"));
            println!("Full-featured: {}", full_featured);

            let methods = if method.is_empty() {
                DEFAULT_PROBES.iter().map(|m| m.to_string()).collect()
            } else {
                method
            };

            let capabilities = &ctx.capabilities;
            let client = &client;
            let probes = methods.iter().map(|m| async move {
                (m.as_str(), capabilities.supports_method(client, m).await)
            });
            for (name, supported) in futures::future::join_all(probes).await {
                println!("  {:<32} {}", name, if supported { "supported" } else { "not supported" });
            }
        }

        Commands::Publish { chain_id, user_op_hash, actual_gas, tx_hash } => {
            let mut record = MetricRecord::new().stamp_submitted();
            record.chain_id = chain_id;
            if let Some(hash) = user_op_hash {
                record = record.with_user_op_hash(parse_hash(&hash)?);
            }
            if let Some(gas) = actual_gas {
                let gas = U256::from_dec_str(&gas)
                    .map_err(|e| anyhow::anyhow!("Invalid gas amount {}: {}", gas, e))?;
                record = record.with_actual_gas(gas);
            }
            if let Some(hash) = tx_hash {
                record = record.with_tx_hash(parse_hash(&hash)?);
            }

            // A one-shot process has to outlive the detached submission.
            match ctx.metrics.publish_tracked(&record).await {
                Ok(PublishOutcome::Delivered) => info!("Metric record published"),
                Ok(outcome) => warn!("Metric record was not published: {:?}", outcome),
                Err(e) => warn!("Metric submission task failed: {}", e),
            }
        }

        Commands::WaitReceipt { tx_hash } => {
            let hash = parse_hash(&tx_hash)?;
            let client = HttpRpcClient::new(settings.rpc.url.clone(), rpc_timeout)?;
            let label = format!("receipt of {:?}", hash);

            let client = &client;
            let receipt = wait_for(&label, &ctx.poll, move || async move {
                match client.send("eth_getTransactionReceipt", json!([hash])).await {
                    Ok(receipt) if !receipt.is_null() => Some(receipt),
                    Ok(_) => None,
                    Err(e) => {
                        warn!("Receipt lookup failed: {}", e);
                        None
                    }
                }
            })
            .await?;

            info!("Receipt for {:?} found", hash);
            println!("{}", serde_json::to_string_pretty(&receipt)?);
        }
    }

    Ok(())
}
