mod config;
mod report;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use queue_balancer_core::QueueBalancer;
use queue_balancer_semp::SempClient;
use tracing::info;

use crate::config::{ConnectionArgs, ResolvedConfig};

#[derive(Debug, Parser)]
#[command(name = "queue-balancer")]
#[command(about = "Balance message backlog across a set of Solace queues", long_about = None)]
#[command(version)]
struct Cli {
    #[command(flatten)]
    connection: ConnectionArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    #[command(
        about = "Check whether the queues need rebalancing, without moving anything",
        after_help = "Examples:
  queue-balancer check --semp-base https://mysolace:943/SEMP/v2/config --message-vpn default \\
      --semp-user admin --queues-list queue1,queue2,queue3
  queue-balancer check --config-file balancer.yaml --output json

Env:
  QUEUE_BALANCER_SEMP_PASSWORD (used when no password is given)"
    )]
    Check(OutputArgs),

    #[command(
        about = "Check the queues and move messages when they are out of balance",
        after_help = "Examples:
  queue-balancer rebalance --config-file balancer.yaml
  queue-balancer rebalance --config-file balancer.yaml --tolerance-percent 20 --output json

Exits non-zero when the rebalance aborts, reporting the progress reached."
    )]
    Rebalance(OutputArgs),
}

#[derive(Debug, Args)]
struct OutputArgs {
    #[arg(long, value_parser = ["json"], help = "Output format: json (default: table)")]
    output: Option<String>,
}

impl OutputArgs {
    fn json(&self) -> bool {
        matches!(self.output.as_deref(), Some("json"))
    }
}

type SempBalancer = QueueBalancer<SempClient, SempClient>;

fn build_balancer(resolved: ResolvedConfig) -> Result<SempBalancer> {
    info!(
        semp_base = %resolved.semp.semp_base,
        vpn = %resolved.semp.message_vpn,
        queues = ?resolved.queues,
        tolerance_percent = resolved.policy.tolerance_percent,
        "queue balancer configured"
    );
    let client = SempClient::new(resolved.semp).context("unable to set up the SEMP client")?;
    let balancer = QueueBalancer::new(client.clone(), client, resolved.queues, resolved.policy)?;
    Ok(balancer)
}

async fn check(balancer: &SempBalancer, output: &OutputArgs) -> Result<()> {
    let plan = balancer
        .determine_balanced_status()
        .await
        .context("balance check failed")?;
    report::print_plan(&plan, output.json())
}

async fn rebalance(balancer: &SempBalancer, output: &OutputArgs) -> Result<()> {
    let plan = balancer
        .determine_balanced_status()
        .await
        .context("balance check failed")?;
    if !output.json() {
        report::print_plan(&plan, false)?;
        println!();
    }
    if !plan.rebalance_needed() {
        if output.json() {
            report::print_plan(&plan, true)?;
        }
        return Ok(());
    }

    let executed = balancer.perform_rebalancing(plan).await?;
    report::print_execution(&executed, output.json())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing/logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let balancer = build_balancer(cli.connection.resolve()?)?;

    match cli.command {
        Commands::Check(output) => check(&balancer, &output).await,
        Commands::Rebalance(output) => rebalance(&balancer, &output).await,
    }
}
