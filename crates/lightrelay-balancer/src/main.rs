use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use lightrelay_balancer::{
    run_health_checks, serve, BalancerConfig, HttpProbe, LoadBalancer,
};
use lightrelay_room::IdAlphabet;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

/// Load balancer: tracks relay nodes and points clients at the least
/// loaded one.
#[derive(Parser, Debug)]
#[command(name = "lightrelay-balancer", version)]
struct Cli {
    /// Key relay nodes must present to register
    #[arg(long, env = "AUTH_KEY", default_value = "AuthKey")]
    auth_key: String,

    #[arg(long, default_value = "0.0.0.0")]
    bind_address: String,

    #[arg(long, env = "ENDPOINT_PORT", default_value_t = 7070)]
    endpoint_port: u16,

    /// Interval between node health checks
    #[arg(long, default_value_t = 10_000, value_parser = clap::value_parser!(u64).range(1..))]
    ping_rate_ms: u64,

    /// Bound on every request to a node
    #[arg(long, default_value_t = 5000, value_parser = clap::value_parser!(u64).range(1..))]
    probe_timeout_ms: u64,

    #[arg(long, default_value_t = 5)]
    id_length: usize,

    /// How long an issued room id stays reserved before a node lists it
    #[arg(long, default_value_t = 60)]
    id_reservation_secs: u64,

    /// Issue digit-only room ids
    #[arg(long)]
    numeric_ids: bool,

    /// Re-probe the selected node before answering /api/join/
    #[arg(long)]
    verify_on_join: bool,

    #[arg(long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(if cli.verbose { "debug" } else { "info" })
    });
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = BalancerConfig {
        auth_key: cli.auth_key,
        ping_rate: Duration::from_millis(cli.ping_rate_ms),
        probe_timeout: Duration::from_millis(cli.probe_timeout_ms),
        id_length: cli.id_length,
        id_alphabet: if cli.numeric_ids {
            IdAlphabet::Numeric
        } else {
            IdAlphabet::Alphanumeric
        },
        id_reservation: Duration::from_secs(cli.id_reservation_secs),
        verify_on_join: cli.verify_on_join,
    };
    let probe = HttpProbe::new(config.probe_timeout).context("building node probe")?;
    let balancer = Arc::new(LoadBalancer::new(probe, config));

    let listener = TcpListener::bind(format!("{}:{}", cli.bind_address, cli.endpoint_port))
        .await
        .context("binding load balancer endpoint")?;
    tokio::spawn(run_health_checks(Arc::clone(&balancer)));

    tokio::select! {
        result = serve(listener, balancer) => result.context("load balancer endpoint stopped")?,
        result = tokio::signal::ctrl_c() => {
            result.context("waiting for ctrl-c")?;
            tracing::info!("shutting down");
        }
    }
    Ok(())
}
