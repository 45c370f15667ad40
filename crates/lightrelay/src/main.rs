use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{ArgAction, Parser};
use lightrelay::prelude::*;
use lightrelay::serve;
use lightrelay_room::IdAlphabet;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

/// Relay node: hosts rooms and forwards traffic between their peers.
#[derive(Parser, Debug)]
#[command(name = "lightrelay", version)]
struct Cli {
    /// Key peers must present before they can host or join
    #[arg(long, env = "AUTH_KEY", default_value = "Secret Auth Key")]
    auth_key: String,

    /// Game transport: websocket or tcp
    #[arg(long, env = "TRANSPORT_CLASS", default_value = "websocket")]
    transport: TransportKind,

    #[arg(long, default_value = "0.0.0.0")]
    bind_address: String,

    #[arg(long, env = "TRANSPORT_PORT", default_value_t = 7777)]
    transport_port: u16,

    #[arg(long, default_value_t = 16_384)]
    max_packet_size: usize,

    #[arg(
        long,
        env = "UPDATE_HEARTBEAT_INTERVAL",
        default_value_t = 1000,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    heartbeat_interval_ms: u64,

    #[arg(long, env = "RANDOMLY_GENERATED_ID_LENGTH", default_value_t = 5)]
    id_length: usize,

    /// Generate digit-only room ids
    #[arg(long)]
    numeric_ids: bool,

    /// Serve the HTTP endpoint
    #[arg(long, env = "USE_ENDPOINT", default_value_t = true, action = ArgAction::Set)]
    use_endpoint: bool,

    #[arg(long, env = "ENDPOINT_PORT", default_value_t = 8080)]
    endpoint_port: u16,

    /// List public rooms on /api/servers
    #[arg(long, default_value_t = true, action = ArgAction::Set)]
    endpoint_server_list: bool,

    #[arg(long, env = "ENABLE_NAT_PUNCH", default_value_t = true, action = ArgAction::Set)]
    enable_nat_punch: bool,

    #[arg(long, env = "NAT_PUNCH_PORT", default_value_t = 7776)]
    nat_punch_port: u16,

    #[arg(long, env = "USE_LOAD_BALANCER")]
    use_load_balancer: bool,

    #[arg(long, env = "LOAD_BALANCER_AUTH_KEY", default_value = "AuthKey")]
    load_balancer_auth_key: String,

    #[arg(long, env = "LOAD_BALANCER_ADDRESS", default_value = "127.0.0.1")]
    load_balancer_address: String,

    #[arg(long, env = "LOAD_BALANCER_PORT", default_value_t = 7070)]
    load_balancer_port: u16,

    /// Region this node serves, by number or name
    #[arg(long, env = "LOAD_BALANCER_REGION", default_value = "1")]
    load_balancer_region: Region,

    #[arg(long, default_value_t = 5000)]
    load_balancer_timeout_ms: u64,

    /// Fetch room ids from the load balancer
    #[arg(long)]
    load_balancer_ids: bool,

    #[arg(long, default_value_t = 60)]
    reregister_after_secs: u64,

    /// Address advertised to peers and the load balancer
    #[arg(long, env = "PUBLIC_IP", default_value = "127.0.0.1")]
    public_ip: String,

    /// What to do with a wrong auth key: disconnect or ignore
    #[arg(long, default_value = "disconnect")]
    auth_failure: AuthFailurePolicy,

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

    let (transport, events) = AnyTransport::start(
        cli.transport,
        &format!("{}:{}", cli.bind_address, cli.transport_port),
        cli.max_packet_size,
    )
    .await
    .context("starting transport")?;

    let config = EngineConfig {
        public_ip: cli.public_ip.clone(),
        transport_port: cli.transport_port,
        endpoint_port: cli.endpoint_port,
        region: cli.load_balancer_region,
        id_length: cli.id_length,
        id_alphabet: if cli.numeric_ids {
            IdAlphabet::Numeric
        } else {
            IdAlphabet::Alphanumeric
        },
        auth_failure: cli.auth_failure,
        heartbeat_interval: Duration::from_millis(cli.heartbeat_interval_ms),
    };
    let mut engine = RelayEngine::new(
        transport,
        config,
        SharedKeyAuthenticator::new(cli.auth_key.clone()),
    );

    if cli.enable_nat_punch {
        let nat = Arc::new(NatRendezvous::new(cli.nat_punch_port));
        let listener = PunchListener::bind(
            &format!("{}:{}", cli.bind_address, cli.nat_punch_port),
            Arc::clone(&nat),
        )
        .await
        .context("binding NAT rendezvous socket")?;
        tokio::spawn(listener.run());
        engine = engine.with_nat(nat);
    }

    if cli.use_load_balancer {
        let balancer = BalancerClient::new(
            BalancerClientConfig {
                address: cli.load_balancer_address.clone(),
                port: cli.load_balancer_port,
                auth_key: cli.load_balancer_auth_key.clone(),
                timeout: Duration::from_millis(cli.load_balancer_timeout_ms),
                issue_room_ids: cli.load_balancer_ids,
                reregister_after: Duration::from_secs(cli.reregister_after_secs),
            },
            engine.relay_address(),
        )?;
        engine = engine.with_balancer(balancer);
    }

    let engine = Arc::new(engine);

    if cli.use_endpoint {
        let endpoint = EndpointConfig {
            bind_address: cli.bind_address.clone(),
            port: cli.endpoint_port,
            serve_server_list: cli.endpoint_server_list,
        };
        let listener =
            TcpListener::bind(format!("{}:{}", endpoint.bind_address, endpoint.port))
                .await
                .context("binding relay endpoint")?;
        let engine = Arc::clone(&engine);
        tokio::spawn(async move {
            if let Err(e) = serve(listener, engine, &endpoint).await {
                tracing::error!(error = %e, "relay endpoint stopped");
            }
        });
    }

    if let Some(balancer) = engine.balancer() {
        engine.mark_balancer_ping();
        if let Err(e) = balancer.register().await {
            tracing::warn!(error = %e, "initial load balancer registration failed");
        }
        tokio::spawn(run_balancer_sync(Arc::clone(&engine)));
    }
    tokio::spawn(run_heartbeat(Arc::clone(&engine)));

    tokio::select! {
        () = Arc::clone(&engine).run(events) => {}
        result = tokio::signal::ctrl_c() => {
            result.context("waiting for ctrl-c")?;
            tracing::info!("shutting down");
        }
    }
    Ok(())
}
