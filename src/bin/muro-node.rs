//! Muro node - reads the dials and buttons and streams every change.
//!
//! ```text
//! muro-node --config /etc/muro/config.toml
//! MURO_BACKEND=simulated muro-node --log-level debug
//! ```

use std::path::PathBuf;

use clap::Parser;
use muro::config::{AppConfig, LinkKind};
use muro::telemetry::{TelemetryLoop, create_backend};
use muro::transport::{HostLink, Link, NetworkPeer, PeerError, UdpFactory, WifiLink};
use muro::{MuroResult, ScopeOutcome};

#[derive(Parser, Debug)]
#[command(name = "muro-node", version, about = "Stream dial and button changes over UDP")]
struct Args {
    /// Config file (default: ~/.config/muro/config.toml, then /etc/muro/config.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log filter used when RUST_LOG is unset; overrides [logging] level
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> MuroResult<()> {
    let args = Args::parse();
    let config = AppConfig::load(args.config.as_deref())?;

    let level = args.log_level.as_deref().unwrap_or(&config.logging.level);
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    log::info!("Muro node v{} starting...", env!("CARGO_PKG_VERSION"));

    let backend = create_backend(&config)?;
    let telemetry = TelemetryLoop::new(backend, &config)?;
    let factory = UdpFactory::new(config.network.bind_ip);

    match config.link.kind {
        LinkKind::Host => run(&config, HostLink, factory, telemetry).await,
        LinkKind::Wifi => {
            let link = WifiLink::new(&config.link.station_interface, &config.link.ap_interface);
            run(&config, link, factory, telemetry).await
        }
    }
}

async fn run<L: Link>(
    config: &AppConfig,
    link: L,
    factory: UdpFactory,
    mut telemetry: TelemetryLoop,
) -> MuroResult<()> {
    let mut peer = NetworkPeer::connect(config.peer_config(), link, factory).await?;
    log::info!(
        "Streaming to {} on port {}",
        config
            .telemetry
            .destination
            .map_or_else(|| "broadcast".to_string(), |ip| ip.to_string()),
        config.network.port
    );

    let result = tokio::select! {
        result = stream(&mut peer, &mut telemetry) => result,
        _ = tokio::signal::ctrl_c() => {
            log::info!("Received shutdown signal");
            Ok(())
        }
    };

    peer.disconnect().await;
    Ok(result?)
}

/// Run the telemetry loop, starting it again after every healed fault.
async fn stream<L: Link>(
    peer: &mut NetworkPeer<L, UdpFactory>,
    telemetry: &mut TelemetryLoop,
) -> Result<(), PeerError> {
    loop {
        let outcome = peer
            .scope(async |peer: &mut NetworkPeer<L, UdpFactory>| telemetry.run(peer).await)
            .await?;

        match outcome {
            ScopeOutcome::Completed(()) => return Ok(()),
            ScopeOutcome::Healed(fault) => {
                log::warn!("Telemetry interrupted by {fault}; resuming");
            }
        }
    }
}
