//! Muro host - receives samples and prints each change as a JSON line.
//!
//! Every line on stdout is one sample; logs go to stderr, so the output can be
//! piped straight into whatever acts on it.

use std::path::PathBuf;

use clap::Parser;
use muro::MuroResult;
use muro::config::{AppConfig, LinkKind};
use muro::telemetry::SampleStream;
use muro::transport::{HostLink, Link, NetworkPeer, PeerError, UdpFactory, WifiLink};

#[derive(Parser, Debug)]
#[command(name = "muro-host", version, about = "Receive dial and button changes over UDP")]
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

    log::info!("Muro host v{} starting...", env!("CARGO_PKG_VERSION"));

    let factory = UdpFactory::new(config.network.bind_ip);
    match config.link.kind {
        LinkKind::Host => run(&config, HostLink, factory).await,
        LinkKind::Wifi => {
            let link = WifiLink::new(&config.link.station_interface, &config.link.ap_interface);
            run(&config, link, factory).await
        }
    }
}

async fn run<L: Link>(config: &AppConfig, link: L, factory: UdpFactory) -> MuroResult<()> {
    let mut peer = NetworkPeer::connect(config.peer_config(), link, factory).await?;
    let mut samples = SampleStream::new(config.telemetry.insurance);
    log::info!("Listening on port {}", config.network.port);

    let result = tokio::select! {
        result = consume(&mut peer, &mut samples) => result,
        _ = tokio::signal::ctrl_c() => {
            log::info!("Received shutdown signal");
            Ok(())
        }
    };

    peer.disconnect().await;
    Ok(result?)
}

async fn consume<L: Link>(
    peer: &mut NetworkPeer<L, UdpFactory>,
    samples: &mut SampleStream,
) -> Result<(), PeerError> {
    loop {
        let update = samples.next(peer).await?;
        let changed: Vec<&str> = update.changed.iter().map(|field| field.name()).collect();
        log::debug!("{} changed {}", update.from, changed.join(", "));

        let line = serde_json::to_string(&update.sample).map_err(PeerError::Encode)?;
        println!("{line}");
    }
}
