use anyhow::Context;
use bridge::{api_routes, handle_rejection};
use chrono::Utc;
use clap::Parser;
use generator::{seed_demo, DeviceEmulator, RouteConfig, DEMO_ACCOUNTS, DEMO_PASSWORD};
use service::{AuthService, ServiceConfig};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use store::{registry, MemoryStore};
use tokio::runtime::Builder as TokioBuilder;
use tokio::signal;
use warp::Filter;

mod bridge;
mod generator;
mod service;
mod store;

#[derive(Parser)]
#[command(author, version, about = "Location storage and auth service for the GeoTrack dashboard")]
struct Args {
    /// Load the service config from YAML
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long, default_value = "127.0.0.1:9000")]
    bind: SocketAddr,
    /// Seed demo accounts and keep an emulated device reporting
    #[arg(long, default_value_t = false)]
    demo: bool,
    /// Seed the demo data, print a summary and exit without serving
    #[arg(long, default_value_t = false)]
    offline: bool,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();

    let mut config = if let Some(path) = args.config {
        ServiceConfig::load(path)?
    } else {
        ServiceConfig::from_args(args.bind, args.demo)
    };
    config.demo |= args.demo;

    let store = registry::install(config.limits);
    let auth = Arc::new(AuthService::new(store.clone(), config.token_ttl_hours));

    if config.demo || args.offline {
        seed_demo(&store, Utc::now()).context("seeding demo data")?;
    }

    if args.offline {
        let users = store.active_users();
        let locations = store.all_recent(Utc::now());
        println!(
            "Offline run -> active users {}, locations in window {}, stored {}",
            users.len(),
            locations.len(),
            store.location_count()
        );
        for user in users {
            println!("  {} <{}> device {}", user.name, user.email, user.device_id);
        }
        println!("Demo accounts sign in with password {DEMO_PASSWORD:?}");
        return Ok(());
    }

    let runtime = TokioBuilder::new_multi_thread()
        .enable_all()
        .build()
        .context("creating server runtime")?;
    runtime.block_on(serve(config, auth))
}

async fn serve(config: ServiceConfig, auth: Arc<AuthService>) -> anyhow::Result<()> {
    if config.demo && config.emulate_interval_secs > 0 {
        let interval = Duration::from_secs(config.emulate_interval_secs);
        tokio::spawn(emulate_device(auth.store().clone(), interval));
    }

    let routes = api_routes(auth)
        .recover(handle_rejection)
        .with(warp::log("geotrack::http"));
    let (addr, server) = warp::serve(routes)
        .try_bind_with_graceful_shutdown(config.bind, async {
            if let Err(err) = signal::ctrl_c().await {
                log::error!("awaiting Ctrl+C failed: {}", err);
            }
        })
        .with_context(|| format!("binding {}", config.bind))?;

    log::info!("GeoTrack service listening on http://{} (Ctrl+C to stop)", addr);
    server.await;
    log::info!("GeoTrack service stopped");
    Ok(())
}

/// Keeps the first demo device moving so live mode has something to follow.
async fn emulate_device(store: Arc<MemoryStore>, every: Duration) {
    let account = DEMO_ACCOUNTS[0];
    let (origin_lat, origin_lng) = store
        .latest_for(account.email)
        .map(|point| (point.lat, point.lng))
        .unwrap_or(account.origin);
    let route = RouteConfig {
        origin_lat,
        origin_lng,
        step_deg: 0.0004,
        seed: 42,
        ..Default::default()
    };
    let mut emulator = DeviceEmulator::new(account.email, account.device_id, &route);
    let mut ticker = tokio::time::interval(every);
    log::info!(
        "emulating {} every {:?}",
        emulator.device_id(),
        every
    );
    loop {
        ticker.tick().await;
        let point = emulator.next_point(Utc::now());
        if let Err(err) = store.record_location(point) {
            log::warn!("emulated report dropped: {}", err);
        }
    }
}
