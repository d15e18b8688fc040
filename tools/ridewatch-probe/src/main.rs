use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Parser;
use ridewatch_core::{
    CameraCommand, HttpTransitApi, LiveConfig, LiveEvent, LiveSession, RefreshStop,
};
use ridewatch_transit::{Coordinate, SystemIdentifier};
use tracing::{info, warn, Level};
use tracing_subscriber::filter::FilterFn;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[derive(Parser, Debug)]
#[command(
    name = "ridewatch-probe",
    author,
    version,
    about = "Run a headless live map session against a planning server",
    long_about = "Selects a transit system, optionally plans a trip, and logs every \
                  change the session publishes (stops, vehicles, trip refreshes, \
                  camera moves) until the duration elapses or Ctrl-C is pressed."
)]
struct Args {
    /// Root URL of the planning server
    #[arg(long, env = "RIDEWATCH_BASE_URL", default_value = "http://localhost:8000")]
    base_url: String,

    /// JSON file with session settings; command line flags win over it
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Transit system to watch
    #[arg(short, long, env = "RIDEWATCH_SYSTEM")]
    system: Option<String>,

    /// Trip origin as "lat,lng"
    #[arg(long, value_parser = parse_coordinate, requires = "destination")]
    origin: Option<Coordinate>,

    /// Trip destination as "lat,lng"
    #[arg(long, value_parser = parse_coordinate, requires = "origin")]
    destination: Option<Coordinate>,

    /// Also fetch route shapes
    #[arg(long)]
    routes: bool,

    /// Seconds to keep watching
    #[arg(short, long, default_value = "60")]
    duration_secs: u64,

    /// List the server's systems and exit
    #[arg(long)]
    list_systems: bool,

    /// Verbose output (show debug messages)
    #[arg(short, long)]
    verbose: bool,
}

fn parse_coordinate(s: &str) -> std::result::Result<Coordinate, String> {
    let (lat, lng) = s
        .split_once(',')
        .ok_or_else(|| format!("expected \"lat,lng\", got {s:?}"))?;
    let lat: f64 = lat.trim().parse().map_err(|e| format!("bad latitude: {e}"))?;
    let lng: f64 = lng.trim().parse().map_err(|e| format!("bad longitude: {e}"))?;

    if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lng) {
        return Err(format!("{lat},{lng} is not a valid position"));
    }
    Ok(Coordinate::new(lat, lng))
}

fn setup_logging(verbose: bool) {
    let max_level = if verbose { Level::DEBUG } else { Level::INFO };
    let filter = FilterFn::new(move |meta| {
        meta.module_path().unwrap_or_default().starts_with("ridewatch") && *meta.level() <= max_level
    });

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .with(filter)
        .init();
}

fn load_config(args: &Args) -> Result<LiveConfig> {
    let mut config = match &args.config {
        Some(path) => {
            let json = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            LiveConfig::from_json(&json).with_context(|| format!("Invalid config in {}", path.display()))?
        }
        None => LiveConfig::default(),
    };

    config.base_url = args.base_url.clone();
    config.show_routes |= args.routes;
    config.validate()?;

    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    setup_logging(args.verbose);

    let config = load_config(&args)?;
    let api = HttpTransitApi::new(&config.base_url, config.request_timeout())?;

    let health = api
        .health()
        .await
        .with_context(|| format!("Server at {} is not reachable", config.base_url))?;
    info!("server says {}: {}", health.status, health.message.unwrap_or_default());

    if args.list_systems {
        use ridewatch_core::TransitApi;

        for system in api.systems().await.context("Failed to list systems")? {
            println!("{}\t{}", system.id, system.name);
        }
        return Ok(());
    }

    let Some(system) = args.system.as_deref() else {
        bail!("No system given; pass --system or use --list-systems to find one");
    };

    let (session, mut events) = LiveSession::new(Arc::new(api), config);
    session.set_system(Some(SystemIdentifier::new(system)));

    if let (Some(origin), Some(destination)) = (args.origin, args.destination) {
        session.plan_trip(origin, destination)?;
    }

    let deadline = tokio::time::sleep(Duration::from_secs(args.duration_secs));
    tokio::pin!(deadline);

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Some(event) => report(&session, event),
                None => break,
            },
            _ = &mut deadline => {
                info!("watched for {}s, stopping", args.duration_secs);
                break;
            }
            _ = tokio::signal::ctrl_c() => {
                info!("interrupted");
                break;
            }
        }
    }

    Ok(())
}

fn report(session: &LiveSession, event: LiveEvent) {
    match event {
        LiveEvent::StopsReplaced { count } => info!("{count} stops"),
        LiveEvent::VehiclesUpdated { rendered } => {
            info!("{} vehicles on the map", rendered.len());
            for vehicle in rendered {
                tracing::debug!(
                    "  {} {} at {:.5},{:.5} heading {:.0} ({})",
                    vehicle.id,
                    vehicle.route_name.as_deref().unwrap_or("-"),
                    vehicle.position.lat,
                    vehicle.position.lng,
                    vehicle.heading,
                    vehicle.color
                );
            }
        }
        LiveEvent::FeedHealthChanged { resource, degraded: true } => warn!("{resource} feed degraded"),
        LiveEvent::FeedHealthChanged { resource, degraded: false } => info!("{resource} feed recovered"),
        LiveEvent::RoutePathsChanged { count } => info!("{count} route shapes"),
        LiveEvent::TripChanged(Some(trip)) => {
            info!(
                "trip {} with {} segments, live: {}",
                trip.key(),
                trip.segments.len(),
                session.is_live_updating()
            );
            for (segment, line) in trip.segments.iter().zip(session.trip_lines()) {
                let eta = segment
                    .next_bus
                    .as_ref()
                    .and_then(|bus| bus.best_eta())
                    .map(|s| format!("{:.0} min", s / 60.0))
                    .unwrap_or_else(|| "no live vehicle".to_string());
                let approach = segment
                    .next_bus_distance_m()
                    .map(|m| format!(", bus {m:.0} m out"))
                    .unwrap_or_default();
                info!(
                    "  {} {} -> {}: {} points in {}, {eta}{approach}",
                    line.label.as_deref().unwrap_or(segment.route_id.as_str()),
                    segment.start_stop.name,
                    segment.end_stop.name,
                    line.coordinates.len(),
                    line.color
                );
            }
            for leg in session.walking_legs() {
                info!("  walk {:?}: {:.0} m", leg.direction, leg.distance_m);
            }
        }
        LiveEvent::TripChanged(None) => info!("trip cleared"),
        LiveEvent::PlanningFailed(message) => warn!("planning failed: {message}"),
        LiveEvent::TripRefreshStopped { reason: RefreshStop::LostRealtime } => {
            info!("trip no longer tracks a vehicle, refresh stopped")
        }
        LiveEvent::TripRefreshStopped { reason: RefreshStop::Failed(e) } => {
            warn!("trip refresh stopped: {e}")
        }
        LiveEvent::Camera(CameraCommand::FitBounds { region, padding, target }) => {
            let (sw, ne) = (region.south_west(), region.north_east());
            info!(
                "camera fits {target:?}: {:.4},{:.4} .. {:.4},{:.4} (+{padding}px)",
                sw.lat, sw.lng, ne.lat, ne.lng
            );
        }
        LiveEvent::UserLocationChanged(location) => info!("user location {location:?}"),
        LiveEvent::UserLocationFailed(message) => warn!("location unavailable: {message}"),
    }
}
