use anyhow::{Context, anyhow};
use env_logger::Builder;
use log::{LevelFilter, info, warn};

use csmacd_simulator::common::scene::load_scene;
use csmacd_simulator::control::SimulationConfig;

const DEFAULT_TICKS: u64 = 1000;

fn main() -> anyhow::Result<()> {
    // Logging setup
    Builder::new()
        .filter_level(LevelFilter::Info)
        .filter(Some("csmacd_simulator"), LevelFilter::Debug)
        .parse_default_env()
        .init();

    let mut args = std::env::args().skip(1);
    let scene_path = args.next().ok_or_else(|| anyhow!("usage: csmacd-simulator <scene.json> [ticks]"))?;
    let ticks = match args.next() {
        Some(arg) => arg.parse::<u64>().with_context(|| format!("Invalid tick count: {}", arg))?,
        None => DEFAULT_TICKS,
    };

    let config_path = SimulationConfig::config_path_from_scene(&scene_path);
    let config = if config_path.exists() {
        SimulationConfig::load(&config_path).map_err(|e| anyhow!("{}: {}", config_path.display(), e))?
    } else {
        info!("No config at {}, using defaults", config_path.display());
        SimulationConfig::default()
    };

    info!("Starting up");
    let scene = load_scene(&scene_path)?;
    let mut built = scene.build(&config)?;

    for _ in 0..ticks {
        built.simulation.tick();
    }

    let sim = &built.simulation;
    let totals = sim.history().totals();
    info!(
        "After {} ticks: {} transmissions begun, {} completed, {} jams, {} aborted by jam",
        sim.now(),
        totals.transmissions_started,
        totals.transmissions_completed,
        totals.jams_detected,
        totals.collisions_during_transmit
    );
    info!("Stations queued {} frames and received {}", totals.station_queued, totals.station_received);

    let mut labels: Vec<_> = built.stations.iter().collect();
    labels.sort_by_key(|(_, id)| **id);
    for (label, id) in labels {
        let Some(station) = sim.station(*id) else {
            continue;
        };
        let last = station.last_received();
        if last.is_valid() {
            let from = last.origin();
            info!("{}: last received {:?} (from {}), {} still queued", label, last.payload(), from, station.queued());
        } else {
            warn!("{}: nothing received, {} still queued", label, station.queued());
        }
    }

    Ok(())
}
