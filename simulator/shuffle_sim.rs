// Shuffle Simulator Example
//
// Star bootstrap: every peer starts knowing only peer 0 and the overlay
// has to spread out on its own.

mod shuffle;

use log::LevelFilter;
use simple_logger::SimpleLogger;

use shuffle::{
    EventSchedule, InitialNetworkState, NetworkEvent, ScheduledEvent, SimConfig, SimRunner,
    TopologyMode,
};

fn main() {
    SimpleLogger::new()
        .with_level(LevelFilter::Warn)
        .env()
        .init()
        .unwrap();

    println!("╔════════════════════════════════════════════════════════╗");
    println!("║    Basic Shuffle Simulator                             ║");
    println!("╚════════════════════════════════════════════════════════╝\n");

    let mut config = SimConfig::default();
    config.rounds = 300;

    config.initial_state = InitialNetworkState {
        num_peers: 500,
        topology: TopologyMode::Star,
    };

    // Same shape as the classic star experiment: large cache, l = 8
    config.shuffle.cache_size = 50;
    config.shuffle.shuffle_length = 8;

    config.network.delay_fraction = 0.1;
    config.metrics.sample_interval = 20;
    config.metrics.path_sources = 25;

    config.events = EventSchedule {
        events: vec![
            ScheduledEvent {
                round: 10,
                event: NetworkEvent::ReportStats {
                    label: Some("Leaving the star".to_string()),
                },
            },
            ScheduledEvent {
                round: 100,
                event: NetworkEvent::ReportStats {
                    label: Some("Mid-simulation checkpoint".to_string()),
                },
            },
        ],
    };

    println!("Configuration:");
    println!("  Peers: {}", config.initial_state.num_peers);
    println!("  Rounds: {}", config.rounds);
    println!(
        "  Cache size: {}, shuffle length: {}",
        config.shuffle.cache_size, config.shuffle.shuffle_length
    );
    println!(
        "  Delayed messages: {:.0}%\n",
        config.network.delay_fraction * 100.0
    );

    let result = match SimRunner::new(config).and_then(SimRunner::run) {
        Ok(result) => result,
        Err(e) => {
            eprintln!("Simulation failed: {}", e);
            std::process::exit(1);
        }
    };

    result.print_summary();
}
