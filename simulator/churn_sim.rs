// Churn Simulator Example
//
// Random overlay that loses a chunk of its peers, then grows back.
// Dead links should be flushed out of the caches by the exchanges.

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
    println!("║    Basic Shuffle Churn Simulator                       ║");
    println!("╚════════════════════════════════════════════════════════╝\n");

    let mut config = SimConfig::default();
    config.rounds = 400;
    config.initial_state = InitialNetworkState {
        num_peers: 300,
        topology: TopologyMode::Random { degree: 10 },
    };
    config.shuffle.cache_size = 20;
    config.shuffle.shuffle_length = 8;
    config.metrics.sample_interval = 25;

    config.events = EventSchedule {
        events: vec![
            ScheduledEvent {
                round: 100,
                event: NetworkEvent::ReportStats {
                    label: Some("Before crash".to_string()),
                },
            },
            ScheduledEvent {
                round: 100,
                event: NetworkEvent::PeerCrash { count: 90 },
            },
            ScheduledEvent {
                round: 110,
                event: NetworkEvent::ReportStats {
                    label: Some("Shortly after crash".to_string()),
                },
            },
            ScheduledEvent {
                round: 200,
                event: NetworkEvent::PeerJoin {
                    count: 100,
                    contacts: 3,
                },
            },
            ScheduledEvent {
                round: 300,
                event: NetworkEvent::ReportStats {
                    label: Some("After rejoin".to_string()),
                },
            },
        ],
    };

    println!("Schedule:");
    for scheduled in &config.events.events {
        println!("  round {:>4}: {:?}", scheduled.round, scheduled.event);
    }
    println!();

    let result = match SimRunner::new(config).and_then(SimRunner::run) {
        Ok(result) => result,
        Err(e) => {
            eprintln!("Simulation failed: {}", e);
            std::process::exit(1);
        }
    };

    result.print_summary();
}
