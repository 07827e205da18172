// Shuffle Simulator Module

pub mod config;
pub mod event_sinks;
pub mod report;
pub mod runner;
pub mod stats;

// Re-export commonly used types
pub use config::{
    EventSchedule, InitialNetworkState, MetricsConfig, NetworkConfig, NetworkEvent,
    OutputConfig, ScheduledEvent, SimConfig, TopologyMode,
};

pub use stats::{seed_hex, MessageCounts, RoundMetrics, SimulationResult};

pub use runner::{SimError, SimRunner};
