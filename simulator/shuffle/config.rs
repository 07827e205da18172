// Shuffle Simulator Configuration

use serde::Deserialize;
use shuffle_rust::ShuffleConfig;

// ============================================================================
// Main Configuration
// ============================================================================

/// Main configuration for a shuffle simulation
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Total number of simulation cycles
    pub rounds: usize,

    /// Random seed for reproducibility (random if None)
    #[serde(skip)]
    pub seed: Option<[u8; 32]>,

    /// Initial network state
    pub initial_state: InitialNetworkState,

    /// Protocol parameters shared by every node
    pub shuffle: ShuffleConfig,

    /// Scheduled network events
    pub events: EventSchedule,

    /// Message delivery simulation parameters
    pub network: NetworkConfig,

    /// Metrics sampling configuration
    pub metrics: MetricsConfig,

    /// Output configuration
    pub output: OutputConfig,
}

// ============================================================================
// Initial Network State
// ============================================================================

/// Configuration for initial network topology
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct InitialNetworkState {
    /// Number of peers to create initially
    pub num_peers: usize,

    /// How peers initially know each other
    pub topology: TopologyMode,
}

/// How the caches are filled before the first cycle
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum TopologyMode {
    /// Every peer knows only the first peer, which knows nobody
    Star,

    /// Every peer knows `degree` random other peers
    Random { degree: usize },

    /// Peers sorted by id, each knows `neighbors` successors
    Ring { neighbors: usize },

    /// Empty caches (nothing will ever happen without joins)
    Isolated,
}

// ============================================================================
// Event Scheduling
// ============================================================================

/// Schedule of network events
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(transparent)]
pub struct EventSchedule {
    pub events: Vec<ScheduledEvent>,
}

/// A single scheduled event
#[derive(Debug, Clone, Deserialize)]
pub struct ScheduledEvent {
    /// Round number when event triggers
    pub round: usize,

    /// The event to trigger
    pub event: NetworkEvent,
}

/// Types of network events
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NetworkEvent {
    /// New peers join, each knowing `contacts` random live peers
    PeerJoin { count: usize, contacts: usize },

    /// Random live peers disappear without notice
    PeerCrash { count: usize },

    /// Print current statistics
    ReportStats {
        #[serde(default)]
        label: Option<String>,
    },
}

// ============================================================================
// Network Configuration
// ============================================================================

/// Message delivery behavior. Messages are never lost, only late.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Fraction of messages held back one more round (0.0 to 1.0)
    pub delay_fraction: f64,
}

// ============================================================================
// Metrics Configuration
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// How often to sample metrics (every N rounds)
    pub sample_interval: usize,

    /// Number of BFS sources used for the average path length
    pub path_sources: usize,
}

// ============================================================================
// Output Configuration
// ============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Log every protocol event
    pub enable_console: bool,

    /// CSV event log path
    pub csv_path: Option<String>,

    /// Directory for in-degree / clustering / path length reports
    pub report_dir: Option<String>,
}

// ============================================================================
// Default Implementations
// ============================================================================

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            rounds: 300,
            seed: None,
            initial_state: InitialNetworkState::default(),
            shuffle: ShuffleConfig::default(),
            events: EventSchedule::default(),
            network: NetworkConfig::default(),
            metrics: MetricsConfig::default(),
            output: OutputConfig::default(),
        }
    }
}

impl Default for InitialNetworkState {
    fn default() -> Self {
        Self {
            num_peers: 200,
            topology: TopologyMode::Star,
        }
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            delay_fraction: 0.2,
        }
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            sample_interval: 10,
            path_sources: 20,
        }
    }
}
