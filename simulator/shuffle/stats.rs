// Shuffle Simulator Statistics

use shuffle_rust::{OverlayGraph, ShuffleStats, Summary};

// ============================================================================
// Simulation Result
// ============================================================================

/// Complete simulation result
#[derive(Debug, Clone)]
pub struct SimulationResult {
    /// Configuration summary
    pub config_summary: String,

    /// Random seed used
    pub seed_used: [u8; 32],

    /// Total rounds executed
    pub total_rounds: usize,

    /// Metrics taken after the last round
    pub final_metrics: RoundMetrics,

    /// Historical metrics (sampled at intervals)
    pub metrics_history: Vec<RoundMetrics>,

    /// Event log (what happened and when)
    pub event_log: Vec<EventOutcome>,

    /// Messages handed to the transport
    pub messages: MessageCounts,

    /// Protocol counters summed over all nodes (crashed ones included)
    pub protocol: ShuffleStats,
}

/// Outcome of a scheduled network event
#[derive(Debug, Clone)]
pub struct EventOutcome {
    pub round: usize,
    pub description: String,
}

/// Messages by kind
#[derive(Debug, Clone, Copy, Default)]
pub struct MessageCounts {
    pub requests: usize,
    pub replies: usize,
    pub rejections: usize,
    /// Requests to crashed peers turned into a rejection by the transport
    pub bounced: usize,
    /// Replies and rejections addressed to crashed peers
    pub dropped: usize,
    /// Deliveries postponed by one round
    pub delayed: usize,
}

impl MessageCounts {
    pub fn total(&self) -> usize {
        self.requests + self.replies + self.rejections
    }
}

// ============================================================================
// Round Metrics
// ============================================================================

/// Metrics collected at a single round
#[derive(Debug, Clone, Default)]
pub struct RoundMetrics {
    /// Round number
    pub round: usize,

    /// Live peers in the overlay
    pub live_peers: usize,

    /// Peers with an open exchange
    pub awaiting_peers: usize,

    /// Cache fill (out-degree)
    pub out_degree: Summary,

    /// Number of caches pointing at each peer
    pub in_degree: Summary,

    /// Average local clustering coefficient
    pub clustering: f64,

    /// Average hop count between sampled pairs
    pub avg_path_length: Option<f64>,

    /// Share of peers in the largest weakly connected component
    pub largest_component: f64,

    /// Share of cache entries pointing at crashed peers
    pub dead_link_fraction: f64,
}

impl RoundMetrics {
    pub fn from_graph(round: usize, graph: &OverlayGraph, path_sources: &[u64]) -> Self {
        Self {
            round,
            live_peers: graph.len(),
            awaiting_peers: 0,
            out_degree: Summary::of(&graph.out_degrees()),
            in_degree: Summary::of(&graph.in_degrees()),
            clustering: graph.clustering_coefficient(),
            avg_path_length: graph.average_path_length(path_sources),
            largest_component: graph.largest_component_fraction(),
            dead_link_fraction: graph.dead_link_fraction(),
        }
    }

    pub fn print_line(&self) {
        println!(
            "  round {:>5} | peers {:>5} | cache {:>5.1} | in-deg {:>3}..{:<3} σ {:>5.2} | cc {:.3} | path {} | lcc {:>5.1}% | dead {:>4.1}%",
            self.round,
            self.live_peers,
            self.out_degree.avg,
            self.in_degree.min,
            self.in_degree.max,
            self.in_degree.stddev,
            self.clustering,
            self.avg_path_length
                .map(|p| format!("{:.2}", p))
                .unwrap_or_else(|| "-".to_string()),
            self.largest_component * 100.0,
            self.dead_link_fraction * 100.0,
        );
    }
}

impl SimulationResult {
    pub fn print_summary(&self) {
        println!("\n═══ Simulation Summary ═══");
        println!("{}", self.config_summary);
        println!("Rounds: {}", self.total_rounds);
        println!("Seed: {}", seed_hex(&self.seed_used));

        if !self.event_log.is_empty() {
            println!("\nEvents:");
            for outcome in &self.event_log {
                println!("  round {:>5}: {}", outcome.round, outcome.description);
            }
        }

        if !self.metrics_history.is_empty() {
            println!("\nOverlay over time:");
            for metrics in &self.metrics_history {
                metrics.print_line();
            }
        }

        let m = &self.final_metrics;
        println!("\nFinal overlay:");
        println!("  Live peers:           {}", m.live_peers);
        println!("  Open exchanges:       {}", m.awaiting_peers);
        println!(
            "  Cache fill:           avg {:.2} (min {}, max {})",
            m.out_degree.avg, m.out_degree.min, m.out_degree.max
        );
        println!(
            "  In-degree:            avg {:.2} σ {:.2} (min {}, max {})",
            m.in_degree.avg, m.in_degree.stddev, m.in_degree.min, m.in_degree.max
        );
        println!("  Clustering coeff.:    {:.4}", m.clustering);
        match m.avg_path_length {
            Some(p) => println!("  Avg path length:      {:.3}", p),
            None => println!("  Avg path length:      n/a"),
        }
        println!("  Largest component:    {:.1}%", m.largest_component * 100.0);
        println!("  Dead links:           {:.2}%", m.dead_link_fraction * 100.0);

        let msgs = &self.messages;
        println!("\nMessages:");
        println!(
            "  total {} (requests {}, replies {}, rejections {})",
            msgs.total(),
            msgs.requests,
            msgs.replies,
            msgs.rejections
        );
        println!(
            "  bounced {}, dropped {}, delayed {}",
            msgs.bounced, msgs.dropped, msgs.delayed
        );

        let p = &self.protocol;
        println!("\nExchanges:");
        println!(
            "  started {}, completed {}, aborted {}",
            p.shuffles_started, p.shuffles_completed, p.shuffles_aborted
        );
        println!(
            "  requests accepted {}, rejected {}",
            p.requests_accepted, p.requests_rejected
        );
        println!(
            "  entries stored {}, discarded {}, unexpected messages {}",
            p.entries_stored, p.entries_discarded, p.unexpected_messages
        );
    }
}

pub fn add_stats(total: &mut ShuffleStats, s: &ShuffleStats) {
    total.shuffles_started += s.shuffles_started;
    total.shuffles_completed += s.shuffles_completed;
    total.shuffles_aborted += s.shuffles_aborted;
    total.requests_accepted += s.requests_accepted;
    total.requests_rejected += s.requests_rejected;
    total.entries_stored += s.entries_stored;
    total.entries_discarded += s.entries_discarded;
    total.unexpected_messages += s.unexpected_messages;
}

pub fn seed_hex(seed: &[u8; 32]) -> String {
    let mut s = String::from("0x");
    for b in seed {
        s.push_str(&format!("{:02x}", b));
    }
    s
}
