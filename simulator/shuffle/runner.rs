// Shuffle Simulator Runner

use std::cell::RefCell;
use std::collections::{HashSet, VecDeque};
use std::rc::Rc;

use indexmap::IndexMap;
use log::{info, warn};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use shuffle_rust::{
    ConfigError, EventSink, Linkable, MessageEnvelope, MessageKind, NoOpSink, OverlayGraph,
    PeerId, ShuffleMessage, ShuffleNode, ShuffleStats,
};
use thiserror::Error;

use super::config::{NetworkEvent, SimConfig, TopologyMode};
use super::event_sinks::{ConsoleEventSink, CsvEventSink, MultiEventSink, SharedSink};
use super::report::ReportWriter;
use super::stats::*;

#[derive(Debug, Error)]
pub enum SimError {
    #[error("invalid shuffle configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("output error: {0}")]
    Io(#[from] std::io::Error),
}

// ============================================================================
// Core Structures
// ============================================================================

/// Cycle-driven scheduler and transport for a set of shuffling nodes
pub struct SimRunner {
    config: SimConfig,
    rng: StdRng,
    seed: [u8; 32],
    current_round: usize,

    // Network state
    peers: IndexMap<PeerId, ShuffleNode>,
    crashed: HashSet<PeerId>,
    next_peer_id: PeerId,

    // Message queue
    messages: VecDeque<MessageEnvelope>,
    delayed_messages: VecDeque<MessageEnvelope>,

    // Metrics tracking
    counts: MessageCounts,
    metrics_history: Vec<RoundMetrics>,
    event_log: Vec<EventOutcome>,
    retired_stats: ShuffleStats,

    // Output
    csv_sink: Option<Rc<RefCell<CsvEventSink>>>,
    report: Option<ReportWriter>,
}

// ============================================================================
// Implementation
// ============================================================================

impl SimRunner {
    /// Create new simulator
    pub fn new(config: SimConfig) -> Result<Self, SimError> {
        config.shuffle.validate()?;

        // Initialize RNG with seed
        let seed = config.seed.unwrap_or_else(|| {
            let mut seed = [0u8; 32];
            rand::thread_rng().fill(&mut seed);
            seed
        });
        let rng = StdRng::from_seed(seed);

        let csv_sink = match &config.output.csv_path {
            Some(path) => Some(Rc::new(RefCell::new(CsvEventSink::new(path)?))),
            None => None,
        };
        let report = match &config.output.report_dir {
            Some(dir) => Some(ReportWriter::new(dir)?),
            None => None,
        };

        Ok(Self {
            config,
            rng,
            seed,
            current_round: 0,
            peers: IndexMap::new(),
            crashed: HashSet::new(),
            next_peer_id: 0,
            messages: VecDeque::new(),
            delayed_messages: VecDeque::new(),
            counts: MessageCounts::default(),
            metrics_history: Vec::new(),
            event_log: Vec::new(),
            retired_stats: ShuffleStats::default(),
            csv_sink,
            report,
        })
    }

    /// Run the simulation
    pub fn run(mut self) -> Result<SimulationResult, SimError> {
        // 1. Initialize network
        self.initialize_network()?;

        // 2. Run simulation rounds
        for round in 0..self.config.rounds {
            self.current_round = round;

            self.apply_events(round)?;

            // Deliver messages sent last round (late ones first)
            self.deliver_messages();

            // Tick all peers
            self.tick_all_peers();

            if self.should_sample_metrics() {
                self.collect_metrics();
            }
        }

        // 3. Build final result
        self.current_round = self.config.rounds;
        self.build_result()
    }

    fn event_sink(&self) -> Box<dyn EventSink> {
        let console = self.config.output.enable_console;
        match (&self.csv_sink, console) {
            (None, false) => Box::new(NoOpSink),
            (None, true) => Box::new(ConsoleEventSink::new(true)),
            (Some(csv), false) => Box::new(SharedSink::new(Rc::clone(csv))),
            (Some(csv), true) => {
                let mut multi = MultiEventSink::new();
                multi.add_sink(Box::new(ConsoleEventSink::new(true)));
                multi.add_sink(Box::new(SharedSink::new(Rc::clone(csv))));
                Box::new(multi)
            }
        }
    }

    fn add_peer(&mut self) -> Result<PeerId, SimError> {
        let peer_id = self.next_peer_id;
        self.next_peer_id += 1;

        let node = ShuffleNode::new_with_sink(peer_id, self.config.shuffle, self.event_sink())?;
        self.peers.insert(peer_id, node);
        Ok(peer_id)
    }

    /// Initialize the peer network
    fn initialize_network(&mut self) -> Result<(), SimError> {
        for _ in 0..self.config.initial_state.num_peers {
            self.add_peer()?;
        }
        self.initialize_topology();

        info!(
            "network initialized: {} peers, topology {:?}",
            self.peers.len(),
            self.config.initial_state.topology
        );
        Ok(())
    }

    /// Seed the caches based on configuration
    fn initialize_topology(&mut self) {
        let peer_ids: Vec<PeerId> = self.peers.keys().copied().collect();

        match self.config.initial_state.topology.clone() {
            TopologyMode::Star => {
                let Some(&center) = peer_ids.first() else {
                    return;
                };
                for node in self.peers.values_mut() {
                    node.add_neighbor(center);
                }
            }

            TopologyMode::Random { degree } => {
                for peer_id in &peer_ids {
                    let others: Vec<PeerId> =
                        peer_ids.iter().copied().filter(|p| p != peer_id).collect();
                    if let Some(node) = self.peers.get_mut(peer_id) {
                        for other in others.choose_multiple(&mut self.rng, degree) {
                            node.add_neighbor(*other);
                        }
                    }
                }
            }

            TopologyMode::Ring { neighbors } => {
                let mut sorted = peer_ids.clone();
                sorted.sort_unstable();
                let n = sorted.len();

                for (i, peer_id) in sorted.iter().enumerate() {
                    if let Some(node) = self.peers.get_mut(peer_id) {
                        for offset in 1..=neighbors.min(n.saturating_sub(1)) {
                            node.add_neighbor(sorted[(i + offset) % n]);
                        }
                    }
                }
            }

            TopologyMode::Isolated => {
                // empty caches
            }
        }
    }

    // ========================================================================
    // Scheduled Events
    // ========================================================================

    fn apply_events(&mut self, round: usize) -> Result<(), SimError> {
        let due: Vec<NetworkEvent> = self
            .config
            .events
            .events
            .iter()
            .filter(|e| e.round == round)
            .map(|e| e.event.clone())
            .collect();

        for event in due {
            let description = match event {
                NetworkEvent::PeerJoin { count, contacts } => {
                    self.peers_join(count, contacts)?;
                    format!("{} peers joined ({} contacts each)", count, contacts)
                }
                NetworkEvent::PeerCrash { count } => {
                    let crashed = self.peers_crash(count);
                    format!("{} peers crashed", crashed)
                }
                NetworkEvent::ReportStats { label } => {
                    let metrics = self.snapshot_metrics();
                    println!("── {} ──", label.as_deref().unwrap_or("Stats"));
                    metrics.print_line();
                    format!("stats reported: {}", label.unwrap_or_default())
                }
            };
            info!("round {}: {}", round, description);
            self.event_log.push(EventOutcome { round, description });
        }
        Ok(())
    }

    fn peers_join(&mut self, count: usize, contacts: usize) -> Result<(), SimError> {
        let live: Vec<PeerId> = self.peers.keys().copied().collect();

        for _ in 0..count {
            let peer_id = self.add_peer()?;
            if let Some(node) = self.peers.get_mut(&peer_id) {
                for contact in live.choose_multiple(&mut self.rng, contacts) {
                    node.add_neighbor(*contact);
                }
            }
        }
        Ok(())
    }

    fn peers_crash(&mut self, count: usize) -> usize {
        let live: Vec<PeerId> = self.peers.keys().copied().collect();
        let victims: Vec<PeerId> = live
            .choose_multiple(&mut self.rng, count)
            .copied()
            .collect();

        for peer_id in &victims {
            self.crash_peer(*peer_id);
        }
        victims.len()
    }

    fn crash_peer(&mut self, peer_id: PeerId) {
        if let Some(node) = self.peers.shift_remove(&peer_id) {
            add_stats(&mut self.retired_stats, &node.stats());
            self.crashed.insert(peer_id);
        }
    }

    // ========================================================================
    // Transport
    // ========================================================================

    fn should_delay(&mut self) -> bool {
        let fraction = self.config.network.delay_fraction;
        fraction > 0.0 && self.rng.gen_bool(fraction.min(1.0))
    }

    /// Messages held back last round are delivered first and unconditionally.
    /// Once a message on a link is held back, every later message on that
    /// link in the batch is held too, so each link stays FIFO.
    fn deliver_messages(&mut self) {
        let late = std::mem::take(&mut self.delayed_messages);
        let batch = std::mem::take(&mut self.messages);
        let mut outgoing = Vec::new();

        for envelope in late {
            self.deliver_message(envelope, &mut outgoing);
        }

        let mut held: HashSet<(PeerId, PeerId)> = HashSet::new();
        for envelope in batch {
            let link = (envelope.sender, envelope.receiver);
            if held.contains(&link) || self.should_delay() {
                held.insert(link);
                self.counts.delayed += 1;
                self.delayed_messages.push_back(envelope);
                continue;
            }
            self.deliver_message(envelope, &mut outgoing);
        }

        self.send_all(outgoing);
    }

    /// Deliver a single message to its recipient
    fn deliver_message(&mut self, envelope: MessageEnvelope, outgoing: &mut Vec<MessageEnvelope>) {
        let Some(node) = self.peers.get_mut(&envelope.receiver) else {
            self.undeliverable(envelope);
            return;
        };
        node.handle_message(&envelope, &mut self.rng, outgoing);
    }

    /// A crashed peer never answers: refuse requests on its behalf so the
    /// opener does not wait forever, drop everything else.
    fn undeliverable(&mut self, envelope: MessageEnvelope) {
        let sender_alive = self.peers.contains_key(&envelope.sender);

        if envelope.message.kind == MessageKind::Request && sender_alive {
            self.counts.bounced += 1;
            self.messages.push_back(MessageEnvelope {
                sender: envelope.receiver,
                receiver: envelope.sender,
                time: envelope.time,
                message: ShuffleMessage::rejected(envelope.receiver),
            });
        } else {
            if !self.crashed.contains(&envelope.receiver) {
                warn!("message for unknown peer {:x}", envelope.receiver);
            }
            self.counts.dropped += 1;
        }
    }

    fn send_all(&mut self, outgoing: Vec<MessageEnvelope>) {
        for envelope in outgoing {
            match envelope.message.kind {
                MessageKind::Request => self.counts.requests += 1,
                MessageKind::Reply => self.counts.replies += 1,
                MessageKind::Rejected => self.counts.rejections += 1,
            }
            self.messages.push_back(envelope);
        }
    }

    /// Tick all live peers in a random order
    fn tick_all_peers(&mut self) {
        let mut order: Vec<PeerId> = self.peers.keys().copied().collect();
        order.shuffle(&mut self.rng);

        let mut outgoing = Vec::new();
        for peer_id in order {
            if let Some(node) = self.peers.get_mut(&peer_id) {
                node.tick(&mut self.rng, &mut outgoing);
            }
        }
        self.send_all(outgoing);
    }

    // ========================================================================
    // Metrics
    // ========================================================================

    fn should_sample_metrics(&self) -> bool {
        let interval = self.config.metrics.sample_interval.max(1);
        self.current_round % interval == 0
    }

    fn overlay_graph(&self) -> OverlayGraph {
        OverlayGraph::from_nodes(self.peers.iter().map(|(id, node)| (*id, node)))
    }

    /// Evenly spread BFS sources, no randomness so sampling never changes a run
    fn path_sources(&self) -> Vec<PeerId> {
        let n = self.peers.len();
        let k = self.config.metrics.path_sources.min(n);
        if k == 0 {
            return Vec::new();
        }
        let step = n / k;
        (0..k)
            .filter_map(|i| self.peers.get_index(i * step).map(|(id, _)| *id))
            .collect()
    }

    fn metrics_for(&self, graph: &OverlayGraph) -> RoundMetrics {
        let mut metrics = RoundMetrics::from_graph(self.current_round, graph, &self.path_sources());
        metrics.awaiting_peers = self
            .peers
            .values()
            .filter(|n| n.is_awaiting_reply())
            .count();
        metrics
    }

    fn snapshot_metrics(&self) -> RoundMetrics {
        self.metrics_for(&self.overlay_graph())
    }

    fn collect_metrics(&mut self) {
        let graph = self.overlay_graph();
        let metrics = self.metrics_for(&graph);

        if let Some(report) = self.report.as_mut() {
            if let Err(e) = report.write_sample(&graph, &metrics) {
                warn!("failed to write report sample: {}", e);
            }
        }

        self.metrics_history.push(metrics);
    }

    /// Every live cache within bounds, without duplicates or itself
    pub fn check_invariants(&self) -> bool {
        self.peers.iter().all(|(id, node)| {
            let cache = node.cache();
            let unique: HashSet<PeerId> = cache.iter().map(|e| e.peer).collect();
            cache.len() <= cache.capacity() && unique.len() == cache.len() && !cache.contains(*id)
        })
    }

    /// Build final simulation result
    fn build_result(mut self) -> Result<SimulationResult, SimError> {
        let final_metrics = self.snapshot_metrics();

        if let Some(report) = self.report.as_mut() {
            report.flush()?;
        }
        if let Some(csv) = &self.csv_sink {
            csv.borrow_mut().flush()?;
        }

        let mut protocol = self.retired_stats;
        for node in self.peers.values() {
            add_stats(&mut protocol, &node.stats());
        }

        if !self.check_invariants() {
            warn!("cache invariant violated at end of run");
        }

        Ok(SimulationResult {
            config_summary: format!(
                "Peers: {}, Rounds: {}, Topology: {:?}, Cache: {}, Shuffle length: {}",
                self.config.initial_state.num_peers,
                self.config.rounds,
                self.config.initial_state.topology,
                self.config.shuffle.cache_size,
                self.config.shuffle.shuffle_length
            ),
            seed_used: self.seed,
            total_rounds: self.config.rounds,
            final_metrics,
            metrics_history: self.metrics_history,
            event_log: self.event_log,
            messages: self.counts,
            protocol,
        })
    }
}
