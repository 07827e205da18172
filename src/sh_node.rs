use rand::Rng;

use crate::sh_cache::PeerCache;
use crate::sh_config::{ConfigError, ShuffleConfig};
use crate::sh_interface::{
    Event, EventSink, Linkable, MessageEnvelope, MessageKind, NoOpSink, PeerEntry, PeerId,
    ShTime, ShuffleMessage,
};
use crate::sh_reconcile::merge;
use crate::sh_subset::select_subset;

/// Where a node is in its own exchange
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShuffleState {
    Idle,
    /// REQUEST sent to `partner` at `since`, waiting for REPLY or REJECTED
    AwaitingReply { partner: PeerId, since: ShTime },
}

/// Lifetime counters of a single node
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ShuffleStats {
    pub shuffles_started: usize,
    pub shuffles_completed: usize,
    pub shuffles_aborted: usize,
    pub requests_accepted: usize,
    pub requests_rejected: usize,
    pub entries_stored: usize,
    pub entries_discarded: usize,
    pub unexpected_messages: usize,
}

pub struct ShuffleNode {
    peer_id: PeerId,
    config: ShuffleConfig,
    cache: PeerCache,
    state: ShuffleState,
    /// Partner removed from a full cache before our REQUEST went out
    evicted_candidate: Option<PeerId>,
    time: ShTime,
    stats: ShuffleStats,
    event_sink: Box<dyn EventSink>,
}

impl ShuffleNode {
    /// Create a new node with default NoOpSink (zero overhead)
    pub fn new(peer_id: PeerId, config: ShuffleConfig) -> Result<Self, ConfigError> {
        Self::new_with_sink(peer_id, config, Box::new(NoOpSink))
    }

    /// Create a new node with a custom event sink for debugging/analysis
    pub fn new_with_sink(
        peer_id: PeerId,
        config: ShuffleConfig,
        event_sink: Box<dyn EventSink>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;

        Ok(Self {
            peer_id,
            config,
            cache: PeerCache::new(peer_id, config.cache_size),
            state: ShuffleState::Idle,
            evicted_candidate: None,
            time: 0,
            stats: ShuffleStats::default(),
            event_sink,
        })
    }

    pub fn get_peer_id(&self) -> PeerId {
        self.peer_id
    }

    pub fn cache(&self) -> &PeerCache {
        &self.cache
    }

    pub fn state(&self) -> ShuffleState {
        self.state
    }

    pub fn is_awaiting_reply(&self) -> bool {
        matches!(self.state, ShuffleState::AwaitingReply { .. })
    }

    pub fn evicted_candidate(&self) -> Option<PeerId> {
        self.evicted_candidate
    }

    pub fn stats(&self) -> ShuffleStats {
        self.stats
    }

    fn envelope(&self, receiver: PeerId, message: ShuffleMessage) -> MessageEnvelope {
        MessageEnvelope {
            sender: self.peer_id,
            receiver,
            time: self.time,
            message,
        }
    }

    /// Periodic step: open an exchange with a random neighbor unless one is
    /// already running or nothing is known yet.
    pub fn tick<R: Rng + ?Sized>(&mut self, rng: &mut R, responses: &mut Vec<MessageEnvelope>) {
        self.time += 1;

        if self.is_awaiting_reply() || self.cache.is_empty() {
            return;
        }

        let q_index = rng.gen_range(0..self.cache.len());
        let Some(partner) = self.cache.get(q_index).map(|e| e.peer) else {
            return;
        };

        // free a slot so the reply can be absorbed
        self.evicted_candidate = if self.cache.is_full() {
            self.cache.remove_at(q_index);
            Some(partner)
        } else {
            None
        };

        let mut subset = select_subset(
            &self.cache,
            partner,
            self.config.shuffle_length.saturating_sub(1),
            rng,
        );
        self.cache.mark_sent(&subset, partner);
        subset.push(PeerEntry::new(self.peer_id));

        let offered = subset.len();
        responses.push(self.envelope(partner, ShuffleMessage::request(self.peer_id, subset)));

        self.state = ShuffleState::AwaitingReply {
            partner,
            since: self.time,
        };
        self.stats.shuffles_started += 1;

        log::debug!(
            "{}: peer {:x} shuffle -> {:x} ({} entries, evicted: {})",
            self.time,
            self.peer_id,
            partner,
            offered,
            self.evicted_candidate.is_some()
        );
        self.event_sink.log(
            self.time,
            self.peer_id,
            Event::ShuffleStarted {
                partner,
                offered,
                evicted: self.evicted_candidate.is_some(),
            },
        );
    }

    pub fn handle_message<R: Rng + ?Sized>(
        &mut self,
        msg: &MessageEnvelope,
        rng: &mut R,
        responses: &mut Vec<MessageEnvelope>,
    ) {
        let sender = msg.message.origin;

        match msg.message.kind {
            MessageKind::Request => self.handle_request(sender, &msg.message.payload, rng, responses),
            MessageKind::Reply => self.handle_reply(sender, &msg.message.payload),
            MessageKind::Rejected => self.handle_rejected(sender),
        }
    }

    fn handle_request<R: Rng + ?Sized>(
        &mut self,
        sender: PeerId,
        payload: &[PeerEntry],
        rng: &mut R,
        responses: &mut Vec<MessageEnvelope>,
    ) {
        // at most one exchange per node at a time
        if self.is_awaiting_reply() {
            responses.push(self.envelope(sender, ShuffleMessage::rejected(self.peer_id)));
            self.stats.requests_rejected += 1;
            self.event_sink.log(
                self.time,
                self.peer_id,
                Event::RequestRejected { from_peer: sender },
            );
            return;
        }

        let subset = select_subset(&self.cache, sender, self.config.shuffle_length, rng);
        self.cache.mark_sent(&subset, sender);
        let offered = subset.len();
        responses.push(self.envelope(sender, ShuffleMessage::reply(self.peer_id, subset)));

        let outcome = merge(&mut self.cache, sender, payload);
        self.cache.clear_tags();

        self.stats.requests_accepted += 1;
        self.stats.entries_stored += outcome.stored();
        self.stats.entries_discarded += outcome.discarded();
        self.event_sink.log(
            self.time,
            self.peer_id,
            Event::RequestAccepted {
                from_peer: sender,
                offered,
            },
        );
    }

    fn handle_reply(&mut self, sender: PeerId, payload: &[PeerEntry]) {
        let state = self.state;
        match state {
            ShuffleState::Idle => self.unexpected(sender, MessageKind::Reply),
            ShuffleState::AwaitingReply { partner, .. } if partner != sender => {
                log::warn!(
                    "peer {:x}: reply from {:x} while waiting for {:x}",
                    self.peer_id,
                    sender,
                    partner
                );
            }
            ShuffleState::AwaitingReply { .. } => {}
        }

        let outcome = merge(&mut self.cache, sender, payload);

        self.state = ShuffleState::Idle;
        self.evicted_candidate = None;
        self.cache.clear_tags();

        self.stats.entries_stored += outcome.stored();
        self.stats.entries_discarded += outcome.discarded();
        if state == ShuffleState::Idle {
            return;
        }

        self.stats.shuffles_completed += 1;
        self.event_sink.log(
            self.time,
            self.peer_id,
            Event::ShuffleCompleted {
                partner: sender,
                added: outcome.added,
                swapped: outcome.swapped,
                discarded: outcome.discarded(),
            },
        );
    }

    fn handle_rejected(&mut self, sender: PeerId) {
        let was_awaiting = self.is_awaiting_reply();
        if !was_awaiting {
            self.unexpected(sender, MessageKind::Rejected);
        }

        self.cache.clear_tags();

        let mut restored = false;
        if let Some(evicted) = self.evicted_candidate.take() {
            // the slot freed at eviction time is still free
            restored = self.cache.add(PeerEntry::new(evicted));
            if !restored && !self.cache.contains(evicted) {
                log::warn!(
                    "peer {:x}: no room to restore evicted partner {:x}",
                    self.peer_id,
                    evicted
                );
            }
        }

        self.state = ShuffleState::Idle;
        if !was_awaiting {
            return;
        }

        self.stats.shuffles_aborted += 1;
        self.event_sink.log(
            self.time,
            self.peer_id,
            Event::ShuffleAborted {
                partner: sender,
                restored,
            },
        );
    }

    fn unexpected(&mut self, sender: PeerId, kind: MessageKind) {
        log::debug!(
            "peer {:x}: {} from {:x} without an open exchange",
            self.peer_id,
            kind.as_str(),
            sender
        );
        self.stats.unexpected_messages += 1;
        self.event_sink.log(
            self.time,
            self.peer_id,
            Event::UnexpectedMessage {
                from_peer: sender,
                kind: kind.as_str(),
            },
        );
    }
}

impl Linkable for ShuffleNode {
    fn degree(&self) -> usize {
        self.cache.len()
    }

    fn neighbor_at(&self, i: usize) -> Option<PeerId> {
        self.cache.get(i).map(|e| e.peer)
    }

    fn add_neighbor(&mut self, peer: PeerId) -> bool {
        self.cache.add(PeerEntry::new(peer))
    }

    fn contains(&self, peer: PeerId) -> bool {
        self.cache.contains(peer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::cell::RefCell;
    use std::collections::HashSet;
    use std::rc::Rc;

    const SELF_ID: PeerId = 1;
    const A: PeerId = 10;
    const B: PeerId = 11;
    const C: PeerId = 12;
    const D: PeerId = 13;
    const E: PeerId = 14;

    fn node_with(capacity: usize, l: usize, peers: &[PeerId]) -> ShuffleNode {
        let mut node = ShuffleNode::new(SELF_ID, ShuffleConfig::new(capacity, l)).unwrap();
        for &p in peers {
            assert!(node.add_neighbor(p));
        }
        node
    }

    fn envelope(sender: PeerId, message: ShuffleMessage) -> MessageEnvelope {
        MessageEnvelope {
            sender,
            receiver: SELF_ID,
            time: 0,
            message,
        }
    }

    fn entries(peers: &[PeerId]) -> Vec<PeerEntry> {
        peers.iter().map(|&p| PeerEntry::new(p)).collect()
    }

    fn assert_invariants(node: &ShuffleNode) {
        let cache = node.cache();
        assert!(cache.len() <= cache.capacity());
        let unique: HashSet<PeerId> = cache.iter().map(|e| e.peer).collect();
        assert_eq!(unique.len(), cache.len(), "duplicate peer in cache");
        assert!(!cache.contains(node.get_peer_id()), "self in cache");
    }

    #[test]
    fn test_new_rejects_bad_config() {
        assert!(matches!(
            ShuffleNode::new(SELF_ID, ShuffleConfig::new(0, 3)),
            Err(ConfigError::ZeroCacheSize)
        ));
        assert!(matches!(
            ShuffleNode::new(SELF_ID, ShuffleConfig::new(3, 0)),
            Err(ConfigError::ZeroShuffleLength)
        ));
    }

    #[test]
    fn test_tick_on_empty_cache_is_noop() {
        let mut node = node_with(5, 3, &[]);
        let mut rng = StdRng::seed_from_u64(1);
        let mut out = Vec::new();

        node.tick(&mut rng, &mut out);

        assert!(out.is_empty());
        assert_eq!(node.state(), ShuffleState::Idle);
    }

    #[test]
    fn test_tick_full_cache_evicts_partner() {
        let mut node = node_with(5, 3, &[A, B, C, D, E]);
        let mut rng = StdRng::seed_from_u64(42);
        let mut out = Vec::new();

        node.tick(&mut rng, &mut out);

        assert_eq!(out.len(), 1);
        let request = &out[0];
        let q = request.receiver;
        assert_eq!(request.message.kind, MessageKind::Request);
        assert_eq!(request.message.origin, SELF_ID);

        // partner evicted, cache has one free slot
        assert_eq!(node.cache().len(), 4);
        assert!(!node.contains(q));
        assert_eq!(node.evicted_candidate(), Some(q));
        assert!(node.is_awaiting_reply());

        // l - 1 entries from the cache plus ourselves
        let payload = &request.message.payload;
        assert_eq!(payload.len(), 3);
        assert_eq!(payload.last().unwrap().peer, SELF_ID);
        assert_eq!(payload.last().unwrap().pending_destination, None);
        assert!(payload.iter().all(|e| e.peer != q));
        for e in &payload[..2] {
            assert!(e.is_pending_for(q));
            let slot = node.cache().position(e.peer).unwrap();
            assert!(node.cache().get(slot).unwrap().is_pending_for(q));
        }
        assert_eq!(node.cache().num_tagged(), 2);
    }

    #[test]
    fn test_tick_partial_cache_keeps_partner() {
        let mut node = node_with(5, 3, &[A, B]);
        let mut rng = StdRng::seed_from_u64(5);
        let mut out = Vec::new();

        node.tick(&mut rng, &mut out);

        let q = out[0].receiver;
        assert!(node.contains(q));
        assert_eq!(node.cache().len(), 2);
        assert_eq!(node.evicted_candidate(), None);
        // the only other neighbor plus ourselves
        assert_eq!(out[0].message.payload.len(), 2);
    }

    #[test]
    fn test_at_most_one_request_in_flight() {
        let mut node = node_with(5, 3, &[A, B, C]);
        let mut rng = StdRng::seed_from_u64(9);
        let mut out = Vec::new();

        node.tick(&mut rng, &mut out);
        node.tick(&mut rng, &mut out);
        node.tick(&mut rng, &mut out);

        assert_eq!(out.len(), 1);
        assert_eq!(node.stats().shuffles_started, 1);
    }

    #[test]
    fn test_request_while_awaiting_is_rejected() {
        let mut node = node_with(5, 3, &[A, B, C, D, E]);
        let mut rng = StdRng::seed_from_u64(42);
        let mut out = Vec::new();
        node.tick(&mut rng, &mut out);

        let cache_before = node.cache().peers();
        let state_before = node.state();
        let evicted_before = node.evicted_candidate();
        out.clear();

        node.handle_message(
            &envelope(C, ShuffleMessage::request(C, entries(&[20, 21, C]))),
            &mut rng,
            &mut out,
        );

        assert_eq!(out.len(), 1);
        assert_eq!(out[0].receiver, C);
        assert_eq!(out[0].message, ShuffleMessage::rejected(SELF_ID));
        assert_eq!(node.cache().peers(), cache_before);
        assert_eq!(node.state(), state_before);
        assert_eq!(node.evicted_candidate(), evicted_before);
    }

    #[test]
    fn test_idle_request_replies_and_merges() {
        let mut node = node_with(4, 2, &[A, B, C, D]);
        let mut rng = StdRng::seed_from_u64(3);
        let mut out = Vec::new();

        node.handle_message(
            &envelope(E, ShuffleMessage::request(E, entries(&[20, E]))),
            &mut rng,
            &mut out,
        );

        assert_eq!(out.len(), 1);
        let reply = &out[0].message;
        assert_eq!(reply.kind, MessageKind::Reply);
        assert_eq!(reply.payload.len(), 2);
        assert!(reply.payload.iter().all(|e| e.is_pending_for(E)));

        // the two offered slots were swapped for 20 and E
        let sent: Vec<PeerId> = reply.payload.iter().map(|e| e.peer).collect();
        assert!(node.contains(20));
        assert!(node.contains(E));
        for p in sent {
            assert!(!node.contains(p));
        }
        assert_eq!(node.cache().len(), 4);
        assert_eq!(node.cache().num_tagged(), 0);
        assert_eq!(node.state(), ShuffleState::Idle);
    }

    #[test]
    fn test_reply_completes_exchange() {
        let mut node = node_with(3, 3, &[A, B, C]);
        let mut rng = StdRng::seed_from_u64(8);
        let mut out = Vec::new();
        node.tick(&mut rng, &mut out);
        let q = out[0].receiver;

        node.handle_message(
            &envelope(q, ShuffleMessage::reply(q, entries(&[30, 31, 32]))),
            &mut rng,
            &mut out,
        );

        // one free slot plus two offered slots
        assert_eq!(node.cache().len(), 3);
        assert!(node.contains(30) && node.contains(31) && node.contains(32));
        assert_eq!(node.state(), ShuffleState::Idle);
        assert_eq!(node.evicted_candidate(), None);
        assert_eq!(node.cache().num_tagged(), 0);
        assert_invariants(&node);
    }

    #[test]
    fn test_rejected_restores_evicted_partner() {
        let mut node = node_with(5, 3, &[A, B, C, D, E]);
        let mut rng = StdRng::seed_from_u64(42);
        let mut out = Vec::new();
        node.tick(&mut rng, &mut out);
        let q = out[0].receiver;

        node.handle_message(
            &envelope(q, ShuffleMessage::rejected(q)),
            &mut rng,
            &mut out,
        );

        assert!(node.contains(q));
        assert_eq!(node.cache().len(), 5);
        assert_eq!(node.evicted_candidate(), None);
        assert_eq!(node.cache().num_tagged(), 0);
        assert_eq!(node.state(), ShuffleState::Idle);
        assert_eq!(node.stats().shuffles_aborted, 1);
    }

    #[test]
    fn test_rejected_without_eviction_keeps_cache() {
        let mut node = node_with(5, 3, &[A, B]);
        let mut rng = StdRng::seed_from_u64(2);
        let mut out = Vec::new();
        node.tick(&mut rng, &mut out);
        let q = out[0].receiver;

        node.handle_message(&envelope(q, ShuffleMessage::rejected(q)), &mut rng, &mut out);

        assert_eq!(node.cache().peers(), vec![A, B]);
        assert!(!node.is_awaiting_reply());
    }

    #[test]
    fn test_unexpected_messages_are_absorbed() {
        let mut node = node_with(3, 2, &[A]);
        let mut rng = StdRng::seed_from_u64(4);
        let mut out = Vec::new();

        node.handle_message(
            &envelope(B, ShuffleMessage::reply(B, entries(&[B, C, D, E]))),
            &mut rng,
            &mut out,
        );
        node.handle_message(&envelope(C, ShuffleMessage::rejected(C)), &mut rng, &mut out);

        assert!(out.is_empty());
        assert_eq!(node.cache().peers(), vec![A, B, C]);
        assert_eq!(node.stats().unexpected_messages, 2);
        assert_invariants(&node);
    }

    struct RecordingSink(Rc<RefCell<Vec<Event>>>);

    impl EventSink for RecordingSink {
        fn log(&mut self, _round: ShTime, _peer: PeerId, event: Event) {
            self.0.borrow_mut().push(event);
        }
    }

    #[test]
    fn test_stray_messages_emit_one_event_each() {
        let events = Rc::new(RefCell::new(Vec::new()));
        let mut node = ShuffleNode::new_with_sink(
            SELF_ID,
            ShuffleConfig::new(3, 2),
            Box::new(RecordingSink(Rc::clone(&events))),
        )
        .unwrap();
        node.add_neighbor(A);
        let mut rng = StdRng::seed_from_u64(4);
        let mut out = Vec::new();

        node.handle_message(
            &envelope(B, ShuffleMessage::reply(B, entries(&[B]))),
            &mut rng,
            &mut out,
        );
        node.handle_message(&envelope(C, ShuffleMessage::rejected(C)), &mut rng, &mut out);

        let events = events.borrow();
        assert_eq!(events.len(), 2);
        assert!(events
            .iter()
            .all(|e| matches!(e, Event::UnexpectedMessage { .. })));
        assert_eq!(node.stats().shuffles_completed, 0);
        assert_eq!(node.stats().shuffles_aborted, 0);
        assert!(node.contains(B));
    }

    #[test]
    fn test_self_entries_are_never_stored() {
        let mut node = node_with(4, 3, &[A]);
        let mut rng = StdRng::seed_from_u64(6);
        let mut out = Vec::new();

        node.handle_message(
            &envelope(B, ShuffleMessage::request(B, entries(&[SELF_ID, B]))),
            &mut rng,
            &mut out,
        );

        assert!(!node.contains(SELF_ID));
        assert!(!node.add_neighbor(SELF_ID));
        assert_invariants(&node);
    }

    #[test]
    fn test_pairwise_exchange_preserves_invariants() {
        let mut rng = StdRng::seed_from_u64(1234);
        let mut p = ShuffleNode::new(1, ShuffleConfig::new(4, 3)).unwrap();
        let mut q = ShuffleNode::new(2, ShuffleConfig::new(4, 3)).unwrap();
        for peer in [2, 10, 11, 12] {
            p.add_neighbor(peer);
        }
        for peer in [1, 20, 21, 22] {
            q.add_neighbor(peer);
        }

        for _ in 0..50 {
            let mut to_q = Vec::new();
            p.tick(&mut rng, &mut to_q);
            for msg in to_q.iter().filter(|m| m.receiver == 2) {
                let mut to_p = Vec::new();
                q.handle_message(msg, &mut rng, &mut to_p);
                for reply in &to_p {
                    p.handle_message(reply, &mut rng, &mut Vec::new());
                }
            }
            // partner outside this pair never answers, give up on it
            if let ShuffleState::AwaitingReply { partner, .. } = p.state() {
                if partner != 2 {
                    let bounce = MessageEnvelope {
                        sender: partner,
                        receiver: 1,
                        time: 0,
                        message: ShuffleMessage::rejected(partner),
                    };
                    p.handle_message(&bounce, &mut rng, &mut Vec::new());
                }
            }
            assert_invariants(&p);
            assert_invariants(&q);
        }
    }

    #[test]
    fn test_network_rounds_preserve_invariants() {
        const N: usize = 30;
        let mut rng = StdRng::seed_from_u64(77);
        let mut nodes: Vec<ShuffleNode> = (0..N as PeerId)
            .map(|id| ShuffleNode::new(id, ShuffleConfig::new(6, 3)).unwrap())
            .collect();
        for (i, node) in nodes.iter_mut().enumerate() {
            for offset in 1..=3 {
                node.add_neighbor(((i + offset) % N) as PeerId);
            }
        }

        let mut in_flight: Vec<MessageEnvelope> = Vec::new();
        for _ in 0..200 {
            let mut outgoing = Vec::new();
            for msg in in_flight.drain(..) {
                nodes[msg.receiver as usize].handle_message(&msg, &mut rng, &mut outgoing);
            }
            for node in nodes.iter_mut() {
                node.tick(&mut rng, &mut outgoing);
            }
            in_flight = outgoing;

            for node in &nodes {
                assert_invariants(node);
            }
        }

        // answer everything still in flight, nobody opens a new exchange
        while !in_flight.is_empty() {
            let mut outgoing = Vec::new();
            for msg in in_flight.drain(..) {
                nodes[msg.receiver as usize].handle_message(&msg, &mut rng, &mut outgoing);
            }
            in_flight = outgoing;
        }

        assert!(nodes.iter().all(|n| !n.is_awaiting_reply()));
        assert!(nodes.iter().all(|n| n.evicted_candidate().is_none()));
        assert!(nodes.iter().all(|n| n.cache().num_tagged() == 0));

        let completed: usize = nodes.iter().map(|n| n.stats().shuffles_completed).sum();
        let started: usize = nodes.iter().map(|n| n.stats().shuffles_started).sum();
        let aborted: usize = nodes.iter().map(|n| n.stats().shuffles_aborted).sum();
        assert!(completed > 0);
        assert_eq!(started, completed + aborted);
    }
}
