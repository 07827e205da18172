// all the same numeric type of some size to allow casting/interop
pub type PeerId = u64;

/// Simulation cycle counter
pub type ShTime = u64;

/// Cache slot: a known neighbor plus the peer it was last offered to.
///
/// Two entries are equal when they reference the same neighbor; the
/// pending destination is bookkeeping and not part of the identity.
#[derive(Copy, Clone, Debug)]
pub struct PeerEntry {
    pub peer: PeerId,
    pub pending_destination: Option<PeerId>,
}

impl PeerEntry {
    pub fn new(peer: PeerId) -> Self {
        Self {
            peer,
            pending_destination: None,
        }
    }

    pub fn sent_to(peer: PeerId, destination: PeerId) -> Self {
        Self {
            peer,
            pending_destination: Some(destination),
        }
    }

    /// Copy of this entry with the tag removed
    pub fn untagged(&self) -> Self {
        Self::new(self.peer)
    }

    pub fn is_pending_for(&self, destination: PeerId) -> bool {
        self.pending_destination == Some(destination)
    }
}

impl PartialEq for PeerEntry {
    fn eq(&self, other: &Self) -> bool {
        self.peer == other.peer
    }
}

impl Eq for PeerEntry {}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum MessageKind {
    Request,
    Reply,
    Rejected,
}

impl MessageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageKind::Request => "request",
            MessageKind::Reply => "reply",
            MessageKind::Rejected => "rejected",
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ShuffleMessage {
    pub kind: MessageKind,
    pub origin: PeerId,
    pub payload: Vec<PeerEntry>,
}

impl ShuffleMessage {
    pub fn request(origin: PeerId, payload: Vec<PeerEntry>) -> Self {
        Self {
            kind: MessageKind::Request,
            origin,
            payload,
        }
    }

    pub fn reply(origin: PeerId, payload: Vec<PeerEntry>) -> Self {
        Self {
            kind: MessageKind::Reply,
            origin,
            payload,
        }
    }

    /// REJECTED never carries entries
    pub fn rejected(origin: PeerId) -> Self {
        Self {
            kind: MessageKind::Rejected,
            origin,
            payload: Vec::new(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct MessageEnvelope {
    pub sender: PeerId,
    pub receiver: PeerId,
    pub time: ShTime,
    pub message: ShuffleMessage,
}

/// Overlay-membership view over a node's cache, used by bootstrap code and
/// by anything that inspects the overlay graph.
pub trait Linkable {
    fn degree(&self) -> usize;

    fn neighbor_at(&self, i: usize) -> Option<PeerId>;

    /// Returns false if the peer is already known or the cache is full
    fn add_neighbor(&mut self, peer: PeerId) -> bool;

    fn contains(&self, peer: PeerId) -> bool;
}

// ============================================================================
// Event Logging System
// ============================================================================

/// Events emitted by the shuffle protocol for debugging and analysis
#[derive(Debug, Clone)]
pub enum Event {
    /// Node opened an exchange with a partner
    ShuffleStarted {
        partner: PeerId,
        offered: usize,
        evicted: bool,
    },
    /// Node answered a request from an idle state
    RequestAccepted { from_peer: PeerId, offered: usize },
    /// Node turned a request down because it has its own exchange running
    RequestRejected { from_peer: PeerId },
    /// Exchange opened by this node finished with a reply
    ShuffleCompleted {
        partner: PeerId,
        added: usize,
        swapped: usize,
        discarded: usize,
    },
    /// Exchange opened by this node was rejected by the partner
    ShuffleAborted { partner: PeerId, restored: bool },
    /// Reply or rejection that did not belong to an open exchange
    UnexpectedMessage { from_peer: PeerId, kind: &'static str },
}

/// Trait for consuming events from the shuffle protocol
pub trait EventSink {
    fn log(&mut self, round: ShTime, peer: PeerId, event: Event);
}

/// No-op event sink for production use (zero overhead)
pub struct NoOpSink;

impl EventSink for NoOpSink {
    #[inline(always)]
    fn log(&mut self, _round: ShTime, _peer: PeerId, _event: Event) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_equality_ignores_tag() {
        let a = PeerEntry::new(7);
        let b = PeerEntry::sent_to(7, 99);
        assert_eq!(a, b);
        assert_ne!(a, PeerEntry::new(8));
        assert!(b.is_pending_for(99));
        assert!(!b.untagged().is_pending_for(99));
    }

    #[test]
    fn test_rejected_has_empty_payload() {
        let msg = ShuffleMessage::rejected(3);
        assert_eq!(msg.kind, MessageKind::Rejected);
        assert_eq!(msg.origin, 3);
        assert!(msg.payload.is_empty());
    }
}
