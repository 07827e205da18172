use std::collections::VecDeque;

use crate::sh_interface::{PeerEntry, PeerId};

/// Bounded, ordered view of known neighbors.
///
/// Holds at most `capacity` entries, never two entries for the same peer and
/// never an entry for `owner`. Order is insertion order except where an
/// entry is overwritten in place.
#[derive(Debug, Clone)]
pub struct PeerCache {
    owner: PeerId,
    entries: Vec<PeerEntry>,
    capacity: usize,
}

impl PeerCache {
    pub fn new(owner: PeerId, capacity: usize) -> Self {
        Self {
            owner,
            entries: Vec::with_capacity(capacity),
            capacity,
        }
    }

    pub fn owner(&self) -> PeerId {
        self.owner
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn is_full(&self) -> bool {
        self.entries.len() >= self.capacity
    }

    pub fn contains(&self, peer: PeerId) -> bool {
        self.position(peer).is_some()
    }

    pub fn position(&self, peer: PeerId) -> Option<usize> {
        self.entries.iter().position(|e| e.peer == peer)
    }

    pub fn get(&self, i: usize) -> Option<&PeerEntry> {
        self.entries.get(i)
    }

    pub fn iter(&self) -> impl Iterator<Item = &PeerEntry> {
        self.entries.iter()
    }

    pub fn peers(&self) -> Vec<PeerId> {
        self.entries.iter().map(|e| e.peer).collect()
    }

    /// Could `peer` be stored here at all (ignoring capacity)?
    pub fn accepts(&self, peer: PeerId) -> bool {
        peer != self.owner && !self.contains(peer)
    }

    /// Append an untagged copy of `entry`.
    /// Returns false if already present, at capacity or the owner itself.
    pub fn add(&mut self, entry: PeerEntry) -> bool {
        if self.is_full() || !self.accepts(entry.peer) {
            return false;
        }
        self.entries.push(entry.untagged());
        true
    }

    pub fn remove_at(&mut self, i: usize) -> Option<PeerEntry> {
        if i < self.entries.len() {
            Some(self.entries.remove(i))
        } else {
            None
        }
    }

    /// Overwrite slot `i` with an untagged copy of `entry`.
    ///
    /// Refused if `i` is out of range or the new peer would duplicate another
    /// slot (or be the owner). Re-writing a slot with its own peer is fine.
    pub fn replace_at(&mut self, i: usize, entry: PeerEntry) -> bool {
        if i >= self.entries.len() || entry.peer == self.owner {
            return false;
        }
        if let Some(existing) = self.position(entry.peer) {
            if existing != i {
                return false;
            }
        }
        self.entries[i] = entry.untagged();
        true
    }

    pub fn clear_tags(&mut self) {
        for entry in &mut self.entries {
            entry.pending_destination = None;
        }
    }

    /// Tag the entries for `peers` as offered to `destination`
    pub fn mark_sent(&mut self, peers: &[PeerEntry], destination: PeerId) {
        for entry in &mut self.entries {
            if peers.iter().any(|p| p.peer == entry.peer) {
                entry.pending_destination = Some(destination);
            }
        }
    }

    /// Slots that were offered to `sender`, in cache order
    pub fn swap_candidates(&self, sender: PeerId) -> VecDeque<usize> {
        self.entries
            .iter()
            .enumerate()
            .filter(|(_, e)| e.is_pending_for(sender))
            .map(|(i, _)| i)
            .collect()
    }

    pub fn num_tagged(&self) -> usize {
        self.entries
            .iter()
            .filter(|e| e.pending_destination.is_some())
            .count()
    }
}
