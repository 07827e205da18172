//! # shuffleRust - Basic Shuffle Peer Sampling
//!
//! A Rust implementation of the basic shuffling membership protocol: every peer
//! keeps a small bounded cache of neighbors and periodically swaps part of it
//! with one random neighbor, which keeps the overlay connected and well mixed
//! under churn without any peer needing global knowledge.
//!
//! ## Core Components
//!
//! - **ShuffleNode**: Per-node protocol driver (tick + message handling)
//! - **PeerCache**: Bounded neighbor cache with offer tagging
//! - **select_subset**: Random subset selection for an exchange
//! - **merge**: Cache reconciliation of a received subset
//! - **OverlayGraph**: Statistics over the overlay formed by all caches
//!
//! ## Usage with a Scheduler
//!
//! The library contains no transport and no clock. You need to:
//! 1. Create a ShuffleNode per peer and seed its cache via `add_neighbor`
//! 2. Call `node.tick()` once per cycle
//! 3. Route every produced MessageEnvelope to its receiver
//! 4. Call `node.handle_message()` as messages arrive
//!
//! ```
//! use shuffle_rust::{Linkable, ShuffleConfig, ShuffleNode};
//! use rand::rngs::StdRng;
//! use rand::SeedableRng;
//!
//! let mut rng = StdRng::seed_from_u64(1);
//! let mut a = ShuffleNode::new(1, ShuffleConfig::new(5, 3)).unwrap();
//! let mut b = ShuffleNode::new(2, ShuffleConfig::new(5, 3)).unwrap();
//! a.add_neighbor(2);
//!
//! let mut outgoing = Vec::new();
//! a.tick(&mut rng, &mut outgoing);
//!
//! let mut replies = Vec::new();
//! for msg in &outgoing {
//!     b.handle_message(msg, &mut rng, &mut replies);
//! }
//! for msg in &replies {
//!     a.handle_message(msg, &mut rng, &mut Vec::new());
//! }
//!
//! assert!(b.contains(1));
//! assert!(!a.is_awaiting_reply());
//! ```
//!
//! ## Testing and Simulation
//!
//! For running the protocol on a simulated network, see the `simulator/`
//! directory. It provides bootstrap topologies, churn events, graph statistics
//! and YAML scenarios.

pub mod sh_cache;
pub mod sh_config;
pub mod sh_graph;
pub mod sh_interface;
pub mod sh_node;
pub mod sh_reconcile;
pub mod sh_subset;

// Re-export commonly used types
pub use sh_cache::PeerCache;
pub use sh_config::{ConfigError, ShuffleConfig};
pub use sh_graph::{OverlayGraph, Summary};
pub use sh_interface::{
    Event, EventSink, Linkable, MessageEnvelope, MessageKind, NoOpSink, PeerEntry, PeerId,
    ShTime, ShuffleMessage,
};
pub use sh_node::{ShuffleNode, ShuffleState, ShuffleStats};
pub use sh_reconcile::{merge, MergeOutcome};
pub use sh_subset::select_subset;
