//! Discrete-time CSMA/CD network simulation core.
//!
//! The network is a set of transceivers joined by weighted links, with at most
//! one station hanging off each transceiver. Everything is advanced by a single
//! scheduler in two phases per tick.
//!
//! ## Module Organization
//!
//! - `types`: Ids, endpoints, components and protocol defaults
//! - `message`: Data frames and jam signals
//! - `link`: Staged, bidirectional propagation with collision corruption
//! - `medium`: Carrier and reset sensing across a segment
//! - `transceiver`: The MAC state machine of a node
//! - `station`: Leaf message source and sink
//! - `instrumentation`: Callback hooks for protocol events
//! - `history`: Bounded event history and totals
//! - `network`: The scheduler and topology builder

pub mod history;
pub mod instrumentation;
pub mod link;
pub mod medium;
pub mod message;
pub mod network;
pub mod station;
pub mod transceiver;
pub mod types;

pub use instrumentation::{Instrumentation, SimulationEvent};
pub use message::Message;
pub use network::{Simulation, TopologyError};
pub use transceiver::TimingParameters;
pub use types::{Endpoint, LinkId, StationId, TransceiverId};
