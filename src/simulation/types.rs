//! Identifiers, endpoints and scheduling phases shared by the simulation.
//!
//! Ids are arena indices handed out by [`Simulation`](super::Simulation) at
//! construction time, so two simulations built the same way get the same ids.

use std::fmt;

/// Default starting value of a transceiver's backoff range.
pub const DEFAULT_BACKOFF_RANGE: u32 = 20;
/// Default number of ticks a transceiver spends sending one message.
pub const DEFAULT_TRANSMIT_TICKS: u32 = 50;
/// Default length of a jam burst after a detected collision.
pub const DEFAULT_JAM_TICKS: u32 = 5;
/// Default depth of a station's outbound queue.
pub const DEFAULT_STATION_QUEUE_CAPACITY: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TransceiverId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StationId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LinkId(pub u32);

impl TransceiverId {
    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

impl StationId {
    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

impl LinkId {
    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for TransceiverId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "T{}", self.0)
    }
}

impl fmt::Display for StationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "D{}", self.0)
    }
}

impl fmt::Display for LinkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "L{}", self.0)
    }
}

/// One side of a link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    Transceiver(TransceiverId),
    Station(StationId),
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Endpoint::Transceiver(id) => id.fmt(f),
            Endpoint::Station(id) => id.fmt(f),
        }
    }
}

/// Scheduling phase of a component. Every propagation-phase component ticks
/// before any decision-phase component within the same tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Propagation,
    Decision,
}

/// A tickable component registered with the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Component {
    Link(LinkId),
    Transceiver(TransceiverId),
    Station(StationId),
}

impl Component {
    /// The phase this component declares for itself.
    pub fn phase(&self) -> Phase {
        match self {
            Component::Link(_) => Phase::Propagation,
            Component::Transceiver(_) | Component::Station(_) => Phase::Decision,
        }
    }
}
