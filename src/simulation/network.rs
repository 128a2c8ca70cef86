//! Scheduler and topology owner.
//!
//! Each tick runs in two phases:
//! 1) Propagation: every link advances its traffic one stage, resolves
//!    collisions and hands arrivals to the endpoint at that end.
//! 2) Decision: every transceiver and station, in registration order, looks at
//!    what arrived and decides what to put on the medium next.
//!
//! No decision-phase component starts before every link has propagated, so a
//! message can never move more than one stage, or be sent and delivered, within
//! the same tick.

use std::fmt;

use rand::SeedableRng;
use rand::rngs::StdRng;

use crate::control::config::SimulationConfig;

use super::history::EventHistory;
use super::instrumentation::{Instrumentation, SimulationEvent};
use super::link::{Delivery, Link};
use super::medium::{Probe, sensed};
use super::message::Message;
use super::station::Station;
use super::transceiver::{TimingParameters, Transceiver};
use super::types::{Component, Endpoint, LinkId, Phase, StationId, TransceiverId};

/// Rejected topology edits. The topology is left untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TopologyError {
    UnknownTransceiver(TransceiverId),
    UnknownStation(StationId),
    StationAlreadyAttached(TransceiverId),
    ZeroWeight,
}

impl fmt::Display for TopologyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TopologyError::UnknownTransceiver(id) => write!(f, "Unknown transceiver: {}", id),
            TopologyError::UnknownStation(id) => write!(f, "Unknown station: {}", id),
            TopologyError::StationAlreadyAttached(id) => write!(f, "Transceiver {} already has a station", id),
            TopologyError::ZeroWeight => write!(f, "Link weight must be at least 1"),
        }
    }
}

impl std::error::Error for TopologyError {}

pub struct Simulation {
    timing: TimingParameters,
    station_queue_capacity: usize,
    links: Vec<Link>,
    pub(crate) transceivers: Vec<Transceiver>,
    stations: Vec<Station>,
    propagation: Vec<Component>,
    decision: Vec<Component>,
    instrumentation: Instrumentation,
    history: EventHistory,
    rng: StdRng,
    now: u64,
}

impl Simulation {
    pub fn new(config: &SimulationConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            timing: config.timing(),
            station_queue_capacity: config.station_queue_capacity.max(1),
            links: Vec::new(),
            transceivers: Vec::new(),
            stations: Vec::new(),
            propagation: Vec::new(),
            decision: Vec::new(),
            instrumentation: Instrumentation::default(),
            history: EventHistory::new(),
            rng,
            now: 0,
        }
    }

    /// Number of completed ticks.
    pub fn now(&self) -> u64 {
        self.now
    }

    pub fn instrumentation_mut(&mut self) -> &mut Instrumentation {
        &mut self.instrumentation
    }

    pub fn history(&self) -> &EventHistory {
        &self.history
    }

    pub fn transceiver(&self, id: TransceiverId) -> Option<&Transceiver> {
        self.transceivers.get(id.index())
    }

    pub fn station(&self, id: StationId) -> Option<&Station> {
        self.stations.get(id.index())
    }

    pub fn link(&self, id: LinkId) -> Option<&Link> {
        self.links.get(id.index())
    }

    pub fn transceivers(&self) -> &[Transceiver] {
        &self.transceivers
    }

    pub fn stations(&self) -> &[Station] {
        &self.stations
    }

    pub fn links(&self) -> &[Link] {
        &self.links
    }

    /// Append `component` to the list of its declared phase.
    fn register(&mut self, component: Component) {
        match component.phase() {
            Phase::Propagation => self.propagation.push(component),
            Phase::Decision => self.decision.push(component),
        }
    }

    /// Decision-phase components in registration order.
    pub fn decision_order(&self) -> &[Component] {
        &self.decision
    }

    fn add_link(&mut self, a: Endpoint, b: Endpoint, weight: u32) -> LinkId {
        let id = LinkId(self.links.len() as u32);
        self.links.push(Link::new(id, a, b, weight));
        self.register(Component::Link(id));
        id
    }

    /// Create a transceiver with no links.
    pub fn create_transceiver(&mut self) -> TransceiverId {
        let id = TransceiverId(self.transceivers.len() as u32);
        self.transceivers.push(Transceiver::new(id, self.timing));
        self.register(Component::Transceiver(id));
        log::debug!("({}) created", id);
        id
    }

    /// Create a transceiver joined to `parent` by a new link of `weight` ticks.
    pub fn attach_transceiver(&mut self, parent: TransceiverId, weight: u32) -> Result<(TransceiverId, LinkId), TopologyError> {
        if self.transceiver(parent).is_none() {
            return Err(TopologyError::UnknownTransceiver(parent));
        }
        if weight == 0 {
            return Err(TopologyError::ZeroWeight);
        }

        let child = self.create_transceiver();
        let link = self.add_link(Endpoint::Transceiver(parent), Endpoint::Transceiver(child), weight);
        self.transceivers[parent.index()].attach_link(link);
        self.transceivers[child.index()].attach_link(link);
        log::debug!("({}) attached to {} over {} (weight {})", child, parent, link, weight);
        Ok((child, link))
    }

    /// Create a station on `transceiver`. A transceiver carries at most one.
    pub fn attach_station(&mut self, transceiver: TransceiverId, weight: u32) -> Result<(StationId, LinkId), TopologyError> {
        let Some(t) = self.transceiver(transceiver) else {
            return Err(TopologyError::UnknownTransceiver(transceiver));
        };
        if t.station().is_some() {
            log::warn!("({}) already has a station, ignoring attach", transceiver);
            return Err(TopologyError::StationAlreadyAttached(transceiver));
        }
        if weight == 0 {
            return Err(TopologyError::ZeroWeight);
        }

        let id = StationId(self.stations.len() as u32);
        let link = self.add_link(Endpoint::Transceiver(transceiver), Endpoint::Station(id), weight);
        self.stations.push(Station::new(id, link, self.station_queue_capacity));
        self.register(Component::Station(id));
        self.transceivers[transceiver.index()].attach_station(id, link);
        log::debug!("({}) attached to {} over {} (weight {})", id, transceiver, link, weight);
        Ok((id, link))
    }

    /// Queue a message at `station`. `Ok(false)` means the queue was full and
    /// the message was dropped.
    pub fn enqueue(&mut self, station: StationId, payload: impl Into<String>, destination: StationId) -> Result<bool, TopologyError> {
        let s = self.stations.get_mut(station.index()).ok_or(TopologyError::UnknownStation(station))?;
        Ok(s.enqueue(Message::data(payload, station, destination)))
    }

    /// Whether `endpoint` senses traffic coming at it through `link`.
    pub fn carrier_sensed(&self, link: LinkId, endpoint: Endpoint) -> bool {
        sensed(&self.links, &self.transceivers, link, endpoint, Probe::Carrier)
    }

    /// Whether the segment behind `link`, as seen from `endpoint`, is resetting.
    pub fn reset_sensed(&self, link: LinkId, endpoint: Endpoint) -> bool {
        sensed(&self.links, &self.transceivers, link, endpoint, Probe::Reset)
    }

    pub fn station_carrier_sensed(&self, station: StationId) -> bool {
        self.station(station)
            .is_some_and(|s| self.carrier_sensed(s.link(), Endpoint::Station(station)))
    }

    /// Advance one discrete time unit.
    pub fn tick(&mut self) {
        self.propagate();
        self.decide();
        self.now += 1;
    }

    pub(crate) fn propagate(&mut self) {
        log::trace!("tick {}: propagation", self.now + 1);
        for i in 0..self.propagation.len() {
            let Component::Link(id) = self.propagation[i] else {
                continue;
            };
            let deliveries = self.links[id.index()].tick();
            for delivery in deliveries {
                self.deliver(delivery);
            }
        }
    }

    pub(crate) fn decide(&mut self) {
        log::trace!("tick {}: decision", self.now + 1);
        for i in 0..self.decision.len() {
            match self.decision[i] {
                Component::Transceiver(id) => self.tick_transceiver(id),
                Component::Station(id) => self.tick_station(id),
                Component::Link(_) => {}
            }
        }
    }

    fn deliver(&mut self, delivery: Delivery) {
        let Delivery { link, to, from, message } = delivery;
        log::trace!("{}: {} -> {}, valid {}", link, from, to, message.is_valid());
        match to {
            Endpoint::Transceiver(id) => self.transceivers[id.index()].on_receive(message, link),
            Endpoint::Station(id) => self.receive_at_station(id, message),
        }
    }

    fn receive_at_station(&mut self, station: StationId, message: Message) {
        if self.stations[station.index()].on_receive(message.clone()) {
            self.emit(SimulationEvent::StationReceived { station, message });
        }
    }

    fn tick_transceiver(&mut self, id: TransceiverId) {
        let output = self.transceivers[id.index()].tick(&mut self.rng);
        for (link, message) in output.injections {
            self.links[link.index()].inject(message, Endpoint::Transceiver(id));
        }
        for event in output.events {
            self.emit(event);
        }
        for (station, message) in output.deliveries {
            self.receive_at_station(station, message);
        }
    }

    fn tick_station(&mut self, id: StationId) {
        let station = &self.stations[id.index()];
        if station.queued() == 0 {
            return;
        }
        let link = station.link();
        let endpoint = Endpoint::Station(id);
        let busy = self.carrier_sensed(link, endpoint) || self.reset_sensed(link, endpoint);

        if let Some(message) = self.stations[id.index()].tick(busy) {
            self.links[link.index()].inject(message.clone(), endpoint);
            self.emit(SimulationEvent::StationQueued { station: id, message });
        }
    }

    fn emit(&mut self, event: SimulationEvent) {
        log::debug!("[{}] {}", self.now + 1, event);
        self.history.record(self.now + 1, &event);
        self.instrumentation.dispatch(&event);
    }
}
