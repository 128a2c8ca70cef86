//! Bounded record of protocol events with running totals.

use std::collections::VecDeque;

use super::instrumentation::SimulationEvent;

/// Maximum number of events kept.
pub const HISTORY_CAPACITY: usize = 1000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventRecord {
    pub tick: u64,
    pub event: SimulationEvent,
}

/// Counters over the whole run, unaffected by history eviction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Totals {
    pub transmissions_started: u64,
    pub transmissions_completed: u64,
    pub jams_detected: u64,
    pub collisions_during_transmit: u64,
    pub station_queued: u64,
    pub station_received: u64,
}

#[derive(Debug, Default)]
pub struct EventHistory {
    records: VecDeque<EventRecord>,
    totals: Totals,
}

impl EventHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Push an event, popping the oldest if at capacity.
    pub fn record(&mut self, tick: u64, event: &SimulationEvent) {
        match event {
            SimulationEvent::BeginTransmit { .. } => self.totals.transmissions_started += 1,
            SimulationEvent::EndTransmit { .. } => self.totals.transmissions_completed += 1,
            SimulationEvent::JamDetected { .. } => self.totals.jams_detected += 1,
            SimulationEvent::CollisionDuringTransmit { .. } => self.totals.collisions_during_transmit += 1,
            SimulationEvent::StationQueued { .. } => self.totals.station_queued += 1,
            SimulationEvent::StationReceived { .. } => self.totals.station_received += 1,
        }

        if self.records.len() >= HISTORY_CAPACITY {
            self.records.pop_front();
        }
        self.records.push_back(EventRecord { tick, event: event.clone() });
    }

    pub fn records(&self) -> impl Iterator<Item = &EventRecord> {
        self.records.iter()
    }

    pub fn totals(&self) -> Totals {
        self.totals
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
