//! Protocol events and optional observer callbacks.
//!
//! Components report what happened as [`SimulationEvent`]s; the scheduler
//! forwards each one to the matching callback during the decision phase. Any
//! callback that was never set is skipped.

use std::fmt;

use super::message::Message;
use super::types::{StationId, TransceiverId};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SimulationEvent {
    /// A transceiver started sending the head of its queue.
    BeginTransmit { transceiver: TransceiverId, message: Message },
    /// A transceiver finished sending and dequeued the message.
    EndTransmit { transceiver: TransceiverId, message: Message },
    /// A transceiver heard overlapping traffic and started a jam burst.
    JamDetected { transceiver: TransceiverId },
    /// A jam arrived while the transceiver was sending; the send was aborted.
    CollisionDuringTransmit { transceiver: TransceiverId, backoff_range: u32 },
    /// A station handed a message to its transceiver.
    StationQueued { station: StationId, message: Message },
    /// A station stored a completed message.
    StationReceived { station: StationId, message: Message },
}

impl fmt::Display for SimulationEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SimulationEvent::BeginTransmit { transceiver, message } => {
                write!(f, "({}) begin transmit {:?}", transceiver, message.payload())
            }
            SimulationEvent::EndTransmit { transceiver, message } => {
                write!(f, "({}) end transmit {:?}", transceiver, message.payload())
            }
            SimulationEvent::JamDetected { transceiver } => write!(f, "({}) jam detected", transceiver),
            SimulationEvent::CollisionDuringTransmit { transceiver, backoff_range } => {
                write!(f, "({}) collision during transmit, backoff range {}", transceiver, backoff_range)
            }
            SimulationEvent::StationQueued { station, message } => {
                write!(f, "({}) queued {:?}", station, message.payload())
            }
            SimulationEvent::StationReceived { station, message } => {
                write!(f, "({}) received {:?}, valid {}", station, message.payload(), message.is_valid())
            }
        }
    }
}

type TransmitHook = Box<dyn FnMut(TransceiverId, &Message)>;
type JamHook = Box<dyn FnMut(TransceiverId)>;
type CollisionHook = Box<dyn FnMut(TransceiverId, u32)>;
type StationHook = Box<dyn FnMut(StationId, &Message)>;

/// Observer callbacks, one slot per event kind.
#[derive(Default)]
pub struct Instrumentation {
    begin_transmit: Option<TransmitHook>,
    end_transmit: Option<TransmitHook>,
    jam_detected: Option<JamHook>,
    collision_during_transmit: Option<CollisionHook>,
    station_queued: Option<StationHook>,
    station_received: Option<StationHook>,
}

impl Instrumentation {
    pub fn on_begin_transmit(&mut self, f: impl FnMut(TransceiverId, &Message) + 'static) -> &mut Self {
        self.begin_transmit = Some(Box::new(f));
        self
    }

    pub fn on_end_transmit(&mut self, f: impl FnMut(TransceiverId, &Message) + 'static) -> &mut Self {
        self.end_transmit = Some(Box::new(f));
        self
    }

    pub fn on_jam_detected(&mut self, f: impl FnMut(TransceiverId) + 'static) -> &mut Self {
        self.jam_detected = Some(Box::new(f));
        self
    }

    /// Called with the transceiver and its backoff range after doubling.
    pub fn on_collision_during_transmit(&mut self, f: impl FnMut(TransceiverId, u32) + 'static) -> &mut Self {
        self.collision_during_transmit = Some(Box::new(f));
        self
    }

    pub fn on_station_queued(&mut self, f: impl FnMut(StationId, &Message) + 'static) -> &mut Self {
        self.station_queued = Some(Box::new(f));
        self
    }

    pub fn on_station_received(&mut self, f: impl FnMut(StationId, &Message) + 'static) -> &mut Self {
        self.station_received = Some(Box::new(f));
        self
    }

    pub(crate) fn dispatch(&mut self, event: &SimulationEvent) {
        match event {
            SimulationEvent::BeginTransmit { transceiver, message } => {
                if let Some(hook) = self.begin_transmit.as_mut() {
                    hook(*transceiver, message);
                }
            }
            SimulationEvent::EndTransmit { transceiver, message } => {
                if let Some(hook) = self.end_transmit.as_mut() {
                    hook(*transceiver, message);
                }
            }
            SimulationEvent::JamDetected { transceiver } => {
                if let Some(hook) = self.jam_detected.as_mut() {
                    hook(*transceiver);
                }
            }
            SimulationEvent::CollisionDuringTransmit { transceiver, backoff_range } => {
                if let Some(hook) = self.collision_during_transmit.as_mut() {
                    hook(*transceiver, *backoff_range);
                }
            }
            SimulationEvent::StationQueued { station, message } => {
                if let Some(hook) = self.station_queued.as_mut() {
                    hook(*station, message);
                }
            }
            SimulationEvent::StationReceived { station, message } => {
                if let Some(hook) = self.station_received.as_mut() {
                    hook(*station, message);
                }
            }
        }
    }
}
