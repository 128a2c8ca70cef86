//! Message values carried by links.
//!
//! There are exactly two kinds of traffic on the medium: application data and
//! jam bursts. The engine branches on [`Message::is_jam`] for collision and
//! backoff handling, so the set is closed.

use super::types::{Endpoint, StationId, TransceiverId};

/// Application payload sent from one station to another.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataMessage {
    valid: bool,
    payload: String,
    origin: StationId,
    destination: StationId,
    last: bool,
}

impl DataMessage {
    pub fn new(payload: impl Into<String>, origin: StationId, destination: StationId) -> Self {
        Self {
            valid: true,
            payload: payload.into(),
            origin,
            destination,
            last: false,
        }
    }

    /// Placeholder held by a station before it has received anything.
    pub fn placeholder(station: StationId) -> Self {
        Self {
            valid: false,
            payload: String::new(),
            origin: station,
            destination: station,
            last: false,
        }
    }
}

/// Collision notification. Always valid and always final.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JamMessage {
    origin: TransceiverId,
}

impl JamMessage {
    pub fn new(origin: TransceiverId) -> Self {
        Self { origin }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    Data(DataMessage),
    Jam(JamMessage),
}

impl Message {
    pub fn data(payload: impl Into<String>, origin: StationId, destination: StationId) -> Self {
        Message::Data(DataMessage::new(payload, origin, destination))
    }

    pub fn jam(origin: TransceiverId) -> Self {
        Message::Jam(JamMessage::new(origin))
    }

    pub fn is_valid(&self) -> bool {
        match self {
            Message::Data(m) => m.valid,
            Message::Jam(_) => true,
        }
    }

    /// Marks the message as corrupted. There is no way back.
    pub fn invalidate(&mut self) {
        if let Message::Data(m) = self {
            m.valid = false;
        }
    }

    pub fn origin(&self) -> Endpoint {
        match self {
            Message::Data(m) => Endpoint::Station(m.origin),
            Message::Jam(m) => Endpoint::Transceiver(m.origin),
        }
    }

    /// Destination station; jams have none.
    pub fn destination(&self) -> Option<StationId> {
        match self {
            Message::Data(m) => Some(m.destination),
            Message::Jam(_) => None,
        }
    }

    pub fn payload(&self) -> &str {
        match self {
            Message::Data(m) => &m.payload,
            Message::Jam(_) => "",
        }
    }

    pub fn is_jam(&self) -> bool {
        matches!(self, Message::Jam(_))
    }

    /// Whether this copy is the last tick of a transmission.
    pub fn is_final(&self) -> bool {
        match self {
            Message::Data(m) => m.last,
            Message::Jam(_) => true,
        }
    }

    pub fn mark_final(&mut self) {
        if let Message::Data(m) = self {
            m.last = true;
        }
    }
}

impl From<DataMessage> for Message {
    fn from(m: DataMessage) -> Self {
        Message::Data(m)
    }
}
