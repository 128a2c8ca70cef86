//! Leaf station attached to a single transceiver.

use std::collections::VecDeque;

use super::message::{DataMessage, Message};
use super::types::{DEFAULT_STATION_QUEUE_CAPACITY, LinkId, StationId};

#[derive(Debug)]
pub struct Station {
    id: StationId,
    link: LinkId,
    capacity: usize,
    queue: VecDeque<Message>,
    last_received: Message,
}

impl Station {
    pub(crate) fn new(id: StationId, link: LinkId, capacity: usize) -> Self {
        Self {
            id,
            link,
            capacity,
            queue: VecDeque::with_capacity(capacity.min(DEFAULT_STATION_QUEUE_CAPACITY)),
            last_received: DataMessage::placeholder(id).into(),
        }
    }

    pub fn id(&self) -> StationId {
        self.id
    }

    pub fn link(&self) -> LinkId {
        self.link
    }

    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// The last completed message, or an invalid placeholder.
    pub fn last_received(&self) -> &Message {
        &self.last_received
    }

    /// Queue `message` for sending. Returns `false` when the queue is full and
    /// the message was dropped.
    pub fn enqueue(&mut self, message: Message) -> bool {
        if self.queue.len() >= self.capacity {
            log::warn!("({}) outbound queue full ({}), dropping {:?}", self.id, self.capacity, message.payload());
            return false;
        }
        self.queue.push_back(message);
        true
    }

    /// Decision-phase tick. Hands back the message to put on the link, if the
    /// medium is free and something is waiting.
    pub(crate) fn tick(&mut self, medium_busy: bool) -> Option<Message> {
        if medium_busy {
            return None;
        }
        self.queue.pop_front()
    }

    /// Returns whether the message was kept. Only final fragments count.
    pub(crate) fn on_receive(&mut self, message: Message) -> bool {
        if !message.is_final() {
            return false;
        }
        self.last_received = message;
        true
    }
}
