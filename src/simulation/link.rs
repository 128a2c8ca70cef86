//! Half-duplex medium between two endpoints.
//!
//! A link of weight `w` has stages `0..=w`. Traffic injected from endpoint A
//! starts at stage 0 and moves up; traffic from endpoint B starts at stage `w`
//! and moves down. Each propagation tick advances every entry one stage and hands
//! entries that reach an end to that endpoint.
//!
//! Collisions are resolved per stage:
//! - two entries injected into the same starting stage in the same tick corrupt
//!   each other immediately;
//! - an entry whose next stage, or the stage after it, is held by traffic moving
//!   the other way is corrupted before it moves. This catches entries that are
//!   about to swap stages as well as entries that are about to meet.

use std::collections::HashMap;

use super::message::Message;
use super::types::{Endpoint, LinkId};

/// Direction of travel along a link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// From endpoint A toward endpoint B (+1).
    AtoB,
    /// From endpoint B toward endpoint A (-1).
    BtoA,
}

impl Direction {
    pub fn step(self) -> i64 {
        match self {
            Direction::AtoB => 1,
            Direction::BtoA => -1,
        }
    }
}

/// A message in flight together with its position on the link.
#[derive(Debug, Clone)]
pub struct InFlight {
    pub message: Message,
    pub stage: u32,
    pub direction: Direction,
}

/// A message that reached an end of the link during a propagation tick.
#[derive(Debug, Clone)]
pub struct Delivery {
    pub link: LinkId,
    pub to: Endpoint,
    /// The endpoint at the other end, recorded as the sender.
    pub from: Endpoint,
    pub message: Message,
}

/// What a stage looked like before the entries moved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Occupancy {
    Moving(Direction),
    Conflicting,
}

#[derive(Debug)]
pub struct Link {
    id: LinkId,
    a: Endpoint,
    b: Endpoint,
    weight: u32,
    entries: Vec<InFlight>,
    // Snapshot of the last propagation tick, read during the decision phase.
    toward_a: bool,
    toward_b: bool,
}

impl Link {
    pub(crate) fn new(id: LinkId, a: Endpoint, b: Endpoint, weight: u32) -> Self {
        Self {
            id,
            a,
            b,
            weight: weight.max(1),
            entries: Vec::new(),
            toward_a: false,
            toward_b: false,
        }
    }

    pub fn id(&self) -> LinkId {
        self.id
    }

    pub fn endpoints(&self) -> (Endpoint, Endpoint) {
        (self.a, self.b)
    }

    pub fn weight(&self) -> u32 {
        self.weight
    }

    /// Entries currently on the medium, in injection order.
    pub fn entries(&self) -> &[InFlight] {
        &self.entries
    }

    pub fn connects(&self, endpoint: Endpoint) -> bool {
        self.a == endpoint || self.b == endpoint
    }

    /// The endpoint across the link from `endpoint`, if `endpoint` is attached.
    pub fn opposite(&self, endpoint: Endpoint) -> Option<Endpoint> {
        if endpoint == self.a {
            Some(self.b)
        } else if endpoint == self.b {
            Some(self.a)
        } else {
            None
        }
    }

    /// Whether traffic was moving toward `endpoint` during the last propagation
    /// tick. Only covers this link; the transitive query lives in `medium`.
    pub fn carries_toward(&self, endpoint: Endpoint) -> bool {
        if endpoint == self.a {
            self.toward_a
        } else if endpoint == self.b {
            self.toward_b
        } else {
            false
        }
    }

    /// Put `message` on the link at `from`'s end.
    pub(crate) fn inject(&mut self, mut message: Message, from: Endpoint) {
        let (direction, start) = if from == self.a {
            (Direction::AtoB, 0)
        } else if from == self.b {
            (Direction::BtoA, self.weight)
        } else {
            log::warn!("{} is not attached to {}, dropping injected message", from, self.id);
            return;
        };

        for existing in self.entries.iter_mut().filter(|e| e.stage == start) {
            log::trace!("{}: injection collision at stage {}", self.id, start);
            existing.message.invalidate();
            message.invalidate();
        }

        self.entries.push(InFlight { message, stage: start, direction });
    }

    /// Propagation-phase tick. Returns deliveries in injection order.
    pub(crate) fn tick(&mut self) -> Vec<Delivery> {
        let mut occupancy: HashMap<i64, Occupancy> = HashMap::new();
        for entry in &self.entries {
            occupancy
                .entry(entry.stage as i64)
                .and_modify(|o| {
                    if *o != Occupancy::Moving(entry.direction) {
                        *o = Occupancy::Conflicting;
                    }
                })
                .or_insert(Occupancy::Moving(entry.direction));
        }

        for entry in self.entries.iter_mut() {
            if !entry.message.is_valid() {
                continue;
            }
            let direction = entry.direction;
            let opposed = |stage: i64| occupancy.get(&stage).is_some_and(|o| *o != Occupancy::Moving(direction));

            let stage = entry.stage as i64;
            // Swap: the next stage holds traffic moving the other way.
            // Meet: the stage after that does.
            if opposed(stage + direction.step()) || opposed(stage + 2 * direction.step()) {
                log::trace!("{}: collision ahead of stage {}", self.id, stage);
                entry.message.invalidate();
            }
        }

        self.toward_a = false;
        self.toward_b = false;

        let mut deliveries = Vec::new();
        let mut remaining = Vec::with_capacity(self.entries.len());
        for mut entry in std::mem::take(&mut self.entries) {
            match entry.direction {
                Direction::BtoA => self.toward_a = true,
                Direction::AtoB => self.toward_b = true,
            }

            let stage = entry.stage as i64 + entry.direction.step();
            if stage <= 0 {
                deliveries.push(Delivery {
                    link: self.id,
                    to: self.a,
                    from: self.b,
                    message: entry.message,
                });
            } else if stage >= self.weight as i64 {
                deliveries.push(Delivery {
                    link: self.id,
                    to: self.b,
                    from: self.a,
                    message: entry.message,
                });
            } else {
                entry.stage = stage as u32;
                remaining.push(entry);
            }
        }
        self.entries = remaining;

        deliveries
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulation::types::{StationId, TransceiverId};
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    const A: Endpoint = Endpoint::Transceiver(TransceiverId(0));
    const B: Endpoint = Endpoint::Transceiver(TransceiverId(1));

    fn data(payload: &str) -> Message {
        Message::data(payload, StationId(0), StationId(1))
    }

    #[test]
    fn message_crosses_link_after_weight_ticks() {
        let mut link = Link::new(LinkId(0), A, B, 3);
        link.inject(data("x"), A);

        assert!(link.tick().is_empty());
        assert!(link.tick().is_empty());
        let deliveries = link.tick();

        assert_eq!(deliveries.len(), 1);
        assert_eq!(deliveries[0].to, B);
        assert_eq!(deliveries[0].from, A);
        assert!(deliveries[0].message.is_valid());
        assert!(link.entries().is_empty());
    }

    #[test]
    fn injection_from_b_travels_toward_a() {
        let mut link = Link::new(LinkId(0), A, B, 2);
        link.inject(data("y"), B);
        assert_eq!(link.entries()[0].stage, 2);
        assert_eq!(link.entries()[0].direction, Direction::BtoA);

        link.tick();
        assert!(link.carries_toward(A));
        assert!(!link.carries_toward(B));

        let deliveries = link.tick();
        assert_eq!(deliveries.len(), 1);
        assert_eq!(deliveries[0].to, A);
        assert_eq!(deliveries[0].from, B);
    }

    #[test]
    fn same_stage_injection_corrupts_both() {
        let mut link = Link::new(LinkId(0), A, B, 4);
        link.inject(data("first"), A);
        link.inject(data("second"), A);

        assert!(link.entries().iter().all(|e| !e.message.is_valid()));
    }

    #[test]
    fn head_on_traffic_is_corrupted_and_delivered_once() {
        let mut link = Link::new(LinkId(0), A, B, 4);
        link.inject(data("from a"), A);
        link.inject(data("from b"), B);

        let mut deliveries = Vec::new();
        for _ in 0..4 {
            deliveries.extend(link.tick());
        }

        assert_eq!(deliveries.len(), 2);
        assert!(deliveries.iter().all(|d| !d.message.is_valid()));
        assert_eq!(deliveries.iter().filter(|d| d.to == A).count(), 1);
        assert_eq!(deliveries.iter().filter(|d| d.to == B).count(), 1);
        assert!(link.entries().is_empty());
    }

    #[test]
    fn adjacent_entries_about_to_swap_collide() {
        let mut link = Link::new(LinkId(0), A, B, 1);
        link.inject(data("a"), A);
        link.inject(data("b"), B);

        let deliveries = link.tick();
        assert_eq!(deliveries.len(), 2);
        assert!(deliveries.iter().all(|d| !d.message.is_valid()));
    }

    #[test]
    fn same_direction_traffic_does_not_collide() {
        let mut link = Link::new(LinkId(0), A, B, 5);
        link.inject(data("one"), A);
        link.tick();
        link.inject(data("two"), A);
        link.tick();

        assert_eq!(link.entries().len(), 2);
        assert!(link.entries().iter().all(|e| e.message.is_valid()));
    }

    #[test]
    fn jam_corrupts_data_but_stays_valid() {
        let mut link = Link::new(LinkId(0), A, B, 3);
        link.inject(data("d"), A);
        link.inject(Message::jam(TransceiverId(1)), B);

        let mut deliveries = Vec::new();
        for _ in 0..3 {
            deliveries.extend(link.tick());
        }

        let jam = deliveries.iter().find(|d| d.message.is_jam()).expect("jam delivered");
        assert!(jam.message.is_valid());
        let d = deliveries.iter().find(|d| !d.message.is_jam()).expect("data delivered");
        assert!(!d.message.is_valid());
    }

    #[test]
    fn injection_from_stranger_is_ignored() {
        let mut link = Link::new(LinkId(0), A, B, 2);
        link.inject(data("z"), Endpoint::Station(StationId(9)));
        assert!(link.entries().is_empty());
        assert_eq!(link.opposite(Endpoint::Station(StationId(9))), None);
        assert_eq!(link.opposite(A), Some(B));
    }

    #[test]
    fn stages_stay_within_bounds_under_random_traffic() {
        for seed in 0..20u64 {
            let mut rng = StdRng::seed_from_u64(seed);
            let weight = rng.gen_range(1..8);
            let mut link = Link::new(LinkId(0), A, B, weight);
            let mut injected = 0usize;
            let mut delivered = 0usize;

            for _ in 0..200 {
                delivered += link.tick().len();
                assert!(link.entries().iter().all(|e| e.stage <= weight));
                if rng.gen_bool(0.3) {
                    let from = if rng.gen_bool(0.5) { A } else { B };
                    link.inject(data("r"), from);
                    injected += 1;
                }
            }
            for _ in 0..=weight {
                delivered += link.tick().len();
            }

            assert_eq!(injected, delivered, "seed {seed}: every entry is delivered exactly once");
            assert!(link.entries().is_empty());
        }
    }
}
