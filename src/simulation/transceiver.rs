//! Transceiver MAC state machine.
//!
//! A transceiver sits on one or more peer links and at most one station link.
//! Traffic arriving from its station is queued for transmission; traffic
//! arriving from peers is collected for the current tick and evaluated in the
//! decision phase:
//!
//! 1. Jams abort a transmission in progress (backoff range doubles).
//! 2. More than one data arrival, or any arrival while sending, is a collision:
//!    a jam burst of fixed length starts and the range doubles if a send was cut.
//! 3. Any arrival redraws the backoff timer from `[1, range]`.
//! 4. The jam countdown, the backoff timer, or the start of a new transmission
//!    advances, in that priority.
//! 5. Output goes to every peer link: jam, transmission copy, or a relay of the
//!    single message heard this tick to every other link.
//! 6. A finished transmission shrinks the range and dequeues the message.
//! 7. A single clean final message for the attached station is handed to it.

use std::collections::VecDeque;

use rand::Rng;
use rand_distr::{Distribution, Uniform};

use super::instrumentation::SimulationEvent;
use super::message::Message;
use super::types::{DEFAULT_BACKOFF_RANGE, DEFAULT_JAM_TICKS, DEFAULT_TRANSMIT_TICKS, LinkId, StationId, TransceiverId};

/// Protocol timing shared by every transceiver of a simulation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimingParameters {
    /// Backoff range a transceiver starts with.
    pub initial_backoff_range: u32,
    /// Ticks needed to send one message.
    pub transmit_ticks: u32,
    /// Length of the jam burst after a collision.
    pub jam_ticks: u32,
}

impl Default for TimingParameters {
    fn default() -> Self {
        Self {
            initial_backoff_range: DEFAULT_BACKOFF_RANGE,
            transmit_ticks: DEFAULT_TRANSMIT_TICKS,
            jam_ticks: DEFAULT_JAM_TICKS,
        }
    }
}

/// A message heard this tick and the link it came in on.
#[derive(Debug, Clone)]
pub(crate) struct Inbound {
    pub(crate) message: Message,
    pub(crate) link: LinkId,
}

/// Everything a transceiver asks the scheduler to do after its tick.
#[derive(Debug, Default)]
pub(crate) struct TickOutput {
    pub(crate) injections: Vec<(LinkId, Message)>,
    pub(crate) deliveries: Vec<(StationId, Message)>,
    pub(crate) events: Vec<SimulationEvent>,
}

#[derive(Debug)]
pub struct Transceiver {
    id: TransceiverId,
    timing: TimingParameters,
    links: Vec<LinkId>,
    station: Option<(StationId, LinkId)>,
    pub(crate) inbound: Vec<Inbound>,
    outbound: VecDeque<Message>,
    timer: u32,
    timer_range: u32,
    timer_from: u32,
    reset_ticks: u32,
    seen_reset: bool,
    transmitting: bool,
    transmit_remaining: u32,
}

impl Transceiver {
    pub(crate) fn new(id: TransceiverId, timing: TimingParameters) -> Self {
        Self {
            id,
            timing,
            links: Vec::new(),
            station: None,
            inbound: Vec::new(),
            outbound: VecDeque::new(),
            timer: 0,
            timer_range: timing.initial_backoff_range.max(1),
            timer_from: 0,
            reset_ticks: 0,
            seen_reset: false,
            transmitting: false,
            transmit_remaining: 0,
        }
    }

    pub(crate) fn attach_link(&mut self, link: LinkId) {
        self.links.push(link);
    }

    pub(crate) fn attach_station(&mut self, station: StationId, link: LinkId) {
        self.station = Some((station, link));
    }

    pub fn id(&self) -> TransceiverId {
        self.id
    }

    /// Links to other transceivers.
    pub fn peer_links(&self) -> &[LinkId] {
        &self.links
    }

    pub fn station(&self) -> Option<StationId> {
        self.station.map(|(s, _)| s)
    }

    pub fn station_link(&self) -> Option<LinkId> {
        self.station.map(|(_, l)| l)
    }

    /// Peer links followed by the station link, if any.
    pub fn all_links(&self) -> impl Iterator<Item = LinkId> + '_ {
        self.links.iter().copied().chain(self.station_link())
    }

    pub fn timer(&self) -> u32 {
        self.timer
    }

    pub fn timer_range(&self) -> u32 {
        self.timer_range
    }

    /// Value the current timer was drawn with, for progress display.
    pub fn timer_from(&self) -> u32 {
        self.timer_from
    }

    pub fn is_transmitting(&self) -> bool {
        self.transmitting
    }

    pub fn is_jamming(&self) -> bool {
        self.reset_ticks > 0
    }

    /// Inside a jam/reset episode, as seen by neighbours sensing for resets.
    pub fn is_resetting(&self) -> bool {
        self.seen_reset || self.reset_ticks > 0
    }

    pub fn sending_value(&self) -> Option<&str> {
        if self.transmitting { self.outbound.front().map(Message::payload) } else { None }
    }

    pub fn sending_to(&self) -> Option<StationId> {
        if self.transmitting { self.outbound.front().and_then(Message::destination) } else { None }
    }

    pub fn queued(&self) -> usize {
        self.outbound.len()
    }

    /// Link delivery callback (propagation phase).
    pub(crate) fn on_receive(&mut self, message: Message, link: LinkId) {
        if self.station_link() == Some(link) {
            self.outbound.push_back(message);
            return;
        }
        self.inbound.push(Inbound { message, link });
    }

    fn draw_timer<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        let range = self.timer_range.max(1);
        self.timer = Uniform::new_inclusive(1, range).sample(rng);
        self.timer_from = self.timer;
    }

    /// Decision-phase tick.
    pub(crate) fn tick<R: Rng + ?Sized>(&mut self, rng: &mut R) -> TickOutput {
        let mut out = TickOutput::default();
        let inbound = std::mem::take(&mut self.inbound);
        let (jams, data): (Vec<&Inbound>, Vec<&Inbound>) = inbound.iter().partition(|i| i.message.is_jam());

        let mut collision = false;
        if !jams.is_empty() {
            if self.transmitting {
                self.timer_range = self.timer_range.saturating_mul(2);
                log::debug!("({}) jam while sending, backoff range now {}", self.id, self.timer_range);
                out.events.push(SimulationEvent::CollisionDuringTransmit {
                    transceiver: self.id,
                    backoff_range: self.timer_range,
                });
            }
            self.transmitting = false;
        } else if data.len() > 1 || (data.len() == 1 && self.transmitting) {
            collision = true;
            if !self.seen_reset {
                self.seen_reset = true;
                if self.transmitting {
                    self.timer_range = self.timer_range.saturating_mul(2);
                }
                self.reset_ticks = self.timing.jam_ticks;
                log::debug!("({}) collision, jamming for {} ticks", self.id, self.reset_ticks);
                out.events.push(SimulationEvent::JamDetected { transceiver: self.id });
            }
            self.transmitting = false;
        }

        // Activity on the medium restarts the wait.
        if !inbound.is_empty() {
            self.draw_timer(rng);
        }

        if self.reset_ticks > 0 {
            self.reset_ticks -= 1;
        } else if self.timer > 0 && !self.outbound.is_empty() && !self.seen_reset {
            self.timer -= 1;
        } else if self.timer == 0 && !self.transmitting {
            if let Some(head) = self.outbound.front() {
                self.transmitting = true;
                self.transmit_remaining = self.timing.transmit_ticks.max(1);
                log::debug!("({}) begin transmit {:?}", self.id, head.payload());
                out.events.push(SimulationEvent::BeginTransmit {
                    transceiver: self.id,
                    message: head.clone(),
                });
            }
        }

        if self.reset_ticks == 0 {
            self.seen_reset = false;
        }

        let jamming = self.reset_ticks > 0;
        let mut finished = false;
        if !jamming && self.transmitting {
            self.transmit_remaining = self.transmit_remaining.saturating_sub(1);
            if self.transmit_remaining == 0 {
                if let Some(head) = self.outbound.front_mut() {
                    head.mark_final();
                }
                finished = true;
            }
        }

        let relay = if data.len() == 1 { Some(data[0]) } else { None };
        for &link in &self.links {
            let message = if jamming {
                Some(Message::jam(self.id))
            } else if collision {
                // Whoever collided already knows; tell everyone else.
                if data.iter().any(|i| i.link == link) { None } else { Some(Message::jam(self.id)) }
            } else if self.transmitting {
                self.outbound.front().cloned()
            } else {
                relay.filter(|r| r.link != link).map(|r| r.message.clone())
            };

            if let Some(message) = message {
                out.injections.push((link, message));
            }
        }

        if finished {
            self.transmitting = false;
            let shrunk = (self.timer_range as u64 * 9 / 10 + 2).min(u32::MAX as u64) as u32;
            self.timer_range = shrunk.max(1);
            self.draw_timer(rng);

            if let Some(sent) = self.outbound.pop_front() {
                log::debug!("({}) end transmit {:?}, backoff range now {}", self.id, sent.payload(), self.timer_range);
                // A node alone on its segment still hears itself.
                if let Some(station) = self.station() {
                    if sent.destination() == Some(station) {
                        out.deliveries.push((station, sent.clone()));
                    }
                }
                out.events.push(SimulationEvent::EndTransmit {
                    transceiver: self.id,
                    message: sent,
                });
            }
        }

        if let (Some(station), Some(heard)) = (self.station(), relay) {
            let message = &heard.message;
            if jams.is_empty()
                && !collision
                && !jamming
                && message.is_valid()
                && message.is_final()
                && message.destination() == Some(station)
            {
                out.deliveries.push((station, message.clone()));
            }
        }

        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    const UP: LinkId = LinkId(0);
    const DOWN: LinkId = LinkId(1);
    const SIDE: LinkId = LinkId(2);
    const STATION_LINK: LinkId = LinkId(9);
    const HOME: StationId = StationId(0);
    const AWAY: StationId = StationId(1);

    fn timing(transmit_ticks: u32, jam_ticks: u32) -> TimingParameters {
        TimingParameters {
            initial_backoff_range: 20,
            transmit_ticks,
            jam_ticks,
        }
    }

    fn transceiver(timing: TimingParameters, links: &[LinkId]) -> Transceiver {
        let mut t = Transceiver::new(TransceiverId(0), timing);
        for &l in links {
            t.attach_link(l);
        }
        t.attach_station(HOME, STATION_LINK);
        t
    }

    fn queue(t: &mut Transceiver, payload: &str, destination: StationId) {
        t.on_receive(Message::data(payload, HOME, destination), STATION_LINK);
    }

    #[test]
    fn station_traffic_is_queued_not_heard() {
        let mut t = transceiver(timing(3, 2), &[UP]);
        queue(&mut t, "q", AWAY);
        assert_eq!(t.queued(), 1);
        assert!(t.inbound.is_empty());
        assert_eq!(t.all_links().collect::<Vec<_>>(), vec![UP, STATION_LINK]);
    }

    #[test]
    fn sends_on_peer_links_for_fixed_duration() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut t = transceiver(timing(3, 2), &[UP, DOWN]);
        queue(&mut t, "hello", AWAY);

        let first = t.tick(&mut rng);
        assert!(t.is_transmitting());
        assert_eq!(t.sending_value(), Some("hello"));
        assert_eq!(t.sending_to(), Some(AWAY));
        assert!(matches!(first.events[0], SimulationEvent::BeginTransmit { .. }));
        assert_eq!(first.injections.len(), 2);
        assert!(first.injections.iter().all(|(l, m)| *l != STATION_LINK && !m.is_final()));

        let second = t.tick(&mut rng);
        assert_eq!(second.injections.len(), 2);
        assert!(second.events.is_empty());

        let last = t.tick(&mut rng);
        assert!(last.injections.iter().all(|(_, m)| m.is_final() && m.payload() == "hello"));
        assert!(matches!(last.events[0], SimulationEvent::EndTransmit { .. }));
        assert!(!t.is_transmitting());
        assert_eq!(t.queued(), 0);
        // 20 * 0.9 + 2
        assert_eq!(t.timer_range(), 20);
        assert!((1..=20).contains(&t.timer()));
        assert_eq!(t.timer(), t.timer_from());
    }

    #[test]
    fn successful_send_shrinks_large_range() {
        let mut rng = StdRng::seed_from_u64(2);
        let mut t = transceiver(
            TimingParameters {
                initial_backoff_range: 100,
                transmit_ticks: 1,
                jam_ticks: 2,
            },
            &[UP],
        );
        queue(&mut t, "m", AWAY);
        t.tick(&mut rng);
        assert_eq!(t.timer_range(), 92);
    }

    #[test]
    fn jam_during_transmit_doubles_range_and_aborts() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut t = transceiver(timing(10, 2), &[UP]);
        queue(&mut t, "m", AWAY);
        t.tick(&mut rng);
        assert!(t.is_transmitting());

        t.on_receive(Message::jam(TransceiverId(5)), UP);
        let out = t.tick(&mut rng);

        assert!(!t.is_transmitting());
        assert_eq!(t.timer_range(), 40);
        assert!(out.events.contains(&SimulationEvent::CollisionDuringTransmit {
            transceiver: TransceiverId(0),
            backoff_range: 40,
        }));
        assert!((1..=40).contains(&t.timer_from()));
        assert!(t.timer() <= t.timer_from());
        // The aborted message stays queued for a retry.
        assert_eq!(t.queued(), 1);
    }

    #[test]
    fn jam_while_idle_only_resets_timer() {
        let mut rng = StdRng::seed_from_u64(4);
        let mut t = transceiver(timing(10, 2), &[UP, DOWN]);
        t.on_receive(Message::jam(TransceiverId(5)), UP);
        let out = t.tick(&mut rng);

        assert!(out.events.is_empty());
        assert!(out.injections.is_empty());
        assert_eq!(t.timer_range(), 20);
        assert!(t.timer() >= 1);
    }

    #[test]
    fn single_arrival_is_relayed_everywhere_else() {
        let mut rng = StdRng::seed_from_u64(5);
        let mut t = transceiver(timing(10, 2), &[UP, DOWN, SIDE]);
        t.on_receive(Message::data("r", AWAY, AWAY), DOWN);
        let out = t.tick(&mut rng);

        let links: Vec<LinkId> = out.injections.iter().map(|(l, _)| *l).collect();
        assert_eq!(links, vec![UP, SIDE]);
        assert!(out.injections.iter().all(|(_, m)| m.payload() == "r"));
        assert!(out.deliveries.is_empty());
    }

    #[test]
    fn two_arrivals_start_a_jam_burst() {
        let mut rng = StdRng::seed_from_u64(6);
        let mut t = transceiver(timing(10, 3), &[UP, DOWN, SIDE]);
        t.on_receive(Message::data("a", AWAY, AWAY), UP);
        t.on_receive(Message::data("b", AWAY, AWAY), DOWN);

        let out = t.tick(&mut rng);
        assert_eq!(out.events, vec![SimulationEvent::JamDetected { transceiver: TransceiverId(0) }]);
        assert!(t.is_jamming());
        assert!(t.is_resetting());
        assert_eq!(out.injections.len(), 3);
        assert!(out.injections.iter().all(|(_, m)| m.is_jam()));
        // Not sending, so the range is untouched.
        assert_eq!(t.timer_range(), 20);

        // A second collision inside the same episode is not reported again.
        t.on_receive(Message::data("c", AWAY, AWAY), UP);
        t.on_receive(Message::data("d", AWAY, AWAY), SIDE);
        let again = t.tick(&mut rng);
        assert!(again.events.is_empty());
        assert_eq!(again.injections.len(), 3);

        let tail = t.tick(&mut rng);
        assert!(tail.injections.is_empty());
        assert!(!t.is_jamming());
        assert!(!t.is_resetting());
    }

    #[test]
    fn arrival_while_sending_is_a_collision() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut t = transceiver(timing(10, 2), &[UP]);
        queue(&mut t, "m", AWAY);
        t.tick(&mut rng);

        t.on_receive(Message::data("other", AWAY, HOME), UP);
        let out = t.tick(&mut rng);

        assert!(out.events.contains(&SimulationEvent::JamDetected { transceiver: TransceiverId(0) }));
        assert_eq!(t.timer_range(), 40);
        assert!(!t.is_transmitting());
        assert!(out.injections.iter().all(|(_, m)| m.is_jam()));
    }

    #[test]
    fn short_jam_only_warns_links_outside_the_collision() {
        let mut rng = StdRng::seed_from_u64(8);
        let mut t = transceiver(timing(10, 1), &[UP, DOWN, SIDE]);
        t.on_receive(Message::data("a", AWAY, AWAY), UP);
        t.on_receive(Message::data("b", AWAY, AWAY), DOWN);

        let out = t.tick(&mut rng);
        assert!(!t.is_jamming());
        assert_eq!(out.injections.len(), 1);
        assert_eq!(out.injections[0].0, SIDE);
        assert!(out.injections[0].1.is_jam());
    }

    #[test]
    fn backoff_timer_holds_back_queued_traffic() {
        let mut rng = StdRng::seed_from_u64(9);
        let mut t = transceiver(timing(5, 2), &[UP, DOWN]);
        // Hearing something first forces a wait before the queue is served.
        t.on_receive(Message::data("noise", AWAY, AWAY), UP);
        t.tick(&mut rng);
        let drawn = t.timer();
        assert!((1..=20).contains(&drawn));

        queue(&mut t, "mine", AWAY);
        let mut ticks = 0;
        while !t.is_transmitting() {
            t.tick(&mut rng);
            ticks += 1;
            assert!(ticks <= 21, "transmission never started");
        }
        assert_eq!(ticks, drawn + 1);
    }

    #[test]
    fn final_message_for_home_station_is_delivered() {
        let mut rng = StdRng::seed_from_u64(10);
        let mut t = transceiver(timing(5, 2), &[UP]);
        let mut m = Message::data("for you", AWAY, HOME);
        m.mark_final();
        t.on_receive(m, UP);

        let out = t.tick(&mut rng);
        assert_eq!(out.deliveries.len(), 1);
        assert_eq!(out.deliveries[0].0, HOME);
        assert_eq!(out.deliveries[0].1.payload(), "for you");
    }

    #[test]
    fn corrupted_or_foreign_or_partial_messages_are_not_delivered() {
        let mut rng = StdRng::seed_from_u64(11);
        let mut t = transceiver(timing(5, 2), &[UP]);

        let mut corrupted = Message::data("x", AWAY, HOME);
        corrupted.mark_final();
        corrupted.invalidate();
        t.on_receive(corrupted, UP);
        assert!(t.tick(&mut rng).deliveries.is_empty());

        let mut foreign = Message::data("y", AWAY, AWAY);
        foreign.mark_final();
        t.on_receive(foreign, UP);
        assert!(t.tick(&mut rng).deliveries.is_empty());

        t.on_receive(Message::data("z", AWAY, HOME), UP);
        assert!(t.tick(&mut rng).deliveries.is_empty());
    }

    #[test]
    fn message_to_own_station_loops_back_on_completion() {
        let mut rng = StdRng::seed_from_u64(12);
        let mut t = transceiver(timing(2, 2), &[]);
        queue(&mut t, "self", HOME);

        assert!(t.tick(&mut rng).deliveries.is_empty());
        let out = t.tick(&mut rng);
        assert_eq!(out.deliveries.len(), 1);
        assert!(out.deliveries[0].1.is_final());
    }

    #[test]
    fn timer_always_within_range() {
        let mut rng = StdRng::seed_from_u64(13);
        let mut t = transceiver(timing(4, 2), &[UP, DOWN]);
        for i in 0..500u32 {
            if i % 7 == 0 {
                queue(&mut t, "load", AWAY);
            }
            if i % 3 == 0 {
                t.on_receive(Message::data("noise", AWAY, AWAY), UP);
            }
            if i % 11 == 0 {
                t.on_receive(Message::jam(TransceiverId(4)), DOWN);
            }
            t.tick(&mut rng);
            assert!(t.timer() <= t.timer_range());
            assert!(t.timer_range() >= 1);
        }
    }
}
