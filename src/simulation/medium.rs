//! Carrier and reset sensing across a shared segment.
//!
//! A query starts at one endpoint of a link and walks outward: if the link
//! itself does not answer it, the far endpoint is asked about each of its other
//! links, and so on. Stations have a single link, so walks end there. Visited
//! links are never revisited.

use std::collections::HashSet;

use super::link::Link;
use super::transceiver::Transceiver;
use super::types::{Endpoint, LinkId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Probe {
    /// Traffic moving toward the asking side.
    Carrier,
    /// A transceiver inside its jam/reset window.
    Reset,
}

/// Whether `from`, looking into `start`, senses `probe` anywhere on the segment.
pub(crate) fn sensed(links: &[Link], transceivers: &[Transceiver], start: LinkId, from: Endpoint, probe: Probe) -> bool {
    let mut visited: HashSet<LinkId> = HashSet::new();
    let mut pending = vec![(start, from)];

    while let Some((link_id, near)) = pending.pop() {
        if !visited.insert(link_id) {
            continue;
        }
        let Some(link) = links.get(link_id.index()) else {
            continue;
        };
        let Some(far) = link.opposite(near) else {
            continue;
        };

        let far_transceiver = match far {
            Endpoint::Transceiver(id) => transceivers.get(id.index()),
            Endpoint::Station(_) => None,
        };

        let hit = match probe {
            Probe::Carrier => link.carries_toward(near),
            Probe::Reset => far_transceiver.is_some_and(Transceiver::is_resetting),
        };
        if hit {
            return true;
        }

        if let Some(t) = far_transceiver {
            pending.extend(t.all_links().filter(|l| *l != link_id).map(|l| (l, far)));
        }
    }

    false
}
