//! Group-addressed delivery to the sessions bound to one world
//!
//! Every session owns an unbounded channel whose receiving half is drained by
//! its socket writer. Delivery is fire-and-forget: if a session has gone away
//! its events are silently dropped, with no retry and no queueing.

use log::debug;
use shared::{ConnectionId, ServerEvent};
use std::collections::HashMap;
use tokio::sync::mpsc;

/// Sending half of a session's outbound event queue
pub type Outbox = mpsc::UnboundedSender<ServerEvent>;

#[derive(Debug, Default)]
pub struct Broadcaster {
    members: HashMap<ConnectionId, Outbox>,
}

impl Broadcaster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, id: ConnectionId, outbox: Outbox) {
        self.members.insert(id, outbox);
    }

    pub fn remove(&mut self, id: ConnectionId) -> bool {
        self.members.remove(&id).is_some()
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Unicast to a single member
    pub fn send_to(&self, id: ConnectionId, event: ServerEvent) {
        if let Some(outbox) = self.members.get(&id) {
            if outbox.send(event).is_err() {
                debug!("Dropping event for closed session {}", id);
            }
        }
    }

    /// Delivers to every member, optionally skipping the sender
    pub fn broadcast(&self, event: &ServerEvent, exclude: Option<ConnectionId>) {
        for (id, outbox) in &self.members {
            if Some(*id) == exclude {
                continue;
            }
            if outbox.send(event.clone()).is_err() {
                debug!("Dropping broadcast for closed session {}", id);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn left(id: ConnectionId) -> ServerEvent {
        ServerEvent::PlayerLeft { id }
    }

    #[test]
    fn test_broadcast_exclude_sender() {
        let mut fanout = Broadcaster::new();
        let (tx1, mut rx1) = mpsc::unbounded_channel();
        let (tx2, mut rx2) = mpsc::unbounded_channel();
        fanout.add(1, tx1);
        fanout.add(2, tx2);

        fanout.broadcast(&left(9), Some(1));
        assert!(rx1.try_recv().is_err());
        assert_eq!(rx2.try_recv().unwrap(), left(9));

        fanout.broadcast(&left(8), None);
        assert_eq!(rx1.try_recv().unwrap(), left(8));
        assert_eq!(rx2.try_recv().unwrap(), left(8));
    }

    #[test]
    fn test_send_to_single_member() {
        let mut fanout = Broadcaster::new();
        let (tx1, mut rx1) = mpsc::unbounded_channel();
        let (tx2, mut rx2) = mpsc::unbounded_channel();
        fanout.add(1, tx1);
        fanout.add(2, tx2);

        fanout.send_to(2, left(3));
        fanout.send_to(42, left(4));
        assert!(rx1.try_recv().is_err());
        assert_eq!(rx2.try_recv().unwrap(), left(3));
        assert!(rx2.try_recv().is_err());
    }

    #[test]
    fn test_closed_recipient_is_skipped() {
        let mut fanout = Broadcaster::new();
        let (tx1, rx1) = mpsc::unbounded_channel();
        let (tx2, mut rx2) = mpsc::unbounded_channel();
        fanout.add(1, tx1);
        fanout.add(2, tx2);
        drop(rx1);

        fanout.broadcast(&left(5), None);
        assert_eq!(rx2.try_recv().unwrap(), left(5));
        assert_eq!(fanout.len(), 2);

        assert!(fanout.remove(1));
        assert!(!fanout.remove(1));
        assert_eq!(fanout.len(), 1);
    }
}
