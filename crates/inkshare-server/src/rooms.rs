//! Room bookkeeping for the relay.

use dashmap::DashMap;
use inkshare_core::ServerFrame;
use std::collections::HashSet;
use tokio::sync::broadcast;

/// Per-room broadcast capacity before slow peers start lagging.
pub const CHANNEL_CAPACITY: usize = 256;

/// A frame fanned out to a room, tagged with the sending peer.
pub type RoomEvent = (String, ServerFrame);

/// Room state
struct Room {
    /// Broadcast channel for this room
    tx: broadcast::Sender<RoomEvent>,
    /// Connected peer IDs
    peers: HashSet<String>,
}

impl Room {
    fn new() -> Self {
        let (tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            tx,
            peers: HashSet::new(),
        }
    }
}

/// Active rooms, shared by all connections.
#[derive(Default)]
pub struct Rooms {
    rooms: DashMap<String, Room>,
}

impl Rooms {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add peer to room, creating it if needed.
    /// Returns the room's receiver and its size including the new peer.
    pub fn join(&self, room_id: &str, peer_id: &str) -> (broadcast::Receiver<RoomEvent>, usize) {
        let mut room = self.rooms.entry(room_id.to_string()).or_insert_with(Room::new);
        room.peers.insert(peer_id.to_string());
        (room.tx.subscribe(), room.peers.len())
    }

    /// Remove peer from room. Empty rooms are dropped.
    /// Returns true if the peer was a member.
    pub fn leave(&self, room_id: &str, peer_id: &str) -> bool {
        let Some(mut room) = self.rooms.get_mut(room_id) else {
            return false;
        };
        let was_member = room.peers.remove(peer_id);
        if room.peers.is_empty() {
            drop(room);
            self.rooms.remove(room_id);
        }
        was_member
    }

    /// Broadcast frame to room. Returns how many receivers got it.
    pub fn broadcast(&self, room_id: &str, from: &str, frame: ServerFrame) -> usize {
        self.rooms
            .get(room_id)
            .and_then(|room| room.tx.send((from.to_string(), frame)).ok())
            .unwrap_or(0)
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    pub fn peer_count(&self, room_id: &str) -> usize {
        self.rooms.get(room_id).map(|room| room.peers.len()).unwrap_or(0)
    }

    pub fn total_peers(&self) -> usize {
        self.rooms.iter().map(|room| room.peers.len()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_join_counts_peers() {
        let rooms = Rooms::new();
        let (_rx1, count) = rooms.join("ROOM1", "a");
        assert_eq!(count, 1);
        let (_rx2, count) = rooms.join("ROOM1", "b");
        assert_eq!(count, 2);
        rooms.join("ROOM2", "c");
        assert_eq!(rooms.room_count(), 2);
        assert_eq!(rooms.total_peers(), 3);
    }

    #[test]
    fn test_leave_removes_empty_room() {
        let rooms = Rooms::new();
        rooms.join("ROOM1", "a");
        rooms.join("ROOM1", "b");
        assert!(rooms.leave("ROOM1", "a"));
        assert_eq!(rooms.peer_count("ROOM1"), 1);
        assert!(!rooms.leave("ROOM1", "a"));

        assert!(rooms.leave("ROOM1", "b"));
        assert_eq!(rooms.room_count(), 0);
        assert!(!rooms.leave("ROOM1", "b"));
    }

    #[test]
    fn test_broadcast_tags_sender() {
        let rooms = Rooms::new();
        let (mut rx, _) = rooms.join("ROOM1", "a");
        let frame = ServerFrame::Message {
            from: "b".to_string(),
            payload: json!({ "kind": "stateRequest", "from": "guest-b" }),
        };
        assert_eq!(rooms.broadcast("ROOM1", "b", frame.clone()), 1);

        let (from, received) = rx.try_recv().unwrap();
        assert_eq!(from, "b");
        assert_eq!(received, frame);

        assert_eq!(rooms.broadcast("NOWHERE", "b", frame), 0);
    }
}
