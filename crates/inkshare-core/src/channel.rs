//! Message channel abstraction.
//!
//! One channel instance per logical room. Sending is fire-and-forget; inbound
//! messages are drained by the host through [`MessageChannel::poll`] and
//! handed to the canvas, which filters its own echoes.

use crate::error::ChannelError;
use serde_json::Value;
use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::rc::Rc;

/// Transport used to exchange wire messages with other participants.
pub trait MessageChannel {
    /// Queue a message for every other member of the room.
    fn send(&mut self, message: Value) -> Result<(), ChannelError>;

    /// Drain the messages received since the last poll (non-blocking).
    fn poll(&mut self) -> Vec<Value>;

    /// False when no transport is behind this channel.
    fn is_available(&self) -> bool {
        true
    }

    /// True once for every confirmed room join, including rejoins after a
    /// reconnect, since the last call. Channels without a join step never
    /// report one.
    fn take_joined(&mut self) -> bool {
        false
    }

    /// Stop sending and receiving.
    fn close(&mut self) {}
}

/// Channel used when no transport is available; the canvas keeps working
/// single-user.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopChannel;

impl MessageChannel for NoopChannel {
    fn send(&mut self, _message: Value) -> Result<(), ChannelError> {
        Ok(())
    }

    fn poll(&mut self) -> Vec<Value> {
        Vec::new()
    }

    fn is_available(&self) -> bool {
        false
    }
}

#[derive(Debug, Default)]
struct HubState {
    next_member: u64,
    inboxes: HashMap<u64, VecDeque<Value>>,
}

/// In-process room bus.
///
/// Every message sent by one member is delivered to all other members, in
/// send order per sender. Cheap to clone; clones share the same room.
#[derive(Debug, Clone, Default)]
pub struct LocalHub {
    state: Rc<RefCell<HubState>>,
}

impl LocalHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Join the room, returning this member's channel.
    pub fn join(&self) -> LocalChannel {
        let mut state = self.state.borrow_mut();
        let member = state.next_member;
        state.next_member += 1;
        state.inboxes.insert(member, VecDeque::new());
        LocalChannel {
            hub: self.clone(),
            member,
            closed: false,
        }
    }

    /// Number of members currently in the room.
    pub fn member_count(&self) -> usize {
        self.state.borrow().inboxes.len()
    }

    /// Messages waiting across all inboxes.
    pub fn pending(&self) -> usize {
        self.state.borrow().inboxes.values().map(VecDeque::len).sum()
    }
}

/// One member's end of a [`LocalHub`].
#[derive(Debug)]
pub struct LocalChannel {
    hub: LocalHub,
    member: u64,
    closed: bool,
}

impl MessageChannel for LocalChannel {
    fn send(&mut self, message: Value) -> Result<(), ChannelError> {
        if self.closed {
            return Err(ChannelError::Closed);
        }
        let mut state = self.hub.state.borrow_mut();
        for (member, inbox) in state.inboxes.iter_mut() {
            if *member != self.member {
                inbox.push_back(message.clone());
            }
        }
        Ok(())
    }

    fn poll(&mut self) -> Vec<Value> {
        if self.closed {
            return Vec::new();
        }
        let mut state = self.hub.state.borrow_mut();
        state
            .inboxes
            .get_mut(&self.member)
            .map(|inbox| inbox.drain(..).collect())
            .unwrap_or_default()
    }

    fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            self.hub.state.borrow_mut().inboxes.remove(&self.member);
        }
    }
}

impl Drop for LocalChannel {
    fn drop(&mut self) {
        self.close();
    }
}
