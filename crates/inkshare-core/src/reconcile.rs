//! Applies remote add/remove messages to the local store.
//!
//! Every path here is idempotent and keyed by stroke id, so duplicated or
//! reordered delivery converges. Nothing here touches the local history or
//! re-broadcasts a stroke.

use crate::error::HookError;
use crate::message::WireMessage;
use crate::store::{StrokeStore, Upsert};
use crate::stroke::{ParticipantId, Stroke};
use serde_json::Value;
use std::collections::HashSet;

/// Caller-supplied hook deciding whether an inbound stroke-bearing message
/// is meant for this participant (e.g. same session or room).
pub type AcceptPredicate = Box<dyn FnMut(&Value, &WireMessage) -> Result<bool, HookError>>;

/// Why an inbound message changed nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ignored {
    /// Sent by, or claiming, the local identity.
    Echo,
    /// Rejected by the accept predicate.
    Rejected,
    /// Did not decode to a known message shape.
    Malformed,
    /// A snapshot addressed to someone else.
    NotAddressed,
    /// Reuses the id of a stroke owned by someone else.
    OwnerConflict,
}

/// What applying one inbound message did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Added(Upsert),
    /// Number of strokes removed (possibly zero).
    Removed(usize),
    /// Number of strokes upserted from a snapshot.
    Synced(usize),
    /// A peer asked for our strokes.
    StateRequested { from: ParticipantId },
    Ignored(Ignored),
}

impl Outcome {
    /// True if the local store was modified.
    pub fn changed_store(&self) -> bool {
        match self {
            Outcome::Added(_) => true,
            Outcome::Removed(n) | Outcome::Synced(n) => *n > 0,
            Outcome::StateRequested { .. } | Outcome::Ignored(_) => false,
        }
    }
}

/// Inbound side of the canvas.
pub struct Reconciler {
    identity: ParticipantId,
    owner_scoped_removal: bool,
    accept: Option<AcceptPredicate>,
}

impl Reconciler {
    pub fn new(identity: ParticipantId, owner_scoped_removal: bool) -> Self {
        Self {
            identity,
            owner_scoped_removal,
            accept: None,
        }
    }

    pub fn set_accept_predicate(&mut self, accept: Option<AcceptPredicate>) {
        self.accept = accept;
    }

    /// Decode, validate and apply one raw inbound message.
    pub fn apply(&mut self, store: &mut StrokeStore, raw: &Value) -> Outcome {
        let message = match WireMessage::from_value(raw) {
            Ok(message) => message,
            Err(e) => {
                log::warn!("Dropping inbound message: {}", e);
                return Outcome::Ignored(Ignored::Malformed);
            }
        };

        if message.sender() == self.identity {
            return Outcome::Ignored(Ignored::Echo);
        }

        let carries_strokes = matches!(
            message,
            WireMessage::StrokeAdd { .. } | WireMessage::StateSnapshot { .. }
        );
        if carries_strokes && !self.accepts(raw, &message) {
            return Outcome::Ignored(Ignored::Rejected);
        }

        match message {
            WireMessage::StrokeAdd { owner, stroke, .. } => {
                if owner == self.identity || stroke.owner == self.identity {
                    log::debug!("Ignoring remote add of locally owned stroke {}", stroke.id);
                    return Outcome::Ignored(Ignored::Echo);
                }
                if conflicts(store, &stroke) {
                    log::warn!("Ignoring remote add of {}: id is owned by someone else", stroke.id);
                    return Outcome::Ignored(Ignored::OwnerConflict);
                }
                match store.upsert(stroke) {
                    Some(upsert) => Outcome::Added(upsert),
                    None => Outcome::Ignored(Ignored::Malformed),
                }
            }
            WireMessage::StrokeRemove { owner, ids, .. } => {
                if owner == self.identity {
                    log::warn!("Ignoring remote removal claiming the local identity");
                    return Outcome::Ignored(Ignored::Echo);
                }
                Outcome::Removed(self.remove(store, &owner, &ids))
            }
            WireMessage::StateRequest { from } => Outcome::StateRequested { from },
            WireMessage::StateSnapshot { target, strokes, .. } => {
                if target != self.identity {
                    return Outcome::Ignored(Ignored::NotAddressed);
                }
                let mut applied = 0;
                for stroke in strokes {
                    if stroke.is_owned_by(&self.identity) {
                        continue;
                    }
                    if conflicts(store, &stroke) {
                        log::warn!("Skipping snapshot stroke {}: id is owned by someone else", stroke.id);
                        continue;
                    }
                    if store.upsert(stroke).is_some() {
                        applied += 1;
                    }
                }
                Outcome::Synced(applied)
            }
        }
    }

    fn remove(&self, store: &mut StrokeStore, owner: &str, ids: &[String]) -> usize {
        let ids: HashSet<&str> = ids.iter().map(String::as_str).collect();
        let scoped = self.owner_scoped_removal;
        store.remove_where(|s| ids.contains(s.id.as_str()) && (!scoped || s.owner == owner))
    }

    /// Run the accept predicate; a failing predicate accepts.
    fn accepts(&mut self, raw: &Value, message: &WireMessage) -> bool {
        let Some(accept) = self.accept.as_mut() else {
            return true;
        };
        match accept(raw, message) {
            Ok(accepted) => accepted,
            Err(e) => {
                log::warn!("Accept predicate failed, accepting {}: {}", message.kind(), e);
                true
            }
        }
    }
}

/// True if `store` holds a stroke with this id under a different owner.
fn conflicts(store: &StrokeStore, stroke: &Stroke) -> bool {
    store.get_by_id(&stroke.id).is_some_and(|existing| existing.owner != stroke.owner)
}

impl std::fmt::Debug for Reconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reconciler")
            .field("identity", &self.identity)
            .field("owner_scoped_removal", &self.owner_scoped_removal)
            .field("has_accept", &self.accept.is_some())
            .finish()
    }
}
