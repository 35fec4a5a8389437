//! Wire messages exchanged between participants.
//!
//! Messages are JSON objects discriminated by `kind`:
//! ```json
//! { "kind": "strokeAdd", "from": "host-…", "owner": "host-…", "stroke": { … } }
//! { "kind": "strokeRemove", "from": "host-…", "owner": "host-…", "ids": ["…"] }
//! { "kind": "stateRequest", "from": "guest-…" }
//! { "kind": "stateSnapshot", "from": "host-…", "target": "guest-…", "strokes": [ … ] }
//! ```
//! Unknown extra fields (added by payload formatters for routing) are
//! ignored when decoding.

use crate::error::MessageError;
use crate::stroke::{ParticipantId, Stroke, StrokeId};
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const KIND_STROKE_ADD: &str = "strokeAdd";
pub const KIND_STROKE_REMOVE: &str = "strokeRemove";
pub const KIND_STATE_REQUEST: &str = "stateRequest";
pub const KIND_STATE_SNAPSHOT: &str = "stateSnapshot";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum WireMessage {
    /// A stroke was added (or re-added by undo/redo).
    #[serde(rename = "strokeAdd")]
    StrokeAdd {
        from: ParticipantId,
        owner: ParticipantId,
        stroke: Stroke,
    },
    /// Strokes with these ids were removed by their owner.
    #[serde(rename = "strokeRemove")]
    StrokeRemove {
        from: ParticipantId,
        owner: ParticipantId,
        ids: Vec<StrokeId>,
    },
    /// A late joiner asks peers for their current strokes.
    #[serde(rename = "stateRequest")]
    StateRequest { from: ParticipantId },
    /// Reply to a state request, addressed to `target`.
    #[serde(rename = "stateSnapshot")]
    StateSnapshot {
        from: ParticipantId,
        target: ParticipantId,
        strokes: Vec<Stroke>,
    },
}

impl WireMessage {
    /// Identity of the sender.
    pub fn sender(&self) -> &str {
        match self {
            WireMessage::StrokeAdd { from, .. }
            | WireMessage::StrokeRemove { from, .. }
            | WireMessage::StateRequest { from }
            | WireMessage::StateSnapshot { from, .. } => from,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            WireMessage::StrokeAdd { .. } => KIND_STROKE_ADD,
            WireMessage::StrokeRemove { .. } => KIND_STROKE_REMOVE,
            WireMessage::StateRequest { .. } => KIND_STATE_REQUEST,
            WireMessage::StateSnapshot { .. } => KIND_STATE_SNAPSHOT,
        }
    }

    /// Decode and validate a raw message.
    ///
    /// Strokes must carry an id and at least one point. A stroke without an
    /// owner inherits the message's owner.
    pub fn from_value(value: &Value) -> Result<Self, MessageError> {
        let object = value.as_object().ok_or(MessageError::NotAnObject)?;
        let kind = object
            .get("kind")
            .and_then(Value::as_str)
            .ok_or(MessageError::MissingKind)?;
        if !matches!(
            kind,
            KIND_STROKE_ADD | KIND_STROKE_REMOVE | KIND_STATE_REQUEST | KIND_STATE_SNAPSHOT
        ) {
            return Err(MessageError::UnknownKind(kind.to_string()));
        }

        let mut message: WireMessage =
            serde_json::from_value(value.clone()).map_err(|source| MessageError::Malformed {
                kind: kind.to_string(),
                source,
            })?;

        match &mut message {
            WireMessage::StrokeAdd { owner, stroke, .. } => {
                validate_stroke(stroke)?;
                if stroke.owner.is_empty() {
                    stroke.owner = owner.clone();
                }
            }
            WireMessage::StateSnapshot { strokes, .. } => {
                // One bad stroke does not spoil the rest of a snapshot.
                strokes.retain(|s| validate_stroke(s).is_ok() && !s.owner.is_empty());
            }
            WireMessage::StrokeRemove { .. } | WireMessage::StateRequest { .. } => {}
        }
        Ok(message)
    }

    pub fn from_json(json: &str) -> Result<Self, MessageError> {
        let value: Value = serde_json::from_str(json).map_err(|source| MessageError::Malformed {
            kind: "unparsed".to_string(),
            source,
        })?;
        Self::from_value(&value)
    }

    /// Encode as a JSON value.
    pub fn to_value(&self) -> Value {
        // Serializing plain structs with string keys cannot fail.
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

fn validate_stroke(stroke: &Stroke) -> Result<(), MessageError> {
    if stroke.id.is_empty() {
        return Err(MessageError::MissingStrokeId);
    }
    if stroke.points.is_empty() {
        return Err(MessageError::EmptyStroke);
    }
    Ok(())
}
