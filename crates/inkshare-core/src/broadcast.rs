//! Turns local commits into outbound wire messages.

use crate::channel::{MessageChannel, NoopChannel};
use crate::error::HookError;
use crate::message::WireMessage;
use crate::stroke::{ParticipantId, Stroke, StrokeId};
use serde_json::{Map, Value};

/// Keys a payload formatter may not override.
const PROTECTED_KEYS: &[&str] = &["kind", "from", "owner", "ids"];

/// Context handed to a payload formatter.
#[derive(Debug, Clone, Copy)]
pub struct FormatContext<'a> {
    /// Local identity tag.
    pub identity: &'a str,
    /// Role the local identity was generated for.
    pub role: &'a str,
}

/// Caller-supplied hook returning extra fields for an outbound message.
///
/// Returned fields are merged into the message object. A `stroke` field
/// replaces the stroke payload only if it decodes to a non-empty stroke.
pub type PayloadFormatter =
    Box<dyn FnMut(&WireMessage, &FormatContext<'_>) -> Result<Option<Map<String, Value>>, HookError>>;

/// Outbound side of the canvas: identity tag, channel and formatter.
pub struct Broadcaster {
    identity: ParticipantId,
    role: String,
    channel: Box<dyn MessageChannel>,
    formatter: Option<PayloadFormatter>,
    sent: usize,
}

impl Broadcaster {
    pub fn new(identity: ParticipantId, role: impl Into<String>, channel: Box<dyn MessageChannel>) -> Self {
        Self {
            identity,
            role: role.into(),
            channel,
            formatter: None,
            sent: 0,
        }
    }

    pub fn identity(&self) -> &str {
        &self.identity
    }

    pub fn set_formatter(&mut self, formatter: Option<PayloadFormatter>) {
        self.formatter = formatter;
    }

    /// Swap the transport, closing the previous one.
    pub fn replace_channel(&mut self, channel: Box<dyn MessageChannel>) {
        let mut old = std::mem::replace(&mut self.channel, channel);
        old.close();
    }

    /// Drop the transport; subsequent sends are no-ops.
    pub fn detach_channel(&mut self) {
        self.replace_channel(Box::new(NoopChannel));
    }

    pub fn is_connected(&self) -> bool {
        self.channel.is_available()
    }

    /// Messages successfully handed to the transport so far.
    pub fn sent_count(&self) -> usize {
        self.sent
    }

    /// Announce a stroke, assigning its identity first if needed.
    pub fn add(&mut self, stroke: &mut Stroke) -> bool {
        if stroke.ensure_identity(&self.identity) {
            log::debug!("Assigned identity to stroke {} before broadcast", stroke.id);
        }
        let message = WireMessage::StrokeAdd {
            from: self.identity.clone(),
            owner: self.identity.clone(),
            stroke: stroke.clone(),
        };
        self.transmit(message)
    }

    /// Announce removal of strokes owned by the local participant.
    pub fn remove(&mut self, ids: Vec<StrokeId>) -> bool {
        if ids.is_empty() {
            return false;
        }
        let message = WireMessage::StrokeRemove {
            from: self.identity.clone(),
            owner: self.identity.clone(),
            ids,
        };
        self.transmit(message)
    }

    /// Ask peers for their current strokes.
    pub fn request_state(&mut self) -> bool {
        let message = WireMessage::StateRequest {
            from: self.identity.clone(),
        };
        self.transmit(message)
    }

    /// Reply to a peer's state request.
    pub fn state_snapshot(&mut self, target: &str, strokes: Vec<Stroke>) -> bool {
        let message = WireMessage::StateSnapshot {
            from: self.identity.clone(),
            target: target.to_string(),
            strokes,
        };
        self.transmit(message)
    }

    /// Drain inbound messages from the transport.
    pub fn poll(&mut self) -> Vec<Value> {
        self.channel.poll()
    }

    /// True if the transport (re)joined its room since the last call.
    pub fn take_joined(&mut self) -> bool {
        self.channel.take_joined()
    }

    fn transmit(&mut self, message: WireMessage) -> bool {
        let payload = self.format(&message);
        match self.channel.send(payload) {
            Ok(()) => {
                self.sent += 1;
                true
            }
            Err(e) => {
                log::error!("Broadcast {} failed: {}", message.kind(), e);
                false
            }
        }
    }

    /// Build the outbound object, applying the formatter if one is set.
    fn format(&mut self, message: &WireMessage) -> Value {
        let mut value = message.to_value();
        let Some(formatter) = self.formatter.as_mut() else {
            return value;
        };

        let context = FormatContext {
            identity: &self.identity,
            role: &self.role,
        };
        let extra = match formatter(message, &context) {
            Ok(Some(extra)) => extra,
            Ok(None) => return value,
            Err(e) => {
                log::warn!("Payload formatter failed, sending default {}: {}", message.kind(), e);
                return value;
            }
        };

        let Some(object) = value.as_object_mut() else {
            return value;
        };
        for (key, field) in extra {
            if PROTECTED_KEYS.contains(&key.as_str()) {
                log::debug!("Payload formatter tried to override '{}', ignored", key);
                continue;
            }
            if key == "stroke" {
                match serde_json::from_value::<Stroke>(field.clone()) {
                    Ok(stroke) if !stroke.is_empty() => {
                        object.insert(key, field);
                    }
                    _ => log::warn!("Payload formatter returned an invalid stroke, keeping original"),
                }
                continue;
            }
            object.insert(key, field);
        }
        value
    }
}

impl std::fmt::Debug for Broadcaster {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Broadcaster")
            .field("identity", &self.identity)
            .field("role", &self.role)
            .field("connected", &self.channel.is_available())
            .field("has_formatter", &self.formatter.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::LocalHub;
    use kurbo::Point;
    use serde_json::json;

    fn formatter(
        f: impl FnMut(&WireMessage, &FormatContext<'_>) -> Result<Option<Map<String, Value>>, HookError> + 'static,
    ) -> Option<PayloadFormatter> {
        Some(Box::new(f))
    }

    fn setup() -> (Broadcaster, crate::channel::LocalChannel) {
        let hub = LocalHub::new();
        let broadcaster = Broadcaster::new("me".into(), "guest", Box::new(hub.join()));
        (broadcaster, hub.join())
    }

    #[test]
    fn test_add_carries_identity_and_copy() {
        let (mut broadcaster, mut peer) = setup();
        let mut stroke = Stroke::begin("me", "#000", 2.0, Point::new(1.0, 2.0));
        assert!(broadcaster.add(&mut stroke));

        // Mutating the live stroke afterwards must not affect what was sent.
        stroke.push_point(Point::new(9.0, 9.0));

        let received = peer.poll();
        assert_eq!(received.len(), 1);
        assert_eq!(received[0]["kind"], "strokeAdd");
        assert_eq!(received[0]["from"], "me");
        assert_eq!(received[0]["stroke"]["points"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn test_add_assigns_missing_identity() {
        let (mut broadcaster, mut peer) = setup();
        let mut stroke = Stroke::begin("me", "#000", 2.0, Point::ZERO);
        stroke.id.clear();
        stroke.owner.clear();
        broadcaster.add(&mut stroke);
        assert!(!stroke.id.is_empty());
        assert_eq!(stroke.owner, "me");
        assert_eq!(peer.poll()[0]["stroke"]["id"], stroke.id.as_str());
    }

    #[test]
    fn test_remove_skips_empty() {
        let (mut broadcaster, mut peer) = setup();
        assert!(!broadcaster.remove(vec![]));
        assert_eq!(broadcaster.sent_count(), 0);
        assert!(broadcaster.remove(vec!["a".into(), "b".into()]));
        assert_eq!(broadcaster.sent_count(), 1);
        let received = peer.poll();
        assert_eq!(received.len(), 1);
        assert_eq!(received[0]["ids"], json!(["a", "b"]));
    }

    #[test]
    fn test_formatter_extends_message() {
        let (mut broadcaster, mut peer) = setup();
        broadcaster.set_formatter(formatter(|_msg, ctx| {
            let mut extra = Map::new();
            extra.insert("session".into(), json!("ROOM1"));
            extra.insert("role".into(), json!(ctx.role));
            extra.insert("kind".into(), json!("hijack"));
            Ok(Some(extra))
        }));
        broadcaster.remove(vec!["x".into()]);
        let received = peer.poll();
        assert_eq!(received[0]["session"], "ROOM1");
        assert_eq!(received[0]["role"], "guest");
        assert_eq!(received[0]["kind"], "strokeRemove");
    }

    #[test]
    fn test_formatter_stroke_replacement_validated() {
        let (mut broadcaster, mut peer) = setup();
        broadcaster.set_formatter(formatter(|_msg, _ctx| {
            let mut extra = Map::new();
            extra.insert("stroke".into(), json!({ "garbage": true }));
            Ok(Some(extra))
        }));
        let mut stroke = Stroke::begin("me", "#000", 2.0, Point::ZERO);
        broadcaster.add(&mut stroke);
        assert_eq!(peer.poll()[0]["stroke"]["id"], stroke.id.as_str());
    }

    #[test]
    fn test_failing_formatter_falls_back() {
        let (mut broadcaster, mut peer) = setup();
        broadcaster.set_formatter(formatter(|_msg, _ctx| Err(HookError::new("boom"))));
        assert!(broadcaster.request_state());
        let received = peer.poll();
        assert_eq!(received[0], json!({ "kind": "stateRequest", "from": "me" }));
    }

    #[test]
    fn test_detached_channel_is_noop() {
        let (mut broadcaster, mut peer) = setup();
        broadcaster.detach_channel();
        assert!(!broadcaster.is_connected());
        assert!(broadcaster.request_state());
        assert!(peer.poll().is_empty());
    }
}
