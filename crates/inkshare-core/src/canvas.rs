//! The per-participant canvas context.
//!
//! [`Canvas`] owns the identity, stroke store, history, tool settings,
//! capture state and channel handle of one participant. The host feeds it
//! pointer events and inbound messages; it notifies observers whenever the
//! store changes so an external renderer can repaint.

use crate::broadcast::{Broadcaster, FormatContext};
use crate::capture::{CaptureState, EraseBatch};
use crate::channel::{MessageChannel, NoopChannel};
use crate::config::CanvasConfig;
use crate::error::HookError;
use crate::geometry::distance;
use crate::history::{retain_owned, BatchEntry, BatchKind, History, UndoEntry};
use crate::hit_test::hit_owned_stroke;
use crate::input::PointerMeta;
use crate::message::WireMessage;
use crate::reconcile::{Outcome, Reconciler};
use crate::store::{StrokeStore, Upsert};
use crate::stroke::{generate_participant_id, ParticipantId, Stroke, StrokeId};
use crate::tools::{ToolMode, ToolSettings};
use kurbo::Point;
use serde_json::{Map, Value};

/// Handle returned by [`Canvas::subscribe`].
pub type ObserverId = u64;

/// What kind of change an observer is being told about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeKind {
    /// The in-progress stroke started or grew.
    Preview,
    /// A local stroke was committed.
    Committed,
    /// The in-progress stroke was abandoned.
    Discarded,
    /// Local strokes were erased.
    Erased,
    /// Local strokes were cleared.
    Cleared,
    /// The last local action was reverted.
    Undone,
    /// The last undone action was applied again.
    Redone,
    /// A remote message changed the store.
    Remote,
}

/// A store change notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    pub kind: ChangeKind,
    /// Strokes the change touched. May be empty for remote removals and
    /// snapshots.
    pub stroke_ids: Vec<StrokeId>,
}

/// Borrowed view of what should currently be rendered.
#[derive(Debug, Clone, Copy)]
pub struct StoreView<'a> {
    /// Committed strokes, back to front.
    pub strokes: &'a [Stroke],
    /// The stroke being drawn, rendered on top of everything.
    pub in_progress: Option<&'a Stroke>,
}

/// Owned copy of the canvas state.
#[derive(Debug, Clone, PartialEq)]
pub struct CanvasSnapshot {
    pub strokes: Vec<Stroke>,
    pub in_progress: Option<Stroke>,
    pub can_undo: bool,
    pub can_redo: bool,
}

type Observer = Box<dyn FnMut(&ChangeEvent, &StoreView<'_>)>;

/// One participant's shared canvas.
pub struct Canvas {
    config: CanvasConfig,
    identity: ParticipantId,
    store: StrokeStore,
    history: History,
    tools: ToolSettings,
    capture: CaptureState,
    broadcaster: Broadcaster,
    reconciler: Reconciler,
    observers: Vec<(ObserverId, Observer)>,
    next_observer: ObserverId,
}

impl Default for Canvas {
    fn default() -> Self {
        Self::new(CanvasConfig::default())
    }
}

impl Canvas {
    /// Create a single-user canvas with a freshly generated identity.
    pub fn new(config: CanvasConfig) -> Self {
        Self::with_channel(config, Box::new(NoopChannel))
    }

    /// Create a canvas talking over `channel`, with a generated identity.
    pub fn with_channel(config: CanvasConfig, channel: Box<dyn MessageChannel>) -> Self {
        let identity = generate_participant_id(&config.role);
        Self::with_identity(config, identity, channel)
    }

    /// Create a canvas with an explicit identity.
    pub fn with_identity(
        config: CanvasConfig,
        identity: impl Into<ParticipantId>,
        channel: Box<dyn MessageChannel>,
    ) -> Self {
        let identity = identity.into();
        if !channel.is_available() {
            log::info!("No transport available, canvas {} runs single-user", identity);
        }
        Self {
            tools: ToolSettings::from_config(&config),
            history: History::with_limit(config.history_limit),
            broadcaster: Broadcaster::new(identity.clone(), config.role.clone(), channel),
            reconciler: Reconciler::new(identity.clone(), config.owner_scoped_removal),
            store: StrokeStore::new(),
            capture: CaptureState::Idle,
            observers: Vec::new(),
            next_observer: 0,
            identity,
            config,
        }
    }

    pub fn identity(&self) -> &str {
        &self.identity
    }

    pub fn config(&self) -> &CanvasConfig {
        &self.config
    }

    pub fn tool(&self) -> &ToolSettings {
        &self.tools
    }

    pub fn store(&self) -> &StrokeStore {
        &self.store
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    /// True while a draw or erase gesture is active.
    pub fn is_capturing(&self) -> bool {
        !self.capture.is_idle()
    }

    pub fn view(&self) -> StoreView<'_> {
        StoreView {
            strokes: self.store.strokes(),
            in_progress: self.capture.in_progress(),
        }
    }

    pub fn snapshot(&self) -> CanvasSnapshot {
        CanvasSnapshot {
            strokes: self.store.strokes().to_vec(),
            in_progress: self.capture.in_progress().cloned(),
            can_undo: self.history.can_undo(),
            can_redo: self.history.can_redo(),
        }
    }

    // --- Observers ---

    /// Register a store-change observer.
    pub fn subscribe<F>(&mut self, observer: F) -> ObserverId
    where
        F: FnMut(&ChangeEvent, &StoreView<'_>) + 'static,
    {
        let id = self.next_observer;
        self.next_observer += 1;
        self.observers.push((id, Box::new(observer)));
        id
    }

    /// Remove an observer. Returns false if it was not registered.
    pub fn unsubscribe(&mut self, id: ObserverId) -> bool {
        let before = self.observers.len();
        self.observers.retain(|(observer, _)| *observer != id);
        self.observers.len() != before
    }

    fn notify(&mut self, kind: ChangeKind, stroke_ids: Vec<StrokeId>) {
        if self.observers.is_empty() {
            return;
        }
        let event = ChangeEvent { kind, stroke_ids };
        let view = StoreView {
            strokes: self.store.strokes(),
            in_progress: self.capture.in_progress(),
        };
        for (_, observer) in self.observers.iter_mut() {
            observer(&event, &view);
        }
    }

    // --- Tools ---

    /// Select a tool. Switching mode mid-gesture ends the gesture as a
    /// cancel would.
    pub fn set_tool(&mut self, mode: ToolMode, color: &str, size: f64) {
        if mode != self.tools.mode && !self.capture.is_idle() {
            log::debug!("Tool changed mid-gesture, ending gesture");
            self.abort_gesture();
        }
        self.tools.set(mode, color, size, &self.config);
    }

    pub fn set_stylus_only(&mut self, stylus_only: bool) {
        self.tools.stylus_only = stylus_only;
    }

    // --- Pointer input ---

    /// Pointer down. Starts a stroke, or an erase gesture in eraser mode.
    pub fn start_stroke(&mut self, point: Point, meta: PointerMeta) -> bool {
        if !meta.is_supported(self.tools.stylus_only) {
            log::debug!("Ignoring unsupported pointer {:?}", meta.kind);
            return false;
        }
        if !point.is_finite() {
            log::debug!("Ignoring non-finite pointer position {:?}", point);
            return false;
        }
        if !self.capture.is_idle() {
            // A second contact while a gesture is active is ignored; the
            // same pointer going down again means we missed its release.
            if !meta.matches(self.capture.pointer_id()) {
                return false;
            }
            self.abort_gesture();
        }

        match self.tools.mode {
            ToolMode::Pen | ToolMode::Marker => {
                let width = self.tools.stroke_width(&self.config);
                let stroke = Stroke::begin(&self.identity, self.tools.color.clone(), width, point);
                let id = stroke.id.clone();
                self.capture = CaptureState::Drawing {
                    stroke,
                    pointer_id: meta.pointer_id,
                };
                self.notify(ChangeKind::Preview, vec![id]);
            }
            ToolMode::Eraser => {
                self.capture = CaptureState::Erasing {
                    batch: EraseBatch::new(),
                    pointer_id: meta.pointer_id,
                };
                self.erase_at(point);
            }
        }
        true
    }

    /// Pointer move. Extends the stroke or erases under the pointer.
    pub fn continue_stroke(&mut self, point: Point, meta: PointerMeta) -> bool {
        if self.capture.is_idle() || !meta.matches(self.capture.pointer_id()) {
            return false;
        }
        if !meta.is_supported(self.tools.stylus_only) {
            return false;
        }
        if !point.is_finite() {
            log::debug!("Ignoring non-finite pointer position {:?}", point);
            return false;
        }
        if self.capture.is_erasing() {
            return self.erase_at(point);
        }

        let min_distance = self.config.min_point_distance;
        let CaptureState::Drawing { stroke, .. } = &mut self.capture else {
            return false;
        };
        if too_close(stroke, point, min_distance) {
            return false;
        }
        stroke.push_point(point);
        let id = stroke.id.clone();
        self.notify(ChangeKind::Preview, vec![id]);
        true
    }

    /// Pointer up. Commits the stroke, or flushes the erase batch.
    /// A non-finite end position still ends the gesture but is not recorded.
    pub fn end_stroke(&mut self, point: Point, meta: PointerMeta) -> bool {
        if self.capture.is_idle() || !meta.matches(self.capture.pointer_id()) {
            return false;
        }
        match self.capture.take() {
            CaptureState::Drawing { mut stroke, .. } => {
                if !point.is_finite() {
                    log::debug!("Dropping non-finite end position {:?}", point);
                } else if stroke.last_point() != Some(point)
                    && !too_close(&stroke, point, self.config.min_point_distance)
                {
                    stroke.push_point(point);
                }
                self.commit_draw(stroke)
            }
            CaptureState::Erasing { batch, .. } => self.flush_erase(batch),
            CaptureState::Idle => false,
        }
    }

    /// Pointer cancel or leave. Drops an in-progress stroke; an erase gesture
    /// keeps what it already removed and is flushed into history.
    pub fn cancel_stroke(&mut self, _point: Point, meta: PointerMeta) -> bool {
        if self.capture.is_idle() || !meta.matches(self.capture.pointer_id()) {
            return false;
        }
        self.abort_gesture()
    }

    fn abort_gesture(&mut self) -> bool {
        match self.capture.take() {
            CaptureState::Drawing { stroke, .. } => {
                self.notify(ChangeKind::Discarded, vec![stroke.id]);
                true
            }
            CaptureState::Erasing { batch, .. } => self.flush_erase(batch),
            CaptureState::Idle => false,
        }
    }

    /// Remove the topmost owned stroke under `point` into the active batch.
    fn erase_at(&mut self, point: Point) -> bool {
        let Some(index) = hit_owned_stroke(&self.store, point, &self.identity) else {
            return false;
        };
        let Some(stroke) = self.store.remove_at(index) else {
            return false;
        };
        let id = stroke.id.clone();
        if let CaptureState::Erasing { batch, .. } = &mut self.capture {
            batch.record(stroke, index);
        }
        self.notify(ChangeKind::Erased, vec![id]);
        true
    }

    // --- History ---

    fn commit_draw(&mut self, mut stroke: Stroke) -> bool {
        stroke.ensure_identity(&self.identity);
        let Some(index) = self.store.push(stroke.clone()) else {
            return false;
        };
        let id = stroke.id.clone();
        self.history.record(UndoEntry::Draw {
            stroke: stroke.clone(),
            index,
        });
        self.notify(ChangeKind::Committed, vec![id]);
        self.broadcaster.add(&mut stroke);
        true
    }

    fn flush_erase(&mut self, batch: EraseBatch) -> bool {
        let entries = retain_owned(batch.into_entries(), &self.identity);
        if entries.is_empty() {
            return false;
        }
        // Observers already saw each removal from `erase_at`.
        let ids = batch_ids(&entries);
        self.history.record(UndoEntry::batch(BatchKind::Erase, entries));
        self.broadcaster.remove(ids);
        true
    }

    /// Remove every locally owned stroke as one undoable action.
    pub fn clear_owned(&mut self) -> bool {
        if self.capture.is_erasing() {
            self.abort_gesture();
        }
        let entries: Vec<BatchEntry> = self
            .store
            .drain_owned(&self.identity)
            .into_iter()
            .map(|(stroke, index)| BatchEntry::new(stroke, index))
            .collect();
        if entries.is_empty() {
            return false;
        }
        let ids = batch_ids(&entries);
        self.history.record(UndoEntry::batch(BatchKind::Clear, entries));
        self.notify(ChangeKind::Cleared, ids.clone());
        self.broadcaster.remove(ids);
        true
    }

    /// Undo the last local action.
    /// Returns true if the store changed.
    pub fn undo(&mut self) -> bool {
        let Some(entry) = self.history.pop_undo() else {
            return false;
        };
        match entry {
            UndoEntry::Draw { stroke, .. } => {
                let Some((index, removed)) = self.store.remove_by_id(&stroke.id) else {
                    log::debug!("Undo: stroke {} is gone, dropping entry", stroke.id);
                    return false;
                };
                let id = removed.id.clone();
                self.history.push_redo(UndoEntry::Draw { stroke: removed, index });
                self.notify(ChangeKind::Undone, vec![id.clone()]);
                self.broadcaster.remove(vec![id]);
                true
            }
            UndoEntry::EraseBatch { entries } => self.undo_batch(BatchKind::Erase, entries),
            UndoEntry::ClearBatch { entries } => self.undo_batch(BatchKind::Clear, entries),
        }
    }

    /// Reinsert a batch at its recorded indices, last removal first.
    fn undo_batch(&mut self, kind: BatchKind, entries: Vec<BatchEntry>) -> bool {
        let mut restored = Vec::with_capacity(entries.len());
        for entry in retain_owned(entries, &self.identity).into_iter().rev() {
            if self.store.contains(&entry.stroke.id) {
                log::debug!("Undo: stroke {} already present, skipping", entry.stroke.id);
                continue;
            }
            if self.store.insert(entry.index, entry.stroke.clone()).is_some() {
                restored.push(entry);
            }
        }
        if restored.is_empty() {
            log::debug!("Undo: nothing left to restore, dropping {:?} batch", kind);
            return false;
        }
        restored.reverse();

        let ids = batch_ids(&restored);
        for entry in restored.iter_mut() {
            self.broadcaster.add(&mut entry.stroke);
        }
        self.history.push_redo(UndoEntry::batch(kind, restored));
        self.notify(ChangeKind::Undone, ids);
        true
    }

    /// Redo the last undone action.
    /// Returns true if the store changed.
    pub fn redo(&mut self) -> bool {
        let Some(entry) = self.history.pop_redo() else {
            return false;
        };
        match entry {
            UndoEntry::Draw { stroke, index } => {
                let realized = match self.store.position(&stroke.id) {
                    Some(existing) => self.store.upsert(stroke.clone()).map(|_| existing),
                    None => self.store.insert(index, stroke.clone()),
                };
                let Some(index) = realized else {
                    return false;
                };
                let mut stroke = stroke;
                let id = stroke.id.clone();
                self.history.push_undo(UndoEntry::Draw {
                    stroke: stroke.clone(),
                    index,
                });
                self.notify(ChangeKind::Redone, vec![id]);
                self.broadcaster.add(&mut stroke);
                true
            }
            UndoEntry::EraseBatch { entries } => self.redo_batch(BatchKind::Erase, entries),
            UndoEntry::ClearBatch { entries } => self.redo_batch(BatchKind::Clear, entries),
        }
    }

    /// Remove a batch again, recording the indices actually removed now.
    fn redo_batch(&mut self, kind: BatchKind, entries: Vec<BatchEntry>) -> bool {
        let performed: Vec<BatchEntry> = retain_owned(entries, &self.identity)
            .into_iter()
            .filter_map(|entry| match self.store.remove_by_id(&entry.stroke.id) {
                Some((index, stroke)) => Some(BatchEntry::new(stroke, index)),
                None => {
                    log::debug!("Redo: stroke {} is gone, skipping", entry.stroke.id);
                    None
                }
            })
            .collect();
        if performed.is_empty() {
            log::debug!("Redo: nothing left to remove, dropping {:?} batch", kind);
            return false;
        }

        let ids = batch_ids(&performed);
        self.history.push_undo(UndoEntry::batch(kind, performed));
        self.notify(ChangeKind::Redone, ids.clone());
        self.broadcaster.remove(ids);
        true
    }

    // --- Messaging ---

    /// Apply one inbound message. Returns true if the store changed.
    pub fn handle_message(&mut self, raw: &Value) -> bool {
        match self.reconciler.apply(&mut self.store, raw) {
            Outcome::StateRequested { from } => {
                self.reply_state(&from);
                false
            }
            Outcome::Added(upsert) => {
                let index = match upsert {
                    Upsert::Replaced(index) | Upsert::Appended(index) => index,
                };
                let ids = self.store.get(index).map(|s| vec![s.id.clone()]).unwrap_or_default();
                self.notify(ChangeKind::Remote, ids);
                true
            }
            outcome if outcome.changed_store() => {
                self.notify(ChangeKind::Remote, Vec::new());
                true
            }
            outcome => {
                log::trace!("Inbound message changed nothing: {:?}", outcome);
                false
            }
        }
    }

    /// Parse and apply one inbound JSON message.
    pub fn handle_json(&mut self, json: &str) -> bool {
        match serde_json::from_str::<Value>(json) {
            Ok(raw) => self.handle_message(&raw),
            Err(e) => {
                log::warn!("Dropping unparseable inbound message: {}", e);
                false
            }
        }
    }

    /// Drain the channel and apply everything received.
    /// Returns how many messages changed the store.
    ///
    /// Whenever the channel reports a (re)join, peers are asked for their
    /// strokes so anything missed while away is caught up.
    pub fn pump(&mut self) -> usize {
        let inbound = self.broadcaster.poll();
        let changed = inbound.iter().filter(|raw| self.handle_message(raw)).count();
        if self.broadcaster.take_joined() {
            log::info!("Canvas {} joined its room, requesting state", self.identity);
            self.request_state();
        }
        changed
    }

    /// Ask peers for their strokes (late join).
    pub fn request_state(&mut self) -> bool {
        self.broadcaster.request_state()
    }

    fn reply_state(&mut self, target: &str) -> bool {
        if self.store.is_empty() {
            return false;
        }
        log::debug!("Sending {} strokes to {}", self.store.len(), target);
        let strokes = self.store.strokes().to_vec();
        self.broadcaster.state_snapshot(target, strokes)
    }

    /// Swap the transport, closing the previous one.
    pub fn attach_channel(&mut self, channel: Box<dyn MessageChannel>) {
        self.broadcaster.replace_channel(channel);
    }

    /// Stop sending and receiving; the canvas keeps working single-user.
    pub fn detach_channel(&mut self) {
        self.broadcaster.detach_channel();
    }

    pub fn is_connected(&self) -> bool {
        self.broadcaster.is_connected()
    }

    /// Install a hook that adds fields to every outbound message.
    pub fn set_payload_formatter<F>(&mut self, formatter: F)
    where
        F: FnMut(&WireMessage, &FormatContext<'_>) -> Result<Option<Map<String, Value>>, HookError> + 'static,
    {
        self.broadcaster.set_formatter(Some(Box::new(formatter)));
    }

    pub fn clear_payload_formatter(&mut self) {
        self.broadcaster.set_formatter(None);
    }

    /// Install a hook deciding whether inbound strokes are for this canvas.
    pub fn set_accept_predicate<F>(&mut self, accept: F)
    where
        F: FnMut(&Value, &WireMessage) -> Result<bool, HookError> + 'static,
    {
        self.reconciler.set_accept_predicate(Some(Box::new(accept)));
    }

    pub fn clear_accept_predicate(&mut self) {
        self.reconciler.set_accept_predicate(None);
    }
}

impl std::fmt::Debug for Canvas {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Canvas")
            .field("identity", &self.identity)
            .field("strokes", &self.store.len())
            .field("tool", &self.tools)
            .field("capture", &self.capture)
            .field("history", &self.history)
            .field("broadcaster", &self.broadcaster)
            .field("observers", &self.observers.len())
            .finish()
    }
}

fn too_close(stroke: &Stroke, point: Point, min_distance: f64) -> bool {
    min_distance > 0.0 && stroke.last_point().is_some_and(|last| distance(last, point) < min_distance)
}

fn batch_ids(entries: &[BatchEntry]) -> Vec<StrokeId> {
    entries.iter().map(|e| e.stroke.id.clone()).collect()
}
