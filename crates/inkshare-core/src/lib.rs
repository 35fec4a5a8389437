//! InkShare Core Library
//!
//! Shared drawing canvas core: stroke store, ownership-scoped undo/redo,
//! remote reconciliation, broadcast and hit-testing. Rendering and the
//! transport are left to the host.

pub mod broadcast;
pub mod canvas;
pub mod capture;
pub mod channel;
pub mod config;
pub mod error;
pub mod geometry;
pub mod history;
pub mod hit_test;
pub mod input;
pub mod message;
pub mod reconcile;
pub mod store;
pub mod stroke;
pub mod sync;
pub mod tools;

pub use broadcast::{Broadcaster, FormatContext, PayloadFormatter};
pub use canvas::{Canvas, CanvasSnapshot, ChangeEvent, ChangeKind, ObserverId, StoreView};
pub use capture::{CaptureState, EraseBatch};
pub use channel::{LocalChannel, LocalHub, MessageChannel, NoopChannel};
pub use config::CanvasConfig;
pub use error::{ChannelError, ConfigError, HookError, MessageError};
pub use history::{BatchEntry, BatchKind, History, UndoEntry};
pub use input::{PointerKind, PointerMeta};
pub use message::WireMessage;
pub use reconcile::{AcceptPredicate, Ignored, Outcome, Reconciler};
pub use store::{StrokeStore, Upsert};
pub use stroke::{ParticipantId, Stroke, StrokeId};
pub use sync::{ClientFrame, ConnectionState, ServerFrame, SyncEvent};
#[cfg(not(target_arch = "wasm32"))]
pub use sync::WebSocketChannel;
pub use tools::{ToolMode, ToolSettings};

pub use kurbo::Point;
