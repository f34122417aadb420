//! Player State Coordinator
//!
//! Event-driven state machine owning the canonical playback Context.
//! Producers (UI, native engine, lifecycle, sync) push events onto the
//! [`bus`]; the [`Coordinator`] processes them one at a time against the
//! [`transitions`] table and republishes the Context to subscribers.

pub mod bus;
pub mod context;
mod core;
pub mod diagnostics;
mod handle;
mod handlers;
mod lifecycle;
pub mod subscriber;
pub mod transitions;

pub use self::core::{Collaborators, Coordinator};
pub use bus::{EventInbox, EventSender, EventSource};
pub use context::{PlayerErrorInfo, PositionJumpNotice, StateContext};
pub use diagnostics::{Diagnostics, DiagnosticsExport, DiagnosticsMetrics, TransitionHistoryEntry};
pub use handle::CoordinatorHandle;
pub use subscriber::{StateSubscriber, SubscriptionId};
pub use transitions::Transition;
