//! Sandbox core of the botscope debugger.
//!
//! [`SandboxModel`] holds the latest turn and the selected entity,
//! [`GridRenderer`] turns an entity's view into pixels and
//! [`PlaybackScheduler`] keeps the sandbox advancing. They talk to the outside
//! through an [`EventBus`] and a [`SimulationBackend`].

pub mod backend;
pub mod botview;
pub mod config;
pub mod debugger;
pub mod error;
pub mod events;
pub mod inspect;
pub mod playback;
pub mod sandbox;

pub use backend::{ReplayBackend, SimulationBackend};
pub use botview::{Cell, Frame, GridRenderer, Rgb};
pub use config::DebuggerConfig;
pub use debugger::Debugger;
pub use error::{AdvanceError, BackendError, MalformedView, SandboxError};
pub use events::{trace_signals, EventBus, Signal, Subscription};
pub use inspect::{Inspection, Row};
pub use playback::{advance_sandbox, log_errors, ErrorHandler, PlaybackScheduler};
pub use sandbox::SandboxModel;
