//! Umbrella crate for botscope.
//!
//! Re-exports the sandbox engine and its wire types under one name, so a
//! frontend can depend on `botscope` alone.

pub use botscope_engine as engine;
pub use botscope_protocol as protocol;

pub use botscope_engine::{Debugger, DebuggerConfig, EventBus, GridRenderer, SandboxModel, Signal};
pub use botscope_protocol::{Entity, Snapshot};
