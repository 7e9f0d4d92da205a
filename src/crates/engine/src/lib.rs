//! A dependency-aware, partially-concurrent workflow execution engine.
//!
//! A client submits a node/edge graph over a WebSocket session; the engine
//! validates it, schedules nodes as their dependencies are satisfied (up to
//! a configured concurrency bound), and streams execution events back over
//! the same connection until the run completes.

pub mod api;
pub mod config;
pub mod error;
pub mod events;
pub mod executors;
pub mod graph;
pub mod result;
pub mod scheduler;
pub mod search;

pub use config::EngineConfig;
pub use error::{EngineError, Result};
pub use events::{Event, EventSink, ExecutionStats};
pub use graph::Graph;
pub use result::NodeResult;
pub use scheduler::Scheduler;
