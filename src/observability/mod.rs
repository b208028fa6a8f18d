//! Observability
//!
//! Logging, metrics, and the structured game event stream.

pub mod events;
pub mod logging;
pub mod metrics;

pub use events::{EventEmitter, GameEvent};
pub use logging::{LogFormat, init_logging};
pub use metrics::init_metrics;
