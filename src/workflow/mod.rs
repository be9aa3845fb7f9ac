//! Command Workflow
//!
//! Turns "start batch" commands into exactly-once batch runs and follows the
//! produced items until downstream acknowledges them.
//!
//! # Operation lifecycle
//!
//! ```text
//! parent:  Initiated → Started → Finished   (all items acknowledged)
//!                         ↓
//!                       Failed              (batch could not start)
//! item:    Started → Finished               (acknowledged)
//! ```
//!
//! A parent whose acknowledgements time out stays `Started`.

pub mod commands;
pub mod error;
pub mod handler;
pub mod listeners;
pub mod service;
pub mod tracker;


pub use commands::{CommandOutcome, StartBatchCommand, StartDailyPnlCommand, StartOvernightSwapCommand};
pub use error::WorkflowError;
pub use handler::BatchCommandHandler;
pub use listeners::{ChargeListener, ChargeRouter, WasChargedRecorder};
pub use service::{Backends, CommissionService};
pub use tracker::{CompletionTracker, TrackingOutcome};
