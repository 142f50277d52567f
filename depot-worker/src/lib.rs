//! # Depot Worker Library
//!
//! Worker runtime for the Depot task core: claims task envelopes from the
//! broker, executes registered handlers inside a per-task database
//! transaction, records outcomes, and acknowledges envelopes.
//!
//! ## Modules
//!
//! - `handlers`: Task handler trait, execution context, and registry
//! - `runtime`: The claim/execute/store/acknowledge worker loop

pub mod handlers;
pub mod runtime;
