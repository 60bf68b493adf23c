//! Background services for showrunner.
//!
//! Long-running tasks that run alongside the REST server.

pub mod reconcile_job;

pub use reconcile_job::{ReconcileJob, SweepSummary};
