//! Showrunner - episode workflow engine for multi-role production pipelines
//!
//! Tracks each episode through an ordered catalog of steps, keeps step state
//! consistent with collaborator subsystems, and records an audit trail of
//! every change.

pub mod activity;
pub mod app;
pub mod clock;
pub mod collaborators;
pub mod config;
pub mod crew;
pub mod engine;
pub mod logging;
pub mod notifications;
pub mod reconcile;
pub mod rest;
pub mod services;
pub mod store;
pub mod types;
pub mod workflow;
