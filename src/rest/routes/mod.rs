//! Route handlers for the REST API.

pub mod activity;
pub mod episodes;
pub mod health;
pub mod notifications;
pub mod steps;
pub mod work_items;
