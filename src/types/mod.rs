//! Shared identifier and role types.
//!
//! Every module in the crate speaks in these types, so ids never get mixed
//! up (an episode id cannot be passed where a user id is expected).

mod ids;
mod role;

pub use ids::{EpisodeId, NotificationId, ProgramId, UserId};
pub use role::{Actor, Role, RoleParseError};
