//! Membership row.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use tator_core::types::{ProjectId, UserId};

/// A user's membership in a project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Membership {
    /// Member.
    pub user_id: UserId,
    /// Project the user belongs to.
    pub project_id: ProjectId,
}
