//! Authorization policy for item operations.
//!
//! Fail-closed: anything not listed in [`check_permission`] is denied. The
//! reconciliation sweep runs with system authority and never consults this.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::items::model::Item;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Member,
    Moderator,
    Admin,
}

impl Role {
    fn is_moderator_or_admin(&self) -> bool {
        matches!(self, Role::Moderator | Role::Admin)
    }
}

/// Authenticated caller, as handed over by the token verifier
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UserClaims {
    pub user_id: String,
    pub org_id: String,
    pub role: Role,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    CreateTask,
    UpdateTask,
    DeleteTask,
    CreateAnnouncement,
    UpdateAnnouncement,
    DeleteAnnouncement,
    /// Archive with the `forced` label, bypassing the status calculation
    ForceArchiveTask,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::CreateTask => "create:task",
            Action::UpdateTask => "update:task",
            Action::DeleteTask => "delete:task",
            Action::CreateAnnouncement => "create:announcement",
            Action::UpdateAnnouncement => "update:announcement",
            Action::DeleteAnnouncement => "delete:announcement",
            Action::ForceArchiveTask => "force_archive:task",
        }
    }
}

impl FromStr for Action {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "create:task" => Ok(Action::CreateTask),
            "update:task" => Ok(Action::UpdateTask),
            "delete:task" => Ok(Action::DeleteTask),
            "create:announcement" => Ok(Action::CreateAnnouncement),
            "update:announcement" => Ok(Action::UpdateAnnouncement),
            "delete:announcement" => Ok(Action::DeleteAnnouncement),
            "force_archive:task" => Ok(Action::ForceArchiveTask),
            other => Err(format!("unknown action {}", other)),
        }
    }
}

/// Decide whether `user` may perform `action` on `resource`
pub fn check_permission(user: &UserClaims, action: Action, resource: Option<&Item>) -> bool {
    if user.role == Role::Admin {
        return true;
    }

    match action {
        Action::CreateTask => true,
        Action::CreateAnnouncement
        | Action::UpdateAnnouncement
        | Action::DeleteAnnouncement => user.role.is_moderator_or_admin(),
        Action::UpdateTask | Action::DeleteTask => match resource {
            Some(item) => item.owner_id == user.user_id || user.role.is_moderator_or_admin(),
            None => false,
        },
        Action::ForceArchiveTask => false,
    }
}

/// String-keyed entry point for callers that receive the action verbatim;
/// unknown actions are denied
pub fn check_permission_str(user: &UserClaims, action: &str, resource: Option<&Item>) -> bool {
    match action.parse::<Action>() {
        Ok(action) => check_permission(user, action, resource),
        Err(_) => user.role == Role::Admin,
    }
}
