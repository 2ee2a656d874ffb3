//! In-memory directory for testing

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;

use super::model::{DirectoryUser, UserPage};
use super::service::Directory;
use crate::error::{BoardError, Result};

#[derive(Default)]
struct DirectoryState {
    users: Vec<DirectoryUser>,
    unavailable: bool,
    flaky_lookups: HashSet<String>,
}

#[derive(Clone)]
pub struct MemoryDirectory {
    state: Arc<RwLock<DirectoryState>>,
    page_size: usize,
}

impl Default for MemoryDirectory {
    fn default() -> Self {
        Self::with_page_size(60)
    }
}

impl MemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page_size(page_size: usize) -> Self {
        Self {
            state: Arc::new(RwLock::new(DirectoryState::default())),
            page_size: page_size.max(1),
        }
    }

    pub fn add_user(&self, org_id: &str, user_id: &str, email: Option<&str>) {
        self.state.write().users.push(DirectoryUser {
            user_id: user_id.to_string(),
            email: email.map(|e| e.to_string()),
            org_id: Some(org_id.to_string()),
        });
    }

    /// Every directory call fails while set
    pub fn set_unavailable(&self, unavailable: bool) {
        self.state.write().unavailable = unavailable;
    }

    /// Lookups for this user fail with a transient error
    pub fn fail_lookup_for(&self, user_id: &str) {
        self.state.write().flaky_lookups.insert(user_id.to_string());
    }
}

#[async_trait]
impl Directory for MemoryDirectory {
    async fn email_for(&self, user_id: &str) -> Result<Option<String>> {
        let state = self.state.read();
        if state.unavailable || state.flaky_lookups.contains(user_id) {
            return Err(BoardError::directory("simulated directory outage"));
        }
        Ok(state
            .users
            .iter()
            .find(|u| u.user_id == user_id)
            .and_then(|u| u.email.clone()))
    }

    /// Pages over the whole directory and filters each page, like the user pool
    async fn list_users(&self, org_id: &str, next_token: Option<String>) -> Result<UserPage> {
        let state = self.state.read();
        if state.unavailable {
            return Err(BoardError::directory("simulated directory outage"));
        }
        let offset = next_token.and_then(|t| t.parse::<usize>().ok()).unwrap_or(0);
        let end = (offset + self.page_size).min(state.users.len());
        Ok(UserPage {
            users: state.users[offset.min(end)..end]
                .iter()
                .filter(|u| u.org_id.as_deref() == Some(org_id))
                .cloned()
                .collect(),
            next_token: (end < state.users.len()).then(|| end.to_string()),
        })
    }
}
