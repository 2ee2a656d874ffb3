use async_trait::async_trait;
use aws_sdk_cognitoidentityprovider::types::AttributeType;
use aws_sdk_cognitoidentityprovider::Client as CognitoClient;

use super::model::{DirectoryUser, UserPage};
use crate::error::{BoardError, Result};

/// Cognito caps ListUsers pages at 60
pub const DIRECTORY_PAGE_LIMIT: i32 = 60;

/// Custom user-pool attribute holding the user's organization id
pub const ORG_ATTRIBUTE: &str = "custom:orgId";

/// Recipient lookup over the organization's user directory
#[async_trait]
pub trait Directory: Send + Sync {
    /// Email address for a user id; `None` when the user or the address is unknown
    async fn email_for(&self, user_id: &str) -> Result<Option<String>>;

    /// One page of the users belonging to `org_id`; pass the previous page's
    /// token to continue. A page may be empty while a token is still returned.
    async fn list_users(&self, org_id: &str, next_token: Option<String>) -> Result<UserPage>;
}

/// Cognito user pool directory
#[derive(Clone)]
pub struct CognitoDirectory {
    client: CognitoClient,
    user_pool_id: String,
}

impl std::fmt::Debug for CognitoDirectory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CognitoDirectory")
            .field("user_pool_id", &self.user_pool_id)
            .finish()
    }
}

impl CognitoDirectory {
    pub fn new(client: CognitoClient, user_pool_id: impl Into<String>) -> Self {
        Self {
            client,
            user_pool_id: user_pool_id.into(),
        }
    }
}

fn attribute<'a>(attributes: &'a [AttributeType], name: &str) -> Option<&'a str> {
    attributes
        .iter()
        .find(|a| a.name() == name)
        .and_then(|a| a.value())
        .filter(|v| !v.trim().is_empty())
}

#[async_trait]
impl Directory for CognitoDirectory {
    async fn email_for(&self, user_id: &str) -> Result<Option<String>> {
        let result = self
            .client
            .admin_get_user()
            .user_pool_id(&self.user_pool_id)
            .username(user_id)
            .send()
            .await;

        match result {
            Ok(output) => Ok(attribute(output.user_attributes(), "email").map(|s| s.to_string())),
            Err(e)
                if e
                    .as_service_error()
                    .map(|se| se.is_user_not_found_exception())
                    .unwrap_or(false) =>
            {
                tracing::warn!(user_id, "User not found in directory");
                Ok(None)
            }
            Err(e) => Err(BoardError::directory(format!("admin_get_user failed: {}", e))),
        }
    }

    async fn list_users(&self, org_id: &str, next_token: Option<String>) -> Result<UserPage> {
        let output = self
            .client
            .list_users()
            .user_pool_id(&self.user_pool_id)
            .limit(DIRECTORY_PAGE_LIMIT)
            .set_pagination_token(next_token)
            .send()
            .await
            .map_err(|e| BoardError::directory(format!("list_users failed: {}", e)))?;

        // ListUsers filters only on standard attributes, so custom org
        // membership is matched here
        let users = output
            .users()
            .iter()
            .filter_map(|user| {
                let attributes = user.attributes();
                if attribute(attributes, ORG_ATTRIBUTE) != Some(org_id) {
                    return None;
                }
                let user_id = attribute(attributes, "sub").or(user.username())?;
                Some(DirectoryUser {
                    user_id: user_id.to_string(),
                    email: attribute(attributes, "email").map(|s| s.to_string()),
                    org_id: Some(org_id.to_string()),
                })
            })
            .collect();

        Ok(UserPage {
            users,
            next_token: output
                .pagination_token()
                .filter(|t| !t.is_empty())
                .map(|t| t.to_string()),
        })
    }
}
