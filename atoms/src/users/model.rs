use serde::{Deserialize, Serialize};

/// A user record from the directory; only the fields the notifier needs
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DirectoryUser {
    pub user_id: String,
    pub email: Option<String>,
    /// Organization the user belongs to, when the directory records one
    pub org_id: Option<String>,
}

/// One page of a "list all users" call
#[derive(Debug, Default, Clone)]
pub struct UserPage {
    pub users: Vec<DirectoryUser>,
    pub next_token: Option<String>,
}
