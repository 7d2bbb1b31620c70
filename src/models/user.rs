//! User models

use serde::{Deserialize, Serialize};

/// Signed-in CMS user as returned by `login` and `me`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurrentUser {
    pub id: String,
    pub email: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
}
