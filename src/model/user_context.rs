use serde::{Deserialize, Serialize};

use crate::model::Id;

/// Identity carried by a validated session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserIdentity {
    pub user_id: Id,
    pub handle: Option<String>,
    pub name: Option<String>,
    pub email: Option<String>,
}

impl UserIdentity {
    /// Create a new UserIdentity with just a user ID
    pub fn new(user_id: Id) -> Self {
        Self {
            user_id,
            handle: None,
            name: None,
            email: None,
        }
    }

    /// Create a UserIdentity with full session details
    pub fn with_details(
        user_id: Id,
        handle: Option<String>,
        name: Option<String>,
        email: Option<String>,
    ) -> Self {
        Self {
            user_id,
            handle,
            name,
            email,
        }
    }
}
