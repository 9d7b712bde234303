use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::Id;

/// Account row shared with the identity provider's adapter tables
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: Id,
    pub email: String,
    pub name: Option<String>,
    pub handle: Option<String>,
    pub image: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewUser {
    pub email: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub handle: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
}

impl NewUser {
    pub fn validate(&self) -> Result<()> {
        if !self.email.contains('@') {
            return Err(Error::validation("a valid email is required"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserUpdate {
    pub email: Option<String>,
    pub name: Option<String>,
    pub handle: Option<String>,
    pub image: Option<String>,
}

impl UserUpdate {
    pub fn validate(&self) -> Result<()> {
        if matches!(&self.email, Some(email) if !email.contains('@')) {
            return Err(Error::validation("a valid email is required"));
        }
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.email.is_none() && self.name.is_none() && self.handle.is_none() && self.image.is_none()
    }

    pub fn apply(self, user: &mut User) {
        if let Some(email) = self.email {
            user.email = email;
        }
        if let Some(name) = self.name {
            user.name = Some(name);
        }
        if let Some(handle) = self.handle {
            user.handle = Some(handle);
        }
        if let Some(image) = self.image {
            user.image = Some(image);
        }
    }
}
