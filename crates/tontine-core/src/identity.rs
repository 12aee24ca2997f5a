//! Identity boundary: read-only display profiles for user ids.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::{Error, Result};
use crate::models::UserId;

/// The profile fields the core reads. Nothing else is carried.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub full_name: Option<String>,
    pub email: String,
    pub avatar_url: Option<String>,
}

impl Profile {
    pub fn new(email: impl Into<String>) -> Result<Self> {
        let email = email.into().trim().to_string();
        if !email.contains('@') {
            return Err(Error::InvalidInput(format!("{email:?} is not an email address")));
        }
        Ok(Self {
            full_name: None,
            email,
            avatar_url: None,
        })
    }

    #[must_use]
    pub fn with_full_name(mut self, name: impl Into<String>) -> Self {
        self.full_name = Some(name.into()).filter(|n: &String| !n.trim().is_empty());
        self
    }

    #[must_use]
    pub fn with_avatar_url(mut self, url: impl Into<String>) -> Self {
        self.avatar_url = Some(url.into());
        self
    }

    /// Full name when known, email otherwise.
    pub fn display_name(&self) -> &str {
        self.full_name.as_deref().unwrap_or(&self.email)
    }
}

/// Resolves user ids to profiles. The core never writes through it.
pub trait Directory: Send + Sync {
    fn profile(&self, user: &UserId) -> Result<Option<Profile>>;
}

/// Fixed in-memory directory.
#[derive(Debug, Clone, Default)]
pub struct StaticDirectory {
    profiles: HashMap<UserId, Profile>,
}

impl StaticDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, user: UserId, profile: Profile) {
        self.profiles.insert(user, profile);
    }
}

impl Directory for StaticDirectory {
    fn profile(&self, user: &UserId) -> Result<Option<Profile>> {
        Ok(self.profiles.get(user).cloned())
    }
}
