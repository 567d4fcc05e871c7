use thiserror::Error;
use url::Url;

use crate::model::ids::UserId;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ProfileError {
    #[error("display name cannot be empty")]
    EmptyDisplayName,

    #[error("avatar must be an http(s) URL")]
    InvalidAvatarUrl,
}

fn normalize_avatar(avatar_url: Option<String>) -> Result<Option<String>, ProfileError> {
    let Some(raw) = avatar_url.map(|u| u.trim().to_owned()).filter(|u| !u.is_empty()) else {
        return Ok(None);
    };
    let url = Url::parse(&raw).map_err(|_| ProfileError::InvalidAvatarUrl)?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ProfileError::InvalidAvatarUrl);
    }
    Ok(Some(raw))
}

/// Public profile row kept next to the auth provider's user record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Profile {
    user_id: UserId,
    display_name: String,
    avatar_url: Option<String>,
}

impl Profile {
    /// A blank `avatar_url` means no avatar.
    ///
    /// # Errors
    ///
    /// Returns `ProfileError::EmptyDisplayName` if the name is blank, or
    /// `ProfileError::InvalidAvatarUrl` if the avatar is not an http(s) URL.
    pub fn new(
        user_id: UserId,
        display_name: impl Into<String>,
        avatar_url: Option<String>,
    ) -> Result<Self, ProfileError> {
        let display_name = display_name.into().trim().to_owned();
        if display_name.is_empty() {
            return Err(ProfileError::EmptyDisplayName);
        }
        Ok(Self {
            user_id,
            display_name,
            avatar_url: normalize_avatar(avatar_url)?,
        })
    }

    /// Derives a display name for a first sign-in: the explicit hint if
    /// present, else the local part of the email, else `"User"`.
    #[must_use]
    pub fn default_display_name(hint: Option<&str>, email: Option<&str>) -> String {
        hint.map(str::trim)
            .filter(|h| !h.is_empty())
            .or_else(|| {
                email
                    .and_then(|e| e.split('@').next())
                    .map(str::trim)
                    .filter(|local| !local.is_empty())
            })
            .unwrap_or("User")
            .to_owned()
    }

    #[must_use]
    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    #[must_use]
    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    #[must_use]
    pub fn avatar_url(&self) -> Option<&str> {
        self.avatar_url.as_deref()
    }
}
