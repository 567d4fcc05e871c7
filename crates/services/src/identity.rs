//! Signed-in identity and change notifications.
//!
//! A new subscriber always sees `Initial` first, synchronously, followed by
//! every later change in order. Delivery happens under the state lock, so
//! callbacks must not call back into the service.

use std::sync::{Arc, Mutex, MutexGuard, Weak};

use quiz_core::model::{Profile, UserId};
use storage::repository::ProfileRepository;
use tracing::{debug, info};

use crate::error::IdentityError;

/// What the external auth provider tells us about a user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser {
    pub user_id: UserId,
    pub email: Option<String>,
    /// Provider-supplied full name, if any.
    pub display_name_hint: Option<String>,
    pub avatar_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user_id: UserId,
    pub email: Option<String>,
    pub profile: Profile,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdentityEvent {
    /// Delivered once, on subscription.
    Initial(Option<Identity>),
    SignedIn(Identity),
    /// The signed-in user's profile changed, e.g. a new avatar.
    ProfileUpdated(Identity),
    SignedOut,
}

type Callback = Box<dyn Fn(&IdentityEvent) + Send + Sync>;

#[derive(Default)]
struct State {
    current: Option<Identity>,
    next_id: u64,
    listeners: Vec<(u64, Callback)>,
}

impl State {
    fn publish(&self, event: &IdentityEvent) {
        for (_, callback) in &self.listeners {
            callback(event);
        }
    }
}

/// Holds the current identity; cheap to clone.
#[derive(Clone)]
pub struct IdentityService {
    profiles: Arc<dyn ProfileRepository>,
    state: Arc<Mutex<State>>,
}

impl IdentityService {
    #[must_use]
    pub fn new(profiles: Arc<dyn ProfileRepository>) -> Self {
        Self {
            profiles,
            state: Arc::new(Mutex::new(State::default())),
        }
    }

    /// # Errors
    ///
    /// Returns `IdentityError::Poisoned` if a callback panicked earlier.
    pub fn current(&self) -> Result<Option<Identity>, IdentityError> {
        Ok(self.lock()?.current.clone())
    }

    /// Registers `callback` and immediately delivers `Initial(current)` to it.
    ///
    /// Later events reach subscribers in registration order. Dropping the
    /// returned subscription unsubscribes.
    ///
    /// # Errors
    ///
    /// Returns `IdentityError::Poisoned` if a callback panicked earlier.
    pub fn on_identity_change<F>(&self, callback: F) -> Result<IdentitySubscription, IdentityError>
    where
        F: Fn(&IdentityEvent) + Send + Sync + 'static,
    {
        let mut state = self.lock()?;
        callback(&IdentityEvent::Initial(state.current.clone()));

        let id = state.next_id;
        state.next_id += 1;
        state.listeners.push((id, Box::new(callback)));
        debug!(subscription = id, "identity subscriber added");

        Ok(IdentitySubscription {
            id,
            state: Arc::downgrade(&self.state),
        })
    }

    /// Loads or creates the user's profile, then publishes `SignedIn`.
    ///
    /// # Errors
    ///
    /// Returns `IdentityError::Storage` if the profile cannot be read or written,
    /// `IdentityError::Profile` if no valid display name can be derived.
    pub async fn sign_in(&self, user: AuthUser) -> Result<Identity, IdentityError> {
        let profile = match self.profiles.get_profile(user.user_id).await? {
            Some(profile) => profile,
            None => {
                let name = Profile::default_display_name(
                    user.display_name_hint.as_deref(),
                    user.email.as_deref(),
                );
                let profile = Profile::new(user.user_id, name, user.avatar_url.clone())?;
                self.profiles.upsert_profile(&profile).await?;
                info!(user_id = %user.user_id, "profile created");
                profile
            }
        };

        let identity = Identity {
            user_id: user.user_id,
            email: user.email,
            profile,
        };

        let mut state = self.lock()?;
        state.current = Some(identity.clone());
        state.publish(&IdentityEvent::SignedIn(identity.clone()));
        info!(user_id = %identity.user_id, "signed in");
        Ok(identity)
    }

    /// Replaces the signed-in user's avatar (`None` removes it) and publishes
    /// `ProfileUpdated`.
    ///
    /// # Errors
    ///
    /// Returns `IdentityError::NotSignedIn` without a current identity,
    /// `IdentityError::Profile` if the URL is not an http(s) URL, or
    /// `IdentityError::Storage` if the profile cannot be written.
    pub async fn update_avatar(&self, avatar_url: Option<String>) -> Result<Identity, IdentityError> {
        let current = self.current()?.ok_or(IdentityError::NotSignedIn)?;
        let profile = Profile::new(
            current.user_id,
            current.profile.display_name(),
            avatar_url,
        )?;
        self.profiles.upsert_profile(&profile).await?;

        let identity = Identity { profile, ..current };
        let mut state = self.lock()?;
        // A sign-out or switch during the write wins; the row is still saved.
        let still_current = state
            .current
            .as_ref()
            .is_some_and(|c| c.user_id == identity.user_id);
        if still_current {
            state.current = Some(identity.clone());
            state.publish(&IdentityEvent::ProfileUpdated(identity.clone()));
            info!(user_id = %identity.user_id, "avatar updated");
        }
        Ok(identity)
    }

    /// Returns whether anyone was signed in. No event fires otherwise.
    ///
    /// # Errors
    ///
    /// Returns `IdentityError::Poisoned` if a callback panicked earlier.
    pub fn sign_out(&self) -> Result<bool, IdentityError> {
        let mut state = self.lock()?;
        let Some(previous) = state.current.take() else {
            return Ok(false);
        };
        state.publish(&IdentityEvent::SignedOut);
        info!(user_id = %previous.user_id, "signed out");
        Ok(true)
    }

    fn lock(&self) -> Result<MutexGuard<'_, State>, IdentityError> {
        self.state.lock().map_err(|_| IdentityError::Poisoned)
    }
}

/// Unsubscribes on drop.
#[must_use = "dropping the subscription unsubscribes immediately"]
pub struct IdentitySubscription {
    id: u64,
    state: Weak<Mutex<State>>,
}

impl IdentitySubscription {
    /// Explicit form of dropping.
    pub fn unsubscribe(self) {}
}

impl Drop for IdentitySubscription {
    fn drop(&mut self) {
        let Some(state) = self.state.upgrade() else {
            return;
        };
        if let Ok(mut state) = state.lock() {
            state.listeners.retain(|(id, _)| *id != self.id);
        }
    }
}

impl std::fmt::Debug for IdentitySubscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdentitySubscription")
            .field("id", &self.id)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use storage::repository::InMemoryRepository;

    fn auth_user(email: &str) -> AuthUser {
        AuthUser {
            user_id: UserId::random(),
            email: Some(email.to_owned()),
            display_name_hint: None,
            avatar_url: None,
        }
    }

    #[tokio::test]
    async fn sign_in_creates_profile_once() {
        let repo = InMemoryRepository::new();
        let service = IdentityService::new(Arc::new(repo.clone()));
        let user = auth_user("ada@example.com");

        let identity = service.sign_in(user.clone()).await.unwrap();
        assert_eq!(identity.profile.display_name(), "ada");

        let renamed = Profile::new(user.user_id, "Ada L.", None).unwrap();
        repo.upsert_profile(&renamed).await.unwrap();

        let again = service.sign_in(user).await.unwrap();
        assert_eq!(again.profile.display_name(), "Ada L.");
    }

    #[tokio::test]
    async fn sign_out_without_identity_is_silent() {
        let service = IdentityService::new(Arc::new(InMemoryRepository::new()));
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let _sub = service
            .on_identity_change(move |e| sink.lock().unwrap().push(e.clone()))
            .unwrap();

        assert!(!service.sign_out().unwrap());
        assert_eq!(*seen.lock().unwrap(), vec![IdentityEvent::Initial(None)]);
    }

    #[tokio::test]
    async fn avatar_update_persists_and_republishes() {
        let repo = InMemoryRepository::new();
        let service = IdentityService::new(Arc::new(repo.clone()));
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let _sub = service
            .on_identity_change(move |e| sink.lock().unwrap().push(e.clone()))
            .unwrap();

        assert!(matches!(
            service.update_avatar(Some("https://x.org/a.png".into())).await,
            Err(IdentityError::NotSignedIn)
        ));

        let user = auth_user("ada@example.com");
        service.sign_in(user.clone()).await.unwrap();
        let updated = service
            .update_avatar(Some("https://cdn.example.org/ada.png".into()))
            .await
            .unwrap();
        assert_eq!(updated.profile.avatar_url(), Some("https://cdn.example.org/ada.png"));
        assert_eq!(updated.profile.display_name(), "ada");

        let stored = repo.get_profile(user.user_id).await.unwrap().unwrap();
        assert_eq!(stored.avatar_url(), Some("https://cdn.example.org/ada.png"));
        assert_eq!(service.current().unwrap(), Some(updated.clone()));

        let err = service.update_avatar(Some("ftp://x.org/a.png".into())).await;
        assert!(matches!(err, Err(IdentityError::Profile(_))));
        assert_eq!(
            repo.get_profile(user.user_id).await.unwrap().unwrap().avatar_url(),
            Some("https://cdn.example.org/ada.png")
        );

        let cleared = service.update_avatar(None).await.unwrap();
        assert_eq!(cleared.profile.avatar_url(), None);

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 4);
        assert_eq!(seen[2], IdentityEvent::ProfileUpdated(updated));
        assert_eq!(seen[3], IdentityEvent::ProfileUpdated(cleared));
    }

    #[tokio::test]
    async fn dropped_subscription_stops_receiving() {
        let service = IdentityService::new(Arc::new(InMemoryRepository::new()));
        let seen = Arc::new(Mutex::new(0_u32));
        let sink = Arc::clone(&seen);
        let sub = service
            .on_identity_change(move |_| *sink.lock().unwrap() += 1)
            .unwrap();
        sub.unsubscribe();

        service.sign_in(auth_user("bob@example.com")).await.unwrap();
        assert_eq!(*seen.lock().unwrap(), 1);
    }
}
