//! Session resolution
//!
//! Two independent sources can say who is signed in: the external identity
//! provider and the locally persisted session. `SessionResolver` folds their
//! reports into one `AuthState` and tells the caller which side effects to
//! run. It does no I/O itself.
//!
//! Rules:
//! - the state stays `Resolving` until both sources have reported
//! - a provider identity always wins and purges the local session
//! - a local session with `expires_at <= now` counts as absent
//! - a local login ends any active provider session

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::User;

/// Identity vouched for by the external provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderIdentity {
    pub uid: String,
    pub email: Option<String>,
    pub display_name: Option<String>,
}

/// Public part of a staff account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionUser {
    pub id: String,
    pub username: String,
    pub name: String,
}

impl From<&User> for SessionUser {
    fn from(user: &User) -> Self {
        Self {
            id: user.id.clone(),
            username: user.username.clone(),
            name: user.name.clone(),
        }
    }
}

/// A custom username/password session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalSession {
    pub token: String,
    pub user: SessionUser,
    pub expires_at: DateTime<Utc>,
}

impl LocalSession {
    /// Live strictly before `expires_at`
    pub fn is_live_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at > now
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthState {
    Resolving,
    Unauthenticated,
    AuthenticatedViaProvider(ProviderIdentity),
    AuthenticatedViaLocalSession(LocalSession),
}

impl AuthState {
    pub fn is_authenticated(&self) -> bool {
        matches!(
            self,
            AuthState::AuthenticatedViaProvider(_) | AuthState::AuthenticatedViaLocalSession(_)
        )
    }

    pub fn effective_user(&self) -> Option<EffectiveUser> {
        match self {
            AuthState::AuthenticatedViaProvider(identity) => Some(EffectiveUser::Provider(identity.clone())),
            AuthState::AuthenticatedViaLocalSession(session) => Some(EffectiveUser::Local {
                user: session.user.clone(),
                expires_at: session.expires_at,
            }),
            AuthState::Resolving | AuthState::Unauthenticated => None,
        }
    }
}

/// The one identity selected between the two sources
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase", rename_all_fields = "camelCase")]
pub enum EffectiveUser {
    Provider(ProviderIdentity),
    Local {
        user: SessionUser,
        expires_at: DateTime<Utc>,
    },
}

impl EffectiveUser {
    /// Name suitable for greeting the user
    pub fn display_name(&self) -> &str {
        match self {
            EffectiveUser::Provider(identity) => identity
                .display_name
                .as_deref()
                .or(identity.email.as_deref())
                .unwrap_or(&identity.uid),
            EffectiveUser::Local { user, .. } => &user.name,
        }
    }
}

#[derive(Debug, Clone)]
pub enum AuthEvent {
    /// The provider check finished; `None` means nobody is signed in there
    ProviderReported(Option<ProviderIdentity>),
    /// The persisted local session was read; `None` means there is none
    LocalSessionLoaded(Option<LocalSession>),
    LogoutRequested,
    LocalLoginSucceeded(LocalSession),
    /// Re-check the held local session's expiry
    Revalidate,
}

/// Work the caller must carry out after an event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthEffect {
    PurgeLocalSession,
    SignOutProvider,
    PersistLocalSession(LocalSession),
}

/// Per-request session state machine
#[derive(Debug, Clone)]
pub struct SessionResolver {
    state: AuthState,
    // outer None: the source has not reported yet
    provider: Option<Option<ProviderIdentity>>,
    local: Option<Option<LocalSession>>,
}

impl Default for SessionResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionResolver {
    pub fn new() -> Self {
        Self {
            state: AuthState::Resolving,
            provider: None,
            local: None,
        }
    }

    pub fn state(&self) -> &AuthState {
        &self.state
    }

    fn provider_identity(&self) -> Option<&ProviderIdentity> {
        self.provider.as_ref().and_then(Option::as_ref)
    }

    fn held_local(&self) -> Option<&LocalSession> {
        self.local.as_ref().and_then(Option::as_ref)
    }

    /// Feed one event and return the effects it requires.
    pub fn apply(&mut self, event: AuthEvent, now: DateTime<Utc>) -> Vec<AuthEffect> {
        let mut effects = Vec::new();

        match event {
            AuthEvent::ProviderReported(identity) => {
                if identity.is_some() && self.held_local().is_some() {
                    effects.push(AuthEffect::PurgeLocalSession);
                    self.local = Some(None);
                }
                self.provider = Some(identity);
            }
            AuthEvent::LocalSessionLoaded(session) => {
                let usable = match session {
                    Some(s) if !s.is_live_at(now) => {
                        effects.push(AuthEffect::PurgeLocalSession);
                        None
                    }
                    Some(_) if self.provider_identity().is_some() => {
                        effects.push(AuthEffect::PurgeLocalSession);
                        None
                    }
                    other => other,
                };
                self.local = Some(usable);
            }
            AuthEvent::LogoutRequested => {
                effects.push(AuthEffect::PurgeLocalSession);
                if self.provider_identity().is_some() {
                    effects.push(AuthEffect::SignOutProvider);
                }
                self.provider = Some(None);
                self.local = Some(None);
            }
            AuthEvent::LocalLoginSucceeded(session) => {
                if self.provider_identity().is_some() {
                    effects.push(AuthEffect::SignOutProvider);
                }
                effects.push(AuthEffect::PersistLocalSession(session.clone()));
                self.provider = Some(None);
                self.local = Some(Some(session));
            }
            AuthEvent::Revalidate => {
                if self.held_local().is_some_and(|s| !s.is_live_at(now)) {
                    effects.push(AuthEffect::PurgeLocalSession);
                    self.local = Some(None);
                }
            }
        }

        self.state = self.derive_state();
        effects
    }

    fn derive_state(&self) -> AuthState {
        match (&self.provider, &self.local) {
            (Some(Some(identity)), Some(_)) => AuthState::AuthenticatedViaProvider(identity.clone()),
            (Some(None), Some(Some(session))) => AuthState::AuthenticatedViaLocalSession(session.clone()),
            (Some(None), Some(None)) => AuthState::Unauthenticated,
            _ => AuthState::Resolving,
        }
    }
}
