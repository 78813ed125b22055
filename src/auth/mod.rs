//! Authentication
//!
//! Staff can be signed in through the external identity provider or with a
//! local username/password session. Every request resolves both sources
//! concurrently and feeds the results, in completion order, into a fresh
//! `SessionResolver`. The resolver's effects are then applied: session rows
//! are deleted or inserted and the matching cookies set or cleared.

pub mod guard;
pub mod provider;
pub mod resolver;

use chrono::{Duration, Utc};
use futures::future::BoxFuture;
use futures::stream::{FuturesUnordered, StreamExt};
use futures::FutureExt;
use std::collections::BTreeMap;
use std::net::IpAddr;
use std::sync::Arc;

use crate::config::AuthConfig;
use crate::db::repositories::SessionRepository;
use crate::models::{Session, User};
use crate::services::credentials::{CredentialError, CredentialService};
use crate::services::rate_limiter::LoginRateLimiter;

pub use guard::{decide_route, RouteDecision, DASHBOARD_PATH, LOGIN_PATH};
pub use provider::{DisabledProvider, DynIdentityProvider, FirebaseIdentityProvider, IdentityProvider};
pub use resolver::{
    AuthEffect, AuthEvent, AuthState, EffectiveUser, LocalSession, ProviderIdentity, SessionResolver, SessionUser,
};

/// Cookie holding the local session token
pub const SESSION_COOKIE: &str = "session";
/// Cookie holding the provider's ID token
pub const PROVIDER_COOKIE: &str = "provider_token";

/// Error types for authentication
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Invalid username or password.")]
    InvalidCredentials,

    #[error("Too many login attempts. Please try again later.")]
    RateLimited,

    #[error(transparent)]
    Credential(#[from] CredentialError),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

/// Tokens presented by a request
#[derive(Debug, Clone, Copy, Default)]
pub struct RequestTokens<'a> {
    pub provider: Option<&'a str>,
    pub session: Option<&'a str>,
}

/// Resolved state plus the `Set-Cookie` values the response must carry
#[derive(Debug, Clone)]
pub struct Resolution {
    pub state: AuthState,
    pub cookies: Vec<String>,
}

/// Successful local login
#[derive(Debug, Clone)]
pub struct LoginOutcome {
    pub user: EffectiveUser,
    pub cookies: Vec<String>,
}

/// Authentication service
pub struct AuthService {
    credentials: Arc<CredentialService>,
    sessions: Arc<dyn SessionRepository>,
    provider: DynIdentityProvider,
    rate_limiter: Arc<LoginRateLimiter>,
    session_lifetime: Duration,
    secure_cookies: bool,
}

impl AuthService {
    pub fn new(
        credentials: Arc<CredentialService>,
        sessions: Arc<dyn SessionRepository>,
        provider: DynIdentityProvider,
        config: &AuthConfig,
    ) -> Self {
        Self {
            credentials,
            sessions,
            provider,
            rate_limiter: Arc::new(LoginRateLimiter::new()),
            session_lifetime: Duration::days(config.session_days),
            secure_cookies: config.secure_cookies,
        }
    }

    /// Work out who, if anyone, is signed in.
    pub async fn resolve(&self, tokens: RequestTokens<'_>) -> Result<Resolution, AuthError> {
        let (resolver, effects) = self.run_checks(tokens).await?;
        let cookies = self.execute(effects, tokens).await?;
        Ok(Resolution {
            state: resolver.state().clone(),
            cookies,
        })
    }

    /// Check credentials and start a local session.
    pub async fn login(
        &self,
        username: &str,
        password: &str,
        ip: Option<IpAddr>,
        tokens: RequestTokens<'_>,
    ) -> Result<LoginOutcome, AuthError> {
        if let Some(ip) = ip {
            if self.rate_limiter.is_ip_limited(ip).await {
                tracing::warn!("Login rate limit hit for {}", ip);
                return Err(AuthError::RateLimited);
            }
            self.rate_limiter.record_ip_request(ip).await;
        }
        if self.rate_limiter.is_username_limited(username).await {
            tracing::warn!("Login rate limit hit for user {}", username);
            return Err(AuthError::RateLimited);
        }

        let Some(user) = self.credentials.verify(username, password).await? else {
            self.rate_limiter.record_failed_attempt(username).await;
            return Err(AuthError::InvalidCredentials);
        };
        self.rate_limiter.clear_username_attempts(username).await;

        let (mut resolver, mut effects) = self.run_checks(tokens).await?;
        let session = self.new_local_session(&user);
        effects.extend(resolver.apply(AuthEvent::LocalLoginSucceeded(session), Utc::now()));
        let cookies = self.execute(effects, tokens).await?;

        let user = resolver
            .state()
            .effective_user()
            .ok_or_else(|| anyhow::anyhow!("session missing after login"))?;
        tracing::info!("User {} signed in", username);
        Ok(LoginOutcome { user, cookies })
    }

    /// End both sessions. Returns the cookies to clear.
    pub async fn logout(&self, tokens: RequestTokens<'_>) -> Result<Vec<String>, AuthError> {
        let (mut resolver, mut effects) = self.run_checks(tokens).await?;
        effects.extend(resolver.apply(AuthEvent::LogoutRequested, Utc::now()));
        self.execute(effects, tokens).await
    }

    /// Prune the rate limiter and delete expired sessions.
    pub async fn cleanup(&self) -> Result<u64, AuthError> {
        let tracked = self.rate_limiter.cleanup().await;
        let removed = self.sessions.delete_expired(Utc::now()).await?;
        tracing::debug!("Auth cleanup: {} expired session(s) removed, {} rate-limit key(s) kept", removed, tracked);
        Ok(removed)
    }

    fn new_local_session(&self, user: &User) -> LocalSession {
        let row = Session::start(user.id.clone(), Utc::now(), self.session_lifetime);
        LocalSession {
            token: row.id,
            user: SessionUser::from(user),
            expires_at: row.expires_at,
        }
    }

    /// Race the provider check against the local session read.
    async fn run_checks(&self, tokens: RequestTokens<'_>) -> Result<(SessionResolver, Vec<AuthEffect>), AuthError> {
        let mut checks: FuturesUnordered<BoxFuture<'_, Result<AuthEvent, AuthError>>> = FuturesUnordered::new();
        checks.push(
            async move { Ok(AuthEvent::ProviderReported(self.check_provider(tokens.provider).await)) }.boxed(),
        );
        checks.push(
            async move {
                self.load_local(tokens.session)
                    .await
                    .map(AuthEvent::LocalSessionLoaded)
            }
            .boxed(),
        );

        let now = Utc::now();
        let mut resolver = SessionResolver::new();
        let mut effects = Vec::new();
        while let Some(event) = checks.next().await {
            effects.extend(resolver.apply(event?, now));
        }
        // the local session may have lapsed while the provider was answering
        effects.extend(resolver.apply(AuthEvent::Revalidate, Utc::now()));
        Ok((resolver, effects))
    }

    async fn check_provider(&self, token: Option<&str>) -> Option<ProviderIdentity> {
        let token = token.filter(|t| !t.is_empty())?;
        match self.provider.verify(token).await {
            Ok(identity) => identity,
            Err(e) => {
                tracing::warn!("Identity provider check failed: {}", e);
                None
            }
        }
    }

    async fn load_local(&self, token: Option<&str>) -> Result<Option<LocalSession>, AuthError> {
        let Some(token) = token.filter(|t| !t.is_empty()) else {
            return Ok(None);
        };
        let Some(row) = self.sessions.get_by_id(token).await? else {
            return Ok(None);
        };
        let Some(user) = self.credentials.get(&row.user_id).await? else {
            tracing::debug!("Session {} belongs to a deleted user", token);
            return Ok(None);
        };
        Ok(Some(LocalSession {
            token: row.id,
            user: SessionUser::from(&user),
            expires_at: row.expires_at,
        }))
    }

    /// Apply effects; later cookie values for the same name replace earlier ones.
    async fn execute(&self, effects: Vec<AuthEffect>, tokens: RequestTokens<'_>) -> Result<Vec<String>, AuthError> {
        let mut cookies: BTreeMap<&'static str, String> = BTreeMap::new();
        let mut purged = false;

        for effect in effects {
            match effect {
                AuthEffect::PurgeLocalSession => {
                    if let (Some(token), false) = (tokens.session, purged) {
                        self.sessions.delete(token).await?;
                        tracing::debug!("Purged local session");
                    }
                    purged = true;
                    if tokens.session.is_some() {
                        cookies.insert(SESSION_COOKIE, self.clear_cookie(SESSION_COOKIE));
                    }
                }
                AuthEffect::SignOutProvider => {
                    cookies.insert(PROVIDER_COOKIE, self.clear_cookie(PROVIDER_COOKIE));
                }
                AuthEffect::PersistLocalSession(session) => {
                    if let (Some(old), false) = (tokens.session, purged) {
                        self.sessions.delete(old).await?;
                        purged = true;
                    }
                    let row = Session {
                        id: session.token.clone(),
                        user_id: session.user.id.clone(),
                        expires_at: session.expires_at,
                        created_at: Utc::now(),
                    };
                    self.sessions.create(&row).await?;
                    cookies.insert(SESSION_COOKIE, self.session_cookie(&session.token));
                }
            }
        }

        Ok(cookies.into_values().collect())
    }

    fn cookie_attrs(&self) -> &'static str {
        if self.secure_cookies {
            "Path=/; HttpOnly; SameSite=Lax; Secure"
        } else {
            "Path=/; HttpOnly; SameSite=Lax"
        }
    }

    fn session_cookie(&self, token: &str) -> String {
        format!(
            "{}={}; {}; Max-Age={}",
            SESSION_COOKIE,
            token,
            self.cookie_attrs(),
            self.session_lifetime.num_seconds()
        )
    }

    fn clear_cookie(&self, name: &str) -> String {
        format!("{}=; {}; Max-Age=0", name, self.cookie_attrs())
    }
}
