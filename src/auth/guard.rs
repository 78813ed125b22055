//! Route guard for the admin shell

use super::resolver::AuthState;

pub const LOGIN_PATH: &str = "/login";
pub const DASHBOARD_PATH: &str = "/admin/dashboard";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteDecision {
    /// Resolution is still in flight
    ShowLoading,
    Render,
    Redirect(&'static str),
}

fn is_login(path: &str) -> bool {
    path.trim_end_matches('/') == LOGIN_PATH
}

/// Decide what to do with a navigation to `path` in the given state.
pub fn decide_route(state: &AuthState, path: &str) -> RouteDecision {
    let login = is_login(path);
    match state {
        AuthState::Resolving if login => RouteDecision::Render,
        AuthState::Resolving => RouteDecision::ShowLoading,
        AuthState::Unauthenticated if !login => RouteDecision::Redirect(LOGIN_PATH),
        AuthState::AuthenticatedViaProvider(_) | AuthState::AuthenticatedViaLocalSession(_) if login => {
            RouteDecision::Redirect(DASHBOARD_PATH)
        }
        _ => RouteDecision::Render,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::resolver::ProviderIdentity;

    fn signed_in() -> AuthState {
        AuthState::AuthenticatedViaProvider(ProviderIdentity {
            uid: "u".to_string(),
            email: None,
            display_name: None,
        })
    }

    #[test]
    fn test_resolving() {
        assert_eq!(decide_route(&AuthState::Resolving, "/admin/gallery"), RouteDecision::ShowLoading);
        assert_eq!(decide_route(&AuthState::Resolving, "/login"), RouteDecision::Render);
    }

    #[test]
    fn test_unauthenticated_goes_to_login() {
        assert_eq!(
            decide_route(&AuthState::Unauthenticated, "/admin/blog"),
            RouteDecision::Redirect(LOGIN_PATH)
        );
        assert_eq!(decide_route(&AuthState::Unauthenticated, "/login/"), RouteDecision::Render);
    }

    #[test]
    fn test_authenticated_skips_login() {
        assert_eq!(decide_route(&signed_in(), "/login"), RouteDecision::Redirect(DASHBOARD_PATH));
        assert_eq!(decide_route(&signed_in(), "/admin/gallery/new"), RouteDecision::Render);
    }
}
