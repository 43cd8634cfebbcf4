//! Route guard
//!
//! Decides whether a route may render given the current tenant context.
//! Public routes always proceed; everything else needs a signed-in user
//! with a resolved organization.

use serde::Serialize;

use crate::store::{TenantSnapshot, TenantState};

/// Routes that never require an organization.
pub const PUBLIC_ROUTES: &[&str] = &[
    "/",
    "/auth",
    "/auth/accept-invite",
    "/auth/reset-password",
    "/auth/update-password",
    "/setup",
];

/// What to do with a navigation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteDecision {
    /// Render the route
    Proceed,
    /// The context is still resolving
    Wait,
    /// No authenticated user
    RedirectToSignIn,
    /// The user has no organizations yet
    RedirectToSetup,
    /// Organization data failed to load; offer a retry
    RetryLoad,
}

/// Check if `path` is public. Sub-paths of a public route other than `/`
/// are public too; query strings and fragments are ignored.
pub fn is_public_route(path: &str) -> bool {
    let path = path.split(['?', '#']).next().unwrap_or_default();
    let path = match path.trim_end_matches('/') {
        "" => "/",
        trimmed => trimmed,
    };

    PUBLIC_ROUTES.iter().any(|route| {
        path == *route
            || (*route != "/"
                && path
                    .strip_prefix(route)
                    .is_some_and(|rest| rest.starts_with('/')))
    })
}

/// Decide how to handle navigation to `path`.
pub fn guard(snapshot: &TenantSnapshot, path: &str) -> RouteDecision {
    if is_public_route(path) {
        return RouteDecision::Proceed;
    }
    match snapshot.state {
        TenantState::Uninitialized | TenantState::Loading => RouteDecision::Wait,
        TenantState::SignedOut => RouteDecision::RedirectToSignIn,
        TenantState::Empty if snapshot.last_error.is_some() => RouteDecision::RetryLoad,
        TenantState::Empty => RouteDecision::RedirectToSetup,
        TenantState::Ready => RouteDecision::Proceed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::LoadError;

    fn snapshot(state: TenantState) -> TenantSnapshot {
        TenantSnapshot {
            state,
            ..TenantSnapshot::default()
        }
    }

    #[test]
    fn test_public_routes() {
        assert!(is_public_route("/"));
        assert!(is_public_route("/auth"));
        assert!(is_public_route("/auth/"));
        assert!(is_public_route("/auth/reset-password?token=abc"));
        assert!(is_public_route("/setup/step-2"));

        assert!(!is_public_route("/dashboard"));
        assert!(!is_public_route("/authority"));
        assert!(!is_public_route("/setup-wizard"));
    }

    #[test]
    fn test_public_routes_proceed_in_any_state() {
        for state in [
            TenantState::Uninitialized,
            TenantState::Loading,
            TenantState::SignedOut,
            TenantState::Empty,
        ] {
            assert_eq!(guard(&snapshot(state), "/auth"), RouteDecision::Proceed);
        }
    }

    #[test]
    fn test_private_route_decisions() {
        assert_eq!(guard(&snapshot(TenantState::Loading), "/workers"), RouteDecision::Wait);
        assert_eq!(
            guard(&snapshot(TenantState::SignedOut), "/workers"),
            RouteDecision::RedirectToSignIn
        );
        assert_eq!(
            guard(&snapshot(TenantState::Empty), "/workers"),
            RouteDecision::RedirectToSetup
        );
        assert_eq!(guard(&snapshot(TenantState::Ready), "/workers"), RouteDecision::Proceed);
    }

    #[test]
    fn test_failed_load_is_not_sent_to_setup() {
        let failed = TenantSnapshot {
            state: TenantState::Empty,
            last_error: Some(LoadError {
                code: "BACKEND_ERROR",
                message: "Backend error: connection reset".into(),
                retryable: true,
            }),
            ..TenantSnapshot::default()
        };
        assert_eq!(guard(&failed, "/dashboard"), RouteDecision::RetryLoad);
    }
}
