//! Type and role gates
//!
//! Run after the auth middleware. A failed gate is a 403, never a login
//! redirect: the user is signed in, just not allowed.

use axum::{
    extract::State,
    http::Request,
    middleware::Next,
    response::Response,
};

use super::middleware::principal_from;
use super::pipeline::Principal;
use crate::data::UserType;
use crate::error::AppError;
use crate::metrics::AUTHZ_DENIED_TOTAL;

/// Access rule for a group of routes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gate {
    /// Directory type must equal this tier exactly
    Type(UserType),
    /// Some effective role must be at least this tier
    Role(UserType),
}

impl Gate {
    pub fn required(self) -> UserType {
        match self {
            Gate::Type(tier) | Gate::Role(tier) => tier,
        }
    }

    pub fn allows(self, principal: &Principal) -> bool {
        match self {
            Gate::Type(tier) => principal.user.user_type == tier,
            Gate::Role(min) => principal.has_role_at_least(min),
        }
    }

    /// # Errors
    /// Returns `AppError::Forbidden` naming the principal and the tier
    pub fn check(self, principal: &Principal) -> Result<(), AppError> {
        if self.allows(principal) {
            return Ok(());
        }

        AUTHZ_DENIED_TOTAL
            .with_label_values(&[self.required().as_str()])
            .inc();
        tracing::info!(
            remote_id = %principal.remote_id,
            gate = ?self,
            "Access denied"
        );
        Err(AppError::Forbidden {
            principal: principal.remote_id.clone(),
            required: self.required(),
        })
    }
}

/// Middleware enforcing a [`Gate`]
///
/// # Usage
/// ```ignore
/// Router::new()
///     .route("/volunteers", get(list_volunteers))
///     .route_layer(middleware::from_fn_with_state(Gate::Type(UserType::Admin), require_gate))
///     .route_layer(middleware::from_fn_with_state(state, require_login));
/// ```
pub async fn require_gate(
    State(gate): State<Gate>,
    request: Request<axum::body::Body>,
    next: Next,
) -> Result<Response, AppError> {
    let principal = principal_from(request.extensions())?;
    gate.check(&principal)?;
    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{User, UserStatus};

    fn principal(user_type: UserType, roles: Vec<UserType>) -> Principal {
        let user = User::new("Jo", "jo@example.com", UserStatus::Active, user_type);
        Principal::new("user-test-jo", user, roles)
    }

    #[test]
    fn type_gate_requires_exact_match() {
        let admin = principal(UserType::Admin, Vec::new());
        let volunteer = principal(UserType::Volunteer, vec![UserType::Admin]);

        assert!(Gate::Type(UserType::Admin).check(&admin).is_ok());
        assert!(!Gate::Type(UserType::Volunteer).allows(&admin));
        assert!(!Gate::Type(UserType::Admin).allows(&volunteer));
    }

    #[test]
    fn role_gate_accepts_higher_tiers() {
        let volunteer = principal(UserType::Volunteer, Vec::new());

        assert!(Gate::Role(UserType::Recruit).allows(&volunteer));
        assert!(Gate::Role(UserType::Volunteer).allows(&volunteer));
        assert!(!Gate::Role(UserType::Admin).allows(&volunteer));
    }

    #[test]
    fn stored_roles_count_for_role_gates() {
        let recruit = principal(UserType::Recruit, vec![UserType::Admin]);
        assert!(Gate::Role(UserType::Admin).allows(&recruit));
    }

    #[test]
    fn denial_names_principal_and_tier() {
        let volunteer = principal(UserType::Volunteer, Vec::new());
        let error = Gate::Type(UserType::Admin).check(&volunteer).unwrap_err();
        assert!(matches!(
            &error,
            AppError::Forbidden { principal, required }
                if principal == "user-test-jo" && *required == UserType::Admin
        ));
        assert_eq!(
            error.to_string(),
            "User with ID \"user-test-jo\" is not allowed to access admin resources"
        );
    }
}
