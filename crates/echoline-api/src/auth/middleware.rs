use std::sync::Arc;

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use chrono::{Duration, Utc};
use echoline_core::models::{Caller, UserRole};
use echoline_core::{AppError, Config};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use subtle::ConstantTimeEq;
use uuid::Uuid;

use crate::auth::models::{AuthContext, JwtClaims};
use crate::error::HttpAppError;

/// User id attached to requests authenticated with the master API key.
const MASTER_USER_ID: Uuid = Uuid::nil();

#[derive(Clone)]
pub struct AuthState {
    pub jwt_secret: String,
    pub master_api_key: Option<String>,
    pub service_api_key: Option<String>,
}

impl AuthState {
    pub fn from_config(config: &Config) -> Self {
        Self {
            jwt_secret: config.jwt_secret().to_string(),
            master_api_key: config.master_api_key().map(str::to_string),
            service_api_key: config.service_api_key().map(str::to_string),
        }
    }

    /// Resolve a bearer token to a caller: the master key acts as an admin,
    /// anything else must be a valid HS256 JWT with a known role.
    pub fn authenticate(&self, token: &str) -> Result<Caller, AppError> {
        if let Some(master) = self.master_api_key.as_deref() {
            if secure_compare(token, master) {
                return Ok(Caller::new(MASTER_USER_ID, UserRole::Admin));
            }
        }

        let validation = Validation::new(Algorithm::HS256);
        let data = decode::<JwtClaims>(
            token,
            &DecodingKey::from_secret(self.jwt_secret.as_bytes()),
            &validation,
        )
        .map_err(|e| AppError::Unauthorized(format!("Invalid token: {}", e)))?;

        let role = data
            .claims
            .role
            .parse::<UserRole>()
            .map_err(|_| AppError::Unauthorized("Invalid role claim".to_string()))?;

        Ok(Caller::new(data.claims.sub, role))
    }
}

fn secure_compare(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.as_bytes().ct_eq(b.as_bytes()).into()
}

fn bearer_token(request: &Request) -> Result<&str, AppError> {
    let header = request
        .headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .ok_or_else(|| AppError::Unauthorized("Missing authorization header".to_string()))?;

    header
        .strip_prefix("Bearer ")
        .ok_or_else(|| AppError::Unauthorized("Invalid authorization header format".to_string()))
}

/// Sign a token for `user_id` with `role`, valid for `expiry_hours`.
pub fn issue_token(
    user_id: Uuid,
    role: UserRole,
    secret: &str,
    expiry_hours: i64,
) -> Result<String, AppError> {
    let now = Utc::now();
    let claims = JwtClaims {
        sub: user_id,
        role: role.to_string(),
        exp: (now + Duration::hours(expiry_hours)).timestamp(),
        iat: now.timestamp(),
    };
    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| AppError::Internal(format!("Failed to sign token: {}", e)))
}

/// Authenticate a user request and attach its [`AuthContext`].
pub async fn auth_middleware(
    State(auth_state): State<Arc<AuthState>>,
    mut request: Request,
    next: Next,
) -> Response {
    let caller = match bearer_token(&request).and_then(|token| auth_state.authenticate(token)) {
        Ok(caller) => caller,
        Err(e) => return HttpAppError(e).into_response(),
    };

    tracing::debug!(user_id = %caller.user_id, role = %caller.role, "Request authenticated");
    request.extensions_mut().insert(AuthContext(caller));
    next.run(request).await
}

/// Guard for internal routes called by the scheduler: only the service API key is accepted.
pub async fn service_auth_middleware(
    State(auth_state): State<Arc<AuthState>>,
    request: Request,
    next: Next,
) -> Response {
    let token = match bearer_token(&request) {
        Ok(token) => token,
        Err(e) => return HttpAppError(e).into_response(),
    };

    let Some(service_key) = auth_state.service_api_key.as_deref() else {
        tracing::warn!("Internal route called but SERVICE_API_KEY is not configured");
        return HttpAppError(AppError::Unauthorized(
            "Service authentication is not configured".to_string(),
        ))
        .into_response();
    };

    if !secure_compare(token, service_key) {
        return HttpAppError(AppError::Unauthorized("Invalid service API key".to_string()))
            .into_response();
    }

    next.run(request).await
}
