//! Authentication middleware
//!
//! Verifies the bearer JWT and turns its claims into the `RequestContext`
//! every engine command is called with.

use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use jsonwebtoken::{decode, errors::ErrorKind, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use shared::{ActorRole, RequestContext};

use crate::{
    error::{AppError, ErrorDetail, ErrorResponse},
    AppState,
};

/// JWT claims structure
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// Actor id
    pub sub: String,
    pub name: String,
    pub role: String,
    pub exp: i64,
    pub iat: i64,
}

/// Authentication middleware that validates JWT tokens
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    // Extract Authorization header
    let token = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|header| header.strip_prefix("Bearer "));

    let Some(token) = token else {
        return AppError::Unauthorized("Missing or invalid Authorization header".to_string())
            .into_response();
    };

    match context_from_token(token, &state.config.jwt.secret) {
        Ok(ctx) => {
            request.extensions_mut().insert(ctx);
            next.run(request).await
        }
        Err(err) => err.into_response(),
    }
}

/// Decode a token and build the caller context from its claims
pub fn context_from_token(token: &str, secret: &str) -> Result<RequestContext, AppError> {
    let claims = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|e| match e.kind() {
        ErrorKind::ExpiredSignature => AppError::TokenExpired,
        _ => AppError::InvalidToken,
    })?;

    let actor_id = uuid::Uuid::parse_str(&claims.sub)
        .map_err(|_| AppError::Unauthorized("Invalid actor ID in token".to_string()))?;
    let role = ActorRole::from_str(&claims.role)
        .ok_or_else(|| AppError::Unauthorized(format!("Unknown role '{}'", claims.role)))?;

    Ok(RequestContext::new(actor_id, claims.name, role))
}

/// Extractor for the authenticated caller
/// Use this in handlers to get the current context
#[derive(Clone, Debug)]
pub struct CurrentUser(pub RequestContext);

#[axum::async_trait]
impl<S> axum::extract::FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = (StatusCode, Json<ErrorResponse>);

    async fn from_request_parts(
        parts: &mut axum::http::request::Parts,
        _state: &S,
    ) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<RequestContext>()
            .cloned()
            .map(CurrentUser)
            .ok_or_else(|| {
                let error = ErrorResponse {
                    error: ErrorDetail {
                        code: "UNAUTHORIZED".to_string(),
                        message: "Authentication required".to_string(),
                        field: None,
                    },
                };
                (StatusCode::UNAUTHORIZED, Json(error))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};

    fn token(role: &str, exp_offset: i64, secret: &str) -> String {
        let now = chrono::Utc::now().timestamp();
        let claims = Claims {
            sub: uuid::Uuid::new_v4().to_string(),
            name: "Thandi".to_string(),
            role: role.to_string(),
            exp: now + exp_offset,
            iat: now,
        };
        encode(&Header::default(), &claims, &EncodingKey::from_secret(secret.as_bytes())).unwrap()
    }

    #[test]
    fn test_valid_token_builds_context() {
        let ctx = context_from_token(&token("manager", 3600, "s3cret"), "s3cret").unwrap();
        assert_eq!(ctx.role, ActorRole::Manager);
        assert_eq!(ctx.actor_name, "Thandi");
    }

    #[test]
    fn test_wrong_secret_is_invalid() {
        let result = context_from_token(&token("staff", 3600, "s3cret"), "other");
        assert!(matches!(result, Err(AppError::InvalidToken)));
    }

    #[test]
    fn test_expired_token() {
        let result = context_from_token(&token("staff", -3600, "s3cret"), "s3cret");
        assert!(matches!(result, Err(AppError::TokenExpired)));
    }

    #[test]
    fn test_unknown_role_is_unauthorized() {
        let result = context_from_token(&token("owner", 3600, "s3cret"), "s3cret");
        assert!(matches!(result, Err(AppError::Unauthorized(_))));
    }
}
