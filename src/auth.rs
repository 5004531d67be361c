// src/auth.rs
//! Caller identity.
//!
//! Sign-in happens against the hosted auth service; this backend only
//! resolves the bearer token a client presents into the user it belongs to.

use std::{collections::HashMap, convert::Infallible, time::Duration};

use async_trait::async_trait;
use axum::extract::FromRequestParts;
use http::{header::AUTHORIZATION, request::Parts};
use reqwest::StatusCode;
use serde::Deserialize;
use thiserror::Error;
use uuid::Uuid;

use crate::state::AppState;

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AuthUser {
    pub id: Uuid,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub user_metadata: Option<UserMetadata>,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct UserMetadata {
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("auth request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("auth service answered {0}")]
    UnexpectedStatus(StatusCode),
}

#[async_trait]
pub trait Authenticator: Send + Sync {
    /// `Ok(None)` when the token is not accepted.
    async fn user_for_token(&self, token: &str) -> Result<Option<AuthUser>, AuthError>;
}

/// Resolves tokens with the hosted service's `GET /auth/v1/user`.
pub struct RemoteAuth {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl RemoteAuth {
    pub fn new(base_url: &str, api_key: &str, timeout: Duration) -> Result<Self, AuthError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self::with_client(client, base_url, api_key))
    }

    pub fn with_client(client: reqwest::Client, base_url: &str, api_key: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        }
    }
}

#[async_trait]
impl Authenticator for RemoteAuth {
    async fn user_for_token(&self, token: &str) -> Result<Option<AuthUser>, AuthError> {
        let response = self
            .client
            .get(format!("{}/auth/v1/user", self.base_url))
            .header("apikey", &self.api_key)
            .bearer_auth(token)
            .send()
            .await?;

        match response.status() {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Ok(None),
            status if status.is_success() => Ok(Some(response.json::<AuthUser>().await?)),
            status => Err(AuthError::UnexpectedStatus(status)),
        }
    }
}

/// Fixed token table. Handy for local runs and tests.
#[derive(Default)]
pub struct StaticAuth {
    users: HashMap<String, AuthUser>,
}

impl StaticAuth {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_user(mut self, token: &str, user: AuthUser) -> Self {
        self.users.insert(token.to_string(), user);
        self
    }
}

#[async_trait]
impl Authenticator for StaticAuth {
    async fn user_for_token(&self, token: &str) -> Result<Option<AuthUser>, AuthError> {
        Ok(self.users.get(token).cloned())
    }
}

/// The signed-in caller, if any.
///
/// Never rejects: a missing header, an unknown token and an unreachable
/// auth service all produce `CurrentUser(None)` and the operation decides
/// whether that is allowed.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub Option<AuthUser>);

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let Some(token) = bearer_token(parts) else {
            return Ok(CurrentUser(None));
        };

        match state.auth.user_for_token(token).await {
            Ok(user) => Ok(CurrentUser(user)),
            Err(e) => {
                tracing::warn!("Could not resolve caller, treating as signed out: {e}");
                Ok(CurrentUser(None))
            }
        }
    }
}

fn bearer_token(parts: &Parts) -> Option<&str> {
    let value = parts.headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    let token = token.trim();

    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::{
        http::HeaderMap,
        response::{IntoResponse, Response},
        routing::get,
        Json, Router,
    };
    use http::Request;
    use serde_json::json;
    use tokio::net::TcpListener;

    use super::*;
    use crate::store::MemoryStore;

    const USER_ID: &str = "5f0c7c1e-8d3a-4a43-9f3e-2b8f5d3c9a11";
    const API_KEY: &str = "anon-key";

    /// Stands in for an auth service that cannot be reached.
    struct UnreachableAuth;

    #[async_trait]
    impl Authenticator for UnreachableAuth {
        async fn user_for_token(&self, _token: &str) -> Result<Option<AuthUser>, AuthError> {
            Err(AuthError::UnexpectedStatus(StatusCode::BAD_GATEWAY))
        }
    }

    fn state_with(auth: impl Authenticator + 'static) -> AppState {
        AppState::new(Arc::new(MemoryStore::new()), Arc::new(auth))
    }

    async fn user_endpoint(headers: HeaderMap) -> Response {
        if headers.get("apikey").and_then(|v| v.to_str().ok()) != Some(API_KEY) {
            return StatusCode::BAD_REQUEST.into_response();
        }

        match headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok()) {
            Some("Bearer good") => Json(json!({
                "id": USER_ID,
                "email": "ada@example.com",
            }))
            .into_response(),
            Some("Bearer banned") => StatusCode::FORBIDDEN.into_response(),
            Some("Bearer boom") => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
            _ => StatusCode::UNAUTHORIZED.into_response(),
        }
    }

    /// Serves `/auth/v1/user` on an ephemeral local port.
    async fn local_auth_service() -> RemoteAuth {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let app = Router::new().route("/auth/v1/user", get(user_endpoint));
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let client = reqwest::Client::builder()
            .no_proxy()
            .timeout(Duration::from_secs(5))
            .build()
            .unwrap();
        RemoteAuth::with_client(client, &format!("http://{addr}/"), API_KEY)
    }

    #[tokio::test]
    async fn remote_auth_maps_statuses() {
        let auth = local_auth_service().await;

        let user = auth.user_for_token("good").await.unwrap().unwrap();
        assert_eq!(user.id, Uuid::parse_str(USER_ID).unwrap());
        assert_eq!(user.email.as_deref(), Some("ada@example.com"));

        assert_eq!(auth.user_for_token("expired").await.unwrap(), None);
        assert_eq!(auth.user_for_token("banned").await.unwrap(), None);

        assert!(matches!(
            auth.user_for_token("boom").await,
            Err(AuthError::UnexpectedStatus(StatusCode::INTERNAL_SERVER_ERROR))
        ));
    }

    #[tokio::test]
    async fn auth_failure_reads_as_signed_out() {
        let state = state_with(UnreachableAuth);
        let mut parts = parts_with(Some("Bearer abc"));

        let CurrentUser(user) = CurrentUser::from_request_parts(&mut parts, &state)
            .await
            .unwrap();

        assert!(user.is_none());
    }

    #[tokio::test]
    async fn known_token_resolves_current_user() {
        let user = AuthUser {
            id: Uuid::new_v4(),
            email: None,
            user_metadata: None,
        };
        let state = state_with(StaticAuth::new().with_user("abc", user.clone()));

        let mut parts = parts_with(Some("Bearer abc"));
        let CurrentUser(found) = CurrentUser::from_request_parts(&mut parts, &state)
            .await
            .unwrap();
        assert_eq!(found, Some(user));

        let mut parts = parts_with(None);
        let CurrentUser(missing) = CurrentUser::from_request_parts(&mut parts, &state)
            .await
            .unwrap();
        assert!(missing.is_none());
    }

    fn parts_with(header: Option<&str>) -> Parts {
        let mut builder = Request::builder().uri("/api/polls");
        if let Some(value) = header {
            builder = builder.header(AUTHORIZATION, value);
        }
        builder.body(()).unwrap().into_parts().0
    }

    #[test]
    fn bearer_token_is_extracted() {
        assert_eq!(bearer_token(&parts_with(Some("Bearer abc"))), Some("abc"));
        assert_eq!(bearer_token(&parts_with(Some("bearer  abc "))), Some("abc"));
    }

    #[test]
    fn other_schemes_and_blank_tokens_are_ignored() {
        assert_eq!(bearer_token(&parts_with(None)), None);
        assert_eq!(bearer_token(&parts_with(Some("Basic abc"))), None);
        assert_eq!(bearer_token(&parts_with(Some("Bearer "))), None);
    }

    #[test]
    fn user_payload_decodes() {
        let user: AuthUser = serde_json::from_str(
            r#"{
                "id": "5f0c7c1e-8d3a-4a43-9f3e-2b8f5d3c9a11",
                "email": "ada@example.com",
                "aud": "authenticated",
                "user_metadata": { "full_name": "Ada" }
            }"#,
        )
        .unwrap();

        assert_eq!(user.email.as_deref(), Some("ada@example.com"));
        assert_eq!(
            user.user_metadata.and_then(|m| m.full_name).as_deref(),
            Some("Ada")
        );
    }

    #[tokio::test]
    async fn static_auth_resolves_known_tokens_only() {
        let user = AuthUser {
            id: Uuid::new_v4(),
            email: None,
            user_metadata: None,
        };
        let auth = StaticAuth::new().with_user("token-1", user.clone());

        assert_eq!(auth.user_for_token("token-1").await.unwrap(), Some(user));
        assert_eq!(auth.user_for_token("nope").await.unwrap(), None);
    }
}
