//! Backend API contract.
//!
//! The backend answers every post with `{success, error?, ...}`. An
//! authentication failure is retried exactly once after refreshing
//! credentials; everything else is surfaced to the caller as is.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{info, warn};

use crate::error::{ConsoleError, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(flatten)]
    pub data: Map<String, Value>,
}

impl ApiResponse {
    pub fn ok() -> Self {
        Self {
            success: true,
            error: None,
            data: Map::new(),
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
            data: Map::new(),
        }
    }
}

#[async_trait]
pub trait BackendApi: Send + Sync {
    async fn post(&self, payload: &Value) -> Result<ApiResponse>;

    async fn refresh_credentials(&self) -> Result<()>;
}

const AUTH_MARKERS: &[&str] = &["auth", "unauthorized", "unauthenticated", "token expired", "401"];

/// Whether a backend error message reports rejected credentials. Markers
/// match whole words, so "author" is not "auth".
pub fn is_auth_error(message: &str) -> bool {
    let message = message.to_lowercase();
    let words: Vec<&str> = message
        .split(|c: char| !c.is_alphanumeric())
        .filter(|word| !word.is_empty())
        .collect();
    AUTH_MARKERS.iter().any(|marker| {
        let marker: Vec<&str> = marker.split(' ').collect();
        words.windows(marker.len()).any(|window| window == marker.as_slice())
    })
}

async fn attempt(api: &dyn BackendApi, payload: &Value) -> Result<ApiResponse> {
    let response = api.post(payload).await?;
    if response.success {
        return Ok(response);
    }
    let message = response
        .error
        .unwrap_or_else(|| "request failed".to_string());
    if is_auth_error(&message) {
        Err(ConsoleError::Auth(message))
    } else {
        Err(ConsoleError::Backend(message))
    }
}

/// Posts `payload`, refreshing credentials and retrying once on an auth error.
pub async fn post_with_reauth(api: &dyn BackendApi, payload: &Value) -> Result<ApiResponse> {
    match attempt(api, payload).await {
        Err(err) if err.is_auth() => {
            info!(error = %err, "Refreshing credentials after auth failure");
            api.refresh_credentials().await?;
            attempt(api, payload).await.inspect_err(|err| {
                warn!(error = %err, "Backend request failed after credential refresh");
            })
        }
        outcome => outcome,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use serde_json::json;
    use std::collections::VecDeque;

    #[derive(Default)]
    struct ScriptedApi {
        responses: Mutex<VecDeque<Result<ApiResponse>>>,
        posts: Mutex<usize>,
        refreshes: Mutex<usize>,
    }

    impl ScriptedApi {
        fn new(responses: Vec<Result<ApiResponse>>) -> Self {
            Self {
                responses: Mutex::new(responses.into()),
                ..Self::default()
            }
        }
    }

    #[async_trait]
    impl BackendApi for ScriptedApi {
        async fn post(&self, _payload: &Value) -> Result<ApiResponse> {
            *self.posts.lock() += 1;
            self.responses
                .lock()
                .pop_front()
                .unwrap_or_else(|| Ok(ApiResponse::ok()))
        }

        async fn refresh_credentials(&self) -> Result<()> {
            *self.refreshes.lock() += 1;
            Ok(())
        }
    }

    #[test]
    fn test_auth_markers_match_whole_words() {
        assert!(is_auth_error("Auth token expired"));
        assert!(is_auth_error("auth/id-token-expired"));
        assert!(is_auth_error("HTTP 401"));
        assert!(is_auth_error("Token expired, sign in again"));
        assert!(!is_auth_error("author missing"));
        assert!(!is_auth_error("authority unreachable"));
        assert!(!is_auth_error("error 4011"));
    }

    #[tokio::test]
    async fn test_non_auth_failure_is_not_retried() {
        let api = ScriptedApi::new(vec![Ok(ApiResponse::failed("author missing"))]);
        let err = post_with_reauth(&api, &json!({})).await.unwrap_err();
        assert_eq!(err, ConsoleError::Backend("author missing".to_string()));
        assert_eq!(*api.posts.lock(), 1);
        assert_eq!(*api.refreshes.lock(), 0);
    }

    #[tokio::test]
    async fn test_auth_error_retries_once() {
        let api = ScriptedApi::new(vec![Ok(ApiResponse::failed("Auth token expired"))]);
        let response = post_with_reauth(&api, &json!({"action": "sync"})).await.unwrap();
        assert!(response.success);
        assert_eq!(*api.posts.lock(), 2);
        assert_eq!(*api.refreshes.lock(), 1);
    }

    #[tokio::test]
    async fn test_second_auth_error_is_surfaced() {
        let api = ScriptedApi::new(vec![
            Ok(ApiResponse::failed("unauthorized")),
            Ok(ApiResponse::failed("unauthorized")),
        ]);
        let err = post_with_reauth(&api, &json!({})).await.unwrap_err();
        assert!(err.is_auth());
        assert_eq!(*api.posts.lock(), 2);
        assert_eq!(*api.refreshes.lock(), 1);
    }

    #[tokio::test]
    async fn test_other_errors_are_not_retried() {
        let api = ScriptedApi::new(vec![Ok(ApiResponse::failed("sheet locked"))]);
        let err = post_with_reauth(&api, &json!({})).await.unwrap_err();
        assert_eq!(err, ConsoleError::Backend("sheet locked".to_string()));
        assert_eq!(*api.posts.lock(), 1);
        assert_eq!(*api.refreshes.lock(), 0);
    }

    #[test]
    fn test_response_keeps_extra_fields() {
        let response: ApiResponse =
            serde_json::from_value(json!({"success": true, "sent": 3})).unwrap();
        assert_eq!(response.data.get("sent"), Some(&json!(3)));
    }
}
