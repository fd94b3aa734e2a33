//! Token endpoint client and capability probe
//!
//! Handles the two token endpoint interactions:
//! 1. Authorization code exchange (interactive flow completion)
//! 2. Token refresh (stale stored token, or mid-session expiry)
//!
//! Each exchange is attempted exactly once. Transport failures surface as
//! `Network`; a rejected refresh token surfaces as `TokenRejected` so the
//! credential manager can fall back to the interactive flow.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::client_secrets::ClientSecrets;
use crate::error::{Error, Result};

/// Response from the token endpoint for both exchange and refresh.
///
/// `expires_in` is a delta in seconds from the response time. Refresh
/// responses normally omit `refresh_token`.
#[derive(Deserialize, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_in: Option<u64>,
    #[serde(default)]
    pub scope: Option<String>,
    #[serde(default)]
    pub token_type: Option<String>,
}

/// Exchange an authorization code for tokens.
///
/// `redirect_uri` must be byte-identical to the one sent in the
/// authorization URL, including the port the listener actually bound.
pub async fn exchange_code(
    client: &reqwest::Client,
    token_endpoint: &str,
    secrets: &ClientSecrets,
    code: &str,
    verifier: &str,
    redirect_uri: &str,
) -> Result<TokenResponse> {
    let mut form = vec![
        ("grant_type", "authorization_code"),
        ("code", code),
        ("code_verifier", verifier),
        ("client_id", secrets.client_id.as_str()),
        ("redirect_uri", redirect_uri),
    ];
    if let Some(secret) = &secrets.client_secret {
        form.push(("client_secret", secret.expose().as_str()));
    }

    let response = client
        .post(token_endpoint)
        .form(&form)
        .send()
        .await
        .map_err(|e| Error::Network(format!("POST {token_endpoint} (code exchange): {e}")))?;

    let status = response.status();
    if !status.is_success() {
        let body = error_body(response).await;
        return Err(Error::TokenExchange(format!(
            "{token_endpoint} returned {status}: {body}"
        )));
    }

    debug!(endpoint = token_endpoint, "authorization code exchanged");
    response
        .json::<TokenResponse>()
        .await
        .map_err(|e| Error::TokenExchange(format!("invalid token response: {e}")))
}

/// Exchange a refresh token for a new access token.
///
/// Google answers a revoked or expired refresh token with
/// `400 invalid_grant`; 400/401/403 all map to `TokenRejected`.
pub async fn refresh_token(
    client: &reqwest::Client,
    token_endpoint: &str,
    secrets: &ClientSecrets,
    refresh: &str,
) -> Result<TokenResponse> {
    let mut form = vec![
        ("grant_type", "refresh_token"),
        ("refresh_token", refresh),
        ("client_id", secrets.client_id.as_str()),
    ];
    if let Some(secret) = &secrets.client_secret {
        form.push(("client_secret", secret.expose().as_str()));
    }

    let response = client
        .post(token_endpoint)
        .form(&form)
        .send()
        .await
        .map_err(|e| Error::Network(format!("POST {token_endpoint} (refresh): {e}")))?;

    let status = response.status();
    if !status.is_success() {
        let body = error_body(response).await;
        if matches!(status.as_u16(), 400 | 401 | 403) {
            return Err(Error::TokenRejected(format!(
                "refresh token rejected by {token_endpoint} ({status}): {body}"
            )));
        }
        return Err(Error::TokenExchange(format!(
            "{token_endpoint} refresh returned {status}: {body}"
        )));
    }

    debug!(endpoint = token_endpoint, "access token refreshed");
    response
        .json::<TokenResponse>()
        .await
        .map_err(|e| Error::TokenExchange(format!("invalid refresh response: {e}")))
}

/// Verify an access token with a side-effect-free API call.
///
/// Lists the caller's own channel id, which every authorized YouTube
/// account can do and which changes nothing server-side.
pub async fn probe(client: &reqwest::Client, api_base: &str, access_token: &str) -> Result<()> {
    let url = format!("{}/channels", api_base.trim_end_matches('/'));
    let response = client
        .get(&url)
        .query(&[("part", "id"), ("mine", "true")])
        .bearer_auth(access_token)
        .send()
        .await
        .map_err(|e| Error::Network(format!("GET {url} (capability probe): {e}")))?;

    let status = response.status();
    if status.is_success() {
        return Ok(());
    }

    let body = error_body(response).await;
    if matches!(status.as_u16(), 401 | 403) {
        return Err(Error::TokenRejected(format!(
            "access token rejected by {url} ({status}): {body}"
        )));
    }
    Err(Error::TokenExchange(format!(
        "capability probe {url} returned {status}: {body}"
    )))
}

async fn error_body(response: reqwest::Response) -> String {
    response
        .text()
        .await
        .unwrap_or_else(|_| String::from("<no body>"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{MockGoogle, test_secrets};

    #[test]
    fn token_response_deserializes_without_refresh_token() {
        let json = r#"{"access_token":"ya29.x","expires_in":3599,"scope":"s","token_type":"Bearer"}"#;
        let token: TokenResponse = serde_json::from_str(json).unwrap();
        assert_eq!(token.access_token, "ya29.x");
        assert!(token.refresh_token.is_none());
        assert_eq!(token.expires_in, Some(3599));
    }

    #[tokio::test]
    async fn exchange_code_sends_pkce_verifier_and_redirect() {
        let mock = MockGoogle::start().await;
        let client = reqwest::Client::new();

        let token = exchange_code(
            &client,
            &mock.token_endpoint(),
            &test_secrets(),
            "good-code",
            "the-verifier",
            "http://127.0.0.1:5555",
        )
        .await
        .unwrap();

        assert!(!token.access_token.is_empty());
        assert!(token.refresh_token.is_some());

        let form = mock.last_token_form().unwrap();
        assert_eq!(form.get("grant_type").unwrap(), "authorization_code");
        assert_eq!(form.get("code_verifier").unwrap(), "the-verifier");
        assert_eq!(form.get("redirect_uri").unwrap(), "http://127.0.0.1:5555");
        assert_eq!(form.get("client_secret").unwrap(), "test-secret");
    }

    #[tokio::test]
    async fn exchange_code_rejects_unknown_code() {
        let mock = MockGoogle::start().await;
        let result = exchange_code(
            &reqwest::Client::new(),
            &mock.token_endpoint(),
            &test_secrets(),
            "bogus",
            "v",
            "http://127.0.0.1:5555",
        )
        .await;
        assert!(matches!(result, Err(Error::TokenExchange(_))));
    }

    #[tokio::test]
    async fn refresh_rejected_maps_to_token_rejected() {
        let mock = MockGoogle::start().await;
        let result = refresh_token(
            &reqwest::Client::new(),
            &mock.token_endpoint(),
            &test_secrets(),
            "rt_revoked",
        )
        .await;
        assert!(matches!(result, Err(Error::TokenRejected(_))));
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_network_error() {
        // Bind then drop to get a port nothing listens on
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let result = refresh_token(
            &reqwest::Client::new(),
            &format!("http://{addr}/token"),
            &test_secrets(),
            "rt_valid",
        )
        .await;
        match result {
            Err(Error::Network(msg)) => assert!(msg.contains(&addr.to_string()), "got: {msg}"),
            other => panic!("expected Network error, got {:?}", other.err()),
        }
    }

    #[tokio::test]
    async fn probe_accepts_valid_and_rejects_revoked() {
        let mock = MockGoogle::start().await;
        let client = reqwest::Client::new();

        probe(&client, &mock.api_base(), "at_valid").await.unwrap();
        let err = probe(&client, &mock.api_base(), "at_revoked")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::TokenRejected(_)));
        assert_eq!(mock.probe_count(), 2);
    }
}
