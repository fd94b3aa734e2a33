//! PKCE (RFC 7636) and authorization URL construction
//!
//! The verifier stays in process memory for the duration of one interactive
//! flow and is sent with the code exchange; the S256 challenge travels in
//! the authorization URL. The `state` value ties the browser callback back
//! to the flow that opened it.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::RngExt;
use sha2::{Digest, Sha256};

use crate::error::{Error, Result};

/// Generate a cryptographically random PKCE code verifier.
///
/// 64 random bytes encode to 86 URL-safe base64 characters, inside the
/// 43-128 character range RFC 7636 allows.
pub fn generate_verifier() -> String {
    let mut bytes = [0u8; 64];
    rand::rng().fill(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Compute the S256 code challenge from a verifier.
///
/// `challenge = BASE64URL(SHA256(verifier))`
pub fn compute_challenge(verifier: &str) -> String {
    let hash = Sha256::digest(verifier.as_bytes());
    URL_SAFE_NO_PAD.encode(hash)
}

/// Opaque anti-forgery value for the `state` parameter.
pub fn generate_state() -> String {
    uuid::Uuid::new_v4().as_simple().to_string()
}

/// Parameters of one authorization request.
pub struct AuthorizationRequest<'a> {
    pub authorize_endpoint: &'a str,
    pub client_id: &'a str,
    pub redirect_uri: &'a str,
    pub scope: &'a str,
    pub challenge: &'a str,
    pub state: &'a str,
}

/// Build the consent URL.
///
/// Requests offline access and forces the consent prompt so the token
/// endpoint returns a refresh token even for a previously approved client.
pub fn build_authorization_url(request: &AuthorizationRequest<'_>) -> Result<String> {
    let url = reqwest::Url::parse_with_params(
        request.authorize_endpoint,
        &[
            ("client_id", request.client_id),
            ("redirect_uri", request.redirect_uri),
            ("response_type", "code"),
            ("scope", request.scope),
            ("access_type", "offline"),
            ("prompt", "consent"),
            ("code_challenge", request.challenge),
            ("code_challenge_method", "S256"),
            ("state", request.state),
        ],
    )
    .map_err(|e| {
        Error::Configuration(format!(
            "invalid authorize endpoint {}: {e}",
            request.authorize_endpoint
        ))
    })?;
    Ok(url.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn verifier_length_within_rfc_range() {
        let verifier = generate_verifier();
        assert_eq!(verifier.len(), 86);
        assert!(
            verifier
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'),
            "verifier must be URL-safe base64 (no padding): {verifier}"
        );
    }

    #[test]
    fn verifiers_and_states_are_unique() {
        assert_ne!(generate_verifier(), generate_verifier());
        assert_ne!(generate_state(), generate_state());
    }

    #[test]
    fn challenge_matches_known_value() {
        // SHA256("hello") in base64url, no padding
        let challenge = compute_challenge("hello");
        assert_eq!(challenge, "LPJNul-wow4m6DsqxbninhsWHlwfp0JecwQzYpOLmCQ");
    }

    #[test]
    fn authorization_url_contains_required_params() {
        let challenge = compute_challenge("test-verifier");
        let url = build_authorization_url(&AuthorizationRequest {
            authorize_endpoint: crate::constants::AUTHORIZE_ENDPOINT,
            client_id: "client-123",
            redirect_uri: "http://localhost:8080",
            scope: crate::constants::YOUTUBE_SCOPE,
            challenge: &challenge,
            state: "state-abc",
        })
        .unwrap();

        assert!(url.starts_with(crate::constants::AUTHORIZE_ENDPOINT));

        let parsed = reqwest::Url::parse(&url).unwrap();
        let params: HashMap<_, _> = parsed.query_pairs().into_owned().collect();
        assert_eq!(params["client_id"], "client-123");
        assert_eq!(params["redirect_uri"], "http://localhost:8080");
        assert_eq!(params["response_type"], "code");
        assert_eq!(params["scope"], crate::constants::YOUTUBE_SCOPE);
        assert_eq!(params["access_type"], "offline");
        assert_eq!(params["code_challenge"], challenge);
        assert_eq!(params["code_challenge_method"], "S256");
        assert_eq!(params["state"], "state-abc");
    }

    #[test]
    fn invalid_endpoint_is_configuration_error() {
        let err = build_authorization_url(&AuthorizationRequest {
            authorize_endpoint: "not a url",
            client_id: "c",
            redirect_uri: "http://localhost:8080",
            scope: "s",
            challenge: "x",
            state: "y",
        })
        .unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
    }
}
