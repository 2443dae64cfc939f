//! PKCE (Proof Key for Code Exchange) parameters
//!
//! One [`PkceExchange`] is generated per interactive authorization and
//! consumed by the code exchange that follows it.

use super::providers::PkceSettings;
use super::types::{AuthError, AuthResult};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use oauth2::{
    basic::BasicClient, AuthUrl, ClientId, CsrfToken, PkceCodeChallenge, PkceCodeVerifier,
    RedirectUrl, Scope, TokenUrl,
};
use rand::Rng;
use sha2::{Digest, Sha256};
use tracing::debug;

/// Generate cryptographically secure random 32-byte verifier
pub fn generate_pkce_verifier() -> String {
    let mut rng = rand::thread_rng();
    let verifier_bytes: [u8; 32] = rng.gen();
    URL_SAFE_NO_PAD.encode(verifier_bytes)
}

/// Create SHA256 hash of verifier in base64url encoding
pub fn generate_pkce_challenge(verifier: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(verifier.as_bytes());
    URL_SAFE_NO_PAD.encode(hasher.finalize())
}

/// Generate random 16-byte state parameter
pub fn generate_state() -> String {
    let mut rng = rand::thread_rng();
    let state_bytes: [u8; 16] = rng.gen();
    URL_SAFE_NO_PAD.encode(state_bytes)
}

/// Verifier, challenge and state for a single authorization
#[derive(Clone)]
pub struct PkceExchange {
    pub code_verifier: String,
    pub code_challenge: String,
    pub state: String,
}

impl std::fmt::Debug for PkceExchange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PkceExchange")
            .field("code_verifier", &"[redacted]")
            .field("code_challenge", &self.code_challenge)
            .field("state", &self.state)
            .finish()
    }
}

impl PkceExchange {
    /// Fresh random parameters
    pub fn generate() -> Self {
        debug!("Generating PKCE verifier, challenge and state");
        Self::from_verifier(generate_pkce_verifier(), generate_state())
    }

    /// Parameters for a known verifier and state
    pub fn from_verifier(code_verifier: impl Into<String>, state: impl Into<String>) -> Self {
        let code_verifier = code_verifier.into();
        let code_challenge = generate_pkce_challenge(&code_verifier);
        Self {
            code_verifier,
            code_challenge,
            state: state.into(),
        }
    }

    /// Authorization URL carrying the S256 challenge, state and scopes
    pub fn authorization_url(
        &self,
        client_id: &str,
        settings: &PkceSettings,
        redirect_uri: &str,
    ) -> AuthResult<String> {
        let client = BasicClient::new(
            ClientId::new(client_id.to_string()),
            None,
            AuthUrl::new(settings.auth_url.clone())
                .map_err(|e| AuthError::ConfigError(format!("Invalid auth endpoint: {}", e)))?,
            Some(
                TokenUrl::new(settings.token_url.clone()).map_err(|e| {
                    AuthError::ConfigError(format!("Invalid token endpoint: {}", e))
                })?,
            ),
        )
        .set_redirect_uri(
            RedirectUrl::new(redirect_uri.to_string())
                .map_err(|e| AuthError::ConfigError(format!("Invalid redirect URI: {}", e)))?,
        );

        let verifier = PkceCodeVerifier::new(self.code_verifier.clone());
        let challenge = PkceCodeChallenge::from_code_verifier_sha256(&verifier);
        let state = self.state.clone();

        let (url, _csrf_token) = client
            .authorize_url(move || CsrfToken::new(state))
            .add_scopes(settings.scopes.iter().cloned().map(Scope::new))
            .set_pkce_challenge(challenge)
            .url();

        Ok(url.to_string())
    }
}
