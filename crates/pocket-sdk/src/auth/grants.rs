//! OAuth2 token endpoint requests
//!
//! Each grant posts a form-encoded body and classifies the response the
//! same way: transport failures are network errors, non-2xx statuses are
//! rejected credentials and anything unparseable is an invalid response.

use super::types::{AuthError, AuthResult, TokenResponse};
use crate::envelope;
use reqwest::RequestBuilder;
use tracing::{debug, info};

/// `grant_type=client_credentials` with HTTP Basic client authentication
pub async fn client_credentials(
    http: &reqwest::Client,
    token_url: &str,
    client_id: &str,
    client_secret: &str,
) -> AuthResult<TokenResponse> {
    debug!("Requesting client credentials token");

    let request = http
        .post(token_url)
        .basic_auth(client_id, Some(client_secret))
        .form(&[("grant_type", "client_credentials")]);

    send(request).await
}

/// Exchange a refresh token for a new access token
///
/// The response may carry a rotated refresh token; callers must persist it.
pub async fn refresh_token(
    http: &reqwest::Client,
    token_url: &str,
    client_id: &str,
    client_secret: Option<&str>,
    refresh_token: &str,
) -> AuthResult<TokenResponse> {
    debug!("Refreshing access token");

    let mut form = vec![
        ("grant_type", "refresh_token"),
        ("refresh_token", refresh_token),
        ("client_id", client_id),
    ];
    if let Some(secret) = client_secret {
        form.push(("client_secret", secret));
    }

    let response = send(http.post(token_url).form(&form)).await?;
    info!("Token refresh completed successfully");
    Ok(response)
}

/// Exchange an authorization code, proving possession of the PKCE verifier
pub async fn exchange_code(
    http: &reqwest::Client,
    token_url: &str,
    client_id: &str,
    client_secret: Option<&str>,
    code: &str,
    redirect_uri: &str,
    code_verifier: &str,
) -> AuthResult<TokenResponse> {
    debug!("Exchanging authorization code for tokens");

    let mut request = http.post(token_url).form(&[
        ("grant_type", "authorization_code"),
        ("code", code),
        ("redirect_uri", redirect_uri),
        ("client_id", client_id),
        ("code_verifier", code_verifier),
    ]);
    if let Some(secret) = client_secret {
        request = request.basic_auth(client_id, Some(secret));
    }

    send(request).await
}

async fn send(request: RequestBuilder) -> AuthResult<TokenResponse> {
    let response = request
        .send()
        .await
        .map_err(|e| AuthError::NetworkError(format!("Token request failed: {}", e)))?;

    let status = response.status();
    let body = response
        .bytes()
        .await
        .map_err(|e| AuthError::NetworkError(format!("Failed to read token response: {}", e)))?;

    if !status.is_success() {
        let message = envelope::provider_message(status, &body);
        let message = match message.code {
            Some(code) if code != message.message => format!("{}: {}", code, message.message),
            _ => message.message,
        };
        return Err(AuthError::AuthFailed {
            status: status.as_u16(),
            message,
        });
    }

    let token: TokenResponse = serde_json::from_slice(&body).map_err(|e| {
        AuthError::InvalidResponse(format!("Failed to parse token response: {}", e))
    })?;
    if token.access_token.is_empty() {
        return Err(AuthError::InvalidResponse(
            "Token response contained an empty access_token".to_string(),
        ));
    }
    Ok(token)
}
