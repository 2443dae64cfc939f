//! OAuth 1.0a request signing (HMAC-SHA1, RFC 5849)
//!
//! There is no token acquisition step: every request is signed with a
//! fresh nonce and timestamp from long-lived, user-supplied credentials.
//! Query-string and form body parameters are part of the signed parameter
//! string; the base string URI never includes the query.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use hmac::{Hmac, Mac};
use rand::Rng;
use sha1::Sha1;
use std::fmt;
use url::Url;

use super::types::{AuthError, AuthResult};

type HmacSha1 = Hmac<Sha1>;

/// Consumer and access credentials of an OAuth 1.0a user context
#[derive(Clone)]
pub struct OAuth1Credentials {
    pub consumer_key: String,
    pub consumer_secret: String,
    pub access_token: String,
    pub access_secret: String,
}

impl fmt::Debug for OAuth1Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OAuth1Credentials")
            .field("consumer_key", &self.consumer_key)
            .field("consumer_secret", &"[redacted]")
            .field("access_token", &"[redacted]")
            .field("access_secret", &"[redacted]")
            .finish()
    }
}

impl OAuth1Credentials {
    pub fn new(
        consumer_key: impl Into<String>,
        consumer_secret: impl Into<String>,
        access_token: impl Into<String>,
        access_secret: impl Into<String>,
    ) -> Self {
        Self {
            consumer_key: consumer_key.into(),
            consumer_secret: consumer_secret.into(),
            access_token: access_token.into(),
            access_secret: access_secret.into(),
        }
    }

    /// `Authorization` header value for a request, with a fresh nonce and timestamp
    ///
    /// `form` holds the decoded `application/x-www-form-urlencoded` body
    /// parameters, if any.
    pub fn authorization_header(
        &self,
        method: &str,
        url: &str,
        form: &[(String, String)],
    ) -> AuthResult<String> {
        let timestamp = chrono::Utc::now().timestamp().to_string();
        self.sign_with(method, url, form, &timestamp, &generate_nonce())
            .map(|signed| signed.header)
    }

    /// Deterministic signing core
    pub fn sign_with(
        &self,
        method: &str,
        url: &str,
        form: &[(String, String)],
        timestamp: &str,
        nonce: &str,
    ) -> AuthResult<SignedRequest> {
        let parsed = Url::parse(url)
            .map_err(|e| AuthError::ConfigError(format!("Invalid request URL '{}': {}", url, e)))?;

        let oauth_params = vec![
            ("oauth_consumer_key".to_string(), self.consumer_key.clone()),
            ("oauth_nonce".to_string(), nonce.to_string()),
            ("oauth_signature_method".to_string(), "HMAC-SHA1".to_string()),
            ("oauth_timestamp".to_string(), timestamp.to_string()),
            ("oauth_token".to_string(), self.access_token.clone()),
            ("oauth_version".to_string(), "1.0".to_string()),
        ];

        let mut all_params = oauth_params.clone();
        all_params.extend(parsed.query_pairs().into_owned());
        all_params.extend(form.iter().cloned());

        let base_string = signature_base_string(method, &parsed, &all_params);
        let signing_key = format!(
            "{}&{}",
            percent_encode(&self.consumer_secret),
            percent_encode(&self.access_secret)
        );
        let signature = sign(&signing_key, &base_string)?;

        let mut header_params = oauth_params;
        header_params.push(("oauth_signature".to_string(), signature.clone()));
        let header = authorization_header_value(&header_params);

        Ok(SignedRequest {
            base_string,
            signature,
            header,
        })
    }
}

/// Output of one signing operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedRequest {
    pub base_string: String,
    pub signature: String,
    pub header: String,
}

/// RFC 3986 percent-encoding: everything except unreserved characters
pub fn percent_encode(value: &str) -> String {
    urlencoding::encode(value).into_owned()
}

/// Random alphanumeric nonce, unique per request
pub fn generate_nonce() -> String {
    rand::thread_rng()
        .sample_iter(&rand::distributions::Alphanumeric)
        .take(32)
        .map(char::from)
        .collect()
}

/// Scheme, host, non-default port and path; no query or fragment
pub fn base_string_uri(url: &Url) -> String {
    let scheme = url.scheme().to_ascii_lowercase();
    let host = url.host_str().unwrap_or_default().to_ascii_lowercase();
    // `Url::port` is already `None` for the scheme's default port.
    match url.port() {
        Some(port) => format!("{}://{}:{}{}", scheme, host, port, url.path()),
        None => format!("{}://{}{}", scheme, host, url.path()),
    }
}

/// `METHOD&encoded-uri&encoded-sorted-params`
pub fn signature_base_string(method: &str, url: &Url, params: &[(String, String)]) -> String {
    let mut encoded: Vec<(String, String)> = params
        .iter()
        .map(|(k, v)| (percent_encode(k), percent_encode(v)))
        .collect();
    encoded.sort();

    let param_string = encoded
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join("&");

    format!(
        "{}&{}&{}",
        method.to_ascii_uppercase(),
        percent_encode(&base_string_uri(url)),
        percent_encode(&param_string)
    )
}

fn sign(key: &str, base_string: &str) -> AuthResult<String> {
    let mut mac = HmacSha1::new_from_slice(key.as_bytes())
        .map_err(|e| AuthError::ConfigError(format!("Invalid signing key: {}", e)))?;
    mac.update(base_string.as_bytes());
    Ok(STANDARD.encode(mac.finalize().into_bytes()))
}

fn authorization_header_value(params: &[(String, String)]) -> String {
    let mut encoded: Vec<(String, String)> = params
        .iter()
        .map(|(k, v)| (percent_encode(k), percent_encode(v)))
        .collect();
    encoded.sort();

    let pairs = encoded
        .iter()
        .map(|(k, v)| format!("{}=\"{}\"", k, v))
        .collect::<Vec<_>>()
        .join(", ");
    format!("OAuth {}", pairs)
}

#[cfg(test)]
mod tests {
    use super::*;

    // Worked example from the Twitter "Creating a signature" guide.
    fn twitter_credentials() -> OAuth1Credentials {
        OAuth1Credentials::new(
            "xvz1evFS4wEEPTGEFPHBog",
            "kAcSOqF21Fu85e7zjz7ZN2U4ZRhfV3WpwPAoE3Z7kBw",
            "370773112-GmHxMAgYyLbNEtIKZeRNFsMKPR9EyMZeS9weJAEb",
            "LswwdoUaIvS8ltyTt5jkRh4J50vUPVVHtR2YPi5kE",
        )
    }

    const NONCE: &str = "kYjzVBB8Y0ZFabxSWbWovY3uYSQ2pTgmZeNu2VS4cg";
    const TIMESTAMP: &str = "1318622958";

    fn signed_status_update() -> SignedRequest {
        let form = vec![(
            "status".to_string(),
            "Hello Ladies + Gentlemen, a signed OAuth request!".to_string(),
        )];
        twitter_credentials()
            .sign_with(
                "post",
                "https://api.twitter.com/1.1/statuses/update.json?include_entities=true",
                &form,
                TIMESTAMP,
                NONCE,
            )
            .unwrap()
    }

    #[test]
    fn test_known_answer_base_string() {
        let expected = "POST&https%3A%2F%2Fapi.twitter.com%2F1.1%2Fstatuses%2Fupdate.json&\
            include_entities%3Dtrue%26oauth_consumer_key%3Dxvz1evFS4wEEPTGEFPHBog%26\
            oauth_nonce%3DkYjzVBB8Y0ZFabxSWbWovY3uYSQ2pTgmZeNu2VS4cg%26\
            oauth_signature_method%3DHMAC-SHA1%26oauth_timestamp%3D1318622958%26\
            oauth_token%3D370773112-GmHxMAgYyLbNEtIKZeRNFsMKPR9EyMZeS9weJAEb%26\
            oauth_version%3D1.0%26status%3DHello%2520Ladies%2520%252B%2520Gentlemen\
            %252C%2520a%2520signed%2520OAuth%2520request%2521";
        assert_eq!(signed_status_update().base_string, expected);
    }

    #[test]
    fn test_known_answer_signature() {
        assert_eq!(signed_status_update().signature, "hCtSmYh+iHYCEqBWrE7C7hYmtUk=");
    }

    #[test]
    fn test_header_is_sorted_and_encoded() {
        let header = signed_status_update().header;
        assert!(header.starts_with("OAuth oauth_consumer_key=\"xvz1evFS4wEEPTGEFPHBog\", "));
        assert!(header.contains("oauth_signature=\"hCtSmYh%2BiHYCEqBWrE7C7hYmtUk%3D\""));
        assert!(header.ends_with("oauth_version=\"1.0\""));
        assert!(!header.contains("status="));
    }

    #[test]
    fn test_signing_is_deterministic() {
        assert_eq!(signed_status_update(), signed_status_update());

        let creds = twitter_credentials();
        let url = "https://api.twitter.com/1.1/account/verify_credentials.json";
        let a = creds.sign_with("GET", url, &[], TIMESTAMP, "n1").unwrap();
        let b = creds.sign_with("GET", url, &[], TIMESTAMP, "n2").unwrap();
        assert_ne!(a.signature, b.signature);
    }

    #[test]
    fn test_percent_encoding() {
        assert_eq!(percent_encode("a b+c"), "a%20b%2Bc");
        assert_eq!(percent_encode("-._~"), "-._~");
        assert_eq!(percent_encode("!*'()"), "%21%2A%27%28%29");
    }

    #[test]
    fn test_base_string_uri_drops_default_port_and_query() {
        let url = Url::parse("HTTPS://API.Example.com:443/r%20v/X?a=1#frag").unwrap();
        assert_eq!(base_string_uri(&url), "https://api.example.com/r%20v/X");

        let url = Url::parse("http://example.com:8080/path").unwrap();
        assert_eq!(base_string_uri(&url), "http://example.com:8080/path");
    }

    #[test]
    fn test_fresh_nonce_per_header() {
        let creds = twitter_credentials();
        let url = "https://api.twitter.com/1.1/statuses/home_timeline.json";
        let first = creds.authorization_header("GET", url, &[]).unwrap();
        let second = creds.authorization_header("GET", url, &[]).unwrap();
        assert_ne!(first, second);
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let debug = format!("{:?}", twitter_credentials());
        assert!(!debug.contains("kAcSOqF21Fu85e7zjz7ZN2U4ZRhfV3WpwPAoE3Z7kBw"));
        assert!(debug.contains("xvz1evFS4wEEPTGEFPHBog"));
    }
}
