//! Generic authenticated request command

use crate::cli::commands::ApiArgs;
use crate::config::CliConfig;
use crate::error::{CliError, Result};
use pocket_sdk::{ApiClient, AuthStrategy, RequestBody, TokenManager};
use reqwest::Method;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::debug;

pub async fn handle_api(args: ApiArgs, config: &CliConfig) -> Result<Value> {
    let manager = Arc::new(config.token_manager()?);
    execute(args, manager, config).await
}

/// Run one request under the provider's credentials and decode the body
pub async fn execute(
    args: ApiArgs,
    manager: Arc<TokenManager>,
    config: &CliConfig,
) -> Result<Value> {
    let method = parse_method(&args.method)?;
    let body = parse_body(&args)?;

    let url = manager
        .registry()
        .get(&args.provider)?
        .resolve_url(&args.url)
        .ok_or_else(|| {
            CliError::invalid_argument(format!(
                "Provider '{}' has no API base URL; pass an absolute URL",
                args.provider
            ))
        })?;
    let client = ApiClient::builder()
        .timeout(config.http_timeout())
        .token_manager(Arc::clone(&manager))
        .build()?;

    debug!("{} {} via {}", method, url, args.provider);
    let bytes = client
        .execute(
            method,
            &url,
            body,
            &AuthStrategy::Provider(args.provider.clone()),
        )
        .await?;

    Ok(decode_body(&bytes))
}

fn parse_method(method: &str) -> Result<Method> {
    let upper = method.to_ascii_uppercase();
    match upper.as_str() {
        "GET" | "POST" | "PUT" | "PATCH" | "DELETE" | "HEAD" => {
            Method::from_bytes(upper.as_bytes())
                .map_err(|e| CliError::invalid_argument(e.to_string()))
        }
        _ => Err(CliError::invalid_argument(format!(
            "Unsupported HTTP method '{}'",
            method
        ))),
    }
}

fn parse_body(args: &ApiArgs) -> Result<Option<RequestBody>> {
    if let Some(raw) = &args.json {
        let value = serde_json::from_str(raw)
            .map_err(|e| CliError::invalid_argument(format!("--json is not valid JSON: {}", e)))?;
        return Ok(Some(RequestBody::Json(value)));
    }
    if args.form.is_empty() {
        return Ok(None);
    }
    let fields = args
        .form
        .iter()
        .map(|field| {
            field
                .split_once('=')
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .ok_or_else(|| {
                    CliError::invalid_argument(format!(
                        "--form expects key=value, got '{}'",
                        field
                    ))
                })
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(Some(RequestBody::Form(fields)))
}

/// JSON bodies pass through; anything else is wrapped as text
fn decode_body(bytes: &[u8]) -> Value {
    serde_json::from_slice(bytes)
        .unwrap_or_else(|_| json!({ "body": String::from_utf8_lossy(bytes) }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(form: &[&str], json: Option<&str>) -> ApiArgs {
        ApiArgs {
            provider: "twilio".into(),
            method: "post".into(),
            url: "/Accounts/AC1/Messages.json".into(),
            json: json.map(String::from),
            form: form.iter().map(|f| f.to_string()).collect(),
        }
    }

    #[test]
    fn test_parse_method() {
        assert_eq!(parse_method("get").unwrap(), Method::GET);
        assert_eq!(parse_method("PATCH").unwrap(), Method::PATCH);
        assert_eq!(parse_method("fetch").unwrap_err().code(), "invalid_argument");
    }

    #[test]
    fn test_parse_form_body() {
        let body = parse_body(&args(&["To=+15551234567", "Body=a=b"], None))
            .unwrap()
            .unwrap();
        match body {
            RequestBody::Form(fields) => assert_eq!(
                fields,
                vec![
                    ("To".to_string(), "+15551234567".to_string()),
                    ("Body".to_string(), "a=b".to_string()),
                ]
            ),
            other => panic!("unexpected body: {other:?}"),
        }

        let err = parse_body(&args(&["novalue"], None)).unwrap_err();
        assert_eq!(err.code(), "invalid_argument");
        assert!(parse_body(&args(&[], None)).unwrap().is_none());
    }

    #[test]
    fn test_parse_json_body() {
        let body = parse_body(&args(&[], Some(r#"{"text":"hi"}"#)))
            .unwrap()
            .unwrap();
        assert!(matches!(body, RequestBody::Json(v) if v == json!({"text": "hi"})));

        let err = parse_body(&args(&[], Some("{oops"))).unwrap_err();
        assert_eq!(err.code(), "invalid_argument");
    }

    #[test]
    fn test_decode_body() {
        assert_eq!(decode_body(br#"{"id":1}"#), json!({"id": 1}));
        assert_eq!(decode_body(b"OK"), json!({"body": "OK"}));
        assert_eq!(decode_body(b""), json!({"body": ""}));
    }
}
