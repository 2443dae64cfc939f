//! End-to-end tests of the pocket command handlers against mock providers

use pocket_cli::cli::handlers::{api, auth, config};
use pocket_cli::config::CliConfig;
use pocket_cli::output::error_report;
use pocket_cli::{ApiArgs, AuthAction, ConfigAction};
use pocket_sdk::auth::ProviderOverrides;
use serde_json::json;
use tempfile::TempDir;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn test_config(dir: &TempDir, server: &MockServer) -> CliConfig {
    let mut config = CliConfig::default();
    config.store.path = Some(dir.path().join("credentials.json"));
    config.providers.insert(
        "spotify".to_string(),
        ProviderOverrides {
            token_url: Some(format!("{}/api/token", server.uri())),
            api_base_url: Some(format!("{}/v1", server.uri())),
            ..Default::default()
        },
    );
    config
}

async fn configure_spotify(config: &CliConfig) {
    for (key, value) in [
        ("spotify_client_id", "cid"),
        ("spotify_client_secret", "csecret"),
    ] {
        config::handle_config(
            ConfigAction::Set {
                key: key.into(),
                value: value.into(),
            },
            config,
        )
        .await
        .unwrap();
    }
}

fn spotify_get(url: &str) -> ApiArgs {
    ApiArgs {
        provider: "spotify".into(),
        method: "GET".into(),
        url: url.into(),
        json: None,
        form: Vec::new(),
    }
}

async fn mount_token(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/api/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "T1",
            "token_type": "Bearer",
            "expires_in": 3600,
        })))
        .expect(1)
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_api_reuses_persisted_token_across_invocations() {
    let dir = tempfile::tempdir().unwrap();
    let server = MockServer::start().await;
    mount_token(&server).await;
    Mock::given(method("GET"))
        .and(path("/v1/artists/4tZwfgrHOc3mvqYlEYSvVi"))
        .and(header("Authorization", "Bearer T1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"name": "Daft Punk"})))
        .expect(2)
        .mount(&server)
        .await;

    let config = test_config(&dir, &server);
    configure_spotify(&config).await;

    for _ in 0..2 {
        let artist = api::handle_api(spotify_get("/artists/4tZwfgrHOc3mvqYlEYSvVi"), &config)
            .await
            .unwrap();
        assert_eq!(artist, json!({"name": "Daft Punk"}));
    }
}

#[tokio::test]
async fn test_status_token_and_logout() {
    let dir = tempfile::tempdir().unwrap();
    let server = MockServer::start().await;
    mount_token(&server).await;
    let config = test_config(&dir, &server);

    let status = auth::handle_auth(
        AuthAction::Status {
            provider: Some("spotify".into()),
        },
        &config,
    )
    .await
    .unwrap();
    assert_eq!(status["configured"], false);
    assert_eq!(
        status["missing_keys"],
        json!(["spotify_client_id", "spotify_client_secret"])
    );

    configure_spotify(&config).await;
    let token = auth::handle_auth(
        AuthAction::Token {
            provider: "spotify".into(),
        },
        &config,
    )
    .await
    .unwrap();
    assert_eq!(token["access_token"], "T1");

    let all = auth::handle_auth(AuthAction::Status { provider: None }, &config)
        .await
        .unwrap();
    let spotify = all
        .as_array()
        .unwrap()
        .iter()
        .find(|s| s["provider"] == "spotify")
        .unwrap()
        .clone();
    assert_eq!(spotify["valid"], true);
    assert_eq!(spotify["has_access_token"], true);

    let out = auth::handle_auth(
        AuthAction::Logout {
            provider: "spotify".into(),
        },
        &config,
    )
    .await
    .unwrap();
    assert_eq!(out, json!({"provider": "spotify", "logged_out": true}));

    let listed = config::handle_config(ConfigAction::List, &config)
        .await
        .unwrap();
    assert!(listed.get("spotify_access_token").is_none());
    assert_eq!(listed["spotify_client_id"], "cid");
}

#[tokio::test]
async fn test_missing_credentials_report() {
    let dir = tempfile::tempdir().unwrap();
    let server = MockServer::start().await;
    let config = test_config(&dir, &server);

    let err = api::handle_api(spotify_get("/me"), &config)
        .await
        .unwrap_err();
    let report = error_report(&err);

    assert_eq!(report["error"]["code"], "config_missing");
    assert_eq!(
        report["error"]["details"]["missing_keys"],
        json!(["spotify_client_id", "spotify_client_secret"])
    );
}

#[tokio::test]
async fn test_provider_errors_are_classified() {
    let dir = tempfile::tempdir().unwrap();
    let server = MockServer::start().await;
    mount_token(&server).await;
    Mock::given(method("GET"))
        .and(path("/v1/albums/missing"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "error": {"status": 404, "message": "Non existing id"}
        })))
        .mount(&server)
        .await;

    let config = test_config(&dir, &server);
    configure_spotify(&config).await;

    let err = api::handle_api(spotify_get("/albums/missing"), &config)
        .await
        .unwrap_err();
    let report = error_report(&err);
    assert_eq!(report["error"]["code"], "not_found");
    assert_eq!(report["error"]["message"], "Not found: Non existing id");
}

#[tokio::test]
async fn test_relative_url_without_base_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let server = MockServer::start().await;
    let config = test_config(&dir, &server);

    let args = ApiArgs {
        provider: "mastodon".into(),
        method: "GET".into(),
        url: "/api/v1/accounts/verify_credentials".into(),
        json: None,
        form: Vec::new(),
    };
    let err = api::handle_api(args, &config).await.unwrap_err();
    assert_eq!(err.code(), "invalid_argument");
}

#[tokio::test]
async fn test_static_provider_has_no_token_to_print() {
    let dir = tempfile::tempdir().unwrap();
    let server = MockServer::start().await;
    let config = test_config(&dir, &server);

    let err = auth::handle_auth(
        AuthAction::Token {
            provider: "discord".into(),
        },
        &config,
    )
    .await
    .unwrap_err();
    assert_eq!(err.code(), "config_error");
}
