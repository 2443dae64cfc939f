//! Local HTTP callback server for the OAuth authorization code flow
//!
//! The listener is bound before the browser is opened so that a busy port
//! fails the login immediately. While waiting, the code channel, the error
//! channel and the timeout race each other; whichever wins, the server is
//! shut down exactly once and the port is released.

use super::types::{AuthError, AuthResult};
use axum::{
    extract::{Query, State},
    http::{header, StatusCode},
    response::{Html, IntoResponse},
    routing::get,
    Router,
};
use serde::Deserialize;
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// How long a stopping server may take to drain before it is aborted
const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

/// OAuth callback query parameters
#[derive(Debug, Deserialize)]
struct CallbackQuery {
    code: Option<String>,
    state: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
}

struct CallbackState {
    expected_state: String,
    code_tx: mpsc::Sender<String>,
    error_tx: mpsc::Sender<AuthError>,
}

/// Loopback listener for a single authorization callback
pub struct CallbackServer {
    listener: TcpListener,
    local_addr: SocketAddr,
    path: String,
    timeout: Duration,
}

impl CallbackServer {
    /// Bind `127.0.0.1:<port>`; port 0 picks a free port
    pub async fn bind(port: u16, path: impl Into<String>, timeout: Duration) -> AuthResult<Self> {
        let addr = SocketAddr::from((Ipv4Addr::LOCALHOST, port));
        let listener = TcpListener::bind(addr).await.map_err(|e| {
            AuthError::CallbackServerError(format!(
                "Failed to bind to {}: {}. Is another login already running?",
                addr, e
            ))
        })?;
        let local_addr = listener.local_addr()?;
        debug!("Callback server listening on {}", local_addr);

        Ok(Self {
            listener,
            local_addr,
            path: path.into(),
            timeout,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Redirect URI served by this listener
    pub fn redirect_uri(&self) -> String {
        format!("http://{}{}", self.local_addr, self.path)
    }

    /// Serve until a callback arrives or the timeout elapses
    ///
    /// Returns the authorization code of a callback whose `state` equals
    /// `expected_state`.
    pub async fn wait_for_code(self, expected_state: &str) -> AuthResult<String> {
        let (code_tx, mut code_rx) = mpsc::channel(1);
        let (error_tx, mut error_rx) = mpsc::channel(1);

        let state = Arc::new(CallbackState {
            expected_state: expected_state.to_string(),
            code_tx,
            error_tx,
        });
        let app = Router::new()
            .route(&self.path, get(handle_callback))
            .with_state(state);

        let server = ServerHandle::spawn(self.listener, app);

        let outcome = tokio::select! {
            Some(code) = code_rx.recv() => Ok(code),
            Some(err) = error_rx.recv() => Err(err),
            _ = tokio::time::sleep(self.timeout) => Err(AuthError::Timeout {
                waited_secs: self.timeout.as_secs(),
            }),
        };

        server.shutdown().await;
        outcome
    }
}

/// Running server task; consumed by [`ServerHandle::shutdown`]
struct ServerHandle {
    shutdown_tx: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<std::io::Result<()>>>,
}

impl ServerHandle {
    fn spawn(listener: TcpListener, app: Router) -> Self {
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let task = tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await
        });
        Self {
            shutdown_tx: Some(shutdown_tx),
            task: Some(task),
        }
    }

    async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(mut task) = self.task.take() {
            match tokio::time::timeout(SHUTDOWN_GRACE, &mut task).await {
                Ok(Ok(Ok(()))) => debug!("Callback server stopped"),
                Ok(Ok(Err(e))) => warn!("Callback server exited with error: {}", e),
                Ok(Err(e)) => warn!("Callback server task failed: {}", e),
                Err(_) => {
                    warn!("Callback server did not stop in time, aborting");
                    task.abort();
                    let _ = task.await;
                }
            }
        }
    }
}

impl Drop for ServerHandle {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

async fn handle_callback(
    Query(params): Query<CallbackQuery>,
    State(state): State<Arc<CallbackState>>,
) -> impl IntoResponse {
    let page = if let Some(error) = params.error {
        let message = params.error_description.unwrap_or(error);
        let page = error_page(&message);
        let _ = state
            .error_tx
            .try_send(AuthError::AuthorizationDenied(message));
        page
    } else if params.state.as_deref() != Some(state.expected_state.as_str()) {
        let _ = state.error_tx.try_send(AuthError::StateMismatch);
        error_page("State parameter does not match this login attempt")
    } else if let Some(code) = params.code {
        let _ = state.code_tx.try_send(code);
        success_page()
    } else {
        let _ = state.error_tx.try_send(AuthError::AuthorizationDenied(
            "Callback did not include an authorization code".to_string(),
        ));
        error_page("Missing authorization code")
    };

    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/html; charset=utf-8")],
        Html(page),
    )
}

fn success_page() -> String {
    page(
        "Authorization Successful",
        "<p>Authorization complete. You can close this window and return to the terminal.</p>",
    )
}

fn error_page(error: &str) -> String {
    page(
        "Authorization Failed",
        &format!(
            "<p>{}</p><p>Close this window and run the login again.</p>",
            escape_html(error)
        ),
    )
}

fn page(title: &str, body: &str) -> String {
    format!(
        "<!DOCTYPE html><html lang=\"en\"><head><meta charset=\"UTF-8\"><title>{title} - pocket</title></head>\
         <body style=\"font-family: sans-serif; margin: 3em;\"><h1>{title}</h1>{body}</body></html>"
    )
}

fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
