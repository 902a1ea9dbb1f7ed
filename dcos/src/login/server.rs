//! Localhost endpoint that receives a login token straight from the browser.
//!
//! The hosted login page posts `{"token", "csrf"}` to the `redirect_uri` it
//! was started with. Pointing that URI at this server saves the user from
//! copy-pasting the token into the terminal.

use std::future::IntoFuture;
use std::io;
use std::net::TcpListener as StdTcpListener;
use std::sync::{Arc, mpsc};
use std::thread::{self, JoinHandle};

use axum::Router;
use axum::extract::State;
use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderValue, Method, StatusCode};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use rand::RngCore;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;
use tower_http::cors::CorsLayer;

use crate::error::LoginError;

/// The only origin allowed to post tokens.
const LOGIN_PAGE_ORIGIN: &str = "https://dcos.auth0.com";

const FLOW_PARAM: &str = "dcos_cli_flow";
const CSRF_PARAM: &str = "dcos_cli_csrf_token";
const REDIRECT_PARAM: &str = "redirect_uri";

/// Body posted by the login page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginData {
    #[serde(default)]
    pub token: String,
    #[serde(default, rename = "csrf")]
    pub csrf_token: String,
}

struct Shared {
    csrf_token: String,
    tokens: mpsc::Sender<String>,
}

/// A running token receiver. Dropping it stops the server.
pub struct LoginServer {
    start_flow_url: String,
    tokens: mpsc::Receiver<String>,
    shutdown: Option<oneshot::Sender<()>>,
    thread: Option<JoinHandle<()>>,
}

impl std::fmt::Debug for LoginServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoginServer")
            .field("start_flow_url", &self.start_flow_url)
            .finish_non_exhaustive()
    }
}

impl LoginServer {
    /// Bind a port on localhost and serve from a background thread.
    pub fn start(start_flow_url: &str) -> Result<Self, LoginError> {
        let mut url = Url::parse(start_flow_url).map_err(|err| {
            LoginError::LoginServer(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("invalid start flow URL '{start_flow_url}': {err}"),
            ))
        })?;

        let listener = StdTcpListener::bind("localhost:0").map_err(LoginError::LoginServer)?;
        listener
            .set_nonblocking(true)
            .map_err(LoginError::LoginServer)?;
        let port = listener.local_addr().map_err(LoginError::LoginServer)?.port();

        let csrf_token = csrf_token();
        // The login page only hands tokens back to `localhost`, never to a
        // bare loopback address.
        rewrite_query(
            &mut url,
            &[
                (FLOW_PARAM, "v1"),
                (CSRF_PARAM, &csrf_token),
                (REDIRECT_PARAM, &format!("http://localhost:{port}")),
            ],
        );

        let (tokens_tx, tokens) = mpsc::channel();
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let app = router(Arc::new(Shared {
            csrf_token,
            tokens: tokens_tx,
        }));

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(LoginError::LoginServer)?;
        let thread = thread::Builder::new()
            .name("login-server".into())
            .spawn(move || {
                runtime.block_on(async move {
                    let listener = match tokio::net::TcpListener::from_std(listener) {
                        Ok(listener) => listener,
                        Err(err) => {
                            tracing::error!("login server: {err}");
                            return;
                        }
                    };
                    tokio::select! {
                        result = axum::serve(listener, app).into_future() => {
                            if let Err(err) = result {
                                tracing::error!("login server: {err}");
                            }
                        }
                        _ = shutdown_rx => {}
                    }
                });
            })
            .map_err(LoginError::LoginServer)?;

        tracing::debug!("login server listening on localhost:{port}");
        Ok(Self {
            start_flow_url: url.to_string(),
            tokens,
            shutdown: Some(shutdown_tx),
            thread: Some(thread),
        })
    }

    /// The start flow URL redirecting to this server.
    pub fn start_flow_url(&self) -> &str {
        &self.start_flow_url
    }

    /// Block until the browser delivers a token, or `None` if the server died.
    pub fn token(&self) -> Option<String> {
        self.tokens.recv().ok()
    }
}

impl Drop for LoginServer {
    fn drop(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

/// Replace `params` in the query of `url`, keeping every other pair.
fn rewrite_query(url: &mut Url, params: &[(&str, &str)]) {
    let kept: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(key, _)| !params.iter().any(|(name, _)| &**key == *name))
        .map(|(key, value)| (key.into_owned(), value.into_owned()))
        .collect();

    let mut query = url.query_pairs_mut();
    query.clear().extend_pairs(kept);
    for (name, value) in params {
        query.append_pair(name, value);
    }
}

fn csrf_token() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    STANDARD.encode(bytes)
}

fn router(shared: Arc<Shared>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(HeaderValue::from_static(LOGIN_PAGE_ORIGIN))
        .allow_methods([Method::POST])
        .allow_headers([CONTENT_TYPE]);

    Router::new()
        .fallback(receive_token)
        .layer(cors)
        .with_state(shared)
}

async fn receive_token(State(shared): State<Arc<Shared>>, body: String) -> (StatusCode, String) {
    let data: LoginData = match serde_json::from_str(&body) {
        Ok(data) => data,
        Err(err) => return (StatusCode::BAD_REQUEST, err.to_string()),
    };
    if data.csrf_token != shared.csrf_token {
        return (StatusCode::UNAUTHORIZED, "Invalid CSRF token.".into());
    }
    let _ = shared.tokens.send(data.token);
    (StatusCode::OK, String::new())
}
