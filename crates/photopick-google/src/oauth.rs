//! OAuth 2.0 sign-in and refresh-token exchange against Google.
//!
//! Sign-in is the Authorization Code flow with PKCE and a loopback redirect:
//!
//! 1. Generate a code verifier and its SHA-256 challenge
//! 2. Bind a listener on 127.0.0.1 inside the configured port range
//! 3. Open the browser at the consent page
//! 4. Receive the redirect, check `state`, exchange the code for tokens
//!
//! The refresh exchange is a single form POST to the token endpoint.

use std::time::Duration;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::Rng as _;
use sha2::{Digest, Sha256};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, error, info, warn};
use url::Url;

use crate::config::{OAuthCredentials, PickerConfig};
use crate::error::{PickerError, PickerResult};
use crate::tokens::{RefreshedToken, TokenInfo};

/// The PKCE code verifier length (in bytes, before base64 encoding).
const CODE_VERIFIER_LENGTH: usize = 32;

const STATE_LENGTH: usize = 16;

/// How long to wait for the browser to come back to the loopback server.
const CALLBACK_TIMEOUT: Duration = Duration::from_secs(300);

/// OAuth client for Google sign-in and token refresh.
#[derive(Debug)]
pub struct OAuthClient {
    credentials: OAuthCredentials,
    auth_url: String,
    token_url: String,
    http_client: reqwest::Client,
}

impl OAuthClient {
    /// Creates a client using the credentials and endpoints from `config`.
    pub fn new(config: &PickerConfig) -> PickerResult<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(&config.user_agent)
            .build()
            .map_err(|e| {
                PickerError::internal("failed to create HTTP client").with_source(e)
            })?;

        Ok(Self {
            credentials: config.credentials.clone(),
            auth_url: config.auth_url.clone(),
            token_url: config.token_url.clone(),
            http_client,
        })
    }

    /// Runs the interactive sign-in and returns a fresh credential bundle.
    ///
    /// Fails if no loopback port is free, the user denies consent, the
    /// callback does not arrive within five minutes, or the exchange fails.
    pub async fn authorize(
        &self,
        scopes: &[String],
        port_range: (u16, u16),
    ) -> PickerResult<TokenInfo> {
        let pkce = PkceFlow::new();

        let (listener, port) = bind_loopback(port_range).await?;
        let redirect_uri = format!("http://127.0.0.1:{}/callback", port);

        let auth_url = pkce.build_auth_url(
            &self.auth_url,
            &self.credentials.client_id,
            &redirect_uri,
            scopes,
        )?;

        info!(port, "starting OAuth flow, opening browser");
        debug!(url = %auth_url, "authorization URL");

        if let Err(e) = open::that_detached(&auth_url) {
            warn!(error = %e, "failed to open browser");
            eprintln!("\nPlease open this URL in your browser:\n\n{}\n", auth_url);
        }

        let (code, received_state) = wait_for_callback(listener).await?;

        if received_state != pkce.state {
            return Err(PickerError::authentication_required(
                "OAuth state mismatch, sign-in aborted",
            ));
        }

        info!("received authorization code, exchanging for tokens");
        self.exchange_code(&code, &pkce.verifier, &redirect_uri, scopes)
            .await
    }

    /// Exchanges a refresh token for a new access token.
    ///
    /// Makes exactly one request. A rejected grant maps to
    /// [`PickerErrorCode::AuthenticationRequired`](crate::error::PickerErrorCode).
    pub async fn refresh_token(&self, refresh_token: &str) -> PickerResult<RefreshedToken> {
        let params = [
            ("client_id", self.credentials.client_id.as_str()),
            ("client_secret", self.credentials.client_secret.as_str()),
            ("refresh_token", refresh_token),
            ("grant_type", "refresh_token"),
        ];

        let token_response = self.post_token_form(&params, "token refresh").await?;

        info!("refreshed access token");
        Ok(RefreshedToken {
            access_token: token_response.access_token,
            refresh_token: token_response.refresh_token,
            expires_in_secs: token_response.expires_in,
        })
    }

    /// Posts a form to the token endpoint and parses the token response.
    async fn post_token_form(
        &self,
        params: &[(&str, &str)],
        what: &str,
    ) -> PickerResult<TokenResponse> {
        let response = self
            .http_client
            .post(&self.token_url)
            .form(params)
            .send()
            .await
            .map_err(|e| {
                PickerError::network(format!("{} request failed: {}", what, e)).with_source(e)
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| PickerError::network(format!("failed to read response: {}", e)))?;

        if !status.is_success() {
            let detail = serde_json::from_str::<TokenErrorResponse>(&body)
                .map(|e| match e.error_description {
                    Some(description) => format!("{}: {}", e.error, description),
                    None => e.error,
                })
                .unwrap_or(body);
            let message = format!("{} failed ({}): {}", what, status, detail);
            let err = if status.is_server_error() {
                PickerError::upstream(message)
            } else {
                PickerError::authentication_required(message)
            };
            return Err(err.with_http_status(status.as_u16()));
        }

        serde_json::from_str(&body).map_err(|e| {
            PickerError::invalid_response(format!("invalid token response: {}", e))
        })
    }

    /// Exchanges an authorization code for tokens.
    async fn exchange_code(
        &self,
        code: &str,
        verifier: &str,
        redirect_uri: &str,
        scopes: &[String],
    ) -> PickerResult<TokenInfo> {
        let params = [
            ("client_id", self.credentials.client_id.as_str()),
            ("client_secret", self.credentials.client_secret.as_str()),
            ("code", code),
            ("code_verifier", verifier),
            ("grant_type", "authorization_code"),
            ("redirect_uri", redirect_uri),
        ];

        let token_response = self.post_token_form(&params, "token exchange").await?;

        info!("obtained tokens");
        Ok(TokenInfo::new(
            token_response.access_token,
            token_response.refresh_token,
            token_response.expires_in,
            scopes.to_vec(),
        ))
    }
}

/// Binds the first free port of `port_range` on 127.0.0.1.
async fn bind_loopback(port_range: (u16, u16)) -> PickerResult<(TcpListener, u16)> {
    for port in port_range.0..=port_range.1 {
        if let Ok(listener) = TcpListener::bind(("127.0.0.1", port)).await {
            debug!(port, "bound loopback server");
            return Ok((listener, port));
        }
    }
    Err(PickerError::configuration(format!(
        "no free loopback port in range {}-{}",
        port_range.0, port_range.1
    )))
}

/// Accepts connections until one carries the OAuth redirect.
async fn wait_for_callback(listener: TcpListener) -> PickerResult<(String, String)> {
    let accept_loop = async {
        loop {
            let stream = match listener.accept().await {
                Ok((stream, _)) => stream,
                Err(e) => {
                    error!(error = %e, "failed to accept connection");
                    continue;
                }
            };
            if let Some(result) = handle_callback(stream).await {
                return result;
            }
        }
    };

    tokio::time::timeout(CALLBACK_TIMEOUT, accept_loop)
        .await
        .map_err(|_| PickerError::timeout("timed out waiting for the OAuth callback"))?
}

/// Answers one loopback request. Returns `None` for anything that is not
/// the redirect (favicon requests and the like).
async fn handle_callback(stream: TcpStream) -> Option<PickerResult<(String, String)>> {
    let mut stream = BufReader::new(stream);
    let mut request_line = String::new();
    stream.read_line(&mut request_line).await.ok()?;

    let parts: Vec<&str> = request_line.split_whitespace().collect();
    let target = match parts.as_slice() {
        ["GET", target, ..] if target.starts_with("/callback") => *target,
        _ => return None,
    };

    let params = CallbackParams::parse(target);
    let (status, heading, detail) = if params.error.is_some() || params.code.is_none() {
        ("400 Bad Request", "Sign-in failed", "You can close this window.")
    } else {
        (
            "200 OK",
            "Signed in",
            "You can close this window and return to photopick.",
        )
    };
    let page = format!("<html><body><h1>{heading}</h1><p>{detail}</p></body></html>");
    let response = format!(
        "HTTP/1.1 {status}\r\nContent-Type: text/html\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{page}",
        page.len()
    );

    let stream = stream.get_mut();
    if let Err(e) = stream.write_all(response.as_bytes()).await {
        debug!(error = %e, "failed to answer OAuth callback");
    }
    let _ = stream.shutdown().await;

    Some(params.into_result())
}

/// Query parameters of the OAuth redirect.
#[derive(Debug, Default, PartialEq, Eq)]
struct CallbackParams {
    code: Option<String>,
    state: Option<String>,
    error: Option<String>,
}

impl CallbackParams {
    /// Parses the request target of the redirect, e.g. `/callback?code=..&state=..`.
    fn parse(target: &str) -> Self {
        let query = target.split_once('?').map(|(_, q)| q).unwrap_or("");
        let mut params = Self::default();

        for pair in query.split('&') {
            let Some((key, value)) = pair.split_once('=') else {
                continue;
            };
            let value = urlencoding::decode(value)
                .map(|v| v.into_owned())
                .unwrap_or_default();
            match key {
                "code" => params.code = Some(value),
                "state" => params.state = Some(value),
                "error" => params.error = Some(value),
                _ => {}
            }
        }
        params
    }

    /// Returns `(code, state)` or the reason the redirect is unusable.
    fn into_result(self) -> PickerResult<(String, String)> {
        if let Some(error) = self.error {
            return Err(PickerError::authentication_required(format!(
                "authorization denied: {}",
                error
            )));
        }
        match self.code {
            Some(code) => Ok((code, self.state.unwrap_or_default())),
            None => Err(PickerError::authentication_required(
                "missing authorization code in callback",
            )),
        }
    }
}

/// One sign-in attempt's PKCE values (RFC 7636) and CSRF state.
#[derive(Debug)]
pub struct PkceFlow {
    pub verifier: String,
    /// `BASE64URL(SHA256(verifier))`.
    pub challenge: String,
    pub state: String,
}

impl PkceFlow {
    pub fn new() -> Self {
        let verifier = random_token(CODE_VERIFIER_LENGTH);
        Self {
            challenge: s256_challenge(&verifier),
            verifier,
            state: random_token(STATE_LENGTH),
        }
    }

    /// Builds the consent page URL, asking for offline access so Google
    /// returns a refresh token.
    pub fn build_auth_url(
        &self,
        auth_url: &str,
        client_id: &str,
        redirect_uri: &str,
        scopes: &[String],
    ) -> PickerResult<String> {
        let scope = scopes.join(" ");
        let params = [
            ("client_id", client_id),
            ("redirect_uri", redirect_uri),
            ("response_type", "code"),
            ("scope", scope.as_str()),
            ("code_challenge", self.challenge.as_str()),
            ("code_challenge_method", "S256"),
            ("state", self.state.as_str()),
            ("access_type", "offline"),
            ("prompt", "consent"),
        ];
        Url::parse_with_params(auth_url, params)
            .map(String::from)
            .map_err(|e| PickerError::configuration(format!("invalid auth URL: {}", e)))
    }
}

impl Default for PkceFlow {
    fn default() -> Self {
        Self::new()
    }
}

fn random_token(len: usize) -> String {
    let mut bytes = vec![0u8; len];
    rand::rng().fill(bytes.as_mut_slice());
    URL_SAFE_NO_PAD.encode(bytes)
}

fn s256_challenge(verifier: &str) -> String {
    URL_SAFE_NO_PAD.encode(Sha256::digest(verifier.as_bytes()))
}

/// Response from Google's token endpoint.
#[derive(Debug, serde::Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
}

/// Error body from Google's token endpoint.
#[derive(Debug, serde::Deserialize)]
struct TokenErrorResponse {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}
