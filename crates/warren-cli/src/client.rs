//! HTTP transport for the management API, plus the CLI error types.

use std::fmt::{self, Debug, Display, Formatter};
use std::io::{self, Write};
use std::pin::pin;

use anyhow::anyhow;
use futures_util::{Stream, StreamExt};
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderValue};
use reqwest::{Client, Method, Response, StatusCode, Url};
use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::abort::AbortFlag;

pub(crate) const HEADER_REQUEST_ID: &str = "x-request-id";
const API_PREFIX: &str = "api";
const JSON_CONTENT_TYPE: &str = "application/json";
const MAX_PREALLOCATION: usize = 64 * 1024 * 1024;

/// Reasons the console cannot start or has to stop.
///
/// Bad flags or credentials are the operator's to fix and exit with `2`;
/// anything that breaks a running console (client setup, terminal I/O) exits
/// with `3`. Command-level failures never get here.
#[derive(Debug)]
pub(crate) enum CliError {
    Validation(String),
    Failure(anyhow::Error),
}

pub(crate) type CliResult<T> = Result<T, CliError>;

impl CliError {
    pub(crate) fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub(crate) fn failure(error: impl Into<anyhow::Error>) -> Self {
        Self::Failure(error.into())
    }

    pub(crate) const fn exit_code(&self) -> i32 {
        match self {
            Self::Validation(_) => 2,
            Self::Failure(_) => 3,
        }
    }
}

impl Display for CliError {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Validation(message) => formatter.write_str(message),
            Self::Failure(error) => write!(formatter, "{error:#}"),
        }
    }
}

impl std::error::Error for CliError {}

/// Failure modes of a single management API call.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The server answered with a status other than the accepted one.
    #[error("request failed with status {0}")]
    Status(StatusCode),
    /// Connection, protocol, or body-stream failure.
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    /// The user interrupted a streamed transfer.
    #[error("transfer aborted")]
    Aborted,
    /// The response body was not the JSON shape the caller expected.
    #[error("malformed response payload: {0}")]
    Decode(#[source] serde_json::Error),
    /// The request body could not be serialised.
    #[error("failed to encode request body: {0}")]
    Encode(#[source] serde_json::Error),
    /// The resource path could not be turned into a URL.
    #[error("invalid resource path {0}")]
    InvalidPath(String),
    /// Client construction failed.
    #[error("invalid client configuration: {0}")]
    Configuration(String),
    /// Progress output could not be written.
    #[error("failed to write progress: {0}")]
    Output(#[from] io::Error),
}

/// Basic-auth credentials for the management API.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    /// Account name.
    pub user: String,
    /// Account password.
    pub password: String,
}

impl Debug for Credentials {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("Credentials")
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Client for the broker's management API.
///
/// Every request targets `<base>/api/<path>` with basic auth and a JSON
/// content type. Only one call is in flight at a time; the console drives it
/// synchronously.
#[derive(Clone, Debug)]
pub struct ManagementClient {
    http: Client,
    base_url: Url,
    credentials: Credentials,
}

impl ManagementClient {
    /// Build a client tagging every request with `trace_id`.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::Configuration`] when the trace identifier is not a
    /// valid header value, or [`FetchError::Transport`] when the HTTP client
    /// cannot be constructed.
    pub fn new(
        base_url: Url,
        credentials: Credentials,
        trace_id: &str,
    ) -> Result<Self, FetchError> {
        let mut default_headers = HeaderMap::new();
        let request_id = HeaderValue::from_str(trace_id).map_err(|_| {
            FetchError::Configuration("trace identifier contains invalid characters".into())
        })?;
        default_headers.insert(HEADER_REQUEST_ID, request_id);

        let http = Client::builder().default_headers(default_headers).build()?;

        Ok(Self {
            http,
            base_url,
            credentials,
        })
    }

    /// Fetch `path` and decode the streamed body as `T`.
    ///
    /// Progress is rendered to `out` while the body arrives. The abort flag is
    /// cleared before the transfer starts and polled between chunks.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::Status`] for any non-200 answer,
    /// [`FetchError::Aborted`] when the user interrupts the transfer and
    /// [`FetchError::Decode`] when the body is not valid for `T`.
    pub async fn fetch_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &str,
        abort: &AbortFlag,
        out: &mut dyn Write,
    ) -> Result<T, FetchError> {
        let response = self.send(Method::GET, path, query, None).await?;
        let expected_len = response.content_length();
        let body = receive_body(response.bytes_stream(), expected_len, abort, out).await?;
        serde_json::from_slice(&body).map_err(|err| {
            tracing::error!(path, error = %err, "management API returned malformed JSON");
            FetchError::Decode(err)
        })
    }

    /// Check that `path` resolves, without reading the body.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::Status`] for any non-200 answer.
    pub async fn exists(&self, path: &str) -> Result<(), FetchError> {
        self.send(Method::GET, path, "", None).await.map(drop)
    }

    /// Write `body` to `path` as JSON.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::Status`] when the server does not answer with a
    /// success status.
    pub async fn put<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<(), FetchError> {
        let payload = serde_json::to_vec(body).map_err(FetchError::Encode)?;
        self.send(Method::PUT, path, "", Some(payload))
            .await
            .map(drop)
    }

    fn endpoint(&self, path: &str, query: &str) -> Result<Url, FetchError> {
        // Dot segments cannot be escaped; the URL parser would resolve them
        // and the request would reach a different resource.
        if path.split('/').any(is_dot_segment) {
            return Err(FetchError::InvalidPath(format!(
                "'{path}' contains a dot segment"
            )));
        }
        let raw = format!(
            "{}/{API_PREFIX}/{path}",
            self.base_url.as_str().trim_end_matches('/')
        );
        let mut url =
            Url::parse(&raw).map_err(|err| FetchError::InvalidPath(format!("'{path}': {err}")))?;
        url.set_query((!query.is_empty()).then_some(query));
        Ok(url)
    }

    async fn send(
        &self,
        method: Method,
        path: &str,
        query: &str,
        body: Option<Vec<u8>>,
    ) -> Result<Response, FetchError> {
        let url = self.endpoint(path, query)?;
        tracing::debug!(%method, %url, "management API request");

        let mut request = self
            .http
            .request(method.clone(), url)
            .basic_auth(&self.credentials.user, Some(&self.credentials.password))
            .header(CONTENT_TYPE, JSON_CONTENT_TYPE);
        if let Some(body) = body {
            request = request.body(body);
        }

        let response = request.send().await.inspect_err(|err| {
            tracing::warn!(%method, path, error = %err, "management API unreachable");
        })?;

        let status = response.status();
        // Writes may legitimately answer 201/204.
        let accepted = if method == Method::PUT {
            status.is_success()
        } else {
            status == StatusCode::OK
        };
        if !accepted {
            tracing::warn!(%method, path, %status, "management API rejected request");
            return Err(FetchError::Status(status));
        }
        Ok(response)
    }
}

/// Drain a response body stream, rendering percentage progress to `out`.
///
/// Progress is skipped when the length is unknown or zero. An abort request
/// ends the transfer even while the stream is waiting for its next chunk.
pub(crate) async fn receive_body<S, B, E>(
    stream: S,
    expected_len: Option<u64>,
    abort: &AbortFlag,
    out: &mut dyn Write,
) -> Result<Vec<u8>, FetchError>
where
    S: Stream<Item = Result<B, E>>,
    B: AsRef<[u8]>,
    FetchError: From<E>,
{
    let expected_len = expected_len.filter(|len| *len > 0);
    let capacity = expected_len
        .and_then(|len| usize::try_from(len).ok())
        .unwrap_or_default()
        .min(MAX_PREALLOCATION);
    let mut body = Vec::with_capacity(capacity);
    let mut stream = pin!(stream);

    abort.reset();
    loop {
        let chunk = tokio::select! {
            biased;
            () = abort.triggered() => {
                writeln!(out, " Aborted.")?;
                out.flush()?;
                tracing::info!(received = body.len(), "transfer aborted by user");
                return Err(FetchError::Aborted);
            }
            chunk = stream.next() => chunk,
        };
        let Some(chunk) = chunk else {
            break;
        };
        let chunk = match chunk {
            Ok(chunk) => chunk,
            Err(err) => {
                if expected_len.is_some() {
                    writeln!(out)?;
                }
                return Err(err.into());
            }
        };
        body.extend_from_slice(chunk.as_ref());

        if let Some(total) = expected_len {
            let received = u64::try_from(body.len()).unwrap_or(u64::MAX);
            write!(
                out,
                "\x1b[GReceiving... ({}%)",
                percent_complete(received, total)
            )?;
            out.flush()?;
        }
    }

    if expected_len.is_some() {
        write!(out, "\x1b[G\x1b[K")?;
        out.flush()?;
    }
    Ok(body)
}

const fn percent_complete(received: u64, total: u64) -> u64 {
    let percent = received.saturating_mul(100) / total;
    if percent > 100 { 100 } else { percent }
}

/// Escape a single path segment for the management API.
///
/// Every byte outside the RFC 3986 unreserved set is percent-encoded, so `/`
/// becomes `%2f` and `\` cannot be read as a separator. Query strings are
/// never passed through here.
#[must_use]
pub fn escape_segment(segment: &str) -> String {
    const HEX: &[u8; 16] = b"0123456789abcdef";

    let mut escaped = String::with_capacity(segment.len());
    for byte in segment.bytes() {
        if byte.is_ascii_alphanumeric() || matches!(byte, b'-' | b'.' | b'_' | b'~') {
            escaped.push(char::from(byte));
        } else {
            escaped.push('%');
            escaped.push(char::from(HEX[usize::from(byte >> 4)]));
            escaped.push(char::from(HEX[usize::from(byte & 0x0f)]));
        }
    }
    escaped
}

/// Whether URL parsing would collapse `segment` (`.`, `..`, or an encoded form).
fn is_dot_segment(segment: &str) -> bool {
    let decoded = segment.to_ascii_lowercase().replace("%2e", ".");
    decoded == "." || decoded == ".."
}

/// Parse the management API URL provided to the CLI.
pub(crate) fn parse_url(input: &str) -> Result<Url, String> {
    input
        .parse::<Url>()
        .map_err(|err| format!("invalid URL '{input}': {err}"))
}

/// Parse `user:password` credentials provided to the CLI.
pub(crate) fn parse_credentials(input: &str) -> CliResult<Credentials> {
    let (user, password) = input
        .trim()
        .split_once(':')
        .ok_or_else(|| CliError::validation("credentials must be provided as user:password"))?;

    if user.trim().is_empty() {
        return Err(CliError::validation("credential user cannot be empty"));
    }

    Ok(Credentials {
        user: user.trim().to_string(),
        password: password.to_string(),
    })
}

pub(crate) fn io_failure(err: io::Error) -> CliError {
    CliError::failure(anyhow!("terminal I/O failed: {err}"))
}
