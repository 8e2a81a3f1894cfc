//! Two-phase Digest exchange: unauthenticated probe, then one authenticated retry.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use http::header::{AUTHORIZATION, WWW_AUTHENTICATE};
use http::{Method, Request, Response, StatusCode};
use tracing::{debug, instrument, warn};
use url::Url;

use crate::utils::digest_uri;
use crate::{AuthContext, Challenge, Credentials, Error, Result};

const USER_AGENT: &str = concat!("myenergi-rs/", env!("CARGO_PKG_VERSION"));

/// Sends one HTTP request and returns the complete response.
///
/// The request URI is absolute. Implementations report connection-level failures as
/// [`Error::Transport`].
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn send(&self, request: Request<Vec<u8>>) -> Result<Response<Vec<u8>>>;
}

/// [`HttpTransport`] backed by a `reqwest` client.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    inner: reqwest::Client,
    timeout: Duration,
}

impl ReqwestTransport {
    pub fn new(timeout: Duration) -> Result<Self> {
        let inner = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| Error::Transport(e.to_string()))?;

        Ok(Self { inner, timeout })
    }

    fn map_error(&self, e: reqwest::Error) -> Error {
        if e.is_timeout() {
            Error::RequestTimeout(self.timeout)
        } else {
            Error::Transport(e.to_string())
        }
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn send(&self, request: Request<Vec<u8>>) -> Result<Response<Vec<u8>>> {
        let (parts, body) = request.into_parts();

        let response = self
            .inner
            .request(parts.method, parts.uri.to_string())
            .headers(parts.headers)
            .body(body)
            .send()
            .await
            .map_err(|e| self.map_error(e))?;

        let status = response.status();
        let headers = response.headers().clone();
        let bytes = response.bytes().await.map_err(|e| self.map_error(e))?;

        let mut out = Response::new(bytes.to_vec());
        *out.status_mut() = status;
        *out.headers_mut() = headers;
        Ok(out)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Probing,
    Authenticating,
    Done,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Phase::Probing => "probing",
            Phase::Authenticating => "authenticating",
            Phase::Done => "done",
        })
    }
}

/// HTTP client that answers Digest challenges.
///
/// Every call performs a full probe and at most one authenticated retry. Nothing is kept
/// between calls, so a client can be shared freely between tasks.
#[derive(Clone)]
pub struct AuthenticatedHttpClient {
    transport: Arc<dyn HttpTransport>,
    timeout: Duration,
}

impl fmt::Debug for AuthenticatedHttpClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthenticatedHttpClient")
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl AuthenticatedHttpClient {
    pub fn new(transport: Arc<dyn HttpTransport>, timeout: Duration) -> Self {
        Self { transport, timeout }
    }

    /// Client over a fresh `reqwest` transport
    pub fn with_timeout(timeout: Duration) -> Result<Self> {
        Ok(Self::new(Arc::new(ReqwestTransport::new(timeout)?), timeout))
    }

    /// Perform one logical request.
    ///
    /// A probe answered with anything but 401 is returned as-is. A 401 is answered once;
    /// a second 401 is [`Error::AuthenticationFailed`]. Other statuses of the final
    /// response are left to the caller.
    #[instrument(skip_all, fields(method = %method, uri = %digest_uri(url)))]
    pub async fn send(
        &self,
        credentials: &Credentials,
        method: Method,
        url: &Url,
        body: Vec<u8>,
    ) -> Result<Response<Vec<u8>>> {
        debug!(phase = %Phase::Probing, "sending probe");
        let probe = self.exchange(build_request(&method, url, &body, None)?).await?;

        if probe.status() != StatusCode::UNAUTHORIZED {
            debug!(phase = %Phase::Done, status = %probe.status(), "no challenge");
            return Ok(probe);
        }

        let header = match probe.headers().get(WWW_AUTHENTICATE) {
            Some(v) => Some(v.to_str().map_err(|e| Error::InvalidHeaderSyntax(e.to_string()))?),
            None => None,
        };
        let challenge = Challenge::from_header(header)?;
        debug!(
            phase = %Phase::Authenticating,
            realm = %challenge.realm,
            qop = ?challenge.qop,
            algorithm = %challenge.algorithm,
            "challenge received"
        );

        let uri = digest_uri(url);
        let context =
            AuthContext::new_with_method(credentials, uri, method.clone(), Some(body.as_slice()));
        let authorization = challenge.respond(&context).to_header_string();

        let response = self
            .exchange(build_request(&method, url, &body, Some(&authorization))?)
            .await?;

        if response.status() == StatusCode::UNAUTHORIZED {
            warn!(
                phase = %Phase::Done,
                identity = %credentials.identity(),
                "credentials rejected"
            );
            return Err(Error::AuthenticationFailed(uri.to_owned()));
        }

        debug!(phase = %Phase::Done, status = %response.status(), "authenticated");
        Ok(response)
    }

    async fn exchange(&self, request: Request<Vec<u8>>) -> Result<Response<Vec<u8>>> {
        tokio::time::timeout(self.timeout, self.transport.send(request))
            .await
            .map_err(|_| Error::RequestTimeout(self.timeout))?
    }
}

fn build_request(
    method: &Method,
    url: &Url,
    body: &[u8],
    authorization: Option<&str>,
) -> Result<Request<Vec<u8>>> {
    let mut builder = Request::builder().method(method.clone()).uri(url.as_str());
    if let Some(value) = authorization {
        builder = builder.header(AUTHORIZATION, value);
    }
    Ok(builder.body(body.to_vec())?)
}
