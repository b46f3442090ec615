//! Blocking HTTP transport.
//!
//! All network access goes through the [`Transport`] trait so the ftrack
//! client, manifest loader and downloader can be driven by an in-memory
//! transport in tests. [`HttpTransport`] is the `ureq` implementation.

use std::io::Read;
use std::sync::Arc;

use serde_json::Value;

use crate::{Error, Result};

/// User-Agent header sent with every request
const USER_AGENT: &str = concat!("trackrig/", env!("CARGO_PKG_VERSION"));

/// Minimal HTTP surface needed by trackrig.
pub trait Transport {
    /// POST a JSON body and decode the JSON response.
    fn post_json(&self, url: &str, headers: &[(&str, &str)], body: &Value) -> Result<Value>;

    /// GET a URL and return a reader over the response body.
    ///
    /// Non-2xx responses are errors.
    fn get(&self, url: &str) -> Result<Box<dyn Read>>;

    /// PUT a streamed body of `len` bytes.
    ///
    /// The length is sent as `Content-Length`. Presigned storage URLs
    /// reject chunked uploads.
    fn put(
        &self,
        url: &str,
        headers: &[(String, String)],
        body: &mut dyn Read,
        len: u64,
    ) -> Result<()>;
}

impl<T: Transport + ?Sized> Transport for &T {
    fn post_json(&self, url: &str, headers: &[(&str, &str)], body: &Value) -> Result<Value> {
        (**self).post_json(url, headers, body)
    }

    fn get(&self, url: &str) -> Result<Box<dyn Read>> {
        (**self).get(url)
    }

    fn put(
        &self,
        url: &str,
        headers: &[(String, String)],
        body: &mut dyn Read,
        len: u64,
    ) -> Result<()> {
        (**self).put(url, headers, body, len)
    }
}

/// `ureq`-backed transport.
pub struct HttpTransport {
    agent: ureq::Agent,
}

impl HttpTransport {
    /// Transport with normal certificate verification.
    pub fn new() -> Self {
        Self {
            agent: ureq::AgentBuilder::new().user_agent(USER_AGENT).build(),
        }
    }

    /// Transport that skips TLS certificate and hostname verification.
    ///
    /// Studio ftrack servers are commonly fronted by self-signed certificates.
    pub fn insecure() -> Result<Self> {
        let connector = native_tls::TlsConnector::builder()
            .danger_accept_invalid_certs(true)
            .danger_accept_invalid_hostnames(true)
            .build()
            .map_err(|e| Error::Http(format!("TLS setup failed: {}", e)))?;

        Ok(Self {
            agent: ureq::AgentBuilder::new()
                .user_agent(USER_AGENT)
                .tls_connector(Arc::new(connector))
                .build(),
        })
    }
}

impl Default for HttpTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for HttpTransport {
    fn post_json(&self, url: &str, headers: &[(&str, &str)], body: &Value) -> Result<Value> {
        let mut request = self.agent.post(url);
        for (name, value) in headers {
            request = request.set(name, value);
        }

        let response = request.send_json(body).map_err(|e| map_ureq_error(url, e))?;
        response
            .into_json::<Value>()
            .map_err(|e| Error::MalformedResponse(e.to_string()))
    }

    fn get(&self, url: &str) -> Result<Box<dyn Read>> {
        let response = self.agent.get(url).call().map_err(|e| map_ureq_error(url, e))?;
        Ok(Box::new(response.into_reader()))
    }

    fn put(
        &self,
        url: &str,
        headers: &[(String, String)],
        body: &mut dyn Read,
        len: u64,
    ) -> Result<()> {
        let mut request = self.agent.put(url);
        for (name, value) in headers {
            request = request.set(name, value);
        }

        request
            .set("Content-Length", &len.to_string())
            .send(body.take(len))
            .map_err(|e| map_ureq_error(url, e))?;
        Ok(())
    }
}

/// Convert a `ureq` error, keeping status codes distinguishable from
/// transport failures.
fn map_ureq_error(url: &str, error: ureq::Error) -> Error {
    match error {
        ureq::Error::Status(code, response) => {
            let body = response.into_string().unwrap_or_default();
            if !body.is_empty() {
                tracing::debug!(code, %url, %body, "HTTP error response");
            }
            Error::Status {
                code,
                url: url.to_string(),
            }
        }
        ureq::Error::Transport(transport) => Error::Http(transport.to_string()),
    }
}
