//! trackrig - ftrack task browsing, rig asset syncing and render uploads.
//!
//! This library provides the core functionality for the `trk` CLI tool:
//! querying assigned work from ftrack, keeping linked rig files in step with
//! a published manifest, and pushing renders back as reviewable versions.

pub mod cli;
pub mod commands;
pub mod config;
pub mod ftrack;
pub mod host;
pub mod http;
pub mod models;
pub mod rigs;

/// Test utilities shared by unit tests.
#[cfg(test)]
pub(crate) mod test_utils {
    use std::cell::RefCell;
    use std::collections::{HashMap, VecDeque};
    use std::io::Read;

    use serde_json::Value;

    use crate::http::Transport;
    use crate::{Error, Result};

    /// A request observed by [`FakeTransport`].
    #[derive(Debug, Clone)]
    pub enum Recorded {
        Post { url: String, body: Value },
        Get { url: String },
        Put { url: String, bytes: usize, len: u64 },
    }

    /// In-memory transport with scripted replies.
    ///
    /// POST replies are consumed in order. GET bodies are keyed by URL; an
    /// unknown URL behaves like a 404.
    #[derive(Default)]
    pub struct FakeTransport {
        posts: RefCell<VecDeque<std::result::Result<Value, String>>>,
        gets: RefCell<HashMap<String, Vec<u8>>>,
        fail_puts: bool,
        pub requests: RefCell<Vec<Recorded>>,
    }

    impl FakeTransport {
        pub fn new() -> Self {
            Self::default()
        }

        /// Queue a successful POST reply.
        pub fn reply(self, value: Value) -> Self {
            self.posts.borrow_mut().push_back(Ok(value));
            self
        }

        /// Queue a failing POST reply.
        pub fn fail(self, message: &str) -> Self {
            self.posts.borrow_mut().push_back(Err(message.to_string()));
            self
        }

        /// Serve `body` for GET requests to `url`.
        pub fn serve(self, url: &str, body: impl Into<Vec<u8>>) -> Self {
            self.gets.borrow_mut().insert(url.to_string(), body.into());
            self
        }

        /// Make every PUT fail.
        pub fn failing_puts(mut self) -> Self {
            self.fail_puts = true;
            self
        }

        pub fn post_count(&self) -> usize {
            self.requests
                .borrow()
                .iter()
                .filter(|r| matches!(r, Recorded::Post { .. }))
                .count()
        }

        /// Bodies of every POST, in order.
        pub fn post_bodies(&self) -> Vec<Value> {
            self.requests
                .borrow()
                .iter()
                .filter_map(|r| match r {
                    Recorded::Post { body, .. } => Some(body.clone()),
                    _ => None,
                })
                .collect()
        }

        pub fn total_requests(&self) -> usize {
            self.requests.borrow().len()
        }
    }

    impl Transport for FakeTransport {
        fn post_json(&self, url: &str, _headers: &[(&str, &str)], body: &Value) -> Result<Value> {
            self.requests.borrow_mut().push(Recorded::Post {
                url: url.to_string(),
                body: body.clone(),
            });
            match self.posts.borrow_mut().pop_front() {
                Some(Ok(value)) => Ok(value),
                Some(Err(message)) => Err(Error::Http(message)),
                None => Err(Error::Http("no scripted reply".to_string())),
            }
        }

        fn get(&self, url: &str) -> Result<Box<dyn Read>> {
            self.requests.borrow_mut().push(Recorded::Get {
                url: url.to_string(),
            });
            match self.gets.borrow().get(url) {
                Some(body) => Ok(Box::new(std::io::Cursor::new(body.clone()))),
                None => Err(Error::Status {
                    code: 404,
                    url: url.to_string(),
                }),
            }
        }

        fn put(
            &self,
            url: &str,
            _headers: &[(String, String)],
            body: &mut dyn Read,
            len: u64,
        ) -> Result<()> {
            let mut buf = Vec::new();
            body.read_to_end(&mut buf)?;
            self.requests.borrow_mut().push(Recorded::Put {
                url: url.to_string(),
                bytes: buf.len(),
                len,
            });
            if self.fail_puts {
                return Err(Error::Status {
                    code: 500,
                    url: url.to_string(),
                });
            }
            Ok(())
        }
    }
}

/// Library-level error type for trackrig operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("HTTP {code} from {url}")]
    Status { code: u16, url: String },

    #[error("ftrack API error: {0}")]
    Api(String),

    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    #[error("Missing credentials: {}. Run `trk config set` or export FTRACK_* variables", .0.join(", "))]
    MissingCredentials(Vec<&'static str>),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Document has not been saved; save it first so files can be placed next to it")]
    DocumentNotSaved,

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("{0}")]
    Other(String),
}

/// Result type alias for trackrig operations.
pub type Result<T> = std::result::Result<T, Error>;
