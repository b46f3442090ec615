//! ftrack JSON API client.
//!
//! The ftrack server exposes a single endpoint, `{server}/api`, that accepts
//! a JSON array of operations and answers with an array of results in the
//! same order. This module provides:
//! - [`Operation`] - the operations trackrig sends
//! - [`FtrackClient`] - authenticated calls plus query helpers
//! - [`Batch`] - create/update operations accumulated for one commit
//!
//! Higher-level workflows live in [`tasks`] (project/task listing) and
//! [`upload`] (render upload and transcode).

pub mod tasks;
pub mod upload;

use serde::Serialize;
use serde_json::{Map, Value};

use crate::http::Transport;
use crate::{Error, Result};

/// A single operation in an API call.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Operation {
    Query {
        expression: String,
    },
    Create {
        entity_type: String,
        entity_data: Value,
    },
    Update {
        entity_type: String,
        entity_key: Vec<String>,
        entity_data: Value,
    },
    EncodeMedia {
        component_id: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        version_id: Option<String>,
        keep_original: bool,
    },
    GetUploadMetadata {
        component_id: String,
        file_name: String,
        file_size: u64,
        checksum: Option<String>,
    },
}

/// Authenticated client for one ftrack server.
pub struct FtrackClient<T: Transport> {
    server_url: String,
    username: String,
    api_key: String,
    transport: T,
}

impl<T: Transport> FtrackClient<T> {
    /// Create a client. A trailing `/` on the server URL is ignored.
    pub fn new(
        server_url: impl Into<String>,
        username: impl Into<String>,
        api_key: impl Into<String>,
        transport: T,
    ) -> Self {
        let server_url = server_url.into().trim_end_matches('/').to_string();
        Self {
            server_url,
            username: username.into(),
            api_key: api_key.into(),
            transport,
        }
    }

    pub fn server_url(&self) -> &str {
        &self.server_url
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    fn endpoint(&self) -> String {
        format!("{}/api", self.server_url)
    }

    /// Send operations and return the result array.
    ///
    /// Transport and decode failures propagate. A server-side exception
    /// payload becomes [`Error::Api`].
    pub fn call(&self, operations: &[Operation]) -> Result<Vec<Value>> {
        let body = serde_json::to_value(operations)?;
        let headers = [
            ("Content-Type", "application/json"),
            ("Accept", "application/json"),
            ("ftrack-user", self.username.as_str()),
            ("ftrack-api-key", self.api_key.as_str()),
        ];

        tracing::debug!(endpoint = %self.endpoint(), count = operations.len(), "ftrack call");

        match self.transport.post_json(&self.endpoint(), &headers, &body)? {
            Value::Array(results) => Ok(results),
            Value::Object(map) if map.contains_key("exception") => {
                let message = map
                    .get("content")
                    .and_then(Value::as_str)
                    .or_else(|| map.get("exception").and_then(Value::as_str))
                    .unwrap_or("unknown error");
                Err(Error::Api(message.to_string()))
            }
            other => Err(Error::MalformedResponse(format!(
                "expected a result array, got {}",
                json_kind(&other)
            ))),
        }
    }

    /// Run a query and return its `data` array.
    pub fn query(&self, expression: impl Into<String>) -> Result<Vec<Value>> {
        let results = self.call(&[Operation::Query {
            expression: expression.into(),
        }])?;

        let first = results
            .into_iter()
            .next()
            .ok_or_else(|| Error::MalformedResponse("empty result array".to_string()))?;

        match first.get("data") {
            Some(Value::Array(data)) => Ok(data.clone()),
            Some(other) => Err(Error::MalformedResponse(format!(
                "'data' is {}, not a list",
                json_kind(other)
            ))),
            None => Err(Error::MalformedResponse(
                "result has no 'data' field".to_string(),
            )),
        }
    }

    /// Run a query and return the first entity, if any.
    pub fn query_first(&self, expression: impl Into<String>) -> Result<Option<Value>> {
        Ok(self.query(expression)?.into_iter().next())
    }

    /// Send every operation in `batch` in one call.
    ///
    /// An empty batch makes no request.
    pub fn commit(&self, batch: Batch) -> Result<Vec<Value>> {
        if batch.is_empty() {
            return Ok(Vec::new());
        }
        self.call(&batch.operations)
    }
}

/// Create and update operations waiting to be committed.
#[derive(Debug, Default)]
pub struct Batch {
    operations: Vec<Operation>,
}

impl Batch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue an entity creation and return the entity as it will exist.
    ///
    /// Primary keys are generated client-side, so the returned value carries
    /// the new `id` immediately.
    pub fn create(&mut self, entity_type: &str, mut data: Map<String, Value>) -> Value {
        data.entry("id")
            .or_insert_with(|| Value::String(uuid::Uuid::new_v4().to_string()));
        let entity = Value::Object(data);
        self.operations.push(Operation::Create {
            entity_type: entity_type.to_string(),
            entity_data: entity.clone(),
        });
        entity
    }

    /// Queue an update of an existing entity.
    pub fn update(&mut self, entity_type: &str, id: &str, data: Map<String, Value>) {
        self.operations.push(Operation::Update {
            entity_type: entity_type.to_string(),
            entity_key: vec![id.to_string()],
            entity_data: Value::Object(data),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn operations(&self) -> &[Operation] {
        &self.operations
    }
}

/// Escape a value for use inside a double-quoted query literal.
pub fn quote(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

/// String field of an entity, or "" when absent or not a string.
pub fn str_field<'a>(entity: &'a Value, key: &str) -> &'a str {
    entity.get(key).and_then(Value::as_str).unwrap_or("")
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{FakeTransport, Recorded};
    use serde_json::json;

    fn client(transport: &FakeTransport) -> FtrackClient<&FakeTransport> {
        FtrackClient::new("https://studio.ftrackapp.com/", "artist", "secret", transport)
    }

    #[test]
    fn test_server_url_trailing_slash_trimmed() {
        let transport = FakeTransport::new();
        let client = client(&transport);
        assert_eq!(client.server_url(), "https://studio.ftrackapp.com");
    }

    #[test]
    fn test_call_posts_to_api_endpoint() {
        let transport = FakeTransport::new().reply(json!([{"action": "query", "data": []}]));
        let client = client(&transport);

        client
            .call(&[Operation::Query {
                expression: "select id from Task".to_string(),
            }])
            .unwrap();

        let requests = transport.requests.borrow();
        match &requests[0] {
            Recorded::Post { url, body } => {
                assert_eq!(url, "https://studio.ftrackapp.com/api");
                assert_eq!(
                    body,
                    &json!([{"action": "query", "expression": "select id from Task"}])
                );
            }
            other => panic!("Expected POST, got: {:?}", other),
        }
    }

    #[test]
    fn test_call_exception_payload_is_api_error() {
        let transport = FakeTransport::new().reply(json!({
            "exception": "ServerError",
            "content": "Invalid API key"
        }));
        let client = client(&transport);

        match client.call(&[]) {
            Err(Error::Api(message)) => assert_eq!(message, "Invalid API key"),
            other => panic!("Expected Api error, got: {:?}", other),
        }
    }

    #[test]
    fn test_call_non_array_is_malformed() {
        let transport = FakeTransport::new().reply(json!("nope"));
        let client = client(&transport);
        assert!(matches!(
            client.call(&[]),
            Err(Error::MalformedResponse(_))
        ));
    }

    #[test]
    fn test_call_propagates_transport_error() {
        let transport = FakeTransport::new().fail("connection refused");
        let client = client(&transport);
        assert!(matches!(client.call(&[]), Err(Error::Http(_))));
    }

    #[test]
    fn test_query_missing_data_is_malformed() {
        let transport = FakeTransport::new().reply(json!([{"action": "query"}]));
        let client = client(&transport);
        assert!(matches!(
            client.query("select id from Task"),
            Err(Error::MalformedResponse(_))
        ));
    }

    #[test]
    fn test_query_first() {
        let transport = FakeTransport::new()
            .reply(json!([{"data": [{"id": "a"}, {"id": "b"}]}]))
            .reply(json!([{"data": []}]));
        let client = client(&transport);

        let first = client.query_first("select id from Task").unwrap().unwrap();
        assert_eq!(first["id"], "a");
        assert!(client.query_first("select id from Task").unwrap().is_none());
    }

    #[test]
    fn test_batch_create_assigns_id() {
        let mut batch = Batch::new();
        let entity = batch.create("Asset", Map::new());
        let id = entity["id"].as_str().unwrap();
        assert_eq!(id.len(), 36);
        assert_eq!(batch.len(), 1);
    }

    #[test]
    fn test_batch_create_keeps_explicit_id() {
        let mut batch = Batch::new();
        let mut data = Map::new();
        data.insert("id".to_string(), json!("fixed"));
        let entity = batch.create("Asset", data);
        assert_eq!(entity["id"], "fixed");
    }

    #[test]
    fn test_empty_commit_makes_no_request() {
        let transport = FakeTransport::new();
        let client = client(&transport);
        assert!(client.commit(Batch::new()).unwrap().is_empty());
        assert_eq!(transport.total_requests(), 0);
    }

    #[test]
    fn test_operation_serialization() {
        let op = Operation::EncodeMedia {
            component_id: "c1".to_string(),
            version_id: None,
            keep_original: true,
        };
        assert_eq!(
            serde_json::to_value(&op).unwrap(),
            json!({"action": "encode_media", "component_id": "c1", "keep_original": true})
        );

        let mut batch = Batch::new();
        let mut data = Map::new();
        data.insert("name".to_string(), json!("render.mov"));
        batch.update("FileComponent", "c1", data);
        assert_eq!(
            serde_json::to_value(&batch.operations()[0]).unwrap(),
            json!({
                "action": "update",
                "entity_type": "FileComponent",
                "entity_key": ["c1"],
                "entity_data": {"name": "render.mov"}
            })
        );
    }

    #[test]
    fn test_quote_escapes() {
        assert_eq!(quote(r#"a"b"#), r#"a\"b"#);
        assert_eq!(quote("plain"), "plain");
    }
}
