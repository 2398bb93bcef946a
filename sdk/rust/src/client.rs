//! The shapeql client.
//!
//! Each call synthesizes a document from the target's field tree, POSTs it,
//! and decodes `data` back into the same target.
//!
//! # Example
//!
//! ```ignore
//! use shapeql_sdk::{Context, ShapeqlClient, Variables};
//!
//! #[derive(Default, GraphQL)]
//! struct HeroQuery {
//!     #[graphql(args = "episode: $episode")]
//!     hero: Hero,
//! }
//!
//! let client = ShapeqlClient::new("http://localhost:4000/graphql");
//! let mut query = HeroQuery::default();
//! let vars = Variables::new().set("episode", &Episode::Jedi);
//! client.query(&Context::background(), &mut query, &vars).await?;
//! println!("{}", query.hero.name);
//! ```

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use serde::Serialize;
use serde_json::value::RawValue;
use serde_json::Value;
use shapeql_core::envelope::SNIPPET_LIMIT;
use shapeql_core::{
    body_snippet, normalize, DecodeOptions, Decoder, Envelope, FormatOptions, GraphQLErrors,
    OperationKind, Selection, Synthesizer, Variables,
};
use tokio::time::Instant;
use tracing::debug;

use crate::context::Context;
use crate::error::{SdkError, SdkResult};
use crate::transport::{HttpResponse, HttpTransport, HyperTransport};

const CONTENT_TYPE_JSON: &str = "application/json";

/// Client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// URL of the GraphQL endpoint.
    pub url: String,
    /// Upper bound for a single call, on top of the context deadline.
    pub timeout: Duration,
    /// Headers sent with every request.
    pub headers: HashMap<String, String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            timeout: Duration::from_secs(30),
            headers: HashMap::new(),
        }
    }
}

impl ClientConfig {
    /// Creates a new config with a URL.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    /// Sets the timeout.
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Adds a default header.
    #[must_use]
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }
}

/// Request body.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GraphQLRequest<'a> {
    query: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    variables: Option<&'a Variables>,
    #[serde(skip_serializing_if = "Option::is_none")]
    operation_name: Option<&'a str>,
}

/// The undecoded result of a raw call.
#[derive(Debug, Clone)]
pub struct RawResponse {
    /// The `data` member, untouched. `None` when absent or `null`.
    pub data: Option<Box<RawValue>>,
    /// Normalized server errors; empty when there were none.
    pub errors: GraphQLErrors,
    pub extensions: Option<Value>,
}

impl RawResponse {
    /// Returns `data`, or the server errors if there are any.
    pub fn into_result(self) -> SdkResult<Option<Box<RawValue>>> {
        if self.errors.is_empty() {
            Ok(self.data)
        } else {
            Err(SdkError::GraphQL(self.errors))
        }
    }
}

impl From<Envelope> for RawResponse {
    fn from(envelope: Envelope) -> Self {
        Self {
            data: envelope.data,
            errors: envelope.errors,
            extensions: envelope.extensions,
        }
    }
}

/// GraphQL client. Cheap to clone; clones share the transport.
#[derive(Clone)]
pub struct ShapeqlClient {
    config: ClientConfig,
    transport: Arc<dyn HttpTransport>,
    format: FormatOptions,
    decode: DecodeOptions,
}

impl ShapeqlClient {
    /// Creates a new client with the given URL.
    pub fn new(url: impl Into<String>) -> Self {
        Self::with_config(ClientConfig::new(url))
    }

    /// Creates a new client with configuration.
    pub fn with_config(config: ClientConfig) -> Self {
        Self::with_transport(config, Arc::new(HyperTransport::new()))
    }

    /// Creates a client that sends through `transport`.
    pub fn with_transport(config: ClientConfig, transport: Arc<dyn HttpTransport>) -> Self {
        Self {
            config,
            transport,
            format: FormatOptions::default(),
            decode: DecodeOptions::default(),
        }
    }

    /// Sets how documents are rendered.
    #[must_use]
    pub fn format_options(mut self, format: FormatOptions) -> Self {
        self.format = format;
        self
    }

    /// Sets how responses are decoded.
    #[must_use]
    pub fn decode_options(mut self, decode: DecodeOptions) -> Self {
        self.decode = decode;
        self
    }

    /// Returns the configuration.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Runs a query and decodes the result into `target`.
    pub async fn query<T: Selection>(
        &self,
        ctx: &Context,
        target: &mut T,
        variables: &Variables,
    ) -> SdkResult<()> {
        self.execute(ctx, OperationKind::Query, None, target, variables)
            .await
    }

    /// Runs a named query and decodes the result into `target`.
    pub async fn named_query<T: Selection>(
        &self,
        ctx: &Context,
        name: &str,
        target: &mut T,
        variables: &Variables,
    ) -> SdkResult<()> {
        self.execute(ctx, OperationKind::Query, Some(name), target, variables)
            .await
    }

    /// Runs a mutation and decodes the result into `target`.
    pub async fn mutate<T: Selection>(
        &self,
        ctx: &Context,
        target: &mut T,
        variables: &Variables,
    ) -> SdkResult<()> {
        self.execute(ctx, OperationKind::Mutation, None, target, variables)
            .await
    }

    /// Runs a named mutation and decodes the result into `target`.
    pub async fn named_mutate<T: Selection>(
        &self,
        ctx: &Context,
        name: &str,
        target: &mut T,
        variables: &Variables,
    ) -> SdkResult<()> {
        self.execute(ctx, OperationKind::Mutation, Some(name), target, variables)
            .await
    }

    /// Runs a query shaped by `T` and returns the undecoded response.
    pub async fn query_raw<T: Selection>(
        &self,
        ctx: &Context,
        variables: &Variables,
    ) -> SdkResult<RawResponse> {
        self.execute_raw::<T>(ctx, OperationKind::Query, None, variables)
            .await
    }

    /// Runs a named query shaped by `T` and returns the undecoded response.
    pub async fn named_query_raw<T: Selection>(
        &self,
        ctx: &Context,
        name: &str,
        variables: &Variables,
    ) -> SdkResult<RawResponse> {
        self.execute_raw::<T>(ctx, OperationKind::Query, Some(name), variables)
            .await
    }

    /// Runs a mutation shaped by `T` and returns the undecoded response.
    pub async fn mutate_raw<T: Selection>(
        &self,
        ctx: &Context,
        variables: &Variables,
    ) -> SdkResult<RawResponse> {
        self.execute_raw::<T>(ctx, OperationKind::Mutation, None, variables)
            .await
    }

    /// Runs a named mutation shaped by `T` and returns the undecoded response.
    pub async fn named_mutate_raw<T: Selection>(
        &self,
        ctx: &Context,
        name: &str,
        variables: &Variables,
    ) -> SdkResult<RawResponse> {
        self.execute_raw::<T>(ctx, OperationKind::Mutation, Some(name), variables)
            .await
    }

    async fn execute<T: Selection>(
        &self,
        ctx: &Context,
        kind: OperationKind,
        name: Option<&str>,
        target: &mut T,
        variables: &Variables,
    ) -> SdkResult<()> {
        let envelope = self.round_trip::<T>(ctx, kind, name, variables).await?;

        // Decode failures win over server errors.
        let data = envelope.data_value()?;
        let report = Decoder::new(self.decode).decode(&data, target)?;
        if !report.is_clean() {
            debug!("Decoded with {} warnings", report.diagnostics.len());
        }

        if envelope.errors.is_empty() {
            Ok(())
        } else {
            Err(SdkError::GraphQL(envelope.errors))
        }
    }

    async fn execute_raw<T: Selection>(
        &self,
        ctx: &Context,
        kind: OperationKind,
        name: Option<&str>,
        variables: &Variables,
    ) -> SdkResult<RawResponse> {
        let envelope = self.round_trip::<T>(ctx, kind, name, variables).await?;
        Ok(envelope.into())
    }

    async fn round_trip<T: Selection>(
        &self,
        ctx: &Context,
        kind: OperationKind,
        name: Option<&str>,
        variables: &Variables,
    ) -> SdkResult<Envelope> {
        if let Some(error) = variables.error() {
            return Err(SdkError::Serialize(error.to_string()));
        }

        let document = Synthesizer::new(self.format.clone()).synthesize::<T>(kind, variables, name)?;
        debug!("Executing {}: {}", kind, document.text);

        let request = GraphQLRequest {
            query: &document.text,
            variables: (!variables.is_empty()).then_some(variables),
            operation_name: name,
        };
        let body = serde_json::to_vec(&request).map_err(|e| SdkError::Serialize(e.to_string()))?;

        let response = self.send(ctx, Bytes::from(body)).await?;
        debug!("Response status: {}", response.status);

        if !response.is_success() {
            return Err(SdkError::HttpStatus {
                status: response.status,
                reason: response.reason,
                body: body_snippet(&response.body, SNIPPET_LIMIT),
            });
        }

        Ok(normalize(&response.body)?)
    }

    async fn send(&self, ctx: &Context, body: Bytes) -> SdkResult<HttpResponse> {
        if ctx.is_cancelled() {
            return Err(SdkError::Cancelled);
        }

        // A timeout too large to represent means no ceiling.
        let ceiling = Instant::now().checked_add(self.config.timeout);
        let deadline = match (ctx.deadline(), ceiling) {
            (Some(d), Some(c)) => Some(d.min(c)),
            (d, c) => d.or(c),
        };
        let expired = async {
            match deadline {
                Some(deadline) => tokio::time::sleep_until(deadline).await,
                None => std::future::pending().await,
            }
        };
        let headers: Vec<(String, String)> = self
            .config
            .headers
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        let post = self
            .transport
            .post(&self.config.url, CONTENT_TYPE_JSON, &headers, body);

        tokio::select! {
            biased;
            () = ctx.cancelled() => Err(SdkError::Cancelled),
            () = expired => Err(SdkError::Timeout),
            response = post => Ok(response?),
        }
    }
}

impl std::fmt::Debug for ShapeqlClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShapeqlClient")
            .field("config", &self.config)
            .field("format", &self.format)
            .field("decode", &self.decode)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::TransportError;
    use async_trait::async_trait;
    use shapeql_core::GraphQL;
    use std::sync::Mutex;

    #[derive(Debug, Clone)]
    struct Sent {
        url: String,
        content_type: String,
        headers: Vec<(String, String)>,
        body: Value,
    }

    struct Recorder {
        response: HttpResponse,
        sent: Mutex<Vec<Sent>>,
    }

    impl Recorder {
        fn new(status: u16, body: &'static str) -> Arc<Self> {
            Arc::new(Self {
                response: HttpResponse::new(status, body),
                sent: Mutex::new(Vec::new()),
            })
        }

        fn last(&self) -> Sent {
            self.sent.lock().unwrap().last().cloned().unwrap()
        }
    }

    #[async_trait]
    impl HttpTransport for Recorder {
        async fn post(
            &self,
            url: &str,
            content_type: &str,
            headers: &[(String, String)],
            body: Bytes,
        ) -> Result<HttpResponse, TransportError> {
            self.sent.lock().unwrap().push(Sent {
                url: url.to_owned(),
                content_type: content_type.to_owned(),
                headers: headers.to_vec(),
                body: serde_json::from_slice(&body).unwrap(),
            });
            Ok(self.response.clone())
        }
    }

    #[derive(Debug, Default, GraphQL)]
    struct Me {
        name: String,
    }

    #[derive(Debug, Default, GraphQL)]
    struct MeQuery {
        #[graphql(args = "id: $id")]
        me: Me,
    }

    fn client(recorder: &Arc<Recorder>) -> ShapeqlClient {
        let config = ClientConfig::new("http://localhost:4000/graphql").header("X-Trace", "abc");
        ShapeqlClient::with_transport(config, recorder.clone())
    }

    #[test]
    fn test_client_config() {
        let config = ClientConfig::new("http://localhost:4000/graphql")
            .timeout(Duration::from_secs(10))
            .header("Authorization", "Bearer token");

        assert_eq!(config.url, "http://localhost:4000/graphql");
        assert_eq!(config.timeout, Duration::from_secs(10));
        assert!(config.headers.contains_key("Authorization"));
        assert_eq!(ClientConfig::default().timeout, Duration::from_secs(30));
    }

    #[tokio::test]
    async fn test_request_body() {
        let recorder = Recorder::new(200, r#"{"data":{"me":{"name":"Luke"}}}"#);
        let vars = Variables::new().set("id", &shapeql_core::Id::from("1000"));
        let mut query = MeQuery::default();

        client(&recorder)
            .named_query(&Context::background(), "Me", &mut query, &vars)
            .await
            .unwrap();

        let sent = recorder.last();
        assert_eq!(sent.url, "http://localhost:4000/graphql");
        assert_eq!(sent.content_type, "application/json");
        assert_eq!(sent.headers, [("X-Trace".to_owned(), "abc".to_owned())]);
        assert_eq!(
            sent.body,
            serde_json::json!({
                "query": "query Me($id: ID!) { me(id: $id) { name } }",
                "variables": { "id": "1000" },
                "operationName": "Me",
            })
        );
        assert_eq!(query.me.name, "Luke");
    }

    #[tokio::test]
    async fn test_empty_variables_are_omitted() {
        #[derive(Debug, Default, GraphQL)]
        struct Viewer {
            me: Me,
        }

        let recorder = Recorder::new(200, r#"{"data":null}"#);
        let mut viewer = Viewer::default();
        client(&recorder)
            .query(&Context::background(), &mut viewer, &Variables::new())
            .await
            .unwrap();

        let body = recorder.last().body;
        assert_eq!(body, serde_json::json!({ "query": "query { me { name } }" }));
    }

    #[tokio::test]
    async fn test_cancelled_context_sends_nothing() {
        let recorder = Recorder::new(200, "{}");
        let (ctx, cancel) = Context::background().with_cancel();
        cancel.cancel();

        let mut query = MeQuery::default();
        let err = client(&recorder)
            .query(&ctx, &mut query, &Variables::new())
            .await
            .unwrap_err();

        assert!(matches!(err, SdkError::Cancelled));
        assert!(recorder.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_invalid_template_sends_nothing() {
        #[derive(Debug, Default, GraphQL)]
        struct Empty {}

        let recorder = Recorder::new(200, "{}");
        let err = client(&recorder)
            .query_raw::<Empty>(&Context::background(), &Variables::new())
            .await
            .unwrap_err();

        assert!(matches!(err, SdkError::InvalidTemplate(_)));
        assert!(recorder.sent.lock().unwrap().is_empty());
    }
}
