//! Request executor and error types.

use futures::{stream, TryStreamExt};
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

use crate::correlator::ResponseCorrelator;
use crate::http::ReqwestTransport;
use crate::model::{normalize_model_name, GeneratedContent, GenerativeModel, RequestId};
use crate::options::{HttpTransport, TaskType, TransportOptions};
use crate::stream::GenerationStream;
use crate::transport::{Transport, TransportRequest};
use crate::wire::{
    self, BatchEmbedContentsRequest, BatchEmbedContentsResponse, ContentEmbedding,
    CountTokensRequest, CountTokensResponse, EmbedContentRequest, ModelInfo, ModelList,
    SafetyRating, UsageMetadata,
};

const API_VERSION: &str = "v1beta";

/// Errors that can occur during client operations.
#[derive(Error, Debug)]
pub enum ClientError {
    /// I/O level failure reported by the transport.
    #[error("Transport error: {0}")]
    Transport(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// The API answered with a non-success status.
    #[error("Gemini error ({status}): {message}")]
    Api { status: u16, message: String },

    /// A response body or stream event did not have the expected shape.
    #[error("Malformed response ({reason}):\n{raw}")]
    MalformedResponse { raw: String, reason: String },

    #[error("Unsupported turn kind: {0}")]
    UnsupportedTurnKind(String),

    #[error("JSON encode error: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl ClientError {
    pub fn transport(err: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        ClientError::Transport(err.into())
    }

    pub fn malformed(raw: impl Into<String>, reason: impl Into<String>) -> Self {
        ClientError::MalformedResponse {
            raw: raw.into(),
            reason: reason.into(),
        }
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        ClientError::Transport(Box::new(err))
    }
}

pub type Result<T> = std::result::Result<T, ClientError>;

/// Entry point for all interactions with the Gemini API.
///
/// Every generation call gets a fresh [`RequestId`]; the latest decoded
/// response for that id is kept in a [`ResponseCorrelator`] shared by all
/// calls, so usage metadata and safety ratings can be queried during and after
/// the call. Call [`GenAi::close`] to drop that state.
///
/// # Example
/// ```no_run
/// use gemkit::{GenAi, GenerativeModel, ModelVariant, Role, Turn};
/// use gemkit::options::{HttpTransport, TransportOptions};
///
/// # async fn run() -> gemkit::Result<()> {
/// let client = GenAi::new(TransportOptions::new(HttpTransport::from_env()?))?;
/// let model = GenerativeModel::builder()
///     .variant(ModelVariant::Gemini20Flash)
///     .add_content(Turn::text(Role::User, "Hello!"))
///     .build()?;
///
/// let reply = client.generate(&model).await?;
/// println!("{}", reply.text);
/// println!("{:?}", client.usage_metadata(reply.id));
/// # Ok(())
/// # }
/// ```
pub struct GenAi<T = ReqwestTransport> {
    transport: Arc<T>,
    correlator: Arc<ResponseCorrelator>,
}

impl GenAi<ReqwestTransport> {
    /// Create a client talking HTTP through reqwest.
    pub fn new(transport_options: TransportOptions<HttpTransport>) -> Result<Self> {
        Ok(Self::with_transport(ReqwestTransport::new(&transport_options)?))
    }

    /// Create a client configured from `GEMINI_API_KEY` / `GEMINI_BASE_URL`.
    pub fn from_env() -> Result<Self> {
        Self::new(TransportOptions::new(HttpTransport::from_env()?))
    }
}

impl<T: Transport + 'static> GenAi<T> {
    pub fn with_transport(transport: T) -> Self {
        Self::with_correlator(transport, Arc::new(ResponseCorrelator::new()))
    }

    /// Create a client that records responses in an existing correlator.
    pub fn with_correlator(transport: T, correlator: Arc<ResponseCorrelator>) -> Self {
        Self {
            transport: Arc::new(transport),
            correlator,
        }
    }

    pub fn correlator(&self) -> &Arc<ResponseCorrelator> {
        &self.correlator
    }

    /// Allocate an id and encode the request body. Shared by both calling modes.
    fn prepare(model: &GenerativeModel) -> (RequestId, Result<String>) {
        let id = RequestId::new();
        let body = serde_json::to_string(&wire::encode_request(model)).map_err(ClientError::from);
        (id, body)
    }

    fn method_path(model_name: &str, method: &str) -> String {
        format!("{API_VERSION}/{model_name}:{method}")
    }

    /// Generate a whole response at once.
    ///
    /// Once this resolves, usage metadata and safety ratings for the returned
    /// id are available from [`GenAi::usage_metadata`] and
    /// [`GenAi::safety_ratings`].
    pub async fn generate(&self, model: &GenerativeModel) -> Result<GeneratedContent> {
        let (id, body) = Self::prepare(model);
        let request = TransportRequest::post(
            Self::method_path(model.model_name(), "generateContent"),
            body?,
        );
        debug!(request_id = %id, model = model.model_name(), "generateContent");

        let raw = self.transport.send_unary(request).await?;
        let decoded = wire::decode(&raw)?;
        self.correlator.put(id, decoded.response);

        Ok(GeneratedContent {
            id,
            text: decoded.text,
        })
    }

    /// Generate a response as a stream of output units.
    ///
    /// Returns immediately; nothing is sent until the stream is first polled.
    /// Metadata queries made while the stream is live return the statistics of
    /// the latest event processed so far.
    pub fn generate_stream(&self, model: &GenerativeModel) -> GenerationStream {
        let (id, body) = Self::prepare(model);
        let path = Self::method_path(model.model_name(), "streamGenerateContent");
        let transport = Arc::clone(&self.transport);
        let model_name = model.model_name().to_string();

        let lines = stream::once(async move {
            debug!(request_id = %id, model = %model_name, "streamGenerateContent");
            let request = TransportRequest::post(path, body?).with_query("alt", "sse");
            transport.send_streamed(request).await
        })
        .try_flatten();

        GenerationStream::new(id, Arc::clone(&self.correlator), lines)
    }

    /// Usage metadata of the latest response seen for `id`.
    pub fn usage_metadata(&self, id: RequestId) -> Option<UsageMetadata> {
        self.correlator.usage_metadata(id)
    }

    /// Safety ratings of the latest response seen for `id`; empty when unknown.
    pub fn safety_ratings(&self, id: RequestId) -> Vec<SafetyRating> {
        self.correlator.safety_ratings(id)
    }

    /// Drop all recorded response metadata.
    pub fn close(&self) {
        self.correlator.clear();
    }

    /// List the models currently available.
    pub async fn list_models(&self) -> Result<Vec<ModelInfo>> {
        let raw = self
            .transport
            .send_unary(TransportRequest::get(format!("{API_VERSION}/models")))
            .await?;
        let list: ModelList =
            serde_json::from_str(&raw).map_err(|e| ClientError::malformed(&raw, e.to_string()))?;
        Ok(list.models)
    }

    /// Get information about one model, with or without the `models/` prefix.
    pub async fn get_model(&self, name: &str) -> Result<ModelInfo> {
        let path = format!("{API_VERSION}/{}", normalize_model_name(name));
        let raw = self.transport.send_unary(TransportRequest::get(path)).await?;
        serde_json::from_str(&raw).map_err(|e| ClientError::malformed(&raw, e.to_string()))
    }

    /// Run the model's tokenizer over the request contents.
    pub async fn count_tokens(&self, model: &GenerativeModel) -> Result<u64> {
        let body = serde_json::to_string(&CountTokensRequest {
            generate_content_request: wire::encode_request(model),
        })?;
        let path = Self::method_path(model.model_name(), "countTokens");
        let raw = self
            .transport
            .send_unary(TransportRequest::post(path, body))
            .await?;

        let response: CountTokensResponse =
            serde_json::from_str(&raw).map_err(|e| ClientError::malformed(&raw, e.to_string()))?;
        response
            .total_tokens
            .ok_or_else(|| ClientError::malformed(&raw, "no totalTokens field"))
    }

    /// Embed every turn of `model` in one batch call.
    ///
    /// Meant for text turns and embedding models such as
    /// [`ModelVariant::TextEmbedding004`](crate::options::ModelVariant).
    /// `title` only applies to [`TaskType::RetrievalDocument`].
    pub async fn embed_contents(
        &self,
        model: &GenerativeModel,
        task_type: Option<TaskType>,
        title: Option<String>,
        output_dimensionality: Option<u32>,
    ) -> Result<Vec<ContentEmbedding>> {
        let requests = wire::encode(model.contents())
            .into_iter()
            .map(|content| EmbedContentRequest {
                model: model.model_name().to_string(),
                content,
                task_type,
                title: title.clone(),
                output_dimensionality,
            })
            .collect();
        let body = serde_json::to_string(&BatchEmbedContentsRequest { requests })?;
        let path = Self::method_path(model.model_name(), "batchEmbedContents");
        let raw = self
            .transport
            .send_unary(TransportRequest::post(path, body))
            .await?;

        let response: BatchEmbedContentsResponse =
            serde_json::from_str(&raw).map_err(|e| ClientError::malformed(&raw, e.to_string()))?;
        response
            .embeddings
            .ok_or_else(|| ClientError::malformed(&raw, "no embeddings field"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Role, Turn};
    use crate::transport::LineStream;
    use async_trait::async_trait;
    use futures::StreamExt;
    use tracing_test::traced_test;

    struct EmptyStream;

    #[async_trait]
    impl Transport for EmptyStream {
        async fn send_unary(&self, _request: TransportRequest) -> Result<String> {
            Err(ClientError::transport("unary not scripted"))
        }

        async fn send_streamed(&self, _request: TransportRequest) -> Result<LineStream> {
            Ok(Box::pin(stream::empty::<Result<String>>()))
        }
    }

    #[test]
    fn test_malformed_display_includes_raw() {
        let err = ClientError::malformed("data: nope", "expected value");
        assert_eq!(
            err.to_string(),
            "Malformed response (expected value):\ndata: nope"
        );
    }

    #[test]
    fn test_api_error_display() {
        let err = ClientError::Api {
            status: 403,
            message: "API key not valid".into(),
        };
        assert_eq!(err.to_string(), "Gemini error (403): API key not valid");
    }

    #[test]
    fn test_transport_error_from_message() {
        let err = ClientError::transport("connection reset");
        assert!(matches!(err, ClientError::Transport(_)));
        assert_eq!(err.to_string(), "Transport error: connection reset");
    }

    #[test]
    fn test_method_path() {
        assert_eq!(
            GenAi::<ReqwestTransport>::method_path("models/gemini-2.0-flash", "generateContent"),
            "v1beta/models/gemini-2.0-flash:generateContent"
        );
    }

    #[tokio::test]
    #[traced_test]
    async fn test_stream_request_is_logged_when_sent() {
        let client = GenAi::with_transport(EmptyStream);
        let model = GenerativeModel::builder()
            .model_name("gemini-2.0-flash")
            .add_content(Turn::text(Role::User, "hi"))
            .build()
            .unwrap();

        let mut stream = client.generate_stream(&model);
        assert!(!logs_contain("streamGenerateContent"));

        assert!(stream.next().await.is_none());
        assert!(logs_contain("streamGenerateContent"));
    }
}
