//! Gemini wire schema and the mapping to and from the conversation model.
//!
//! Encoding is infallible: every [`Turn`] variant has exactly one wire shape.
//! Decoding fails with [`ClientError::MalformedResponse`] whenever the first
//! candidate's first part carries no text.
//! See: <https://ai.google.dev/api/rest/v1beta/models/generateContent>

use nonempty::NonEmpty;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::client::{ClientError, Result};
use crate::model::{GenerativeModel, MediaData, Role, Turn};
use crate::options::{GenerationConfig, HarmCategory, HarmProbability, SafetySetting, TaskType};

// --- Content ---

/// A turn as the API represents it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireContent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
    #[serde(default)]
    pub parts: Vec<WirePart>,
}

/// One part of a [`WireContent`]. Holds exactly one kind of payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged, rename_all_fields = "camelCase")]
pub enum WirePart {
    Text {
        text: String,
    },
    InlineData {
        inline_data: InlineData,
    },
    FunctionCall {
        function_call: FunctionCall,
    },
    FunctionResponse {
        function_response: FunctionResponse,
    },
    /// A part kind this crate does not model (e.g. `executableCode`).
    /// Only produced by decoding.
    #[serde(skip_serializing)]
    Other(Value),
}

impl WirePart {
    pub fn text(&self) -> Option<&str> {
        match self {
            WirePart::Text { text } => Some(text),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InlineData {
    pub mime_type: String,
    pub data: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionCall {
    pub name: String,
    #[serde(default)]
    pub args: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionResponse {
    pub name: String,
    #[serde(default)]
    pub response: Map<String, Value>,
}

impl From<&MediaData> for WirePart {
    fn from(media: &MediaData) -> Self {
        WirePart::InlineData {
            inline_data: InlineData {
                mime_type: media.mime_type.clone(),
                data: media.data.clone(),
            },
        }
    }
}

impl From<&Turn> for WireContent {
    fn from(turn: &Turn) -> Self {
        WireContent {
            role: turn.role(),
            parts: match turn {
                Turn::Text { text, .. } => vec![WirePart::Text { text: text.clone() }],
                Turn::Media { media, .. } => vec![media.into()],
                Turn::TextAndMedia { text, media, .. } => {
                    std::iter::once(WirePart::Text { text: text.clone() })
                        .chain(media.iter().map(WirePart::from))
                        .collect()
                }
                Turn::FunctionCall { name, args, .. } => vec![WirePart::FunctionCall {
                    function_call: FunctionCall {
                        name: name.clone(),
                        args: args.clone(),
                    },
                }],
                Turn::FunctionResponse { name, response, .. } => {
                    vec![WirePart::FunctionResponse {
                        function_response: FunctionResponse {
                            name: name.clone(),
                            response: response.clone(),
                        },
                    }]
                }
            },
        }
    }
}

/// Map each turn to exactly one wire content, preserving order.
pub fn encode(turns: &[Turn]) -> Vec<WireContent> {
    turns.iter().map(WireContent::from).collect()
}

/// Mirror a wire content back into a turn.
///
/// Fails with [`ClientError::UnsupportedTurnKind`] for part combinations no
/// turn variant produces (no parts, mixed function parts, unknown parts).
/// A text part followed only by inline data becomes [`Turn::TextAndMedia`];
/// note that a `TextAndMedia` turn with no media encodes to a single text part
/// and therefore comes back as [`Turn::Text`].
pub fn to_turn(content: &WireContent) -> Result<Turn> {
    let role = content.role;
    let media_of = |part: &WirePart| match part {
        WirePart::InlineData { inline_data } => Some(MediaData::new(
            inline_data.mime_type.clone(),
            inline_data.data.clone(),
        )),
        _ => None,
    };

    match content.parts.as_slice() {
        [WirePart::Text { text }] => Ok(Turn::Text {
            role,
            text: text.clone(),
        }),
        [part @ WirePart::InlineData { .. }] => Ok(Turn::Media {
            role,
            media: media_of(part).ok_or_else(|| unsupported(content))?,
        }),
        [WirePart::FunctionCall { function_call }] => Ok(Turn::FunctionCall {
            role,
            name: function_call.name.clone(),
            args: function_call.args.clone(),
        }),
        [WirePart::FunctionResponse { function_response }] => Ok(Turn::FunctionResponse {
            role,
            name: function_response.name.clone(),
            response: function_response.response.clone(),
        }),
        [WirePart::Text { text }, rest @ ..] => {
            let media = rest
                .iter()
                .map(media_of)
                .collect::<Option<Vec<_>>>()
                .ok_or_else(|| unsupported(content))?;
            Ok(Turn::TextAndMedia {
                role,
                text: text.clone(),
                media,
            })
        }
        _ => Err(unsupported(content)),
    }
}

fn unsupported(content: &WireContent) -> ClientError {
    let kinds: Vec<&str> = content
        .parts
        .iter()
        .map(|part| match part {
            WirePart::Text { .. } => "text",
            WirePart::InlineData { .. } => "inlineData",
            WirePart::FunctionCall { .. } => "functionCall",
            WirePart::FunctionResponse { .. } => "functionResponse",
            WirePart::Other(_) => "unknown",
        })
        .collect();
    ClientError::UnsupportedTurnKind(format!("parts [{}]", kinds.join(", ")))
}

// --- Requests ---

/// Body of `generateContent` / `streamGenerateContent`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentRequest {
    pub model: String,
    pub contents: Vec<WireContent>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub safety_settings: Vec<SafetySetting>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generation_config: Option<GenerationConfig>,
}

impl From<&GenerativeModel> for GenerateContentRequest {
    fn from(model: &GenerativeModel) -> Self {
        GenerateContentRequest {
            model: model.model_name().to_string(),
            contents: encode(model.contents()),
            safety_settings: model.safety_settings().to_vec(),
            generation_config: model.generation_config().cloned(),
        }
    }
}

/// Build the request body for a model.
pub fn encode_request(model: &GenerativeModel) -> GenerateContentRequest {
    model.into()
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct CountTokensRequest {
    pub generate_content_request: GenerateContentRequest,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct BatchEmbedContentsRequest {
    pub requests: Vec<EmbedContentRequest>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct EmbedContentRequest {
    pub model: String,
    pub content: WireContent,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task_type: Option<TaskType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_dimensionality: Option<u32>,
}

// --- Responses ---

/// A decoded (possibly partial, when streamed) generation response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentResponse {
    pub candidates: NonEmpty<Candidate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage_metadata: Option<UsageMetadata>,
}

impl GenerateContentResponse {
    /// Text of the first part of the first candidate.
    pub fn text(&self) -> Option<&str> {
        self.candidates
            .head
            .content
            .as_ref()?
            .parts
            .first()?
            .text()
    }

    /// Safety ratings of every candidate, flattened in candidate order.
    pub fn safety_ratings(&self) -> Vec<SafetyRating> {
        self.candidates
            .iter()
            .flat_map(|candidate| candidate.safety_ratings.iter().cloned())
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    /// Absent when the candidate was blocked before producing content.
    #[serde(default)]
    pub content: Option<WireContent>,
    #[serde(default)]
    pub finish_reason: Option<String>,
    #[serde(default)]
    pub index: u32,
    #[serde(default)]
    pub safety_ratings: Vec<SafetyRating>,
}

/// Token usage of a request.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UsageMetadata {
    pub prompt_token_count: u32,
    /// Tokens across all generated candidates.
    pub candidates_token_count: u32,
    /// Prompt plus candidates.
    pub total_token_count: u32,
}

/// Safety rating of a candidate, as sent by the API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SafetyRating {
    pub category: String,
    pub probability: String,
    #[serde(default)]
    pub blocked: bool,
}

impl SafetyRating {
    /// Typed view of the rating; `None` if either value is unknown to this crate.
    pub fn typed(&self) -> Option<(HarmCategory, HarmProbability)> {
        let category = serde_json::from_value(Value::String(self.category.clone())).ok()?;
        let probability = serde_json::from_value(Value::String(self.probability.clone())).ok()?;
        Some((category, probability))
    }
}

/// A response that passed decoding, together with its output text.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedResponse {
    pub text: String,
    pub response: GenerateContentResponse,
}

/// Decode a raw response body (or a streamed event payload).
pub fn decode(raw: &str) -> Result<DecodedResponse> {
    let response: GenerateContentResponse =
        serde_json::from_str(raw).map_err(|e| ClientError::malformed(raw, e.to_string()))?;

    let text = response
        .text()
        .ok_or_else(|| ClientError::malformed(raw, "first candidate has no text part"))?
        .to_string();

    Ok(DecodedResponse { text, response })
}

/// Information about a model.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ModelInfo {
    /// Resource name, `models/{baseModelId}-{version}`.
    pub name: String,
    pub base_model_id: Option<String>,
    pub version: String,
    pub display_name: String,
    pub description: String,
    pub input_token_limit: u32,
    pub output_token_limit: u32,
    pub supported_generation_methods: Vec<String>,
    pub temperature: Option<f64>,
    pub top_p: Option<f64>,
    pub top_k: Option<u32>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub(crate) struct ModelList {
    pub models: Vec<ModelInfo>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct CountTokensResponse {
    pub total_tokens: Option<u64>,
}

/// An embedding vector.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ContentEmbedding {
    pub values: Vec<f64>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct BatchEmbedContentsResponse {
    pub embeddings: Option<Vec<ContentEmbedding>>,
}
