//! Conversation model: role-tagged turns, the generation request built from
//! them, and the output units handed back to callers.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use uuid::Uuid;

use crate::client::{ClientError, Result};
use crate::options::{GenerationConfig, ModelVariant, SafetySetting};

const MODEL_RESOURCE_PREFIX: &str = "models/";

/// Author of a turn.
#[derive(Debug, Copy, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Model,
}

/// Media attached to a turn.
///
/// `data` is expected to be base64 encoded already; it is passed to the wire
/// untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaData {
    /// MIME type, e.g. `image/png`.
    pub mime_type: String,
    /// Base64 encoded payload.
    pub data: String,
}

impl MediaData {
    pub fn new(mime_type: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            mime_type: mime_type.into(),
            data: data.into(),
        }
    }
}

/// A single turn in a conversation.
///
/// Every variant carries exactly one kind of payload. The role is optional
/// because single-shot prompts may leave it to the server default.
#[derive(Debug, Clone, PartialEq)]
pub enum Turn {
    Text {
        role: Option<Role>,
        text: String,
    },
    Media {
        role: Option<Role>,
        media: MediaData,
    },
    TextAndMedia {
        role: Option<Role>,
        text: String,
        media: Vec<MediaData>,
    },
    FunctionCall {
        role: Option<Role>,
        name: String,
        args: Map<String, Value>,
    },
    FunctionResponse {
        role: Option<Role>,
        name: String,
        response: Map<String, Value>,
    },
}

impl Turn {
    /// A plain text turn.
    pub fn text(role: Role, text: impl Into<String>) -> Self {
        Turn::Text {
            role: Some(role),
            text: text.into(),
        }
    }

    /// A turn holding a single piece of media.
    pub fn media(role: Role, mime_type: impl Into<String>, data: impl Into<String>) -> Self {
        Turn::Media {
            role: Some(role),
            media: MediaData::new(mime_type, data),
        }
    }

    /// Start building a turn that combines text with any number of media items.
    pub fn text_and_media() -> TextAndMediaBuilder {
        TextAndMediaBuilder::default()
    }

    /// A function call predicted by the model.
    pub fn function_call(name: impl Into<String>, args: Map<String, Value>) -> Self {
        Turn::FunctionCall {
            role: Some(Role::Model),
            name: name.into(),
            args,
        }
    }

    /// The result of a function call, sent back to the model.
    pub fn function_response(name: impl Into<String>, response: Map<String, Value>) -> Self {
        Turn::FunctionResponse {
            role: Some(Role::User),
            name: name.into(),
            response,
        }
    }

    /// Get the role of the turn.
    pub fn role(&self) -> Option<Role> {
        match self {
            Turn::Text { role, .. }
            | Turn::Media { role, .. }
            | Turn::TextAndMedia { role, .. }
            | Turn::FunctionCall { role, .. }
            | Turn::FunctionResponse { role, .. } => *role,
        }
    }
}

/// Builder for [`Turn::TextAndMedia`]. Media keeps insertion order.
#[derive(Debug, Clone, Default)]
pub struct TextAndMediaBuilder {
    role: Option<Role>,
    text: String,
    media: Vec<MediaData>,
}

impl TextAndMediaBuilder {
    pub fn role(mut self, role: Role) -> Self {
        self.role = Some(role);
        self
    }

    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    pub fn add_media(mut self, media: MediaData) -> Self {
        self.media.push(media);
        self
    }

    pub fn build(self) -> Turn {
        Turn::TextAndMedia {
            role: self.role,
            text: self.text,
            media: self.media,
        }
    }
}

/// Everything needed to ask the API for new content.
///
/// Immutable once built; build one per call with [`GenerativeModel::builder`].
#[derive(Debug, Clone, PartialEq)]
pub struct GenerativeModel {
    model_name: String,
    contents: Vec<Turn>,
    safety_settings: Vec<SafetySetting>,
    generation_config: Option<GenerationConfig>,
}

impl GenerativeModel {
    pub fn builder() -> GenerativeModelBuilder {
        GenerativeModelBuilder::default()
    }

    /// Model resource name, always `models/`-prefixed.
    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    pub fn contents(&self) -> &[Turn] {
        &self.contents
    }

    pub fn safety_settings(&self) -> &[SafetySetting] {
        &self.safety_settings
    }

    pub fn generation_config(&self) -> Option<&GenerationConfig> {
        self.generation_config.as_ref()
    }
}

/// Builder for [`GenerativeModel`].
#[derive(Debug, Clone, Default)]
pub struct GenerativeModelBuilder {
    model_name: Option<String>,
    contents: Vec<Turn>,
    safety_settings: Vec<SafetySetting>,
    generation_config: Option<GenerationConfig>,
}

impl GenerativeModelBuilder {
    /// Set the model, with or without the `models/` prefix.
    pub fn model_name(mut self, model_name: impl Into<String>) -> Self {
        self.model_name = Some(model_name.into());
        self
    }

    pub fn variant(self, variant: ModelVariant) -> Self {
        self.model_name(variant.variant())
    }

    pub fn add_content(mut self, turn: Turn) -> Self {
        self.contents.push(turn);
        self
    }

    pub fn add_safety_setting(mut self, setting: SafetySetting) -> Self {
        self.safety_settings.push(setting);
        self
    }

    pub fn generation_config(mut self, config: GenerationConfig) -> Self {
        self.generation_config = Some(config);
        self
    }

    /// Build the model. Only the model name is validated.
    pub fn build(self) -> Result<GenerativeModel> {
        let model_name = self
            .model_name
            .filter(|name| !name.trim().is_empty())
            .ok_or_else(|| ClientError::Config("Model name must be specified".to_string()))?;

        Ok(GenerativeModel {
            model_name: normalize_model_name(&model_name),
            contents: self.contents,
            safety_settings: self.safety_settings,
            generation_config: self.generation_config,
        })
    }
}

/// Prefix a bare model id with `models/`.
pub(crate) fn normalize_model_name(name: &str) -> String {
    if name.starts_with(MODEL_RESOURCE_PREFIX) {
        name.to_string()
    } else {
        format!("{MODEL_RESOURCE_PREFIX}{name}")
    }
}

/// Opaque identifier of one logical generation call.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequestId(Uuid);

impl RequestId {
    /// Allocate a fresh identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// One unit of generated output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedContent {
    /// Identifier of the call that produced this unit; use it to query
    /// usage metadata and safety ratings.
    pub id: RequestId,
    pub text: String,
}
