//! Generation request envelope
//!
//! The JSON body POSTed to the generate endpoint. Options arrive here
//! typed and leave as the open mapping produced by
//! [`Options::to_wire_map`].

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Serialize, Serializer};
use serde_json::{Map, Value};

use crate::errors::{ClientError, Result};
use crate::types::options::Options;

/// Raw image bytes, sent base64 encoded
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageData(pub Vec<u8>);

impl Serialize for ImageData {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(&self.0))
    }
}

impl From<Vec<u8>> for ImageData {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

/// Request body for `/api/generate`
#[derive(Debug, Clone, Serialize)]
pub struct GenerateRequest {
    model: String,
    prompt: String,
    system: String,
    template: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    context: Vec<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stream: Option<bool>,
    #[serde(skip_serializing_if = "is_false")]
    raw: bool,
    format: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    images: Vec<ImageData>,
    options: Map<String, Value>,
}

fn is_false(value: &bool) -> bool {
    !*value
}

impl GenerateRequest {
    /// Create a request for `model`, converting `options` to their wire form
    pub fn new(model: impl Into<String>, prompt: impl Into<String>, options: &Options) -> Result<Self> {
        let model = model.into();
        if model.trim().is_empty() {
            return Err(ClientError::InvalidRequest(
                "model identifier must not be empty".to_string(),
            ));
        }

        Ok(Self {
            model,
            prompt: prompt.into(),
            system: String::new(),
            template: String::new(),
            context: Vec::new(),
            stream: None,
            raw: false,
            format: String::new(),
            images: Vec::new(),
            options: options.to_wire_map(),
        })
    }

    /// Set the system prompt
    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = system.into();
        self
    }

    /// Set the prompt template
    pub fn with_template(mut self, template: impl Into<String>) -> Self {
        self.template = template.into();
        self
    }

    /// Send back the context tokens returned by a previous generation
    pub fn with_context(mut self, context: Vec<i64>) -> Self {
        self.context = context;
        self
    }

    /// Ask explicitly for a streamed or a single response
    pub fn with_stream(mut self, stream: bool) -> Self {
        self.stream = Some(stream);
        self
    }

    /// Bypass the server-side prompt template
    pub fn with_raw(mut self, raw: bool) -> Self {
        self.raw = raw;
        self
    }

    /// Output format hint, e.g. `json`
    pub fn with_format(mut self, format: impl Into<String>) -> Self {
        self.format = format.into();
        self
    }

    /// Attach an image to the prompt
    pub fn with_image(mut self, image: impl Into<ImageData>) -> Self {
        self.images.push(image.into());
        self
    }

    /// Model identifier
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Prompt text
    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    /// Serialize to the JSON request body
    pub fn to_json_bytes(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }
}
