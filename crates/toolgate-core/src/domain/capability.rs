//! Capability types: raw server listings and the normalized catalog entry.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::server::ServerId;

/// A tool as listed by a remote server (`tools/list`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolDescriptor {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// JSON Schema for the tool arguments; may carry a `credentials` block.
    #[serde(default = "empty_object_schema")]
    pub input_schema: Value,
}

fn empty_object_schema() -> Value {
    serde_json::json!({ "type": "object" })
}

impl ToolDescriptor {
    pub fn new(name: impl Into<String>, description: impl Into<String>, input_schema: Value) -> Self {
        Self {
            name: name.into(),
            description: Some(description.into()),
            input_schema,
        }
    }
}

/// A resource as listed by a remote server (`resources/list`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceDescriptor {
    pub uri: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
}

/// A prompt argument declared by a remote server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptArgument {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub required: bool,
}

/// A prompt as listed by a remote server (`prompts/list`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptDescriptor {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub arguments: Vec<PromptArgument>,
}

/// Everything one server offers, as returned by an aggregate listing.
///
/// A server whose listing failed is reported with empty lists.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerCapabilities {
    pub server_id: ServerId,
    pub server_name: String,
    pub rating: f64,
    pub tools: Vec<ToolDescriptor>,
    pub resources: Vec<ResourceDescriptor>,
    pub prompts: Vec<PromptDescriptor>,
}

impl ServerCapabilities {
    pub fn empty(server_id: impl Into<String>, server_name: impl Into<String>, rating: f64) -> Self {
        Self {
            server_id: server_id.into(),
            server_name: server_name.into(),
            rating,
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty() && self.resources.is_empty() && self.prompts.is_empty()
    }
}

/// A named secret that must be supplied before a capability is invoked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialRequirement {
    pub id: String,
    pub display_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub acquisition_hint: Option<String>,
}

/// Normalized catalog entry for one tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CapabilityDescriptor {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
    pub server_id: ServerId,
    pub server_name: String,
    pub rating: f64,
    pub credential_requirements: Vec<CredentialRequirement>,
}

impl CapabilityDescriptor {
    /// Ids of every declared credential requirement, in declaration order.
    pub fn requirement_ids(&self) -> Vec<String> {
        self.credential_requirements
            .iter()
            .map(|r| r.id.clone())
            .collect()
    }

    /// Render this capability in the function-calling format expected by
    /// OpenAI-compatible chat completion APIs.
    ///
    /// The `credentials` block is stripped from the parameters so the
    /// model never sees secret ids as arguments.
    pub fn to_function_definition(&self) -> Value {
        let mut parameters = self.input_schema.clone();
        if let Some(obj) = parameters.as_object_mut() {
            obj.remove("credentials");
        }
        serde_json::json!({
            "type": "function",
            "function": {
                "name": self.name,
                "description": self.description,
                "parameters": parameters,
            }
        })
    }
}

/// Credential-gated projection used by settings surfaces.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatedCapability {
    pub tool_name: String,
    pub server_name: String,
    pub server_id: ServerId,
    pub credentials: Vec<CredentialRequirement>,
}

/// Result of a `tools/call` invocation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolCallResult {
    /// Content blocks (`text`, `image`, `resource`, ...), kept opaque.
    #[serde(default)]
    pub content: Vec<Value>,
    /// Whether the server reported a tool-level failure.
    #[serde(default)]
    pub is_error: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub structured_content: Option<Value>,
}

impl ToolCallResult {
    /// Successful result with a single text block.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            content: vec![serde_json::json!({ "type": "text", "text": text.into() })],
            is_error: false,
            structured_content: None,
        }
    }

    /// Flatten the content blocks into the text re-submitted to the model.
    ///
    /// Text blocks are joined with newlines; non-text blocks are rendered
    /// as compact JSON.
    pub fn to_model_text(&self) -> String {
        let parts: Vec<String> = self
            .content
            .iter()
            .map(|block| match block.get("text").and_then(Value::as_str) {
                Some(text) if block.get("type").and_then(Value::as_str) == Some("text") => {
                    text.to_string()
                }
                _ => block.to_string(),
            })
            .collect();
        let body = parts.join("\n");
        if self.is_error {
            format!("Tool error: {body}")
        } else {
            body
        }
    }
}

/// Contents returned by `resources/read`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceContents {
    #[serde(default)]
    pub contents: Vec<Value>,
}
