//! Credential requirement derivation.
//!
//! A tool may declare the secrets it needs in a `credentials` block inside
//! its input schema:
//!
//! ```json
//! {
//!   "type": "object",
//!   "credentials": {
//!     "required": ["db_token"],
//!     "descriptions": { "db_token": "Read-only database token" },
//!     "acquisition": { "db_token": "Create one under Settings > Tokens" }
//!   }
//! }
//! ```
//!
//! `acquisition` may also be a single string applied to every id. A tool
//! without a usable block gets one implicit `api_key` requirement; only a
//! literal `"required": []` opts a tool out of gating.

use std::collections::{BTreeMap, HashSet};

use serde::Deserialize;
use toolgate_core::{CredentialRequirement, ToolDescriptor};
use tracing::warn;

/// Id of the requirement synthesized for tools without an explicit block.
pub const DEFAULT_REQUIREMENT_ID: &str = "api_key";

/// Decides which credentials a tool needs.
pub trait RequirementPolicy: Send + Sync {
    fn requirements_for(&self, tool: &ToolDescriptor) -> Vec<CredentialRequirement>;
}

/// Policy backed by [`derive_requirements`].
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultRequirementPolicy;

impl RequirementPolicy for DefaultRequirementPolicy {
    fn requirements_for(&self, tool: &ToolDescriptor) -> Vec<CredentialRequirement> {
        derive_requirements(tool)
    }
}

#[derive(Debug, Deserialize)]
struct CredentialsBlock {
    required: Option<Vec<String>>,
    #[serde(default)]
    descriptions: BTreeMap<String, String>,
    #[serde(default)]
    acquisition: Option<Acquisition>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Acquisition {
    Shared(String),
    PerId(BTreeMap<String, String>),
}

impl Acquisition {
    fn hint_for(&self, id: &str) -> Option<String> {
        match self {
            Self::Shared(hint) => Some(hint.clone()),
            Self::PerId(hints) => hints.get(id).cloned(),
        }
    }
}

/// Requirements declared by `tool`, or the implicit `api_key`.
///
/// An explicit block with an empty `required` list means the tool needs
/// no credentials. Duplicate and blank ids are dropped. A block that is
/// unreadable, lacks `required`, or lists only blank ids falls back to the
/// default requirement.
pub fn derive_requirements(tool: &ToolDescriptor) -> Vec<CredentialRequirement> {
    let Some(raw) = tool.input_schema.get("credentials") else {
        return vec![default_requirement()];
    };
    let block = match serde_json::from_value::<CredentialsBlock>(raw.clone()) {
        Ok(block) => block,
        Err(e) => {
            warn!(tool = %tool.name, error = %e, "Unreadable credentials block; using default requirement");
            return vec![default_requirement()];
        }
    };
    let Some(required) = block.required.as_deref() else {
        warn!(tool = %tool.name, "Credentials block without 'required'; using default requirement");
        return vec![default_requirement()];
    };
    if required.is_empty() {
        return Vec::new();
    }

    let mut seen = HashSet::new();
    let requirements: Vec<_> = required
        .iter()
        .map(|id| id.trim())
        .filter(|id| !id.is_empty() && seen.insert(id.to_string()))
        .map(|id| CredentialRequirement {
            id: id.to_string(),
            display_name: display_name(id),
            description: block.descriptions.get(id).cloned(),
            acquisition_hint: block.acquisition.as_ref().and_then(|a| a.hint_for(id)),
        })
        .collect();

    if requirements.is_empty() {
        warn!(tool = %tool.name, "Credentials block lists only blank ids; using default requirement");
        return vec![default_requirement()];
    }
    requirements
}

fn default_requirement() -> CredentialRequirement {
    CredentialRequirement {
        id: DEFAULT_REQUIREMENT_ID.to_string(),
        display_name: display_name(DEFAULT_REQUIREMENT_ID),
        description: None,
        acquisition_hint: None,
    }
}

/// `db_token` -> `Db Token`, `api-key` -> `Api Key`.
///
/// The default id is special-cased so it reads `API Key`.
pub fn display_name(id: &str) -> String {
    if id == DEFAULT_REQUIREMENT_ID {
        return "API Key".to_string();
    }
    id.split(['-', '_'])
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            chars.next().map_or_else(String::new, |first| {
                first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect()
            })
        })
        .collect::<Vec<_>>()
        .join(" ")
}
