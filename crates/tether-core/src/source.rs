use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};

/// A named provider of tools, as described by the registry.
///
/// Fetched once at startup and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolSource {
    pub name: String,
    pub binary_url: String,
    /// Environment overrides applied to this source's runtime host.
    #[serde(default, deserialize_with = "string_map")]
    pub runtime_config: BTreeMap<String, String>,
}

impl ToolSource {
    pub fn new(name: impl Into<String>, binary_url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            binary_url: binary_url.into(),
            runtime_config: BTreeMap::new(),
        }
    }

    pub fn with_config(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.runtime_config.insert(key.into(), value.into());
        self
    }
}

/// The registry stores `runtimeConfig` as free-form JSON. Accept `null` and
/// stringify scalar values so they can be handed to a child process as env.
fn string_map<'de, D>(deserializer: D) -> Result<BTreeMap<String, String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<BTreeMap<String, serde_json::Value>> = Option::deserialize(deserializer)?;
    Ok(raw
        .unwrap_or_default()
        .into_iter()
        .filter_map(|(key, value)| match value {
            serde_json::Value::Null => None,
            serde_json::Value::String(s) => Some((key, s)),
            other => Some((key, other.to_string())),
        })
        .collect())
}
