use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use tether_core::ChatMessage;

use crate::error::ServiceError;
use crate::llm::{LlmClient, OpenAiCompatibleClient, StubLlmClient};
use crate::orchestrator::OrchestratorSettings;
use crate::session::HostCommand;

pub const API_KEY_ENV: &str = "TETHER_LLM_API_KEY";

pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful assistant with access to weather and \
activity recommendation tools. IMPORTANT: If the user provides a weather condition and temperature \
directly, use 'get_activity_recommendation' immediately. Do NOT call 'get_weather' if you already \
have the weather information.";

#[derive(Debug, Deserialize)]
pub struct TetherConfig {
    pub llm: LlmConfig,
    #[serde(default)]
    pub registry: RegistryConfig,
    #[serde(default)]
    pub runtime: RuntimeConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub orchestrator: OrchestratorConfig,
}

#[derive(Debug, Deserialize)]
pub struct LlmConfig {
    pub provider: LlmProvider,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_model")]
    pub model: String,
    pub api_key: Option<String>,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

fn default_base_url() -> String {
    "http://localhost:11434/v1".into()
}
fn default_model() -> String {
    "functiongemma:latest".into()
}
fn default_max_tokens() -> u32 {
    1024
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub enum LlmProvider {
    #[serde(rename = "openai-compatible")]
    OpenAiCompatible,
    #[serde(rename = "stub")]
    Stub,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    pub url: String,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:8002/api/v1/servers".into(),
        }
    }
}

/// How runtime hosts are launched.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// `tether-host` binary; resolved through `PATH` when not absolute.
    pub host_bin: PathBuf,
    /// Extra arguments appended after `--url <binaryUrl>`.
    pub host_args: Vec<String>,
    pub connect_timeout_secs: u64,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            host_bin: PathBuf::from("tether-host"),
            host_args: Vec::new(),
            connect_timeout_secs: 30,
        }
    }
}

impl RuntimeConfig {
    pub fn host_command(&self) -> HostCommand {
        HostCommand {
            program: self.host_bin.clone(),
            args: self.host_args.clone(),
            connect_timeout: Duration::from_secs(self.connect_timeout_secs),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:8000".into(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    pub max_turns: u32,
    pub model_timeout_secs: u64,
    pub tool_timeout_secs: u64,
    pub system_prompt: String,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_turns: crate::orchestrator::DEFAULT_MAX_TURNS,
            model_timeout_secs: 60,
            tool_timeout_secs: 30,
            system_prompt: DEFAULT_SYSTEM_PROMPT.into(),
        }
    }
}

impl TetherConfig {
    pub fn from_file(path: &Path) -> Result<Self, ServiceError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ServiceError::Config(format!("cannot read config {}: {e}", path.display()))
        })?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self, ServiceError> {
        toml::from_str(content)
            .map_err(|e| ServiceError::Config(format!("failed to parse config: {e}")))
    }

    pub fn build_llm_client(&self) -> Result<Arc<dyn LlmClient>, ServiceError> {
        match self.llm.provider {
            LlmProvider::OpenAiCompatible => {
                let api_key = std::env::var(API_KEY_ENV)
                    .ok()
                    .or_else(|| self.llm.api_key.clone());
                Ok(Arc::new(OpenAiCompatibleClient::new(
                    self.llm.base_url.clone(),
                    self.llm.model.clone(),
                    api_key,
                )?))
            }
            LlmProvider::Stub => Ok(Arc::new(StubLlmClient::constant(ChatMessage::assistant(
                "stub response",
            )))),
        }
    }

    pub fn orchestrator_settings(&self) -> OrchestratorSettings {
        OrchestratorSettings {
            max_turns: self.orchestrator.max_turns,
            model_timeout: Duration::from_secs(self.orchestrator.model_timeout_secs),
            tool_timeout: Duration::from_secs(self.orchestrator.tool_timeout_secs),
            max_tokens: self.llm.max_tokens,
            system_prompt: self.orchestrator.system_prompt.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_minimal_config() {
        let config = TetherConfig::parse(
            r#"
[llm]
provider = "openai-compatible"
"#,
        )
        .unwrap();
        assert_eq!(config.llm.provider, LlmProvider::OpenAiCompatible);
        assert_eq!(config.llm.base_url, "http://localhost:11434/v1");
        assert_eq!(config.llm.max_tokens, 1024);
        assert_eq!(config.registry.url, "http://localhost:8002/api/v1/servers");
        assert_eq!(config.runtime.host_bin, PathBuf::from("tether-host"));
        assert_eq!(config.server.bind, "0.0.0.0:8000");
        assert_eq!(config.orchestrator.max_turns, 5);
        assert!(config.orchestrator.system_prompt.contains("get_activity_recommendation"));
    }

    #[test]
    fn parses_full_config() {
        let config = TetherConfig::parse(
            r#"
[llm]
provider = "stub"
model = "qwen2.5:7b"
max_tokens = 256

[registry]
url = "http://registry.internal/api/v1/servers"

[runtime]
host_bin = "/opt/tether/bin/tether-host"
host_args = ["--allow-network", "false"]
connect_timeout_secs = 5

[server]
bind = "127.0.0.1:9000"

[orchestrator]
max_turns = 3
tool_timeout_secs = 10
system_prompt = "Be brief."
"#,
        )
        .unwrap();
        assert_eq!(config.llm.provider, LlmProvider::Stub);
        assert_eq!(config.llm.model, "qwen2.5:7b");
        assert_eq!(config.registry.url, "http://registry.internal/api/v1/servers");

        let host = config.runtime.host_command();
        assert_eq!(host.program, PathBuf::from("/opt/tether/bin/tether-host"));
        assert_eq!(host.args, vec!["--allow-network", "false"]);
        assert_eq!(host.connect_timeout, Duration::from_secs(5));

        let settings = config.orchestrator_settings();
        assert_eq!(settings.max_turns, 3);
        assert_eq!(settings.tool_timeout, Duration::from_secs(10));
        assert_eq!(settings.model_timeout, Duration::from_secs(60));
        assert_eq!(settings.max_tokens, 256);
        assert_eq!(settings.system_prompt, "Be brief.");
    }

    #[test]
    fn missing_llm_section_is_an_error() {
        let err = TetherConfig::parse("[server]\nbind = \"0.0.0.0:1\"\n").unwrap_err();
        assert!(matches!(err, ServiceError::Config(_)));
    }

    #[test]
    fn unknown_provider_is_an_error() {
        let err = TetherConfig::parse("[llm]\nprovider = \"carrier-pigeon\"\n").unwrap_err();
        assert!(err.to_string().contains("failed to parse config"));
    }

    #[test]
    fn missing_file_names_the_path() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("absent.toml");
        let err = TetherConfig::from_file(&path).unwrap_err();
        assert!(err.to_string().contains("absent.toml"));
    }

    #[tokio::test]
    async fn stub_provider_builds_a_working_client() {
        let config = TetherConfig::parse("[llm]\nprovider = \"stub\"\n").unwrap();
        let client = config.build_llm_client().unwrap();
        let reply = client
            .chat(&crate::llm::ChatRequest {
                messages: vec![ChatMessage::user("hi")],
                tools: Vec::new(),
                max_tokens: 16,
            })
            .await
            .unwrap();
        assert_eq!(reply.content, "stub response");
        assert!(!reply.has_tool_calls());
    }
}
