//! Configuration management for the study agents.
//!
//! Configuration can be set via environment variables (a `.env` file in the
//! working directory is loaded first and overrides the process environment):
//! - `GOOGLE_GENAI_USE_VERTEXAI` - Optional. Route model calls through Vertex AI instead of the Gemini API.
//! - `GOOGLE_API_KEY` - Required unless Vertex AI is enabled.
//! - `GOOGLE_GENAI_MODEL` - Required. The Gemini model identifier.
//! - `GOOGLE_CLOUD_PROJECT` - Required with Vertex AI. The Google Cloud project id.
//! - `GOOGLE_CLOUD_LOCATION` - Optional. Vertex AI region. Defaults to `us-central1`.
//! - `GOOGLE_CLOUD_ACCESS_TOKEN` - Optional. Static Vertex AI bearer token; otherwise `gcloud` is asked for one.
//! - `MAX_ITERATIONS` - Optional. Maximum model steps per agent turn. Defaults to `25`.
//! - `MCP_CONFIG` - Optional. Path to an MCP server config file. Defaults to the built-in study server.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use crate::profile::AgentProfile;

/// Host the server binds to when `--host` is not given.
pub const DEFAULT_HOST: &str = "localhost";

/// Default Vertex AI region.
pub const DEFAULT_VERTEX_LOCATION: &str = "us-central1";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("GOOGLE_API_KEY environment variable not set and GOOGLE_GENAI_USE_VERTEXAI is not TRUE.")]
    MissingApiKey,

    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),

    #[error("Failed to read MCP config {path}: {reason}")]
    McpConfig { path: PathBuf, reason: String },
}

/// Where model requests are sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelBackend {
    /// Gemini Developer API authenticated with an API key.
    GeminiApi { api_key: String },
    /// Vertex AI, authenticated with a bearer token.
    VertexAi {
        project: String,
        location: String,
        access_token: Option<String>,
    },
}

/// Model selection.
#[derive(Debug, Clone)]
pub struct ModelConfig {
    /// Model identifier, e.g. `gemini-2.0-flash`
    pub model: String,

    /// Endpoint and credentials
    pub backend: ModelBackend,
}

/// A single stdio MCP server the tool provider spawns.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct McpServerConfig {
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub env: HashMap<String, String>,
}

/// Contents of an `MCP_CONFIG` file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct McpConfigFile {
    #[serde(default)]
    mcp_servers: HashMap<String, McpServerConfig>,
}

/// Agent service configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Model selection and credentials
    pub model: ModelConfig,

    /// Server host
    pub host: String,

    /// Server port
    pub port: u16,

    /// Maximum model steps per turn
    pub max_iterations: usize,

    /// MCP servers supplying the agent's tools, keyed by server name
    pub mcp_servers: HashMap<String, McpServerConfig>,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::MissingApiKey` if neither `GOOGLE_API_KEY` nor Vertex AI is configured,
    /// and `ConfigError::MissingEnvVar` if `GOOGLE_GENAI_MODEL` is not set.
    pub fn from_env(profile: &AgentProfile) -> Result<Self, ConfigError> {
        Self::from_lookup(profile, |name| std::env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(profile: &AgentProfile, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let use_vertex = lookup("GOOGLE_GENAI_USE_VERTEXAI")
            .map(|v| {
                parse_bool(&v).unwrap_or_else(|| {
                    tracing::warn!("Unrecognized GOOGLE_GENAI_USE_VERTEXAI value {:?}, using the Gemini API", v);
                    false
                })
            })
            .unwrap_or(false);

        let backend = if use_vertex {
            let project = lookup("GOOGLE_CLOUD_PROJECT")
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| ConfigError::MissingEnvVar("GOOGLE_CLOUD_PROJECT".to_string()))?;
            ModelBackend::VertexAi {
                project,
                location: lookup("GOOGLE_CLOUD_LOCATION")
                    .unwrap_or_else(|| DEFAULT_VERTEX_LOCATION.to_string()),
                access_token: lookup("GOOGLE_CLOUD_ACCESS_TOKEN").filter(|v| !v.trim().is_empty()),
            }
        } else {
            let api_key = lookup("GOOGLE_API_KEY")
                .filter(|v| !v.trim().is_empty())
                .ok_or(ConfigError::MissingApiKey)?;
            ModelBackend::GeminiApi { api_key }
        };

        let model = lookup("GOOGLE_GENAI_MODEL")
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| ConfigError::MissingEnvVar("GOOGLE_GENAI_MODEL".to_string()))?;

        let max_iterations = lookup("MAX_ITERATIONS")
            .unwrap_or_else(|| "25".to_string())
            .parse::<usize>()
            .map_err(|e| ConfigError::InvalidValue("MAX_ITERATIONS".to_string(), format!("{}", e)))?;
        if max_iterations == 0 {
            return Err(ConfigError::InvalidValue(
                "MAX_ITERATIONS".to_string(),
                "must be at least 1".to_string(),
            ));
        }

        let mcp_servers = match lookup("MCP_CONFIG") {
            Some(path) => load_mcp_servers(Path::new(&path))?,
            None => default_mcp_servers(),
        };

        Ok(Self {
            model: ModelConfig { model, backend },
            host: DEFAULT_HOST.to_string(),
            port: profile.default_port,
            max_iterations,
            mcp_servers,
        })
    }

    /// Public URL advertised in the agent card.
    pub fn public_url(&self) -> String {
        format!("http://{}:{}/", self.host, self.port)
    }
}

/// The MCP server both agents ship with.
pub fn default_mcp_servers() -> HashMap<String, McpServerConfig> {
    let mut servers = HashMap::new();
    servers.insert(
        "study".to_string(),
        McpServerConfig {
            command: "npx".to_string(),
            args: vec![
                "-y".to_string(),
                "@openbnb/mcp-server-airbnb".to_string(),
                "--ignore-robots-txt".to_string(),
            ],
            env: HashMap::new(),
        },
    );
    servers
}

fn load_mcp_servers(path: &Path) -> Result<HashMap<String, McpServerConfig>, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::McpConfig {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    let file: McpConfigFile = serde_json::from_str(&content).map_err(|e| ConfigError::McpConfig {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    if file.mcp_servers.is_empty() {
        return Err(ConfigError::McpConfig {
            path: path.to_path_buf(),
            reason: "no servers defined under mcpServers".to_string(),
        });
    }
    tracing::info!(
        "Loaded MCP config with {} servers from {}",
        file.mcp_servers.len(),
        path.display()
    );
    Ok(file.mcp_servers)
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "t" | "yes" | "y" | "on" => Some(true),
        "0" | "false" | "f" | "no" | "n" | "off" | "" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn api_key_backend_is_default() {
        let profile = AgentProfile::study_planner();
        let config = Config::from_lookup(
            &profile,
            lookup_from(&[("GOOGLE_API_KEY", "k"), ("GOOGLE_GENAI_MODEL", "gemini-2.0-flash")]),
        )
        .expect("config");
        assert_eq!(
            config.model.backend,
            ModelBackend::GeminiApi { api_key: "k".to_string() }
        );
        assert_eq!(config.port, 10002);
        assert_eq!(config.host, "localhost");
        assert_eq!(config.max_iterations, 25);
        assert!(config.mcp_servers.contains_key("study"));
    }

    #[test]
    fn missing_api_key_fails_fast() {
        let profile = AgentProfile::exercise_generator();
        let err = Config::from_lookup(&profile, lookup_from(&[("GOOGLE_GENAI_MODEL", "m")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::MissingApiKey));
        assert!(err.to_string().contains("GOOGLE_API_KEY"));
    }

    #[test]
    fn missing_model_fails_fast() {
        let profile = AgentProfile::study_planner();
        let err = Config::from_lookup(&profile, lookup_from(&[("GOOGLE_API_KEY", "k")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::MissingEnvVar(ref v) if v == "GOOGLE_GENAI_MODEL"));
    }

    #[test]
    fn vertex_needs_no_api_key_but_needs_project() {
        let profile = AgentProfile::study_planner();
        let err = Config::from_lookup(
            &profile,
            lookup_from(&[("GOOGLE_GENAI_USE_VERTEXAI", "TRUE"), ("GOOGLE_GENAI_MODEL", "m")]),
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::MissingEnvVar(ref v) if v == "GOOGLE_CLOUD_PROJECT"));

        let config = Config::from_lookup(
            &profile,
            lookup_from(&[
                ("GOOGLE_GENAI_USE_VERTEXAI", "TRUE"),
                ("GOOGLE_GENAI_MODEL", "m"),
                ("GOOGLE_CLOUD_PROJECT", "proj"),
            ]),
        )
        .expect("config");
        assert_eq!(
            config.model.backend,
            ModelBackend::VertexAi {
                project: "proj".to_string(),
                location: DEFAULT_VERTEX_LOCATION.to_string(),
                access_token: None,
            }
        );
    }

    #[test]
    fn invalid_values_are_reported() {
        let profile = AgentProfile::study_planner();
        let err = Config::from_lookup(
            &profile,
            lookup_from(&[
                ("GOOGLE_API_KEY", "k"),
                ("GOOGLE_GENAI_MODEL", "m"),
                ("MAX_ITERATIONS", "lots"),
            ]),
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue(ref v, _) if v == "MAX_ITERATIONS"));
    }

    #[test]
    fn unrecognized_vertex_flag_means_gemini_api() {
        let profile = AgentProfile::study_planner();
        let config = Config::from_lookup(
            &profile,
            lookup_from(&[
                ("GOOGLE_GENAI_USE_VERTEXAI", "maybe"),
                ("GOOGLE_API_KEY", "k"),
                ("GOOGLE_GENAI_MODEL", "m"),
            ]),
        )
        .expect("config");
        assert_eq!(
            config.model.backend,
            ModelBackend::GeminiApi {
                api_key: "k".to_string()
            }
        );

        let err = Config::from_lookup(
            &profile,
            lookup_from(&[("GOOGLE_GENAI_USE_VERTEXAI", "maybe"), ("GOOGLE_GENAI_MODEL", "m")]),
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::MissingApiKey));
    }

    #[test]
    fn mcp_config_file_replaces_default_servers() {
        let mut file = tempfile::NamedTempFile::new().expect("tempfile");
        write!(
            file,
            r#"{{"mcpServers": {{"notes": {{"command": "notes-mcp", "args": ["--stdio"]}}}}}}"#
        )
        .expect("write");
        let path = file.path().to_string_lossy().to_string();

        let profile = AgentProfile::exercise_generator();
        let config = Config::from_lookup(
            &profile,
            lookup_from(&[
                ("GOOGLE_API_KEY", "k"),
                ("GOOGLE_GENAI_MODEL", "m"),
                ("MCP_CONFIG", path.as_str()),
            ]),
        )
        .expect("config");
        assert_eq!(config.mcp_servers.len(), 1);
        let notes = &config.mcp_servers["notes"];
        assert_eq!(notes.command, "notes-mcp");
        assert_eq!(notes.args, vec!["--stdio".to_string()]);
        assert_eq!(config.port, 10003);
    }
}
