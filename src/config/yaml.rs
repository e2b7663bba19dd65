use serde::Deserialize;
use std::path::PathBuf;

/// Complete YAML configuration structure
///
/// All fields are optional to allow partial configuration. Values present in the
/// file override the environment.
///
/// # Example YAML structure
/// ```yaml
/// server:
///   host: "0.0.0.0"
///   port: 5050
///   public_host: "bridge.example.com"
///
/// call:
///   greeting: "Hello. Connecting you to the assistant."
///
/// realtime:
///   provider: "gemini"
///   model: "models/gemini-2.5-flash-native-audio-preview-12-2025"
///   voice: "Puck"
///   endpoint: "wss://proxy.example.com/live"
///   modality: "audio"
///   instructions: "You are a helpful voice assistant."
///   initial_prompt: "Hello, please introduce yourself briefly."
///   handshake_timeout_secs: 10
///   handshake_policy: "continue"
///
/// providers:
///   gemini_api_key: "your-gemini-key"
///   openai_api_key: "your-openai-key"
/// ```
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct YamlConfig {
    pub server: Option<ServerYaml>,
    pub call: Option<CallYaml>,
    pub realtime: Option<RealtimeYaml>,
    pub providers: Option<ProvidersYaml>,
}

/// Server configuration from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct ServerYaml {
    pub host: Option<String>,
    pub port: Option<u16>,
    /// Host advertised to the telephony provider in the stream URL
    pub public_host: Option<String>,
}

/// Call-answer configuration from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct CallYaml {
    pub greeting: Option<String>,
}

/// Realtime backend configuration from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct RealtimeYaml {
    pub provider: Option<String>,
    pub model: Option<String>,
    pub voice: Option<String>,
    pub endpoint: Option<String>,
    pub modality: Option<String>,
    pub instructions: Option<String>,
    pub initial_prompt: Option<String>,
    pub handshake_timeout_secs: Option<u64>,
    pub handshake_policy: Option<String>,
}

/// Provider API keys from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct ProvidersYaml {
    pub gemini_api_key: Option<String>,
    pub openai_api_key: Option<String>,
}

impl YamlConfig {
    /// Load YAML configuration from a file
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or the YAML is malformed.
    pub fn from_file(path: &PathBuf) -> Result<Self, Box<dyn std::error::Error>> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config file {}: {e}", path.display()))?;

        let config: YamlConfig = serde_yaml::from_str(&contents)
            .map_err(|e| format!("Failed to parse YAML config: {e}"))?;

        Ok(config)
    }
}
