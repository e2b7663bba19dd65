//! Configuration module for the call bridge server
//!
//! This module handles server configuration from various sources: .env files, YAML files,
//! and environment variables. Priority: YAML > ENV vars > .env values > defaults.
//! Configuration is loaded once at startup and never reloaded.
//!
//! # Example
//! ```rust,no_run
//! use call_bridge::config::ServerConfig;
//! use std::path::PathBuf;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! // Load from environment variables only
//! let config = ServerConfig::from_env()?;
//!
//! // Load from YAML file with environment variable overrides
//! let config_path = PathBuf::from("config.yaml");
//! let config = ServerConfig::from_file(&config_path)?;
//!
//! println!("Server listening on {}", config.address());
//! # Ok(())
//! # }
//! ```

use std::env;
use std::path::PathBuf;
use std::time::Duration;

mod yaml;

use crate::core::realtime::{
    BackendConfig, DEFAULT_HANDSHAKE_TIMEOUT, HandshakePolicy, RealtimeProvider, ResponseModality,
};

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 5050;
pub const DEFAULT_GREETING: &str = "Hello. Connecting you to the voice assistant.";
pub const DEFAULT_INSTRUCTIONS: &str = "You are a helpful and knowledgeable voice assistant. \
     You speak with a warm, encouraging tone. \
     Keep responses concise and suitable for a voice conversation. \
     Avoid using markdown or special formatting in your output.";
pub const DEFAULT_INITIAL_PROMPT: &str =
    "Hello, please introduce yourself briefly to verify audio is working.";

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Host used in the media-stream URL handed to the telephony provider.
    /// Falls back to the request `Host` header when unset.
    pub public_host: Option<String>,
    /// Spoken before the stream connects; `None` skips the `<Say>` verb
    pub greeting: Option<String>,

    // Realtime backend
    pub provider: RealtimeProvider,
    pub gemini_api_key: Option<String>,
    pub openai_api_key: Option<String>,
    /// Provider default when `None`
    pub model: Option<String>,
    /// Provider default when `None`
    pub voice: Option<String>,
    pub endpoint: Option<String>,
    pub modality: ResponseModality,
    pub instructions: String,
    /// `None` disables the agent-speaks-first turn
    pub initial_prompt: Option<String>,
    pub handshake_timeout: Duration,
    pub handshake_policy: HandshakePolicy,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            public_host: None,
            greeting: Some(DEFAULT_GREETING.to_string()),
            provider: RealtimeProvider::default(),
            gemini_api_key: None,
            openai_api_key: None,
            model: None,
            voice: None,
            endpoint: None,
            modality: ResponseModality::Audio,
            instructions: DEFAULT_INSTRUCTIONS.to_string(),
            initial_prompt: Some(DEFAULT_INITIAL_PROMPT.to_string()),
            handshake_timeout: DEFAULT_HANDSHAKE_TIMEOUT,
            handshake_policy: HandshakePolicy::default(),
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables
    ///
    /// Reads (all optional apart from the selected provider's API key):
    /// `HOST`, `PORT`, `PUBLIC_HOST`, `CALL_GREETING`, `REALTIME_PROVIDER`,
    /// `GEMINI_API_KEY`, `OPENAI_API_KEY`, `REALTIME_MODEL`, `REALTIME_VOICE`,
    /// `REALTIME_ENDPOINT`, `REALTIME_MODALITY`, `SYSTEM_INSTRUCTIONS`,
    /// `INITIAL_PROMPT`, `HANDSHAKE_TIMEOUT_SECS`, `HANDSHAKE_POLICY`.
    ///
    /// # Errors
    /// Returns an error if a value has an invalid format or the API key for the
    /// selected provider is missing.
    pub fn from_env() -> Result<Self, Box<dyn std::error::Error>> {
        let config = Self::load_env()?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a YAML file with environment variable base
    ///
    /// Environment variables (with defaults) form the base; values present in
    /// the YAML file override them. The merged configuration is validated.
    ///
    /// # Errors
    /// Returns an error if:
    /// - The YAML file cannot be read or is malformed
    /// - Environment variables or YAML values have invalid formats
    /// - Configuration validation fails
    pub fn from_file(path: &PathBuf) -> Result<Self, Box<dyn std::error::Error>> {
        // .env is loaded in main.rs, so the environment already includes it here
        let yaml_config = yaml::YamlConfig::from_file(path)?;

        let mut config = Self::load_env()?;
        config.apply_yaml(yaml_config)?;
        config.validate()?;

        Ok(config)
    }

    fn load_env() -> Result<Self, Box<dyn std::error::Error>> {
        let mut config = Self::default();

        if let Some(host) = env_var("HOST") {
            config.host = host;
        }
        if let Some(port) = env_var("PORT") {
            config.port = port
                .parse()
                .map_err(|e| format!("Invalid PORT value '{port}': {e}"))?;
        }
        config.public_host = env_var("PUBLIC_HOST");
        if let Ok(greeting) = env::var("CALL_GREETING") {
            config.greeting = non_empty(greeting);
        }

        if let Some(provider) = env_var("REALTIME_PROVIDER") {
            config.provider = parse_provider(&provider)?;
        }
        config.gemini_api_key = env_var("GEMINI_API_KEY");
        config.openai_api_key = env_var("OPENAI_API_KEY");
        config.model = env_var("REALTIME_MODEL");
        config.voice = env_var("REALTIME_VOICE");
        config.endpoint = env_var("REALTIME_ENDPOINT");
        if let Some(modality) = env_var("REALTIME_MODALITY") {
            config.modality = parse_modality(&modality)?;
        }
        if let Some(instructions) = env_var("SYSTEM_INSTRUCTIONS") {
            config.instructions = instructions;
        }
        if let Ok(prompt) = env::var("INITIAL_PROMPT") {
            config.initial_prompt = non_empty(prompt);
        }
        if let Some(secs) = env_var("HANDSHAKE_TIMEOUT_SECS") {
            let secs: u64 = secs
                .parse()
                .map_err(|e| format!("Invalid HANDSHAKE_TIMEOUT_SECS value '{secs}': {e}"))?;
            config.handshake_timeout = Duration::from_secs(secs);
        }
        if let Some(policy) = env_var("HANDSHAKE_POLICY") {
            config.handshake_policy = parse_policy(&policy)?;
        }

        Ok(config)
    }

    fn apply_yaml(&mut self, yaml: yaml::YamlConfig) -> Result<(), Box<dyn std::error::Error>> {
        if let Some(server) = yaml.server {
            if let Some(host) = server.host {
                self.host = host;
            }
            if let Some(port) = server.port {
                self.port = port;
            }
            if let Some(public_host) = server.public_host {
                self.public_host = non_empty(public_host);
            }
        }

        if let Some(greeting) = yaml.call.and_then(|call| call.greeting) {
            self.greeting = non_empty(greeting);
        }

        if let Some(realtime) = yaml.realtime {
            if let Some(provider) = realtime.provider {
                self.provider = parse_provider(&provider)?;
            }
            if let Some(model) = realtime.model {
                self.model = non_empty(model);
            }
            if let Some(voice) = realtime.voice {
                self.voice = non_empty(voice);
            }
            if let Some(endpoint) = realtime.endpoint {
                self.endpoint = non_empty(endpoint);
            }
            if let Some(modality) = realtime.modality {
                self.modality = parse_modality(&modality)?;
            }
            if let Some(instructions) = realtime.instructions {
                self.instructions = instructions;
            }
            if let Some(prompt) = realtime.initial_prompt {
                self.initial_prompt = non_empty(prompt);
            }
            if let Some(secs) = realtime.handshake_timeout_secs {
                self.handshake_timeout = Duration::from_secs(secs);
            }
            if let Some(policy) = realtime.handshake_policy {
                self.handshake_policy = parse_policy(&policy)?;
            }
        }

        if let Some(providers) = yaml.providers {
            if let Some(key) = providers.gemini_api_key {
                self.gemini_api_key = non_empty(key);
            }
            if let Some(key) = providers.openai_api_key {
                self.openai_api_key = non_empty(key);
            }
        }

        Ok(())
    }

    /// Check the merged configuration.
    ///
    /// The selected provider needs an API key, the handshake timeout must be
    /// non-zero and an endpoint override must be a `ws://` or `wss://` URL.
    pub fn validate(&self) -> Result<(), String> {
        self.get_api_key()?;
        if self.handshake_timeout.is_zero() {
            return Err("Handshake timeout must be greater than zero".to_string());
        }
        self.backend_config()
            .validate()
            .map_err(|e| format!("Invalid realtime backend configuration: {e}"))
    }

    /// Get the server address as a string
    ///
    /// Returns the address in the format "host:port"
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Get the API key for the selected realtime provider
    ///
    /// # Returns
    /// * `Result<&str, String>` - The API key on success, or an error message naming
    ///   the missing environment variable
    pub fn get_api_key(&self) -> Result<&str, String> {
        let (key, var) = match self.provider {
            RealtimeProvider::Gemini => (&self.gemini_api_key, "GEMINI_API_KEY"),
            RealtimeProvider::OpenAI => (&self.openai_api_key, "OPENAI_API_KEY"),
        };
        key.as_deref()
            .ok_or_else(|| format!("{} API key not configured (set {var})", self.provider))
    }

    /// Build the per-call backend configuration.
    ///
    /// Unset model and voice fall back to the provider defaults.
    pub fn backend_config(&self) -> BackendConfig {
        let mut backend =
            BackendConfig::new(self.provider, self.get_api_key().unwrap_or_default());
        if let Some(model) = &self.model {
            backend.model = model.clone();
        }
        if let Some(voice) = &self.voice {
            backend.voice = voice.clone();
        }
        backend.endpoint = self.endpoint.clone();
        backend.modality = self.modality;
        backend.instructions = self.instructions.clone();
        backend.initial_prompt = self.initial_prompt.clone();
        backend.handshake_timeout = self.handshake_timeout;
        backend.handshake_policy = self.handshake_policy;
        backend
    }
}

/// Read a trimmed, non-empty environment variable.
fn env_var(name: &str) -> Option<String> {
    env::var(name).ok().and_then(non_empty)
}

fn non_empty(value: String) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn parse_provider(value: &str) -> Result<RealtimeProvider, String> {
    RealtimeProvider::parse(value).ok_or_else(|| {
        format!("Unsupported realtime provider '{value}' (expected 'gemini' or 'openai')")
    })
}

fn parse_modality(value: &str) -> Result<ResponseModality, String> {
    ResponseModality::parse(value)
        .ok_or_else(|| format!("Invalid response modality '{value}' (expected 'audio' or 'text')"))
}

fn parse_policy(value: &str) -> Result<HandshakePolicy, String> {
    HandshakePolicy::parse(value).ok_or_else(|| {
        format!("Invalid handshake policy '{value}' (expected 'continue' or 'abort')")
    })
}
