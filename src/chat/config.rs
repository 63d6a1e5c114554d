//! Configuration types for the chat application.
//!
//! Configuration is layered: built-in defaults, then an optional YAML file,
//! then command-line flags parsed with `arrrg`.  The API key itself is never
//! read from the file; it comes from the environment at send time.

use std::fmt;
use std::path::Path;

use arrrg_derive::CommandLine;
use serde::Deserialize;
use url::Url;

use crate::error::{Error, Result};

/// Default chat-completion endpoint.
pub const DEFAULT_ENDPOINT: &str = "https://openrouter.ai/api/v1/chat/completions";

/// Default model identifier.
pub const DEFAULT_MODEL: &str = "qwen/qwen3-coder-next";

/// Default maximum tokens per response.
pub const DEFAULT_MAX_TOKENS: u32 = 4096;

/// Default value of the `HTTP-Referer` header.
pub const DEFAULT_REFERER: &str = "https://github.com/Aurnova/ai-tutor";

/// Default environment variable holding the API key.
pub const DEFAULT_API_KEY_ENV: &str = "OPENROUTER_API_KEY";

/// Default system prompt.
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a patient, Socratic tutor for students learning AI and programming.
Your role is to teach and guide, not to do the work for them. Prefer asking questions and giving hints over full answers.
Explain concepts clearly, use examples when helpful, and encourage reasoning. If they ask for direct code or solutions,
steer them toward understanding the idea first, then offer structure or pseudocode before full implementations.
Be encouraging and clear. Keep responses focused and not overly long unless the topic requires it.";

/// Command-line arguments for the tutor-chat tool.
#[derive(CommandLine, Debug, Default, PartialEq, Eq)]
pub struct ChatArgs {
    /// Path to a YAML configuration file.
    #[arrrg(optional, "YAML configuration file", "PATH")]
    pub config: Option<String>,

    /// Model to use for chat.
    #[arrrg(optional, "Model to use (default: qwen/qwen3-coder-next)", "MODEL")]
    pub model: Option<String>,

    /// System prompt to set context for the conversation.
    #[arrrg(optional, "System prompt for the conversation", "PROMPT")]
    pub system: Option<String>,

    /// Maximum tokens per response.
    #[arrrg(optional, "Max tokens per response (default: 4096)", "TOKENS")]
    pub max_tokens: Option<u32>,

    /// Completion endpoint URL.
    #[arrrg(optional, "Chat-completion endpoint URL", "URL")]
    pub endpoint: Option<String>,

    /// Environment variable that holds the API key.
    #[arrrg(optional, "Environment variable holding the API key", "VAR")]
    pub api_key_env: Option<String>,

    /// Disable ANSI colors and styles.
    #[arrrg(flag, "Disable ANSI colors/styles")]
    pub no_color: bool,

    /// Speak the JSON-lines protocol on stdin/stdout instead of running a REPL.
    #[arrrg(flag, "Read commands and write events as JSON lines")]
    pub protocol: bool,
}

/// Configuration for a chat session.
#[derive(Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ChatConfig {
    /// The chat-completion endpoint.
    pub endpoint: String,

    /// The model to use for generating responses.
    pub model: String,

    /// System prompt prepended to every request.
    pub system_prompt: String,

    /// Maximum tokens per response.
    pub max_tokens: u32,

    /// Value of the identifying `HTTP-Referer` header.
    pub referer: String,

    /// Environment variable read for the API key at send time.
    pub api_key_env: String,

    /// Explicit API key; takes precedence over `api_key_env`.
    #[serde(skip)]
    pub api_key: Option<String>,

    /// Whether to use ANSI colors and styles in output.
    pub use_color: bool,
}

impl ChatConfig {
    /// Creates a new ChatConfig with default values.
    ///
    /// Defaults:
    /// - Endpoint: OpenRouter chat completions
    /// - Model: qwen/qwen3-coder-next
    /// - Max tokens: 4096
    /// - API key: read from `OPENROUTER_API_KEY`
    /// - Color: enabled
    pub fn new() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            model: DEFAULT_MODEL.to_string(),
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            max_tokens: DEFAULT_MAX_TOKENS,
            referer: DEFAULT_REFERER.to_string(),
            api_key_env: DEFAULT_API_KEY_ENV.to_string(),
            api_key: None,
            use_color: true,
        }
    }

    /// Parses a YAML configuration.  Missing keys keep their defaults.
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(yaml)?;
        Ok(config)
    }

    /// Loads a YAML configuration file.
    pub fn from_yaml_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let yaml = std::fs::read_to_string(path).map_err(|err| {
            Error::io(format!("failed to read {}", path.display()), err)
        })?;
        Self::from_yaml_str(&yaml)
    }

    /// Checks that the configuration can be used to issue requests.
    pub fn validate(&self) -> Result<()> {
        let url = Url::parse(&self.endpoint)?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(Error::validation(
                format!("unsupported scheme {:?}", url.scheme()),
                Some("endpoint".to_string()),
            ));
        }
        if self.model.trim().is_empty() {
            return Err(Error::validation(
                "model must not be empty",
                Some("model".to_string()),
            ));
        }
        if self.max_tokens == 0 {
            return Err(Error::validation(
                "max_tokens must be positive",
                Some("max_tokens".to_string()),
            ));
        }
        if self.api_key.is_none() && self.api_key_env.trim().is_empty() {
            return Err(Error::validation(
                "api_key_env must name an environment variable",
                Some("api_key_env".to_string()),
            ));
        }
        Ok(())
    }

    /// Sets the endpoint.
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Sets the model to use.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Sets the system prompt.
    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    /// Sets the maximum tokens per response.
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Sets the referer header value.
    pub fn with_referer(mut self, referer: impl Into<String>) -> Self {
        self.referer = referer.into();
        self
    }

    /// Sets the environment variable read for the API key.
    pub fn with_api_key_env(mut self, variable: impl Into<String>) -> Self {
        self.api_key_env = variable.into();
        self
    }

    /// Sets an explicit API key.
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Disables ANSI color output.
    pub fn without_color(mut self) -> Self {
        self.use_color = false;
        self
    }
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ChatConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChatConfig")
            .field("endpoint", &self.endpoint)
            .field("model", &self.model)
            .field("system_prompt", &self.system_prompt)
            .field("max_tokens", &self.max_tokens)
            .field("referer", &self.referer)
            .field("api_key_env", &self.api_key_env)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("use_color", &self.use_color)
            .finish()
    }
}

impl TryFrom<ChatArgs> for ChatConfig {
    type Error = Error;

    fn try_from(args: ChatArgs) -> Result<Self> {
        let mut config = match &args.config {
            Some(path) => ChatConfig::from_yaml_file(path)?,
            None => ChatConfig::new(),
        };
        if let Some(model) = args.model {
            config.model = model;
        }
        if let Some(system) = args.system {
            config.system_prompt = system;
        }
        if let Some(max_tokens) = args.max_tokens {
            config.max_tokens = max_tokens;
        }
        if let Some(endpoint) = args.endpoint {
            config.endpoint = endpoint;
        }
        if let Some(variable) = args.api_key_env {
            config.api_key_env = variable;
        }
        if args.no_color {
            config.use_color = false;
        }
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = ChatConfig::new();
        assert_eq!(config.endpoint, DEFAULT_ENDPOINT);
        assert_eq!(config.model, "qwen/qwen3-coder-next");
        assert_eq!(config.max_tokens, 4096);
        assert_eq!(config.api_key_env, "OPENROUTER_API_KEY");
        assert!(config.system_prompt.starts_with("You are a patient, Socratic tutor"));
        assert!(config.api_key.is_none());
        assert!(config.use_color);
        config.validate().unwrap();
    }

    #[test]
    fn yaml_overrides_defaults() {
        let config = ChatConfig::from_yaml_str(
            "model: openai/gpt-4o-mini\nmax_tokens: 512\nsystem_prompt: Answer briefly.\n",
        )
        .unwrap();
        assert_eq!(config.model, "openai/gpt-4o-mini");
        assert_eq!(config.max_tokens, 512);
        assert_eq!(config.system_prompt, "Answer briefly.");
        assert_eq!(config.endpoint, DEFAULT_ENDPOINT);
        assert!(config.api_key.is_none());
    }

    #[test]
    fn yaml_rejects_unknown_keys() {
        let err = ChatConfig::from_yaml_str("modle: typo\n").unwrap_err();
        assert!(err.to_string().contains("YAML error"));
    }

    #[test]
    fn config_from_args_defaults() {
        let config = ChatConfig::try_from(ChatArgs::default()).unwrap();
        assert_eq!(config, ChatConfig::new());
    }

    #[test]
    fn config_from_args_custom() {
        let args = ChatArgs {
            model: Some("meta-llama/llama-3.1-8b-instruct".to_string()),
            system: Some("You are helpful.".to_string()),
            max_tokens: Some(8192),
            endpoint: Some("http://localhost:8080/v1/chat/completions".to_string()),
            api_key_env: Some("LOCAL_KEY".to_string()),
            no_color: true,
            ..ChatArgs::default()
        };
        let config = ChatConfig::try_from(args).unwrap();
        assert_eq!(config.model, "meta-llama/llama-3.1-8b-instruct");
        assert_eq!(config.system_prompt, "You are helpful.");
        assert_eq!(config.max_tokens, 8192);
        assert_eq!(config.endpoint, "http://localhost:8080/v1/chat/completions");
        assert_eq!(config.api_key_env, "LOCAL_KEY");
        assert!(!config.use_color);
    }

    #[test]
    fn missing_config_file() {
        let args = ChatArgs {
            config: Some("/nonexistent/tutor-chat.yaml".to_string()),
            ..ChatArgs::default()
        };
        let err = ChatConfig::try_from(args).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/tutor-chat.yaml"));
    }

    #[test]
    fn validation_failures() {
        assert!(matches!(
            ChatConfig::new().with_endpoint("not a url").validate(),
            Err(Error::Url { .. })
        ));
        assert!(ChatConfig::new()
            .with_endpoint("ftp://example.com/")
            .validate()
            .unwrap_err()
            .is_validation());
        assert!(ChatConfig::new().with_max_tokens(0).validate().unwrap_err().is_validation());
        assert!(ChatConfig::new().with_model(" ").validate().unwrap_err().is_validation());
        assert!(ChatConfig::new().with_api_key_env("").validate().unwrap_err().is_validation());
        ChatConfig::new()
            .with_api_key_env("")
            .with_api_key("sk-test")
            .validate()
            .unwrap();
    }

    #[test]
    fn debug_redacts_api_key() {
        let config = ChatConfig::new().with_api_key("sk-or-secret");
        assert!(!format!("{config:?}").contains("sk-or-secret"));
    }
}
