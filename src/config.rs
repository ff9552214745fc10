//! Configuration module for chatrelay.

use serde::Deserialize;
use std::path::Path;

use crate::{RelayError, Result};

/// Server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host address to bind.
    #[serde(default = "default_host")]
    pub host: String,
    /// Port number to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Timezone for the human-readable server time (e.g., "Asia/Tokyo", "UTC").
    #[serde(default = "default_timezone")]
    pub timezone: String,
    /// strftime format for the human-readable server time.
    #[serde(default = "default_time_format")]
    pub time_format: String,
    /// Allowed CORS origins. Empty means any origin.
    #[serde(default)]
    pub cors_origins: Vec<String>,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_timezone() -> String {
    "UTC".to_string()
}

fn default_time_format() -> String {
    "%H:%M:%S".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            timezone: default_timezone(),
            time_format: default_time_format(),
            cors_origins: vec![],
        }
    }
}

/// Broadcast relay configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct RelayConfig {
    /// Display name of the automated responder.
    #[serde(default = "default_bot_name")]
    pub bot_name: String,
    /// Text of the private welcome message sent to each new connection.
    #[serde(default = "default_welcome_message")]
    pub welcome_message: String,
    /// Delay before the welcome message, in milliseconds.
    #[serde(default = "default_welcome_delay")]
    pub welcome_delay_ms: u64,
    /// Lower bound of the responder delay, in milliseconds.
    #[serde(default = "default_reply_delay_min")]
    pub reply_delay_min_ms: u64,
    /// Upper bound of the responder delay, in milliseconds.
    #[serde(default = "default_reply_delay_max")]
    pub reply_delay_max_ms: u64,
    /// Abort pending replies when the originating connection closes.
    #[serde(default)]
    pub cancel_replies_on_disconnect: bool,
    /// Capacity of the broadcast channel.
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

fn default_bot_name() -> String {
    "🤖 ChatBot".to_string()
}

fn default_welcome_message() -> String {
    "Welcome to the chat! 👋 I'm your friendly server bot. I'll respond to your messages \
     automatically! Try saying 'hello' or asking me about the weather! ✨"
        .to_string()
}

fn default_welcome_delay() -> u64 {
    500
}

fn default_reply_delay_min() -> u64 {
    1000
}

fn default_reply_delay_max() -> u64 {
    3000
}

fn default_channel_capacity() -> usize {
    100
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            bot_name: default_bot_name(),
            welcome_message: default_welcome_message(),
            welcome_delay_ms: default_welcome_delay(),
            reply_delay_min_ms: default_reply_delay_min(),
            reply_delay_max_ms: default_reply_delay_max(),
            cancel_replies_on_disconnect: false,
            channel_capacity: default_channel_capacity(),
        }
    }
}

/// A keyword-triggered reply category.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct CategoryConfig {
    /// Category name, used in logs.
    pub name: String,
    /// Lower-case substrings that select this category.
    pub triggers: Vec<String>,
    /// Reply templates. `{sender}` and `{time}` are substituted.
    pub replies: Vec<String>,
}

impl CategoryConfig {
    fn new(name: &str, triggers: &[&str], replies: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            triggers: triggers.iter().map(|t| t.to_string()).collect(),
            replies: replies.iter().map(|r| r.to_string()).collect(),
        }
    }
}

/// Responder configuration.
///
/// Categories are scanned in the order listed; the first one with a matching
/// trigger wins.
#[derive(Debug, Clone, Deserialize)]
pub struct ResponderConfig {
    /// Ordered reply categories.
    #[serde(default = "default_categories")]
    pub categories: Vec<CategoryConfig>,
    /// Replies used when no category matches.
    #[serde(default = "default_replies")]
    pub default_replies: Vec<String>,
}

fn default_categories() -> Vec<CategoryConfig> {
    vec![
        CategoryConfig::new(
            "greeting",
            &["hello", "hi", "hey", "good morning", "good evening"],
            &[
                "Hello {sender}! 👋 How are you doing today?",
                "Hi there {sender}! Great to see you here! 😊",
                "Hey {sender}! What's on your mind?",
            ],
        ),
        CategoryConfig::new(
            "weather",
            &["weather", "sunny", "rain", "cold", "hot"],
            &[
                "I can't check the weather, but I hope it's nice where you are! ☀️",
                "Weather talk, huh? I'm just here in the digital realm! 🌤️",
                "Sounds like weather is on your mind! Stay cozy! 🌈",
            ],
        ),
        CategoryConfig::new(
            "tech",
            &["javascript", "react", "code", "programming", "developer", "tech"],
            &[
                "Ah, a fellow tech enthusiast! 💻 Love talking about development!",
                "Programming is awesome! What are you building? 🚀",
                "Tech talk! I'm made with Rust and WebSockets myself! 🤖",
            ],
        ),
        CategoryConfig::new(
            "emotion",
            &["love", "like", "awesome", "great", "amazing", "wonderful"],
            &[
                "That sounds wonderful! ❤️",
                "I'm glad you're feeling positive! ✨",
                "Positivity is contagious! 🌟",
            ],
        ),
        CategoryConfig::new(
            "question",
            &["how", "what", "why", "when", "where", "?"],
            &[
                "That's a great question! 🤔 What do you think?",
                "Interesting question! I'd love to hear your thoughts on it! 💭",
                "You've got me thinking! Share more about what you mean! 🧠",
            ],
        ),
        CategoryConfig::new(
            "time",
            &["time", "late", "early", "morning", "night", "afternoon"],
            &[
                "It's {time} on my server! ⏰",
                "Time flies when you're having fun chatting! ⏳",
                "Time is just a construct... but yes, I can tell time! 🕐",
            ],
        ),
        CategoryConfig::new(
            "farewell",
            &["bye", "goodbye", "see you", "later", "gtg"],
            &[
                "See you later, {sender}! Take care! 👋",
                "Goodbye! Thanks for the chat! 🌟",
                "Until next time! Have a great day! 😊",
            ],
        ),
    ]
}

fn default_replies() -> Vec<String> {
    [
        "That's interesting! Tell me more! 🤔",
        "I hear you! What else is on your mind? 💭",
        "Thanks for sharing that, {sender}! 😊",
        "Hmm, that's something to think about! 🧐",
        "I appreciate you chatting with me! What else would you like to talk about? 🗣️",
        "That's a unique perspective! 🌟",
        "I'm listening! Please continue! 👂",
        "You're quite thoughtful, {sender}! 💡",
    ]
    .iter()
    .map(|r| r.to_string())
    .collect()
}

impl Default for ResponderConfig {
    fn default() -> Self {
        Self {
            categories: default_categories(),
            default_replies: default_replies(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Path to the log file.
    #[serde(default = "default_log_file")]
    pub file: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_file() -> String {
    "logs/chatrelay.log".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: default_log_file(),
        }
    }
}

/// Chat client configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ClientConfig {
    /// WebSocket URL of the relay.
    #[serde(default = "default_server_url")]
    pub server_url: String,
    /// Number of diagnostic log entries to keep.
    #[serde(default = "default_debug_log_capacity")]
    pub debug_log_capacity: usize,
}

fn default_server_url() -> String {
    "ws://localhost:8000/ws".to_string()
}

fn default_debug_log_capacity() -> usize {
    50
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_url: default_server_url(),
            debug_log_capacity: default_debug_log_capacity(),
        }
    }
}

/// Main configuration structure.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    /// Server configuration.
    #[serde(default)]
    pub server: ServerConfig,
    /// Relay configuration.
    #[serde(default)]
    pub relay: RelayConfig,
    /// Responder configuration.
    #[serde(default)]
    pub responder: ResponderConfig,
    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Client configuration.
    #[serde(default)]
    pub client: ClientConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(RelayError::Io)?;
        Self::parse(&content)
    }

    /// Load configuration from a TOML file and apply environment variable overrides.
    pub fn load_with_env<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(s: &str) -> Result<Self> {
        toml::from_str(s).map_err(|e| RelayError::Config(format!("config parse error: {e}")))
    }

    /// Apply environment variable overrides to the configuration.
    ///
    /// Supported environment variables:
    /// - `CHATRELAY_PORT`: Override the listening port
    /// - `SERVER_URL`: Override the client's relay URL
    pub fn apply_env_overrides(&mut self) {
        if let Ok(port) = std::env::var("CHATRELAY_PORT") {
            match port.parse() {
                Ok(port) => self.server.port = port,
                Err(_) => tracing::warn!(value = %port, "Ignoring invalid CHATRELAY_PORT"),
            }
        }
        if let Ok(url) = std::env::var("SERVER_URL") {
            if !url.is_empty() {
                self.client.server_url = url;
            }
        }
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self
            .server
            .timezone
            .parse::<chrono_tz::Tz>()
            .is_err()
        {
            return Err(RelayError::Validation(format!(
                "unknown timezone: {}",
                self.server.timezone
            )));
        }
        if self.relay.bot_name.trim().is_empty() {
            return Err(RelayError::Validation("bot_name must not be empty".to_string()));
        }
        if self.relay.reply_delay_min_ms > self.relay.reply_delay_max_ms {
            return Err(RelayError::Validation(format!(
                "reply_delay_min_ms ({}) exceeds reply_delay_max_ms ({})",
                self.relay.reply_delay_min_ms, self.relay.reply_delay_max_ms
            )));
        }
        if self.relay.channel_capacity == 0 {
            return Err(RelayError::Validation(
                "channel_capacity must be greater than zero".to_string(),
            ));
        }
        if self.responder.default_replies.is_empty() {
            return Err(RelayError::Validation(
                "responder.default_replies must not be empty".to_string(),
            ));
        }
        for category in &self.responder.categories {
            if category.replies.is_empty() {
                return Err(RelayError::Validation(format!(
                    "responder category '{}' has no replies",
                    category.name
                )));
            }
        }
        Ok(())
    }
}
