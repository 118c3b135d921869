//! Environment-driven configuration.
//!
//! Everything is read once at startup into an explicit [`Config`] that
//! is passed to handlers via shared state, never re-read ambiently.

use std::path::PathBuf;

/// Top-level Quorum configuration.
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub openai: OpenAiConfig,
    pub supabase: Option<SupabaseConfig>,
    pub eventbrite: Option<EventbriteConfig>,
    pub search: Option<SearchConfig>,
    pub trace: TraceConfig,
    pub server: ServerConfig,
    /// Key required by the upload endpoints (`X-Api-Key`).
    pub upload_api_key: Option<String>,
    /// Directory holding prompt files; compiled-in defaults are used
    /// when unset or when a file is missing.
    pub prompt_dir: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub chat_model: String,
    pub embedding_model: String,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://api.openai.com".into(),
            chat_model: "gpt-5-mini".into(),
            embedding_model: "text-embedding-3-small".into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SupabaseConfig {
    pub url: String,
    pub service_key: String,
}

#[derive(Debug, Clone)]
pub struct EventbriteConfig {
    pub api_token: String,
    pub org_id: String,
}

/// External web search API (SearXNG or Brave, detected by URL).
#[derive(Debug, Clone)]
pub struct SearchConfig {
    pub base_url: String,
    pub api_key: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct TraceConfig {
    /// Gates all tracing activity. When false the voice trace
    /// endpoints and chat trace spans become no-ops.
    pub enabled: bool,
    pub public_key: Option<String>,
    pub secret_key: Option<String>,
    pub base_url: String,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind: String,
    pub port: u16,
    /// Trust the first `X-Forwarded-For` address for client identity.
    /// Must stay opt-in: trusting the header on an open network lets
    /// clients spoof their way past the rate limiter.
    pub trust_proxy: bool,
    pub rate_limit: RateLimitConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0".into(),
            port: 8000,
            trust_proxy: false,
            rate_limit: RateLimitConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RateLimitConfig {
    pub requests_per_window: u32,
    pub window_seconds: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests_per_window: 15,
            window_seconds: 60,
        }
    }
}

impl Config {
    /// Load configuration from the process environment.
    pub fn from_env() -> Self {
        let openai = OpenAiConfig {
            api_key: env_opt("OPENAI_API_KEY"),
            base_url: env_or("OPENAI_BASE_URL", "https://api.openai.com"),
            chat_model: env_or("CHAT_MODEL", "gpt-5-mini"),
            embedding_model: env_or("EMBEDDING_MODEL", "text-embedding-3-small"),
        };

        let supabase = match (env_opt("SUPABASE_URL"), env_opt("SUPABASE_SERVICE_KEY")) {
            (Some(url), Some(service_key)) => Some(SupabaseConfig { url, service_key }),
            _ => None,
        };

        let eventbrite = match (env_opt("EVENTBRITE_API_TOKEN"), env_opt("EVENTBRITE_ORG_ID")) {
            (Some(api_token), Some(org_id)) => Some(EventbriteConfig { api_token, org_id }),
            _ => None,
        };

        let search = env_opt("SEARCH_API_URL").map(|base_url| SearchConfig {
            base_url,
            api_key: env_opt("SEARCH_API_KEY"),
        });

        let trace = TraceConfig {
            enabled: env_bool("TRACE_ENABLED", false),
            public_key: env_opt("TRACE_PUBLIC_KEY"),
            secret_key: env_opt("TRACE_SECRET_KEY"),
            base_url: env_or("TRACE_BASE_URL", "https://us.cloud.langfuse.com"),
        };

        let server = ServerConfig {
            bind: env_or("BIND_ADDR", "0.0.0.0"),
            port: env_parse("PORT", 8000),
            trust_proxy: env_bool("TRUST_PROXY", false),
            rate_limit: RateLimitConfig {
                requests_per_window: env_parse("RATE_LIMIT_REQUESTS", 15),
                window_seconds: env_parse("RATE_LIMIT_WINDOW_SECS", 60),
            },
        };

        Self {
            openai,
            supabase,
            eventbrite,
            search,
            trace,
            server,
            upload_api_key: env_opt("UPLOAD_API_KEY"),
            prompt_dir: env_opt("PROMPT_DIR").map(PathBuf::from),
        }
    }
}

fn env_opt(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

fn env_or(name: &str, default: &str) -> String {
    env_opt(name).unwrap_or_else(|| default.to_string())
}

fn env_bool(name: &str, default: bool) -> bool {
    match env_opt(name) {
        Some(v) => matches!(v.to_lowercase().as_str(), "true" | "1" | "yes"),
        None => default,
    }
}

fn env_parse<T: std::str::FromStr + Copy>(name: &str, default: T) -> T {
    env_opt(name)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.server.rate_limit.requests_per_window, 15);
        assert_eq!(config.server.rate_limit.window_seconds, 60);
        assert!(!config.server.trust_proxy);
        assert!(!config.trace.enabled);
        assert_eq!(config.openai.chat_model, "gpt-5-mini");
    }

    #[test]
    fn test_env_bool_parsing() {
        std::env::set_var("QUORUM_TEST_BOOL", "TRUE");
        assert!(env_bool("QUORUM_TEST_BOOL", false));
        std::env::set_var("QUORUM_TEST_BOOL", "0");
        assert!(!env_bool("QUORUM_TEST_BOOL", true));
        std::env::remove_var("QUORUM_TEST_BOOL");
        assert!(env_bool("QUORUM_TEST_BOOL", true));
    }
}
