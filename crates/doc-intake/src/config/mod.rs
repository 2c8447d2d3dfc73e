use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

/// Distinguishes runtime behavior for different stages of the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Test,
    Production,
}

impl AppEnvironment {
    fn from_str(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "prod" | "production" => Self::Production,
            "test" | "ci" => Self::Test,
            _ => Self::Development,
        }
    }
}

/// Top-level configuration for the application.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub intake: IntakeConfig,
    pub ocr: OcrConfig,
    pub ai: AiConfig,
}

pub const DEFAULT_MAX_UPLOAD_BYTES: u64 = 10 * 1024 * 1024;
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-1.5-pro";
pub const DEFAULT_GEMINI_ENDPOINT: &str = "https://generativelanguage.googleapis.com/v1beta";

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(
            &env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
        );

        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort)?;

        let log_level = env::var("APP_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
        let log_format = LogFormat::from_str(
            &env::var("APP_LOG_FORMAT").unwrap_or_else(|_| "compact".to_string()),
        );

        let max_upload_bytes = parse_var("INTAKE_MAX_UPLOAD_BYTES", DEFAULT_MAX_UPLOAD_BYTES)?;
        if max_upload_bytes == 0 {
            return Err(ConfigError::InvalidNumber {
                variable: "INTAKE_MAX_UPLOAD_BYTES",
            });
        }
        let scratch_root = env::var("INTAKE_SCRATCH_DIR")
            .ok()
            .filter(|value| !value.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| env::temp_dir().join("doc-intake"));
        let request_timeout = parse_timeout("INTAKE_REQUEST_TIMEOUT_SECS", 120)?;

        let tesseract_path =
            env::var("OCR_TESSERACT_PATH").unwrap_or_else(|_| "tesseract".to_string());
        let language = env::var("OCR_LANGUAGE").unwrap_or_else(|_| "eng".to_string());
        let default_parallelism = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(2);
        let max_concurrency = parse_var("OCR_MAX_CONCURRENCY", default_parallelism)?.max(1);

        let api_key = env::var("GOOGLE_GEMINI_API")
            .ok()
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty());
        let model = env::var("GEMINI_MODEL").unwrap_or_else(|_| DEFAULT_GEMINI_MODEL.to_string());
        let endpoint =
            env::var("GEMINI_ENDPOINT").unwrap_or_else(|_| DEFAULT_GEMINI_ENDPOINT.to_string());
        let timeout = parse_timeout("AI_TIMEOUT_SECS", 60)?;
        let unavailable_policy = match env::var("AI_UNAVAILABLE_POLICY") {
            Ok(raw) => AiUnavailablePolicy::parse(&raw)?,
            Err(_) => AiUnavailablePolicy::Degrade,
        };

        let ai = AiConfig {
            api_key,
            model,
            endpoint,
            timeout,
            unavailable_policy,
        };
        ai.check()?;

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig {
                log_level,
                log_format,
            },
            intake: IntakeConfig {
                max_upload_bytes,
                scratch_root,
                request_timeout,
            },
            ocr: OcrConfig {
                tesseract_path,
                language,
                max_concurrency,
            },
            ai,
        })
    }
}

fn parse_var<T: std::str::FromStr>(variable: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(variable) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|_| ConfigError::InvalidNumber { variable }),
        Err(_) => Ok(default),
    }
}

/// Whole seconds, at least one.
fn parse_timeout(variable: &'static str, default: u64) -> Result<Duration, ConfigError> {
    match parse_var(variable, default)? {
        0 => Err(ConfigError::InvalidNumber { variable }),
        secs => Ok(Duration::from_secs(secs)),
    }
}

/// Settings controlling the HTTP server binding.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        if self.host.eq_ignore_ascii_case("localhost") {
            return Ok(SocketAddr::new(IpAddr::from([127, 0, 0, 1]), self.port));
        }

        let ip: IpAddr = self
            .host
            .parse()
            .map_err(|source| ConfigError::InvalidHost { source })?;

        Ok(SocketAddr::new(ip, self.port))
    }
}

/// Tracing and metrics controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
    pub log_format: LogFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Compact,
    Json,
}

impl LogFormat {
    fn from_str(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "json" => Self::Json,
            _ => Self::Compact,
        }
    }
}

/// Upload limits and per-request resource bounds.
#[derive(Debug, Clone)]
pub struct IntakeConfig {
    pub max_upload_bytes: u64,
    pub scratch_root: PathBuf,
    pub request_timeout: Duration,
}

impl Default for IntakeConfig {
    fn default() -> Self {
        Self {
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            scratch_root: env::temp_dir().join("doc-intake"),
            request_timeout: Duration::from_secs(120),
        }
    }
}

#[derive(Debug, Clone)]
pub struct OcrConfig {
    pub tesseract_path: String,
    pub language: String,
    pub max_concurrency: usize,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            tesseract_path: "tesseract".to_string(),
            language: "eng".to_string(),
            max_concurrency: 2,
        }
    }
}

/// What an `ai` request does when the vision service cannot be used at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AiUnavailablePolicy {
    /// Answer with parser text only and leave `aiText` empty.
    Degrade,
    /// Refuse to start without a credential and fail the request when the
    /// upstream rejects it.
    Require,
}

impl AiUnavailablePolicy {
    fn parse(raw: &str) -> Result<Self, ConfigError> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "degrade" | "" => Ok(Self::Degrade),
            "require" | "required" | "fail" => Ok(Self::Require),
            _ => Err(ConfigError::InvalidPolicy {
                value: raw.to_string(),
            }),
        }
    }
}

/// Remote vision model settings.
#[derive(Clone)]
pub struct AiConfig {
    pub api_key: Option<String>,
    pub model: String,
    pub endpoint: String,
    pub timeout: Duration,
    pub unavailable_policy: AiUnavailablePolicy,
}

impl AiConfig {
    fn check(&self) -> Result<(), ConfigError> {
        if self.unavailable_policy == AiUnavailablePolicy::Require && self.api_key.is_none() {
            return Err(ConfigError::MissingAiCredential);
        }
        Ok(())
    }
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: DEFAULT_GEMINI_MODEL.to_string(),
            endpoint: DEFAULT_GEMINI_ENDPOINT.to_string(),
            timeout: Duration::from_secs(60),
            unavailable_policy: AiUnavailablePolicy::Degrade,
        }
    }
}

impl fmt::Debug for AiConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AiConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("model", &self.model)
            .field("endpoint", &self.endpoint)
            .field("timeout", &self.timeout)
            .field("unavailable_policy", &self.unavailable_policy)
            .finish()
    }
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidNumber { variable: &'static str },
    InvalidPolicy { value: String },
    MissingAiCredential,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidNumber { variable } => {
                write!(f, "{variable} must be a positive integer")
            }
            ConfigError::InvalidPolicy { value } => write!(
                f,
                "AI_UNAVAILABLE_POLICY must be 'degrade' or 'require' (found '{value}')"
            ),
            ConfigError::MissingAiCredential => write!(
                f,
                "GOOGLE_GEMINI_API is required when AI_UNAVAILABLE_POLICY=require"
            ),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidHost { source } => Some(source),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::{Mutex, OnceLock};

    fn env_guard() -> &'static Mutex<()> {
        static GUARD: OnceLock<Mutex<()>> = OnceLock::new();
        GUARD.get_or_init(|| Mutex::new(()))
    }

    fn reset_env() {
        for variable in [
            "APP_ENV",
            "APP_HOST",
            "APP_PORT",
            "APP_LOG_LEVEL",
            "APP_LOG_FORMAT",
            "INTAKE_MAX_UPLOAD_BYTES",
            "INTAKE_SCRATCH_DIR",
            "INTAKE_REQUEST_TIMEOUT_SECS",
            "OCR_TESSERACT_PATH",
            "OCR_LANGUAGE",
            "OCR_MAX_CONCURRENCY",
            "GOOGLE_GEMINI_API",
            "GEMINI_MODEL",
            "GEMINI_ENDPOINT",
            "AI_TIMEOUT_SECS",
            "AI_UNAVAILABLE_POLICY",
        ] {
            env::remove_var(variable);
        }
    }

    #[test]
    fn load_uses_defaults_when_env_missing() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        let config = AppConfig::load().expect("config loads with defaults");
        assert_eq!(config.environment, AppEnvironment::Development);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.telemetry.log_level, "info");
        assert_eq!(config.telemetry.log_format, LogFormat::Compact);
        assert_eq!(config.intake.max_upload_bytes, 10 * 1024 * 1024);
        assert_eq!(config.ocr.language, "eng");
        assert!(config.ai.api_key.is_none());
        assert_eq!(config.ai.unavailable_policy, AiUnavailablePolicy::Degrade);
    }

    #[test]
    fn accepts_localhost_host() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("APP_HOST", "localhost");
        let config = AppConfig::load().expect("config loads");
        let addr = config.server.socket_addr().expect("localhost resolves");
        assert_eq!(addr, SocketAddr::new(IpAddr::from([127, 0, 0, 1]), 3000));
    }

    #[test]
    fn require_policy_without_credential_is_rejected() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("AI_UNAVAILABLE_POLICY", "require");
        let err = AppConfig::load().expect_err("credential required");
        assert!(matches!(err, ConfigError::MissingAiCredential));

        env::set_var("GOOGLE_GEMINI_API", "secret-key");
        let config = AppConfig::load().expect("config loads with credential");
        assert_eq!(config.ai.unavailable_policy, AiUnavailablePolicy::Require);
        reset_env();
    }

    #[test]
    fn rejects_zero_limits_and_bad_policy() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("INTAKE_MAX_UPLOAD_BYTES", "0");
        assert!(matches!(
            AppConfig::load(),
            Err(ConfigError::InvalidNumber {
                variable: "INTAKE_MAX_UPLOAD_BYTES"
            })
        ));

        reset_env();
        env::set_var("INTAKE_REQUEST_TIMEOUT_SECS", "0");
        assert!(matches!(
            AppConfig::load(),
            Err(ConfigError::InvalidNumber {
                variable: "INTAKE_REQUEST_TIMEOUT_SECS"
            })
        ));

        reset_env();
        env::set_var("AI_TIMEOUT_SECS", "0");
        assert!(matches!(
            AppConfig::load(),
            Err(ConfigError::InvalidNumber {
                variable: "AI_TIMEOUT_SECS"
            })
        ));

        reset_env();
        env::set_var("AI_UNAVAILABLE_POLICY", "sometimes");
        assert!(matches!(
            AppConfig::load(),
            Err(ConfigError::InvalidPolicy { .. })
        ));
        reset_env();
    }

    #[test]
    fn debug_output_redacts_credential() {
        let config = AiConfig {
            api_key: Some("super-secret".to_string()),
            ..AiConfig::default()
        };
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("super-secret"));
        assert!(rendered.contains("<redacted>"));
    }
}
