//! Server Configuration
//!
//! All runtime knobs come in through CLI flags with environment-variable
//! fallbacks via clap. The only secret is the Gemini API key, which is
//! env-only so it never lands in shell history.

use std::path::PathBuf;

use clap::Parser;

/// Predictive maintenance assistant server.
#[derive(Parser, Debug, Clone)]
#[command(name = "failsight")]
#[command(about = "Conversational predictive-maintenance assistant")]
#[command(version)]
pub struct ServerConfig {
    /// HTTP server bind address
    #[arg(long, env = "FAILSIGHT_ADDR", default_value = "0.0.0.0:8000")]
    pub addr: String,

    /// Directory holding the trained model artifacts
    #[arg(long, env = "FAILSIGHT_MODELS_DIR", default_value = "models")]
    pub models_dir: PathBuf,

    /// Cleaned dataset CSV used for summaries and distribution plots
    #[arg(
        long,
        env = "FAILSIGHT_DATA_CSV",
        default_value = "data/predictive_maintenance_cleaned.csv"
    )]
    pub data_csv: PathBuf,

    /// Directory generated plot images are written to and served from
    #[arg(long, env = "FAILSIGHT_STATIC_DIR", default_value = "static")]
    pub static_dir: PathBuf,

    /// Public base URL clients can reach this server at, used to build
    /// image links in tool results
    #[arg(long, env = "FAILSIGHT_BASE_URL", default_value = "http://localhost:8000")]
    pub base_url: String,

    /// Gemini API key
    #[arg(long, env = "GEMINI_API_KEY", hide_env_values = true)]
    pub gemini_api_key: String,

    /// Gemini model name
    #[arg(long, env = "FAILSIGHT_MODEL", default_value = "gemini-2.0-flash")]
    pub model: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config =
            ServerConfig::try_parse_from(["failsight", "--gemini-api-key", "test-key"]).unwrap();
        assert_eq!(config.addr, "0.0.0.0:8000");
        assert_eq!(config.models_dir, PathBuf::from("models"));
        assert_eq!(config.base_url, "http://localhost:8000");
        assert_eq!(config.gemini_api_key, "test-key");
    }

    #[test]
    fn test_flag_overrides() {
        let config = ServerConfig::try_parse_from([
            "failsight",
            "--gemini-api-key",
            "key",
            "--addr",
            "127.0.0.1:9000",
            "--model",
            "gemini-exp",
        ])
        .unwrap();
        assert_eq!(config.addr, "127.0.0.1:9000");
        assert_eq!(config.model, "gemini-exp");
    }
}
