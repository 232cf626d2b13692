use std::time::Duration;

use anyhow::Context;
use clap::Args;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing_subscriber::EnvFilter;

use crate::error::LlmError;
use crate::llm::HttpInterpreter;

const DEFAULT_LOG_FILTER: &str = "info,sqlx=warn";

#[derive(Debug, Clone, Args)]
pub struct DatabaseArgs {
    /// Postgres connection string
    #[arg(long, env = "DATABASE_URL", global = true, hide_env_values = true)]
    pub database_url: Option<String>,

    #[arg(long, env = "DB_MAX_CONNECTIONS", default_value_t = 5, global = true)]
    pub max_connections: u32,
}

impl DatabaseArgs {
    pub async fn connect(&self) -> anyhow::Result<PgPool> {
        let database_url = self
            .database_url
            .as_deref()
            .context("DATABASE_URL must be set to a Postgres instance")?;

        PgPoolOptions::new()
            .max_connections(self.max_connections)
            .acquire_timeout(Duration::from_secs(10))
            .connect(database_url)
            .await
            .context("failed to connect to Postgres")
    }
}

#[derive(Debug, Clone, Args)]
pub struct LlmArgs {
    /// Natural-language query endpoint (text in, JSON out)
    #[arg(long = "llm-endpoint", env = "VOTER_LLM_ENDPOINT", global = true)]
    pub endpoint: Option<String>,

    #[arg(long = "llm-api-key", env = "VOTER_LLM_API_KEY", global = true, hide_env_values = true)]
    pub api_key: Option<String>,

    #[arg(long = "llm-model", env = "VOTER_LLM_MODEL", default_value = "gpt-4o-mini", global = true)]
    pub model: String,
}

impl LlmArgs {
    pub fn interpreter(&self) -> Result<HttpInterpreter, LlmError> {
        let endpoint = self.endpoint.clone().ok_or(LlmError::NotConfigured)?;
        HttpInterpreter::new(endpoint, self.api_key.clone(), self.model.clone())
    }
}

#[derive(Debug, Clone, Args)]
pub struct DiagnosticsArgs {
    /// Seconds during which an identical error is logged only once
    #[arg(long, env = "VOTER_LOG_DEDUP_SECS", default_value_t = 60, global = true)]
    pub log_dedup_secs: u64,
}

impl DiagnosticsArgs {
    pub fn dedup_window(&self) -> Duration {
        Duration::from_secs(self.log_dedup_secs)
    }
}

/// Logs go to stderr so command output on stdout stays machine-readable.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interpreter_requires_an_endpoint() {
        let args = LlmArgs {
            endpoint: None,
            api_key: None,
            model: "gpt-4o-mini".to_string(),
        };
        assert!(matches!(args.interpreter(), Err(LlmError::NotConfigured)));
    }

    #[test]
    fn default_log_filter_parses() {
        assert!(EnvFilter::try_new(DEFAULT_LOG_FILTER).is_ok());
    }

    #[tokio::test]
    async fn connect_without_url_fails_with_hint() {
        let args = DatabaseArgs {
            database_url: None,
            max_connections: 1,
        };
        let err = args.connect().await.unwrap_err();
        assert!(err.to_string().contains("DATABASE_URL"));
    }
}
