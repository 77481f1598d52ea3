use std::collections::HashMap;

use anyhow::{bail, Context, Result};

/// Application configuration loaded from environment variables.
///
/// Agent service settings are optional at startup: the server still serves
/// status and static routes without them, but runs cannot start.
#[derive(Debug, Clone)]
pub struct Config {
    pub agent_endpoint: Option<String>,
    pub model_deployment: Option<String>,
    pub agent_api_key: Option<String>,
    /// Hosted identifiers keyed by agent name, from `AGENT_IDS=name=id,name=id`.
    pub agent_ids: HashMap<String, String>,
    pub playground_url_prefix: Option<String>,
    pub max_rounds: u32,
    pub ui_dir: String,
    pub port: u16,
    pub rust_log: String,
}

/// The subset of configuration required to reach the agent-hosting service.
#[derive(Debug, Clone)]
pub struct AgentServiceConfig {
    pub endpoint: String,
    pub model_deployment: String,
    pub api_key: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        let max_rounds = std::env::var("MAX_ROUNDS")
            .unwrap_or_else(|_| "10".to_string())
            .parse::<u32>()
            .context("MAX_ROUNDS must be a positive integer")?;
        if max_rounds == 0 {
            bail!("MAX_ROUNDS must be greater than zero");
        }

        Ok(Config {
            agent_endpoint: optional_env("AGENT_ENDPOINT"),
            model_deployment: optional_env("AGENT_MODEL_DEPLOYMENT_NAME"),
            agent_api_key: optional_env("AGENT_API_KEY"),
            agent_ids: parse_agent_ids(&optional_env("AGENT_IDS").unwrap_or_default())?,
            playground_url_prefix: optional_env("PLAYGROUND_URL_PREFIX"),
            max_rounds,
            ui_dir: std::env::var("UI_DIR").unwrap_or_else(|_| "ui".to_string()),
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "5000".to_string())
                .parse::<u16>()
                .context("PORT must be a valid port number")?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
        })
    }

    /// Returns the agent service settings, or the name of the first missing variable.
    pub fn agent_service(&self) -> Result<AgentServiceConfig, String> {
        let endpoint = self
            .agent_endpoint
            .clone()
            .ok_or_else(|| "Environment variable 'AGENT_ENDPOINT' is not set".to_string())?;
        let model_deployment = self.model_deployment.clone().ok_or_else(|| {
            "Environment variable 'AGENT_MODEL_DEPLOYMENT_NAME' is not set".to_string()
        })?;

        Ok(AgentServiceConfig {
            endpoint,
            model_deployment,
            api_key: self.agent_api_key.clone(),
        })
    }

    /// Playground link for a hosted agent, when both a prefix and an id are known.
    pub fn playground_url(&self, agent_id: Option<&str>) -> Option<String> {
        match (&self.playground_url_prefix, agent_id) {
            (Some(prefix), Some(id)) => Some(format!("{prefix}{id}")),
            _ => None,
        }
    }
}

/// Empty values count as unset.
fn optional_env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_agent_ids(raw: &str) -> Result<HashMap<String, String>> {
    let mut ids = HashMap::new();
    for pair in raw.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let (name, id) = pair
            .split_once('=')
            .with_context(|| format!("AGENT_IDS entry '{pair}' must look like name=id"))?;
        ids.insert(name.trim().to_string(), id.trim().to_string());
    }
    Ok(ids)
}

#[cfg(test)]
impl Config {
    /// Configuration for tests: no agent service, no network.
    pub fn for_tests() -> Self {
        Config {
            agent_endpoint: None,
            model_deployment: None,
            agent_api_key: None,
            agent_ids: HashMap::new(),
            playground_url_prefix: None,
            max_rounds: 10,
            ui_dir: "ui".to_string(),
            port: 5000,
            rust_log: "info".to_string(),
        }
    }
}
