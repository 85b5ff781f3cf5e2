//! Runtime configuration read from the environment.

use anyhow::{anyhow, Context, Result};
use std::collections::HashSet;
use std::env;

const DEFAULT_API_BASE: &str = "https://api.openai.com/v1";
const DEFAULT_MODEL: &str = "gpt-4o-mini";

/// Settings of the OpenAI-compatible extraction endpoint
#[derive(Debug, Clone)]
pub struct ExtractionConfig {
    pub api_key: String,
    pub api_base: String,
    pub model: String,
}

impl ExtractionConfig {
    pub fn from_env() -> Result<Self> {
        let api_key = env::var("LLM_API_KEY")
            .map_err(|_| anyhow!("LLM_API_KEY environment variable not set"))?;

        Ok(Self {
            api_key,
            api_base: env::var("LLM_API_BASE").unwrap_or_else(|_| DEFAULT_API_BASE.to_string()),
            model: env::var("LLM_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string()),
        })
    }
}

/// Which Telegram users may talk to the bot. An empty allow-list admits everyone.
#[derive(Debug, Clone, Default)]
pub struct AccessPolicy {
    allowed: HashSet<i64>,
}

impl AccessPolicy {
    pub fn allow_all() -> Self {
        Self::default()
    }

    pub fn only(ids: impl IntoIterator<Item = i64>) -> Self {
        Self {
            allowed: ids.into_iter().collect(),
        }
    }

    /// Parse a comma-separated list of user ids, ignoring blanks
    pub fn parse(list: &str) -> Result<Self> {
        let ids = list
            .split(',')
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(|id| {
                id.parse::<i64>()
                    .with_context(|| format!("Invalid user id in ALLOWED_USERS: {id}"))
            })
            .collect::<Result<HashSet<_>>>()?;

        Ok(Self { allowed: ids })
    }

    pub fn is_allowed(&self, user_id: i64) -> bool {
        self.allowed.is_empty() || self.allowed.contains(&user_id)
    }
}

#[derive(Debug, Clone)]
pub struct BotConfig {
    pub bot_token: String,
    /// In-memory storage when unset
    pub database_url: Option<String>,
    pub access: AccessPolicy,
    pub extraction: ExtractionConfig,
}

impl BotConfig {
    pub fn from_env() -> Result<Self> {
        let bot_token = env::var("TELEGRAM_BOT_TOKEN")
            .map_err(|_| anyhow!("TELEGRAM_BOT_TOKEN must be set"))?;

        let database_url = env::var("DATABASE_URL").ok().filter(|url| !url.trim().is_empty());

        let access = match env::var("ALLOWED_USERS") {
            Ok(list) => AccessPolicy::parse(&list)?,
            Err(_) => AccessPolicy::allow_all(),
        };

        Ok(Self {
            bot_token,
            database_url,
            access,
            extraction: ExtractionConfig::from_env()?,
        })
    }
}
