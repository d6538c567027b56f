//! Runtime configuration
//!
//! Every setting comes from a flag or its environment variable (after
//! `.env` is loaded by the binary). Values are trimmed: hosted env settings
//! often carry stray whitespace or newlines.

use std::fmt::Display;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use clap::{ArgAction, Parser};
use delayed_jobs::{PushConfig, RedisRestConfig};
use dialogue_core::{Dialogue, EngineConfig};
use result_exporter::MailConfig;
use telegram_client::TelegramConfig;
use thiserror::Error;

pub const DISPATCH_PATH: &str = "/dispatch-delayed";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required configuration: {}", .0.join(", "))]
    Missing(Vec<&'static str>),
}

fn trimmed(value: &str) -> Result<String, String> {
    Ok(value.trim().to_string())
}

fn parse_trimmed<T>(value: &str) -> Result<T, String>
where
    T: FromStr,
    T::Err: Display,
{
    value
        .trim()
        .parse()
        .map_err(|e: T::Err| format!("invalid value '{}': {}", value.trim(), e))
}

fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|value| !value.is_empty())
}

#[derive(Parser, Debug, Clone)]
#[command(name = "survey-bot")]
#[command(about = "Survey bot webhook server")]
#[command(version)]
pub struct AppConfig {
    /// Bot API token
    #[arg(long, env = "BOT_TOKEN", value_parser = trimmed, hide_env_values = true)]
    pub bot_token: Option<String>,

    /// Mailbox that receives the result spreadsheets
    #[arg(long, env = "RECIPIENT_EMAIL", value_parser = trimmed)]
    pub recipient_email: Option<String>,

    #[arg(long, env = "SMTP_HOST", default_value = "smtp.yandex.ru", value_parser = trimmed)]
    pub smtp_host: String,

    /// Primary SMTP port; 465 means implicit TLS, anything else STARTTLS
    #[arg(long, env = "SMTP_PORT", default_value = "465", value_parser = parse_trimmed::<u16>)]
    pub smtp_port: u16,

    /// SMTP login, also used as the sender address
    #[arg(long, env = "SMTP_USER", value_parser = trimmed)]
    pub smtp_user: Option<String>,

    #[arg(long, env = "SMTP_PASS", value_parser = trimmed, hide_env_values = true)]
    pub smtp_pass: Option<String>,

    /// STARTTLS port for the single retry
    #[arg(long, env = "SMTP_FALLBACK_PORT", default_value = "587", value_parser = parse_trimmed::<u16>)]
    pub smtp_fallback_port: u16,

    #[arg(long, env = "TELEGRAM_API_BASE", default_value = telegram_client::DEFAULT_API_BASE, value_parser = trimmed)]
    pub telegram_api_base: String,

    /// Push-schedule service token; enables push scheduling together with
    /// PUBLIC_BASE_URL
    #[arg(long, env = "QSTASH_TOKEN", value_parser = trimmed, hide_env_values = true)]
    pub qstash_token: Option<String>,

    #[arg(long, env = "QSTASH_URL", default_value = delayed_jobs::push::DEFAULT_PUSH_BASE_URL, value_parser = trimmed)]
    pub qstash_url: String,

    /// Public URL of this service, used as the push callback base
    #[arg(long, env = "PUBLIC_BASE_URL", value_parser = trimmed)]
    pub public_base_url: Option<String>,

    #[arg(long, env = "UPSTASH_REDIS_REST_URL", value_parser = trimmed)]
    pub redis_rest_url: Option<String>,

    #[arg(long, env = "UPSTASH_REDIS_REST_TOKEN", value_parser = trimmed, hide_env_values = true)]
    pub redis_rest_token: Option<String>,

    /// Delay of the post-diagnosis follow-up in seconds; 0 shows the prompt
    /// inline instead
    #[arg(long, env = "FOLLOW_UP_DELAY_SECS", default_value = "0", value_parser = parse_trimmed::<u64>)]
    pub follow_up_delay_secs: u64,

    /// Drain the delayed-job queue in-process every N seconds; 0 disables
    #[arg(long, env = "POLL_INTERVAL_SECS", default_value = "0", value_parser = parse_trimmed::<u64>)]
    pub poll_interval_secs: u64,

    /// TOML dialogue definition replacing the built-in one
    #[arg(long, env = "DIALOGUE_PATH")]
    pub dialogue_path: Option<PathBuf>,

    /// Put the branch key into answer button payloads
    #[arg(long, env = "EMBED_BRANCH_IN_PAYLOAD", default_value = "false", action = ArgAction::Set, value_parser = parse_trimmed::<bool>)]
    pub embed_branch_in_payload: bool,

    #[arg(long, env = "APP_PORT", default_value = "8080", value_parser = parse_trimmed::<u16>)]
    pub port: u16,
}

impl AppConfig {
    /// All required settings are present and non-empty.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let missing: Vec<&'static str> = [
            ("BOT_TOKEN", &self.bot_token),
            ("RECIPIENT_EMAIL", &self.recipient_email),
            ("SMTP_USER", &self.smtp_user),
            ("SMTP_PASS", &self.smtp_pass),
        ]
        .into_iter()
        .filter(|(_, value)| present(value).is_none())
        .map(|(name, _)| name)
        .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Missing(missing))
        }
    }

    pub fn telegram_config(&self) -> TelegramConfig {
        TelegramConfig::new(present(&self.bot_token).unwrap_or_default())
            .with_api_base(&self.telegram_api_base)
    }

    pub fn mail_config(&self) -> MailConfig {
        MailConfig {
            host: self.smtp_host.clone(),
            port: self.smtp_port,
            fallback_port: self.smtp_fallback_port,
            user: present(&self.smtp_user).unwrap_or_default().to_string(),
            password: present(&self.smtp_pass).unwrap_or_default().to_string(),
            recipient: present(&self.recipient_email).unwrap_or_default().to_string(),
        }
    }

    /// Push scheduling needs both a token and a public callback URL.
    pub fn push_config(&self) -> Option<PushConfig> {
        let token = present(&self.qstash_token)?;
        let base = present(&self.public_base_url)?;
        Some(PushConfig {
            base_url: self.qstash_url.clone(),
            token: token.to_string(),
            destination: format!("{}{}", base.trim_end_matches('/'), DISPATCH_PATH),
        })
    }

    pub fn redis_config(&self) -> Option<RedisRestConfig> {
        Some(RedisRestConfig {
            url: present(&self.redis_rest_url)?.to_string(),
            token: present(&self.redis_rest_token)?.to_string(),
        })
    }

    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            follow_up_delay: (self.follow_up_delay_secs > 0)
                .then(|| Duration::from_secs(self.follow_up_delay_secs)),
            embed_branch_in_payload: self.embed_branch_in_payload,
        }
    }

    pub fn poll_interval(&self) -> Option<Duration> {
        (self.poll_interval_secs > 0).then(|| Duration::from_secs(self.poll_interval_secs))
    }

    pub fn load_dialogue(&self) -> dialogue_core::Result<Dialogue> {
        match &self.dialogue_path {
            Some(path) => Dialogue::load(path),
            None => Dialogue::builtin(),
        }
    }
}
