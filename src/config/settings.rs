// * Process settings, read once at startup from flags or the environment

use std::fmt;
use std::time::Duration;

use clap::{Parser, ValueEnum, ValueHint};
use thiserror::Error;
use url::Url;

use crate::config::constants::{
    DEFAULT_EXPORTER_PORT, DEFAULT_FETCH_INTERVAL_SECS, DEFAULT_PASSWORD_SELECTOR,
    DEFAULT_SUBMIT_SELECTOR, DEFAULT_USERNAME_SELECTOR,
};
use crate::network::browser::{BrowserConfig, LoginForm};
use crate::ops::alerting::TelegramConfig;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SettingsError {
    #[error("{0} must not be empty")]
    Empty(&'static str),

    #[error("Telegram alerting needs both a bot token and a chat id")]
    IncompleteTelegram,
}

/// Output format of the log subscriber
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    /// One JSON object per line, for log shippers
    Json,
    /// Multi-line human readable output, for development
    Pretty,
}

/// Scrapes upload/download totals from a tracker profile page and exports them to Prometheus.
#[derive(Parser, Clone)]
#[command(version, about, long_about = None)]
pub struct Settings {
    /// Account name used on the login form
    #[arg(long, env = "USERNAME")]
    pub username: String,

    /// Account password used on the login form
    #[arg(long, env = "PASSWORD", hide_env_values = true)]
    pub password: String,

    /// Landing page holding the login form
    #[arg(long, env = "MAIN_URL", value_hint = ValueHint::Url)]
    pub main_url: Url,

    /// Page showing the traffic totals once logged in
    #[arg(long, env = "PROFILE_URL", value_hint = ValueHint::Url)]
    pub profile_url: Url,

    /// CSS selector of the element holding the download total
    #[arg(long, env = "DL_SELECTOR")]
    pub dl_selector: String,

    /// CSS selector of the element holding the upload total
    #[arg(long, env = "UL_SELECTOR")]
    pub ul_selector: String,

    /// CSS selector of the login form's username field
    #[arg(long, env = "USERNAME_SELECTOR", default_value = DEFAULT_USERNAME_SELECTOR)]
    pub username_selector: String,

    /// CSS selector of the login form's password field
    #[arg(long, env = "PASSWORD_SELECTOR", default_value = DEFAULT_PASSWORD_SELECTOR)]
    pub password_selector: String,

    /// CSS selector of the login form's submit control
    #[arg(long, env = "SUBMIT_SELECTOR", default_value = DEFAULT_SUBMIT_SELECTOR)]
    pub submit_selector: String,

    /// Port of the Prometheus exporter
    #[arg(long, env = "EXPORTER_PORT", default_value_t = DEFAULT_EXPORTER_PORT)]
    pub exporter_port: u16,

    /// Seconds between two samples
    #[arg(
        long,
        env = "FETCH_INTERVAL",
        default_value_t = DEFAULT_FETCH_INTERVAL_SECS,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub fetch_interval: u64,

    /// Telegram bot token used for failure alerts
    #[arg(long, env = "TELEGRAM_BOT_TOKEN", hide_env_values = true)]
    pub telegram_bot_token: Option<String>,

    /// Telegram chat receiving failure alerts
    #[arg(long, env = "TELEGRAM_CHAT_ID")]
    pub telegram_chat_id: Option<String>,

    /// Log level, overridden by RUST_LOG when set
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Log output format
    #[arg(long, env = "LOG_FORMAT", value_enum, default_value_t = LogFormat::Json)]
    pub log_format: LogFormat,

    /// Run the browser with a visible window
    #[arg(long, env = "HEADFUL")]
    pub headful: bool,
}

impl Settings {
    /// Rejects values clap accepts but the exporter cannot work with
    pub fn validate(&self) -> Result<(), SettingsError> {
        let required = [
            ("username", &self.username),
            ("password", &self.password),
            ("dl_selector", &self.dl_selector),
            ("ul_selector", &self.ul_selector),
            ("username_selector", &self.username_selector),
            ("password_selector", &self.password_selector),
            ("submit_selector", &self.submit_selector),
        ];
        for (name, value) in required {
            if value.trim().is_empty() {
                return Err(SettingsError::Empty(name));
            }
        }

        match (&self.telegram_bot_token, &self.telegram_chat_id) {
            (Some(_), None) | (None, Some(_)) => Err(SettingsError::IncompleteTelegram),
            _ => Ok(()),
        }
    }

    pub fn fetch_interval(&self) -> Duration {
        Duration::from_secs(self.fetch_interval)
    }

    /// Telegram target, when both halves of the credentials are present
    pub fn telegram(&self) -> Option<TelegramConfig> {
        match (&self.telegram_bot_token, &self.telegram_chat_id) {
            (Some(token), Some(chat)) if !token.is_empty() && !chat.is_empty() => {
                Some(TelegramConfig::new(token.clone(), chat.clone()))
            }
            _ => None,
        }
    }

    pub fn browser_config(&self) -> BrowserConfig {
        BrowserConfig {
            main_url: self.main_url.clone(),
            profile_url: self.profile_url.clone(),
            username: self.username.clone(),
            password: self.password.clone(),
            login_form: LoginForm {
                username_selector: self.username_selector.clone(),
                password_selector: self.password_selector.clone(),
                submit_selector: self.submit_selector.clone(),
            },
            download_selector: self.dl_selector.clone(),
            upload_selector: self.ul_selector.clone(),
            headless: !self.headful,
        }
    }
}

// * Manual impl keeps secrets out of logs
impl fmt::Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settings")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("main_url", &self.main_url.as_str())
            .field("profile_url", &self.profile_url.as_str())
            .field("dl_selector", &self.dl_selector)
            .field("ul_selector", &self.ul_selector)
            .field("exporter_port", &self.exporter_port)
            .field("fetch_interval", &self.fetch_interval)
            .field("telegram", &self.telegram_chat_id.is_some())
            .field("log_level", &self.log_level)
            .field("log_format", &self.log_format)
            .field("headful", &self.headful)
            .finish()
    }
}
