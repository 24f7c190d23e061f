//! Configuration management

use chrono::NaiveTime;
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::application::errors::ConfigError;
use crate::application::services::DailyTrigger;
use crate::domain::entities::ChatId;

/// Bot configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct Config {
    pub bot: BotConfig,
    pub telegram: TelegramConfig,
    pub database: DatabaseConfig,
    pub broadcast: BroadcastConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct BotConfig {
    pub name: String,
    pub prefix: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct TelegramConfig {
    pub token: Option<String>,
    /// Self-hosted Bot API server, `https://api.telegram.org` when unset
    pub api_url: Option<String>,
    pub poll_timeout_seconds: i64,
    pub request_timeout_seconds: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct DatabaseConfig {
    /// Unset in console mode means phrases live in memory only
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct BroadcastConfig {
    pub destinations: Vec<ChatId>,
    /// `HH:MM`, wall-clock time in `timezone`
    pub send_time: String,
    pub timezone: String,
    pub delivery_timeout_seconds: u64,
    pub check_interval_seconds: u64,
}

/// Validated broadcast settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduleSettings {
    pub destinations: Vec<ChatId>,
    pub trigger: DailyTrigger,
    pub delivery_timeout: Duration,
    pub check_interval: Duration,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            name: "phrase-bot".to_string(),
            prefix: "/".to_string(),
        }
    }
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            token: None,
            api_url: None,
            poll_timeout_seconds: 30,
            request_timeout_seconds: 15,
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: Some(PathBuf::from("phrases.db")),
        }
    }
}

impl Default for BroadcastConfig {
    fn default() -> Self {
        Self {
            destinations: Vec::new(),
            send_time: "14:32".to_string(),
            timezone: "Europe/Moscow".to_string(),
            delivery_timeout_seconds: 10,
            check_interval_seconds: 20,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bot: BotConfig::default(),
            telegram: TelegramConfig::default(),
            database: DatabaseConfig::default(),
            broadcast: BroadcastConfig::default(),
        }
    }
}

impl Config {
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        let content = std::fs::read_to_string(&path)
            .map_err(|e| ConfigError::Parse(format!("Failed to read config: {}", e)))?;

        Self::from_yaml(&content)
    }

    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        serde_yaml::from_str(content)
            .map_err(|e| ConfigError::Parse(format!("Failed to parse config: {}", e)))
    }

    /// Environment wins over the file for every variable that is set
    pub fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) -> Result<(), ConfigError> {
        if let Some(token) = var("BOT_TOKEN").or_else(|| var("TELEGRAM_TOKEN")) {
            self.telegram.token = Some(token);
        }

        if let Some(prefix) = var("BOT_PREFIX") {
            self.bot.prefix = prefix;
        }

        if let Some(path) = var("PHRASES_DB") {
            self.database.path = Some(PathBuf::from(path));
        }

        if let Some(ids) = var("TARGET_CHAT_IDS") {
            self.broadcast.destinations = parse_chat_ids(&ids)?;
        }

        if let Some(time) = var("SEND_TIME") {
            self.broadcast.send_time = time;
        }

        if let Some(tz) = var("BROADCAST_TZ") {
            self.broadcast.timezone = tz;
        }

        Ok(())
    }

    /// Validate the broadcast section. The bot refuses to start without it.
    pub fn schedule(&self) -> Result<ScheduleSettings, ConfigError> {
        let broadcast = &self.broadcast;

        if broadcast.destinations.is_empty() {
            return Err(ConfigError::MissingField("broadcast.destinations".to_string()));
        }

        let send_time = NaiveTime::parse_from_str(broadcast.send_time.trim(), "%H:%M")
            .map_err(|e| ConfigError::InvalidValue(format!("broadcast.send-time {:?}: {}", broadcast.send_time, e)))?;

        let timezone: Tz = broadcast.timezone.trim().parse()
            .map_err(|e| ConfigError::InvalidValue(format!("broadcast.timezone {:?}: {}", broadcast.timezone, e)))?;

        if broadcast.delivery_timeout_seconds == 0 || broadcast.check_interval_seconds == 0 {
            return Err(ConfigError::InvalidValue("broadcast intervals must be positive".to_string()));
        }

        Ok(ScheduleSettings {
            destinations: broadcast.destinations.clone(),
            trigger: DailyTrigger::new(send_time, timezone),
            delivery_timeout: Duration::from_secs(broadcast.delivery_timeout_seconds),
            check_interval: Duration::from_secs(broadcast.check_interval_seconds),
        })
    }
}

/// Comma separated chat ids, e.g. `-618165838,-4057163344`
fn parse_chat_ids(raw: &str) -> Result<Vec<ChatId>, ConfigError> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.parse::<ChatId>()
            .map_err(|_| ConfigError::InvalidValue(format!("chat id {:?}", s))))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn parses_yaml_with_partial_sections() {
        let config = Config::from_yaml(
            "broadcast:\n  destinations: [-618165838, -4057163344]\n  send-time: \"09:15\"\n  timezone: Europe/Paris\n  delivery-timeout-seconds: 5\n  check-interval-seconds: 30\n",
        ).unwrap();

        assert_eq!(config.bot.prefix, "/");
        let schedule = config.schedule().unwrap();
        assert_eq!(schedule.destinations, vec![-618165838, -4057163344]);
        assert_eq!(schedule.trigger.time, NaiveTime::from_hms_opt(9, 15, 0).unwrap());
        assert_eq!(schedule.trigger.timezone, chrono_tz::Europe::Paris);
        assert_eq!(schedule.delivery_timeout, Duration::from_secs(5));
    }

    #[test]
    fn telegram_section_is_optional() {
        let config = Config::from_yaml("telegram:\n  api-url: http://localhost:8081\n").unwrap();
        assert_eq!(config.telegram.api_url.as_deref(), Some("http://localhost:8081"));
        assert_eq!(config.telegram.request_timeout_seconds, 15);
        assert_eq!(config.telegram.poll_timeout_seconds, 30);
    }

    #[test]
    fn missing_destinations_is_fatal() {
        let err = Config::default().schedule().unwrap_err();
        assert!(matches!(err, ConfigError::MissingField(field) if field == "broadcast.destinations"));
    }

    #[test]
    fn bad_time_or_zone_is_rejected() {
        let mut config = Config::default();
        config.broadcast.destinations = vec![-1];

        config.broadcast.send_time = "25:00".to_string();
        assert!(matches!(config.schedule(), Err(ConfigError::InvalidValue(_))));

        config.broadcast.send_time = "10:30".to_string();
        config.broadcast.timezone = "Mars/Olympus".to_string();
        assert!(matches!(config.schedule(), Err(ConfigError::InvalidValue(_))));
    }

    #[test]
    fn environment_overrides_defaults() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("TELEGRAM_TOKEN", "123:abc"),
            ("TARGET_CHAT_IDS", "-1, -2,,-3"),
            ("SEND_TIME", "10:30"),
            ("PHRASES_DB", "/tmp/p.db"),
        ]);
        let mut config = Config::default();
        config.apply_env(|k| env.get(k).map(|v| v.to_string())).unwrap();

        assert_eq!(config.telegram.token.as_deref(), Some("123:abc"));
        assert_eq!(config.broadcast.destinations, vec![-1, -2, -3]);
        assert_eq!(config.database.path, Some(PathBuf::from("/tmp/p.db")));
        assert_eq!(config.schedule().unwrap().trigger.time, NaiveTime::from_hms_opt(10, 30, 0).unwrap());
    }

    #[test]
    fn malformed_chat_id_is_an_error() {
        assert!(parse_chat_ids("-1,abc").is_err());
    }

    #[test]
    fn default_config_round_trips_through_yaml() {
        let yaml = serde_yaml::to_string(&Config::default()).unwrap();
        let parsed = Config::from_yaml(&yaml).unwrap();
        assert_eq!(parsed.broadcast.send_time, "14:32");
        assert_eq!(parsed.database.path, Some(PathBuf::from("phrases.db")));
    }
}
