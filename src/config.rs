use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;

use crate::error::{AppError, AppResult};
use crate::models::PrizeDefinition;
use crate::utils::EventWindow;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub jwt: JwtConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub event: EventConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub access_token_expires_in: i64,  // seconds
    pub refresh_token_expires_in: i64, // seconds
}

/// CSV 文件位置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub data_dir: PathBuf,
    /// 订房流水由订房系统维护，可位于数据目录之外
    #[serde(default)]
    pub bookings_csv: Option<PathBuf>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            bookings_csv: None,
        }
    }
}

impl StorageConfig {
    pub fn bookings_path(&self) -> PathBuf {
        self.bookings_csv
            .clone()
            .unwrap_or_else(|| self.data_dir.join("bookings.csv"))
    }

    pub fn spins_path(&self) -> PathBuf {
        self.data_dir.join("event_spins.csv")
    }

    pub fn prizes_path(&self) -> PathBuf {
        self.data_dir.join("event_prizes.csv")
    }

    pub fn users_path(&self) -> PathBuf {
        self.data_dir.join("users.csv")
    }
}

/// 幸运转盘活动配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventConfig {
    pub start_month: u32,
    pub end_month: u32,
    /// 消费门槛（严格递增），达到几档即获得几次抽奖
    pub spend_thresholds: Vec<f64>,
    pub prizes: Vec<PrizeDefinition>,
}

impl Default for EventConfig {
    fn default() -> Self {
        Self {
            start_month: 8,
            end_month: 12,
            spend_thresholds: vec![500_000.0, 1_000_000.0, 2_000_000.0, 3_500_000.0, 5_000_000.0],
            prizes: vec![
                PrizeDefinition::new("Better luck next time", 0.0, 40),
                PrizeDefinition::new("Better luck next time", 0.0, 25),
                PrizeDefinition::new("Better luck next time", 0.0, 15),
                PrizeDefinition::new("50,000 VND", 50_000.0, 10),
                PrizeDefinition::new("100,000 VND", 100_000.0, 5),
                PrizeDefinition::new("200,000 VND", 200_000.0, 3),
                PrizeDefinition::new("500,000 VND", 500_000.0, 2),
            ],
        }
    }
}

impl EventConfig {
    pub fn window(&self) -> EventWindow {
        EventWindow::new(self.start_month, self.end_month)
    }

    pub fn validate(&self) -> AppResult<()> {
        let months = 1..=12;
        if !months.contains(&self.start_month) || !months.contains(&self.end_month) {
            return Err(AppError::ConfigError(
                "event months must be within 1..=12".to_string(),
            ));
        }
        if self.start_month > self.end_month {
            return Err(AppError::ConfigError(
                "event start_month must not be after end_month".to_string(),
            ));
        }
        if self.spend_thresholds.iter().any(|t| !t.is_finite() || *t < 0.0) {
            return Err(AppError::ConfigError(
                "spend thresholds must be non-negative numbers".to_string(),
            ));
        }
        if self.spend_thresholds.windows(2).any(|w| w[0] >= w[1]) {
            return Err(AppError::ConfigError(
                "spend thresholds must be strictly ascending".to_string(),
            ));
        }
        if self.prizes.is_empty() {
            return Err(AppError::ConfigError("prize list is empty".to_string()));
        }
        if self.prizes.iter().all(|p| p.weight == 0) {
            return Err(AppError::ConfigError(
                "at least one prize needs a positive weight".to_string(),
            ));
        }
        if self.prizes.iter().any(|p| !p.value.is_finite() || p.value < 0.0) {
            return Err(AppError::ConfigError(
                "prize values must be non-negative numbers".to_string(),
            ));
        }
        Ok(())
    }
}

fn get_env(name: &str) -> Option<String> {
    env::var(name).ok()
}

fn get_env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|v| v.parse::<T>().ok())
}

impl Config {
    pub fn from_toml() -> AppResult<Self> {
        let config_path = env::var("CONFIG_PATH").unwrap_or_else(|_| "config.toml".to_string());
        use std::io::ErrorKind;

        // 尝试读取配置文件，如果不存在则完全依赖环境变量
        let mut config: Config = match std::fs::read_to_string(&config_path) {
            Ok(config_str) => Self::parse(&config_str)?,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                log::info!("{config_path} not found, building configuration from environment");
                Config {
                    server: ServerConfig {
                        host: "0.0.0.0".to_string(),
                        port: 8080,
                    },
                    jwt: JwtConfig {
                        secret: "change-me-in-production".to_string(),
                        access_token_expires_in: 7200,
                        refresh_token_expires_in: 2_592_000,
                    },
                    storage: StorageConfig::default(),
                    event: EventConfig::default(),
                }
            }
            Err(e) => {
                return Err(AppError::ConfigError(format!(
                    "cannot read config file {config_path}: {e}"
                )));
            }
        };

        // 环境变量覆盖（即便文件存在时也覆盖）
        config.apply_env_overrides();
        config.event.validate()?;

        Ok(config)
    }

    pub fn parse(config_str: &str) -> AppResult<Self> {
        toml::from_str(config_str)
            .map_err(|e| AppError::ConfigError(format!("failed to parse config file: {e}")))
    }

    fn apply_env_overrides(&mut self) {
        if let Some(v) = get_env("SERVER_HOST") {
            self.server.host = v;
        }
        if let Some(p) = get_env_parse("SERVER_PORT") {
            self.server.port = p;
        }
        if let Some(v) = get_env("JWT_SECRET") {
            self.jwt.secret = v;
        }
        if let Some(n) = get_env_parse("JWT_ACCESS_EXPIRES_IN") {
            self.jwt.access_token_expires_in = n;
        }
        if let Some(n) = get_env_parse("JWT_REFRESH_EXPIRES_IN") {
            self.jwt.refresh_token_expires_in = n;
        }
        if let Some(v) = get_env("DATA_DIR") {
            self.storage.data_dir = PathBuf::from(v);
        }
        if let Some(v) = get_env("BOOKINGS_CSV") {
            self.storage.bookings_csv = Some(PathBuf::from(v));
        }
        if let Some(m) = get_env_parse("EVENT_START_MONTH") {
            self.event.start_month = m;
        }
        if let Some(m) = get_env_parse("EVENT_END_MONTH") {
            self.event.end_month = m;
        }
    }
}
