use serde::{Deserialize, Serialize};
use std::env;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    #[serde(default)]
    pub reservation: ReservationConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReservationConfig {
    /// 预订保留时长（分钟）
    #[serde(default = "default_ttl_minutes")]
    pub ttl_minutes: i64,
    #[serde(default = "default_min_tickets")]
    pub min_tickets_per_order: i64,
    #[serde(default = "default_max_tickets")]
    pub max_tickets_per_order: i64,
    /// 后台过期扫描间隔（秒）
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,
    /// 随机选号竞争失败后的重采样次数上限
    #[serde(default = "default_random_attempts")]
    pub max_random_attempts: u32,
    /// 存储层写冲突的整体重试次数上限
    #[serde(default = "default_conflict_retries")]
    pub max_conflict_retries: u32,
}

fn default_ttl_minutes() -> i64 {
    30
}
fn default_min_tickets() -> i64 {
    1
}
fn default_max_tickets() -> i64 {
    50
}
fn default_sweep_interval() -> u64 {
    60
}
fn default_random_attempts() -> u32 {
    5
}
fn default_conflict_retries() -> u32 {
    3
}

impl Default for ReservationConfig {
    fn default() -> Self {
        Self {
            ttl_minutes: default_ttl_minutes(),
            min_tickets_per_order: default_min_tickets(),
            max_tickets_per_order: default_max_tickets(),
            sweep_interval_secs: default_sweep_interval(),
            max_random_attempts: default_random_attempts(),
            max_conflict_retries: default_conflict_retries(),
        }
    }
}

impl Config {
    pub fn from_toml() -> Result<Self, Box<dyn std::error::Error>> {
        let config_path = env::var("CONFIG_PATH").unwrap_or_else(|_| "config.toml".to_string());
        use std::io::ErrorKind;

        // 尝试读取配置文件，如果不存在则完全依赖环境变量
        let config_result = std::fs::read_to_string(&config_path);

        let mut config: Config = match config_result {
            Ok(config_str) => {
                // 有配置文件：先解析再用环境变量覆盖
                toml::from_str(&config_str).map_err(|e| format!("解析配置文件失败: {e}"))?
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                // 无配置文件：使用环境变量与默认值构建
                fn get_env(name: &str) -> Option<String> {
                    env::var(name).ok()
                }
                fn get_env_parse<T: std::str::FromStr>(name: &str, default: T) -> T {
                    env::var(name)
                        .ok()
                        .and_then(|v| v.parse::<T>().ok())
                        .unwrap_or(default)
                }

                // 数据库 URL 在无配置文件时必须提供
                let database_url = get_env("DATABASE_URL")
                    .ok_or("缺少 DATABASE_URL 环境变量，且未找到配置文件 config.toml")?;

                Config {
                    server: ServerConfig {
                        host: get_env("SERVER_HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
                        port: get_env_parse("SERVER_PORT", 8080u16),
                    },
                    database: DatabaseConfig {
                        url: database_url,
                        max_connections: get_env_parse("DB_MAX_CONNECTIONS", 10u32),
                    },
                    reservation: ReservationConfig {
                        ttl_minutes: get_env_parse("RESERVATION_TTL_MINUTES", default_ttl_minutes()),
                        min_tickets_per_order: get_env_parse(
                            "MIN_TICKETS_PER_ORDER",
                            default_min_tickets(),
                        ),
                        max_tickets_per_order: get_env_parse(
                            "MAX_TICKETS_PER_ORDER",
                            default_max_tickets(),
                        ),
                        sweep_interval_secs: get_env_parse(
                            "SWEEP_INTERVAL_SECS",
                            default_sweep_interval(),
                        ),
                        max_random_attempts: get_env_parse(
                            "MAX_RANDOM_ATTEMPTS",
                            default_random_attempts(),
                        ),
                        max_conflict_retries: get_env_parse(
                            "MAX_CONFLICT_RETRIES",
                            default_conflict_retries(),
                        ),
                    },
                }
            }
            Err(e) => {
                return Err(format!("无法读取配置文件 {config_path}: {e}").into());
            }
        };

        // 环境变量覆盖（即便文件存在时也覆盖）
        if let Ok(v) = env::var("SERVER_HOST") {
            config.server.host = v;
        }
        if let Ok(v) = env::var("SERVER_PORT") {
            if let Ok(p) = v.parse() {
                config.server.port = p;
            }
        }
        if let Ok(v) = env::var("DATABASE_URL") {
            config.database.url = v;
        }
        if let Ok(v) = env::var("DB_MAX_CONNECTIONS") {
            if let Ok(mc) = v.parse() {
                config.database.max_connections = mc;
            }
        }
        if let Ok(v) = env::var("RESERVATION_TTL_MINUTES") {
            if let Ok(n) = v.parse() {
                config.reservation.ttl_minutes = n;
            }
        }
        if let Ok(v) = env::var("MIN_TICKETS_PER_ORDER") {
            if let Ok(n) = v.parse() {
                config.reservation.min_tickets_per_order = n;
            }
        }
        if let Ok(v) = env::var("MAX_TICKETS_PER_ORDER") {
            if let Ok(n) = v.parse() {
                config.reservation.max_tickets_per_order = n;
            }
        }
        if let Ok(v) = env::var("SWEEP_INTERVAL_SECS") {
            if let Ok(n) = v.parse() {
                config.reservation.sweep_interval_secs = n;
            }
        }

        Ok(config)
    }
}
