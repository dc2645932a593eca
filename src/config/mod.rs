use serde::Deserialize;
use std::env;

// Главная структура конфигурации - контейнер для всех настроек
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub app: AppConfig,
    pub database: DatabaseConfig,
    pub lease: LeaseConfig,
}

// Настройки приложения
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub environment: String,
    pub rust_log: String,
}

// Настройки базы данных
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub pool_size: u32,
}

// Политика аренды мест: длительность лизы, период фоновой очистки
// и лимит удерживаемых мест на пользователя.
#[derive(Debug, Clone, Deserialize)]
pub struct LeaseConfig {
    pub duration_secs: u64,
    pub sweep_interval_secs: u64,
    pub max_seats_per_user: u32,
}

impl Config {
    pub fn from_env() -> Self {
        Config {
            app: AppConfig {
                host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                port: env::var("PORT")
                    .unwrap_or_else(|_| "8000".to_string())
                    .parse()
                    .expect("PORT must be a valid number"),
                environment: env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string()),
                rust_log: env::var("RUST_LOG")
                    .unwrap_or_else(|_| "performance_ticketing=debug,tower_http=debug".to_string()),
            },
            database: DatabaseConfig {
                url: env::var("DATABASE_URL").expect("DATABASE_URL must be set"),
                pool_size: env::var("DB_POOL_SIZE")
                    .unwrap_or_else(|_| "20".to_string())
                    .parse()
                    .expect("DB_POOL_SIZE must be a valid number"),
            },
            lease: LeaseConfig::from_env(),
        }
    }
}

impl LeaseConfig {
    pub fn from_env() -> Self {
        LeaseConfig {
            duration_secs: env::var("LEASE_DURATION_SECS")
                .unwrap_or_else(|_| "300".to_string())
                .parse()
                .expect("LEASE_DURATION_SECS must be a valid number"),
            sweep_interval_secs: env::var("RELEASE_SWEEP_INTERVAL_SECS")
                .unwrap_or_else(|_| "10".to_string())
                .parse()
                .expect("RELEASE_SWEEP_INTERVAL_SECS must be a valid number"),
            max_seats_per_user: env::var("MAX_PREEMPTED_SEATS_PER_USER")
                .unwrap_or_else(|_| "5".to_string())
                .parse()
                .expect("MAX_PREEMPTED_SEATS_PER_USER must be a valid number"),
        }
    }

    pub fn lease_duration(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.duration_secs as i64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lease_defaults_match_policy() {
        // Значения по умолчанию: 5 минут лизы, 10 секунд между очистками, 5 мест.
        std::env::remove_var("LEASE_DURATION_SECS");
        std::env::remove_var("RELEASE_SWEEP_INTERVAL_SECS");
        std::env::remove_var("MAX_PREEMPTED_SEATS_PER_USER");

        let lease = LeaseConfig::from_env();
        assert_eq!(lease.duration_secs, 300);
        assert_eq!(lease.sweep_interval_secs, 10);
        assert_eq!(lease.max_seats_per_user, 5);
        assert_eq!(lease.lease_duration(), chrono::Duration::minutes(5));
    }
}
