use crate::error::{Error, Result};
use dotenvy::dotenv;
use std::env;
use std::sync::OnceLock;

#[derive(Debug, Clone)]
pub struct Config {
    pub server_address: String,
    pub database_url: String,
    pub jwt_secret: String,
    pub access_token_ttl_minutes: i64,
    pub refresh_token_ttl_days: i64,
    pub login_attempts_per_minute: u32,
    pub api_rps: u32,
    pub uploads_dir: String,
    pub public_base_url: String,
    pub slot_start_hour: u32,
    pub slot_end_hour: u32,
    pub cors_origins: Vec<String>,
}

pub static CONFIG: OnceLock<Config> = OnceLock::new();

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv().ok();

        let slot_start_hour = get_env_or("SLOT_START_HOUR", 9)?;
        let slot_end_hour = get_env_or("SLOT_END_HOUR", 18)?;
        if slot_end_hour < slot_start_hour || slot_end_hour > 23 {
            return Err(Error::Config(format!(
                "Invalid slot grid: {}..{}",
                slot_start_hour, slot_end_hour
            )));
        }

        let cors_origins = env::var("CORS_ORIGINS")
            .map(|raw| {
                raw.split(',')
                    .map(|o| o.trim().to_string())
                    .filter(|o| !o.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self {
            server_address: get_env_or("SERVER_ADDRESS", "0.0.0.0:8080".to_string())?,
            database_url: get_env("DATABASE_URL")?,
            jwt_secret: get_env("JWT_SECRET")?,
            access_token_ttl_minutes: get_env_or("ACCESS_TOKEN_TTL_MINUTES", 60)?,
            refresh_token_ttl_days: get_env_or("REFRESH_TOKEN_TTL_DAYS", 30)?,
            login_attempts_per_minute: get_env_or("LOGIN_ATTEMPTS_PER_MINUTE", 5)?,
            api_rps: get_env_or("API_RPS", 100)?,
            uploads_dir: get_env_or("UPLOADS_DIR", "./uploads".to_string())?,
            public_base_url: get_env_or("PUBLIC_BASE_URL", "http://localhost:8080".to_string())?
                .trim_end_matches('/')
                .to_string(),
            slot_start_hour,
            slot_end_hour,
            cors_origins,
        })
    }
}

fn get_env(name: &str) -> Result<String> {
    env::var(name).map_err(|_| Error::Config(format!("Missing environment variable: {}", name)))
}

fn get_env_or<T>(name: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|e| Error::Config(format!("Invalid value for {}: {}", name, e))),
        Err(_) => Ok(default),
    }
}

pub fn init_config() -> Result<()> {
    let config = Config::from_env()?;
    CONFIG
        .set(config)
        .map_err(|_| Error::Config("Configuration has already been initialized".to_string()))?;
    Ok(())
}

pub fn get_config() -> &'static Config {
    CONFIG
        .get()
        .expect("Configuration has not been initialized")
}
