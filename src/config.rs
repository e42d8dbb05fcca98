use std::{env, str::FromStr};

use anyhow::{Context, Result, anyhow};
use chrono::NaiveTime;

use crate::rules::{identifier::DEFAULT_WIDTH, status::AttendancePolicy};

#[derive(Clone, Debug)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub server_addr: String,
    pub access_token_ttl: usize,
    pub refresh_token_ttl: usize,

    // Rate limiting
    pub rate_login_per_min: u32,
    pub rate_register_per_min: u32,
    pub rate_refresh_per_min: u32,
    pub rate_protected_per_min: u32,

    pub api_prefix: String,
    pub cors_allowed_origin: String,

    // Attendance rules
    pub late_cutoff: NaiveTime,
    pub half_day_hours: f64,
    pub employee_id_width: usize,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the config from any key/value source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| lookup(key).ok_or_else(|| anyhow!("{key} must be set"));

        let half_day_hours: f64 = parse_or(&lookup, "HALF_DAY_HOURS", 8.0)?;
        if !half_day_hours.is_finite() || half_day_hours < 0.0 {
            return Err(anyhow!("HALF_DAY_HOURS must be a non-negative number"));
        }

        let employee_id_width: usize = parse_or(&lookup, "EMPLOYEE_ID_WIDTH", DEFAULT_WIDTH)?;
        if employee_id_width == 0 {
            return Err(anyhow!("EMPLOYEE_ID_WIDTH must be at least 1"));
        }

        Ok(Self {
            server_addr: required("SERVER_ADDR")?,
            database_url: required("DATABASE_URL")?,
            jwt_secret: required("JWT_SECRET")?,
            access_token_ttl: parse_or(&lookup, "ACCESS_TOKEN_TTL", 900)?, // 15 min
            refresh_token_ttl: parse_or(&lookup, "REFRESH_TOKEN_TTL", 604_800)?, // 7 days

            rate_login_per_min: parse_or(&lookup, "RATE_LOGIN_PER_MIN", 60)?,
            rate_register_per_min: parse_or(&lookup, "RATE_REGISTER_PER_MIN", 30)?,
            rate_refresh_per_min: parse_or(&lookup, "RATE_REFRESH_PER_MIN", 30)?,
            rate_protected_per_min: parse_or(&lookup, "RATE_PROTECTED_PER_MIN", 1000)?,

            api_prefix: lookup("API_PREFIX").unwrap_or_else(|| "/api".to_string()),
            cors_allowed_origin: lookup("CORS_ALLOWED_ORIGIN").unwrap_or_else(|| "*".to_string()),

            late_cutoff: match lookup("LATE_CUTOFF") {
                Some(raw) => parse_time_of_day(&raw)
                    .with_context(|| format!("LATE_CUTOFF '{raw}' is not HH:MM"))?,
                None => AttendancePolicy::default().late_cutoff,
            },
            half_day_hours,
            employee_id_width,
        })
    }

    pub fn attendance_policy(&self) -> AttendancePolicy {
        AttendancePolicy {
            late_cutoff: self.late_cutoff,
            half_day_hours: self.half_day_hours,
        }
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{key} has an invalid value '{raw}'")),
        None => Ok(default),
    }
}

fn parse_time_of_day(raw: &str) -> Result<NaiveTime> {
    let raw = raw.trim();
    NaiveTime::parse_from_str(raw, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M:%S"))
        .map_err(Into::into)
}
