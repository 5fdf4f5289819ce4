use chrono::{DateTime, FixedOffset, Offset, Utc};
use std::env;
use std::net::SocketAddr;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    pub database_url: String,
    pub env_mode: String,
    pub allowed_origins: Vec<String>,
    pub rate_limit_per_second: u64,
    pub rate_limit_burst: u32,
    /// Offset whose calendar defines "today", "this week" and so on.
    pub utc_offset: FixedOffset,
    pub recurring_interval: Duration,
    pub cache_ttl: Duration,
    pub ml_api_url: Option<String>,
    pub forecast_api_url: Option<String>,
    pub static_dir: String,
    pub seed_on_start: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            database_url: "foodloop.db".to_string(),
            env_mode: "development".to_string(),
            allowed_origins: Vec::new(),
            rate_limit_per_second: 1200,
            rate_limit_burst: 2400,
            utc_offset: Utc.fix(),
            recurring_interval: Duration::from_secs(3600),
            cache_ttl: Duration::from_secs(300),
            ml_api_url: None,
            forecast_api_url: None,
            static_dir: "static".to_string(),
            seed_on_start: false,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let defaults = AppConfig::default();

        let bind_addr = match env::var("BIND_ADDR") {
            Ok(raw) => raw
                .parse()
                .map_err(|e| anyhow::anyhow!("Invalid BIND_ADDR {:?}: {}", raw, e))?,
            Err(_) => defaults.bind_addr,
        };

        let utc_offset = match env::var("DASHBOARD_UTC_OFFSET") {
            Ok(raw) => parse_offset(&raw)?,
            Err(_) => defaults.utc_offset,
        };

        let allowed_origins = env::var("ALLOWED_ORIGINS")
            .map(|v| {
                v.split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        Ok(AppConfig {
            bind_addr,
            database_url: env::var("DATABASE_URL").unwrap_or(defaults.database_url),
            env_mode: env::var("RUST_ENV").unwrap_or(defaults.env_mode),
            allowed_origins,
            rate_limit_per_second: parse_var("RATE_LIMIT_PER_SECOND").unwrap_or(defaults.rate_limit_per_second),
            rate_limit_burst: parse_var("RATE_LIMIT_BURST").unwrap_or(defaults.rate_limit_burst),
            utc_offset,
            recurring_interval: recurring_interval(
                parse_var("RECURRING_INTERVAL_SECS"),
                defaults.recurring_interval,
            )?,
            cache_ttl: parse_var("CACHE_TTL_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.cache_ttl),
            ml_api_url: non_empty_var("ML_API_URL"),
            forecast_api_url: non_empty_var("FORECAST_API_URL"),
            static_dir: env::var("STATIC_DIR").unwrap_or(defaults.static_dir),
            seed_on_start: env::var("FOODLOOP_SEED")
                .map(|v| v.eq_ignore_ascii_case("1") || v.eq_ignore_ascii_case("true"))
                .unwrap_or(false),
        })
    }

    pub fn is_production(&self) -> bool {
        self.env_mode == "production"
    }

    /// Wall-clock now in the dashboard's calendar.
    pub fn local_now(&self) -> DateTime<FixedOffset> {
        Utc::now().with_timezone(&self.utc_offset)
    }
}

fn parse_var<T: std::str::FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

fn recurring_interval(secs: Option<u64>, default: Duration) -> anyhow::Result<Duration> {
    match secs {
        Some(0) => anyhow::bail!("RECURRING_INTERVAL_SECS must be at least 1"),
        Some(secs) => Ok(Duration::from_secs(secs)),
        None => Ok(default),
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|v| v.trim().trim_end_matches('/').to_string())
        .filter(|v| !v.is_empty())
}

/// Accepts `Z`, `+05:30`, `-0400` or `+2`.
pub fn parse_offset(raw: &str) -> anyhow::Result<FixedOffset> {
    let raw = raw.trim();
    if raw.eq_ignore_ascii_case("z") || raw.eq_ignore_ascii_case("utc") {
        return Ok(Utc.fix());
    }
    let (sign, rest) = match raw.chars().next() {
        Some('+') => (1, &raw[1..]),
        Some('-') => (-1, &raw[1..]),
        _ => return Err(anyhow::anyhow!("UTC offset must start with + or -: {:?}", raw)),
    };
    let digits: String = rest.chars().filter(|c| *c != ':').collect();
    if !digits.chars().all(|c| c.is_ascii_digit()) {
        return Err(anyhow::anyhow!("Unrecognised UTC offset: {:?}", raw));
    }
    let (hours, minutes) = match digits.len() {
        1 | 2 => (digits.parse::<i32>()?, 0),
        4 => (digits[..2].parse::<i32>()?, digits[2..].parse::<i32>()?),
        _ => return Err(anyhow::anyhow!("Unrecognised UTC offset: {:?}", raw)),
    };
    if hours > 14 || minutes > 59 {
        return Err(anyhow::anyhow!("UTC offset out of range: {:?}", raw));
    }
    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
        .ok_or_else(|| anyhow::anyhow!("UTC offset out of range: {:?}", raw))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_common_offset_spellings() {
        assert_eq!(parse_offset("+05:30").unwrap().local_minus_utc(), 19800);
        assert_eq!(parse_offset("-0400").unwrap().local_minus_utc(), -14400);
        assert_eq!(parse_offset("+2").unwrap().local_minus_utc(), 7200);
        assert_eq!(parse_offset("Z").unwrap().local_minus_utc(), 0);
        assert!(parse_offset("05:30").is_err());
        assert!(parse_offset("+25:00").is_err());
    }

    #[test]
    fn rejects_non_digit_offsets() {
        assert!(parse_offset("+1é1").is_err());
        assert!(parse_offset("+ab:cd").is_err());
        assert!(parse_offset("+٣").is_err());
    }

    #[test]
    fn zero_recurring_interval_is_rejected() {
        let default = Duration::from_secs(3600);
        assert!(recurring_interval(Some(0), default).is_err());
        assert_eq!(recurring_interval(Some(90), default).unwrap(), Duration::from_secs(90));
        assert_eq!(recurring_interval(None, default).unwrap(), default);
    }
}
