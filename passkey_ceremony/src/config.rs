//! Lifetimes of ceremony state, sessions and verification codes

use std::env;
use std::sync::LazyLock;

use chrono::Duration;

/// Seconds a begun registration or login stays finishable. Default: 300
pub static CEREMONY_TIMEOUT: LazyLock<i64> =
    LazyLock::new(|| seconds_from_env("CEREMONY_TIMEOUT", 300));

/// Seconds an authenticated session lives. Default: 3600
pub static SESSION_TIMEOUT: LazyLock<i64> =
    LazyLock::new(|| seconds_from_env("SESSION_TIMEOUT", 3600));

/// Seconds a mailed verification code stays valid. Default: 600
pub static VERIFICATION_CODE_TIMEOUT: LazyLock<i64> =
    LazyLock::new(|| seconds_from_env("VERIFICATION_CODE_TIMEOUT", 600));

/// Upper bound for any configured lifetime: one year.
const MAX_TIMEOUT_SECONDS: i64 = 365 * 24 * 60 * 60;

fn seconds_from_env(key: &str, default: i64) -> i64 {
    parse_seconds(key, env::var(key).ok().as_deref(), default)
}

fn parse_seconds(key: &str, raw: Option<&str>, default: i64) -> i64 {
    match raw.map(str::parse::<i64>) {
        None => default,
        Some(Ok(seconds)) if (1..=MAX_TIMEOUT_SECONDS).contains(&seconds) => seconds,
        Some(_) => {
            tracing::warn!("Ignoring invalid {key}, using default of {default} seconds");
            default
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CeremonyConfig {
    pub ceremony_timeout: Duration,
    pub session_timeout: Duration,
    pub verification_code_timeout: Duration,
}

impl Default for CeremonyConfig {
    fn default() -> Self {
        Self {
            ceremony_timeout: Duration::seconds(300),
            session_timeout: Duration::seconds(3600),
            verification_code_timeout: Duration::seconds(600),
        }
    }
}

impl CeremonyConfig {
    pub fn from_env() -> Self {
        Self {
            ceremony_timeout: Duration::seconds(*CEREMONY_TIMEOUT),
            session_timeout: Duration::seconds(*SESSION_TIMEOUT),
            verification_code_timeout: Duration::seconds(*VERIFICATION_CODE_TIMEOUT),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_seconds() {
        assert_eq!(parse_seconds("K", None, 300), 300);
        assert_eq!(parse_seconds("K", Some("45"), 300), 45);
        assert_eq!(parse_seconds("K", Some("soon"), 300), 300);
        assert_eq!(parse_seconds("K", Some("0"), 300), 300);
        assert_eq!(parse_seconds("K", Some("-5"), 300), 300);
    }

    #[test]
    fn test_parse_seconds_rejects_values_past_one_year() {
        // Given lifetimes at, just above and far above the one year limit
        let at_limit = MAX_TIMEOUT_SECONDS.to_string();
        let above_limit = (MAX_TIMEOUT_SECONDS + 1).to_string();

        // Then only the limit itself is accepted
        assert_eq!(parse_seconds("K", Some(&at_limit), 300), MAX_TIMEOUT_SECONDS);
        assert_eq!(parse_seconds("K", Some(&above_limit), 300), 300);
        assert_eq!(parse_seconds("K", Some("8300000000000"), 300), 300);
        assert_eq!(parse_seconds("K", Some("9300000000000000"), 300), 300);
    }

    #[test]
    fn test_longest_lifetime_yields_valid_expiry() {
        // Given the longest lifetime the parser accepts
        let overflowing = parse_seconds("K", Some("9223372036854775807"), 300);
        let longest = parse_seconds("K", Some(&MAX_TIMEOUT_SECONDS.to_string()), 300);

        // When computing expiries from it
        let session = crate::session::AuthenticatedSession::new(
            "user-1".to_string(),
            Duration::seconds(longest),
        );

        // Then nothing overflows
        assert_eq!(overflowing, 300);
        assert!(session.expires_at > chrono::Utc::now());
    }

    #[test]
    fn test_default_lifetimes() {
        let config = CeremonyConfig::default();
        assert_eq!(config.ceremony_timeout.num_seconds(), 300);
        assert_eq!(config.session_timeout.num_seconds(), 3600);
        assert_eq!(config.verification_code_timeout.num_seconds(), 600);
    }
}
