use std::sync::LazyLock;
use std::time::Duration;

/// Default: "0.0.0.0:3001"
pub(crate) static SERVER_ADDR: LazyLock<String> =
    LazyLock::new(|| std::env::var("SERVER_ADDR").unwrap_or_else(|_| "0.0.0.0:3001".to_string()));

/// Seconds between sweeps of expired ceremonies, sessions and codes.
/// Default: 60
pub(crate) static SWEEP_INTERVAL: LazyLock<Duration> = LazyLock::new(|| {
    let seconds = std::env::var("SWEEP_INTERVAL")
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .filter(|&s| s > 0)
        .unwrap_or(60);
    Duration::from_secs(seconds)
});

/// Default: "localhost"
pub(crate) static RP_ID: LazyLock<String> =
    LazyLock::new(|| std::env::var("RP_ID").unwrap_or_else(|_| "localhost".to_string()));

/// Default: "http://localhost:3001"
pub(crate) static RP_ORIGIN: LazyLock<String> = LazyLock::new(|| {
    std::env::var("RP_ORIGIN").unwrap_or_else(|_| "http://localhost:3001".to_string())
});

/// Default: "passkey-ceremony demo"
pub(crate) static RP_NAME: LazyLock<String> = LazyLock::new(|| {
    std::env::var("RP_NAME").unwrap_or_else(|_| "passkey-ceremony demo".to_string())
});
