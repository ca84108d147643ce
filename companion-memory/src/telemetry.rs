//! Tracing subscriber setup

use std::env;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Environment variable selecting the log output format (`json` or text)
pub const LOG_FORMAT_ENV: &str = "COMPANION_LOG_FORMAT";

fn json_requested() -> bool {
    env::var(LOG_FORMAT_ENV)
        .map(|value| value.eq_ignore_ascii_case("json"))
        .unwrap_or(false)
}

/// Install the global subscriber, filtered by `RUST_LOG` (default `info`)
///
/// Returns `false` when a subscriber was already installed.
pub fn init_tracing() -> bool {
    let json = json_requested();

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(json.then(|| fmt::layer().json()))
        .with((!json).then(fmt::layer))
        .try_init()
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_init_is_harmless() {
        init_tracing();
        assert!(!init_tracing());
    }
}
