use once_cell::sync::Lazy;

use crate::contracts::AuthScheme;

/// Base URL of the production contracts API.
pub static CONTRACTS_LIVE_API_URL: Lazy<String> = Lazy::new(|| {
    read_optional_env("CONTRACTS_LIVE_API_URL")
        .unwrap_or_else(|| "https://contracts.canonical.com".to_string())
});

/// Base URL of the staging contracts API, used when `CONTRACTS_USE_TEST_BACKEND` is set.
pub static CONTRACTS_TEST_API_URL: Lazy<String> = Lazy::new(|| {
    read_optional_env("CONTRACTS_TEST_API_URL")
        .unwrap_or_else(|| "https://contracts.staging.canonical.com".to_string())
});

/// When set to a truthy value, requests go to the staging backend. Defaults to `false`.
pub static CONTRACTS_USE_TEST_BACKEND: Lazy<bool> = Lazy::new(|| {
    std::env::var("CONTRACTS_USE_TEST_BACKEND")
        .ok()
        .map(|value| {
            let normalized = value.trim().to_ascii_lowercase();
            matches!(normalized.as_str(), "1" | "true" | "yes")
        })
        .unwrap_or(false)
});

/// Marketplace whose subscriptions and listings are reconciled. Defaults to `canonical-ua`.
pub static CONTRACTS_MARKETPLACE: Lazy<String> = Lazy::new(|| {
    read_optional_env("CONTRACTS_MARKETPLACE").unwrap_or_else(|| "canonical-ua".to_string())
});

/// Opaque credential presented to the contracts API.
pub static CONTRACTS_AUTH_TOKEN: Lazy<Option<String>> =
    Lazy::new(|| read_optional_env("CONTRACTS_AUTH_TOKEN"));

/// key: contracts-config -> credential scheme
pub static CONTRACTS_AUTH_SCHEME: Lazy<AuthScheme> = Lazy::new(parse_auth_scheme);

/// Request timeout for the contracts API client in seconds. Defaults to `30`.
pub static CONTRACTS_HTTP_TIMEOUT_SECS: Lazy<u64> = Lazy::new(|| {
    std::env::var("CONTRACTS_HTTP_TIMEOUT_SECS")
        .ok()
        .and_then(|value| value.parse::<u64>().ok())
        .filter(|value| *value > 0)
        .unwrap_or(30)
});

/// Contracts expiring within this many days are flagged as `expiring`.
pub const EXPIRING_WINDOW_DAYS: i64 = 30;

/// A `done` renewal modified within this many minutes counts as recently renewed.
pub const RECENTLY_RENEWED_MINUTES: i64 = 60;

/// Metric every purchase item is expressed in.
pub const PURCHASE_METRIC: &str = "active-machines";

/// Format used for every display date (e.g. `07 March 2024`).
pub const DISPLAY_DATE_FORMAT: &str = "%d %B %Y";

pub fn api_base_url() -> &'static str {
    if *CONTRACTS_USE_TEST_BACKEND {
        CONTRACTS_TEST_API_URL.as_str()
    } else {
        CONTRACTS_LIVE_API_URL.as_str()
    }
}

fn parse_auth_scheme() -> AuthScheme {
    match std::env::var("CONTRACTS_AUTH_SCHEME") {
        Ok(raw) => {
            let normalized = raw.trim().to_ascii_lowercase();
            match normalized.as_str() {
                "" | "macaroon" => AuthScheme::Macaroon,
                "bearer" => AuthScheme::Bearer,
                other => panic!(
                    "unsupported CONTRACTS_AUTH_SCHEME value '{other}'; expected 'macaroon' or 'bearer'"
                ),
            }
        }
        Err(_) => AuthScheme::Macaroon,
    }
}

fn read_optional_env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}
