//! Environment helpers: centralized dotenv loading and ergonomic getters.
//! Every getter calls `init_env()` first, so callers never need to.
use std::str::FromStr;
use std::sync::Once;
use tracing::debug;

static INIT: Once = Once::new();

/// Load .env exactly once. Safe to call many times.
pub fn init_env() {
    INIT.call_once(|| {
        if dotenv::dotenv().is_err() {
            // Fallback to the crate root when run from elsewhere (cargo run -p, tests).
            let candidate = format!("{}/.env", env!("CARGO_MANIFEST_DIR"));
            let _ = dotenv::from_filename(candidate);
        }
    });
}

/// Get optional env var (None if unset or empty).
pub fn env_opt(key: &str) -> Option<String> {
    init_env();
    match std::env::var(key) {
        Ok(v) if !v.trim().is_empty() => Some(v.trim().to_string()),
        _ => None,
    }
}

/// Get parsed value with default fallback. Unparsable values fall back too.
pub fn env_parse<T>(key: &str, default: T) -> T
where
    T: FromStr,
{
    init_env();
    match std::env::var(key) {
        Ok(raw) => match raw.trim().parse::<T>() {
            Ok(v) => v,
            Err(_) => {
                debug!(target = "env", key, "unparsable value; using default");
                default
            }
        },
        Err(_) => default,
    }
}

/// Boolean flag; accepts 1/true/on/yes (case-insensitive) as true.
pub fn env_flag(key: &str, default: bool) -> bool {
    init_env();
    match std::env::var(key) {
        Ok(raw) => {
            let v = raw.trim().to_ascii_lowercase();
            matches!(v.as_str(), "1" | "true" | "on" | "yes")
        }
        Err(_) => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_falls_back_on_garbage() {
        std::env::set_var("STEAM_INGEST_TEST_PARSE", "not-a-number");
        assert_eq!(env_parse::<usize>("STEAM_INGEST_TEST_PARSE", 7), 7);
        std::env::set_var("STEAM_INGEST_TEST_PARSE", " 12 ");
        assert_eq!(env_parse::<usize>("STEAM_INGEST_TEST_PARSE", 7), 12);
    }

    #[test]
    fn opt_treats_blank_as_unset() {
        std::env::set_var("STEAM_INGEST_TEST_OPT", "   ");
        assert_eq!(env_opt("STEAM_INGEST_TEST_OPT"), None);
        assert_eq!(env_opt("STEAM_INGEST_TEST_UNSET_KEY"), None);
    }

    #[test]
    fn flag_accepts_common_truthy_values() {
        for v in ["1", "true", "ON", "yes"] {
            std::env::set_var("STEAM_INGEST_TEST_FLAG", v);
            assert!(env_flag("STEAM_INGEST_TEST_FLAG", false));
        }
        std::env::set_var("STEAM_INGEST_TEST_FLAG", "nope");
        assert!(!env_flag("STEAM_INGEST_TEST_FLAG", true));
    }
}
