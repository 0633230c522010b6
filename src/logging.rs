//! Tracing subscriber setup.
//!
//! `RUST_LOG` takes precedence. Without it the `-v` count picks the level
//! for this crate: none shows warnings only, `-v` shows retries, `-vv`
//! every connect, `-vvv` slot traffic as well.

use tracing_subscriber::EnvFilter;

/// Map a `-v` count to a level name.
pub fn level_for(verbose: u8) -> &'static str {
    match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}

/// Install the global subscriber. Safe to call more than once.
pub fn init(verbose: u8) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "warn,{}={}",
            env!("CARGO_CRATE_NAME"),
            level_for(verbose)
        ))
    });

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verbosity_levels() {
        assert_eq!(level_for(0), "warn");
        assert_eq!(level_for(1), "info");
        assert_eq!(level_for(2), "debug");
        assert_eq!(level_for(3), "trace");
        assert_eq!(level_for(9), "trace");
    }
}
