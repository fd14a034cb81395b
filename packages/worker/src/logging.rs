use tracing_subscriber::EnvFilter;

/// Filter used when `RUST_LOG` is not set.
fn default_directive(verbose: bool, very_verbose: bool) -> &'static str {
    if very_verbose {
        "trace"
    } else if verbose {
        "debug"
    } else {
        "info"
    }
}

/// Install the global subscriber. `RUST_LOG` wins over the verbosity flags.
pub fn init(verbose: bool, very_verbose: bool) {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(default_directive(verbose, very_verbose))),
        )
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbosity_picks_level() {
        assert_eq!(default_directive(false, false), "info");
        assert_eq!(default_directive(true, false), "debug");
        assert_eq!(default_directive(true, true), "trace");
    }
}
