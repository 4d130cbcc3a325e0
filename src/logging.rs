//! Logging setup shared by the binaries.
//!
//! Filter precedence: `RUST_LOG`, then the filter from `modlink.toml` or the
//! `--log` flag, then `info`. Logs go to stderr so the language server keeps
//! stdout for the protocol.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub fn init_logging(filter: Option<&str>) {
    let env_filter = match (std::env::var("RUST_LOG"), filter) {
        (Ok(_), _) => EnvFilter::from_default_env(),
        (Err(_), Some(f)) => EnvFilter::try_new(f).unwrap_or_else(|e| {
            eprintln!("warning: invalid log filter '{}': {}", f, e);
            EnvFilter::new("info")
        }),
        (Err(_), None) => EnvFilter::new("info"),
    };

    // A second initialisation (tests, embedding) keeps the first subscriber.
    let _ = tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_ansi(std::env::var_os("NO_COLOR").is_none()),
        )
        .with(env_filter)
        .try_init();
}
