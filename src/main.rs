//! dialogue-forge binary.

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use dialogue_forge::cli::{parse_cli, run_with_cli};

/// `RUST_LOG` when set, otherwise the crate at `--log-level` with sqlx
/// statement logging kept at warn.
fn log_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("warn,dialogue_forge={level},sqlx=warn")))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = parse_cli();

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false))
        .with(log_filter(&cli.log_level))
        .init();

    run_with_cli(cli).await
}
