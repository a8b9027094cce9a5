use tracing_subscriber::{EnvFilter, filter::LevelFilter, fmt};

/// Install the stderr subscriber. Stdout stays reserved for command output.
pub fn initialize_tracing(level: &str) {
    let env_filter = build_env_filter(level);

    fmt::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_level(true)
        .with_writer(std::io::stderr)
        .try_init()
        .ok();
}

fn build_env_filter(level: &str) -> EnvFilter {
    let default_level = level.parse::<LevelFilter>().unwrap_or(LevelFilter::INFO);

    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::builder()
            .with_default_directive(default_level.into())
            .from_env_lossy()
    })
}
