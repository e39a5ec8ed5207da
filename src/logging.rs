//! Diagnostic logging setup shared by both binaries

/// Initialize env_logger; `RUST_LOG` wins over the default filter
pub fn init(verbose: bool) {
    let default_filter = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();
}
