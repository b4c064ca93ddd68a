use std::sync::Once;

static INIT: Once = Once::new();

/// Installs the env_logger backend once. `RUST_LOG` overrides the `info` default.
pub fn init() {
    INIT.call_once(|| {
        let env = env_logger::Env::default().default_filter_or("info");
        let _ = env_logger::Builder::from_env(env)
            .format_timestamp_millis()
            .try_init();
    });
}
