use env_logger::Env;

/// Log filter comes from `SWIPECTL_LOG` (same syntax as `RUST_LOG`), default `info`.
pub fn init() {
    let env = Env::default()
        .filter_or("SWIPECTL_LOG", "info")
        .write_style("SWIPECTL_LOG_STYLE");
    let _ = env_logger::Builder::from_env(env)
        .format_timestamp_millis()
        .try_init();
}
