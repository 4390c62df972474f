//! Process-wide `tracing` initialization (§4.9), driven by `LOG_LEVEL` (an
//! `EnvFilter` directive string, default `info`) and `LOG_FORMAT`
//! (`json` | `pretty`, default `pretty`). Every request's access-log line
//! goes through this subscriber, not a side channel.

use tracing_subscriber::EnvFilter;

pub fn init_tracing(log_level: &str, log_format: &str) {
    let filter = EnvFilter::try_new(log_level).unwrap_or_else(|_| EnvFilter::new("info"));

    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    if log_format == "json" {
        builder.json().init();
    } else {
        builder.init();
    }
}
