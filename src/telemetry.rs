//! Tracing setup. LOG_LEVEL holds EnvFilter directives, LOG_FORMAT picks "pretty"
//! (default) or "json" output. Request spans come from the tower-http TraceLayer.

use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str = "info,generation=debug,learnai_backend=debug,tower_http=info,axum=info";

pub fn init_tracing() {
    let filter = EnvFilter::try_from_env("LOG_LEVEL").unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(true)
        .with_line_number(true);

    match std::env::var("LOG_FORMAT").as_deref() {
        Ok("json") => builder.json().init(),
        _ => builder.init(),
    }
}
