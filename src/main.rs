use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use corelay::config::Config;
use corelay::{build_router, AppContext};
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::parse_from_env();
    let _log_guard = setup_logging(&config.log, config.log_file.as_deref());

    let ctx = AppContext::new(config).await?;

    ctx.rule_engine.start();
    tokio::spawn(Arc::clone(&ctx.governor).run_loop());

    let addr: SocketAddr = format!("0.0.0.0:{}", ctx.config.port).parse()?;
    let router = build_router(Arc::clone(&ctx));

    info!("corelayd listening on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router).await?;
    Ok(())
}

/// Initialize the tracing subscriber. If `log_file` is set, logs go to both
/// stdout and a daily-rolling file. Returns a `WorkerGuard` that must stay
/// alive for the process lifetime.
fn setup_logging(
    log_level: &str,
    log_file: Option<&std::path::Path>,
) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    let Some(path) = log_file else {
        tracing_subscriber::fmt().with_env_filter(log_level).compact().init();
        return None;
    };

    let dir = path.parent().unwrap_or_else(|| std::path::Path::new("."));
    let filename = path.file_name().unwrap_or_else(|| std::ffi::OsStr::new("corelayd.log"));

    if let Err(e) = std::fs::create_dir_all(dir) {
        eprintln!("warn: could not create log directory '{}': {e} — falling back to stdout", dir.display());
        tracing_subscriber::fmt().with_env_filter(log_level).compact().init();
        return None;
    }

    let appender = tracing_appender::rolling::daily(dir, filename);
    let (non_blocking, guard) = tracing_appender::non_blocking(appender);

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(log_level))
        .with(tracing_subscriber::fmt::layer().compact())
        .with(tracing_subscriber::fmt::layer().with_writer(non_blocking))
        .init();

    Some(guard)
}
