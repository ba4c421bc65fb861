mod options;

use clap::Parser;
use color_eyre::eyre;
use mgo_statsd_component::scheduler::{PollScheduler, PollTask};
use mgo_statsd_component::Emitter;
use mgo_statsd_exporter::StatsdEmitter;
use mgo_statsd_mongodb_receiver::MongoStatusSource;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::layer::SubscriberExt;

fn setup_tracing(verbose: bool) -> eyre::Result<()> {
    let default_directive = if verbose { "debug" } else { "info" };
    let filter = tracing_subscriber::filter::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::filter::EnvFilter::try_new(default_directive))?;
    let subscriber = tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::Layer::new()
                .compact()
                .with_writer(std::io::stdout),
        )
        .with(filter);
    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}

/// Waits for the first termination signal and returns its name.
#[cfg(unix)]
async fn shutdown_signal() -> std::io::Result<&'static str> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut interrupt = signal(SignalKind::interrupt())?;
    let mut terminate = signal(SignalKind::terminate())?;
    let mut quit = signal(SignalKind::quit())?;
    let name = tokio::select! {
        _ = interrupt.recv() => "SIGINT",
        _ = terminate.recv() => "SIGTERM",
        _ = quit.recv() => "SIGQUIT",
    };
    Ok(name)
}

#[cfg(not(unix))]
async fn shutdown_signal() -> std::io::Result<&'static str> {
    tokio::signal::ctrl_c().await?;
    Ok("ctrl-c")
}

#[tokio::main]
async fn main() -> eyre::Result<()> {
    color_eyre::install()?;

    let options = options::Options::parse();
    let profile = std::env::var(options::PROFILE_ENV).ok();
    let config = options.into_config(profile)?;
    setup_tracing(config.verbose)?;

    info!(
        interval = ?config.interval,
        statsd = %config.statsd.endpoint(),
        prefix = %config.statsd.prefix(),
        servers = config.mongo.addresses.len(),
        "starting mgo-statsd"
    );

    let emitter: Arc<dyn Emitter> = Arc::new(StatsdEmitter::new(&config.statsd));
    let mut scheduler = PollScheduler::new();
    for server in config.servers() {
        match MongoStatusSource::new(&server) {
            Ok(source) => {
                scheduler = scheduler.with_task(PollTask::new(
                    server.index,
                    Box::new(source),
                    Arc::clone(&emitter),
                    config.interval,
                    config.verbose,
                ));
            }
            Err(err) => {
                error!(index = server.index, address = %server.address, "{err}");
            }
        }
    }
    if scheduler.is_empty() {
        warn!("no mongo server can be polled");
    }

    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    let scheduler = tokio::spawn(scheduler.run(shutdown_rx));

    let signal = shutdown_signal().await?;
    warn!("received {signal}");
    info!("initiate graceful shutdown");
    // fails only if every task already stopped
    let _ = shutdown_tx.send(true);

    let summary = scheduler.await?;
    for (index, stats) in summary {
        info!(
            index,
            ticks = stats.ticks,
            emitted = stats.emitted,
            fetch_errors = stats.fetch_errors,
            emit_errors = stats.emit_errors,
            "server summary"
        );
    }
    Ok(())
}
