use std::path::PathBuf;

use structopt::StructOpt;
use tokio::sync::watch;
use tracing::{error, info, info_span, trace, Instrument};

#[macro_use]
extern crate quick_error;

mod camera;
mod config;
mod detect;
mod frame;
mod monitor;
mod notify;
mod recording;
#[cfg(test)]
mod test_support;

use config::Config;
use monitor::{Collaborators, Monitor, MonitorSettings};

#[derive(Debug, StructOpt)]
#[structopt(name = "hive_watch", about = "Watches a beehive camera for wax moth activity.")]
struct CliArgs {
    #[structopt(
        parse(from_os_str),
        short = "c",
        long = "config",
        default_value = "config.toml",
        help = "Path to an optional TOML configuration file. HIVEWATCH_* env vars override it.",
        env = "HIVEWATCH_CONFIG"
    )]
    config: PathBuf,
}

#[tokio::main]
async fn main() {
    let args = CliArgs::from_args();
    let cfg = match config::load_config(&args.config) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(2);
        }
    };

    let filter = tracing_subscriber::EnvFilter::new(&cfg.system.log_level);
    let builder = tracing_subscriber::fmt()
        // Filter from user
        .with_env_filter(filter);
    let installed = if cfg.system.log_json {
        tracing::subscriber::set_global_default(builder.json().finish())
    } else {
        tracing::subscriber::set_global_default(builder.finish())
    };
    if let Err(e) = installed {
        eprintln!("Unable to install log subscriber: {}", e);
    }

    info!("HiveWatch monitor starting");
    trace!("Config: {:?}", cfg);

    let monitor = match build_monitor(&cfg) {
        Ok(monitor) => monitor,
        Err(e) => {
            error!("Startup failed: {}", e);
            std::process::exit(1);
        }
    };

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        wait_for_signal().await;
        info!("Interrupt received, shutting down...");
        let _ = shutdown_tx.send(true);
        // Hold the sender so the monitor only ever stops on the flag
        pending_forever().await;
    });

    let span = info_span!("Monitor", camera = %cfg.camera.url);
    let stats = monitor.run(shutdown_rx).instrument(span).await;
    info!(
        frames = stats.frames_processed,
        cycles = stats.cycles_evaluated,
        "Resources released"
    );
}

/// Everything that must work before the loop starts. Any failure here is fatal.
fn build_monitor(cfg: &Config) -> Result<Monitor, StartupError> {
    let classifier = detect::load(&cfg.model)?;
    let frames = camera::HttpFrameSource::new(&cfg.camera)?;
    let sensor = camera::HttpSensorReader::new(&cfg.sensor)?;
    let notifier = notify::TelegramNotifier::new(&cfg.telegram)?;
    if !notifier.is_configured() {
        info!("Telegram credentials not set, alerts will only be logged");
    }
    let recorder = recording::open(&cfg.recording)?;

    Ok(Monitor::new(
        MonitorSettings::from(cfg),
        Collaborators {
            frames: Box::new(frames),
            classifier,
            sensor: Box::new(sensor),
            notifier: Box::new(notifier),
            recorder,
        },
    ))
}

async fn wait_for_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Unable to listen for Ctrl+C: {}", e);
            pending_forever().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("Unable to listen for SIGTERM: {}", e);
                pending_forever().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = pending_forever();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

async fn pending_forever() {
    std::future::pending::<()>().await
}

quick_error! {
    #[derive(Debug)]
    pub enum StartupError {
        Classifier(error: detect::ClassifierError) {
            from()
            display("{}", error)
            source(error)
        }
        Camera(error: camera::FrameError) {
            from()
            display("{}", error)
            source(error)
        }
        Sensor(error: camera::SensorError) {
            from()
            display("{}", error)
            source(error)
        }
        Notifier(error: notify::NotifyError) {
            from()
            display("{}", error)
            source(error)
        }
        Recording(error: recording::RecorderError) {
            from()
            display("Unable to open recording: {}", error)
            source(error)
        }
    }
}
