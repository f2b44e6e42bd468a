use std::path::PathBuf;

use ambright::{AmbrightBuilder, AmbrightConfig, AmbrightError, CancellationToken};

use clap::Parser;
use nix::unistd::geteuid;
use tokio::signal::unix::{SignalKind, signal};

/// Adjust the screen brightness to the ambient light
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Config file to use instead of ambright/config.conf in the config dirs
    #[arg(long, value_name = "path")]
    config: Option<PathBuf>,

    /// Regular expression for the backlight device to control.
    /// The first matching device is used.
    #[arg(long, value_name = "regex", default_value_t = String::from("."))]
    device: String,

    /// Never fall back to the camera when there is no ambient light sensor
    #[arg(long)]
    no_camera: bool,
}

#[tokio::main]
async fn main() -> Result<(), AmbrightError> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let mut config = match args.config {
        Some(path) => AmbrightConfig::load(path).await?,
        None => AmbrightConfig::new().await?,
    };
    if args.no_camera {
        config.enable_camera = false;
    }
    if needs_root_hint(&config, geteuid().is_root()) {
        log::warn!("not running as root, writing the backlight may need sudo or a udev rule");
    }

    let mut ambright = AmbrightBuilder::new()
        .with_device_regex(args.device.as_str())
        .with_config(config)
        .build()
        .await?;

    let shutdown = CancellationToken::new();
    let mut interrupt = signal(SignalKind::interrupt())?;
    let mut terminate = signal(SignalKind::terminate())?;
    let on_signal = shutdown.clone();
    tokio::spawn(async move {
        tokio::select! {
            _ = interrupt.recv() => {}
            _ = terminate.recv() => {}
        }
        log::info!("received shutdown signal");
        on_signal.cancel();
    });

    ambright.run(shutdown).await
}

/// Without logind only root (or a udev rule) may write the sysfs brightness file.
fn needs_root_hint(config: &AmbrightConfig, is_root: bool) -> bool {
    !config.use_logind && !is_root
}
