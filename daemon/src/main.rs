mod buffer;
mod cli;
mod config;
mod controller;
mod lifecycle;
mod macros;
mod platform;
mod video;
mod wayland;

use anyhow::Result;
use tokio::sync::mpsc;

use platform::VideoSource;

#[tokio::main]
async fn main() -> Result<()> {
    let Some(cli) = cli::Cli::parse_strict(std::env::args_os()) else {
        eprintln!("{}", cli::Cli::usage());
        std::process::exit(2);
    };
    let config = config::Config::load()?;

    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(&config.general.log_level),
    )
    .init();

    log::info!("Starting vidpaper v{}", env!("CARGO_PKG_VERSION"));

    let path = cli::resolve_video_path(&cli.video)?;
    let info = video::validator::validate(path.clone(), config.playback.validation_timeout()).await?;
    let video = VideoSource { path, info };

    let (tx, rx) = mpsc::unbounded_channel();
    let producers = lifecycle::Producers::spawn(tx.clone(), config.playback.watchdog_interval());

    let reason = wayland::run(video, config.playback, tx, rx).await?;
    drop(producers);

    if reason.is_clean() {
        log::info!("Shut down cleanly ({})", reason);
        Ok(())
    } else {
        Err(anyhow::anyhow!(reason))
    }
}
