use std::io;
use std::path::PathBuf;
use std::sync::mpsc;
use std::thread;

use anyhow::{bail, Context};
use attendance_engine::{ClientSettings, EngineHandle};

mod app;
mod cli;
mod config;
mod effects;
mod logging;
mod render;

fn main() -> anyhow::Result<()> {
    let matches = cli::build_cli().get_matches();

    let destination = matches
        .get_one::<String>("log")
        .and_then(|name| logging::LogDestination::from_name(name))
        .unwrap_or(logging::LogDestination::File);
    let level = cli::log_level(&matches).unwrap_or_else(engine_logging::default_level);
    logging::initialize(destination, level);

    let file_config = config::load(matches.get_one::<PathBuf>("config").map(PathBuf::as_path))?;
    let mut settings = ClientSettings::default();
    file_config.apply(&mut settings);
    if let Some(server) = matches.get_one::<String>("server") {
        settings.base_url = server.clone();
    }

    let script = cli::script(&matches, &file_config.download_dir());
    let engine = EngineHandle::new(settings).context("failed to set up the server client")?;
    let mut controller = app::Controller::new(engine).with_interrupts(watch_interrupts()?);

    let stdout = io::stdout();
    let mut renderer = render::Renderer::new(stdout.lock());
    match controller.run_script(script, &mut renderer) {
        Err(err) if err.kind() == io::ErrorKind::Interrupted => bail!("interrupted"),
        other => other?,
    }

    match controller.failures() {
        0 => Ok(()),
        1 => bail!("1 operation failed"),
        n => bail!("{n} operations failed"),
    }
}

/// Forwards every Ctrl-C as one `()` instead of killing the process.
fn watch_interrupts() -> anyhow::Result<mpsc::Receiver<()>> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to set up the interrupt watcher")?;
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        runtime.block_on(async move {
            while tokio::signal::ctrl_c().await.is_ok() {
                if tx.send(()).is_err() {
                    break;
                }
            }
        });
    });
    Ok(rx)
}
