use std::process::exit;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::sync::mpsc;
use tracing::{error, info};

use devdash::config::{self, Cli};
use devdash::coordinator::{self, ConfigSource, Coordinator};
use devdash::dispatch::Dispatcher;
use devdash::services::Backends;
use devdash::ui::input::KeyMap;
use devdash::ui::{self, LogScreen, RenderContext, RenderMode};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let guard = devdash::logging::init(cli.debug);

    let code = match run(cli).await {
        Ok(()) => 0,
        Err(e) => {
            error!("devdash stopped: {:#}", e);
            eprintln!("devdash: {:#}", e);
            1
        }
    };
    // Flush buffered log lines before exiting.
    drop(guard);
    exit(code);
}

async fn run(cli: Cli) -> Result<()> {
    let path = match &cli.config {
        Some(path) => path.clone(),
        None => config::default_config_path()?,
    };
    let mut config = config::load(&path)
        .with_context(|| format!("cannot load configuration {}", path.display()))?;
    config.apply_cli(&cli);
    config.validate()?;
    info!(path = %path.display(), projects = config.projects.len(), "configuration loaded");

    let keys = KeyMap {
        quit: config.quit_key()?,
        reload: config.reload_key()?,
    };
    let refresh = Duration::from_secs(config.general.refresh);
    let source = ConfigSource {
        path,
        overrides: cli.clone(),
    };
    let dispatcher = Dispatcher::new(Backends::default());

    let (mailbox, triggers) = coordinator::mailbox();
    let (quit_tx, quit_rx) = mpsc::channel(1);

    if cli.debug {
        let mut coordinator = Coordinator::new(LogScreen, dispatcher, config, RenderContext::new(RenderMode::Debug));
        coordinator.run(triggers, quit_rx).await?;
        return Ok(());
    }

    let terminal = ui::setup_terminal().context("cannot set up the terminal")?;
    let ticker = coordinator::spawn_ticker(mailbox.clone(), refresh);
    let relay = coordinator::spawn_key_relay(keys, mailbox, quit_tx);

    let mut coordinator =
        Coordinator::new(terminal, dispatcher, config, RenderContext::default()).with_source(source);
    let result = coordinator.run(triggers, quit_rx).await;

    let mut terminal = coordinator.into_screen();
    ui::restore_terminal(&mut terminal)?;
    ticker.abort();
    let _ = relay.join();

    result.map_err(Into::into)
}
