//! Refresh loop.
//!
//! One consumer owns the screen and renders. Ticks from the refresh timer
//! and reload key presses are posted to a single-slot mailbox: while a pass
//! is running at most one trigger waits, later ones are dropped, so passes
//! never overlap and bursts collapse into one redraw. Quitting goes through
//! its own channel so it is never dropped.

use std::path::PathBuf;
use std::thread;
use std::time::Duration;

use crossterm::event::{self, Event, KeyEvent};
use tokio::sync::mpsc::{self, Receiver, Sender, error::TrySendError};
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, info, warn};

use crate::config::{self, Cli, Config};
use crate::dispatch::Dispatcher;
use crate::services::WidgetContext;
use crate::task::RenderError;
use crate::ui::input::{Action, KeyMap};
use crate::ui::{RenderContext, RenderMode, Refresh, Screen};

const KEY_POLL: Duration = Duration::from_millis(200);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    Tick,
    Reload,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Idle,
    Rendering,
}

/// Sending half of the trigger mailbox.
#[derive(Debug, Clone)]
pub struct Mailbox {
    tx: Sender<Trigger>,
}

pub fn mailbox() -> (Mailbox, Receiver<Trigger>) {
    let (tx, rx) = mpsc::channel(1);
    (Mailbox { tx }, rx)
}

impl Mailbox {
    /// Returns false when the trigger was dropped, either because one is
    /// already waiting or because the consumer is gone.
    pub fn post(&self, trigger: Trigger) -> bool {
        match self.tx.try_send(trigger) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                debug!(?trigger, "trigger coalesced with a pending one");
                false
            }
            Err(TrySendError::Closed(_)) => false,
        }
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Post a tick every `period`, starting one period from now.
pub fn spawn_ticker(mailbox: Mailbox, period: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            if mailbox.is_closed() {
                break;
            }
            mailbox.post(Trigger::Tick);
        }
    })
}

/// Route one key press. Returns false once the relay should stop.
pub fn relay_key(keys: &KeyMap, key: &KeyEvent, mailbox: &Mailbox, quit: &Sender<()>) -> bool {
    match keys.action(key) {
        Some(Action::Quit) => {
            let _ = quit.try_send(());
            false
        }
        Some(Action::Reload) => {
            mailbox.post(Trigger::Reload);
            true
        }
        None => true,
    }
}

/// Read terminal key events on a dedicated thread until quit is pressed or
/// the consumer goes away.
pub fn spawn_key_relay(keys: KeyMap, mailbox: Mailbox, quit: Sender<()>) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        while !quit.is_closed() {
            match event::poll(KEY_POLL) {
                Ok(true) => {}
                Ok(false) => continue,
                Err(e) => {
                    warn!(error = %e, "cannot poll terminal events");
                    let _ = quit.try_send(());
                    break;
                }
            }
            let Ok(Event::Key(key)) = event::read() else {
                continue;
            };
            if !relay_key(&keys, &key, &mailbox, &quit) {
                break;
            }
        }
    })
}

/// Where reloads read the configuration from.
#[derive(Debug, Clone)]
pub struct ConfigSource {
    pub path: PathBuf,
    pub overrides: Cli,
}

impl ConfigSource {
    pub fn load(&self) -> Result<Config, config::ConfigError> {
        let mut config = config::load(&self.path)?;
        config.apply_cli(&self.overrides);
        config.validate()?;
        Ok(config)
    }
}

pub struct Coordinator<S: Screen> {
    screen: S,
    dispatcher: Dispatcher,
    config: Config,
    source: Option<ConfigSource>,
    ctx: RenderContext,
    state: State,
}

impl<S: Screen> Coordinator<S> {
    pub fn new(screen: S, dispatcher: Dispatcher, config: Config, ctx: RenderContext) -> Self {
        Self {
            screen,
            dispatcher,
            config,
            source: None,
            ctx,
            state: State::Idle,
        }
    }

    /// Re-read the configuration from `source` before every triggered pass.
    pub fn with_source(mut self, source: ConfigSource) -> Self {
        self.source = Some(source);
        self
    }

    pub fn state(&self) -> State {
        self.state
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn screen(&self) -> &S {
        &self.screen
    }

    /// Dispatch every project and hand the result to the screen.
    pub fn render_pass(&mut self, refresh: Refresh) -> Result<(), RenderError> {
        self.state = State::Rendering;
        let widget_ctx = WidgetContext::now();
        let projects = self.dispatcher.dispatch(&self.config, &widget_ctx);
        let result = self.screen.present(&projects, refresh, &self.ctx);
        self.state = State::Idle;
        result
    }

    /// Reload the configuration if there is a source, then redraw.
    pub fn handle(&mut self, trigger: Trigger) -> Result<(), RenderError> {
        if let Some(source) = &self.source {
            match source.load() {
                Ok(config) => {
                    debug!(path = %source.path.display(), "configuration reloaded");
                    self.config = config;
                }
                Err(e) => warn!(error = %e, ?trigger, "reload failed, keeping the previous configuration"),
            }
        }
        let refresh = if self.config.general.hot_reload {
            Refresh::Soft
        } else {
            Refresh::Hard
        };
        debug!(?trigger, ?refresh, "refresh");
        self.render_pass(refresh)
    }

    pub fn into_screen(self) -> S {
        self.screen
    }

    /// Render once, then serve triggers until quit. In debug mode the first
    /// pass is the only one.
    pub async fn run(&mut self, mut triggers: Receiver<Trigger>, mut quit: Receiver<()>) -> Result<(), RenderError> {
        self.render_pass(Refresh::Hard)?;
        if self.ctx.mode == RenderMode::Debug {
            return Ok(());
        }

        info!(projects = self.config.projects.len(), "dashboard running");
        loop {
            tokio::select! {
                biased;
                _ = quit.recv() => break,
                trigger = triggers.recv() => match trigger {
                    Some(trigger) => self.handle(trigger)?,
                    None => break,
                },
            }
        }
        info!("dashboard stopped");
        Ok(())
    }
}
