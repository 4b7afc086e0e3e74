//! The session hub.
//!
//! One event loop owns every mutable piece of the session: the engine
//! registry, the game and the id counter. Observer readers only
//! forward lines into the client-event channel; engine event
//! forwarders only broadcast. Nothing else touches the state, so the
//! handlers below can stay plain sequential code.
//!
//! Observer-facing errors go back to the offending observer as
//! `output ... sender ERROR ...` lines and never tear the hub down.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Local;
use thiserror::Error;
use tokio::sync::mpsc;

use cfp_engine::{EngineEvent, EngineHandle, EnginePlayer};
use cfp_protocol::{format_time, EngineOption};
use cfp_types::{EngineId, ErrorCode, ObserverId, Side};

use crate::command::{CommandParser, HubCommand, Parsed};
use crate::config::ArenaConfig;
use crate::event::{ClientEvent, GameEvent, ServerEvent, WinnerCode};
use crate::game::Game;
use crate::paths::discover_engines;
use crate::roster::Roster;

/// Session hub errors.
#[derive(Debug, Error)]
pub enum HubError {
    /// The observer pool is full.
    #[error("observer limit of {0} reached")]
    ConnectionCap(usize),

    /// No observer has this id.
    #[error("no observer with id {0}")]
    NoSuchObserver(ObserverId),

    /// No loaded engine has this id.
    #[error("no engine with that id")]
    NoSuchEngine(EngineId),

    /// An engine with the same resolved path is already loaded.
    #[error("engine at '{0}' is already loaded")]
    DuplicateEngine(String),

    /// The engine has no option with this name.
    #[error("no option with that name")]
    NoSuchOption(String),

    /// The engine directory could not be read.
    #[error("couldn't read engine directory: {0}")]
    EngineDir(String),

    /// The engine directory has nothing loadable in it.
    #[error("no engines in engines directory")]
    NoEngines,
}

impl ErrorCode for HubError {
    fn code(&self) -> &'static str {
        match self {
            Self::ConnectionCap(_) => "HUB_CONNECTION_CAP",
            Self::NoSuchObserver(_) => "HUB_NO_SUCH_OBSERVER",
            Self::NoSuchEngine(_) => "HUB_NO_SUCH_ENGINE",
            Self::DuplicateEngine(_) => "HUB_DUPLICATE_ENGINE",
            Self::NoSuchOption(_) => "HUB_NO_SUCH_OPTION",
            Self::EngineDir(_) => "HUB_ENGINE_DIR_FAILED",
            Self::NoEngines => "HUB_NO_ENGINES",
        }
    }

    fn is_recoverable(&self) -> bool {
        // Connection churn and directory contents change over time.
        matches!(self, Self::ConnectionCap(_) | Self::NoEngines)
    }
}

struct EngineRecord {
    path: PathBuf,
    handle: Arc<EngineHandle>,
}

/// The session hub: engine registry, game and observer pool under one
/// event loop.
pub struct Hub {
    config: ArenaConfig,
    roster: Arc<Roster>,
    engines: BTreeMap<EngineId, EngineRecord>,
    next_engine_id: u32,
    game: Game,
    client_tx: mpsc::Sender<ClientEvent>,
    client_rx: mpsc::Receiver<ClientEvent>,
    game_rx: mpsc::Receiver<GameEvent>,
}

impl Hub {
    /// Builds a hub from its configuration.
    #[must_use]
    pub fn new(config: ArenaConfig) -> Self {
        let buffer = config.event_buffer.max(1);
        let (client_tx, client_rx) = mpsc::channel(buffer);
        let (game_tx, game_rx) = mpsc::channel(buffer);
        let game = Game::new();
        game.notify_events(game_tx);
        if let Err(err) = game.set_turn_time(config.turn_time()) {
            tracing::warn!(error = %err, "ignoring configured turn time");
        }
        Self {
            roster: Arc::new(Roster::new(config.max_observers)),
            engines: BTreeMap::new(),
            next_engine_id: 0,
            game,
            client_tx,
            client_rx,
            game_rx,
            config,
        }
    }

    /// The observer pool, shared with the transport.
    #[must_use]
    pub fn roster(&self) -> Arc<Roster> {
        Arc::clone(&self.roster)
    }

    /// A sender for observer lines; the transport clones one per
    /// connection.
    #[must_use]
    pub fn client_sender(&self) -> mpsc::Sender<ClientEvent> {
        self.client_tx.clone()
    }

    /// The configuration the hub was built with.
    #[must_use]
    pub fn config(&self) -> &ArenaConfig {
        &self.config
    }

    /// Runs the event loop. Never returns while the session lives.
    pub async fn run(mut self) {
        enum Next {
            Client(ClientEvent),
            Game(GameEvent),
            Closed,
        }
        loop {
            let next = tokio::select! {
                event = self.client_rx.recv() => event.map_or(Next::Closed, Next::Client),
                event = self.game_rx.recv() => event.map_or(Next::Closed, Next::Game),
            };
            match next {
                Next::Client(event) => self.handle_client(event).await,
                Next::Game(event) => self.handle_game_event(event).await,
                Next::Closed => break,
            }
        }
        tracing::debug!("hub event loop finished");
    }

    async fn handle_game_event(&mut self, event: GameEvent) {
        match event {
            GameEvent::NewState(board) => {
                self.broadcast(format!("position {}", board.encode())).await;
            }
            GameEvent::GameOver { winner } => {
                self.broadcast(format!("gameover winner {winner}")).await;
                self.broadcast_info("Game has finished").await;
            }
            GameEvent::Error(err) => {
                tracing::warn!(error = %err, code = err.code(), "turn loop aborted");
                self.broadcast(output_line("ERROR", &err.to_string())).await;
            }
        }
    }

    async fn handle_client(&mut self, event: ClientEvent) {
        match CommandParser::parse(&event.line) {
            Parsed::Empty | Parsed::Unknown => {}
            Parsed::Invalid(reason) => self.respond_error(event.observer, &reason).await,
            Parsed::Command(command) => self.dispatch(event.observer, command).await,
        }
    }

    async fn dispatch(&mut self, observer: ObserverId, command: HubCommand) {
        match command {
            HubCommand::Init => self.on_init(observer).await,
            HubCommand::NewGame => self.on_new_game(observer).await,
            HubCommand::SetPlayers { player1, player2 } => {
                self.on_set_players(observer, player1, player2).await;
            }
            HubCommand::Play => self.on_play(observer).await,
            HubCommand::Pause => self.on_pause(observer).await,
            HubCommand::EnginePaths => self.on_engine_paths(observer).await,
            HubCommand::EngineLoad { path } => self.on_engine_load(observer, &path).await,
            HubCommand::EngineUnload { id } => self.on_engine_unload(observer, id).await,
            HubCommand::Options { id } => self.on_options(observer, id).await,
            HubCommand::SetOption { id, name, value } => {
                self.on_set_option(observer, id, &name, value.as_deref()).await;
            }
        }
    }

    /// Answers `init` with the full session snapshot, to the requester
    /// only.
    async fn on_init(&self, observer: ObserverId) {
        for (id, record) in &self.engines {
            self.respond(
                observer,
                format!(
                    "engine load id {} name {} author {}",
                    id,
                    record.handle.name(),
                    record.handle.author()
                ),
            )
            .await;
        }
        let [player1, player2] = self.game.players();
        self.respond(
            observer,
            format!(
                "players player1 {} player2 {}",
                slot_text(player1),
                slot_text(player2)
            ),
        )
        .await;
        self.respond(observer, "newgame").await;
        for board in self.game.history() {
            self.respond(observer, format!("position {}", board.encode()))
                .await;
        }
        if self.game.is_running() {
            self.respond(observer, "play").await;
        }
        let outcome = self.game.current().outcome();
        if outcome.is_terminal() {
            self.respond(
                observer,
                format!("gameover winner {}", WinnerCode::from(outcome)),
            )
            .await;
        }
        self.respond(observer, output_line("INFO", "Connected successfully"))
            .await;
    }

    async fn on_new_game(&self, observer: ObserverId) {
        if let Err(err) = self.game.reset() {
            self.respond_error(observer, &err.to_string()).await;
            return;
        }
        self.broadcast("newgame".to_string()).await;
        self.broadcast(format!("position {}", self.game.current().encode()))
            .await;
        self.broadcast_info("Game has been reset").await;
    }

    async fn on_set_players(
        &self,
        observer: ObserverId,
        player1: Option<EngineId>,
        player2: Option<EngineId>,
    ) {
        let mut changed = false;
        for (side, requested) in [(Side::P1, player1), (Side::P2, player2)] {
            let Some(id) = requested else { continue };
            let Some(record) = self.engines.get(&id) else {
                self.respond_error(observer, &HubError::NoSuchEngine(id).to_string())
                    .await;
                return;
            };
            let player: Arc<dyn EnginePlayer> = record.handle.clone();
            if let Err(err) = self.game.set_player(side, id, player) {
                self.respond_error(observer, &err.to_string()).await;
                return;
            }
            changed = true;
        }
        if changed {
            let [a, b] = self.game.players();
            self.broadcast(format!(
                "players player1 {} player2 {}",
                slot_text(a),
                slot_text(b)
            ))
            .await;
            self.broadcast_info("New players have been set").await;
        }
    }

    async fn on_play(&self, observer: ObserverId) {
        if let Err(err) = self.game.play() {
            self.respond_error(observer, &err.to_string()).await;
            return;
        }
        self.broadcast("play".to_string()).await;
        self.broadcast_info("Started playing game").await;
    }

    async fn on_pause(&self, observer: ObserverId) {
        if let Err(err) = self.game.pause().await {
            self.respond_error(observer, &err.to_string()).await;
            return;
        }
        self.broadcast("pause".to_string()).await;
        self.broadcast_info("Paused game").await;
    }

    async fn on_engine_paths(&self, observer: ObserverId) {
        let discovered = match discover_engines(&self.config.engine_dir) {
            Ok(paths) => paths,
            Err(err) => {
                self.respond(observer, "noenginepaths").await;
                self.respond_error(observer, &err.to_string()).await;
                return;
            }
        };
        // Engines already loaded are not offered again.
        let available: Vec<String> = discovered
            .into_iter()
            .filter(|relative| {
                let absolute = self.absolute_engine_path(relative);
                !self.engines.values().any(|r| r.path == absolute)
            })
            .map(|p| p.display().to_string())
            .collect();
        if available.is_empty() {
            self.respond(observer, "noenginepaths").await;
            self.respond_error(observer, &HubError::NoEngines.to_string())
                .await;
        } else {
            self.respond(
                observer,
                format!("enginepaths path {}", available.join(" path ")),
            )
            .await;
        }
    }

    async fn on_engine_load(&mut self, observer: ObserverId, relative: &str) {
        let absolute = self.absolute_engine_path(Path::new(relative));
        if self.engines.values().any(|r| r.path == absolute) {
            let err = HubError::DuplicateEngine(relative.to_string());
            self.respond_error(observer, &err.to_string()).await;
            return;
        }
        let handle = match EngineHandle::spawn(&absolute, &self.config.engine_config()) {
            Ok(handle) => Arc::new(handle),
            Err(err) => {
                self.respond_error(observer, &format!("couldn't load engine: {err}"))
                    .await;
                return;
            }
        };
        // Wire the forwarder before the handshake so observers see the
        // handshake traffic too.
        let events = handle.event_stream(self.config.event_buffer.max(1)).await;
        tokio::spawn(forward_engine_events(
            events,
            Arc::clone(&handle),
            Arc::clone(&self.roster),
        ));
        if let Err(err) = handle.load().await {
            self.respond_error(observer, &format!("couldn't load engine: {err}"))
                .await;
            return;
        }
        let id = EngineId::new(self.next_engine_id);
        self.next_engine_id += 1;
        self.engines.insert(
            id,
            EngineRecord {
                path: absolute,
                handle: Arc::clone(&handle),
            },
        );
        tracing::info!(engine = %handle.name(), %id, "engine loaded");
        self.broadcast(format!(
            "engine load id {} name {} author {}",
            id,
            handle.name(),
            handle.author()
        ))
        .await;
        self.broadcast_info("Engine loaded successfully").await;
    }

    async fn on_engine_unload(&mut self, observer: ObserverId, id: EngineId) {
        let Some(record) = self.engines.get(&id) else {
            self.respond_error(observer, &HubError::NoSuchEngine(id).to_string())
                .await;
            return;
        };
        let handle = Arc::clone(&record.handle);

        // Free any seat the engine occupies first; that fails while a
        // game is running, and then the engine stays loaded.
        let [player1, player2] = self.game.players();
        for (side, seated) in [(Side::P1, player1), (Side::P2, player2)] {
            if seated == Some(id) {
                if let Err(err) = self.game.clear_player(side) {
                    self.respond_error(observer, &err.to_string()).await;
                    return;
                }
            }
        }
        if let Err(err) = handle.quit().await {
            self.respond_error(observer, &format!("couldn't unload engine: {err}"))
                .await;
            return;
        }
        self.engines.remove(&id);
        tracing::info!(%id, "engine unloaded");
        self.broadcast(format!("engine unload id {id}")).await;
        self.broadcast_info("Engine has been disconnected").await;
    }

    async fn on_options(&self, observer: ObserverId, id: EngineId) {
        let Some(record) = self.engines.get(&id) else {
            self.respond_error(observer, &HubError::NoSuchEngine(id).to_string())
                .await;
            return;
        };
        let options = record.handle.options();
        if options.is_empty() {
            self.respond(observer, "nooptions").await;
            return;
        }
        // BTreeMap iteration gives the name-sorted order the protocol
        // asks for.
        for (name, option) in options {
            self.respond(
                observer,
                format!("option engineid {id} name {name} {}", option.describe()),
            )
            .await;
        }
    }

    async fn on_set_option(
        &self,
        observer: ObserverId,
        id: EngineId,
        name: &str,
        value: Option<&str>,
    ) {
        let Some(record) = self.engines.get(&id) else {
            self.respond_error(observer, &HubError::NoSuchEngine(id).to_string())
                .await;
            return;
        };
        let Some(current) = record.handle.option(name) else {
            self.respond_error(observer, &HubError::NoSuchOption(name.to_string()).to_string())
                .await;
            return;
        };
        let (updated, canonical) = match current.with_value(value.unwrap_or_default()) {
            Ok(result) => result,
            Err(err) => {
                self.respond_error(observer, &err.to_string()).await;
                return;
            }
        };
        if let Err(err) = record.handle.set_option(&updated).await {
            self.respond_error(observer, &format!("couldn't set option: {err}"))
                .await;
            return;
        }
        // Button triggers have no value to report.
        if !matches!(updated, EngineOption::Button { .. }) {
            self.broadcast(format!(
                "updateoption engineid {id} name {} value {canonical}",
                updated.name()
            ))
            .await;
        }
    }

    fn absolute_engine_path(&self, relative: &Path) -> PathBuf {
        let joined = self.config.engine_dir.join(relative);
        joined.canonicalize().unwrap_or(joined)
    }

    async fn broadcast(&self, line: String) {
        self.roster.broadcast(ServerEvent(line)).await;
    }

    async fn broadcast_info(&self, message: &str) {
        self.broadcast(output_line("INFO", message)).await;
    }

    async fn respond(&self, observer: ObserverId, line: impl Into<String>) {
        // A vanished observer is not an error worth reporting to
        // anyone.
        let _ = self.roster.respond(observer, line).await;
    }

    async fn respond_error(&self, observer: ObserverId, message: &str) {
        self.respond(observer, output_line("ERROR", message)).await;
    }
}

fn slot_text(id: Option<EngineId>) -> String {
    id.map_or_else(|| "-1".to_string(), |id| id.to_string())
}

/// Formats an `output` line with the current wall-clock time.
fn output_line(sender: &str, message: &str) -> String {
    format!(
        "output time {} sender {} message {}",
        format_time(&Local::now()),
        sender,
        message
    )
}

/// Per-engine forwarder: turns [`EngineEvent`]s into observer
/// broadcasts. Runs until the engine's event stream closes.
async fn forward_engine_events(
    mut events: mpsc::Receiver<EngineEvent>,
    handle: Arc<EngineHandle>,
    roster: Arc<Roster>,
) {
    while let Some(event) = events.recv().await {
        let line = match event {
            EngineEvent::Info(message) => output_line(&handle.name(), &message),
            EngineEvent::Comm(comm) => format!(
                "communication time {} engine {} toengine {} message {}",
                format_time(&comm.time),
                handle.name(),
                comm.to_engine,
                comm.message
            ),
        };
        roster.broadcast(ServerEvent(line)).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cfp_types::assert_error_codes;

    #[test]
    fn error_codes_are_well_formed() {
        assert_error_codes(
            &[
                HubError::ConnectionCap(100),
                HubError::NoSuchObserver(ObserverId::new(1)),
                HubError::NoSuchEngine(EngineId::new(0)),
                HubError::DuplicateEngine("x".into()),
                HubError::NoSuchOption("x".into()),
                HubError::EngineDir("x".into()),
                HubError::NoEngines,
            ],
            "HUB_",
        );
    }

    #[test]
    fn slot_text_uses_minus_one_for_empty() {
        assert_eq!(slot_text(None), "-1");
        assert_eq!(slot_text(Some(EngineId::new(4))), "4");
    }

    #[test]
    fn output_lines_carry_sender_and_message() {
        let line = output_line("INFO", "Connected successfully");
        assert!(line.starts_with("output time "));
        assert!(line.contains(" sender INFO message Connected successfully"));
    }
}
