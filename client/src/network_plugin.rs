use battleship_common::gamestate_common::{BoardState, Square};
use battleship_common::messages_common::Envelope;
use battleship_common::network_common::{Transport, TransportEvent};
use battleship_common::sessionstate::{apply_effects, GameRenderer, SessionController, UiState, UiToolkit};
use bevy::prelude::*;
use tracing::error;
use url::Url;

use crate::clientstate::ClientState;

pub struct NetworkState {
    /// where the game is served from, decides between ws and wss
    pub origin: Url,
    /// the live connection, dropped once it reports `Closed`
    transport: Option<Transport>,
    controller: SessionController,
}

impl NetworkState {
    pub fn new(origin: Url) -> Self {
        NetworkState {
            origin,
            transport: None,
            controller: SessionController::new(),
        }
    }

    /// Opens a fresh connection, replacing whatever was there before.
    pub fn connect(&mut self) {
        if let Some(previous) = self.transport.take() {
            previous.close();
        }
        match Transport::connect(&self.origin) {
            Ok(transport) => self.transport = Some(transport),
            Err(e) => error!("Could not connect to {}: {}", self.origin, e),
        }
    }

    /// A connection attempt is running but has not opened yet.
    pub fn is_connecting(&self) -> bool {
        self.transport.is_some() && *self.controller.state() == UiState::Disconnected
    }

    pub fn socket_url(&self) -> Option<&Url> {
        self.transport.as_ref().map(Transport::url)
    }

    /// Feeds every pending transport event through the session and executes
    /// the resulting effects.
    pub fn pump(&mut self, ui: &mut impl UiToolkit, game: &mut impl GameRenderer) {
        let events = match &self.transport {
            Some(transport) => transport.drain(),
            None => return,
        };
        if events.contains(&TransportEvent::Closed) {
            self.transport = None;
        }
        for event in events {
            let effects = self.controller.handle(event.into());
            apply_effects(effects, &mut *ui, &mut *game);
        }
    }

    pub fn send_chat(&self, text: &str) {
        self.dispatch(self.controller.submit_chat(text));
    }

    pub fn send_leave(&self) {
        self.dispatch(self.controller.request_leave());
    }

    pub fn send_shot(&self, square: Square) {
        self.dispatch(self.controller.send_shot(&square));
    }

    fn dispatch(&self, envelope: Option<Envelope>) {
        if let (Some(envelope), Some(transport)) = (envelope, &self.transport) {
            transport.send(envelope);
        }
    }
}

fn connect_on_startup(mut networkstate: ResMut<NetworkState>) {
    networkstate.connect();
}

/// this system hands everything the server sent since the last frame to the session
fn update_network(
    mut networkstate: ResMut<NetworkState>,
    mut clientstate: ResMut<ClientState>,
    mut board: ResMut<BoardState>,
) {
    networkstate.pump(&mut clientstate.view, &mut *board);
}

pub struct NetworkPlugin {
    pub origin: Url,
}

impl Plugin for NetworkPlugin {
    fn build(&self, app: &mut App) {
        app.insert_resource(NetworkState::new(self.origin.clone()))
            .add_startup_system(connect_on_startup)
            .add_system(update_network);
    }
}
