use battleship_common::gamestate_common::BoardState;
use battleship_common::sessionstate::SessionView;
use bevy::prelude::*;

#[derive(Default)]
pub struct ClientState {
    /// visible panel, chat log and game number, driven by session effects
    pub view: SessionView,
    /// clients text in the input field of the chat section
    pub chat_message_input: String,
}

pub struct ClientStatePlugin;

impl Plugin for ClientStatePlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<ClientState>()
            .init_resource::<BoardState>();
    }
}
