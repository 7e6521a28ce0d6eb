use serde::Serialize;
use serde_json::Value;
use std::fmt;
use tracing::{debug, info, warn};

use crate::gamestate_common::{GameState, Turn};
use crate::messages_common::{
    decode_payload, encode_payload, ChatMessage, Envelope, EventKind, GameOverResult, Notification,
    ProtocolError,
};
use crate::network_common::TransportEvent;

/// The three mutually exclusive regions of the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Panel {
    Disconnected,
    WaitingRoom,
    Game,
}

impl Panel {
    pub const ALL: [Panel; 3] = [Panel::Disconnected, Panel::WaitingRoom, Panel::Game];

    pub fn id(&self) -> &'static str {
        match self {
            Panel::Disconnected => "disconnected",
            Panel::WaitingRoom => "waiting-room",
            Panel::Game => "game",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum UiState {
    #[default]
    Disconnected,
    WaitingRoom,
    /// carries the game id the server announced with `join`
    InGame(String),
}

impl UiState {
    pub fn panel(&self) -> Panel {
        match self {
            UiState::Disconnected => Panel::Disconnected,
            UiState::WaitingRoom => Panel::WaitingRoom,
            UiState::InGame(_) => Panel::Game,
        }
    }
}

/// A line in the chat log. Notifications have no sender.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatEntry {
    pub name: Option<String>,
    pub message: String,
}

impl fmt::Display for ChatEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) => write!(f, "{}: {}", name, self.message),
            None => f.write_str(&self.message),
        }
    }
}

/// Calls into the rendering collaborator.
#[derive(Debug, Clone, PartialEq)]
pub enum RenderCall {
    InitGame,
    SetTurn(Turn),
    UpdateGrid { grid_index: i64, grid: Value },
    SetGameOver(bool),
}

#[derive(Debug, Clone, PartialEq)]
pub enum UiEffect {
    ShowPanel(Panel),
    HidePanel(Panel),
    ClearChatLog,
    AppendChat(ChatEntry),
    ScrollChatToBottom,
    SetGameNumber(Option<String>),
    Render(RenderCall),
}

/// Everything that can drive the session forward.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    Opened,
    Closed,
    Frame(Envelope),
}

impl From<TransportEvent> for Inbound {
    fn from(event: TransportEvent) -> Self {
        match event {
            TransportEvent::Opened => Inbound::Opened,
            TransportEvent::Closed => Inbound::Closed,
            TransportEvent::Message(envelope) => Inbound::Frame(envelope),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub state: UiState,
    pub effects: Vec<UiEffect>,
}

/// Hides every other panel before showing `panel`, so no input sequence can
/// leave two panels visible.
fn switch_to(panel: Panel) -> Vec<UiEffect> {
    let mut effects: Vec<UiEffect> = Panel::ALL
        .iter()
        .filter(|other| **other != panel)
        .map(|other| UiEffect::HidePanel(*other))
        .collect();
    effects.push(UiEffect::ShowPanel(panel));
    effects
}

/// Computes the next state and the UI effects for one input.
///
/// # Arguments
/// * `state` - The current state of the session.
/// * `input` - A lifecycle signal or a frame from the server.
///
/// # Returns
/// * `Ok(transition)` - The new state with the effects to execute in order.
/// * `Err(ProtocolError::Payload)` - The frame's payload could not be decoded,
///   the state must stay as it is.
///
pub fn transition(state: &UiState, input: &Inbound) -> Result<Transition, ProtocolError> {
    let frame = match input {
        Inbound::Opened => {
            return Ok(Transition {
                state: UiState::WaitingRoom,
                effects: switch_to(Panel::WaitingRoom),
            })
        }
        Inbound::Closed => {
            let mut effects = switch_to(Panel::Disconnected);
            effects.push(UiEffect::ClearChatLog);
            effects.push(UiEffect::SetGameNumber(None));
            return Ok(Transition {
                state: UiState::Disconnected,
                effects,
            });
        }
        Inbound::Frame(frame) => frame,
    };

    let unchanged = |effects: Vec<UiEffect>| Transition {
        state: state.clone(),
        effects,
    };

    let next = match &frame.event {
        EventKind::Join => {
            // the game id is sent raw, not as a JSON document
            let game_id = frame.message.clone();
            let mut effects = vec![UiEffect::Render(RenderCall::InitGame), UiEffect::ClearChatLog];
            effects.extend(switch_to(Panel::Game));
            effects.push(UiEffect::SetGameNumber(Some(game_id.clone())));
            Transition {
                state: UiState::InGame(game_id),
                effects,
            }
        }
        EventKind::Update => {
            let game_state: GameState = decode_payload(&frame.event, &frame.message)?;
            unchanged(vec![
                UiEffect::Render(RenderCall::SetTurn(game_state.turn)),
                UiEffect::Render(RenderCall::UpdateGrid {
                    grid_index: game_state.grid_index,
                    grid: game_state.grid,
                }),
            ])
        }
        EventKind::Chat => {
            let chat: ChatMessage = decode_payload(&frame.event, &frame.message)?;
            unchanged(vec![
                UiEffect::AppendChat(ChatEntry {
                    name: Some(chat.name),
                    message: chat.message,
                }),
                UiEffect::ScrollChatToBottom,
            ])
        }
        EventKind::Notification => {
            let notification: Notification = decode_payload(&frame.event, &frame.message)?;
            unchanged(vec![
                UiEffect::AppendChat(ChatEntry {
                    name: None,
                    message: notification.message,
                }),
                UiEffect::ScrollChatToBottom,
            ])
        }
        EventKind::GameOver => {
            let result: GameOverResult = decode_payload(&frame.event, &frame.message)?;
            unchanged(vec![UiEffect::Render(RenderCall::SetGameOver(result.is_winner))])
        }
        EventKind::Leave => Transition {
            state: UiState::WaitingRoom,
            effects: switch_to(Panel::WaitingRoom),
        },
        // outbound only, or nothing this client understands
        EventKind::Shot | EventKind::Unknown(_) => unchanged(Vec::new()),
    };
    Ok(next)
}

/// Owns the session state and turns inputs into effects and user actions
/// into outgoing envelopes.
#[derive(Debug, Default)]
pub struct SessionController {
    state: UiState,
}

impl SessionController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &UiState {
        &self.state
    }

    /// Advances the session by one input. Frames with a broken payload are
    /// dropped and produce no effects.
    pub fn handle(&mut self, input: Inbound) -> Vec<UiEffect> {
        match transition(&self.state, &input) {
            Ok(next) => {
                if next.state != self.state {
                    info!("Session {:?} -> {:?}", self.state, next.state);
                }
                self.state = next.state;
                next.effects
            }
            Err(e) => {
                warn!("Dropping frame: {}", e);
                Vec::new()
            }
        }
    }

    pub fn submit_chat(&self, text: &str) -> Option<Envelope> {
        self.outbound(Envelope::new(EventKind::Chat, text))
    }

    pub fn request_leave(&self) -> Option<Envelope> {
        self.outbound(Envelope::new(EventKind::Leave, ""))
    }

    /// Wraps `square` into a `shot` envelope without looking at it.
    pub fn send_shot<S: Serialize + ?Sized>(&self, square: &S) -> Option<Envelope> {
        match encode_payload(EventKind::Shot, square) {
            Ok(envelope) => self.outbound(envelope),
            Err(e) => {
                warn!("Dropping shot: {}", e);
                None
            }
        }
    }

    fn outbound(&self, envelope: Envelope) -> Option<Envelope> {
        if self.state == UiState::Disconnected {
            debug!("Not connected, dropping outgoing `{}`", envelope.event);
            return None;
        }
        Some(envelope)
    }
}

/// Panel visibility and chat log.
#[cfg_attr(test, mockall::automock)]
pub trait UiToolkit {
    fn show_panel(&mut self, panel: Panel);
    fn hide_panel(&mut self, panel: Panel);
    fn clear_chat_log(&mut self);
    fn append_chat(&mut self, entry: ChatEntry);
    fn scroll_chat_to_bottom(&mut self);
    fn set_game_number(&mut self, game_id: Option<String>);
}

/// The component that draws grids, the turn marker and the game-over screen.
#[cfg_attr(test, mockall::automock)]
pub trait GameRenderer {
    fn init_game(&mut self);
    fn update_grid(&mut self, grid_index: i64, grid: Value);
    fn set_turn(&mut self, turn: Turn);
    fn set_game_over(&mut self, is_winner: bool);
}

/// Executes effects in order against the UI and the renderer.
pub fn apply_effects<U, G>(effects: Vec<UiEffect>, ui: &mut U, game: &mut G)
where
    U: UiToolkit + ?Sized,
    G: GameRenderer + ?Sized,
{
    for effect in effects {
        match effect {
            UiEffect::ShowPanel(panel) => ui.show_panel(panel),
            UiEffect::HidePanel(panel) => ui.hide_panel(panel),
            UiEffect::ClearChatLog => ui.clear_chat_log(),
            UiEffect::AppendChat(entry) => ui.append_chat(entry),
            UiEffect::ScrollChatToBottom => ui.scroll_chat_to_bottom(),
            UiEffect::SetGameNumber(game_id) => ui.set_game_number(game_id),
            UiEffect::Render(RenderCall::InitGame) => game.init_game(),
            UiEffect::Render(RenderCall::SetTurn(turn)) => game.set_turn(turn),
            UiEffect::Render(RenderCall::UpdateGrid { grid_index, grid }) => game.update_grid(grid_index, grid),
            UiEffect::Render(RenderCall::SetGameOver(is_winner)) => game.set_game_over(is_winner),
        }
    }
}

/// In-memory UI model: which panels are visible, the chat log and the
/// displayed game number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionView {
    disconnected: bool,
    waiting_room: bool,
    game: bool,
    pub chat_log: Vec<ChatEntry>,
    pub game_number: Option<String>,
    scroll_requested: bool,
}

impl Default for SessionView {
    fn default() -> Self {
        SessionView {
            disconnected: true,
            waiting_room: false,
            game: false,
            chat_log: Vec::new(),
            game_number: None,
            scroll_requested: false,
        }
    }
}

impl SessionView {
    pub fn is_visible(&self, panel: Panel) -> bool {
        match panel {
            Panel::Disconnected => self.disconnected,
            Panel::WaitingRoom => self.waiting_room,
            Panel::Game => self.game,
        }
    }

    pub fn visible_panel(&self) -> Option<Panel> {
        Panel::ALL.into_iter().find(|panel| self.is_visible(*panel))
    }

    pub fn visible_count(&self) -> usize {
        Panel::ALL.iter().filter(|panel| self.is_visible(**panel)).count()
    }

    /// Returns whether the chat should scroll to its end, once per request.
    pub fn take_scroll_request(&mut self) -> bool {
        std::mem::take(&mut self.scroll_requested)
    }

    fn flag(&mut self, panel: Panel) -> &mut bool {
        match panel {
            Panel::Disconnected => &mut self.disconnected,
            Panel::WaitingRoom => &mut self.waiting_room,
            Panel::Game => &mut self.game,
        }
    }
}

impl UiToolkit for SessionView {
    fn show_panel(&mut self, panel: Panel) {
        *self.flag(panel) = true;
    }

    fn hide_panel(&mut self, panel: Panel) {
        *self.flag(panel) = false;
    }

    fn clear_chat_log(&mut self) {
        self.chat_log.clear();
    }

    fn append_chat(&mut self, entry: ChatEntry) {
        self.chat_log.push(entry);
    }

    fn scroll_chat_to_bottom(&mut self) {
        self.scroll_requested = true;
    }

    fn set_game_number(&mut self, game_id: Option<String>) {
        self.game_number = game_id;
    }
}
