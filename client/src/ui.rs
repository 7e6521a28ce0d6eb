use battleship_common::gamestate_common::{
    BoardState, CellMark, Grid, Square, Turn, GRID_COLS, GRID_ROWS, OPPONENT_GRID, OWN_GRID,
};
use battleship_common::sessionstate::Panel;
use bevy::prelude::*;
use bevy_egui::EguiContext;
use egui::{Color32, RichText};

use crate::clientstate::ClientState;
use crate::network_plugin::NetworkState;

const CELL_SIZE: f32 = 26.0;

/// this system handles rendering the ui
pub fn render_ui(
    mut egui_context: ResMut<EguiContext>,
    mut networkstate: ResMut<NetworkState>,
    mut clientstate: ResMut<ClientState>,
    board: Res<BoardState>,
) {
    let ctx = egui_context.ctx_mut();
    match clientstate.view.visible_panel() {
        Some(Panel::WaitingRoom) => render_waiting_room_view(ctx),
        Some(Panel::Game) => render_ingame_view(ctx, &mut networkstate, &mut clientstate, &board),
        Some(Panel::Disconnected) | None => render_disconnected_view(ctx, &mut networkstate),
    }
}

fn render_disconnected_view(ctx: &egui::Context, networkstate: &mut NetworkState) {
    egui::CentralPanel::default().show(ctx, |ui| {
        ui.heading("Battleship");
        if networkstate.is_connecting() {
            let target = networkstate
                .socket_url()
                .map_or_else(|| networkstate.origin.to_string(), ToString::to_string);
            ui.label(format!("Connecting to {} ...", target));
        } else {
            ui.label("Disconnected from server.");
            if ui.button("Reconnect").clicked() {
                networkstate.connect();
            }
        }
    });
}

fn render_waiting_room_view(ctx: &egui::Context) {
    egui::CentralPanel::default().show(ctx, |ui| {
        ui.heading("Waiting room");
        ui.label("Waiting for an opponent to join ...");
    });
}

fn render_ingame_view(
    ctx: &egui::Context,
    networkstate: &mut NetworkState,
    clientstate: &mut ClientState,
    board: &BoardState,
) {
    egui::SidePanel::right(Panel::Game.id()).show(ctx, |ui| {
        render_chat_area(ui, networkstate, clientstate);
        ui.separator();
        if ui.button("Leave game").clicked() {
            networkstate.send_leave();
        }
    });

    egui::CentralPanel::default().show(ctx, |ui| {
        let game_number = clientstate.view.game_number.as_deref().unwrap_or("?");
        ui.heading(format!("Game #{}", game_number));
        ui.label(turn_text(board.turn()));
        ui.add_space(8.0);

        ui.horizontal(|ui| {
            ui.vertical(|ui| {
                ui.label("Your fleet");
                render_grid(ui, "own_grid", board.grid(OWN_GRID), |_| false);
            });
            ui.add_space(24.0);
            ui.vertical(|ui| {
                ui.label("Opponent");
                let target = render_grid(ui, "opponent_grid", board.grid(OPPONENT_GRID), |square| {
                    board.can_shoot(square)
                });
                if let Some(square) = target {
                    networkstate.send_shot(square);
                }
            });
        });
    });

    if let Some(is_winner) = board.game_over() {
        egui::Window::new("Game over")
            .collapsible(false)
            .resizable(false)
            .anchor(egui::Align2::CENTER_CENTER, [0.0, 0.0])
            .show(ctx, |ui| {
                if is_winner {
                    ui.heading(RichText::new("You won!").color(Color32::GREEN));
                } else {
                    ui.heading(RichText::new("You lost.").color(Color32::RED));
                }
                if ui.button("Back to waiting room").clicked() {
                    networkstate.send_leave();
                }
            });
    }
}

fn turn_text(turn: Option<Turn>) -> String {
    match turn {
        Some(Turn::Mine(true)) => "Your turn".to_string(),
        Some(Turn::Mine(false)) => "Opponent's turn".to_string(),
        Some(Turn::Player(id)) => format!("Player {}'s turn", id),
        None => String::new(),
    }
}

/// Draws one 10x10 board and returns the square that was clicked, if any.
fn render_grid(
    ui: &mut egui::Ui,
    id: &str,
    grid: Option<&Grid>,
    shootable: impl Fn(Square) -> bool,
) -> Option<Square> {
    let mut clicked = None;
    egui::Grid::new(id).spacing([2.0, 2.0]).show(ui, |ui| {
        for y in 0..GRID_ROWS {
            for x in 0..GRID_COLS {
                let square = Square { x, y };
                let (text, fill) = cell_look(grid, square);
                let button = egui::Button::new(text).fill(fill);
                let response = ui
                    .add_enabled_ui(shootable(square), |ui| ui.add_sized([CELL_SIZE, CELL_SIZE], button))
                    .inner;
                if response.clicked() {
                    clicked = Some(square);
                }
            }
            ui.end_row();
        }
    });
    clicked
}

fn cell_look(grid: Option<&Grid>, square: Square) -> (RichText, Color32) {
    let grid = match grid {
        Some(grid) => grid,
        None => return (RichText::new(" "), Color32::from_gray(40)),
    };
    let ship = grid.ship_at(square.x, square.y);
    match (grid.mark(square.x, square.y), ship) {
        (CellMark::Hit, Some(ship)) if ship.is_sunk() => {
            (RichText::new("X").color(Color32::WHITE), Color32::from_rgb(120, 20, 20))
        }
        (CellMark::Hit, _) => (RichText::new("X").color(Color32::WHITE), Color32::from_rgb(200, 50, 50)),
        (CellMark::Miss, _) => (RichText::new("o").color(Color32::LIGHT_GRAY), Color32::from_rgb(30, 60, 110)),
        (CellMark::Untouched, Some(_)) => (RichText::new(" "), Color32::from_rgb(110, 110, 130)),
        (CellMark::Untouched, None) => (RichText::new(" "), Color32::from_rgb(40, 80, 140)),
    }
}

fn render_chat_area(ui: &mut egui::Ui, networkstate: &mut NetworkState, clientstate: &mut ClientState) {
    ui.heading("Chat");
    let scroll_to_end = clientstate.view.take_scroll_request();
    egui::ScrollArea::vertical()
        .auto_shrink([false; 2])
        .stick_to_bottom()
        .max_height(300.0)
        .show(ui, |ui| {
            for entry in &clientstate.view.chat_log {
                match &entry.name {
                    Some(name) => {
                        ui.horizontal_wrapped(|ui| {
                            ui.label(RichText::new(format!("{}:", name)).strong());
                            ui.label(&entry.message);
                        });
                    }
                    None => {
                        ui.label(RichText::new(&entry.message).italics());
                    }
                }
            }
            if scroll_to_end {
                ui.scroll_to_cursor(Some(egui::Align::BOTTOM));
            }
        });

    ui.horizontal(|ui| {
        ui.label("Message: ");
        let input = ui.text_edit_singleline(&mut clientstate.chat_message_input);
        let submitted = input.lost_focus() && ui.input().key_pressed(egui::Key::Enter);
        if (ui.button("Send").clicked() || submitted) && !clientstate.chat_message_input.is_empty() {
            networkstate.send_chat(&clientstate.chat_message_input);
            clientstate.chat_message_input.clear();
            input.request_focus();
        }
    });
}
