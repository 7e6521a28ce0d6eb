#![cfg_attr(not(debug_assertions), windows_subsystem = "windows")] // hide console window on Windows in release
mod clientstate;
mod network_plugin;
mod ui;

use anyhow::Context;
use bevy::prelude::*;
use bevy_egui::EguiPlugin;
use clap::Parser;
use tracing_subscriber::EnvFilter;
use url::Url;

#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Args {
    /// Address the game is served from, `https://` switches to a secure socket
    #[clap(short, long, value_parser, default_value = "http://127.0.0.1:8000")]
    origin: String,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    let origin = Url::parse(&args.origin).with_context(|| format!("invalid origin `{}`", args.origin))?;
    // fail before the window opens rather than on the first connect
    battleship_common::network_common::socket_url(&origin)?;

    App::new()
        .insert_resource(WindowDescriptor {
            title: "Battleship".to_string(),
            ..Default::default()
        })
        // logging is already set up above
        .add_plugins_with(DefaultPlugins, |group| group.disable::<bevy::log::LogPlugin>())
        .add_plugin(EguiPlugin)
        .add_plugin(clientstate::ClientStatePlugin)
        .add_plugin(network_plugin::NetworkPlugin { origin })
        .add_system(ui::render_ui)
        .run();

    Ok(())
}
