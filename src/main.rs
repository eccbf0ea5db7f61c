#![windows_subsystem = "windows"]

mod capture;
mod config;
mod hotkeys;
mod notify;
mod recording;
mod ui;

use iced::{window, Size};
use tracing_subscriber::EnvFilter;

fn main() -> iced::Result {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    iced::application(ui::App::title, ui::App::update, ui::App::view)
        .subscription(ui::App::subscription)
        .theme(ui::App::theme)
        .window(window::Settings {
            size: Size::new(520.0, 440.0),
            resizable: false,
            decorations: true,
            ..Default::default()
        })
        .run_with(ui::App::new)
}
