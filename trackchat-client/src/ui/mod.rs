//! Terminal user interface
//!
//! Ratatui front end: a status bar, the scrollback and a single input line.

mod app;
mod event;
mod input;
mod render;
mod scroll;
mod status;
mod terminal;
mod theme;

pub use app::App;
