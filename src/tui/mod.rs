pub mod app;
pub mod ui;

pub use app::{App, InputMode, Screen};
pub use ui::run_tui;
