pub mod commands;
pub mod confirm;
pub mod logging;
pub mod progress;
