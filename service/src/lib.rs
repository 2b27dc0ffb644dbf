#![deny(
    clippy::expect_used,
    clippy::panic,
    clippy::print_stdout,
    clippy::todo,
    clippy::unimplemented,
    clippy::unwrap_used
)]

pub mod app;
pub mod config;
pub mod csp;
pub mod csrf;
pub mod error;
pub mod http;
pub mod markdown;
pub mod settings;
pub mod static_files;
pub mod templates;

pub use app::AppState;
