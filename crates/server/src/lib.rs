//! HTTP and websocket surface of the signal relay, plus the supervised
//! background actors the binary runs next to it.

pub mod actors;
pub mod app;
pub mod config;
pub mod error;
pub mod extract;
pub mod routes;
pub mod services;
pub mod state;

pub use app::create_app;
pub use config::ServerConfig;
pub use state::AppState;
