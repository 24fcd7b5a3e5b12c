pub mod health;
pub mod media;
pub mod websocket;

// Re-export all handlers for easy route registration
pub use health::{health_handler, health_live_handler};
pub use media::{download_handler, upload_handler};
pub use websocket::{handle_socket, websocket_handler};
