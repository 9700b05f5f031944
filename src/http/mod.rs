pub mod handlers;
pub mod types;

pub use handlers::{AppState, configure_routes};
