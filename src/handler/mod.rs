pub mod error;
pub mod scheduler;
pub mod ws_handler;
