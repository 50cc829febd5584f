pub mod config;
pub mod logging;
pub mod middleware;
pub mod partition;
pub mod ws_broadcast;
