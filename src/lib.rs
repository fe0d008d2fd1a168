pub mod config;
pub mod errors;
pub mod pipeline;
pub mod poller;
pub mod providers;
pub mod server;
pub mod store;
