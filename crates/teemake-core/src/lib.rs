pub mod execution;
pub mod host;
pub mod models;
pub mod pipeline;
pub mod privilege;
pub mod progress;
pub mod runner;
pub mod selection;
pub mod server_config;
pub mod tables;
