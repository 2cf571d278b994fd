pub mod authority;
pub mod command;
pub mod config;
pub mod control;
pub mod errors;
pub mod orchestrator;
pub mod registry;
pub mod telemetry;
