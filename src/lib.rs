pub mod api;
pub mod cli;
pub mod config;
pub mod engine;
pub mod errors;
pub mod log;
pub mod prompt;
pub mod provider;
pub mod rules;
pub mod store;
pub mod ux;
pub mod validate;
pub mod wire;
