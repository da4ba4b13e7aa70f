pub mod config;
pub mod cost;
pub mod error;
pub mod export;
pub mod generation;
pub mod history;
pub mod model;
pub mod monitoring;
pub mod provider;
pub mod session;
