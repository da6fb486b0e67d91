pub mod config;
pub mod contributions;
pub mod domain;
pub mod error;
pub mod fixtures;
pub mod loader;
pub mod loaders;
pub mod security;
pub mod storage;
pub mod telemetry;
