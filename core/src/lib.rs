pub mod api;
pub mod asset;
pub mod config;
pub mod engine;
pub mod error;
pub mod remote;
