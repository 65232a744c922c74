pub mod api;
pub mod config;
pub mod engine;
pub mod error;
pub mod flow;
pub mod geo;
pub mod map;
pub mod models;
pub mod observability;
pub mod render;
pub mod search;
pub mod state;
pub mod storage;
pub mod store;
