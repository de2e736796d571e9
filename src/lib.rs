pub mod activity;
pub mod auth;
pub mod backend;
pub mod collab;
pub mod config;
pub mod engine;
pub mod limits;
pub mod model;
pub mod observability;
pub mod wal;
pub mod wire;
