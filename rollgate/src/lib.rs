//! rollgate
//!
//! Deployment admission control plane. Decides when a queued deployment may
//! start rolling out to its environment, keeping each environment under its
//! concurrency limit while never holding back an emergency rollback.

pub mod admission;
pub mod app;
pub mod cluster;
pub mod errors;
pub mod filesys;
pub mod lifecycle;
pub mod logs;
pub mod models;
pub mod server;
pub mod storage;
pub mod store;
pub mod utils;
pub mod workers;
