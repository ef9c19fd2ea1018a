//! Domain records

pub mod deployment;
pub mod environment;
pub mod ids;
