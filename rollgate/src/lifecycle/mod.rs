//! Deployment lifecycle

pub mod fsm;
pub mod transitions;
