//! Deployment admission
//!
//! [`controller::AdmissionController`] answers whether a queued deployment may
//! start now. [`gate::AdmissionGate`] wraps that answer in a per-environment
//! critical section so the decision and the resulting status write cannot
//! interleave with another admission in the same environment.

pub mod accountant;
pub mod controller;
pub mod gate;

pub use accountant::ConcurrencyAccountant;
pub use controller::{AdmissionController, AllowReason, Verdict};
pub use gate::{Admission, AdmissionGate};
