//! Server state

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::admission::gate::AdmissionGate;
use crate::store::RecordStore;

/// Server state shared across handlers
pub struct ServerState {
    pub store: Arc<dyn RecordStore>,
    pub gate: Arc<AdmissionGate<dyn RecordStore>>,
    pub started_at: DateTime<Utc>,
}

impl ServerState {
    pub fn new(
        store: Arc<dyn RecordStore>,
        gate: Arc<AdmissionGate<dyn RecordStore>>,
        started_at: DateTime<Utc>,
    ) -> Self {
        Self {
            store,
            gate,
            started_at,
        }
    }
}
