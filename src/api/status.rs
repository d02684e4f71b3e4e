// src/api/status.rs

use std::sync::{Arc, RwLock};

use serde::Serialize;

use crate::types::ServiceState;

/// Row of the service status table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServiceStatus {
    pub name: String,
    /// `None` until the service has been confirmed running once.
    pub state: Option<ServiceState>,
}

/// Latest known state of every service, in start order.
///
/// Written by the supervisor, read by the control plane.
#[derive(Debug, Clone, Default)]
pub struct StatusBoard {
    inner: Arc<RwLock<Vec<ServiceStatus>>>,
}

impl StatusBoard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `name` with no state yet. Re-registering keeps the current state.
    pub fn register(&self, name: &str) {
        let mut rows = self.inner.write().unwrap_or_else(|e| e.into_inner());
        if !rows.iter().any(|r| r.name == name) {
            rows.push(ServiceStatus {
                name: name.to_string(),
                state: None,
            });
        }
    }

    pub fn set(&self, name: &str, state: ServiceState) {
        let mut rows = self.inner.write().unwrap_or_else(|e| e.into_inner());
        match rows.iter_mut().find(|r| r.name == name) {
            Some(row) => row.state = Some(state),
            None => rows.push(ServiceStatus {
                name: name.to_string(),
                state: Some(state),
            }),
        }
    }

    pub fn get(&self, name: &str) -> Option<ServiceState> {
        let rows = self.inner.read().unwrap_or_else(|e| e.into_inner());
        rows.iter().find(|r| r.name == name).and_then(|r| r.state)
    }

    pub fn snapshot(&self) -> Vec<ServiceStatus> {
        self.inner.read().unwrap_or_else(|e| e.into_inner()).clone()
    }
}
