//! Mock account provisioner for testing.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::resolver::{AccountProvisioner, ProvisionError};

/// Mock provisioner recording calls, with a switchable failure.
#[derive(Default)]
pub struct MockProvisioner {
    calls: Mutex<Vec<(String, String)>>,
    should_fail: AtomicBool,
}

impl MockProvisioner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail(&self) {
        self.should_fail.store(true, Ordering::SeqCst);
    }

    /// `(principal, host)` pairs provisioned so far.
    pub fn provisioned(&self) -> Vec<(String, String)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl AccountProvisioner for MockProvisioner {
    async fn ensure_account(&self, principal: &str, host: &str) -> Result<(), ProvisionError> {
        if self.should_fail.load(Ordering::SeqCst) {
            return Err(ProvisionError::CommandFailed {
                principal: principal.to_string(),
                host: host.to_string(),
                detail: "mock provisioning failure".to_string(),
            });
        }
        self.calls
            .lock()
            .unwrap()
            .push((principal.to_string(), host.to_string()));
        Ok(())
    }
}
