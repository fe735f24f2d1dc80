//! Mock capacity prober for testing.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::capacity::{CapacityProber, ProbeError};

/// Mock prober with settable free space and usage, recorded probe paths,
/// and switchable failures.
pub struct MockProber {
    free_bytes: AtomicU64,
    used_bytes: AtomicU64,
    fail_disk_free: AtomicBool,
    fail_tree_size: AtomicBool,
    probed: Mutex<Vec<String>>,
}

impl MockProber {
    pub fn new(free_bytes: u64, used_bytes: u64) -> Self {
        Self {
            free_bytes: AtomicU64::new(free_bytes),
            used_bytes: AtomicU64::new(used_bytes),
            fail_disk_free: AtomicBool::new(false),
            fail_tree_size: AtomicBool::new(false),
            probed: Mutex::new(Vec::new()),
        }
    }

    pub fn set_free_bytes(&self, free_bytes: u64) {
        self.free_bytes.store(free_bytes, Ordering::SeqCst);
    }

    pub fn set_used_bytes(&self, used_bytes: u64) {
        self.used_bytes.store(used_bytes, Ordering::SeqCst);
    }

    /// Make every disk_free call fail.
    pub fn fail_disk_free(&self) {
        self.fail_disk_free.store(true, Ordering::SeqCst);
    }

    /// Make every tree_size call fail.
    pub fn fail_tree_size(&self) {
        self.fail_tree_size.store(true, Ordering::SeqCst);
    }

    /// Paths probed so far, in call order.
    pub fn probed_paths(&self) -> Vec<String> {
        self.probed.lock().unwrap().clone()
    }
}

#[async_trait]
impl CapacityProber for MockProber {
    async fn disk_free(
        &self,
        _principal: &str,
        _host: &str,
        path: &str,
    ) -> Result<u64, ProbeError> {
        self.probed.lock().unwrap().push(path.to_string());
        if self.fail_disk_free.load(Ordering::SeqCst) {
            return Err(ProbeError::Unparseable("mock disk_free failure".to_string()));
        }
        Ok(self.free_bytes.load(Ordering::SeqCst))
    }

    async fn tree_size(
        &self,
        _principal: &str,
        _host: &str,
        path: &str,
    ) -> Result<u64, ProbeError> {
        self.probed.lock().unwrap().push(path.to_string());
        if self.fail_tree_size.load(Ordering::SeqCst) {
            return Err(ProbeError::Unparseable("mock tree_size failure".to_string()));
        }
        Ok(self.used_bytes.load(Ordering::SeqCst))
    }
}
