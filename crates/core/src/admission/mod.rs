//! Admission control: does the destination have room for this dataset?
//!
//! Two checks, both against live probes: free space on the endpoint's
//! filesystem, and the owning project's usage against its quota ceiling.
//! A denial is never terminal; the request returns to the eligible pool
//! and is re-evaluated next cycle.
//!
//! Probe failures are handled asymmetrically, deliberately so. A failed
//! free-space probe counts as zero free bytes and defers the request. A
//! failed usage probe counts as zero usage and lets the quota check pass;
//! a missing project directory (a first delivery) probes the same way, and
//! the two cases cannot be told apart from here. The failure is logged
//! loudly so a systematically broken probe is visible.

use std::fmt;
use std::sync::Arc;

use tracing::warn;

use crate::capacity::CapacityProber;
use crate::resolver::Destination;

/// Why a request was deferred this cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeferReason {
    InsufficientSpace {
        required_bytes: u64,
        available_bytes: u64,
    },
    QuotaExceeded {
        required_bytes: u64,
        used_bytes: u64,
        quota_bytes: u64,
    },
}

impl fmt::Display for DeferReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeferReason::InsufficientSpace {
                required_bytes,
                available_bytes,
            } => write!(
                f,
                "insufficient space: need {} bytes, {} available",
                required_bytes, available_bytes
            ),
            DeferReason::QuotaExceeded {
                required_bytes,
                used_bytes,
                quota_bytes,
            } => write!(
                f,
                "quota exceeded: {} used + {} needed > {} ceiling",
                used_bytes, required_bytes, quota_bytes
            ),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Admit,
    Defer(DeferReason),
}

pub struct AdmissionController {
    prober: Arc<dyn CapacityProber>,
}

impl AdmissionController {
    pub fn new(prober: Arc<dyn CapacityProber>) -> Self {
        Self { prober }
    }

    /// Decide whether `required_bytes` for `owner`'s dataset fit on the
    /// destination right now.
    pub async fn admit(
        &self,
        destination: &Destination,
        owner: &str,
        required_bytes: u64,
    ) -> Decision {
        let prefix = destination.path_prefix.to_string_lossy();
        let available_bytes = match self
            .prober
            .disk_free(&destination.remote_principal, &destination.remote_host, &prefix)
            .await
        {
            Ok(free) => free,
            Err(e) => {
                // Fail safe: unknown free space admits nothing.
                warn!(
                    host = %destination.remote_host,
                    error = %e,
                    "free-space probe failed, treating as zero available"
                );
                0
            }
        };

        if required_bytes > available_bytes {
            return Decision::Defer(DeferReason::InsufficientSpace {
                required_bytes,
                available_bytes,
            });
        }

        let project_root = destination.project_root(owner);
        let used_bytes = match self
            .prober
            .tree_size(
                &destination.remote_principal,
                &destination.remote_host,
                &project_root.to_string_lossy(),
            )
            .await
        {
            Ok(used) => used,
            Err(e) => {
                // Fail open: indistinguishable from a first delivery with
                // no project directory yet. Loud so a broken probe shows.
                warn!(
                    host = %destination.remote_host,
                    owner,
                    error = %e,
                    "usage probe failed, treating project usage as zero"
                );
                0
            }
        };

        if used_bytes + required_bytes > destination.quota_bytes {
            return Decision::Defer(DeferReason::QuotaExceeded {
                required_bytes,
                used_bytes,
                quota_bytes: destination.quota_bytes,
            });
        }

        Decision::Admit
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;
    use crate::testing::MockProber;

    fn test_destination(quota_bytes: u64) -> Destination {
        Destination {
            remote_principal: "webstage".to_string(),
            remote_host: "web.internal".to_string(),
            path_prefix: PathBuf::from("/srv/web/projects"),
            quota_bytes,
        }
    }

    #[tokio::test]
    async fn test_admit_when_space_and_quota_allow() {
        let prober = Arc::new(MockProber::new(1_000, 100));
        let controller = AdmissionController::new(prober);
        let decision = controller.admit(&test_destination(500), "proj-1", 200).await;
        assert_eq!(decision, Decision::Admit);
    }

    #[tokio::test]
    async fn test_defer_on_insufficient_space() {
        let prober = Arc::new(MockProber::new(1_000, 0));
        let controller = AdmissionController::new(prober);
        let decision = controller
            .admit(&test_destination(10_000), "proj-1", 1_200)
            .await;
        assert_eq!(
            decision,
            Decision::Defer(DeferReason::InsufficientSpace {
                required_bytes: 1_200,
                available_bytes: 1_000,
            })
        );
    }

    #[tokio::test]
    async fn test_defer_on_quota_ceiling() {
        let prober = Arc::new(MockProber::new(1_000_000, 900));
        let controller = AdmissionController::new(prober);
        let decision = controller.admit(&test_destination(1_000), "proj-1", 200).await;
        assert_eq!(
            decision,
            Decision::Defer(DeferReason::QuotaExceeded {
                required_bytes: 200,
                used_bytes: 900,
                quota_bytes: 1_000,
            })
        );
    }

    #[tokio::test]
    async fn test_exact_fit_admits() {
        // required == available and used + required == quota both pass.
        let prober = Arc::new(MockProber::new(200, 800));
        let controller = AdmissionController::new(prober);
        let decision = controller.admit(&test_destination(1_000), "proj-1", 200).await;
        assert_eq!(decision, Decision::Admit);
    }

    #[tokio::test]
    async fn test_failed_space_probe_defers() {
        let prober = Arc::new(MockProber::new(1_000, 0));
        prober.fail_disk_free();
        let controller = AdmissionController::new(prober);
        let decision = controller.admit(&test_destination(1_000), "proj-1", 1).await;
        assert_eq!(
            decision,
            Decision::Defer(DeferReason::InsufficientSpace {
                required_bytes: 1,
                available_bytes: 0,
            })
        );
    }

    #[tokio::test]
    async fn test_failed_usage_probe_admits() {
        // Usage probe failure reads as zero usage; only the quota check
        // is affected and it passes.
        let prober = Arc::new(MockProber::new(1_000, 999_999));
        prober.fail_tree_size();
        let controller = AdmissionController::new(prober);
        let decision = controller.admit(&test_destination(100), "proj-1", 50).await;
        assert_eq!(decision, Decision::Admit);
    }

    #[tokio::test]
    async fn test_decision_stable_while_probes_unchanged() {
        let prober = Arc::new(MockProber::new(1_000, 100));
        let controller = AdmissionController::new(prober);
        let destination = test_destination(500);
        let first = controller.admit(&destination, "proj-1", 200).await;
        let second = controller.admit(&destination, "proj-1", 200).await;
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_quota_boundary_around_remaining_headroom() {
        // 60 of 100 used: 30 more fits, 50 more does not.
        let prober = Arc::new(MockProber::new(1_000_000, 60));
        let controller = AdmissionController::new(prober);
        let destination = test_destination(100);
        assert_eq!(
            controller.admit(&destination, "proj-1", 30).await,
            Decision::Admit
        );
        assert_eq!(
            controller.admit(&destination, "proj-1", 50).await,
            Decision::Defer(DeferReason::QuotaExceeded {
                required_bytes: 50,
                used_bytes: 60,
                quota_bytes: 100,
            })
        );
    }

    #[tokio::test]
    async fn test_probes_project_root_of_owner() {
        let prober = Arc::new(MockProber::new(1_000, 0));
        let controller = AdmissionController::new(prober.clone());
        controller.admit(&test_destination(1_000), "proj-1", 1).await;
        let probed = prober.probed_paths();
        assert!(probed.contains(&"/srv/web/projects".to_string()));
        assert!(probed.contains(&"/srv/web/projects/proj-1".to_string()));
    }
}
