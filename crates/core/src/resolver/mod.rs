//! Maps a request to its concrete placement target.
//!
//! Resolution is a pure lookup: delivery type picks a profile, the owner
//! (or the profile's fixed principal) picks the identity, and the quota
//! constants pick the ceiling. Account provisioning is a separate concern
//! behind [`AccountProvisioner`]; the reaper resolves without ever
//! provisioning.

mod provision;
mod types;

use std::sync::RwLock;

use thiserror::Error;
use tracing::info;

use crate::ledger::{DeliveryType, Ledger, LedgerError, QuotaConstants, Request};

pub use provision::{AccountProvisioner, NoopProvisioner, ProvisionError, SshProvisioner};
pub use types::{DeliveryProfile, Destination};

#[derive(Debug, Error)]
pub enum ResolveError {
    /// A profile without a fixed principal was asked to serve a delivery
    /// type whose principal is not the owner. Config validation prevents
    /// this; hitting it at runtime means the profiles were built by hand.
    #[error("no principal configured for {delivery_type} deliveries")]
    MissingPrincipal { delivery_type: DeliveryType },
}

/// Per-delivery-type endpoint profiles.
#[derive(Debug, Clone)]
pub struct ResolverProfiles {
    pub web: DeliveryProfile,
    pub federated: DeliveryProfile,
    pub sftp: DeliveryProfile,
}

impl ResolverProfiles {
    fn for_delivery(&self, delivery_type: DeliveryType) -> &DeliveryProfile {
        match delivery_type {
            DeliveryType::Web => &self.web,
            DeliveryType::Federated => &self.federated,
            DeliveryType::Sftp => &self.sftp,
        }
    }
}

pub struct DestinationResolver {
    profiles: ResolverProfiles,
    quotas: RwLock<QuotaConstants>,
}

impl DestinationResolver {
    pub fn new(profiles: ResolverProfiles, quotas: QuotaConstants) -> Self {
        Self {
            profiles,
            quotas: RwLock::new(quotas),
        }
    }

    /// Build a resolver with quotas loaded from the ledger constants row.
    pub fn from_ledger(
        profiles: ResolverProfiles,
        ledger: &dyn Ledger,
    ) -> Result<Self, LedgerError> {
        let quotas = ledger.quota_constants()?;
        Ok(Self::new(profiles, quotas))
    }

    /// Resolve a request to its placement target.
    pub fn resolve(&self, request: &Request) -> Result<Destination, ResolveError> {
        let profile = self.profiles.for_delivery(request.delivery_type);
        let remote_principal = if request.delivery_type.owner_is_principal() {
            request.owner.clone()
        } else {
            profile
                .principal
                .clone()
                .ok_or(ResolveError::MissingPrincipal {
                    delivery_type: request.delivery_type,
                })?
        };

        let quota_bytes = self
            .quotas
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .for_delivery(request.delivery_type);

        Ok(Destination {
            remote_principal,
            remote_host: profile.host.clone(),
            path_prefix: profile.path_prefix.clone(),
            quota_bytes,
        })
    }

    /// Whether a request's delivery type requires account provisioning.
    pub fn needs_provisioning(&self, delivery_type: DeliveryType) -> bool {
        matches!(delivery_type, DeliveryType::Federated)
    }

    /// Re-read the quota constants from the ledger.
    pub fn reload_quotas(&self, ledger: &dyn Ledger) -> Result<(), LedgerError> {
        let quotas = ledger.quota_constants()?;
        *self.quotas.write().unwrap_or_else(|e| e.into_inner()) = quotas;
        info!(?quotas, "quota constants reloaded");
        Ok(())
    }

    pub fn quotas(&self) -> QuotaConstants {
        *self.quotas.read().unwrap_or_else(|e| e.into_inner())
    }
}
