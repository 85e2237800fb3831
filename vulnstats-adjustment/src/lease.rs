// SPDX-FileCopyrightText: 2026 Jörg Thalheim
// SPDX-License-Identifier: MIT

//! Running work under a per-namespace lease.
//!
//! The lease lives in the database, so it excludes every process working on
//! the same file, not just threads of this one. Release failures are logged:
//! an unreleased lease only delays other holders until its TTL runs out.

use tracing::{debug, warn};
use vulnstats_core::NamespaceId;

use crate::adjustment::AdjustmentService;
use crate::error::{AdjustmentError, Result};
use crate::store::StatisticsStore;

/// Lease guarding updates to a namespace's statistics and traversal paths.
pub fn statistics_lease_key(namespace_id: NamespaceId) -> String {
    format!("namespace:{namespace_id}:update_statistics_traversal_ids")
}

impl<S: StatisticsStore> AdjustmentService<S> {
    /// Run `f` while holding the lease `key`.
    ///
    /// Tries once plus `lease.retries` more times, sleeping
    /// `lease.retry_delay` in between, then gives up with
    /// [`AdjustmentError::LeaseContention`].
    pub(crate) fn in_lock<T>(
        &mut self,
        key: &str,
        f: impl FnOnce(&mut Self) -> Result<T>,
    ) -> Result<T> {
        let lease = self.config().lease.clone();
        let mut attempt = 0;
        let token = loop {
            if let Some(token) = self.store().try_obtain_lease(key, lease.ttl())? {
                break token;
            }
            if attempt >= lease.retries {
                return Err(AdjustmentError::LeaseContention {
                    key: key.to_owned(),
                });
            }
            attempt += 1;
            debug!(key, attempt, "Lease busy, retrying");
            std::thread::sleep(lease.retry_delay());
        };

        let result = f(self);

        match self.store().cancel_lease(&token) {
            Ok(true) => {}
            Ok(false) => warn!(key, "Lease expired before it was released"),
            Err(e) => warn!(key, error = %e, "Failed to release lease"),
        }
        result
    }
}
