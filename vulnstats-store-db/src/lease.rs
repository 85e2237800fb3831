// SPDX-FileCopyrightText: 2026 Jörg Thalheim
// SPDX-License-Identifier: MIT

//! Named exclusive leases stored in the database.
//!
//! A lease is a row keyed by name with an expiry. Taking it succeeds when
//! no row exists or the existing one has expired, so a crashed holder only
//! blocks others until its TTL runs out. Every connection to the same
//! database file sees the same leases.

use std::time::Duration;

use rusqlite::params;
use tracing::debug;

use crate::connection::StatsDb;
use crate::error::Result;
use crate::types::{LeaseToken, now_unix, unix_to_system_time};

fn new_lease_uuid() -> Result<String> {
    let mut raw = [0u8; 16];
    getrandom::fill(&mut raw)?;
    Ok(hex::encode(raw))
}

impl StatsDb {
    /// Try to take the lease `key` for `ttl` without waiting.
    ///
    /// Returns `None` while another holder's lease is still valid.
    pub fn try_obtain_lease(&self, key: &str, ttl: Duration) -> Result<Option<LeaseToken>> {
        let uuid = new_lease_uuid()?;
        let now = now_unix();
        let expires_at = now + ttl.as_secs().max(1) as i64;

        let rows = self.conn.execute(
            r#"
            INSERT INTO exclusive_leases (key, uuid, expires_at)
            VALUES (?1, ?2, ?3)
            ON CONFLICT (key) DO UPDATE SET
                uuid = excluded.uuid,
                expires_at = excluded.expires_at
            WHERE exclusive_leases.expires_at <= ?4
            "#,
            params![key, uuid, expires_at, now],
        )?;

        if rows == 0 {
            debug!(key, "Lease is held elsewhere");
            return Ok(None);
        }
        Ok(Some(LeaseToken {
            key: key.to_owned(),
            uuid,
            expires_at: unix_to_system_time(expires_at),
        }))
    }

    /// Release a lease taken with [`StatsDb::try_obtain_lease`].
    ///
    /// Returns `false` if the lease had already expired and was taken over.
    pub fn cancel_lease(&self, token: &LeaseToken) -> Result<bool> {
        let rows = self.conn.execute(
            "DELETE FROM exclusive_leases WHERE key = ?1 AND uuid = ?2",
            params![token.key, token.uuid],
        )?;
        Ok(rows > 0)
    }

    /// Whether someone currently holds the lease `key`.
    pub fn lease_held(&self, key: &str) -> Result<bool> {
        let mut stmt = self
            .conn
            .prepare_cached("SELECT 1 FROM exclusive_leases WHERE key = ?1 AND expires_at > ?2")?;
        Ok(stmt.exists(params![key, now_unix()])?)
    }
}
