//! Device identity warehouse with a cache-aside read path

use std::sync::atomic::{AtomicBool, Ordering};

use rusqlite::params;

use super::types::{BasicInfo, DeviceType, Status};
use crate::cache::{CacheStats, LruStore};
use crate::db::{self, DbPool};
use crate::{Error, Result};

/// Cache key for a registered identity
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct DeviceKey {
    domain: String,
    sub_domain: String,
    device_id: String,
}

impl DeviceKey {
    fn new(domain: &str, sub_domain: &str, device_id: &str) -> Self {
        Self {
            domain: domain.to_string(),
            sub_domain: sub_domain.to_string(),
            device_id: device_id.to_string(),
        }
    }
}

/// Registered device identities (type, public key, status)
pub struct DeviceWarehouse {
    pool: DbPool,
    cache: LruStore<DeviceKey, BasicInfo>,
    cache_on: AtomicBool,
}

impl DeviceWarehouse {
    /// Create a warehouse caching at most `capacity` identities
    ///
    /// # Errors
    ///
    /// Returns error if capacity is zero
    pub fn new(pool: DbPool, capacity: usize) -> Result<Self> {
        Ok(Self {
            pool,
            cache: LruStore::new(capacity)?,
            cache_on: AtomicBool::new(true),
        })
    }

    /// Import a new device identity
    ///
    /// A master must carry a public key; a normal device is stored without one.
    ///
    /// # Errors
    ///
    /// Returns `InvalidParam` for empty keys, `Constraint` if the identity
    /// already exists, or a store error
    pub fn register(
        &self,
        domain: &str,
        sub_domain: &str,
        device_id: &str,
        public_key: &str,
        master: bool,
    ) -> Result<()> {
        if domain.is_empty() || sub_domain.is_empty() || device_id.is_empty() {
            tracing::warn!(domain, sub_domain, device_id, "empty device key on register");
            return Err(Error::InvalidParam(format!(
                "empty device key [{domain}:{sub_domain}:{device_id}]"
            )));
        }
        if master && public_key.is_empty() {
            tracing::warn!(domain, sub_domain, device_id, "master registered without public key");
            return Err(Error::InvalidParam(format!(
                "master device [{sub_domain}:{device_id}] requires a public key"
            )));
        }

        self.invalidate(domain, sub_domain, device_id);

        let (device_type, public_key) = if master {
            (DeviceType::Master, Some(public_key))
        } else {
            (DeviceType::Normal, None)
        };

        let conn = db::connect(&self.pool)?;
        conn.execute(
            "INSERT INTO device_warehouse (domain, sub_domain, device_id, device_type, public_key, status)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                domain,
                sub_domain,
                device_id,
                device_type.code(),
                public_key,
                Status::Active.code()
            ],
        )
        .map_err(|e| {
            tracing::warn!(domain, sub_domain, device_id, master, error = %e, "insert device identity failed");
            Error::from_insert(e, &format!("device [{sub_domain}:{device_id}]"))
        })?;

        tracing::debug!(domain, sub_domain, device_id, master, "device registered");
        Ok(())
    }

    /// Get a registered identity (returns None if not found)
    ///
    /// # Errors
    ///
    /// Returns `InvalidDevice` if the stored row breaks the identity
    /// invariants, or a store error
    pub fn get(&self, domain: &str, sub_domain: &str, device_id: &str) -> Result<Option<BasicInfo>> {
        let key = DeviceKey::new(domain, sub_domain, device_id);
        if self.cache_enabled()
            && let Some(basic) = self.cache.get(&key)
        {
            tracing::debug!(domain, sub_domain, device_id, "device identity from cache");
            return Ok(Some(basic));
        }

        let conn = db::connect(&self.pool)?;
        let result = conn.query_row(
            "SELECT sub_domain, device_id, device_type, public_key, status
             FROM device_warehouse WHERE domain = ?1 AND sub_domain = ?2 AND device_id = ?3",
            params![domain, sub_domain, device_id],
            |row| {
                Ok(BasicInfo {
                    sub_domain: row.get(0)?,
                    device_id: row.get(1)?,
                    device_type: DeviceType::from_code(row.get(2)?),
                    public_key: row.get(3)?,
                    status: Status::from_code(row.get(4)?),
                })
            },
        );

        let basic = match result {
            Ok(basic) => basic,
            Err(rusqlite::Error::QueryReturnedNoRows) => return Ok(None),
            Err(e) => {
                tracing::error!(domain, sub_domain, device_id, error = %e, "query device identity failed");
                return Err(e.into());
            }
        };

        if !basic.validate() {
            tracing::error!(domain, sub_domain, device_id, "device identity failed validation");
            return Err(Error::InvalidDevice(format!(
                "corrupted identity [{sub_domain}:{device_id}]"
            )));
        }

        if self.cache_enabled() {
            self.cache.set(key, basic.clone());
        }
        Ok(Some(basic))
    }

    /// Delete an identity; deleting a missing identity succeeds
    ///
    /// Callers must make sure no live binding still references the identity.
    ///
    /// # Errors
    ///
    /// Returns error if the store operation fails
    pub fn delete(&self, domain: &str, sub_domain: &str, device_id: &str) -> Result<()> {
        self.invalidate(domain, sub_domain, device_id);

        let conn = db::connect(&self.pool)?;
        conn.execute(
            "DELETE FROM device_warehouse WHERE domain = ?1 AND sub_domain = ?2 AND device_id = ?3",
            params![domain, sub_domain, device_id],
        )
        .map_err(|e| {
            tracing::error!(domain, sub_domain, device_id, error = %e, "delete device identity failed");
            Error::from(e)
        })?;

        Ok(())
    }

    /// Turn the identity cache on or off, dropping its contents either way
    pub fn switch_cache(&self, on: bool) {
        self.cache_on.store(on, Ordering::Release);
        self.clear_cache();
    }

    /// Drop every cached identity
    pub fn clear_cache(&self) {
        tracing::info!(
            len = self.cache.len(),
            hit_ratio = self.cache.hit_ratio(),
            "clear device identity cache"
        );
        self.cache.clear();
    }

    #[must_use]
    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    fn cache_enabled(&self) -> bool {
        self.cache_on.load(Ordering::Acquire)
    }

    fn invalidate(&self, domain: &str, sub_domain: &str, device_id: &str) {
        if self.cache_enabled() {
            self.cache
                .delete(&DeviceKey::new(domain, sub_domain, device_id));
        }
    }
}
