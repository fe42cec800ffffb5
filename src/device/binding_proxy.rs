//! Cache-fronted repository for binding records and the bind write path

use std::sync::atomic::{AtomicBool, Ordering};

use rusqlite::{OptionalExtension, Transaction, TransactionBehavior, params};

use super::binding_cache::BindingCache;
use super::types::{BindingInfo, Status, parse_datetime};
use crate::cache::CacheStats;
use crate::db::{self, DbPool};
use crate::{Error, Result};

/// Single source of truth for binding reads and writes
pub struct BindingProxy {
    pool: DbPool,
    cache: BindingCache,
    cache_on: AtomicBool,
}

impl BindingProxy {
    /// Create a proxy caching at most `capacity` bindings
    ///
    /// # Errors
    ///
    /// Returns error if capacity is zero
    pub fn new(pool: DbPool, capacity: usize) -> Result<Self> {
        Ok(Self {
            pool,
            cache: BindingCache::new(capacity)?,
            cache_on: AtomicBool::new(true),
        })
    }

    /// Look up a binding by natural key (returns None if not bound)
    ///
    /// Always reads the store; a hit refreshes the did-keyed cache.
    ///
    /// # Errors
    ///
    /// Returns error if the store query fails
    pub fn get_binding_info(
        &self,
        domain: &str,
        sub_domain: &str,
        device_id: &str,
    ) -> Result<Option<BindingInfo>> {
        let conn = db::connect(&self.pool)?;
        let result = conn.query_row(
            "SELECT did, bind_token, expire_time FROM device_mapping
             WHERE domain = ?1 AND sub_domain = ?2 AND device_id = ?3",
            params![domain, sub_domain, device_id],
            |row| {
                Ok(BindingInfo {
                    did: row.get(0)?,
                    sub_domain: sub_domain.to_string(),
                    device_id: device_id.to_string(),
                    grant_token: row.get(1)?,
                    grant_time: row
                        .get::<_, Option<String>>(2)?
                        .as_deref()
                        .and_then(parse_datetime),
                })
            },
        );

        match result {
            Ok(binding) => {
                if self.cache_enabled() {
                    self.cache.set(domain, binding.clone());
                }
                Ok(Some(binding))
            }
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => {
                tracing::warn!(domain, sub_domain, device_id, error = %e, "query binding info failed");
                Err(e.into())
            }
        }
    }

    /// Look up a binding by did (returns None if not bound)
    ///
    /// # Errors
    ///
    /// Returns error if the store query fails
    pub fn get_binding_by_did(&self, domain: &str, did: i64) -> Result<Option<BindingInfo>> {
        if self.cache_enabled()
            && let Some(binding) = self.cache.get(domain, did)
        {
            tracing::debug!(domain, did, "binding from cache");
            return Ok(Some(binding));
        }

        let conn = db::connect(&self.pool)?;
        let result = conn.query_row(
            "SELECT sub_domain, device_id, bind_token, expire_time FROM device_mapping
             WHERE domain = ?1 AND did = ?2",
            params![domain, did],
            |row| {
                Ok(BindingInfo {
                    did,
                    sub_domain: row.get(0)?,
                    device_id: row.get(1)?,
                    grant_token: row.get(2)?,
                    grant_time: row
                        .get::<_, Option<String>>(3)?
                        .as_deref()
                        .and_then(parse_datetime),
                })
            },
        );

        match result {
            Ok(binding) => {
                if self.cache_enabled() {
                    self.cache.set(domain, binding.clone());
                }
                Ok(Some(binding))
            }
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => {
                tracing::warn!(domain, did, error = %e, "query binding by did failed");
                Err(e.into())
            }
        }
    }

    /// Whether a binding exists for `did`
    ///
    /// # Errors
    ///
    /// Returns error if the store query fails
    pub fn is_binding_exist(&self, domain: &str, did: i64) -> Result<bool> {
        if self.cache_enabled() && self.cache.get(domain, did).is_some() {
            return Ok(true);
        }

        let conn = db::connect(&self.pool)?;
        let result = conn.query_row(
            "SELECT did FROM device_mapping WHERE domain = ?1 AND did = ?2",
            params![domain, did],
            |row| row.get::<_, i64>(0),
        );

        match result {
            Ok(_) => Ok(true),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(false),
            Err(e) => {
                tracing::warn!(domain, did, error = %e, "check binding exist failed");
                Err(e.into())
            }
        }
    }

    /// Bind or rebind a natural key to a home, returning its did
    ///
    /// An already-bound key keeps its did; only the device row (home, name,
    /// master) is replaced. A fresh key gets a mapping row and a new did. Both
    /// writes share one transaction. A device without an explicit master
    /// (`master_did <= 0`) is recorded as its own master.
    ///
    /// # Errors
    ///
    /// Returns error if any store step fails; nothing is written in that case
    pub fn binding_device(
        &self,
        domain: &str,
        sub_domain: &str,
        device_id: &str,
        name: &str,
        hid: i64,
        master_did: i64,
    ) -> Result<i64> {
        let mut conn = db::connect(&self.pool)?;
        // Take the write lock up front so the key lookup and the insert see
        // the same state as any concurrent bind of the same key
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .inspect_err(|e| {
                tracing::error!(domain, sub_domain, device_id, error = %e, "begin transaction failed");
            })?;

        let existing = find_did(&tx, domain, sub_domain, device_id).inspect_err(|e| {
            tracing::warn!(domain, sub_domain, device_id, error = %e, "get binding info failed");
        })?;
        match existing {
            Some(did) => {
                tracing::info!(domain, sub_domain, device_id, did, "device already activated");
            }
            None => tracing::info!(domain, sub_domain, device_id, "new device activated"),
        }

        // Dropping `tx` without commit rolls both writes back
        let did = match write_binding(
            &tx,
            domain,
            sub_domain,
            device_id,
            name,
            hid,
            master_did,
            existing,
        ) {
            Ok(did) => did,
            Err(e) => {
                tracing::info!(domain, sub_domain, device_id, error = %e, "binding failed, rolling back");
                return Err(e);
            }
        };

        tx.commit().inspect_err(|e| {
            tracing::error!(domain, sub_domain, device_id, hid, master_did, error = %e, "commit failed");
        })?;

        tracing::info!(domain, sub_domain, device_id, did, name, hid, master_did, "binding the device succeeded");
        Ok(did)
    }

    /// Move `did` onto a new natural key and clear its grant
    ///
    /// The cached entry is dropped before the store is touched. Any affected
    /// row count other than one is reported as `NotExist`.
    ///
    /// # Errors
    ///
    /// Returns `NotExist` if no single mapping row was updated, or a store error
    pub fn change_device_binding(
        &self,
        did: i64,
        domain: &str,
        sub_domain: &str,
        device_id: &str,
    ) -> Result<()> {
        if self.cache_enabled() {
            self.cache.delete(domain, did);
        }

        let conn = db::connect(&self.pool)?;
        let rows = conn
            .execute(
                "UPDATE device_mapping
                 SET sub_domain = ?1, device_id = ?2, bind_token = NULL, expire_time = NULL
                 WHERE domain = ?3 AND did = ?4",
                params![sub_domain, device_id, domain, did],
            )
            .map_err(|e| {
                tracing::error!(domain, sub_domain, device_id, did, error = %e, "update mapping failed");
                Error::from_insert(e, &format!("device [{sub_domain}:{device_id}]"))
            })?;

        if rows != 1 {
            tracing::error!(domain, sub_domain, device_id, did, rows, "check affected rows failed");
            return Err(Error::NotExist(format!("binding for did {did}")));
        }
        Ok(())
    }

    /// Turn the binding cache on or off, dropping its contents either way
    pub fn switch_cache(&self, on: bool) {
        self.cache_on.store(on, Ordering::Release);
        self.clear_cache();
    }

    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    #[must_use]
    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    fn cache_enabled(&self) -> bool {
        self.cache_on.load(Ordering::Acquire)
    }
}

fn find_did(
    tx: &Transaction<'_>,
    domain: &str,
    sub_domain: &str,
    device_id: &str,
) -> rusqlite::Result<Option<i64>> {
    tx.query_row(
        "SELECT did FROM device_mapping WHERE domain = ?1 AND sub_domain = ?2 AND device_id = ?3",
        params![domain, sub_domain, device_id],
        |row| row.get(0),
    )
    .optional()
}

#[allow(clippy::too_many_arguments)]
fn write_binding(
    tx: &Transaction<'_>,
    domain: &str,
    sub_domain: &str,
    device_id: &str,
    name: &str,
    hid: i64,
    master_did: i64,
    existing_did: Option<i64>,
) -> Result<i64> {
    let did = if let Some(did) = existing_did {
        did
    } else {
        tx.execute(
            "INSERT INTO device_mapping (domain, sub_domain, device_id) VALUES (?1, ?2, ?3)",
            params![domain, sub_domain, device_id],
        )
        .map_err(|e| {
            tracing::error!(domain, sub_domain, device_id, error = %e, "insert mapping failed");
            Error::from_insert(e, &format!("mapping [{sub_domain}:{device_id}]"))
        })?;
        tx.last_insert_rowid()
    };

    let master = if master_did > 0 { master_did } else { did };
    tx.execute(
        "INSERT OR REPLACE INTO device_info (domain, did, hid, name, status, master_did)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![domain, did, hid, name, Status::Active.code(), master],
    )
    .map_err(|e| {
        tracing::error!(domain, sub_domain, device_id, hid, master_did, error = %e, "replace device info failed");
        Error::from(e)
    })?;

    Ok(did)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_memory;

    const DOMAIN: &str = "acme";

    fn proxy() -> (DbPool, BindingProxy) {
        let pool = init_memory().unwrap();
        let proxy = BindingProxy::new(pool.clone(), 16).unwrap();
        (pool, proxy)
    }

    fn device_row(pool: &DbPool, did: i64) -> Option<(i64, String, i64)> {
        pool.get()
            .unwrap()
            .query_row(
                "SELECT hid, name, master_did FROM device_info WHERE domain = ?1 AND did = ?2",
                params![DOMAIN, did],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .ok()
    }

    #[test]
    fn bind_assigns_did_and_self_master() {
        let (pool, proxy) = proxy();
        let did = proxy
            .binding_device(DOMAIN, "flying", "m1", "hub", 7, -1)
            .unwrap();
        assert!(did > 0);
        assert_eq!(device_row(&pool, did), Some((7, "hub".to_string(), did)));

        let binding = proxy.get_binding_by_did(DOMAIN, did).unwrap().unwrap();
        assert_eq!(binding.sub_domain, "flying");
        assert_eq!(binding.device_id, "m1");
        assert!(binding.grant_token.is_none());
    }

    #[test]
    fn rebind_keeps_did() {
        let (pool, proxy) = proxy();
        let first = proxy
            .binding_device(DOMAIN, "flying", "m1", "hub", 7, -1)
            .unwrap();
        let second = proxy
            .binding_device(DOMAIN, "flying", "m1", "renamed", 8, -1)
            .unwrap();
        assert_eq!(first, second);
        assert_eq!(device_row(&pool, first), Some((8, "renamed".to_string(), first)));

        let count: i64 = pool
            .get()
            .unwrap()
            .query_row("SELECT COUNT(*) FROM device_mapping", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn slave_records_master_did() {
        let (pool, proxy) = proxy();
        let master = proxy
            .binding_device(DOMAIN, "flying", "m1", "hub", 7, -1)
            .unwrap();
        let slave = proxy
            .binding_device(DOMAIN, "flying", "s1", "lamp", 7, master)
            .unwrap();
        assert_ne!(master, slave);
        assert_eq!(device_row(&pool, slave).unwrap().2, master);
    }

    #[test]
    fn failed_bind_leaves_no_mapping() {
        let (pool, proxy) = proxy();
        pool.get()
            .unwrap()
            .execute_batch("DROP TABLE device_info")
            .unwrap();

        assert!(proxy.binding_device(DOMAIN, "flying", "m1", "hub", 7, -1).is_err());
        assert!(proxy.get_binding_info(DOMAIN, "flying", "m1").unwrap().is_none());
    }

    #[test]
    fn is_binding_exist_reports_missing() {
        let (_pool, proxy) = proxy();
        assert!(!proxy.is_binding_exist(DOMAIN, 42).unwrap());
        let did = proxy
            .binding_device(DOMAIN, "flying", "m1", "hub", 7, -1)
            .unwrap();
        assert!(proxy.is_binding_exist(DOMAIN, did).unwrap());
        assert!(!proxy.is_binding_exist("other", did).unwrap());
    }

    #[test]
    fn change_binding_invalidates_cache() {
        let (_pool, proxy) = proxy();
        let did = proxy
            .binding_device(DOMAIN, "flying", "m1", "hub", 7, -1)
            .unwrap();
        // Warm the cache with the old key
        assert_eq!(
            proxy.get_binding_by_did(DOMAIN, did).unwrap().unwrap().device_id,
            "m1"
        );

        proxy
            .change_device_binding(did, DOMAIN, "flying", "m2")
            .unwrap();

        let binding = proxy.get_binding_by_did(DOMAIN, did).unwrap().unwrap();
        assert_eq!(binding.device_id, "m2");
        assert_eq!(
            proxy.get_binding_info(DOMAIN, "flying", "m2").unwrap().unwrap().did,
            did
        );
        assert!(proxy.get_binding_info(DOMAIN, "flying", "m1").unwrap().is_none());
    }

    #[test]
    fn change_binding_unknown_did_is_not_exist() {
        let (_pool, proxy) = proxy();
        assert!(matches!(
            proxy.change_device_binding(99, DOMAIN, "flying", "m2"),
            Err(Error::NotExist(_))
        ));
    }

    #[test]
    fn change_binding_clears_grant() {
        let (pool, proxy) = proxy();
        let did = proxy
            .binding_device(DOMAIN, "flying", "m1", "hub", 7, -1)
            .unwrap();
        pool.get()
            .unwrap()
            .execute(
                "UPDATE device_mapping SET bind_token = 'tok', expire_time = '2026-01-01T00:00:00Z' WHERE did = ?1",
                [did],
            )
            .unwrap();
        proxy.clear_cache();
        let granted = proxy.get_binding_by_did(DOMAIN, did).unwrap().unwrap();
        assert_eq!(granted.grant_token.as_deref(), Some("tok"));
        assert!(granted.grant_time.is_some());

        proxy
            .change_device_binding(did, DOMAIN, "flying", "m2")
            .unwrap();
        let changed = proxy.get_binding_by_did(DOMAIN, did).unwrap().unwrap();
        assert!(changed.grant_token.is_none());
        assert!(changed.grant_time.is_none());
    }

    #[test]
    fn corrupt_grant_time_keeps_token() {
        let (pool, proxy) = proxy();
        let did = proxy
            .binding_device(DOMAIN, "flying", "m1", "hub", 7, -1)
            .unwrap();
        pool.get()
            .unwrap()
            .execute(
                "UPDATE device_mapping SET bind_token = 'tok', expire_time = 'yesterday' WHERE did = ?1",
                [did],
            )
            .unwrap();
        proxy.clear_cache();

        let binding = proxy.get_binding_by_did(DOMAIN, did).unwrap().unwrap();
        assert_eq!(binding.grant_token.as_deref(), Some("tok"));
        assert!(binding.grant_time.is_none());
    }
}
