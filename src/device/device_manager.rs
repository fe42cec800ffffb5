//! Bound device records: lookup, listing, status and cascade delete

use rusqlite::{Row, params};

use super::types::{DeviceInfo, Status};
use crate::db::{self, DbPool};
use crate::{Error, Result};

/// Manages `device_info` rows created by binding
#[derive(Clone)]
pub struct DeviceManager {
    pool: DbPool,
}

impl DeviceManager {
    #[must_use]
    pub const fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Get a device by did (returns None if not found)
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn get(&self, domain: &str, did: i64) -> Result<Option<DeviceInfo>> {
        let conn = db::connect(&self.pool)?;
        let result = conn.query_row(
            "SELECT did, hid, name, status, master_did FROM device_info
             WHERE domain = ?1 AND did = ?2",
            params![domain, did],
            row_to_device,
        );

        match result {
            Ok(device) => Ok(Some(device)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => {
                tracing::error!(domain, did, error = %e, "get device info failed");
                Err(e.into())
            }
        }
    }

    /// List every device placed in a home
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn get_all_devices(&self, domain: &str, hid: i64) -> Result<Vec<DeviceInfo>> {
        let conn = db::connect(&self.pool)?;
        let mut stmt = conn.prepare(
            "SELECT did, hid, name, status, master_did FROM device_info
             WHERE domain = ?1 AND hid = ?2 ORDER BY did",
        )?;

        let devices = stmt
            .query_map(params![domain, hid], row_to_device)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .inspect_err(|e| {
                tracing::warn!(domain, hid, error = %e, "parse home devices failed");
            })?;

        Ok(devices)
    }

    /// Delete a device from a home
    ///
    /// Deleting a master also deletes every slave in the home that routes
    /// through it. Both deletes share one transaction.
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn delete_device(&self, domain: &str, hid: i64, did: i64) -> Result<()> {
        let mut conn = db::connect(&self.pool)?;
        let tx = conn.transaction()?;

        tx.execute(
            "DELETE FROM device_info WHERE domain = ?1 AND did = ?2 AND hid = ?3",
            params![domain, did, hid],
        )
        .inspect_err(|e| {
            tracing::error!(domain, hid, did, error = %e, "delete device failed");
        })?;
        let slaves = tx
            .execute(
                "DELETE FROM device_info WHERE domain = ?1 AND hid = ?2 AND master_did = ?3",
                params![domain, hid, did],
            )
            .inspect_err(|e| {
                tracing::error!(domain, hid, did, error = %e, "delete related slave devices failed");
            })?;

        tx.commit()?;
        tracing::debug!(domain, hid, did, slaves, "device deleted");
        Ok(())
    }

    /// Delete every device of a home
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn delete_all_devices(&self, domain: &str, hid: i64) -> Result<()> {
        let conn = db::connect(&self.pool)?;
        conn.execute(
            "DELETE FROM device_info WHERE domain = ?1 AND hid = ?2",
            params![domain, hid],
        )
        .inspect_err(|e| {
            tracing::error!(domain, hid, error = %e, "delete all devices of home failed");
        })?;
        Ok(())
    }

    /// Rename an active device
    ///
    /// # Errors
    ///
    /// Returns `InvalidName` for an empty name, `NotExist` if no active
    /// device matched
    pub fn change_device_name(&self, domain: &str, did: i64, name: &str) -> Result<()> {
        if name.is_empty() {
            return Err(Error::InvalidName(format!("empty name for device {did}")));
        }
        let conn = db::connect(&self.pool)?;
        let rows = conn.execute(
            "UPDATE device_info SET name = ?1 WHERE domain = ?2 AND did = ?3 AND status = ?4",
            params![name, domain, did, Status::Active.code()],
        )?;
        check_single_row(rows, domain, did)
    }

    /// Mark a device active
    ///
    /// # Errors
    ///
    /// Returns `NotExist` if the device is missing
    pub fn enable(&self, domain: &str, did: i64) -> Result<()> {
        self.set_status(domain, did, Status::Active)
    }

    /// Freeze a device
    ///
    /// # Errors
    ///
    /// Returns `NotExist` if the device is missing
    pub fn disable(&self, domain: &str, did: i64) -> Result<()> {
        self.set_status(domain, did, Status::Frozen)
    }

    fn set_status(&self, domain: &str, did: i64, status: Status) -> Result<()> {
        let conn = db::connect(&self.pool)?;
        let rows = conn.execute(
            "UPDATE device_info SET status = ?1 WHERE domain = ?2 AND did = ?3",
            params![status.code(), domain, did],
        )?;
        check_single_row(rows, domain, did)
    }
}

fn check_single_row(rows: usize, domain: &str, did: i64) -> Result<()> {
    if rows == 1 {
        Ok(())
    } else {
        tracing::warn!(domain, did, rows, "update device info failed");
        Err(Error::NotExist(format!("device {did}")))
    }
}

fn row_to_device(row: &Row<'_>) -> rusqlite::Result<DeviceInfo> {
    Ok(DeviceInfo {
        did: row.get(0)?,
        hid: row.get(1)?,
        name: row.get(2)?,
        status: Status::from_code(row.get(3)?),
        master_did: row.get(4)?,
    })
}
