//! Homes: creation with owner membership, status and removal

use rusqlite::params;

use super::member_manager::{MemberManager, OWNER_NAME};
use super::types::{Home, MemberType, Status};
use crate::db::{self, DbPool};
use crate::{Error, Result};

/// Manages `home_info` rows
#[derive(Clone)]
pub struct HomeManager {
    pool: DbPool,
}

impl HomeManager {
    #[must_use]
    pub const fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Get a home by hid (returns None if not found)
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn get(&self, domain: &str, hid: i64) -> Result<Option<Home>> {
        let conn = db::connect(&self.pool)?;
        let result = conn.query_row(
            "SELECT hid, name, status, create_uid FROM home_info WHERE domain = ?1 AND hid = ?2",
            params![domain, hid],
            |row| {
                Ok(Home {
                    hid: row.get(0)?,
                    name: row.get(1)?,
                    status: Status::from_code(row.get(2)?),
                    create_uid: row.get(3)?,
                })
            },
        );

        match result {
            Ok(home) => Ok(Some(home)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => {
                tracing::warn!(domain, hid, error = %e, "get home failed");
                Err(e.into())
            }
        }
    }

    /// Create a home and record its creator as owner, returning the hid
    ///
    /// # Errors
    ///
    /// Returns `InvalidParam` for an empty name, or a store error
    pub fn create(&self, domain: &str, uid: i64, name: &str) -> Result<i64> {
        if name.is_empty() {
            tracing::warn!(domain, uid, "empty home name");
            return Err(Error::InvalidParam("empty home name".to_string()));
        }

        let mut conn = db::connect(&self.pool)?;
        let tx = conn.transaction()?;
        tx.execute(
            "INSERT INTO home_info (domain, name, status, create_uid) VALUES (?1, ?2, ?3, ?4)",
            params![domain, name, Status::Active.code(), uid],
        )
        .inspect_err(|e| {
            tracing::error!(domain, uid, name, error = %e, "create home failed");
        })?;
        let hid = tx.last_insert_rowid();

        tx.execute(
            "INSERT INTO home_members (domain, uid, hid, type, name, status) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                domain,
                uid,
                hid,
                MemberType::Owner.code(),
                OWNER_NAME,
                Status::Active.code()
            ],
        )
        .map_err(|e| {
            tracing::error!(domain, uid, hid, error = %e, "add owner to home failed");
            Error::from_insert(e, &format!("owner {uid} of home {hid}"))
        })?;
        tx.commit()?;

        tracing::info!(domain, uid, hid, name, "home created");
        Ok(hid)
    }

    /// Delete a home with its devices and members
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn delete(&self, domain: &str, hid: i64) -> Result<()> {
        let mut conn = db::connect(&self.pool)?;
        let tx = conn.transaction()?;
        tx.execute(
            "DELETE FROM device_info WHERE domain = ?1 AND hid = ?2",
            params![domain, hid],
        )?;
        tx.execute(
            "DELETE FROM home_members WHERE domain = ?1 AND hid = ?2",
            params![domain, hid],
        )?;
        tx.execute(
            "DELETE FROM home_info WHERE domain = ?1 AND hid = ?2",
            params![domain, hid],
        )?;
        tx.commit().inspect_err(|e| {
            tracing::warn!(domain, hid, error = %e, "delete home failed");
        })?;
        Ok(())
    }

    /// Every home the user belongs to
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn get_all_homes(&self, domain: &str, uid: i64) -> Result<Vec<Home>> {
        let hids = MemberManager::new(self.pool.clone()).get_all_home_ids(domain, uid)?;
        let mut homes = Vec::with_capacity(hids.len());
        for hid in hids {
            match self.get(domain, hid)? {
                Some(home) => homes.push(home),
                None => tracing::warn!(domain, uid, hid, "member of missing home"),
            }
        }
        Ok(homes)
    }

    /// # Errors
    ///
    /// Returns `NotExist` if the home is missing
    pub fn enable(&self, domain: &str, hid: i64) -> Result<()> {
        self.modify(
            domain,
            hid,
            "UPDATE home_info SET status = ?1 WHERE domain = ?2 AND hid = ?3",
            Status::Active.code(),
        )
    }

    /// # Errors
    ///
    /// Returns `NotExist` if the home is missing
    pub fn disable(&self, domain: &str, hid: i64) -> Result<()> {
        self.modify(
            domain,
            hid,
            "UPDATE home_info SET status = ?1 WHERE domain = ?2 AND hid = ?3",
            Status::Frozen.code(),
        )
    }

    /// Rename an active home
    ///
    /// # Errors
    ///
    /// Returns `InvalidName`, `NotExist` or `InvalidStatus`
    pub fn modify_name(&self, domain: &str, hid: i64, name: &str) -> Result<()> {
        if name.is_empty() {
            return Err(Error::InvalidName(format!("empty name for home {hid}")));
        }
        match self.get(domain, hid)? {
            None => {
                tracing::warn!(domain, hid, "home not exist");
                Err(Error::NotExist(format!("home {hid}")))
            }
            Some(home) if !home.status.is_active() => {
                tracing::warn!(domain, hid, "home is not active");
                Err(Error::InvalidStatus(format!("home {hid} is {}", home.status)))
            }
            Some(_) => self.modify(
                domain,
                hid,
                "UPDATE home_info SET name = ?1 WHERE domain = ?2 AND hid = ?3",
                name,
            ),
        }
    }

    fn modify(
        &self,
        domain: &str,
        hid: i64,
        sql: &str,
        value: impl rusqlite::ToSql,
    ) -> Result<()> {
        let conn = db::connect(&self.pool)?;
        let rows = conn.execute(sql, params![value, domain, hid])?;
        match rows {
            1 => Ok(()),
            0 => {
                tracing::warn!(domain, hid, "home not exist");
                Err(Error::NotExist(format!("home {hid}")))
            }
            _ => {
                tracing::error!(domain, hid, rows, "update matched several homes");
                Err(Error::Unknown(format!("{rows} homes matched hid {hid}")))
            }
        }
    }
}
