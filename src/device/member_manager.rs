//! Home membership: owners, guests and their status

use rusqlite::{Row, params};

use super::home_manager::HomeManager;
use super::types::{Home, Member, MemberType, Status};
use crate::db::{self, DbPool};
use crate::{Error, Result};

/// Member name given to a home creator
pub const OWNER_NAME: &str = "owner";

/// Manages `home_members` rows
#[derive(Clone)]
pub struct MemberManager {
    pool: DbPool,
}

impl MemberManager {
    #[must_use]
    pub const fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Get a user's membership of a home (returns None if not a member)
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn get(&self, domain: &str, hid: i64, uid: i64) -> Result<Option<Member>> {
        let conn = db::connect(&self.pool)?;
        let result = conn.query_row(
            "SELECT uid, hid, name, type, status FROM home_members
             WHERE domain = ?1 AND uid = ?2 AND hid = ?3",
            params![domain, uid, hid],
            row_to_member,
        );

        match result {
            Ok(member) => Ok(Some(member)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => {
                tracing::warn!(domain, hid, uid, error = %e, "get member info failed");
                Err(e.into())
            }
        }
    }

    /// Ids of every home the user belongs to
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn get_all_home_ids(&self, domain: &str, uid: i64) -> Result<Vec<i64>> {
        let conn = db::connect(&self.pool)?;
        let mut stmt =
            conn.prepare("SELECT hid FROM home_members WHERE domain = ?1 AND uid = ?2 ORDER BY hid")?;
        let hids = stmt
            .query_map(params![domain, uid], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<i64>>>()?;
        Ok(hids)
    }

    /// Record `uid` as owner of a home
    ///
    /// # Errors
    ///
    /// Returns `InvalidName` for an empty name, `Constraint` if already a member
    pub fn add_owner(&self, domain: &str, name: &str, hid: i64, uid: i64) -> Result<()> {
        if name.is_empty() {
            tracing::warn!(domain, hid, uid, "empty owner name");
            return Err(Error::InvalidName("empty owner name".to_string()));
        }
        self.insert(domain, name, hid, uid, MemberType::Owner)
    }

    /// Add a normal member to an active home
    ///
    /// Adding the home's creator is accepted without writing anything.
    ///
    /// # Errors
    ///
    /// Returns `InvalidName`, `NotExist`, `InvalidStatus` or `Constraint`
    pub fn add_member(&self, domain: &str, name: &str, hid: i64, uid: i64) -> Result<()> {
        if name.is_empty() {
            tracing::warn!(domain, hid, uid, "empty member name");
            return Err(Error::InvalidName("empty member name".to_string()));
        }
        let home = self.active_home(domain, hid)?;
        if home.create_uid == uid {
            tracing::warn!(domain, hid, uid, "the user is the creator");
            return Ok(());
        }
        self.insert(domain, name, hid, uid, MemberType::Normal)
    }

    /// Remove a member from an active home; removing a non-member succeeds
    ///
    /// # Errors
    ///
    /// Returns `NotExist` or `InvalidStatus` for the home, or a store error
    pub fn delete(&self, domain: &str, hid: i64, uid: i64) -> Result<()> {
        self.active_home(domain, hid)?;
        let conn = db::connect(&self.pool)?;
        conn.execute(
            "DELETE FROM home_members WHERE domain = ?1 AND uid = ?2 AND hid = ?3",
            params![domain, uid, hid],
        )
        .inspect_err(|e| {
            tracing::warn!(domain, hid, uid, error = %e, "delete member failed");
        })?;
        Ok(())
    }

    /// Every member of a home
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn get_all_members(&self, domain: &str, hid: i64) -> Result<Vec<Member>> {
        let conn = db::connect(&self.pool)?;
        let mut stmt = conn.prepare(
            "SELECT uid, hid, name, type, status FROM home_members
             WHERE domain = ?1 AND hid = ?2 ORDER BY uid",
        )?;
        let members = stmt
            .query_map(params![domain, hid], row_to_member)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(members)
    }

    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn delete_all_members(&self, domain: &str, hid: i64) -> Result<()> {
        let conn = db::connect(&self.pool)?;
        conn.execute(
            "DELETE FROM home_members WHERE domain = ?1 AND hid = ?2",
            params![domain, hid],
        )?;
        Ok(())
    }

    /// # Errors
    ///
    /// Returns `NotExist` if the membership is missing
    pub fn enable(&self, domain: &str, hid: i64, uid: i64) -> Result<()> {
        self.modify(
            domain,
            hid,
            uid,
            "UPDATE home_members SET status = ?1 WHERE domain = ?2 AND uid = ?3 AND hid = ?4",
            Status::Active.code(),
        )
    }

    /// # Errors
    ///
    /// Returns `NotExist` if the membership is missing
    pub fn disable(&self, domain: &str, hid: i64, uid: i64) -> Result<()> {
        self.modify(
            domain,
            hid,
            uid,
            "UPDATE home_members SET status = ?1 WHERE domain = ?2 AND uid = ?3 AND hid = ?4",
            Status::Frozen.code(),
        )
    }

    /// # Errors
    ///
    /// Returns `InvalidName` or `NotExist`
    pub fn modify_name(&self, domain: &str, hid: i64, uid: i64, name: &str) -> Result<()> {
        if name.is_empty() {
            return Err(Error::InvalidName("empty member name".to_string()));
        }
        self.modify(
            domain,
            hid,
            uid,
            "UPDATE home_members SET name = ?1 WHERE domain = ?2 AND uid = ?3 AND hid = ?4",
            name,
        )
    }

    fn active_home(&self, domain: &str, hid: i64) -> Result<Home> {
        match HomeManager::new(self.pool.clone()).get(domain, hid)? {
            None => {
                tracing::warn!(domain, hid, "home not exist");
                Err(Error::NotExist(format!("home {hid}")))
            }
            Some(home) if !home.status.is_active() => {
                tracing::warn!(domain, hid, "check home status failed");
                Err(Error::InvalidStatus(format!("home {hid} is {}", home.status)))
            }
            Some(home) => Ok(home),
        }
    }

    fn insert(
        &self,
        domain: &str,
        name: &str,
        hid: i64,
        uid: i64,
        member_type: MemberType,
    ) -> Result<()> {
        let conn = db::connect(&self.pool)?;
        conn.execute(
            "INSERT INTO home_members (domain, uid, hid, type, name, status) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![domain, uid, hid, member_type.code(), name, Status::Active.code()],
        )
        .map_err(|e| {
            tracing::warn!(domain, name, hid, uid, error = %e, "insert member failed");
            Error::from_insert(e, &format!("member {uid} of home {hid}"))
        })?;
        Ok(())
    }

    fn modify(
        &self,
        domain: &str,
        hid: i64,
        uid: i64,
        sql: &str,
        value: impl rusqlite::ToSql,
    ) -> Result<()> {
        let conn = db::connect(&self.pool)?;
        let rows = conn.execute(sql, params![value, domain, uid, hid])?;
        match rows {
            1 => Ok(()),
            0 => {
                tracing::warn!(domain, hid, uid, "member not exist");
                Err(Error::NotExist(format!("member {uid} of home {hid}")))
            }
            _ => {
                tracing::error!(domain, hid, uid, rows, "update matched several members");
                Err(Error::Unknown(format!("{rows} members matched")))
            }
        }
    }
}

fn row_to_member(row: &Row<'_>) -> rusqlite::Result<Member> {
    Ok(Member {
        uid: row.get(0)?,
        hid: row.get(1)?,
        name: row.get(2)?,
        member_type: MemberType::from_code(row.get(3)?),
        status: Status::from_code(row.get(4)?),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_memory;

    const DOMAIN: &str = "acme";
    const OWNER: i64 = 100;

    fn setup() -> (MemberManager, HomeManager, i64) {
        let pool = init_memory().unwrap();
        let homes = HomeManager::new(pool.clone());
        let hid = homes.create(DOMAIN, OWNER, "home").unwrap();
        (MemberManager::new(pool), homes, hid)
    }

    #[test]
    fn add_and_list_members() {
        let (members, _homes, hid) = setup();
        members.add_member(DOMAIN, "guest", hid, 200).unwrap();
        members.add_member(DOMAIN, "guest2", hid, 300).unwrap();

        let all = members.get_all_members(DOMAIN, hid).unwrap();
        assert_eq!(all.len(), 3);
        let guest = members.get(DOMAIN, hid, 200).unwrap().unwrap();
        assert_eq!(guest.member_type, MemberType::Normal);
        assert!(guest.status.is_active());
        assert_eq!(members.get_all_home_ids(DOMAIN, 200).unwrap(), vec![hid]);
    }

    #[test]
    fn add_member_rules() {
        let (members, homes, hid) = setup();
        assert!(matches!(
            members.add_member(DOMAIN, "", hid, 200),
            Err(Error::InvalidName(_))
        ));
        assert!(matches!(
            members.add_member(DOMAIN, "guest", 999, 200),
            Err(Error::NotExist(_))
        ));

        // Creator is already a member
        members.add_member(DOMAIN, "me", hid, OWNER).unwrap();
        assert_eq!(members.get_all_members(DOMAIN, hid).unwrap().len(), 1);

        members.add_member(DOMAIN, "guest", hid, 200).unwrap();
        assert!(matches!(
            members.add_member(DOMAIN, "guest", hid, 200),
            Err(Error::Constraint(_))
        ));

        homes.disable(DOMAIN, hid).unwrap();
        assert!(matches!(
            members.add_member(DOMAIN, "late", hid, 300),
            Err(Error::InvalidStatus(_))
        ));
    }

    #[test]
    fn delete_member_is_idempotent() {
        let (members, _homes, hid) = setup();
        members.add_member(DOMAIN, "guest", hid, 200).unwrap();
        members.delete(DOMAIN, hid, 200).unwrap();
        members.delete(DOMAIN, hid, 200).unwrap();
        assert!(members.get(DOMAIN, hid, 200).unwrap().is_none());
    }

    #[test]
    fn freeze_and_rename_member() {
        let (members, _homes, hid) = setup();
        members.add_member(DOMAIN, "guest", hid, 200).unwrap();

        members.disable(DOMAIN, hid, 200).unwrap();
        assert_eq!(
            members.get(DOMAIN, hid, 200).unwrap().unwrap().status,
            Status::Frozen
        );
        members.enable(DOMAIN, hid, 200).unwrap();
        members.modify_name(DOMAIN, hid, 200, "friend").unwrap();
        assert_eq!(members.get(DOMAIN, hid, 200).unwrap().unwrap().name, "friend");

        assert!(matches!(
            members.disable(DOMAIN, hid, 999),
            Err(Error::NotExist(_))
        ));
    }

    #[test]
    fn add_owner_requires_name() {
        let (members, _homes, hid) = setup();
        assert!(matches!(
            members.add_owner(DOMAIN, "", hid, 5),
            Err(Error::InvalidName(_))
        ));
        members.add_owner(DOMAIN, "co-owner", hid, 5).unwrap();
        assert_eq!(
            members.get(DOMAIN, hid, 5).unwrap().unwrap().member_type,
            MemberType::Owner
        );
    }

    #[test]
    fn delete_all_members() {
        let (members, _homes, hid) = setup();
        members.add_member(DOMAIN, "guest", hid, 200).unwrap();
        members.delete_all_members(DOMAIN, hid).unwrap();
        assert!(members.get_all_members(DOMAIN, hid).unwrap().is_empty());
    }
}
