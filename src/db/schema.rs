//! Database schema and migrations
//!
//! Every table carries a `domain` column holding the tenant identifier. The
//! tenant is always bound as a statement parameter, never spliced into SQL.

use rusqlite::Connection;

use crate::Result;

/// Current schema version
pub const SCHEMA_VERSION: i32 = 2;

/// Initialize the database schema
///
/// # Errors
///
/// Returns error if migration fails
pub fn init(conn: &Connection) -> Result<()> {
    let version: i32 = conn
        .query_row("PRAGMA user_version", [], |row| row.get(0))
        .unwrap_or(0);

    if version < 1 {
        migrate_v1(conn)?;
    }
    if version < 2 {
        migrate_v2(conn)?;
    }

    Ok(())
}

fn migrate_v1(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r"
        -- Registered device identities
        CREATE TABLE IF NOT EXISTS device_warehouse (
            domain TEXT NOT NULL,
            sub_domain TEXT NOT NULL,
            device_id TEXT NOT NULL,
            device_type INTEGER NOT NULL CHECK(device_type IN (0, 1)),
            public_key TEXT,
            status INTEGER NOT NULL,
            PRIMARY KEY (domain, sub_domain, device_id)
        );

        -- Network identity to numeric did
        CREATE TABLE IF NOT EXISTS device_mapping (
            did INTEGER PRIMARY KEY AUTOINCREMENT,
            domain TEXT NOT NULL,
            sub_domain TEXT NOT NULL,
            device_id TEXT NOT NULL,
            bind_token TEXT,
            expire_time TEXT,
            UNIQUE (domain, sub_domain, device_id)
        );

        -- Bound devices, home placement and master relation
        CREATE TABLE IF NOT EXISTS device_info (
            domain TEXT NOT NULL,
            did INTEGER NOT NULL,
            hid INTEGER NOT NULL,
            name TEXT NOT NULL,
            status INTEGER NOT NULL,
            master_did INTEGER NOT NULL,
            PRIMARY KEY (domain, did)
        );

        CREATE TABLE IF NOT EXISTS home_info (
            hid INTEGER PRIMARY KEY AUTOINCREMENT,
            domain TEXT NOT NULL,
            name TEXT NOT NULL,
            status INTEGER NOT NULL,
            create_uid INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS home_members (
            domain TEXT NOT NULL,
            uid INTEGER NOT NULL,
            hid INTEGER NOT NULL,
            type INTEGER NOT NULL,
            name TEXT NOT NULL,
            status INTEGER NOT NULL,
            PRIMARY KEY (domain, uid, hid)
        );

        PRAGMA user_version = 1;
        ",
    )?;

    tracing::info!("migrated to schema v1");
    Ok(())
}

fn migrate_v2(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r"
        -- Home-scoped lookups for device listing and cascade deletes
        CREATE INDEX IF NOT EXISTS idx_device_info_home ON device_info(domain, hid);
        CREATE INDEX IF NOT EXISTS idx_device_info_master ON device_info(domain, hid, master_did);
        CREATE INDEX IF NOT EXISTS idx_home_members_home ON home_members(domain, hid);

        PRAGMA user_version = 2;
        ",
    )?;

    tracing::info!("migrated to schema v2");
    Ok(())
}
