//! Shared test utilities

#![allow(dead_code)]

use homelink::{Config, DbPool, DeviceService, db};

pub const DOMAIN: &str = "acme";
pub const SUB_DOMAIN: &str = "flying";
pub const OWNER_UID: i64 = 100;

/// Set up an in-memory test database
#[must_use]
pub fn setup_test_db() -> DbPool {
    db::init_memory().expect("failed to init test db")
}

/// Build a service over a fresh in-memory database
#[must_use]
pub fn setup_service() -> DeviceService {
    DeviceService::new(setup_test_db(), &test_config()).expect("failed to build service")
}

/// Build a service with caches off, returning the pool for direct row edits
#[must_use]
pub fn setup_uncached_service() -> (DeviceService, DbPool) {
    let pool = setup_test_db();
    let config = Config {
        cache_enabled: false,
        ..test_config()
    };
    let svc = DeviceService::new(pool.clone(), &config).expect("failed to build service");
    (svc, pool)
}

/// Run a raw statement against the store
pub fn exec(pool: &DbPool, sql: &str, did: i64) {
    pool.get()
        .expect("failed to get connection")
        .execute(sql, [did])
        .expect("failed to run statement");
}

/// Config with small caches
#[must_use]
pub fn test_config() -> Config {
    Config {
        warehouse_cache_capacity: 128,
        binding_cache_capacity: 128,
        ..Config::default()
    }
}

/// Register a master identity with a throwaway key
pub fn register_master(svc: &DeviceService, device_id: &str) {
    svc.warehouse()
        .register(DOMAIN, SUB_DOMAIN, device_id, &format!("pk-{device_id}"), true)
        .expect("failed to register master");
}

/// Register a normal (slave) identity
pub fn register_slave(svc: &DeviceService, device_id: &str) {
    svc.warehouse()
        .register(DOMAIN, SUB_DOMAIN, device_id, "", false)
        .expect("failed to register slave");
}

/// Create a home owned by `OWNER_UID`
pub fn create_home(svc: &DeviceService) -> i64 {
    svc.homes()
        .create(DOMAIN, OWNER_UID, "home")
        .expect("failed to create home")
}

/// A home with one bound master and `slaves` bound slaves
///
/// Returns (hid, master did, slave dids).
pub fn home_with_devices(svc: &DeviceService, slaves: usize) -> (i64, i64, Vec<i64>) {
    let hid = create_home(svc);
    register_master(svc, "master");
    let master = svc
        .bindings()
        .binding(DOMAIN, SUB_DOMAIN, "master", "hub", hid, -1)
        .expect("failed to bind master");

    let dids = (0..slaves)
        .map(|i| {
            let device_id = format!("slave-{i}");
            register_slave(svc, &device_id);
            svc.bindings()
                .binding(DOMAIN, SUB_DOMAIN, &device_id, &device_id, hid, master)
                .expect("failed to bind slave")
        })
        .collect();

    (hid, master, dids)
}
