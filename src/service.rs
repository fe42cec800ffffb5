//! Service facade wiring the repositories over one pool and shared caches

use std::sync::Arc;

use crate::config::Config;
use crate::db::DbPool;
use crate::device::{
    AccessPoint, AccessRouter, BindingManager, BindingProxy, DeviceManager, DeviceWarehouse,
    HomeManager, MemberManager,
};
use crate::{Error, Result};

/// Entry point for device, binding, home and access operations
///
/// Every manager handed out shares the same warehouse and binding proxy, so
/// invalidations made through one are seen by all.
#[derive(Clone)]
pub struct DeviceService {
    warehouse: Arc<DeviceWarehouse>,
    bindings: BindingManager,
    devices: DeviceManager,
    homes: HomeManager,
    members: MemberManager,
    router: AccessRouter,
}

impl DeviceService {
    /// Build the service over an initialized pool
    ///
    /// # Errors
    ///
    /// Returns `InvalidParam` if a cache capacity is zero
    pub fn new(pool: DbPool, config: &Config) -> Result<Self> {
        let warehouse = Arc::new(DeviceWarehouse::new(
            pool.clone(),
            config.warehouse_cache_capacity,
        )?);
        let proxy = Arc::new(BindingProxy::new(
            pool.clone(),
            config.binding_cache_capacity,
        )?);
        if !config.cache_enabled {
            warehouse.switch_cache(false);
            proxy.switch_cache(false);
        }

        let devices = DeviceManager::new(pool.clone());
        let homes = HomeManager::new(pool.clone());
        let members = MemberManager::new(pool);
        let bindings = BindingManager::new(Arc::clone(&warehouse), proxy, devices.clone());
        let router = AccessRouter::new(
            devices.clone(),
            bindings.clone(),
            homes.clone(),
            members.clone(),
        );

        tracing::debug!(
            warehouse_cache = config.warehouse_cache_capacity,
            binding_cache = config.binding_cache_capacity,
            cache_enabled = config.cache_enabled,
            "device service ready"
        );

        Ok(Self {
            warehouse,
            bindings,
            devices,
            homes,
            members,
            router,
        })
    }

    #[must_use]
    pub fn warehouse(&self) -> &DeviceWarehouse {
        &self.warehouse
    }

    #[must_use]
    pub const fn bindings(&self) -> &BindingManager {
        &self.bindings
    }

    #[must_use]
    pub const fn devices(&self) -> &DeviceManager {
        &self.devices
    }

    #[must_use]
    pub const fn homes(&self) -> &HomeManager {
        &self.homes
    }

    #[must_use]
    pub const fn members(&self) -> &MemberManager {
        &self.members
    }

    #[must_use]
    pub const fn access_router(&self) -> &AccessRouter {
        &self.router
    }

    /// Resolve the endpoint for `did` on behalf of `uid`
    ///
    /// # Errors
    ///
    /// Returns `InvalidParam` for an empty domain or non-positive ids, then
    /// whatever the access router rejects
    pub fn get_access_point(&self, uid: i64, domain: &str, did: i64) -> Result<AccessPoint> {
        if domain.is_empty() || uid <= 0 || did <= 0 {
            tracing::warn!(domain, uid, did, "check access point request failed");
            return Err(Error::InvalidParam(format!(
                "domain {domain:?} uid {uid} did {did}"
            )));
        }
        self.router.get_access_point(uid, domain, did)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_memory;

    fn service(config: &Config) -> DeviceService {
        DeviceService::new(init_memory().unwrap(), config).unwrap()
    }

    #[test]
    fn rejects_malformed_access_request() {
        let svc = service(&Config::default());
        for (uid, domain, did) in [(1, "", 1), (0, "acme", 1), (1, "acme", 0), (-3, "acme", -1)] {
            assert!(matches!(
                svc.get_access_point(uid, domain, did),
                Err(Error::InvalidParam(_))
            ));
        }
    }

    #[test]
    fn zero_capacity_rejected() {
        let config = Config {
            warehouse_cache_capacity: 0,
            ..Config::default()
        };
        assert!(matches!(
            DeviceService::new(init_memory().unwrap(), &config),
            Err(Error::InvalidParam(_))
        ));
    }

    #[test]
    fn cache_disabled_by_config() {
        let config = Config {
            cache_enabled: false,
            ..Config::default()
        };
        let svc = service(&config);
        svc.warehouse()
            .register("acme", "s", "m", "key", true)
            .unwrap();
        svc.warehouse().get("acme", "s", "m").unwrap().unwrap();
        assert_eq!(svc.warehouse().cache_stats().len, 0);
    }
}
