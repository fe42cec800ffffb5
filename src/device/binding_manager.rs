//! Binding business rules layered over the binding proxy

use std::sync::Arc;

use super::binding_proxy::BindingProxy;
use super::device_manager::DeviceManager;
use super::types::BindingInfo;
use super::warehouse::DeviceWarehouse;
use crate::{Error, Result};

/// Validates identities and master/slave relations before binding
#[derive(Clone)]
pub struct BindingManager {
    warehouse: Arc<DeviceWarehouse>,
    proxy: Arc<BindingProxy>,
    devices: DeviceManager,
}

impl BindingManager {
    #[must_use]
    pub const fn new(
        warehouse: Arc<DeviceWarehouse>,
        proxy: Arc<BindingProxy>,
        devices: DeviceManager,
    ) -> Self {
        Self {
            warehouse,
            proxy,
            devices,
        }
    }

    /// Bind a device to a home, returning its did
    ///
    /// `master_did < 0` binds a master; `master_did > 0` binds a slave routed
    /// through that master, which must already be bound in the same
    /// sub-domain. Rebinding an already-bound key keeps its did.
    ///
    /// # Errors
    ///
    /// Returns `InvalidParam`, `InvalidDevice` when the identity is missing,
    /// corrupted or of the wrong type, `NotYetBinded` when the master is not
    /// bound, or a store error
    pub fn binding(
        &self,
        domain: &str,
        sub_domain: &str,
        device_id: &str,
        name: &str,
        hid: i64,
        master_did: i64,
    ) -> Result<i64> {
        if master_did == 0 || hid <= 0 {
            tracing::warn!(domain, sub_domain, device_id, hid, master_did, "invalid binding request");
            return Err(Error::InvalidParam(format!(
                "hid {hid} / master did {master_did}"
            )));
        }

        self.check_device_info(domain, sub_domain, device_id, master_did < 0)
            .inspect_err(|e| {
                tracing::warn!(domain, sub_domain, device_id, error = %e, "check the binding device failed");
            })?;

        if master_did > 0 {
            self.check_master_device(domain, sub_domain, device_id, master_did)?;
        }

        self.proxy
            .binding_device(domain, sub_domain, device_id, name, hid, master_did)
            .inspect_err(|e| {
                tracing::warn!(domain, sub_domain, device_id, master_did, error = %e, "binding device failed");
            })
    }

    /// Move an existing did onto a replacement device
    ///
    /// The replacement must be registered with the same master/slave type
    /// as the device it replaces and must not be bound to another did.
    ///
    /// # Errors
    ///
    /// Returns `NotExist`, `InvalidStatus`, `NotYetBinded`, `InvalidDevice`,
    /// `AlreadyBinded`, or a store error
    pub fn change_binding(
        &self,
        did: i64,
        domain: &str,
        sub_domain: &str,
        device_id: &str,
    ) -> Result<()> {
        let Some(device) = self.devices.get(domain, did)? else {
            tracing::warn!(domain, did, "old device not exist");
            return Err(Error::NotExist(format!("device {did}")));
        };
        if !device.status.is_active() {
            tracing::warn!(domain, did, status = %device.status, "old device not active");
            return Err(Error::InvalidStatus(format!("device {did} is {}", device.status)));
        }

        if !self.proxy.is_binding_exist(domain, did)? {
            tracing::warn!(domain, did, "the old did is not bound");
            return Err(Error::NotYetBinded(format!("device {did}")));
        }

        self.check_device_info(domain, sub_domain, device_id, device.is_master())
            .inspect_err(|e| {
                tracing::warn!(domain, sub_domain, device_id, did, error = %e, "check device info failed");
            })?;

        if let Some(binding) = self.proxy.get_binding_info(domain, sub_domain, device_id)?
            && binding.did != did
        {
            tracing::warn!(
                domain,
                sub_domain,
                device_id,
                old_did = binding.did,
                new_did = did,
                "device is already bound"
            );
            return Err(Error::AlreadyBinded(format!(
                "[{sub_domain}:{device_id}] bound to did {}",
                binding.did
            )));
        }

        self.proxy
            .change_device_binding(did, domain, sub_domain, device_id)
            .inspect_err(|e| {
                tracing::warn!(domain, sub_domain, device_id, did, error = %e, "change device binding failed");
            })
    }

    /// Binding of a did (returns None if not bound)
    ///
    /// # Errors
    ///
    /// Returns error if the store query fails
    pub fn get(&self, domain: &str, did: i64) -> Result<Option<BindingInfo>> {
        self.proxy.get_binding_by_did(domain, did)
    }

    /// Binding of a physical key (returns None if not bound)
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
        self.proxy.get_binding_info(domain, sub_domain, device_id)
    }

    fn check_device_info(
        &self,
        domain: &str,
        sub_domain: &str,
        device_id: &str,
        is_master: bool,
    ) -> Result<()> {
        let Some(basic) = self.warehouse.get(domain, sub_domain, device_id)? else {
            tracing::warn!(domain, sub_domain, device_id, "device not registered");
            return Err(Error::InvalidDevice(format!(
                "[{sub_domain}:{device_id}] not registered"
            )));
        };

        if !basic.validate() {
            tracing::error!(domain, sub_domain, device_id, "device validate failed");
            return Err(Error::InvalidDevice(format!(
                "[{sub_domain}:{device_id}] failed validation"
            )));
        }
        if is_master != basic.is_master() {
            tracing::warn!(domain, sub_domain, device_id, is_master, "device type mismatch");
            return Err(Error::InvalidDevice(format!(
                "[{sub_domain}:{device_id}] registered as {:?}",
                basic.device_type
            )));
        }
        Ok(())
    }

    fn check_master_device(
        &self,
        domain: &str,
        sub_domain: &str,
        device_id: &str,
        master_did: i64,
    ) -> Result<()> {
        let Some(master_device) = self.devices.get(domain, master_did)? else {
            tracing::warn!(
                domain,
                sub_domain,
                device_id,
                master_did,
                "master device not placed in a home"
            );
            return Err(Error::NotYetBinded(format!("master {master_did}")));
        };
        if !master_device.is_master() {
            tracing::warn!(
                domain,
                sub_domain,
                device_id,
                master_did,
                its_master = master_device.master_did,
                "master did refers to a slave device"
            );
            return Err(Error::InvalidDevice(format!("did {master_did} is not a master")));
        }

        let Some(master) = self.proxy.get_binding_by_did(domain, master_did)? else {
            tracing::warn!(domain, sub_domain, device_id, master_did, "master device not bound");
            return Err(Error::NotYetBinded(format!("master {master_did}")));
        };

        if master.sub_domain != sub_domain || master.device_id == device_id {
            tracing::warn!(
                domain,
                sub_domain,
                device_id,
                master_sub_domain = %master.sub_domain,
                master_device_id = %master.device_id,
                master_did,
                "check the device info with master failed"
            );
            return Err(Error::InvalidDevice(format!(
                "[{sub_domain}:{device_id}] cannot route through master {master_did}"
            )));
        }
        Ok(())
    }
}
