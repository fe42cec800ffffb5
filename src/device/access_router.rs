//! Resolve the physical endpoint a user may reach for a device
//!
//! Every hop is a hard gate: the first failing check ends the call. Reads are
//! not wrapped in a snapshot, so a concurrent rebind or freeze may be observed
//! half-way through a resolution.

use super::binding_manager::BindingManager;
use super::device_manager::DeviceManager;
use super::home_manager::HomeManager;
use super::member_manager::MemberManager;
use super::types::AccessPoint;
use crate::{Error, Result};

/// Walks device, master, binding, home and membership for one request
#[derive(Clone)]
pub struct AccessRouter {
    devices: DeviceManager,
    bindings: BindingManager,
    homes: HomeManager,
    members: MemberManager,
}

impl AccessRouter {
    #[must_use]
    pub const fn new(
        devices: DeviceManager,
        bindings: BindingManager,
        homes: HomeManager,
        members: MemberManager,
    ) -> Self {
        Self {
            devices,
            bindings,
            homes,
            members,
        }
    }

    /// Endpoint that should receive commands for `did` on behalf of `uid`
    ///
    /// Slaves resolve to their master's endpoint. A user with no membership
    /// in the device's home gets `NoPrivilege`, never `NotExist`.
    ///
    /// # Errors
    ///
    /// Returns `NotExist`, `InvalidStatus`, `Unknown`, `NoPrivilege`,
    /// `NotAllowed`, or a store error, whichever gate fails first
    pub fn get_access_point(&self, uid: i64, domain: &str, did: i64) -> Result<AccessPoint> {
        let Some(device) = self.devices.get(domain, did)? else {
            tracing::warn!(domain, did, "device not found");
            return Err(Error::NotExist(format!("device {did}")));
        };
        if !device.status.is_active() {
            tracing::warn!(domain, did, status = %device.status, "device not active");
            return Err(Error::InvalidStatus(format!("device {did} is {}", device.status)));
        }

        let master_did = device.master_did;
        let hid = device.hid;
        if master_did <= 0 || hid <= 0 {
            tracing::error!(domain, did, master_did, hid, "device row missing master or home");
            return Err(Error::Unknown(format!(
                "device {did} has master {master_did} and home {hid}"
            )));
        }

        if !device.is_master() {
            let Some(master) = self.devices.get(domain, master_did)? else {
                tracing::warn!(domain, did, master_did, "master device not exist");
                return Err(Error::NotExist(format!("master device {master_did}")));
            };
            if !master.status.is_active() {
                tracing::warn!(domain, master_did, status = %master.status, "master device not active");
                return Err(Error::InvalidStatus(format!(
                    "master device {master_did} is {}",
                    master.status
                )));
            }
        }

        // Slaves are reached through their master's connection
        let Some(binding) = self.bindings.get(domain, master_did)? else {
            tracing::warn!(domain, master_did, "master device mapping not exist");
            return Err(Error::NotExist(format!("binding of master {master_did}")));
        };

        let Some(home) = self.homes.get(domain, hid)? else {
            tracing::warn!(domain, hid, uid, "home not found");
            return Err(Error::NotExist(format!("home {hid}")));
        };
        if !home.status.is_active() {
            tracing::warn!(domain, hid, "home not active");
            return Err(Error::InvalidStatus(format!("home {hid} is {}", home.status)));
        }

        let Some(member) = self.members.get(domain, hid, uid)? else {
            tracing::warn!(domain, hid, uid, "user is not a member of the home");
            return Err(Error::NoPrivilege(format!("user {uid}")));
        };
        if !member.status.is_active() {
            tracing::warn!(domain, hid, uid, "member not active");
            return Err(Error::NotAllowed(format!("user {uid} is {}", member.status)));
        }

        Ok(AccessPoint {
            sub_domain: binding.sub_domain,
            device_id: binding.device_id,
        })
    }
}
