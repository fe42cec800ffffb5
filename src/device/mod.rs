//! Device identity, binding and home membership
//!
//! Identities are registered in the warehouse, bound to a numeric did by the
//! binding proxy, placed in homes, and resolved to a physical endpoint by the
//! access router.

mod access_router;
mod binding_cache;
mod binding_manager;
mod binding_proxy;
mod device_manager;
mod home_manager;
mod member_manager;
mod types;
mod warehouse;

pub use access_router::AccessRouter;
pub use binding_cache::BindingCache;
pub use binding_manager::BindingManager;
pub use binding_proxy::BindingProxy;
pub use device_manager::DeviceManager;
pub use home_manager::HomeManager;
pub use member_manager::{MemberManager, OWNER_NAME};
pub use types::{
    AccessPoint, BasicInfo, BindingInfo, DeviceInfo, DeviceType, Home, Member, MemberType, Status,
};
pub use warehouse::DeviceWarehouse;
