//! Homelink - Device identity, binding and access routing for IoT homes
//!
//! This library provides the core functionality for homelink:
//! - Device identity warehouse with an LRU read cache
//! - Transactional binding of identities to numeric device ids
//! - Homes, members and bound devices
//! - Access routing from (user, device) to the physical endpoint
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                  DeviceService                       │
//! │   AccessRouter  │  BindingManager  │  Homes/Members  │
//! └────────────────────┬────────────────────────────────┘
//!                      │
//! ┌────────────────────▼────────────────────────────────┐
//! │      DeviceWarehouse  │  BindingProxy (+ caches)     │
//! └────────────────────┬────────────────────────────────┘
//!                      │
//! ┌────────────────────▼────────────────────────────────┐
//! │             SQLite (r2d2 connection pool)            │
//! └─────────────────────────────────────────────────────┘
//! ```

pub mod cache;
pub mod config;
pub mod db;
pub mod device;
pub mod error;
pub mod service;

pub use cache::{CacheStats, LruStore};
pub use config::Config;
pub use db::{DbConn, DbPool};
pub use device::{
    AccessPoint, BasicInfo, BindingInfo, DeviceInfo, DeviceType, Home, Member, MemberType, Status,
};
pub use error::{Error, ErrorKind, Result};
pub use service::DeviceService;
