//! rokucast Core - Shared types for discovering and casting to streaming players
//!
//! This crate provides the foundational types for the rokucast system:
//! - Local addresses and the /24 subnet prefixes derived from them
//! - Device-info records and discovered devices
//! - The persisted settings store (selected device address, channel variant)
//! - Localized status/notification message codes
//! - The page-extraction message protocol

pub mod address;
pub mod device;
pub mod extract;
pub mod message;
pub mod settings;

pub use address::{LocalAddress, SubnetPrefix, HOSTS_PER_PREFIX};
pub use device::{DeviceInfo, DiscoveredDevice};
pub use extract::{ExtractRequest, ExtractResponse, Streamer, Video};
pub use message::{MessageCode, UserMessage};
pub use settings::{Settings, SettingsError, SettingsStore};
