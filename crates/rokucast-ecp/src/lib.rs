//! rokucast ECP - Client for the players' local HTTP control protocol
//!
//! Devices answer on port 8060. This crate provides the device-info query
//! used to confirm a device's identity and the deep-link launch request used
//! to cast a stream to it.

pub mod client;
pub mod device_info;
pub mod launch;

pub use client::{
    EcpClient, EcpError, RawResponse, DEVICE_INFO_PATH, ECP_PORT, LAUNCH_TIMEOUT, PROBE_TIMEOUT,
    ROKU_VENDOR,
};
pub use device_info::{parse_device_info, DeviceInfoError};
pub use launch::{cast_to, AppChannel, CastTarget, DeepLink};
