//! Client variants and the per-variant app/device profile read by the TLV encoders.

use crate::constants::APK_SIGN;
use crate::token::hex_bytes;
use serde::{Deserialize, Serialize};
use strum_macros::Display;

/// Device class the handshake impersonates. Fixed for one login attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Display, Serialize, Deserialize)]
pub enum ClientVariant {
    /// Current phone client, fresh ECDH keys
    #[default]
    #[strum(to_string = "Phone")]
    Phone,
    /// Lightweight watch client, used for the QR flows
    #[strum(to_string = "Watch")]
    Watch,
    /// Older phone client with pinned key material
    #[strum(to_string = "Legacy")]
    Legacy,
}

/// Hardware and network facts about the emulated device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
    pub os_type: String,
    pub os_version: String,
    pub model: String,
    pub brand: String,
    pub sim_operator: String,
    pub network_type: String,
    pub apn: String,
    pub imei: String,
    pub imsi: String,
    #[serde(with = "hex_bytes")]
    pub android_id: Vec<u8>,
    pub mac: String,
    pub bssid: String,
    pub ssid: String,
    pub ip: [u8; 4],
}

impl Default for DeviceInfo {
    fn default() -> Self {
        Self {
            os_type: "android".to_string(),
            os_version: "10".to_string(),
            model: "V1916A".to_string(),
            brand: "vivo".to_string(),
            sim_operator: "China Mobile GSM".to_string(),
            network_type: "wifi".to_string(),
            apn: "wifi".to_string(),
            imei: "862542082770767".to_string(),
            imsi: "460001234567890".to_string(),
            android_id: Vec::new(),
            mac: "89:C2:A9:C5:FA:E9".to_string(),
            bssid: "00:14:bf:3a:8a:50".to_string(),
            ssid: "<unknown ssid>".to_string(),
            ip: [0; 4],
        }
    }
}

/// App and device constants for one client variant.
///
/// Can be loaded from JSON to emulate another build; [`ClientProfile::for_variant`]
/// provides the built-in defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientProfile {
    pub variant: ClientVariant,
    /// Sub app id announced in T106/T100/T147 and in the SSO head
    pub app_id: u32,
    pub sso_version: u32,
    /// App id of the ping/T100 records (always 16 for these clients)
    pub ping_app_id: u32,
    pub app_client_version: u32,
    pub main_sig_map: u32,
    pub sub_sig_map: u32,
    pub misc_bitmap: u32,
    pub package_name: String,
    pub version: String,
    #[serde(with = "hex_bytes")]
    pub apk_sign: Vec<u8>,
    pub sdk_version: String,
    pub build_time: u32,
    /// Short-LV version string of the SSO login head
    pub version_var: String,
    pub t191_flag: u8,
    pub t521_product: u32,
    #[serde(with = "hex_bytes")]
    pub t525_blob: Vec<u8>,
    pub device: DeviceInfo,
}

impl ClientProfile {
    pub fn for_variant(variant: ClientVariant) -> Self {
        let base = Self {
            variant,
            app_id: 537_116_186,
            sso_version: 15,
            ping_app_id: 16,
            app_client_version: 0,
            main_sig_map: 34_869_472,
            sub_sig_map: 0x0001_0400,
            misc_bitmap: 0x08F7_FF7C,
            package_name: "com.tencent.mobileqq".to_string(),
            version: "8.8.85".to_string(),
            apk_sign: APK_SIGN.to_vec(),
            sdk_version: "6.0.0.2497".to_string(),
            build_time: 1_645_432_578,
            version_var: "|877408608703263|A8.8.90.83e6c009".to_string(),
            t191_flag: 0x82,
            t521_product: 0,
            t525_blob: vec![0x00, 0x01, 0x05, 0x36, 0x00, 0x02, 0x01, 0x00],
            device: DeviceInfo {
                android_id: b"4cba299189222ca6".to_vec(),
                ..DeviceInfo::default()
            },
        };

        match variant {
            ClientVariant::Phone => base,
            ClientVariant::Legacy => Self {
                app_id: 537_170_024,
                version_var: "||A8.9.71.9fd08ae5".to_string(),
                device: DeviceInfo {
                    android_id: vec![0xD0, 0x18, 0xB7, 0x04, 0x65, 0x2F, 0x41, 0xF4],
                    ..DeviceInfo::default()
                },
                ..base
            },
            ClientVariant::Watch => Self {
                app_id: 537_140_974,
                sso_version: 5,
                main_sig_map: 33_820_864,
                package_name: "com.tencent.qqlite".to_string(),
                version: "2.1.7".to_string(),
                sdk_version: "6.0.0.2366".to_string(),
                build_time: 1_654_570_540,
                version_var: String::new(),
                t191_flag: 0x00,
                t521_product: 115,
                t525_blob: Vec::new(),
                device: DeviceInfo {
                    android_id: vec![0x4C, 0xBA, 0x29, 0x91, 0x89, 0x22, 0x4C, 0xA2],
                    ..DeviceInfo::default()
                },
                ..base
            },
        }
    }

    /// Parse a profile from JSON.
    pub fn from_json(json: &str) -> Result<Self, crate::error::LoginError> {
        Ok(serde_json::from_str(json)?)
    }
}

impl Default for ClientProfile {
    fn default() -> Self {
        Self::for_variant(ClientVariant::default())
    }
}
