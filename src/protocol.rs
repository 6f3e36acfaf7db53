//! Wire types spoken by the portal firmware.
//!
//! The serial WebSocket accepts small JSON control messages; the HTTP API
//! uses camelCase JSON throughout.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Outbound control message on the serial WebSocket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "camelCase")]
pub enum ControlMessage {
    BaudRate(u32),
    Command(String),
}

impl ControlMessage {
    pub fn to_json(&self) -> String {
        // Both variants are plain scalars; serialization cannot fail.
        serde_json::to_string(self).unwrap_or_default()
    }
}

/// One record from `GET /scan`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Network {
    pub ssid: String,
    pub rssi: i32,
    pub encryption_type: u8,
}

impl Network {
    pub fn is_open(&self) -> bool {
        self.encryption_type == 0
    }

    /// Signal quality in bars, 0 (unusable) to 4 (strong).
    pub fn signal_level(&self) -> u8 {
        match self.rssi {
            rssi if rssi >= -55 => 4,
            rssi if rssi >= -65 => 3,
            rssi if rssi >= -75 => 2,
            rssi if rssi >= -85 => 1,
            _ => 0,
        }
    }
}

/// Custom portal parameter, as served by `GET /params_json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortalParam {
    pub id: String,
    pub label: String,
    #[serde(default)]
    pub value: String,
}

/// Response of `GET /status_json`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceStatus {
    pub status: String,
    pub ip: String,
    #[serde(default)]
    pub last_result: Option<i32>,
    #[serde(default)]
    pub params: Vec<PortalParam>,
}

impl DeviceStatus {
    pub fn is_connected(&self) -> bool {
        self.status == "Connected"
    }
}

/// Body of `POST /connect`. Extra custom-parameter values ride along with
/// the credentials, flattened into the same object.
#[derive(Debug, Clone, Serialize)]
pub struct ConnectRequest {
    pub ssid: String,
    pub password: String,
    #[serde(flatten)]
    pub extra: BTreeMap<String, String>,
}

/// Result discriminator returned by `/connect` and `/reset`.
#[derive(Debug, Clone, Deserialize)]
pub struct ActionResult {
    pub result: String,
}

impl ActionResult {
    pub fn connected(&self) -> bool {
        self.result == "Connected"
    }
}
