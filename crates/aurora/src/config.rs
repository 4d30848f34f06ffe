//! Client configuration (§6). Loading this from a file or CLI flags is out
//! of scope; callers build a [`ClientOptions`] directly.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientOptions {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub offline: bool,
    pub protocol_version: i32,
    pub game_version: String,
    pub view_distance: i32,
    pub device_os: i32,
    pub skin_data: Map<String, Value>,
    pub auto_reconnect: bool,
    pub max_reconnect_attempts: u32,
    pub reconnect_delay: Duration,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 19132,
            username: "Bot".to_string(),
            offline: true,
            protocol_version: 685,
            game_version: "1.21.1.03".to_string(),
            view_distance: 10,
            device_os: 7,
            skin_data: Map::new(),
            auto_reconnect: false,
            max_reconnect_attempts: 3,
            reconnect_delay: Duration::from_secs(3),
        }
    }
}

impl ClientOptions {
    pub fn server_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec_table() {
        let options = ClientOptions::default();
        assert_eq!(options.protocol_version, 685);
        assert_eq!(options.game_version, "1.21.1.03");
        assert_eq!(options.view_distance, 10);
        assert_eq!(options.device_os, 7);
        assert_eq!(options.max_reconnect_attempts, 3);
        assert_eq!(options.reconnect_delay, Duration::from_secs(3));
    }
}
