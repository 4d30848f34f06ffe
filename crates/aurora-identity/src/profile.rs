//! Offline profile derivation (§4.G step 3).

use uuid::Uuid;

/// Fixed namespace the offline UUID is derived under.
const OFFLINE_NAMESPACE: Uuid = Uuid::from_bytes([
    0x6b, 0xa7, 0xb8, 0x11, 0x9d, 0xad, 0x11, 0xd1, 0x80, 0xb4, 0x00, 0xc0, 0x4f, 0xd4, 0x30, 0xc8,
]);

#[derive(Debug, Clone)]
pub struct Profile {
    pub name: String,
    pub uuid: Uuid,
    pub xuid: String,
}

impl Profile {
    pub fn offline(username: &str) -> Self {
        Self { name: username.to_string(), uuid: offline_uuid(username), xuid: "0".to_string() }
    }
}

pub fn offline_uuid(username: &str) -> Uuid {
    Uuid::new_v3(&OFFLINE_NAMESPACE, username.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offline_uuid_is_deterministic() {
        assert_eq!(offline_uuid("Bot"), offline_uuid("Bot"));
        assert_ne!(offline_uuid("Bot"), offline_uuid("OtherBot"));
    }
}
