//! Packet ID registry (§6). Only the subset the session controller speaks
//! directly is given typed structs in [`crate::packets`]; the rest exist so
//! the generic `packet` event can report a human-readable name.

macro_rules! packet_ids {
    ($($name:ident = $id:expr),* $(,)?) => {
        $(pub const $name: u16 = $id;)*

        pub fn name_for(id: u16) -> &'static str {
            match id {
                $($id => stringify!($name),)*
                _ => "Unknown",
            }
        }
    };
}

packet_ids! {
    LOGIN = 1,
    PLAY_STATUS = 2,
    SERVER_TO_CLIENT_HANDSHAKE = 3,
    CLIENT_TO_SERVER_HANDSHAKE = 4,
    DISCONNECT = 5,
    RESOURCE_PACKS_INFO = 6,
    RESOURCE_PACKS_STACK = 7,
    RESOURCE_PACK_CLIENT_RESPONSE = 8,
    TEXT = 9,
    SET_TIME = 10,
    START_GAME = 11,
    ADD_PLAYER = 12,
    ADD_ENTITY = 13,
    REMOVE_ENTITY = 14,
    MOVE_PLAYER = 19,
    RIDER_JUMP = 21,
    UPDATE_BLOCK = 22,
    LEVEL_EVENT = 24,
    ENTITY_EVENT = 26,
    MOB_EFFECT = 27,
    UPDATE_ATTRIBUTES = 29,
    SET_ENTITY_DATA = 39,
    SET_ENTITY_MOTION = 40,
    ANIMATE = 44,
    RESPAWN = 45,
    PLAYER_ACTION = 36,
    PLAYER_LIST = 63,
    CHANGE_DIMENSION = 61,
    SET_PLAYER_GAME_TYPE = 62,
    REQUEST_CHUNK_RADIUS = 69,
    CHUNK_RADIUS_UPDATE = 70,
    AVAILABLE_COMMANDS = 76,
    COMMAND_REQUEST = 77,
    COMMAND_OUTPUT = 79,
    TRANSFER = 85,
    MODAL_FORM_REQUEST = 100,
    MODAL_FORM_RESPONSE = 101,
    SET_LOCAL_PLAYER_AS_INITIALIZED = 113,
    NETWORK_STACK_LATENCY = 115,
    NETWORK_SETTINGS = 143,
    PLAYER_AUTH_INPUT = 144,
    REQUEST_NETWORK_SETTINGS = 193,
}
