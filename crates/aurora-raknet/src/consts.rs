//! RakNet wire constants (protocol version 11, §6 of the session spec).

pub const MAGIC: [u8; 16] = [
    0x00, 0xff, 0xff, 0x00, 0xfe, 0xfe, 0xfe, 0xfe, 0xfd, 0xfd, 0xfd, 0xfd, 0x12, 0x34, 0x56, 0x78,
];

pub const RAKNET_PROTOCOL_VERSION: u8 = 11;

/// Fixed MTU; this client never performs MTU discovery.
pub const MTU: u16 = 1492;

pub const MAX_ORDER_CHANNELS: usize = 32;

// Offline message IDs.
pub const ID_CONNECTED_PING: u8 = 0x00;
pub const ID_UNCONNECTED_PING: u8 = 0x01;
pub const ID_CONNECTED_PONG: u8 = 0x03;
pub const ID_OPEN_CONNECTION_REQUEST_1: u8 = 0x05;
pub const ID_OPEN_CONNECTION_REPLY_1: u8 = 0x06;
pub const ID_OPEN_CONNECTION_REQUEST_2: u8 = 0x07;
pub const ID_OPEN_CONNECTION_REPLY_2: u8 = 0x08;
pub const ID_CONNECTION_REQUEST: u8 = 0x09;
pub const ID_CONNECTION_REQUEST_ACCEPTED: u8 = 0x10;
pub const ID_CONNECTION_ATTEMPT_FAILED: u8 = 0x11;
pub const ID_NEW_INCOMING_CONNECTION: u8 = 0x13;
pub const ID_DISCONNECTION_NOTIFICATION: u8 = 0x15;
pub const ID_INCOMPATIBLE_PROTOCOL_VERSION: u8 = 0x19;
pub const ID_UNCONNECTED_PONG: u8 = 0x1c;

/// Frame-set (datagram) header bit flags. The VALID bit distinguishes a
/// connected frame set from an offline/control message sharing the low ID
/// space; ACK/NACK frame sets carry their own leading byte instead.
pub const FRAME_SET_VALID_FLAG: u8 = 0x80;
pub const FRAME_SET_RANGE: std::ops::Range<u8> = 0x80..0x90;

pub const ACK_FLAG: u8 = 0xc0;
pub const NACK_FLAG: u8 = 0xa0;
