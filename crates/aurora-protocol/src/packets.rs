//! Typed packets the session controller (component H) speaks directly.
//!
//! This is the "packet codec library" the top-level spec treats as an
//! external collaborator (§1, §6) — implemented here in miniature because
//! the full, hundreds-of-variants Bedrock packet set is explicitly out of
//! scope. Only the fields the login/spawn/tick state machine actually reads
//! or writes are modeled; everything else in a packet's body is skipped.

use crate::error::Result;
use aurora_binary::{BinaryReader, BinaryWriter};
use bytes::Bytes;
use uuid::Uuid;

fn read_uuid(reader: &mut BinaryReader) -> Result<Uuid> {
    let mut bytes = [0u8; 16];
    reader.read_exact(&mut bytes)?;
    Ok(Uuid::from_bytes(bytes))
}

fn write_uuid(writer: &mut BinaryWriter, uuid: &Uuid) -> Result<()> {
    writer.write_bytes(uuid.as_bytes())
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    fn read(reader: &mut BinaryReader) -> Result<Self> {
        Ok(Self { x: reader.read_f32_le()?, y: reader.read_f32_le()?, z: reader.read_f32_le()? })
    }

    fn write(&self, writer: &mut BinaryWriter) -> Result<()> {
        writer.write_f32_le(self.x)?;
        writer.write_f32_le(self.y)?;
        writer.write_f32_le(self.z)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RequestNetworkSettings {
    pub protocol_version: i32,
}

impl RequestNetworkSettings {
    pub fn write(&self, writer: &mut BinaryWriter) -> Result<()> {
        writer.write_i32(self.protocol_version)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct NetworkSettings {
    pub compression_threshold: u16,
    pub compression_algorithm: u16,
}

impl NetworkSettings {
    pub fn read(reader: &mut BinaryReader) -> Result<Self> {
        let compression_threshold = reader.read_u16_le()?;
        let compression_algorithm = reader.read_u16_le()?;
        Ok(Self { compression_threshold, compression_algorithm })
    }
}

/// Carries the assembled identity/user chain as an opaque connection
/// request blob (produced by `aurora-identity`).
#[derive(Debug, Clone)]
pub struct Login {
    pub protocol_version: i32,
    pub connection_request: Bytes,
}

impl Login {
    pub fn write(&self, writer: &mut BinaryWriter) -> Result<()> {
        writer.write_i32(self.protocol_version)?;
        writer.write_var_u32(self.connection_request.len() as u32)?;
        writer.write_bytes(&self.connection_request)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayStatusCode {
    LoginSuccess,
    FailedClient,
    FailedServer,
    PlayerSpawn,
    FailedInvalidTenant,
    FailedVanillaEdu,
    FailedIncompatiblePack,
    FailedServerFull,
    Unknown(i32),
}

impl From<i32> for PlayStatusCode {
    fn from(value: i32) -> Self {
        match value {
            0 => Self::LoginSuccess,
            1 => Self::FailedClient,
            2 => Self::FailedServer,
            3 => Self::PlayerSpawn,
            4 => Self::FailedInvalidTenant,
            5 => Self::FailedVanillaEdu,
            6 => Self::FailedIncompatiblePack,
            7 => Self::FailedServerFull,
            other => Self::Unknown(other),
        }
    }
}

impl PlayStatusCode {
    /// PlayStatus values that indicate an unrecoverable login failure (§7.4).
    pub fn is_failure(self) -> bool {
        matches!(
            self,
            Self::FailedClient
                | Self::FailedServer
                | Self::FailedVanillaEdu
                | Self::FailedIncompatiblePack
                | Self::FailedServerFull
        )
    }
}

#[derive(Debug, Clone, Copy)]
pub struct PlayStatus {
    pub status: PlayStatusCode,
}

impl PlayStatus {
    pub fn read(reader: &mut BinaryReader) -> Result<Self> {
        Ok(Self { status: reader.read_i32()?.into() })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourcePackResponseStatus {
    Refused = 1,
    SendPacks = 2,
    HaveAllPacks = 3,
    Completed = 4,
}

#[derive(Debug, Clone)]
pub struct ResourcePackClientResponse {
    pub status: ResourcePackResponseStatus,
    pub pack_ids: Vec<String>,
}

impl ResourcePackClientResponse {
    pub fn write(&self, writer: &mut BinaryWriter) -> Result<()> {
        writer.write_u8(self.status as u8)?;
        writer.write_u16_le(self.pack_ids.len() as u16)?;
        for id in &self.pack_ids {
            writer.write_string(id)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextType {
    Chat = 1,
}

#[derive(Debug, Clone)]
pub struct Text {
    pub message_type: TextType,
    pub source_name: String,
    pub message: String,
    pub xuid: String,
}

impl Text {
    pub fn write(&self, writer: &mut BinaryWriter) -> Result<()> {
        writer.write_u8(self.message_type as u8)?;
        writer.write_bool(false)?; // needs_translation
        writer.write_string(&self.source_name)?;
        writer.write_string(&self.message)?;
        writer.write_var_u32(0)?; // parameters
        writer.write_string(&self.xuid)?;
        writer.write_string("")?; // platform chat id
        Ok(())
    }
}

/// Fields of StartGame this client actually mirrors locally (§3 "Local
/// player data"); everything else in the real packet is skipped.
#[derive(Debug, Clone)]
pub struct StartGame {
    pub entity_id: i64,
    pub runtime_entity_id: u64,
    pub player_gamemode: i32,
    pub position: Vec3,
    pub pitch: f32,
    pub yaw: f32,
    pub dimension: i32,
    pub spawn_position: (i32, i32, i32),
    pub world_gamemode: i32,
    pub difficulty: i32,
    pub world_name: String,
    pub seed: i64,
}

impl StartGame {
    pub fn read(reader: &mut BinaryReader) -> Result<Self> {
        let entity_id = reader.read_var_i64()?;
        let runtime_entity_id = reader.read_var_u64()?;
        let player_gamemode = reader.read_var_i32()?;
        let position = Vec3::read(reader)?;
        let pitch = reader.read_f32_le()?;
        let yaw = reader.read_f32_le()?;
        let seed = reader.read_var_i64()?;
        let dimension = reader.read_var_i32()?;
        let world_gamemode = reader.read_var_i32()?;
        let difficulty = reader.read_var_i32()?;
        let spawn_position = (reader.read_var_i32()?, reader.read_var_i32()?, reader.read_var_i32()?);
        let world_name = reader.read_string()?;
        // Remaining fields (game rules, experiments, block palette, ...) are
        // not needed by this client; drop them.
        reader.skip(reader.remaining())?;
        Ok(Self {
            entity_id,
            runtime_entity_id,
            player_gamemode,
            position,
            pitch,
            yaw,
            dimension,
            spawn_position,
            world_gamemode,
            difficulty,
            world_name,
            seed,
        })
    }
}

#[derive(Debug, Clone, Copy)]
pub struct MovePlayerMode(pub u8);

#[derive(Debug, Clone)]
pub struct MovePlayer {
    pub runtime_entity_id: u64,
    pub position: Vec3,
    pub pitch: f32,
    pub yaw: f32,
    pub head_yaw: f32,
    pub mode: MovePlayerMode,
    pub on_ground: bool,
}

impl MovePlayer {
    pub fn read(reader: &mut BinaryReader) -> Result<Self> {
        let runtime_entity_id = reader.read_var_u64()?;
        let position = Vec3::read(reader)?;
        let pitch = reader.read_f32_le()?;
        let yaw = reader.read_f32_le()?;
        let head_yaw = reader.read_f32_le()?;
        let mode = MovePlayerMode(reader.read_u8()?);
        let on_ground = reader.read_bool()?;
        reader.skip(reader.remaining())?;
        Ok(Self { runtime_entity_id, position, pitch, yaw, head_yaw, mode, on_ground })
    }
}

/// Sent every tick (§5) while `Spawned`; keeps the server from timing the
/// connection out.
#[derive(Debug, Clone)]
pub struct PlayerAuthInput {
    pub pitch: f32,
    pub yaw: f32,
    pub position: Vec3,
    pub head_yaw: f32,
    pub input_mode: u32,
    pub play_mode: u32,
    pub tick: u64,
}

impl PlayerAuthInput {
    pub fn write(&self, writer: &mut BinaryWriter) -> Result<()> {
        writer.write_f32_le(self.pitch)?;
        writer.write_f32_le(self.yaw)?;
        self.position.write(writer)?;
        writer.write_f32_le(0.0)?; // move vector x
        writer.write_f32_le(0.0)?; // move vector z
        writer.write_f32_le(self.head_yaw)?;
        writer.write_var_u64(0)?; // input data flags
        writer.write_var_u32(self.input_mode)?;
        writer.write_var_u32(self.play_mode)?;
        writer.write_var_u64(self.tick)?;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RequestChunkRadius {
    pub radius: i32,
}

impl RequestChunkRadius {
    pub fn write(&self, writer: &mut BinaryWriter) -> Result<()> {
        writer.write_var_i32(self.radius)
    }
}

#[derive(Debug, Clone)]
pub struct CommandOrigin {
    pub uuid: Uuid,
    pub request_id: String,
    pub unique_entity_id: i64,
}

#[derive(Debug, Clone)]
pub struct CommandRequest {
    pub command: String,
    pub origin: CommandOrigin,
}

impl CommandRequest {
    pub fn write(&self, writer: &mut BinaryWriter) -> Result<()> {
        writer.write_string(&self.command)?;
        writer.write_var_u32(0)?; // origin type: Player
        write_uuid(writer, &self.origin.uuid)?;
        writer.write_string(&self.origin.request_id)?;
        writer.write_var_i64(self.origin.unique_entity_id)?;
        writer.write_bool(false)?; // internal
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct ModalFormResponse {
    pub form_id: u32,
    pub response: Option<String>,
}

impl ModalFormResponse {
    pub fn write(&self, writer: &mut BinaryWriter) -> Result<()> {
        writer.write_var_u32(self.form_id)?;
        writer.write_bool(self.response.is_some())?;
        if let Some(response) = &self.response {
            writer.write_string(response)?;
        }
        writer.write_bool(self.response.is_none())?; // has cancel reason
        if self.response.is_none() {
            writer.write_u8(0)?; // UserClosed
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
pub struct SetLocalPlayerAsInitialized {
    pub runtime_entity_id: u64,
}

impl SetLocalPlayerAsInitialized {
    pub fn write(&self, writer: &mut BinaryWriter) -> Result<()> {
        writer.write_var_u64(self.runtime_entity_id)
    }
}

pub const RESPAWN_STATE_SERVER_READY: u8 = 0;
pub const RESPAWN_STATE_CLIENT_READY: u8 = 2;

#[derive(Debug, Clone)]
pub struct Respawn {
    pub position: Vec3,
    pub state: u8,
    pub runtime_entity_id: u64,
}

impl Respawn {
    pub fn read(reader: &mut BinaryReader) -> Result<Self> {
        let position = Vec3::read(reader)?;
        let state = reader.read_u8()?;
        let runtime_entity_id = reader.read_var_u64()?;
        Ok(Self { position, state, runtime_entity_id })
    }

    pub fn write(&self, writer: &mut BinaryWriter) -> Result<()> {
        self.position.write(writer)?;
        writer.write_u8(self.state)?;
        writer.write_var_u64(self.runtime_entity_id)
    }
}

pub const PLAYER_ACTION_DIMENSION_CHANGE_ACK: i32 = 16;

#[derive(Debug, Clone)]
pub struct PlayerAction {
    pub runtime_entity_id: u64,
    pub action: i32,
    pub block_position: (i32, i32, i32),
    pub face: i32,
}

impl PlayerAction {
    pub fn write(&self, writer: &mut BinaryWriter) -> Result<()> {
        writer.write_var_u64(self.runtime_entity_id)?;
        writer.write_var_i32(self.action)?;
        writer.write_var_i32(self.block_position.0)?;
        writer.write_var_i32(self.block_position.1)?;
        writer.write_var_i32(self.block_position.2)?;
        writer.write_var_i32(self.face)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct NetworkStackLatency {
    pub timestamp: i64,
    pub from_server: bool,
}

impl NetworkStackLatency {
    pub fn read(reader: &mut BinaryReader) -> Result<Self> {
        let timestamp = reader.read_var_i64()?;
        let from_server = reader.read_bool()?;
        Ok(Self { timestamp, from_server })
    }

    pub fn write(&self, writer: &mut BinaryWriter) -> Result<()> {
        writer.write_var_i64(self.timestamp)?;
        writer.write_bool(self.from_server)
    }
}

#[derive(Debug, Clone)]
pub struct ChangeDimension {
    pub dimension: i32,
    pub position: Vec3,
    pub respawn: bool,
}

impl ChangeDimension {
    pub fn read(reader: &mut BinaryReader) -> Result<Self> {
        let dimension = reader.read_var_i32()?;
        let position = Vec3::read(reader)?;
        let respawn = reader.read_bool()?;
        Ok(Self { dimension, position, respawn })
    }
}

#[derive(Debug, Clone, Copy)]
pub struct SetPlayerGameType {
    pub gamemode: i32,
}

impl SetPlayerGameType {
    pub fn read(reader: &mut BinaryReader) -> Result<Self> {
        Ok(Self { gamemode: reader.read_var_i32()? })
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RemoveEntity {
    pub unique_entity_id: i64,
}

impl RemoveEntity {
    pub fn read(reader: &mut BinaryReader) -> Result<Self> {
        Ok(Self { unique_entity_id: reader.read_var_i64()? })
    }
}

#[derive(Debug, Clone)]
pub struct AddPlayer {
    pub uuid: Uuid,
    pub username: String,
    pub unique_entity_id: i64,
    pub runtime_entity_id: u64,
    pub position: Vec3,
    pub motion: Vec3,
    pub pitch: f32,
    pub yaw: f32,
    pub head_yaw: f32,
}

impl AddPlayer {
    pub fn read(reader: &mut BinaryReader) -> Result<Self> {
        let uuid = read_uuid(reader)?;
        let username = reader.read_string()?;
        let unique_entity_id = reader.read_var_i64()?;
        let runtime_entity_id = reader.read_var_u64()?;
        let _platform_chat_id = reader.read_string()?;
        let position = Vec3::read(reader)?;
        let motion = Vec3::read(reader)?;
        let pitch = reader.read_f32_le()?;
        let yaw = reader.read_f32_le()?;
        let head_yaw = reader.read_f32_le()?;
        reader.skip(reader.remaining())?;
        Ok(Self { uuid, username, unique_entity_id, runtime_entity_id, position, motion, pitch, yaw, head_yaw })
    }
}

#[derive(Debug, Clone)]
pub struct AddEntity {
    pub unique_entity_id: i64,
    pub runtime_entity_id: u64,
    pub entity_type: String,
    pub position: Vec3,
    pub motion: Vec3,
    pub pitch: f32,
    pub yaw: f32,
    pub head_yaw: f32,
}

impl AddEntity {
    pub fn read(reader: &mut BinaryReader) -> Result<Self> {
        let unique_entity_id = reader.read_var_i64()?;
        let runtime_entity_id = reader.read_var_u64()?;
        let entity_type = reader.read_string()?;
        let position = Vec3::read(reader)?;
        let motion = Vec3::read(reader)?;
        let pitch = reader.read_f32_le()?;
        let yaw = reader.read_f32_le()?;
        let head_yaw = reader.read_f32_le()?;
        reader.skip(reader.remaining())?;
        Ok(Self { unique_entity_id, runtime_entity_id, entity_type, position, motion, pitch, yaw, head_yaw })
    }
}

#[derive(Debug, Clone)]
pub struct AttributeValue {
    pub name: String,
    pub min: f32,
    pub max: f32,
    pub current: f32,
    pub default: f32,
}

#[derive(Debug, Clone)]
pub struct UpdateAttributes {
    pub runtime_entity_id: u64,
    pub attributes: Vec<AttributeValue>,
}

impl UpdateAttributes {
    pub fn read(reader: &mut BinaryReader) -> Result<Self> {
        let runtime_entity_id = reader.read_var_u64()?;
        let count = reader.read_var_u32()?;
        let mut attributes = Vec::with_capacity(count as usize);
        for _ in 0..count {
            let min = reader.read_f32_le()?;
            let max = reader.read_f32_le()?;
            let current = reader.read_f32_le()?;
            let default = reader.read_f32_le()?;
            let name = reader.read_string()?;
            attributes.push(AttributeValue { name, min, max, current, default });
        }
        Ok(Self { runtime_entity_id, attributes })
    }
}

#[derive(Debug, Clone)]
pub struct Disconnect {
    pub hide_disconnect_reason: bool,
    pub message: String,
}

impl Disconnect {
    pub fn read(reader: &mut BinaryReader) -> Result<Self> {
        let hide_disconnect_reason = reader.read_bool()?;
        let message = reader.read_string()?;
        Ok(Self { hide_disconnect_reason, message })
    }
}
