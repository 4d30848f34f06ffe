//! Component H: the session controller. Drives the top-level state machine
//! from `connect()` through to `Spawned` and steady-state play (§4.H), and
//! owns component I (the world mirror, [`crate::world`]).
//!
//! [`Session`] is the single owner of all session state and runs on one
//! logical execution context, matching §5: the only real concurrency is the
//! UDP socket and the two timers, both serialized through the `select!`
//! loop in [`Session::run`]. External callers never touch `Session`
//! directly — they go through [`crate::client::Client`], which forwards
//! commands over a channel so the state machine stays single-owner even
//! when the handle is cloned across tasks.

use crate::config::ClientOptions;
use crate::error::{ClientError, Result};
use crate::events::{Event, EventBus, PacketSelector, Subscription};
use crate::world::{EntityTracker, PlayerIdentity, PlayerState, TrackedEntity};
use aurora_binary::{BinaryReader, BinaryWriter};
use aurora_identity::{IdentityArtifact, IdentityProvider, UserTokenOptions};
use aurora_protocol::batch::{self, Algorithm, CompressionState};
use aurora_protocol::error::Result as ProtoResult;
use aurora_protocol::ids;
use aurora_protocol::packets::*;
use aurora_raknet::{Priority, RakNetEvent, RakNetSession, Reliability};
use bytes::Bytes;
use log::{debug, info, warn};
use serde_json::{json, Value};
use std::net::SocketAddr;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{interval, Duration, Instant, MissedTickBehavior};

/// Session phases (§3), in the order they're reached. Re-entry is only ever
/// to `Disconnected`; every other transition strictly advances this list.
/// The table in §4.H writes several pre-login rows as "From: Connecting" —
/// here that whole pre-`LoggingIn` span (raknet handshake through resource
/// pack acknowledgement) is modeled as two adjacent phases, `Connecting`
/// (handshake in flight) and `RaknetEstablished` (negotiating network
/// settings/login/resource packs), which keeps phase progression strictly
/// monotonic as §3 requires instead of cycling back to `Connecting`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Phase {
    Disconnected,
    Connecting,
    RaknetEstablished,
    LoggingIn,
    Spawning,
    Spawned,
}

pub(crate) enum Command {
    Chat(String),
    SendCommand(String),
    RespondToForm { form_id: u32, response: Option<String> },
    SetInitialized,
    Disconnect { reason: String, notify_server: bool },
    On { name: String, callback: Box<dyn FnMut(&Event) + Send>, reply: oneshot::Sender<Subscription> },
    OnPacket { selector: PacketSelector, callback: Box<dyn FnMut(&Event) + Send>, reply: oneshot::Sender<Subscription> },
    Unregister(Subscription),
    WaitForPacket { selector: PacketSelector, reply: oneshot::Sender<oneshot::Receiver<Event>> },
}

const TICK_PERIOD: Duration = Duration::from_millis(50);
const ACK_FLUSH_PERIOD: Duration = Duration::from_millis(10);
/// No datagram of any kind arriving in this window means the peer is gone;
/// RakNet has no keepalive that fires faster than this on its own.
const IDLE_TIMEOUT: Duration = Duration::from_secs(15);

pub struct Session {
    options: ClientOptions,
    phase: Phase,
    raknet: Option<RakNetSession>,
    compression: CompressionState,
    identity: Option<IdentityArtifact>,
    login_sent: bool,
    tick_count: u64,
    awaiting_dimension_ack: bool,
    player: PlayerState,
    entities: EntityTracker,
    events: EventBus,
    commands: mpsc::UnboundedReceiver<Command>,
    reconnect_attempt: u32,
    last_activity: Instant,
    /// When true, [`Session::teardown`] skips sending a RakNet disconnect
    /// notification: either the peer already told us it's going away (§7
    /// error kind 5), or a local `disconnect(notify_server = false)` asked
    /// for a silent teardown.
    suppress_disconnect_notice: bool,
}

impl Session {
    pub(crate) fn new(options: ClientOptions, commands: mpsc::UnboundedReceiver<Command>) -> Self {
        Self {
            options,
            phase: Phase::Disconnected,
            raknet: None,
            compression: CompressionState::default(),
            identity: None,
            login_sent: false,
            tick_count: 0,
            awaiting_dimension_ack: false,
            player: PlayerState::default(),
            entities: EntityTracker::new(),
            events: EventBus::new(),
            commands,
            reconnect_attempt: 0,
            last_activity: Instant::now(),
            suppress_disconnect_notice: false,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Runs identity assembly and the RakNet handshake (§5 suspension point
    /// 1), then sends `RequestNetworkSettings`. Resolves once the session
    /// has entered the pre-login negotiation phase; [`Session::run`] drives
    /// everything from there.
    async fn connect(&mut self, provider: &dyn IdentityProvider) -> Result<()> {
        self.drain_commands();
        self.phase = Phase::Connecting;

        let user_options = UserTokenOptions {
            game_version: self.options.game_version.clone(),
            language_code: "en_US".to_string(),
            server_address: self.options.server_address(),
            device_os: self.options.device_os,
            third_party_name: self.options.username.clone(),
            skin_overrides: self.options.skin_data.clone(),
        };
        let identity =
            aurora_identity::assemble(&self.options.username, self.options.offline, provider, &user_options).await?;
        self.identity = Some(identity);

        let remote: SocketAddr = self
            .options
            .server_address()
            .parse()
            .map_err(|e| ClientError::PreconditionViolation(format!("invalid host/port: {e}")))?;
        let raknet = RakNetSession::connect(remote).await?;
        self.raknet = Some(raknet);
        self.last_activity = Instant::now();
        self.phase = Phase::RaknetEstablished;
        self.events.emit(Event::RaknetConnect);
        info!("raknet established, negotiating network settings");

        self.send_packet(
            ids::REQUEST_NETWORK_SETTINGS,
            &RequestNetworkSettings { protocol_version: self.options.protocol_version },
            Reliability::ReliableOrdered,
            Priority::Immediate,
        )
        .await?;
        Ok(())
    }

    /// Drives the session to completion: login negotiation, spawn, and the
    /// steady-state tick loop, until a disconnect (with optional
    /// auto-reconnect per §5) ends it for good.
    pub(crate) async fn run(&mut self, provider: &dyn IdentityProvider) -> Result<()> {
        loop {
            self.connect(provider).await?;
            let outcome = self.drive_until_disconnected().await;
            self.teardown().await;

            let reached_spawn = self.phase >= Phase::Spawned;
            self.phase = Phase::Disconnected;

            match outcome {
                Ok(()) if reached_spawn && self.options.auto_reconnect => {
                    if self.reconnect_attempt >= self.options.max_reconnect_attempts {
                        return Ok(());
                    }
                    self.reconnect_attempt += 1;
                    let delay = self.options.reconnect_delay * self.reconnect_attempt;
                    warn!("disconnected after spawn, reconnecting (attempt {}) in {:?}", self.reconnect_attempt, delay);
                    self.events.emit(Event::Reconnect(self.reconnect_attempt));
                    tokio::time::sleep(delay).await;
                    self.reset_for_reconnect();
                }
                other => return other,
            }
        }
    }

    fn reset_for_reconnect(&mut self) {
        self.compression = CompressionState::default();
        self.login_sent = false;
        self.tick_count = 0;
        self.awaiting_dimension_ack = false;
        self.player = PlayerState::default();
        self.entities = EntityTracker::new();
        self.suppress_disconnect_notice = false;
    }

    async fn drive_until_disconnected(&mut self) -> Result<()> {
        let mut tick_timer = interval(TICK_PERIOD);
        tick_timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut ack_timer = interval(ACK_FLUSH_PERIOD);
        ack_timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut idle_timer = interval(Duration::from_secs(1));
        idle_timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;

                command = self.commands.recv() => {
                    match command {
                        Some(command) => self.handle_command(command).await?,
                        None => return Ok(()),
                    }
                }
                _ = ack_timer.tick() => {
                    self.raknet_mut()?.flush_ack_nack().await?;
                }
                _ = tick_timer.tick() => {
                    if self.on_tick().await? {
                        return Ok(());
                    }
                }
                _ = idle_timer.tick() => {
                    if self.last_activity.elapsed() > IDLE_TIMEOUT {
                        warn!("no datagrams received in over {:?}, treating connection as dead", IDLE_TIMEOUT);
                        self.events.emit(Event::Kick("idle timeout".to_string()));
                        return Ok(());
                    }
                }
                event = self.recv_raknet_event() => {
                    self.last_activity = Instant::now();
                    match event? {
                        Some(RakNetEvent::GamePayload(payload)) => self.on_game_payload(payload).await?,
                        Some(RakNetEvent::Disconnected) => {
                            self.suppress_disconnect_notice = true;
                            self.events.emit(Event::Kick("connection closed by peer".to_string()));
                            return Ok(());
                        }
                        None => {}
                    }
                }
            }

            if self.phase == Phase::Disconnected {
                return Ok(());
            }
        }
    }

    /// Applies any commands queued before the raknet handshake completes.
    /// Only registrations make sense this early — `Client` is constructed
    /// and handed back to the caller before `connect()` resolves, so a
    /// handler registered in the same breath as the call must be in place
    /// before the first event (`raknet_connect`) can fire. Everything else
    /// is dropped; there's no session yet to chat in or disconnect from.
    fn drain_commands(&mut self) {
        while let Ok(command) = self.commands.try_recv() {
            match command {
                Command::On { name, callback, reply } => {
                    let subscription = self.events.on(&name, callback);
                    let _ = reply.send(subscription);
                }
                Command::OnPacket { selector, callback, reply } => {
                    let subscription = self.events.on_packet(selector, callback);
                    let _ = reply.send(subscription);
                }
                Command::Unregister(subscription) => self.events.unregister(subscription),
                Command::WaitForPacket { selector, reply } => {
                    let rx = self.events.wait_for_packet(selector);
                    let _ = reply.send(rx);
                }
                Command::Chat(_)
                | Command::SendCommand(_)
                | Command::RespondToForm { .. }
                | Command::SetInitialized
                | Command::Disconnect { .. } => {
                    warn!("dropping command issued before the session was connected");
                }
            }
        }
    }

    async fn handle_command(&mut self, command: Command) -> Result<()> {
        match command {
            Command::Chat(message) => self.chat(&message).await,
            Command::SendCommand(text) => self.send_command(&text).await,
            Command::RespondToForm { form_id, response } => self.respond_to_form(form_id, response).await,
            Command::SetInitialized => self.set_initialized().await,
            Command::Disconnect { reason, notify_server } => self.disconnect(&reason, notify_server).await,
            Command::On { name, callback, reply } => {
                let subscription = self.events.on(&name, callback);
                let _ = reply.send(subscription);
                Ok(())
            }
            Command::OnPacket { selector, callback, reply } => {
                let subscription = self.events.on_packet(selector, callback);
                let _ = reply.send(subscription);
                Ok(())
            }
            Command::Unregister(subscription) => {
                self.events.unregister(subscription);
                Ok(())
            }
            Command::WaitForPacket { selector, reply } => {
                let rx = self.events.wait_for_packet(selector);
                let _ = reply.send(rx);
                Ok(())
            }
        }
    }

    fn raknet_mut(&mut self) -> Result<&mut RakNetSession> {
        self.raknet.as_mut().ok_or(ClientError::Disconnected("no active raknet session".to_string()))
    }

    async fn recv_raknet_event(&mut self) -> Result<Option<RakNetEvent>> {
        match &mut self.raknet {
            Some(raknet) => Ok(raknet.recv_event().await?),
            None => std::future::pending().await,
        }
    }

    async fn teardown(&mut self) {
        if let Some(mut raknet) = self.raknet.take() {
            if !self.suppress_disconnect_notice {
                raknet.disconnect().await;
            }
        }
        self.events.emit(Event::Disconnect);
        self.events.fail_all_waiters();
    }

    // ---- §5 steady state: tick cadence ----

    /// Runs one game tick: increments the counter, flushes whatever the
    /// outbound queue has pending, and — while `Spawned` and not awaiting a
    /// dimension ack — sends `PlayerAuthInput`. Returns `true` if the tick
    /// observed the session should stop (raknet gone).
    async fn on_tick(&mut self) -> Result<bool> {
        self.tick_count += 1;
        let Some(raknet) = self.raknet.as_mut() else { return Ok(true) };

        if self.phase == Phase::Spawned && !self.awaiting_dimension_ack {
            let input = PlayerAuthInput {
                pitch: self.player.pitch,
                yaw: self.player.yaw,
                position: self.player.position,
                head_yaw: self.player.head_yaw,
                input_mode: 1,
                play_mode: 0,
                tick: self.tick_count,
            };
            self.send_packet_on(raknet, ids::PLAYER_AUTH_INPUT, &input, Reliability::Unreliable, Priority::Normal)
                .await?;
        }

        raknet.flush_tick().await?;
        self.events.emit(Event::Tick(self.tick_count));
        Ok(false)
    }

    // ---- outbound helpers ----

    async fn send_packet<T: PacketWrite>(
        &mut self,
        id: u16,
        packet: &T,
        reliability: Reliability,
        priority: Priority,
    ) -> Result<()> {
        let raknet = self.raknet.as_mut().ok_or(ClientError::Disconnected("not connected".to_string()))?;
        Self::send_packet_on_raw(raknet, &self.compression, id, packet, reliability, priority).await
    }

    async fn send_packet_on<T: PacketWrite>(
        &mut self,
        raknet: &mut RakNetSession,
        id: u16,
        packet: &T,
        reliability: Reliability,
        priority: Priority,
    ) -> Result<()> {
        Self::send_packet_on_raw(raknet, &self.compression, id, packet, reliability, priority).await
    }

    async fn send_packet_on_raw<T: PacketWrite>(
        raknet: &mut RakNetSession,
        compression: &CompressionState,
        id: u16,
        packet: &T,
        reliability: Reliability,
        priority: Priority,
    ) -> Result<()> {
        let mut writer = BinaryWriter::new();
        writer.write_var_u32(id as u32)?;
        packet.write_body(&mut writer)?;
        let body = writer.freeze();
        let batch = batch::encode(&[body], compression)?;
        raknet.send_payload(batch, reliability, 0, priority).await?;
        Ok(())
    }

    // ---- inbound packet dispatch ----

    async fn on_game_payload(&mut self, payload: Bytes) -> Result<()> {
        let packets = batch::decode(payload, &self.compression)?;
        for packet in packets {
            self.dispatch_one(packet).await;
        }
        Ok(())
    }

    async fn dispatch_one(&mut self, payload: Bytes) {
        let (id, body) = match batch::split_header(&payload) {
            Ok(parsed) => parsed,
            Err(e) => {
                warn!("dropping malformed packet header: {e}");
                return;
            }
        };
        let name = ids::name_for(id);
        self.events.emit(Event::Packet { id, name, raw: payload.clone() });

        // §7.3: a per-packet deserialization failure is logged and the
        // packet dropped; the session continues. Packet types this client
        // doesn't model (including LevelChunk/LevelSoundEvent) fall through
        // the `_` arm and are silently ignored, matching the documented
        // quirk.
        if let Err(e) = self.dispatch_known(id, body).await {
            warn!("failed to handle packet {name} ({id}): {e}");
        }
    }

    async fn dispatch_known(&mut self, id: u16, body: Bytes) -> Result<()> {
        match id {
            ids::NETWORK_SETTINGS => self.on_network_settings(body).await,
            ids::RESOURCE_PACKS_INFO => self.on_resource_packs_info().await,
            ids::RESOURCE_PACKS_STACK => self.on_resource_pack_stack().await,
            ids::PLAY_STATUS => self.on_play_status(body).await,
            ids::START_GAME => self.on_start_game(body).await,
            ids::TEXT => self.on_text(body),
            ids::MOVE_PLAYER => self.on_move_player(body),
            ids::RESPAWN => self.on_respawn(body).await,
            ids::CHANGE_DIMENSION => self.on_change_dimension(body).await,
            ids::SET_PLAYER_GAME_TYPE => self.on_set_player_game_type(body),
            ids::UPDATE_ATTRIBUTES => self.on_update_attributes(body),
            ids::ADD_PLAYER => self.on_add_player(body),
            ids::ADD_ENTITY => self.on_add_entity(body),
            ids::REMOVE_ENTITY => self.on_remove_entity(body),
            ids::NETWORK_STACK_LATENCY => self.on_network_stack_latency(body).await,
            ids::DISCONNECT => self.on_disconnect(body),
            _ => Ok(()),
        }
    }

    async fn on_network_settings(&mut self, body: Bytes) -> Result<()> {
        let mut reader = BinaryReader::new(body);
        let settings = NetworkSettings::read(&mut reader)?;
        self.compression = CompressionState {
            enabled: true,
            algorithm: match settings.compression_algorithm {
                0 => Algorithm::Zlib,
                1 => Algorithm::Snappy,
                _ => Algorithm::None,
            },
            threshold: settings.compression_threshold as u32,
        };
        debug!("compression negotiated: {:?} threshold={}", self.compression.algorithm, self.compression.threshold);

        if !self.login_sent {
            let identity = self.identity.as_ref().ok_or(ClientError::Disconnected("missing identity".to_string()))?;
            let connection_request = build_connection_request(identity)?;
            let login = Login { protocol_version: self.options.protocol_version, connection_request };
            self.send_packet(ids::LOGIN, &login, Reliability::ReliableOrdered, Priority::Immediate).await?;
            self.login_sent = true;
        }
        Ok(())
    }

    async fn on_resource_packs_info(&mut self) -> Result<()> {
        let response =
            ResourcePackClientResponse { status: ResourcePackResponseStatus::HaveAllPacks, pack_ids: Vec::new() };
        self.send_packet(ids::RESOURCE_PACK_CLIENT_RESPONSE, &response, Reliability::ReliableOrdered, Priority::Immediate)
            .await
    }

    async fn on_resource_pack_stack(&mut self) -> Result<()> {
        let response =
            ResourcePackClientResponse { status: ResourcePackResponseStatus::Completed, pack_ids: Vec::new() };
        self.send_packet(ids::RESOURCE_PACK_CLIENT_RESPONSE, &response, Reliability::ReliableOrdered, Priority::Immediate)
            .await
    }

    async fn on_play_status(&mut self, body: Bytes) -> Result<()> {
        let mut reader = BinaryReader::new(body);
        let status = PlayStatus::read(&mut reader)?;
        if status.status.is_failure() {
            self.events.emit(Event::Error(format!("login failed: {:?}", status.status)));
            return Err(ClientError::LoginFailed(status.status));
        }
        match status.status {
            PlayStatusCode::LoginSuccess if self.phase == Phase::RaknetEstablished => {
                self.phase = Phase::LoggingIn;
                self.events.emit(Event::Login);
            }
            PlayStatusCode::PlayerSpawn if self.phase == Phase::Spawning => {
                self.phase = Phase::Spawned;
                self.events.emit(Event::Spawn);
            }
            _ => {}
        }
        Ok(())
    }

    async fn on_start_game(&mut self, body: Bytes) -> Result<()> {
        if self.phase != Phase::LoggingIn {
            return Ok(());
        }
        let mut reader = BinaryReader::new(body);
        let start_game = StartGame::read(&mut reader)?;
        self.player.entity_id = start_game.entity_id;
        self.player.runtime_entity_id = start_game.runtime_entity_id;
        self.player.gamemode = start_game.player_gamemode;
        self.player.position = start_game.position;
        self.player.pitch = start_game.pitch;
        self.player.yaw = start_game.yaw;
        self.player.dimension = start_game.dimension;
        self.player.spawn_position = start_game.spawn_position;
        self.player.world_gamemode = start_game.world_gamemode;
        self.player.difficulty = start_game.difficulty;
        self.player.world_name = start_game.world_name;
        self.player.seed = start_game.seed;
        self.phase = Phase::Spawning;
        self.events.emit(Event::StartGame);

        let radius = RequestChunkRadius { radius: self.options.view_distance };
        self.send_packet(ids::REQUEST_CHUNK_RADIUS, &radius, Reliability::ReliableOrdered, Priority::Immediate).await
    }

    fn on_text(&mut self, body: Bytes) -> Result<()> {
        let mut reader = BinaryReader::new(body);
        let message_type = reader.read_u8()?;
        let _needs_translation = reader.read_bool()?;
        let source_name = reader.read_string()?;
        let message = reader.read_string()?;
        let _ = message_type;
        self.events.emit(Event::Text { source: source_name, message });
        Ok(())
    }

    fn on_move_player(&mut self, body: Bytes) -> Result<()> {
        let mut reader = BinaryReader::new(body);
        let move_player = MovePlayer::read(&mut reader)?;
        if move_player.runtime_entity_id == self.player.runtime_entity_id {
            self.player.position = move_player.position;
            self.player.pitch = move_player.pitch;
            self.player.yaw = move_player.yaw;
            self.player.head_yaw = move_player.head_yaw;
        } else {
            self.entities.update_position(
                move_player.runtime_entity_id,
                move_player.position,
                move_player.pitch,
                move_player.yaw,
                move_player.head_yaw,
            );
        }
        Ok(())
    }

    async fn on_respawn(&mut self, body: Bytes) -> Result<()> {
        let mut reader = BinaryReader::new(body);
        let respawn = Respawn::read(&mut reader)?;
        if respawn.state != RESPAWN_STATE_SERVER_READY {
            return Ok(());
        }
        self.player.position = respawn.position;
        let reply = Respawn {
            position: respawn.position,
            state: RESPAWN_STATE_CLIENT_READY,
            runtime_entity_id: self.player.runtime_entity_id,
        };
        self.send_packet(ids::RESPAWN, &reply, Reliability::ReliableOrdered, Priority::Immediate).await
    }

    async fn on_change_dimension(&mut self, body: Bytes) -> Result<()> {
        let mut reader = BinaryReader::new(body);
        let change = ChangeDimension::read(&mut reader)?;
        self.awaiting_dimension_ack = true;
        self.player.dimension = change.dimension;
        self.player.position = change.position;

        let ack = PlayerAction {
            runtime_entity_id: self.player.runtime_entity_id,
            action: PLAYER_ACTION_DIMENSION_CHANGE_ACK,
            block_position: (0, 0, 0),
            face: 0,
        };
        let result = self.send_packet(ids::PLAYER_ACTION, &ack, Reliability::ReliableOrdered, Priority::Immediate).await;
        self.awaiting_dimension_ack = false;
        result
    }

    fn on_set_player_game_type(&mut self, body: Bytes) -> Result<()> {
        let mut reader = BinaryReader::new(body);
        let packet = SetPlayerGameType::read(&mut reader)?;
        self.player.gamemode = packet.gamemode;
        Ok(())
    }

    fn on_update_attributes(&mut self, body: Bytes) -> Result<()> {
        let mut reader = BinaryReader::new(body);
        let update = UpdateAttributes::read(&mut reader)?;
        if update.runtime_entity_id == self.player.runtime_entity_id {
            self.player.update_attributes(update.attributes);
        }
        Ok(())
    }

    fn on_add_player(&mut self, body: Bytes) -> Result<()> {
        let mut reader = BinaryReader::new(body);
        let add = AddPlayer::read(&mut reader)?;
        self.entities.add_player(TrackedEntity {
            runtime_id: add.runtime_entity_id,
            unique_id: add.unique_entity_id,
            entity_type: "minecraft:player".to_string(),
            position: add.position,
            motion: add.motion,
            pitch: add.pitch,
            yaw: add.yaw,
            head_yaw: add.head_yaw,
            metadata: Default::default(),
            player: Some(PlayerIdentity { username: add.username, uuid: add.uuid }),
        });
        Ok(())
    }

    fn on_add_entity(&mut self, body: Bytes) -> Result<()> {
        let mut reader = BinaryReader::new(body);
        let add = AddEntity::read(&mut reader)?;
        self.entities.add_entity(TrackedEntity {
            runtime_id: add.runtime_entity_id,
            unique_id: add.unique_entity_id,
            entity_type: add.entity_type,
            position: add.position,
            motion: add.motion,
            pitch: add.pitch,
            yaw: add.yaw,
            head_yaw: add.head_yaw,
            metadata: Default::default(),
            player: None,
        });
        Ok(())
    }

    fn on_remove_entity(&mut self, body: Bytes) -> Result<()> {
        let mut reader = BinaryReader::new(body);
        let remove = RemoveEntity::read(&mut reader)?;
        self.entities.remove_by_unique_id(remove.unique_entity_id);
        Ok(())
    }

    async fn on_network_stack_latency(&mut self, body: Bytes) -> Result<()> {
        let mut reader = BinaryReader::new(body);
        let latency = NetworkStackLatency::read(&mut reader)?;
        if latency.from_server {
            let echo = NetworkStackLatency { timestamp: latency.timestamp, from_server: false };
            self.send_packet(ids::NETWORK_STACK_LATENCY, &echo, Reliability::ReliableOrdered, Priority::Normal).await?;
        }
        Ok(())
    }

    fn on_disconnect(&mut self, body: Bytes) -> Result<()> {
        let mut reader = BinaryReader::new(body);
        let disconnect = Disconnect::read(&mut reader)?;
        self.events.emit(Event::Kick(disconnect.message));
        self.phase = Phase::Disconnected;
        self.suppress_disconnect_notice = true;
        Ok(())
    }

    // ---- public user API (§4.H); reached only via Command from Client ----

    async fn chat(&mut self, message: &str) -> Result<()> {
        if !self.require_spawned("chat") {
            return Ok(());
        }
        let profile = self.identity.as_ref().map(|i| i.profile.clone());
        let (source, xuid) = profile.map(|p| (p.name, p.xuid)).unwrap_or_default();
        let text = Text { message_type: TextType::Chat, source_name: source, message: message.to_string(), xuid };
        self.send_packet(ids::TEXT, &text, Reliability::ReliableOrdered, Priority::Immediate).await
    }

    async fn send_command(&mut self, command: &str) -> Result<()> {
        if !self.require_spawned("send_command") {
            return Ok(());
        }
        let command = if command.starts_with('/') { command.to_string() } else { format!("/{command}") };
        let profile = self
            .identity
            .as_ref()
            .map(|i| i.profile.clone())
            .ok_or_else(|| ClientError::Disconnected("missing identity".to_string()))?;
        let request = CommandRequest {
            command,
            origin: CommandOrigin {
                uuid: profile.uuid,
                request_id: uuid::Uuid::new_v4().to_string(),
                unique_entity_id: self.player.entity_id,
            },
        };
        self.send_packet(ids::COMMAND_REQUEST, &request, Reliability::ReliableOrdered, Priority::Immediate).await
    }

    async fn respond_to_form(&mut self, form_id: u32, response: Option<String>) -> Result<()> {
        if !self.require_spawned("respond_to_form") {
            return Ok(());
        }
        let response = ModalFormResponse { form_id, response };
        self.send_packet(ids::MODAL_FORM_RESPONSE, &response, Reliability::ReliableOrdered, Priority::Immediate).await
    }

    /// Callable any time after `StartGame` (not just once `Spawned`).
    async fn set_initialized(&mut self) -> Result<()> {
        if self.phase < Phase::Spawning {
            warn!("set_initialized called before StartGame; ignoring");
            return Ok(());
        }
        let packet = SetLocalPlayerAsInitialized { runtime_entity_id: self.player.runtime_entity_id };
        self.send_packet(ids::SET_LOCAL_PLAYER_AS_INITIALIZED, &packet, Reliability::ReliableOrdered, Priority::Immediate)
            .await
    }

    async fn disconnect(&mut self, reason: &str, notify_server: bool) -> Result<()> {
        info!("disconnecting: {reason}");
        self.suppress_disconnect_notice = !notify_server;
        self.phase = Phase::Disconnected;
        Ok(())
    }

    fn require_spawned(&self, op: &str) -> bool {
        if self.phase != Phase::Spawned {
            warn!("{op} called outside Spawned phase ({:?}); ignoring", self.phase);
            return false;
        }
        true
    }
}

/// Builds the Login packet's opaque connection-request blob: a
/// length-prefixed `{"chain": [...]}` JSON document (the identity chain
/// token, then any external-provider chain tokens) followed by the
/// length-prefixed user chain token (§4.G step 6).
fn build_connection_request(identity: &IdentityArtifact) -> Result<Bytes> {
    let mut chain: Vec<Value> = vec![Value::String(identity.identity_chain_token.clone())];
    chain.extend(identity.external_chain_tokens.iter().cloned().map(Value::String));
    let chain_json = json!({ "chain": chain }).to_string();

    let mut writer = BinaryWriter::new();
    writer.write_var_u32(chain_json.len() as u32)?;
    writer.write_bytes(chain_json.as_bytes())?;
    writer.write_var_u32(identity.user_chain_token.len() as u32)?;
    writer.write_bytes(identity.user_chain_token.as_bytes())?;
    Ok(writer.freeze())
}

/// A packet this client can write the body of (header varint is written by
/// the caller via [`Session::send_packet`]).
trait PacketWrite {
    fn write_body(&self, writer: &mut BinaryWriter) -> ProtoResult<()>;
}

macro_rules! impl_packet_write {
    ($($ty:ty),* $(,)?) => {
        $(impl PacketWrite for $ty {
            fn write_body(&self, writer: &mut BinaryWriter) -> ProtoResult<()> {
                self.write(writer)
            }
        })*
    };
}

impl_packet_write!(
    RequestNetworkSettings,
    Login,
    ResourcePackClientResponse,
    PlayerAuthInput,
    RequestChunkRadius,
    Text,
    CommandRequest,
    ModalFormResponse,
    SetLocalPlayerAsInitialized,
    Respawn,
    PlayerAction,
    NetworkStackLatency,
);

#[cfg(test)]
mod tests {
    use super::*;
    use aurora_identity::Profile;

    #[test]
    fn phase_ordering_is_total_and_monotonic() {
        assert!(Phase::Disconnected < Phase::Connecting);
        assert!(Phase::Connecting < Phase::RaknetEstablished);
        assert!(Phase::RaknetEstablished < Phase::LoggingIn);
        assert!(Phase::LoggingIn < Phase::Spawning);
        assert!(Phase::Spawning < Phase::Spawned);
    }

    #[test]
    fn build_connection_request_frames_chain_then_user_token() {
        let identity = IdentityArtifact {
            profile: Profile::offline("Bot"),
            identity_chain_token: "identity.token".to_string(),
            user_chain_token: "user.token".to_string(),
            external_chain_tokens: vec!["external.token".to_string()],
        };
        let blob = build_connection_request(&identity).expect("blob builds");

        let mut reader = BinaryReader::new(blob);
        let chain_len = reader.read_var_u32().unwrap() as usize;
        let chain_json = reader.read_bytes(chain_len).unwrap();
        let chain: Value = serde_json::from_slice(&chain_json).unwrap();
        let chain_array = chain["chain"].as_array().unwrap();
        assert_eq!(chain_array.len(), 2);
        assert_eq!(chain_array[0], "identity.token");
        assert_eq!(chain_array[1], "external.token");

        let user_len = reader.read_var_u32().unwrap() as usize;
        let user_token = reader.read_bytes(user_len).unwrap();
        assert_eq!(&user_token[..], b"user.token");
        assert_eq!(reader.remaining(), 0);
    }

    #[test]
    fn new_session_starts_disconnected_with_no_pending_dimension_ack() {
        let (_tx, rx) = mpsc::unbounded_channel();
        let session = Session::new(ClientOptions::default(), rx);
        assert_eq!(session.phase(), Phase::Disconnected);
        assert!(!session.awaiting_dimension_ack);
        assert!(session.raknet.is_none());
    }

    #[test]
    fn require_spawned_rejects_every_other_phase() {
        let (_tx, rx) = mpsc::unbounded_channel();
        let mut session = Session::new(ClientOptions::default(), rx);
        assert!(!session.require_spawned("chat"));
        session.phase = Phase::Spawned;
        assert!(session.require_spawned("chat"));
    }
}
