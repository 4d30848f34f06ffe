//! Typed event bus (Design Notes: event emitter pattern, re-architected).
//!
//! Subscriptions are a list of callbacks per event name, same shape the
//! source's dynamic emitter had — just statically typed. `packet` fires
//! for every decoded game packet in addition to whichever specific event a
//! handler recognized it as.

use bytes::Bytes;
use std::collections::HashMap;
use tokio::sync::oneshot;

#[derive(Debug, Clone)]
pub enum Event {
    RaknetConnect,
    Login,
    StartGame,
    Spawn,
    Tick(u64),
    Packet { id: u16, name: &'static str, raw: Bytes },
    Text { source: String, message: String },
    Kick(String),
    Disconnect,
    Reconnect(u32),
    Error(String),
}

impl Event {
    pub fn name(&self) -> &'static str {
        match self {
            Event::RaknetConnect => "raknet_connect",
            Event::Login => "login",
            Event::StartGame => "start_game",
            Event::Spawn => "spawn",
            Event::Tick(_) => "tick",
            Event::Packet { .. } => "packet",
            Event::Text { .. } => "text",
            Event::Kick(_) => "kick",
            Event::Disconnect => "disconnect",
            Event::Reconnect(_) => "reconnect",
            Event::Error(_) => "error",
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub enum PacketSelector {
    Id(u16),
    Name(&'static str),
}

impl PacketSelector {
    fn key(self) -> String {
        match self {
            PacketSelector::Id(id) => format!("packet:{id}"),
            PacketSelector::Name(name) => format!("packet:{name}"),
        }
    }
}

type Callback = Box<dyn FnMut(&Event) + Send>;

/// Returned by `on`/`on_packet`; pass back to [`EventBus::unregister`] to
/// detach (the spec's "returns an unregister function").
pub struct Subscription {
    key: String,
    id: u64,
}

#[derive(Default)]
pub struct EventBus {
    next_id: u64,
    handlers: HashMap<String, Vec<(u64, Callback)>>,
    waiters: Vec<(String, oneshot::Sender<Event>)>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on(&mut self, event_name: &str, callback: impl FnMut(&Event) + Send + 'static) -> Subscription {
        self.register(event_name.to_string(), callback)
    }

    pub fn on_packet(&mut self, selector: PacketSelector, callback: impl FnMut(&Event) + Send + 'static) -> Subscription {
        self.register(selector.key(), callback)
    }

    fn register(&mut self, key: String, callback: impl FnMut(&Event) + Send + 'static) -> Subscription {
        let id = self.next_id;
        self.next_id += 1;
        self.handlers.entry(key.clone()).or_default().push((id, Box::new(callback)));
        Subscription { key, id }
    }

    pub fn unregister(&mut self, subscription: Subscription) {
        if let Some(list) = self.handlers.get_mut(&subscription.key) {
            list.retain(|(id, _)| *id != subscription.id);
        }
    }

    /// Registers a one-shot waiter for `selector`, fulfilled the next time a
    /// matching packet event is emitted.
    pub fn wait_for_packet(&mut self, selector: PacketSelector) -> oneshot::Receiver<Event> {
        let (tx, rx) = oneshot::channel();
        self.waiters.push((selector.key(), tx));
        rx
    }

    /// Fails every pending waiter; called on teardown so `wait_for_packet`
    /// never hangs past a disconnect (§5).
    pub fn fail_all_waiters(&mut self) {
        self.waiters.clear();
    }

    pub fn emit(&mut self, event: Event) {
        self.dispatch(event.name().to_string(), &event);
        if let Event::Packet { id, name, .. } = &event {
            self.dispatch(format!("packet:{id}"), &event);
            self.dispatch(format!("packet:{name}"), &event);
        }
    }

    fn dispatch(&mut self, key: String, event: &Event) {
        if let Some(list) = self.handlers.get_mut(&key) {
            for (_, cb) in list.iter_mut() {
                cb(event);
            }
        }
        let mut remaining = Vec::with_capacity(self.waiters.len());
        for (waiter_key, sender) in std::mem::take(&mut self.waiters) {
            if waiter_key == key {
                let _ = sender.send(event.clone());
            } else {
                remaining.push((waiter_key, sender));
            }
        }
        self.waiters = remaining;
    }
}
