//! In-process transport.
//!
//! Every [`MemoryTransport`] clone shares one broker mapping dial addresses
//! to listeners. A dial that finds a listener opens a pair of
//! [`StreamChannel`]s over an in-memory duplex pipe, one end for each side.
//!
//! Faults can be injected per [`TransportMode`], so a test or the demo
//! emulator can make the direct attempt hang or fail and watch the relay
//! fallback take over.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use pairkit_lib::{IceConfig, PairkitError, Result};
use tokio::sync::mpsc::{self, UnboundedSender};

use super::{StreamChannel, Transport, TransportEvent, TransportHandle, TransportMode, TransportSession};

const DUPLEX_BUFFER: usize = 64 * 1024;

/// Misbehaviour injected into dials of one mode.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Fault {
    /// The dial never opens.
    Block,
    /// The dial reports a transport error straight away.
    Fail(String),
    /// The dial opens after the delay.
    ///
    /// The open is delivered even if the dialing session was destroyed in
    /// the meantime, the way an open already in flight outlives teardown.
    Delay(Duration),
}

struct Listener {
    id: u64,
    events: UnboundedSender<TransportEvent>,
}

#[derive(Default)]
struct Broker {
    listeners: HashMap<String, Listener>,
    faults: HashMap<TransportMode, Fault>,
    dials: Vec<(String, TransportMode)>,
    next_listener_id: u64,
    links_opened: usize,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Shared in-memory broker implementing [`Transport`].
#[derive(Clone, Default)]
pub struct MemoryTransport {
    broker: Arc<Mutex<Broker>>,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inject `fault` into every later dial in `mode`.
    pub fn set_fault(&self, mode: TransportMode, fault: Fault) {
        lock(&self.broker).faults.insert(mode, fault);
    }

    /// Modes of all dials so far, in order.
    pub fn dial_modes(&self) -> Vec<TransportMode> {
        lock(&self.broker).dials.iter().map(|(_, mode)| *mode).collect()
    }

    /// Addresses and modes of all dials so far, in order.
    pub fn dial_log(&self) -> Vec<(String, TransportMode)> {
        lock(&self.broker).dials.clone()
    }

    pub fn is_listening(&self, address: &str) -> bool {
        lock(&self.broker).listeners.contains_key(address)
    }

    /// Number of channel pairs handed out.
    pub fn links_opened(&self) -> usize {
        lock(&self.broker).links_opened
    }

    /// Report a transport error to the listener on `address`.
    pub fn break_listener(&self, address: &str, reason: &str) -> bool {
        lock(&self.broker)
            .listeners
            .get(address)
            .map(|listener| {
                listener
                    .events
                    .send(TransportEvent::Error(reason.to_string()))
                    .is_ok()
            })
            .unwrap_or(false)
    }

    fn connect(&self, address: &str, dialer: &UnboundedSender<TransportEvent>) {
        let mut broker = lock(&self.broker);

        let Some(listener) = broker.listeners.get(address) else {
            let _ = dialer.send(TransportEvent::Error(format!(
                "nobody is listening on {}",
                address
            )));
            return;
        };

        let (near, far) = tokio::io::duplex(DUPLEX_BUFFER);
        if listener
            .events
            .send(TransportEvent::Open(Box::new(StreamChannel::new(far))))
            .is_err()
        {
            let _ = dialer.send(TransportEvent::Error("listener went away".into()));
            return;
        }

        broker.links_opened += 1;
        tracing::debug!(address, "memory link opened");
        let _ = dialer.send(TransportEvent::Open(Box::new(StreamChannel::new(near))));
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn listen(&self, address: &str, _ice: &IceConfig) -> Result<TransportSession> {
        let (tx, rx) = mpsc::unbounded_channel();

        let id = {
            let mut broker = lock(&self.broker);
            if broker.listeners.contains_key(address) {
                return Err(PairkitError::Transport(format!(
                    "address already in use: {}",
                    address
                )));
            }
            broker.next_listener_id += 1;
            let id = broker.next_listener_id;
            broker.listeners.insert(
                address.to_string(),
                Listener {
                    id,
                    events: tx.clone(),
                },
            );
            id
        };

        let handle = MemoryHandle::new(
            self.broker.clone(),
            Some((address.to_string(), id)),
            tx,
        );
        Ok(TransportSession {
            handle: Arc::new(handle),
            events: rx,
        })
    }

    async fn dial(
        &self,
        address: &str,
        _ice: &IceConfig,
        mode: TransportMode,
    ) -> Result<TransportSession> {
        let (tx, rx) = mpsc::unbounded_channel();

        let fault = {
            let mut broker = lock(&self.broker);
            broker.dials.push((address.to_string(), mode));
            broker.faults.get(&mode).cloned()
        };

        match fault {
            None => self.connect(address, &tx),
            Some(Fault::Block) => {}
            Some(Fault::Fail(reason)) => {
                let _ = tx.send(TransportEvent::Error(reason));
            }
            Some(Fault::Delay(delay)) => {
                let transport = self.clone();
                let address = address.to_string();
                let dialer = tx.clone();
                tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    transport.connect(&address, &dialer);
                });
            }
        }

        Ok(TransportSession {
            handle: Arc::new(MemoryHandle::new(self.broker.clone(), None, tx)),
            events: rx,
        })
    }
}

struct MemoryHandle {
    broker: Arc<Mutex<Broker>>,
    listener: Option<(String, u64)>,
    events: Mutex<Option<UnboundedSender<TransportEvent>>>,
    destroyed: AtomicBool,
}

impl MemoryHandle {
    fn new(
        broker: Arc<Mutex<Broker>>,
        listener: Option<(String, u64)>,
        events: UnboundedSender<TransportEvent>,
    ) -> Self {
        Self {
            broker,
            listener,
            events: Mutex::new(Some(events)),
            destroyed: AtomicBool::new(false),
        }
    }
}

impl TransportHandle for MemoryHandle {
    fn destroy(&self) {
        if self.destroyed.swap(true, Ordering::AcqRel) {
            return;
        }

        if let Some((address, id)) = &self.listener {
            let mut broker = lock(&self.broker);
            if broker
                .listeners
                .get(address)
                .is_some_and(|listener| listener.id == *id)
            {
                broker.listeners.remove(address);
            }
        }

        if let Some(events) = lock(&self.events).take() {
            let _ = events.send(TransportEvent::Closed);
        }
    }

    fn is_destroyed(&self) -> bool {
        self.destroyed.load(Ordering::Acquire)
    }
}
