//! Deterministic test infrastructure for the Palaver chat client.
//!
//! Three pieces, composable per scenario:
//!
//! - [`SimEnv`] - manually-advanced clock and seeded RNG, so the echo window
//!   and correlation ids are reproducible from a seed.
//! - [`MemoryBroker`] - in-process publish/subscribe hub implementing the
//!   client's `Transport` contract, with a switchable publish-failure mode.
//! - [`RelayServer`] - a miniature room relay standing in for the remote
//!   side: it rebroadcasts traffic, keeps per-room member sets, pushes
//!   roster resyncs, synthesizes LEAVE for vanished sessions, and stamps the
//!   politeness verdict on chat frames.
//!
//! Scenario tests drive everything by explicit pumping, one payload at a
//! time, so every interleaving in a test is the one written down.

use std::{
    collections::{BTreeSet, HashMap},
    sync::{
        Arc, Mutex, PoisonError,
        atomic::{AtomicBool, Ordering},
    },
    time::{Duration, Instant},
};

use async_trait::async_trait;
use palaver_client::{PayloadHandler, Transport, TransportError, topics};
use palaver_core::{Environment, Lexicon};
use palaver_proto::{Frame, FrameKind, RosterSyncRequest, Tagged};
use rand::{RngCore, SeedableRng, rngs::StdRng};
use tokio::sync::mpsc;

/// Deterministic environment: a clock that only moves when told to and a
/// seeded RNG.
#[derive(Clone)]
pub struct SimEnv {
    start: Instant,
    offset: Arc<Mutex<Duration>>,
    rng: Arc<Mutex<StdRng>>,
}

impl SimEnv {
    /// Environment seeded for reproducibility. The seed is logged so a
    /// failing run can be replayed.
    pub fn new(seed: u64) -> Self {
        tracing::debug!(seed, "sim environment created");
        Self {
            start: Instant::now(),
            offset: Arc::new(Mutex::new(Duration::ZERO)),
            rng: Arc::new(Mutex::new(StdRng::seed_from_u64(seed))),
        }
    }

    /// Move the clock forward.
    pub fn advance(&self, by: Duration) {
        let mut offset = self.offset.lock().unwrap_or_else(PoisonError::into_inner);
        *offset += by;
    }
}

impl Environment for SimEnv {
    fn now(&self) -> Instant {
        let offset = self.offset.lock().unwrap_or_else(PoisonError::into_inner);
        self.start + *offset
    }

    fn sleep(&self, _duration: Duration) -> impl std::future::Future<Output = ()> + Send {
        // simulated time never blocks
        std::future::ready(())
    }

    fn random_bytes(&self, buffer: &mut [u8]) {
        let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
        rng.fill_bytes(buffer);
    }
}

/// In-process publish/subscribe hub.
///
/// Publishing invokes every subscribed handler synchronously, in
/// subscription order. Handlers must only enqueue - the client driver and
/// the relay both feed internal queues, so delivery stays sequential.
#[derive(Default)]
pub struct MemoryBroker {
    subscriptions: Mutex<HashMap<String, Vec<Arc<PayloadHandler>>>>,
    fail_publishes: AtomicBool,
}

impl MemoryBroker {
    /// Fresh hub with no subscriptions.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent publish fail until turned off again.
    pub fn set_fail_publishes(&self, fail: bool) {
        self.fail_publishes.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl Transport for MemoryBroker {
    async fn subscribe(
        &self,
        topic: &str,
        handler: PayloadHandler,
    ) -> Result<(), TransportError> {
        let mut subscriptions =
            self.subscriptions.lock().unwrap_or_else(PoisonError::into_inner);
        subscriptions.entry(topic.to_owned()).or_default().push(Arc::new(handler));
        Ok(())
    }

    async fn publish(&self, topic: &str, payload: &str) -> Result<(), TransportError> {
        if self.fail_publishes.load(Ordering::SeqCst) {
            return Err(TransportError::PublishRejected { reason: "fault injection".to_owned() });
        }

        let handlers: Vec<Arc<PayloadHandler>> = {
            let subscriptions =
                self.subscriptions.lock().unwrap_or_else(PoisonError::into_inner);
            subscriptions.get(topic).cloned().unwrap_or_default()
        };

        for handler in handlers {
            handler(payload.to_owned());
        }
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), TransportError> {
        Ok(())
    }
}

/// Miniature room relay.
///
/// Reproduces the remote side at its interface boundary: every command-topic
/// frame is rebroadcast on the room-traffic topic, JOIN/LEAVE maintain
/// per-room member sets, a joining user gets a private roster push plus a
/// room-wide broadcast, a roster-sync request triggers a room-wide push, and
/// chat frames are stamped with a politeness verdict from the configured
/// lexicon before going out.
pub struct RelayServer {
    broker: Arc<MemoryBroker>,
    inbound: mpsc::UnboundedReceiver<String>,
    rooms: HashMap<String, BTreeSet<String>>,
    sessions: HashMap<String, String>,
    lexicon: Lexicon,
}

impl RelayServer {
    /// Subscribe the command topic and start with empty rooms.
    pub async fn start(
        broker: Arc<MemoryBroker>,
        lexicon: Lexicon,
    ) -> Result<Self, TransportError> {
        let (tx, rx) = mpsc::unbounded_channel();
        broker
            .subscribe(
                topics::COMMANDS,
                Box::new(move |payload| {
                    let _ = tx.send(payload);
                }),
            )
            .await?;

        Ok(Self {
            broker,
            inbound: rx,
            rooms: HashMap::new(),
            sessions: HashMap::new(),
            lexicon,
        })
    }

    /// Current members of a room, sorted.
    pub fn members(&self, room_id: &str) -> Vec<String> {
        self.rooms.get(room_id).map(|set| set.iter().cloned().collect()).unwrap_or_default()
    }

    /// Process every queued command, including ones enqueued while draining.
    /// Returns true if anything was processed.
    pub async fn pump(&mut self) -> bool {
        let mut any = false;
        while let Ok(payload) = self.inbound.try_recv() {
            self.process(payload).await;
            any = true;
        }
        any
    }

    /// A session vanished without saying LEAVE; synthesize one, as the real
    /// backend does on a websocket disconnect.
    pub async fn drop_session(&mut self, username: &str) {
        let Some(room_id) = self.sessions.remove(username) else {
            return;
        };
        if let Some(members) = self.rooms.get_mut(&room_id) {
            members.remove(username);
        }

        self.broadcast(&Frame::leave(username, &room_id)).await;
        self.push_room_roster(&room_id).await;
    }

    async fn process(&mut self, payload: String) {
        // roster-sync requests share the command topic with full frames
        if let Ok(request) = RosterSyncRequest::decode(&payload) {
            self.push_room_roster(&request.room_id).await;
            return;
        }

        let Ok(mut frame) = Frame::decode(&payload) else {
            tracing::debug!("relay ignoring unparseable command payload");
            return;
        };
        let room_id =
            frame.room_id.clone().unwrap_or_else(|| "default".to_owned());

        match frame.kind {
            FrameKind::Join => {
                self.sessions.insert(frame.sender.clone(), room_id.clone());
                self.rooms.entry(room_id.clone()).or_default().insert(frame.sender.clone());

                self.broadcast(&frame).await;
                self.push_private_roster(&frame.sender, &room_id).await;
                self.push_room_roster(&room_id).await;
            },
            FrameKind::Leave => {
                self.sessions.remove(&frame.sender);
                if let Some(members) = self.rooms.get_mut(&room_id) {
                    members.remove(&frame.sender);
                }

                self.broadcast(&frame).await;
                self.push_room_roster(&room_id).await;
            },
            FrameKind::Chat => {
                let body = match Tagged::decode(&frame.content) {
                    Tagged::Chat { body, .. } => body,
                    _ => frame.content.clone(),
                };
                frame.polite = Some(!self.lexicon.is_flagged(&body));

                self.broadcast(&frame).await;
            },
            _ => self.broadcast(&frame).await,
        }
    }

    async fn broadcast(&self, frame: &Frame) {
        match frame.encode() {
            Ok(payload) => {
                if let Err(error) = self.broker.publish(topics::ROOM_TRAFFIC, &payload).await {
                    tracing::debug!(%error, "relay broadcast failed");
                }
            },
            Err(error) => tracing::debug!(%error, "relay frame encode failed"),
        }
    }

    async fn push_private_roster(&self, username: &str, room_id: &str) {
        let payload = roster_payload(self.members(room_id));
        let topic = topics::private_roster(username);
        if let Err(error) = self.broker.publish(&topic, &payload).await {
            tracing::debug!(%error, "private roster push failed");
        }
    }

    async fn push_room_roster(&self, room_id: &str) {
        let payload = roster_payload(self.members(room_id));
        let topic = topics::room_roster(room_id);
        if let Err(error) = self.broker.publish(&topic, &payload).await {
            tracing::debug!(%error, "room roster push failed");
        }
    }
}

fn roster_payload(names: Vec<String>) -> String {
    serde_json::to_string(&names).unwrap_or_else(|_| "[]".to_owned())
}
