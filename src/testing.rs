//! Test doubles shared by unit tests.
//!
//! | Type | Stands in for |
//! |------|---------------|
//! | [`MemoryChannel`] | A signaling transport; records sent signals |
//! | [`LoopbackFacade`] | A WebRTC stack; hands out [`MockPeer`]s |
//! | [`MockPeer`] | A peer connection that connects once both descriptions are set |

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::channel::{ChannelHandle, SignalingChannel};
use crate::error::{Error, Result};
use crate::identifiers::ManagerId;
use crate::manager::{ManagerConfig, ResourceManager};
use crate::protocol::{
    IceCandidate, Response, ResponseKind, SessionDescription, Signal, decode_response,
    encode_signal,
};
use crate::rtc::{
    DataChannel, PeerConnection, PeerEvent, PeerEventHandler, PeerState, RtcConfig, RtcFacade,
};

// ============================================================================
// HookLog
// ============================================================================

/// Ordered record of lifecycle hooks across several channels.
#[derive(Debug, Clone, Default)]
pub(crate) struct HookLog(Arc<Mutex<Vec<String>>>);

impl HookLog {
    fn record(&self, entry: String) {
        self.0.lock().push(entry);
    }

    pub(crate) fn entries(&self) -> Vec<String> {
        self.0.lock().clone()
    }
}

// ============================================================================
// MemoryChannel
// ============================================================================

/// In-memory signaling channel.
pub(crate) struct MemoryChannel {
    id: String,
    sent: Mutex<Vec<Signal>>,
    binds: AtomicUsize,
    closes: AtomicUsize,
    fail_sends: AtomicBool,
    canned: Option<Response>,
    log: Option<(HookLog, &'static str)>,
}

impl MemoryChannel {
    pub(crate) fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            sent: Mutex::new(Vec::new()),
            binds: AtomicUsize::new(0),
            closes: AtomicUsize::new(0),
            fail_sends: AtomicBool::new(false),
            canned: None,
            log: None,
        }
    }

    /// Records hooks into `log` prefixed with `tag`.
    pub(crate) fn with_log(mut self, log: &HookLog, tag: &'static str) -> Self {
        self.log = Some((log.clone(), tag));
        self
    }

    /// Classifies every frame as `response`.
    pub(crate) fn with_canned(mut self, response: Response) -> Self {
        self.canned = Some(response);
        self
    }

    pub(crate) fn set_fail_sends(&self, fail: bool) {
        self.fail_sends.store(fail, Ordering::SeqCst);
    }

    pub(crate) fn sent(&self) -> Vec<Signal> {
        self.sent.lock().clone()
    }

    pub(crate) fn bind_calls(&self) -> usize {
        self.binds.load(Ordering::SeqCst)
    }

    pub(crate) fn close_calls(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    fn log(&self, hook: &str) {
        if let Some((log, tag)) = &self.log {
            log.record(format!("{tag}:{hook}"));
        }
    }
}

impl SignalingChannel for MemoryChannel {
    fn id(&self) -> &str {
        &self.id
    }

    fn send(&self, signal: Signal) -> Result<()> {
        if self.fail_sends.load(Ordering::SeqCst) {
            return Err(Error::signaling(format!("{} refused to send", self.id)));
        }
        self.sent.lock().push(signal);
        Ok(())
    }

    fn on_message(&self, raw: &[u8]) -> Result<Response> {
        match &self.canned {
            Some(response) => Ok(response.clone()),
            None => decode_response(raw),
        }
    }

    fn on_bind(&self) {
        self.binds.fetch_add(1, Ordering::SeqCst);
        self.log("bind");
    }

    fn on_close(&self) {
        self.closes.fetch_add(1, Ordering::SeqCst);
        self.log("close");
    }
}

/// A memory channel already bound to a throwaway manager identity.
pub(crate) fn bound_channel(id: &str) -> (ChannelHandle, Arc<MemoryChannel>) {
    let channel = Arc::new(MemoryChannel::new(id));
    let handle = ChannelHandle::new(channel.clone());
    handle.mark_bound(ManagerId::next());
    handle.notify_bound();
    (handle, channel)
}

// ============================================================================
// MockBehavior
// ============================================================================

/// Switches shared by a facade and every peer it created.
#[derive(Debug)]
pub(crate) struct MockBehavior {
    reject_create: AtomicBool,
    reject_offer: AtomicBool,
    reject_answer: AtomicBool,
    reject_remote: AtomicBool,
    reject_candidates: AtomicBool,
    reject_data_channels: AtomicBool,
    emit_local_candidates: AtomicBool,
    auto_connect: AtomicBool,
}

impl Default for MockBehavior {
    fn default() -> Self {
        Self {
            reject_create: AtomicBool::new(false),
            reject_offer: AtomicBool::new(false),
            reject_answer: AtomicBool::new(false),
            reject_remote: AtomicBool::new(false),
            reject_candidates: AtomicBool::new(false),
            reject_data_channels: AtomicBool::new(false),
            emit_local_candidates: AtomicBool::new(false),
            auto_connect: AtomicBool::new(true),
        }
    }
}

impl MockBehavior {
    pub(crate) fn reject_create(&self, on: bool) {
        self.reject_create.store(on, Ordering::SeqCst);
    }

    pub(crate) fn reject_offer(&self, on: bool) {
        self.reject_offer.store(on, Ordering::SeqCst);
    }

    pub(crate) fn reject_answer(&self, on: bool) {
        self.reject_answer.store(on, Ordering::SeqCst);
    }

    pub(crate) fn reject_remote(&self, on: bool) {
        self.reject_remote.store(on, Ordering::SeqCst);
    }

    pub(crate) fn reject_candidates(&self, on: bool) {
        self.reject_candidates.store(on, Ordering::SeqCst);
    }

    pub(crate) fn reject_data_channels(&self, on: bool) {
        self.reject_data_channels.store(on, Ordering::SeqCst);
    }

    pub(crate) fn emit_local_candidates(&self, on: bool) {
        self.emit_local_candidates.store(on, Ordering::SeqCst);
    }

    pub(crate) fn auto_connect(&self, on: bool) {
        self.auto_connect.store(on, Ordering::SeqCst);
    }

    fn is(flag: &AtomicBool) -> bool {
        flag.load(Ordering::SeqCst)
    }
}

// ============================================================================
// LoopbackFacade
// ============================================================================

/// Facade handing out [`MockPeer`]s.
#[derive(Default)]
pub(crate) struct LoopbackFacade {
    behavior: Arc<MockBehavior>,
    peers: Mutex<Vec<Arc<MockPeer>>>,
}

impl LoopbackFacade {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn behavior(&self) -> &MockBehavior {
        &self.behavior
    }

    /// Creates a peer with the default ICE configuration.
    pub(crate) fn peer(&self) -> Result<Arc<dyn PeerConnection>> {
        self.create_peer_connection(&RtcConfig::default())
    }

    pub(crate) fn peers_created(&self) -> usize {
        self.peers.lock().len()
    }

    pub(crate) fn last_peer(&self) -> Option<Arc<MockPeer>> {
        self.peers.lock().last().cloned()
    }
}

impl RtcFacade for LoopbackFacade {
    fn create_peer_connection(&self, _config: &RtcConfig) -> Result<Arc<dyn PeerConnection>> {
        if MockBehavior::is(&self.behavior.reject_create) {
            return Err(Error::validation("loopback facade refused to allocate"));
        }

        let peer = Arc::new(MockPeer::new(Arc::clone(&self.behavior)));
        self.peers.lock().push(Arc::clone(&peer));
        Ok(peer)
    }
}

// ============================================================================
// MockPeer
// ============================================================================

/// Peer connection that reports Connected once both descriptions are set.
pub(crate) struct MockPeer {
    behavior: Arc<MockBehavior>,
    handler: Mutex<Option<PeerEventHandler>>,
    local: Mutex<Option<SessionDescription>>,
    remote: Mutex<Option<SessionDescription>>,
    candidates: Mutex<Vec<IceCandidate>>,
    data_channels: AtomicUsize,
    descriptions: AtomicUsize,
    closed: AtomicBool,
}

impl MockPeer {
    fn new(behavior: Arc<MockBehavior>) -> Self {
        Self {
            behavior,
            handler: Mutex::new(None),
            local: Mutex::new(None),
            remote: Mutex::new(None),
            candidates: Mutex::new(Vec::new()),
            data_channels: AtomicUsize::new(0),
            descriptions: AtomicUsize::new(0),
            closed: AtomicBool::new(false),
        }
    }

    /// Delivers `event` to the installed handler.
    pub(crate) fn emit(&self, event: PeerEvent) {
        if let Some(handler) = self.handler.lock().as_ref() {
            handler(event);
        }
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub(crate) fn candidates(&self) -> Vec<IceCandidate> {
        self.candidates.lock().clone()
    }

    pub(crate) fn data_channels_created(&self) -> usize {
        self.data_channels.load(Ordering::SeqCst)
    }

    fn set_local(&self, description: SessionDescription) {
        *self.local.lock() = Some(description);
        if MockBehavior::is(&self.behavior.emit_local_candidates) {
            self.emit(PeerEvent::LocalCandidate(IceCandidate::new("candidate:local")));
        }
        self.maybe_connect();
    }

    fn maybe_connect(&self) {
        let ready = self.local.lock().is_some() && self.remote.lock().is_some();
        if ready && MockBehavior::is(&self.behavior.auto_connect) {
            self.emit(PeerEvent::StateChanged(PeerState::Connected));
        }
    }

    fn next_sdp(&self, kind: &str) -> String {
        let n = self.descriptions.fetch_add(1, Ordering::SeqCst);
        format!("v=0 loopback-{kind}-{n}")
    }
}

#[async_trait]
impl PeerConnection for MockPeer {
    fn set_event_handler(&self, handler: PeerEventHandler) {
        *self.handler.lock() = Some(handler);
    }

    async fn create_offer(&self) -> Result<SessionDescription> {
        if MockBehavior::is(&self.behavior.reject_offer) {
            return Err(Error::protocol("loopback peer rejected offer creation"));
        }
        let offer = SessionDescription::offer(self.next_sdp("offer"));
        self.set_local(offer.clone());
        Ok(offer)
    }

    async fn create_answer(&self) -> Result<SessionDescription> {
        if MockBehavior::is(&self.behavior.reject_answer) {
            return Err(Error::protocol("loopback peer rejected answer creation"));
        }
        if self.remote.lock().is_none() {
            return Err(Error::protocol("no remote offer applied"));
        }
        let answer = SessionDescription::answer(self.next_sdp("answer"));
        self.set_local(answer.clone());
        Ok(answer)
    }

    async fn set_remote_description(&self, description: SessionDescription) -> Result<()> {
        if MockBehavior::is(&self.behavior.reject_remote) {
            return Err(Error::protocol("loopback peer rejected remote description"));
        }
        *self.remote.lock() = Some(description);
        self.maybe_connect();
        Ok(())
    }

    async fn add_ice_candidate(&self, candidate: IceCandidate) -> Result<()> {
        if MockBehavior::is(&self.behavior.reject_candidates) {
            return Err(Error::protocol("loopback peer rejected candidate"));
        }
        self.candidates.lock().push(candidate);
        Ok(())
    }

    async fn create_data_channel(&self, label: &str) -> Result<Arc<dyn DataChannel>> {
        if MockBehavior::is(&self.behavior.reject_data_channels) {
            return Err(Error::protocol("loopback peer rejected data channel"));
        }
        self.data_channels.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(MockDataChannel::new(label)))
    }

    async fn close(&self) -> Result<()> {
        self.closed.store(true, Ordering::SeqCst);
        self.emit(PeerEvent::StateChanged(PeerState::Closed));
        Ok(())
    }
}

// ============================================================================
// MockDataChannel
// ============================================================================

/// Data sub-channel that accepts sends until closed.
pub(crate) struct MockDataChannel {
    label: String,
    closed: AtomicBool,
}

impl MockDataChannel {
    pub(crate) fn new(label: &str) -> Self {
        Self {
            label: label.to_string(),
            closed: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl DataChannel for MockDataChannel {
    fn label(&self) -> &str {
        &self.label
    }

    async fn send(&self, _data: &[u8]) -> Result<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(Error::signaling(format!("data channel {} closed", self.label)));
        }
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

// ============================================================================
// Frames
// ============================================================================

fn frame(signal: &Signal) -> Vec<u8> {
    encode_signal(signal).expect("signal encodes")
}

pub(crate) fn none_frame() -> Vec<u8> {
    br#"{"kind":"none"}"#.to_vec()
}

pub(crate) fn offer_frame(peer: &str) -> Vec<u8> {
    frame(&Signal::Offer {
        peer_id: peer.into(),
        description: SessionDescription::offer("v=0 remote-offer"),
    })
}

pub(crate) fn answer_frame(peer: &str) -> Vec<u8> {
    frame(&Signal::Answer {
        peer_id: peer.into(),
        description: SessionDescription::answer("v=0 remote-answer"),
    })
}

pub(crate) fn candidate_frame(peer: &str) -> Vec<u8> {
    frame(&Signal::Candidate {
        peer_id: peer.into(),
        candidate: IceCandidate::new("candidate:1 1 udp 2122260223 10.0.0.2 50000 typ host")
            .with_mid("0", 0),
    })
}

// ============================================================================
// Harness
// ============================================================================

/// A manager on a memory channel `"c1"` and a loopback facade.
pub(crate) struct Harness {
    pub(crate) manager: ResourceManager,
    pub(crate) channel: Arc<MemoryChannel>,
    pub(crate) handle: ChannelHandle,
    pub(crate) facade: Arc<LoopbackFacade>,
}

pub(crate) fn harness() -> Harness {
    let channel = Arc::new(MemoryChannel::new("c1"));
    let handle = ChannelHandle::new(channel.clone());
    let facade = Arc::new(LoopbackFacade::new());

    let config = ManagerConfig::new()
        .with_channel(handle.clone())
        .with_rtc_facade(facade.clone());
    let manager = ResourceManager::new(config).expect("valid test configuration");

    Harness {
        manager,
        channel,
        handle,
        facade,
    }
}

// ============================================================================
// Scheduling
// ============================================================================

/// Lets spawned tasks run until they block.
pub(crate) async fn settle() {
    for _ in 0..64 {
        tokio::task::yield_now().await;
    }
}

/// Waits for the first signal of `kind` sent on `channel`.
pub(crate) async fn next_signal(channel: &MemoryChannel, kind: ResponseKind) -> Signal {
    for _ in 0..1_000 {
        if let Some(signal) = channel.sent().into_iter().find(|s| s.kind() == kind) {
            return signal;
        }
        tokio::task::yield_now().await;
    }
    panic!("no {kind} signal sent on {}", channel.id);
}
