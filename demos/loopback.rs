//! Two managers negotiating with each other in one process.
//!
//! Alice and Bob each run a [`ResourceManager`]. Their signaling channels are
//! joined by a pair of in-memory queues, and both use a transport whose
//! peers connect as soon as offer and answer have been exchanged.
//!
//! Usage:
//!   cargo run --example loopback
//!   cargo run --example loopback -- --debug

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use rtc_resource_manager::{
    DataChannel, IceCandidate, PeerConnection, PeerEvent, PeerEventHandler, PeerId, PeerState,
    ResourceManager, Response, Result, RtcConfig, RtcFacade, SessionDescription, Signal,
    SignalingChannel, decode_response, encode_signal,
};
use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

// ============================================================================
// Relay Channel
// ============================================================================

const RELAY_ID: &str = "relay";

/// Signaling channel that hands frames to the other side's queue.
///
/// Outbound signals are addressed to the remote peer; the relay rewrites
/// them to name the sender, as a signaling server would.
struct RelayChannel {
    local: PeerId,
    outbound: mpsc::UnboundedSender<Vec<u8>>,
}

impl SignalingChannel for RelayChannel {
    fn id(&self) -> &str {
        RELAY_ID
    }

    fn send(&self, signal: Signal) -> Result<()> {
        let from = self.local.clone();
        let signal = match signal {
            Signal::Offer { description, .. } => Signal::Offer {
                peer_id: from,
                description,
            },
            Signal::Answer { description, .. } => Signal::Answer {
                peer_id: from,
                description,
            },
            Signal::Candidate { candidate, .. } => Signal::Candidate {
                peer_id: from,
                candidate,
            },
        };

        // The receiving side may already be gone during shutdown.
        let _ = self.outbound.send(encode_signal(&signal)?);
        Ok(())
    }

    fn on_message(&self, raw: &[u8]) -> Result<Response> {
        decode_response(raw)
    }

    fn on_bind(&self) {
        info!(peer = %self.local, "Relay bound");
    }
}

/// Feeds every frame from `inbound` into `manager`.
async fn pump(manager: ResourceManager, mut inbound: mpsc::UnboundedReceiver<Vec<u8>>) {
    while let Some(frame) = inbound.recv().await {
        if let Err(e) = manager.response(&frame, RELAY_ID) {
            warn!(manager_id = %manager.id(), error = %e, "Dropped frame");
        }
    }
}

// ============================================================================
// Demo Transport
// ============================================================================

struct DemoFacade;

impl RtcFacade for DemoFacade {
    fn create_peer_connection(&self, _config: &RtcConfig) -> Result<Arc<dyn PeerConnection>> {
        Ok(Arc::new(DemoPeer::default()))
    }
}

/// Connects once both a local and a remote description are in place.
#[derive(Default)]
struct DemoPeer {
    handler: Mutex<Option<PeerEventHandler>>,
    has_local: Mutex<bool>,
    has_remote: Mutex<bool>,
}

impl DemoPeer {
    fn emit(&self, event: PeerEvent) {
        if let Some(handler) = self.handler.lock().as_ref() {
            handler(event);
        }
    }

    fn mark(&self, flag: &Mutex<bool>) {
        *flag.lock() = true;
        if *self.has_local.lock() && *self.has_remote.lock() {
            self.emit(PeerEvent::StateChanged(PeerState::Connected));
        }
    }
}

#[async_trait]
impl PeerConnection for DemoPeer {
    fn set_event_handler(&self, handler: PeerEventHandler) {
        *self.handler.lock() = Some(handler);
    }

    async fn create_offer(&self) -> Result<SessionDescription> {
        self.mark(&self.has_local);
        Ok(SessionDescription::offer("v=0 demo-offer"))
    }

    async fn create_answer(&self) -> Result<SessionDescription> {
        self.mark(&self.has_local);
        Ok(SessionDescription::answer("v=0 demo-answer"))
    }

    async fn set_remote_description(&self, _description: SessionDescription) -> Result<()> {
        self.mark(&self.has_remote);
        Ok(())
    }

    async fn add_ice_candidate(&self, _candidate: IceCandidate) -> Result<()> {
        Ok(())
    }

    async fn create_data_channel(&self, label: &str) -> Result<Arc<dyn DataChannel>> {
        Ok(Arc::new(PrintChannel(label.to_string())))
    }

    async fn close(&self) -> Result<()> {
        self.emit(PeerEvent::StateChanged(PeerState::Closed));
        Ok(())
    }
}

struct PrintChannel(String);

#[async_trait]
impl DataChannel for PrintChannel {
    fn label(&self) -> &str {
        &self.0
    }

    async fn send(&self, data: &[u8]) -> Result<()> {
        println!("[{}] {}", self.0, String::from_utf8_lossy(data));
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }
}

// ============================================================================
// Main
// ============================================================================

fn init_logging(debug: bool) {
    let filter = if debug {
        "rtc_resource_manager=debug,loopback=debug"
    } else {
        "rtc_resource_manager=info,loopback=info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_target(false)
        .init();
}

fn manager_for(local: &str, outbound: mpsc::UnboundedSender<Vec<u8>>) -> Result<ResourceManager> {
    ResourceManager::builder()
        .channel(RelayChannel {
            local: PeerId::new(local),
            outbound,
        })
        .rtc_facade(DemoFacade)
        .build()
}

#[tokio::main]
async fn main() {
    let debug = std::env::args().any(|a| a == "--debug");
    init_logging(debug);

    if let Err(e) = run().await {
        eprintln!("\n[ERROR] {e:#}");
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    println!("=== Loopback: two managers, one relay ===\n");

    let (to_bob, bob_inbound) = mpsc::unbounded_channel();
    let (to_alice, alice_inbound) = mpsc::unbounded_channel();

    let alice = manager_for("alice", to_bob)?;
    let bob = manager_for("bob", to_alice)?;

    tokio::spawn(pump(alice.clone(), alice_inbound));
    tokio::spawn(pump(bob.clone(), bob_inbound));

    let connection = alice.connect_to("bob").await?;
    info!(
        peer_id = %connection.id(),
        status = ?connection.open_status(),
        "Alice connected"
    );

    let chat = connection.add_data_connection("chat").await?;
    chat.send(b"hello from alice").await?;

    let remote = bob.get_connection("alice")?;
    info!(
        peer_id = %remote.id(),
        usage = remote.usage_count(),
        eviction_pending = remote.eviction_pending(),
        "Bob holds an idle connection"
    );

    // A second caller joins the existing connection.
    let joined = alice.connect_to("bob").await?;
    info!(usage = joined.usage_count(), "Second caller joined");

    alice.close("bob")?;
    alice.close("bob")?;
    info!(
        eviction_pending = connection.eviction_pending(),
        "Alice released the connection"
    );

    alice.shutdown().await;
    bob.shutdown().await;

    println!("\n=== Done ===");
    Ok(())
}
