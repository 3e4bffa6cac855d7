//! Dispatch and connection pool benchmark suite.
//!
//! Measures the hot paths of the manager against an in-process transport:
//! - Frame classification and routing
//! - Joining an already open connection
//! - Opening fresh connections at different fan-outs
//!
//! Run with: cargo bench --bench dispatch
//! Results saved to: target/criterion/

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use parking_lot::Mutex;
use rtc_resource_manager::{
    DataChannel, IceCandidate, MergePolicy, PeerConnection, PeerEvent, PeerEventHandler, PeerId,
    PeerState, ResourceManager, Response, Result, RtcConfig, RtcFacade, SessionDescription,
    Signal, SignalingChannel, decode_response, encode_signal,
};
use tokio::runtime::Runtime;

// ============================================================================
// Benchmark Parameters
// ============================================================================

const CHANNEL_ID: &str = "bench";
const FAN_OUTS: &[usize] = &[1, 16, 64];

// ============================================================================
// In-process Transport
// ============================================================================

/// Channel that classifies frames and discards outbound signals.
struct SinkChannel;

impl SignalingChannel for SinkChannel {
    fn id(&self) -> &str {
        CHANNEL_ID
    }

    fn send(&self, _signal: Signal) -> Result<()> {
        Ok(())
    }

    fn on_message(&self, raw: &[u8]) -> Result<Response> {
        decode_response(raw)
    }
}

/// Facade whose peers report Connected as soon as a local description exists.
struct InstantFacade;

impl RtcFacade for InstantFacade {
    fn create_peer_connection(&self, _config: &RtcConfig) -> Result<Arc<dyn PeerConnection>> {
        Ok(Arc::new(InstantPeer::default()))
    }
}

#[derive(Default)]
struct InstantPeer {
    handler: Mutex<Option<PeerEventHandler>>,
}

impl InstantPeer {
    fn emit(&self, event: PeerEvent) {
        if let Some(handler) = self.handler.lock().as_ref() {
            handler(event);
        }
    }
}

#[async_trait]
impl PeerConnection for InstantPeer {
    fn set_event_handler(&self, handler: PeerEventHandler) {
        *self.handler.lock() = Some(handler);
    }

    async fn create_offer(&self) -> Result<SessionDescription> {
        self.emit(PeerEvent::StateChanged(PeerState::Connected));
        Ok(SessionDescription::offer("v=0"))
    }

    async fn create_answer(&self) -> Result<SessionDescription> {
        self.emit(PeerEvent::StateChanged(PeerState::Connected));
        Ok(SessionDescription::answer("v=0"))
    }

    async fn set_remote_description(&self, _description: SessionDescription) -> Result<()> {
        Ok(())
    }

    async fn add_ice_candidate(&self, _candidate: IceCandidate) -> Result<()> {
        Ok(())
    }

    async fn create_data_channel(&self, label: &str) -> Result<Arc<dyn DataChannel>> {
        Ok(Arc::new(NullDataChannel(label.to_string())))
    }

    async fn close(&self) -> Result<()> {
        self.emit(PeerEvent::StateChanged(PeerState::Closed));
        Ok(())
    }
}

struct NullDataChannel(String);

#[async_trait]
impl DataChannel for NullDataChannel {
    fn label(&self) -> &str {
        &self.0
    }

    async fn send(&self, _data: &[u8]) -> Result<()> {
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }
}

fn manager() -> ResourceManager {
    ResourceManager::builder()
        .channel(SinkChannel)
        .rtc_facade(InstantFacade)
        .connection_ttl(Duration::from_millis(50))
        .merge_policy(MergePolicy::CallerOverrides)
        .build()
        .expect("benchmark manager")
}

fn frame(signal: &Signal) -> Vec<u8> {
    encode_signal(signal).expect("benchmark frame")
}

// ============================================================================
// Benchmark: Frame Dispatch
// ============================================================================

fn bench_dispatch(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let manager = rt.block_on(async {
        let manager = manager();
        manager.connect_to("p0").await.expect("seed connection");
        manager
    });

    let none = br#"{"kind":"none"}"#.to_vec();
    let candidate = frame(&Signal::Candidate {
        peer_id: "p0".into(),
        candidate: IceCandidate::new("candidate:0 1 udp 1 10.0.0.1 9 typ host"),
    });

    let mut group = c.benchmark_group("dispatch");

    group.bench_function("none", |b| {
        b.iter(|| manager.response(&none, CHANNEL_ID).unwrap());
    });

    group.bench_function("candidate", |b| {
        b.iter(|| manager.response(&candidate, CHANNEL_ID).unwrap());
    });

    group.finish();
}

// ============================================================================
// Benchmark: Connection Pool
// ============================================================================

fn bench_join(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let manager = rt.block_on(async {
        let manager = manager();
        manager.connect_to("p0").await.expect("seed connection");
        manager
    });

    c.bench_function("connect/join_open", |b| {
        b.to_async(&rt).iter(|| async {
            manager.connect_to("p0").await.unwrap();
            manager.close("p0").unwrap();
        });
    });
}

fn bench_fresh(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let manager = rt.block_on(async { manager() });

    let mut group = c.benchmark_group("connect_fresh");

    for &count in FAN_OUTS {
        group.bench_with_input(BenchmarkId::new("peers", count), &count, |b, &n| {
            b.to_async(&rt).iter(|| async {
                let peers: Vec<PeerId> = (0..n).map(|_| PeerId::generate()).collect();
                let opens = peers.iter().map(|peer| manager.connect_to(peer.clone()));
                for result in futures_util::future::join_all(opens).await {
                    result.unwrap();
                }
                for peer in &peers {
                    manager.close(peer.as_str()).unwrap();
                }
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_dispatch, bench_join, bench_fresh);
criterion_main!(benches);
