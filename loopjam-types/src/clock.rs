//! Clock offset and latency estimates used to keep playback phase-aligned.

use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::PlayerId;

/// Weight given to a new latency sample in the smoothed estimate.
const LATENCY_SMOOTHING: f64 = 0.2;

/// Source of wall-clock time in milliseconds since the Unix epoch.
pub trait Clock {
    fn now_ms(&self) -> f64;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> f64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs_f64() * 1000.0)
            .unwrap_or(0.0)
    }
}

/// A leader clock broadcast as seen by a follower.
#[derive(Debug, Clone, PartialEq)]
pub struct ClockUpdate {
    pub leader: PlayerId,
    pub leader_time: f64,
    pub transport_position: f64,
    pub tempo: f32,
    /// `local_time - leader_time` at receipt.
    pub offset: f64,
}

pub fn clock_offset(local_time: f64, leader_time: f64) -> f64 {
    local_time - leader_time
}

/// Half the measured round trip.
pub fn one_way_latency(now: f64, send_time: f64) -> f64 {
    ((now - send_time) / 2.0).max(0.0)
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LatencyEstimate {
    pub latest: f64,
    pub smoothed: f64,
    pub samples: u32,
}

/// Per-peer latency estimates built from pong replies.
#[derive(Debug, Clone, Default)]
pub struct LatencyTracker {
    peers: HashMap<PlayerId, LatencyEstimate>,
}

impl LatencyTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, peer: &PlayerId, latency: f64) -> LatencyEstimate {
        let estimate = self
            .peers
            .entry(peer.clone())
            .and_modify(|e| {
                e.latest = latency;
                e.smoothed += LATENCY_SMOOTHING * (latency - e.smoothed);
                e.samples += 1;
            })
            .or_insert(LatencyEstimate {
                latest: latency,
                smoothed: latency,
                samples: 1,
            });
        *estimate
    }

    pub fn get(&self, peer: &PlayerId) -> Option<&LatencyEstimate> {
        self.peers.get(peer)
    }

    pub fn forget(&mut self, peer: &PlayerId) {
        self.peers.remove(peer);
    }

    /// Largest smoothed latency across peers, used as a playback safety margin.
    pub fn worst(&self) -> Option<f64> {
        self.peers
            .values()
            .map(|e| e.smoothed)
            .fold(None, |acc, v| Some(acc.map_or(v, |a: f64| a.max(v))))
    }
}
