// src/shared_data.rs

use crate::simulation_engine::tunnel::FlowDirection;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;

/// One admission decision, as reported by the admitted vehicle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdmissionRecord {
    pub elapsed_ms: u64,
    pub vehicle_id: u32,
    pub direction: FlowDirection,
    /// Running count of vehicles admitted in the current batch.
    pub batch_position: u32,
    pub last_in_batch: bool,
}

/// Events emitted by vehicle workers, consumed by the monitor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TunnelEvent {
    VehicleReady {
        vehicle_id: u32,
    },
    Admitted(AdmissionRecord),
    Exited {
        elapsed_ms: u64,
        vehicle_id: u32,
        direction: FlowDirection,
    },
    VehicleDone {
        vehicle_id: u32,
        crossings: u64,
    },
}

/// Milliseconds since `start`, on tokio's clock so paused-time tests are exact.
pub fn elapsed_ms(start: Instant) -> u64 {
    start.elapsed().as_millis() as u64
}
