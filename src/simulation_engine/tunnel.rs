use crate::error::TunnelError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::pin::Pin;
use std::sync::Arc;
use tokio::sync::futures::Notified;
use tokio::sync::{Mutex, Notify, OwnedMutexGuard};

/// The two traffic orientations the tunnel can admit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FlowDirection {
    FlowLeft,
    FlowRight,
}

impl FlowDirection {
    pub fn opposite(self) -> Self {
        match self {
            FlowDirection::FlowLeft => FlowDirection::FlowRight,
            FlowDirection::FlowRight => FlowDirection::FlowLeft,
        }
    }

    /// Human readable description used in the event log.
    pub fn description(self) -> &'static str {
        match self {
            FlowDirection::FlowLeft => "from right to left <----",
            FlowDirection::FlowRight => "from left to right ---->",
        }
    }
}

impl fmt::Display for FlowDirection {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            FlowDirection::FlowLeft => write!(f, "FlowLeft"),
            FlowDirection::FlowRight => write!(f, "FlowRight"),
        }
    }
}

/// Which direction the tunnel currently admits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TunnelStatus {
    /// Initial state only. Nothing is admitted until the tunnel is opened.
    Closed,
    Open(FlowDirection),
}

/// Outcome of a single admission decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Rejected,
    /// Admitted at `position` (1-based) with room left in the batch.
    Continuing { position: u32 },
    /// Admitted as the batch's final entrant; the direction has flipped.
    Last { position: u32 },
}

/// Mutable tunnel state. Only ever touched while holding the tunnel lock.
#[derive(Debug, Clone)]
pub struct TunnelState {
    status: TunnelStatus,
    max_batch: u32,
    admitted_in_batch: u32,
    flips: u64,
}

impl TunnelState {
    pub fn new(max_batch: u32) -> Result<Self, TunnelError> {
        if max_batch == 0 {
            return Err(TunnelError::ZeroBatch);
        }
        Ok(Self {
            status: TunnelStatus::Closed,
            max_batch,
            admitted_in_batch: 0,
            flips: 0,
        })
    }

    pub fn open(&mut self, direction: FlowDirection) -> Result<(), TunnelError> {
        if self.status != TunnelStatus::Closed {
            return Err(TunnelError::AlreadyOpen);
        }
        self.status = TunnelStatus::Open(direction);
        Ok(())
    }

    /// Decides whether a vehicle heading `direction` may enter now.
    ///
    /// A rejection leaves the state untouched. The admission that fills the
    /// batch flips the direction and resets the counter in the same step.
    pub fn decide(&mut self, direction: FlowDirection) -> Decision {
        let current = match self.status {
            TunnelStatus::Open(current) if current == direction => current,
            _ => return Decision::Rejected,
        };

        self.admitted_in_batch += 1;
        let position = self.admitted_in_batch;
        if position < self.max_batch {
            return Decision::Continuing { position };
        }

        self.status = TunnelStatus::Open(current.opposite());
        self.admitted_in_batch = 0;
        self.flips += 1;
        Decision::Last { position }
    }

    pub fn status(&self) -> TunnelStatus {
        self.status
    }

    pub fn admitted_in_batch(&self) -> u32 {
        self.admitted_in_batch
    }

    pub fn max_batch(&self) -> u32 {
        self.max_batch
    }

    pub fn flips(&self) -> u64 {
        self.flips
    }
}

/// Permission to cross, holding the tunnel lock until released or dropped.
#[derive(Debug)]
pub struct AdmissionPermit {
    position: u32,
    _guard: OwnedMutexGuard<TunnelState>,
}

impl AdmissionPermit {
    /// Running count of vehicles admitted in this batch, including this one.
    pub fn position(&self) -> u32 {
        self.position
    }

    /// Releases the tunnel lock.
    pub fn release(self) {}
}

/// Result of [`Tunnel::try_enter`].
pub enum Admission<'a> {
    Continuing(AdmissionPermit),
    Last(AdmissionPermit),
    /// The direction did not match. Resolves on the next direction flip.
    Rejected(Pin<Box<Notified<'a>>>),
}

/// The single-lane tunnel shared by every vehicle worker.
#[derive(Debug)]
pub struct Tunnel {
    length: u32,
    state: Arc<Mutex<TunnelState>>,
    flipped: Notify,
}

impl Tunnel {
    pub fn new(length: u32, max_batch: u32) -> Result<Self, TunnelError> {
        if length == 0 {
            return Err(TunnelError::ZeroLength);
        }
        Ok(Self {
            length,
            state: Arc::new(Mutex::new(TunnelState::new(max_batch)?)),
            flipped: Notify::new(),
        })
    }

    pub fn length(&self) -> u32 {
        self.length
    }

    /// Opens the tunnel in `direction`. Must be called exactly once.
    pub async fn open(&self, direction: FlowDirection) -> Result<(), TunnelError> {
        let mut state = self.state.lock().await;
        state.open(direction)?;
        self.flipped.notify_waiters();
        log::info!("Tunnel opened {}", direction.description());
        Ok(())
    }

    /// The one synchronized decision point of the protocol.
    ///
    /// Admitted vehicles get a permit that still holds the lock. The last
    /// entrant of a batch must keep it for its whole crossing: nobody, in
    /// either direction, is admitted until that vehicle is out, which is what
    /// keeps opposite batches from overlapping. A rejected caller gets a flip
    /// waiter registered before the lock was released, so no flip is missed.
    pub async fn try_enter(&self, direction: FlowDirection) -> Admission<'_> {
        let mut state = Arc::clone(&self.state).lock_owned().await;
        match state.decide(direction) {
            Decision::Rejected => {
                let mut flip = Box::pin(self.flipped.notified());
                flip.as_mut().enable();
                drop(state);
                Admission::Rejected(flip)
            }
            Decision::Continuing { position } => Admission::Continuing(AdmissionPermit {
                position,
                _guard: state,
            }),
            Decision::Last { position } => {
                self.flipped.notify_waiters();
                Admission::Last(AdmissionPermit {
                    position,
                    _guard: state,
                })
            }
        }
    }

    /// Snapshot of the current state. Waits while a last entrant is crossing.
    pub async fn state(&self) -> TunnelState {
        self.state.lock().await.clone()
    }
}
