use crate::simulation_engine::tunnel::FlowDirection;
use std::time::Duration;

/// A single car shuttling back and forth through the tunnel.
#[derive(Debug, Clone)]
pub struct Vehicle {
    /// Unique identifier, stable for the vehicle's lifetime.
    pub id: u32,
    /// The direction the vehicle wants to cross next.
    pub direction: FlowDirection,
    /// Tunnel length units covered per time unit.
    pub speed: u32,
    /// Number of times the vehicle has been admitted so far.
    pub crossings: u64,
}

impl Vehicle {
    pub fn new(id: u32, direction: FlowDirection, speed: u32) -> Self {
        Self {
            id,
            direction,
            speed,
            crossings: 0,
        }
    }

    /// How long the vehicle stays inside a tunnel of `length` units.
    pub fn crossing_time(&self, length: u32, time_unit: Duration) -> Duration {
        time_unit.mul_f64(f64::from(length) / f64::from(self.speed))
    }

    /// Called on admission: the vehicle will want to come back the other way.
    pub fn turn_around(&mut self) {
        self.direction = self.direction.opposite();
        self.crossings += 1;
    }
}

/// Builds the fleet: right-bound cars take the first ids, left-bound cars follow.
pub fn create_vehicles(right_count: u32, left_count: u32, speed: u32) -> Vec<Vehicle> {
    let rights = (1..=right_count).map(|id| Vehicle::new(id, FlowDirection::FlowRight, speed));
    let lefts = (right_count + 1..=right_count + left_count)
        .map(|id| Vehicle::new(id, FlowDirection::FlowLeft, speed));
    rights.chain(lefts).collect()
}
