// simulation.rs
use crate::config::SimulationConfig;
use crate::error::SimulationError;
use crate::monitoring::event_log::{EventMonitor, MonitorSummary};
use crate::shared_data::{elapsed_ms, AdmissionRecord, TunnelEvent};
use crate::simulation_engine::tunnel::{Admission, FlowDirection, Tunnel};
use crate::simulation_engine::vehicles::{create_vehicles, Vehicle};

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{self, UnboundedSender};
use tokio::sync::watch;
use tokio::time::{sleep_until, Instant};

/// Per-run settings every vehicle worker needs.
#[derive(Debug, Clone)]
struct JourneySettings {
    time_unit: Duration,
    max_crossings: Option<u64>,
    start: Instant,
}

/// Resolves once shutdown is requested. Never resolves if the sender is gone.
async fn shutdown_requested(shutdown: &mut watch::Receiver<bool>) {
    let requested = shutdown.wait_for(|stop| *stop).await.is_ok();
    if !requested {
        std::future::pending::<()>().await;
    }
}

/// Runs one vehicle as an independent async task until shutdown or its
/// crossing bound. Returns the vehicle as it ended up.
async fn simulate_vehicle_journey(
    mut vehicle: Vehicle,
    tunnel: Arc<Tunnel>,
    events: UnboundedSender<TunnelEvent>,
    mut shutdown: watch::Receiver<bool>,
    settings: JourneySettings,
) -> Vehicle {
    let _ = events.send(TunnelEvent::VehicleReady {
        vehicle_id: vehicle.id,
    });
    let crossing_time = vehicle.crossing_time(tunnel.length(), settings.time_unit);

    loop {
        let stopping = *shutdown.borrow();
        if stopping {
            break;
        }
        if settings
            .max_crossings
            .is_some_and(|max| vehicle.crossings >= max)
        {
            let _ = events.send(TunnelEvent::VehicleDone {
                vehicle_id: vehicle.id,
                crossings: vehicle.crossings,
            });
            break;
        }

        let direction = vehicle.direction;
        match tunnel.try_enter(direction).await {
            Admission::Rejected(flip) => {
                tokio::select! {
                    _ = flip => {}
                    _ = shutdown_requested(&mut shutdown) => {}
                }
            }
            Admission::Continuing(permit) => {
                report_admission(
                    &events,
                    &vehicle,
                    direction,
                    permit.position(),
                    false,
                    &settings,
                );
                vehicle.turn_around();
                // Deadline fixed while still holding the lock, so it can never
                // fall after the closing car's.
                let exit_at = Instant::now() + crossing_time;
                permit.release();
                sleep_until(exit_at).await;
                report_exit(&events, &vehicle, direction, &settings);
            }
            Admission::Last(permit) => {
                report_admission(
                    &events,
                    &vehicle,
                    direction,
                    permit.position(),
                    true,
                    &settings,
                );
                vehicle.turn_around();
                // The tunnel stays locked until this car is out.
                sleep_until(Instant::now() + crossing_time).await;
                report_exit(&events, &vehicle, direction, &settings);
                drop(permit);
            }
        }
    }
    vehicle
}

fn report_admission(
    events: &UnboundedSender<TunnelEvent>,
    vehicle: &Vehicle,
    direction: FlowDirection,
    batch_position: u32,
    last_in_batch: bool,
    settings: &JourneySettings,
) {
    let _ = events.send(TunnelEvent::Admitted(AdmissionRecord {
        elapsed_ms: elapsed_ms(settings.start),
        vehicle_id: vehicle.id,
        direction,
        batch_position,
        last_in_batch,
    }));
}

fn report_exit(
    events: &UnboundedSender<TunnelEvent>,
    vehicle: &Vehicle,
    direction: FlowDirection,
    settings: &JourneySettings,
) {
    let _ = events.send(TunnelEvent::Exited {
        elapsed_ms: elapsed_ms(settings.start),
        vehicle_id: vehicle.id,
        direction,
    });
}

/// A configured tunnel plus the fleet that will use it.
pub struct Simulation {
    tunnel: Arc<Tunnel>,
    vehicles: Vec<Vehicle>,
    initial_direction: FlowDirection,
    time_unit: Duration,
    max_crossings: Option<u64>,
}

impl Simulation {
    pub fn new(config: &SimulationConfig) -> Result<Self, SimulationError> {
        config.validate()?;
        let tunnel = Tunnel::new(config.tunnel_length, config.batch_quota)?;
        let vehicles =
            create_vehicles(config.right_count, config.left_count, config.vehicle_speed);
        Ok(Self {
            tunnel: Arc::new(tunnel),
            vehicles,
            initial_direction: config.initial_direction,
            time_unit: config.time_unit(),
            max_crossings: config.max_crossings_per_vehicle,
        })
    }

    pub fn tunnel(&self) -> Arc<Tunnel> {
        Arc::clone(&self.tunnel)
    }

    /// Opens the tunnel, runs one worker per vehicle and joins them all.
    ///
    /// Workers run until `shutdown` turns true or they reach their crossing
    /// bound. The event sender is dropped on return, which ends the monitor.
    pub async fn run(
        self,
        events: UnboundedSender<TunnelEvent>,
        shutdown: watch::Receiver<bool>,
    ) -> Result<Vec<Vehicle>, SimulationError> {
        let settings = JourneySettings {
            time_unit: self.time_unit,
            max_crossings: self.max_crossings,
            start: Instant::now(),
        };
        self.tunnel.open(self.initial_direction).await?;

        let handles: Vec<_> = self
            .vehicles
            .into_iter()
            .map(|vehicle| {
                tokio::spawn(simulate_vehicle_journey(
                    vehicle,
                    Arc::clone(&self.tunnel),
                    events.clone(),
                    shutdown.clone(),
                    settings.clone(),
                ))
            })
            .collect();
        drop(events);

        let mut finished = Vec::with_capacity(handles.len());
        for handle in handles {
            finished.push(handle.await?);
        }
        let state = self.tunnel.state().await;
        log::info!(
            "All {} workers stopped after {} direction flips",
            finished.len(),
            state.flips()
        );
        Ok(finished)
    }
}

/// Builds everything from `config`, runs it with the console monitor attached
/// and returns the monitor's totals once every worker has stopped.
pub async fn run_simulation(
    config: SimulationConfig,
    shutdown: watch::Receiver<bool>,
) -> Result<MonitorSummary, SimulationError> {
    let simulation = Simulation::new(&config)?;
    let monitor = EventMonitor::new(config.trace_path.as_deref())?;

    for line in EventMonitor::startup_lines(config.total_vehicles(), config.left_count) {
        println!("{}", line);
    }

    let (tx, rx) = mpsc::unbounded_channel();
    let monitor_task = tokio::spawn(monitor.run(rx));

    simulation.run(tx, shutdown).await?;
    Ok(monitor_task.await?)
}
