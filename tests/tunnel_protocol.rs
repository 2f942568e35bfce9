use std::collections::{BTreeSet, HashMap};
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::time::sleep;
use tunnel_sim::config::SimulationConfig;
use tunnel_sim::shared_data::{AdmissionRecord, TunnelEvent};
use tunnel_sim::simulation_engine::simulation::Simulation;
use tunnel_sim::simulation_engine::tunnel::{Admission, FlowDirection, Tunnel, TunnelStatus};

/// Runs the simulation for `duration` of (paused) tokio time, then shuts it
/// down and returns every event the workers emitted.
async fn run_for(config: &SimulationConfig, duration: Duration) -> Vec<TunnelEvent> {
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let (tx, mut rx) = mpsc::unbounded_channel();
    let run = tokio::spawn(Simulation::new(config).unwrap().run(tx, shutdown_rx));

    sleep(duration).await;
    // Bounded runs may already be over, with every receiver gone.
    let _ = shutdown_tx.send(true);
    run.await.unwrap().unwrap();

    let mut events = Vec::new();
    while let Some(event) = rx.recv().await {
        events.push(event);
    }
    events
}

fn admissions(events: &[TunnelEvent]) -> Vec<AdmissionRecord> {
    events
        .iter()
        .filter_map(|event| match event {
            TunnelEvent::Admitted(record) => Some(record.clone()),
            _ => None,
        })
        .collect()
}

struct Crossing {
    vehicle_id: u32,
    direction: FlowDirection,
    start_ms: u64,
    end_ms: u64,
}

/// Pairs every admission with the same vehicle's following exit.
fn crossings(events: &[TunnelEvent]) -> Vec<Crossing> {
    let mut open: HashMap<u32, (FlowDirection, u64)> = HashMap::new();
    let mut done = Vec::new();
    for event in events {
        match event {
            TunnelEvent::Admitted(record) => {
                let previous =
                    open.insert(record.vehicle_id, (record.direction, record.elapsed_ms));
                assert!(previous.is_none(), "car {} admitted twice", record.vehicle_id);
            }
            TunnelEvent::Exited {
                elapsed_ms,
                vehicle_id,
                direction,
            } => {
                let (entered, start_ms) = open
                    .remove(vehicle_id)
                    .expect("exit without admission");
                assert_eq!(entered, *direction);
                done.push(Crossing {
                    vehicle_id: *vehicle_id,
                    direction: *direction,
                    start_ms,
                    end_ms: *elapsed_ms,
                });
            }
            _ => {}
        }
    }
    assert!(open.is_empty(), "every crossing finishes before shutdown");
    done
}

fn reference_config() -> SimulationConfig {
    SimulationConfig {
        tunnel_length: 4,
        batch_quota: 4,
        vehicle_speed: 1,
        right_count: 10,
        left_count: 10,
        initial_direction: FlowDirection::FlowRight,
        ..SimulationConfig::default()
    }
}

#[tokio::test(start_paused = true)]
async fn first_batch_goes_right_then_flips_left() {
    let events = run_for(&reference_config(), Duration::from_secs(60)).await;
    let admitted = admissions(&events);
    assert!(admitted.len() > 8);

    for (i, record) in admitted[..4].iter().enumerate() {
        assert_eq!(record.direction, FlowDirection::FlowRight);
        assert_eq!(record.batch_position, i as u32 + 1);
        assert_eq!(record.last_in_batch, i == 3);
        assert!(record.vehicle_id <= 10);
    }

    let fifth = &admitted[4];
    assert_eq!(fifth.direction, FlowDirection::FlowLeft);
    assert_eq!(fifth.batch_position, 1);
    // The closing car held the tunnel for its whole crossing.
    assert!(fifth.elapsed_ms >= admitted[3].elapsed_ms + 4000);
}

#[tokio::test(start_paused = true)]
async fn batches_are_exactly_the_quota_and_alternate() {
    for quota in [1, 2, 4, 7] {
        let config = SimulationConfig {
            batch_quota: quota,
            ..reference_config()
        };
        let admitted = admissions(&run_for(&config, Duration::from_secs(120)).await);

        let mut direction = FlowDirection::FlowRight;
        let mut position = 0;
        for record in &admitted {
            position += 1;
            assert_eq!(record.direction, direction, "quota {}", quota);
            assert_eq!(record.batch_position, position, "quota {}", quota);
            assert_eq!(record.last_in_batch, position == quota, "quota {}", quota);
            if record.last_in_batch {
                direction = direction.opposite();
                position = 0;
            }
        }
    }
}

#[tokio::test(start_paused = true)]
async fn quota_of_one_ping_pongs() {
    let config = SimulationConfig {
        batch_quota: 1,
        ..reference_config()
    };
    let admitted = admissions(&run_for(&config, Duration::from_secs(80)).await);
    assert!(admitted.len() >= 10);

    assert!(admitted.iter().all(|r| r.last_in_batch && r.batch_position == 1));
    for pair in admitted.windows(2) {
        assert_eq!(pair[1].direction, pair[0].direction.opposite());
    }
}

#[tokio::test(start_paused = true)]
async fn opposite_directions_never_share_the_tunnel() {
    let events = run_for(&reference_config(), Duration::from_secs(200)).await;
    let all = crossings(&events);
    assert!(!all.is_empty());

    for a in &all {
        for b in all.iter().filter(|b| b.direction != a.direction) {
            assert!(
                a.end_ms <= b.start_ms || b.end_ms <= a.start_ms,
                "car {} ({}) and car {} ({}) overlap",
                a.vehicle_id,
                a.direction,
                b.vehicle_id,
                b.direction
            );
        }
    }
}

#[tokio::test(start_paused = true)]
async fn same_direction_cars_cross_together() {
    let events = run_for(&reference_config(), Duration::from_secs(30)).await;
    let all = crossings(&events);

    // The first three right-bound cars are all inside while the fourth enters.
    let first_batch: Vec<&Crossing> = all.iter().filter(|c| c.start_ms == 0).collect();
    assert_eq!(first_batch.len(), 4);
    assert!(first_batch.iter().all(|c| c.end_ms == 4000));
}

#[tokio::test(start_paused = true)]
async fn every_car_gets_through() {
    let config = reference_config();
    let admitted = admissions(&run_for(&config, Duration::from_secs(200)).await);

    let seen: BTreeSet<u32> = admitted.iter().map(|r| r.vehicle_id).collect();
    let expected: BTreeSet<u32> = (1..=config.total_vehicles()).collect();
    assert_eq!(seen, expected);
}

#[tokio::test(start_paused = true)]
async fn left_opening_admits_left_cars_first() {
    let config = SimulationConfig {
        initial_direction: FlowDirection::FlowLeft,
        ..reference_config()
    };
    let admitted = admissions(&run_for(&config, Duration::from_secs(20)).await);

    assert!(admitted[..4]
        .iter()
        .all(|r| r.direction == FlowDirection::FlowLeft && r.vehicle_id > 10));
}

#[tokio::test(start_paused = true)]
async fn balanced_bounded_run_parks_every_car_after_its_quota() {
    let config = SimulationConfig {
        max_crossings_per_vehicle: Some(2),
        ..reference_config()
    };
    let events = run_for(&config, Duration::from_secs(300)).await;

    let mut per_vehicle: HashMap<u32, u64> = HashMap::new();
    for record in admissions(&events) {
        *per_vehicle.entry(record.vehicle_id).or_insert(0) += 1;
    }
    assert_eq!(per_vehicle.len(), 20);
    assert!(per_vehicle.values().all(|&n| n == 2));

    let parked = events
        .iter()
        .filter(|e| matches!(e, TunnelEvent::VehicleDone { crossings: 2, .. }))
        .count();
    assert_eq!(parked, 20);
}

#[tokio::test]
async fn rejection_leaves_state_untouched() {
    let tunnel = Tunnel::new(4, 4).unwrap();
    tunnel.open(FlowDirection::FlowRight).await.unwrap();
    if let Admission::Continuing(permit) = tunnel.try_enter(FlowDirection::FlowRight).await {
        permit.release();
    }

    let before = tunnel.state().await;
    for _ in 0..5 {
        assert!(matches!(
            tunnel.try_enter(FlowDirection::FlowLeft).await,
            Admission::Rejected(_)
        ));
    }
    let after = tunnel.state().await;

    assert_eq!(before.status(), after.status());
    assert_eq!(after.status(), TunnelStatus::Open(FlowDirection::FlowRight));
    assert_eq!(before.admitted_in_batch(), after.admitted_in_batch());
    assert_eq!(before.flips(), after.flips());
}
