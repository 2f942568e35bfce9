use crate::error::SimulationError;
use crate::shared_data::{AdmissionRecord, TunnelEvent};
use std::collections::BTreeMap;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use tokio::sync::mpsc::UnboundedReceiver;

/// Totals gathered by the monitor over one run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MonitorSummary {
    pub admissions: u64,
    pub flips: u64,
    pub admissions_per_vehicle: BTreeMap<u32, u64>,
}

/// Appends admission records to a CSV file.
pub struct TraceWriter {
    path: PathBuf,
    writer: csv::Writer<File>,
}

impl TraceWriter {
    /// Opens `path` for appending; the header is written only for a new file.
    pub fn open(path: &Path) -> Result<Self, SimulationError> {
        let file_exists = path.exists();
        let file = OpenOptions::new()
            .append(true)
            .create(true)
            .open(path)
            .map_err(|e| SimulationError::Trace {
                path: path.to_path_buf(),
                source: e.into(),
            })?;
        let writer = csv::WriterBuilder::new()
            .has_headers(!file_exists)
            .from_writer(file);
        Ok(Self {
            path: path.to_path_buf(),
            writer,
        })
    }

    pub fn log(&mut self, record: &AdmissionRecord) -> Result<(), csv::Error> {
        self.writer.serialize(record)?;
        self.writer.flush()?;
        Ok(())
    }
}

/// Prints the human-readable event log and keeps the run totals.
pub struct EventMonitor {
    trace: Option<TraceWriter>,
    summary: MonitorSummary,
}

impl EventMonitor {
    pub fn new(trace_path: Option<&Path>) -> Result<Self, SimulationError> {
        let trace = trace_path.map(TraceWriter::open).transpose()?;
        Ok(Self {
            trace,
            summary: MonitorSummary::default(),
        })
    }

    /// Consumes events until every sender is gone, then returns the totals.
    pub async fn run(mut self, mut events: UnboundedReceiver<TunnelEvent>) -> MonitorSummary {
        while let Some(event) = events.recv().await {
            self.record(&event);
        }
        self.summary
    }

    /// The console line for `event`, if it has one.
    pub fn line(event: &TunnelEvent) -> Option<String> {
        match event {
            TunnelEvent::VehicleReady { vehicle_id } => {
                Some(format!("Car {:02} ready", vehicle_id))
            }
            TunnelEvent::Admitted(record) => Some(format!(
                "Car {:02} passing {} (total in tunnel: {})",
                record.vehicle_id,
                record.direction.description(),
                record.batch_position
            )),
            TunnelEvent::Exited { .. } | TunnelEvent::VehicleDone { .. } => None,
        }
    }

    /// Lines printed once before any car is ready.
    pub fn startup_lines(total_cars: u32, lefts: u32) -> [String; 2] {
        [
            format!("Total cars: {}", total_cars),
            format!("lefts: {}", lefts),
        ]
    }

    pub fn record(&mut self, event: &TunnelEvent) {
        if let Some(line) = Self::line(event) {
            println!("{}", line);
        }
        match event {
            TunnelEvent::VehicleReady { .. } => {}
            TunnelEvent::Admitted(record) => {
                self.summary.admissions += 1;
                *self
                    .summary
                    .admissions_per_vehicle
                    .entry(record.vehicle_id)
                    .or_insert(0) += 1;
                if record.last_in_batch {
                    self.summary.flips += 1;
                    log::info!(
                        "Car {:02} closes the batch, tunnel now runs {}",
                        record.vehicle_id,
                        record.direction.opposite().description()
                    );
                }
                if let Some(trace) = self.trace.as_mut() {
                    if let Err(e) = trace.log(record) {
                        log::warn!("Error writing trace to {}: {}", trace.path.display(), e);
                    }
                }
            }
            TunnelEvent::Exited {
                elapsed_ms,
                vehicle_id,
                direction,
            } => {
                log::debug!(
                    "Car {:02} left the tunnel {} at {} ms",
                    vehicle_id,
                    direction.description(),
                    elapsed_ms
                );
            }
            TunnelEvent::VehicleDone {
                vehicle_id,
                crossings,
            } => {
                log::info!("Car {:02} parked after {} crossings", vehicle_id, crossings);
            }
        }
    }

    pub fn summary(&self) -> &MonitorSummary {
        &self.summary
    }
}
