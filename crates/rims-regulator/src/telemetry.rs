//! Per-sample telemetry.
//!
//! Telemetry is advisory: write failures are logged and otherwise ignored so
//! a full disk or a closed pipe never disturbs regulation.

use serde::Serialize;
use std::io::Write;
use std::sync::{Arc, Mutex};
use tracing::warn;

/// One record per controller sample.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TelemetryRecord {
    /// Time since the session started (s, millisecond resolution).
    pub elapsed_s: f64,
    /// Duty in window units (ms).
    pub duty: u64,
    /// Process value (°C).
    pub process_value: f64,
    /// Flow (L/min).
    pub flow_lpm: f64,
    /// Session time still to run (s).
    pub remaining_s: u64,
}

impl TelemetryRecord {
    pub const CSV_HEADER: &'static str = "time,cv,pv,flow,remaining";

    pub fn new(
        elapsed_ms: u64,
        duty: u64,
        process_value: f64,
        flow_lpm: f64,
        remaining_s: u64,
    ) -> Self {
        Self {
            elapsed_s: elapsed_ms as f64 / 1_000.0,
            duty,
            process_value,
            flow_lpm,
            remaining_s,
        }
    }

    pub fn to_csv_line(&self) -> String {
        format!(
            "{:.3},{},{:.15},{:.2},{}",
            self.elapsed_s, self.duty, self.process_value, self.flow_lpm, self.remaining_s
        )
    }
}

/// Destination for telemetry records.
pub trait TelemetrySink {
    fn record(&mut self, record: &TelemetryRecord);
}

impl TelemetrySink for Vec<TelemetryRecord> {
    fn record(&mut self, record: &TelemetryRecord) {
        self.push(record.clone());
    }
}

/// Comma-separated lines with a header, the classic serial-log format.
#[derive(Debug)]
pub struct CsvTelemetry<W: Write> {
    writer: W,
    header_written: bool,
}

impl<W: Write> CsvTelemetry<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            header_written: false,
        }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> TelemetrySink for CsvTelemetry<W> {
    fn record(&mut self, record: &TelemetryRecord) {
        if !self.header_written {
            if let Err(err) = writeln!(self.writer, "{}", TelemetryRecord::CSV_HEADER) {
                warn!(%err, "telemetry header write failed");
                return;
            }
            self.header_written = true;
        }
        if let Err(err) = writeln!(self.writer, "{}", record.to_csv_line()) {
            warn!(%err, "telemetry write failed");
        }
    }
}

/// One JSON object per line.
#[derive(Debug)]
pub struct JsonLinesTelemetry<W: Write> {
    writer: W,
}

impl<W: Write> JsonLinesTelemetry<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> TelemetrySink for JsonLinesTelemetry<W> {
    fn record(&mut self, record: &TelemetryRecord) {
        let result = serde_json::to_writer(&mut self.writer, record)
            .map_err(std::io::Error::from)
            .and_then(|()| self.writer.write_all(b"\n"));
        if let Err(err) = result {
            warn!(%err, "telemetry write failed");
        }
    }
}

/// In-memory sink whose clones share one buffer.
///
/// Hand one clone to the regulator and keep another to read the records.
#[derive(Debug, Clone, Default)]
pub struct TelemetryBuffer {
    records: Arc<Mutex<Vec<TelemetryRecord>>>,
}

impl TelemetryBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<TelemetryRecord> {
        match self.records.lock() {
            Ok(records) => records.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn len(&self) -> usize {
        match self.records.lock() {
            Ok(records) => records.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl TelemetrySink for TelemetryBuffer {
    fn record(&mut self, record: &TelemetryRecord) {
        match self.records.lock() {
            Ok(mut records) => records.push(record.clone()),
            Err(poisoned) => poisoned.into_inner().push(record.clone()),
        }
    }
}
