//! Buffered status log.
//!
//! Each status update appends one record (time, warnings, supply voltage,
//! the value of every log-enabled device) to a RAM ring.  Records are
//! written out as comma-separated text lines when the ring fills up or a
//! sync is forced.  The column layout is fixed by the first record and
//! announced by a header line before the first write.
//!
//! A failed write leaves every unwritten record in the ring and raises
//! `LogError`; the oldest records are dropped if the ring overflows before
//! the medium comes back.

use core::fmt::{self, Write};

use heapless::{Deque, String, Vec};
use log::{info, warn};

use crate::actuators::ACTUATOR_FAULT;
use crate::app::ports::LogWriter;
use crate::calendar::{Timestamp, seconds_to_date, seconds_to_time};
use crate::config::{MAX_LOG_BUFFER_LINES, SystemConfig};
use crate::error::{Error, Result};
use crate::sensors::BAD_VALUE;
use crate::warnings::{Warning, Warnings};

/// Maximum device columns per record.
pub const MAX_LOG_COLUMNS: usize = 24;

/// Longest device name in the header; longer names are cut.
pub const MAX_LOG_NAME_LEN: usize = 16;

const HEADER_PREFIX: &str = "TIME, WARN, VCC";
/// `YYYY-MM-DD hh:mm:ss, 0xWW, 65535`
const RECORD_PREFIX_WIDTH: usize = 32;
/// `, S:<name>.255`
const HEADER_COLUMN_WIDTH: usize = 4 + MAX_LOG_NAME_LEN + 4;
/// `, -2147483648`
const VALUE_COLUMN_WIDTH: usize = 13;

const _: () = assert!(RECORD_PREFIX_WIDTH >= HEADER_PREFIX.len() && HEADER_COLUMN_WIDTH >= VALUE_COLUMN_WIDTH);

/// Capacity of one formatted line: fits the widest header and record.
pub const LINE_CAPACITY: usize = RECORD_PREFIX_WIDTH + MAX_LOG_COLUMNS * HEADER_COLUMN_WIDTH;

const RING_CAPACITY: usize = MAX_LOG_BUFFER_LINES as usize;

pub type LogLine = String<LINE_CAPACITY>;

/// Registry a log column comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceKind {
    Sensor,
    Controller,
    Actuator,
}

impl DeviceKind {
    const fn tag(self) -> char {
        match self {
            Self::Sensor => 'S',
            Self::Controller => 'C',
            Self::Actuator => 'A',
        }
    }
}

/// One value yielded by a registry's log enumerator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogEntry {
    pub kind: DeviceKind,
    pub name: &'static str,
    /// Non-zero only for the extra values of multi-value sensors.
    pub value_index: u8,
    pub value: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Column {
    kind: DeviceKind,
    name: &'static str,
    value_index: u8,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRecord {
    pub time: Timestamp,
    pub warnings: Warnings,
    pub vcc_mv: u16,
    pub values: Vec<i32, MAX_LOG_COLUMNS>,
}

/// Outcome of a flush request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushOutcome {
    Written(usize),
    Empty,
    /// Non-forced flush while the battery is low.
    Skipped,
}

pub struct StatusLogger {
    records: Deque<LogRecord, RING_CAPACITY>,
    capacity: usize,
    columns: Vec<Column, MAX_LOG_COLUMNS>,
    header_written: bool,
    skip_on_low_battery: bool,
    dropped: u32,
}

impl StatusLogger {
    pub fn new(config: &SystemConfig) -> Self {
        Self {
            records: Deque::new(),
            capacity: usize::from(config.log_buffer_lines).clamp(1, RING_CAPACITY),
            columns: Vec::new(),
            header_written: false,
            skip_on_low_battery: config.skip_log_on_low_battery,
            dropped: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.records.len() >= self.capacity
    }

    /// Records lost to overflow since start-up.
    pub fn dropped(&self) -> u32 {
        self.dropped
    }

    /// Buffer one status record.  Returns true when the buffer is full and
    /// should be flushed.
    pub fn append(
        &mut self,
        time: Timestamp,
        warnings: Warnings,
        vcc_mv: u16,
        entries: impl Iterator<Item = LogEntry>,
    ) -> bool {
        let learn_columns = self.columns.is_empty();
        let mut values = Vec::new();
        for entry in entries {
            if learn_columns {
                let col = Column {
                    kind: entry.kind,
                    name: entry.name,
                    value_index: entry.value_index,
                };
                if self.columns.push(col).is_err() {
                    warn!("Log column limit reached, dropping {}", entry.name);
                    continue;
                }
            }
            if values.len() < self.columns.len() {
                // Capacity equals the column limit.
                let _ = values.push(entry.value);
            }
        }

        while self.records.len() >= self.capacity {
            self.records.pop_front();
            self.dropped = self.dropped.saturating_add(1);
            warn!("Log buffer full, dropping oldest record");
        }
        let record = LogRecord {
            time,
            warnings,
            vcc_mv,
            values,
        };
        // Room was made above.
        let _ = self.records.push_back(record);
        self.is_full()
    }

    /// Write buffered records to `writer`.
    ///
    /// Unless `force` is set, nothing is written while the battery is low
    /// (if so configured).  Records are removed only once written.
    pub fn flush(
        &mut self,
        writer: &mut dyn LogWriter,
        warnings: &mut Warnings,
        force: bool,
    ) -> Result<FlushOutcome> {
        if !force && self.skip_on_low_battery && warnings.low_power() {
            info!("Skipping log write, battery low");
            warnings.set(Warning::LogSkipped);
            return Ok(FlushOutcome::Skipped);
        }
        warnings.clear(Warning::LogSkipped);
        if self.records.is_empty() {
            return Ok(FlushOutcome::Empty);
        }

        let mut line = LogLine::new();
        if !self.header_written {
            if self.format_header(&mut line).is_err() {
                return Err(Self::overflow(warnings));
            }
            self.write(writer, warnings, &line)?;
            self.header_written = true;
        }

        let mut written = 0;
        while let Some(record) = self.records.front() {
            line.clear();
            if self.format_record(record, &mut line).is_err() {
                return Err(Self::overflow(warnings));
            }
            self.write(writer, warnings, &line)?;
            self.records.pop_front();
            written += 1;
        }

        if let Err(e) = writer.sync() {
            warn!("Log sync failed: {}", e);
            warnings.set(Warning::LogError);
            return Err(e.into());
        }
        warnings.clear(Warning::LogError);
        info!("Wrote {} log record(s)", written);
        Ok(FlushOutcome::Written(written))
    }

    fn overflow(warnings: &mut Warnings) -> Error {
        warn!("Log line does not fit {} bytes", LINE_CAPACITY);
        warnings.set(Warning::LogError);
        Error::NoMemory
    }

    fn write(&self, writer: &mut dyn LogWriter, warnings: &mut Warnings, line: &str) -> Result<()> {
        writer.write_line(line).map_err(|e| {
            warn!("Log write failed: {}", e);
            warnings.set(Warning::LogError);
            Error::from(e)
        })
    }

    /// `TIME, WARN, VCC, S:Vcc, S:BAT, ..., C:FAN1, A:IRR1`
    pub fn format_header(&self, out: &mut LogLine) -> fmt::Result {
        out.write_str(HEADER_PREFIX)?;
        for col in &self.columns {
            write!(out, ", {}:{}", col.kind.tag(), header_name(col.name))?;
            if col.value_index > 0 {
                write!(out, ".{}", col.value_index)?;
            }
        }
        Ok(())
    }

    /// `2024-05-01 17:00:00, 0x00, 3300, 25, ...`
    pub fn format_record(&self, record: &LogRecord, out: &mut LogLine) -> fmt::Result {
        let d = seconds_to_date(record.time);
        let t = seconds_to_time(record.time);
        write!(
            out,
            "{:04}-{:02}-{:02} {:02}:{:02}:{:02}, 0x{:02X}, {}",
            d.year,
            d.month,
            d.day,
            t.hour,
            t.minute,
            t.second,
            record.warnings.bits(),
            record.vcc_mv
        )?;
        for (col, &value) in self.columns.iter().zip(record.values.iter()) {
            match col.kind {
                DeviceKind::Sensor if value == BAD_VALUE => out.write_str(", ?")?,
                DeviceKind::Actuator if value == i32::from(ACTUATOR_FAULT) => out.write_str(", FAULT")?,
                _ => write!(out, ", {}", value)?,
            }
        }
        Ok(())
    }
}

/// `name` cut to [`MAX_LOG_NAME_LEN`] bytes on a char boundary.
fn header_name(name: &str) -> &str {
    if name.len() <= MAX_LOG_NAME_LEN {
        return name;
    }
    let mut end = MAX_LOG_NAME_LEN;
    while !name.is_char_boundary(end) {
        end -= 1;
    }
    &name[..end]
}
