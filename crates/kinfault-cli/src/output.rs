//! Run output: the closing summary line and the `--json` run records.

use std::io::{self, Write};

use chrono::{DateTime, Utc};
use colored::Colorize;
use kinfault_kernel::{CheckReport, FrameRange};
use kinfault_types::Fault;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Machine-readable result of checking one motion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    pub id: Uuid,
    pub started_at: DateTime<Utc>,
    pub body: String,
    /// The motion file as given on the command line.
    pub motion: String,
    pub frame_range: Option<FrameRange>,
    pub frames_checked: usize,
    pub fault_count: usize,
    pub cancelled: bool,
    pub collision_checked: bool,
    pub faults: Vec<Fault>,
}

impl RunRecord {
    pub fn new(
        body: &str,
        motion: &str,
        started_at: DateTime<Utc>,
        report: &CheckReport,
        faults: Vec<Fault>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            started_at,
            body: body.to_string(),
            motion: motion.to_string(),
            frame_range: report.frame_range,
            frames_checked: report.frames_checked,
            fault_count: report.fault_count,
            cancelled: report.cancelled,
            collision_checked: report.collision_checked,
            faults,
        }
    }
}

/// The closing sentence of a run.
pub fn summary(fault_count: usize) -> String {
    match fault_count {
        0 => "No faults have been detected.".to_string(),
        1 => "A fault has been detected.".to_string(),
        n => format!("{n} faults have been detected."),
    }
}

/// Print the closing lines of a text-mode run.
pub fn write_summary<W: Write>(
    out: &mut W,
    report: &CheckReport,
    collision_requested: bool,
) -> io::Result<()> {
    if report.cancelled {
        writeln!(
            out,
            "{}",
            format!("Check cancelled after {} frame(s).", report.frames_checked).yellow()
        )?;
    }
    if collision_requested && report.frame_range.is_some() && !report.collision_checked {
        writeln!(
            out,
            "{}",
            "Self-collision check skipped: the collision backend could not be prepared.".yellow()
        )?;
    }
    let line = summary(report.fault_count);
    if report.fault_count == 0 {
        writeln!(out, "{}", line.green().bold())
    } else {
        writeln!(out, "{}", line.red().bold())
    }
}
