use std::fmt;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Mechanical type of a one-degree-of-freedom joint.
///
/// Only revolute and prismatic joints carry meaningful position limits; every
/// other joint type is skipped by the position check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum JointKind {
    /// Angular joint; positions in radians, velocities in rad/s.
    Revolute,
    /// Linear joint; positions in meters, velocities in m/s.
    Prismatic,
    /// Any other connector (free, spherical, …).
    Other,
}

impl JointKind {
    /// Convert a raw joint value into the unit used for display: degrees for
    /// revolute joints, unchanged otherwise.
    pub fn display_value(self, raw: f64) -> f64 {
        match self {
            JointKind::Revolute => raw.to_degrees(),
            _ => raw,
        }
    }
}

/// One kinematic fault detected while replaying a motion.
///
/// Faults are streamed to a reporter as they are found; the engine itself
/// only keeps a count.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Fault {
    /// A joint position lies beyond its margin-adjusted range.
    Position {
        frame: usize,
        /// Elapsed time in seconds (`frame / frame_rate`).
        time: f64,
        joint_id: usize,
        joint: String,
        joint_kind: JointKind,
        q: f64,
        lower: f64,
        upper: f64,
        margin: f64,
    },
    /// A finite-difference joint velocity lies beyond its scaled limits.
    Velocity {
        frame: usize,
        time: f64,
        joint_id: usize,
        joint: String,
        joint_kind: JointKind,
        dq: f64,
        lower: f64,
        upper: f64,
    },
    /// Two links of the same body overlap.
    Collision {
        frame: usize,
        time: f64,
        links: [usize; 2],
        link_names: [String; 2],
    },
}

impl Fault {
    /// Frame index at which the fault was reported.
    pub fn frame(&self) -> usize {
        match self {
            Fault::Position { frame, .. }
            | Fault::Velocity { frame, .. }
            | Fault::Collision { frame, .. } => *frame,
        }
    }

    /// Elapsed time in seconds at which the fault was reported.
    pub fn time(&self) -> f64 {
        match self {
            Fault::Position { time, .. }
            | Fault::Velocity { time, .. }
            | Fault::Collision { time, .. } => *time,
        }
    }

    /// Short machine-friendly label of the fault category.
    pub fn label(&self) -> &'static str {
        match self {
            Fault::Position { .. } => "position",
            Fault::Velocity { .. } => "velocity",
            Fault::Collision { .. } => "collision",
        }
    }
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Fault::Position {
                time,
                joint,
                joint_kind,
                q,
                lower,
                upper,
                margin,
                ..
            } => {
                let q = joint_kind.display_value(*q);
                let l = joint_kind.display_value(*lower);
                let u = joint_kind.display_value(*upper);
                let m = joint_kind.display_value(*margin);
                if m != 0.0 {
                    write!(
                        f,
                        "{time:7.3} [s]: Position limit over of {joint} ({q} is beyond the range ({l} , {u}) with margin {m}.)"
                    )
                } else {
                    write!(
                        f,
                        "{time:7.3} [s]: Position limit over of {joint} ({q} is beyond the range ({l} , {u}).)"
                    )
                }
            }
            Fault::Velocity {
                time,
                joint,
                joint_kind,
                dq,
                lower,
                upper,
                ..
            } => {
                let dq = joint_kind.display_value(*dq);
                let l = joint_kind.display_value(*lower);
                let u = joint_kind.display_value(*upper);
                let ratio = if dq < 0.0 { dq / l } else { dq / u } * 100.0;
                write!(
                    f,
                    "{time:7.3} [s]: Velocity limit over of {joint} ({dq} is {ratio:.0}% of the range ({l} , {u}).)"
                )
            }
            Fault::Collision {
                time, link_names, ..
            } => write!(
                f,
                "{time:7.3} [s]: Collision between {} and {}",
                link_names[0], link_names[1]
            ),
        }
    }
}

/// Error type shared by every kinfault crate.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FaultError {
    #[error("Invalid body model: {0}")]
    InvalidBody(String),

    #[error("Invalid motion trajectory: {0}")]
    InvalidMotion(String),

    #[error("Invalid check configuration: {0}")]
    InvalidConfig(String),

    #[error("Collision backend error: {0}")]
    Collision(String),
}
