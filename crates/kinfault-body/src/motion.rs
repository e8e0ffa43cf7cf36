//! Recorded motion trajectories.
//!
//! A [`MotionTrajectory`] is sampled at a fixed frame rate and holds:
//!
//! | Series | Row | Column | Entry |
//! |---|---|---|---|
//! | joint positions | frame | joint id | `f64` (rad or m) |
//! | link poses (optional) | frame | link index | [`Transform3D`] |
//!
//! Both series are stored as a [`MultiSeq`], a dense row-major table
//! addressed by `(frame, part)`.

use kinfault_types::FaultError;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::transform::Transform3D;

// ────────────────────────────────────────────────────────────────────────────
// MultiSeq
// ────────────────────────────────────────────────────────────────────────────

/// Dense `frames × parts` table stored row-major.
#[derive(Debug, Clone, PartialEq)]
pub struct MultiSeq<T> {
    num_parts: usize,
    data: Vec<T>,
}

impl<T: Copy> MultiSeq<T> {
    /// Build a table from one row per frame.
    ///
    /// # Errors
    ///
    /// Returns [`FaultError::InvalidMotion`] if the rows differ in length.
    pub fn from_rows(rows: Vec<Vec<T>>) -> Result<Self, FaultError> {
        let num_parts = rows.first().map_or(0, Vec::len);
        let mut data = Vec::with_capacity(rows.len() * num_parts);
        for (frame, row) in rows.into_iter().enumerate() {
            if row.len() != num_parts {
                return Err(FaultError::InvalidMotion(format!(
                    "frame {frame} has {} columns, expected {num_parts}",
                    row.len()
                )));
            }
            data.extend(row);
        }
        Ok(Self { num_parts, data })
    }

    pub fn num_parts(&self) -> usize {
        self.num_parts
    }

    pub fn num_frames(&self) -> usize {
        if self.num_parts == 0 {
            0
        } else {
            self.data.len() / self.num_parts
        }
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// # Panics
    ///
    /// Panics if `frame` or `part` is out of range.
    pub fn at(&self, frame: usize, part: usize) -> T {
        assert!(part < self.num_parts, "part {part} out of range");
        self.data[frame * self.num_parts + part]
    }
}

// ────────────────────────────────────────────────────────────────────────────
// MotionTrajectory
// ────────────────────────────────────────────────────────────────────────────

/// A time-indexed joint-position series with an optional link-pose series.
#[derive(Debug, Clone, PartialEq)]
pub struct MotionTrajectory {
    frame_rate: f64,
    joint_positions: MultiSeq<f64>,
    link_poses: Option<MultiSeq<Transform3D>>,
}

impl MotionTrajectory {
    /// # Errors
    ///
    /// Returns [`FaultError::InvalidMotion`] when `frame_rate` is not a
    /// positive finite number or when a non-empty link-pose series has a
    /// different frame count from the joint-position series.
    pub fn new(
        frame_rate: f64,
        joint_positions: MultiSeq<f64>,
        link_poses: Option<MultiSeq<Transform3D>>,
    ) -> Result<Self, FaultError> {
        if !frame_rate.is_finite() || frame_rate <= 0.0 {
            return Err(FaultError::InvalidMotion(format!(
                "frame rate must be positive and finite, got {frame_rate}"
            )));
        }
        let link_poses = link_poses.filter(|seq| !seq.is_empty());
        if let Some(seq) = &link_poses
            && seq.num_frames() != joint_positions.num_frames()
        {
            return Err(FaultError::InvalidMotion(format!(
                "link-pose series has {} frames but joint-position series has {}",
                seq.num_frames(),
                joint_positions.num_frames()
            )));
        }
        Ok(Self {
            frame_rate,
            joint_positions,
            link_poses,
        })
    }

    /// Parse a [`MotionDescription`].
    ///
    /// # Errors
    ///
    /// Same as [`MotionTrajectory::new`], plus ragged rows and link poses
    /// whose rotation is zero or not finite.  Non-unit rotations are
    /// rescaled to unit length.
    pub fn from_description(desc: MotionDescription) -> Result<Self, FaultError> {
        let joint_positions = MultiSeq::from_rows(desc.joint_positions)?;
        let link_poses = desc
            .link_poses
            .map(|rows| {
                let rows = rows
                    .into_iter()
                    .enumerate()
                    .map(|(frame, row)| normalize_row(frame, row))
                    .collect::<Result<Vec<_>, FaultError>>()?;
                MultiSeq::from_rows(rows)
            })
            .transpose()?;
        Self::new(desc.frame_rate, joint_positions, link_poses)
    }

    /// Frames per second.
    pub fn frame_rate(&self) -> f64 {
        self.frame_rate
    }

    pub fn num_frames(&self) -> usize {
        self.joint_positions.num_frames()
    }

    /// Length of the motion in seconds.
    pub fn time_length(&self) -> f64 {
        self.num_frames() as f64 / self.frame_rate
    }

    pub fn joint_positions(&self) -> &MultiSeq<f64> {
        &self.joint_positions
    }

    /// `None` when the motion was recorded without link poses.
    pub fn link_poses(&self) -> Option<&MultiSeq<Transform3D>> {
        self.link_poses.as_ref()
    }
}

fn normalize_row(frame: usize, row: Vec<Transform3D>) -> Result<Vec<Transform3D>, FaultError> {
    row.into_iter()
        .enumerate()
        .map(|(link, pose)| {
            pose.normalized().ok_or_else(|| {
                FaultError::InvalidMotion(format!(
                    "frame {frame} has an invalid pose for link {link}"
                ))
            })
        })
        .collect()
}

/// Serializable form of a [`MotionTrajectory`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct MotionDescription {
    /// Frames per second.
    pub frame_rate: f64,
    /// One row per frame, one column per joint id.
    pub joint_positions: Vec<Vec<f64>>,
    /// One row per frame, one column per link index.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link_poses: Option<Vec<Vec<Transform3D>>>,
}
