//! Per-run check configuration.
//!
//! A [`CheckConfig`] is immutable for the duration of one run.  Its
//! [`CheckRange`] is resolved against the motion into a concrete, clamped
//! [`FrameRange`] before replay starts.

use std::collections::BTreeSet;
use std::fmt;
use std::ops::RangeInclusive;

use kinfault_types::FaultError;
use serde::{Deserialize, Serialize};

// ────────────────────────────────────────────────────────────────────────────
// LinkSelection
// ────────────────────────────────────────────────────────────────────────────

/// Which links' joints take part in the position and velocity checks.
///
/// Collision checking always covers the whole body.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", content = "links", rename_all = "snake_case")]
pub enum LinkSelection {
    #[default]
    All,
    /// Only the listed link indices.
    Only(BTreeSet<usize>),
    /// Every link except the listed indices.
    Except(BTreeSet<usize>),
}

impl LinkSelection {
    pub fn contains(&self, link: usize) -> bool {
        match self {
            LinkSelection::All => true,
            LinkSelection::Only(set) => set.contains(&link),
            LinkSelection::Except(set) => !set.contains(&link),
        }
    }

    /// Boolean mask indexed by link index.
    pub fn mask(&self, num_links: usize) -> Vec<bool> {
        (0..num_links).map(|i| self.contains(i)).collect()
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Frame ranges
// ────────────────────────────────────────────────────────────────────────────

/// A non-empty inclusive range of frame indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameRange {
    pub begin: usize,
    pub end: usize,
}

impl FrameRange {
    /// Returns `None` when `end < begin`.
    pub fn new(begin: usize, end: usize) -> Option<Self> {
        (begin <= end).then_some(Self { begin, end })
    }

    pub fn iter(&self) -> RangeInclusive<usize> {
        self.begin..=self.end
    }

    /// Neighbouring frames used by the finite-difference velocity estimate,
    /// clamped to the range.
    pub fn neighbours(&self, frame: usize) -> (usize, usize) {
        let prev = if frame <= self.begin { self.begin } else { frame - 1 };
        let next = if frame >= self.end { self.end } else { frame + 1 };
        (prev, next)
    }
}

impl fmt::Display for FrameRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.begin, self.end)
    }
}

/// The part of the motion to replay.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "unit", rename_all = "snake_case")]
pub enum CheckRange {
    /// Every frame of the motion.
    #[default]
    Whole,
    /// Inclusive frame indices; `end` is clamped to the last frame.
    Frames { begin: usize, end: usize },
    /// Inclusive times in seconds.  `begin` is floored and `end` rounded to
    /// the nearest frame.
    Seconds { begin: f64, end: f64 },
}

impl CheckRange {
    /// Clamp this range to a motion of `num_frames` frames.
    ///
    /// Returns `None` when nothing is left to check: the motion is empty or
    /// the clamped range is inverted.
    pub fn resolve(&self, num_frames: usize, frame_rate: f64) -> Option<FrameRange> {
        let last = num_frames.checked_sub(1)?;
        match *self {
            CheckRange::Whole => FrameRange::new(0, last),
            CheckRange::Frames { begin, end } => FrameRange::new(begin, end.min(last)),
            CheckRange::Seconds { begin, end } => {
                let end = (end * frame_rate).round();
                if end.is_nan() || end < 0.0 {
                    return None;
                }
                // `as` saturates, so huge times clamp to usize::MAX first.
                let begin = (begin * frame_rate).floor().max(0.0) as usize;
                FrameRange::new(begin, (end as usize).min(last))
            }
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// CheckConfig
// ────────────────────────────────────────────────────────────────────────────

/// Options for one fault-check run.
///
/// # Example
///
/// ```rust
/// use kinfault_kernel::config::{CheckConfig, CheckRange};
///
/// let config = CheckConfig::default()
///     .with_checks(true, true, false)
///     .with_angle_margin(1.0_f64.to_radians())
///     .with_velocity_limit_ratio(0.8)
///     .with_range(CheckRange::Seconds { begin: 1.0, end: 2.5 });
/// assert!(config.validate().is_ok());
/// assert!(config.any_check_enabled());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckConfig {
    pub check_position: bool,
    pub check_velocity: bool,
    pub check_collision: bool,
    pub link_selection: LinkSelection,
    /// Radians subtracted from revolute limits; negative widens the range.
    pub angle_margin: f64,
    /// Meters subtracted from prismatic limits; negative widens the range.
    pub translation_margin: f64,
    /// Fraction of the velocity limits that is allowed, in `(0, 1]`.
    pub velocity_limit_ratio: f64,
    pub range: CheckRange,
}

impl Default for CheckConfig {
    fn default() -> Self {
        Self {
            check_position: true,
            check_velocity: true,
            check_collision: true,
            link_selection: LinkSelection::All,
            angle_margin: 0.0,
            translation_margin: 0.0,
            velocity_limit_ratio: 1.0,
            range: CheckRange::Whole,
        }
    }
}

impl CheckConfig {
    pub fn with_checks(mut self, position: bool, velocity: bool, collision: bool) -> Self {
        self.check_position = position;
        self.check_velocity = velocity;
        self.check_collision = collision;
        self
    }

    pub fn with_link_selection(mut self, selection: LinkSelection) -> Self {
        self.link_selection = selection;
        self
    }

    pub fn with_angle_margin(mut self, radians: f64) -> Self {
        self.angle_margin = radians;
        self
    }

    pub fn with_translation_margin(mut self, meters: f64) -> Self {
        self.translation_margin = meters;
        self
    }

    pub fn with_velocity_limit_ratio(mut self, ratio: f64) -> Self {
        self.velocity_limit_ratio = ratio;
        self
    }

    pub fn with_range(mut self, range: CheckRange) -> Self {
        self.range = range;
        self
    }

    pub fn any_check_enabled(&self) -> bool {
        self.check_position || self.check_velocity || self.check_collision
    }

    /// Reject values that make the limit arithmetic meaningless.
    ///
    /// # Errors
    ///
    /// Returns [`FaultError::InvalidConfig`] for non-finite margins, a
    /// velocity ratio outside `(0, 1]`, or non-finite range times.
    pub fn validate(&self) -> Result<(), FaultError> {
        if !self.angle_margin.is_finite() {
            return Err(FaultError::InvalidConfig(format!(
                "angle margin must be finite, got {}",
                self.angle_margin
            )));
        }
        if !self.translation_margin.is_finite() {
            return Err(FaultError::InvalidConfig(format!(
                "translation margin must be finite, got {}",
                self.translation_margin
            )));
        }
        if !(self.velocity_limit_ratio > 0.0 && self.velocity_limit_ratio <= 1.0) {
            return Err(FaultError::InvalidConfig(format!(
                "velocity limit ratio must be in (0, 1], got {}",
                self.velocity_limit_ratio
            )));
        }
        if let CheckRange::Seconds { begin, end } = self.range
            && !(begin.is_finite() && end.is_finite())
        {
            return Err(FaultError::InvalidConfig(format!(
                "time range must be finite, got [{begin}, {end}]"
            )));
        }
        Ok(())
    }
}
