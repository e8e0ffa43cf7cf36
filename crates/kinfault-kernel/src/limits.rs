//! Joint limit rules and the [`LimitVerifier`] that debounces them.
//!
//! Every frame, each eligible joint is packed into a [`JointSample`] and
//! handed to every registered [`JointRule`].  A rule returns the [`Fault`]
//! it sees, if any; the verifier then decides through a per-rule
//! [`OnsetTracker`] whether that fault starts a new episode and must be
//! reported.
//!
//! Two built-in rules are provided:
//! - [`PositionLimitRule`] – `q` beyond the margin-adjusted position range.
//! - [`VelocityLimitRule`] – `dq` beyond the ratio-scaled velocity range.

use kinfault_body::Joint;
use kinfault_types::{Fault, JointKind};
use tracing::trace;

use crate::debounce::OnsetTracker;
use crate::reporter::FaultReporter;

/// Central-difference velocity estimate between two neighbouring samples.
///
/// The divisor is always two frame periods, including at range edges where
/// `q_prev` or `q_next` is the current frame itself.
pub fn central_difference(q_prev: f64, q_next: f64, frame_rate: f64) -> f64 {
    (q_next - q_prev) / (2.0 / frame_rate)
}

/// One joint at one frame.
#[derive(Debug, Clone, Copy)]
pub struct JointSample<'a> {
    pub frame: usize,
    /// Elapsed seconds.
    pub time: f64,
    pub joint: &'a Joint,
    pub q: f64,
    /// Present only when velocities are being checked.
    pub dq: Option<f64>,
}

// ────────────────────────────────────────────────────────────────────────────
// Rule trait
// ────────────────────────────────────────────────────────────────────────────

/// A per-joint invariant evaluated on every replayed frame.
pub trait JointRule {
    /// Human-readable name used in log messages.
    fn name(&self) -> &str;

    /// Return the fault when `sample` violates the invariant.
    fn evaluate(&self, sample: &JointSample<'_>) -> Option<Fault>;
}

// ────────────────────────────────────────────────────────────────────────────
// Built-in rules
// ────────────────────────────────────────────────────────────────────────────

/// Flags revolute and prismatic joints whose position leaves
/// `(q_lower + margin, q_upper - margin)`.  Bounds are exclusive: a value
/// equal to an adjusted bound passes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PositionLimitRule {
    /// Radians, applied to revolute joints.
    pub angle_margin: f64,
    /// Meters, applied to prismatic joints.
    pub translation_margin: f64,
}

impl JointRule for PositionLimitRule {
    fn name(&self) -> &str {
        "position_limit"
    }

    fn evaluate(&self, sample: &JointSample<'_>) -> Option<Fault> {
        let joint = sample.joint;
        let margin = match joint.kind() {
            JointKind::Revolute => self.angle_margin,
            JointKind::Prismatic => self.translation_margin,
            JointKind::Other => return None,
        };
        let q = sample.q;
        if q > joint.q_upper() - margin || q < joint.q_lower() + margin {
            Some(Fault::Position {
                frame: sample.frame,
                time: sample.time,
                joint_id: joint.id(),
                joint: joint.name().to_string(),
                joint_kind: joint.kind(),
                q,
                lower: joint.q_lower(),
                upper: joint.q_upper(),
                margin,
            })
        } else {
            None
        }
    }
}

/// Flags joints whose estimated velocity exceeds `ratio × dq_upper` or falls
/// below `ratio × dq_lower`.  Faults carry the unscaled limits.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VelocityLimitRule {
    pub ratio: f64,
}

impl JointRule for VelocityLimitRule {
    fn name(&self) -> &str {
        "velocity_limit"
    }

    fn evaluate(&self, sample: &JointSample<'_>) -> Option<Fault> {
        let dq = sample.dq?;
        let joint = sample.joint;
        if dq > joint.dq_upper() * self.ratio || dq < joint.dq_lower() * self.ratio {
            Some(Fault::Velocity {
                frame: sample.frame,
                time: sample.time,
                joint_id: joint.id(),
                joint: joint.name().to_string(),
                joint_kind: joint.kind(),
                dq,
                lower: joint.dq_lower(),
                upper: joint.dq_upper(),
            })
        } else {
            None
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// LimitVerifier
// ────────────────────────────────────────────────────────────────────────────

struct RuleSlot {
    rule: Box<dyn JointRule>,
    onsets: OnsetTracker<usize>,
}

/// Evaluates every registered rule and reports the onset of each violation.
///
/// Debounce history is kept per rule and per joint id, so a joint that
/// violates both its position and its velocity limit yields one onset of
/// each.
///
/// # Example
///
/// ```
/// use kinfault_body::{Body, BodyDescription, JointDescription, LinkDescription};
/// use kinfault_kernel::limits::{JointSample, LimitVerifier, PositionLimitRule};
/// use kinfault_types::Fault;
///
/// let body = Body::from_description(
///     BodyDescription::new("arm")
///         .with_link(LinkDescription::root("BASE"))
///         .with_link(
///             LinkDescription::child("J0", "BASE")
///                 .with_joint(JointDescription::revolute(-1.0, 1.0)),
///         ),
/// )
/// .unwrap();
///
/// let mut verifier = LimitVerifier::new();
/// verifier.add_rule(Box::new(PositionLimitRule { angle_margin: 0.0, translation_margin: 0.0 }));
///
/// let mut faults: Vec<Fault> = Vec::new();
/// for frame in 0..3 {
///     let sample = JointSample { frame, time: 0.0, joint: body.joint(0), q: 1.5, dq: None };
///     verifier.evaluate(&sample, &mut faults);
/// }
/// assert_eq!(faults.len(), 1);
/// ```
#[derive(Default)]
pub struct LimitVerifier {
    slots: Vec<RuleSlot>,
}

impl LimitVerifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a rule.  Rules are evaluated in insertion order.
    pub fn add_rule(&mut self, rule: Box<dyn JointRule>) {
        self.slots.push(RuleSlot {
            rule,
            onsets: OnsetTracker::new(),
        });
    }

    /// Evaluate `sample` against every rule and report new onsets.
    ///
    /// Returns the number of faults reported.
    pub fn evaluate(
        &mut self,
        sample: &JointSample<'_>,
        reporter: &mut dyn FaultReporter,
    ) -> usize {
        let mut reported = 0;
        for slot in &mut self.slots {
            if let Some(fault) = slot.rule.evaluate(sample)
                && slot.onsets.observe(sample.joint.id(), sample.frame)
            {
                trace!(
                    rule = slot.rule.name(),
                    joint = sample.joint.name(),
                    frame = sample.frame,
                    "limit fault onset"
                );
                reporter.report(&fault);
                reported += 1;
            }
        }
        reported
    }
}
