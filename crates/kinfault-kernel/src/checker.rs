//! [`FaultChecker`] – frame-by-frame kinematic replay.
//!
//! For every frame of the resolved range the checker:
//!
//! 1. writes the motion's joint positions into the body,
//! 2. evaluates the position and velocity rules of every selected joint,
//! 3. places the links (root pose, forward kinematics, then the recorded
//!    link poses when present) and asks the collision backend for overlaps,
//! 4. reports the onset of every fault episode.
//!
//! The body is borrowed mutably for the whole run through a
//! [`KinematicStateGuard`], so its kinematic registers are back to their
//! pre-run values when [`FaultChecker::check`] returns.
//!
//! Cancellation is cooperative: the flag given to
//! [`FaultChecker::with_cancel_flag`] is polled before each frame.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use kinfault_body::{Body, MotionTrajectory, MultiSeq, Transform3D};
use kinfault_collision::{AabbCollisionDetector, CollisionBackend, CollisionPair, GeometryPair};
use kinfault_types::{Fault, FaultError};
use serde::{Deserialize, Serialize};
use tracing::{Span, debug, field, info, instrument, warn};

use crate::config::{CheckConfig, FrameRange};
use crate::debounce::OnsetTracker;
use crate::limits::{
    JointSample, LimitVerifier, PositionLimitRule, VelocityLimitRule, central_difference,
};
use crate::reporter::FaultReporter;
use crate::state_guard::KinematicStateGuard;

/// Builds a fresh collision backend for each run.
pub type BackendFactory = Box<dyn Fn() -> Box<dyn CollisionBackend>>;

fn default_backend() -> Box<dyn CollisionBackend> {
    Box::new(AabbCollisionDetector::new())
}

/// Outcome of one [`FaultChecker::check`] run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckReport {
    /// Number of faults handed to the reporter.
    pub fault_count: usize,
    /// The clamped range that was replayed; `None` when the run exited early.
    pub frame_range: Option<FrameRange>,
    pub frames_checked: usize,
    /// The cancel flag stopped the run before the end of the range.
    pub cancelled: bool,
    /// Collision checking was requested and the backend became ready.
    pub collision_checked: bool,
}

// ────────────────────────────────────────────────────────────────────────────
// FaultChecker
// ────────────────────────────────────────────────────────────────────────────

/// The kinematic fault detection engine.
///
/// # Example
///
/// ```
/// use kinfault_body::{
///     Body, BodyDescription, JointDescription, LinkDescription, MotionTrajectory, MultiSeq,
/// };
/// use kinfault_kernel::{CheckConfig, FaultChecker};
/// use kinfault_types::Fault;
///
/// let mut body = Body::from_description(
///     BodyDescription::new("arm")
///         .with_link(LinkDescription::root("BASE"))
///         .with_link(
///             LinkDescription::child("J0", "BASE")
///                 .with_joint(JointDescription::revolute(-1.0, 1.0)),
///         ),
/// )
/// .unwrap();
/// let q = MultiSeq::from_rows(vec![vec![0.0], vec![1.2], vec![1.3], vec![0.0]]).unwrap();
/// let motion = MotionTrajectory::new(30.0, q, None).unwrap();
///
/// let config = CheckConfig::default().with_checks(true, false, false);
/// let mut faults: Vec<Fault> = Vec::new();
/// let count = FaultChecker::new().run(&mut body, &motion, &config, &mut faults).unwrap();
///
/// assert_eq!(count, 1);
/// assert_eq!(faults[0].frame(), 1);
/// ```
pub struct FaultChecker {
    backend_factory: BackendFactory,
    cancel: Option<Arc<AtomicBool>>,
}

impl Default for FaultChecker {
    fn default() -> Self {
        Self::new()
    }
}

impl FaultChecker {
    /// A checker using [`AabbCollisionDetector`] for collisions.
    pub fn new() -> Self {
        Self {
            backend_factory: Box::new(default_backend),
            cancel: None,
        }
    }

    /// Use a different collision backend.  `factory` is called once per run
    /// that has collision checking enabled.
    pub fn with_backend<F>(mut self, factory: F) -> Self
    where
        F: Fn() -> Box<dyn CollisionBackend> + 'static,
    {
        self.backend_factory = Box::new(factory);
        self
    }

    /// Stop between frames once `flag` becomes `true`.
    pub fn with_cancel_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = Some(flag);
        self
    }

    fn is_cancelled(&self) -> bool {
        self.cancel
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::Relaxed))
    }

    /// Replay `motion` on `body` and return the number of reported faults.
    ///
    /// # Errors
    ///
    /// See [`FaultChecker::check`].
    pub fn run(
        &self,
        body: &mut Body,
        motion: &MotionTrajectory,
        config: &CheckConfig,
        reporter: &mut dyn FaultReporter,
    ) -> Result<usize, FaultError> {
        self.check(body, motion, config, reporter)
            .map(|report| report.fault_count)
    }

    /// Replay `motion` on `body`, streaming faults to `reporter`.
    ///
    /// Returns immediately with an empty report, without touching the body,
    /// when no check is enabled, the body is static, or the motion has no
    /// frames.  An empty clamped range also yields an empty report.  A
    /// collision backend that cannot be made ready only disables the
    /// collision check for this run.
    ///
    /// # Errors
    ///
    /// Returns [`FaultError::InvalidConfig`] when `config` fails
    /// [`CheckConfig::validate`] and [`FaultError::InvalidMotion`] for a
    /// non-positive or non-finite frame rate.
    #[instrument(
        name = "fault_check",
        skip_all,
        fields(
            body = %body.name(),
            frames = motion.num_frames(),
            range = field::Empty,
            faults = field::Empty,
        )
    )]
    pub fn check(
        &self,
        body: &mut Body,
        motion: &MotionTrajectory,
        config: &CheckConfig,
        reporter: &mut dyn FaultReporter,
    ) -> Result<CheckReport, FaultError> {
        if !config.any_check_enabled() || body.is_static_model() || motion.num_frames() == 0 {
            debug!("nothing to check");
            return Ok(CheckReport::default());
        }
        config.validate()?;

        let frame_rate = motion.frame_rate();
        if !frame_rate.is_finite() || frame_rate <= 0.0 {
            return Err(FaultError::InvalidMotion(format!(
                "frame rate must be positive and finite, got {frame_rate}"
            )));
        }

        let Some(range) = config.range.resolve(motion.num_frames(), frame_rate) else {
            warn!(range = ?config.range, "frame range is empty after clamping");
            return Ok(CheckReport::default());
        };
        Span::current().record("range", field::display(range));

        let qseq = motion.joint_positions();
        let num_joints = body.num_joints().min(qseq.num_parts());
        if num_joints < body.num_joints() {
            warn!(
                body_joints = body.num_joints(),
                motion_joints = qseq.num_parts(),
                "motion has fewer joint columns than the body; checking the common joints only"
            );
        }
        let link_poses = motion.link_poses();
        let num_links = link_poses.map_or(0, MultiSeq::num_parts).min(body.num_links());
        let selected = config.link_selection.mask(body.num_links());

        let mut verifier = LimitVerifier::new();
        if config.check_position {
            verifier.add_rule(Box::new(PositionLimitRule {
                angle_margin: config.angle_margin,
                translation_margin: config.translation_margin,
            }));
        }
        if config.check_velocity {
            verifier.add_rule(Box::new(VelocityLimitRule {
                ratio: config.velocity_limit_ratio,
            }));
        }

        let mut body = KinematicStateGuard::new(body);
        let mut backend = if config.check_collision {
            self.prepare_backend(&body)
        } else {
            None
        };
        if config.check_collision {
            // Self-collision is judged in the body's own frame.
            body.root_link_mut().pose = Transform3D::identity();
        }

        let mut collisions: OnsetTracker<GeometryPair> = OnsetTracker::new();
        let mut report = CheckReport {
            frame_range: Some(range),
            collision_checked: backend.is_some(),
            ..CheckReport::default()
        };

        for frame in range.iter() {
            if self.is_cancelled() {
                info!(frame, "fault check cancelled");
                report.cancelled = true;
                break;
            }
            let time = frame as f64 / frame_rate;
            let (prev, next) = range.neighbours(frame);

            for id in 0..num_joints {
                let q = qseq.at(frame, id);
                body.joint_mut(id).q = q;
                if !selected[body.joint(id).link_index()] {
                    continue;
                }
                let dq = if config.check_velocity {
                    let dq = central_difference(qseq.at(prev, id), qseq.at(next, id), frame_rate);
                    body.joint_mut(id).dq = dq;
                    Some(dq)
                } else {
                    None
                };
                let sample = JointSample {
                    frame,
                    time,
                    joint: body.joint(id),
                    q,
                    dq,
                };
                report.fault_count += verifier.evaluate(&sample, reporter);
            }

            if let Some(backend) = backend.as_deref_mut() {
                place_links(&mut body, link_poses, frame, num_links);
                backend.update_positions(&body);
                let view: &Body = &body;
                backend.detect_collisions(&mut |pair: &CollisionPair| {
                    if collisions.observe(pair.geometry_pair(), frame) {
                        reporter.report(&collision_fault(view, pair, frame, time));
                        report.fault_count += 1;
                    }
                });
            }

            report.frames_checked += 1;
        }

        drop(body);
        Span::current().record("faults", report.fault_count);
        info!(
            faults = report.fault_count,
            frames = report.frames_checked,
            cancelled = report.cancelled,
            "fault check finished"
        );
        Ok(report)
    }

    fn prepare_backend(&self, body: &Body) -> Option<Box<dyn CollisionBackend>> {
        let mut backend = (self.backend_factory)();
        let ready = backend
            .add_body(body, true)
            .and_then(|()| backend.make_ready());
        match ready {
            Ok(()) => {
                debug!(backend = backend.name(), "collision backend ready");
                Some(backend)
            }
            Err(err) => {
                warn!(
                    backend = backend.name(),
                    error = %err,
                    "collision checking disabled for this run"
                );
                None
            }
        }
    }
}

/// Root pose from the series (or identity), forward kinematics, then every
/// other recorded link pose on top.
fn place_links(
    body: &mut Body,
    link_poses: Option<&MultiSeq<Transform3D>>,
    frame: usize,
    num_links: usize,
) {
    body.root_link_mut().pose = link_poses.map_or_else(Transform3D::identity, |p| p.at(frame, 0));
    body.calc_forward_kinematics();
    if let Some(poses) = link_poses {
        for index in 1..num_links {
            body.link_mut(index).pose = poses.at(frame, index);
        }
    }
}

fn collision_fault(body: &Body, pair: &CollisionPair, frame: usize, time: f64) -> Fault {
    let name = |index: usize| {
        body.links()
            .get(index)
            .map_or_else(|| format!("#{index}"), |link| link.name().to_string())
    };
    Fault::Collision {
        frame,
        time,
        links: pair.links,
        link_names: [name(pair.links[0]), name(pair.links[1])],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CheckRange, LinkSelection};
    use kinfault_body::{
        BodyDescription, Geometry, JointDescription, LinkDescription, Shape, Vec3,
    };
    use kinfault_collision::GeometryHandle;

    // ---- fixtures ----

    /// BASE ─ J0 (revolute ±1 rad, ±2 rad/s) ─ J1 (prismatic 0..0.5 m).
    fn arm() -> Body {
        Body::from_description(
            BodyDescription::new("arm")
                .with_link(LinkDescription::root("BASE"))
                .with_link(
                    LinkDescription::child("J0", "BASE").with_joint(
                        JointDescription::revolute(-1.0, 1.0).with_velocity_limits(-2.0, 2.0),
                    ),
                )
                .with_link(
                    LinkDescription::child("J1", "J0")
                        .with_offset(Transform3D::from_translation(Vec3::new(0.4, 0.0, 0.0)))
                        .with_joint(JointDescription::prismatic(0.0, 0.5)),
                ),
        )
        .unwrap()
    }

    /// BASE ball, a prismatic RAIL along x, and a CART ball 1 m out.
    fn slider() -> Body {
        let ball = Geometry::new(Shape::Sphere { radius: 0.2 });
        Body::from_description(
            BodyDescription::new("slider")
                .with_link(LinkDescription::root("BASE").with_geometry(ball))
                .with_link(
                    LinkDescription::child("RAIL", "BASE").with_joint(
                        JointDescription::prismatic(-2.0, 2.0).with_axis(Vec3::new(1.0, 0.0, 0.0)),
                    ),
                )
                .with_link(
                    LinkDescription::child("CART", "RAIL")
                        .with_offset(Transform3D::from_translation(Vec3::new(1.0, 0.0, 0.0)))
                        .with_geometry(ball),
                ),
        )
        .unwrap()
    }

    fn motion(frame_rate: f64, rows: Vec<Vec<f64>>) -> MotionTrajectory {
        MotionTrajectory::new(frame_rate, MultiSeq::from_rows(rows).unwrap(), None).unwrap()
    }

    /// Two-joint motion whose first joint follows `j0` and second stays at 0.25.
    fn arm_motion(frame_rate: f64, j0: &[f64]) -> MotionTrajectory {
        motion(frame_rate, j0.iter().map(|&q| vec![q, 0.25]).collect())
    }

    /// `len` frames at 0 with `value` over each inclusive span.
    fn spans(len: usize, value: f64, spans: &[(usize, usize)]) -> Vec<f64> {
        (0..len)
            .map(|f| {
                if spans.iter().any(|&(a, b)| (a..=b).contains(&f)) {
                    value
                } else {
                    0.0
                }
            })
            .collect()
    }

    fn position_only() -> CheckConfig {
        CheckConfig::default().with_checks(true, false, false)
    }

    fn frames(faults: &[Fault]) -> Vec<usize> {
        faults.iter().map(Fault::frame).collect()
    }

    // ---- scripted collision backend ----

    #[derive(Clone)]
    struct ScriptedBackend {
        script: Vec<Vec<(usize, usize)>>,
        ready: bool,
        cursor: usize,
    }

    impl CollisionBackend for ScriptedBackend {
        fn name(&self) -> &str {
            "scripted"
        }

        fn add_body(&mut self, _body: &Body, is_self: bool) -> Result<(), FaultError> {
            assert!(is_self);
            Ok(())
        }

        fn make_ready(&mut self) -> Result<(), FaultError> {
            if self.ready {
                Ok(())
            } else {
                Err(FaultError::Collision("scripted failure".to_string()))
            }
        }

        fn update_positions(&mut self, _body: &Body) {}

        fn detect_collisions(&mut self, callback: &mut dyn FnMut(&CollisionPair)) {
            if let Some(pairs) = self.script.get(self.cursor) {
                for &(a, b) in pairs {
                    callback(&CollisionPair {
                        geometries: [GeometryHandle::new(a), GeometryHandle::new(b)],
                        links: [a, b],
                    });
                }
            }
            self.cursor += 1;
        }
    }

    fn scripted(script: Vec<Vec<(usize, usize)>>, ready: bool) -> FaultChecker {
        let backend = ScriptedBackend {
            script,
            ready,
            cursor: 0,
        };
        FaultChecker::new().with_backend(move || -> Box<dyn CollisionBackend> {
            Box::new(backend.clone())
        })
    }

    // ---- early exits ----

    #[test]
    fn no_enabled_checks_returns_zero_and_leaves_body_untouched() {
        let mut body = arm();
        body.joint_mut(0).q = 0.3;
        body.calc_forward_kinematics();
        let before = body.store_kinematic_state();

        let config = CheckConfig::default().with_checks(false, false, false);
        let mut faults: Vec<Fault> = Vec::new();
        let report = FaultChecker::new()
            .check(&mut body, &arm_motion(30.0, &[5.0, 5.0]), &config, &mut faults)
            .unwrap();

        assert_eq!(report, CheckReport::default());
        assert!(faults.is_empty());
        assert_eq!(body.store_kinematic_state(), before);
    }

    #[test]
    fn static_model_returns_zero() {
        let mut body = Body::from_description(
            BodyDescription::new("rock")
                .with_static_model(true)
                .with_link(LinkDescription::root("ROOT"))
                .with_link(
                    LinkDescription::child("J", "ROOT")
                        .with_joint(JointDescription::revolute(0.0, 0.1)),
                ),
        )
        .unwrap();
        let count = FaultChecker::new()
            .run(
                &mut body,
                &motion(30.0, vec![vec![9.0]]),
                &CheckConfig::default(),
                &mut Vec::<Fault>::new(),
            )
            .unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn empty_motion_returns_zero() {
        let mut body = arm();
        let count = FaultChecker::new()
            .run(
                &mut body,
                &motion(30.0, Vec::new()),
                &CheckConfig::default(),
                &mut Vec::<Fault>::new(),
            )
            .unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn inverted_range_is_nothing_to_check() {
        let mut body = arm();
        let config = position_only().with_range(CheckRange::Frames { begin: 5, end: 2 });
        let report = FaultChecker::new()
            .check(&mut body, &arm_motion(30.0, &[9.0; 10]), &config, &mut Vec::<Fault>::new())
            .unwrap();
        assert_eq!(report.fault_count, 0);
        assert_eq!(report.frame_range, None);
    }

    #[test]
    fn invalid_ratio_is_an_error() {
        let mut body = arm();
        let config = CheckConfig::default().with_velocity_limit_ratio(1.5);
        let err = FaultChecker::new()
            .run(&mut body, &arm_motion(30.0, &[0.0]), &config, &mut Vec::<Fault>::new())
            .unwrap_err();
        assert!(matches!(err, FaultError::InvalidConfig(_)));
    }

    // ---- position ----

    #[test]
    fn position_boundary_is_exclusive() {
        let margin = 0.1;
        let bound = 1.0 - margin;
        let config = position_only().with_angle_margin(margin);

        let mut body = arm();
        let at_bound = FaultChecker::new()
            .run(&mut body, &arm_motion(30.0, &[bound]), &config, &mut Vec::<Fault>::new())
            .unwrap();
        assert_eq!(at_bound, 0);

        let past_bound = FaultChecker::new()
            .run(&mut body, &arm_motion(30.0, &[bound + 1e-9]), &config, &mut Vec::<Fault>::new())
            .unwrap();
        assert_eq!(past_bound, 1);
    }

    #[test]
    fn single_frame_below_lower_bound_reports_once() {
        let mut body = arm();
        let mut faults: Vec<Fault> = Vec::new();
        let count = FaultChecker::new()
            .run(&mut body, &arm_motion(30.0, &[-1.0 - 1e-9]), &position_only(), &mut faults)
            .unwrap();
        assert_eq!(count, 1);
        assert_eq!(frames(&faults), vec![0]);

        // Exactly at the bound with zero margin is still inside the range.
        let count = FaultChecker::new()
            .run(&mut body, &arm_motion(30.0, &[-1.0]), &position_only(), &mut Vec::<Fault>::new())
            .unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn continuous_violation_reports_its_onset_only() {
        let mut body = arm();
        let mut faults: Vec<Fault> = Vec::new();
        let q = spans(30, 1.5, &[(10, 20)]);
        let count = FaultChecker::new()
            .run(&mut body, &arm_motion(30.0, &q), &position_only(), &mut faults)
            .unwrap();
        assert_eq!(count, 1);
        assert_eq!(frames(&faults), vec![10]);
    }

    #[test]
    fn recurring_violation_reports_each_onset() {
        let mut body = arm();
        let mut faults: Vec<Fault> = Vec::new();
        let q = spans(30, 1.5, &[(10, 15), (18, 25)]);
        let count = FaultChecker::new()
            .run(&mut body, &arm_motion(30.0, &q), &position_only(), &mut faults)
            .unwrap();
        assert_eq!(count, 2);
        assert_eq!(frames(&faults), vec![10, 18]);
    }

    #[test]
    fn link_selection_filters_joints() {
        let q = spans(5, 1.5, &[(0, 4)]);
        let mut body = arm();

        let config =
            position_only().with_link_selection(LinkSelection::Except([1].into_iter().collect()));
        let count = FaultChecker::new()
            .run(&mut body, &arm_motion(30.0, &q), &config, &mut Vec::<Fault>::new())
            .unwrap();
        assert_eq!(count, 0);

        let config =
            position_only().with_link_selection(LinkSelection::Only([1].into_iter().collect()));
        let count = FaultChecker::new()
            .run(&mut body, &arm_motion(30.0, &q), &config, &mut Vec::<Fault>::new())
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn motion_narrower_than_body_checks_common_joints() {
        let mut body = arm();
        // One column only: J1 (prismatic, 0.0..0.5) is never written or checked.
        let mut faults: Vec<Fault> = Vec::new();
        let count = FaultChecker::new()
            .run(
                &mut body,
                &motion(30.0, vec![vec![1.5], vec![1.5]]),
                &position_only(),
                &mut faults,
            )
            .unwrap();
        assert_eq!(count, 1);
        assert!(matches!(&faults[0], Fault::Position { joint_id: 0, .. }));
    }

    #[test]
    fn time_range_restricts_replay() {
        let mut body = arm();
        let mut faults: Vec<Fault> = Vec::new();
        let q = spans(40, 1.5, &[(5, 6), (25, 30)]);
        // 0.5 s .. 1.2 s at 30 fps → frames 15..=36.
        let config = position_only().with_range(CheckRange::Seconds { begin: 0.5, end: 1.2 });
        let report = FaultChecker::new()
            .check(&mut body, &arm_motion(30.0, &q), &config, &mut faults)
            .unwrap();
        assert_eq!(report.frame_range, FrameRange::new(15, 36));
        assert_eq!(report.frames_checked, 22);
        assert_eq!(frames(&faults), vec![25]);
    }

    // ---- velocity ----

    #[test]
    fn velocity_at_range_edges_uses_central_divisor() {
        // 0.1 rad per frame at 10 fps: true velocity 1 rad/s.
        let q: Vec<f64> = (0..8).map(|f| f as f64 * 0.1).collect();
        // Limit 2 rad/s × 0.3 = 0.6 rad/s: interior frames (1.0) fault, edge
        // frames (0.5, one-sided difference over two periods) do not.
        let config = CheckConfig::default()
            .with_checks(false, true, false)
            .with_velocity_limit_ratio(0.3);
        let mut body = arm();
        let mut faults: Vec<Fault> = Vec::new();
        FaultChecker::new()
            .run(&mut body, &arm_motion(10.0, &q), &config, &mut faults)
            .unwrap();

        assert_eq!(frames(&faults), vec![1]);
        match &faults[0] {
            Fault::Velocity { dq, lower, upper, .. } => {
                assert!((dq - 1.0).abs() < 1e-9);
                assert_eq!((*lower, *upper), (-2.0, 2.0));
            }
            other => panic!("unexpected fault {other:?}"),
        }
    }

    #[test]
    fn velocity_at_first_frame_is_half_the_true_rate() {
        let q: Vec<f64> = (0..8).map(|f| f as f64 * 0.1).collect();
        let config = CheckConfig::default()
            .with_checks(false, true, false)
            .with_velocity_limit_ratio(0.1)
            .with_range(CheckRange::Frames { begin: 3, end: 6 });
        let mut body = arm();
        let mut faults: Vec<Fault> = Vec::new();
        FaultChecker::new()
            .run(&mut body, &arm_motion(10.0, &q), &config, &mut faults)
            .unwrap();

        // Everything faults (limit 0.2 rad/s); only the onset at frame 3 is
        // reported, with the forward difference over the two-period divisor.
        assert_eq!(frames(&faults), vec![3]);
        match &faults[0] {
            Fault::Velocity { dq, .. } => assert!((dq - 0.5).abs() < 1e-9),
            other => panic!("unexpected fault {other:?}"),
        }
    }

    #[test]
    fn position_and_velocity_debounce_independently() {
        let q = [0.0, 1.5, 1.5, 1.5, 0.0];
        let config = CheckConfig::default().with_checks(true, true, false);
        let mut body = arm();
        let mut faults: Vec<Fault> = Vec::new();
        FaultChecker::new()
            .run(&mut body, &arm_motion(30.0, &q), &config, &mut faults)
            .unwrap();
        let labels: Vec<(&str, usize)> = faults.iter().map(|f| (f.label(), f.frame())).collect();
        // Velocity: frames 0..=1 jump up (onset 0), frames 3..=4 jump down (onset 3).
        assert_eq!(
            labels,
            vec![("velocity", 0), ("position", 1), ("velocity", 3)]
        );
    }

    // ---- collision ----

    #[test]
    fn collision_pairs_in_either_order_share_history() {
        let script = vec![
            vec![(0, 2)],
            vec![(2, 0)],
            vec![(0, 2)],
            vec![],
            vec![(2, 0)],
            vec![],
        ];
        let mut body = arm();
        let mut faults: Vec<Fault> = Vec::new();
        let config = CheckConfig::default().with_checks(false, false, true);
        let report = scripted(script, true)
            .check(&mut body, &arm_motion(30.0, &[0.0; 6]), &config, &mut faults)
            .unwrap();

        assert!(report.collision_checked);
        assert_eq!(frames(&faults), vec![0, 4]);
        match &faults[1] {
            Fault::Collision { link_names, .. } => {
                assert_eq!(link_names, &["J1".to_string(), "BASE".to_string()]);
            }
            other => panic!("unexpected fault {other:?}"),
        }
    }

    #[test]
    fn distinct_pairs_debounce_separately() {
        let script = vec![vec![(0, 1), (1, 2)], vec![(0, 1)], vec![(0, 1), (1, 2)]];
        let mut body = arm();
        let config = CheckConfig::default().with_checks(false, false, true);
        let count = scripted(script, true)
            .run(&mut body, &arm_motion(30.0, &[0.0; 3]), &config, &mut Vec::<Fault>::new())
            .unwrap();
        // (0,1) once; (1,2) at frames 0 and 2.
        assert_eq!(count, 3);
    }

    #[test]
    fn unready_backend_degrades_to_limit_checks() {
        let mut body = arm();
        let report = scripted(vec![vec![(0, 2)]], false)
            .check(
                &mut body,
                &arm_motion(30.0, &[1.5]),
                &position_only().with_checks(true, false, true),
                &mut Vec::<Fault>::new(),
            )
            .unwrap();
        assert!(!report.collision_checked);
        assert_eq!(report.fault_count, 1);
    }

    #[test]
    fn default_detector_finds_self_collision() {
        let q = [0.0, -0.3, -0.7, -0.9, -0.9, -0.3];
        let mut body = slider();
        let mut faults: Vec<Fault> = Vec::new();
        let config = CheckConfig::default().with_checks(false, false, true);
        let report = FaultChecker::new()
            .check(
                &mut body,
                &motion(10.0, q.iter().map(|&v| vec![v]).collect()),
                &config,
                &mut faults,
            )
            .unwrap();

        assert!(report.collision_checked);
        assert_eq!(frames(&faults), vec![2]);
        assert_eq!(
            faults[0].to_string(),
            "  0.200 [s]: Collision between BASE and CART"
        );
    }

    /// BOX cube at the origin; CAP, a zero-shaft capsule, sits diagonally
    /// off its corner on a SLIDE prismatic along x.
    fn box_and_capsule() -> Body {
        Body::from_description(
            BodyDescription::new("corner")
                .with_link(LinkDescription::root("BOX").with_geometry(Geometry::new(
                    Shape::Box {
                        half_extents: Vec3::new(0.5, 0.5, 0.5),
                    },
                )))
                .with_link(
                    LinkDescription::child("SLIDE", "BOX").with_joint(
                        JointDescription::prismatic(-1.0, 1.0).with_axis(Vec3::new(1.0, 0.0, 0.0)),
                    ),
                )
                .with_link(
                    LinkDescription::child("CAP", "SLIDE")
                        .with_offset(Transform3D::from_translation(Vec3::new(0.9, 0.9, 0.0)))
                        .with_geometry(Geometry::new(Shape::Capsule {
                            radius: 0.5,
                            half_length: 0.0,
                        })),
                ),
        )
        .unwrap()
    }

    #[test]
    fn capsule_near_box_corner_is_not_a_collision() {
        let config = CheckConfig::default().with_checks(false, false, true);
        let mut body = box_and_capsule();
        let count = FaultChecker::new()
            .run(&mut body, &motion(10.0, vec![vec![0.0]; 3]), &config, &mut Vec::<Fault>::new())
            .unwrap();
        assert_eq!(count, 0);

        // Sliding 0.2 m towards the box closes the 0.066 m gap.
        let q = [0.0, 0.0, -0.2, -0.2];
        let mut faults: Vec<Fault> = Vec::new();
        let count = FaultChecker::new()
            .run(
                &mut body,
                &motion(10.0, q.iter().map(|&v| vec![v]).collect()),
                &config,
                &mut faults,
            )
            .unwrap();
        assert_eq!(count, 1);
        assert_eq!(frames(&faults), vec![2]);
    }

    #[test]
    fn recorded_link_poses_override_forward_kinematics() {
        let at = |x: f64| Transform3D::from_translation(Vec3::new(x, 0.0, 0.0));
        let id = Transform3D::identity();
        let poses = MultiSeq::from_rows(vec![
            vec![id, id, at(1.0)],
            vec![id, id, at(0.1)],
            vec![id, id, at(1.0)],
        ])
        .unwrap();
        let q = MultiSeq::from_rows(vec![vec![0.0]; 3]).unwrap();
        let motion = MotionTrajectory::new(10.0, q, Some(poses)).unwrap();

        let mut body = slider();
        let mut faults: Vec<Fault> = Vec::new();
        let config = CheckConfig::default().with_checks(false, false, true);
        FaultChecker::new()
            .run(&mut body, &motion, &config, &mut faults)
            .unwrap();
        assert_eq!(frames(&faults), vec![1]);
    }

    // ---- state restoration ----

    #[test]
    fn body_state_round_trips_through_a_run() {
        let mut body = slider();
        body.root_link_mut().pose = Transform3D::from_translation(Vec3::new(3.0, 4.0, 5.0));
        body.joint_mut(0).q = 0.4;
        body.calc_forward_kinematics();
        let before = body.store_kinematic_state();

        let q: Vec<Vec<f64>> = [0.0, -0.5, -0.9, 1.9, 2.5].iter().map(|&v| vec![v]).collect();
        let count = FaultChecker::new()
            .run(&mut body, &motion(10.0, q), &CheckConfig::default(), &mut Vec::<Fault>::new())
            .unwrap();
        assert!(count > 0);
        assert_eq!(body.store_kinematic_state(), before);
    }

    // ---- cancellation ----

    struct CancelOnFault {
        flag: Arc<AtomicBool>,
        seen: usize,
    }

    impl FaultReporter for CancelOnFault {
        fn report(&mut self, _fault: &Fault) {
            self.seen += 1;
            self.flag.store(true, Ordering::Relaxed);
        }
    }

    #[test]
    fn cancel_flag_stops_between_frames() {
        let flag = Arc::new(AtomicBool::new(false));
        let mut sink = CancelOnFault {
            flag: Arc::clone(&flag),
            seen: 0,
        };
        let mut body = arm();
        let before = body.store_kinematic_state();
        let q = spans(10, 1.5, &[(2, 2), (6, 6)]);

        let report = FaultChecker::new()
            .with_cancel_flag(flag)
            .check(&mut body, &arm_motion(30.0, &q), &position_only(), &mut sink)
            .unwrap();

        assert!(report.cancelled);
        assert_eq!(report.frames_checked, 3);
        assert_eq!(report.fault_count, 1);
        assert_eq!(sink.seen, 1);
        assert_eq!(body.store_kinematic_state(), before);
    }

    #[test]
    fn preset_cancel_flag_checks_nothing() {
        let mut body = arm();
        let report = FaultChecker::new()
            .with_cancel_flag(Arc::new(AtomicBool::new(true)))
            .check(
                &mut body,
                &arm_motion(30.0, &[1.5; 4]),
                &position_only(),
                &mut Vec::<Fault>::new(),
            )
            .unwrap();
        assert!(report.cancelled);
        assert_eq!(report.frames_checked, 0);
        assert_eq!(report.fault_count, 0);
    }
}
