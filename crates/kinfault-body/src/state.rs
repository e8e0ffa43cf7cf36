//! Snapshot and restore of a body's transient kinematic registers.
//!
//! A [`KinematicState`] captures every joint's `q`/`dq` and every link's
//! pose.  Restoring it reproduces those values bit-for-bit, which is what lets
//! an analysis replay a motion on a caller-owned [`Body`] without leaking
//! frame state back to the caller.

use tracing::warn;

use crate::body::Body;
use crate::transform::Transform3D;

/// Full copy of a body's joint positions, velocities, and link poses.
#[derive(Debug, Clone, PartialEq)]
pub struct KinematicState {
    q: Vec<f64>,
    dq: Vec<f64>,
    poses: Vec<Transform3D>,
}

impl KinematicState {
    pub fn joint_positions(&self) -> &[f64] {
        &self.q
    }

    pub fn joint_velocities(&self) -> &[f64] {
        &self.dq
    }

    pub fn link_poses(&self) -> &[Transform3D] {
        &self.poses
    }
}

impl Body {
    /// Capture the current kinematic registers.
    pub fn store_kinematic_state(&self) -> KinematicState {
        KinematicState {
            q: self.joints().iter().map(|j| j.q).collect(),
            dq: self.joints().iter().map(|j| j.dq).collect(),
            poses: self.links().iter().map(|l| l.pose).collect(),
        }
    }

    /// Write `state` back into the kinematic registers.
    ///
    /// A snapshot taken from a differently-shaped body is applied over the
    /// common prefix only.
    pub fn restore_kinematic_state(&mut self, state: &KinematicState) {
        if state.q.len() != self.num_joints() || state.poses.len() != self.num_links() {
            warn!(
                body = %self.name(),
                snapshot_joints = state.q.len(),
                snapshot_links = state.poses.len(),
                "restoring a kinematic snapshot of a different shape"
            );
        }
        for (id, (&q, &dq)) in state.q.iter().zip(&state.dq).enumerate().take(self.num_joints()) {
            let joint = self.joint_mut(id);
            joint.q = q;
            joint.dq = dq;
        }
        for (index, &pose) in state.poses.iter().enumerate().take(self.num_links()) {
            self.link_mut(index).pose = pose;
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::body::{BodyDescription, JointDescription, LinkDescription};
    use crate::transform::Vec3;

    use super::*;

    fn arm() -> Body {
        Body::from_description(
            BodyDescription::new("arm")
                .with_link(LinkDescription::root("BASE"))
                .with_link(
                    LinkDescription::child("J1", "BASE")
                        .with_joint(JointDescription::revolute(-1.0, 1.0)),
                )
                .with_link(
                    LinkDescription::child("J2", "J1")
                        .with_offset(Transform3D::from_translation(Vec3::new(0.3, 0.0, 0.0)))
                        .with_joint(JointDescription::prismatic(0.0, 0.2)),
                ),
        )
        .unwrap()
    }

    #[test]
    fn restore_reproduces_snapshot_exactly() {
        let mut body = arm();
        body.joint_mut(0).q = 0.25;
        body.joint_mut(1).dq = -0.1;
        body.calc_forward_kinematics();
        let before = body.store_kinematic_state();

        body.joint_mut(0).q = 0.9;
        body.joint_mut(1).q = 0.15;
        body.root_link_mut().pose = Transform3D::from_translation(Vec3::new(5.0, 5.0, 5.0));
        body.calc_forward_kinematics();
        assert_ne!(body.store_kinematic_state(), before);

        body.restore_kinematic_state(&before);
        assert_eq!(body.store_kinematic_state(), before);
    }

    #[test]
    fn snapshot_exposes_registers() {
        let mut body = arm();
        body.joint_mut(1).q = 0.05;
        let state = body.store_kinematic_state();
        assert_eq!(state.joint_positions(), &[0.0, 0.05]);
        assert_eq!(state.joint_velocities().len(), 2);
        assert_eq!(state.link_poses().len(), 3);
    }
}
