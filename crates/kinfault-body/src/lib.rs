//! `kinfault-body` – kinematic body model and motion trajectories.
//!
//! Everything the fault checker replays lives here.
//!
//! # Modules
//!
//! - [`transform`] – [`Vec3`][transform::Vec3], [`Quaternion`][transform::Quaternion]
//!   and [`Transform3D`][transform::Transform3D] rigid-body primitives.
//! - [`body`] – [`Body`][body::Body]: a tree of links and one-DOF joints with
//!   position/velocity limits and forward kinematics, built from a
//!   serializable [`BodyDescription`][body::BodyDescription].
//! - [`state`] – [`KinematicState`][state::KinematicState]: snapshot/restore
//!   of the body's transient joint and pose registers.
//! - [`motion`] – [`MotionTrajectory`][motion::MotionTrajectory]: fixed-rate
//!   joint-position series with an optional link-pose series.

pub mod body;
pub mod motion;
pub mod state;
pub mod transform;

pub use body::{
    Body, BodyDescription, Geometry, Joint, JointDescription, JointType, Link, LinkDescription,
    Shape,
};
pub use motion::{MotionDescription, MotionTrajectory, MultiSeq};
pub use state::KinematicState;
pub use transform::{Quaternion, Transform3D, Vec3};
