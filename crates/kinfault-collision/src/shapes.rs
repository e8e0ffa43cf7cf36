//! Conversion of link primitives into parry shapes and poses.
//!
//! Capsules keep the body model's convention: the axis is local z and
//! `half_length` excludes the caps, which is exactly parry's
//! `capsule_z(half_height, radius)`.

use kinfault_body::{Shape, Transform3D};
use parry3d_f64::math::{Isometry, Real};
use parry3d_f64::na::{Quaternion, Translation3, UnitQuaternion};
use parry3d_f64::query;
use parry3d_f64::shape::SharedShape;
use tracing::warn;

/// parry shape for a link primitive.
pub fn shared_shape(shape: &Shape) -> SharedShape {
    match *shape {
        Shape::Sphere { radius } => SharedShape::ball(radius),
        Shape::Box { half_extents } => {
            SharedShape::cuboid(half_extents.x, half_extents.y, half_extents.z)
        }
        Shape::Capsule {
            radius,
            half_length,
        } => SharedShape::capsule_z(half_length, radius),
    }
}

/// parry isometry for a body-frame pose.
pub fn isometry(pose: &Transform3D) -> Isometry<Real> {
    let t = pose.translation;
    let r = pose.rotation;
    Isometry::from_parts(
        Translation3::new(t.x, t.y, t.z),
        UnitQuaternion::from_quaternion(Quaternion::new(r.w, r.x, r.y, r.z)),
    )
}

/// True when the two placed shapes intersect or touch.
///
/// A shape pair parry cannot test is reported as not intersecting.
pub fn intersects(
    pos_a: &Isometry<Real>,
    a: &SharedShape,
    pos_b: &Isometry<Real>,
    b: &SharedShape,
) -> bool {
    match query::intersection_test(pos_a, &**a, pos_b, &**b) {
        Ok(hit) => hit,
        Err(e) => {
            warn!(error = ?e, "unsupported shape pair in intersection test");
            false
        }
    }
}
