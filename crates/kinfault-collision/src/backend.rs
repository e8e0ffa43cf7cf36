//! The pluggable collision-detection capability.
//!
//! A [`CollisionBackend`] is seeded once with a body's link geometries,
//! then driven once per frame:
//!
//! 1. [`update_positions`][CollisionBackend::update_positions] – pull the
//!    current link poses from the body.
//! 2. [`detect_collisions`][CollisionBackend::detect_collisions] – invoke a
//!    callback once per currently-overlapping geometry pair.
//!
//! Overlaps are identified by a [`GeometryPair`], whose equality and hash
//! ignore the order of its two handles.

use kinfault_body::Body;
use kinfault_types::FaultError;

/// Opaque handle to one geometry registered with a backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GeometryHandle(usize);

impl GeometryHandle {
    pub fn new(index: usize) -> Self {
        Self(index)
    }
}

/// Unordered pair of geometry handles: `(a, b)` and `(b, a)` are the same
/// pair.  The handles are stored sorted so derived `Eq`/`Hash`/`Ord` are
/// order-independent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GeometryPair(GeometryHandle, GeometryHandle);

impl GeometryPair {
    pub fn new(a: GeometryHandle, b: GeometryHandle) -> Self {
        if a <= b { Self(a, b) } else { Self(b, a) }
    }
}

/// One overlap reported by a backend.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CollisionPair {
    /// The colliding geometries, in the order the backend found them.
    pub geometries: [GeometryHandle; 2],
    /// Index of the link owning each geometry (same order as `geometries`).
    pub links: [usize; 2],
}

impl CollisionPair {
    /// Order-independent key for this overlap.
    pub fn geometry_pair(&self) -> GeometryPair {
        GeometryPair::new(self.geometries[0], self.geometries[1])
    }
}

/// A synchronous self-collision detector.
///
/// Implementations own whatever caches or bounding structures they need.
/// The body is passed by reference on every update because its pose
/// registers are mutated between frames by the caller.
pub trait CollisionBackend {
    /// Short name used in log messages.
    fn name(&self) -> &str;

    /// Register the geometries of `body`.  With `is_self` set, the body's
    /// links are tested against each other.
    ///
    /// # Errors
    ///
    /// Returns [`FaultError::Collision`] when the backend cannot accept the
    /// body.
    fn add_body(&mut self, body: &Body, is_self: bool) -> Result<(), FaultError>;

    /// Finish setup after all bodies are added.
    ///
    /// # Errors
    ///
    /// Returns [`FaultError::Collision`] when no usable geometry pairs exist;
    /// callers treat this as "collision checking unavailable".
    fn make_ready(&mut self) -> Result<(), FaultError>;

    /// Refresh geometry poses from the body's current link poses.
    fn update_positions(&mut self, body: &Body);

    /// Call `callback` once per currently-overlapping geometry pair.
    fn detect_collisions(&mut self, callback: &mut dyn FnMut(&CollisionPair));
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn geometry_pair_ignores_order() {
        let a = GeometryHandle::new(3);
        let b = GeometryHandle::new(9);
        assert_eq!(GeometryPair::new(a, b), GeometryPair::new(b, a));
        assert_eq!(GeometryPair::new(b, a), GeometryPair(a, b));
    }

    #[test]
    fn geometry_pair_hashes_to_same_slot() {
        let a = GeometryHandle::new(1);
        let b = GeometryHandle::new(2);
        let mut frames = HashMap::new();
        frames.insert(GeometryPair::new(a, b), 10);
        *frames.get_mut(&GeometryPair::new(b, a)).unwrap() = 11;
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[&GeometryPair::new(a, b)], 11);
    }

    #[test]
    fn collision_pair_key_is_order_independent() {
        let forward = CollisionPair {
            geometries: [GeometryHandle::new(0), GeometryHandle::new(4)],
            links: [1, 5],
        };
        let backward = CollisionPair {
            geometries: [GeometryHandle::new(4), GeometryHandle::new(0)],
            links: [5, 1],
        };
        assert_eq!(forward.geometry_pair(), backward.geometry_pair());
    }

    #[test]
    fn handle_display() {
        assert_eq!(GeometryHandle::new(7).to_string(), "g7");
    }
}
