//! Built-in self-collision detector.
//!
//! [`AabbCollisionDetector`] tests the primitive geometries attached to a
//! body's links against each other:
//!
//! 1. **Broad phase** – world AABBs are projected on the x axis, sorted by
//!    their minimum endpoint, and swept to find overlapping intervals.
//! 2. **Filter** – pairs on the same link are never tested; parent/child
//!    pairs are skipped unless [`with_adjacent_links`][AabbCollisionDetector::with_adjacent_links]
//!    is enabled, since neighbouring links usually touch at the joint.
//! 3. **Narrow phase** – surviving pairs go through parry's exact
//!    intersection test via [`crate::shapes::intersects`].
//!
//! Overlaps are reported sorted by geometry handle so repeated runs produce
//! the same sequence.

use std::collections::HashSet;
use std::fmt;

use kinfault_body::{Body, Geometry, Transform3D};
use kinfault_types::FaultError;
use parry3d_f64::bounding_volume::{Aabb, BoundingVolume};
use parry3d_f64::math::{Isometry, Real};
use parry3d_f64::shape::SharedShape;
use tracing::debug;

use crate::backend::{CollisionBackend, CollisionPair, GeometryHandle};
use crate::shapes;

#[derive(Clone)]
struct Entry {
    handle: GeometryHandle,
    link: usize,
    geometry: Geometry,
    shape: SharedShape,
    pose: Isometry<Real>,
    aabb: Aabb,
}

impl Entry {
    fn place(&mut self, link_pose: Transform3D) {
        self.pose = shapes::isometry(&link_pose.compose(self.geometry.origin));
        self.aabb = self.shape.compute_aabb(&self.pose);
    }
}

impl fmt::Debug for Entry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Entry")
            .field("handle", &self.handle)
            .field("link", &self.link)
            .field("geometry", &self.geometry)
            .field("aabb", &self.aabb)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, Copy)]
struct Interval {
    entry: usize,
    min: f64,
    max: f64,
}

/// Sweep-and-prune self-collision detector over link primitives.
#[derive(Debug, Clone, Default)]
pub struct AabbCollisionDetector {
    entries: Vec<Entry>,
    adjacent: HashSet<(usize, usize)>,
    include_adjacent: bool,
    self_collision: bool,
    body_added: bool,
    ready: bool,
    intervals: Vec<Interval>,
}

impl AabbCollisionDetector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Also test parent/child link pairs.
    pub fn with_adjacent_links(mut self, include: bool) -> Self {
        self.include_adjacent = include;
        self
    }

    fn link_pair_allowed(&self, a: usize, b: usize) -> bool {
        if a == b {
            return false;
        }
        self.include_adjacent || !self.adjacent.contains(&(a.min(b), a.max(b)))
    }

    fn has_candidate_pair(&self) -> bool {
        self.entries.iter().enumerate().any(|(i, a)| {
            self.entries[i + 1..]
                .iter()
                .any(|b| self.link_pair_allowed(a.link, b.link))
        })
    }
}

impl CollisionBackend for AabbCollisionDetector {
    fn name(&self) -> &str {
        "aabb-sap"
    }

    fn add_body(&mut self, body: &Body, is_self: bool) -> Result<(), FaultError> {
        if self.body_added {
            return Err(FaultError::Collision(format!(
                "detector already holds a body; cannot add '{}'",
                body.name()
            )));
        }
        for link in body.links() {
            if let Some(parent) = link.parent() {
                let i = link.index();
                self.adjacent.insert((parent.min(i), parent.max(i)));
            }
            for geometry in link.geometry() {
                let mut entry = Entry {
                    handle: GeometryHandle::new(self.entries.len()),
                    link: link.index(),
                    geometry: *geometry,
                    shape: shapes::shared_shape(&geometry.shape),
                    pose: Isometry::identity(),
                    aabb: Aabb::new_invalid(),
                };
                entry.place(link.pose);
                self.entries.push(entry);
            }
        }
        self.self_collision = is_self;
        self.body_added = true;
        self.ready = false;
        debug!(
            body = body.name(),
            geometries = self.entries.len(),
            "collision body added"
        );
        Ok(())
    }

    fn make_ready(&mut self) -> Result<(), FaultError> {
        if !self.body_added {
            return Err(FaultError::Collision("no body has been added".to_string()));
        }
        if !self.self_collision {
            return Err(FaultError::Collision(
                "self-collision is disabled for the only body".to_string(),
            ));
        }
        let links_with_geometry: HashSet<usize> = self.entries.iter().map(|e| e.link).collect();
        if links_with_geometry.len() < 2 {
            return Err(FaultError::Collision(format!(
                "{} link(s) carry collision geometry; at least two are required",
                links_with_geometry.len()
            )));
        }
        if !self.has_candidate_pair() {
            return Err(FaultError::Collision(
                "every geometry pair is excluded as same-link or adjacent".to_string(),
            ));
        }
        self.intervals = Vec::with_capacity(self.entries.len());
        self.ready = true;
        Ok(())
    }

    fn update_positions(&mut self, body: &Body) {
        for entry in &mut self.entries {
            let Some(link) = body.links().get(entry.link) else {
                continue;
            };
            entry.place(link.pose);
        }
    }

    fn detect_collisions(&mut self, callback: &mut dyn FnMut(&CollisionPair)) {
        if !self.ready {
            debug!("detect_collisions called before make_ready; ignoring");
            return;
        }

        self.intervals.clear();
        self.intervals
            .extend(self.entries.iter().enumerate().map(|(i, e)| Interval {
                entry: i,
                min: e.aabb.mins.x,
                max: e.aabb.maxs.x,
            }));
        self.intervals.sort_by(|a, b| a.min.total_cmp(&b.min));

        let mut hits: Vec<(usize, usize)> = Vec::new();
        for (i, lhs) in self.intervals.iter().enumerate() {
            for rhs in &self.intervals[i + 1..] {
                if rhs.min > lhs.max {
                    break;
                }
                let a = &self.entries[lhs.entry];
                let b = &self.entries[rhs.entry];
                if !self.link_pair_allowed(a.link, b.link) || !a.aabb.intersects(&b.aabb) {
                    continue;
                }
                if shapes::intersects(&a.pose, &a.shape, &b.pose, &b.shape) {
                    hits.push((lhs.entry.min(rhs.entry), lhs.entry.max(rhs.entry)));
                }
            }
        }
        hits.sort_unstable();

        for (a, b) in hits {
            let (a, b) = (&self.entries[a], &self.entries[b]);
            callback(&CollisionPair {
                geometries: [a.handle, b.handle],
                links: [a.link, b.link],
            });
        }
    }
}
