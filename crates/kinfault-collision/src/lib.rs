//! `kinfault-collision` – self-collision detection for replayed bodies.
//!
//! # Modules
//!
//! - [`backend`] – the [`CollisionBackend`][backend::CollisionBackend] trait
//!   plus [`GeometryHandle`][backend::GeometryHandle] and the unordered
//!   [`GeometryPair`][backend::GeometryPair] key.
//! - [`shapes`] – link primitives and poses as parry shapes and isometries.
//! - [`detector`] – [`AabbCollisionDetector`][detector::AabbCollisionDetector],
//!   the built-in sweep-and-prune backend.

pub mod backend;
pub mod detector;
pub mod shapes;

pub use backend::{CollisionBackend, CollisionPair, GeometryHandle, GeometryPair};
pub use detector::AabbCollisionDetector;
