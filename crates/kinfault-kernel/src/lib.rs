//! `kinfault-kernel` – the kinematic fault detection engine.
//!
//! Replays a [`MotionTrajectory`][kinfault_body::MotionTrajectory] on a
//! [`Body`][kinfault_body::Body] and reports joint position faults, joint
//! velocity faults and self-collisions, one report per fault episode.
//!
//! # Modules
//!
//! - [`config`] – [`CheckConfig`][config::CheckConfig], link selection and
//!   frame-range resolution.
//! - [`limits`] – the [`JointRule`][limits::JointRule] trait, built-in
//!   position/velocity rules, and the debouncing
//!   [`LimitVerifier`][limits::LimitVerifier].
//! - [`debounce`] – [`OnsetTracker`][debounce::OnsetTracker], onset-only
//!   reporting keyed by joint or geometry pair.
//! - [`state_guard`] – [`KinematicStateGuard`][state_guard::KinematicStateGuard],
//!   scoped snapshot/restore of the body.
//! - [`reporter`] – [`FaultReporter`][reporter::FaultReporter] sinks.
//! - [`checker`] – [`FaultChecker`][checker::FaultChecker], the frame replay
//!   driver.

pub mod checker;
pub mod config;
pub mod debounce;
pub mod limits;
pub mod reporter;
pub mod state_guard;

pub use checker::{BackendFactory, CheckReport, FaultChecker};
pub use config::{CheckConfig, CheckRange, FrameRange, LinkSelection};
pub use reporter::{FaultReporter, Tee, TracingReporter, WriterReporter};
