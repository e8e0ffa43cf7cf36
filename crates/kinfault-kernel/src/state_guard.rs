//! [`KinematicStateGuard`] – scoped snapshot/restore of a body.
//!
//! The guard takes a [`KinematicState`] snapshot when created and writes it
//! back when dropped, so the body's joint and pose registers are restored on
//! every exit path of a replay: normal completion, early return, `?`, or an
//! unwinding panic.

use std::ops::{Deref, DerefMut};

use kinfault_body::{Body, KinematicState};
use tracing::trace;

/// Exclusive borrow of a [`Body`] that restores its kinematic state on drop.
pub struct KinematicStateGuard<'a> {
    body: &'a mut Body,
    snapshot: KinematicState,
}

impl<'a> KinematicStateGuard<'a> {
    pub fn new(body: &'a mut Body) -> Self {
        let snapshot = body.store_kinematic_state();
        Self { body, snapshot }
    }
}

impl Deref for KinematicStateGuard<'_> {
    type Target = Body;

    fn deref(&self) -> &Body {
        self.body
    }
}

impl DerefMut for KinematicStateGuard<'_> {
    fn deref_mut(&mut self) -> &mut Body {
        self.body
    }
}

impl Drop for KinematicStateGuard<'_> {
    fn drop(&mut self) {
        self.body.restore_kinematic_state(&self.snapshot);
        trace!(body = %self.body.name(), "kinematic state restored");
    }
}
