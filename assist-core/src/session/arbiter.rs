//! Mutual exclusion for the camera peripheral.
//!
//! The camera is the only hardware both tasks touch. The driver lives inside the
//! arbiter and can only be reached through a [`CameraLease`], so an unleased
//! capture does not compile. A lease is released when it drops, on every exit
//! path including unwinding.

use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use parking_lot::{Mutex, MutexGuard};

use crate::traits::camera::CameraDriver;

pub struct CameraArbiter<C: CameraDriver> {
    camera: Mutex<C>,
    outstanding: AtomicUsize,
    granted: AtomicU64,
}

impl<C: CameraDriver> CameraArbiter<C> {
    pub fn new(camera: C) -> Self {
        Self {
            camera: Mutex::new(camera),
            outstanding: AtomicUsize::new(0),
            granted: AtomicU64::new(0),
        }
    }

    /// Block until the camera is free and take it.
    pub fn acquire_camera(&self) -> CameraLease<'_, C> {
        let guard = self.camera.lock();
        self.grant(guard)
    }

    /// Like [`acquire_camera`](Self::acquire_camera) with a bounded wait.
    pub fn try_acquire_camera_for(&self, timeout: Duration) -> Option<CameraLease<'_, C>> {
        self.camera
            .try_lock_for(timeout)
            .map(|guard| self.grant(guard))
    }

    /// Leases currently held. Never more than one.
    pub fn outstanding_leases(&self) -> usize {
        self.outstanding.load(Ordering::SeqCst)
    }

    /// Leases handed out since construction.
    pub fn leases_granted(&self) -> u64 {
        self.granted.load(Ordering::SeqCst)
    }

    /// Take the driver back, e.g. to power the sensor down at shutdown.
    pub fn into_inner(self) -> C {
        self.camera.into_inner()
    }

    fn grant<'a>(&'a self, guard: MutexGuard<'a, C>) -> CameraLease<'a, C> {
        let previous = self.outstanding.fetch_add(1, Ordering::SeqCst);
        debug_assert_eq!(previous, 0, "camera lease granted twice");
        self.granted.fetch_add(1, Ordering::SeqCst);
        CameraLease {
            guard,
            outstanding: &self.outstanding,
        }
    }
}

/// Exclusive right to use the camera. Dereferences to the driver.
pub struct CameraLease<'a, C: CameraDriver> {
    guard: MutexGuard<'a, C>,
    outstanding: &'a AtomicUsize,
}

impl<C: CameraDriver> Deref for CameraLease<'_, C> {
    type Target = C;

    fn deref(&self) -> &C {
        &self.guard
    }
}

impl<C: CameraDriver> DerefMut for CameraLease<'_, C> {
    fn deref_mut(&mut self) -> &mut C {
        &mut self.guard
    }
}

impl<C: CameraDriver> Drop for CameraLease<'_, C> {
    fn drop(&mut self) {
        // Runs before `guard` is dropped, so the count is back to zero by the
        // time another task can lock the camera.
        self.outstanding.fetch_sub(1, Ordering::SeqCst);
    }
}
