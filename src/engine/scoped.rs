//! Owned resource handles with a single release path

use std::ops::{Deref, DerefMut};

use crate::ports::{CameraHandle, MediaElement};

/// Something holding decoder state, devices or temporary buffers
pub trait Releasable {
    fn release_resources(&mut self);
}

impl Releasable for Box<dyn MediaElement> {
    fn release_resources(&mut self) {
        self.release();
    }
}

impl Releasable for Box<dyn CameraHandle> {
    fn release_resources(&mut self) {
        self.release();
    }
}

/// Guard that releases its resource when dropped, on every exit path
pub struct Scoped<T: Releasable> {
    inner: T,
}

/// Detached playback element
pub type ScopedElement = Scoped<Box<dyn MediaElement>>;

/// Acquired camera
pub type ScopedCamera = Scoped<Box<dyn CameraHandle>>;

impl<T: Releasable> Scoped<T> {
    pub fn new(inner: T) -> Self {
        Self { inner }
    }
}

impl<T: Releasable> Deref for Scoped<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.inner
    }
}

impl<T: Releasable> DerefMut for Scoped<T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.inner
    }
}

impl<T: Releasable> Drop for Scoped<T> {
    fn drop(&mut self) {
        self.inner.release_resources();
    }
}
