//! Atomic building blocks for the shared `static` test data.
//!
//! Only plain loads and stores are used: 8-bit targets have no
//! compare-and-swap. Read-modify-write sequences are made exclusive by the run
//! claim in `context`.

use core::marker::PhantomData;
use core::ptr;
use core::sync::atomic::{AtomicPtr, Ordering};

/// An `Option<&'static T>` that can be re-pointed through a shared reference.
pub(crate) struct StaticLink<T: 'static> {
    ptr: AtomicPtr<T>,
    _marker: PhantomData<&'static T>,
}

impl<T: 'static> StaticLink<T> {
    pub const fn new() -> Self {
        Self {
            ptr: AtomicPtr::new(ptr::null_mut()),
            _marker: PhantomData,
        }
    }

    pub fn get(&self) -> Option<&'static T> {
        // SAFETY: only null or pointers taken from a `&'static T` are stored,
        // and nothing is ever written through them.
        unsafe { self.ptr.load(Ordering::Acquire).as_ref() }
    }

    pub fn set(&self, value: Option<&'static T>) {
        let raw = value.map_or(ptr::null_mut(), |value| ptr::from_ref(value).cast_mut());
        self.ptr.store(raw, Ordering::Release);
    }
}

#[cfg(target_has_atomic = "32")]
pub(crate) type Epoch = u32;
#[cfg(target_has_atomic = "32")]
pub(crate) type AtomicEpoch = core::sync::atomic::AtomicU32;

#[cfg(not(target_has_atomic = "32"))]
pub(crate) type Epoch = u16;
#[cfg(not(target_has_atomic = "32"))]
pub(crate) type AtomicEpoch = core::sync::atomic::AtomicU16;
