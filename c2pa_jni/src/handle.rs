// Copyright 2025 Adobe. All rights reserved.
// This file is licensed to you under the Apache License,
// Version 2.0 (http://www.apache.org/licenses/LICENSE-2.0)
// or the MIT license (http://opensource.org/licenses/MIT),
// at your option.

// Unless required by applicable law or agreed to in writing,
// this software is distributed on an "AS IS" BASIS, WITHOUT
// WARRANTIES OR REPRESENTATIONS OF ANY KIND, either express or
// implied. See the LICENSE-MIT and LICENSE-APACHE files for the
// specific language governing permissions and limitations under
// each license.

//! Opaque native handles.
//!
//! Kotlin holds native resources as `long` values. A handle is only ever
//! converted back to the pointer it came from; it is never interpreted or
//! offset.

use std::{fmt, hash::Hash, marker::PhantomData, num::NonZeroUsize, ptr::NonNull};

use jni::sys::jlong;

use crate::{
    engine::C2paSigner,
    manifest::{EngineBuilder, EngineReader},
    stream_bridge::BridgeStream,
};

/// An opaque, non-null address of a native `T`.
pub struct NativeHandle<T> {
    addr: NonZeroUsize,
    _marker: PhantomData<fn() -> T>,
}

/// Handle to a [`BridgeStream`] owned by a Kotlin `Stream`.
pub type StreamHandle = NativeHandle<BridgeStream>;

/// Handle to a signer allocated by the native engine.
pub type SignerHandle = NativeHandle<C2paSigner>;

pub type ReaderHandle = NativeHandle<EngineReader>;

pub type BuilderHandle = NativeHandle<EngineBuilder>;

impl<T> NativeHandle<T> {
    /// Wraps a pointer, returning `None` for null.
    pub fn from_ptr(ptr: *const T) -> Option<Self> {
        NonZeroUsize::new(ptr as usize).map(|addr| Self {
            addr,
            _marker: PhantomData,
        })
    }

    pub fn from_non_null(ptr: NonNull<T>) -> Self {
        Self {
            // Safety: `NonNull` is never zero.
            addr: unsafe { NonZeroUsize::new_unchecked(ptr.as_ptr() as usize) },
            _marker: PhantomData,
        }
    }

    /// Leaks `value` and returns a handle to it.
    ///
    /// The owner must eventually rebuild the box with `Box::from_raw(handle.as_ptr())`.
    pub fn from_box(value: Box<T>) -> Self {
        Self::from_non_null(NonNull::from(Box::leak(value)))
    }

    /// Wraps a `long` received from Java, returning `None` for 0.
    pub fn from_jlong(value: jlong) -> Option<Self> {
        Self::from_ptr(value as usize as *const T)
    }

    pub fn as_ptr(&self) -> *mut T {
        self.addr.get() as *mut T
    }

    pub fn to_jlong(&self) -> jlong {
        self.addr.get() as jlong
    }
}

impl<T> Clone for NativeHandle<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for NativeHandle<T> {}

impl<T> PartialEq for NativeHandle<T> {
    fn eq(&self, other: &Self) -> bool {
        self.addr == other.addr
    }
}

impl<T> Eq for NativeHandle<T> {}

impl<T> Hash for NativeHandle<T> {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.addr.hash(state);
    }
}

impl<T> fmt::Debug for NativeHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NativeHandle({:#x})", self.addr.get())
    }
}
