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

//! Stream callbacks handed to the engine.
//!
//! The engine drives a [`BridgeStream`] through four C callbacks. Each one
//! resolves its context back to a [`ManagedStream`], validates the request,
//! and converts every failure into a `-1` sentinel after recording the reason
//! as the engine's last error.

use std::{
    any::Any,
    ffi::c_int,
    io::{Cursor, Read, Seek, SeekFrom, Write},
    panic::{catch_unwind, AssertUnwindSafe},
    ptr::{self, NonNull},
    slice,
    sync::{Arc, Mutex, MutexGuard},
};

use log::{error, trace, warn};

use crate::{
    engine::{C2paStream, EngineApi, StreamContext},
    handle::StreamHandle,
    Error, Result,
};

/// The largest transfer a single callback may request.
///
/// JNI arrays are indexed by a signed 32-bit `jsize`.
pub const MAX_TRANSFER_LEN: usize = i32::MAX as usize;

/// Defines the seek mode for the seek callback.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SeekMode {
    /// Seeks from the start of the stream.
    Start = 0,

    /// Seeks from the current position in the stream.
    Current = 1,

    /// Seeks from the end of the stream.
    End = 2,
}

impl TryFrom<c_int> for SeekMode {
    type Error = Error;

    fn try_from(mode: c_int) -> Result<Self> {
        match mode {
            0 => Ok(Self::Start),
            1 => Ok(Self::Current),
            2 => Ok(Self::End),
            _ => Err(Error::InvalidArgument(format!("invalid seek mode: {mode}"))),
        }
    }
}

/// A byte stream implemented on the managed side.
///
/// Each method mirrors a Kotlin `Stream` method and returns the value that
/// method reports.
pub trait ManagedStream: Send {
    /// Reads up to `buf.len()` bytes, returning the count read. 0 means end of stream.
    fn read(&mut self, buf: &mut [u8]) -> Result<i64>;

    /// Moves the stream position, returning the new absolute position.
    fn seek(&mut self, offset: i64, mode: SeekMode) -> Result<i64>;

    /// Writes `data`, returning the count written.
    fn write(&mut self, data: &[u8]) -> Result<i64>;

    fn flush(&mut self) -> Result<i64>;
}

/// Adapts any std stream to [`ManagedStream`].
#[derive(Debug, Default)]
pub struct IoStream<T>(T);

/// An in-memory stream.
pub type MemoryStream = IoStream<Cursor<Vec<u8>>>;

impl<T> IoStream<T> {
    pub fn new(inner: T) -> Self {
        Self(inner)
    }

    pub fn get_ref(&self) -> &T {
        &self.0
    }

    pub fn into_inner(self) -> T {
        self.0
    }
}

impl MemoryStream {
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self(Cursor::new(bytes))
    }
}

impl<T> ManagedStream for IoStream<T>
where
    T: Read + Write + Seek + Send,
{
    fn read(&mut self, buf: &mut [u8]) -> Result<i64> {
        Ok(self.0.read(buf)? as i64)
    }

    fn seek(&mut self, offset: i64, mode: SeekMode) -> Result<i64> {
        let pos = match mode {
            SeekMode::Start => SeekFrom::Start(u64::try_from(offset).map_err(|_| {
                Error::InvalidArgument(format!("cannot seek to negative position {offset}"))
            })?),
            SeekMode::Current => SeekFrom::Current(offset),
            SeekMode::End => SeekFrom::End(offset),
        };
        let pos = self.0.seek(pos)?;
        i64::try_from(pos).map_err(|_| Error::Io(format!("stream position {pos} overflows")))
    }

    fn write(&mut self, data: &[u8]) -> Result<i64> {
        self.0.write_all(data)?;
        Ok(data.len() as i64)
    }

    fn flush(&mut self) -> Result<i64> {
        self.0.flush()?;
        Ok(0)
    }
}

/// The context the engine passes back to every stream callback.
struct StreamState {
    engine: Arc<EngineApi>,
    stream: Mutex<Box<dyn ManagedStream>>,
}

impl StreamState {
    fn lock(&self) -> MutexGuard<'_, Box<dyn ManagedStream>> {
        self.stream.lock().unwrap_or_else(|poisoned| {
            warn!("stream lock poisoned, recovering");
            poisoned.into_inner()
        })
    }
}

/// An engine stream backed by a [`ManagedStream`].
///
/// Owns both the engine's stream object and the callback context. Dropping it
/// releases the engine stream first, then the context.
pub struct BridgeStream {
    engine: Arc<EngineApi>,
    stream: NonNull<C2paStream>,
    context: NonNull<StreamState>,
}

// Safety: the engine stream is only used through `&self` by one engine call
// at a time, and the managed stream is behind a mutex.
unsafe impl Send for BridgeStream {}
unsafe impl Sync for BridgeStream {}

impl BridgeStream {
    /// Creates an engine stream whose callbacks dispatch to `managed`.
    pub fn new(engine: Arc<EngineApi>, managed: Box<dyn ManagedStream>) -> Result<Self> {
        let context = NonNull::from(Box::leak(Box::new(StreamState {
            engine: engine.clone(),
            stream: Mutex::new(managed),
        })));

        let stream = unsafe {
            (engine.c2pa_create_stream)(
                context.as_ptr().cast::<StreamContext>(),
                bridge_read,
                bridge_seek,
                bridge_write,
                bridge_flush,
            )
        };

        match NonNull::new(stream) {
            Some(stream) => Ok(Self {
                engine,
                stream,
                context,
            }),
            None => {
                let err = engine.error_or("Failed to create C2PA stream");
                // Safety: the engine did not keep the context.
                drop(unsafe { Box::from_raw(context.as_ptr()) });
                Err(err)
            }
        }
    }

    /// The engine's stream object, for passing to engine calls.
    pub fn engine_stream(&self) -> *mut C2paStream {
        self.stream.as_ptr()
    }

    /// Moves the stream to the heap and returns a handle for Kotlin to hold.
    pub fn into_handle(self) -> StreamHandle {
        StreamHandle::from_box(Box::new(self))
    }

    /// Borrows the stream behind `handle`.
    ///
    /// # Safety
    /// `handle` must come from [`BridgeStream::into_handle`] and not have been released.
    pub unsafe fn from_handle<'a>(handle: StreamHandle) -> &'a BridgeStream {
        &*handle.as_ptr()
    }

    /// Releases the stream behind `handle`.
    ///
    /// # Safety
    /// `handle` must come from [`BridgeStream::into_handle`] and is invalid after this call.
    pub unsafe fn release(handle: StreamHandle) {
        drop(Box::from_raw(handle.as_ptr()));
    }
}

impl Drop for BridgeStream {
    fn drop(&mut self) {
        unsafe {
            (self.engine.c2pa_release_stream)(self.stream.as_ptr());
            drop(Box::from_raw(self.context.as_ptr()));
        }
    }
}

pub(crate) fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(msg) = panic.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = panic.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Validates a transfer length received from the engine.
fn transfer_len(len: isize) -> Result<usize> {
    let len = usize::try_from(len)
        .map_err(|_| Error::InvalidArgument(format!("negative transfer length {len}")))?;
    if len > MAX_TRANSFER_LEN {
        return Err(Error::BufferTooLarge {
            requested: len,
            limit: MAX_TRANSFER_LEN,
        });
    }
    Ok(len)
}

/// Allocates a zeroed transfer buffer.
///
/// Uses `try_reserve_exact` so a request the process cannot satisfy fails the
/// single callback instead of aborting the process.
fn try_allocate(len: usize) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    buf.try_reserve_exact(len)
        .map_err(|err| Error::OutOfMemory(format!("cannot allocate {len} byte buffer: {err}")))?;
    buf.resize(len, 0);
    Ok(buf)
}

/// Runs a stream operation for a callback, never unwinding into the engine.
unsafe fn guarded<F>(context: *mut StreamContext, op: &str, f: F) -> isize
where
    F: FnOnce(&mut dyn ManagedStream) -> Result<i64>,
{
    let Some(state) = context.cast::<StreamState>().as_ref() else {
        error!("stream {op} called with a null context");
        return -1;
    };

    let result = catch_unwind(AssertUnwindSafe(|| {
        let mut stream = state.lock();
        f(&mut **stream)
    }))
    .unwrap_or_else(|panic| Err(Error::Callback(panic_message(panic.as_ref()))))
    .and_then(|value| {
        isize::try_from(value)
            .map_err(|_| Error::Io(format!("{op} result {value} does not fit the engine ABI")))
    });

    match result {
        Ok(value) => value,
        Err(err) => {
            error!("stream {op} failed: {err}");
            state.engine.set_last_error(&err);
            -1
        }
    }
}

/// Checks a count reported by the managed side.
fn reported(op: &str, value: i64) -> Result<i64> {
    if value < 0 {
        return Err(Error::Callback(format!("stream {op} reported {value}")));
    }
    Ok(value)
}

pub(crate) unsafe extern "C" fn bridge_read(
    context: *mut StreamContext,
    data: *mut u8,
    len: isize,
) -> isize {
    guarded(context, "read", |stream| {
        let len = transfer_len(len)?;
        if len == 0 {
            return Ok(0);
        }
        if data.is_null() {
            return Err(Error::NilPointer("read buffer".to_string()));
        }

        let mut buf = try_allocate(len)?;
        let count = reported("read", stream.read(&mut buf)?)?;
        let count = match usize::try_from(count) {
            Ok(count) if count <= len => count,
            // Only `len` bytes fit in the engine's buffer, so report what was copied.
            _ => {
                warn!("stream read reported {count} bytes for a {len} byte request");
                len
            }
        };
        trace!("stream read {count}/{len}");

        ptr::copy_nonoverlapping(buf.as_ptr(), data, count);
        Ok(count as i64)
    })
}

pub(crate) unsafe extern "C" fn bridge_seek(
    context: *mut StreamContext,
    offset: isize,
    mode: c_int,
) -> isize {
    guarded(context, "seek", |stream| {
        let mode = SeekMode::try_from(mode)?;
        reported("seek", stream.seek(offset as i64, mode)?)
    })
}

pub(crate) unsafe extern "C" fn bridge_write(
    context: *mut StreamContext,
    data: *const u8,
    len: isize,
) -> isize {
    guarded(context, "write", |stream| {
        let len = transfer_len(len)?;
        if len == 0 {
            return Ok(0);
        }
        if data.is_null() {
            return Err(Error::NilPointer("write buffer".to_string()));
        }

        let data = slice::from_raw_parts(data, len);
        reported("write", stream.write(data)?)
    })
}

pub(crate) unsafe extern "C" fn bridge_flush(context: *mut StreamContext) -> isize {
    guarded(context, "flush", |stream| reported("flush", stream.flush()?))
}
