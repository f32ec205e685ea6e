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

//! Callback signers.
//!
//! A callback signer is an engine signer whose signing step is delegated to a
//! [`SignCallback`], typically a Kotlin object backed by Android Keystore or a
//! remote signing service.

use std::{
    ffi::{c_uchar, c_void, CString},
    fmt,
    panic::{catch_unwind, AssertUnwindSafe},
    ptr, slice,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex, MutexGuard,
    },
};

use log::{debug, error, warn};

use crate::{
    context_registry::ContextRegistry,
    engine::EngineApi,
    handle::SignerHandle,
    stream_bridge::{panic_message, MAX_TRANSFER_LEN},
    Error, Result, SigningAlg,
};

/// Produces a signature over the bytes the engine asks to sign.
pub trait SignCallback: Send + Sync {
    fn sign(&self, data: &[u8]) -> Result<Vec<u8>>;
}

impl<F> SignCallback for F
where
    F: Fn(&[u8]) -> Result<Vec<u8>> + Send + Sync,
{
    fn sign(&self, data: &[u8]) -> Result<Vec<u8>> {
        self(data)
    }
}

/// Native state for one callback signer.
///
/// The engine holds a pointer to this context for the signer's lifetime. Once
/// deactivated the callback is gone and every sign request fails.
pub struct SignerContext {
    active: AtomicBool,
    callback: Mutex<Option<Arc<dyn SignCallback>>>,
    alg: SigningAlg,
    engine: Arc<EngineApi>,
}

impl SignerContext {
    pub fn new(engine: Arc<EngineApi>, alg: SigningAlg, callback: Arc<dyn SignCallback>) -> Self {
        Self {
            active: AtomicBool::new(true),
            callback: Mutex::new(Some(callback)),
            alg,
            engine,
        }
    }

    pub fn alg(&self) -> SigningAlg {
        self.alg
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    fn lock_callback(&self) -> MutexGuard<'_, Option<Arc<dyn SignCallback>>> {
        self.callback.lock().unwrap_or_else(|poisoned| {
            warn!("signer callback lock poisoned, recovering");
            poisoned.into_inner()
        })
    }

    /// Marks the context inactive and hands back the callback.
    ///
    /// The flag is cleared before the callback is taken, so a concurrent
    /// [`SignerContext::sign`] that sees the callback also saw the flag set.
    pub fn deactivate(&self) -> Option<Arc<dyn SignCallback>> {
        self.active.store(false, Ordering::Release);
        self.lock_callback().take()
    }

    /// Signs `data` with the managed callback.
    pub fn sign(&self, data: &[u8]) -> Result<Vec<u8>> {
        if !self.is_active() {
            return Err(Error::InactiveSigner);
        }
        let callback = {
            let callback = self.lock_callback();
            if !self.is_active() {
                return Err(Error::InactiveSigner);
            }
            callback.clone().ok_or(Error::InactiveSigner)?
        };
        callback.sign(data)
    }
}

impl fmt::Debug for SignerContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignerContext")
            .field("active", &self.is_active())
            .field("alg", &self.alg)
            .finish_non_exhaustive()
    }
}

unsafe fn sign_into(
    context: &SignerContext,
    data: *const c_uchar,
    len: usize,
    signed_bytes: *mut c_uchar,
    signed_len: usize,
) -> Result<usize> {
    if len > MAX_TRANSFER_LEN {
        return Err(Error::BufferTooLarge {
            requested: len,
            limit: MAX_TRANSFER_LEN,
        });
    }
    if data.is_null() && len != 0 {
        return Err(Error::NilPointer("data to sign".to_string()));
    }
    if signed_bytes.is_null() {
        return Err(Error::NilPointer("signature buffer".to_string()));
    }

    let data = if len == 0 {
        &[][..]
    } else {
        slice::from_raw_parts(data, len)
    };
    let signature = context.sign(data)?;

    if signature.is_empty() {
        return Err(Error::NoSignature);
    }
    if signature.len() > signed_len {
        return Err(Error::SignatureTooLarge {
            len: signature.len(),
            capacity: signed_len,
        });
    }

    ptr::copy_nonoverlapping(signature.as_ptr(), signed_bytes, signature.len());
    Ok(signature.len())
}

/// The signer callback handed to the engine.
///
/// `context` is the [`SignerContext`] given to `c2pa_signer_create`.
pub(crate) unsafe extern "C" fn bridge_sign(
    context: *const c_void,
    data: *const c_uchar,
    len: usize,
    signed_bytes: *mut c_uchar,
    signed_len: usize,
) -> isize {
    let Some(context) = context.cast::<SignerContext>().as_ref() else {
        error!("sign called with a null context");
        return -1;
    };

    let result = catch_unwind(AssertUnwindSafe(|| {
        sign_into(context, data, len, signed_bytes, signed_len)
    }))
    .unwrap_or_else(|panic| Err(Error::Callback(panic_message(panic.as_ref()))));

    match result {
        Ok(len) => len as isize,
        Err(err) => {
            match err {
                Error::InactiveSigner => warn!("sign requested on a released signer"),
                _ => error!("{} sign failed: {err}", context.alg),
            }
            context.engine.set_last_error(&err);
            -1
        }
    }
}

/// Engine signers whose signing is done by a [`SignCallback`].
pub struct CallbackSigner;

impl CallbackSigner {
    /// Creates an engine signer that calls `callback` to sign.
    ///
    /// `certs` is the PEM certificate chain for the signing key. The returned
    /// handle must be released with [`CallbackSigner::release`].
    pub fn create(
        engine: &Arc<EngineApi>,
        registry: &ContextRegistry,
        callback: Arc<dyn SignCallback>,
        alg: SigningAlg,
        certs: &str,
        tsa_url: Option<&str>,
    ) -> Result<SignerHandle> {
        let certs = CString::new(certs)?;
        let tsa_url = tsa_url.map(CString::new).transpose()?;

        let context = Arc::new(SignerContext::new(engine.clone(), alg, callback));
        // The engine owns one strong reference until the signer is freed.
        let engine_ref = Arc::into_raw(context.clone());

        let signer = unsafe {
            (engine.c2pa_signer_create)(
                engine_ref.cast::<c_void>(),
                bridge_sign,
                alg.into(),
                certs.as_ptr(),
                tsa_url.as_ref().map_or(ptr::null(), |url| url.as_ptr()),
            )
        };

        let Some(handle) = SignerHandle::from_ptr(signer) else {
            let err = engine.error_or("Failed to create callback signer");
            context.deactivate();
            // Safety: the engine did not keep its reference.
            drop(unsafe { Arc::from_raw(engine_ref) });
            return Err(err);
        };

        debug!("created {alg} callback signer {handle:?}");
        registry.register(handle, context);
        Ok(handle)
    }

    /// Releases a signer created by the engine.
    ///
    /// A callback signer is deactivated before the engine frees it. Any later
    /// invocation of its sign callback fails with [`Error::InactiveSigner`]
    /// and never reaches the managed callback.
    ///
    /// # Safety
    /// `handle` must be a live signer from `engine` and is invalid after this
    /// call. No engine call using `handle` may be in flight: the engine's
    /// reference to the context is reclaimed here, so the caller must order
    /// release after every sign that uses the signer.
    pub unsafe fn release(engine: &EngineApi, registry: &ContextRegistry, handle: SignerHandle) {
        let context = registry.unregister(handle);
        engine.signer_free(handle);

        if let Some(context) = context {
            // Reclaim the reference given to the engine in `create`.
            drop(Arc::from_raw(Arc::as_ptr(&context)));
            debug!("released callback signer {handle:?}");
        }
    }
}
