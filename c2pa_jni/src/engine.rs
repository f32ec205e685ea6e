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

//! The C API of the prebuilt c2pa engine.
//!
//! The engine is loaded at runtime and its exports are copied into an
//! [`EngineApi`] table. Every pointer returned by the engine must be handed
//! back to the engine's matching free function; nothing here is freed by Rust.

use std::{
    ffi::{c_char, c_int, c_uchar, c_void, CStr, CString},
    fmt,
    path::Path,
    ptr,
};

use libloading::{Library, Symbol};
use log::{debug, warn};

use crate::{handle::SignerHandle, signer_info::SignerInfo, Error, Result};

/// Length of an Ed25519 signature produced by the engine.
pub const ED25519_SIGNATURE_LEN: usize = 64;

#[repr(C)]
#[derive(Debug)]
/// An opaque struct to hold a context value for the stream callbacks.
pub struct StreamContext {
    _private: [u8; 0],
}

#[repr(C)]
#[derive(Debug)]
/// An engine stream wrapping a set of callbacks.
pub struct C2paStream {
    _private: [u8; 0],
}

#[repr(C)]
#[derive(Debug)]
pub struct C2paSigner {
    _private: [u8; 0],
}

#[repr(C)]
#[derive(Debug)]
pub struct C2paReader {
    _private: [u8; 0],
}

#[repr(C)]
#[derive(Debug)]
pub struct C2paBuilder {
    _private: [u8; 0],
}

/// Signing algorithm as encoded across the engine ABI.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum C2paSigningAlg {
    Es256,
    Es384,
    Es512,
    Ps256,
    Ps384,
    Ps512,
    Ed25519,
}

/// Certificate and key material for a signer the engine creates itself.
///
/// Every field is a NUL-terminated string; `ta_url` may be null.
#[repr(C)]
#[derive(Debug)]
pub struct C2paSignerInfo {
    pub alg: *const c_char,
    pub sign_cert: *const c_char,
    pub private_key: *const c_char,
    pub ta_url: *const c_char,
}

/// Reads up to `len` bytes into `data`.
///
/// The return value is the number of bytes read, or a negative number for an error.
pub type ReadCallback =
    unsafe extern "C" fn(context: *mut StreamContext, data: *mut u8, len: isize) -> isize;

/// Seeks to an offset in a stream.
///
/// `mode` is a raw seek mode; out of range values must be rejected by the callee.
/// The return value is the new position in the stream, or a negative number for an error.
pub type SeekCallback =
    unsafe extern "C" fn(context: *mut StreamContext, offset: isize, mode: c_int) -> isize;

/// Writes `len` bytes from `data`.
///
/// The return value is the number of bytes written, or a negative number for an error.
pub type WriteCallback =
    unsafe extern "C" fn(context: *mut StreamContext, data: *const u8, len: isize) -> isize;

/// The return value is 0 for success, or a negative number for an error.
pub type FlushCallback = unsafe extern "C" fn(context: *mut StreamContext) -> isize;

/// Signs `len` bytes of `data` into `signed_bytes`, which holds `signed_len` bytes.
///
/// The return value is the signature length, or a negative number for an error.
pub type SignerCallback = unsafe extern "C" fn(
    context: *const c_void,
    data: *const c_uchar,
    len: usize,
    signed_bytes: *mut c_uchar,
    signed_len: usize,
) -> isize;

/// Function table for the engine's exported C API.
pub struct EngineApi {
    pub(crate) c2pa_version: unsafe extern "C" fn() -> *mut c_char,
    pub(crate) c2pa_error: unsafe extern "C" fn() -> *mut c_char,
    pub(crate) c2pa_error_set_last: unsafe extern "C" fn(error_str: *const c_char) -> c_int,
    pub(crate) c2pa_string_free: unsafe extern "C" fn(s: *mut c_char),
    pub(crate) c2pa_load_settings:
        unsafe extern "C" fn(settings: *const c_char, format: *const c_char) -> c_int,
    pub(crate) c2pa_read_file:
        unsafe extern "C" fn(path: *const c_char, data_dir: *const c_char) -> *mut c_char,
    pub(crate) c2pa_read_ingredient_file:
        unsafe extern "C" fn(path: *const c_char, data_dir: *const c_char) -> *mut c_char,
    pub(crate) c2pa_sign_file: unsafe extern "C" fn(
        source_path: *const c_char,
        dest_path: *const c_char,
        manifest: *const c_char,
        signer_info: *const C2paSignerInfo,
        data_dir: *const c_char,
    ) -> *mut c_char,
    pub(crate) c2pa_create_stream: unsafe extern "C" fn(
        context: *mut StreamContext,
        reader: ReadCallback,
        seeker: SeekCallback,
        writer: WriteCallback,
        flusher: FlushCallback,
    ) -> *mut C2paStream,
    pub(crate) c2pa_release_stream: unsafe extern "C" fn(stream: *mut C2paStream),
    pub(crate) c2pa_signer_create: unsafe extern "C" fn(
        context: *const c_void,
        callback: SignerCallback,
        alg: C2paSigningAlg,
        certs: *const c_char,
        tsa_url: *const c_char,
    ) -> *mut C2paSigner,
    pub(crate) c2pa_signer_from_info:
        unsafe extern "C" fn(signer_info: *const C2paSignerInfo) -> *mut C2paSigner,
    pub(crate) c2pa_signer_reserve_size: unsafe extern "C" fn(signer: *mut C2paSigner) -> i64,
    pub(crate) c2pa_signer_free: unsafe extern "C" fn(signer: *const C2paSigner),
    pub(crate) c2pa_ed25519_sign: unsafe extern "C" fn(
        bytes: *const c_uchar,
        len: usize,
        private_key: *const c_char,
    ) -> *const c_uchar,
    pub(crate) c2pa_signature_free: unsafe extern "C" fn(signature: *const u8),
    pub(crate) c2pa_reader_from_stream:
        unsafe extern "C" fn(format: *const c_char, stream: *mut C2paStream) -> *mut C2paReader,
    pub(crate) c2pa_reader_from_manifest_data_and_stream: unsafe extern "C" fn(
        format: *const c_char,
        stream: *mut C2paStream,
        manifest_data: *const c_uchar,
        manifest_size: usize,
    ) -> *mut C2paReader,
    pub(crate) c2pa_reader_json: unsafe extern "C" fn(reader: *mut C2paReader) -> *mut c_char,
    pub(crate) c2pa_reader_detailed_json:
        unsafe extern "C" fn(reader: *mut C2paReader) -> *mut c_char,
    pub(crate) c2pa_reader_remote_url:
        unsafe extern "C" fn(reader: *mut C2paReader) -> *const c_char,
    pub(crate) c2pa_reader_is_embedded: unsafe extern "C" fn(reader: *mut C2paReader) -> bool,
    pub(crate) c2pa_reader_resource_to_stream: unsafe extern "C" fn(
        reader: *mut C2paReader,
        uri: *const c_char,
        stream: *mut C2paStream,
    ) -> i64,
    pub(crate) c2pa_reader_free: unsafe extern "C" fn(reader: *mut C2paReader),
    pub(crate) c2pa_builder_from_json:
        unsafe extern "C" fn(manifest_json: *const c_char) -> *mut C2paBuilder,
    pub(crate) c2pa_builder_from_archive:
        unsafe extern "C" fn(stream: *mut C2paStream) -> *mut C2paBuilder,
    // The engine declares both arguments as C enums, which share the ABI of `int`.
    pub(crate) c2pa_builder_set_intent: unsafe extern "C" fn(
        builder: *mut C2paBuilder,
        intent: c_int,
        digital_source_type: c_int,
    ) -> c_int,
    pub(crate) c2pa_builder_add_action:
        unsafe extern "C" fn(builder: *mut C2paBuilder, action_json: *const c_char) -> c_int,
    pub(crate) c2pa_builder_set_no_embed: unsafe extern "C" fn(builder: *mut C2paBuilder),
    pub(crate) c2pa_builder_set_remote_url:
        unsafe extern "C" fn(builder: *mut C2paBuilder, remote_url: *const c_char) -> c_int,
    pub(crate) c2pa_builder_add_resource: unsafe extern "C" fn(
        builder: *mut C2paBuilder,
        uri: *const c_char,
        stream: *mut C2paStream,
    ) -> c_int,
    pub(crate) c2pa_builder_add_ingredient_from_stream: unsafe extern "C" fn(
        builder: *mut C2paBuilder,
        ingredient_json: *const c_char,
        format: *const c_char,
        source: *mut C2paStream,
    ) -> c_int,
    pub(crate) c2pa_builder_to_archive:
        unsafe extern "C" fn(builder: *mut C2paBuilder, stream: *mut C2paStream) -> c_int,
    pub(crate) c2pa_builder_data_hashed_placeholder: unsafe extern "C" fn(
        builder: *mut C2paBuilder,
        reserved_size: usize,
        format: *const c_char,
        manifest_bytes: *mut *const c_uchar,
    ) -> i64,
    pub(crate) c2pa_builder_sign_data_hashed_embeddable: unsafe extern "C" fn(
        builder: *mut C2paBuilder,
        signer: *mut C2paSigner,
        data_hash: *const c_char,
        format: *const c_char,
        asset: *mut C2paStream,
        manifest_bytes: *mut *const c_uchar,
    ) -> i64,
    pub(crate) c2pa_builder_sign: unsafe extern "C" fn(
        builder: *mut C2paBuilder,
        format: *const c_char,
        source: *mut C2paStream,
        dest: *mut C2paStream,
        signer: *mut C2paSigner,
        manifest_bytes: *mut *const c_uchar,
    ) -> i64,
    pub(crate) c2pa_builder_free: unsafe extern "C" fn(builder: *mut C2paBuilder),
    pub(crate) c2pa_manifest_bytes_free: unsafe extern "C" fn(manifest_bytes: *const c_uchar),

    /// Keeps the engine mapped for as long as the table is alive.
    pub(crate) library: Option<Library>,
}

/// Copies an exported function pointer out of `library`.
///
/// # Safety
/// `T` must match the exported function's signature.
unsafe fn symbol<T: Copy>(library: &Library, name: &str) -> Result<T> {
    let symbol: Symbol<'_, T> = library
        .get(name.as_bytes())
        .map_err(|err| Error::Engine(format!("missing symbol {name}: {err}")))?;
    Ok(*symbol)
}

impl EngineApi {
    /// Loads the engine from `path` and resolves every symbol the bridge uses.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        // Safety: loading runs the engine's initializers; the engine is a trusted part of the app.
        let library = unsafe { Library::new(path) }
            .map_err(|err| Error::Engine(format!("{}: {err}", path.display())))?;
        debug!("loaded engine library {}", path.display());

        // Safety: signatures mirror the engine's C header.
        unsafe {
            Ok(Self {
                c2pa_version: symbol(&library, "c2pa_version")?,
                c2pa_error: symbol(&library, "c2pa_error")?,
                c2pa_error_set_last: symbol(&library, "c2pa_error_set_last")?,
                c2pa_string_free: symbol(&library, "c2pa_string_free")?,
                c2pa_load_settings: symbol(&library, "c2pa_load_settings")?,
                c2pa_read_file: symbol(&library, "c2pa_read_file")?,
                c2pa_read_ingredient_file: symbol(&library, "c2pa_read_ingredient_file")?,
                c2pa_sign_file: symbol(&library, "c2pa_sign_file")?,
                c2pa_create_stream: symbol(&library, "c2pa_create_stream")?,
                c2pa_release_stream: symbol(&library, "c2pa_release_stream")?,
                c2pa_signer_create: symbol(&library, "c2pa_signer_create")?,
                c2pa_signer_from_info: symbol(&library, "c2pa_signer_from_info")?,
                c2pa_signer_reserve_size: symbol(&library, "c2pa_signer_reserve_size")?,
                c2pa_signer_free: symbol(&library, "c2pa_signer_free")?,
                c2pa_ed25519_sign: symbol(&library, "c2pa_ed25519_sign")?,
                c2pa_signature_free: symbol(&library, "c2pa_signature_free")?,
                c2pa_reader_from_stream: symbol(&library, "c2pa_reader_from_stream")?,
                c2pa_reader_from_manifest_data_and_stream: symbol(
                    &library,
                    "c2pa_reader_from_manifest_data_and_stream",
                )?,
                c2pa_reader_json: symbol(&library, "c2pa_reader_json")?,
                c2pa_reader_detailed_json: symbol(&library, "c2pa_reader_detailed_json")?,
                c2pa_reader_remote_url: symbol(&library, "c2pa_reader_remote_url")?,
                c2pa_reader_is_embedded: symbol(&library, "c2pa_reader_is_embedded")?,
                c2pa_reader_resource_to_stream: symbol(
                    &library,
                    "c2pa_reader_resource_to_stream",
                )?,
                c2pa_reader_free: symbol(&library, "c2pa_reader_free")?,
                c2pa_builder_from_json: symbol(&library, "c2pa_builder_from_json")?,
                c2pa_builder_from_archive: symbol(&library, "c2pa_builder_from_archive")?,
                c2pa_builder_set_intent: symbol(&library, "c2pa_builder_set_intent")?,
                c2pa_builder_add_action: symbol(&library, "c2pa_builder_add_action")?,
                c2pa_builder_set_no_embed: symbol(&library, "c2pa_builder_set_no_embed")?,
                c2pa_builder_set_remote_url: symbol(&library, "c2pa_builder_set_remote_url")?,
                c2pa_builder_add_resource: symbol(&library, "c2pa_builder_add_resource")?,
                c2pa_builder_add_ingredient_from_stream: symbol(
                    &library,
                    "c2pa_builder_add_ingredient_from_stream",
                )?,
                c2pa_builder_to_archive: symbol(&library, "c2pa_builder_to_archive")?,
                c2pa_builder_data_hashed_placeholder: symbol(
                    &library,
                    "c2pa_builder_data_hashed_placeholder",
                )?,
                c2pa_builder_sign_data_hashed_embeddable: symbol(
                    &library,
                    "c2pa_builder_sign_data_hashed_embeddable",
                )?,
                c2pa_builder_sign: symbol(&library, "c2pa_builder_sign")?,
                c2pa_builder_free: symbol(&library, "c2pa_builder_free")?,
                c2pa_manifest_bytes_free: symbol(&library, "c2pa_manifest_bytes_free")?,
                library: Some(library),
            })
        }
    }

    /// Copies an engine-owned string and frees the original.
    ///
    /// The string is freed even when it is not valid UTF-8.
    ///
    /// # Safety
    /// `s` must be null or a string returned by the engine that has not been freed.
    pub(crate) unsafe fn take_string(&self, s: *mut c_char) -> Result<Option<String>> {
        if s.is_null() {
            return Ok(None);
        }
        let value = CStr::from_ptr(s).to_str().map(str::to_owned);
        (self.c2pa_string_free)(s);
        Ok(Some(value?))
    }

    /// Like [`take_string`](Self::take_string), but a null string becomes the
    /// engine's last error, or `default` when it has none.
    ///
    /// # Safety
    /// `s` must be null or a string returned by the engine that has not been freed.
    pub(crate) unsafe fn take_string_or(&self, s: *mut c_char, default: &str) -> Result<String> {
        match self.take_string(s)? {
            Some(value) => Ok(value),
            None => Err(self.error_or(default)),
        }
    }

    /// Returns the engine's version string.
    pub fn version(&self) -> Result<String> {
        Ok(unsafe { self.take_string((self.c2pa_version)()) }?.unwrap_or_default())
    }

    /// Consumes the engine's last error message, if any.
    ///
    /// This must be called immediately after the failing engine call; any
    /// other engine call on this thread may replace it.
    pub fn last_error(&self) -> Result<Option<String>> {
        Ok(unsafe { self.take_string((self.c2pa_error)()) }?.filter(|err| !err.is_empty()))
    }

    /// Records a bridge-side failure as the engine's last error.
    ///
    /// Callbacks can only return a sentinel, so this is how the reason reaches
    /// whoever asks the engine for its error afterwards.
    pub fn set_last_error(&self, err: &Error) {
        let message = err.to_string().replace('\0', " ");
        match CString::new(message) {
            Ok(message) => {
                if unsafe { (self.c2pa_error_set_last)(message.as_ptr()) } < 0 {
                    warn!("engine rejected error message: {err}");
                }
            }
            Err(nul) => warn!("unable to record error: {nul}"),
        }
    }

    /// Wraps the engine's last error, or `default` when it has none.
    pub fn error_or(&self, default: &str) -> Error {
        match self.last_error() {
            Ok(Some(message)) => Error::Api(message),
            Ok(None) => Error::Api(default.to_string()),
            Err(err) => err,
        }
    }

    /// Converts a negative status into an error.
    pub fn status_error(&self, code: i64) -> Error {
        match self.last_error() {
            Ok(Some(message)) => Error::Api(message),
            Ok(None) => Error::NegativeStatus(code),
            Err(err) => err,
        }
    }

    /// Loads engine settings from a JSON or TOML string.
    pub fn load_settings(&self, settings: &str, format: &str) -> Result<()> {
        let settings = CString::new(settings)?;
        let format = CString::new(format)?;
        let result = unsafe { (self.c2pa_load_settings)(settings.as_ptr(), format.as_ptr()) };
        if result < 0 {
            return Err(self.status_error(result as i64));
        }
        Ok(())
    }

    /// Signs `data` with an Ed25519 private key in PEM format.
    pub fn ed25519_sign(
        &self,
        data: &[u8],
        private_key: &str,
    ) -> Result<[u8; ED25519_SIGNATURE_LEN]> {
        if data.is_empty() {
            return Err(Error::InvalidArgument("Data cannot be empty".to_string()));
        }
        let private_key = CString::new(private_key)?;

        let signature =
            unsafe { (self.c2pa_ed25519_sign)(data.as_ptr(), data.len(), private_key.as_ptr()) };
        if signature.is_null() {
            return Err(self.error_or("Failed to sign with Ed25519"));
        }

        let mut out = [0u8; ED25519_SIGNATURE_LEN];
        unsafe {
            ptr::copy_nonoverlapping(signature, out.as_mut_ptr(), ED25519_SIGNATURE_LEN);
            (self.c2pa_signature_free)(signature);
        }
        Ok(out)
    }

    /// Returns the manifest store of the file at `path` as JSON.
    ///
    /// Binary resources are written to `data_dir` when one is given.
    pub fn read_file(&self, path: &str, data_dir: Option<&str>) -> Result<String> {
        let path = CString::new(path)?;
        let data_dir = optional_c_string(data_dir)?;
        unsafe {
            let json = (self.c2pa_read_file)(path.as_ptr(), ptr_or_null(&data_dir));
            self.take_string_or(json, "Error reading file")
        }
    }

    /// Returns the file at `path` described as an ingredient, as JSON.
    ///
    /// The ingredient's resources are written to `data_dir`.
    pub fn read_ingredient_file(&self, path: &str, data_dir: &str) -> Result<String> {
        let path = CString::new(path)?;
        let data_dir = CString::new(data_dir)?;
        unsafe {
            let json = (self.c2pa_read_ingredient_file)(path.as_ptr(), data_dir.as_ptr());
            self.take_string_or(json, "Error reading ingredient file")
        }
    }

    /// Signs the file at `source_path` into `dest_path` with `manifest_json`.
    ///
    /// Returns whatever the engine reports on success, which is usually empty.
    pub fn sign_file(
        &self,
        source_path: &str,
        dest_path: &str,
        manifest_json: &str,
        signer_info: &SignerInfo,
        data_dir: Option<&str>,
    ) -> Result<String> {
        let source_path = CString::new(source_path)?;
        let dest_path = CString::new(dest_path)?;
        let manifest_json = CString::new(manifest_json)?;
        let data_dir = optional_c_string(data_dir)?;
        let info = signer_info.to_c_strings()?;
        let c_info = info.as_c();

        unsafe {
            let result = (self.c2pa_sign_file)(
                source_path.as_ptr(),
                dest_path.as_ptr(),
                manifest_json.as_ptr(),
                &c_info,
                ptr_or_null(&data_dir),
            );
            self.take_string_or(result, "Error signing file")
        }
    }

    /// Creates an engine signer that signs with the key in `signer_info`.
    ///
    /// No bridge context is involved; the handle is freed like any other signer.
    pub fn signer_from_info(&self, signer_info: &SignerInfo) -> Result<SignerHandle> {
        let info = signer_info.to_c_strings()?;
        let c_info = info.as_c();
        let signer = unsafe { (self.c2pa_signer_from_info)(&c_info) };
        SignerHandle::from_ptr(signer).ok_or_else(|| self.error_or("Failed to create signer from info"))
    }

    /// Returns the number of bytes to reserve for a signature from `signer`.
    ///
    /// # Safety
    /// `signer` must be a live signer created by this engine.
    pub unsafe fn signer_reserve_size(&self, signer: SignerHandle) -> Result<i64> {
        let size = (self.c2pa_signer_reserve_size)(signer.as_ptr());
        if size < 0 {
            return Err(self.status_error(size));
        }
        Ok(size)
    }

    /// Frees a signer created by this engine.
    ///
    /// # Safety
    /// `signer` must be live and is invalid after this call.
    pub(crate) unsafe fn signer_free(&self, signer: SignerHandle) {
        (self.c2pa_signer_free)(signer.as_ptr())
    }
}

pub(crate) fn optional_c_string(s: Option<&str>) -> Result<Option<CString>> {
    Ok(s.map(CString::new).transpose()?)
}

pub(crate) fn ptr_or_null(s: &Option<CString>) -> *const c_char {
    s.as_ref().map_or(ptr::null(), |s| s.as_ptr())
}

impl fmt::Debug for EngineApi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineApi")
            .field("loaded", &self.library.is_some())
            .finish_non_exhaustive()
    }
}
