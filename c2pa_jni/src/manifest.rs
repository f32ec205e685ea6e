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

//! Owned wrappers for engine readers and builders.
//!
//! Manifest content stays opaque: readers hand back the engine's JSON and
//! builders hand back the engine's manifest bytes.

use std::{
    ffi::{c_int, c_uchar, CString},
    ptr::{self, NonNull},
    slice,
    sync::Arc,
};

use crate::{
    engine::{C2paBuilder, C2paReader, EngineApi},
    handle::SignerHandle,
    intent::{BuilderIntent, DigitalSourceType},
    stream_bridge::BridgeStream,
    Error, Result,
};

/// A manifest store read from a stream.
#[derive(Debug)]
pub struct EngineReader {
    engine: Arc<EngineApi>,
    reader: NonNull<C2paReader>,
}

// Safety: the engine reader is not tied to the creating thread.
unsafe impl Send for EngineReader {}

impl EngineReader {
    /// Reads the manifest store from `stream`, whose content has MIME type or extension `format`.
    pub fn from_stream(engine: &Arc<EngineApi>, format: &str, stream: &BridgeStream) -> Result<Self> {
        let format = CString::new(format)?;
        let reader =
            unsafe { (engine.c2pa_reader_from_stream)(format.as_ptr(), stream.engine_stream()) };
        Self::wrap(engine, reader, "Failed to create reader from stream")
    }

    /// Reads `manifest_data`, a manifest store kept apart from the asset in
    /// `stream`, such as a sidecar or a manifest fetched from a remote URL.
    pub fn from_manifest_data_and_stream(
        engine: &Arc<EngineApi>,
        format: &str,
        stream: &BridgeStream,
        manifest_data: &[u8],
    ) -> Result<Self> {
        if manifest_data.is_empty() {
            return Err(Error::InvalidArgument(
                "Manifest data cannot be empty".to_string(),
            ));
        }
        let format = CString::new(format)?;
        let reader = unsafe {
            (engine.c2pa_reader_from_manifest_data_and_stream)(
                format.as_ptr(),
                stream.engine_stream(),
                manifest_data.as_ptr(),
                manifest_data.len(),
            )
        };
        Self::wrap(engine, reader, "Failed to create reader from manifest data")
    }

    fn wrap(engine: &Arc<EngineApi>, reader: *mut C2paReader, context: &str) -> Result<Self> {
        let reader = NonNull::new(reader).ok_or_else(|| engine.error_or(context))?;
        Ok(Self {
            engine: engine.clone(),
            reader,
        })
    }

    /// Returns the manifest store as JSON.
    pub fn json(&self) -> Result<String> {
        unsafe {
            let json = (self.engine.c2pa_reader_json)(self.reader.as_ptr());
            self.engine.take_string_or(json, "Failed to generate JSON from reader")
        }
    }

    /// Returns the manifest store as JSON, including validation details.
    pub fn detailed_json(&self) -> Result<String> {
        unsafe {
            let json = (self.engine.c2pa_reader_detailed_json)(self.reader.as_ptr());
            self.engine
                .take_string_or(json, "Failed to generate detailed JSON from reader")
        }
    }

    /// Returns the URL the manifest store was fetched from, or `None` when it
    /// was embedded in the asset.
    pub fn remote_url(&self) -> Result<Option<String>> {
        unsafe {
            let url = (self.engine.c2pa_reader_remote_url)(self.reader.as_ptr());
            self.engine.take_string(url.cast_mut())
        }
    }

    pub fn is_embedded(&self) -> bool {
        unsafe { (self.engine.c2pa_reader_is_embedded)(self.reader.as_ptr()) }
    }

    /// Writes the resource identified by `uri` to `stream`.
    ///
    /// Returns the number of bytes written.
    pub fn resource_to_stream(&self, uri: &str, stream: &BridgeStream) -> Result<i64> {
        let uri = CString::new(uri)?;
        let written = unsafe {
            (self.engine.c2pa_reader_resource_to_stream)(
                self.reader.as_ptr(),
                uri.as_ptr(),
                stream.engine_stream(),
            )
        };
        if written < 0 {
            return Err(self.engine.status_error(written));
        }
        Ok(written)
    }
}

impl Drop for EngineReader {
    fn drop(&mut self) {
        unsafe { (self.engine.c2pa_reader_free)(self.reader.as_ptr()) }
    }
}

/// The outcome of signing with a builder.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SignResult {
    /// Size of the embedded manifest as reported by the engine.
    pub size: i64,

    pub manifest_bytes: Option<Vec<u8>>,
}

/// A manifest definition waiting to be signed.
#[derive(Debug)]
pub struct EngineBuilder {
    engine: Arc<EngineApi>,
    builder: NonNull<C2paBuilder>,
}

// Safety: the engine builder is not tied to the creating thread.
unsafe impl Send for EngineBuilder {}

impl EngineBuilder {
    pub fn from_json(engine: &Arc<EngineApi>, manifest_json: &str) -> Result<Self> {
        let manifest_json = CString::new(manifest_json)?;
        let builder = unsafe { (engine.c2pa_builder_from_json)(manifest_json.as_ptr()) };
        Self::wrap(engine, builder, "Failed to create builder from JSON")
    }

    /// Restores a builder saved with [`to_archive`](Self::to_archive).
    pub fn from_archive(engine: &Arc<EngineApi>, stream: &BridgeStream) -> Result<Self> {
        let builder = unsafe { (engine.c2pa_builder_from_archive)(stream.engine_stream()) };
        Self::wrap(engine, builder, "Failed to create builder from archive")
    }

    fn wrap(engine: &Arc<EngineApi>, builder: *mut C2paBuilder, context: &str) -> Result<Self> {
        let builder = NonNull::new(builder).ok_or_else(|| engine.error_or(context))?;
        Ok(Self {
            engine: engine.clone(),
            builder,
        })
    }

    fn check_status(&self, status: c_int) -> Result<()> {
        if status < 0 {
            return Err(self.engine.status_error(status as i64));
        }
        Ok(())
    }

    pub fn set_intent(
        &mut self,
        intent: BuilderIntent,
        digital_source_type: DigitalSourceType,
    ) -> Result<()> {
        let status = unsafe {
            (self.engine.c2pa_builder_set_intent)(
                self.builder.as_ptr(),
                intent as c_int,
                digital_source_type as c_int,
            )
        };
        self.check_status(status)
    }

    /// Adds an action, given as JSON, to the manifest's actions assertion.
    pub fn add_action(&mut self, action_json: &str) -> Result<()> {
        let action_json = CString::new(action_json)?;
        let status = unsafe {
            (self.engine.c2pa_builder_add_action)(self.builder.as_ptr(), action_json.as_ptr())
        };
        self.check_status(status)
    }

    /// Keeps the manifest out of the signed asset.
    pub fn set_no_embed(&mut self) {
        unsafe { (self.engine.c2pa_builder_set_no_embed)(self.builder.as_ptr()) }
    }

    /// Records where the manifest will be hosted.
    pub fn set_remote_url(&mut self, remote_url: &str) -> Result<()> {
        let remote_url = CString::new(remote_url)?;
        let status = unsafe {
            (self.engine.c2pa_builder_set_remote_url)(self.builder.as_ptr(), remote_url.as_ptr())
        };
        self.check_status(status)
    }

    /// Adds the content of `stream` as the resource `uri`.
    pub fn add_resource(&mut self, uri: &str, stream: &BridgeStream) -> Result<()> {
        let uri = CString::new(uri)?;
        let status = unsafe {
            (self.engine.c2pa_builder_add_resource)(
                self.builder.as_ptr(),
                uri.as_ptr(),
                stream.engine_stream(),
            )
        };
        self.check_status(status)
    }

    /// Adds the asset in `source` as an ingredient described by `ingredient_json`.
    pub fn add_ingredient_from_stream(
        &mut self,
        ingredient_json: &str,
        format: &str,
        source: &BridgeStream,
    ) -> Result<()> {
        let ingredient_json = CString::new(ingredient_json)?;
        let format = CString::new(format)?;
        let status = unsafe {
            (self.engine.c2pa_builder_add_ingredient_from_stream)(
                self.builder.as_ptr(),
                ingredient_json.as_ptr(),
                format.as_ptr(),
                source.engine_stream(),
            )
        };
        self.check_status(status)
    }

    /// Writes the builder's state to `stream`.
    pub fn to_archive(&mut self, stream: &BridgeStream) -> Result<()> {
        let status = unsafe {
            (self.engine.c2pa_builder_to_archive)(self.builder.as_ptr(), stream.engine_stream())
        };
        self.check_status(status)
    }

    /// Returns a placeholder manifest reserving `reserved_size` bytes for the
    /// signature, to embed before hashing the asset.
    pub fn data_hashed_placeholder(&mut self, reserved_size: usize, format: &str) -> Result<Vec<u8>> {
        if reserved_size == 0 {
            return Err(Error::InvalidArgument(
                "Reserved size must be positive".to_string(),
            ));
        }
        let format = CString::new(format)?;
        let mut manifest_bytes: *const c_uchar = ptr::null();
        unsafe {
            let size = (self.engine.c2pa_builder_data_hashed_placeholder)(
                self.builder.as_ptr(),
                reserved_size,
                format.as_ptr(),
                &mut manifest_bytes,
            );
            self.take_manifest_bytes(size, manifest_bytes, "Failed to create placeholder")
        }
    }

    /// Signs a manifest for an asset hashed by the caller and returns it
    /// ready to embed.
    ///
    /// `data_hash` is the data hash assertion as JSON. When `asset` is given
    /// the engine hashes it to complete the assertion.
    ///
    /// # Safety
    /// `signer` must be a live signer created by the same engine.
    pub unsafe fn sign_data_hashed_embeddable(
        &mut self,
        signer: SignerHandle,
        data_hash: &str,
        format: &str,
        asset: Option<&BridgeStream>,
    ) -> Result<Vec<u8>> {
        let data_hash = CString::new(data_hash)?;
        let format = CString::new(format)?;
        let mut manifest_bytes: *const c_uchar = ptr::null();

        let size = (self.engine.c2pa_builder_sign_data_hashed_embeddable)(
            self.builder.as_ptr(),
            signer.as_ptr(),
            data_hash.as_ptr(),
            format.as_ptr(),
            asset.map_or(ptr::null_mut(), BridgeStream::engine_stream),
            &mut manifest_bytes,
        );
        self.take_manifest_bytes(size, manifest_bytes, "Failed to sign data hashed manifest")
    }

    /// Copies manifest bytes handed out by the engine and frees them.
    ///
    /// # Safety
    /// When `size` is not negative, `manifest_bytes` must be null or point to
    /// `size` bytes the engine allocated.
    unsafe fn take_manifest_bytes(
        &self,
        size: i64,
        manifest_bytes: *const c_uchar,
        context: &str,
    ) -> Result<Vec<u8>> {
        if size < 0 || manifest_bytes.is_null() {
            return Err(self.engine.error_or(context));
        }
        let bytes = slice::from_raw_parts(manifest_bytes, size as usize).to_vec();
        (self.engine.c2pa_manifest_bytes_free)(manifest_bytes);
        Ok(bytes)
    }

    /// Signs `source` into `dest` with `signer`.
    ///
    /// Signing drives the stream and signer callbacks on this thread or on
    /// engine worker threads.
    ///
    /// # Safety
    /// `signer` must be a live signer created by the same engine.
    pub unsafe fn sign(
        &mut self,
        format: &str,
        source: &BridgeStream,
        dest: &BridgeStream,
        signer: SignerHandle,
    ) -> Result<SignResult> {
        let format = CString::new(format)?;
        let mut manifest_bytes: *const c_uchar = ptr::null();

        let size = (self.engine.c2pa_builder_sign)(
            self.builder.as_ptr(),
            format.as_ptr(),
            source.engine_stream(),
            dest.engine_stream(),
            signer.as_ptr(),
            &mut manifest_bytes,
        );
        if size < 0 {
            return Err(self.engine.error_or("Failed to sign builder"));
        }

        let manifest_bytes = (!manifest_bytes.is_null()).then(|| {
            let bytes = slice::from_raw_parts(manifest_bytes, size as usize).to_vec();
            (self.engine.c2pa_manifest_bytes_free)(manifest_bytes);
            bytes
        });
        Ok(SignResult {
            size,
            manifest_bytes,
        })
    }
}

impl Drop for EngineBuilder {
    fn drop(&mut self) {
        unsafe { (self.engine.c2pa_builder_free)(self.builder.as_ptr()) }
    }
}
