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

//! An in-process engine implementing the C API the bridge consumes.
//!
//! Streams and signers created here keep the callbacks they were given so
//! tests can drive them exactly as the real engine would. Manifests are fake:
//! a signed asset is an optional remote URL line, then `C2PA` + signature
//! unless embedding is off, then the source bytes.
//!
//! The test binary also runs under [`CappedAllocator`], so a test can make a
//! single large allocation fail without exhausting the machine.

#![allow(clippy::unwrap_used)]

use std::{
    alloc::{GlobalAlloc, Layout, System},
    cell::{Cell, RefCell},
    collections::BTreeMap,
    ffi::{c_char, c_int, c_uchar, c_void, CStr, CString},
    fs,
    io::{self, Cursor, Read, Seek, SeekFrom, Write},
    path::Path,
    ptr,
    sync::{Arc, Mutex},
};

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::{
    engine::{
        C2paBuilder, C2paReader, C2paSigner, C2paSignerInfo, C2paSigningAlg, C2paStream,
        EngineApi, FlushCallback, ReadCallback, SeekCallback, SignerCallback, StreamContext,
        WriteCallback, ED25519_SIGNATURE_LEN,
    },
    handle::SignerHandle,
    stream_bridge::{BridgeStream, SeekMode},
    SigningAlg,
};

pub const VERSION: &str = "c2pa-test-engine/0.1.0";

/// Bytes that mark an asset as carrying a manifest.
pub const MANIFEST_MARKER: &[u8] = b"C2PA";

/// Starts the line naming where a manifest is hosted remotely.
pub const REMOTE_MARKER: &[u8] = b"C2PR";

/// Starts a builder archive. The rest of the archive is the builder state as JSON.
pub const ARCHIVE_MARKER: &[u8] = b"C2AR";

/// URI of a reader's manifest store resource, and its file name in a data directory.
pub const MANIFEST_RESOURCE: &str = "manifest.c2pa";

/// Capacity the engine offers the signer callback.
pub const SIGNATURE_CAPACITY: usize = 1024;

/// Largest single allocation the test binary will make.
pub const ALLOCATION_LIMIT: usize = 1 << 30;

/// The system allocator, failing any request over [`ALLOCATION_LIMIT`].
pub struct CappedAllocator;

unsafe impl GlobalAlloc for CappedAllocator {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        if layout.size() > ALLOCATION_LIMIT {
            return ptr::null_mut();
        }
        System.alloc(layout)
    }

    unsafe fn alloc_zeroed(&self, layout: Layout) -> *mut u8 {
        if layout.size() > ALLOCATION_LIMIT {
            return ptr::null_mut();
        }
        System.alloc_zeroed(layout)
    }

    unsafe fn realloc(&self, ptr: *mut u8, layout: Layout, new_size: usize) -> *mut u8 {
        if new_size > ALLOCATION_LIMIT {
            return ptr::null_mut();
        }
        System.realloc(ptr, layout, new_size)
    }

    unsafe fn dealloc(&self, ptr: *mut u8, layout: Layout) {
        System.dealloc(ptr, layout)
    }
}

#[global_allocator]
static ALLOCATOR: CappedAllocator = CappedAllocator;

thread_local! {
    static LAST_ERROR: RefCell<Option<Vec<u8>>> = const { RefCell::new(None) };
    static FAIL_NEXT_STREAM: RefCell<Option<String>> = const { RefCell::new(None) };
    static FAIL_NEXT_SIGNER: RefCell<Option<String>> = const { RefCell::new(None) };
    static LIVE_STREAMS: Cell<usize> = const { Cell::new(0) };
}

/// Manifest buffers handed out by the engine, by address and length.
static MANIFEST_BYTES: Mutex<Vec<(usize, usize)>> = Mutex::new(Vec::new());

pub fn engine() -> Arc<EngineApi> {
    Arc::new(EngineApi {
        c2pa_version,
        c2pa_error,
        c2pa_error_set_last,
        c2pa_string_free,
        c2pa_load_settings,
        c2pa_read_file,
        c2pa_read_ingredient_file,
        c2pa_sign_file,
        c2pa_create_stream,
        c2pa_release_stream,
        c2pa_signer_create,
        c2pa_signer_from_info,
        c2pa_signer_reserve_size,
        c2pa_signer_free,
        c2pa_ed25519_sign,
        c2pa_signature_free,
        c2pa_reader_from_stream,
        c2pa_reader_from_manifest_data_and_stream,
        c2pa_reader_json,
        c2pa_reader_detailed_json,
        c2pa_reader_remote_url,
        c2pa_reader_is_embedded,
        c2pa_reader_resource_to_stream,
        c2pa_reader_free,
        c2pa_builder_from_json,
        c2pa_builder_from_archive,
        c2pa_builder_set_intent,
        c2pa_builder_add_action,
        c2pa_builder_set_no_embed,
        c2pa_builder_set_remote_url,
        c2pa_builder_add_resource,
        c2pa_builder_add_ingredient_from_stream,
        c2pa_builder_to_archive,
        c2pa_builder_data_hashed_placeholder,
        c2pa_builder_sign_data_hashed_embeddable,
        c2pa_builder_sign,
        c2pa_builder_free,
        c2pa_manifest_bytes_free,
        library: None,
    })
}

/// Sets this thread's engine error.
pub fn set_error(message: &str) {
    set_error_bytes(message.as_bytes());
}

/// Sets this thread's engine error to raw bytes, which need not be UTF-8.
pub fn set_error_bytes(message: &[u8]) {
    LAST_ERROR.with(|err| *err.borrow_mut() = Some(message.to_vec()));
}

fn has_error() -> bool {
    LAST_ERROR.with(|err| err.borrow().is_some())
}

/// Sets this thread's engine error and returns `sentinel`.
fn fail<T, M: AsRef<str>>(message: M, sentinel: T) -> T {
    set_error(message.as_ref());
    sentinel
}

/// Makes the next stream creation on this thread fail with `message`.
pub fn fail_next_stream(message: &str) {
    FAIL_NEXT_STREAM.with(|fail| *fail.borrow_mut() = Some(message.to_string()));
}

/// Makes the next signer creation on this thread fail with `message`.
pub fn fail_next_signer(message: &str) {
    FAIL_NEXT_SIGNER.with(|fail| *fail.borrow_mut() = Some(message.to_string()));
}

/// Streams created and not yet released on this thread.
pub fn live_streams() -> usize {
    LIVE_STREAMS.with(Cell::get)
}

/// The deterministic stand-in for an Ed25519 signature.
pub fn fake_ed25519(data: &[u8], key: &[u8]) -> [u8; ED25519_SIGNATURE_LEN] {
    let byte_at = |bytes: &[u8], i: usize| match bytes.len() {
        0 => 0,
        len => bytes[i % len],
    };
    let mut signature = [0u8; ED25519_SIGNATURE_LEN];
    for (i, byte) in signature.iter_mut().enumerate() {
        *byte = byte_at(data, i) ^ byte_at(key, i) ^ i as u8;
    }
    signature
}

/// Parses the builder state out of an archive written by `c2pa_builder_to_archive`.
pub fn parse_archive(archive: &[u8]) -> serde_json::Value {
    serde_json::from_slice(archive.strip_prefix(ARCHIVE_MARKER).unwrap()).unwrap()
}

fn to_c_string<S: Into<Vec<u8>>>(s: S) -> *mut c_char {
    CString::new(s).map_or(ptr::null_mut(), CString::into_raw)
}

unsafe fn from_c_str(s: *const c_char) -> Option<String> {
    (!s.is_null()).then(|| CStr::from_ptr(s).to_string_lossy().into_owned())
}

fn parse_json(json: &str) -> Result<serde_json::Value, String> {
    serde_json::from_str(json).map_err(|err| format!("Json: {err}"))
}

unsafe extern "C" fn c2pa_version() -> *mut c_char {
    to_c_string(VERSION)
}

unsafe extern "C" fn c2pa_error() -> *mut c_char {
    to_c_string(LAST_ERROR.with(|err| err.borrow_mut().take()).unwrap_or_default())
}

unsafe extern "C" fn c2pa_error_set_last(error_str: *const c_char) -> c_int {
    match from_c_str(error_str) {
        Some(message) => {
            set_error(&message);
            0
        }
        None => -1,
    }
}

unsafe extern "C" fn c2pa_string_free(s: *mut c_char) {
    if !s.is_null() {
        drop(CString::from_raw(s));
    }
}

unsafe extern "C" fn c2pa_load_settings(settings: *const c_char, format: *const c_char) -> c_int {
    let (Some(settings), Some(format)) = (from_c_str(settings), from_c_str(format)) else {
        return fail("NilPointer: settings", -1);
    };
    if format != "json" {
        return fail(format!("Api: unsupported settings format {format}"), -1);
    }
    match parse_json(&settings) {
        Ok(_) => 0,
        Err(err) => fail(err, -1),
    }
}

unsafe extern "C" fn c2pa_read_file(path: *const c_char, data_dir: *const c_char) -> *mut c_char {
    let Some(path) = from_c_str(path) else {
        return fail("NilPointer: path", ptr::null_mut());
    };
    let bytes = match fs::read(&path) {
        Ok(bytes) => bytes,
        Err(err) => return fail(format!("Io: {err}"), ptr::null_mut()),
    };
    if !bytes.starts_with(MANIFEST_MARKER) {
        return fail("ManifestNotFound: no JUMBF data found", ptr::null_mut());
    }
    if let Some(data_dir) = from_c_str(data_dir) {
        if let Err(err) = fs::write(Path::new(&data_dir).join(MANIFEST_RESOURCE), &bytes) {
            return fail(format!("Io: {err}"), ptr::null_mut());
        }
    }
    to_c_string(json!({ "path": path, "size": bytes.len() }).to_string())
}

unsafe extern "C" fn c2pa_read_ingredient_file(
    path: *const c_char,
    data_dir: *const c_char,
) -> *mut c_char {
    let (Some(path), false) = (from_c_str(path), data_dir.is_null()) else {
        return fail("NilPointer: ingredient arguments", ptr::null_mut());
    };
    let bytes = match fs::read(&path) {
        Ok(bytes) => bytes,
        Err(err) => return fail(format!("Io: {err}"), ptr::null_mut()),
    };
    let title = Path::new(&path)
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    to_c_string(
        json!({
            "title": title,
            "size": bytes.len(),
            "has_manifest": bytes.starts_with(MANIFEST_MARKER),
        })
        .to_string(),
    )
}

/// Signer material decoded from a `C2paSignerInfo`.
struct KeyInfo {
    alg: C2paSigningAlg,
    certs: String,
    private_key: String,
    tsa_url: Option<String>,
}

unsafe fn key_info(info: *const C2paSignerInfo) -> Result<KeyInfo, String> {
    let info = info.as_ref().ok_or("NilPointer: signer_info")?;
    let alg: SigningAlg = from_c_str(info.alg)
        .unwrap_or_default()
        .parse()
        .map_err(|_| "Signature: unsupported algorithm".to_string())?;
    let certs = from_c_str(info.sign_cert)
        .filter(|certs| !certs.is_empty())
        .ok_or("Signature: missing certificate")?;
    let private_key = from_c_str(info.private_key)
        .filter(|key| !key.is_empty())
        .ok_or("Signature: invalid private key")?;
    Ok(KeyInfo {
        alg: alg.into(),
        certs,
        private_key,
        tsa_url: from_c_str(info.ta_url),
    })
}

unsafe extern "C" fn c2pa_sign_file(
    source_path: *const c_char,
    dest_path: *const c_char,
    manifest: *const c_char,
    signer_info: *const C2paSignerInfo,
    _data_dir: *const c_char,
) -> *mut c_char {
    let (Some(source_path), Some(dest_path), Some(manifest)) = (
        from_c_str(source_path),
        from_c_str(dest_path),
        from_c_str(manifest),
    ) else {
        return fail("NilPointer: sign file arguments", ptr::null_mut());
    };
    let info = match key_info(signer_info) {
        Ok(info) => info,
        Err(err) => return fail(err, ptr::null_mut()),
    };
    if let Err(err) = parse_json(&manifest) {
        return fail(err, ptr::null_mut());
    }
    let asset = match fs::read(&source_path) {
        Ok(asset) => asset,
        Err(err) => return fail(format!("Io: {err}"), ptr::null_mut()),
    };
    let signature = fake_ed25519(&asset, info.private_key.as_bytes());
    let signed = [MANIFEST_MARKER, signature.as_slice(), asset.as_slice()].concat();
    if let Err(err) = fs::write(&dest_path, signed) {
        return fail(format!("Io: {err}"), ptr::null_mut());
    }
    to_c_string("")
}

/// An engine stream: the callbacks and context the bridge registered.
pub struct EngineStream {
    context: *mut StreamContext,
    reader: ReadCallback,
    seeker: SeekCallback,
    writer: WriteCallback,
    flusher: FlushCallback,
}

impl EngineStream {
    pub fn from_bridge(stream: &BridgeStream) -> &EngineStream {
        unsafe { Self::from_raw(stream.engine_stream()) }
    }

    /// # Safety
    /// `stream` must come from `c2pa_create_stream` and still be live.
    pub unsafe fn from_raw<'a>(stream: *mut C2paStream) -> &'a EngineStream {
        &*stream.cast::<EngineStream>()
    }

    pub fn read(&self, buf: &mut [u8]) -> isize {
        unsafe { self.read_raw(buf.as_mut_ptr(), buf.len() as isize) }
    }

    /// # Safety
    /// `data` must be valid for `len` bytes when the request is valid.
    pub unsafe fn read_raw(&self, data: *mut u8, len: isize) -> isize {
        (self.reader)(self.context, data, len)
    }

    pub fn seek(&self, offset: i64, mode: SeekMode) -> isize {
        self.seek_raw(offset as isize, mode as c_int)
    }

    pub fn seek_raw(&self, offset: isize, mode: c_int) -> isize {
        unsafe { (self.seeker)(self.context, offset, mode) }
    }

    pub fn write(&self, data: &[u8]) -> isize {
        unsafe { self.write_raw(data.as_ptr(), data.len() as isize) }
    }

    /// # Safety
    /// `data` must be valid for `len` bytes when the request is valid.
    pub unsafe fn write_raw(&self, data: *const u8, len: isize) -> isize {
        (self.writer)(self.context, data, len)
    }

    pub fn flush(&self) -> isize {
        unsafe { (self.flusher)(self.context) }
    }

    /// Reads the whole stream from the start.
    pub fn read_all(&self) -> Result<Vec<u8>, isize> {
        let pos = self.seek(0, SeekMode::Start);
        if pos < 0 {
            return Err(pos);
        }
        let mut bytes = Vec::new();
        let mut chunk = [0u8; 1024];
        loop {
            match self.read(&mut chunk) {
                0 => return Ok(bytes),
                n if n < 0 => return Err(n),
                n => bytes.extend_from_slice(&chunk[..n as usize]),
            }
        }
    }

    /// Replaces the stream's content from the start.
    pub fn write_all(&self, data: &[u8]) -> Result<(), isize> {
        for status in [self.seek(0, SeekMode::Start), self.write(data), self.flush()] {
            if status < 0 {
                return Err(status);
            }
        }
        Ok(())
    }
}

unsafe extern "C" fn c2pa_create_stream(
    context: *mut StreamContext,
    reader: ReadCallback,
    seeker: SeekCallback,
    writer: WriteCallback,
    flusher: FlushCallback,
) -> *mut C2paStream {
    if let Some(err) = FAIL_NEXT_STREAM.with(|fail| fail.borrow_mut().take()) {
        return fail(err, ptr::null_mut());
    }
    LIVE_STREAMS.with(|live| live.set(live.get() + 1));
    Box::into_raw(Box::new(EngineStream {
        context,
        reader,
        seeker,
        writer,
        flusher,
    }))
    .cast()
}

unsafe extern "C" fn c2pa_release_stream(stream: *mut C2paStream) {
    if !stream.is_null() {
        drop(Box::from_raw(stream.cast::<EngineStream>()));
        LIVE_STREAMS.with(|live| live.set(live.get().saturating_sub(1)));
    }
}

enum SignWith {
    /// The bridge's sign callback and its context.
    Callback {
        context: *const c_void,
        callback: SignerCallback,
    },
    /// A private key given through `c2pa_signer_from_info`.
    Key(Vec<u8>),
}

/// An engine signer.
pub struct EngineSigner {
    sign_with: SignWith,
    alg: C2paSigningAlg,
    certs: String,
    tsa_url: Option<String>,
}

// Engine signers are shared by engine worker threads.
unsafe impl Send for EngineSigner {}
unsafe impl Sync for EngineSigner {}

impl EngineSigner {
    pub fn from_handle<'a>(handle: SignerHandle) -> &'a EngineSigner {
        unsafe { &*handle.as_ptr().cast::<EngineSigner>() }
    }

    pub fn alg(&self) -> C2paSigningAlg {
        self.alg
    }

    pub fn certs(&self) -> &str {
        &self.certs
    }

    pub fn tsa_url(&self) -> Option<&str> {
        self.tsa_url.as_deref()
    }

    /// Signs `data` into a `capacity` byte destination.
    pub fn sign(&self, data: &[u8], capacity: usize) -> Result<Vec<u8>, isize> {
        match &self.sign_with {
            SignWith::Callback { context, callback } => {
                let mut signature = vec![0u8; capacity];
                let len = unsafe {
                    (*callback)(
                        *context,
                        data.as_ptr(),
                        data.len(),
                        signature.as_mut_ptr(),
                        capacity,
                    )
                };
                if len < 0 {
                    return Err(len);
                }
                signature.truncate(len as usize);
                Ok(signature)
            }
            SignWith::Key(_) if capacity < ED25519_SIGNATURE_LEN => Err(-1),
            SignWith::Key(key) => Ok(fake_ed25519(data, key).to_vec()),
        }
    }
}

unsafe extern "C" fn c2pa_signer_create(
    context: *const c_void,
    callback: SignerCallback,
    alg: C2paSigningAlg,
    certs: *const c_char,
    tsa_url: *const c_char,
) -> *mut C2paSigner {
    let Some(certs) = from_c_str(certs) else {
        return fail("NilPointer: certs", ptr::null_mut());
    };
    if let Some(err) = FAIL_NEXT_SIGNER.with(|fail| fail.borrow_mut().take()) {
        return fail(err, ptr::null_mut());
    }
    Box::into_raw(Box::new(EngineSigner {
        sign_with: SignWith::Callback { context, callback },
        alg,
        certs,
        tsa_url: from_c_str(tsa_url),
    }))
    .cast()
}

unsafe extern "C" fn c2pa_signer_from_info(signer_info: *const C2paSignerInfo) -> *mut C2paSigner {
    match key_info(signer_info) {
        Ok(info) => Box::into_raw(Box::new(EngineSigner {
            sign_with: SignWith::Key(info.private_key.into_bytes()),
            alg: info.alg,
            certs: info.certs,
            tsa_url: info.tsa_url,
        }))
        .cast(),
        Err(err) => fail(err, ptr::null_mut()),
    }
}

unsafe extern "C" fn c2pa_signer_reserve_size(signer: *mut C2paSigner) -> i64 {
    match signer.cast::<EngineSigner>().as_ref() {
        Some(signer) => (SIGNATURE_CAPACITY + signer.certs.len()) as i64,
        None => fail("NilPointer: signer", -1),
    }
}

unsafe extern "C" fn c2pa_signer_free(signer: *const C2paSigner) {
    if !signer.is_null() {
        drop(Box::from_raw(signer.cast::<EngineSigner>().cast_mut()));
    }
}

/// Signs `data` with `signer`, recording a generic error if the signer left none.
unsafe fn sign_with(signer: *mut C2paSigner, data: &[u8]) -> Option<Vec<u8>> {
    match (*signer.cast::<EngineSigner>()).sign(data, SIGNATURE_CAPACITY) {
        Ok(signature) => Some(signature),
        Err(_) => {
            if !has_error() {
                set_error("Signature: signing failed");
            }
            None
        }
    }
}

unsafe extern "C" fn c2pa_ed25519_sign(
    bytes: *const c_uchar,
    len: usize,
    private_key: *const c_char,
) -> *const c_uchar {
    let key = from_c_str(private_key).unwrap_or_default();
    if bytes.is_null() || len == 0 || key.is_empty() {
        return fail("Signature: invalid private key", ptr::null());
    }
    let data = std::slice::from_raw_parts(bytes, len);
    Box::into_raw(Box::new(fake_ed25519(data, key.as_bytes()))).cast()
}

unsafe extern "C" fn c2pa_signature_free(signature: *const u8) {
    if !signature.is_null() {
        drop(Box::from_raw(
            signature.cast::<[u8; ED25519_SIGNATURE_LEN]>().cast_mut(),
        ));
    }
}

struct EngineReaderState {
    format: String,
    size: usize,
    remote_url: Option<String>,
    embedded: bool,
    manifest: Option<Vec<u8>>,
}

impl EngineReaderState {
    fn json(&self) -> serde_json::Value {
        json!({ "format": self.format, "size": self.size })
    }
}

/// Splits a leading remote manifest line off `bytes`.
fn split_remote_url(bytes: &[u8]) -> (Option<String>, &[u8]) {
    let Some(rest) = bytes.strip_prefix(REMOTE_MARKER) else {
        return (None, bytes);
    };
    match rest.iter().position(|byte| *byte == b'\n') {
        Some(end) => (
            Some(String::from_utf8_lossy(&rest[..end]).into_owned()),
            &rest[end + 1..],
        ),
        None => (None, bytes),
    }
}

unsafe fn reader_state<'a>(reader: *mut C2paReader) -> Option<&'a EngineReaderState> {
    reader.cast::<EngineReaderState>().as_ref()
}

unsafe extern "C" fn c2pa_reader_from_stream(
    format: *const c_char,
    stream: *mut C2paStream,
) -> *mut C2paReader {
    let (Some(format), false) = (from_c_str(format), stream.is_null()) else {
        return fail("NilPointer: reader arguments", ptr::null_mut());
    };
    let Ok(bytes) = EngineStream::from_raw(stream).read_all() else {
        return ptr::null_mut();
    };
    let (remote_url, rest) = split_remote_url(&bytes);
    let embedded = rest.starts_with(MANIFEST_MARKER);
    if !embedded && remote_url.is_none() {
        return fail("ManifestNotFound: no JUMBF data found", ptr::null_mut());
    }
    Box::into_raw(Box::new(EngineReaderState {
        format,
        size: bytes.len(),
        remote_url,
        embedded,
        manifest: embedded.then(|| rest.to_vec()),
    }))
    .cast()
}

unsafe extern "C" fn c2pa_reader_from_manifest_data_and_stream(
    format: *const c_char,
    stream: *mut C2paStream,
    manifest_data: *const c_uchar,
    manifest_size: usize,
) -> *mut C2paReader {
    let (Some(format), false, false) = (
        from_c_str(format),
        stream.is_null(),
        manifest_data.is_null(),
    ) else {
        return fail("NilPointer: reader arguments", ptr::null_mut());
    };
    let manifest = std::slice::from_raw_parts(manifest_data, manifest_size);
    if !manifest.starts_with(MANIFEST_MARKER) {
        return fail("Jumbf: invalid manifest data", ptr::null_mut());
    }
    let Ok(asset) = EngineStream::from_raw(stream).read_all() else {
        return ptr::null_mut();
    };
    Box::into_raw(Box::new(EngineReaderState {
        format,
        size: asset.len(),
        remote_url: None,
        embedded: false,
        manifest: Some(manifest.to_vec()),
    }))
    .cast()
}

unsafe extern "C" fn c2pa_reader_json(reader: *mut C2paReader) -> *mut c_char {
    match reader_state(reader) {
        Some(reader) => to_c_string(reader.json().to_string()),
        None => fail("NilPointer: reader", ptr::null_mut()),
    }
}

unsafe extern "C" fn c2pa_reader_detailed_json(reader: *mut C2paReader) -> *mut c_char {
    match reader_state(reader) {
        Some(reader) => {
            let mut json = reader.json();
            json["embedded"] = reader.embedded.into();
            json["remote_url"] = reader.remote_url.clone().into();
            json["manifest_size"] = reader.manifest.as_ref().map_or(0, Vec::len).into();
            to_c_string(json.to_string())
        }
        None => fail("NilPointer: reader", ptr::null_mut()),
    }
}

unsafe extern "C" fn c2pa_reader_remote_url(reader: *mut C2paReader) -> *const c_char {
    reader_state(reader)
        .and_then(|reader| reader.remote_url.as_deref())
        .map_or(ptr::null(), |url| to_c_string(url).cast_const())
}

unsafe extern "C" fn c2pa_reader_is_embedded(reader: *mut C2paReader) -> bool {
    reader_state(reader).is_some_and(|reader| reader.embedded)
}

unsafe extern "C" fn c2pa_reader_resource_to_stream(
    reader: *mut C2paReader,
    uri: *const c_char,
    stream: *mut C2paStream,
) -> i64 {
    let (Some(reader), Some(uri), false) = (reader_state(reader), from_c_str(uri), stream.is_null())
    else {
        return fail("NilPointer: resource arguments", -1);
    };
    let Some(manifest) = reader.manifest.as_ref().filter(|_| uri == MANIFEST_RESOURCE) else {
        return fail(format!("ResourceNotFound: {uri}"), -1);
    };
    match EngineStream::from_raw(stream).write_all(manifest) {
        Ok(()) => manifest.len() as i64,
        Err(status) => status as i64,
    }
}

unsafe extern "C" fn c2pa_reader_free(reader: *mut C2paReader) {
    if !reader.is_null() {
        drop(Box::from_raw(reader.cast::<EngineReaderState>()));
    }
}

#[derive(Default, Serialize, Deserialize)]
struct EngineBuilderState {
    definition: serde_json::Value,
    intent: Option<(c_int, c_int)>,
    actions: Vec<serde_json::Value>,
    ingredients: Vec<serde_json::Value>,
    resources: BTreeMap<String, Vec<u8>>,
    no_embed: bool,
    remote_url: Option<String>,
}

unsafe fn builder_state<'a>(builder: *mut C2paBuilder) -> Option<&'a mut EngineBuilderState> {
    builder.cast::<EngineBuilderState>().as_mut()
}

fn into_builder(state: EngineBuilderState) -> *mut C2paBuilder {
    Box::into_raw(Box::new(state)).cast()
}

unsafe extern "C" fn c2pa_builder_from_json(manifest_json: *const c_char) -> *mut C2paBuilder {
    let Some(json) = from_c_str(manifest_json) else {
        return fail("NilPointer: manifest_json", ptr::null_mut());
    };
    match parse_json(&json) {
        Ok(definition) => into_builder(EngineBuilderState {
            definition,
            ..Default::default()
        }),
        Err(err) => fail(err, ptr::null_mut()),
    }
}

unsafe extern "C" fn c2pa_builder_from_archive(stream: *mut C2paStream) -> *mut C2paBuilder {
    if stream.is_null() {
        return fail("NilPointer: stream", ptr::null_mut());
    }
    let Ok(archive) = EngineStream::from_raw(stream).read_all() else {
        return ptr::null_mut();
    };
    let Some(state) = archive.strip_prefix(ARCHIVE_MARKER) else {
        return fail("Api: not a builder archive", ptr::null_mut());
    };
    match serde_json::from_slice(state) {
        Ok(state) => into_builder(state),
        Err(err) => fail(format!("Json: {err}"), ptr::null_mut()),
    }
}

unsafe extern "C" fn c2pa_builder_set_intent(
    builder: *mut C2paBuilder,
    intent: c_int,
    digital_source_type: c_int,
) -> c_int {
    let Some(state) = builder_state(builder) else {
        return fail("NilPointer: builder", -1);
    };
    if !(0..=2).contains(&intent) || !(0..=18).contains(&digital_source_type) {
        return fail("Api: invalid intent", -1);
    }
    state.intent = Some((intent, digital_source_type));
    0
}

unsafe extern "C" fn c2pa_builder_add_action(
    builder: *mut C2paBuilder,
    action_json: *const c_char,
) -> c_int {
    let (Some(state), Some(action)) = (builder_state(builder), from_c_str(action_json)) else {
        return fail("NilPointer: action arguments", -1);
    };
    match parse_json(&action) {
        Ok(action) => {
            state.actions.push(action);
            0
        }
        Err(err) => fail(err, -1),
    }
}

unsafe extern "C" fn c2pa_builder_set_no_embed(builder: *mut C2paBuilder) {
    if let Some(state) = builder_state(builder) {
        state.no_embed = true;
    }
}

unsafe extern "C" fn c2pa_builder_set_remote_url(
    builder: *mut C2paBuilder,
    remote_url: *const c_char,
) -> c_int {
    let (Some(state), Some(url)) = (builder_state(builder), from_c_str(remote_url)) else {
        return fail("NilPointer: remote url arguments", -1);
    };
    state.remote_url = Some(url);
    0
}

unsafe extern "C" fn c2pa_builder_add_resource(
    builder: *mut C2paBuilder,
    uri: *const c_char,
    stream: *mut C2paStream,
) -> c_int {
    let (Some(state), Some(uri), false) = (builder_state(builder), from_c_str(uri), stream.is_null())
    else {
        return fail("NilPointer: resource arguments", -1);
    };
    match EngineStream::from_raw(stream).read_all() {
        Ok(bytes) => {
            state.resources.insert(uri, bytes);
            0
        }
        Err(status) => status as c_int,
    }
}

unsafe extern "C" fn c2pa_builder_add_ingredient_from_stream(
    builder: *mut C2paBuilder,
    ingredient_json: *const c_char,
    format: *const c_char,
    source: *mut C2paStream,
) -> c_int {
    let (Some(state), Some(ingredient), Some(format), false) = (
        builder_state(builder),
        from_c_str(ingredient_json),
        from_c_str(format),
        source.is_null(),
    ) else {
        return fail("NilPointer: ingredient arguments", -1);
    };
    let ingredient = match parse_json(&ingredient) {
        Ok(ingredient) => ingredient,
        Err(err) => return fail(err, -1),
    };
    match EngineStream::from_raw(source).read_all() {
        Ok(bytes) => {
            state.ingredients.push(json!({
                "ingredient": ingredient,
                "format": format,
                "size": bytes.len(),
            }));
            0
        }
        Err(status) => status as c_int,
    }
}

unsafe extern "C" fn c2pa_builder_to_archive(
    builder: *mut C2paBuilder,
    stream: *mut C2paStream,
) -> c_int {
    let (Some(state), false) = (builder_state(builder), stream.is_null()) else {
        return fail("NilPointer: archive arguments", -1);
    };
    let archive = [ARCHIVE_MARKER, serde_json::to_vec(state).unwrap().as_slice()].concat();
    match EngineStream::from_raw(stream).write_all(&archive) {
        Ok(()) => 0,
        Err(status) => status as c_int,
    }
}

/// Hands `manifest` to the caller through `manifest_bytes`, returning its length.
unsafe fn hand_out(manifest: Vec<u8>, manifest_bytes: *mut *const c_uchar) -> i64 {
    let len = manifest.len();
    if !manifest_bytes.is_null() {
        let bytes = Box::into_raw(manifest.into_boxed_slice()).cast::<u8>();
        MANIFEST_BYTES.lock().unwrap().push((bytes as usize, len));
        *manifest_bytes = bytes;
    }
    len as i64
}

unsafe extern "C" fn c2pa_builder_data_hashed_placeholder(
    builder: *mut C2paBuilder,
    reserved_size: usize,
    format: *const c_char,
    manifest_bytes: *mut *const c_uchar,
) -> i64 {
    if builder.is_null() || format.is_null() || manifest_bytes.is_null() {
        return fail("NilPointer: placeholder arguments", -1);
    }
    let placeholder = [MANIFEST_MARKER, vec![0u8; reserved_size].as_slice()].concat();
    hand_out(placeholder, manifest_bytes)
}

unsafe extern "C" fn c2pa_builder_sign_data_hashed_embeddable(
    builder: *mut C2paBuilder,
    signer: *mut C2paSigner,
    data_hash: *const c_char,
    format: *const c_char,
    asset: *mut C2paStream,
    manifest_bytes: *mut *const c_uchar,
) -> i64 {
    let (false, false, Some(data_hash), false) = (
        builder.is_null(),
        signer.is_null(),
        from_c_str(data_hash),
        format.is_null(),
    ) else {
        return fail("NilPointer: data hash arguments", -1);
    };
    if let Err(err) = parse_json(&data_hash) {
        return fail(err, -1);
    }
    let payload = if asset.is_null() {
        data_hash.into_bytes()
    } else {
        match EngineStream::from_raw(asset).read_all() {
            Ok(bytes) => bytes,
            Err(status) => return status as i64,
        }
    };
    match sign_with(signer, &payload) {
        Some(signature) => {
            let manifest = [MANIFEST_MARKER, signature.as_slice()].concat();
            hand_out(manifest, manifest_bytes)
        }
        None => -1,
    }
}

unsafe extern "C" fn c2pa_builder_sign(
    builder: *mut C2paBuilder,
    format: *const c_char,
    source: *mut C2paStream,
    dest: *mut C2paStream,
    signer: *mut C2paSigner,
    manifest_bytes: *mut *const c_uchar,
) -> i64 {
    let (Some(state), false, false, false, false) = (
        builder_state(builder),
        format.is_null(),
        source.is_null(),
        dest.is_null(),
        signer.is_null(),
    ) else {
        return fail("NilPointer: builder arguments", -1);
    };

    let Ok(asset) = EngineStream::from_raw(source).read_all() else {
        return -1;
    };
    let Some(signature) = sign_with(signer, &asset) else {
        return -1;
    };

    let manifest = [MANIFEST_MARKER, signature.as_slice()].concat();
    let mut output = Vec::new();
    if let Some(url) = &state.remote_url {
        output.extend_from_slice(REMOTE_MARKER);
        output.extend_from_slice(url.as_bytes());
        output.push(b'\n');
    }
    if !state.no_embed {
        output.extend_from_slice(&manifest);
    }
    output.extend_from_slice(&asset);
    if EngineStream::from_raw(dest).write_all(&output).is_err() {
        return -1;
    }
    hand_out(manifest, manifest_bytes)
}

unsafe extern "C" fn c2pa_builder_free(builder: *mut C2paBuilder) {
    if !builder.is_null() {
        drop(Box::from_raw(builder.cast::<EngineBuilderState>()));
    }
}

unsafe extern "C" fn c2pa_manifest_bytes_free(manifest_bytes: *const c_uchar) {
    let mut allocations = MANIFEST_BYTES.lock().unwrap();
    if let Some(index) = allocations
        .iter()
        .position(|(addr, _)| *addr == manifest_bytes as usize)
    {
        let (_, len) = allocations.swap_remove(index);
        drop(Box::from_raw(ptr::slice_from_raw_parts_mut(
            manifest_bytes.cast_mut(),
            len,
        )));
    }
}

/// A cursor the test can inspect while a stream owns it.
#[derive(Clone, Default)]
pub struct SharedCursor(pub Arc<Mutex<Cursor<Vec<u8>>>>);

impl SharedCursor {
    pub fn with_bytes(bytes: Vec<u8>) -> Self {
        Self(Arc::new(Mutex::new(Cursor::new(bytes))))
    }

    /// A copy of everything written so far.
    pub fn bytes(&self) -> Vec<u8> {
        self.0.lock().unwrap().get_ref().clone()
    }
}

impl Read for SharedCursor {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.0.lock().unwrap().read(buf)
    }
}

impl Write for SharedCursor {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Seek for SharedCursor {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.0.lock().unwrap().seek(pos)
    }
}
