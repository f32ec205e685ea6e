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

//! Native methods of the `org.contentauth.c2pa` Kotlin classes.
//!
//! Every entry point converts failures into a thrown Java exception and
//! returns a neutral value. Panics never cross into the VM.

mod java_signer;
mod java_stream;
mod runtime;
mod state;

use std::{
    ffi::c_void,
    panic::{catch_unwind, AssertUnwindSafe},
    sync::Arc,
};

use jni::{
    objects::{JByteArray, JClass, JObject, JString, JValue},
    sys::{jboolean, jint, jlong, JNI_ERR, JNI_FALSE, JNI_TRUE, JNI_VERSION_1_6},
    JNIEnv, JavaVM,
};
use log::{debug, error, info, warn};

pub use self::{
    java_signer::JavaSignCallback,
    java_stream::{JavaStream, StreamMethods},
    runtime::JvmRuntime,
};
use self::state::Bridge;
use crate::{
    context_registry::ContextRegistry,
    ec_utils,
    engine::EngineApi,
    handle::{BuilderHandle, NativeHandle, ReaderHandle, SignerHandle, StreamHandle},
    intent::{BuilderIntent, DigitalSourceType},
    logging,
    manifest::{EngineBuilder, EngineReader},
    signer_bridge::CallbackSigner,
    stream_bridge::{panic_message, BridgeStream},
    BridgeConfig, Error, Result, SignerInfo, SigningAlg,
};

/// Converts a failed JNI call into a bridge error, clearing any Java exception it raised.
pub(crate) fn checked<T>(env: &mut JNIEnv<'_>, result: jni::errors::Result<T>) -> Result<T> {
    match result {
        Ok(value) => Ok(value),
        Err(jni::errors::Error::JavaException) => Err(Error::Callback(take_exception(env))),
        Err(err) => {
            if env.exception_check().unwrap_or(false) {
                let _ = env.exception_clear();
            }
            Err(err.into())
        }
    }
}

/// Clears the pending exception and describes it with `toString()`.
fn take_exception(env: &mut JNIEnv<'_>) -> String {
    let throwable = match env.exception_occurred() {
        Ok(throwable) if !throwable.is_null() => throwable,
        _ => return "Java exception".to_string(),
    };
    let _ = env.exception_clear();

    let description = env
        .call_method(&throwable, "toString", "()Ljava/lang/String;", &[])
        .and_then(|value| value.l())
        .and_then(|text| env.get_string(&JString::from(text)).map(String::from));
    let _ = env.delete_local_ref(throwable);

    description.unwrap_or_else(|_| {
        let _ = env.exception_clear();
        "Java exception".to_string()
    })
}

/// The thread's pending-exception slot, as seen by entry points.
#[cfg_attr(test, mockall::automock)]
pub(crate) trait ExceptionSink {
    fn exception_pending(&mut self) -> bool;

    /// Throws a new exception of JNI class `class`.
    fn throw_exception(&mut self, class: &str, message: &str) -> Result<()>;
}

impl ExceptionSink for JNIEnv<'_> {
    fn exception_pending(&mut self) -> bool {
        self.exception_check().unwrap_or(false)
    }

    fn throw_exception(&mut self, class: &str, message: &str) -> Result<()> {
        Ok(self.throw_new(class, message)?)
    }
}

/// Throws `err` as a Java exception unless one is already pending.
fn throw<E: ExceptionSink>(env: &mut E, err: &Error) {
    if env.exception_pending() {
        debug!("exception already pending, not throwing {err}");
        return;
    }
    // Engine errors already carry their own "Type: message" text.
    let message = match err {
        Error::Api(message) => message.clone(),
        err => err.to_string(),
    };
    if let Err(throw_err) = env.throw_exception(err.java_exception_class(), &message) {
        error!("failed to throw {message}: {throw_err}");
    }
}

/// Runs an entry point body, turning errors and panics into exceptions.
fn jni_call<E, T, F>(env: &mut E, neutral: T, f: F) -> T
where
    E: ExceptionSink,
    F: FnOnce(&mut E) -> Result<T>,
{
    let result = catch_unwind(AssertUnwindSafe(|| f(env)))
        .unwrap_or_else(|panic| Err(Error::Api(panic_message(panic.as_ref()))));
    match result {
        Ok(value) => value,
        Err(err) => {
            warn!("native call failed: {err}");
            throw(env, &err);
            neutral
        }
    }
}

fn get_string(env: &mut JNIEnv<'_>, s: &JString<'_>, name: &str) -> Result<String> {
    if s.is_null() {
        return Err(Error::NilPointer(name.to_string()));
    }
    Ok(env.get_string(s)?.into())
}

fn get_optional_string(env: &mut JNIEnv<'_>, s: &JString<'_>) -> Result<Option<String>> {
    if s.is_null() {
        return Ok(None);
    }
    Ok(Some(env.get_string(s)?.into()))
}

fn get_bytes(env: &mut JNIEnv<'_>, array: &JByteArray<'_>, name: &str) -> Result<Vec<u8>> {
    if array.is_null() {
        return Err(Error::NilPointer(name.to_string()));
    }
    Ok(env.convert_byte_array(array)?)
}

fn require_handle<T>(ptr: jlong, name: &str) -> Result<NativeHandle<T>> {
    NativeHandle::from_jlong(ptr).ok_or_else(|| Error::NilPointer(name.to_string()))
}

/// # Safety
/// A non-zero `ptr` must be a live reader handle.
unsafe fn reader_ref<'a>(ptr: jlong) -> Result<&'a EngineReader> {
    let reader: ReaderHandle = require_handle(ptr, "reader")?;
    Ok(&*reader.as_ptr())
}

/// # Safety
/// A non-zero `ptr` must be a live builder handle not in use on another thread.
unsafe fn builder_mut<'a>(ptr: jlong) -> Result<&'a mut EngineBuilder> {
    let builder: BuilderHandle = require_handle(ptr, "builder")?;
    Ok(&mut *builder.as_ptr())
}

/// # Safety
/// A non-zero `ptr` must be a live stream handle.
unsafe fn stream_ref<'a>(ptr: jlong, name: &str) -> Result<&'a BridgeStream> {
    let stream: StreamHandle = require_handle(ptr, name)?;
    Ok(BridgeStream::from_handle(stream))
}

fn new_optional_string<'local>(
    env: &mut JNIEnv<'local>,
    s: Option<String>,
) -> Result<JString<'local>> {
    match s {
        Some(s) => Ok(env.new_string(s)?),
        None => Ok(JString::default()),
    }
}

fn load_bridge(vm: JavaVM) -> Result<Bridge> {
    let config = BridgeConfig::from_env()?;
    let level = logging::init_logging(&config);
    debug!("native bridge logging at {level}");

    let runtime = Arc::new(JvmRuntime::new(vm));
    let mut env = runtime.vm().get_env()?;

    let engine = Arc::new(EngineApi::load(&config.engine_library)?);
    info!("loaded {} ({})", config.engine_library, engine.version()?);

    let stream_methods = StreamMethods::lookup(&mut env, &config.stream_class)?;
    let class = env.find_class(&config.sign_result_class)?;
    let sign_result_ctor = env.get_method_id(&class, "<init>", "(J[B)V")?;
    let sign_result_class = env.new_global_ref(&class)?;
    env.delete_local_ref(class)?;
    drop(env);

    Ok(Bridge {
        config,
        runtime,
        engine,
        registry: ContextRegistry::new(),
        stream_methods,
        sign_result_class,
        sign_result_ctor,
    })
}

#[no_mangle]
pub extern "system" fn JNI_OnLoad(vm: JavaVM, _reserved: *mut c_void) -> jint {
    let loaded = catch_unwind(AssertUnwindSafe(|| load_bridge(vm)))
        .unwrap_or_else(|panic| Err(Error::Api(panic_message(panic.as_ref()))));
    match loaded {
        Ok(bridge) => {
            if let Some(previous) = state::install(bridge) {
                previous.registry.teardown();
            }
            JNI_VERSION_1_6
        }
        Err(err) => {
            error!("failed to load c2pa native bridge: {err}");
            JNI_ERR
        }
    }
}

#[no_mangle]
pub extern "system" fn JNI_OnUnload(_vm: JavaVM, _reserved: *mut c_void) {
    if let Some(bridge) = state::take() {
        let released = bridge.registry.teardown();
        info!("unloaded c2pa native bridge, released {released} signer contexts");
    }
}

#[no_mangle]
pub extern "system" fn Java_org_contentauth_c2pa_C2PA_version<'local>(
    mut env: JNIEnv<'local>,
    _class: JClass<'local>,
) -> JString<'local> {
    jni_call(&mut env, JString::default(), |env| {
        let version = state::current()?.engine.version()?;
        Ok(env.new_string(version)?)
    })
}

/// Returns and clears the engine's last error, or null if there is none.
#[no_mangle]
pub extern "system" fn Java_org_contentauth_c2pa_C2PA_getError<'local>(
    mut env: JNIEnv<'local>,
    _class: JClass<'local>,
) -> JString<'local> {
    jni_call(&mut env, JString::default(), |env| {
        let error = state::current()?.engine.last_error()?;
        new_optional_string(env, error)
    })
}

#[no_mangle]
pub extern "system" fn Java_org_contentauth_c2pa_C2PA_loadSettingsNative<'local>(
    mut env: JNIEnv<'local>,
    _class: JClass<'local>,
    settings: JString<'local>,
    format: JString<'local>,
) -> jint {
    jni_call(&mut env, -1, |env| {
        let settings = get_string(env, &settings, "settings")?;
        let format = get_string(env, &format, "format")?;
        state::current()?.engine.load_settings(&settings, &format)?;
        Ok(0)
    })
}

#[no_mangle]
pub extern "system" fn Java_org_contentauth_c2pa_C2PA_ed25519SignNative<'local>(
    mut env: JNIEnv<'local>,
    _class: JClass<'local>,
    data: JByteArray<'local>,
    private_key: JString<'local>,
) -> JByteArray<'local> {
    jni_call(&mut env, JByteArray::default(), |env| {
        let data = get_bytes(env, &data, "data")?;
        let private_key = get_string(env, &private_key, "private key")?;
        let signature = state::current()?.engine.ed25519_sign(&data, &private_key)?;
        Ok(env.byte_array_from_slice(&signature)?)
    })
}

/// Converts a DER ECDSA signature, as produced by Android Keystore, to raw `R || S`.
#[no_mangle]
pub extern "system" fn Java_org_contentauth_c2pa_C2PA_ecdsaSignatureToRawNative<'local>(
    mut env: JNIEnv<'local>,
    _class: JClass<'local>,
    der_signature: JByteArray<'local>,
    algorithm: JString<'local>,
) -> JByteArray<'local> {
    jni_call(&mut env, JByteArray::default(), |env| {
        let der = get_bytes(env, &der_signature, "signature")?;
        let alg: SigningAlg = get_string(env, &algorithm, "algorithm")?.parse()?;
        let raw = ec_utils::der_to_raw(alg, &der)?;
        Ok(env.byte_array_from_slice(&raw)?)
    })
}

#[no_mangle]
pub extern "system" fn Java_org_contentauth_c2pa_C2PA_readFileNative<'local>(
    mut env: JNIEnv<'local>,
    _class: JClass<'local>,
    path: JString<'local>,
    data_dir: JString<'local>,
) -> JString<'local> {
    jni_call(&mut env, JString::default(), |env| {
        let path = get_string(env, &path, "path")?;
        let data_dir = get_optional_string(env, &data_dir)?;
        let json = state::current()?
            .engine
            .read_file(&path, data_dir.as_deref())?;
        Ok(env.new_string(json)?)
    })
}

#[no_mangle]
pub extern "system" fn Java_org_contentauth_c2pa_C2PA_readIngredientFileNative<'local>(
    mut env: JNIEnv<'local>,
    _class: JClass<'local>,
    path: JString<'local>,
    data_dir: JString<'local>,
) -> JString<'local> {
    jni_call(&mut env, JString::default(), |env| {
        let path = get_string(env, &path, "path")?;
        let data_dir = get_string(env, &data_dir, "data directory")?;
        let json = state::current()?
            .engine
            .read_ingredient_file(&path, &data_dir)?;
        Ok(env.new_string(json)?)
    })
}

/// Signs a file with a key, returning the engine's result string.
#[allow(clippy::too_many_arguments)]
#[no_mangle]
pub extern "system" fn Java_org_contentauth_c2pa_C2PA_signFileNative<'local>(
    mut env: JNIEnv<'local>,
    _class: JClass<'local>,
    source_path: JString<'local>,
    dest_path: JString<'local>,
    manifest: JString<'local>,
    algorithm: JString<'local>,
    certificate_pem: JString<'local>,
    private_key_pem: JString<'local>,
    tsa_url: JString<'local>,
    data_dir: JString<'local>,
) -> JString<'local> {
    jni_call(&mut env, JString::default(), |env| {
        let source_path = get_string(env, &source_path, "source path")?;
        let dest_path = get_string(env, &dest_path, "destination path")?;
        let manifest = get_string(env, &manifest, "manifest")?;
        let signer_info = SignerInfo::new(
            &get_string(env, &algorithm, "algorithm")?,
            &get_string(env, &certificate_pem, "certificate")?,
            &get_string(env, &private_key_pem, "private key")?,
            get_optional_string(env, &tsa_url)?,
        )?;
        let data_dir = get_optional_string(env, &data_dir)?;

        let result = state::current()?.engine.sign_file(
            &source_path,
            &dest_path,
            &manifest,
            &signer_info,
            data_dir.as_deref(),
        )?;
        Ok(env.new_string(result)?)
    })
}

/// Creates the native stream for a Kotlin `Stream`.
#[no_mangle]
pub extern "system" fn Java_org_contentauth_c2pa_Stream_createStreamNative<'local>(
    mut env: JNIEnv<'local>,
    this: JObject<'local>,
) -> jlong {
    jni_call(&mut env, 0, |env| {
        let bridge = state::current()?;
        let managed = JavaStream::new(env, bridge.runtime.clone(), &this, bridge.stream_methods)?;
        let stream = BridgeStream::new(bridge.engine.clone(), Box::new(managed))?;
        Ok(stream.into_handle().to_jlong())
    })
}

#[no_mangle]
pub extern "system" fn Java_org_contentauth_c2pa_Stream_releaseStreamNative<'local>(
    mut env: JNIEnv<'local>,
    _this: JObject<'local>,
    stream_ptr: jlong,
) {
    jni_call(&mut env, (), |_| {
        if let Some(stream) = StreamHandle::from_jlong(stream_ptr) {
            unsafe { BridgeStream::release(stream) };
        }
        Ok(())
    })
}

#[no_mangle]
pub extern "system" fn Java_org_contentauth_c2pa_Signer_nativeFromCallback<'local>(
    mut env: JNIEnv<'local>,
    _class: JClass<'local>,
    algorithm: JString<'local>,
    certificate_chain: JString<'local>,
    tsa_url: JString<'local>,
    callback: JObject<'local>,
) -> jlong {
    jni_call(&mut env, 0, |env| {
        let bridge = state::current()?;
        let alg: SigningAlg = get_string(env, &algorithm, "algorithm")?.parse()?;
        let certs = get_string(env, &certificate_chain, "certificate chain")?;
        let tsa_url = get_optional_string(env, &tsa_url)?.filter(|url| !url.is_empty());

        let callback = JavaSignCallback::new(
            env,
            bridge.runtime.clone(),
            &callback,
            &bridge.config.sign_method,
            &bridge.config.sign_method_signature,
        )?;
        let signer = CallbackSigner::create(
            &bridge.engine,
            &bridge.registry,
            Arc::new(callback),
            alg,
            &certs,
            tsa_url.as_deref(),
        )?;
        Ok(signer.to_jlong())
    })
}

/// Creates an engine signer from PEM certificate and key material.
#[no_mangle]
pub extern "system" fn Java_org_contentauth_c2pa_Signer_nativeFromInfo<'local>(
    mut env: JNIEnv<'local>,
    _class: JClass<'local>,
    algorithm: JString<'local>,
    certificate_pem: JString<'local>,
    private_key_pem: JString<'local>,
    tsa_url: JString<'local>,
) -> jlong {
    jni_call(&mut env, 0, |env| {
        let signer_info = SignerInfo::new(
            &get_string(env, &algorithm, "algorithm")?,
            &get_string(env, &certificate_pem, "certificate")?,
            &get_string(env, &private_key_pem, "private key")?,
            get_optional_string(env, &tsa_url)?,
        )?;
        let signer = state::current()?.engine.signer_from_info(&signer_info)?;
        Ok(signer.to_jlong())
    })
}

#[no_mangle]
pub extern "system" fn Java_org_contentauth_c2pa_Signer_reserveSizeNative<'local>(
    mut env: JNIEnv<'local>,
    _this: JObject<'local>,
    signer_ptr: jlong,
) -> jlong {
    jni_call(&mut env, -1, |_| {
        let signer: SignerHandle = require_handle(signer_ptr, "signer")?;
        unsafe { state::current()?.engine.signer_reserve_size(signer) }
    })
}

#[no_mangle]
pub extern "system" fn Java_org_contentauth_c2pa_Signer_free<'local>(
    mut env: JNIEnv<'local>,
    _this: JObject<'local>,
    signer_ptr: jlong,
) {
    jni_call(&mut env, (), |_| {
        if let Some(signer) = SignerHandle::from_jlong(signer_ptr) {
            let bridge = state::current()?;
            unsafe { CallbackSigner::release(&bridge.engine, &bridge.registry, signer) };
        }
        Ok(())
    })
}

#[no_mangle]
pub extern "system" fn Java_org_contentauth_c2pa_Reader_fromStreamNative<'local>(
    mut env: JNIEnv<'local>,
    _class: JClass<'local>,
    format: JString<'local>,
    stream_ptr: jlong,
) -> jlong {
    jni_call(&mut env, 0, |env| {
        let format = get_string(env, &format, "format")?;
        let stream = unsafe { stream_ref(stream_ptr, "stream")? };
        let reader = EngineReader::from_stream(&state::current()?.engine, &format, stream)?;
        Ok(ReaderHandle::from_box(Box::new(reader)).to_jlong())
    })
}

#[no_mangle]
pub extern "system" fn Java_org_contentauth_c2pa_Reader_fromManifestDataAndStreamNative<
    'local,
>(
    mut env: JNIEnv<'local>,
    _class: JClass<'local>,
    format: JString<'local>,
    stream_ptr: jlong,
    manifest_data: JByteArray<'local>,
) -> jlong {
    jni_call(&mut env, 0, |env| {
        let format = get_string(env, &format, "format")?;
        let manifest_data = get_bytes(env, &manifest_data, "manifest data")?;
        let stream = unsafe { stream_ref(stream_ptr, "stream")? };
        let bridge = state::current()?;

        let reader = EngineReader::from_manifest_data_and_stream(
            &bridge.engine,
            &format,
            stream,
            &manifest_data,
        )?;
        Ok(ReaderHandle::from_box(Box::new(reader)).to_jlong())
    })
}

#[no_mangle]
pub extern "system" fn Java_org_contentauth_c2pa_Reader_toJsonNative<'local>(
    mut env: JNIEnv<'local>,
    _this: JObject<'local>,
    reader_ptr: jlong,
) -> JString<'local> {
    jni_call(&mut env, JString::default(), |env| {
        let json = unsafe { reader_ref(reader_ptr)? }.json()?;
        Ok(env.new_string(json)?)
    })
}

#[no_mangle]
pub extern "system" fn Java_org_contentauth_c2pa_Reader_toDetailedJsonNative<'local>(
    mut env: JNIEnv<'local>,
    _this: JObject<'local>,
    reader_ptr: jlong,
) -> JString<'local> {
    jni_call(&mut env, JString::default(), |env| {
        let json = unsafe { reader_ref(reader_ptr)? }.detailed_json()?;
        Ok(env.new_string(json)?)
    })
}

/// Returns the URL the manifest was fetched from, or null for an embedded manifest.
#[no_mangle]
pub extern "system" fn Java_org_contentauth_c2pa_Reader_remoteUrlNative<'local>(
    mut env: JNIEnv<'local>,
    _this: JObject<'local>,
    reader_ptr: jlong,
) -> JString<'local> {
    jni_call(&mut env, JString::default(), |env| {
        let url = unsafe { reader_ref(reader_ptr)? }.remote_url()?;
        new_optional_string(env, url)
    })
}

#[no_mangle]
pub extern "system" fn Java_org_contentauth_c2pa_Reader_isEmbeddedNative<'local>(
    mut env: JNIEnv<'local>,
    _this: JObject<'local>,
    reader_ptr: jlong,
) -> jboolean {
    jni_call(&mut env, JNI_FALSE, |_| {
        let embedded = unsafe { reader_ref(reader_ptr)? }.is_embedded();
        Ok(if embedded { JNI_TRUE } else { JNI_FALSE })
    })
}

#[no_mangle]
pub extern "system" fn Java_org_contentauth_c2pa_Reader_resourceToStreamNative<'local>(
    mut env: JNIEnv<'local>,
    _this: JObject<'local>,
    reader_ptr: jlong,
    uri: JString<'local>,
    stream_ptr: jlong,
) -> jlong {
    jni_call(&mut env, -1, |env| {
        let uri = get_string(env, &uri, "uri")?;
        unsafe {
            let stream = stream_ref(stream_ptr, "stream")?;
            reader_ref(reader_ptr)?.resource_to_stream(&uri, stream)
        }
    })
}

#[no_mangle]
pub extern "system" fn Java_org_contentauth_c2pa_Reader_free<'local>(
    mut env: JNIEnv<'local>,
    _this: JObject<'local>,
    reader_ptr: jlong,
) {
    jni_call(&mut env, (), |_| {
        if let Some(reader) = ReaderHandle::from_jlong(reader_ptr) {
            drop(unsafe { Box::from_raw(reader.as_ptr()) });
        }
        Ok(())
    })
}

#[no_mangle]
pub extern "system" fn Java_org_contentauth_c2pa_Builder_nativeFromJson<'local>(
    mut env: JNIEnv<'local>,
    _class: JClass<'local>,
    manifest_json: JString<'local>,
) -> jlong {
    jni_call(&mut env, 0, |env| {
        let manifest_json = get_string(env, &manifest_json, "manifest JSON")?;
        let builder = EngineBuilder::from_json(&state::current()?.engine, &manifest_json)?;
        Ok(BuilderHandle::from_box(Box::new(builder)).to_jlong())
    })
}

#[no_mangle]
pub extern "system" fn Java_org_contentauth_c2pa_Builder_nativeFromArchive<'local>(
    mut env: JNIEnv<'local>,
    _class: JClass<'local>,
    stream_ptr: jlong,
) -> jlong {
    jni_call(&mut env, 0, |_| {
        let stream = unsafe { stream_ref(stream_ptr, "stream")? };
        let builder = EngineBuilder::from_archive(&state::current()?.engine, stream)?;
        Ok(BuilderHandle::from_box(Box::new(builder)).to_jlong())
    })
}

/// Sets the builder intent from the ordinals of the Kotlin enums.
#[no_mangle]
pub extern "system" fn Java_org_contentauth_c2pa_Builder_setIntentNative<'local>(
    mut env: JNIEnv<'local>,
    _this: JObject<'local>,
    builder_ptr: jlong,
    intent: jint,
    digital_source_type: jint,
) -> jint {
    jni_call(&mut env, -1, |_| {
        let intent = BuilderIntent::try_from(intent)?;
        let digital_source_type = DigitalSourceType::try_from(digital_source_type)?;
        unsafe { builder_mut(builder_ptr)? }.set_intent(intent, digital_source_type)?;
        Ok(0)
    })
}

#[no_mangle]
pub extern "system" fn Java_org_contentauth_c2pa_Builder_addActionNative<'local>(
    mut env: JNIEnv<'local>,
    _this: JObject<'local>,
    builder_ptr: jlong,
    action_json: JString<'local>,
) -> jint {
    jni_call(&mut env, -1, |env| {
        let action_json = get_string(env, &action_json, "action JSON")?;
        unsafe { builder_mut(builder_ptr)? }.add_action(&action_json)?;
        Ok(0)
    })
}

#[no_mangle]
pub extern "system" fn Java_org_contentauth_c2pa_Builder_setNoEmbedNative<'local>(
    mut env: JNIEnv<'local>,
    _this: JObject<'local>,
    builder_ptr: jlong,
) {
    jni_call(&mut env, (), |_| {
        unsafe { builder_mut(builder_ptr)? }.set_no_embed();
        Ok(())
    })
}

#[no_mangle]
pub extern "system" fn Java_org_contentauth_c2pa_Builder_setRemoteUrlNative<'local>(
    mut env: JNIEnv<'local>,
    _this: JObject<'local>,
    builder_ptr: jlong,
    remote_url: JString<'local>,
) -> jint {
    jni_call(&mut env, -1, |env| {
        let remote_url = get_string(env, &remote_url, "remote URL")?;
        unsafe { builder_mut(builder_ptr)? }.set_remote_url(&remote_url)?;
        Ok(0)
    })
}

#[no_mangle]
pub extern "system" fn Java_org_contentauth_c2pa_Builder_addResourceNative<'local>(
    mut env: JNIEnv<'local>,
    _this: JObject<'local>,
    builder_ptr: jlong,
    uri: JString<'local>,
    stream_ptr: jlong,
) -> jint {
    jni_call(&mut env, -1, |env| {
        let uri = get_string(env, &uri, "uri")?;
        unsafe {
            builder_mut(builder_ptr)?.add_resource(&uri, stream_ref(stream_ptr, "stream")?)?;
        }
        Ok(0)
    })
}

#[no_mangle]
pub extern "system" fn Java_org_contentauth_c2pa_Builder_addIngredientFromStreamNative<'local>(
    mut env: JNIEnv<'local>,
    _this: JObject<'local>,
    builder_ptr: jlong,
    ingredient_json: JString<'local>,
    format: JString<'local>,
    stream_ptr: jlong,
) -> jint {
    jni_call(&mut env, -1, |env| {
        let ingredient_json = get_string(env, &ingredient_json, "ingredient JSON")?;
        let format = get_string(env, &format, "format")?;
        unsafe {
            builder_mut(builder_ptr)?.add_ingredient_from_stream(
                &ingredient_json,
                &format,
                stream_ref(stream_ptr, "stream")?,
            )?;
        }
        Ok(0)
    })
}

#[no_mangle]
pub extern "system" fn Java_org_contentauth_c2pa_Builder_toArchiveNative<'local>(
    mut env: JNIEnv<'local>,
    _this: JObject<'local>,
    builder_ptr: jlong,
    stream_ptr: jlong,
) -> jint {
    jni_call(&mut env, -1, |_| {
        unsafe { builder_mut(builder_ptr)?.to_archive(stream_ref(stream_ptr, "stream")?)? };
        Ok(0)
    })
}

#[no_mangle]
pub extern "system" fn Java_org_contentauth_c2pa_Builder_dataHashedPlaceholderNative<'local>(
    mut env: JNIEnv<'local>,
    _this: JObject<'local>,
    builder_ptr: jlong,
    reserved_size: jlong,
    format: JString<'local>,
) -> JByteArray<'local> {
    jni_call(&mut env, JByteArray::default(), |env| {
        let reserved_size = usize::try_from(reserved_size)
            .ok()
            .filter(|size| *size > 0)
            .ok_or_else(|| {
                Error::InvalidArgument(format!("Reserved size must be positive: {reserved_size}"))
            })?;
        let format = get_string(env, &format, "format")?;
        let placeholder =
            unsafe { builder_mut(builder_ptr)? }.data_hashed_placeholder(reserved_size, &format)?;
        Ok(env.byte_array_from_slice(&placeholder)?)
    })
}

/// Signs a data hashed manifest. An `asset_ptr` of 0 means the caller hashed the asset itself.
#[no_mangle]
pub extern "system" fn Java_org_contentauth_c2pa_Builder_signDataHashedEmbeddableNative<
    'local,
>(
    mut env: JNIEnv<'local>,
    _this: JObject<'local>,
    builder_ptr: jlong,
    signer_ptr: jlong,
    data_hash: JString<'local>,
    format: JString<'local>,
    asset_ptr: jlong,
) -> JByteArray<'local> {
    jni_call(&mut env, JByteArray::default(), |env| {
        let signer: SignerHandle = require_handle(signer_ptr, "signer")?;
        let data_hash = get_string(env, &data_hash, "data hash")?;
        let format = get_string(env, &format, "format")?;

        let asset = StreamHandle::from_jlong(asset_ptr)
            .map(|asset| unsafe { BridgeStream::from_handle(asset) });

        let manifest = unsafe {
            builder_mut(builder_ptr)?.sign_data_hashed_embeddable(
                signer,
                &data_hash,
                &format,
                asset,
            )?
        };
        Ok(env.byte_array_from_slice(&manifest)?)
    })
}

/// Signs the source stream into the destination stream, returning a `Builder.SignResult`.
#[no_mangle]
pub extern "system" fn Java_org_contentauth_c2pa_Builder_signNative<'local>(
    mut env: JNIEnv<'local>,
    _this: JObject<'local>,
    builder_ptr: jlong,
    format: JString<'local>,
    source_ptr: jlong,
    dest_ptr: jlong,
    signer_ptr: jlong,
) -> JObject<'local> {
    jni_call(&mut env, JObject::null(), |env| {
        let signer: SignerHandle = require_handle(signer_ptr, "signer")?;
        let format = get_string(env, &format, "format")?;
        let bridge = state::current()?;

        let result = unsafe {
            builder_mut(builder_ptr)?.sign(
                &format,
                stream_ref(source_ptr, "source stream")?,
                stream_ref(dest_ptr, "destination stream")?,
                signer,
            )?
        };

        let manifest_bytes = match &result.manifest_bytes {
            Some(bytes) if !bytes.is_empty() => JObject::from(env.byte_array_from_slice(bytes)?),
            _ => JObject::null(),
        };
        let class = <&JClass>::from(bridge.sign_result_class.as_obj());
        let sign_result = unsafe {
            env.new_object_unchecked(
                class,
                bridge.sign_result_ctor,
                &[
                    JValue::Long(result.size).as_jni(),
                    JValue::Object(&manifest_bytes).as_jni(),
                ],
            )
        };
        checked(env, sign_result)
    })
}

#[no_mangle]
pub extern "system" fn Java_org_contentauth_c2pa_Builder_free<'local>(
    mut env: JNIEnv<'local>,
    _this: JObject<'local>,
    builder_ptr: jlong,
) {
    jni_call(&mut env, (), |_| {
        if let Some(builder) = BuilderHandle::from_jlong(builder_ptr) {
            drop(unsafe { Box::from_raw(builder.as_ptr()) });
        }
        Ok(())
    })
}
