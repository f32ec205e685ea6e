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

use std::sync::Arc;

use jni::{
    objects::{GlobalRef, JByteArray, JMethodID, JObject, JValue},
    signature::ReturnType,
    JNIEnv,
};

use super::{checked, runtime::JvmRuntime};
use crate::{signer_bridge::SignCallback, Error, Result};

/// A Kotlin signing callback, such as one backed by Android Keystore.
pub struct JavaSignCallback {
    runtime: Arc<JvmRuntime>,
    callback: GlobalRef,
    sign: JMethodID,
}

impl JavaSignCallback {
    /// Resolves `method_name` with JNI signature `method_signature` on `callback`'s class.
    pub fn new(
        env: &mut JNIEnv<'_>,
        runtime: Arc<JvmRuntime>,
        callback: &JObject<'_>,
        method_name: &str,
        method_signature: &str,
    ) -> Result<Self> {
        if callback.is_null() {
            return Err(Error::NilPointer("callback".to_string()));
        }

        let class = env.get_object_class(callback)?;
        let sign = env.get_method_id(&class, method_name, method_signature);
        env.delete_local_ref(class)?;
        let sign = sign.map_err(|err| {
            let _ = env.exception_clear();
            Error::InvalidArgument(format!(
                "callback has no {method_name}{method_signature} method: {err}"
            ))
        })?;

        Ok(Self {
            runtime,
            callback: env.new_global_ref(callback)?,
            sign,
        })
    }
}

impl SignCallback for JavaSignCallback {
    fn sign(&self, data: &[u8]) -> Result<Vec<u8>> {
        self.runtime.with_env(|env| {
            env.with_local_frame(2, |env| -> Result<Vec<u8>> {
                let input = env.byte_array_from_slice(data)?;
                let result = unsafe {
                    env.call_method_unchecked(
                        &self.callback,
                        self.sign,
                        ReturnType::Object,
                        &[JValue::Object(&input).as_jni()],
                    )
                };
                let signature = checked(env, result)?.l()?;
                if signature.is_null() {
                    return Ok(Vec::new());
                }
                Ok(env.convert_byte_array(JByteArray::from(signature))?)
            })
        })
    }
}
