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
    objects::{GlobalRef, JMethodID, JObject, JValue},
    signature::{Primitive, ReturnType},
    sys::{jsize, jvalue},
    JNIEnv,
};

use super::{checked, runtime::JvmRuntime};
use crate::{
    stream_bridge::{ManagedStream, SeekMode},
    Error, Result,
};

/// Method ids of the Kotlin `Stream` class, resolved once at load time.
#[derive(Clone, Copy, Debug)]
pub struct StreamMethods {
    read: JMethodID,
    seek: JMethodID,
    write: JMethodID,
    flush: JMethodID,
}

impl StreamMethods {
    pub fn lookup(env: &mut JNIEnv<'_>, class_name: &str) -> Result<Self> {
        let class = env.find_class(class_name)?;
        let methods = Self {
            read: env.get_method_id(&class, "read", "([BJ)J")?,
            seek: env.get_method_id(&class, "seek", "(JI)J")?,
            write: env.get_method_id(&class, "write", "([BJ)J")?,
            flush: env.get_method_id(&class, "flush", "()J")?,
        };
        env.delete_local_ref(class)?;
        Ok(methods)
    }
}

/// A Kotlin `Stream` object driven by the engine.
pub struct JavaStream {
    runtime: Arc<JvmRuntime>,
    stream: GlobalRef,
    methods: StreamMethods,
}

impl JavaStream {
    pub fn new(
        env: &JNIEnv<'_>,
        runtime: Arc<JvmRuntime>,
        stream: &JObject<'_>,
        methods: StreamMethods,
    ) -> Result<Self> {
        if stream.is_null() {
            return Err(Error::NilPointer("stream".to_string()));
        }
        Ok(Self {
            runtime,
            stream: env.new_global_ref(stream)?,
            methods,
        })
    }

    fn call_long(&self, env: &mut JNIEnv<'_>, method: JMethodID, args: &[jvalue]) -> Result<i64> {
        let result = unsafe {
            env.call_method_unchecked(
                &self.stream,
                method,
                ReturnType::Primitive(Primitive::Long),
                args,
            )
        };
        Ok(checked(env, result)?.j()?)
    }
}

fn as_jbytes_mut(bytes: &mut [u8]) -> &mut [i8] {
    // Safety: u8 and i8 have the same size and alignment.
    unsafe { std::slice::from_raw_parts_mut(bytes.as_mut_ptr().cast::<i8>(), bytes.len()) }
}

impl ManagedStream for JavaStream {
    fn read(&mut self, buf: &mut [u8]) -> Result<i64> {
        self.runtime.with_env(|env| {
            env.with_local_frame(2, |env| -> Result<i64> {
                let array = env.new_byte_array(buf.len() as jsize)?;
                let count = self.call_long(
                    env,
                    self.methods.read,
                    &[
                        JValue::Object(&array).as_jni(),
                        JValue::Long(buf.len() as i64).as_jni(),
                    ],
                )?;
                if count > 0 {
                    let copied = (count as usize).min(buf.len());
                    env.get_byte_array_region(&array, 0, as_jbytes_mut(&mut buf[..copied]))?;
                }
                Ok(count)
            })
        })
    }

    fn seek(&mut self, offset: i64, mode: SeekMode) -> Result<i64> {
        self.runtime.with_env(|env| {
            self.call_long(
                env,
                self.methods.seek,
                &[JValue::Long(offset).as_jni(), JValue::Int(mode as i32).as_jni()],
            )
        })
    }

    fn write(&mut self, data: &[u8]) -> Result<i64> {
        self.runtime.with_env(|env| {
            env.with_local_frame(2, |env| -> Result<i64> {
                let array = env.byte_array_from_slice(data)?;
                self.call_long(
                    env,
                    self.methods.write,
                    &[
                        JValue::Object(&array).as_jni(),
                        JValue::Long(data.len() as i64).as_jni(),
                    ],
                )
            })
        })
    }

    fn flush(&mut self) -> Result<i64> {
        self.runtime
            .with_env(|env| self.call_long(env, self.methods.flush, &[]))
    }
}
