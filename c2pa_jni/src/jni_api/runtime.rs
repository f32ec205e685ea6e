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

use std::{ffi::c_void, ptr, sync::Arc};

use jni::{
    errors::{Error as JniError, JniError as JniStatus},
    sys::JNI_OK,
    JNIEnv, JavaVM,
};

use crate::{
    thread_attach::{ensure_attached, ThreadAttach},
    Error, Result,
};

/// The Java VM the library was loaded into.
///
/// Threads are attached through the raw invocation interface so that the
/// bridge alone decides when they are detached.
pub struct JvmRuntime {
    vm: JavaVM,
}

impl JvmRuntime {
    pub fn new(vm: JavaVM) -> Self {
        Self { vm }
    }

    pub fn vm(&self) -> &JavaVM {
        &self.vm
    }

    /// Runs `f` with an environment for the current thread, attaching it first if needed.
    pub fn with_env<T, F>(self: &Arc<Self>, f: F) -> Result<T>
    where
        F: FnOnce(&mut JNIEnv<'_>) -> Result<T>,
    {
        ensure_attached(self)?;
        let mut env = self
            .vm
            .get_env()
            .map_err(|err| Error::NoEnvironment(err.to_string()))?;
        f(&mut env)
    }
}

impl ThreadAttach for JvmRuntime {
    fn is_current_thread_attached(&self) -> Result<bool> {
        match self.vm.get_env() {
            Ok(_) => Ok(true),
            Err(JniError::JniCall(JniStatus::ThreadDetached)) => Ok(false),
            Err(err) => Err(Error::NoEnvironment(err.to_string())),
        }
    }

    fn attach_current_thread(&self) -> Result<()> {
        let vm = self.vm.get_java_vm_pointer();
        let mut env: *mut c_void = ptr::null_mut();
        let status = unsafe {
            let attach = (**vm).AttachCurrentThread.ok_or_else(|| {
                Error::NoEnvironment("AttachCurrentThread is unavailable".to_string())
            })?;
            attach(vm, &mut env, ptr::null_mut())
        };
        if status != JNI_OK || env.is_null() {
            return Err(Error::NoEnvironment(format!(
                "AttachCurrentThread failed with {status}"
            )));
        }
        Ok(())
    }

    fn detach_current_thread(&self) -> Result<()> {
        let vm = self.vm.get_java_vm_pointer();
        let status = unsafe {
            let detach = (**vm).DetachCurrentThread.ok_or_else(|| {
                Error::NoEnvironment("DetachCurrentThread is unavailable".to_string())
            })?;
            detach(vm)
        };
        if status != JNI_OK {
            return Err(Error::Jni(format!("DetachCurrentThread failed with {status}")));
        }
        Ok(())
    }
}
