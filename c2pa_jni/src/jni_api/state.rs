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

use std::sync::{Arc, RwLock};

use jni::objects::{GlobalRef, JMethodID};
use log::warn;

use super::{java_stream::StreamMethods, runtime::JvmRuntime};
use crate::{
    context_registry::ContextRegistry, engine::EngineApi, BridgeConfig, Error, Result,
};

/// Everything the entry points share, created in `JNI_OnLoad`.
pub struct Bridge {
    pub config: BridgeConfig,
    pub runtime: Arc<JvmRuntime>,
    pub engine: Arc<EngineApi>,
    pub registry: ContextRegistry,
    pub stream_methods: StreamMethods,
    pub sign_result_class: GlobalRef,
    pub sign_result_ctor: JMethodID,
}

static BRIDGE: RwLock<Option<Arc<Bridge>>> = RwLock::new(None);

fn with_slot<T>(f: impl FnOnce(&mut Option<Arc<Bridge>>) -> T) -> T {
    let mut slot = BRIDGE.write().unwrap_or_else(|poisoned| {
        warn!("bridge state lock poisoned, recovering");
        poisoned.into_inner()
    });
    f(&mut slot)
}

/// Installs `bridge`, returning the one it replaced.
pub fn install(bridge: Bridge) -> Option<Arc<Bridge>> {
    with_slot(|slot| slot.replace(Arc::new(bridge)))
}

pub fn current() -> Result<Arc<Bridge>> {
    let slot = BRIDGE.read().unwrap_or_else(|poisoned| poisoned.into_inner());
    slot.clone().ok_or(Error::NotInitialized)
}

pub fn take() -> Option<Arc<Bridge>> {
    with_slot(Option::take)
}
