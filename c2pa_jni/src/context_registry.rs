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

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard},
};

use log::{debug, warn};

use crate::{handle::SignerHandle, signer_bridge::SignerContext};

type ContextMap = HashMap<SignerHandle, Arc<SignerContext>>;

/// Tracks the context of every live callback signer.
///
/// All inserts, removals and teardown go through one lock. Managed callbacks
/// taken out of a context are dropped after the lock is released, since
/// dropping a JNI global reference calls back into the VM.
#[derive(Debug, Default)]
pub struct ContextRegistry {
    contexts: Mutex<ContextMap>,
}

impl ContextRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, ContextMap> {
        self.contexts.lock().unwrap_or_else(|poisoned| {
            warn!("signer context registry lock poisoned, recovering");
            poisoned.into_inner()
        })
    }

    /// Tracks `context` as the context of `signer`.
    pub fn register(&self, signer: SignerHandle, context: Arc<SignerContext>) {
        let replaced = self.lock().insert(signer, context);
        if let Some(stale) = replaced {
            // The engine reused the address of a signer that was never released.
            warn!("replacing stale signer context for {signer:?}");
            drop(stale.deactivate());
        }
    }

    /// Stops tracking `signer`, deactivating its context.
    ///
    /// Returns the context so the caller can reclaim any reference it gave
    /// the engine. Returns `None` for signers that were not registered.
    pub fn unregister(&self, signer: SignerHandle) -> Option<Arc<SignerContext>> {
        let (context, callback) = {
            let mut contexts = self.lock();
            let context = contexts.remove(&signer)?;
            let callback = context.deactivate();
            (context, callback)
        };
        drop(callback);
        Some(context)
    }

    pub fn get(&self, signer: SignerHandle) -> Option<Arc<SignerContext>> {
        self.lock().get(&signer).cloned()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Deactivates and forgets every context, returning how many there were.
    ///
    /// Used when the library is unloaded. Signers still held by the engine
    /// keep their (inactive) context alive, so late sign calls fail cleanly.
    pub fn teardown(&self) -> usize {
        let callbacks: Vec<_> = {
            let mut contexts = self.lock();
            contexts
                .drain()
                .map(|(_, context)| context.deactivate())
                .collect()
        };
        let count = callbacks.len();
        drop(callbacks);
        debug!("released {count} signer contexts");
        count
    }
}
