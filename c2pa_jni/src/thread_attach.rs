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

//! Attaching engine worker threads to the managed runtime.
//!
//! The engine may call a stream or signer callback from a thread the VM has
//! never seen. Such a thread is attached on first use and detached when it
//! exits. Threads that were already attached are left alone.

use std::{
    cell::RefCell,
    sync::{Arc, Weak},
};

use log::{debug, warn};

use crate::{Error, Result};

/// A managed runtime that native threads can attach to.
#[cfg_attr(test, mockall::automock)]
pub trait ThreadAttach {
    fn is_current_thread_attached(&self) -> Result<bool>;

    fn attach_current_thread(&self) -> Result<()>;

    fn detach_current_thread(&self) -> Result<()>;
}

/// How the current thread came to be attached.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Attachment {
    /// The thread was attached before the bridge saw it.
    Existing,

    /// The bridge attached the thread and will detach it on exit.
    Bridge,
}

/// Detaches the owning thread when its thread-local storage is destroyed.
///
/// Holds the runtime weakly so an unloaded runtime is never called.
struct DetachOnExit(Weak<dyn ThreadAttach>);

impl DetachOnExit {
    fn is_live(&self) -> bool {
        self.0.strong_count() > 0
    }
}

impl Drop for DetachOnExit {
    fn drop(&mut self) {
        if let Some(runtime) = self.0.upgrade() {
            match runtime.detach_current_thread() {
                Ok(()) => debug!("detached exiting thread"),
                Err(err) => warn!("failed to detach exiting thread: {err}"),
            }
        }
    }
}

thread_local! {
    static DETACH_ON_EXIT: RefCell<Option<DetachOnExit>> = const { RefCell::new(None) };
}

/// Makes sure the current thread is attached to `runtime`.
///
/// A failed attach is reported as [`Error::NoEnvironment`] and leaves no
/// record behind.
pub fn ensure_attached<R: ThreadAttach + 'static>(runtime: &Arc<R>) -> Result<Attachment> {
    if runtime.is_current_thread_attached()? {
        return Ok(Attachment::Existing);
    }

    runtime.attach_current_thread().map_err(|err| match err {
        Error::NoEnvironment(_) => err,
        err => Error::NoEnvironment(err.to_string()),
    })?;

    let runtime: Arc<dyn ThreadAttach> = runtime.clone();
    let guard = DetachOnExit(Arc::downgrade(&runtime));
    let recorded = DETACH_ON_EXIT.try_with(|slot| {
        let mut slot = slot.borrow_mut();
        // A guard for a runtime that is gone does nothing when dropped.
        if !slot.as_ref().is_some_and(DetachOnExit::is_live) {
            *slot = Some(guard);
        }
    });
    if recorded.is_err() {
        warn!("thread is exiting; it will not be detached automatically");
    }

    debug!("attached native thread {:?}", std::thread::current().id());
    Ok(Attachment::Bridge)
}

/// Returns true if the bridge attached the current thread and will detach it.
pub fn attached_by_bridge() -> bool {
    DETACH_ON_EXIT
        .try_with(|slot| slot.borrow().as_ref().is_some_and(DetachOnExit::is_live))
        .unwrap_or(false)
}
