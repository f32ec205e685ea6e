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

#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![deny(clippy::unwrap_used)]

//! JNI bridge between the C2PA Android bindings and the native C2PA engine.
//!
//! The engine reads and writes assets through stream callbacks and asks for
//! signatures through a signer callback. This crate implements those
//! callbacks over Kotlin objects, attaches engine worker threads to the VM
//! when they call back, and turns failures in either direction into the
//! engine's last-error slot or a thrown Java exception.
//!
//! The bridge logic is independent of JNI. [`stream_bridge`] and
//! [`signer_bridge`] work with any [`ManagedStream`] or [`SignCallback`], and
//! [`jni_api`] supplies the Kotlin-backed implementations.

pub mod config;
pub mod context_registry;
pub mod ec_utils;
pub mod engine;
mod error;
pub mod handle;
pub mod intent;
pub mod jni_api;
pub mod logging;
pub mod manifest;
pub mod signer_bridge;
mod signer_info;
mod signing_alg;
pub mod stream_bridge;
pub mod thread_attach;

#[cfg(test)]
mod test_engine;

pub use config::BridgeConfig;
pub use context_registry::ContextRegistry;
pub use engine::EngineApi;
pub use error::{Error, Result};
pub use handle::{NativeHandle, SignerHandle, StreamHandle};
pub use intent::{BuilderIntent, DigitalSourceType};
pub use manifest::{EngineBuilder, EngineReader, SignResult};
pub use signer_bridge::{CallbackSigner, SignCallback, SignerContext};
pub use signer_info::SignerInfo;
pub use signing_alg::SigningAlg;
pub use stream_bridge::{BridgeStream, IoStream, ManagedStream, MemoryStream, SeekMode};
