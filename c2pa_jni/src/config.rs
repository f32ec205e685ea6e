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

use std::path::Path;

use log::LevelFilter;
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Environment variable holding bridge configuration, either inline JSON or a path to a JSON file.
pub const CONFIG_ENV: &str = "C2PA_JNI_CONFIG";

/// Environment variable overriding the engine library to load.
pub const ENGINE_LIBRARY_ENV: &str = "C2PA_ENGINE_LIBRARY";

/// Settings read once when the library is loaded.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BridgeConfig {
    /// File name or path of the c2pa engine shared library.
    pub engine_library: String,

    /// JNI name of the Kotlin stream class.
    pub stream_class: String,

    /// JNI name of the class returned by `Builder.signNative`.
    pub sign_result_class: String,

    /// Name of the signing method on callback objects.
    pub sign_method: String,

    /// JNI signature of the signing method.
    pub sign_method_signature: String,

    /// One of `off`, `error`, `warn`, `info`, `debug`, `trace`.
    pub log_level: String,

    /// Android log tag.
    pub log_tag: String,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            engine_library: "libc2pa_c.so".to_string(),
            stream_class: "org/contentauth/c2pa/Stream".to_string(),
            sign_result_class: "org/contentauth/c2pa/Builder$SignResult".to_string(),
            sign_method: "sign".to_string(),
            sign_method_signature: "([B)[B".to_string(),
            log_level: "info".to_string(),
            log_tag: "c2pa".to_string(),
        }
    }
}

impl BridgeConfig {
    /// Parses and validates a JSON configuration. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads configuration from [`CONFIG_ENV`] and [`ENGINE_LIBRARY_ENV`].
    pub fn from_env() -> Result<Self> {
        Self::from_sources(
            std::env::var(CONFIG_ENV).ok(),
            std::env::var(ENGINE_LIBRARY_ENV).ok(),
        )
    }

    fn from_sources(config: Option<String>, engine_library: Option<String>) -> Result<Self> {
        let mut config = match config.as_deref().map(str::trim) {
            None | Some("") => Self::default(),
            Some(json) if json.starts_with('{') => Self::from_json(json)?,
            Some(path) => Self::from_file(path)?,
        };

        if let Some(engine_library) = engine_library.filter(|lib| !lib.is_empty()) {
            config.engine_library = engine_library;
        }
        Ok(config)
    }

    /// Reads a JSON configuration file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .map_err(|err| Error::Config(format!("{}: {err}", path.display())))?;
        Self::from_json(&json)
    }

    pub fn log_level_filter(&self) -> Result<LevelFilter> {
        self.log_level
            .parse()
            .map_err(|_| Error::Config(format!("invalid log level: {}", self.log_level)))
    }

    fn validate(&self) -> Result<()> {
        self.log_level_filter()?;
        for (name, value) in [
            ("engine_library", &self.engine_library),
            ("stream_class", &self.stream_class),
            ("sign_result_class", &self.sign_result_class),
            ("sign_method", &self.sign_method),
            ("sign_method_signature", &self.sign_method_signature),
        ] {
            if value.is_empty() {
                return Err(Error::Config(format!("{name} cannot be empty")));
            }
        }
        Ok(())
    }
}
