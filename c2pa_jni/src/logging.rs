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

use log::LevelFilter;

use crate::BridgeConfig;

/// Routes `log` output to logcat on Android, or to stderr elsewhere.
///
/// Safe to call more than once; a logger installed by the host wins.
pub fn init_logging(config: &BridgeConfig) -> LevelFilter {
    let level = config.log_level_filter().unwrap_or(LevelFilter::Info);

    #[cfg(target_os = "android")]
    android_logger::init_once(
        android_logger::Config::default()
            .with_max_level(level)
            .with_tag(config.log_tag.as_str()),
    );

    #[cfg(not(target_os = "android"))]
    let _ = env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .try_init();

    level
}
