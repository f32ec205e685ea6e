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

//! Builder intents and digital source types.
//!
//! Kotlin passes both as enum ordinals, which match the engine's C enums.
//! Values are checked here so an out of range ordinal never reaches the engine.

use crate::Error;

/// What a builder's manifest claims about the asset.
#[repr(i32)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BuilderIntent {
    /// A new asset; requires a digital source type.
    Create = 0,
    /// An edit of an existing parent asset.
    Edit = 1,
    /// A restricted edit for non-editorial changes.
    Update = 2,
}

impl TryFrom<i32> for BuilderIntent {
    type Error = Error;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Create),
            1 => Ok(Self::Edit),
            2 => Ok(Self::Update),
            _ => Err(Error::InvalidArgument(format!("Invalid builder intent: {value}"))),
        }
    }
}

/// The IPTC digital source type recorded for a created asset.
#[repr(i32)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DigitalSourceType {
    Empty,
    TrainedAlgorithmicData,
    DigitalCapture,
    ComputationalCapture,
    NegativeFilm,
    PositiveFilm,
    Print,
    HumanEdits,
    CompositeWithTrainedAlgorithmicMedia,
    AlgorithmicallyEnhanced,
    DigitalCreation,
    DataDrivenMedia,
    TrainedAlgorithmicMedia,
    AlgorithmicMedia,
    ScreenCapture,
    VirtualRecording,
    Composite,
    CompositeCapture,
    CompositeSynthetic,
}

impl DigitalSourceType {
    /// Every type, in ordinal order.
    const ALL: [Self; 19] = [
        Self::Empty,
        Self::TrainedAlgorithmicData,
        Self::DigitalCapture,
        Self::ComputationalCapture,
        Self::NegativeFilm,
        Self::PositiveFilm,
        Self::Print,
        Self::HumanEdits,
        Self::CompositeWithTrainedAlgorithmicMedia,
        Self::AlgorithmicallyEnhanced,
        Self::DigitalCreation,
        Self::DataDrivenMedia,
        Self::TrainedAlgorithmicMedia,
        Self::AlgorithmicMedia,
        Self::ScreenCapture,
        Self::VirtualRecording,
        Self::Composite,
        Self::CompositeCapture,
        Self::CompositeSynthetic,
    ];
}

impl TryFrom<i32> for DigitalSourceType {
    type Error = Error;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        usize::try_from(value)
            .ok()
            .and_then(|index| Self::ALL.get(index).copied())
            .ok_or_else(|| Error::InvalidArgument(format!("Invalid digital source type: {value}")))
    }
}
