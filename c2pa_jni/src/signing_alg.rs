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

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::{engine::C2paSigningAlg, Error};

/// Signing algorithms a callback signer may declare.
///
/// The native engine builds the COSE signature around whatever bytes the
/// callback returns, so the callback must produce the encoding expected for
/// the algorithm. For ECDSA that is raw `R || S`, not DER.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SigningAlg {
    /// ECDSA with SHA-256
    Es256,

    /// ECDSA with SHA-384
    Es384,

    /// ECDSA with SHA-512
    Es512,

    /// RSASSA-PSS using SHA-256 and MGF1 with SHA-256
    Ps256,

    /// RSASSA-PSS using SHA-384 and MGF1 with SHA-384
    Ps384,

    /// RSASSA-PSS using SHA-512 and MGF1 with SHA-512
    Ps512,

    /// Edwards-Curve DSA (Ed25519 instance only)
    Ed25519,
}

impl SigningAlg {
    /// Returns the fixed raw `R || S` signature length for ECDSA algorithms.
    pub fn ecdsa_raw_len(&self) -> Option<usize> {
        match self {
            Self::Es256 => Some(64),
            Self::Es384 => Some(96),
            Self::Es512 => Some(132),
            _ => None,
        }
    }
}

impl FromStr for SigningAlg {
    type Err = Error;

    fn from_str(alg: &str) -> Result<Self, Self::Err> {
        match alg.to_ascii_lowercase().as_str() {
            "es256" => Ok(Self::Es256),
            "es384" => Ok(Self::Es384),
            "es512" => Ok(Self::Es512),
            "ps256" => Ok(Self::Ps256),
            "ps384" => Ok(Self::Ps384),
            "ps512" => Ok(Self::Ps512),
            "ed25519" => Ok(Self::Ed25519),
            _ => Err(Error::InvalidArgument(format!(
                "Unknown signing algorithm: {alg}"
            ))),
        }
    }
}

impl fmt::Display for SigningAlg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> Result<(), fmt::Error> {
        write!(
            f,
            "{}",
            match self {
                Self::Es256 => "es256",
                Self::Es384 => "es384",
                Self::Es512 => "es512",
                Self::Ps256 => "ps256",
                Self::Ps384 => "ps384",
                Self::Ps512 => "ps512",
                Self::Ed25519 => "ed25519",
            }
        )
    }
}

impl From<SigningAlg> for C2paSigningAlg {
    fn from(alg: SigningAlg) -> Self {
        match alg {
            SigningAlg::Es256 => C2paSigningAlg::Es256,
            SigningAlg::Es384 => C2paSigningAlg::Es384,
            SigningAlg::Es512 => C2paSigningAlg::Es512,
            SigningAlg::Ps256 => C2paSigningAlg::Ps256,
            SigningAlg::Ps384 => C2paSigningAlg::Ps384,
            SigningAlg::Ps512 => C2paSigningAlg::Ps512,
            SigningAlg::Ed25519 => C2paSigningAlg::Ed25519,
        }
    }
}
