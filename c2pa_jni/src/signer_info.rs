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

use std::ffi::CString;

use crate::{
    engine::{optional_c_string, ptr_or_null, C2paSignerInfo},
    Result, SigningAlg,
};

/// SignerInfo provides the information needed for the engine to create a
/// signer from keys and sign a manifest.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SignerInfo {
    pub alg: SigningAlg,
    /// The public certificate chain in PEM format.
    pub sign_cert: String,
    /// The private key in PEM format.
    pub private_key: String,
    /// An optional URL of an RFC 3161 timestamp server.
    pub ta_url: Option<String>,
}

impl SignerInfo {
    /// Creates a SignerInfo, parsing `alg` case-insensitively.
    ///
    /// An empty `ta_url` is treated as no timestamp server.
    pub fn new(alg: &str, sign_cert: &str, private_key: &str, ta_url: Option<String>) -> Result<Self> {
        Ok(Self {
            alg: alg.parse()?,
            sign_cert: sign_cert.to_string(),
            private_key: private_key.to_string(),
            ta_url: ta_url.filter(|url| !url.is_empty()),
        })
    }

    pub(crate) fn to_c_strings(&self) -> Result<SignerInfoStrings> {
        Ok(SignerInfoStrings {
            alg: CString::new(self.alg.to_string())?,
            sign_cert: CString::new(self.sign_cert.as_str())?,
            private_key: CString::new(self.private_key.as_str())?,
            ta_url: optional_c_string(self.ta_url.as_deref())?,
        })
    }
}

/// Owned C strings backing a [`C2paSignerInfo`].
pub(crate) struct SignerInfoStrings {
    alg: CString,
    sign_cert: CString,
    private_key: CString,
    ta_url: Option<CString>,
}

impl SignerInfoStrings {
    /// The returned struct borrows from `self` and must not outlive it.
    pub(crate) fn as_c(&self) -> C2paSignerInfo {
        C2paSignerInfo {
            alg: self.alg.as_ptr(),
            sign_cert: self.sign_cert.as_ptr(),
            private_key: self.private_key.as_ptr(),
            ta_url: ptr_or_null(&self.ta_url),
        }
    }
}
