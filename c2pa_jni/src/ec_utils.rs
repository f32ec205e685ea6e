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

//! Conversion of ECDSA signatures to the raw form expected by the engine.
//!
//! Android Keystore and `java.security.Signature` produce ASN.1 DER
//! `SEQUENCE { r INTEGER, s INTEGER }`. The engine's callback signer expects
//! the P1363 form: `r` and `s` as fixed-width big-endian integers, concatenated.

use x509_parser::der_parser::{
    der::{parse_der_integer, parse_der_sequence_defined_g},
    error::BerResult,
};

use crate::{Error, Result, SigningAlg};

struct EcSigComps<'a> {
    r: &'a [u8],
    s: &'a [u8],
}

fn parse_ec_der_sig(data: &[u8]) -> BerResult<'_, EcSigComps<'_>> {
    parse_der_sequence_defined_g(|content: &[u8], _| {
        let (rem1, r) = parse_der_integer(content)?;
        let (rem2, s) = parse_der_integer(rem1)?;

        Ok((
            rem2,
            EcSigComps {
                r: r.as_slice()?,
                s: s.as_slice()?,
            },
        ))
    })(data)
}

/// Left-pads `component` with zeros to `width` bytes.
///
/// DER integers carry a leading zero when the high bit is set; only those
/// redundant zeros may be dropped.
fn fixed_width(component: &[u8], width: usize) -> Result<Vec<u8>> {
    let first_significant = component
        .iter()
        .position(|b| *b != 0)
        .unwrap_or(component.len());
    let significant = &component[first_significant..];

    if significant.len() > width {
        return Err(Error::InvalidArgument(format!(
            "ECDSA signature component is {} bytes, expected at most {width}",
            significant.len()
        )));
    }

    let mut out = vec![0u8; width - significant.len()];
    out.extend_from_slice(significant);
    Ok(out)
}

/// Converts a DER encoded ECDSA signature into raw `R || S` for `alg`.
///
/// Input that is not a complete DER signature but is exactly the raw width is
/// taken to be raw already and returned unchanged.
pub fn der_to_raw(alg: SigningAlg, der: &[u8]) -> Result<Vec<u8>> {
    let raw_len = alg.ecdsa_raw_len().ok_or_else(|| {
        Error::InvalidArgument(format!("{alg} is not an ECDSA algorithm"))
    })?;

    let comps = match parse_ec_der_sig(der) {
        Ok((rem, comps)) if rem.is_empty() => comps,
        _ if der.len() == raw_len => return Ok(der.to_vec()),
        Ok(_) => {
            return Err(Error::InvalidArgument(
                "invalid DER signature: trailing bytes".to_string(),
            ))
        }
        Err(err) => {
            return Err(Error::InvalidArgument(format!(
                "invalid DER signature: {err}"
            )))
        }
    };

    let half = raw_len / 2;
    let mut raw = fixed_width(comps.r, half)?;
    raw.extend(fixed_width(comps.s, half)?);
    Ok(raw)
}
