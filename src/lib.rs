// Standard library for partially signed bitcoin transactions.
//
// SPDX-License-Identifier: Apache-2.0
//
// Written in 2020-2024 by
//     Dr Maxim Orlovsky <orlovsky@lnp-bp.org>
//
// Copyright (C) 2020-2024 LNP/BP Standards Association. All rights reserved.
// Copyright (C) 2020-2024 Dr Maxim Orlovsky. All rights reserved.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Facade over the PSBT workspace: transaction primitives from [`bc`], key derivation and taproot
//! types from [`derive`], the PSBT codec and role operations from [`psbt`], and the text entry
//! points used at application boundaries.

#[macro_use]
extern crate amplify;
#[cfg(feature = "serde")]
#[macro_use]
extern crate serde_crate as serde;

mod role;
mod signers;

pub use bc::secp256k1;
pub use derive::*;
pub use psbt::*;
pub use role::{PsbtRole, RoleParseError};
pub use signers::{DigestFn, MemorySigner};

/// Decodes base64-encoded PSBT, reporting any failure as a human-readable message.
pub fn decode_base64_psbt(s: &str) -> Result<Psbt, String> {
    Psbt::from_base64(s.trim()).map_err(|err| format!("invalid PSBT: {err}"))
}

/// Decodes PSBT in binary form, reporting any failure as a human-readable message.
pub fn decode_raw_psbt(data: impl AsRef<[u8]>) -> Result<Psbt, String> {
    Psbt::deserialize(data).map_err(|err| format!("invalid PSBT: {err}"))
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn text_boundary() {
        let psbt = Psbt::create(PsbtVer::V2);
        let s = psbt.to_string();
        assert_eq!(decode_base64_psbt(&format!("{s}\n")), Ok(psbt.clone()));
        let data = psbt.serialize(PsbtVer::V2).unwrap();
        assert_eq!(decode_raw_psbt(&data), Ok(psbt));

        let err = decode_raw_psbt(b"psbu\xff\x00").unwrap_err();
        assert!(err.starts_with("invalid PSBT: "));
        assert!(decode_base64_psbt("not a psbt").is_err());
        assert!(decode_raw_psbt(Vec::<u8>::new()).is_err());
    }
}
