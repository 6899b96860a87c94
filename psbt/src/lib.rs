// Modern, minimalistic & standard-compliant PSBT library.
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

#[macro_use]
extern crate amplify;
#[cfg(feature = "serde")]
#[macro_use]
extern crate serde_crate as serde;

mod maps;
mod timelocks;
mod keys;
mod data;
mod coders;
mod constructor;
mod merge;
mod update;
mod sign;
mod finalize;
#[cfg(feature = "serde")]
mod serde_utils;

pub use coders::{Decode, DecodeError, Encode, EncodeError, PsbtError, MAX_PSBT_SIZE};
pub use constructor::AddInputError;
pub use data::{
    Input, ModifiableFlags, Output, Psbt, PsbtParseError, Unmodifiable, UnsignedTx, UnsignedTxIn,
};
pub use finalize::{ExtractError, FinalizeError, Satisfier};
pub use keys::{GlobalKey, InputKey, KeyPair, KeyType, OutputKey, PropKey};
pub use maps::{KeyAlreadyPresent, KeyData, KeyMap, Map, MapName, ValueData};
pub use merge::MergeError;
pub use sign::{Rejected, SigMaterial, SignError, Signer};
pub use timelocks::{resolve_lock_time, LockTimeConflict};
pub use update::{KeyProvider, ScriptInfo, UpdateError};

#[derive(Copy, Clone, Eq, PartialEq, Debug, Display, Error)]
#[display("unsupported version of PSBT v{0}")]
pub struct PsbtUnsupportedVer(pub u32);

#[derive(Copy, Clone, Ord, PartialOrd, Eq, PartialEq, Hash, Debug, Display)]
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(crate = "serde_crate", rename_all = "camelCase")
)]
pub enum PsbtVer {
    #[display("v0")]
    V0 = 0,
    #[display("v2")]
    V2 = 2,
}

impl PsbtVer {
    pub const LATEST: PsbtVer = PsbtVer::V2;

    pub const fn try_from_standard_u32(v: u32) -> Result<Self, PsbtUnsupportedVer> {
        Ok(match v {
            0 => Self::V0,
            2 => Self::V2,
            wrong => return Err(PsbtUnsupportedVer(wrong)),
        })
    }

    pub const fn to_standard_u32(&self) -> u32 { *self as u32 }
}
