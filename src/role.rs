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

use std::str::FromStr;

/// Roles of the parties participating in PSBT workflow, in the order they are normally applied.
#[derive(Copy, Clone, Ord, PartialOrd, Eq, PartialEq, Hash, Debug, Display)]
#[display(lowercase)]
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(crate = "serde_crate", rename_all = "lowercase")
)]
pub enum PsbtRole {
    Creator,
    Updater,
    Signer,
    Finalizer,
    Extractor,
}

impl PsbtRole {
    pub const ALL: [PsbtRole; 5] = [
        PsbtRole::Creator,
        PsbtRole::Updater,
        PsbtRole::Signer,
        PsbtRole::Finalizer,
        PsbtRole::Extractor,
    ];

    /// Role which is expected to process the PSBT after this one.
    pub fn next(self) -> Option<PsbtRole> {
        match self {
            PsbtRole::Creator => Some(PsbtRole::Updater),
            PsbtRole::Updater => Some(PsbtRole::Signer),
            PsbtRole::Signer => Some(PsbtRole::Finalizer),
            PsbtRole::Finalizer => Some(PsbtRole::Extractor),
            PsbtRole::Extractor => None,
        }
    }
}

#[derive(Clone, Eq, PartialEq, Debug, Display, Error)]
#[display("unknown PSBT role '{0}'")]
pub struct RoleParseError(pub String);

impl FromStr for PsbtRole {
    type Err = RoleParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PsbtRole::ALL
            .into_iter()
            .find(|role| role.to_string() == s.to_lowercase())
            .ok_or_else(|| RoleParseError(s.to_owned()))
    }
}
