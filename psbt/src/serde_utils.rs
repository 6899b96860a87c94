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

//! Serde support for [`Psbt`].
//!
//! Human-readable formats get a Base64 string; binary formats get the PSBT binary serialization
//! in the PSBT own version.

use std::fmt::{self, Formatter};

use serde::de::Visitor;
use serde::ser::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::Psbt;

impl Serialize for Psbt {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where S: Serializer {
        if serializer.is_human_readable() {
            let s = self.to_base64().map_err(S::Error::custom)?;
            serializer.serialize_str(&s)
        } else {
            let data = Psbt::serialize(self, self.version).map_err(S::Error::custom)?;
            serializer.serialize_bytes(&data)
        }
    }
}

struct PsbtVisitor;

impl Visitor<'_> for PsbtVisitor {
    type Value = Psbt;

    fn expecting(&self, f: &mut Formatter) -> fmt::Result {
        f.write_str("a Base64-encoded or binary PSBT")
    }

    fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
    where E: serde::de::Error {
        Psbt::from_base64(v).map_err(E::custom)
    }

    fn visit_bytes<E>(self, v: &[u8]) -> Result<Self::Value, E>
    where E: serde::de::Error {
        Psbt::deserialize(v).map_err(E::custom)
    }

    fn visit_byte_buf<E>(self, v: Vec<u8>) -> Result<Self::Value, E>
    where E: serde::de::Error {
        Psbt::deserialize(v).map_err(E::custom)
    }
}

impl<'de> Deserialize<'de> for Psbt {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where D: Deserializer<'de> {
        if deserializer.is_human_readable() {
            deserializer.deserialize_str(PsbtVisitor)
        } else {
            deserializer.deserialize_bytes(PsbtVisitor)
        }
    }
}
