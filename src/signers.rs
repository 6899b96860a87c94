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

use std::collections::HashMap;

use bc::secp256k1::{All, Message, Secp256k1, SecretKey};
use derive::{LegacyPk, LegacySig, SighashType};
use psbt::{Psbt, Rejected, SigMaterial, Signer};
use tracing::{debug, trace};

/// Computes the signature hash for an input, returning `None` if the input can't be signed with
/// the provided sighash type.
pub type DigestFn = fn(&Psbt, usize, SighashType) -> Option<[u8; 32]>;

/// Hot signer keeping ECDSA secret keys in memory.
///
/// Signs every input key listed in the BIP32 derivation map for which it has a secret key. The
/// signature hash is computed by a [`DigestFn`] provided by the caller.
pub struct MemorySigner {
    secp: Secp256k1<All>,
    keys: HashMap<LegacyPk, SecretKey>,
    digest: DigestFn,
}

impl MemorySigner {
    pub fn new(digest: DigestFn) -> Self {
        MemorySigner {
            secp: Secp256k1::new(),
            keys: empty!(),
            digest,
        }
    }

    pub fn with(digest: DigestFn, keys: impl IntoIterator<Item = SecretKey>) -> Self {
        let mut signer = MemorySigner::new(digest);
        for sk in keys {
            signer.add_key(sk);
        }
        signer
    }

    /// Adds secret key, returning its compressed public key.
    pub fn add_key(&mut self, sk: SecretKey) -> LegacyPk {
        let pk = LegacyPk {
            compressed: true,
            pubkey: sk.public_key(&self.secp),
        };
        self.keys.insert(pk, sk);
        pk
    }

    pub fn knows(&self, pk: &LegacyPk) -> bool { self.keys.contains_key(pk) }
}

impl Signer for MemorySigner {
    fn sign_input(
        &self,
        psbt: &Psbt,
        index: usize,
        sighash: SighashType,
    ) -> Result<Vec<SigMaterial>, Rejected> {
        let input = psbt.input(index).ok_or(Rejected)?;
        let keys = input
            .bip32_derivation
            .keys()
            .filter(|pk| !input.partial_sigs.contains_key(*pk))
            .filter_map(|pk| self.keys.get(pk).map(|sk| (*pk, sk)))
            .collect::<Vec<_>>();
        if keys.is_empty() {
            trace!(target: "psbt", index, "no known keys for input");
            return Ok(vec![]);
        }
        let Some(digest) = (self.digest)(psbt, index, sighash) else {
            debug!(target: "psbt", index, sighash = ?sighash, "unable to compute signature hash");
            return Err(Rejected);
        };
        debug!(target: "psbt", index, count = keys.len(), "signing input with memory keys");
        let msg = Message::from_digest(digest);
        Ok(keys
            .into_iter()
            .map(|(pubkey, sk)| SigMaterial::Partial {
                pubkey,
                sig: LegacySig {
                    sig: self.secp.sign_ecdsa(&msg, sk),
                    sighash_type: sighash,
                },
            })
            .collect())
    }
}
