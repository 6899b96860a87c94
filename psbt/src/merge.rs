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

use std::hash::Hash;

use indexmap::IndexMap;
use tracing::debug;

use crate::{
    GlobalKey, Input, InputKey, KeyData, KeyType, LockTimeConflict, MapName, Output, OutputKey,
    PropKey, Psbt, PsbtVer, ValueData,
};

#[derive(Clone, Eq, PartialEq, Debug, Display, Error, From)]
#[display(doc_comments)]
pub enum MergeError {
    /// no PSBTs were provided for combining.
    NoPsbts,

    /// PSBT {0} can't be combined with PSBT {1}.
    VersionMismatch(PsbtVer, PsbtVer),

    /// PSBTs are built for different transactions.
    Mismatch,

    /// PSBT transaction can't be constructed.
    #[from]
    #[display(inner)]
    LockTime(LockTimeConflict),

    /// {scope} map {index} has conflicting values for key {key:#04x}.
    Conflict {
        scope: MapName,
        index: usize,
        key: u8,
    },
}

/// Location of the map being merged, used in conflict reporting.
#[derive(Copy, Clone)]
struct Scope {
    name: MapName,
    index: usize,
}

impl Scope {
    fn conflict(self, key: u8) -> MergeError {
        MergeError::Conflict {
            scope: self.name,
            index: self.index,
            key,
        }
    }

    /// Fills absent value; a different present value is a conflict.
    fn option<T: Clone + Eq>(
        self,
        key: impl KeyType,
        dst: &mut Option<T>,
        src: &Option<T>,
    ) -> Result<(), MergeError> {
        match (dst.as_ref(), src) {
            (_, None) => {}
            (None, Some(val)) => *dst = Some(val.clone()),
            (Some(a), Some(b)) if a == b => {}
            (Some(_), Some(_)) => return Err(self.conflict(key.to_u8())),
        }
        Ok(())
    }

    fn value<T: Eq>(self, key: impl KeyType, dst: &T, src: &T) -> Result<(), MergeError> {
        if dst != src {
            return Err(self.conflict(key.to_u8()));
        }
        Ok(())
    }

    fn map<K: Clone + Hash + Eq, V: Clone + Eq>(
        self,
        key: u8,
        dst: &mut IndexMap<K, V>,
        src: &IndexMap<K, V>,
    ) -> Result<(), MergeError> {
        for (k, v) in src {
            match dst.get(k) {
                None => {
                    dst.insert(k.clone(), v.clone());
                }
                Some(existing) if existing == v => {}
                Some(_) => return Err(self.conflict(key)),
            }
        }
        Ok(())
    }

    fn keyed<K: Clone + Hash + Eq, V: Clone + Eq>(
        self,
        key: impl KeyType,
        dst: &mut IndexMap<K, V>,
        src: &IndexMap<K, V>,
    ) -> Result<(), MergeError> {
        self.map(key.to_u8(), dst, src)
    }

    fn unknown(
        self,
        dst: &mut IndexMap<u8, IndexMap<KeyData, ValueData>>,
        src: &IndexMap<u8, IndexMap<KeyData, ValueData>>,
    ) -> Result<(), MergeError> {
        for (key_type, submap) in src {
            self.map(*key_type, dst.entry(*key_type).or_default(), submap)?;
        }
        Ok(())
    }

    fn proprietary(
        self,
        dst: &mut IndexMap<PropKey, ValueData>,
        src: &IndexMap<PropKey, ValueData>,
    ) -> Result<(), MergeError> {
        self.map(GlobalKey::Proprietary.to_u8(), dst, src)
    }
}

impl Psbt {
    /// Combines PSBTs describing the same transaction into a single one.
    ///
    /// Fields missing in one PSBT are filled from the others; sets of keyed values are joined.
    /// Different values for the same field fail the whole operation.
    pub fn combine(psbts: impl IntoIterator<Item = Psbt>) -> Result<Psbt, MergeError> {
        let mut psbts = psbts.into_iter();
        let mut combined = psbts.next().ok_or(MergeError::NoPsbts)?;
        let mut count = 1usize;
        for psbt in psbts {
            combined.merge_in(&psbt)?;
            count += 1;
        }
        debug!(target: "psbt", count, inputs = combined.inputs.len(), "combined PSBTs");
        Ok(combined)
    }

    /// Merges other PSBT into a copy of this one.
    pub fn merge(&self, other: &Psbt) -> Result<Psbt, MergeError> {
        let mut merged = self.clone();
        merged.merge_in(other)?;
        Ok(merged)
    }

    fn merge_in(&mut self, other: &Psbt) -> Result<(), MergeError> {
        if self.version != other.version {
            return Err(MergeError::VersionMismatch(self.version, other.version));
        }
        if self.inputs.len() != other.inputs.len() || self.outputs.len() != other.outputs.len() {
            return Err(MergeError::Mismatch);
        }
        if self.version == PsbtVer::V0 {
            // PSBTv0 transaction is fixed by the unsigned transaction
            if self.unique_id()? != other.unique_id()? {
                return Err(MergeError::Mismatch);
            }
        } else if self.tx_version != other.tx_version
            || self.outputs.iter().zip(&other.outputs).any(|(a, b)| {
                a.amount != b.amount || a.script != b.script
            })
        {
            // In PSBTv2 lock times and sequence numbers may be filled in by the updaters, so
            // they are merged field by field below
            return Err(MergeError::Mismatch);
        }

        let global = Scope {
            name: MapName::Global,
            index: 0,
        };
        global.value(GlobalKey::TxVersion, &self.tx_version, &other.tx_version)?;
        global.option(
            GlobalKey::FallbackLocktime,
            &mut self.fallback_locktime,
            &other.fallback_locktime,
        )?;
        global.keyed(GlobalKey::Xpub, &mut self.xpubs, &other.xpubs)?;
        self.tx_modifiable = match (self.tx_modifiable, other.tx_modifiable) {
            (Some(a), Some(b)) => Some(a | b),
            (a, b) => a.or(b),
        };
        global.proprietary(&mut self.proprietary, &other.proprietary)?;
        global.unknown(&mut self.unknown, &other.unknown)?;

        for (input, other) in self.inputs.iter_mut().zip(&other.inputs) {
            input.merge_in(other)?;
        }
        for (output, other) in self.outputs.iter_mut().zip(&other.outputs) {
            output.merge_in(other)?;
        }

        // Lock requirements filled from different PSBTs must still be satisfiable together
        self.lock_time()?;
        Ok(())
    }
}

impl Input {
    fn merge_in(&mut self, other: &Input) -> Result<(), MergeError> {
        let scope = Scope {
            name: MapName::Input,
            index: self.index,
        };
        if self.previous_outpoint != other.previous_outpoint {
            return Err(MergeError::Mismatch);
        }

        scope.option(InputKey::Sequence, &mut self.sequence_number, &other.sequence_number)?;
        scope.option(
            InputKey::RequiredTimeLock,
            &mut self.required_time_lock,
            &other.required_time_lock,
        )?;
        scope.option(
            InputKey::RequiredHeightLock,
            &mut self.required_height_lock,
            &other.required_height_lock,
        )?;
        scope.option(InputKey::NonWitnessUtxo, &mut self.non_witness_tx, &other.non_witness_tx)?;
        scope.option(InputKey::WitnessUtxo, &mut self.witness_utxo, &other.witness_utxo)?;
        scope.keyed(InputKey::PartialSig, &mut self.partial_sigs, &other.partial_sigs)?;
        scope.option(InputKey::SighashType, &mut self.sighash_type, &other.sighash_type)?;
        scope.option(InputKey::RedeemScript, &mut self.redeem_script, &other.redeem_script)?;
        scope.option(InputKey::WitnessScript, &mut self.witness_script, &other.witness_script)?;
        scope.keyed(
            InputKey::Bip32Derivation,
            &mut self.bip32_derivation,
            &other.bip32_derivation,
        )?;
        scope.option(
            InputKey::FinalScriptSig,
            &mut self.final_script_sig,
            &other.final_script_sig,
        )?;
        scope.option(InputKey::FinalWitness, &mut self.final_witness, &other.final_witness)?;
        scope.keyed(InputKey::Ripemd160, &mut self.ripemd160, &other.ripemd160)?;
        scope.keyed(InputKey::Sha256, &mut self.sha256, &other.sha256)?;
        scope.keyed(InputKey::Hash160, &mut self.hash160, &other.hash160)?;
        scope.keyed(InputKey::Hash256, &mut self.hash256, &other.hash256)?;
        scope.option(InputKey::TapKeySig, &mut self.tap_key_sig, &other.tap_key_sig)?;
        scope.keyed(InputKey::TapScriptSig, &mut self.tap_script_sig, &other.tap_script_sig)?;
        scope.keyed(InputKey::TapLeafScript, &mut self.tap_leaf_script, &other.tap_leaf_script)?;
        scope.keyed(
            InputKey::TapBip32Derivation,
            &mut self.tap_bip32_derivation,
            &other.tap_bip32_derivation,
        )?;
        scope.option(
            InputKey::TapInternalKey,
            &mut self.tap_internal_key,
            &other.tap_internal_key,
        )?;
        scope.option(InputKey::TapMerkleRoot, &mut self.tap_merkle_root, &other.tap_merkle_root)?;
        scope.proprietary(&mut self.proprietary, &other.proprietary)?;
        scope.unknown(&mut self.unknown, &other.unknown)
    }
}

impl Output {
    fn merge_in(&mut self, other: &Output) -> Result<(), MergeError> {
        let scope = Scope {
            name: MapName::Output,
            index: self.index,
        };
        scope.value(OutputKey::Amount, &self.amount, &other.amount)?;
        scope.value(OutputKey::Script, &self.script, &other.script)?;
        scope.option(OutputKey::RedeemScript, &mut self.redeem_script, &other.redeem_script)?;
        scope.option(OutputKey::WitnessScript, &mut self.witness_script, &other.witness_script)?;
        scope.keyed(
            OutputKey::Bip32Derivation,
            &mut self.bip32_derivation,
            &other.bip32_derivation,
        )?;
        scope.option(
            OutputKey::TapInternalKey,
            &mut self.tap_internal_key,
            &other.tap_internal_key,
        )?;
        scope.option(OutputKey::TapTree, &mut self.tap_tree, &other.tap_tree)?;
        scope.keyed(
            OutputKey::TapBip32Derivation,
            &mut self.tap_bip32_derivation,
            &other.tap_bip32_derivation,
        )?;
        scope.proprietary(&mut self.proprietary, &other.proprietary)?;
        scope.unknown(&mut self.unknown, &other.unknown)
    }
}
