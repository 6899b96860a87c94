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

use derive::{
    ControlBlock, InternalPk, KeyOrigin, LeafScript, LegacyPk, RedeemScript, ScriptPubkey,
    SighashType, TapDerivation, TapNodeHash, TapTree, WitnessScript, XOnlyPk,
};
use indexmap::IndexMap;
use tracing::{debug, trace};

use crate::{Input, Output, Psbt};

#[derive(Copy, Clone, Eq, PartialEq, Debug, Display, Error)]
#[display(doc_comments)]
pub enum UpdateError {
    /// PSBT has no input #{0}.
    NoInput(usize),

    /// PSBT has no output #{0}.
    NoOutput(usize),

    /// input #{0} doesn't provide information about the spent output.
    NoUtxo(usize),
}

/// Spending information known for a script pubkey.
///
/// Fields not relevant for a script type are left empty; the updater never overwrites data
/// already present in the PSBT.
#[derive(Clone, Eq, PartialEq, Debug, Default)]
pub struct ScriptInfo {
    pub redeem_script: Option<RedeemScript>,
    pub witness_script: Option<WitnessScript>,
    pub bip32_derivation: IndexMap<LegacyPk, KeyOrigin>,
    pub tap_internal_key: Option<InternalPk>,
    pub tap_bip32_derivation: IndexMap<XOnlyPk, TapDerivation>,
    pub tap_merkle_root: Option<TapNodeHash>,
    /// Used for inputs only.
    pub tap_leaf_script: IndexMap<ControlBlock, LeafScript>,
    /// Used for outputs only.
    pub tap_tree: Option<TapTree>,
}

/// Descriptor or wallet capable of recognizing its own scripts.
pub trait KeyProvider {
    fn script_info(&self, script_pubkey: &ScriptPubkey) -> Option<ScriptInfo>;
}

impl Psbt {
    /// Adds scripts and key origins known to the provider to the input.
    ///
    /// Returns whether the provider recognized the spent script.
    pub fn update_input(
        &mut self,
        index: usize,
        provider: &impl KeyProvider,
    ) -> Result<bool, UpdateError> {
        let input = self.input_mut(index).ok_or(UpdateError::NoInput(index))?;
        let script_pubkey = input.utxo().ok_or(UpdateError::NoUtxo(index))?.script_pubkey.clone();
        let Some(info) = provider.script_info(&script_pubkey) else {
            trace!(target: "psbt", index, "input script is not known to the key provider");
            return Ok(false);
        };
        input.update_with(info);
        debug!(target: "psbt", index, "updated input");
        Ok(true)
    }

    /// Adds scripts and key origins known to the provider to the output.
    ///
    /// Returns whether the provider recognized the output script.
    pub fn update_output(
        &mut self,
        index: usize,
        provider: &impl KeyProvider,
    ) -> Result<bool, UpdateError> {
        let output = self.output_mut(index).ok_or(UpdateError::NoOutput(index))?;
        let Some(info) = provider.script_info(&output.script) else {
            trace!(target: "psbt", index, "output script is not known to the key provider");
            return Ok(false);
        };
        output.update_with(info);
        debug!(target: "psbt", index, "updated output");
        Ok(true)
    }

    /// Updates all inputs and outputs, skipping inputs which don't have UTXO information.
    ///
    /// Returns number of inputs and outputs recognized by the provider.
    pub fn update(&mut self, provider: &impl KeyProvider) -> usize {
        let mut count = 0usize;
        for index in 0..self.inputs.len() {
            if let Ok(true) = self.update_input(index, provider) {
                count += 1;
            }
        }
        for index in 0..self.outputs.len() {
            if let Ok(true) = self.update_output(index, provider) {
                count += 1;
            }
        }
        count
    }

    /// Drops non-witness previous transactions if every input spends a segwit v1+ output, since
    /// the signatures commit to all spent amounts in that case.
    ///
    /// Does nothing when the PSBT is signed with `SIGHASH_ANYONECANPAY`, since other inputs can
    /// be added later. Returns number of the dropped transactions.
    pub fn remove_unnecessary_transactions(&mut self, sighash: SighashType) -> usize {
        if sighash.anyone_can_pay {
            return 0;
        }
        let taproot_only = self.inputs().all(|input| {
            input
                .witness_utxo
                .as_ref()
                .and_then(|txout| witness_version(txout.script_pubkey.as_slice()))
                .is_some_and(|ver| ver >= 1)
        });
        if !taproot_only {
            return 0;
        }
        let mut count = 0usize;
        for input in self.inputs_mut() {
            if input.non_witness_tx.take().is_some() {
                count += 1;
            }
        }
        if count > 0 {
            debug!(target: "psbt", count, "removed unnecessary non-witness transactions");
        }
        count
    }
}

/// Version of the segwit program, if the script is a witness program.
pub(crate) fn witness_version(script: &[u8]) -> Option<u8> {
    let (&ver, rest) = script.split_first()?;
    let (&len, program) = rest.split_first()?;
    if !(4..=42).contains(&script.len()) || len as usize != program.len() {
        return None;
    }
    match ver {
        0x00 => Some(0),
        0x51..=0x60 => Some(ver - 0x50),
        _ => None,
    }
}

pub(crate) fn is_p2sh(script: &[u8]) -> bool {
    script.len() == 23 && matches!(script, [0xA9, 0x14, .., 0x87])
}

fn fill<T>(field: &mut Option<T>, value: Option<T>) {
    if field.is_none() {
        *field = value;
    }
}

fn extend<K: Eq + std::hash::Hash, V>(map: &mut IndexMap<K, V>, other: IndexMap<K, V>) {
    for (key, value) in other {
        map.entry(key).or_insert(value);
    }
}

impl Input {
    fn update_with(&mut self, info: ScriptInfo) {
        fill(&mut self.redeem_script, info.redeem_script);
        fill(&mut self.witness_script, info.witness_script);
        extend(&mut self.bip32_derivation, info.bip32_derivation);
        fill(&mut self.tap_internal_key, info.tap_internal_key);
        extend(&mut self.tap_bip32_derivation, info.tap_bip32_derivation);
        fill(&mut self.tap_merkle_root, info.tap_merkle_root);
        extend(&mut self.tap_leaf_script, info.tap_leaf_script);
    }
}

impl Output {
    fn update_with(&mut self, info: ScriptInfo) {
        fill(&mut self.redeem_script, info.redeem_script);
        fill(&mut self.witness_script, info.witness_script);
        extend(&mut self.bip32_derivation, info.bip32_derivation);
        fill(&mut self.tap_internal_key, info.tap_internal_key);
        extend(&mut self.tap_bip32_derivation, info.tap_bip32_derivation);
        fill(&mut self.tap_tree, info.tap_tree);
    }
}

#[cfg(test)]
mod test {
    use amplify::{ByteArray, Wrapper};
    use derive::{
        DerivationPath, LockTime, Outpoint, Sats, ScriptBytes, Tx, TxOut, TxVer, Txid,
        VarIntArray, Vout, XpubFp,
    };

    use super::*;
    use crate::{Decode, PsbtVer};

    const PK: [u8; 33] = [
        0x02, 0x79, 0xbe, 0x66, 0x7e, 0xf9, 0xdc, 0xbb, 0xac, 0x55, 0xa0, 0x62, 0x95, 0xce, 0x87,
        0x0b, 0x07, 0x02, 0x9b, 0xfc, 0xdb, 0x2d, 0xce, 0x28, 0xd9, 0x59, 0xf2, 0x81, 0x5b, 0x16,
        0xf8, 0x17, 0x98,
    ];

    fn script(data: Vec<u8>) -> ScriptPubkey {
        ScriptPubkey::from_inner(ScriptBytes::try_from(data).unwrap())
    }

    fn wpkh() -> ScriptPubkey {
        let mut data = vec![0x00, 0x14];
        data.extend([0x11; 20]);
        script(data)
    }

    fn tr() -> ScriptPubkey {
        let mut data = vec![0x51, 0x20];
        data.extend(&PK[1..]);
        script(data)
    }

    fn txout(script_pubkey: ScriptPubkey, value: u64) -> TxOut {
        TxOut {
            value: Sats::from(value),
            script_pubkey,
        }
    }

    struct Wallet;

    impl KeyProvider for Wallet {
        fn script_info(&self, script_pubkey: &ScriptPubkey) -> Option<ScriptInfo> {
            let origin = KeyOrigin::new(XpubFp::from([0xAA; 4]), DerivationPath::new());
            let mut info = ScriptInfo::default();
            if *script_pubkey == wpkh() {
                info.bip32_derivation.insert(LegacyPk::deserialize(PK).unwrap(), origin);
            } else if *script_pubkey == tr() {
                let key = XOnlyPk::deserialize(&PK[1..]).unwrap();
                info.tap_internal_key = Some(InternalPk::from_unchecked(key));
                info.tap_bip32_derivation.insert(key, TapDerivation {
                    leaf_hashes: vec![],
                    origin,
                });
            } else {
                return None;
            }
            Some(info)
        }
    }

    fn spending(scripts: &[ScriptPubkey], with_tx: bool) -> Psbt {
        let mut psbt = Psbt::create(PsbtVer::V2);
        for script in scripts {
            let utxo = txout(script.clone(), 1000);
            let prev = Tx {
                version: TxVer::V2,
                inputs: VarIntArray::from_collection_unsafe(vec![]),
                outputs: VarIntArray::from_collection_unsafe(vec![utxo.clone()]),
                lock_time: LockTime::ZERO,
            };
            let mut input = Input::new(0);
            // same scripts give same previous txids
            input.previous_outpoint =
                Outpoint::new(prev.txid(), Vout::from_u32(psbt.inputs.len() as u32));
            input.witness_utxo = Some(utxo);
            if with_tx {
                input.non_witness_tx = Some(prev);
            }
            psbt.add_input(input).unwrap();
        }
        psbt
    }

    #[test]
    fn script_kinds() {
        assert_eq!(witness_version(wpkh().as_slice()), Some(0));
        assert_eq!(witness_version(tr().as_slice()), Some(1));
        assert_eq!(witness_version(&[0x51]), None);
        assert_eq!(witness_version(&[0x00, 0x14, 0x11]), None);
        let mut p2sh = vec![0xA9, 0x14];
        p2sh.extend([0x22; 20]);
        p2sh.push(0x87);
        assert!(is_p2sh(&p2sh));
        assert!(!is_p2sh(wpkh().as_slice()));
    }

    #[test]
    fn update_input_output() {
        let mut psbt = spending(&[wpkh(), tr()], false);
        psbt.add_txout(txout(tr(), 500)).unwrap();
        psbt.add_txout(txout(script(vec![0x51]), 400)).unwrap();

        assert_eq!(psbt.update(&Wallet), 3);
        assert_eq!(psbt.input(0).unwrap().bip32_derivation.len(), 1);
        assert!(psbt.input(1).unwrap().tap_internal_key.is_some());
        assert_eq!(psbt.output(0).unwrap().tap_bip32_derivation.len(), 1);
        assert!(psbt.output(1).unwrap().tap_internal_key.is_none());

        assert_eq!(psbt.update_input(2, &Wallet), Err(UpdateError::NoInput(2)));
        assert_eq!(psbt.update_output(2, &Wallet), Err(UpdateError::NoOutput(2)));
        assert_eq!(psbt.update_output(1, &Wallet), Ok(false));
    }

    #[test]
    fn update_keeps_present() {
        let mut psbt = spending(&[tr()], false);
        let other = InternalPk::deserialize([
            0xc6, 0x04, 0x7f, 0x94, 0x41, 0xed, 0x7d, 0x6d, 0x30, 0x45, 0x40, 0x6e, 0x95, 0xc0,
            0x7c, 0xd8, 0x5c, 0x77, 0x8e, 0x4b, 0x8c, 0xef, 0x3c, 0xa7, 0xab, 0xac, 0x09, 0xb9,
            0x5c, 0x70, 0x9e, 0xe5,
        ])
        .unwrap();
        psbt.input_mut(0).unwrap().tap_internal_key = Some(other);
        assert_eq!(psbt.update_input(0, &Wallet), Ok(true));
        assert_eq!(psbt.input(0).unwrap().tap_internal_key, Some(other));
        assert_eq!(psbt.input(0).unwrap().tap_bip32_derivation.len(), 1);
    }

    #[test]
    fn update_no_utxo() {
        let mut psbt = Psbt::create(PsbtVer::V2);
        let mut input = Input::new(0);
        input.previous_outpoint = Outpoint::new(Txid::from_byte_array([1; 32]), Vout::from_u32(0));
        psbt.add_input(input).unwrap();
        assert_eq!(psbt.update_input(0, &Wallet), Err(UpdateError::NoUtxo(0)));
        assert_eq!(psbt.update(&Wallet), 0);
    }

    #[test]
    fn remove_transactions() {
        let mut psbt = spending(&[tr(), tr()], true);
        let acp = SighashType::from_consensus_u32(0x81);
        assert_eq!(psbt.remove_unnecessary_transactions(acp), 0);
        assert_eq!(psbt.remove_unnecessary_transactions(SighashType::all()), 2);
        assert!(psbt.inputs().all(|input| input.non_witness_tx.is_none()));

        let mut psbt = spending(&[tr(), wpkh()], true);
        assert_eq!(psbt.remove_unnecessary_transactions(SighashType::all()), 0);
        assert!(psbt.inputs().all(|input| input.non_witness_tx.is_some()));
    }
}
