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
    Bip340Sig, LegacyPk, LegacySig, SigScript, SighashType, TapLeafHash, TxOut, Witness, XOnlyPk,
};
use tracing::{debug, warn};

use crate::update::{is_p2sh, witness_version};
use crate::{Input, Psbt};

#[derive(Copy, Clone, Eq, PartialEq, Debug, Display, Error)]
#[display("the transaction was rejected by the signer.")]
pub struct Rejected;

#[derive(Copy, Clone, Eq, PartialEq, Debug, Display, Error)]
#[display(doc_comments)]
pub enum SignError {
    /// the transaction was rejected by the signer.
    Rejected,

    /// PSBT has no input #{0}.
    NoInput(usize),

    /// input #{0} doesn't provide information about the spent output.
    NoUtxo(usize),

    /// non-witness UTXO of input #{0} doesn't match the spent outpoint.
    UtxoMismatch(usize),

    /// input #{0} provides only a witness UTXO, but doesn't spend a witness program.
    WitnessRequired(usize),

    /// input #{index} requires {required:?} sighash type, while signing with {requested:?}
    /// was requested.
    SighashMismatch {
        index: usize,
        required: SighashType,
        requested: SighashType,
    },
}

impl From<Rejected> for SignError {
    fn from(_: Rejected) -> Self { SignError::Rejected }
}

/// Signature data produced by a [`Signer`] for a single input.
#[derive(Clone, Eq, PartialEq, Debug)]
pub enum SigMaterial {
    /// ECDSA signature for a pre-taproot input.
    Partial { pubkey: LegacyPk, sig: LegacySig },

    /// Taproot key path signature.
    TapKey(Bip340Sig),

    /// Taproot script path signature.
    TapScript {
        pubkey: XOnlyPk,
        leaf_hash: TapLeafHash,
        sig: Bip340Sig,
    },

    /// Complete satisfaction, when the signer is able to produce it without combining with
    /// signatures of other parties.
    Final {
        sig_script: SigScript,
        witness: Witness,
    },
}

/// Signing capability.
///
/// The library doesn't compute signature hashes or produce signatures by itself: this is done by
/// the implementors, which receive the whole PSBT so they can check the transaction with the user
/// before signing.
pub trait Signer {
    /// Produces signatures for the input with the given index. Returning an empty set means that
    /// the signer has no keys for this input.
    fn sign_input(
        &self,
        psbt: &Psbt,
        index: usize,
        sighash: SighashType,
    ) -> Result<Vec<SigMaterial>, Rejected>;
}

impl Psbt {
    /// Signs a single input, storing the produced signatures.
    ///
    /// Returns whether the input has final signature data after the signing. Inputs which are
    /// already finalized are not passed to the signer.
    pub fn sign_input(
        &mut self,
        index: usize,
        signer: &impl Signer,
        sighash: SighashType,
    ) -> Result<bool, SignError> {
        let input = self.input(index).ok_or(SignError::NoInput(index))?;
        if input.is_signed() {
            return Ok(true);
        }
        input.check_signable(sighash)?;

        let materials = signer.sign_input(self, index, sighash)?;
        let input = self.input_mut(index).ok_or(SignError::NoInput(index))?;
        let count = materials.len();
        for material in materials {
            input.add_sig_material(material);
        }
        debug!(target: "psbt", index, sighash = ?sighash, count, "signed input");
        Ok(input.is_signed())
    }

    /// Signs all inputs which can be signed; inputs without UTXO information are skipped.
    ///
    /// Returns number of inputs which have final signature data after the signing.
    pub fn sign(&mut self, signer: &impl Signer, sighash: SighashType) -> Result<usize, SignError> {
        let mut signed = 0usize;
        for index in 0..self.inputs.len() {
            match self.sign_input(index, signer, sighash) {
                Ok(true) => signed += 1,
                Ok(false) => {}
                Err(SignError::NoUtxo(index)) => {
                    warn!(target: "psbt", index, "skipping input without UTXO information");
                }
                Err(err) => return Err(err),
            }
        }
        Ok(signed)
    }
}

impl Input {
    fn check_signable(&self, sighash: SighashType) -> Result<&TxOut, SignError> {
        if let Some(required) = self.sighash_type {
            if required != sighash {
                return Err(SignError::SighashMismatch {
                    index: self.index,
                    required,
                    requested: sighash,
                });
            }
        }

        match (&self.non_witness_tx, &self.witness_utxo) {
            (Some(_), _) => self.utxo().ok_or(SignError::UtxoMismatch(self.index)),
            (None, Some(txout)) => {
                let spk = txout.script_pubkey.as_slice();
                let nested = self
                    .redeem_script
                    .as_ref()
                    .is_some_and(|script| witness_version(script.as_slice()).is_some());
                let witness_program = witness_version(spk).is_some() || (is_p2sh(spk) && nested);
                if !witness_program {
                    return Err(SignError::WitnessRequired(self.index));
                }
                Ok(txout)
            }
            (None, None) => Err(SignError::NoUtxo(self.index)),
        }
    }

    fn add_sig_material(&mut self, material: SigMaterial) {
        match material {
            SigMaterial::Partial { pubkey, sig } => {
                self.partial_sigs.insert(pubkey, sig);
            }
            SigMaterial::TapKey(sig) => self.tap_key_sig = Some(sig),
            SigMaterial::TapScript {
                pubkey,
                leaf_hash,
                sig,
            } => {
                self.tap_script_sig.insert((pubkey, leaf_hash), sig);
            }
            SigMaterial::Final {
                sig_script,
                witness,
            } => {
                if !sig_script.is_empty() {
                    self.final_script_sig = Some(sig_script);
                }
                if !witness.is_empty() {
                    self.final_witness = Some(witness);
                }
            }
        }
    }
}
