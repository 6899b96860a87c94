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

use derive::{SigScript, Tx, TxIn, TxOut, VarIntArray, Witness};
use tracing::{debug, warn};

use crate::{Input, LockTimeConflict, Psbt};

#[derive(Copy, Clone, Eq, PartialEq, Debug, Display, Error)]
#[display(doc_comments)]
pub enum FinalizeError {
    /// PSBT has no input #{0}.
    NoInput(usize),

    /// input #{0} doesn't provide information about the spent output.
    NoUtxo(usize),

    /// {0} input(s) of the PSBT can't be finalized.
    Incomplete(usize),
}

#[derive(Copy, Clone, Eq, PartialEq, Debug, Display, Error, From)]
#[display(doc_comments)]
pub enum ExtractError {
    /// input #{0} is not finalized.
    Unfinalized(usize),

    /// unable to compute transaction lock time: {0}
    #[from]
    LockTime(LockTimeConflict),
}

/// Script satisfaction capability, which is able to construct final `scriptSig` and witness from
/// the signatures and scripts collected in a PSBT input.
pub trait Satisfier {
    /// Returns `None` if the collected data are insufficient for spending `utxo`.
    fn satisfy(&self, input: &Input, utxo: &TxOut) -> Option<(SigScript, Witness)>;
}

impl Psbt {
    /// Finalizes a single input.
    ///
    /// Returns `false` and leaves the input untouched if the satisfier can't produce final data.
    pub fn finalize_input(
        &mut self,
        index: usize,
        satisfier: &impl Satisfier,
    ) -> Result<bool, FinalizeError> {
        let input = self.input_mut(index).ok_or(FinalizeError::NoInput(index))?;
        if input.is_signed() {
            return Ok(true);
        }
        let utxo = input.utxo().ok_or(FinalizeError::NoUtxo(index))?;
        let Some((sig_script, witness)) = satisfier.satisfy(input, utxo) else {
            warn!(target: "psbt", index, "input can't be satisfied");
            return Ok(false);
        };
        if sig_script.is_empty() && witness.is_empty() {
            warn!(target: "psbt", index, "satisfier returned empty data");
            return Ok(false);
        }
        input.set_final(sig_script, witness);
        debug!(target: "psbt", index, "finalized input");
        Ok(true)
    }

    /// Tries to finalize all inputs. Fails if at least one of them can't be finalized; inputs
    /// finalized before the failure keep their final data.
    pub fn finalize(&mut self, satisfier: &impl Satisfier) -> Result<(), FinalizeError> {
        let mut failed = 0usize;
        for index in 0..self.inputs.len() {
            match self.finalize_input(index, satisfier) {
                Ok(true) => {}
                Ok(false) | Err(FinalizeError::NoUtxo(_)) => failed += 1,
                Err(err) => return Err(err),
            }
        }
        if failed > 0 {
            return Err(FinalizeError::Incomplete(failed));
        }
        Ok(())
    }

    /// Checks that the transaction can be extracted.
    pub fn is_complete(&self) -> bool { self.is_signed() && self.lock_time().is_ok() }

    /// Constructs the final network transaction from a PSBT with all inputs finalized.
    pub fn extract(&self) -> Result<Tx, ExtractError> {
        if let Some(input) = self.inputs().find(|input| !input.is_signed()) {
            return Err(ExtractError::Unfinalized(input.index()));
        }
        let unsigned_tx = self.to_unsigned_tx()?;
        let inputs = unsigned_tx
            .inputs
            .iter()
            .zip(self.inputs())
            .map(|(txin, input)| TxIn {
                prev_output: txin.prev_output,
                sig_script: input.final_script_sig.clone().unwrap_or_else(SigScript::new),
                sequence: txin.sequence,
                witness: input.final_witness.clone().unwrap_or_else(Witness::new),
            })
            .collect();
        let tx = Tx {
            version: unsigned_tx.version,
            inputs: VarIntArray::from_collection_unsafe(inputs),
            outputs: VarIntArray::from_collection_unsafe(unsigned_tx.outputs),
            lock_time: unsigned_tx.lock_time,
        };
        debug!(target: "psbt", txid = %tx.txid(), "extracted transaction");
        Ok(tx)
    }
}

impl Input {
    fn set_final(&mut self, sig_script: SigScript, witness: Witness) {
        if !sig_script.is_empty() {
            self.final_script_sig = Some(sig_script);
        }
        if !witness.is_empty() {
            self.final_witness = Some(witness);
        }

        self.partial_sigs.clear();
        self.sighash_type = None;
        self.redeem_script = None;
        self.witness_script = None;
        self.bip32_derivation.clear();
        self.ripemd160.clear();
        self.sha256.clear();
        self.hash160.clear();
        self.hash256.clear();
        self.tap_key_sig = None;
        self.tap_script_sig.clear();
        self.tap_leaf_script.clear();
        self.tap_bip32_derivation.clear();
        self.tap_internal_key = None;
        self.tap_merkle_root = None;
    }
}

#[cfg(test)]
mod test {
    use amplify::{ByteArray, Wrapper};
    use derive::{
        LegacyPk, LegacySig, Outpoint, Sats, ScriptBytes, ScriptPubkey, SighashType, Txid, Vout,
    };

    use super::*;
    use crate::{Decode, Encode, PsbtVer};

    const PK: [u8; 33] = [
        0x02, 0x79, 0xbe, 0x66, 0x7e, 0xf9, 0xdc, 0xbb, 0xac, 0x55, 0xa0, 0x62, 0x95, 0xce, 0x87,
        0x0b, 0x07, 0x02, 0x9b, 0xfc, 0xdb, 0x2d, 0xce, 0x28, 0xd9, 0x59, 0xf2, 0x81, 0x5b, 0x16,
        0xf8, 0x17, 0x98,
    ];
    const SIG: [u8; 9] = [0x30, 0x06, 0x02, 0x01, 0x01, 0x02, 0x01, 0x01, 0x01];

    struct Wpkh;

    impl Satisfier for Wpkh {
        fn satisfy(&self, input: &Input, _: &TxOut) -> Option<(SigScript, Witness)> {
            let (pk, sig) = input.partial_sigs.first()?;
            let witness =
                Witness::from_consensus_stack([Encode::serialize(sig), Encode::serialize(pk)]);
            Some((SigScript::new(), witness))
        }
    }

    fn txout(script: Vec<u8>, value: u64) -> TxOut {
        TxOut {
            value: Sats::from(value),
            script_pubkey: ScriptPubkey::from_inner(ScriptBytes::try_from(script).unwrap()),
        }
    }

    fn psbt(count: u8) -> Psbt {
        let mut psbt = Psbt::create(PsbtVer::V2);
        for no in 1..=count {
            let mut input = Input::new(0);
            input.previous_outpoint = Outpoint::new(Txid::from_byte_array([no; 32]), Vout::from_u32(1));
            let mut script = vec![0x00, 0x14];
            script.extend([no; 20]);
            input.witness_utxo = Some(txout(script, 1000));
            input.sighash_type = Some(SighashType::all());
            psbt.add_input(input).unwrap();
        }
        psbt.add_txout(txout(vec![0x51], 900)).unwrap();
        psbt
    }

    fn add_sig(psbt: &mut Psbt, index: usize) {
        let pk = LegacyPk::deserialize(PK).unwrap();
        let sig = LegacySig::deserialize(SIG).unwrap();
        psbt.input_mut(index).unwrap().partial_sigs.insert(pk, sig);
    }

    #[test]
    fn finalize_incomplete() {
        let mut psbt = psbt(2);
        add_sig(&mut psbt, 1);
        assert_eq!(psbt.finalize(&Wpkh), Err(FinalizeError::Incomplete(1)));
        assert!(!psbt.input(0).unwrap().is_signed());
        assert!(psbt.input(1).unwrap().is_signed());
        assert!(!psbt.is_complete());
        assert_eq!(psbt.extract(), Err(ExtractError::Unfinalized(0)));
        assert_eq!(psbt.finalize_input(2, &Wpkh), Err(FinalizeError::NoInput(2)));
    }

    #[test]
    fn finalize_extract() {
        let mut psbt = psbt(2);
        add_sig(&mut psbt, 0);
        add_sig(&mut psbt, 1);
        psbt.finalize(&Wpkh).unwrap();
        assert!(psbt.is_complete());

        let input = psbt.input(0).unwrap();
        assert!(input.partial_sigs.is_empty());
        assert_eq!(input.sighash_type, None);
        assert!(input.witness_utxo.is_some());
        assert!(input.final_script_sig.is_none());

        let tx = psbt.extract().unwrap();
        assert_eq!(tx.inputs.len(), 2);
        assert_eq!(tx.outputs.len(), 1);
        assert_eq!(tx.inputs[1].witness, Witness::from_consensus_stack([
            Encode::serialize(&LegacySig::deserialize(SIG).unwrap()),
            PK.to_vec()
        ]));
        assert!(tx.inputs[1].sig_script.is_empty());
        assert_eq!(tx.inputs[0].prev_output, psbt.input(0).unwrap().previous_outpoint);
    }

    #[test]
    fn finalize_no_utxo() {
        let mut psbt = psbt(1);
        psbt.input_mut(0).unwrap().witness_utxo = None;
        assert_eq!(psbt.finalize_input(0, &Wpkh), Err(FinalizeError::NoUtxo(0)));
        assert_eq!(psbt.finalize(&Wpkh), Err(FinalizeError::Incomplete(1)));
    }
}
