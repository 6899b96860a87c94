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

use derive::{Outpoint, TxOut};
use tracing::debug;

use crate::coders::is_null_txid;
use crate::{resolve_lock_time, Input, LockTimeConflict, Output, Psbt, PsbtVer, Unmodifiable};

#[derive(Copy, Clone, Eq, PartialEq, Debug, Display, Error, From)]
#[display(doc_comments)]
pub enum AddInputError {
    /// PSBT inputs can't be modified.
    Unmodifiable,

    /// the added input doesn't reference a previous transaction.
    NullPrevTxid,

    /// PSBT already contains input spending {0}.
    DuplicateInput(Outpoint),

    /// the added input lock time requirement is incompatible with other inputs.
    #[from]
    LockTime(LockTimeConflict),

    /// the added input would change lock time of the already signed transaction.
    LockTimeChanged,
}

impl From<Unmodifiable> for AddInputError {
    fn from(_: Unmodifiable) -> Self { AddInputError::Unmodifiable }
}

impl Psbt {
    /// Appends a new input to the PSBT.
    ///
    /// In PSBTv0 the input is added to the transaction skeleton, dropping any signature data it
    /// has. In PSBTv2 adding inputs must be allowed by the modifiable flags, and the input lock
    /// time requirements must be compatible with the requirements of the present inputs.
    pub fn add_input(&mut self, mut input: Input) -> Result<&mut Input, AddInputError> {
        let outpoint = input.previous_outpoint;
        if is_null_txid(outpoint.txid) {
            return Err(AddInputError::NullPrevTxid);
        }
        if self.inputs().any(|other| other.previous_outpoint == outpoint) {
            return Err(AddInputError::DuplicateInput(outpoint));
        }

        if self.version == PsbtVer::V0 {
            input.partial_sigs.clear();
            input.final_script_sig = None;
            input.final_witness = None;
        } else {
            if !self.are_inputs_modifiable() {
                return Err(Unmodifiable.into());
            }
            if input.required_time_lock.is_some() || input.required_height_lock.is_some() {
                self.check_lock_time_with(&input)?;
            }
        }

        input.index = self.inputs.len();
        debug!(target: "psbt", index = input.index, outpoint = %outpoint, "adding input");
        self.inputs.push(input);
        Ok(self.inputs.last_mut().expect("just inserted"))
    }

    fn check_lock_time_with(&self, input: &Input) -> Result<(), AddInputError> {
        let old_lock_time = self.lock_time()?;
        let locks = Some(input)
            .into_iter()
            .chain(self.inputs())
            .map(|input| (input.required_time_lock, input.required_height_lock));
        let new_lock_time = resolve_lock_time(locks, self.fallback_locktime)?;
        let has_sigs = self.inputs().any(|input| !input.partial_sigs.is_empty());
        if has_sigs && old_lock_time != new_lock_time {
            return Err(AddInputError::LockTimeChanged);
        }
        Ok(())
    }

    /// Appends a new output to the PSBT.
    ///
    /// In PSBTv2 adding outputs must be allowed by the modifiable flags.
    pub fn add_output(&mut self, mut output: Output) -> Result<&mut Output, Unmodifiable> {
        if self.version >= PsbtVer::V2 && !self.are_outputs_modifiable() {
            return Err(Unmodifiable);
        }
        output.index = self.outputs.len();
        debug!(target: "psbt", index = output.index, amount = %output.amount, "adding output");
        self.outputs.push(output);
        Ok(self.outputs.last_mut().expect("just inserted"))
    }

    pub fn add_txout(&mut self, txout: TxOut) -> Result<&mut Output, Unmodifiable> {
        self.add_output(Output::with_txout(txout, self.outputs.len()))
    }
}
