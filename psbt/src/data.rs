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

use std::ops::BitOr;

use amplify::num::u5;
use amplify::{Bytes20, Bytes32};
use derive::{
    Bip340Sig, ByteStr, ControlBlock, InternalPk, KeyOrigin, LeafScript, LegacyPk, LegacySig,
    LockHeight, LockTime, LockTimestamp, Outpoint, RedeemScript, Sats, ScriptPubkey, SeqNo,
    SigScript, SighashType, TapDerivation, TapLeafHash, TapNodeHash, TapTree, Tx, TxIn, TxOut,
    TxVer, Txid, VarIntArray, Witness, WitnessScript, XOnlyPk, XkeyOrigin, Xpub,
};
use indexmap::IndexMap;

pub use self::display_from_str::PsbtParseError;
use crate::{
    resolve_lock_time, KeyData, LockTimeConflict, PropKey, PsbtVer, ValueData,
};

#[derive(Copy, Clone, Eq, PartialEq, Debug, Display, Error)]
#[display("PSBT can't be modified")]
pub struct Unmodifiable;

/// Structure representing data on unsigned transaction the way it is stored in PSBTv0 global key.
///
/// We can't use [`Tx`] since PSBT may contain unsigned transaction with zero inputs. Such
/// transaction can't be consensus-decoded since the zero input count is indistinguishable from the
/// segwit marker byte.
///
/// `UnsignedTx` also ensures invariant that none of its inputs contain witnesses or sigscripts.
#[derive(Clone, Eq, PartialEq, Hash, Debug)]
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(crate = "serde_crate", rename_all = "camelCase")
)]
pub struct UnsignedTx {
    pub version: TxVer,
    pub inputs: Vec<UnsignedTxIn>,
    pub outputs: Vec<TxOut>,
    pub lock_time: LockTime,
}

impl From<Tx> for UnsignedTx {
    #[inline]
    fn from(tx: Tx) -> UnsignedTx { UnsignedTx::with_sigs_removed(tx) }
}

impl From<UnsignedTx> for Tx {
    #[inline]
    fn from(unsigned_tx: UnsignedTx) -> Tx { unsigned_tx.finalize() }
}

impl UnsignedTx {
    #[inline]
    pub fn with_sigs_removed(tx: Tx) -> UnsignedTx {
        UnsignedTx {
            version: tx.version,
            inputs: tx.inputs.into_iter().map(UnsignedTxIn::with_sigs_removed).collect(),
            outputs: tx.outputs.into_iter().collect(),
            lock_time: tx.lock_time,
        }
    }

    pub fn txid(&self) -> Txid { self.clone().finalize().txid() }

    pub fn finalize(self) -> Tx {
        Tx {
            version: self.version,
            inputs: VarIntArray::from_collection_unsafe(
                self.inputs.into_iter().map(UnsignedTxIn::finalize).collect(),
            ),
            outputs: VarIntArray::from_collection_unsafe(self.outputs),
            lock_time: self.lock_time,
        }
    }
}

#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(crate = "serde_crate", rename_all = "camelCase")
)]
pub struct UnsignedTxIn {
    pub prev_output: Outpoint,
    pub sequence: SeqNo,
}

impl From<TxIn> for UnsignedTxIn {
    #[inline]
    fn from(txin: TxIn) -> UnsignedTxIn { UnsignedTxIn::with_sigs_removed(txin) }
}

impl From<UnsignedTxIn> for TxIn {
    #[inline]
    fn from(unsigned_txin: UnsignedTxIn) -> TxIn {
        TxIn {
            prev_output: unsigned_txin.prev_output,
            sig_script: SigScript::new(),
            sequence: unsigned_txin.sequence,
            witness: Witness::new(),
        }
    }
}

impl UnsignedTxIn {
    #[inline]
    pub fn with_sigs_removed(txin: TxIn) -> UnsignedTxIn {
        UnsignedTxIn {
            prev_output: txin.prev_output,
            sequence: txin.sequence,
        }
    }

    pub fn finalize(self) -> TxIn { self.into() }
}

/// Partially signed transaction, in any of the supported versions.
///
/// The structure is version-agnostic: PSBTv0 data are kept in the same fields as PSBTv2 ones, and
/// the version is selected when the structure gets serialized.
#[derive(Clone, Eq, PartialEq, Debug)]
pub struct Psbt {
    /// PSBT version
    pub version: PsbtVer,

    /// Transaction version.
    pub tx_version: TxVer,

    /// Fallback locktime (used if none of the inputs specifies their locktime).
    pub fallback_locktime: Option<LockTime>,

    /// The corresponding key-value map for each input.
    pub(crate) inputs: Vec<Input>,

    /// The corresponding key-value map for each output.
    pub(crate) outputs: Vec<Output>,

    /// A global map from extended public keys to the used key fingerprint and
    /// derivation path as defined by BIP 32
    pub xpubs: IndexMap<Xpub, XkeyOrigin>,

    /// Transaction Modifiable Flags
    pub(crate) tx_modifiable: Option<ModifiableFlags>,

    /// Proprietary keys
    pub proprietary: IndexMap<PropKey, ValueData>,

    /// Unknown keys
    pub unknown: IndexMap<u8, IndexMap<KeyData, ValueData>>,
}

impl Default for Psbt {
    fn default() -> Self { Psbt::create(PsbtVer::V2) }
}

impl Psbt {
    /// Creates an empty PSBT. Version 2 PSBTs are created with both inputs and outputs
    /// modifiable.
    pub fn create(version: PsbtVer) -> Psbt {
        let mut psbt = Psbt::blank(version);
        if version >= PsbtVer::V2 {
            psbt.tx_modifiable = Some(ModifiableFlags::modifiable());
        }
        psbt
    }

    pub(crate) fn blank(version: PsbtVer) -> Psbt {
        Psbt {
            version,
            tx_version: TxVer::V2,
            fallback_locktime: None,
            inputs: vec![],
            outputs: vec![],
            xpubs: none!(),
            tx_modifiable: None,
            proprietary: none!(),
            unknown: none!(),
        }
    }

    pub fn from_tx(tx: impl Into<UnsignedTx>) -> Self {
        let unsigned_tx = tx.into();
        let mut psbt = Psbt::create(PsbtVer::V0);
        psbt.reset_from_unsigned_tx(unsigned_tx);
        psbt
    }

    pub(crate) fn reset_from_unsigned_tx(&mut self, unsigned_tx: UnsignedTx) {
        self.tx_version = unsigned_tx.version;
        self.fallback_locktime = Some(unsigned_tx.lock_time);
        self.inputs =
            unsigned_tx.inputs.into_iter().enumerate().map(Input::from_unsigned_txin).collect();
        self.outputs =
            unsigned_tx.outputs.into_iter().enumerate().map(Output::from_txout).collect();
    }

    /// Constructs the transaction skeleton, as it is stored in PSBTv0.
    ///
    /// # Errors
    ///
    /// If the inputs require incompatible kinds of lock time.
    pub fn to_unsigned_tx(&self) -> Result<UnsignedTx, LockTimeConflict> {
        Ok(UnsignedTx {
            version: self.tx_version,
            inputs: self.inputs().map(Input::to_unsigned_txin).collect(),
            outputs: self.outputs().map(Output::to_txout).collect(),
            lock_time: self.lock_time()?,
        })
    }

    pub fn txid(&self) -> Result<Txid, LockTimeConflict> {
        self.to_unsigned_tx().map(|tx| tx.txid())
    }

    /// Identifier of the PSBT which doesn't change when signatures are added.
    ///
    /// For PSBTv2 the sequence numbers are excluded from the identity, since they may be set by
    /// the updaters.
    pub fn unique_id(&self) -> Result<Txid, LockTimeConflict> {
        let mut tx = self.to_unsigned_tx()?;
        if self.version >= PsbtVer::V2 {
            for txin in &mut tx.inputs {
                txin.sequence = SeqNo::from_consensus_u32(0);
            }
        }
        Ok(tx.txid())
    }

    pub fn input(&self, index: usize) -> Option<&Input> { self.inputs.get(index) }

    pub fn input_mut(&mut self, index: usize) -> Option<&mut Input> { self.inputs.get_mut(index) }

    pub fn inputs(&self) -> impl Iterator<Item = &Input> { self.inputs.iter() }

    pub fn inputs_mut(&mut self) -> impl Iterator<Item = &mut Input> { self.inputs.iter_mut() }

    pub fn output(&self, index: usize) -> Option<&Output> { self.outputs.get(index) }

    pub fn output_mut(&mut self, index: usize) -> Option<&mut Output> {
        self.outputs.get_mut(index)
    }

    pub fn outputs(&self) -> impl Iterator<Item = &Output> { self.outputs.iter() }

    pub fn outputs_mut(&mut self) -> impl Iterator<Item = &mut Output> { self.outputs.iter_mut() }

    /// Resolves transaction lock time from the input requirements and the fallback lock time.
    pub fn lock_time(&self) -> Result<LockTime, LockTimeConflict> {
        resolve_lock_time(
            self.inputs().map(|input| (input.required_time_lock, input.required_height_lock)),
            self.fallback_locktime,
        )
    }

    /// Sum of the spent outputs, if all of them are known.
    pub fn input_sum(&self) -> Option<Sats> {
        let values = self.inputs().map(Input::value).collect::<Option<Vec<_>>>()?;
        Some(values.into_iter().sum())
    }

    #[inline]
    pub fn output_sum(&self) -> Sats { self.outputs().map(Output::value).sum() }

    #[inline]
    pub fn fee(&self) -> Option<Sats> { self.input_sum()?.checked_sub(self.output_sum()) }

    pub fn xpubs(&self) -> impl Iterator<Item = (&Xpub, &XkeyOrigin)> { self.xpubs.iter() }

    pub fn tx_modifiable(&self) -> Option<ModifiableFlags> { self.tx_modifiable }

    pub fn is_modifiable(&self) -> bool {
        self.tx_modifiable.as_ref().map(ModifiableFlags::is_modifiable).unwrap_or_default()
    }

    pub fn are_inputs_modifiable(&self) -> bool {
        self.tx_modifiable.map(|flags| flags.inputs_modifiable).unwrap_or_default()
    }

    pub fn are_outputs_modifiable(&self) -> bool {
        self.tx_modifiable.map(|flags| flags.outputs_modifiable).unwrap_or_default()
    }

    pub fn has_sighash_single(&self) -> bool {
        self.tx_modifiable.map(|flags| flags.sighash_single).unwrap_or_default()
    }

    /// Marks PSBT as not modifiable anymore.
    pub fn complete_construction(&mut self) {
        if self.version >= PsbtVer::V2 {
            self.tx_modifiable = Some(ModifiableFlags::unmodifiable())
        }
    }

    pub fn is_signed(&self) -> bool { self.inputs().all(Input::is_signed) }

    pub fn unsigned_input_count(&self) -> usize {
        self.inputs().filter(|input| !input.is_signed()).count()
    }
}

mod display_from_str {
    use std::fmt::{self, Display, Formatter, LowerHex};
    use std::str::FromStr;

    use amplify::hex::{self, FromHex, ToHex};
    use base64::display::Base64Display;
    use base64::prelude::BASE64_STANDARD;
    use base64::Engine;

    use super::*;
    use crate::{PsbtError, MAX_PSBT_SIZE};

    #[derive(Clone, Debug, Display, Error, From)]
    #[display(inner)]
    pub enum PsbtParseError {
        #[from]
        Hex(hex::Error),

        #[from]
        Base64(base64::DecodeError),

        #[from]
        Psbt(PsbtError),
    }

    impl Psbt {
        pub fn from_base64(s: &str) -> Result<Psbt, PsbtParseError> {
            // base64 text is 4/3 of the binary size
            if s.len() / 4 * 3 > MAX_PSBT_SIZE {
                return Err(PsbtError::OversizedPsbt(s.len() / 4 * 3).into());
            }
            Psbt::deserialize(BASE64_STANDARD.decode(s)?).map_err(PsbtParseError::from)
        }

        pub fn from_base16(s: &str) -> Result<Psbt, PsbtParseError> {
            if s.len() / 2 > MAX_PSBT_SIZE {
                return Err(PsbtError::OversizedPsbt(s.len() / 2).into());
            }
            let data = Vec::<u8>::from_hex(s)?;
            Psbt::deserialize(data).map_err(PsbtParseError::from)
        }

        pub fn to_base64(&self) -> Result<String, PsbtError> { self.to_base64_ver(self.version) }

        pub fn to_base64_ver(&self, version: PsbtVer) -> Result<String, PsbtError> {
            self.serialize(version).map(|data| BASE64_STANDARD.encode(data))
        }

        pub fn to_base16(&self) -> Result<String, PsbtError> { self.to_base16_ver(self.version) }

        pub fn to_base16_ver(&self, version: PsbtVer) -> Result<String, PsbtError> {
            self.serialize(version).map(|data| data.to_hex())
        }
    }

    /// FromStr implementation parses both Base64 and Hex (Base16) encodings.
    impl FromStr for Psbt {
        type Err = PsbtParseError;

        #[inline]
        fn from_str(s: &str) -> Result<Self, Self::Err> {
            Self::from_base16(s).or_else(|_| Self::from_base64(s))
        }
    }

    /// PSBT displays Base64-encoded string. The selection of the version if the following:
    /// - by default, it uses version specified in the PSBT itself;
    /// - if zero `{:0}` is given and no width (`{:0}`) or a zero width (`{:00}`) is provided, than
    ///   the PSBT is encoded as V0 even if the structure itself uses V2;
    /// - if a width equal to two is given like in `{:2}`, than zero flag is ignored (so `{:02}`
    ///   also works that way) and PSBT is encoded as V2 even if the structure itself uses V0;
    /// - all other flags has no effect on the display.
    ///
    /// PSBT which can't be serialized in the selected version (see [`Psbt::serialize`]) results
    /// in a formatting error.
    impl Display for Psbt {
        fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
            let ver = match (f.width(), f.sign_aware_zero_pad()) {
                (None, true) => PsbtVer::V0,
                (Some(0), _) => PsbtVer::V0,
                (Some(2), _) => PsbtVer::V2,
                _ => self.version,
            };
            let data = self.serialize(ver).map_err(|_| fmt::Error)?;
            write!(f, "{}", Base64Display::new(&data, &BASE64_STANDARD))
        }
    }

    impl LowerHex for Psbt {
        fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
            let mut ver = match f.width() {
                None => self.version,
                Some(0) => PsbtVer::V0,
                Some(2) => PsbtVer::V2,
                _ => return Err(fmt::Error),
            };
            if f.alternate() {
                ver = PsbtVer::V2;
            }
            f.write_str(&self.to_base16_ver(ver).map_err(|_| fmt::Error)?)
        }
    }
}

#[derive(Clone, Eq, PartialEq, Debug)]
pub struct Input {
    /// The index of this input. Used in error reporting.
    pub(crate) index: usize,

    /// Previous transaction outpoint to spent.
    pub previous_outpoint: Outpoint,

    /// Sequence number of this input. If omitted, the sequence number is
    /// assumed to be the final sequence number (0xffffffff).
    pub sequence_number: Option<SeqNo>,

    /// 32 bit unsigned little endian integer greater than or equal to 500000000
    /// representing the minimum Unix timestamp that this input requires to be
    /// set as the transaction's lock time.
    pub required_time_lock: Option<LockTimestamp>,

    /// 32 bit unsigned little endian integer less than 500000000 representing
    /// the minimum block height that this input requires to be set as the
    /// transaction's lock time.
    pub required_height_lock: Option<LockHeight>,

    /// The non-witness transaction this input spends from. Should only be
    /// `Some` for inputs which spend non-segwit outputs or if it is unknown
    /// whether an input spends a segwit output.
    pub non_witness_tx: Option<Tx>,

    /// The transaction output this input spends from. Should only be `Some` for
    /// inputs which spend segwit outputs, including P2SH embedded ones.
    pub witness_utxo: Option<TxOut>,

    /// A map from public keys to their corresponding signature as would be
    /// pushed to the stack from a scriptSig or witness for a non-taproot
    /// inputs.
    pub partial_sigs: IndexMap<LegacyPk, LegacySig>,

    /// The sighash type to be used for this input. Signatures for this input
    /// must use the sighash type.
    pub sighash_type: Option<SighashType>,

    /// The redeem script for this input.
    pub redeem_script: Option<RedeemScript>,

    /// The witness script for this input.
    pub witness_script: Option<WitnessScript>,

    /// A map from public keys needed to sign this input to their corresponding master key
    /// fingerprints and derivation paths.
    pub bip32_derivation: IndexMap<LegacyPk, KeyOrigin>,

    /// The finalized, fully-constructed scriptSig with signatures and any other scripts necessary
    /// for this input to pass validation.
    pub final_script_sig: Option<SigScript>,

    /// The finalized, fully-constructed scriptWitness with signatures and any other scripts
    /// necessary for this input to pass validation.
    pub final_witness: Option<Witness>,

    /// The hash preimage, encoded as a byte vector, which must equal the key when run through the
    /// RIPEMD160 algorithm.
    pub ripemd160: IndexMap<Bytes20, ByteStr>,

    /// The hash preimage, encoded as a byte vector, which must equal the key when run through the
    /// SHA256 algorithm.
    pub sha256: IndexMap<Bytes32, ByteStr>,

    /// The hash preimage, encoded as a byte vector, which must equal the key when run through the
    /// SHA256 algorithm followed by the RIPEMD160 algorithm .
    pub hash160: IndexMap<Bytes20, ByteStr>,

    /// The hash preimage, encoded as a byte vector, which must equal the key when run through the
    /// SHA256 algorithm twice.
    pub hash256: IndexMap<Bytes32, ByteStr>,

    /// The 64 or 65 byte Schnorr signature for key path spending a Taproot output. Finalizers
    /// should remove this field after `PSBT_IN_FINAL_SCRIPTWITNESS` is constructed.
    pub tap_key_sig: Option<Bip340Sig>,

    /// The 64 or 65 byte Schnorr signature for this pubkey and leaf combination. Finalizers
    /// should remove this field after `PSBT_IN_FINAL_SCRIPTWITNESS` is constructed.
    pub tap_script_sig: IndexMap<(XOnlyPk, TapLeafHash), Bip340Sig>,

    /// The script for this leaf as would be provided in the witness stack followed by the single
    /// byte leaf version. Note that the leaves included in this field should be those that the
    /// signers of this input are expected to be able to sign for. Finalizers should remove this
    /// field after `PSBT_IN_FINAL_SCRIPTWITNESS` is constructed.
    pub tap_leaf_script: IndexMap<ControlBlock, LeafScript>,

    /// Leaf hashes and key origin of each x-only public key needed to spend this input. The
    /// internal key does not have leaf hashes. Finalizers should remove this field after
    /// `PSBT_IN_FINAL_SCRIPTWITNESS` is constructed.
    pub tap_bip32_derivation: IndexMap<XOnlyPk, TapDerivation>,

    /// The X-only pubkey used as the internal key in this output. Finalizers should remove this
    /// field after `PSBT_IN_FINAL_SCRIPTWITNESS` is constructed.
    pub tap_internal_key: Option<InternalPk>,

    /// The 32 byte Merkle root hash. Finalizers should remove this field after
    /// `PSBT_IN_FINAL_SCRIPTWITNESS` is constructed.
    pub tap_merkle_root: Option<TapNodeHash>,

    /// Proprietary keys
    pub proprietary: IndexMap<PropKey, ValueData>,

    /// Unknown keys
    pub unknown: IndexMap<u8, IndexMap<KeyData, ValueData>>,
}

impl Input {
    pub fn new(index: usize) -> Input {
        Input {
            index,
            previous_outpoint: Outpoint::coinbase(),
            sequence_number: None,
            required_time_lock: None,
            required_height_lock: None,
            non_witness_tx: None,
            witness_utxo: None,
            partial_sigs: none!(),
            sighash_type: None,
            redeem_script: None,
            witness_script: None,
            bip32_derivation: none!(),
            final_script_sig: None,
            final_witness: None,
            ripemd160: none!(),
            sha256: none!(),
            hash160: none!(),
            hash256: none!(),
            tap_key_sig: None,
            tap_script_sig: none!(),
            tap_leaf_script: none!(),
            tap_bip32_derivation: none!(),
            tap_internal_key: None,
            tap_merkle_root: None,
            proprietary: none!(),
            unknown: none!(),
        }
    }

    pub fn with_txin(txin: impl Into<UnsignedTxIn>, index: usize) -> Input {
        let txin = txin.into();
        let mut input = Input::new(index);
        input.previous_outpoint = txin.prev_output;
        input.sequence_number = Some(txin.sequence);
        input
    }

    pub fn from_unsigned_txin((index, txin): (usize, UnsignedTxIn)) -> Input {
        Input::with_txin(txin, index)
    }

    pub fn to_unsigned_txin(&self) -> UnsignedTxIn {
        UnsignedTxIn {
            prev_output: self.previous_outpoint,
            sequence: self.sequence_number.unwrap_or(SeqNo::from_consensus_u32(u32::MAX)),
        }
    }

    /// Output spent by this input.
    ///
    /// Non-witness transaction takes precedence over the witness UTXO; it is used only if it
    /// matches the previous outpoint.
    pub fn utxo(&self) -> Option<&TxOut> {
        match (&self.non_witness_tx, &self.witness_utxo) {
            (Some(tx), _) => {
                if tx.txid() != self.previous_outpoint.txid {
                    return None;
                }
                tx.outputs.get(self.previous_outpoint.vout.into_u32() as usize)
            }
            (None, Some(txout)) => Some(txout),
            (None, None) => None,
        }
    }

    #[inline]
    pub fn value(&self) -> Option<Sats> { self.utxo().map(|txout| txout.value) }

    #[inline]
    pub fn index(&self) -> usize { self.index }

    /// Detects whether the input has final signature data.
    pub fn is_signed(&self) -> bool {
        self.final_script_sig.is_some() || self.final_witness.is_some()
    }
}

#[derive(Clone, Eq, PartialEq, Debug)]
pub struct Output {
    /// The index of this output. Used in error reporting.
    pub(crate) index: usize,

    /// The output's amount in satoshis.
    pub amount: Sats,

    /// The script for this output, also known as the scriptPubKey.
    pub script: ScriptPubkey,

    /// The redeem script for this output.
    pub redeem_script: Option<RedeemScript>,

    /// The witness script for this output.
    pub witness_script: Option<WitnessScript>,

    /// A map from public keys needed to spend this output to their corresponding master key
    /// fingerprints and derivation paths.
    pub bip32_derivation: IndexMap<LegacyPk, KeyOrigin>,

    /// The X-only pubkey used as the internal key in this output.
    pub tap_internal_key: Option<InternalPk>,

    /// One or more tuples representing the depth, leaf version, and script for a leaf in the
    /// Taproot tree, allowing the entire tree to be reconstructed. The tuples must be in depth
    /// first search order so that the tree is correctly reconstructed.
    pub tap_tree: Option<TapTree>,

    /// Leaf hashes and key origin of each x-only public key needed to spend this output.
    pub tap_bip32_derivation: IndexMap<XOnlyPk, TapDerivation>,

    /// Proprietary keys
    pub proprietary: IndexMap<PropKey, ValueData>,

    /// Unknown keys
    pub unknown: IndexMap<u8, IndexMap<KeyData, ValueData>>,
}

impl Output {
    pub fn new(index: usize) -> Self {
        Output {
            index,
            amount: Sats::ZERO,
            script: ScriptPubkey::new(),
            redeem_script: None,
            witness_script: None,
            bip32_derivation: none!(),
            tap_internal_key: None,
            tap_tree: None,
            tap_bip32_derivation: none!(),
            proprietary: none!(),
            unknown: none!(),
        }
    }

    pub fn with_txout(txout: TxOut, index: usize) -> Self {
        let mut output = Output::new(index);
        output.amount = txout.value;
        output.script = txout.script_pubkey;
        output
    }

    pub fn from_txout((index, txout): (usize, TxOut)) -> Self { Output::with_txout(txout, index) }

    pub fn to_txout(&self) -> TxOut {
        TxOut {
            value: self.amount,
            script_pubkey: self.script.clone(),
        }
    }

    #[inline]
    pub fn value(&self) -> Sats { self.amount }

    #[inline]
    pub fn index(&self) -> usize { self.index }
}

/// Flags of `PSBT_GLOBAL_TX_MODIFIABLE` field.
///
/// Bits which are not defined yet are kept as they are, so they survive re-serialization.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(crate = "serde_crate", rename_all = "camelCase")
)]
pub struct ModifiableFlags {
    pub inputs_modifiable: bool,
    pub outputs_modifiable: bool,
    pub sighash_single: bool,
    pub unknown: u5,
}

impl ModifiableFlags {
    pub const fn unmodifiable() -> Self {
        ModifiableFlags {
            inputs_modifiable: false,
            outputs_modifiable: false,
            sighash_single: false,
            unknown: u5::ZERO,
        }
    }

    pub const fn modifiable() -> Self {
        ModifiableFlags {
            inputs_modifiable: true,
            outputs_modifiable: true,
            sighash_single: false,
            unknown: u5::ZERO,
        }
    }

    pub const fn modifiable_sighash_single() -> Self {
        ModifiableFlags {
            inputs_modifiable: true,
            outputs_modifiable: true,
            sighash_single: true,
            unknown: u5::ZERO,
        }
    }

    pub fn from_standard_u8(val: u8) -> Self {
        let inputs_modifiable = val & 0x01 == 0x01;
        let outputs_modifiable = val & 0x02 == 0x02;
        let sighash_single = val & 0x04 == 0x04;
        let unknown = u5::with(val >> 3);
        Self {
            inputs_modifiable,
            outputs_modifiable,
            sighash_single,
            unknown,
        }
    }

    pub fn to_standard_u8(&self) -> u8 {
        (self.inputs_modifiable as u8)
            | ((self.outputs_modifiable as u8) << 1)
            | ((self.sighash_single as u8) << 2)
            | (self.unknown.to_u8() << 3)
    }

    pub const fn is_modifiable(&self) -> bool {
        self.inputs_modifiable | self.outputs_modifiable | self.sighash_single
    }
}

impl BitOr for ModifiableFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self::Output {
        ModifiableFlags::from_standard_u8(self.to_standard_u8() | rhs.to_standard_u8())
    }
}
