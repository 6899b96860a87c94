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

use std::collections::BTreeMap;
use std::io::{self, Read, Write};
use std::ops::Deref;

use amplify::{Bytes20, Bytes32};
use bitcoin_hashes::{hash160, ripemd160, sha256, sha256d, Hash};
use derive::{
    Bip340Sig, ByteStr, ControlBlock, InternalPk, KeyOrigin, LeafScript, LegacyPk, LegacySig,
    LockHeight, LockTime, LockTimestamp, RedeemScript, Sats, ScriptPubkey, SeqNo, SigScript,
    SighashType, TapDerivation, TapLeafHash, TapNodeHash, TapTree, Tx, TxOut, TxVer, Txid, VarInt,
    Vout, Witness, WitnessScript, XOnlyPk, XkeyOrigin, Xpub,
};
use indexmap::IndexMap;
use tracing::trace;

use crate::keys::KeyValue;
use crate::{
    Decode, DecodeError, Encode, EncodeError, GlobalKey, Input, InputKey, KeyType,
    ModifiableFlags, Output, OutputKey, PropKey, Psbt, PsbtError, PsbtVer, UnsignedTx,
};

pub type KeyData = ByteStr;

/// Raw value of a PSBT key-value pair.
#[derive(Clone, Ord, PartialOrd, Eq, PartialEq, Hash, Default, Debug, Display, From)]
#[display("{0:x}")]
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(crate = "serde_crate", transparent)
)]
pub struct ValueData(#[from] ByteStr);

impl ValueData {
    pub fn as_slice(&self) -> &[u8] { self.0.as_slice() }

    pub fn into_inner(self) -> ByteStr { self.0 }
}

impl Deref for ValueData {
    type Target = [u8];
    fn deref(&self) -> &Self::Target { self.0.as_slice() }
}

impl AsRef<[u8]> for ValueData {
    fn as_ref(&self) -> &[u8] { self.0.as_slice() }
}

impl From<Vec<u8>> for ValueData {
    fn from(vec: Vec<u8>) -> Self { ByteStr::from(vec).into() }
}

#[derive(Clone, Eq, PartialEq, Debug, Display, Error)]
#[display("proprietary key '{0}' is already present")]
pub struct KeyAlreadyPresent(pub PropKey);

#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Display)]
#[display(lowercase)]
pub enum MapName {
    Global,
    Input,
    Output,
}

/// Key-value pairs of a single PSBT map, grouped by the kind of the key but not yet interpreted.
#[derive(Clone, Eq, PartialEq, Debug)]
pub struct Map<K: KeyType> {
    pub name: MapName,
    pub singular: BTreeMap<K, ValueData>,
    pub plural: BTreeMap<K, BTreeMap<KeyData, ValueData>>,
    pub proprietary: IndexMap<PropKey, ValueData>,
    pub unknown: IndexMap<u8, IndexMap<KeyData, ValueData>>,
}

impl<K: KeyType> Map<K> {
    fn new(name: MapName) -> Self {
        Map {
            name,
            singular: empty!(),
            plural: empty!(),
            proprietary: empty!(),
            unknown: empty!(),
        }
    }

    /// Reads a map up to and including its separator.
    ///
    /// Returns `Ok(None)` if the stream is exhausted before the first byte of the map.
    pub fn parse(name: MapName, stream: &mut impl Read) -> Result<Option<Self>, DecodeError> {
        let mut head = [0u8; 1];
        match stream.read_exact(&mut head) {
            Err(err) if err.kind() == io::ErrorKind::UnexpectedEof => return Ok(None),
            res => res?,
        }

        let mut map = Map::<K>::new(name);
        let mut next = KeyValue::<K>::decode_with_head(head[0], stream)?;

        while let KeyValue::<K>::Pair(pair) = next {
            let key_type = pair.key_type;
            if map.singular.contains_key(&key_type) {
                return Err(PsbtError::RepeatedKey(name, key_type.to_u8()).into());
            }
            if key_type.is_proprietary() {
                let prop_key = PropKey::deserialize(pair.key_data)?;
                if map.proprietary.contains_key(&prop_key) {
                    return Err(PsbtError::RepeatedPropKey(name, prop_key).into());
                }
                map.proprietary.insert(prop_key, pair.value_data);
            } else if K::STANDARD.contains(&key_type) {
                if key_type.has_key_data() {
                    let submap = map.plural.entry(key_type).or_default();
                    if submap.insert(pair.key_data, pair.value_data).is_some() {
                        return Err(PsbtError::RepeatedKey(name, key_type.to_u8()).into());
                    }
                } else {
                    if !pair.key_data.is_empty() {
                        return Err(PsbtError::NonEmptyKeyData(
                            name,
                            key_type.to_u8(),
                            pair.key_data,
                        )
                        .into());
                    }
                    map.singular.insert(key_type, pair.value_data);
                }
            } else {
                let submap = map.unknown.entry(key_type.to_u8()).or_default();
                if submap.contains_key(&pair.key_data) {
                    return Err(PsbtError::RepeatedUnknownKey(name, key_type.to_u8()).into());
                }
                submap.insert(pair.key_data, pair.value_data);
            }

            next = KeyValue::<K>::decode_next(name, stream)?;
        }

        trace!(
            target: "psbt",
            map = %name,
            singular = map.singular.len(),
            plural = map.plural.len(),
            proprietary = map.proprietary.len(),
            unknown = map.unknown.len(),
            "parsed map"
        );
        Ok(Some(map))
    }

    /// Checks presence of the standard keys against the rules of the given PSBT version.
    pub fn check(&self, version: PsbtVer) -> Result<(), PsbtError> {
        for key_type in self.singular.keys().chain(self.plural.keys()) {
            if version < key_type.present_since() {
                return Err(PsbtError::UnexpectedKey(self.name, key_type.to_u8(), version));
            }
            if matches!(key_type.forbidden_since(), Some(ver) if version >= ver) {
                return Err(PsbtError::ForbiddenKey(self.name, key_type.to_u8(), version));
            }
        }
        for key_type in K::STANDARD {
            let present = match key_type.has_key_data() {
                true => self.plural.contains_key(key_type),
                false => self.singular.contains_key(key_type),
            };
            if key_type.is_required() && key_type.is_allowed(version) && !present {
                return Err(PsbtError::RequiredKeyAbsent(self.name, key_type.to_u8(), version));
            }
        }
        Ok(())
    }
}

/// Key data and value of a single key-value pair, both already serialized.
pub type RawPair = (Vec<u8>, Vec<u8>);

pub trait KeyMap: Sized {
    type Keys: KeyType;
    const PROPRIETARY_TYPE: Self::Keys;

    /// Writes all key-value pairs allowed in the given PSBT version in the canonical order of
    /// their full keys, followed by the map separator.
    fn encode_map(&self, version: PsbtVer, writer: &mut impl Write) -> Result<usize, EncodeError> {
        let mut pairs = BTreeMap::<Vec<u8>, Vec<u8>>::new();

        for key_type in Self::Keys::STANDARD.iter().filter(|kt| kt.is_allowed(version)) {
            for (key_data, value_data) in self.retrieve_key_pair(version, *key_type)? {
                let mut key = vec![key_type.to_u8()];
                key.extend(key_data);
                pairs.insert(key, value_data);
            }
        }

        for (key_type, submap) in self._unknown_map() {
            for (key_data, value_data) in submap {
                let mut key = vec![*key_type];
                key.extend_from_slice(key_data);
                pairs.insert(key, value_data.to_vec());
            }
        }

        for (prop_key, value_data) in self._proprietary_map() {
            let mut key = vec![Self::PROPRIETARY_TYPE.to_u8()];
            key.extend(prop_key.serialize());
            pairs.insert(key, value_data.to_vec());
        }

        let mut counter = 0;
        for (key, value) in &pairs {
            counter += VarInt::with(key.len()).encode(writer)?;
            writer.write_all(key)?;
            counter += VarInt::with(value.len()).encode(writer)?;
            writer.write_all(value)?;
            counter += key.len() + value.len();
        }

        counter += 1;
        writer.write_all(&[0])?;

        trace!(target: "psbt", pairs = pairs.len(), bytes = counter, "encoded map");
        Ok(counter)
    }

    fn parse_map(&mut self, version: PsbtVer, map: Map<Self::Keys>) -> Result<(), PsbtError> {
        map.check(version)?;

        for (k, v) in map.singular {
            self.insert_singular(k, v)?;
        }
        for (k, submap) in map.plural {
            for (d, v) in submap {
                self.insert_plural(k, d, v)?;
            }
        }
        for (p, v) in map.proprietary {
            self.insert_proprietary(p, v);
        }
        for (k, submap) in map.unknown {
            for (d, v) in submap {
                self.insert_unknown(k, d, v);
            }
        }
        Ok(())
    }

    #[doc(hidden)]
    fn _proprietary_map(&self) -> &IndexMap<PropKey, ValueData>;
    #[doc(hidden)]
    fn _proprietary_map_mut(&mut self) -> &mut IndexMap<PropKey, ValueData>;

    fn has_proprietary(&self, key: &PropKey) -> bool { self.proprietary(key).is_some() }
    fn proprietary(&self, key: &PropKey) -> Option<&ValueData> { self._proprietary_map().get(key) }
    fn proprietary_mut(&mut self, key: &PropKey) -> Option<&mut ValueData> {
        self._proprietary_map_mut().get_mut(key)
    }
    fn push_proprietary(
        &mut self,
        key: PropKey,
        value: impl Into<ValueData>,
    ) -> Result<bool, KeyAlreadyPresent> {
        let value = value.into();
        if let Some(existing) = self.proprietary(&key) {
            if &value != existing {
                Err(KeyAlreadyPresent(key))
            } else {
                Ok(false)
            }
        } else {
            self._proprietary_map_mut().insert(key, value);
            Ok(true)
        }
    }
    fn remove_proprietary(&mut self, key: &PropKey) -> Option<ValueData> {
        self._proprietary_map_mut().shift_remove(key)
    }

    #[doc(hidden)]
    fn _unknown_map(&self) -> &IndexMap<u8, IndexMap<KeyData, ValueData>>;
    #[doc(hidden)]
    fn _unknown_map_mut(&mut self) -> &mut IndexMap<u8, IndexMap<KeyData, ValueData>>;

    /// Serializes key data and values of all pairs of a standard key type.
    fn retrieve_key_pair(
        &self,
        version: PsbtVer,
        key_type: Self::Keys,
    ) -> Result<Vec<RawPair>, PsbtError>;

    fn insert_singular(
        &mut self,
        key_type: Self::Keys,
        value_data: ValueData,
    ) -> Result<(), PsbtError>;

    fn insert_plural(
        &mut self,
        key_type: Self::Keys,
        key_data: KeyData,
        value_data: ValueData,
    ) -> Result<(), PsbtError>;

    fn insert_proprietary(&mut self, prop_key: PropKey, value_data: ValueData) {
        self._proprietary_map_mut().insert(prop_key, value_data);
    }

    fn insert_unknown(&mut self, key_type: u8, key_data: KeyData, value_data: ValueData) {
        self._unknown_map_mut().entry(key_type).or_default().insert(key_data, value_data);
    }
}

macro_rules! once {
    ($expr:expr) => {
        vec![(vec![], Encode::serialize(&$expr))]
    };
}
macro_rules! option {
    ($expr:expr) => {
        $expr.iter().map(|e| (vec![], Encode::serialize(e))).collect()
    };
}
macro_rules! iter {
    ($expr:expr) => {
        $expr.iter().map(|(k, v)| (Encode::serialize(k), Encode::serialize(v))).collect()
    };
}

impl KeyMap for Psbt {
    type Keys = GlobalKey;
    const PROPRIETARY_TYPE: Self::Keys = GlobalKey::Proprietary;

    fn _proprietary_map(&self) -> &IndexMap<PropKey, ValueData> { &self.proprietary }
    fn _unknown_map(&self) -> &IndexMap<u8, IndexMap<KeyData, ValueData>> { &self.unknown }
    fn _proprietary_map_mut(&mut self) -> &mut IndexMap<PropKey, ValueData> {
        &mut self.proprietary
    }
    fn _unknown_map_mut(&mut self) -> &mut IndexMap<u8, IndexMap<KeyData, ValueData>> {
        &mut self.unknown
    }

    fn retrieve_key_pair(
        &self,
        version: PsbtVer,
        key_type: Self::Keys,
    ) -> Result<Vec<RawPair>, PsbtError> {
        Ok(match key_type {
            GlobalKey::UnsignedTx => once!(self.to_unsigned_tx()?),
            GlobalKey::Xpub => iter!(self.xpubs),
            GlobalKey::TxVersion => once!(self.tx_version),
            GlobalKey::FallbackLocktime => option!(self.fallback_locktime),
            GlobalKey::InputCount => once!(VarInt::with(self.inputs.len())),
            GlobalKey::OutputCount => once!(VarInt::with(self.outputs.len())),
            GlobalKey::TxModifiable => option!(self.tx_modifiable),
            // Version 0 is implied by the absence of the key
            GlobalKey::Version if version == PsbtVer::V0 => vec![],
            GlobalKey::Version => once!(version),

            GlobalKey::Proprietary | GlobalKey::Unknown(_) => unreachable!(),
        })
    }

    fn insert_singular(
        &mut self,
        key_type: Self::Keys,
        value_data: ValueData,
    ) -> Result<(), PsbtError> {
        match key_type {
            GlobalKey::UnsignedTx => {
                self.reset_from_unsigned_tx(UnsignedTx::deserialize(value_data)?)
            }
            GlobalKey::TxVersion => self.tx_version = TxVer::deserialize(value_data)?,
            GlobalKey::FallbackLocktime => {
                self.fallback_locktime = Some(LockTime::deserialize(value_data)?)
            }
            // Input and output maps are created while they are read from the stream, so the
            // declared counts are only validated here.
            GlobalKey::InputCount | GlobalKey::OutputCount => {
                VarInt::deserialize(value_data)?;
            }
            GlobalKey::TxModifiable => {
                self.tx_modifiable = Some(ModifiableFlags::deserialize(value_data)?)
            }
            GlobalKey::Version => self.version = PsbtVer::deserialize(value_data)?,

            GlobalKey::Xpub => unreachable!(),
            GlobalKey::Proprietary | GlobalKey::Unknown(_) => unreachable!(),
        }
        Ok(())
    }

    fn insert_plural(
        &mut self,
        key_type: Self::Keys,
        key_data: KeyData,
        value_data: ValueData,
    ) -> Result<(), PsbtError> {
        match key_type {
            GlobalKey::Xpub => {
                let xpub = Xpub::deserialize(key_data)?;
                let origin = XkeyOrigin::deserialize(value_data)?;
                self.xpubs.insert(xpub, origin);
            }

            GlobalKey::UnsignedTx
            | GlobalKey::TxVersion
            | GlobalKey::FallbackLocktime
            | GlobalKey::InputCount
            | GlobalKey::OutputCount
            | GlobalKey::TxModifiable
            | GlobalKey::Version => unreachable!(),

            GlobalKey::Proprietary | GlobalKey::Unknown(_) => unreachable!(),
        }
        Ok(())
    }
}

impl KeyMap for Input {
    type Keys = InputKey;
    const PROPRIETARY_TYPE: Self::Keys = InputKey::Proprietary;

    fn _proprietary_map(&self) -> &IndexMap<PropKey, ValueData> { &self.proprietary }
    fn _unknown_map(&self) -> &IndexMap<u8, IndexMap<KeyData, ValueData>> { &self.unknown }
    fn _proprietary_map_mut(&mut self) -> &mut IndexMap<PropKey, ValueData> {
        &mut self.proprietary
    }
    fn _unknown_map_mut(&mut self) -> &mut IndexMap<u8, IndexMap<KeyData, ValueData>> {
        &mut self.unknown
    }

    fn retrieve_key_pair(
        &self,
        _: PsbtVer,
        key_type: Self::Keys,
    ) -> Result<Vec<RawPair>, PsbtError> {
        Ok(match key_type {
            InputKey::NonWitnessUtxo => option!(self.non_witness_tx),
            InputKey::WitnessUtxo => option!(self.witness_utxo),
            InputKey::PartialSig => iter!(self.partial_sigs),
            InputKey::SighashType => option!(self.sighash_type),
            InputKey::RedeemScript => option!(self.redeem_script),
            InputKey::WitnessScript => option!(self.witness_script),
            InputKey::Bip32Derivation => iter!(self.bip32_derivation),
            InputKey::FinalScriptSig => option!(self.final_script_sig),
            InputKey::FinalWitness => option!(self.final_witness),
            InputKey::Ripemd160 => iter!(self.ripemd160),
            InputKey::Sha256 => iter!(self.sha256),
            InputKey::Hash160 => iter!(self.hash160),
            InputKey::Hash256 => iter!(self.hash256),
            InputKey::PreviousTxid => once!(self.previous_outpoint.txid),
            InputKey::OutputIndex => once!(self.previous_outpoint.vout),
            InputKey::Sequence => option!(self.sequence_number),
            InputKey::RequiredTimeLock => option!(self.required_time_lock),
            InputKey::RequiredHeightLock => option!(self.required_height_lock),
            InputKey::TapKeySig => option!(self.tap_key_sig),
            InputKey::TapScriptSig => iter!(self.tap_script_sig),
            InputKey::TapLeafScript => iter!(self.tap_leaf_script),
            InputKey::TapBip32Derivation => iter!(self.tap_bip32_derivation),
            InputKey::TapInternalKey => option!(self.tap_internal_key),
            InputKey::TapMerkleRoot => option!(self.tap_merkle_root),

            InputKey::Proprietary | InputKey::Unknown(_) => unreachable!(),
        })
    }

    fn insert_singular(
        &mut self,
        key_type: Self::Keys,
        value_data: ValueData,
    ) -> Result<(), PsbtError> {
        match key_type {
            InputKey::NonWitnessUtxo => self.non_witness_tx = Some(Tx::deserialize(value_data)?),
            InputKey::WitnessUtxo => self.witness_utxo = Some(TxOut::deserialize(value_data)?),
            InputKey::SighashType => {
                self.sighash_type = Some(SighashType::deserialize(value_data)?)
            }
            InputKey::RedeemScript => {
                self.redeem_script = Some(RedeemScript::deserialize(value_data)?)
            }
            InputKey::WitnessScript => {
                self.witness_script = Some(WitnessScript::deserialize(value_data)?)
            }
            InputKey::FinalScriptSig => {
                self.final_script_sig = Some(SigScript::deserialize(value_data)?)
            }
            InputKey::FinalWitness => self.final_witness = Some(Witness::deserialize(value_data)?),

            InputKey::PreviousTxid => self.previous_outpoint.txid = Txid::deserialize(value_data)?,
            InputKey::OutputIndex => self.previous_outpoint.vout = Vout::deserialize(value_data)?,
            InputKey::Sequence => self.sequence_number = Some(SeqNo::deserialize(value_data)?),
            InputKey::RequiredTimeLock => {
                self.required_time_lock = Some(LockTimestamp::deserialize(value_data)?)
            }
            InputKey::RequiredHeightLock => {
                self.required_height_lock = Some(LockHeight::deserialize(value_data)?)
            }

            InputKey::TapKeySig => self.tap_key_sig = Some(Bip340Sig::deserialize(value_data)?),
            InputKey::TapInternalKey => {
                self.tap_internal_key = Some(InternalPk::deserialize(value_data)?)
            }
            InputKey::TapMerkleRoot => {
                self.tap_merkle_root = Some(TapNodeHash::deserialize(value_data)?)
            }

            InputKey::PartialSig
            | InputKey::Bip32Derivation
            | InputKey::Ripemd160
            | InputKey::Sha256
            | InputKey::Hash160
            | InputKey::Hash256
            | InputKey::TapScriptSig
            | InputKey::TapLeafScript
            | InputKey::TapBip32Derivation => unreachable!(),

            InputKey::Proprietary | InputKey::Unknown(_) => unreachable!(),
        }
        Ok(())
    }

    fn insert_plural(
        &mut self,
        key_type: Self::Keys,
        key_data: KeyData,
        value_data: ValueData,
    ) -> Result<(), PsbtError> {
        match key_type {
            InputKey::NonWitnessUtxo
            | InputKey::WitnessUtxo
            | InputKey::SighashType
            | InputKey::RedeemScript
            | InputKey::WitnessScript
            | InputKey::FinalScriptSig
            | InputKey::FinalWitness
            | InputKey::TapKeySig
            | InputKey::TapInternalKey
            | InputKey::TapMerkleRoot => unreachable!(),

            InputKey::PreviousTxid
            | InputKey::OutputIndex
            | InputKey::Sequence
            | InputKey::RequiredTimeLock
            | InputKey::RequiredHeightLock => unreachable!(),

            InputKey::PartialSig => {
                let pk = LegacyPk::deserialize(key_data)?;
                let sig = LegacySig::deserialize(value_data)?;
                self.partial_sigs.insert(pk, sig);
            }
            InputKey::Bip32Derivation => {
                let pk = LegacyPk::deserialize(key_data)?;
                let origin = KeyOrigin::deserialize(value_data)?;
                self.bip32_derivation.insert(pk, origin);
            }
            InputKey::Ripemd160 => {
                let hash = Bytes20::deserialize(key_data)?;
                let preimage_hash = ripemd160::Hash::hash(&value_data);
                check_preimage(key_type, &hash.to_byte_array(), preimage_hash.as_byte_array())?;
                self.ripemd160.insert(hash, value_data.into_inner());
            }
            InputKey::Sha256 => {
                let hash = Bytes32::deserialize(key_data)?;
                let preimage_hash = sha256::Hash::hash(&value_data);
                check_preimage(key_type, &hash.to_byte_array(), preimage_hash.as_byte_array())?;
                self.sha256.insert(hash, value_data.into_inner());
            }
            InputKey::Hash160 => {
                let hash = Bytes20::deserialize(key_data)?;
                let preimage_hash = hash160::Hash::hash(&value_data);
                check_preimage(key_type, &hash.to_byte_array(), preimage_hash.as_byte_array())?;
                self.hash160.insert(hash, value_data.into_inner());
            }
            InputKey::Hash256 => {
                let hash = Bytes32::deserialize(key_data)?;
                let preimage_hash = sha256d::Hash::hash(&value_data);
                check_preimage(key_type, &hash.to_byte_array(), preimage_hash.as_byte_array())?;
                self.hash256.insert(hash, value_data.into_inner());
            }
            InputKey::TapScriptSig => {
                let (internal_pk, leaf_hash) = <(XOnlyPk, TapLeafHash)>::deserialize(key_data)?;
                let sig = Bip340Sig::deserialize(value_data)?;
                self.tap_script_sig.insert((internal_pk, leaf_hash), sig);
            }
            InputKey::TapLeafScript => {
                let control_block = ControlBlock::deserialize(key_data)?;
                let leaf_script = LeafScript::deserialize(value_data)?;
                self.tap_leaf_script.insert(control_block, leaf_script);
            }
            InputKey::TapBip32Derivation => {
                let pk = XOnlyPk::deserialize(key_data)?;
                let derivation = TapDerivation::deserialize(value_data)?;
                self.tap_bip32_derivation.insert(pk, derivation);
            }

            InputKey::Proprietary | InputKey::Unknown(_) => unreachable!(),
        }
        Ok(())
    }
}

fn check_preimage(
    key_type: InputKey,
    hash: &[u8],
    preimage_hash: &[u8],
) -> Result<(), PsbtError> {
    if hash != preimage_hash {
        return Err(PsbtError::InvalidPreimage(key_type));
    }
    Ok(())
}

impl KeyMap for Output {
    type Keys = OutputKey;
    const PROPRIETARY_TYPE: Self::Keys = OutputKey::Proprietary;

    fn _proprietary_map(&self) -> &IndexMap<PropKey, ValueData> { &self.proprietary }
    fn _proprietary_map_mut(&mut self) -> &mut IndexMap<PropKey, ValueData> {
        &mut self.proprietary
    }

    fn _unknown_map(&self) -> &IndexMap<u8, IndexMap<KeyData, ValueData>> { &self.unknown }
    fn _unknown_map_mut(&mut self) -> &mut IndexMap<u8, IndexMap<KeyData, ValueData>> {
        &mut self.unknown
    }

    fn retrieve_key_pair(
        &self,
        _: PsbtVer,
        key_type: Self::Keys,
    ) -> Result<Vec<RawPair>, PsbtError> {
        Ok(match key_type {
            OutputKey::RedeemScript => option!(self.redeem_script),
            OutputKey::WitnessScript => option!(self.witness_script),
            OutputKey::Bip32Derivation => iter!(self.bip32_derivation),
            OutputKey::Amount => once!(self.amount),
            OutputKey::Script => once!(self.script),
            OutputKey::TapInternalKey => option!(self.tap_internal_key),
            OutputKey::TapTree => option!(self.tap_tree),
            OutputKey::TapBip32Derivation => iter!(self.tap_bip32_derivation),

            OutputKey::Proprietary | OutputKey::Unknown(_) => unreachable!(),
        })
    }

    fn insert_singular(
        &mut self,
        key_type: Self::Keys,
        value_data: ValueData,
    ) -> Result<(), PsbtError> {
        match key_type {
            OutputKey::RedeemScript => {
                self.redeem_script = Some(RedeemScript::deserialize(value_data)?)
            }
            OutputKey::WitnessScript => {
                self.witness_script = Some(WitnessScript::deserialize(value_data)?)
            }
            OutputKey::Amount => self.amount = Sats::deserialize(value_data)?,
            OutputKey::Script => self.script = ScriptPubkey::deserialize(value_data)?,
            OutputKey::TapInternalKey => {
                self.tap_internal_key = Some(InternalPk::deserialize(value_data)?)
            }
            OutputKey::TapTree => self.tap_tree = Some(TapTree::deserialize(value_data)?),

            OutputKey::Bip32Derivation | OutputKey::TapBip32Derivation => unreachable!(),

            OutputKey::Proprietary | OutputKey::Unknown(_) => unreachable!(),
        }
        Ok(())
    }

    fn insert_plural(
        &mut self,
        key_type: Self::Keys,
        key_data: KeyData,
        value_data: ValueData,
    ) -> Result<(), PsbtError> {
        match key_type {
            OutputKey::RedeemScript
            | OutputKey::WitnessScript
            | OutputKey::Amount
            | OutputKey::Script
            | OutputKey::TapInternalKey
            | OutputKey::TapTree => unreachable!(),

            OutputKey::Bip32Derivation => {
                let pk = LegacyPk::deserialize(key_data)?;
                let origin = KeyOrigin::deserialize(value_data)?;
                self.bip32_derivation.insert(pk, origin);
            }
            OutputKey::TapBip32Derivation => {
                let pk = XOnlyPk::deserialize(key_data)?;
                let derivation = TapDerivation::deserialize(value_data)?;
                self.tap_bip32_derivation.insert(pk, derivation);
            }

            OutputKey::Proprietary | OutputKey::Unknown(_) => unreachable!(),
        }
        Ok(())
    }
}
