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


use std::io::{self, Cursor, Read, Write};

use amplify::num::u7;
use amplify::{ByteArray, Bytes, IoError, Wrapper};
use bc::secp256k1::{ecdsa, schnorr, PublicKey};
use derive::{
    Bip340Sig, ByteStr, ConsensusDataError, ConsensusDecode, ConsensusDecodeError,
    ConsensusEncode, ControlBlock, DerivationIndex, DerivationPath, HardenedIndex, Idx, IdxBase,
    InternalPk, InvalidTree, KeyOrigin, LeafInfo, LeafScript, LeafVer, LegacyPk, LegacySig,
    LockHeight, LockTime, LockTimestamp, NormalIndex, Outpoint, RedeemScript, Sats, ScriptBytes,
    ScriptPubkey, SeqNo, SigScript, SighashType, TapDerivation, TapLeafHash, TapNodeHash, TapTree,
    Tx, TxOut, TxVer, Txid, VarInt, Vout, Witness, WitnessScript, XOnlyPk, XkeyDecodeError,
    XkeyOrigin, Xpub, XpubFp, HARDENED_INDEX_BOUNDARY,
};
use tracing::{debug, trace};

use crate::keys::KeyValue;
use crate::{
    GlobalKey, Input, InputKey, KeyData, KeyMap, KeyPair, KeyType, LockTimeConflict, Map, MapName,
    ModifiableFlags, Output, OutputKey, PropKey, Psbt, PsbtUnsupportedVer, PsbtVer, UnsignedTx,
    UnsignedTxIn, ValueData,
};

/// Maximal size of serialized PSBT accepted by the decoder.
pub const MAX_PSBT_SIZE: usize = 100_000_000;

#[derive(Clone, PartialEq, Eq, Debug, Display, Error, From)]
#[display(inner)]
pub enum DecodeError {
    #[from]
    #[from(io::Error)]
    Io(IoError),

    #[from]
    #[from(ConsensusDataError)]
    #[from(PsbtUnsupportedVer)]
    #[from(XkeyDecodeError)]
    #[from(InvalidTree)]
    Psbt(PsbtError),
}

impl From<ConsensusDecodeError> for DecodeError {
    fn from(e: ConsensusDecodeError) -> Self {
        match e {
            ConsensusDecodeError::Io(e) => DecodeError::Io(e),
            ConsensusDecodeError::Data(data) => data.into(),
        }
    }
}

#[derive(Clone, PartialEq, Eq, Debug, Display, Error, From)]
#[display(inner)]
pub enum EncodeError {
    #[from]
    #[from(io::Error)]
    Io(IoError),

    #[from]
    #[from(LockTimeConflict)]
    Psbt(PsbtError),
}

#[derive(Clone, PartialEq, Eq, Debug, Display, Error, From)]
#[display(doc_comments)]
pub enum PsbtError {
    /// unexpected end of data.
    UnexpectedEod,

    /// extra data after PSBT.
    DataNotConsumed,

    /// PSBT of {0} bytes exceeds maximal allowed size.
    OversizedPsbt(usize),

    /// PSBT field length {0} exceeds maximal allowed size.
    OversizedField(u64),

    /// invalid magic bytes {0}.
    InvalidMagic(Bytes<5>),

    /// length prefix uses non-minimal variable integer encoding.
    NonMinimalVarInt,

    /// {0} map is not terminated with a separator.
    NoSeparator(MapName),

    /// PSBT declares {declared} inputs, but only {found} input maps are present.
    InputCountMismatch { declared: usize, found: usize },

    /// PSBT declares {declared} outputs, but only {found} output maps are present.
    OutputCountMismatch { declared: usize, found: usize },

    /// {0} key {1:#04x} must not be present in PSBT {2}.
    UnexpectedKey(MapName, u8, PsbtVer),

    /// {0} key {1:#04x} is not allowed in PSBT {2} anymore.
    ForbiddenKey(MapName, u8, PsbtVer),

    /// {0} key {1:#04x} required for PSBT {2} is not present.
    RequiredKeyAbsent(MapName, u8, PsbtVer),

    /// repeated {0} key {1:#04x}.
    RepeatedKey(MapName, u8),

    /// repeated {0} proprietary key {1}.
    RepeatedPropKey(MapName, PropKey),

    /// repeated {0} unknown key {1:#04x}.
    RepeatedUnknownKey(MapName, u8),

    /// {0} key {1:#04x} must not contain additional key data.
    NonEmptyKeyData(MapName, u8, KeyData),

    /// PSBT version 1 doesn't exist.
    NoVersion1,

    #[from]
    #[display(inner)]
    UnsupportedVersion(PsbtUnsupportedVer),

    /// unsigned transaction must not contain signature scripts or witnesses.
    UnsignedTxHasScriptSigs,

    /// non-witness UTXO of input {0} doesn't match its previous outpoint.
    NonWitnessUtxoMismatch(usize),

    /// input {0} has zero previous transaction id.
    NullPrevTxid(usize),

    /// invalid lock height value {0}.
    InvalidLockHeight(u32),

    /// invalid lock timestamp {0}.
    InvalidLockTimestamp(u32),

    /// key origin data of {0} bytes must contain fingerprint followed by 32-bit indexes.
    InvalidKeyOrigin(usize),

    /// one of xpubs has an unhardened derivation index.
    XpubUnhardenedOrigin,

    /// {0} preimage doesn't match its hash.
    InvalidPreimage(InputKey),

    /// proprietary key identifier is not a valid UTF-8 string.
    InvalidPropIdentifier,

    /// invalid public key data.
    InvalidPubkey(ByteStr),

    #[from]
    #[display(inner)]
    InvalidXpub(XkeyDecodeError),

    /// empty signature data.
    EmptySig,

    /// invalid signature data.
    InvalidSig(ByteStr),

    /// invalid tap leaf version {0:#04x}.
    InvalidLeafVer(u8),

    /// tap tree leaf depth {0} exceeds taproot limits.
    InvalidTapTreeDepth(u8),

    #[from]
    #[display(inner)]
    InvalidTapTree(InvalidTree),

    #[from]
    #[display(inner)]
    LockTime(LockTimeConflict),

    #[from]
    #[display(inner)]
    Consensus(ConsensusDataError),
}

impl From<DecodeError> for PsbtError {
    fn from(err: DecodeError) -> Self {
        match err {
            DecodeError::Psbt(e) => e,
            DecodeError::Io(_) => PsbtError::UnexpectedEod,
        }
    }
}

pub trait Encode {
    fn encode(&self, writer: &mut impl Write) -> Result<usize, IoError>;

    fn serialize(&self) -> Vec<u8> {
        let mut vec = Vec::new();
        self.encode(&mut vec).expect("in-memory encoding can't error");
        vec
    }
}

impl<T: Encode> Encode for &T {
    fn encode(&self, writer: &mut impl Write) -> Result<usize, IoError> { (*self).encode(writer) }
}

pub trait Decode
where Self: Sized
{
    fn decode(reader: &mut impl Read) -> Result<Self, DecodeError>;
    fn deserialize(bytes: impl AsRef<[u8]>) -> Result<Self, PsbtError> {
        let bytes = bytes.as_ref();
        let mut cursor = Cursor::new(bytes);
        let me = Self::decode(&mut cursor)?;
        if cursor.position() != bytes.len() as u64 {
            return Err(PsbtError::DataNotConsumed);
        }
        Ok(me)
    }
}

/// Detects zero transaction id, which can't be a valid reference to a previous transaction.
pub(crate) fn is_null_txid(txid: Txid) -> bool { txid == Outpoint::coinbase().txid }

impl Psbt {
    const MAGIC: [u8; 5] = *b"psbt\xFF";

    /// Writes PSBT in the given version.
    ///
    /// Fields which are not allowed in the requested version are omitted.
    pub fn encode(&self, version: PsbtVer, writer: &mut impl Write) -> Result<usize, EncodeError> {
        self.check_encodable(version)?;

        let mut counter = Self::MAGIC.len();
        writer.write_all(&Self::MAGIC)?;

        counter += self.encode_map(version, writer)?;

        for input in &self.inputs {
            counter += input.encode_map(version, writer)?;
        }

        for output in &self.outputs {
            counter += output.encode_map(version, writer)?;
        }

        debug!(
            target: "psbt",
            version = %version,
            inputs = self.inputs.len(),
            outputs = self.outputs.len(),
            bytes = counter,
            "encoded PSBT"
        );
        Ok(counter)
    }

    pub fn serialize(&self, version: PsbtVer) -> Result<Vec<u8>, PsbtError> {
        let mut vec = Vec::new();
        match self.encode(version, &mut vec) {
            Ok(_) => Ok(vec),
            Err(EncodeError::Psbt(err)) => Err(err),
            Err(EncodeError::Io(_)) => unreachable!("in-memory encoding can't error"),
        }
    }

    fn check_encodable(&self, version: PsbtVer) -> Result<(), PsbtError> {
        if version >= PsbtVer::V2 {
            let mut inputs = self.inputs();
            if let Some(input) = inputs.find(|input| is_null_txid(input.previous_outpoint.txid)) {
                return Err(PsbtError::NullPrevTxid(input.index()));
            }
        }
        Ok(())
    }

    pub fn decode(reader: &mut impl Read) -> Result<Self, DecodeError> {
        let mut magic = Self::MAGIC;
        reader.read_exact(&mut magic)?;
        if magic != Self::MAGIC {
            return Err(PsbtError::InvalidMagic(magic.into()).into());
        }

        let map = Map::<GlobalKey>::parse(MapName::Global, reader)?
            .ok_or(PsbtError::UnexpectedEod)?;
        let version = map
            .singular
            .get(&GlobalKey::Version)
            .map(PsbtVer::deserialize)
            .transpose()?
            .unwrap_or(PsbtVer::V0);
        let input_count = declared_count(&map, GlobalKey::InputCount)?;
        let output_count = declared_count(&map, GlobalKey::OutputCount)?;

        let mut psbt = Psbt::blank(version);
        psbt.parse_map(version, map)?;
        let input_count = input_count.unwrap_or(psbt.inputs.len());
        let output_count = output_count.unwrap_or(psbt.outputs.len());

        for index in 0..input_count {
            let map = Map::<InputKey>::parse(MapName::Input, reader)?.ok_or(
                PsbtError::InputCountMismatch {
                    declared: input_count,
                    found: index,
                },
            )?;
            if index == psbt.inputs.len() {
                psbt.inputs.push(Input::new(index));
            }
            let input = &mut psbt.inputs[index];
            input.parse_map(version, map)?;
            input.check_references(version)?;
        }

        for index in 0..output_count {
            let map = Map::<OutputKey>::parse(MapName::Output, reader)?.ok_or(
                PsbtError::OutputCountMismatch {
                    declared: output_count,
                    found: index,
                },
            )?;
            if index == psbt.outputs.len() {
                psbt.outputs.push(Output::new(index));
            }
            psbt.outputs[index].parse_map(version, map)?;
        }

        debug!(
            target: "psbt",
            version = %version,
            inputs = input_count,
            outputs = output_count,
            "decoded PSBT"
        );
        Ok(psbt)
    }

    pub fn deserialize(data: impl AsRef<[u8]>) -> Result<Self, PsbtError> {
        let data = data.as_ref();
        if data.len() > MAX_PSBT_SIZE {
            return Err(PsbtError::OversizedPsbt(data.len()));
        }
        let mut cursor = Cursor::new(data);
        let psbt = Self::decode(&mut cursor)?;
        if cursor.position() != data.len() as u64 {
            return Err(PsbtError::DataNotConsumed);
        }
        Ok(psbt)
    }
}

fn declared_count(map: &Map<GlobalKey>, key: GlobalKey) -> Result<Option<usize>, PsbtError> {
    map.singular
        .get(&key)
        .map(|data| VarInt::deserialize(data).map(|count| count.to_usize()))
        .transpose()
}

impl Input {
    fn check_references(&self, version: PsbtVer) -> Result<(), PsbtError> {
        if let Some(tx) = &self.non_witness_tx {
            if tx.txid() != self.previous_outpoint.txid
                || tx.outputs.len() <= self.previous_outpoint.vout.into_u32() as usize
            {
                return Err(PsbtError::NonWitnessUtxoMismatch(self.index));
            }
        }
        if version >= PsbtVer::V2 && is_null_txid(self.previous_outpoint.txid) {
            return Err(PsbtError::NullPrevTxid(self.index));
        }
        Ok(())
    }
}

fn read_bytes(reader: &mut impl Read, len: u64) -> Result<Vec<u8>, DecodeError> {
    if len > MAX_PSBT_SIZE as u64 {
        return Err(PsbtError::OversizedField(len).into());
    }
    let mut buf = Vec::new();
    reader.by_ref().take(len).read_to_end(&mut buf)?;
    if buf.len() as u64 != len {
        return Err(io::Error::from(io::ErrorKind::UnexpectedEof).into());
    }
    Ok(buf)
}

/// Reads the rest of a compact size integer when its first byte is already consumed.
fn read_varint_tail(head: u8, reader: &mut impl Read) -> Result<u64, DecodeError> {
    let (value, min) = match head {
        0xFF => (u64::from_le_bytes(<[u8; 8]>::decode(reader)?), 0x1_0000_0000),
        0xFE => (u32::from_le_bytes(<[u8; 4]>::decode(reader)?) as u64, 0x1_0000),
        0xFD => (u16::from_le_bytes(<[u8; 2]>::decode(reader)?) as u64, 0xFD),
        small => return Ok(small as u64),
    };
    if value < min {
        return Err(PsbtError::NonMinimalVarInt.into());
    }
    Ok(value)
}

impl<T: KeyType> KeyValue<T> {
    /// Reads the next key-value pair or a map separator.
    pub(crate) fn decode_next(name: MapName, reader: &mut impl Read) -> Result<Self, DecodeError> {
        let mut head = [0u8; 1];
        match reader.read_exact(&mut head) {
            Err(err) if err.kind() == io::ErrorKind::UnexpectedEof => {
                Err(PsbtError::NoSeparator(name).into())
            }
            Err(err) => Err(err.into()),
            Ok(()) => Self::decode_with_head(head[0], reader),
        }
    }

    /// Reads key-value pair when the first byte of the key length is already consumed.
    pub(crate) fn decode_with_head(head: u8, reader: &mut impl Read) -> Result<Self, DecodeError> {
        let key_len = read_varint_tail(head, reader)?;
        if key_len == 0 {
            return Ok(KeyValue::Separator);
        }

        let key_type = T::decode(reader)?;
        let key_data = read_bytes(reader, key_len - 1)?;

        let value_len = VarInt::decode(reader)?.to_u64();
        let value_data = read_bytes(reader, value_len)?;

        trace!(target: "psbt", key = %key_type, key_len, value_len, "read pair");
        Ok(KeyValue::Pair(KeyPair {
            key_type,
            key_data: KeyData::from(key_data),
            value_data: ValueData::from(value_data),
        }))
    }
}

macro_rules! psbt_code_key_type {
    ($ty:ty) => {
        impl Encode for $ty {
            fn encode(&self, writer: &mut impl Write) -> Result<usize, IoError> {
                self.to_u8().encode(writer)
            }
        }

        impl Decode for $ty {
            fn decode(reader: &mut impl Read) -> Result<Self, DecodeError> {
                u8::decode(reader).map(Self::from_u8)
            }
        }
    };
}

psbt_code_key_type!(GlobalKey);
psbt_code_key_type!(InputKey);
psbt_code_key_type!(OutputKey);

impl Encode for PropKey {
    fn encode(&self, writer: &mut impl Write) -> Result<usize, IoError> {
        let mut counter = self.identifier.len();
        let len = VarInt::with(counter);
        counter += len.encode(writer)?;

        writer.write_all(self.identifier.as_bytes())?;
        counter += VarInt::new(self.subtype).encode(writer)?;
        counter += self.data.len();
        writer.write_all(&self.data)?;

        Ok(counter)
    }
}

impl Decode for PropKey {
    fn decode(reader: &mut impl Read) -> Result<Self, DecodeError> {
        let len = VarInt::decode(reader)?.to_u64();
        let identifier = read_bytes(reader, len)?;
        let identifier =
            String::from_utf8(identifier).map_err(|_| PsbtError::InvalidPropIdentifier)?;

        let subtype = VarInt::decode(reader)?.to_u64();

        let mut data = Vec::<u8>::new();
        reader.read_to_end(&mut data)?;

        Ok(PropKey {
            identifier,
            subtype,
            data,
        })
    }
}

impl Encode for ModifiableFlags {
    fn encode(&self, writer: &mut impl Write) -> Result<usize, IoError> {
        self.to_standard_u8().encode(writer)
    }
}

impl Decode for ModifiableFlags {
    fn decode(reader: &mut impl Read) -> Result<Self, DecodeError> {
        let val = u8::decode(reader)?;
        Ok(Self::from_standard_u8(val))
    }
}

impl Encode for PsbtVer {
    fn encode(&self, writer: &mut impl Write) -> Result<usize, IoError> {
        self.to_standard_u32().encode(writer)
    }
}

impl Decode for PsbtVer {
    fn decode(reader: &mut impl Read) -> Result<Self, DecodeError> {
        match u32::decode(reader)? {
            1 => Err(PsbtError::NoVersion1.into()),
            ver => PsbtVer::try_from_standard_u32(ver).map_err(DecodeError::from),
        }
    }
}

// Unsigned transaction always uses pre-segwit serialization, which allows zero inputs
impl Encode for UnsignedTx {
    fn encode(&self, writer: &mut impl Write) -> Result<usize, IoError> {
        let mut counter = self.version.encode(writer)?;
        counter += VarInt::with(self.inputs.len()).encode(writer)?;
        for txin in &self.inputs {
            counter += txin.prev_output.txid.encode(writer)?;
            counter += txin.prev_output.vout.encode(writer)?;
            counter += 0u8.encode(writer)?;
            counter += txin.sequence.encode(writer)?;
        }
        counter += VarInt::with(self.outputs.len()).encode(writer)?;
        for txout in &self.outputs {
            counter += txout.encode(writer)?;
        }
        counter += self.lock_time.encode(writer)?;
        Ok(counter)
    }
}

impl Decode for UnsignedTx {
    fn decode(reader: &mut impl Read) -> Result<Self, DecodeError> {
        let version = TxVer::decode(reader)?;

        let input_count = VarInt::decode(reader)?.to_u64();
        let mut inputs = Vec::new();
        for _ in 0..input_count {
            let txid = Txid::decode(reader)?;
            let vout = Vout::decode(reader)?;
            let sig_script = SigScript::consensus_decode(reader)?;
            if !sig_script.is_empty() {
                return Err(PsbtError::UnsignedTxHasScriptSigs.into());
            }
            inputs.push(UnsignedTxIn {
                prev_output: Outpoint::new(txid, vout),
                sequence: SeqNo::decode(reader)?,
            });
        }

        let output_count = VarInt::decode(reader)?.to_u64();
        let mut outputs = Vec::new();
        for _ in 0..output_count {
            outputs.push(TxOut::decode(reader)?);
        }

        Ok(UnsignedTx {
            version,
            inputs,
            outputs,
            lock_time: LockTime::decode(reader)?,
        })
    }
}

impl Encode for Xpub {
    fn encode(&self, writer: &mut impl Write) -> Result<usize, IoError> {
        let data = self.encode();
        writer.write_all(&data)?;
        Ok(data.len())
    }
}

impl Decode for Xpub {
    fn decode(reader: &mut impl Read) -> Result<Self, DecodeError> {
        let mut buf = Vec::with_capacity(78);
        reader.read_to_end(&mut buf)?;
        Xpub::decode(buf).map_err(DecodeError::from)
    }
}

fn read_origin(reader: &mut impl Read) -> Result<(XpubFp, Vec<u32>), DecodeError> {
    let mut data = Vec::new();
    reader.read_to_end(&mut data)?;
    if data.len() < 4 || data.len() % 4 != 0 {
        return Err(PsbtError::InvalidKeyOrigin(data.len()).into());
    }
    let master_fp = XpubFp::from([data[0], data[1], data[2], data[3]]);
    let indexes = data[4..]
        .chunks_exact(4)
        .map(|chunk| u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect();
    Ok((master_fp, indexes))
}

fn write_origin(
    master_fp: XpubFp,
    indexes: impl IntoIterator<Item = u32>,
    writer: &mut impl Write,
) -> Result<usize, IoError> {
    let mut counter = <[u8; 4]>::from(master_fp).encode(writer)?;
    for index in indexes {
        counter += index.encode(writer)?;
    }
    Ok(counter)
}

impl Encode for XkeyOrigin {
    fn encode(&self, writer: &mut impl Write) -> Result<usize, IoError> {
        write_origin(self.master_fp(), self.derivation().iter().map(HardenedIndex::index), writer)
    }
}

impl Decode for XkeyOrigin {
    fn decode(reader: &mut impl Read) -> Result<Self, DecodeError> {
        let (master_fp, indexes) = read_origin(reader)?;
        let mut derivation = DerivationPath::<HardenedIndex>::new();
        for index in indexes {
            if index < HARDENED_INDEX_BOUNDARY {
                return Err(PsbtError::XpubUnhardenedOrigin.into());
            }
            derivation.push(
                HardenedIndex::try_from_index(index)
                    .map_err(|_| PsbtError::XpubUnhardenedOrigin)?,
            );
        }
        Ok(XkeyOrigin::new(master_fp, derivation))
    }
}

impl Encode for KeyOrigin {
    fn encode(&self, writer: &mut impl Write) -> Result<usize, IoError> {
        write_origin(self.master_fp(), self.derivation().iter().map(DerivationIndex::index), writer)
    }
}

impl Decode for KeyOrigin {
    fn decode(reader: &mut impl Read) -> Result<Self, DecodeError> {
        let (master_fp, indexes) = read_origin(reader)?;
        let len = 4 + indexes.len() * 4;
        let derivation = indexes
            .into_iter()
            .map(|index| {
                if index >= HARDENED_INDEX_BOUNDARY {
                    HardenedIndex::try_from_index(index).map(DerivationIndex::Hardened)
                } else {
                    NormalIndex::try_from_index(index).map(DerivationIndex::Normal)
                }
            })
            .collect::<Result<DerivationPath, _>>()
            .map_err(|_| PsbtError::InvalidKeyOrigin(len))?;
        Ok(KeyOrigin::new(master_fp, derivation))
    }
}

fn invalid_pubkey(data: impl Into<Vec<u8>>) -> DecodeError {
    PsbtError::InvalidPubkey(ByteStr::from(data.into())).into()
}

impl Encode for LegacyPk {
    fn encode(&self, writer: &mut impl Write) -> Result<usize, IoError> {
        if self.compressed {
            self.pubkey.serialize().encode(writer)
        } else {
            self.pubkey.serialize_uncompressed().encode(writer)
        }
    }
}

impl Decode for LegacyPk {
    fn decode(reader: &mut impl Read) -> Result<Self, DecodeError> {
        let mut buf = Vec::with_capacity(65);
        reader.read_to_end(&mut buf)?;
        let compressed = match buf.len() {
            33 => true,
            65 => false,
            _ => return Err(invalid_pubkey(buf)),
        };
        let pubkey = PublicKey::from_slice(&buf).map_err(|_| invalid_pubkey(buf.clone()))?;
        Ok(LegacyPk { compressed, pubkey })
    }
}

impl Encode for XOnlyPk {
    fn encode(&self, writer: &mut impl Write) -> Result<usize, IoError> {
        self.to_byte_array().encode(writer)
    }
}

impl Decode for XOnlyPk {
    fn decode(reader: &mut impl Read) -> Result<Self, DecodeError> {
        let buf = <[u8; 32]>::decode(reader)?;
        XOnlyPk::from_byte_array(buf).map_err(|_| invalid_pubkey(buf))
    }
}

impl Encode for InternalPk {
    fn encode(&self, writer: &mut impl Write) -> Result<usize, IoError> {
        self.to_byte_array().encode(writer)
    }
}

impl Decode for InternalPk {
    fn decode(reader: &mut impl Read) -> Result<Self, DecodeError> {
        XOnlyPk::decode(reader).map(InternalPk::from_unchecked)
    }
}

fn invalid_sig(data: impl Into<Vec<u8>>) -> DecodeError {
    PsbtError::InvalidSig(ByteStr::from(data.into())).into()
}

impl Encode for LegacySig {
    fn encode(&self, writer: &mut impl Write) -> Result<usize, IoError> {
        let der = self.sig.serialize_der();
        writer.write_all(&der)?;
        let sighash = self.sighash_type.to_consensus_u32() as u8;
        Ok(der.len() + sighash.encode(writer)?)
    }
}

impl Decode for LegacySig {
    fn decode(reader: &mut impl Read) -> Result<Self, DecodeError> {
        let mut buf = Vec::with_capacity(73);
        reader.read_to_end(&mut buf)?;
        let (sighash, der) = buf.split_last().ok_or(PsbtError::EmptySig)?;
        let sig = ecdsa::Signature::from_der(der).map_err(|_| invalid_sig(der))?;
        let sighash_type = SighashType::from_consensus_u32(*sighash as u32);
        Ok(LegacySig { sig, sighash_type })
    }
}

impl Encode for SighashType {
    fn encode(&self, writer: &mut impl Write) -> Result<usize, IoError> {
        self.to_consensus_u32().encode(writer)
    }
}

impl Decode for SighashType {
    fn decode(reader: &mut impl Read) -> Result<Self, DecodeError> {
        u32::decode(reader).map(Self::from_consensus_u32)
    }
}

impl Encode for Bip340Sig {
    fn encode(&self, writer: &mut impl Write) -> Result<usize, IoError> {
        let mut counter = self.sig.serialize().encode(writer)?;
        if let Some(sighash_type) = self.sighash_type {
            counter += (sighash_type.to_consensus_u32() as u8).encode(writer)?;
        }
        Ok(counter)
    }
}

impl Decode for Bip340Sig {
    fn decode(reader: &mut impl Read) -> Result<Self, DecodeError> {
        let mut buf = Vec::with_capacity(65);
        reader.read_to_end(&mut buf)?;
        let sighash_type = match buf.len() {
            0 => return Err(PsbtError::EmptySig.into()),
            64 => None,
            65 => Some(SighashType::from_consensus_u32(buf[64] as u32)),
            _ => return Err(invalid_sig(buf)),
        };
        let sig = schnorr::Signature::from_slice(&buf[..64]).map_err(|_| invalid_sig(&buf[..]))?;
        Ok(Bip340Sig { sig, sighash_type })
    }
}

impl Encode for LeafScript {
    fn encode(&self, writer: &mut impl Write) -> Result<usize, IoError> {
        writer.write_all(self.script.as_slice())?;
        let counter = self.script.len();
        Ok(counter + self.version.to_consensus_u8().encode(writer)?)
    }
}

impl Decode for LeafScript {
    fn decode(reader: &mut impl Read) -> Result<Self, DecodeError> {
        let mut buf = Vec::new();
        reader.read_to_end(&mut buf)?;
        let version = buf.pop().ok_or(PsbtError::UnexpectedEod)?;
        let version =
            LeafVer::from_consensus_u8(version).map_err(|_| PsbtError::InvalidLeafVer(version))?;
        Ok(LeafScript {
            version,
            script: script_bytes(buf)?,
        })
    }
}

impl Encode for TapDerivation {
    fn encode(&self, writer: &mut impl Write) -> Result<usize, IoError> {
        let mut counter = VarInt::with(self.leaf_hashes.len()).encode(writer)?;
        for leaf_hash in &self.leaf_hashes {
            counter += leaf_hash.encode(writer)?;
        }
        counter += self.origin.encode(writer)?;
        Ok(counter)
    }
}

impl Decode for TapDerivation {
    fn decode(reader: &mut impl Read) -> Result<Self, DecodeError> {
        let count = VarInt::decode(reader)?.to_u64();
        let mut leaf_hashes = Vec::new();
        for _ in 0..count {
            leaf_hashes.push(TapLeafHash::decode(reader)?);
        }
        let origin = KeyOrigin::decode(reader)?;
        Ok(TapDerivation {
            leaf_hashes,
            origin,
        })
    }
}

impl Encode for TapTree {
    fn encode(&self, writer: &mut impl Write) -> Result<usize, IoError> {
        let mut counter = 0;
        for leaf in self {
            counter += leaf.depth.to_u8().encode(writer)?;
            counter += leaf.script.version.to_consensus_u8().encode(writer)?;
            counter += leaf.script.script.consensus_encode(writer)?;
        }
        Ok(counter)
    }
}

impl Decode for TapTree {
    fn decode(reader: &mut impl Read) -> Result<Self, DecodeError> {
        let mut leaves = Vec::new();
        let mut depth = [0u8; 1];
        while reader.read(&mut depth)? == 1 {
            let depth =
                u7::try_from(depth[0]).map_err(|_| PsbtError::InvalidTapTreeDepth(depth[0]))?;
            let version = u8::decode(reader)?;
            let version = LeafVer::from_consensus_u8(version)
                .map_err(|_| PsbtError::InvalidLeafVer(version))?;
            let script = ScriptBytes::consensus_decode(reader)?;
            leaves.push(LeafInfo {
                depth,
                script: LeafScript { version, script },
            });
        }
        TapTree::from_leaves(leaves).map_err(DecodeError::from)
    }
}

macro_rules! psbt_code_hash {
    ($ty:ty) => {
        impl Encode for $ty {
            fn encode(&self, writer: &mut impl Write) -> Result<usize, IoError> {
                self.to_byte_array().encode(writer)
            }
        }

        impl Decode for $ty {
            fn decode(reader: &mut impl Read) -> Result<Self, DecodeError> {
                <[u8; 32]>::decode(reader).map(Self::from)
            }
        }
    };
}

psbt_code_hash!(TapLeafHash);
psbt_code_hash!(TapNodeHash);

impl Encode for LockTimestamp {
    fn encode(&self, writer: &mut impl Write) -> Result<usize, IoError> {
        self.to_consensus_u32().encode(writer)
    }
}

impl Decode for LockTimestamp {
    fn decode(reader: &mut impl Read) -> Result<Self, DecodeError> {
        let val = u32::decode(reader)?;
        Self::try_from_consensus_u32(val).map_err(|_| PsbtError::InvalidLockTimestamp(val).into())
    }
}

impl Encode for LockHeight {
    fn encode(&self, writer: &mut impl Write) -> Result<usize, IoError> {
        self.to_consensus_u32().encode(writer)
    }
}

impl Decode for LockHeight {
    fn decode(reader: &mut impl Read) -> Result<Self, DecodeError> {
        let val = u32::decode(reader)?;
        Self::try_from_consensus_u32(val).map_err(|_| PsbtError::InvalidLockHeight(val).into())
    }
}

macro_rules! psbt_code_using_consensus {
    ($ty:ty) => {
        impl Encode for $ty {
            fn encode(&self, writer: &mut impl Write) -> Result<usize, IoError> {
                self.consensus_encode(writer)
            }
        }

        impl Decode for $ty {
            fn decode(reader: &mut impl Read) -> Result<Self, DecodeError> {
                Self::consensus_decode(reader).map_err(DecodeError::from)
            }
        }
    };
}

psbt_code_using_consensus!(Tx);
psbt_code_using_consensus!(TxVer);
psbt_code_using_consensus!(TxOut);
psbt_code_using_consensus!(Txid);
psbt_code_using_consensus!(Vout);
psbt_code_using_consensus!(SeqNo);
psbt_code_using_consensus!(LockTime);
psbt_code_using_consensus!(Witness);
psbt_code_using_consensus!(ControlBlock);
psbt_code_using_consensus!(Sats);
psbt_code_using_consensus!(u8);
psbt_code_using_consensus!(u32);
psbt_code_using_consensus!(VarInt);

fn script_bytes(data: Vec<u8>) -> Result<ScriptBytes, DecodeError> {
    let len = data.len() as u64;
    ScriptBytes::try_from(data).map_err(|_| PsbtError::OversizedField(len).into())
}

// Scripts are stored in PSBT values as they are, without length prefix
macro_rules! psbt_code_raw_script {
    ($ty:ty) => {
        impl Encode for $ty {
            fn encode(&self, writer: &mut impl Write) -> Result<usize, IoError> {
                writer.write_all(self.as_slice())?;
                Ok(self.len())
            }
        }

        impl Decode for $ty {
            fn decode(reader: &mut impl Read) -> Result<Self, DecodeError> {
                let mut buf = Vec::new();
                reader.read_to_end(&mut buf)?;
                script_bytes(buf).map(Self::from_inner)
            }
        }
    };
}

psbt_code_raw_script!(ScriptPubkey);
psbt_code_raw_script!(SigScript);
psbt_code_raw_script!(RedeemScript);
psbt_code_raw_script!(WitnessScript);

impl<const LEN: usize> Encode for [u8; LEN] {
    fn encode(&self, writer: &mut impl Write) -> Result<usize, IoError> {
        writer.write_all(self)?;
        Ok(LEN)
    }
}

impl<const LEN: usize> Decode for [u8; LEN] {
    fn decode(reader: &mut impl Read) -> Result<Self, DecodeError> {
        let mut buf = [0u8; LEN];
        reader.read_exact(&mut buf)?;
        Ok(buf)
    }
}

impl<const LEN: usize> Encode for Bytes<LEN> {
    fn encode(&self, writer: &mut impl Write) -> Result<usize, IoError> {
        self.to_byte_array().encode(writer)
    }
}

impl<const LEN: usize> Decode for Bytes<LEN> {
    fn decode(reader: &mut impl Read) -> Result<Self, DecodeError> {
        <[u8; LEN]>::decode(reader).map(Bytes::from)
    }
}

impl Encode for ByteStr {
    fn encode(&self, writer: &mut impl Write) -> Result<usize, IoError> {
        writer.write_all(self.as_slice())?;
        Ok(self.len())
    }
}

impl Decode for ByteStr {
    fn decode(reader: &mut impl Read) -> Result<Self, DecodeError> {
        let mut buf = Vec::new();
        reader.read_to_end(&mut buf)?;
        Ok(ByteStr::from(buf))
    }
}

impl<A: Encode, B: Encode> Encode for (A, B) {
    fn encode(&self, writer: &mut impl Write) -> Result<usize, IoError> {
        Ok(self.0.encode(writer)? + self.1.encode(writer)?)
    }
}

impl<A: Decode, B: Decode> Decode for (A, B) {
    fn decode(reader: &mut impl Read) -> Result<Self, DecodeError> {
        let a = A::decode(reader)?;
        let b = B::decode(reader)?;
        Ok((a, b))
    }
}

#[cfg(test)]
mod test {
    use amplify::hex::FromHex;

    use super::*;

    #[test]
    fn key_origin() {
        let origin = KeyOrigin::deserialize(Vec::<u8>::from_hex("d34db33f2c00008001000000").unwrap())
            .unwrap();
        assert_eq!(origin.to_string(), "d34db33f/44h/1");
        assert_eq!(origin.serialize(), Vec::<u8>::from_hex("d34db33f2c00008001000000").unwrap());
        assert_eq!(KeyOrigin::deserialize([0u8; 4]).unwrap().derivation().len(), 0);
        assert_eq!(KeyOrigin::deserialize([0u8; 6]).unwrap_err(), PsbtError::InvalidKeyOrigin(6));
        assert_eq!(KeyOrigin::deserialize([0u8; 3]).unwrap_err(), PsbtError::InvalidKeyOrigin(3));
    }

    #[test]
    fn xkey_origin() {
        let data = Vec::<u8>::from_hex("d34db33f2c0000800000008000000080").unwrap();
        let origin = XkeyOrigin::deserialize(&data).unwrap();
        assert_eq!(origin.to_string(), "d34db33f/44h/0h/0h");
        assert_eq!(origin.serialize(), data);
        assert_eq!(
            XkeyOrigin::deserialize(Vec::<u8>::from_hex("d34db33f2c00008001000000").unwrap()),
            Err(PsbtError::XpubUnhardenedOrigin)
        );
    }

    #[test]
    fn prop_key() {
        let key = PropKey::deserialize(Vec::<u8>::from_hex("02627001ab").unwrap()).unwrap();
        assert_eq!(key, PropKey::new("bp", 1, vec![0xAB]));
        assert_eq!(key.serialize(), Vec::<u8>::from_hex("02627001ab").unwrap());
        assert_eq!(
            PropKey::deserialize(Vec::<u8>::from_hex("02ff7001").unwrap()).unwrap_err(),
            PsbtError::InvalidPropIdentifier
        );
        assert_eq!(
            PropKey::deserialize(Vec::<u8>::from_hex("0562").unwrap()).unwrap_err(),
            PsbtError::UnexpectedEod
        );
    }

    #[test]
    fn psbt_version() {
        assert_eq!(PsbtVer::deserialize([2, 0, 0, 0]), Ok(PsbtVer::V2));
        assert_eq!(PsbtVer::deserialize([0, 0, 0, 0]), Ok(PsbtVer::V0));
        assert_eq!(PsbtVer::deserialize([1, 0, 0, 0]), Err(PsbtError::NoVersion1));
        assert_eq!(
            PsbtVer::deserialize([3, 0, 0, 0]),
            Err(PsbtError::UnsupportedVersion(PsbtUnsupportedVer(3)))
        );
        assert_eq!(PsbtVer::deserialize([2, 0, 0]), Err(PsbtError::UnexpectedEod));
    }

    #[test]
    fn varint_tail() {
        assert_eq!(read_varint_tail(0xFC, &mut Cursor::new([])).unwrap(), 0xFC);
        assert_eq!(read_varint_tail(0xFD, &mut Cursor::new([0xFD, 0x00])).unwrap(), 0xFD);
        assert_eq!(
            PsbtError::from(read_varint_tail(0xFD, &mut Cursor::new([0x10, 0x00])).unwrap_err()),
            PsbtError::NonMinimalVarInt
        );
        assert_eq!(
            PsbtError::from(read_varint_tail(0xFE, &mut Cursor::new([0x01])).unwrap_err()),
            PsbtError::UnexpectedEod
        );
    }

    #[test]
    fn locks() {
        assert_eq!(
            LockHeight::deserialize(500_000_000u32.to_le_bytes()),
            Err(PsbtError::InvalidLockHeight(500_000_000))
        );
        assert_eq!(
            LockTimestamp::deserialize(10_000u32.to_le_bytes()),
            Err(PsbtError::InvalidLockTimestamp(10_000))
        );
        assert_eq!(
            LockHeight::deserialize(800_000u32.to_le_bytes()).unwrap().to_consensus_u32(),
            800_000
        );
    }

    #[test]
    fn pubkeys() {
        let data = Vec::<u8>::from_hex(
            "0279be667ef9dcbbac55a06295ce870b07029bfcdb2dce28d959f2815b16f81798",
        )
        .unwrap();
        let pk = LegacyPk::deserialize(&data).unwrap();
        assert!(pk.compressed);
        assert_eq!(pk.serialize(), data);
        assert_eq!(
            LegacyPk::deserialize(&data[..32]),
            Err(PsbtError::InvalidPubkey(ByteStr::from(data[..32].to_vec())))
        );

        let xonly = XOnlyPk::deserialize(&data[1..]).unwrap();
        assert_eq!(xonly.serialize(), data[1..].to_vec());
        assert_eq!(InternalPk::deserialize(&data[1..]).unwrap().serialize(), data[1..].to_vec());
    }

    #[test]
    fn sigs() {
        assert_eq!(LegacySig::deserialize([]), Err(PsbtError::EmptySig));
        assert_eq!(
            LegacySig::deserialize([0x30, 0x01]),
            Err(PsbtError::InvalidSig(ByteStr::from(vec![0x30])))
        );
        assert_eq!(Bip340Sig::deserialize([]), Err(PsbtError::EmptySig));
        assert_eq!(
            Bip340Sig::deserialize([0u8; 63]),
            Err(PsbtError::InvalidSig(ByteStr::from(vec![0u8; 63])))
        );
    }

    #[test]
    fn leaf_script() {
        let leaf = LeafScript::deserialize([0x51, 0xC0]).unwrap();
        assert_eq!(leaf.version.to_consensus_u8(), 0xC0);
        assert_eq!(leaf.script.as_slice(), &[0x51]);
        assert_eq!(leaf.serialize(), vec![0x51, 0xC0]);
        assert_eq!(LeafScript::deserialize([]).unwrap_err(), PsbtError::UnexpectedEod);
        assert_eq!(
            LeafScript::deserialize([0x51, 0xC1]).unwrap_err(),
            PsbtError::InvalidLeafVer(0xC1)
        );
    }

    #[test]
    fn tap_tree() {
        let data = Vec::<u8>::from_hex("01c0015102c0015202c00153").unwrap();
        let tree = TapTree::deserialize(&data).unwrap();
        assert_eq!(tree.len(), 3);
        assert_eq!(tree[2].depth.to_u8(), 2);
        assert_eq!(tree.serialize(), data);
        assert!(matches!(TapTree::deserialize([]), Err(PsbtError::InvalidTapTree(_))));
        assert_eq!(
            TapTree::deserialize(Vec::<u8>::from_hex("01c0015101c0015201c00153").unwrap()),
            Err(PsbtError::InvalidTapTree(InvalidTree::MountainRange))
        );
        assert_eq!(
            TapTree::deserialize([0x81, 0xC0, 0x01, 0x51]).unwrap_err(),
            PsbtError::InvalidTapTreeDepth(0x81)
        );
        assert_eq!(
            TapTree::deserialize([0x00, 0xC0, 0x02, 0x51]).unwrap_err(),
            PsbtError::UnexpectedEod
        );
    }

    #[test]
    fn raw_scripts() {
        let script = ScriptPubkey::deserialize([0x00, 0x14]).unwrap();
        assert_eq!(script.as_slice(), &[0x00, 0x14]);
        assert_eq!(script.serialize(), vec![0x00, 0x14]);
        assert_eq!(WitnessScript::deserialize([]).unwrap().len(), 0);
    }

    #[test]
    fn unsigned_tx() {
        // version 2, no inputs, no outputs, zero lock time
        let tx = UnsignedTx::deserialize(Vec::<u8>::from_hex("02000000000000000000").unwrap())
            .unwrap();
        assert!(tx.inputs.is_empty() && tx.outputs.is_empty());
        assert_eq!(tx.serialize(), Vec::<u8>::from_hex("02000000000000000000").unwrap());

        let mut with_sig = String::from("0200000001");
        with_sig.push_str(&"11".repeat(32));
        with_sig.push_str("00000000015100ffffffff0000000000");
        assert_eq!(
            UnsignedTx::deserialize(Vec::<u8>::from_hex(&with_sig).unwrap()).unwrap_err(),
            PsbtError::UnsignedTxHasScriptSigs
        );
    }
}
