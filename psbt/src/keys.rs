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

//! Field registry: type tags of PSBT keys and their version applicability.

use std::fmt::{self, Debug, Display, Formatter};
use std::hash::Hash;

use amplify::hex::ToHex;

use crate::{Decode, Encode, KeyData, PsbtVer, ValueData};

pub trait KeyType: Copy + Ord + Eq + Hash + Debug + Display + Encode + Decode + 'static {
    /// All standard keys except the proprietary one, in the order of their type tags.
    const STANDARD: &'static [Self];
    const PROPRIETARY: Self;

    fn from_u8(val: u8) -> Self {
        Self::STANDARD
            .iter()
            .chain([Self::PROPRIETARY].iter())
            .copied()
            .find(|key| key.into_u8() == val)
            .unwrap_or_else(|| Self::unknown(val))
    }
    fn unknown(key_type: u8) -> Self;
    fn into_u8(self) -> u8;
    fn to_u8(&self) -> u8 { self.into_u8() }

    /// Whether the key carries data after the type tag.
    fn has_key_data(self) -> bool;
    /// The first PSBT version the key may be used in.
    fn present_since(self) -> PsbtVer;
    /// The first PSBT version the key must not be used in anymore.
    fn forbidden_since(self) -> Option<PsbtVer>;
    #[inline]
    fn is_allowed(self, version: PsbtVer) -> bool {
        version >= self.present_since()
            && self.forbidden_since().map(|ver| version < ver).unwrap_or(true)
    }
    /// Whether the key must be present in each PSBT version where it is allowed.
    fn is_required(self) -> bool;
    #[inline]
    fn is_proprietary(self) -> bool { self == Self::PROPRIETARY }
}

const PSBT_GLOBAL_UNSIGNED_TX: u8 = 0x00;
const PSBT_GLOBAL_XPUB: u8 = 0x01;
const PSBT_GLOBAL_TX_VERSION: u8 = 0x02;
const PSBT_GLOBAL_FALLBACK_LOCKTIME: u8 = 0x03;
const PSBT_GLOBAL_INPUT_COUNT: u8 = 0x04;
const PSBT_GLOBAL_OUTPUT_COUNT: u8 = 0x05;
const PSBT_GLOBAL_TX_MODIFIABLE: u8 = 0x06;
const PSBT_GLOBAL_VERSION: u8 = 0xFB;
const PSBT_GLOBAL_PROPRIETARY: u8 = 0xFC;

#[derive(Copy, Clone, Ord, PartialOrd, Eq, PartialEq, Hash, Debug, Display)]
#[non_exhaustive]
pub enum GlobalKey {
    #[display("PSBT_GLOBAL_UNSIGNED_TX")]
    UnsignedTx,

    #[display("PSBT_GLOBAL_XPUB")]
    Xpub,

    #[display("PSBT_GLOBAL_TX_VERSION")]
    TxVersion,

    #[display("PSBT_GLOBAL_FALLBACK_LOCKTIME")]
    FallbackLocktime,

    #[display("PSBT_GLOBAL_INPUT_COUNT")]
    InputCount,

    #[display("PSBT_GLOBAL_OUTPUT_COUNT")]
    OutputCount,

    #[display("PSBT_GLOBAL_TX_MODIFIABLE")]
    TxModifiable,

    #[display("PSBT_GLOBAL_VERSION")]
    Version,

    #[display("PSBT_GLOBAL_PROPRIETARY")]
    Proprietary,

    /// All unknown keys
    #[display("{0:#04x}")]
    Unknown(u8),
}

impl KeyType for GlobalKey {
    const STANDARD: &'static [Self] = &[
        Self::UnsignedTx,
        Self::Xpub,
        Self::TxVersion,
        Self::FallbackLocktime,
        Self::InputCount,
        Self::OutputCount,
        Self::TxModifiable,
        Self::Version,
    ];
    const PROPRIETARY: Self = Self::Proprietary;

    fn unknown(key_type: u8) -> Self { Self::Unknown(key_type) }

    fn into_u8(self) -> u8 {
        match self {
            GlobalKey::UnsignedTx => PSBT_GLOBAL_UNSIGNED_TX,
            GlobalKey::Xpub => PSBT_GLOBAL_XPUB,
            GlobalKey::TxVersion => PSBT_GLOBAL_TX_VERSION,
            GlobalKey::FallbackLocktime => PSBT_GLOBAL_FALLBACK_LOCKTIME,
            GlobalKey::InputCount => PSBT_GLOBAL_INPUT_COUNT,
            GlobalKey::OutputCount => PSBT_GLOBAL_OUTPUT_COUNT,
            GlobalKey::TxModifiable => PSBT_GLOBAL_TX_MODIFIABLE,
            GlobalKey::Version => PSBT_GLOBAL_VERSION,
            GlobalKey::Proprietary => PSBT_GLOBAL_PROPRIETARY,
            GlobalKey::Unknown(key_type) => key_type,
        }
    }

    fn has_key_data(self) -> bool {
        matches!(self, GlobalKey::Xpub | GlobalKey::Proprietary | GlobalKey::Unknown(_))
    }

    fn present_since(self) -> PsbtVer {
        match self {
            GlobalKey::TxVersion
            | GlobalKey::FallbackLocktime
            | GlobalKey::InputCount
            | GlobalKey::OutputCount
            | GlobalKey::TxModifiable => PsbtVer::V2,

            GlobalKey::UnsignedTx
            | GlobalKey::Xpub
            | GlobalKey::Version
            | GlobalKey::Proprietary
            | GlobalKey::Unknown(_) => PsbtVer::V0,
        }
    }

    fn forbidden_since(self) -> Option<PsbtVer> {
        match self {
            GlobalKey::UnsignedTx => Some(PsbtVer::V2),
            _ => None,
        }
    }

    fn is_required(self) -> bool {
        matches!(
            self,
            GlobalKey::UnsignedTx
                | GlobalKey::TxVersion
                | GlobalKey::InputCount
                | GlobalKey::OutputCount
        )
    }
}

const PSBT_IN_NON_WITNESS_UTXO: u8 = 0x00;
const PSBT_IN_WITNESS_UTXO: u8 = 0x01;
const PSBT_IN_PARTIAL_SIG: u8 = 0x02;
const PSBT_IN_SIGHASH_TYPE: u8 = 0x03;
const PSBT_IN_REDEEM_SCRIPT: u8 = 0x04;
const PSBT_IN_WITNESS_SCRIPT: u8 = 0x05;
const PSBT_IN_BIP32_DERIVATION: u8 = 0x06;
const PSBT_IN_FINAL_SCRIPTSIG: u8 = 0x07;
const PSBT_IN_FINAL_SCRIPTWITNESS: u8 = 0x08;
const PSBT_IN_RIPEMD160: u8 = 0x0a;
const PSBT_IN_SHA256: u8 = 0x0b;
const PSBT_IN_HASH160: u8 = 0x0c;
const PSBT_IN_HASH256: u8 = 0x0d;
const PSBT_IN_PREVIOUS_TXID: u8 = 0x0e;
const PSBT_IN_OUTPUT_INDEX: u8 = 0x0f;
const PSBT_IN_SEQUENCE: u8 = 0x10;
const PSBT_IN_REQUIRED_TIME_LOCKTIME: u8 = 0x11;
const PSBT_IN_REQUIRED_HEIGHT_LOCKTIME: u8 = 0x12;
const PSBT_IN_TAP_KEY_SIG: u8 = 0x13;
const PSBT_IN_TAP_SCRIPT_SIG: u8 = 0x14;
const PSBT_IN_TAP_LEAF_SCRIPT: u8 = 0x15;
const PSBT_IN_TAP_BIP32_DERIVATION: u8 = 0x16;
const PSBT_IN_TAP_INTERNAL_KEY: u8 = 0x17;
const PSBT_IN_TAP_MERKLE_ROOT: u8 = 0x18;
const PSBT_IN_PROPRIETARY: u8 = 0xFC;

#[derive(Copy, Clone, Ord, PartialOrd, Eq, PartialEq, Hash, Debug, Display)]
#[non_exhaustive]
pub enum InputKey {
    #[display("PSBT_IN_NON_WITNESS_UTXO")]
    NonWitnessUtxo,

    #[display("PSBT_IN_WITNESS_UTXO")]
    WitnessUtxo,

    #[display("PSBT_IN_PARTIAL_SIG")]
    PartialSig,

    #[display("PSBT_IN_SIGHASH_TYPE")]
    SighashType,

    #[display("PSBT_IN_REDEEM_SCRIPT")]
    RedeemScript,

    #[display("PSBT_IN_WITNESS_SCRIPT")]
    WitnessScript,

    #[display("PSBT_IN_BIP32_DERIVATION")]
    Bip32Derivation,

    #[display("PSBT_IN_FINAL_SCRIPTSIG")]
    FinalScriptSig,

    #[display("PSBT_IN_FINAL_SCRIPTWITNESS")]
    FinalWitness,

    #[display("PSBT_IN_RIPEMD160")]
    Ripemd160,

    #[display("PSBT_IN_SHA256")]
    Sha256,

    #[display("PSBT_IN_HASH160")]
    Hash160,

    #[display("PSBT_IN_HASH256")]
    Hash256,

    #[display("PSBT_IN_PREVIOUS_TXID")]
    PreviousTxid,

    #[display("PSBT_IN_OUTPUT_INDEX")]
    OutputIndex,

    #[display("PSBT_IN_SEQUENCE")]
    Sequence,

    #[display("PSBT_IN_REQUIRED_TIME_LOCKTIME")]
    RequiredTimeLock,

    #[display("PSBT_IN_REQUIRED_HEIGHT_LOCKTIME")]
    RequiredHeightLock,

    #[display("PSBT_IN_TAP_KEY_SIG")]
    TapKeySig,

    #[display("PSBT_IN_TAP_SCRIPT_SIG")]
    TapScriptSig,

    #[display("PSBT_IN_TAP_LEAF_SCRIPT")]
    TapLeafScript,

    #[display("PSBT_IN_TAP_BIP32_DERIVATION")]
    TapBip32Derivation,

    #[display("PSBT_IN_TAP_INTERNAL_KEY")]
    TapInternalKey,

    #[display("PSBT_IN_TAP_MERKLE_ROOT")]
    TapMerkleRoot,

    #[display("PSBT_IN_PROPRIETARY")]
    Proprietary,

    /// All unknown keys
    #[display("{0:#04x}")]
    Unknown(u8),
}

impl KeyType for InputKey {
    const STANDARD: &'static [Self] = &[
        Self::NonWitnessUtxo,
        Self::WitnessUtxo,
        Self::PartialSig,
        Self::SighashType,
        Self::RedeemScript,
        Self::WitnessScript,
        Self::Bip32Derivation,
        Self::FinalScriptSig,
        Self::FinalWitness,
        Self::Ripemd160,
        Self::Sha256,
        Self::Hash160,
        Self::Hash256,
        Self::PreviousTxid,
        Self::OutputIndex,
        Self::Sequence,
        Self::RequiredTimeLock,
        Self::RequiredHeightLock,
        Self::TapKeySig,
        Self::TapScriptSig,
        Self::TapLeafScript,
        Self::TapBip32Derivation,
        Self::TapInternalKey,
        Self::TapMerkleRoot,
    ];
    const PROPRIETARY: Self = Self::Proprietary;

    fn unknown(key_type: u8) -> Self { Self::Unknown(key_type) }

    fn into_u8(self) -> u8 {
        match self {
            InputKey::NonWitnessUtxo => PSBT_IN_NON_WITNESS_UTXO,
            InputKey::WitnessUtxo => PSBT_IN_WITNESS_UTXO,
            InputKey::PartialSig => PSBT_IN_PARTIAL_SIG,
            InputKey::SighashType => PSBT_IN_SIGHASH_TYPE,
            InputKey::RedeemScript => PSBT_IN_REDEEM_SCRIPT,
            InputKey::WitnessScript => PSBT_IN_WITNESS_SCRIPT,
            InputKey::Bip32Derivation => PSBT_IN_BIP32_DERIVATION,
            InputKey::FinalScriptSig => PSBT_IN_FINAL_SCRIPTSIG,
            InputKey::FinalWitness => PSBT_IN_FINAL_SCRIPTWITNESS,
            InputKey::Ripemd160 => PSBT_IN_RIPEMD160,
            InputKey::Sha256 => PSBT_IN_SHA256,
            InputKey::Hash160 => PSBT_IN_HASH160,
            InputKey::Hash256 => PSBT_IN_HASH256,
            InputKey::PreviousTxid => PSBT_IN_PREVIOUS_TXID,
            InputKey::OutputIndex => PSBT_IN_OUTPUT_INDEX,
            InputKey::Sequence => PSBT_IN_SEQUENCE,
            InputKey::RequiredTimeLock => PSBT_IN_REQUIRED_TIME_LOCKTIME,
            InputKey::RequiredHeightLock => PSBT_IN_REQUIRED_HEIGHT_LOCKTIME,
            InputKey::TapKeySig => PSBT_IN_TAP_KEY_SIG,
            InputKey::TapScriptSig => PSBT_IN_TAP_SCRIPT_SIG,
            InputKey::TapLeafScript => PSBT_IN_TAP_LEAF_SCRIPT,
            InputKey::TapBip32Derivation => PSBT_IN_TAP_BIP32_DERIVATION,
            InputKey::TapInternalKey => PSBT_IN_TAP_INTERNAL_KEY,
            InputKey::TapMerkleRoot => PSBT_IN_TAP_MERKLE_ROOT,
            InputKey::Proprietary => PSBT_IN_PROPRIETARY,
            InputKey::Unknown(key_type) => key_type,
        }
    }

    fn has_key_data(self) -> bool {
        matches!(
            self,
            InputKey::PartialSig
                | InputKey::Bip32Derivation
                | InputKey::Ripemd160
                | InputKey::Sha256
                | InputKey::Hash160
                | InputKey::Hash256
                | InputKey::TapScriptSig
                | InputKey::TapLeafScript
                | InputKey::TapBip32Derivation
                | InputKey::Proprietary
                | InputKey::Unknown(_)
        )
    }

    fn present_since(self) -> PsbtVer {
        match self {
            InputKey::PreviousTxid
            | InputKey::OutputIndex
            | InputKey::Sequence
            | InputKey::RequiredTimeLock
            | InputKey::RequiredHeightLock => PsbtVer::V2,
            _ => PsbtVer::V0,
        }
    }

    fn forbidden_since(self) -> Option<PsbtVer> { None }

    fn is_required(self) -> bool { matches!(self, InputKey::PreviousTxid | InputKey::OutputIndex) }
}

const PSBT_OUT_REDEEM_SCRIPT: u8 = 0x00;
const PSBT_OUT_WITNESS_SCRIPT: u8 = 0x01;
const PSBT_OUT_BIP32_DERIVATION: u8 = 0x02;
const PSBT_OUT_AMOUNT: u8 = 0x03;
const PSBT_OUT_SCRIPT: u8 = 0x04;
const PSBT_OUT_TAP_INTERNAL_KEY: u8 = 0x05;
const PSBT_OUT_TAP_TREE: u8 = 0x06;
const PSBT_OUT_TAP_BIP32_DERIVATION: u8 = 0x07;
const PSBT_OUT_PROPRIETARY: u8 = 0xFC;

#[derive(Copy, Clone, Ord, PartialOrd, Eq, PartialEq, Hash, Debug, Display)]
#[non_exhaustive]
pub enum OutputKey {
    #[display("PSBT_OUT_REDEEM_SCRIPT")]
    RedeemScript,

    #[display("PSBT_OUT_WITNESS_SCRIPT")]
    WitnessScript,

    #[display("PSBT_OUT_BIP32_DERIVATION")]
    Bip32Derivation,

    #[display("PSBT_OUT_AMOUNT")]
    Amount,

    #[display("PSBT_OUT_SCRIPT")]
    Script,

    #[display("PSBT_OUT_TAP_INTERNAL_KEY")]
    TapInternalKey,

    #[display("PSBT_OUT_TAP_TREE")]
    TapTree,

    #[display("PSBT_OUT_TAP_BIP32_DERIVATION")]
    TapBip32Derivation,

    #[display("PSBT_OUT_PROPRIETARY")]
    Proprietary,

    /// All unknown keys
    #[display("{0:#04x}")]
    Unknown(u8),
}

impl KeyType for OutputKey {
    const STANDARD: &'static [Self] = &[
        Self::RedeemScript,
        Self::WitnessScript,
        Self::Bip32Derivation,
        Self::Amount,
        Self::Script,
        Self::TapInternalKey,
        Self::TapTree,
        Self::TapBip32Derivation,
    ];
    const PROPRIETARY: Self = Self::Proprietary;

    fn unknown(key_type: u8) -> Self { Self::Unknown(key_type) }

    fn into_u8(self) -> u8 {
        match self {
            OutputKey::RedeemScript => PSBT_OUT_REDEEM_SCRIPT,
            OutputKey::WitnessScript => PSBT_OUT_WITNESS_SCRIPT,
            OutputKey::Bip32Derivation => PSBT_OUT_BIP32_DERIVATION,
            OutputKey::Amount => PSBT_OUT_AMOUNT,
            OutputKey::Script => PSBT_OUT_SCRIPT,
            OutputKey::TapInternalKey => PSBT_OUT_TAP_INTERNAL_KEY,
            OutputKey::TapTree => PSBT_OUT_TAP_TREE,
            OutputKey::TapBip32Derivation => PSBT_OUT_TAP_BIP32_DERIVATION,
            OutputKey::Proprietary => PSBT_OUT_PROPRIETARY,
            OutputKey::Unknown(key_type) => key_type,
        }
    }

    fn has_key_data(self) -> bool {
        matches!(
            self,
            OutputKey::Bip32Derivation
                | OutputKey::TapBip32Derivation
                | OutputKey::Proprietary
                | OutputKey::Unknown(_)
        )
    }

    fn present_since(self) -> PsbtVer {
        match self {
            OutputKey::Amount | OutputKey::Script => PsbtVer::V2,
            _ => PsbtVer::V0,
        }
    }

    fn forbidden_since(self) -> Option<PsbtVer> { None }

    fn is_required(self) -> bool { matches!(self, OutputKey::Amount | OutputKey::Script) }
}

pub enum KeyValue<T: KeyType> {
    Pair(KeyPair<T, KeyData, ValueData>),
    Separator,
}

pub struct KeyPair<T: KeyType, K, V> {
    pub key_type: T,
    pub key_data: K,
    pub value_data: V,
}

impl<T: KeyType, K, V> KeyPair<T, K, V> {
    pub fn new(key_type: T, key_data: K, value_data: V) -> Self {
        Self {
            key_type,
            key_data,
            value_data,
        }
    }
}

/// Proprietary key: an identifier prefix, a subtype and free-form key data.
#[derive(Clone, PartialOrd, Ord, Eq, PartialEq, Hash, Debug)]
pub struct PropKey {
    pub identifier: String,
    pub subtype: u64,
    pub data: Vec<u8>,
}

impl PropKey {
    pub fn new(identifier: impl ToString, subtype: u64, data: impl Into<Vec<u8>>) -> Self {
        PropKey {
            identifier: identifier.to_string(),
            subtype,
            data: data.into(),
        }
    }
}

impl Display for PropKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{} {:#x}", self.identifier, self.subtype)?;
        if !self.data.is_empty() {
            write!(f, " {}", self.data.to_hex())?;
        }
        Ok(())
    }
}
