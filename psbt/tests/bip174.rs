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

use std::str::FromStr;

use psbt::{InputKey, MapName, Psbt, PsbtError, PsbtParseError, PsbtVer};

/// Parses a canonically encoded PSBTv0 and checks it is written back byte to byte.
fn parse_exact(s: &str) -> Psbt {
    let s = s.trim();
    let psbt = Psbt::from_str(s).unwrap();
    assert_eq!(psbt.version, PsbtVer::V0);
    assert_eq!(psbt.to_string(), s);
    psbt
}

/// Converts PSBTv0 to v2 and back, which must not lose any data.
fn convert_roundtrip(s: &str) {
    let psbt = parse_exact(s);
    let v2 = psbt.to_base64_ver(PsbtVer::V2).unwrap();
    let psbt2 = Psbt::from_str(&v2).unwrap();
    assert_eq!(psbt2.version, PsbtVer::V2);
    assert_eq!(psbt2.to_base64_ver(PsbtVer::V0).unwrap(), s.trim());
}

fn parse_err(s: &str) -> PsbtError {
    match Psbt::from_str(s.trim()) {
        Err(PsbtParseError::Psbt(err)) => err,
        Err(err) => panic!("unexpected error {err}"),
        Ok(_) => panic!("invalid PSBT was parsed"),
    }
}

/// Case: PSBT with one P2PKH input and two outputs.
#[test]
fn pkh_two_outputs() {
    let psbt = parse_exact(include_str!("valid.v0/pkh_two_outputs.psbt"));
    assert_eq!(psbt.inputs().count(), 1);
    assert_eq!(psbt.outputs().count(), 2);
    assert!(psbt.input(0).unwrap().non_witness_tx.is_some());
    convert_roundtrip(include_str!("valid.v0/pkh_two_outputs.psbt"));
}

/// Case: PSBT with one input having non-witness UTXO and key derivation.
#[test]
fn wpkh_single() {
    let psbt = parse_exact(include_str!("valid.v0/wpkh_single.psbt"));
    let input = psbt.input(0).unwrap();
    assert!(input.non_witness_tx.is_some());
    assert_eq!(input.bip32_derivation.len(), 1);
    assert!(psbt.fee().is_some());
    convert_roundtrip(include_str!("valid.v0/wpkh_single.psbt"));
}

/// Case: payjoin original PSBT, finalized by the sender.
#[test]
fn payjoin_original() {
    let psbt = parse_exact(include_str!("valid.v0/payjoin_original.psbt"));
    assert!(psbt.is_signed());
    assert_eq!(psbt.unsigned_input_count(), 0);
}

/// Case: payjoin proposal PSBT with the receiver input added.
#[test]
fn payjoin_proposal() {
    let psbt = parse_exact(include_str!("valid.v0/payjoin_proposal.psbt"));
    assert_eq!(psbt.inputs().count(), 2);
    convert_roundtrip(include_str!("valid.v0/payjoin_proposal.psbt"));
}

/// Case: PSBT with two P2WSH inputs and two outputs.
#[test]
fn wsh_two_inputs() { convert_roundtrip(include_str!("valid.v0/wsh_two_inputs.psbt")); }

/// Case: PSBT with four finalized P2WSH inputs.
#[test]
fn wsh_unvault() {
    let psbt = parse_exact(include_str!("valid.v0/wsh_unvault.psbt"));
    assert_eq!(psbt.inputs().count(), 4);
    assert!(psbt.is_signed());
    assert!(psbt.inputs().all(|input| input.witness_script.is_none()));
}

/// Case: PSBT spending six P2WSH inputs to a single output.
#[test]
fn wsh_six_inputs() {
    let psbt = parse_exact(include_str!("valid.v0/wsh_six_inputs.psbt"));
    assert_eq!(psbt.inputs().count(), 6);
    assert_eq!(psbt.outputs().count(), 1);
    convert_roundtrip(include_str!("valid.v0/wsh_six_inputs.psbt"));
}

/// Case: P2SH-P2WSH output spent with hash preimages, global xpub, unknown and proprietary keys in
/// all maps.
#[test]
fn wsh_preimages() {
    let psbt = parse_exact(include_str!("valid.v0/wsh_preimages.psbt"));
    assert_eq!(psbt.xpubs().count(), 1);
    assert_eq!(psbt.unknown.len(), 1);
    assert_eq!(psbt.proprietary.len(), 1);

    let input = psbt.input(0).unwrap();
    assert_eq!(input.ripemd160.len(), 1);
    assert_eq!(input.sha256.len(), 1);
    assert_eq!(input.hash160.len(), 1);
    assert_eq!(input.hash256.len(), 1);
    assert_eq!(input.partial_sigs.len(), 1);
    assert_eq!(input.bip32_derivation.len(), 1);
    assert_eq!(input.unknown.len(), 1);
    assert_eq!(input.proprietary.len(), 1);

    let output = psbt.output(0).unwrap();
    assert!(output.redeem_script.is_some());
    assert_eq!(output.unknown.len(), 1);
    assert_eq!(output.proprietary.len(), 1);

    assert_eq!(psbt.lock_time().unwrap().to_consensus_u32(), 800_000);
    assert_eq!(psbt.fee().unwrap().sats(), 10_000);
    convert_roundtrip(include_str!("valid.v0/wsh_preimages.psbt"));
}

/// Case: PSBT with global unsigned tx that has 0 inputs and 0 outputs.
#[test]
fn empty() {
    let psbt = parse_exact(include_str!("valid.v0/empty.psbt"));
    assert_eq!(psbt.inputs().count(), 0);
    assert_eq!(psbt.fee().unwrap().sats(), 0);
    assert_eq!(Psbt::create(PsbtVer::V0).to_string(), include_str!("valid.v0/empty.psbt").trim());
}

/// Case: PSBTs with keys not sorted within the maps. They are accepted and written back sorted.
#[test]
fn unsorted() {
    for s in [
        include_str!("valid.v0/unsorted_cancel.psbt"),
        include_str!("valid.v0/unsorted_unvault.psbt"),
        include_str!("valid.v0/unsorted_spend.psbt"),
    ] {
        let psbt = Psbt::from_str(s.trim()).unwrap();
        let sorted = psbt.to_string();
        assert_ne!(sorted, s.trim());
        let reparsed = Psbt::from_str(&sorted).unwrap();
        assert_eq!(reparsed, psbt);
        assert_eq!(reparsed.to_string(), sorted);
    }
}

/// Case: PSBT with one input map, while the unsigned tx has two outputs.
#[test]
fn missing_outputs() {
    assert_eq!(
        parse_err(include_str!("invalid/missing_outputs.psbt")),
        PsbtError::OutputCountMismatch {
            declared: 2,
            found: 0
        }
    );
}

/// Case: PSBT with an unsigned tx which has a scriptSig.
#[test]
fn signed_unsigned_tx() {
    assert_eq!(
        parse_err(include_str!("invalid/signed_unsigned_tx.psbt")),
        PsbtError::UnsignedTxHasScriptSigs
    );
}

/// Case: PSBT with an empty global map.
#[test]
fn empty_global() {
    assert_eq!(
        parse_err(include_str!("invalid/empty_global.psbt")),
        PsbtError::RequiredKeyAbsent(MapName::Global, 0x00, PsbtVer::V0)
    );
}

/// Case: PSBT with an input map containing two non-witness UTXOs.
#[test]
fn repeated_key() {
    assert_eq!(
        parse_err(include_str!("invalid/repeated_unsigned_tx.psbt")),
        PsbtError::RepeatedKey(MapName::Input, 0x00)
    );
}

/// Case: PSBT with version number 1, which is not defined.
#[test]
fn version_1() {
    assert_eq!(parse_err(include_str!("invalid/version_1.psbt")), PsbtError::NoVersion1);
    assert!(matches!(
        parse_err(include_str!("invalid/version_3.psbt")),
        PsbtError::UnsupportedVersion(_)
    ));
}

/// Case: PSBTv0 with PSBTv2-only keys in the global and input maps.
#[test]
fn v0_with_v2_keys() {
    assert_eq!(
        parse_err(include_str!("invalid/v0_tx_version.psbt")),
        PsbtError::UnexpectedKey(MapName::Global, 0x02, PsbtVer::V0)
    );
    assert_eq!(
        parse_err(include_str!("invalid/v0_input_prev_txid.psbt")),
        PsbtError::UnexpectedKey(MapName::Input, 0x0e, PsbtVer::V0)
    );
}

/// Case: non-witness UTXO which is not the transaction spent by the input.
#[test]
fn utxo_mismatch() {
    assert_eq!(
        parse_err(include_str!("invalid/utxo_mismatch.psbt")),
        PsbtError::NonWitnessUtxoMismatch(0)
    );
}

/// Case: SHA256 preimage not matching its hash.
#[test]
fn wrong_preimage() {
    assert_eq!(
        parse_err(include_str!("invalid/preimage.psbt")),
        PsbtError::InvalidPreimage(InputKey::Sha256)
    );
}

/// Case: BIP32 derivation for a public key which is not on the curve.
#[test]
fn invalid_pubkey() {
    assert!(matches!(parse_err(include_str!("invalid/pubkey.psbt")), PsbtError::InvalidPubkey(_)));
}

/// Case: repeated unknown key in the global map.
#[test]
fn repeated_unknown() {
    assert_eq!(
        parse_err(include_str!("invalid/unknown_repeated.psbt")),
        PsbtError::RepeatedUnknownKey(MapName::Global, 0x0a)
    );
}

/// Case: sighash type key having key data.
#[test]
fn singular_key_data() {
    assert!(matches!(
        parse_err(include_str!("invalid/singular_key_data.psbt")),
        PsbtError::NonEmptyKeyData(MapName::Input, 0x03, _)
    ));
}

/// Case: broken framing of the PSBT stream.
#[test]
fn framing() {
    assert!(matches!(parse_err(include_str!("invalid/magic.psbt")), PsbtError::InvalidMagic(_)));
    assert_eq!(
        parse_err(include_str!("invalid/no_separator.psbt")),
        PsbtError::NoSeparator(MapName::Global)
    );
    assert_eq!(parse_err(include_str!("invalid/trailing_data.psbt")), PsbtError::DataNotConsumed);
}
