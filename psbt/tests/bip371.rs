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

use psbt::{Psbt, PsbtVer};

/// Case: PSBT with one P2TR input carrying both key path and script path signatures, the leaf
/// script with its control block, key derivations, internal key and merkle root. The output has a
/// two-leaf taproot tree.
#[test]
fn key_and_script() {
    let s = include_str!("valid.v0/tr_key_script.psbt").trim();
    let psbt = Psbt::from_str(s).unwrap();
    assert_eq!(psbt.to_string(), s);

    let input = psbt.input(0).unwrap();
    assert!(input.tap_key_sig.is_some());
    assert_eq!(input.tap_script_sig.len(), 1);
    assert_eq!(input.tap_leaf_script.len(), 1);
    assert_eq!(input.tap_bip32_derivation.len(), 2);
    assert!(input.tap_internal_key.is_some());
    assert!(input.tap_merkle_root.is_some());

    let (control_block, leaf_script) = input.tap_leaf_script.first().unwrap();
    assert_eq!(control_block.merkle_branch.len(), 1);
    let ((_, leaf_hash), _) = input.tap_script_sig.first().unwrap();
    assert_eq!(leaf_script.tap_leaf_hash(), *leaf_hash);
    let script_key = input
        .tap_bip32_derivation
        .values()
        .find(|derivation| !derivation.leaf_hashes.is_empty())
        .unwrap();
    assert_eq!(script_key.leaf_hashes, vec![*leaf_hash]);

    let output = psbt.output(0).unwrap();
    let tap_tree = output.tap_tree.as_ref().unwrap();
    assert_eq!(tap_tree.len(), 2);
    assert!(tap_tree.iter().all(|leaf| u8::from(leaf.depth) == 1));
    assert_eq!(output.tap_bip32_derivation.len(), 1);
    assert!(output.tap_internal_key.is_some());

    assert_eq!(psbt.fee().unwrap().sats(), 1_000);
    assert_eq!(
        psbt.txid().unwrap().to_string(),
        "19a1075a3b0c595f5a78675ece308eac451896d82adee9794688ee11574aee2e"
    );
}

/// Case: taproot fields are kept when the PSBT is converted into v2 and back.
#[test]
fn key_and_script_v2() {
    let s = include_str!("valid.v0/tr_key_script.psbt").trim();
    let psbt = Psbt::from_str(s).unwrap();
    let v2 = Psbt::from_str(&psbt.to_base64_ver(PsbtVer::V2).unwrap()).unwrap();
    let input = v2.input(0).unwrap();
    assert_eq!(input.tap_leaf_script, psbt.input(0).unwrap().tap_leaf_script);
    assert_eq!(v2.output(0).unwrap().tap_tree, psbt.output(0).unwrap().tap_tree);
    assert_eq!(v2.to_base64_ver(PsbtVer::V0).unwrap(), s);
}
