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

use psbt::{MapName, ModifiableFlags, Psbt, PsbtError, PsbtParseError, PsbtVer};

fn parse_exact(s: &str) -> Psbt {
    let s = s.trim();
    let psbt = Psbt::from_str(s).unwrap();
    assert_eq!(psbt.version, PsbtVer::V2);
    assert_eq!(psbt.to_string(), s);
    psbt
}

fn parse_err(s: &str) -> PsbtError {
    match Psbt::from_str(s.trim()) {
        Err(PsbtParseError::Psbt(err)) => err,
        Err(err) => panic!("unexpected error {err}"),
        Ok(_) => panic!("invalid PSBT was parsed"),
    }
}

fn lock_time(s: &str) -> Option<u32> {
    let psbt = parse_exact(s);
    psbt.lock_time().ok().map(|lock_time| lock_time.to_consensus_u32())
}

/// Case: PSBTv2 as produced by a creator, without inputs and outputs.
#[test]
fn empty() {
    let psbt = parse_exact(include_str!("valid.v2/empty.psbt"));
    assert_eq!(psbt.tx_modifiable(), Some(ModifiableFlags::modifiable()));
    assert_eq!(psbt.fallback_locktime, None);
    assert_eq!(Psbt::create(PsbtVer::V2).to_string(), include_str!("valid.v2/empty.psbt").trim());
}

/// Case: PSBTv2 with inputs having both lock time requirements, fallback lock time, all
/// modifiable flags, unknown and proprietary keys.
#[test]
fn locks_modifiable() {
    let psbt = parse_exact(include_str!("valid.v2/locks_modifiable.psbt"));
    let flags = psbt.tx_modifiable().unwrap();
    assert!(flags.inputs_modifiable);
    assert!(flags.outputs_modifiable);
    assert!(flags.sighash_single);
    assert!(psbt.has_sighash_single());
    assert_eq!(psbt.fallback_locktime.unwrap().to_consensus_u32(), 500);
    assert_eq!(psbt.unknown.len(), 1);
    assert_eq!(psbt.proprietary.len(), 1);

    let first = psbt.input(0).unwrap();
    assert_eq!(first.sequence_number.unwrap().to_consensus_u32(), 0xFFFF_FFFD);
    assert!(first.required_time_lock.is_none());
    let second = psbt.input(1).unwrap();
    assert!(second.required_time_lock.is_some());
    assert!(second.required_height_lock.is_some());

    // the input having both locks doesn't restrict the lock type
    assert_eq!(psbt.lock_time().unwrap().to_consensus_u32(), 800_000);
    assert_eq!(psbt.fee().unwrap().sats(), 5_000);
    assert_eq!(psbt.output(0).unwrap().bip32_derivation.len(), 1);
}

/// Case: PSBTv2 is written as PSBTv0 with the lock time resolved into the unsigned transaction;
/// reading it back keeps the lock time.
#[test]
fn locks_to_v0() {
    let psbt = parse_exact(include_str!("valid.v2/locks_modifiable.psbt"));
    let v0 = Psbt::from_str(&psbt.to_base64_ver(PsbtVer::V0).unwrap()).unwrap();
    assert_eq!(v0.version, PsbtVer::V0);
    assert_eq!(v0.lock_time(), psbt.lock_time());
    assert_eq!(v0.to_unsigned_tx(), psbt.to_unsigned_tx());
    assert_eq!(v0.txid(), psbt.txid());
    assert!(v0.input(1).unwrap().required_height_lock.is_none());
    assert_eq!(v0.tx_modifiable(), None);
}

/// Case: PSBTv0 and the same PSBT converted into v2.
#[test]
fn convert_v0_v2() {
    let v0 = include_str!("valid.v0/wsh_change.psbt").trim();
    let v2 = include_str!("valid.v2/wsh_change.psbt").trim();

    let psbt0 = Psbt::from_str(v0).unwrap();
    assert_eq!(psbt0.version, PsbtVer::V0);
    assert_eq!(psbt0.to_base64_ver(PsbtVer::V2).unwrap(), v2);
    assert_eq!(format!("{psbt0:2}"), v2);

    let psbt2 = parse_exact(v2);
    assert_eq!(psbt2.to_base64_ver(PsbtVer::V0).unwrap(), v0);
    assert_eq!(format!("{psbt2:0}"), v0);
    assert_eq!(psbt2.txid(), psbt0.txid());
}

/// Case: lock time computation with different combinations of input requirements.
#[test]
fn timelocks() {
    assert_eq!(lock_time(include_str!("timelocks/no_locks.psbt")), Some(0));
    assert_eq!(lock_time(include_str!("timelocks/fallback_only.psbt")), Some(0));
    assert_eq!(lock_time(include_str!("timelocks/height_one.psbt")), Some(10000));
    assert_eq!(lock_time(include_str!("timelocks/height_both.psbt")), Some(10000));
    assert_eq!(lock_time(include_str!("timelocks/height_mixed.psbt")), Some(10000));
    assert_eq!(lock_time(include_str!("timelocks/height_dual.psbt")), Some(10000));
    assert_eq!(lock_time(include_str!("timelocks/time_mixed.psbt")), Some(1657048460));
    assert_eq!(lock_time(include_str!("timelocks/time_dual.psbt")), Some(1657048460));
    assert_eq!(lock_time(include_str!("timelocks/time_one.psbt")), Some(1657048460));
    assert_eq!(lock_time(include_str!("timelocks/conflict.psbt")), None);
}

/// Case: PSBTv2 with conflicting lock time requirements can't be written as PSBTv0.
#[test]
fn conflict_to_v0() {
    let psbt = parse_exact(include_str!("timelocks/conflict.psbt"));
    assert!(matches!(psbt.to_base64_ver(PsbtVer::V0), Err(PsbtError::LockTime(_))));
    assert!(psbt.txid().is_err());
}

/// Case: PSBTv2 with an unsigned transaction in the global map.
#[test]
fn unsigned_tx() {
    assert_eq!(
        parse_err(include_str!("invalid/v2_unsigned_tx.psbt")),
        PsbtError::ForbiddenKey(MapName::Global, 0x00, PsbtVer::V2)
    );
}

/// Case: PSBTv2 missing the input count.
#[test]
fn no_input_count() {
    assert_eq!(
        parse_err(include_str!("invalid/v2_no_input_count.psbt")),
        PsbtError::RequiredKeyAbsent(MapName::Global, 0x04, PsbtVer::V2)
    );
}

/// Case: PSBTv2 declaring two inputs, while having only one input map.
#[test]
fn input_count() {
    assert_eq!(
        parse_err(include_str!("invalid/v2_input_count.psbt")),
        PsbtError::InputCountMismatch {
            declared: 2,
            found: 1
        }
    );
}

/// Case: PSBTv2 input without the previous txid, or with a zero one.
#[test]
fn prev_txid() {
    assert_eq!(
        parse_err(include_str!("invalid/v2_no_prev_txid.psbt")),
        PsbtError::RequiredKeyAbsent(MapName::Input, 0x0e, PsbtVer::V2)
    );
    assert_eq!(parse_err(include_str!("invalid/v2_null_prev_txid.psbt")), PsbtError::NullPrevTxid(0));
}

/// Case: required height lock above the threshold and required time lock below it.
#[test]
fn lock_ranges() {
    assert_eq!(
        parse_err(include_str!("invalid/v2_lock_height.psbt")),
        PsbtError::InvalidLockHeight(500_000_000)
    );
    assert_eq!(
        parse_err(include_str!("invalid/v2_lock_time.psbt")),
        PsbtError::InvalidLockTimestamp(499_999_999)
    );
}
