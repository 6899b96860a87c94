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

use std::cmp::max;

use derive::{LockHeight, LockTime, LockTimestamp};

/// Error resolving transaction lock time from the lock time requirements of PSBT inputs.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Display, Error)]
#[display(
    "input {0} requires a lock time of a kind which conflicts with the requirements of the \
     preceding inputs"
)]
pub struct LockTimeConflict(pub usize);

/// Resolves transaction lock time out of per-input required time and height locks.
///
/// An input requiring only one kind of lock excludes the other kind for the whole
/// transaction; an input providing both kinds of locks doesn't restrict the choice. Height lock
/// wins if both kinds remain possible. If no input requires a lock, `fallback` lock time is used
/// (or zero, if there is no fallback).
///
/// # Errors
///
/// If some input requires a lock kind which was excluded by the preceding inputs.
pub fn resolve_lock_time(
    locks: impl IntoIterator<Item = (Option<LockTimestamp>, Option<LockHeight>)>,
    fallback: Option<LockTime>,
) -> Result<LockTime, LockTimeConflict> {
    let mut time_lock = Some(0u32);
    let mut height_lock = Some(0u32);

    for (index, (time, height)) in locks.into_iter().enumerate() {
        match (time, height) {
            (Some(_), None) => {
                height_lock = None;
                if time_lock.is_none() {
                    return Err(LockTimeConflict(index));
                }
            }
            (None, Some(_)) => {
                time_lock = None;
                if height_lock.is_none() {
                    return Err(LockTimeConflict(index));
                }
            }
            _ => {}
        }
        if let (Some(time), Some(lock)) = (time, time_lock.as_mut()) {
            *lock = max(*lock, time.to_consensus_u32());
        }
        if let (Some(height), Some(lock)) = (height, height_lock.as_mut()) {
            *lock = max(*lock, height.to_consensus_u32());
        }
    }

    Ok(match (height_lock, time_lock) {
        (Some(height), _) if height > 0 => LockTime::from_consensus_u32(height),
        (_, Some(time)) if time > 0 => LockTime::from_consensus_u32(time),
        _ => fallback.unwrap_or(LockTime::ZERO),
    })
}
