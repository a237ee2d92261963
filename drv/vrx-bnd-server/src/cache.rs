// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Lazy resolution of the per-line bonding facts.
//!
//! Each field of a [`BondingCache`](crate::BondingCache) starts out
//! unresolved and is fetched from the firmware the first time someone asks
//! for it after the line has reached FULL_INIT. Once resolved it is never
//! fetched again by these routines; only a bonding status event (see
//! [`BndServer::bonding_status_set`](crate::BndServer::bonding_status_set))
//! overwrites it.

use drv_vrx_bnd_api::fw::TcStatusAck;
use drv_vrx_bnd_api::{BndError, BondingMode, LineId, LineState};
use ringbuf::*;

use crate::{BondingDevice, Cached, Firmware};

#[derive(Copy, Clone, Debug, PartialEq)]
enum Trace {
    None,
    TcStatusFailed(LineId, BndError),
    /// The firmware doesn't report bonding in its TC status; the mode was
    /// inferred from the remote PAF status instead.
    LegacyFallback {
        line: LineId,
        remote_paf: bool,
    },
    PafStatusFailed(LineId, BndError),
    ImapStatusFailed(LineId, BndError),
    FeatureMapFailed(LineId, BndError),
    /// The firmware reported a different bonding mode than it did earlier in
    /// the same startup.
    Fluctuation {
        line: LineId,
        prev: BondingMode,
        new: BondingMode,
    },
    Resolved(LineId, Field),
}

#[derive(Copy, Clone, Debug, PartialEq)]
enum Field {
    Status(BondingMode),
    RemotePaf(bool),
    RemoteImap(bool),
}

ringbuf!(Trace, 32, Trace::None);

fn ready(slot_resolved: bool, state: LineState) -> bool {
    !slot_resolved && state.reached_full_init()
}

/// Works out the bonding mode carried by a TC status message.
///
/// Firmware that predates the bonding word in that message only does PAF
/// bonding, so in that case the mode follows whether the far end supports
/// PAF.
pub fn classify<D: BondingDevice>(
    line: LineId,
    ack: &TcStatusAck,
    dev: &D,
) -> Result<BondingMode, BndError> {
    if let Some(mode) = ack.bonding_mode() {
        return Ok(mode);
    }

    let remote_paf = dev.paf_bnd_status_get(line).map_err(|e| {
        ringbuf_entry!(Trace::PafStatusFailed(line, e));
        e
    })?;
    ringbuf_entry!(Trace::LegacyFallback { line, remote_paf });

    Ok(if remote_paf {
        BondingMode::UsedPaf
    } else {
        BondingMode::NoBond
    })
}

/// Stores a newly learned bonding mode. Returns `true` if this replaced a
/// different, already resolved mode.
pub fn record_status(
    line: LineId,
    slot: &mut Cached<BondingMode>,
    mode: BondingMode,
) -> bool {
    let fluctuated = match *slot {
        Cached::Resolved(prev) if prev != mode => {
            ringbuf_entry!(Trace::Fluctuation {
                line,
                prev,
                new: mode
            });
            true
        }
        _ => false,
    };
    *slot = Cached::Resolved(mode);
    ringbuf_entry!(Trace::Resolved(line, Field::Status(mode)));
    fluctuated
}

/// Resolves the bonding status of `line` by asking the firmware for its TC
/// status.
pub fn refresh_status<F: Firmware, D: BondingDevice>(
    line: LineId,
    state: LineState,
    slot: &mut Cached<BondingMode>,
    fw: &F,
    dev: &D,
) -> Result<(), BndError> {
    if !ready(slot.is_resolved(), state) {
        return Ok(());
    }

    let ack = fw.tc_status_get(line).map_err(|e| {
        ringbuf_entry!(Trace::TcStatusFailed(line, e));
        e
    })?;
    let mode = classify(line, &ack, dev)?;
    record_status(line, slot, mode);
    Ok(())
}

/// Resolves whether the far end of `line` supports PAF bonding. On failure
/// the field stays unresolved.
pub fn refresh_remote_paf<D: BondingDevice>(
    line: LineId,
    state: LineState,
    slot: &mut Cached<bool>,
    dev: &D,
) -> Result<(), BndError> {
    if !ready(slot.is_resolved(), state) {
        return Ok(());
    }

    let supported = dev.paf_bnd_status_get(line).map_err(|e| {
        ringbuf_entry!(Trace::PafStatusFailed(line, e));
        e
    })?;
    *slot = Cached::Resolved(supported);
    ringbuf_entry!(Trace::Resolved(line, Field::RemotePaf(supported)));
    Ok(())
}

/// Resolves whether the far end of `line` supports IMA+ bonding.
///
/// The device is only asked if the firmware feature map says IMA+ bonding is
/// available. If it doesn't, or the feature map can't be read, the answer is
/// settled as "not supported". Only a failure of the device query itself
/// leaves the field unresolved.
pub fn refresh_remote_imap<F: Firmware, D: BondingDevice>(
    line: LineId,
    state: LineState,
    slot: &mut Cached<bool>,
    fw: &F,
    dev: &D,
) -> Result<(), BndError> {
    if !ready(slot.is_resolved(), state) {
        return Ok(());
    }

    let supported = match fw.feature_map_get(line) {
        Ok(map) if map.imap_bonding() => {
            dev.imap_bnd_status_get(line)
                .map_err(|e| {
                    ringbuf_entry!(Trace::ImapStatusFailed(line, e));
                    e
                })?
                .remote_imap_supported()
        }
        Ok(_) => false,
        Err(e) => {
            ringbuf_entry!(Trace::FeatureMapFailed(line, e));
            false
        }
    };
    *slot = Cached::Resolved(supported);
    ringbuf_entry!(Trace::Resolved(line, Field::RemoteImap(supported)));
    Ok(())
}

#[cfg(test)]
fn traced(t: Trace) -> bool {
    __RINGBUF.lock().iter().any(|ent| ent.payload == t)
}

/// Whether a change of bonding mode on `line` from `prev` to `new` has been
/// recorded.
#[cfg(test)]
pub(crate) fn fluctuation_traced(
    line: LineId,
    prev: BondingMode,
    new: BondingMode,
) -> bool {
    traced(Trace::Fluctuation { line, prev, new })
}
