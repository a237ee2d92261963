// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Bonding configuration and status server for VRX xDSL devices.
//!
//! Bonding ties two physical lines together into one logical link, either at
//! the packet layer (PAF, for PTM) or at the cell layer (IMA+, for ATM). This
//! crate decides whether a requested bonding setup is consistent with the TC
//! layers configured across the system ([`validate`]), keeps a lazily
//! resolved record of what bonding the firmware and the far end actually
//! ended up with ([`cache`]), and implements the request handlers on top of
//! both ([`BndServer`]).
//!
//! The server doesn't talk to hardware itself. It is handed three
//! collaborators: a [`LineContexts`] store holding per-line state, a
//! [`Firmware`] message gateway, and a [`BondingDevice`] for the
//! device-specific bits.

#![cfg_attr(not(test), no_std)]

use drv_vrx_bnd_api::fw::{
    FeatureMapAck, ImapHsStatus, PafHsContinue, PafHsStatus, TcStatusAck,
};
use drv_vrx_bnd_api::{
    BndError, BndOk, BndWarning, EthCounters, EthDbgCounters, FwFeature,
    LineId,
};

pub mod cache;
mod context;
mod server;
pub mod validate;

#[cfg(test)]
mod mock;

pub use context::{
    BondingCache, Cached, ContextTable, LineContext, LineContexts,
};
pub use server::BndServer;

/// Messages the server exchanges with the modem firmware.
pub trait Firmware {
    /// Sends `TcStatusGet` and returns the acknowledgement.
    fn tc_status_get(&self, line: LineId) -> Result<TcStatusAck, BndError>;

    /// Sends `FeatureMapGet` and returns the acknowledgement.
    fn feature_map_get(&self, line: LineId)
        -> Result<FeatureMapAck, BndError>;

    /// Whether the firmware build running on `line`'s device has `feature`.
    fn supports(&self, line: LineId, feature: FwFeature) -> bool;
}

/// Device-specific bonding operations. Handshake state moves in the
/// device's own register layouts; the server converts to and from the
/// caller-facing forms.
pub trait BondingDevice {
    fn hw_init(&self, line: LineId) -> Result<(), BndError>;

    /// Reads the PAF handshake status registers.
    fn hs_status_get(&self, line: LineId) -> Result<PafHsStatus, BndError>;

    /// Writes the discovery code and aggregate data back and lets the
    /// handshake proceed.
    fn hs_continue(
        &self,
        line: LineId,
        cmd: &PafHsContinue,
    ) -> Result<(), BndError>;

    fn eth_dbg_counters_get(
        &self,
        line: LineId,
    ) -> Result<EthDbgCounters, BndError>;

    fn eth_counters_get(&self, line: LineId) -> Result<EthCounters, BndError>;

    /// Whether the far end has PAF bonding enabled.
    fn paf_bnd_status_get(&self, line: LineId) -> Result<bool, BndError>;

    /// IMA+ handshake status, including whether the far end has IMA+ bonding
    /// enabled.
    fn imap_bnd_status_get(
        &self,
        line: LineId,
    ) -> Result<ImapHsStatus, BndError>;
}

/// Result of an operation made of several steps that all get attempted even
/// if some of them fail. The first error sticks; a warning is kept unless an
/// error comes along.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub(crate) struct Outcome(Result<BndOk, BndError>);

impl Default for Outcome {
    fn default() -> Self {
        Outcome(Ok(BndOk::Done))
    }
}

impl Outcome {
    pub fn error(&mut self, e: BndError) {
        if self.0.is_ok() {
            self.0 = Err(e);
        }
    }

    pub fn warning(&mut self, w: BndWarning) {
        if self.0 == Ok(BndOk::Done) {
            self.0 = Ok(BndOk::Warn(w));
        }
    }

    pub fn merge(&mut self, r: Result<BndOk, BndError>) {
        match r {
            Ok(BndOk::Done) => (),
            Ok(BndOk::Warn(w)) => self.warning(w),
            Err(e) => self.error(e),
        }
    }

    pub fn merge_unit(&mut self, r: Result<(), BndError>) {
        if let Err(e) = r {
            self.error(e);
        }
    }

    pub fn into_result(self) -> Result<BndOk, BndError> {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_error_wins() {
        let mut o = Outcome::default();
        o.merge_unit(Ok(()));
        o.error(BndError::ContextAccess);
        o.error(BndError::Communication);
        assert_eq!(o.into_result(), Err(BndError::ContextAccess));
    }

    #[test]
    fn error_displaces_warning() {
        let mut o = Outcome::default();
        o.warning(BndWarning::ConfigVsTcLayer);
        assert_eq!(
            o.into_result(),
            Ok(BndOk::Warn(BndWarning::ConfigVsTcLayer))
        );
        o.merge(Err(BndError::ConfigVsTcLayer));
        o.warning(BndWarning::NotSupportedByFirmware);
        assert_eq!(o.into_result(), Err(BndError::ConfigVsTcLayer));
    }
}
