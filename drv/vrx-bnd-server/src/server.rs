// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use drv_vrx_bnd_api::{
    BndConfigData, BndError, BndOk, BndStatusData, BndWarning, BondingMode,
    Caller, DslMode, EthCounters, EthDbgCounters, FwFeature, HsContinueData,
    HsStatusData, LineId, PortMode, SystemConfig,
};
use drv_vrx_bnd_api::fw::{PafHsContinue, TcStatusAck};
use ringbuf::*;

use crate::validate::{self, TcLayerCounts};
use crate::{cache, BondingDevice, Firmware, LineContexts, Outcome};

#[derive(Copy, Clone, Debug, PartialEq)]
enum Op {
    HwInit,
    ConfigSet,
    #[cfg(feature = "config-get")]
    ConfigGet,
    StatusGet,
    HsStatusGet,
    HsContinue,
    EthDbgCountersGet,
    EthCountersGet,
    PortModeSyncSet,
    BondingStatusSet,
}

#[derive(Copy, Clone, Debug, PartialEq)]
enum Trace {
    None,
    In(Op, LineId),
    Out(Op, Option<BndError>),
    PermissionDenied(Op),
    /// Two ports per device, but the firmware on this one can't do on-chip
    /// bonding.
    NoDualPortSupport { op: Op, device: u8 },
    Warning(Op, BndWarning),
    PersistFailed(LineId, BndError),
    TcLayerReadFailed(LineId, BndError),
    FeatureMapFailed(LineId, BndError),
    BadStatusPayload(usize),
    StatusRefreshFailed(LineId, BndError),
    RemotePafRefreshFailed(LineId, BndError),
    RemoteImapRefreshFailed(LineId, BndError),
}

ringbuf!(Trace, 64, Trace::None);

/// The bonding server: request handlers for one system of lines.
pub struct BndServer<S, F, D> {
    sys: SystemConfig,
    contexts: S,
    fw: F,
    dev: D,
}

impl<S, F, D> BndServer<S, F, D>
where
    S: LineContexts,
    F: Firmware,
    D: BondingDevice,
{
    pub fn new(sys: SystemConfig, contexts: S, fw: F, dev: D) -> Self {
        Self {
            sys,
            contexts,
            fw,
            dev,
        }
    }

    pub fn system(&self) -> &SystemConfig {
        &self.sys
    }

    pub fn contexts(&self) -> &S {
        &self.contexts
    }

    pub fn contexts_mut(&mut self) -> &mut S {
        &mut self.contexts
    }

    pub fn firmware(&self) -> &F {
        &self.fw
    }

    pub fn device(&self) -> &D {
        &self.dev
    }

    /// Common checks made before any handler does anything: the caller must
    /// be privileged, and the line must exist.
    fn enter(
        &self,
        op: Op,
        caller: Caller,
        line: LineId,
    ) -> Result<(), BndError> {
        if !caller.net_admin {
            ringbuf_entry!(Trace::PermissionDenied(op));
            return Err(BndError::PermissionDenied);
        }
        if !self.sys.contains(line) {
            return Err(BndError::InvalidParameter);
        }
        ringbuf_entry!(Trace::In(op, line));
        Ok(())
    }

    fn leave<T>(op: Op, r: Result<T, BndError>) -> Result<T, BndError> {
        ringbuf_entry!(Trace::Out(op, r.as_ref().err().copied()));
        r
    }

    /// On-chip bonding needs dual-port firmware whenever a device carries two
    /// lines.
    fn bonding_unsupported(&self, line: LineId) -> bool {
        self.sys.is_dual_port() && !self.fw.supports(line, FwFeature::DualPort)
    }

    pub fn hw_init(
        &mut self,
        caller: Caller,
        line: LineId,
    ) -> Result<(), BndError> {
        self.enter(Op::HwInit, caller, line)?;
        Self::leave(Op::HwInit, self.dev.hw_init(line))
    }

    /// Sets the bonding configuration for `raw_mode` on every line.
    ///
    /// The request is checked against the TC layers of all lines first, and
    /// if that check fails, bonding is stored as off. The check's error is
    /// still returned. If the firmware can't do bonding at all, nothing is
    /// stored and a warning is returned.
    pub fn config_set(
        &mut self,
        caller: Caller,
        line: LineId,
        raw_mode: u32,
        request: BndConfigData,
    ) -> Result<BndOk, BndError> {
        self.enter(Op::ConfigSet, caller, line)?;
        let mode = DslMode::from_raw(raw_mode)?;

        if self.bonding_unsupported(line) {
            ringbuf_entry!(Trace::NoDualPortSupport {
                op: Op::ConfigSet,
                device: self.sys.device_of(line),
            });
            let w = BndWarning::NotSupportedByFirmware;
            ringbuf_entry!(Trace::Warning(Op::ConfigSet, w));
            return Self::leave(Op::ConfigSet, Ok(BndOk::Warn(w)));
        }

        let mut outcome = Outcome::default();

        let mut counts = TcLayerCounts::default();
        for l in self.sys.lines() {
            match self.contexts.tc_layer(l, mode) {
                Ok(tc) => counts.add(tc),
                Err(e) => {
                    ringbuf_entry!(Trace::TcLayerReadFailed(l, e));
                    outcome.error(e);
                }
            }
        }

        let mut config = request;
        let decision = validate::validate(
            mode,
            &mut config.paf_enable,
            &mut config.imap_enable,
            counts,
        );
        outcome.merge(decision.result());

        if self.sys.bonding_enabled {
            for l in self.sys.lines() {
                let r = self.contexts.set_bnd_config(l, mode, config);
                if let Err(e) = r {
                    ringbuf_entry!(Trace::PersistFailed(l, e));
                }
                outcome.merge_unit(r);
            }
        }

        let r = outcome.into_result();
        if let Some(w) = r.ok().and_then(BndOk::warning) {
            ringbuf_entry!(Trace::Warning(Op::ConfigSet, w));
        }
        Self::leave(Op::ConfigSet, r)
    }

    /// Reads back the bonding configuration stored for `line`.
    #[cfg(feature = "config-get")]
    pub fn config_get(
        &mut self,
        caller: Caller,
        line: LineId,
        raw_mode: u32,
    ) -> Result<BndConfigData, BndError> {
        self.enter(Op::ConfigGet, caller, line)?;
        let mode = DslMode::from_raw(raw_mode)?;
        Self::leave(Op::ConfigGet, self.contexts.bnd_config(line, mode))
    }

    /// Reports bonding in use on `line` and what the far end supports.
    ///
    /// A field that can't be resolved right now (line not up far enough, or
    /// a failed query) reads as off; this doesn't fail the request. The far
    /// end's IMA+ support is only reported if the firmware feature map, read
    /// fresh on every call, says IMA+ bonding is available.
    ///
    /// A failure to read that feature map does fail the request, and the
    /// bonding status and remote PAF support gathered before it are not
    /// returned. They stay resolved in the cache, so the next request that
    /// gets a feature map reports them without asking the firmware again.
    pub fn status_get(
        &mut self,
        caller: Caller,
        line: LineId,
    ) -> Result<BndStatusData, BndError> {
        self.enter(Op::StatusGet, caller, line)?;

        let mut data = BndStatusData::default();

        match self.bonding_status_check(line) {
            Ok(BondingMode::UsedPaf) => data.paf_enable = true,
            Ok(BondingMode::UsedImap) => data.imap_enable = true,
            Ok(BondingMode::NoBond) => (),
            Err(e) => ringbuf_entry!(Trace::StatusRefreshFailed(line, e)),
        }

        match self.remote_paf_available_check(line) {
            Ok(supported) => data.remote_paf_supported = supported,
            Err(e) => ringbuf_entry!(Trace::RemotePafRefreshFailed(line, e)),
        }

        let map = self.fw.feature_map_get(line).map_err(|e| {
            ringbuf_entry!(Trace::FeatureMapFailed(line, e));
            e
        });
        let r = match map {
            Ok(map) => {
                if map.imap_bonding() {
                    match self.remote_imap_available_check(line) {
                        Ok(v) => data.remote_imap_supported = v,
                        Err(e) => ringbuf_entry!(
                            Trace::RemoteImapRefreshFailed(line, e)
                        ),
                    }
                }
                Ok(data)
            }
            Err(e) => Err(e),
        };
        Self::leave(Op::StatusGet, r)
    }

    /// Returns the G.HS bonding handshake state of `line`, or `None` if the
    /// firmware can't do on-chip bonding and so has nothing to report.
    pub fn hs_status_get(
        &mut self,
        caller: Caller,
        line: LineId,
    ) -> Result<Option<HsStatusData>, BndError> {
        self.enter(Op::HsStatusGet, caller, line)?;

        let r = if self.bonding_unsupported(line) {
            ringbuf_entry!(Trace::NoDualPortSupport {
                op: Op::HsStatusGet,
                device: self.sys.device_of(line),
            });
            Ok(None)
        } else {
            self.dev
                .hs_status_get(line)
                .map(|raw| Some(HsStatusData::from(&raw)))
        };
        Self::leave(Op::HsStatusGet, r)
    }

    pub fn hs_continue(
        &mut self,
        caller: Caller,
        line: LineId,
        data: &HsContinueData,
    ) -> Result<(), BndError> {
        self.enter(Op::HsContinue, caller, line)?;
        let cmd = PafHsContinue::from(data);
        Self::leave(Op::HsContinue, self.dev.hs_continue(line, &cmd))
    }

    pub fn eth_dbg_counters_get(
        &mut self,
        caller: Caller,
        line: LineId,
    ) -> Result<EthDbgCounters, BndError> {
        self.enter(Op::EthDbgCountersGet, caller, line)?;
        let r = self.dev.eth_dbg_counters_get(line);
        Self::leave(Op::EthDbgCountersGet, r)
    }

    pub fn eth_counters_get(
        &mut self,
        caller: Caller,
        line: LineId,
    ) -> Result<EthCounters, BndError> {
        self.enter(Op::EthCountersGet, caller, line)?;
        Self::leave(Op::EthCountersGet, self.dev.eth_counters_get(line))
    }

    pub fn port_mode_sync_set(
        &mut self,
        caller: Caller,
        line: LineId,
        raw_mode: u32,
    ) -> Result<(), BndError> {
        self.enter(Op::PortModeSyncSet, caller, line)?;
        let r = PortMode::from_raw(raw_mode)
            .and_then(|mode| self.contexts.set_port_mode(line, mode));
        Self::leave(Op::PortModeSyncSet, r)
    }

    /// Bonding mode in use on `line`, resolving it from the firmware if
    /// needed. Reads as no bonding until the line reaches FULL_INIT.
    pub fn bonding_status_check(
        &mut self,
        line: LineId,
    ) -> Result<BondingMode, BndError> {
        let state = self.contexts.line_state(line)?;
        let slot = &mut self.contexts.bonding_mut(line)?.status;
        cache::refresh_status(line, state, slot, &self.fw, &self.dev)?;
        Ok(slot.value_or_default())
    }

    /// Whether the far end of `line` supports PAF bonding.
    pub fn remote_paf_available_check(
        &mut self,
        line: LineId,
    ) -> Result<bool, BndError> {
        let state = self.contexts.line_state(line)?;
        let slot = &mut self.contexts.bonding_mut(line)?.remote_paf;
        cache::refresh_remote_paf(line, state, slot, &self.dev)?;
        Ok(slot.value_or_default())
    }

    /// Whether the far end of `line` supports IMA+ bonding.
    pub fn remote_imap_available_check(
        &mut self,
        line: LineId,
    ) -> Result<bool, BndError> {
        let state = self.contexts.line_state(line)?;
        let slot = &mut self.contexts.bonding_mut(line)?.remote_imap;
        cache::refresh_remote_imap(line, state, slot, &self.fw, &self.dev)?;
        Ok(slot.value_or_default())
    }

    /// Tries to resolve every bonding field of `line` that isn't resolved
    /// yet. A failure on one field is recorded and doesn't keep the others
    /// from being tried.
    pub fn bonding_status_update(&mut self, line: LineId) {
        if let Err(e) = self.bonding_status_check(line) {
            ringbuf_entry!(Trace::StatusRefreshFailed(line, e));
        }
        if let Err(e) = self.remote_paf_available_check(line) {
            ringbuf_entry!(Trace::RemotePafRefreshFailed(line, e));
        }
        if let Err(e) = self.remote_imap_available_check(line) {
            ringbuf_entry!(Trace::RemoteImapRefreshFailed(line, e));
        }
    }

    /// Takes in a TC status message (acknowledgement or autonomous event)
    /// from the firmware, records the bonding mode it carries, and then
    /// fills in whatever else about bonding on `line` can now be resolved.
    pub fn bonding_status_set(
        &mut self,
        line: LineId,
        payload: &[u8],
    ) -> Result<(), BndError> {
        ringbuf_entry!(Trace::In(Op::BondingStatusSet, line));
        let Some(ack) = TcStatusAck::parse(payload) else {
            ringbuf_entry!(Trace::BadStatusPayload(payload.len()));
            return Self::leave(Op::BondingStatusSet, Err(BndError::Internal));
        };

        let r = cache::classify(line, &ack, &self.dev).and_then(|mode| {
            let slot = &mut self.contexts.bonding_mut(line)?.status;
            cache::record_status(line, slot, mode);
            Ok(())
        });
        if r.is_ok() {
            self.bonding_status_update(line);
        }
        Self::leave(Op::BondingStatusSet, r)
    }
}
