// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Stand-ins for the collaborators of the bonding server. Replies are
//! programmed through the `Cell`s; every call is counted.

use core::cell::Cell;

use drv_vrx_bnd_api::fw::{
    FeatureMapAck, ImapHsStatus, PafHsContinue, PafHsStatus, TcStatusAck,
    BONDING_NO_BOND, TC_EFM,
};
use drv_vrx_bnd_api::{
    BndConfigData, BndError, DslMode, EthCounters, EthDbgCounters, FwFeature,
    LineId, LineState, PortMode, SystemConfig, TcLayer, MAX_LINES,
};
use zerocopy::little_endian::U16;

use crate::{
    BndServer, BondingCache, BondingDevice, ContextTable, Firmware,
    LineContexts,
};

fn bump(c: &Cell<usize>) {
    c.set(c.get() + 1);
}

pub struct MockFirmware {
    pub tc_status: Cell<Result<TcStatusAck, BndError>>,
    pub feature_map: Cell<Result<FeatureMapAck, BndError>>,
    pub dual_port: Cell<bool>,
    pub tc_status_calls: Cell<usize>,
    pub feature_map_calls: Cell<usize>,
}

impl Default for MockFirmware {
    fn default() -> Self {
        Self {
            tc_status: Cell::new(Ok(TcStatusAck::with_bonding(
                TC_EFM,
                BONDING_NO_BOND,
            ))),
            feature_map: Cell::new(Ok(FeatureMapAck::new([0; 4]))),
            dual_port: Cell::new(true),
            tc_status_calls: Cell::new(0),
            feature_map_calls: Cell::new(0),
        }
    }
}

impl Firmware for MockFirmware {
    fn tc_status_get(&self, _line: LineId) -> Result<TcStatusAck, BndError> {
        bump(&self.tc_status_calls);
        self.tc_status.get()
    }

    fn feature_map_get(
        &self,
        _line: LineId,
    ) -> Result<FeatureMapAck, BndError> {
        bump(&self.feature_map_calls);
        self.feature_map.get()
    }

    fn supports(&self, _line: LineId, feature: FwFeature) -> bool {
        match feature {
            FwFeature::DualPort => self.dual_port.get(),
        }
    }
}

pub struct MockDevice {
    pub hw_init_reply: Cell<Result<(), BndError>>,
    pub hw_init_calls: Cell<usize>,
    pub hs_status: Cell<Result<PafHsStatus, BndError>>,
    pub hs_status_calls: Cell<usize>,
    pub hs_continue_last: Cell<Option<(LineId, PafHsContinue)>>,
    pub eth_dbg: Cell<Result<EthDbgCounters, BndError>>,
    pub eth: Cell<Result<EthCounters, BndError>>,
    pub paf: Cell<Result<bool, BndError>>,
    pub paf_calls: Cell<usize>,
    /// Drives the `imap_enable` flag of the IMA+ handshake status.
    pub imap: Cell<Result<bool, BndError>>,
    pub imap_calls: Cell<usize>,
}

impl Default for MockDevice {
    fn default() -> Self {
        Self {
            hw_init_reply: Cell::new(Ok(())),
            hw_init_calls: Cell::new(0),
            hs_status: Cell::new(Ok(PafHsStatus::default())),
            hs_status_calls: Cell::new(0),
            hs_continue_last: Cell::new(None),
            eth_dbg: Cell::new(Ok(EthDbgCounters::default())),
            eth: Cell::new(Ok(EthCounters::default())),
            paf: Cell::new(Ok(false)),
            paf_calls: Cell::new(0),
            imap: Cell::new(Ok(false)),
            imap_calls: Cell::new(0),
        }
    }
}

impl BondingDevice for MockDevice {
    fn hw_init(&self, _line: LineId) -> Result<(), BndError> {
        bump(&self.hw_init_calls);
        self.hw_init_reply.get()
    }

    fn hs_status_get(&self, _line: LineId) -> Result<PafHsStatus, BndError> {
        bump(&self.hs_status_calls);
        self.hs_status.get()
    }

    fn hs_continue(
        &self,
        line: LineId,
        cmd: &PafHsContinue,
    ) -> Result<(), BndError> {
        self.hs_continue_last.set(Some((line, *cmd)));
        Ok(())
    }

    fn eth_dbg_counters_get(
        &self,
        _line: LineId,
    ) -> Result<EthDbgCounters, BndError> {
        self.eth_dbg.get()
    }

    fn eth_counters_get(&self, _line: LineId) -> Result<EthCounters, BndError> {
        self.eth.get()
    }

    fn paf_bnd_status_get(&self, _line: LineId) -> Result<bool, BndError> {
        bump(&self.paf_calls);
        self.paf.get()
    }

    fn imap_bnd_status_get(
        &self,
        _line: LineId,
    ) -> Result<ImapHsStatus, BndError> {
        bump(&self.imap_calls);
        self.imap.get().map(|on| ImapHsStatus {
            imap_enable: u8::from(on),
            max_diff_delay_ds: U16::new(0),
        })
    }
}

/// A line table whose bonding configuration writes fail for one chosen line.
pub struct FlakyContexts {
    pub inner: ContextTable<MAX_LINES>,
    pub fail_writes_on: Option<LineId>,
    pub write_attempts: Vec<LineId>,
}

impl FlakyContexts {
    pub fn new(sys: &SystemConfig) -> Self {
        Self {
            inner: ContextTable::new(sys).unwrap(),
            fail_writes_on: None,
            write_attempts: Vec::new(),
        }
    }
}

impl LineContexts for FlakyContexts {
    fn line_state(&self, line: LineId) -> Result<LineState, BndError> {
        self.inner.line_state(line)
    }

    fn tc_layer(
        &self,
        line: LineId,
        mode: DslMode,
    ) -> Result<TcLayer, BndError> {
        self.inner.tc_layer(line, mode)
    }

    fn bnd_config(
        &self,
        line: LineId,
        mode: DslMode,
    ) -> Result<BndConfigData, BndError> {
        self.inner.bnd_config(line, mode)
    }

    fn set_bnd_config(
        &mut self,
        line: LineId,
        mode: DslMode,
        config: BndConfigData,
    ) -> Result<(), BndError> {
        self.write_attempts.push(line);
        if self.fail_writes_on == Some(line) {
            return Err(BndError::ContextAccess);
        }
        self.inner.set_bnd_config(line, mode, config)
    }

    fn port_mode(&self, line: LineId) -> Result<PortMode, BndError> {
        self.inner.port_mode(line)
    }

    fn set_port_mode(
        &mut self,
        line: LineId,
        mode: PortMode,
    ) -> Result<(), BndError> {
        self.inner.set_port_mode(line, mode)
    }

    fn bonding(&self, line: LineId) -> Result<&BondingCache, BndError> {
        self.inner.bonding(line)
    }

    fn bonding_mut(
        &mut self,
        line: LineId,
    ) -> Result<&mut BondingCache, BndError> {
        self.inner.bonding_mut(line)
    }
}

pub fn server(
    sys: SystemConfig,
) -> BndServer<ContextTable<MAX_LINES>, MockFirmware, MockDevice> {
    BndServer::new(
        sys,
        ContextTable::new(&sys).unwrap(),
        MockFirmware::default(),
        MockDevice::default(),
    )
}
