// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Per-line state owned by the surrounding system.

use drv_vrx_bnd_api::{
    BndConfigData, BndError, BondingMode, DslMode, LineId, LineState,
    PortMode, SystemConfig, TcLayer,
};

/// A value that is only meaningful once it has been fetched from the
/// firmware.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum Cached<T> {
    #[default]
    Unresolved,
    Resolved(T),
}

impl<T: Copy + Default> Cached<T> {
    pub fn is_resolved(&self) -> bool {
        matches!(self, Cached::Resolved(_))
    }

    pub fn get(&self) -> Option<T> {
        match self {
            Cached::Unresolved => None,
            Cached::Resolved(v) => Some(*v),
        }
    }

    /// What a reader sees: the resolved value, or the zero value if the line
    /// hasn't gotten far enough to know.
    pub fn value_or_default(&self) -> T {
        self.get().unwrap_or_default()
    }
}

/// Bonding facts learned from the firmware, each resolved independently.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct BondingCache {
    /// Bonding actually in use on the line.
    pub status: Cached<BondingMode>,
    /// Far end supports PAF bonding.
    pub remote_paf: Cached<bool>,
    /// Far end supports IMA+ bonding.
    pub remote_imap: Cached<bool>,
}

/// Access to per-line state. Every accessor is an independent operation;
/// callers never rely on holding anything across two of them.
pub trait LineContexts {
    fn line_state(&self, line: LineId) -> Result<LineState, BndError>;

    fn tc_layer(&self, line: LineId, mode: DslMode)
        -> Result<TcLayer, BndError>;

    fn bnd_config(
        &self,
        line: LineId,
        mode: DslMode,
    ) -> Result<BndConfigData, BndError>;

    fn set_bnd_config(
        &mut self,
        line: LineId,
        mode: DslMode,
        config: BndConfigData,
    ) -> Result<(), BndError>;

    fn port_mode(&self, line: LineId) -> Result<PortMode, BndError>;

    fn set_port_mode(
        &mut self,
        line: LineId,
        mode: PortMode,
    ) -> Result<(), BndError>;

    fn bonding(&self, line: LineId) -> Result<&BondingCache, BndError>;

    fn bonding_mut(
        &mut self,
        line: LineId,
    ) -> Result<&mut BondingCache, BndError>;
}

/// Everything kept for a single line.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct LineContext {
    pub line_state: LineState,
    /// Indexed by `DslMode`.
    pub tc_layer: [TcLayer; 2],
    /// Indexed by `DslMode`.
    pub bnd_config: [BndConfigData; 2],
    pub port_mode: PortMode,
    pub bonding: BondingCache,
}

/// In-memory line table with room for up to `N` lines.
#[derive(Debug)]
pub struct ContextTable<const N: usize> {
    lines: heapless::Vec<LineContext, N>,
}

impl<const N: usize> ContextTable<N> {
    /// Creates one freshly initialized context per line of `sys`.
    pub fn new(sys: &SystemConfig) -> Result<Self, BndError> {
        let mut lines = heapless::Vec::new();
        lines
            .resize_default(sys.total_lines())
            .map_err(|_| BndError::ContextAccess)?;
        Ok(Self { lines })
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    fn get(&self, line: LineId) -> Result<&LineContext, BndError> {
        self.lines.get(line.index()).ok_or(BndError::ContextAccess)
    }

    fn get_mut(&mut self, line: LineId) -> Result<&mut LineContext, BndError> {
        self.lines
            .get_mut(line.index())
            .ok_or(BndError::ContextAccess)
    }

    /// Records a line state change reported by the line state machine.
    ///
    /// Nothing in the bonding cache is cleared here, even if the line drops
    /// back below FULL_INIT; a resolved status is only replaced by the next
    /// bonding status event.
    pub fn set_line_state(
        &mut self,
        line: LineId,
        state: LineState,
    ) -> Result<(), BndError> {
        self.get_mut(line)?.line_state = state;
        Ok(())
    }

    pub fn set_tc_layer(
        &mut self,
        line: LineId,
        mode: DslMode,
        tc: TcLayer,
    ) -> Result<(), BndError> {
        self.get_mut(line)?.tc_layer[mode.index()] = tc;
        Ok(())
    }
}

impl<const N: usize> LineContexts for ContextTable<N> {
    fn line_state(&self, line: LineId) -> Result<LineState, BndError> {
        Ok(self.get(line)?.line_state)
    }

    fn tc_layer(
        &self,
        line: LineId,
        mode: DslMode,
    ) -> Result<TcLayer, BndError> {
        Ok(self.get(line)?.tc_layer[mode.index()])
    }

    fn bnd_config(
        &self,
        line: LineId,
        mode: DslMode,
    ) -> Result<BndConfigData, BndError> {
        Ok(self.get(line)?.bnd_config[mode.index()])
    }

    fn set_bnd_config(
        &mut self,
        line: LineId,
        mode: DslMode,
        config: BndConfigData,
    ) -> Result<(), BndError> {
        self.get_mut(line)?.bnd_config[mode.index()] = config;
        Ok(())
    }

    fn port_mode(&self, line: LineId) -> Result<PortMode, BndError> {
        Ok(self.get(line)?.port_mode)
    }

    fn set_port_mode(
        &mut self,
        line: LineId,
        mode: PortMode,
    ) -> Result<(), BndError> {
        self.get_mut(line)?.port_mode = mode;
        Ok(())
    }

    fn bonding(&self, line: LineId) -> Result<&BondingCache, BndError> {
        Ok(&self.get(line)?.bonding)
    }

    fn bonding_mut(
        &mut self,
        line: LineId,
    ) -> Result<&mut BondingCache, BndError> {
        Ok(&mut self.get_mut(line)?.bonding)
    }
}
