// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! API crate for the VRX xDSL bonding server.
//!
//! These are the types that cross the boundary between the bonding server and
//! whoever is driving it (the ioctl dispatch layer of the driver, the control
//! daemon): request and reply payloads, the enumerations they carry, and the
//! error code space. The layouts of the firmware messages the server consumes
//! live in [`fw`].

#![cfg_attr(not(test), no_std)]

use num_derive::FromPrimitive;
use num_traits::FromPrimitive as _;
use serde::Deserialize;

pub mod fw;

/// Upper bound on the number of lines (across all devices) a server can
/// manage.
pub const MAX_LINES: usize = 4;

/// Generates the conversions between a code enum and the integer widths the
/// dispatch layer uses on the wire.
macro_rules! code_conversions {
    ($ident:ident) => {
        impl From<$ident> for u16 {
            fn from(v: $ident) -> Self {
                v as u16
            }
        }
        impl From<$ident> for u32 {
            fn from(v: $ident) -> Self {
                v as u32
            }
        }
        impl core::convert::TryFrom<u32> for $ident {
            type Error = ();
            fn try_from(v: u32) -> Result<Self, Self::Error> {
                Self::from_u32(v).ok_or(())
            }
        }
    };
}

/// Hard failures. A request that ends in one of these has either not been
/// applied at all, or (for the tc-layer conflicts) has been applied with
/// bonding forced off.
#[derive(Copy, Clone, Debug, Eq, PartialEq, FromPrimitive)]
pub enum BndError {
    /// Caller lacks network-admin privilege.
    PermissionDenied = 1,
    /// Unknown line, or an unrecognized DSL mode.
    InvalidParameter = 2,
    /// Enumerated value outside of its defined range.
    ParamRange = 3,
    /// Requested bonding mode conflicts with a configured TC layer.
    ConfigVsTcLayer = 4,
    /// IMA+ (ATM) bonding was requested for VDSL.
    ImapOnlySupportedInAdsl = 5,
    /// A firmware message exchange failed.
    Communication = 6,
    /// Malformed input to an internal helper.
    Internal = 7,
    /// The line context could not be read or written.
    ContextAccess = 8,
    /// A device-specific operation failed.
    DeviceFailure = 9,
}

code_conversions!(BndError);

/// Warning-class results: the request went through, but the caller should
/// know something about it.
#[derive(Copy, Clone, Debug, Eq, PartialEq, FromPrimitive)]
pub enum BndWarning {
    /// Bonding was accepted, but some line has a TC layer (typically AUTO)
    /// that may end up incompatible with it.
    ConfigVsTcLayer = 1,
    /// The firmware build has no dual-port support, so bonding could not be
    /// enabled. Nothing was changed.
    NotSupportedByFirmware = 2,
}

code_conversions!(BndWarning);

/// Successful completion of a request, possibly with a warning attached.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum BndOk {
    Done,
    Warn(BndWarning),
}

impl BndOk {
    pub fn warning(self) -> Option<BndWarning> {
        match self {
            BndOk::Done => None,
            BndOk::Warn(w) => Some(w),
        }
    }
}

/// DSL flavor a piece of configuration applies to.
#[derive(Copy, Clone, Debug, Eq, PartialEq, FromPrimitive)]
pub enum DslMode {
    Adsl = 0,
    Vdsl = 1,
}

impl DslMode {
    pub const ALL: [DslMode; 2] = [DslMode::Adsl, DslMode::Vdsl];

    /// Decodes a mode received from a client.
    pub fn from_raw(raw: u32) -> Result<Self, BndError> {
        Self::from_u32(raw).ok_or(BndError::InvalidParameter)
    }

    pub fn index(self) -> usize {
        self as usize
    }
}

/// Transmission convergence layer configured for a line.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, FromPrimitive)]
pub enum TcLayer {
    #[default]
    Unknown = 0,
    Atm = 1,
    Efm = 2,
    Hdlc = 3,
    Auto = 4,
    EfmForced = 5,
}

/// Bonding actually in use on a line, as reported by the firmware.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, FromPrimitive)]
pub enum BondingMode {
    #[default]
    NoBond = 0,
    UsedPaf = 1,
    UsedImap = 2,
}

/// Port mode of a bonding link.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, FromPrimitive)]
pub enum PortMode {
    #[default]
    Na = 0,
    Single = 1,
    Dual = 2,
}

impl PortMode {
    /// Decodes a port mode received from a client.
    pub fn from_raw(raw: u32) -> Result<Self, BndError> {
        Self::from_u32(raw).ok_or(BndError::ParamRange)
    }
}

/// Discovery or aggregation command received from the far end during G.HS.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, FromPrimitive)]
pub enum ActivationMode {
    #[default]
    NoCommand = 0,
    DiscoverySetIfClear = 1,
    DiscoveryClearIfSame = 2,
    AggregateSet = 4,
    AggregateClr = 8,
}

/// Firmware build features that can be queried on a device.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum FwFeature {
    /// Two ports served by one firmware image; required for on-chip bonding.
    DualPort,
}

/// Index of a physical line across all devices in the system.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd)]
pub struct LineId(pub u8);

impl LineId {
    pub fn index(self) -> usize {
        usize::from(self.0)
    }
}

/// Raw line state code. The codes are ordered by how far a line has
/// progressed through initialization, so "at least in state X" is a plain
/// comparison.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Ord, PartialOrd)]
pub struct LineState(pub u32);

impl LineState {
    pub const NOT_INITIALIZED: Self = Self(0x0);
    pub const IDLE: Self = Self(0x100);
    pub const SILENT: Self = Self(0x200);
    pub const HANDSHAKE: Self = Self(0x300);
    pub const FULL_INIT: Self = Self(0x380);
    pub const DISCOVERY: Self = Self(0x400);
    pub const TRAINING: Self = Self(0x500);
    pub const ANALYSIS: Self = Self(0x600);
    pub const EXCHANGE: Self = Self(0x700);
    pub const SHOWTIME_NO_SYNC: Self = Self(0x800);
    pub const SHOWTIME_TC_SYNC: Self = Self(0x801);

    /// Whether firmware-reported bonding fields are meaningful yet.
    pub fn reached_full_init(self) -> bool {
        self >= Self::FULL_INIT
    }
}

/// Identity of whoever issued a request.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Caller {
    pub net_admin: bool,
}

impl Caller {
    pub const ADMIN: Self = Self { net_admin: true };
    pub const UNPRIVILEGED: Self = Self { net_admin: false };
}

/// Requested bonding for one DSL mode.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct BndConfigData {
    /// PAF (PTM) bonding.
    pub paf_enable: bool,
    /// IMA+ (ATM) bonding.
    pub imap_enable: bool,
}

/// Bonding status of a line, near end and far end.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct BndStatusData {
    pub paf_enable: bool,
    pub imap_enable: bool,
    pub remote_paf_supported: bool,
    pub remote_imap_supported: bool,
}

/// Bonding handshake state as seen during G.HS.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct HsStatusData {
    pub remote_paf_supported: bool,
    pub activation_mode: ActivationMode,
    /// Discovery code received in the initial CL during a "Set if Clear" or
    /// "Clear if Same" exchange, most significant byte first.
    pub discovery_code: [u8; 6],
    /// Aggregate data received in the initial CL with a "Set" command.
    pub aggregate_data: u32,
}

/// Values to answer the far end with when continuing the handshake.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct HsContinueData {
    /// Remote discovery register value to use in CLR.
    pub discovery_code: [u8; 6],
    /// Aggregate data to use in CLR.
    pub aggregate_data: u32,
}

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct EthDbgCounters {
    /// Link 0 plus link 1 fragments, less dropped ones.
    pub rx_good_fragments: u32,
    pub rx_packets: u16,
    pub rx_fragments_link0: u16,
    pub rx_fragments_link1: u16,
    pub rx_fragments_drop: u16,
    pub tx_packets: u16,
    pub tx_fragments_link0: u16,
    pub tx_fragments_link1: u16,
    pub control_register: u16,
}

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct EthCounters {
    pub rx_errored_fragments: u32,
    pub rx_small_fragments: u32,
    pub rx_large_fragments: u32,
    pub rx_lost_fragments: u16,
    pub rx_lost_starts: u16,
    pub rx_lost_ends: u16,
    pub rx_overflows: u32,
    pub rx_bad_fragments: u16,
}

/// Shape of the system the server is managing.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct SystemConfig {
    pub lines_per_device: u8,
    pub device_number: u8,
    /// When clear, bonding configuration requests are validated but never
    /// stored.
    #[serde(default = "default_bonding_enabled")]
    pub bonding_enabled: bool,
}

fn default_bonding_enabled() -> bool {
    true
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            lines_per_device: 2,
            device_number: 1,
            bonding_enabled: true,
        }
    }
}

impl SystemConfig {
    pub fn total_lines(&self) -> usize {
        usize::from(self.lines_per_device) * usize::from(self.device_number)
    }

    /// Two ports share a device; bonding then needs firmware support.
    pub fn is_dual_port(&self) -> bool {
        self.lines_per_device == 2
    }

    pub fn lines(&self) -> impl Iterator<Item = LineId> {
        // total_lines() can't exceed 255 * 255, but LineId is a u8; lines
        // beyond that are unaddressable anyway.
        (0..self.total_lines().min(usize::from(u8::MAX) + 1))
            .map(|i| LineId(i as u8))
    }

    pub fn contains(&self, line: LineId) -> bool {
        line.index() < self.total_lines()
    }

    /// Device a line belongs to.
    pub fn device_of(&self, line: LineId) -> u8 {
        match self.lines_per_device {
            0 => 0,
            n => line.0 / n,
        }
    }
}
