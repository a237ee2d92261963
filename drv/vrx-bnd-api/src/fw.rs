// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Layouts of the VRX firmware messages used by the bonding server.
//!
//! All multi-byte fields are little-endian 16- or 32-bit words with no
//! padding between them. Each message starts with the usual `index`/`length`
//! header, where `length` counts the 16-bit payload words that follow.

use static_assertions::const_assert_eq;
use zerocopy::little_endian::{U16, U32};
use zerocopy::FromBytes;

use crate::{ActivationMode, BondingMode, HsContinueData, HsStatusData};

/// `TC` value: not yet known (before FULL_INIT in VDSL).
pub const TC_UNKNOWN: u16 = 0x0;
/// `TC` value: EFM (PTM).
pub const TC_EFM: u16 = 0x1;
/// `TC` value: ATM.
pub const TC_ATM: u16 = 0x2;

/// `Bonding` value: no bonding in use.
pub const BONDING_NO_BOND: u16 = 0x0;
/// `Bonding` value: PAF bonding in use.
pub const BONDING_PAF: u16 = 0x1;
/// `Bonding` value: IMA+ bonding in use.
pub const BONDING_IMAP: u16 = 0x2;

/// Acknowledgement to (or autonomous event carrying) a TC status request.
///
/// Older firmware sends only the `tc` word (`length == 1`) and the message is
/// six bytes long. Newer firmware adds the `bonding` word (`length == 2`).
#[derive(
    Copy,
    Clone,
    Debug,
    Eq,
    PartialEq,
    zerocopy_derive::FromBytes,
    zerocopy_derive::IntoBytes,
    zerocopy_derive::Immutable,
    zerocopy_derive::KnownLayout,
)]
#[repr(C)]
pub struct TcStatusAck {
    pub index: U16,
    pub length: U16,
    pub tc: U16,
    pub bonding: U16,
}

const_assert_eq!(core::mem::size_of::<TcStatusAck>(), 8);

impl TcStatusAck {
    /// Size of a message from firmware without the bonding word.
    pub const LEGACY_SIZE: usize = 6;

    /// Payload word count of a message that carries the bonding word.
    pub const ITEMS_WITH_BONDING: u16 = 2;

    /// A reply as sent by firmware that predates the bonding word.
    pub fn legacy(tc: u16) -> Self {
        Self {
            index: U16::new(0),
            length: U16::new(1),
            tc: U16::new(tc),
            bonding: U16::new(0),
        }
    }

    pub fn with_bonding(tc: u16, bonding: u16) -> Self {
        Self {
            index: U16::new(0),
            length: U16::new(Self::ITEMS_WITH_BONDING),
            tc: U16::new(tc),
            bonding: U16::new(bonding),
        }
    }

    /// Decodes a message as received from the firmware. A legacy message is
    /// zero-extended. Returns `None` if `bytes` can't even hold a legacy
    /// message.
    pub fn parse(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < Self::LEGACY_SIZE {
            return None;
        }
        let mut buf = [0u8; core::mem::size_of::<Self>()];
        let n = bytes.len().min(buf.len());
        buf[..n].copy_from_slice(&bytes[..n]);
        Self::read_from_bytes(&buf[..]).ok()
    }

    pub fn reports_bonding(&self) -> bool {
        self.length.get() == Self::ITEMS_WITH_BONDING
    }

    /// Bonding mode carried by the message, or `None` if the firmware that
    /// sent it doesn't report one. Unrecognized codes read as no bonding.
    pub fn bonding_mode(&self) -> Option<BondingMode> {
        if !self.reports_bonding() {
            return None;
        }
        Some(match self.bonding.get() {
            BONDING_PAF => BondingMode::UsedPaf,
            BONDING_IMAP => BondingMode::UsedImap,
            _ => BondingMode::NoBond,
        })
    }
}

/// Bit in word 1 of the feature map (`W1F01`): IMA+ bonding is available in
/// this firmware.
pub const W1F01_IMAP_BONDING: u16 = 1 << 1;

/// Acknowledgement to a feature map request.
#[derive(
    Copy,
    Clone,
    Debug,
    Eq,
    PartialEq,
    zerocopy_derive::FromBytes,
    zerocopy_derive::IntoBytes,
    zerocopy_derive::Immutable,
    zerocopy_derive::KnownLayout,
)]
#[repr(C)]
pub struct FeatureMapAck {
    pub index: U16,
    pub length: U16,
    pub words: [U16; 4],
}

const_assert_eq!(core::mem::size_of::<FeatureMapAck>(), 12);

impl FeatureMapAck {
    pub fn new(words: [u16; 4]) -> Self {
        Self {
            index: U16::new(0),
            length: U16::new(4),
            words: words.map(U16::new),
        }
    }

    pub fn imap_bonding(&self) -> bool {
        self.words[1].get() & W1F01_IMAP_BONDING != 0
    }
}

/// PAF handshake status as read back from the device.
#[derive(
    Copy,
    Clone,
    Debug,
    Default,
    Eq,
    PartialEq,
    zerocopy_derive::FromBytes,
    zerocopy_derive::IntoBytes,
    zerocopy_derive::Immutable,
    zerocopy_derive::KnownLayout,
)]
#[repr(C)]
pub struct PafHsStatus {
    /// Aggregation discovery CLEAR-IF-SAME command received.
    pub discovery_clear_if_same: u8,
    /// Aggregation discovery SET-IF-CLEAR command received.
    pub discovery_set_if_clear: u8,
    /// PME aggregate SET received with zero aggregate data.
    pub aggreg_clear: u8,
    /// PME aggregate SET received with non-zero aggregate data.
    pub aggreg_set: u8,
    /// Remote end supports PAF.
    pub paf_enable: u8,
    /// 48-bit aggregation discovery code (registers 6.18 to 6.20), most
    /// significant word first.
    pub discovery_code: [U16; 3],
    /// Link partner PME aggregate data (registers 6.22, 6.23).
    pub aggregate_data: U32,
}

const_assert_eq!(core::mem::size_of::<PafHsStatus>(), 15);

impl PafHsStatus {
    pub fn remote_paf_supported(&self) -> bool {
        self.paf_enable != 0
    }

    /// The discovery commands are mutually exclusive on the wire; if a device
    /// ever reports more than one, discovery wins over aggregation and
    /// CLEAR-IF-SAME over SET-IF-CLEAR.
    pub fn activation_mode(&self) -> ActivationMode {
        if self.discovery_clear_if_same != 0 {
            ActivationMode::DiscoveryClearIfSame
        } else if self.discovery_set_if_clear != 0 {
            ActivationMode::DiscoverySetIfClear
        } else if self.aggreg_set != 0 {
            ActivationMode::AggregateSet
        } else if self.aggreg_clear != 0 {
            ActivationMode::AggregateClr
        } else {
            ActivationMode::NoCommand
        }
    }
}

impl From<&PafHsStatus> for HsStatusData {
    fn from(s: &PafHsStatus) -> Self {
        let mut discovery_code = [0u8; 6];
        for (dst, word) in
            discovery_code.chunks_exact_mut(2).zip(s.discovery_code.iter())
        {
            dst.copy_from_slice(&word.get().to_be_bytes());
        }
        HsStatusData {
            remote_paf_supported: s.remote_paf_supported(),
            activation_mode: s.activation_mode(),
            discovery_code,
            aggregate_data: s.aggregate_data.get(),
        }
    }
}

/// PAF handshake continue command.
#[derive(
    Copy,
    Clone,
    Debug,
    Eq,
    PartialEq,
    zerocopy_derive::FromBytes,
    zerocopy_derive::IntoBytes,
    zerocopy_derive::Immutable,
    zerocopy_derive::KnownLayout,
)]
#[repr(C)]
pub struct PafHsContinue {
    pub discovery_code: [U16; 3],
    pub aggregate_data: U32,
}

const_assert_eq!(core::mem::size_of::<PafHsContinue>(), 10);

impl From<&HsContinueData> for PafHsContinue {
    fn from(d: &HsContinueData) -> Self {
        let c = &d.discovery_code;
        PafHsContinue {
            discovery_code: [
                U16::new(u16::from_be_bytes([c[0], c[1]])),
                U16::new(u16::from_be_bytes([c[2], c[3]])),
                U16::new(u16::from_be_bytes([c[4], c[5]])),
            ],
            aggregate_data: U32::new(d.aggregate_data),
        }
    }
}

/// IMA+ handshake status as read back from the device.
#[derive(
    Copy,
    Clone,
    Debug,
    Default,
    Eq,
    PartialEq,
    zerocopy_derive::FromBytes,
    zerocopy_derive::IntoBytes,
    zerocopy_derive::Immutable,
    zerocopy_derive::KnownLayout,
)]
#[repr(C)]
pub struct ImapHsStatus {
    /// Remote end supports IMA+.
    pub imap_enable: u8,
    /// Maximum downstream differential delay between members of an ATM
    /// bonding group, in ms, as received from the CO during G.HS.
    pub max_diff_delay_ds: U16,
}

const_assert_eq!(core::mem::size_of::<ImapHsStatus>(), 3);

impl ImapHsStatus {
    pub fn remote_imap_supported(&self) -> bool {
        self.imap_enable != 0
    }
}
