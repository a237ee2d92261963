// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Consistency check of a bonding request against the TC layers configured
//! across the whole system.
//!
//! Bonding isn't a per-line property: if any line of any device is set up
//! with a TC layer that can't carry the requested bonding, the request as a
//! whole is affected. The outcome for each combination is:
//!
//! | PAF | IMA+ | mode | TC layers              | outcome                  |
//! |-----|------|------|------------------------|--------------------------|
//! | on  | off  | any  | some ATM               | error: config vs TC      |
//! | on  | off  | any  | no ATM, some AUTO      | warning: config vs TC    |
//! | on  | off  | any  | no ATM, no AUTO        | success                  |
//! | off | on   | VDSL | some ATM or AUTO       | error: IMA+ only in ADSL |
//! | off | on   | VDSL | no ATM, no AUTO        | error: config vs TC      |
//! | off | on   | ADSL | no ATM                 | error: config vs TC      |
//! | off | on   | ADSL | some ATM, some AUTO    | warning: config vs TC    |
//! | off | on   | ADSL | some ATM, no AUTO      | success                  |
//! | on  | on   | ADSL | any                    | success                  |
//! | on  | on   | VDSL | some ATM               | error: IMA+ only in ADSL |
//! | on  | on   | VDSL | no ATM, some AUTO      | warning: config vs TC    |
//! | on  | on   | VDSL | no ATM, no AUTO        | success                  |
//! | off | off  | any  | any                    | success                  |
//!
//! An error turns both enables off in the request; a warning leaves it alone.

use drv_vrx_bnd_api::{BndError, BndOk, BndWarning, DslMode, TcLayer};
use ringbuf::*;

#[derive(Copy, Clone, Debug, PartialEq)]
enum Trace {
    None,
    Verdict {
        mode: DslMode,
        paf: bool,
        imap: bool,
        counts: TcLayerCounts,
        decision: Decision,
    },
}

ringbuf!(Trace, 16, Trace::None);

/// Number of lines configured with each of the TC layers that matter to
/// bonding.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct TcLayerCounts {
    pub auto: usize,
    pub atm: usize,
}

impl TcLayerCounts {
    pub fn add(&mut self, tc: TcLayer) {
        match tc {
            TcLayer::Auto => self.auto += 1,
            TcLayer::Atm => self.atm += 1,
            _ => (),
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Decision {
    Success,
    WarnConfigVsTcLayer,
    ErrConfigVsTcLayer,
    ErrImapOnlyInAdsl,
}

impl Decision {
    pub fn is_error(self) -> bool {
        matches!(
            self,
            Decision::ErrConfigVsTcLayer | Decision::ErrImapOnlyInAdsl
        )
    }

    pub fn result(self) -> Result<BndOk, BndError> {
        match self {
            Decision::Success => Ok(BndOk::Done),
            Decision::WarnConfigVsTcLayer => {
                Ok(BndOk::Warn(BndWarning::ConfigVsTcLayer))
            }
            Decision::ErrConfigVsTcLayer => Err(BndError::ConfigVsTcLayer),
            Decision::ErrImapOnlyInAdsl => {
                Err(BndError::ImapOnlySupportedInAdsl)
            }
        }
    }
}

/// Checks a bonding request, turning `paf` and `imap` off if it has to be
/// rejected.
pub fn validate(
    mode: DslMode,
    paf: &mut bool,
    imap: &mut bool,
    counts: TcLayerCounts,
) -> Decision {
    let atm = counts.atm > 0;
    let auto = counts.auto > 0;

    let decision = match (*paf, *imap, mode) {
        (true, false, _) => {
            if atm {
                Decision::ErrConfigVsTcLayer
            } else if auto {
                Decision::WarnConfigVsTcLayer
            } else {
                Decision::Success
            }
        }
        (false, true, DslMode::Vdsl) => {
            if atm || auto {
                Decision::ErrImapOnlyInAdsl
            } else {
                Decision::ErrConfigVsTcLayer
            }
        }
        (false, true, DslMode::Adsl) => {
            if !atm {
                Decision::ErrConfigVsTcLayer
            } else if auto {
                Decision::WarnConfigVsTcLayer
            } else {
                Decision::Success
            }
        }
        (true, true, DslMode::Vdsl) => {
            if atm {
                Decision::ErrImapOnlyInAdsl
            } else if auto {
                Decision::WarnConfigVsTcLayer
            } else {
                Decision::Success
            }
        }
        (true, true, DslMode::Adsl) | (false, false, _) => Decision::Success,
    };

    ringbuf_entry!(Trace::Verdict {
        mode,
        paf: *paf,
        imap: *imap,
        counts,
        decision,
    });

    if decision.is_error() {
        *paf = false;
        *imap = false;
    }
    decision
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    use Decision::*;
    use DslMode::*;

    const NONE: TcLayerCounts = TcLayerCounts { auto: 0, atm: 0 };
    const ATM: TcLayerCounts = TcLayerCounts { auto: 0, atm: 1 };
    const AUTO: TcLayerCounts = TcLayerCounts { auto: 1, atm: 0 };
    const BOTH: TcLayerCounts = TcLayerCounts { auto: 1, atm: 1 };

    fn run(
        mode: DslMode,
        paf: bool,
        imap: bool,
        counts: TcLayerCounts,
    ) -> Decision {
        let (mut p, mut i) = (paf, imap);
        validate(mode, &mut p, &mut i, counts)
    }

    #[test]
    fn decision_table() {
        // (paf, imap, mode, [none, atm, auto, both])
        let table = [
            (false, false, Adsl, [Success, Success, Success, Success]),
            (false, false, Vdsl, [Success, Success, Success, Success]),
            (
                true,
                false,
                Adsl,
                [
                    Success,
                    ErrConfigVsTcLayer,
                    WarnConfigVsTcLayer,
                    ErrConfigVsTcLayer,
                ],
            ),
            (
                true,
                false,
                Vdsl,
                [
                    Success,
                    ErrConfigVsTcLayer,
                    WarnConfigVsTcLayer,
                    ErrConfigVsTcLayer,
                ],
            ),
            (
                false,
                true,
                Adsl,
                [
                    ErrConfigVsTcLayer,
                    Success,
                    ErrConfigVsTcLayer,
                    WarnConfigVsTcLayer,
                ],
            ),
            (
                false,
                true,
                Vdsl,
                [
                    ErrConfigVsTcLayer,
                    ErrImapOnlyInAdsl,
                    ErrImapOnlyInAdsl,
                    ErrImapOnlyInAdsl,
                ],
            ),
            (true, true, Adsl, [Success, Success, Success, Success]),
            (
                true,
                true,
                Vdsl,
                [
                    Success,
                    ErrImapOnlyInAdsl,
                    WarnConfigVsTcLayer,
                    ErrImapOnlyInAdsl,
                ],
            ),
        ];

        let columns = [NONE, ATM, AUTO, BOTH];
        for (paf, imap, mode, expected) in table {
            for (counts, want) in columns.into_iter().zip(expected) {
                assert_eq!(
                    run(mode, paf, imap, counts),
                    want,
                    "paf={paf} imap={imap} mode={mode:?} counts={counts:?}"
                );
            }
        }
    }

    #[test]
    fn imap_in_vdsl_with_atm_line() {
        let (mut paf, mut imap) = (true, true);
        let d = validate(Vdsl, &mut paf, &mut imap, TcLayerCounts {
            auto: 0,
            atm: 1,
        });
        assert_eq!(d.result(), Err(BndError::ImapOnlySupportedInAdsl));
        assert!(!paf);
        assert!(!imap);
    }

    #[test]
    fn imap_in_adsl_with_all_ptm_lines() {
        let (mut paf, mut imap) = (false, true);
        let d = validate(Adsl, &mut paf, &mut imap, NONE);
        assert_eq!(d.result(), Err(BndError::ConfigVsTcLayer));
        assert!(!paf);
        assert!(!imap);
    }

    #[test]
    fn counting() {
        let mut c = TcLayerCounts::default();
        for tc in [
            TcLayer::Auto,
            TcLayer::Atm,
            TcLayer::Efm,
            TcLayer::Auto,
            TcLayer::Unknown,
            TcLayer::EfmForced,
        ] {
            c.add(tc);
        }
        assert_eq!(c, TcLayerCounts { auto: 2, atm: 1 });
    }

    fn any_mode() -> impl Strategy<Value = DslMode> {
        prop_oneof![Just(Adsl), Just(Vdsl)]
    }

    fn any_counts() -> impl Strategy<Value = TcLayerCounts> {
        (0usize..4, 0usize..4)
            .prop_map(|(auto, atm)| TcLayerCounts { auto, atm })
    }

    proptest! {
        #[test]
        fn errors_turn_bonding_off(
            mode in any_mode(),
            paf: bool,
            imap: bool,
            counts in any_counts(),
        ) {
            let (mut p, mut i) = (paf, imap);
            let d = validate(mode, &mut p, &mut i, counts);
            if d.is_error() {
                prop_assert!(!p);
                prop_assert!(!i);
            } else {
                prop_assert_eq!((p, i), (paf, imap));
            }
        }

        #[test]
        fn warnings_leave_request_alone(
            mode in any_mode(),
            paf: bool,
            imap: bool,
            counts in any_counts(),
        ) {
            let (mut p, mut i) = (paf, imap);
            let d = validate(mode, &mut p, &mut i, counts);
            if d == WarnConfigVsTcLayer {
                prop_assert_eq!((p, i), (paf, imap));
                prop_assert!(counts.auto > 0);
            }
        }

        #[test]
        fn validation_is_repeatable(
            mode in any_mode(),
            paf: bool,
            imap: bool,
            counts in any_counts(),
        ) {
            let (mut p1, mut i1) = (paf, imap);
            let (mut p2, mut i2) = (paf, imap);
            let d1 = validate(mode, &mut p1, &mut i1, counts);
            let d2 = validate(mode, &mut p2, &mut i2, counts);
            prop_assert_eq!(d1, d2);
            prop_assert_eq!((p1, i1), (p2, i2));
        }

        #[test]
        fn no_request_always_succeeds(
            mode in any_mode(),
            counts in any_counts(),
        ) {
            prop_assert_eq!(run(mode, false, false, counts), Success);
        }
    }
}
