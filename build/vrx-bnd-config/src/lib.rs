// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Loads the shape of the bonding system from TOML.
//!
//! The configuration lives in a `[bonding]` table; other tables in the same
//! document belong to someone else and are ignored.
//!
//! ```toml
//! [bonding]
//! lines-per-device = 2
//! device-number = 1
//! bonding-enabled = true
//! ```

use anyhow::{bail, Context, Result};
use drv_vrx_bnd_api::{SystemConfig, MAX_LINES};
use serde::Deserialize;
use std::env;

/// Environment variable consulted by [`config`] and [`config_or_default`].
pub const CONFIG_VAR: &str = "VRX_BND_CONFIG";

#[derive(Deserialize)]
struct Document {
    bonding: SystemConfig,
}

/// Parses and checks a configuration document.
pub fn config_from_str(text: &str) -> Result<SystemConfig> {
    let doc: Document =
        toml::from_str(text).context("parsing bonding configuration")?;
    check(&doc.bonding)?;
    Ok(doc.bonding)
}

/// Reads the configuration document from [`CONFIG_VAR`]. Fails if the
/// variable isn't set.
pub fn config() -> Result<SystemConfig> {
    config_from_env(CONFIG_VAR)
}

/// Equivalent to [`config`] but uses `SystemConfig::default()` if the
/// environment variable is missing. A variable that is set but doesn't parse
/// is still an error.
pub fn config_or_default() -> Result<SystemConfig> {
    config_from_env_def(CONFIG_VAR)
}

pub fn config_from_env(var: &str) -> Result<SystemConfig> {
    let text = env::var(var).with_context(|| format!("reading ${var}"))?;
    config_from_str(&text).with_context(|| format!("in ${var}"))
}

fn config_from_env_def(var: &str) -> Result<SystemConfig> {
    match env::var(var) {
        Ok(text) => {
            config_from_str(&text).with_context(|| format!("in ${var}"))
        }
        Err(env::VarError::NotPresent) => Ok(SystemConfig::default()),
        Err(e) => Err(e).with_context(|| format!("reading ${var}")),
    }
}

/// Rejects shapes the server can't manage.
pub fn check(sys: &SystemConfig) -> Result<()> {
    if !matches!(sys.lines_per_device, 1 | 2) {
        bail!(
            "lines-per-device must be 1 or 2, not {}",
            sys.lines_per_device
        );
    }
    if sys.device_number == 0 {
        bail!("device-number must be at least 1");
    }
    if sys.total_lines() > MAX_LINES {
        bail!(
            "{} device(s) with {} line(s) each is more than the {} lines \
             supported",
            sys.device_number,
            sys.lines_per_device,
            MAX_LINES,
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;

    #[test]
    fn full_table() {
        let sys = config_from_str(indoc! {"
            [bonding]
            lines-per-device = 1
            device-number = 2
            bonding-enabled = false
        "})
        .unwrap();
        assert_eq!(
            sys,
            SystemConfig {
                lines_per_device: 1,
                device_number: 2,
                bonding_enabled: false,
            }
        );
    }

    #[test]
    fn bonding_enabled_by_default() {
        let sys = config_from_str(indoc! {"
            [bonding]
            lines-per-device = 2
            device-number = 2
        "})
        .unwrap();
        assert!(sys.bonding_enabled);
        assert_eq!(sys.total_lines(), 4);
    }

    #[test]
    fn other_tables_are_ignored() {
        let sys = config_from_str(indoc! {r#"
            name = "board"

            [bonding]
            lines-per-device = 2
            device-number = 1

            [kernel]
            name = "kern"
        "#})
        .unwrap();
        assert_eq!(sys, SystemConfig::default());
    }

    #[test]
    fn unknown_key_in_bonding_table() {
        let r = config_from_str(indoc! {"
            [bonding]
            lines-per-device = 2
            device-number = 1
            lines = 2
        "});
        assert!(r.is_err());
    }

    #[test]
    fn missing_table() {
        assert!(config_from_str("[kernel]\nname = \"kern\"\n").is_err());
    }

    #[test]
    fn shape_is_checked() {
        for (lpd, dev) in [(0, 1), (3, 1), (2, 0), (2, 3), (1, 5)] {
            let text = format!(
                "[bonding]\nlines-per-device = {lpd}\ndevice-number = {dev}\n"
            );
            assert!(config_from_str(&text).is_err(), "{lpd} x {dev}");
        }
        let text = "[bonding]\nlines-per-device = 1\ndevice-number = 4\n";
        assert!(config_from_str(text).is_ok());
    }

    #[test]
    fn environment() {
        let var = "VRX_BND_CONFIG_TEST_ENVIRONMENT";
        env::remove_var(var);
        assert!(config_from_env(var).is_err());
        assert_eq!(config_from_env_def(var).unwrap(), SystemConfig::default());

        let text = "[bonding]\nlines-per-device = 1\ndevice-number = 1\n";
        env::set_var(var, text);
        assert_eq!(config_from_env(var).unwrap().total_lines(), 1);
        assert_eq!(config_from_env_def(var).unwrap().total_lines(), 1);

        env::set_var(var, "[bonding]\nlines-per-device = 7\n");
        assert!(config_from_env_def(var).is_err());
        env::remove_var(var);
    }
}
