//! Captured instrument frames shared by unit tests.

/// pCO2 measurement record, sigil included.
pub(crate) const RECORD_FRAME: &str =
    "*5B2704C8EF9FC90FE606400FE8063C0FE30674640B1B1F0FE6065A0FE9067F0FE306A60CDE0FFF3B";

/// Full device status with an all-zero status word.
pub(crate) const STATUS_FRAME: &str = ":003F91BE0000000000000000000000F7";

/// Configuration dump; the serial-settings tail is zero padded.
pub(crate) const CONFIG_FRAME: &str = crate::params::FACTORY_CONFIG;
