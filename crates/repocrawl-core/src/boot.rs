//! Boot mode: whether this process start should run one-time initialization.

use std::env::VarError;

/// Environment variable that marks a restart. Any value, including the empty
/// string, selects [`BootMode::Warm`].
pub const BOOT_MODE_VAR: &str = "APP_START_FROM";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BootMode {
    /// `APP_START_FROM` is absent: run the startup hook.
    Cold,
    /// `APP_START_FROM` is present; carries its (lossily decoded) value.
    Warm { start_from: String },
}

impl BootMode {
    /// Classify the result of an env lookup for [`BOOT_MODE_VAR`].
    ///
    /// A value that is set but not valid unicode still counts as present.
    #[must_use]
    pub fn from_lookup(value: Result<String, VarError>) -> Self {
        match value {
            Ok(start_from) => BootMode::Warm { start_from },
            Err(VarError::NotUnicode(raw)) => BootMode::Warm {
                start_from: raw.to_string_lossy().into_owned(),
            },
            Err(VarError::NotPresent) => BootMode::Cold,
        }
    }

    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(std::env::var(BOOT_MODE_VAR))
    }

    #[must_use]
    pub fn is_cold(&self) -> bool {
        matches!(self, BootMode::Cold)
    }
}
