//! The `config` module holds [`DfuConfig`], the identifiers written into the DFU suffix
//! and the target name written into the target prefix.

use crate::dfu::DfuSuffix;
use std::path::Path;

/// STMicroelectronics vendor id
pub const DEFAULT_VENDOR_ID: u16 = 0x0483;
/// STM32 system bootloader product id in DFU mode
pub const DEFAULT_PRODUCT_ID: u16 = 0xDF11;
pub const DEFAULT_FIRMWARE_VERSION: u16 = 0x2200;
/// Target name used for images built from raw binaries
pub const DEFAULT_BIN_TARGET_NAME: &str = "nanoFramework";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DfuConfig {
    pub vendor_id: u16,
    pub product_id: u16,
    pub firmware_version: u16,
    /// Explicit target name. When `None`, the conversion derives one.
    pub target_name: Option<String>,
}

impl Default for DfuConfig {
    fn default() -> Self {
        Self {
            vendor_id: DEFAULT_VENDOR_ID,
            product_id: DEFAULT_PRODUCT_ID,
            firmware_version: DEFAULT_FIRMWARE_VERSION,
            target_name: None,
        }
    }
}

impl DfuConfig {
    /// Suffix carrying the configured identifiers.
    #[must_use]
    pub const fn suffix(&self) -> DfuSuffix {
        DfuSuffix {
            firmware_version: self.firmware_version,
            product_id: self.product_id,
            vendor_id: self.vendor_id,
        }
    }

    /// The explicit target name, or the file stem of `output` (`"fw/board.dfu"` -> `"board"`).
    ///
    /// # Example
    /// ```
    /// use hex2dfu::DfuConfig;
    ///
    /// let cfg = DfuConfig::default();
    /// assert_eq!(cfg.target_name_for("build/nanoCLR.dfu"), "nanoCLR");
    /// ```
    #[must_use]
    pub fn target_name_for<P: AsRef<Path>>(&self, output: P) -> String {
        self.target_name.clone().unwrap_or_else(|| {
            output
                .as_ref()
                .file_stem()
                .map(|stem| stem.to_string_lossy().into_owned())
                .unwrap_or_default()
        })
    }
}
