//! # `hex2dfu`
//!
//! `hex2dfu` is a Rust library for converting firmware images from Intel HEX text or raw
//! binaries into the ST DfuSe container used for USB device firmware upgrade.
//!
//! The library provides:
//! - Parser for Intel HEX records (via [`Record`] struct).
//! - Assembly of records into contiguous image elements (via [`HexAssembler`] struct).
//! - Byte-exact DfuSe structures and file encoding (via [`DfuFile`] struct).
//! - Error handling with [`Hex2DfuError`].
//!
//! ## Example
//!
//! ```
//! use hex2dfu::{DfuConfig, convert};
//!
//! let hex = b":020000040800F2\n:0400000001020304F2\n:00000001FF\n";
//! let dfu = convert::hex_to_dfu(hex, "nanoCLR", &DfuConfig::default()).unwrap();
//!
//! assert_eq!(&dfu[0..5], b"DfuSe");
//! ```

mod assembler;
mod config;
pub mod convert;
mod dfu;
mod element;
mod encoder;
mod error;
mod record;

// Public APIs
pub use assembler::{HexAssembler, assemble_hex};
pub use config::{
    DEFAULT_BIN_TARGET_NAME, DEFAULT_FIRMWARE_VERSION, DEFAULT_PRODUCT_ID, DEFAULT_VENDOR_ID,
    DfuConfig,
};
pub use convert::BinarySource;
pub use dfu::{
    DFU_PREFIX_SIZE, DFU_SUFFIX_SIZE, DfuImage, DfuPrefix, DfuSuffix, MAX_TARGET_NAME_LEN,
    TARGET_PREFIX_SIZE, TargetPrefix,
};
pub use element::{ELEMENT_HEADER_SIZE, ImageElement};
pub use encoder::{DfuFile, dfu_crc, verify_crc};
pub use error::{Hex2DfuError, IntelHexErrorKind};
pub use record::{Record, RecordType};
