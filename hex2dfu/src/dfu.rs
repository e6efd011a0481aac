//! The `dfu` module holds the fixed-layout structures of the ST DfuSe container:
//! [`DfuPrefix`], [`TargetPrefix`], [`DfuImage`] and [`DfuSuffix`].
//!
//! Every structure serializes through a pure function into an exact-length buffer.
//! Counters and sizes that depend on child collections are never stored; they are
//! computed from the children at serialization time.

use crate::element::ImageElement;
use crate::error::IntelHexErrorKind;

pub const DFU_PREFIX_SIZE: usize = 11;
pub const TARGET_PREFIX_SIZE: usize = 274;
pub const DFU_SUFFIX_SIZE: usize = 16;

/// Longest target name that fits (with its terminator) in the 255-byte name field.
pub const MAX_TARGET_NAME_LEN: usize = 254;

const DFU_PREFIX_SIGNATURE: &[u8; 5] = b"DfuSe";
const DFU_PREFIX_VERSION: u8 = 0x01;
const TARGET_SIGNATURE: &[u8; 6] = b"Target";
const DFU_SUFFIX_SIGNATURE: &[u8; 3] = b"UFD";
const DFU_BCD_VERSION: u16 = 0x011A;

mod offsets {
    use std::ops::Range;
    pub const TARGET_ALTERNATE_SETTING: usize = 6;
    pub const TARGET_NAMED: usize = 7;
    pub const TARGET_NAME: Range<usize> = 11..266;
    pub const TARGET_SIZE: Range<usize> = 266..270;
    pub const TARGET_ELEMENTS: Range<usize> = 270..274;
}

/// File header: signature, format version, whole-file size and target count.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DfuPrefix {
    pub image_size: u32,
    pub number_of_targets: u8,
}

impl DfuPrefix {
    /// # Example
    /// ```
    /// use hex2dfu::DfuPrefix;
    ///
    /// let prefix = DfuPrefix { image_size: 2048, number_of_targets: 5 };
    /// assert_eq!(prefix.to_bytes(), *b"DfuSe\x01\x00\x08\x00\x00\x05");
    /// ```
    #[must_use]
    pub fn to_bytes(&self) -> [u8; DFU_PREFIX_SIZE] {
        let mut out = [0u8; DFU_PREFIX_SIZE];
        out[0..5].copy_from_slice(DFU_PREFIX_SIGNATURE);
        out[5] = DFU_PREFIX_VERSION;
        out[6..10].copy_from_slice(&self.image_size.to_le_bytes());
        out[10] = self.number_of_targets;
        out
    }
}

/// Per-image header. Its size and element count fields are supplied by the owning
/// [`DfuImage`] when it serializes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TargetPrefix {
    pub alternate_setting: bool,
    target_name: String,
}

impl TargetPrefix {
    /// Create a target prefix.
    ///
    /// # Errors
    /// Returns an error if the name is not a valid target name (see [`Self::set_target_name`]).
    pub fn new(alternate_setting: bool, target_name: &str) -> Result<Self, IntelHexErrorKind> {
        let mut prefix = Self {
            alternate_setting,
            target_name: String::new(),
        };
        prefix.set_target_name(target_name)?;
        Ok(prefix)
    }

    #[must_use]
    pub fn target_name(&self) -> &str {
        &self.target_name
    }

    /// Replace the target name.
    ///
    /// # Errors
    /// - [`IntelHexErrorKind::NameTooLong`] if the name is longer than 254 characters
    /// - [`IntelHexErrorKind::TargetNameNotAscii`] if the name is not plain ASCII
    pub fn set_target_name(&mut self, name: &str) -> Result<(), IntelHexErrorKind> {
        if !name.is_ascii() {
            return Err(IntelHexErrorKind::TargetNameNotAscii);
        }
        if name.len() > MAX_TARGET_NAME_LEN {
            return Err(IntelHexErrorKind::NameTooLong(name.len()));
        }
        name.clone_into(&mut self.target_name);
        Ok(())
    }

    #[must_use]
    pub fn has_target_name(&self) -> bool {
        !self.target_name.is_empty()
    }

    /// Serialize with the given size and element count.
    ///
    /// # Example
    /// ```
    /// use hex2dfu::TargetPrefix;
    ///
    /// let prefix = TargetPrefix::new(false, "Ellerbach").unwrap();
    /// let bytes = prefix.to_bytes(0x1234_5678, 5);
    ///
    /// assert_eq!(bytes.len(), 274);
    /// assert_eq!(&bytes[0..6], b"Target");
    /// assert_eq!(&bytes[11..20], b"Ellerbach");
    /// ```
    #[must_use]
    pub fn to_bytes(&self, target_size: u32, number_of_elements: u32) -> [u8; TARGET_PREFIX_SIZE] {
        let mut out = [0u8; TARGET_PREFIX_SIZE];
        out[0..6].copy_from_slice(TARGET_SIGNATURE);
        out[offsets::TARGET_ALTERNATE_SETTING] = u8::from(self.alternate_setting);
        out[offsets::TARGET_NAMED] = u8::from(self.has_target_name());

        let name = self.target_name.as_bytes();
        let name_start = offsets::TARGET_NAME.start;
        out[name_start..name_start + name.len()].copy_from_slice(name);

        out[offsets::TARGET_SIZE].copy_from_slice(&target_size.to_le_bytes());
        out[offsets::TARGET_ELEMENTS].copy_from_slice(&number_of_elements.to_le_bytes());
        out
    }
}

/// One DfuSe target: a prefix followed by its elements.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DfuImage {
    pub target_prefix: TargetPrefix,
    pub elements: Vec<ImageElement>,
}

impl DfuImage {
    #[must_use]
    pub const fn new(target_prefix: TargetPrefix, elements: Vec<ImageElement>) -> Self {
        Self {
            target_prefix,
            elements,
        }
    }

    /// Total size of the serialized elements, headers included.
    #[must_use]
    pub fn target_size(&self) -> usize {
        self.elements.iter().map(ImageElement::serialized_len).sum()
    }

    #[must_use]
    pub fn serialized_len(&self) -> usize {
        TARGET_PREFIX_SIZE + self.target_size()
    }

    /// Serialize the target prefix followed by every element in order.
    ///
    /// # Errors
    /// Returns an error if the target size or element count do not fit a `u32`.
    pub fn to_bytes(&self) -> Result<Vec<u8>, IntelHexErrorKind> {
        let mut out = Vec::with_capacity(self.serialized_len());
        self.write_to(&mut out)?;
        Ok(out)
    }

    /// Append the serialized image to `out`.
    ///
    /// # Errors
    /// Returns an error if the target size or element count do not fit a `u32`.
    pub fn write_to(&self, out: &mut Vec<u8>) -> Result<(), IntelHexErrorKind> {
        let target_size = self.target_size();
        let target_size =
            u32::try_from(target_size).map_err(|_| IntelHexErrorKind::SizeOverflow(target_size))?;
        let number_of_elements = u32::try_from(self.elements.len())
            .map_err(|_| IntelHexErrorKind::SizeOverflow(self.elements.len()))?;

        out.extend_from_slice(&self.target_prefix.to_bytes(target_size, number_of_elements));
        for element in &self.elements {
            element.write_to(out)?;
        }
        Ok(())
    }
}

/// File trailer. The CRC is not part of the struct: it is computed over the finished buffer.
///
/// Field order is firmware version, product id, vendor id, as in `bcdDevice`, `idProduct`,
/// `idVendor` of the DFU suffix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DfuSuffix {
    pub firmware_version: u16,
    pub product_id: u16,
    pub vendor_id: u16,
}

impl DfuSuffix {
    /// Serialize everything but the trailing CRC.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn to_bytes_without_crc(&self) -> [u8; DFU_SUFFIX_SIZE - 4] {
        let mut out = [0u8; DFU_SUFFIX_SIZE - 4];
        out[0..2].copy_from_slice(&self.firmware_version.to_le_bytes());
        out[2..4].copy_from_slice(&self.product_id.to_le_bytes());
        out[4..6].copy_from_slice(&self.vendor_id.to_le_bytes());
        out[6..8].copy_from_slice(&DFU_BCD_VERSION.to_le_bytes());
        out[8..11].copy_from_slice(DFU_SUFFIX_SIGNATURE);
        out[11] = DFU_SUFFIX_SIZE as u8;
        out
    }

    /// Serialize the suffix with the given CRC.
    #[must_use]
    pub fn to_bytes(&self, crc: u32) -> [u8; DFU_SUFFIX_SIZE] {
        let mut out = [0u8; DFU_SUFFIX_SIZE];
        out[..12].copy_from_slice(&self.to_bytes_without_crc());
        out[12..].copy_from_slice(&crc.to_le_bytes());
        out
    }
}
