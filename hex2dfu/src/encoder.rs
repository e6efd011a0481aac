//! The `encoder` module provides [`DfuFile`], the root of a DfuSe container, and the
//! CRC used by its suffix.
//!
//! A file is laid out as
//! `DfuPrefix || DfuImage... || DfuSuffix (without CRC) || CRC-32 (LE)`.
//! The prefix fields are derived from the images at encode time and the CRC is
//! computed over every byte that precedes it.

use crate::dfu::{DFU_PREFIX_SIZE, DFU_SUFFIX_SIZE, DfuImage, DfuPrefix, DfuSuffix};
use crate::error::{Hex2DfuError, IntelHexErrorKind};
use crc::{CRC_32_JAMCRC, Crc};
use tracing::debug;

/// Reflected CRC-32 with `0xFFFFFFFF` seed and no final inversion, as required by the DFU suffix.
const DFU_CRC: Crc<u32> = Crc::<u32>::new(&CRC_32_JAMCRC);

/// Compute the DFU file CRC over `bytes`.
///
/// # Example
/// ```
/// use hex2dfu::dfu_crc;
///
/// assert_eq!(dfu_crc(b"123456789"), !0xCBF4_3926);
/// ```
#[must_use]
pub fn dfu_crc(bytes: &[u8]) -> u32 {
    DFU_CRC.checksum(bytes)
}

/// Check that the last four bytes of an encoded file hold the CRC of everything before them.
#[must_use]
pub fn verify_crc(file: &[u8]) -> bool {
    let Some(split) = file.len().checked_sub(4) else {
        return false;
    };
    let (body, trailer) = file.split_at(split);
    let Ok(stored) = <[u8; 4]>::try_from(trailer) else {
        return false;
    };
    u32::from_le_bytes(stored) == dfu_crc(body)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DfuFile {
    pub images: Vec<DfuImage>,
    pub suffix: DfuSuffix,
}

impl DfuFile {
    #[must_use]
    pub const fn new(suffix: DfuSuffix) -> Self {
        Self {
            images: Vec::new(),
            suffix,
        }
    }

    pub fn push_image(&mut self, image: DfuImage) {
        self.images.push(image);
    }

    /// Size of the whole encoded file.
    #[must_use]
    pub fn encoded_len(&self) -> usize {
        DFU_PREFIX_SIZE
            + self
                .images
                .iter()
                .map(DfuImage::serialized_len)
                .sum::<usize>()
            + DFU_SUFFIX_SIZE
    }

    /// Build the prefix from the current images.
    ///
    /// # Errors
    /// - [`IntelHexErrorKind::TooManyTargets`] if there are more than 255 images
    /// - [`IntelHexErrorKind::SizeOverflow`] if the file would exceed `u32::MAX` bytes
    pub fn prefix(&self) -> Result<DfuPrefix, IntelHexErrorKind> {
        let number_of_targets = u8::try_from(self.images.len())
            .map_err(|_| IntelHexErrorKind::TooManyTargets(self.images.len()))?;
        let len = self.encoded_len();
        let image_size = u32::try_from(len).map_err(|_| IntelHexErrorKind::SizeOverflow(len))?;

        Ok(DfuPrefix {
            image_size,
            number_of_targets,
        })
    }

    /// Encode the complete file into one buffer.
    ///
    /// # Errors
    /// Returns [`Hex2DfuError::EncodeError`] if a count or size does not fit its field.
    /// Nothing is returned in that case, not even a partial buffer.
    ///
    /// # Example
    /// ```
    /// use hex2dfu::{DfuFile, DfuImage, DfuSuffix, ImageElement, TargetPrefix, verify_crc};
    ///
    /// let mut file = DfuFile::new(DfuSuffix {
    ///     firmware_version: 0x2200,
    ///     product_id: 0xDF11,
    ///     vendor_id: 0x0483,
    /// });
    /// file.push_image(DfuImage::new(
    ///     TargetPrefix::new(false, "board").unwrap(),
    ///     vec![ImageElement::new(0x0800_0000, vec![0u8; 16])],
    /// ));
    ///
    /// let bytes = file.to_bytes().unwrap();
    /// assert_eq!(bytes.len(), 11 + 274 + 8 + 16 + 16);
    /// assert!(verify_crc(&bytes));
    /// ```
    pub fn to_bytes(&self) -> Result<Vec<u8>, Hex2DfuError> {
        let prefix = self.prefix().map_err(Hex2DfuError::EncodeError)?;

        let mut out = Vec::with_capacity(self.encoded_len());
        out.extend_from_slice(&prefix.to_bytes());
        for image in &self.images {
            image.write_to(&mut out).map_err(Hex2DfuError::EncodeError)?;
        }
        out.extend_from_slice(&self.suffix.to_bytes_without_crc());

        let crc = dfu_crc(&out);
        out.extend_from_slice(&crc.to_le_bytes());

        debug!(
            "encoded {} target(s), {} bytes, crc 0x{crc:08X}",
            prefix.number_of_targets,
            out.len()
        );
        Ok(out)
    }
}
