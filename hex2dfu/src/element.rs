//! The `element` module provides [`ImageElement`], a contiguous run of firmware bytes with
//! its load address, and its DfuSe element serialization.

use crate::error::IntelHexErrorKind;

/// Element header: address (4) + size (4)
pub const ELEMENT_HEADER_SIZE: usize = 8;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImageElement {
    /// Load address of the first byte
    pub address: u32,
    /// Element payload
    pub data: Vec<u8>,
}

impl ImageElement {
    #[must_use]
    pub const fn new(address: u32, data: Vec<u8>) -> Self {
        Self { address, data }
    }

    /// Number of payload bytes.
    #[must_use]
    pub fn size(&self) -> usize {
        self.data.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Address one past the last byte of the element.
    #[must_use]
    pub fn end_address(&self) -> u64 {
        u64::from(self.address) + self.data.len() as u64
    }

    /// Length of the serialized element, header included.
    #[must_use]
    pub fn serialized_len(&self) -> usize {
        ELEMENT_HEADER_SIZE + self.data.len()
    }

    /// Serialize as `address (u32 LE) || size (u32 LE) || data`.
    ///
    /// # Errors
    /// Returns an error if the payload is larger than `u32::MAX` bytes.
    ///
    /// # Example
    /// ```
    /// use hex2dfu::ImageElement;
    ///
    /// let element = ImageElement::new(0x0800_0000, vec![0xAA, 0xBB]);
    /// let bytes = element.to_bytes().unwrap();
    ///
    /// assert_eq!(bytes, [0x00, 0x00, 0x00, 0x08, 0x02, 0x00, 0x00, 0x00, 0xAA, 0xBB]);
    /// ```
    pub fn to_bytes(&self) -> Result<Vec<u8>, IntelHexErrorKind> {
        let mut out = Vec::with_capacity(self.serialized_len());
        self.write_to(&mut out)?;
        Ok(out)
    }

    /// Append the serialized element to `out`.
    ///
    /// # Errors
    /// Returns an error if the payload is larger than `u32::MAX` bytes.
    pub fn write_to(&self, out: &mut Vec<u8>) -> Result<(), IntelHexErrorKind> {
        let size = u32::try_from(self.data.len())
            .map_err(|_| IntelHexErrorKind::SizeOverflow(self.data.len()))?;

        out.extend_from_slice(&self.address.to_le_bytes());
        out.extend_from_slice(&size.to_le_bytes());
        out.extend_from_slice(&self.data);
        Ok(())
    }
}
