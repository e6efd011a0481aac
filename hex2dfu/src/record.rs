//! The `record` module defines the [`Record`] and [`RecordType`] which are used for parsing
//! (and generating) Intel HEX records.

use crate::error::IntelHexErrorKind;
use std::fmt;

// len + addr (2) + rtype + checksum
const SMALLEST_RECORD: usize = 1 + 2 + 1 + 1;
const START_CODE: u8 = b':';

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Default)]
pub enum RecordType {
    #[default]
    Data,
    EndOfFile,
    ExtendedSegmentAddress,
    StartSegmentAddress,
    ExtendedLinearAddress,
    StartLinearAddress,
    /// Any type byte outside the defined set. Kept as-is, never acted upon.
    Other(u8),
}

impl From<u8> for RecordType {
    fn from(value: u8) -> Self {
        match value {
            0x00 => Self::Data,
            0x01 => Self::EndOfFile,
            0x02 => Self::ExtendedSegmentAddress,
            0x03 => Self::StartSegmentAddress,
            0x04 => Self::ExtendedLinearAddress,
            0x05 => Self::StartLinearAddress,
            other => Self::Other(other),
        }
    }
}

impl From<RecordType> for u8 {
    fn from(rtype: RecordType) -> Self {
        match rtype {
            RecordType::Data => 0x00,
            RecordType::EndOfFile => 0x01,
            RecordType::ExtendedSegmentAddress => 0x02,
            RecordType::StartSegmentAddress => 0x03,
            RecordType::ExtendedLinearAddress => 0x04,
            RecordType::StartLinearAddress => 0x05,
            RecordType::Other(other) => other,
        }
    }
}

/// One decoded line of an Intel HEX file.
///
/// A record is produced for every line, valid or not. When `is_valid()` is `false` all the
/// other fields are zeroed and must not be used.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Record {
    /// Byte count field
    pub length: u8,
    /// 16-bit load offset (big-endian on the wire)
    pub address: u16,
    /// Record type field
    pub rtype: RecordType,
    /// Payload, `length` bytes long
    pub data: Vec<u8>,
    /// Checksum byte as found on the line
    pub checksum: u8,
    valid: bool,
}

impl Record {
    /// Parse one line into a [`Record`], folding every failure into the validity flag.
    ///
    /// # Example
    /// ```
    /// use hex2dfu::{Record, RecordType};
    ///
    /// let rec = Record::parse(":00000001FF");
    /// assert!(rec.is_valid());
    /// assert_eq!(rec.rtype, RecordType::EndOfFile);
    ///
    /// assert!(!Record::parse("00000001FF").is_valid());
    /// ```
    #[must_use]
    pub fn parse<L: AsRef<[u8]> + ?Sized>(line: &L) -> Self {
        Self::decode(line).unwrap_or_default()
    }

    /// Decode one line into a [`Record`], reporting why decoding failed.
    ///
    /// # Errors
    /// - [`IntelHexErrorKind::MalformedLine`] if the line cannot be decoded structurally
    /// - [`IntelHexErrorKind::ChecksumMismatch`] if the checksum byte is wrong
    ///
    /// # Example
    /// ```
    /// use hex2dfu::{IntelHexErrorKind, Record};
    ///
    /// let err = Record::decode(":00000001FE").unwrap_err();
    /// assert_eq!(err, IntelHexErrorKind::ChecksumMismatch(0xFF, 0xFE));
    /// ```
    pub fn decode<L: AsRef<[u8]> + ?Sized>(line: &L) -> Result<Self, IntelHexErrorKind> {
        let line = line.as_ref();

        let Some((&START_CODE, digits)) = line.split_first() else {
            return Err(IntelHexErrorKind::MalformedLine);
        };

        let bytes = decode_hex_pairs(digits).ok_or(IntelHexErrorKind::MalformedLine)?;
        if bytes.len() < SMALLEST_RECORD {
            return Err(IntelHexErrorKind::MalformedLine);
        }

        // Split off checksum, everything before it is summed
        let (body, &[checksum]) = bytes.split_at(bytes.len() - 1) else {
            return Err(IntelHexErrorKind::MalformedLine);
        };
        let expected = Self::calculate_checksum(body);
        if expected != checksum {
            return Err(IntelHexErrorKind::ChecksumMismatch(expected, checksum));
        }

        // Byte count is trusted for slicing, trailing extra bytes are tolerated
        let length = body[0];
        let data = body
            .get(4..4 + length as usize)
            .ok_or(IntelHexErrorKind::MalformedLine)?
            .to_vec();

        Ok(Self {
            length,
            address: u16::from_be_bytes([body[1], body[2]]),
            rtype: RecordType::from(body[3]),
            data,
            checksum,
            valid: true,
        })
    }

    /// Whether the line decoded structurally and its checksum matched.
    #[must_use]
    pub const fn is_valid(&self) -> bool {
        self.valid
    }

    /// Calculate the two's complement checksum of a byte slice.
    #[must_use]
    pub fn calculate_checksum(data: &[u8]) -> u8 {
        let sum = data.iter().fold(0u8, |acc, b| acc.wrapping_add(*b));
        (!sum).wrapping_add(1)
    }

    /// Calculate checksum from the Record fields.
    #[must_use]
    pub fn calculate_checksum_from_self(&self) -> u8 {
        let [addr_high, addr_low] = self.address.to_be_bytes();
        let header = [self.length, addr_high, addr_low, u8::from(self.rtype)];
        let sum = header
            .iter()
            .chain(&self.data)
            .fold(0u8, |acc, b| acc.wrapping_add(*b));
        (!sum).wrapping_add(1)
    }

    /// Create the record string from address, type and payload.
    ///
    /// # Errors
    /// Returns an error if the payload does not fit into the byte count field.
    ///
    /// # Example
    /// ```
    /// use hex2dfu::{Record, RecordType};
    ///
    /// let line = Record::create(0, RecordType::ExtendedLinearAddress, &[0x08, 0x00]).unwrap();
    /// assert_eq!(line, ":020000040800F2");
    /// ```
    pub fn create(address: u16, rtype: RecordType, data: &[u8]) -> Result<String, IntelHexErrorKind> {
        let length = u8::try_from(data.len()).map_err(|_| {
            IntelHexErrorKind::RecordLengthInvalidForType(rtype, u8::MAX as usize, data.len())
        })?;

        let record = Self {
            length,
            address,
            rtype,
            data: data.to_vec(),
            checksum: 0,
            valid: true,
        };
        Ok(record.to_string())
    }
}

/// Re-encodes the record fields as a `:BBAAAATT[DD...]CC` line with a recomputed checksum.
impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            ":{:02X}{:04X}{:02X}",
            self.length,
            self.address,
            u8::from(self.rtype)
        )?;
        for b in &self.data {
            write!(f, "{b:02X}")?;
        }
        write!(f, "{:02X}", self.calculate_checksum_from_self())
    }
}

/// Decode an even-length string of hex digit pairs. Returns `None` on odd length or
/// on any non-hex digit.
fn decode_hex_pairs(digits: &[u8]) -> Option<Vec<u8>> {
    if digits.len() % 2 != 0 {
        return None;
    }
    digits
        .chunks_exact(2)
        .map(|pair| Some((nibble(pair[0])? << 4) | nibble(pair[1])?))
        .collect()
}

const fn nibble(c: u8) -> Option<u8> {
    match c {
        b'0'..=b'9' => Some(c - b'0'),
        b'a'..=b'f' => Some(c - b'a' + 10),
        b'A'..=b'F' => Some(c - b'A' + 10),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;

    fn get_valid_str_records() -> [&'static str; 10] {
        [
            ":10D4A400002F0020000000000000000000330020D6",
            ":04D4B4000000000074",
            ":08D4B800CC36FC7F01000000EE",
            ":020000025000AC",
            ":107FA800000080011000C0FFFDFF58003AFFBBF140",
            ":107FB800FFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFC9",
            ":00000001FF",
            ":04000003300020F1B8",
            ":10D314000000000070180020000000000000000061",
            ":1004C00006EE903A36EEC77A37EE647AA5EEC57A34",
        ]
    }

    fn get_invalid_str_records() -> [(&'static str, IntelHexErrorKind); 8] {
        [
            // Empty line
            ("", IntelHexErrorKind::MalformedLine),
            // Removed ':' from record str
            ("00000001FF", IntelHexErrorKind::MalformedLine),
            // Only the start code
            (":", IntelHexErrorKind::MalformedLine),
            // Fewer than five bytes
            (":123456", IntelHexErrorKind::MalformedLine),
            // Odd number of digits
            (":000000001FF", IntelHexErrorKind::MalformedLine),
            // Char 'Z' is not a hex digit
            (":0000000ZFF", IntelHexErrorKind::MalformedLine),
            // Checksum wrong - should be 0x40
            (
                ":107FA800000080011000C0FFFDFF58003AFFBBF144",
                IntelHexErrorKind::ChecksumMismatch(0x40, 0x44),
            ),
            // Byte count reaches past the checksum byte
            (":05000000AABB96", IntelHexErrorKind::MalformedLine),
        ]
    }

    #[test]
    fn test_record_type_from_byte() {
        assert_eq!(RecordType::from(0x00), RecordType::Data);
        assert_eq!(RecordType::from(0x01), RecordType::EndOfFile);
        assert_eq!(RecordType::from(0x02), RecordType::ExtendedSegmentAddress);
        assert_eq!(RecordType::from(0x03), RecordType::StartSegmentAddress);
        assert_eq!(RecordType::from(0x04), RecordType::ExtendedLinearAddress);
        assert_eq!(RecordType::from(0x05), RecordType::StartLinearAddress);
        assert_eq!(RecordType::from(0x06), RecordType::Other(0x06));
        assert_eq!(u8::from(RecordType::Other(0xAB)), 0xAB);
    }

    #[test]
    fn test_parse_valid_records() {
        for line in get_valid_str_records() {
            let rec = Record::parse(line);
            assert!(rec.is_valid(), "{line} should be valid");
        }
    }

    #[test]
    fn test_parse_invalid_records() {
        for (line, expected_error) in get_invalid_str_records() {
            // Flag style never exposes fields of a broken line
            let rec = Record::parse(line);
            assert!(!rec.is_valid(), "{line} should be invalid");
            assert_eq!(rec, Record::default());

            assert_eq!(Record::decode(line).unwrap_err(), expected_error);
        }
    }

    #[test]
    fn test_parse_fields() {
        // Arrange
        let line = ":08D4B800CC36FC7F01000000EE";

        // Act
        let rec = Record::parse(line);

        // Assert
        assert!(rec.is_valid());
        assert_eq!(rec.length, 8);
        assert_eq!(rec.address, 0xD4B8);
        assert_eq!(rec.rtype, RecordType::Data);
        assert_eq!(rec.data, vec![0xCC, 0x36, 0xFC, 0x7F, 0x01, 0x00, 0x00, 0x00]);
        assert_eq!(rec.checksum, 0xEE);
    }

    #[test]
    fn test_parse_end_of_file() {
        let rec = Record::parse(":00000001FF");

        assert!(rec.is_valid());
        assert_eq!(rec.rtype, RecordType::EndOfFile);
        assert_eq!(rec.length, 0);
        assert!(rec.data.is_empty());
    }

    #[test]
    fn test_parse_extended_segment_address() {
        let rec = Record::parse(":020000025000AC");

        assert!(rec.is_valid());
        assert_eq!(rec.rtype, RecordType::ExtendedSegmentAddress);
        assert_eq!(rec.data, vec![0x50, 0x00]);
    }

    #[test]
    fn test_parse_lowercase_digits() {
        let upper = Record::parse(":04000003300020F1B8");
        let lower = Record::parse(":04000003300020f1b8");

        assert!(lower.is_valid());
        assert_eq!(upper, lower);
    }

    #[test]
    fn test_parse_unknown_type_is_kept() {
        // Type 0x06 with a correct checksum
        let rec = Record::parse(":00000006FA");

        assert!(rec.is_valid());
        assert_eq!(rec.rtype, RecordType::Other(0x06));
    }

    #[test]
    fn test_checksum_law() {
        let mut rng = rand::rng();

        for _ in 0..64 {
            // Arrange
            let len = rng.random_range(5..40);
            let bytes: Vec<u8> = (0..len).map(|_| rng.random()).collect();
            let line: String = std::iter::once(":".to_string())
                .chain(bytes.iter().map(|b| format!("{b:02X}")))
                .collect();
            let sum = bytes.iter().fold(0u8, |acc, b| acc.wrapping_add(*b));

            // Act
            let rec = Record::decode(&line);

            // Assert: checksum law decides validity unless byte count overruns the line
            let overruns = 4 + bytes[0] as usize > len - 1;
            assert_eq!(rec.is_ok(), sum == 0 && !overruns, "{line}");
        }
    }

    #[test]
    fn test_calculate_checksum() {
        let cases = [
            (":10010000214601360121470136007EFE09D2190140", 0x40),
            (":100110002146017E17C20001FF5F16002148011928", 0x28),
            (":00000001FF", 0xFF),
            (":020000021200EA", 0xEA),
            (":020000040003F7", 0xF7),
        ];

        for (line, expected_checksum) in cases {
            let rec = Record::parse(line);
            let trimmed = &line[1..line.len() - 2];
            let bytes = decode_hex_pairs(trimmed.as_bytes()).unwrap_or_default();

            assert_eq!(expected_checksum, Record::calculate_checksum(&bytes));
            assert_eq!(expected_checksum, rec.calculate_checksum_from_self());
        }
    }

    #[test]
    fn test_display_reencodes_line() {
        for line in get_valid_str_records() {
            assert_eq!(Record::parse(line).to_string(), line);
        }
        // Lowercase input is re-encoded uppercase
        assert_eq!(
            Record::parse(":04000003300020f1b8").to_string(),
            ":04000003300020F1B8"
        );
    }

    #[test]
    fn test_create_record() {
        assert_eq!(
            Record::create(0, RecordType::EndOfFile, &[]),
            Ok(":00000001FF".to_string())
        );
        assert_eq!(
            Record::create(0, RecordType::ExtendedSegmentAddress, &[0x50, 0x00]),
            Ok(":020000025000AC".to_string())
        );
        assert_eq!(
            Record::create(0, RecordType::Data, &[0u8; 256]),
            Err(IntelHexErrorKind::RecordLengthInvalidForType(
                RecordType::Data,
                255,
                256
            ))
        );
    }
}
