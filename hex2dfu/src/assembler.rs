//! The `assembler` module provides [`HexAssembler`], which folds a sequence of parsed
//! [`Record`]s into contiguous [`ImageElement`]s.
//!
//! Records are consumed strictly in input order. Extended segment and extended linear
//! address records move the upper address offset for the data records that follow, and any
//! data record that does not continue exactly where the active element ends opens a new
//! element. The first invalid record halts the assembler for good.

use crate::element::ImageElement;
use crate::error::{Hex2DfuError, IntelHexErrorKind};
use crate::record::{Record, RecordType};
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Collecting,
    Finished,
    Failed,
}

#[derive(Debug, Clone)]
pub struct HexAssembler {
    /// Upper address offset from the last extended address record
    offset: u32,
    /// Element currently being filled
    active: ImageElement,
    /// Closed elements in discovery order
    elements: Vec<ImageElement>,
    phase: Phase,
}

impl Default for HexAssembler {
    fn default() -> Self {
        Self::new()
    }
}

impl HexAssembler {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            offset: 0,
            active: ImageElement::new(0, Vec::new()),
            elements: Vec::new(),
            phase: Phase::Collecting,
        }
    }

    /// Whether an end of file record has been consumed.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.phase == Phase::Finished
    }

    /// Feed the next record.
    ///
    /// # Errors
    /// - [`IntelHexErrorKind::MalformedHexRecord`] if the record is not valid
    /// - [`IntelHexErrorKind::RecordLengthInvalidForType`] if an extended address record
    ///   does not carry exactly two bytes
    /// - [`IntelHexErrorKind::AssemblerHalted`] if an earlier record already failed
    ///
    /// # Example
    /// ```
    /// use hex2dfu::{HexAssembler, Record};
    ///
    /// let mut asm = HexAssembler::new();
    /// asm.feed(&Record::parse(":020000040800F2")).unwrap();
    /// asm.feed(&Record::parse(":0400000001020304F2")).unwrap();
    /// asm.feed(&Record::parse(":00000001FF")).unwrap();
    ///
    /// let elements = asm.finish().unwrap();
    /// assert_eq!(elements[0].address, 0x0800_0000);
    /// assert_eq!(elements[0].data, [1, 2, 3, 4]);
    /// ```
    pub fn feed(&mut self, record: &Record) -> Result<(), IntelHexErrorKind> {
        match self.phase {
            Phase::Failed => return Err(IntelHexErrorKind::AssemblerHalted),
            Phase::Finished => return Ok(()),
            Phase::Collecting => {}
        }

        if !record.is_valid() {
            return Err(self.fail(IntelHexErrorKind::MalformedHexRecord));
        }

        match record.rtype {
            RecordType::Data => self.push_data(record),
            RecordType::ExtendedSegmentAddress => {
                self.offset = u32::from(self.upper_address(record)?) << 4;
                debug!("extended segment address, offset = 0x{:08X}", self.offset);
            }
            RecordType::ExtendedLinearAddress => {
                self.offset = u32::from(self.upper_address(record)?) << 16;
                debug!("extended linear address, offset = 0x{:08X}", self.offset);
            }
            RecordType::EndOfFile => {
                self.close_active();
                self.phase = Phase::Finished;
            }
            RecordType::StartSegmentAddress
            | RecordType::StartLinearAddress
            | RecordType::Other(_) => {}
        }

        Ok(())
    }

    /// Consume the assembler and return the elements in discovery order.
    ///
    /// # Errors
    /// Returns [`IntelHexErrorKind::AssemblerHalted`] if any fed record failed, so that a
    /// partially assembled image can never be used.
    pub fn finish(mut self) -> Result<Vec<ImageElement>, IntelHexErrorKind> {
        match self.phase {
            Phase::Failed => Err(IntelHexErrorKind::AssemblerHalted),
            Phase::Finished => Ok(self.elements),
            Phase::Collecting => {
                warn!("no end of file record found, closing the last element");
                self.close_active();
                Ok(self.elements)
            }
        }
    }

    fn push_data(&mut self, record: &Record) {
        let effective = self.offset.wrapping_add(u32::from(record.address));

        if self.active.is_empty() {
            self.active.address = effective;
        } else if u64::from(effective) != self.active.end_address() {
            // Gap or jump backwards
            self.close_active();
            self.active.address = effective;
        }

        self.active.data.extend_from_slice(&record.data);
    }

    fn close_active(&mut self) {
        if self.active.is_empty() {
            return;
        }
        let element = std::mem::take(&mut self.active);
        debug!(
            "closed element at 0x{:08X}, {} bytes",
            element.address,
            element.size()
        );
        self.elements.push(element);
    }

    fn upper_address(&mut self, record: &Record) -> Result<u16, IntelHexErrorKind> {
        match record.data.as_slice() {
            &[msb, lsb] => Ok(u16::from_be_bytes([msb, lsb])),
            other => Err(self.fail(IntelHexErrorKind::RecordLengthInvalidForType(
                record.rtype,
                2,
                other.len(),
            ))),
        }
    }

    fn fail(&mut self, kind: IntelHexErrorKind) -> IntelHexErrorKind {
        self.phase = Phase::Failed;
        self.elements.clear();
        self.active = ImageElement::default();
        kind
    }
}

/// Parse the raw contents of a hex file and assemble its image elements.
///
/// Lines are split on `\n` with an optional trailing `\r`. Processing stops at the end of
/// file record; anything after it is never looked at.
///
/// # Errors
/// - [`Hex2DfuError::ParseRecordError`] if a line is malformed or its checksum is wrong
/// - [`Hex2DfuError::AssembleError`] if a record cannot be applied
///
/// # Example
/// ```
/// use hex2dfu::assemble_hex;
///
/// let hex = b":0400000001020304F2\n:00000001FF\n";
/// let elements = assemble_hex(hex).unwrap();
///
/// assert_eq!(elements.len(), 1);
/// assert_eq!(elements[0].size(), 4);
/// ```
pub fn assemble_hex(raw_bytes: &[u8]) -> Result<Vec<ImageElement>, Hex2DfuError> {
    let mut asm = HexAssembler::new();
    let mut count: usize = 0;

    for line in raw_bytes.split_inclusive(|&b| b == b'\n') {
        let line = line.strip_suffix(b"\n").unwrap_or(line);
        let line = line.strip_suffix(b"\r").unwrap_or(line);
        count += 1;

        let record =
            Record::decode(line).map_err(|err| Hex2DfuError::ParseRecordError(err, count))?;

        asm.feed(&record)
            .map_err(|err| Hex2DfuError::AssembleError(err, count))?;

        if asm.is_finished() {
            break;
        }
    }

    asm.finish()
        .map_err(|err| Hex2DfuError::AssembleError(err, count))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;

    fn data_record(address: u16, data: &[u8]) -> Record {
        Record::parse(&Record::create(address, RecordType::Data, data).unwrap_or_default())
    }

    fn eof_record() -> Record {
        Record::parse(":00000001FF")
    }

    #[test]
    fn test_gap_starts_new_element() {
        // Arrange
        let mut asm = HexAssembler::new();

        // Act
        asm.feed(&data_record(0x100, &[1, 2, 3, 4])).unwrap_or_default();
        asm.feed(&data_record(0x110, &[5, 6, 7, 8])).unwrap_or_default();
        asm.feed(&eof_record()).unwrap_or_default();
        let elements = asm.finish().unwrap_or_default();

        // Assert
        assert_eq!(
            elements,
            vec![
                ImageElement::new(0x100, vec![1, 2, 3, 4]),
                ImageElement::new(0x110, vec![5, 6, 7, 8]),
            ]
        );
    }

    #[test]
    fn test_contiguous_records_merge() {
        // Arrange
        let mut asm = HexAssembler::new();

        // Act
        asm.feed(&data_record(0x100, &[1, 2, 3, 4])).unwrap_or_default();
        asm.feed(&data_record(0x104, &[5, 6, 7, 8])).unwrap_or_default();
        asm.feed(&eof_record()).unwrap_or_default();
        let elements = asm.finish().unwrap_or_default();

        // Assert
        assert_eq!(
            elements,
            vec![ImageElement::new(0x100, vec![1, 2, 3, 4, 5, 6, 7, 8])]
        );
    }

    #[test]
    fn test_lower_address_starts_new_element() {
        let mut asm = HexAssembler::new();

        asm.feed(&data_record(0x200, &[1, 2])).unwrap_or_default();
        asm.feed(&data_record(0x100, &[3, 4])).unwrap_or_default();
        let elements = asm.finish().unwrap_or_default();

        assert_eq!(elements.len(), 2);
        assert_eq!(elements[0].address, 0x200);
        assert_eq!(elements[1].address, 0x100);
    }

    #[test]
    fn test_overlapping_address_starts_new_element() {
        let mut asm = HexAssembler::new();

        asm.feed(&data_record(0x100, &[1, 2, 3, 4])).unwrap_or_default();
        asm.feed(&data_record(0x102, &[5, 6])).unwrap_or_default();
        let elements = asm.finish().unwrap_or_default();

        assert_eq!(elements.len(), 2);
        assert_eq!(elements[1], ImageElement::new(0x102, vec![5, 6]));
    }

    #[test]
    fn test_extended_linear_address() {
        // Arrange
        let mut asm = HexAssembler::new();
        let ela = Record::parse(":020000040800F2");

        // Act
        asm.feed(&ela).unwrap_or_default();
        asm.feed(&data_record(0x0010, &[0xAA])).unwrap_or_default();
        let elements = asm.finish().unwrap_or_default();

        // Assert
        assert_eq!(elements, vec![ImageElement::new(0x0800_0010, vec![0xAA])]);
    }

    #[test]
    fn test_extended_segment_address() {
        // Arrange
        let mut asm = HexAssembler::new();
        let esa = Record::parse(":020000021200EA");

        // Act
        asm.feed(&esa).unwrap_or_default();
        asm.feed(&data_record(0x0004, &[0xBB])).unwrap_or_default();
        let elements = asm.finish().unwrap_or_default();

        // Assert
        assert_eq!(elements, vec![ImageElement::new(0x12004, vec![0xBB])]);
    }

    #[test]
    fn test_linear_segment_boundary_stays_contiguous() {
        // Data ending at 0x0000_FFFF continues at 0x0001_0000 after the ELA record
        let mut asm = HexAssembler::new();

        asm.feed(&data_record(0xFFFE, &[1, 2])).unwrap_or_default();
        asm.feed(&Record::parse(":020000040001F9")).unwrap_or_default();
        asm.feed(&data_record(0x0000, &[3, 4])).unwrap_or_default();
        let elements = asm.finish().unwrap_or_default();

        assert_eq!(elements, vec![ImageElement::new(0xFFFE, vec![1, 2, 3, 4])]);
    }

    #[test]
    fn test_records_after_eof_are_ignored() {
        let mut asm = HexAssembler::new();

        asm.feed(&data_record(0x0, &[1])).unwrap_or_default();
        asm.feed(&eof_record()).unwrap_or_default();
        let res = asm.feed(&data_record(0x10, &[2]));
        let invalid = asm.feed(&Record::parse("garbage"));

        assert!(res.is_ok());
        assert!(invalid.is_ok());
        assert_eq!(
            asm.finish(),
            Ok(vec![ImageElement::new(0x0, vec![1])])
        );
    }

    #[test]
    fn test_start_and_unknown_records_are_ignored() {
        let mut asm = HexAssembler::new();

        asm.feed(&data_record(0x0, &[1])).unwrap_or_default();
        asm.feed(&Record::parse(":04000003300020F1B8")).unwrap_or_default();
        asm.feed(&Record::parse(":00000006FA")).unwrap_or_default();
        asm.feed(&data_record(0x1, &[2])).unwrap_or_default();

        assert_eq!(
            asm.finish(),
            Ok(vec![ImageElement::new(0x0, vec![1, 2])])
        );
    }

    #[test]
    fn test_invalid_record_halts() {
        // Arrange
        let mut asm = HexAssembler::new();
        asm.feed(&data_record(0x0, &[1, 2, 3])).unwrap_or_default();

        // Act
        let first = asm.feed(&Record::parse(":0000000ZFF"));
        let second = asm.feed(&data_record(0x3, &[4]));

        // Assert
        assert_eq!(first, Err(IntelHexErrorKind::MalformedHexRecord));
        assert_eq!(second, Err(IntelHexErrorKind::AssemblerHalted));
        assert_eq!(asm.finish(), Err(IntelHexErrorKind::AssemblerHalted));
    }

    #[test]
    fn test_short_extended_address_fails() {
        let mut asm = HexAssembler::new();
        // ELA with a single payload byte
        let rec = Record::parse(":0100000408F3");

        let res = asm.feed(&rec);

        assert_eq!(
            res,
            Err(IntelHexErrorKind::RecordLengthInvalidForType(
                RecordType::ExtendedLinearAddress,
                2,
                1
            ))
        );
    }

    #[test]
    fn test_random_contiguous_records_form_one_element() {
        // Arrange
        let mut rng = rand::rng();
        let mut asm = HexAssembler::new();
        let mut expected = Vec::new();
        let mut address: u16 = 0x1000;

        // Act
        for _ in 0..32 {
            let len = rng.random_range(1..=16);
            let chunk: Vec<u8> = (0..len).map(|_| rng.random()).collect();
            asm.feed(&data_record(address, &chunk)).unwrap_or_default();
            address += u16::try_from(chunk.len()).unwrap_or_default();
            expected.extend(chunk);
        }
        let elements = asm.finish().unwrap_or_default();

        // Assert
        assert_eq!(elements, vec![ImageElement::new(0x1000, expected)]);
    }

    #[test]
    fn test_assemble_hex_lines() {
        let hex = b":020000040800F2\r\n:0400000001020304F2\r\n:0400100005060708D2\r\n:00000001FF\r\n";

        let elements = assemble_hex(hex);

        assert_eq!(
            elements,
            Ok(vec![
                ImageElement::new(0x0800_0000, vec![1, 2, 3, 4]),
                ImageElement::new(0x0800_0010, vec![5, 6, 7, 8]),
            ])
        );
    }

    #[test]
    fn test_assemble_hex_reports_line() {
        let hex = b":0400000001020304F2\n:0400040005060708E5\n:00000001FF\n";

        let res = assemble_hex(hex);

        assert_eq!(
            res,
            Err(Hex2DfuError::ParseRecordError(
                IntelHexErrorKind::ChecksumMismatch(0xDE, 0xE5),
                2
            ))
        );
    }

    #[test]
    fn test_assemble_hex_blank_line_is_malformed() {
        let hex = b":0400000001020304F2\n\n:00000001FF\n";

        let res = assemble_hex(hex);

        assert_eq!(
            res,
            Err(Hex2DfuError::ParseRecordError(IntelHexErrorKind::MalformedLine, 2))
        );
    }

    #[test]
    fn test_assemble_hex_stops_at_eof() {
        let hex = b":0400000001020304F2\n:00000001FF\nnot a record\n";

        let res = assemble_hex(hex);

        assert_eq!(res, Ok(vec![ImageElement::new(0, vec![1, 2, 3, 4])]));
    }
}
