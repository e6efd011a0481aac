//! The `error` module defines the [`Hex2DfuError`] enum that describes the errors that
//! can occur when parsing Intel HEX records, assembling them into image elements, or
//! encoding a DfuSe file.
//! It contains the three pieces of information:
//! 1. Which stage of the conversion failed, e.g., record parsing or DFU encoding.
//! 2. What kind of error was encountered (via [`IntelHexErrorKind`] enum).
//! 3. What is the line number (if applicable), e.g., at which line in a hex file the parsing failed.

use crate::record::RecordType;
use std::error::Error;
use std::fmt;

#[derive(Debug, PartialEq, Eq)]
pub enum Hex2DfuError {
    ParseRecordError(IntelHexErrorKind, usize),
    AssembleError(IntelHexErrorKind, usize),
    EncodeError(IntelHexErrorKind),
    ConvertError(IntelHexErrorKind),
}

impl Hex2DfuError {
    /// Get the underlying error kind regardless of the stage it was raised in.
    #[must_use]
    pub const fn kind(&self) -> &IntelHexErrorKind {
        match self {
            Self::ParseRecordError(kind, _)
            | Self::AssembleError(kind, _)
            | Self::EncodeError(kind)
            | Self::ConvertError(kind) => kind,
        }
    }
}

impl fmt::Display for Hex2DfuError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ParseRecordError(base_err, line) => {
                write!(
                    f,
                    "Error encountered during record parsing at line #{line} of the hex file:\n{base_err}",
                )
            }
            Self::AssembleError(base_err, line) => {
                write!(
                    f,
                    "Error encountered while assembling image elements at line #{line} of the hex file:\n{base_err}",
                )
            }
            Self::EncodeError(base_err) => {
                write!(f, "Error encountered during DFU encoding:\n{base_err}")
            }
            Self::ConvertError(base_err) => {
                write!(f, "Error encountered during conversion:\n{base_err}")
            }
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum IntelHexErrorKind {
    /// Line is empty, misses ':', has an odd number of digits, non-hex digits or is too short
    MalformedLine,
    /// Record checksum mismatch (expected, found)
    ChecksumMismatch(u8, u8),
    /// An invalid record reached the assembler
    MalformedHexRecord,
    /// Record's payload length does not match the record type (type, expected, actual)
    RecordLengthInvalidForType(RecordType, usize, usize),
    /// Assembler already failed on an earlier record
    AssemblerHalted,
    /// Target name is longer than 254 characters
    NameTooLong(usize),
    /// Target name contains non-ASCII characters
    TargetNameNotAscii,
    /// More images than the DfuSe prefix can count
    TooManyTargets(usize),
    /// Length does not fit into a 32-bit DfuSe size field
    SizeOverflow(usize),
    /// Fewer bytes read from a binary source than expected (expected, actual)
    IncompleteRead(u64, usize),
    /// Binary source argument is not of the form `<path>:<address>`
    InvalidBinarySource(String),
}

impl fmt::Display for IntelHexErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MalformedLine => {
                write!(f, "Malformed record line")
            }
            Self::ChecksumMismatch(expected, actual) => {
                write!(
                    f,
                    "Invalid record checksum - expected: 0x{expected:02X}, found: 0x{actual:02X}"
                )
            }
            Self::MalformedHexRecord => {
                write!(f, "Invalid HEX record, invalid file or checksum error")
            }
            Self::RecordLengthInvalidForType(rtype, expected, actual) => {
                write!(
                    f,
                    "For record type {rtype:?} expected data length is {expected} bytes, found {actual}"
                )
            }
            Self::AssemblerHalted => {
                write!(f, "Assembler stopped after an earlier invalid record")
            }
            Self::NameTooLong(len) => {
                write!(
                    f,
                    "Target name can't be more than 254 characters, found {len}"
                )
            }
            Self::TargetNameNotAscii => {
                write!(f, "Target name must only contain ASCII characters")
            }
            Self::TooManyTargets(count) => {
                write!(f, "A DfuSe file holds at most 255 targets, found {count}")
            }
            Self::SizeOverflow(size) => {
                write!(f, "Size of {size} bytes does not fit into a DfuSe size field")
            }
            Self::IncompleteRead(expected, actual) => {
                write!(
                    f,
                    "Incomplete read - expected: {expected} bytes, read: {actual} bytes"
                )
            }
            Self::InvalidBinarySource(source) => {
                write!(
                    f,
                    "Invalid binary source '{source}', expected <path>:<address>"
                )
            }
        }
    }
}

impl Error for Hex2DfuError {}
impl Error for IntelHexErrorKind {}
