//! The `convert` module is the conversion driver: it turns Intel HEX text or raw binaries
//! into DfuSe files (or a flat binary image) and moves them between memory and disk.
//!
//! Every output buffer is built completely in memory before the output file is created,
//! so a failed conversion never leaves a truncated file behind.

use crate::assembler::assemble_hex;
use crate::config::{DEFAULT_BIN_TARGET_NAME, DfuConfig};
use crate::dfu::{DfuImage, TargetPrefix};
use crate::element::ImageElement;
use crate::encoder::DfuFile;
use crate::error::{Hex2DfuError, IntelHexErrorKind};
use regex::Regex;
use std::error::Error;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::LazyLock;
use tracing::info;

// Path is greedy so that only the last ':' separates the address (`C:\fw.bin:0x0`)
static BINARY_SOURCE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<path>.+):(?:0[xX])?(?P<addr>[0-9A-Fa-f]{1,8})$")
        .unwrap_or_else(|e| unreachable!("invalid binary source regex: {e}"))
});

/// A raw binary file and the address it is loaded at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinarySource {
    pub path: PathBuf,
    pub address: u32,
}

impl BinarySource {
    #[must_use]
    pub fn new<P: AsRef<Path>>(path: P, address: u32) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            address,
        }
    }
}

/// Parses `<path>:<address>`, the address being hex with an optional `0x` prefix.
///
/// # Example
/// ```
/// use hex2dfu::BinarySource;
///
/// let src: BinarySource = "nanoBooter.bin:0x08000000".parse().unwrap();
/// assert_eq!(src.address, 0x0800_0000);
/// assert_eq!(src.path.to_str(), Some("nanoBooter.bin"));
/// ```
impl FromStr for BinarySource {
    type Err = IntelHexErrorKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || IntelHexErrorKind::InvalidBinarySource(s.to_string());

        let caps = BINARY_SOURCE_RE.captures(s.trim()).ok_or_else(invalid)?;
        let address = u32::from_str_radix(&caps["addr"], 16).map_err(|_| invalid())?;

        Ok(Self::new(&caps["path"], address))
    }
}

/// Convert the raw contents of a hex file into a DfuSe file with a single target.
///
/// # Errors
/// - Returns an error if any record is malformed or cannot be assembled
/// - Returns an error if the target name is invalid
/// - Returns an error if the image does not fit the DfuSe size fields
///
/// # Example
/// ```
/// use hex2dfu::{DfuConfig, convert::hex_to_dfu, verify_crc};
///
/// let hex = b":0400000001020304F2\n:00000001FF\n";
/// let dfu = hex_to_dfu(hex, "board", &DfuConfig::default()).unwrap();
///
/// assert_eq!(dfu.len(), 11 + 274 + 8 + 4 + 16);
/// assert!(verify_crc(&dfu));
/// ```
pub fn hex_to_dfu(
    raw_bytes: &[u8],
    target_name: &str,
    cfg: &DfuConfig,
) -> Result<Vec<u8>, Hex2DfuError> {
    let elements = assemble_hex(raw_bytes)?;
    elements_to_dfu(elements, target_name, cfg)
}

/// Build a DfuSe file with a single target holding the given elements, in order.
///
/// # Errors
/// Returns an error if the target name is invalid or the image does not fit the DfuSe
/// size fields.
pub fn bins_to_dfu(
    elements: Vec<ImageElement>,
    cfg: &DfuConfig,
) -> Result<Vec<u8>, Hex2DfuError> {
    let name = cfg.target_name.as_deref().unwrap_or(DEFAULT_BIN_TARGET_NAME);
    elements_to_dfu(elements, name, cfg)
}

fn elements_to_dfu(
    elements: Vec<ImageElement>,
    target_name: &str,
    cfg: &DfuConfig,
) -> Result<Vec<u8>, Hex2DfuError> {
    let prefix = TargetPrefix::new(false, target_name).map_err(Hex2DfuError::ConvertError)?;

    let mut file = DfuFile::new(cfg.suffix());
    file.push_image(DfuImage::new(prefix, elements));
    file.to_bytes()
}

/// Lay the elements out as one flat image starting at the lowest element address.
/// Gaps are filled with `gap_fill`; where elements overlap the later one wins.
///
/// Returns the base address and the image bytes, `None` when there is no data.
///
/// # Example
/// ```
/// use hex2dfu::{ImageElement, convert::flatten};
///
/// let elements = [ImageElement::new(0x10, vec![1, 2]), ImageElement::new(0x14, vec![3])];
/// let (base, image) = flatten(&elements, 0xFF).unwrap();
///
/// assert_eq!(base, 0x10);
/// assert_eq!(image, [1, 2, 0xFF, 0xFF, 3]);
/// ```
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn flatten(elements: &[ImageElement], gap_fill: u8) -> Option<(u32, Vec<u8>)> {
    let non_empty = || elements.iter().filter(|e| !e.is_empty());
    let base = non_empty().map(|e| e.address).min()?;
    let end = non_empty().map(ImageElement::end_address).max()?;

    let mut image = vec![gap_fill; (end - u64::from(base)) as usize];
    for element in non_empty() {
        let start = (element.address - base) as usize;
        image[start..start + element.size()].copy_from_slice(&element.data);
    }
    Some((base, image))
}

/// Read a raw binary source in full as one element.
///
/// # Errors
/// Returns an error if the file cannot be read or fewer bytes than its size are read.
pub fn read_bin(source: &BinarySource) -> Result<ImageElement, Box<dyn Error>> {
    let mut file = std::fs::File::open(&source.path)?;
    let expected = file.metadata()?.len();

    let mut data = Vec::with_capacity(usize::try_from(expected).unwrap_or_default());
    file.read_to_end(&mut data)?;

    if (data.len() as u64) < expected {
        return Err(Hex2DfuError::ConvertError(IntelHexErrorKind::IncompleteRead(
            expected,
            data.len(),
        ))
        .into());
    }

    info!(
        "adding {} ({} bytes) at 0x{:08X}",
        source.path.display(),
        data.len(),
        source.address
    );
    Ok(ImageElement::new(source.address, data))
}

/// Convert a hex file into a DfuSe file at `output`.
/// The target name is taken from `cfg` or derived from the output file name.
///
/// # Errors
/// Returns an error if the input cannot be read, the conversion fails, or the output
/// cannot be written. No output file is created when the conversion fails.
pub fn hex_file_to_dfu<P: AsRef<Path>, Q: AsRef<Path>>(
    input: P,
    output: Q,
    cfg: &DfuConfig,
) -> Result<(), Box<dyn Error>> {
    info!("converting HEX file {} to DFU", input.as_ref().display());

    let raw_bytes = std::fs::read(&input)?;
    let dfu = hex_to_dfu(&raw_bytes, &cfg.target_name_for(&output), cfg)?;

    write_output(&output, &dfu)?;
    info!("DFU generated: {} ({} bytes)", output.as_ref().display(), dfu.len());
    Ok(())
}

/// Convert a set of raw binaries, each at its own address, into a DfuSe file at `output`.
///
/// # Errors
/// Returns an error if an input cannot be read completely, the conversion fails, or the
/// output cannot be written. No output file is created when the conversion fails.
pub fn bin_files_to_dfu<Q: AsRef<Path>>(
    sources: &[BinarySource],
    output: Q,
    cfg: &DfuConfig,
) -> Result<(), Box<dyn Error>> {
    let elements = sources
        .iter()
        .map(read_bin)
        .collect::<Result<Vec<_>, _>>()?;
    let dfu = bins_to_dfu(elements, cfg)?;

    write_output(&output, &dfu)?;
    info!("DFU generated: {} ({} bytes)", output.as_ref().display(), dfu.len());
    Ok(())
}

/// Convert a hex file into a flat binary image at `output`.
///
/// Returns the load address of the first byte of the image.
///
/// # Errors
/// Returns an error if the input cannot be read or parsed, or the output cannot be written.
pub fn hex_file_to_bin<P: AsRef<Path>, Q: AsRef<Path>>(
    input: P,
    output: Q,
    gap_fill: u8,
) -> Result<u32, Box<dyn Error>> {
    let raw_bytes = std::fs::read(&input)?;
    let elements = assemble_hex(&raw_bytes)?;
    let (base, image) = flatten(&elements, gap_fill).unwrap_or_default();

    write_output(&output, &image)?;
    info!(
        "BIN generated: {} ({} bytes from 0x{base:08X})",
        output.as_ref().display(),
        image.len()
    );
    Ok(base)
}

fn write_output<P: AsRef<Path>>(filepath: P, bytes: &[u8]) -> Result<(), Box<dyn Error>> {
    // Ensure the parent directory exists
    if let Some(parent) = filepath.as_ref().parent() {
        std::fs::create_dir_all(parent)?;
    }

    let file = std::fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(filepath)?;

    let mut writer = std::io::BufWriter::new(file);
    writer.write_all(bytes)?;
    writer.flush()?;
    Ok(())
}
