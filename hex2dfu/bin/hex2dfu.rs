use clap::{Parser, Subcommand};
use hex2dfu::convert::{bin_files_to_dfu, hex_file_to_bin, hex_file_to_dfu};
use hex2dfu::{BinarySource, DfuConfig};
use std::path::PathBuf;
use std::process;
use tracing::error;

#[derive(Parser, Debug)]
#[command(author, version, about = "Intel HEX / BIN to DfuSe converter", long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Convert an Intel HEX file into a DfuSe file
    Hex {
        input: PathBuf,
        output: PathBuf,

        #[command(flatten)]
        ids: DeviceIds,

        /// Target name (default: output file name without extension)
        #[arg(long)]
        name: Option<String>,
    },
    /// Pack raw binaries, each at its own address, into a DfuSe file
    Bin {
        output: PathBuf,

        /// Binary inputs as <file>:<address>, e.g. nanoBooter.bin:0x08000000
        #[arg(required = true)]
        sources: Vec<BinarySource>,

        #[command(flatten)]
        ids: DeviceIds,

        /// Target name
        #[arg(long)]
        name: Option<String>,
    },
    /// Flatten an Intel HEX file into a raw binary image
    Flat {
        input: PathBuf,
        output: PathBuf,

        /// Byte used to fill gaps between elements
        #[arg(long, value_parser = parse_hex_u8, default_value = "0xFF")]
        gap_fill: u8,
    },
}

#[derive(clap::Args, Debug)]
struct DeviceIds {
    /// USB vendor id
    #[arg(long, value_parser = parse_hex_u16, default_value = "0x0483")]
    vid: u16,

    /// USB product id
    #[arg(long, value_parser = parse_hex_u16, default_value = "0xDF11")]
    pid: u16,

    /// Firmware version (BCD)
    #[arg(long, value_parser = parse_hex_u16, default_value = "0x2200")]
    fw_version: u16,
}

impl DeviceIds {
    fn into_config(self, target_name: Option<String>) -> DfuConfig {
        DfuConfig {
            vendor_id: self.vid,
            product_id: self.pid,
            firmware_version: self.fw_version,
            target_name,
        }
    }
}

fn main() {
    let args = Args::parse();

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::builder()
                .with_default_directive(if args.verbose {
                    tracing::Level::DEBUG.into()
                } else {
                    tracing::Level::INFO.into()
                })
                .from_env_lossy(),
        )
        .with_writer(std::io::stderr)
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Warning: logging disabled: {e}");
    }

    if let Err(e) = run(args.command) {
        error!("conversion failed");
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn run(command: Command) -> Result<(), Box<dyn std::error::Error>> {
    match command {
        Command::Hex {
            input,
            output,
            ids,
            name,
        } => {
            let cfg = ids.into_config(name);
            hex_file_to_dfu(&input, &output, &cfg)?;
            print_generated(&output, &cfg);
        }
        Command::Bin {
            output,
            sources,
            ids,
            name,
        } => {
            let cfg = ids.into_config(name);
            bin_files_to_dfu(&sources, &output, &cfg)?;
            print_generated(&output, &cfg);
        }
        Command::Flat {
            input,
            output,
            gap_fill,
        } => {
            let base = hex_file_to_bin(&input, &output, gap_fill)?;
            println!("Flattened {} -> {}", input.display(), output.display());
            println!("Load address: 0x{base:08X}");
        }
    }
    Ok(())
}

fn print_generated(output: &std::path::Path, cfg: &DfuConfig) {
    println!("DFU generated: {}", output.display());
    println!("Vendor ID: 0x{:04X}", cfg.vendor_id);
    println!("Product ID: 0x{:04X}", cfg.product_id);
    println!("Version: 0x{:04X}", cfg.firmware_version);
}

// =============================== HELPER FUNCTIONS ===============================

/// Parse a string as a hex number (with optional 0x prefix)
fn parse_hex_u16(s: &str) -> Result<u16, String> {
    let s = s.trim();
    let digits = s
        .strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .unwrap_or(s);
    u16::from_str_radix(digits, 16).map_err(|e| format!("invalid hex value '{s}': {e}"))
}

fn parse_hex_u8(s: &str) -> Result<u8, String> {
    let value = parse_hex_u16(s)?;
    u8::try_from(value).map_err(|_| format!("value '{s}' does not fit in one byte"))
}
