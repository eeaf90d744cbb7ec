use std::path::PathBuf;

use clap::{Args, Subcommand, ValueEnum};
use gsbridge_frame::TxEncoding;
use gsbridge_transport::{DEFAULT_SERIAL_DEVICE, DEFAULT_SOCKET_PATH};

use crate::exit::CliResult;
use crate::output::OutputFormat;

pub mod decode;
pub mod encode;
pub mod run;
pub mod send;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the bridge between the IPC socket and the serial line.
    Run(RunArgs),
    /// Send one JSON command to a running bridge.
    Send(SendArgs),
    /// Show the words and serial frames a JSON command packs into.
    Encode(EncodeArgs),
    /// Decode a 64-bit word or a 12-byte serial frame given in hex.
    Decode(DecodeArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Run(args) => run::run(args),
        Command::Send(args) => send::run(args, format),
        Command::Encode(args) => encode::run(args, format),
        Command::Decode(args) => decode::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum TxEncodingArg {
    /// Binary frame: AA 55 08, word big-endian, XOR checksum.
    #[default]
    Frame,
    /// 64 ASCII '0'/'1' characters, MSB first, then CR.
    BitString,
}

impl From<TxEncodingArg> for TxEncoding {
    fn from(arg: TxEncodingArg) -> Self {
        match arg {
            TxEncodingArg::Frame => TxEncoding::Frame,
            TxEncodingArg::BitString => TxEncoding::BitString,
        }
    }
}

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Serial device of the radio module.
    #[arg(env = "UART_DEV", default_value = DEFAULT_SERIAL_DEVICE)]
    pub device: String,
    /// IPC socket path.
    #[arg(long, default_value = DEFAULT_SOCKET_PATH)]
    pub socket: PathBuf,
    /// How command words are written to the serial line.
    #[arg(long, value_enum, default_value_t = TxEncodingArg::Frame)]
    pub tx_encoding: TxEncodingArg,
    /// Skip the radio handshake (link paired out of band).
    #[arg(long)]
    pub no_link: bool,
    /// Remote radio address for the connect directive.
    #[arg(long, value_name = "ADDR", conflicts_with = "no_link")]
    pub remote: Option<String>,
}

#[derive(Args, Debug)]
pub struct SendArgs {
    /// JSON command body.
    #[arg(long)]
    pub json: String,
    /// IPC socket path of the running bridge.
    #[arg(long, default_value = DEFAULT_SOCKET_PATH)]
    pub socket: PathBuf,
    /// Wait for one reply envelope and print it.
    #[arg(long)]
    pub wait: bool,
    /// Maximum time to wait for a reply when --wait is set (e.g. 5s, 500ms).
    #[arg(long, default_value = "5s")]
    pub wait_timeout: String,
}

#[derive(Args, Debug)]
pub struct EncodeArgs {
    /// JSON command body.
    #[arg(long)]
    pub json: String,
}

#[derive(Args, Debug)]
pub struct DecodeArgs {
    /// 16 hex digits (word) or 24 hex digits (frame). `0x` prefix, spaces,
    /// `:` and `_` separators are accepted.
    pub hex: String,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}
