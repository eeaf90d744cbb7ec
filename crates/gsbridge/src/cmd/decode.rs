use gsbridge_frame::{FrameParser, FRAME_SIZE};

use crate::cmd::DecodeArgs;
use crate::exit::{codec_error, CliError, CliResult, DATA_INVALID, SUCCESS, USAGE};
use crate::output::{print_words, OutputFormat, WordOutput};

const WORD_SIZE: usize = 8;

pub fn run(args: DecodeArgs, format: OutputFormat) -> CliResult<i32> {
    let bytes = parse_hex(&args.hex)?;
    let word = match bytes.len() {
        WORD_SIZE => {
            let mut be = [0u8; WORD_SIZE];
            be.copy_from_slice(&bytes);
            u64::from_be_bytes(be)
        }
        FRAME_SIZE => word_from_frame(&bytes)?,
        n => {
            return Err(CliError::new(
                USAGE,
                format!("expected {WORD_SIZE} bytes (word) or {FRAME_SIZE} bytes (frame), got {n}"),
            ))
        }
    };

    let output = WordOutput::from_word(word).map_err(|err| codec_error("decode failed", err))?;
    print_words(&[output], format);
    Ok(SUCCESS)
}

fn parse_hex(input: &str) -> CliResult<Vec<u8>> {
    let trimmed = input.trim();
    let trimmed = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);
    let digits: Vec<u8> = trimmed
        .bytes()
        .filter(|b| !matches!(b, b' ' | b':' | b'_'))
        .collect();

    if digits.len() % 2 != 0 {
        return Err(CliError::new(USAGE, "hex input has an odd number of digits"));
    }
    digits
        .chunks(2)
        .map(|pair| {
            std::str::from_utf8(pair)
                .ok()
                .and_then(|s| u8::from_str_radix(s, 16).ok())
                .ok_or_else(|| CliError::new(USAGE, format!("invalid hex input: {input}")))
        })
        .collect()
}

fn word_from_frame(bytes: &[u8]) -> CliResult<u64> {
    let mut parser = FrameParser::new();
    match parser.feed_slice(bytes).as_slice() {
        [word] => Ok(*word),
        _ => {
            let stats = parser.stats();
            Err(CliError::new(
                DATA_INVALID,
                format!(
                    "not a valid frame (checksum_errors={}, length_errors={})",
                    stats.checksum_errors, stats.length_errors
                ),
            ))
        }
    }
}
