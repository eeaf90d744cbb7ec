use std::time::Duration;

use gsbridge_frame::{EnvelopeReader, EnvelopeWriter};
use gsbridge_transport::UnixDomainSocket;

use crate::cmd::SendArgs;
use crate::exit::{frame_error, io_error, transport_error, CliError, CliResult, SUCCESS, USAGE};
use crate::output::{print_envelope, OutputFormat};

pub fn run(args: SendArgs, format: OutputFormat) -> CliResult<i32> {
    let wait_timeout = parse_duration(&args.wait_timeout)?;
    serde_json::from_str::<serde_json::Value>(&args.json)
        .map_err(|err| CliError::new(USAGE, format!("--json is not valid JSON: {err}")))?;

    let stream = UnixDomainSocket::connect(&args.socket)
        .map_err(|err| transport_error("connect failed", err))?;
    let write_half = stream
        .try_clone()
        .map_err(|err| io_error("connect failed", err))?;

    let mut writer = EnvelopeWriter::new(write_half);
    writer
        .send(args.json.as_bytes())
        .map_err(|err| frame_error("send failed", err))?;

    if args.wait {
        stream
            .set_read_timeout(Some(wait_timeout))
            .map_err(|err| io_error("receive failed", err))?;
        let mut reader = EnvelopeReader::new(stream);
        let body = reader
            .read_envelope()
            .map_err(|err| frame_error("receive failed", err))?;
        print_envelope(&body, format);
    }

    Ok(SUCCESS)
}

fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, millis) = if let Some(num) = input.strip_suffix("ms") {
        (num, true)
    } else if let Some(num) = input.strip_suffix('s') {
        (num, false)
    } else {
        (input, false)
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;

    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    Ok(if millis {
        Duration::from_millis(value)
    } else {
        Duration::from_secs(value)
    })
}
