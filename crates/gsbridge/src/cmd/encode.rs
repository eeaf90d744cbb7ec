use gsbridge_protocol::HostCommand;

use crate::cmd::EncodeArgs;
use crate::exit::{codec_error, command_error, CliResult, SUCCESS};
use crate::output::{print_words, OutputFormat, WordOutput};

pub fn run(args: EncodeArgs, format: OutputFormat) -> CliResult<i32> {
    let command = HostCommand::from_json(args.json.as_bytes())
        .map_err(|err| command_error("invalid command", err))?;
    let words = command
        .words()
        .map_err(|err| codec_error("pack failed", err))?;
    if words.is_empty() {
        tracing::warn!("command packs into no words");
    }

    let outputs = words
        .into_iter()
        .map(WordOutput::from_word)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|err| codec_error("decode failed", err))?;
    print_words(&outputs, format);

    Ok(SUCCESS)
}
