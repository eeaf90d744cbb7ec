use std::io::{IsTerminal, Write};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use gsbridge_frame::frame_bytes;
use gsbridge_protocol::{unpack, CodecError, Message};
use serde::Serialize;
use serde_json::{json, Map, Value};

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
    Raw,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

/// One message word with its serial encodings and decoded fields.
#[derive(Debug, Serialize)]
pub struct WordOutput {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub word: String,
    pub frame: String,
    pub bit_string: String,
    pub fields: Map<String, Value>,
    #[serde(skip)]
    raw_frame: Vec<u8>,
}

impl WordOutput {
    pub fn from_word(word: u64) -> Result<Self, CodecError> {
        let message = unpack(word)?;
        let raw_frame = frame_bytes(word).to_vec();
        Ok(Self {
            kind: message.message_type().tag(),
            word: format!("{word:#018x}"),
            frame: hex(&raw_frame),
            bit_string: format!("{word:064b}"),
            fields: fields_of(&message),
            raw_frame,
        })
    }
}

fn fields_of(message: &Message) -> Map<String, Value> {
    let value = match message {
        Message::Control(c) => json!({
            "forward": c.forward as u8,
            "backward": c.backward as u8,
            "left": c.left as u8,
            "right": c.right as u8,
            "speed": c.speed,
            "priority_level": c.priority,
        }),
        Message::Pose(p) => json!({
            "instruction": p.instruction,
            "priority_level": p.priority,
            "id": p.id,
        }),
        Message::System(s) => json!({
            "instruction": s.instruction,
            "ac": s.ac,
            "priority_level": s.priority,
            "id": s.id,
            "instruction_specific": s.payload,
        }),
        Message::Query(q) => json!({
            "instruction": q.instruction,
            "priority_level": q.priority,
            "id": q.id,
            "report": q.report as u8,
        }),
        Message::StatusReport(sr) => serde_json::to_value(sr).unwrap_or_default(),
        Message::HealthReport(hr) => serde_json::to_value(hr).unwrap_or_default(),
        Message::Ack(raw) | Message::HighPriorityReport(raw) => json!({
            "raw_u64": raw.to_string(),
        }),
    };
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

pub fn print_words(words: &[WordOutput], format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            for word in words {
                println!(
                    "{}",
                    serde_json::to_string(word).unwrap_or_else(|_| "{}".to_string())
                );
            }
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["TYPE", "WORD", "FRAME", "FIELDS"]);
            for word in words {
                table.add_row(vec![
                    word.kind.to_string(),
                    word.word.clone(),
                    word.frame.clone(),
                    inline_fields(&word.fields),
                ]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty => {
            for word in words {
                println!(
                    "type={} word={} frame={} {}",
                    word.kind,
                    word.word,
                    word.frame,
                    inline_fields(&word.fields)
                );
            }
        }
        OutputFormat::Raw => {
            let bytes: Vec<u8> = words.iter().flat_map(|w| w.raw_frame.clone()).collect();
            print_raw(&bytes);
        }
    }
}

/// Print one envelope body received from the bridge.
pub fn print_envelope(body: &[u8], format: OutputFormat) {
    let parsed = serde_json::from_slice::<Value>(body).ok();
    match (format, parsed) {
        (OutputFormat::Raw, _) | (_, None) => print_raw(body),
        (OutputFormat::Json, Some(value)) => println!("{value}"),
        (OutputFormat::Pretty, Some(value)) => println!(
            "{}",
            serde_json::to_string_pretty(&value).unwrap_or_else(|_| value.to_string())
        ),
        (OutputFormat::Table, Some(Value::Object(map))) => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["KEY", "VALUE"]);
            for (key, value) in &map {
                table.add_row(vec![key.clone(), scalar(value)]);
            }
            println!("{table}");
        }
        (OutputFormat::Table, Some(value)) => println!("{value}"),
    }
}

pub fn print_raw(data: &[u8]) {
    let mut out = std::io::stdout();
    let _ = out.write_all(data);
    let _ = out.flush();
}

fn inline_fields(fields: &Map<String, Value>) -> String {
    fields
        .iter()
        .map(|(k, v)| format!("{k}={}", scalar(v)))
        .collect::<Vec<_>>()
        .join(" ")
}

fn scalar(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02X}")).collect()
}
