//! Host JSON commands.
//!
//! A command body is a JSON object with a string `type` tag (`C`, `P`, `S`
//! or `Q`) and integer fields. Every field is range-checked here, before
//! anything is packed, so a rejected command never reaches the serial line.

use serde_json::{Map, Value};

use crate::error::{CodecError, CommandError};
use crate::message::{Control, MessageType, Pose, Query, System};

/// A validated host command, ready to pack.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostCommand {
    Control(Control),
    /// One word per instruction; a single `instruction` yields one element.
    Pose(Vec<Pose>),
    System(System),
    Query(Query),
}

impl HostCommand {
    /// Parse and validate one JSON envelope body.
    pub fn from_json(body: &[u8]) -> Result<Self, CommandError> {
        let root: Value = serde_json::from_slice(body).map_err(|_| CommandError::BadJson)?;
        let obj = root.as_object().ok_or(CommandError::MissingType)?;
        let tag = obj
            .get("type")
            .and_then(Value::as_str)
            .ok_or(CommandError::MissingType)?;

        match tag {
            "C" => parse_control(Fields::new("C", obj)),
            "P" => parse_pose(Fields::new("P", obj)),
            "S" => parse_system(Fields::new("S", obj)),
            "Q" => parse_query(Fields::new("Q", obj)),
            other => Err(CommandError::UnknownType(other.to_string())),
        }
    }

    pub fn message_type(&self) -> MessageType {
        match self {
            Self::Control(_) => MessageType::Control,
            Self::Pose(_) => MessageType::Pose,
            Self::System(_) => MessageType::System,
            Self::Query(_) => MessageType::Query,
        }
    }

    /// Pack the command into the words to transmit, in order.
    pub fn words(&self) -> Result<Vec<u64>, CodecError> {
        match self {
            Self::Control(c) => Ok(vec![c.pack()?]),
            Self::Pose(poses) => poses.iter().map(Pose::pack).collect(),
            Self::System(s) => Ok(vec![s.pack()?]),
            Self::Query(q) => Ok(vec![q.pack()?]),
        }
    }
}

struct Fields<'a> {
    kind: &'static str,
    obj: &'a Map<String, Value>,
}

impl<'a> Fields<'a> {
    fn new(kind: &'static str, obj: &'a Map<String, Value>) -> Self {
        Self { kind, obj }
    }

    /// Required non-negative integer no larger than `max`.
    fn uint(&self, key: &str, max: u64) -> Result<u64, CommandError> {
        let value = self.obj.get(key).ok_or_else(|| self.bad(format!("missing {key}")))?;
        let n = value
            .as_u64()
            .ok_or_else(|| self.bad(format!("{key} is not a non-negative integer")))?;
        if n > max {
            return Err(self.bad(format!("{key}={n} exceeds {max}")));
        }
        Ok(n)
    }

    fn flag(&self, key: &str) -> Result<bool, CommandError> {
        Ok(self.uint(key, 1)? == 1)
    }

    fn bad(&self, detail: String) -> CommandError {
        CommandError::BadFields {
            kind: self.kind,
            detail,
        }
    }
}

fn parse_control(f: Fields<'_>) -> Result<HostCommand, CommandError> {
    Ok(HostCommand::Control(Control {
        forward: f.flag("forward")?,
        backward: f.flag("backward")?,
        left: f.flag("left")?,
        right: f.flag("right")?,
        speed: f.uint("speed", 100)? as u8,
        priority: f.uint("priority_level", 3)? as u8,
    }))
}

fn parse_pose(f: Fields<'_>) -> Result<HostCommand, CommandError> {
    let priority = f.uint("priority_level", 3)? as u8;
    let id = f.uint("id", 2047)? as u16;
    let pose = |instruction: u8| Pose {
        instruction,
        priority,
        id,
    };

    let instruction = f.obj.get("instruction");
    let actions = f.obj.get("actions").and_then(Value::as_array);

    match (instruction, actions) {
        (Some(_), Some(_)) => Err(CommandError::PoseAmbiguousInstruction),
        (Some(value), None) => match value.as_u64() {
            Some(op) if op <= 15 => Ok(HostCommand::Pose(vec![pose(op as u8)])),
            _ => Err(CommandError::PoseInstructionOutOfRange),
        },
        (None, Some(list)) => {
            let poses: Vec<Pose> = list
                .iter()
                .filter_map(Value::as_u64)
                .filter(|op| *op <= 15)
                .map(|op| pose(op as u8))
                .collect();
            if poses.len() != list.len() {
                tracing::debug!(
                    total = list.len(),
                    kept = poses.len(),
                    "skipped invalid P actions"
                );
            }
            Ok(HostCommand::Pose(poses))
        }
        (None, None) => Err(CommandError::PoseMissingInstruction),
    }
}

fn parse_system(f: Fields<'_>) -> Result<HostCommand, CommandError> {
    Ok(HostCommand::System(System {
        instruction: f.uint("instruction", 15)? as u8,
        ac: f.uint("ac", 1023)? as u16,
        priority: f.uint("priority_level", 3)? as u8,
        id: f.uint("id", 2047)? as u16,
        payload: f.uint("instruction_specific", u32::MAX as u64)? as u32,
    }))
}

fn parse_query(f: Fields<'_>) -> Result<HostCommand, CommandError> {
    Ok(HostCommand::Query(Query {
        instruction: f.uint("instruction", 15)? as u8,
        priority: f.uint("priority_level", 3)? as u8,
        id: f.uint("id", 2047)? as u16,
        report: f.flag("report")?,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: &str) -> Result<HostCommand, CommandError> {
        HostCommand::from_json(json.as_bytes())
    }

    #[test]
    fn control_command_packs_one_word() {
        let cmd = parse(
            r#"{"type":"C","forward":1,"backward":0,"left":0,"right":0,"speed":50,"priority_level":0}"#,
        )
        .unwrap();
        let words = cmd.words().unwrap();
        assert_eq!(words.len(), 1);
        let c = Control::unpack(words[0]).unwrap();
        assert!(c.forward);
        assert!(!c.backward);
        assert_eq!(c.speed, 50);
        assert_eq!(c.priority, 0);
    }

    #[test]
    fn control_missing_fields_rejected() {
        let err = parse(r#"{"type":"C","speed":150}"#).unwrap_err();
        assert!(matches!(err, CommandError::BadFields { kind: "C", .. }));
        assert_eq!(err.to_string(), "bad C fields");
    }

    #[test]
    fn control_speed_above_100_rejected() {
        let err = parse(
            r#"{"type":"C","forward":0,"backward":0,"left":0,"right":1,"speed":101,"priority_level":0}"#,
        )
        .unwrap_err();
        match err {
            CommandError::BadFields { detail, .. } => assert!(detail.contains("speed")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn flags_must_be_zero_or_one() {
        let err = parse(
            r#"{"type":"C","forward":2,"backward":0,"left":0,"right":0,"speed":1,"priority_level":0}"#,
        )
        .unwrap_err();
        assert!(matches!(err, CommandError::BadFields { .. }));
    }

    #[test]
    fn non_integer_values_rejected() {
        for speed in ["-1", "1.5", "true", "\"10\""] {
            let json = format!(
                r#"{{"type":"C","forward":0,"backward":0,"left":0,"right":0,"speed":{speed},"priority_level":0}}"#
            );
            assert!(
                matches!(parse(&json), Err(CommandError::BadFields { .. })),
                "speed {speed} must be rejected"
            );
        }
    }

    #[test]
    fn bad_json_and_missing_type() {
        assert_eq!(parse("{not json").unwrap_err(), CommandError::BadJson);
        assert_eq!(parse(r#"{"speed":1}"#).unwrap_err(), CommandError::MissingType);
        assert_eq!(parse(r#"{"type":7}"#).unwrap_err(), CommandError::MissingType);
        assert_eq!(parse("[1,2]").unwrap_err(), CommandError::MissingType);
    }

    #[test]
    fn unknown_type_tag() {
        let err = parse(r#"{"type":"SR"}"#).unwrap_err();
        assert_eq!(err, CommandError::UnknownType("SR".into()));
        assert_eq!(err.to_string(), "unknown type");
    }

    #[test]
    fn pose_single_instruction() {
        let cmd = parse(r#"{"type":"P","priority_level":2,"id":9,"instruction":15}"#).unwrap();
        assert_eq!(
            cmd,
            HostCommand::Pose(vec![Pose {
                instruction: 15,
                priority: 2,
                id: 9
            }])
        );
    }

    #[test]
    fn pose_instruction_out_of_range() {
        let err = parse(r#"{"type":"P","priority_level":0,"id":1,"instruction":16}"#).unwrap_err();
        assert_eq!(err, CommandError::PoseInstructionOutOfRange);
        assert_eq!(err.to_string(), "P instruction out of range");
    }

    #[test]
    fn pose_actions_skip_invalid_elements() {
        let cmd = parse(
            r#"{"type":"P","priority_level":1,"id":3,"actions":[1,"x",16,-2,4,2.5,15]}"#,
        )
        .unwrap();
        let words = cmd.words().unwrap();
        let ops: Vec<u8> = words
            .iter()
            .map(|w| Pose::unpack(*w).unwrap().instruction)
            .collect();
        assert_eq!(ops, vec![1, 4, 15]);
    }

    #[test]
    fn pose_requires_exactly_one_instruction_source() {
        assert_eq!(
            parse(r#"{"type":"P","priority_level":0,"id":1}"#).unwrap_err(),
            CommandError::PoseMissingInstruction
        );
        assert_eq!(
            parse(r#"{"type":"P","priority_level":0,"id":1,"actions":5}"#).unwrap_err(),
            CommandError::PoseMissingInstruction
        );
        assert_eq!(
            parse(r#"{"type":"P","priority_level":0,"id":1,"instruction":1,"actions":[2]}"#)
                .unwrap_err(),
            CommandError::PoseAmbiguousInstruction
        );
    }

    #[test]
    fn pose_common_fields_checked_first() {
        let err = parse(r#"{"type":"P","priority_level":0,"id":4096,"instruction":1}"#).unwrap_err();
        assert_eq!(err.to_string(), "bad P fields");
    }

    #[test]
    fn system_full_payload() {
        let cmd = parse(
            r#"{"type":"S","instruction":3,"ac":1023,"priority_level":1,"id":2047,"instruction_specific":4294967295}"#,
        )
        .unwrap();
        let word = cmd.words().unwrap()[0];
        let s = System::unpack(word).unwrap();
        assert_eq!(s.payload, u32::MAX);
        assert_eq!(s.ac, 1023);

        let err = parse(
            r#"{"type":"S","instruction":3,"ac":1,"priority_level":1,"id":1,"instruction_specific":4294967296}"#,
        )
        .unwrap_err();
        assert_eq!(err.to_string(), "bad S fields");
    }

    #[test]
    fn query_report_flag() {
        let cmd = parse(r#"{"type":"Q","instruction":2,"report":1,"priority_level":3,"id":100}"#)
            .unwrap();
        assert_eq!(cmd.message_type(), MessageType::Query);
        let q = Query::unpack(cmd.words().unwrap()[0]).unwrap();
        assert!(q.report);
        assert_eq!(q.id, 100);
    }
}
