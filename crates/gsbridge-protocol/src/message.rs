//! Typed message records and the 64-bit word codec.
//!
//! Layouts (bit offset:width):
//!
//! | Type         | Fields                                                                 |
//! |--------------|------------------------------------------------------------------------|
//! | Control      | 5:1 forward, 6:1 backward, 7:1 left, 8:1 right, 9:7 speed, 16:2 priority |
//! | Pose         | 5:4 instruction, 9:2 priority, 11:12 id                                |
//! | System       | 5:4 instruction, 9:10 ac, 19:2 priority, 21:11 id, 32:32 payload        |
//! | Query        | 5:4 instruction, 9:2 priority, 11:12 id, 23:1 report                   |
//! | StatusReport | 5:7 speed, 12:1 state, 13:1 motor, 14:2 robot id, 16:31 position       |
//! | HealthReport | 5:7 battery, 12:6 signal, 18:2 security, 20:12 name index              |
//! | Ack, HPR     | type only; the rest of the word is carried opaquely                    |

use serde::Serialize;

use crate::bits::{BitField, TYPE};
use crate::error::{CodecError, Result};

/// 5-bit message type discriminant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MessageType {
    Control = 1,
    Pose = 2,
    System = 3,
    Query = 4,
    StatusReport = 5,
    HealthReport = 6,
    Ack = 7,
    HighPriorityReport = 8,
}

impl MessageType {
    /// Read the type discriminant of a word.
    pub fn of(word: u64) -> Result<Self> {
        Self::try_from(TYPE.get(word) as u8)
    }

    /// True for types the host sends toward the device.
    pub fn is_host_to_device(self) -> bool {
        matches!(self, Self::Control | Self::Pose | Self::System | Self::Query)
    }

    /// Short tag used in JSON messages.
    pub fn tag(self) -> &'static str {
        match self {
            Self::Control => "C",
            Self::Pose => "P",
            Self::System => "S",
            Self::Query => "Q",
            Self::StatusReport => "SR",
            Self::HealthReport => "HR",
            Self::Ack => "A",
            Self::HighPriorityReport => "HPR",
        }
    }

    fn check(self, word: u64) -> Result<()> {
        let found = TYPE.get(word) as u8;
        if found != self as u8 {
            return Err(CodecError::TypeMismatch {
                expected: self,
                found,
            });
        }
        Ok(())
    }

    fn header(self) -> u64 {
        self as u64
    }
}

impl TryFrom<u8> for MessageType {
    type Error = CodecError;

    fn try_from(value: u8) -> Result<Self> {
        Ok(match value {
            1 => Self::Control,
            2 => Self::Pose,
            3 => Self::System,
            4 => Self::Query,
            5 => Self::StatusReport,
            6 => Self::HealthReport,
            7 => Self::Ack,
            8 => Self::HighPriorityReport,
            other => return Err(CodecError::UnknownType(other)),
        })
    }
}

const PRIORITY_MAX: u64 = 3;
const INSTRUCTION_MAX: u64 = 15;
const ID_MAX: u64 = 2047;

mod layout {
    use super::*;

    pub const C_FORWARD: BitField = BitField::new("forward", 5, 1);
    pub const C_BACKWARD: BitField = BitField::new("backward", 6, 1);
    pub const C_LEFT: BitField = BitField::new("left", 7, 1);
    pub const C_RIGHT: BitField = BitField::new("right", 8, 1);
    pub const C_SPEED: BitField = BitField::new("speed", 9, 7).with_max(100);
    pub const C_PRIORITY: BitField = BitField::new("priority_level", 16, 2).with_max(PRIORITY_MAX);

    pub const P_INSTRUCTION: BitField =
        BitField::new("instruction", 5, 4).with_max(INSTRUCTION_MAX);
    pub const P_PRIORITY: BitField = BitField::new("priority_level", 9, 2).with_max(PRIORITY_MAX);
    pub const P_ID: BitField = BitField::new("id", 11, 12).with_max(ID_MAX);

    pub const S_INSTRUCTION: BitField =
        BitField::new("instruction", 5, 4).with_max(INSTRUCTION_MAX);
    pub const S_AC: BitField = BitField::new("ac", 9, 10).with_max(1023);
    pub const S_PRIORITY: BitField = BitField::new("priority_level", 19, 2).with_max(PRIORITY_MAX);
    pub const S_ID: BitField = BitField::new("id", 21, 11).with_max(ID_MAX);
    pub const S_PAYLOAD: BitField = BitField::new("instruction_specific", 32, 32);

    pub const Q_INSTRUCTION: BitField =
        BitField::new("instruction", 5, 4).with_max(INSTRUCTION_MAX);
    pub const Q_PRIORITY: BitField = BitField::new("priority_level", 9, 2).with_max(PRIORITY_MAX);
    pub const Q_ID: BitField = BitField::new("id", 11, 12).with_max(ID_MAX);
    pub const Q_REPORT: BitField = BitField::new("report", 23, 1);

    pub const SR_SPEED: BitField = BitField::new("speed", 5, 7);
    pub const SR_STATE: BitField = BitField::new("state", 12, 1);
    pub const SR_MOTOR: BitField = BitField::new("motor", 13, 1);
    pub const SR_ROBOT_ID: BitField = BitField::new("robot_id", 14, 2);
    pub const SR_POSITION: BitField = BitField::new("curr_pos", 16, 31);

    pub const HR_BATTERY: BitField = BitField::new("battery", 5, 7);
    pub const HR_SIGNAL: BitField = BitField::new("signal", 12, 6);
    pub const HR_SECURITY: BitField = BitField::new("security", 18, 2);
    pub const HR_NAME: BitField = BitField::new("name_id", 20, 12);
}

use layout::*;

/// Drive command: direction bits, speed (0..=100) and priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Control {
    pub forward: bool,
    pub backward: bool,
    pub left: bool,
    pub right: bool,
    pub speed: u8,
    pub priority: u8,
}

/// Pose instruction for robot `id`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Pose {
    pub instruction: u8,
    pub priority: u8,
    pub id: u16,
}

/// System instruction with an access code and a 32-bit instruction-specific payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct System {
    pub instruction: u8,
    pub ac: u16,
    pub priority: u8,
    pub id: u16,
    pub payload: u32,
}

/// Query for robot `id`, optionally enabling periodic reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Query {
    pub instruction: u8,
    pub priority: u8,
    pub id: u16,
    pub report: bool,
}

/// Periodic status from the robot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct StatusReport {
    pub speed: u8,
    pub state: u8,
    pub motor: u8,
    pub robot_id: u8,
    pub curr_pos: u32,
}

/// Link and power health from the robot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct HealthReport {
    pub battery: u8,
    pub signal: u8,
    pub security: u8,
    pub name_id: u16,
}

impl Control {
    pub fn pack(&self) -> Result<u64> {
        let w = MessageType::Control.header();
        let w = C_FORWARD.put(w, self.forward as u64)?;
        let w = C_BACKWARD.put(w, self.backward as u64)?;
        let w = C_LEFT.put(w, self.left as u64)?;
        let w = C_RIGHT.put(w, self.right as u64)?;
        let w = C_SPEED.put(w, self.speed as u64)?;
        C_PRIORITY.put(w, self.priority as u64)
    }

    pub fn unpack(word: u64) -> Result<Self> {
        MessageType::Control.check(word)?;
        Ok(Self {
            forward: C_FORWARD.get(word) == 1,
            backward: C_BACKWARD.get(word) == 1,
            left: C_LEFT.get(word) == 1,
            right: C_RIGHT.get(word) == 1,
            speed: C_SPEED.get(word) as u8,
            priority: C_PRIORITY.get(word) as u8,
        })
    }
}

impl Pose {
    pub fn pack(&self) -> Result<u64> {
        let w = MessageType::Pose.header();
        let w = P_INSTRUCTION.put(w, self.instruction as u64)?;
        let w = P_PRIORITY.put(w, self.priority as u64)?;
        P_ID.put(w, self.id as u64)
    }

    pub fn unpack(word: u64) -> Result<Self> {
        MessageType::Pose.check(word)?;
        Ok(Self {
            instruction: P_INSTRUCTION.get(word) as u8,
            priority: P_PRIORITY.get(word) as u8,
            id: P_ID.get(word) as u16,
        })
    }
}

impl System {
    pub fn pack(&self) -> Result<u64> {
        let w = MessageType::System.header();
        let w = S_INSTRUCTION.put(w, self.instruction as u64)?;
        let w = S_AC.put(w, self.ac as u64)?;
        let w = S_PRIORITY.put(w, self.priority as u64)?;
        let w = S_ID.put(w, self.id as u64)?;
        S_PAYLOAD.put(w, self.payload as u64)
    }

    pub fn unpack(word: u64) -> Result<Self> {
        MessageType::System.check(word)?;
        Ok(Self {
            instruction: S_INSTRUCTION.get(word) as u8,
            ac: S_AC.get(word) as u16,
            priority: S_PRIORITY.get(word) as u8,
            id: S_ID.get(word) as u16,
            payload: S_PAYLOAD.get(word) as u32,
        })
    }
}

impl Query {
    pub fn pack(&self) -> Result<u64> {
        let w = MessageType::Query.header();
        let w = Q_INSTRUCTION.put(w, self.instruction as u64)?;
        let w = Q_PRIORITY.put(w, self.priority as u64)?;
        let w = Q_ID.put(w, self.id as u64)?;
        Q_REPORT.put(w, self.report as u64)
    }

    pub fn unpack(word: u64) -> Result<Self> {
        MessageType::Query.check(word)?;
        Ok(Self {
            instruction: Q_INSTRUCTION.get(word) as u8,
            priority: Q_PRIORITY.get(word) as u8,
            id: Q_ID.get(word) as u16,
            report: Q_REPORT.get(word) == 1,
        })
    }
}

impl StatusReport {
    pub fn pack(&self) -> Result<u64> {
        let w = MessageType::StatusReport.header();
        let w = SR_SPEED.put(w, self.speed as u64)?;
        let w = SR_STATE.put(w, self.state as u64)?;
        let w = SR_MOTOR.put(w, self.motor as u64)?;
        let w = SR_ROBOT_ID.put(w, self.robot_id as u64)?;
        SR_POSITION.put(w, self.curr_pos as u64)
    }

    pub fn unpack(word: u64) -> Result<Self> {
        MessageType::StatusReport.check(word)?;
        Ok(Self {
            speed: SR_SPEED.get(word) as u8,
            state: SR_STATE.get(word) as u8,
            motor: SR_MOTOR.get(word) as u8,
            robot_id: SR_ROBOT_ID.get(word) as u8,
            curr_pos: SR_POSITION.get(word) as u32,
        })
    }
}

impl HealthReport {
    pub fn pack(&self) -> Result<u64> {
        let w = MessageType::HealthReport.header();
        let w = HR_BATTERY.put(w, self.battery as u64)?;
        let w = HR_SIGNAL.put(w, self.signal as u64)?;
        let w = HR_SECURITY.put(w, self.security as u64)?;
        HR_NAME.put(w, self.name_id as u64)
    }

    pub fn unpack(word: u64) -> Result<Self> {
        MessageType::HealthReport.check(word)?;
        Ok(Self {
            battery: HR_BATTERY.get(word) as u8,
            signal: HR_SIGNAL.get(word) as u8,
            security: HR_SECURITY.get(word) as u8,
            name_id: HR_NAME.get(word) as u16,
        })
    }
}

/// Any message, decoded.
///
/// Ack and HighPriorityReport have no settled layout yet, so they keep the
/// whole word.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Message {
    Control(Control),
    Pose(Pose),
    System(System),
    Query(Query),
    StatusReport(StatusReport),
    HealthReport(HealthReport),
    Ack(u64),
    HighPriorityReport(u64),
}

impl Message {
    pub fn message_type(&self) -> MessageType {
        match self {
            Self::Control(_) => MessageType::Control,
            Self::Pose(_) => MessageType::Pose,
            Self::System(_) => MessageType::System,
            Self::Query(_) => MessageType::Query,
            Self::StatusReport(_) => MessageType::StatusReport,
            Self::HealthReport(_) => MessageType::HealthReport,
            Self::Ack(_) => MessageType::Ack,
            Self::HighPriorityReport(_) => MessageType::HighPriorityReport,
        }
    }
}

/// Pack a message into its 64-bit word.
///
/// Fields outside their layout's range are rejected with
/// [`CodecError::FieldOutOfRange`]; nothing is silently truncated.
pub fn pack(message: &Message) -> Result<u64> {
    match message {
        Message::Control(m) => m.pack(),
        Message::Pose(m) => m.pack(),
        Message::System(m) => m.pack(),
        Message::Query(m) => m.pack(),
        Message::StatusReport(m) => m.pack(),
        Message::HealthReport(m) => m.pack(),
        Message::Ack(raw) => opaque(MessageType::Ack, *raw),
        Message::HighPriorityReport(raw) => opaque(MessageType::HighPriorityReport, *raw),
    }
}

/// Decode a word according to its type bits.
pub fn unpack(word: u64) -> Result<Message> {
    Ok(match MessageType::of(word)? {
        MessageType::Control => Message::Control(Control::unpack(word)?),
        MessageType::Pose => Message::Pose(Pose::unpack(word)?),
        MessageType::System => Message::System(System::unpack(word)?),
        MessageType::Query => Message::Query(Query::unpack(word)?),
        MessageType::StatusReport => Message::StatusReport(StatusReport::unpack(word)?),
        MessageType::HealthReport => Message::HealthReport(HealthReport::unpack(word)?),
        MessageType::Ack => Message::Ack(word),
        MessageType::HighPriorityReport => Message::HighPriorityReport(word),
    })
}

fn opaque(kind: MessageType, raw: u64) -> Result<u64> {
    kind.check(raw)?;
    Ok(raw)
}
