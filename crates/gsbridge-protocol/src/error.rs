use crate::message::MessageType;

/// Errors from packing or unpacking message words.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CodecError {
    /// The word's type bits do not name a known message type.
    #[error("unknown message type {0}")]
    UnknownType(u8),

    /// The word carries a different type than the layout being decoded.
    #[error("type mismatch: expected {expected:?}, found {found}")]
    TypeMismatch { expected: MessageType, found: u8 },

    /// A field value does not fit the layout.
    #[error("field {field} out of range ({value} > {max})")]
    FieldOutOfRange {
        field: &'static str,
        value: u64,
        max: u64,
    },
}

pub type Result<T> = std::result::Result<T, CodecError>;

/// Rejections of host JSON commands.
///
/// The `Display` text is what the host sees in the `msg` of an `ERR` reply.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CommandError {
    #[error("bad json")]
    BadJson,

    #[error("missing type")]
    MissingType,

    #[error("unknown type")]
    UnknownType(String),

    /// A required field is missing or not an integer in range. `detail`
    /// names the field for logs; the host only sees the short form.
    #[error("bad {kind} fields")]
    BadFields { kind: &'static str, detail: String },

    #[error("P instruction out of range")]
    PoseInstructionOutOfRange,

    #[error("P requires instruction or actions[]")]
    PoseMissingInstruction,

    #[error("P requires exactly one of instruction or actions[]")]
    PoseAmbiguousInstruction,
}
