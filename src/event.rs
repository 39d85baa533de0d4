use std::fmt;

use crate::control;
use crate::Timestamp;

/// Event type
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Type {
    /// Only valid for unsubscribing from everything at once
    All,
    Vsync,
    Eos,
    Ctrl,
    FrameSync,
    SourceChange,
    MotionDet,
    Private(u32),
}

impl From<u32> for Type {
    fn from(repr: u32) -> Self {
        match repr {
            0 => Type::All,
            1 => Type::Vsync,
            2 => Type::Eos,
            3 => Type::Ctrl,
            4 => Type::FrameSync,
            5 => Type::SourceChange,
            6 => Type::MotionDet,
            repr => Type::Private(repr),
        }
    }
}

impl From<Type> for u32 {
    fn from(t: Type) -> Self {
        match t {
            Type::All => 0,
            Type::Vsync => 1,
            Type::Eos => 2,
            Type::Ctrl => 3,
            Type::FrameSync => 4,
            Type::SourceChange => 5,
            Type::MotionDet => 6,
            Type::Private(t) => t,
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

bitflags::bitflags! {
    #[derive(PartialEq, Eq, Hash, Debug, Clone, Copy)]
    pub struct SubscriptionFlags: u32 {
        /// Deliver an initial event carrying the current state
        const SEND_INITIAL      = 0x0001;
        /// Also deliver events caused by the subscriber itself
        const ALLOW_FEEDBACK    = 0x0002;
    }
}

impl From<u32> for SubscriptionFlags {
    fn from(flags: u32) -> Self {
        Self::from_bits_retain(flags)
    }
}

impl From<SubscriptionFlags> for u32 {
    fn from(flags: SubscriptionFlags) -> Self {
        flags.bits()
    }
}

bitflags::bitflags! {
    #[derive(PartialEq, Eq, Hash, Debug, Clone, Copy)]
    pub struct CtrlChanges: u32 {
        const VALUE     = 0x0001;
        const FLAGS     = 0x0002;
        const RANGE     = 0x0004;
    }
}

bitflags::bitflags! {
    #[derive(PartialEq, Eq, Hash, Debug, Clone, Copy)]
    pub struct SourceChanges: u32 {
        const RESOLUTION    = 0x0001;
    }
}

/// Event subscription
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Subscription {
    pub typ: Type,
    /// Source of the event, e.g. a control id for [`Type::Ctrl`]
    pub id: u32,
    pub flags: SubscriptionFlags,
}

impl Subscription {
    pub fn new(typ: Type, id: u32) -> Self {
        Subscription {
            typ,
            id,
            flags: SubscriptionFlags::empty(),
        }
    }
}

/// Change of a control as reported by a [`Type::Ctrl`] event
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct CtrlEvent {
    pub changes: CtrlChanges,
    pub typ: control::Type,
    /// Current value, 64-bit controls report through the whole member
    pub value: i64,
    pub flags: control::Flags,
    pub minimum: i32,
    pub maximum: i32,
    pub step: i32,
    pub default: i32,
}

/// Event payload, shaped by the event type
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    Vsync { field: u8 },
    Ctrl(CtrlEvent),
    FrameSync { frame_sequence: u32 },
    SourceChange { changes: SourceChanges },
    MotionDet {
        flags: u32,
        frame_sequence: u32,
        region_mask: u32,
    },
    /// Events without a payload or of a private type
    Raw(Vec<u8>),
}

/// Dequeued event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    pub typ: Type,
    pub payload: Payload,
    /// Number of events still pending after this one
    pub pending: u32,
    pub sequence: u32,
    /// Monotonic time the event was raised at
    pub timestamp: Timestamp,
    pub id: u32,
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} #{} (id {}, {} pending) {:?}",
            self.typ, self.sequence, self.id, self.pending, self.payload
        )
    }
}
