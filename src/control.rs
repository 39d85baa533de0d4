use std::fmt;

/// Control data type
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Type {
    Integer,
    Boolean,
    Menu,
    Button,
    Integer64,
    CtrlClass,
    String,
    Bitmask,
    IntegerMenu,

    /* Compound types are >= 0x0100 */
    U8,
    U16,
    U32,
    Area,

    Unknown(u32),
}

impl From<u32> for Type {
    fn from(repr: u32) -> Self {
        match repr {
            1 => Self::Integer,
            2 => Self::Boolean,
            3 => Self::Menu,
            4 => Self::Button,
            5 => Self::Integer64,
            6 => Self::CtrlClass,
            7 => Self::String,
            8 => Self::Bitmask,
            9 => Self::IntegerMenu,

            0x0100 => Self::U8,
            0x0101 => Self::U16,
            0x0102 => Self::U32,
            0x0106 => Self::Area,
            repr => Self::Unknown(repr),
        }
    }
}

impl From<Type> for u32 {
    fn from(t: Type) -> Self {
        match t {
            Type::Integer => 1,
            Type::Boolean => 2,
            Type::Menu => 3,
            Type::Button => 4,
            Type::Integer64 => 5,
            Type::CtrlClass => 6,
            Type::String => 7,
            Type::Bitmask => 8,
            Type::IntegerMenu => 9,

            Type::U8 => 0x0100,
            Type::U16 => 0x0101,
            Type::U32 => 0x0102,
            Type::Area => 0x0106,
            Type::Unknown(t) => t,
        }
    }
}

impl Type {
    /// Whether the payload travels through a pointer instead of the value union
    pub fn has_payload(self) -> bool {
        matches!(self, Type::String) || u32::from(self) >= 0x0100
    }

    pub fn is_menu(self) -> bool {
        matches!(self, Type::Menu | Type::IntegerMenu)
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

bitflags::bitflags! {
    #[derive(PartialEq, Eq, Hash, Debug, Clone, Copy)]
    pub struct Flags: u32 {
        const DISABLED              = 0x0001;
        const GRABBED               = 0x0002;
        const READ_ONLY             = 0x0004;
        const UPDATE                = 0x0008;
        const INACTIVE              = 0x0010;
        const SLIDER                = 0x0020;
        const WRITE_ONLY            = 0x0040;
        const VOLATILE              = 0x0080;
        const HAS_PAYLOAD           = 0x0100;
        const EXECUTE_ON_WRITE      = 0x0200;
        const MODIFY_LAYOUT         = 0x0400;
        const DYNAMIC_ARRAY         = 0x0800;

        const NEXT_CTRL             = 0x80000000;
        const NEXT_COMPOUND         = 0x40000000;
    }
}

impl From<u32> for Flags {
    fn from(flags: u32) -> Self {
        Self::from_bits_retain(flags)
    }
}

impl From<Flags> for u32 {
    fn from(flags: Flags) -> Self {
        flags.bits()
    }
}

impl fmt::Display for Flags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Control identifiers used by the demos and tests
pub mod id {
    pub const BRIGHTNESS: u32 = 0x0098_0900;
    pub const CONTRAST: u32 = 0x0098_0901;
    pub const SATURATION: u32 = 0x0098_0902;
    pub const HUE: u32 = 0x0098_0903;
    pub const POWER_LINE_FREQUENCY: u32 = 0x0098_0918;

    pub const MPEG_BITRATE: u32 = 0x0099_09cf;
    pub const MPEG_GOP_SIZE: u32 = 0x0099_09cb;
    pub const MPEG_H264_PROFILE: u32 = 0x0099_0a6b;
}

/// Control class or value selector of an extended control request
///
/// Older kernels only know the class form (`ctrl_class`), newer ones use the same field to pick
/// current, default or request values.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Which {
    Current,
    Default,
    Request,
    Class(u32),
}

impl Which {
    pub const USER_CLASS: Which = Which::Class(0x0098_0000);
    pub const CODEC_CLASS: Which = Which::Class(0x0099_0000);
    pub const CAMERA_CLASS: Which = Which::Class(0x009a_0000);

    /// Class of the control identified by `id`
    pub fn class_of(id: u32) -> Which {
        Which::Class(id & 0x0fff_0000)
    }
}

impl From<Which> for u32 {
    fn from(which: Which) -> Self {
        match which {
            Which::Current => 0,
            Which::Default => 0x0f00_0000,
            Which::Request => 0x0f01_0000,
            Which::Class(class) => class,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// Device control menu item
pub enum MenuItem {
    Name(String),
    Value(i64),
}

impl fmt::Display for MenuItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MenuItem::Name(name) => write!(f, "{}", name),
            MenuItem::Value(value) => write!(f, "{}", value),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// Device control description
pub struct Description {
    /// Control identifier, set by the the application
    pub id: u32,
    /// Type of control
    pub typ: Type,
    /// Name of the control, intended for the user
    pub name: String,
    /// Minimum value, inclusive
    pub minimum: i64,
    /// Maximum value, inclusive
    pub maximum: i64,
    /// Step size, always positive
    pub step: u64,
    /// Default value
    pub default: i64,
    /// Control flags
    pub flags: Flags,

    /// Size of one element in bytes (extended queries only)
    pub elem_size: u32,
    /// Number of elements (extended queries only)
    pub elems: u32,
    /// Array dimensions, empty for scalars
    pub dims: Vec<u32>,

    /// Items for menu controls (only valid if typ is a menu type)
    pub items: Option<Vec<(u32, MenuItem)>>,
}

impl Description {
    /// Bytes needed to hold the payload of a pointer control
    pub fn payload_size(&self) -> usize {
        match self.typ {
            // strings are reported with their maximum length, excluding the terminator
            Type::String => self.maximum.max(0) as usize + 1,
            _ => self.elem_size as usize * self.elems.max(1) as usize,
        }
    }
}

impl fmt::Display for Description {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "ID         : {:#010x}", self.id)?;
        writeln!(f, "Type       : {}", self.typ)?;
        writeln!(f, "Name       : {}", self.name)?;
        writeln!(f, "Minimum    : {}", self.minimum)?;
        writeln!(f, "Maximum    : {}", self.maximum)?;
        writeln!(f, "Step       : {}", self.step)?;
        writeln!(f, "Default    : {}", self.default)?;
        writeln!(f, "Flags      : {}", self.flags)?;
        if let Some(items) = &self.items {
            writeln!(f, "Menu ==>")?;
            for item in items {
                writeln!(f, " * {}: {}", item.0, item.1)?;
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Control {
    pub id: u32,
    pub value: Value,
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// Device control value
pub enum Value {
    /* buttons */
    None,
    /* single values */
    Integer(i64),
    Boolean(bool),
    String(String),
    /* compound (matrix) values */
    CompoundU8(Vec<u8>),
    CompoundU16(Vec<u16>),
    CompoundU32(Vec<u32>),
    CompoundPtr(Vec<u8>),
}

impl Value {
    /// Scalar representation as stored in the 32-bit `value` member
    pub fn as_i32(&self) -> Option<i32> {
        match *self {
            Value::None => Some(0),
            Value::Integer(v) => Some(v as i32),
            Value::Boolean(v) => Some(v as i32),
            _ => None,
        }
    }
}
