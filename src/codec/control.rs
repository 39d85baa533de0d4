use crate::codec::Message;
use crate::control::{Control, Description, Flags, MenuItem, Type, Value, Which};
use crate::error::{Error, Result};
use crate::v4l2::layout::Layout;
use crate::v4l2::record::Record;

/// Largest number of controls the kernel accepts in one extended request
pub const MAX_EXT_CONTROLS: usize = 1024;

/// `struct v4l2_control`
impl Message for Control {
    type Context = ();

    fn size(layout: &Layout) -> usize {
        layout.control.size
    }

    fn encode(&self, layout: &Layout, _ctx: (), record: &mut Record) -> Result<()> {
        let value = self.value.as_i32().ok_or_else(|| {
            Error::violation(format!(
                "control {:#x} does not hold a 32-bit value",
                self.id
            ))
        })?;
        record.put_u32(layout.control.id, self.id);
        record.put_i32(layout.control.value, value);
        Ok(())
    }

    fn decode(layout: &Layout, _ctx: (), record: &Record) -> Result<Self> {
        Ok(Control {
            id: record.u32(layout.control.id),
            value: Value::Integer(i64::from(record.i32(layout.control.value))),
        })
    }
}

/// `struct v4l2_queryctrl`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryCtrl(pub Description);

impl QueryCtrl {
    /// Query record for `id`, which may carry the NEXT_CTRL flag
    pub fn new(id: u32) -> Self {
        QueryCtrl(Description {
            id,
            typ: Type::Integer,
            name: String::new(),
            minimum: 0,
            maximum: 0,
            step: 0,
            default: 0,
            flags: Flags::empty(),
            elem_size: 0,
            elems: 0,
            dims: Vec::new(),
            items: None,
        })
    }
}

impl Message for QueryCtrl {
    type Context = ();

    fn size(layout: &Layout) -> usize {
        layout.queryctrl.size
    }

    fn encode(&self, layout: &Layout, _ctx: (), record: &mut Record) -> Result<()> {
        let l = &layout.queryctrl;
        let d = &self.0;
        record.put_u32(l.id, d.id);
        record.put_u32(l.type_, d.typ.into());
        record.put_string(l.name, 32, &d.name);
        record.put_i32(l.minimum, d.minimum as i32);
        record.put_i32(l.maximum, d.maximum as i32);
        record.put_i32(l.step, d.step as i32);
        record.put_i32(l.default_value, d.default as i32);
        record.put_u32(l.flags, d.flags.into());
        Ok(())
    }

    fn decode(layout: &Layout, _ctx: (), record: &Record) -> Result<Self> {
        let l = &layout.queryctrl;
        let typ = Type::from(record.u32(l.type_));
        Ok(QueryCtrl(Description {
            id: record.u32(l.id),
            typ,
            name: record.string(l.name, 32),
            minimum: i64::from(record.i32(l.minimum)),
            maximum: i64::from(record.i32(l.maximum)),
            step: u64::from(record.u32(l.step)),
            default: i64::from(record.i32(l.default_value)),
            flags: Flags::from(record.u32(l.flags)),
            elem_size: 0,
            elems: 0,
            dims: Vec::new(),
            items: None,
        }))
    }
}

/// `struct v4l2_query_ext_ctrl`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryExtCtrl(pub Description);

impl QueryExtCtrl {
    pub fn new(id: u32) -> Self {
        QueryExtCtrl(QueryCtrl::new(id).0)
    }
}

impl Message for QueryExtCtrl {
    type Context = ();

    fn size(layout: &Layout) -> usize {
        layout.query_ext_ctrl.size
    }

    fn encode(&self, layout: &Layout, _ctx: (), record: &mut Record) -> Result<()> {
        let l = &layout.query_ext_ctrl;
        let d = &self.0;
        if d.dims.len() > 4 {
            return Err(Error::violation(format!(
                "control {:#x} has {} dimensions",
                d.id,
                d.dims.len()
            )));
        }

        record.put_u32(l.id, d.id);
        record.put_u32(l.type_, d.typ.into());
        record.put_string(l.name, 32, &d.name);
        record.put_i64(l.minimum, d.minimum);
        record.put_i64(l.maximum, d.maximum);
        record.put_u64(l.step, d.step);
        record.put_i64(l.default_value, d.default);
        record.put_u32(l.flags, d.flags.into());
        record.put_u32(l.elem_size, d.elem_size);
        record.put_u32(l.elems, d.elems);
        record.put_u32(l.nr_of_dims, d.dims.len() as u32);
        for (i, dim) in d.dims.iter().enumerate() {
            record.put_u32(l.dims + i * 4, *dim);
        }
        Ok(())
    }

    fn decode(layout: &Layout, _ctx: (), record: &Record) -> Result<Self> {
        let l = &layout.query_ext_ctrl;
        let nr_of_dims = record.u32(l.nr_of_dims);
        if nr_of_dims > 4 {
            return Err(Error::InvalidDiscriminant {
                field: "v4l2_query_ext_ctrl.nr_of_dims",
                value: nr_of_dims,
            });
        }

        Ok(QueryExtCtrl(Description {
            id: record.u32(l.id),
            typ: Type::from(record.u32(l.type_)),
            name: record.string(l.name, 32),
            minimum: record.i64(l.minimum),
            maximum: record.i64(l.maximum),
            step: record.u64(l.step),
            default: record.i64(l.default_value),
            flags: Flags::from(record.u32(l.flags)),
            elem_size: record.u32(l.elem_size),
            elems: record.u32(l.elems),
            dims: (0..nr_of_dims as usize)
                .map(|i| record.u32(l.dims + i * 4))
                .collect(),
            items: None,
        }))
    }
}

/// `struct v4l2_querymenu`
///
/// Whether the union holds a name or a value depends on the control type, which the caller
/// learned from a previous control query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MenuEntry {
    pub id: u32,
    pub index: u32,
    pub item: MenuItem,
}

impl Message for MenuEntry {
    type Context = Type;

    fn size(layout: &Layout) -> usize {
        layout.querymenu.size
    }

    fn encode(&self, layout: &Layout, _typ: Type, record: &mut Record) -> Result<()> {
        let l = &layout.querymenu;
        record.put_u32(l.id, self.id);
        record.put_u32(l.index, self.index);
        match &self.item {
            MenuItem::Name(name) => record.put_string(l.name, 32, name),
            MenuItem::Value(value) => record.put_i64(l.value, *value),
        }
        Ok(())
    }

    fn decode(layout: &Layout, typ: Type, record: &Record) -> Result<Self> {
        let l = &layout.querymenu;
        let item = match typ {
            Type::Menu => MenuItem::Name(record.string(l.name, 32)),
            Type::IntegerMenu => MenuItem::Value(record.i64(l.value)),
            other => {
                return Err(Error::violation(format!(
                    "control type {} has no menu",
                    other
                )))
            }
        };
        Ok(MenuEntry {
            id: record.u32(l.id),
            index: record.u32(l.index),
            item,
        })
    }
}

/// One element of an extended control request
///
/// The control type must be known up front; it decides whether the value travels inline or
/// through a payload buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtControl {
    pub id: u32,
    pub typ: Type,
    /// Payload size in bytes, zero for inline values
    pub size: u32,
    pub value: Value,
}

impl ExtControl {
    /// Element reading the current value of a control described by `desc`
    pub fn query(desc: &Description) -> Self {
        ExtControl {
            id: desc.id,
            typ: desc.typ,
            size: if desc.typ.has_payload() {
                desc.payload_size() as u32
            } else {
                0
            },
            value: Value::None,
        }
    }

    /// Element writing `value` to a control described by `desc`
    pub fn with_value(desc: &Description, value: Value) -> Self {
        ExtControl {
            value,
            ..ExtControl::query(desc)
        }
    }

    fn payload(&self) -> Result<Vec<u8>> {
        let mut bytes = match &self.value {
            Value::None => Vec::new(),
            Value::String(s) => s.as_bytes().to_vec(),
            Value::CompoundU8(v) | Value::CompoundPtr(v) => v.clone(),
            Value::CompoundU16(v) => v.iter().flat_map(|x| x.to_ne_bytes().to_vec()).collect(),
            Value::CompoundU32(v) => v.iter().flat_map(|x| x.to_ne_bytes().to_vec()).collect(),
            Value::Integer(_) | Value::Boolean(_) => {
                return Err(Error::violation(format!(
                    "control {:#x} of type {} needs a payload value",
                    self.id, self.typ
                )))
            }
        };

        let size = self.size as usize;
        if bytes.len() > size || (self.typ == Type::String && bytes.len() == size && size > 0) {
            return Err(Error::violation(format!(
                "payload of control {:#x} exceeds {} bytes",
                self.id, size
            )));
        }
        bytes.resize(size, 0);
        Ok(bytes)
    }

    fn payload_value(&self, bytes: &[u8]) -> Value {
        match self.typ {
            Type::String => {
                let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
                Value::String(String::from_utf8_lossy(&bytes[..end]).into_owned())
            }
            Type::U8 => Value::CompoundU8(bytes.to_vec()),
            Type::U16 => Value::CompoundU16(
                bytes
                    .chunks_exact(2)
                    .map(|c| u16::from_ne_bytes([c[0], c[1]]))
                    .collect(),
            ),
            Type::U32 => Value::CompoundU32(
                bytes
                    .chunks_exact(4)
                    .map(|c| u32::from_ne_bytes([c[0], c[1], c[2], c[3]]))
                    .collect(),
            ),
            _ => Value::CompoundPtr(bytes.to_vec()),
        }
    }
}

/// Address of the control array an extended control record points to
pub fn control_array(layout: &Layout, main: &Record) -> usize {
    main.address(layout.ext_controls.controls, layout.pointer_width())
}

/// `struct v4l2_ext_controls` together with its control array and payload buffers
///
/// The record owns every buffer it points to, so the embedded addresses remain valid for each
/// exchange made with it.
#[derive(Debug)]
pub struct ExtControlsRecord {
    pub main: Record,
    controls: Record,
    payloads: Vec<Option<Vec<u8>>>,
    elements: Vec<ExtControl>,
}

impl ExtControlsRecord {
    pub fn encode(
        layout: &Layout,
        which: Which,
        elements: &[ExtControl],
        request_fd: Option<i32>,
    ) -> Result<Self> {
        if elements.is_empty() || elements.len() > MAX_EXT_CONTROLS {
            return Err(Error::violation(format!(
                "extended control request with {} elements",
                elements.len()
            )));
        }

        let l = &layout.ext_controls;
        let c = &layout.ext_control;
        let mut record = ExtControlsRecord {
            main: Record::new(l.size),
            controls: Record::new(elements.len() * c.size),
            payloads: Vec::with_capacity(elements.len()),
            elements: elements.to_vec(),
        };

        for (i, element) in elements.iter().enumerate() {
            let base = i * c.size;
            record.controls.put_u32(base + c.id, element.id);
            if element.typ.has_payload() {
                let mut payload = element.payload()?;
                let address = payload.as_mut_ptr() as usize;
                record.controls.put_u32(base + c.size_, element.size);
                record
                    .controls
                    .put_address(base + c.value, layout.pointer_width(), address);
                record.payloads.push(Some(payload));
            } else {
                match (element.typ, &element.value) {
                    (Type::Integer64, Value::Integer(v)) => {
                        record.controls.put_i64(base + c.value, *v)
                    }
                    (_, value) => {
                        let v = value.as_i32().ok_or_else(|| {
                            Error::violation(format!(
                                "control {:#x} of type {} holds no scalar value",
                                element.id, element.typ
                            ))
                        })?;
                        record.controls.put_i32(base + c.value, v);
                    }
                }
                record.payloads.push(None);
            }
        }

        record.main.put_u32(l.which, which.into());
        record.main.put_u32(l.count, elements.len() as u32);
        if let (Some(offset), Some(fd)) = (l.request_fd, request_fd) {
            record.main.put_i32(offset, fd);
        }
        let array = record.controls.as_bytes_mut().as_mut_ptr() as usize;
        record
            .main
            .put_address(l.controls, layout.pointer_width(), array);
        Ok(record)
    }

    /// Reads back every element, interpreting each value by its known control type
    pub fn decode(&self, layout: &Layout) -> Result<Vec<ExtControl>> {
        let c = &layout.ext_control;
        self.elements
            .iter()
            .zip(self.payloads.iter())
            .enumerate()
            .map(|(i, (element, payload))| {
                let base = i * c.size;
                let value = match (element.typ, payload) {
                    (_, Some(bytes)) => element.payload_value(bytes),
                    (Type::Integer64, None) => Value::Integer(self.controls.i64(base + c.value)),
                    (Type::Boolean, None) => Value::Boolean(self.controls.i32(base + c.value) != 0),
                    (Type::Button, None) | (Type::CtrlClass, None) => Value::None,
                    (_, None) => Value::Integer(i64::from(self.controls.i32(base + c.value))),
                };
                Ok(ExtControl {
                    id: self.controls.u32(base + c.id),
                    typ: element.typ,
                    size: self.controls.u32(base + c.size_),
                    value,
                })
            })
            .collect()
    }

    /// Index of the element the driver rejected, equal to the element count if the failure
    /// happened before any element was looked at
    pub fn error_idx(&self, layout: &Layout) -> u32 {
        self.main.u32(layout.ext_controls.error_idx)
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }
}
