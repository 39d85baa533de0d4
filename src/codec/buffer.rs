use crate::buffer::{self, BufferLocation, Descriptor, Flags, Plane, Timecode};
use crate::codec::{discriminant, Message};
use crate::error::{Error, Result};
use crate::format::{FieldOrder, MAX_PLANES};
use crate::memory::Memory;
use crate::v4l2::layout::Layout;
use crate::v4l2::record::Record;

/// `struct v4l2_requestbuffers`
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct RequestBuffers {
    pub count: u32,
    pub typ: buffer::Type,
    pub memory: Memory,
    /// Queue capabilities reported by the driver (kernel 5.0+, zero otherwise)
    pub capabilities: u32,
}

impl RequestBuffers {
    pub fn new(typ: buffer::Type, memory: Memory, count: u32) -> Self {
        RequestBuffers {
            count,
            typ,
            memory,
            capabilities: 0,
        }
    }
}

impl Message for RequestBuffers {
    type Context = ();

    fn size(layout: &Layout) -> usize {
        layout.requestbuffers.size
    }

    fn encode(&self, layout: &Layout, _ctx: (), record: &mut Record) -> Result<()> {
        let l = &layout.requestbuffers;
        record.put_u32(l.count, self.count);
        record.put_u32(l.type_, self.typ as u32);
        record.put_u32(l.memory, self.memory as u32);
        if let Some(offset) = l.capabilities {
            record.put_u32(offset, self.capabilities);
        }
        Ok(())
    }

    fn decode(layout: &Layout, _ctx: (), record: &Record) -> Result<Self> {
        let l = &layout.requestbuffers;
        Ok(RequestBuffers {
            count: record.u32(l.count),
            typ: discriminant("v4l2_requestbuffers.type", record.u32(l.type_))?,
            memory: discriminant("v4l2_requestbuffers.memory", record.u32(l.memory))?,
            capabilities: l.capabilities.map(|o| record.u32(o)).unwrap_or(0),
        })
    }
}

fn put_location(layout: &Layout, record: &mut Record, offset: usize, location: BufferLocation) {
    match location {
        BufferLocation::Offset(o) => record.put_u32(offset, o),
        BufferLocation::FileDescriptor(fd) => record.put_i32(offset, fd),
        BufferLocation::UserPointer(address) | BufferLocation::PlaneArray(address) => {
            record.put_address(offset, layout.pointer_width(), address)
        }
    }
}

fn location(layout: &Layout, record: &Record, offset: usize, memory: Memory) -> BufferLocation {
    match memory {
        Memory::Mmap | Memory::Overlay => BufferLocation::Offset(record.u32(offset)),
        Memory::DmaBuf => BufferLocation::FileDescriptor(record.i32(offset)),
        Memory::UserPtr => {
            BufferLocation::UserPointer(record.address(offset, layout.pointer_width()))
        }
    }
}

/// Address of the plane array a multi-planar buffer record points to
pub fn plane_array(layout: &Layout, main: &Record) -> usize {
    main.address(layout.buffer.m, layout.pointer_width())
}

/// Writes `desc` into a `v4l2_buffer` record and, for multi-planar buffers, into the plane array
/// `planes` which the record will reference through `array`.
pub fn encode_parts(
    layout: &Layout,
    desc: &Descriptor,
    main: &mut Record,
    planes: &mut Record,
    array: usize,
) -> Result<()> {
    let l = &layout.buffer;
    main.put_u32(l.index, desc.index);
    main.put_u32(l.type_, desc.typ as u32);
    main.put_u32(l.flags, desc.flags.into());
    main.put_u32(l.field, desc.field as u32);
    main.put_time(l.timestamp, layout.time_width(), desc.timestamp.into());

    let tc = &layout.timecode;
    main.put_u32(l.timecode + tc.type_, desc.timecode.typ);
    main.put_u32(l.timecode + tc.flags, desc.timecode.flags);
    main.put_u8(l.timecode + tc.frames, desc.timecode.frames);
    main.put_u8(l.timecode + tc.seconds, desc.timecode.seconds);
    main.put_u8(l.timecode + tc.minutes, desc.timecode.minutes);
    main.put_u8(l.timecode + tc.hours, desc.timecode.hours);
    main.put_bytes(l.timecode + tc.userbits, &desc.timecode.userbits);

    main.put_u32(l.sequence, desc.sequence);
    main.put_u32(l.memory, desc.memory as u32);
    if let (Some(offset), Some(fd)) = (l.request_fd, desc.request_fd) {
        main.put_i32(offset, fd);
    }

    if !desc.typ.is_multiplanar() {
        let plane = desc.planes.first().copied().unwrap_or_default();
        main.put_u32(l.bytesused, plane.bytes_used);
        main.put_u32(l.length, plane.length);
        put_location(layout, main, l.m, plane.location);
        return Ok(());
    }

    let count = desc.planes.len();
    if count > MAX_PLANES || planes.len() < count * layout.plane.size {
        return Err(Error::violation(format!(
            "plane array for {} planes does not fit buffer {}",
            count, desc.index
        )));
    }

    let p = &layout.plane;
    for (i, plane) in desc.planes.iter().enumerate() {
        let base = i * p.size;
        planes.put_u32(base + p.bytesused, plane.bytes_used);
        planes.put_u32(base + p.length, plane.length);
        put_location(layout, planes, base + p.m, plane.location);
        planes.put_u32(base + p.data_offset, plane.data_offset);
    }
    main.put_u32(l.length, count as u32);
    put_location(layout, main, l.m, BufferLocation::PlaneArray(array));
    Ok(())
}

/// Reads a `v4l2_buffer` record and its plane array
///
/// The buffer type and memory model are supplied by the caller and decide how the `m` unions
/// are read.
pub fn decode_parts(
    layout: &Layout,
    typ: buffer::Type,
    memory: Memory,
    main: &Record,
    planes: &Record,
) -> Result<Descriptor> {
    let l = &layout.buffer;
    let tc = &layout.timecode;
    let flags = Flags::from(main.u32(l.flags));

    let mut userbits = [0u8; 4];
    userbits.copy_from_slice(main.bytes(l.timecode + tc.userbits, 4));
    let timecode = Timecode {
        typ: main.u32(l.timecode + tc.type_),
        flags: main.u32(l.timecode + tc.flags),
        frames: main.u8(l.timecode + tc.frames),
        seconds: main.u8(l.timecode + tc.seconds),
        minutes: main.u8(l.timecode + tc.minutes),
        hours: main.u8(l.timecode + tc.hours),
        userbits,
    };

    let planes = if typ.is_multiplanar() {
        let p = &layout.plane;
        let count = (main.u32(l.length) as usize).min(planes.len() / p.size);
        (0..count)
            .map(|i| {
                let base = i * p.size;
                Plane {
                    bytes_used: planes.u32(base + p.bytesused),
                    length: planes.u32(base + p.length),
                    location: location(layout, planes, base + p.m, memory),
                    data_offset: planes.u32(base + p.data_offset),
                }
            })
            .collect()
    } else {
        vec![Plane {
            bytes_used: main.u32(l.bytesused),
            length: main.u32(l.length),
            location: location(layout, main, l.m, memory),
            data_offset: 0,
        }]
    };

    Ok(Descriptor {
        index: main.u32(l.index),
        typ,
        memory,
        flags,
        field: discriminant::<FieldOrder>("v4l2_buffer.field", main.u32(l.field))?,
        timestamp: main.time(l.timestamp, layout.time_width()).into(),
        timecode,
        sequence: main.u32(l.sequence),
        planes,
        request_fd: match l.request_fd {
            Some(offset) if flags.contains(Flags::REQUEST_FD) => Some(main.i32(offset)),
            _ => None,
        },
    })
}

/// `struct v4l2_buffer` together with the plane array it points to
///
/// The plane array lives as long as the record, so the address embedded in the `m.planes`
/// union stays valid for every exchange made with this record.
#[derive(Debug)]
pub struct BufferRecord {
    pub main: Record,
    planes: Record,
    typ: buffer::Type,
    memory: Memory,
}

impl BufferRecord {
    /// Record addressing buffer `index`, with room for `planes` plane entries if the buffer type
    /// is multi-planar
    pub fn new(
        layout: &Layout,
        typ: buffer::Type,
        memory: Memory,
        index: u32,
        planes: usize,
    ) -> Result<Self> {
        BufferRecord::encode(layout, &Descriptor::new(typ, memory, index, planes))
    }

    pub fn encode(layout: &Layout, desc: &Descriptor) -> Result<Self> {
        let planes = if desc.typ.is_multiplanar() {
            desc.planes.len() * layout.plane.size
        } else {
            0
        };

        let mut record = BufferRecord {
            main: Record::new(layout.buffer.size),
            planes: Record::new(planes),
            typ: desc.typ,
            memory: desc.memory,
        };
        let array = record.planes.as_bytes_mut().as_mut_ptr() as usize;
        encode_parts(layout, desc, &mut record.main, &mut record.planes, array)?;
        Ok(record)
    }

    pub fn decode(&self, layout: &Layout) -> Result<Descriptor> {
        decode_parts(layout, self.typ, self.memory, &self.main, &self.planes)
    }

    /// Number of plane entries the attached array can hold
    pub fn plane_capacity(&self, layout: &Layout) -> usize {
        self.planes.len() / layout.plane.size
    }
}
