//! In-process video device used by the integration tests.
//!
//! [`FakeDriver`] answers every request the crate issues the way a kernel driver would: it
//! decodes the records with the crate's own codec, keeps buffers in heap memory it hands out
//! for mapping, and completes queued buffers in order as soon as they are dequeued.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet, VecDeque};
use std::convert::TryFrom;
use std::io;
use std::slice;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use v4l2_mmap::buffer::{self, BufferLocation, Descriptor};
use v4l2_mmap::capability::{self, Capabilities};
use v4l2_mmap::codec::buffer as buffer_codec;
use v4l2_mmap::codec::control as control_codec;
use v4l2_mmap::codec::{Message, QueryCtrl, QueryExtCtrl, RequestBuffers};
use v4l2_mmap::control::{self, Control, Description, MenuItem, Value};
use v4l2_mmap::crop::{Crop, CropCapability, Rect};
use v4l2_mmap::device::{Driver, Interest, Readiness, Waker};
use v4l2_mmap::event::{self, Event, Subscription};
use v4l2_mmap::format::{
    self, FieldOrder, Format, FormatMplane, FormatPayload, FourCC, PlaneFormat, MAX_PLANES,
};
use v4l2_mmap::parameters::{self, CaptureParams, OutputParams, StreamParams};
use v4l2_mmap::v4l2::layout::{Abi, HeaderVersion, Layout, LayoutKey};
use v4l2_mmap::v4l2::record::Record;
use v4l2_mmap::v4l2::vidioc::{Code, Request};
use v4l2_mmap::{Fraction, Memory, Options, Session, Timestamp};

/// KERNEL_VERSION(6, 1, 0)
pub const KERNEL_6_1: u32 = 0x0006_0100;
/// KERNEL_VERSION(4, 14, 0)
pub const KERNEL_4_14: u32 = 0x0004_0e00;

/// Id of the string control the fake exposes
pub const STRING_CTRL: u32 = 0x0098_1000;

fn errno(code: i32) -> io::Error {
    io::Error::from_raw_os_error(code)
}

fn einval() -> io::Error {
    errno(libc::EINVAL)
}

/// Behaviour of a [`FakeDriver`]
#[derive(Debug, Clone)]
pub struct Config {
    pub caps: capability::Flags,
    pub version: u32,
    /// Most buffers granted per queue
    pub max_buffers: u32,
    /// Planes of every multi-planar format
    pub planes: usize,
    pub nonblocking: bool,
    /// Bytes used reported for completed capture buffers, `None` reports the full plane
    pub fill: Option<u32>,
    /// Complete capture buffers out of order
    pub swap_completions: bool,
    /// Menu indices QUERYMENU rejects
    pub hidden_menu_items: Vec<u32>,
    /// QBUF calls to fail with EIO before accepting buffers again
    pub failing_qbufs: u32,
    /// Mappings granted before `map` fails with ENOMEM
    pub fail_map_after: Option<usize>,
}

impl Config {
    pub fn capture() -> Self {
        Config {
            caps: capability::Flags::VIDEO_CAPTURE | capability::Flags::STREAMING,
            version: KERNEL_6_1,
            max_buffers: 32,
            planes: 1,
            nonblocking: false,
            fill: None,
            swap_completions: false,
            hidden_menu_items: vec![1],
            failing_qbufs: 0,
            fail_map_after: None,
        }
    }

    pub fn mplane(planes: usize) -> Self {
        Config {
            caps: capability::Flags::VIDEO_CAPTURE_MPLANE | capability::Flags::STREAMING,
            planes,
            ..Config::capture()
        }
    }

    pub fn m2m() -> Self {
        Config {
            caps: capability::Flags::VIDEO_M2M_MPLANE | capability::Flags::STREAMING,
            planes: 1,
            ..Config::capture()
        }
    }
}

struct FakeBuffer {
    planes: Vec<Box<[u8]>>,
    offsets: Vec<u32>,
    bytes_used: Vec<u32>,
    queued: bool,
}

struct Queue {
    format: FormatPayload,
    buffers: Vec<FakeBuffer>,
    /// Queued indices in queueing order
    ready: VecDeque<u32>,
    streaming: bool,
    sequence: u32,
}

struct Ctrl {
    desc: Description,
    value: i64,
    text: String,
}

struct State {
    config: Config,
    queues: HashMap<buffer::Type, Queue>,
    /// Live mappings by address
    mappings: HashMap<usize, u32>,
    /// Every (offset, len) ever mapped, in order
    map_log: Vec<(u32, usize)>,
    controls: Vec<Ctrl>,
    crop: Rect,
    params: HashMap<buffer::Type, StreamParams>,
    subscriptions: HashSet<(event::Type, u32)>,
    events: VecDeque<Event>,
    event_sequence: u32,
    requests: Vec<Request>,
}

/// Shared handle to a fake device, clones observe the same state
#[derive(Clone)]
pub struct FakeDriver {
    state: Arc<Mutex<State>>,
    layout: Layout,
}

fn default_format(config: &Config, typ: buffer::Type) -> FormatPayload {
    let request = if typ.is_multiplanar() {
        FormatPayload::Multi(FormatMplane::new(640, 480, FourCC::new(b"NM12"), config.planes))
    } else {
        FormatPayload::Single(Format::new(640, 480, FourCC::new(b"YUYV")))
    };
    adjust_format(config, request)
}

/// Clamps the dimensions and computes strides and sizes like a driver would
fn adjust_format(config: &Config, fmt: FormatPayload) -> FormatPayload {
    match fmt {
        FormatPayload::Single(mut f) => {
            f.width = (f.width.max(2).min(1920)) & !1;
            f.height = f.height.max(1).min(1080);
            f.field_order = FieldOrder::Progressive;
            let bpp = if f.fourcc == FourCC::new(b"GREY") { 1 } else { 2 };
            f.stride = f.width * bpp;
            f.size = f.stride * f.height;
            FormatPayload::Single(f)
        }
        FormatPayload::Multi(mut f) => {
            f.width = (f.width.max(2).min(1920)) & !1;
            f.height = f.height.max(2).min(1080) & !1;
            f.field_order = FieldOrder::Progressive;
            let planes = config.planes.max(1).min(MAX_PLANES);
            f.planes = (0..planes)
                .map(|i| PlaneFormat {
                    stride: f.width,
                    size: if i == 0 {
                        f.width * f.height
                    } else {
                        f.width * f.height / 2
                    },
                })
                .collect();
            FormatPayload::Multi(f)
        }
    }
}

fn default_controls() -> Vec<Ctrl> {
    let base = |id: u32, typ: control::Type, name: &str, min: i64, max: i64, def: i64| {
        Description {
            id,
            typ,
            name: name.to_string(),
            minimum: min,
            maximum: max,
            step: 1,
            default: def,
            flags: control::Flags::empty(),
            elem_size: 4,
            elems: 1,
            dims: Vec::new(),
            items: None,
        }
    };
    let ctrl = |desc: Description| Ctrl {
        value: desc.default,
        desc,
        text: String::new(),
    };

    let mut string = base(STRING_CTRL, control::Type::String, "Label", 0, 15, 0);
    string.elem_size = 16;
    string.flags = control::Flags::HAS_PAYLOAD;
    let mut label = ctrl(string);
    label.text = "fake".to_string();

    let mut bitrate = base(
        control::id::MPEG_BITRATE,
        control::Type::Integer64,
        "Video Bitrate",
        1,
        1 << 40,
        4_000_000,
    );
    bitrate.elem_size = 8;

    vec![
        ctrl(base(control::id::BRIGHTNESS, control::Type::Integer, "Brightness", -64, 64, 0)),
        ctrl(base(control::id::CONTRAST, control::Type::Integer, "Contrast", 0, 95, 32)),
        ctrl(base(
            control::id::POWER_LINE_FREQUENCY,
            control::Type::Menu,
            "Power Line Frequency",
            0,
            2,
            1,
        )),
        label,
        ctrl(bitrate),
    ]
}

const MENU_NAMES: [&str; 3] = ["Disabled", "50 Hz", "60 Hz"];

impl FakeDriver {
    pub fn new(config: Config) -> Self {
        let key = LayoutKey {
            headers: HeaderVersion::from_kernel(config.version),
            abi: Abi::native(),
        };
        FakeDriver::with_layout(config, Layout::new(key))
    }

    /// A device speaking records of `layout`, which must be the layout of the session
    pub fn with_layout(config: Config, layout: Layout) -> Self {
        let state = State {
            config,
            queues: HashMap::new(),
            mappings: HashMap::new(),
            map_log: Vec::new(),
            controls: default_controls(),
            crop: Rect::new(0, 0, 640, 480),
            params: HashMap::new(),
            subscriptions: HashSet::new(),
            events: VecDeque::new(),
            event_sequence: 0,
            requests: Vec::new(),
        };
        FakeDriver {
            state: Arc::new(Mutex::new(state)),
            layout,
        }
    }

    /// Opens a session on a fresh device
    pub fn session(config: Config) -> (Session<FakeDriver>, FakeDriver) {
        let fake = FakeDriver::new(config);
        let session = Session::with_driver(fake.clone(), Options::default())
            .expect("failed to open fake session");
        (session, fake)
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().expect("fake driver state poisoned")
    }

    /// Number of live mappings
    pub fn mapped(&self) -> usize {
        self.lock().mappings.len()
    }

    /// Every (offset, len) mapped so far, in order
    pub fn map_log(&self) -> Vec<(u32, usize)> {
        self.lock().map_log.clone()
    }

    /// Buffers currently allocated on a queue
    pub fn buffers(&self, typ: buffer::Type) -> usize {
        self.lock()
            .queues
            .get(&typ)
            .map(|q| q.buffers.len())
            .unwrap_or(0)
    }

    pub fn is_streaming(&self, typ: buffer::Type) -> bool {
        self.lock()
            .queues
            .get(&typ)
            .map(|q| q.streaming)
            .unwrap_or(false)
    }

    /// Indices of the buffers the driver owns, in completion order
    pub fn queued(&self, typ: buffer::Type) -> Vec<u32> {
        self.lock()
            .queues
            .get(&typ)
            .map(|q| q.ready.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Every request issued so far
    pub fn requests(&self) -> Vec<Request> {
        self.lock().requests.clone()
    }

    pub fn count(&self, request: Request) -> usize {
        self.lock().requests.iter().filter(|r| **r == request).count()
    }

    pub fn set_fill(&self, fill: Option<u32>) {
        self.lock().config.fill = fill;
    }

    /// Fails the next `count` QBUF calls with EIO
    pub fn fail_qbufs(&self, count: u32) {
        self.lock().config.failing_qbufs = count;
    }

    pub fn set_swap_completions(&self, swap: bool) {
        self.lock().config.swap_completions = swap;
    }

    /// Current value of a control as the device sees it
    pub fn control_value(&self, id: u32) -> Option<i64> {
        self.lock()
            .controls
            .iter()
            .find(|c| c.desc.id == id)
            .map(|c| c.value)
    }

    /// Raises an event, dropped unless subscribed
    pub fn raise(&self, typ: event::Type, id: u32, payload: event::Payload) {
        let mut state = self.lock();
        if !state.subscriptions.contains(&(typ, id)) {
            return;
        }
        let sequence = state.event_sequence;
        state.event_sequence += 1;
        state.events.push_back(Event {
            typ,
            payload,
            pending: 0,
            sequence,
            timestamp: Timestamp::new(1, i64::from(sequence)),
            id,
        });
    }
}

/// Reads a buffer record and, for multi-planar types, the plane array it points to
fn read_descriptor(layout: &Layout, typ: buffer::Type, main: &Record) -> io::Result<Descriptor> {
    let planes = if typ.is_multiplanar() {
        let array = buffer_codec::plane_array(layout, main);
        let count = main.u32(layout.buffer.length) as usize;
        if array == 0 || count > MAX_PLANES {
            return Err(einval());
        }
        let bytes = unsafe { slice::from_raw_parts(array as *const u8, count * layout.plane.size) };
        Record::from_bytes(bytes)
    } else {
        Record::new(0)
    };
    buffer_codec::decode_parts(layout, typ, Memory::Mmap, main, &planes).map_err(|_| einval())
}

/// Writes `desc` into a buffer record and the plane array supplied by the application
fn write_descriptor(layout: &Layout, main: &mut Record, desc: &Descriptor) -> io::Result<()> {
    if !desc.typ.is_multiplanar() {
        let mut planes = Record::new(0);
        return buffer_codec::encode_parts(layout, desc, main, &mut planes, 0)
            .map_err(|_| einval());
    }

    let array = buffer_codec::plane_array(layout, main);
    let capacity = main.u32(layout.buffer.length) as usize;
    if array == 0 || capacity < desc.planes.len() {
        return Err(einval());
    }
    let mut planes = Record::new(desc.planes.len() * layout.plane.size);
    buffer_codec::encode_parts(layout, desc, main, &mut planes, array).map_err(|_| einval())?;
    unsafe {
        std::ptr::copy_nonoverlapping(planes.as_bytes().as_ptr(), array as *mut u8, planes.len())
    };
    Ok(())
}

fn buffer_type(value: u32) -> io::Result<buffer::Type> {
    buffer::Type::try_from(value).map_err(|_| einval())
}

impl State {
    fn queue(&mut self, typ: buffer::Type) -> &mut Queue {
        let config = &self.config;
        self.queues.entry(typ).or_insert_with(|| Queue {
            format: default_format(config, typ),
            buffers: Vec::new(),
            ready: VecDeque::new(),
            streaming: false,
            sequence: 0,
        })
    }

    fn is_mapped(&self, buf: &FakeBuffer) -> bool {
        buf.planes
            .iter()
            .any(|p| self.mappings.contains_key(&(p.as_ptr() as usize)))
    }

    fn handle(&mut self, layout: &Layout, request: Request, record: &mut Record) -> io::Result<()> {
        match request {
            Request::VIDIOC_QUERYCAP => self.querycap(layout, record),
            Request::VIDIOC_ENUM_FMT => self.enum_fmt(layout, record),
            Request::VIDIOC_G_FMT => {
                let typ = buffer_type(record.u32(layout.format.type_))?;
                let fmt = self.queue(typ).format.clone();
                fmt.encode(layout, typ, record).map_err(|_| einval())
            }
            Request::VIDIOC_S_FMT | Request::VIDIOC_TRY_FMT => {
                self.set_fmt(layout, record, request == Request::VIDIOC_S_FMT)
            }
            Request::VIDIOC_REQBUFS => self.reqbufs(layout, record),
            Request::VIDIOC_QUERYBUF => self.querybuf(layout, record),
            Request::VIDIOC_QBUF => self.qbuf(layout, record),
            Request::VIDIOC_DQBUF => self.dqbuf(layout, record),
            Request::VIDIOC_STREAMON => {
                let typ = buffer_type(record.u32(0))?;
                let queue = self.queue(typ);
                if queue.buffers.is_empty() || queue.streaming {
                    return Err(einval());
                }
                queue.streaming = true;
                Ok(())
            }
            Request::VIDIOC_STREAMOFF => {
                let typ = buffer_type(record.u32(0))?;
                let queue = self.queue(typ);
                queue.streaming = false;
                queue.ready.clear();
                for buf in queue.buffers.iter_mut() {
                    buf.queued = false;
                }
                Ok(())
            }
            Request::VIDIOC_G_PARM | Request::VIDIOC_S_PARM => {
                self.parm(layout, record, request == Request::VIDIOC_S_PARM)
            }
            Request::VIDIOC_G_CTRL | Request::VIDIOC_S_CTRL => {
                self.ctrl(layout, record, request == Request::VIDIOC_S_CTRL)
            }
            Request::VIDIOC_QUERYCTRL => self.queryctrl(layout, record),
            Request::VIDIOC_QUERYMENU => self.querymenu(layout, record),
            Request::VIDIOC_QUERY_EXT_CTRL => self.query_ext_ctrl(layout, record),
            Request::VIDIOC_G_EXT_CTRLS => self.ext_ctrls(layout, record, false, true),
            Request::VIDIOC_S_EXT_CTRLS => self.ext_ctrls(layout, record, true, true),
            Request::VIDIOC_TRY_EXT_CTRLS => self.ext_ctrls(layout, record, true, false),
            Request::VIDIOC_CROPCAP => {
                let query = CropCapability::decode(layout, (), record).map_err(|_| einval())?;
                let caps = CropCapability {
                    typ: query.typ,
                    bounds: Rect::new(0, 0, 1920, 1080),
                    defrect: Rect::new(0, 0, 640, 480),
                    pixel_aspect: Fraction::new(1, 1),
                };
                caps.encode(layout, (), record).map_err(|_| einval())
            }
            Request::VIDIOC_G_CROP => {
                let query = Crop::decode(layout, (), record).map_err(|_| einval())?;
                let crop = Crop {
                    typ: query.typ,
                    rect: self.crop,
                };
                crop.encode(layout, (), record).map_err(|_| einval())
            }
            Request::VIDIOC_S_CROP => {
                let crop = Crop::decode(layout, (), record).map_err(|_| einval())?;
                // align to even coordinates and keep inside the sensor
                let mut rect = crop.rect;
                rect.left = rect.left.max(0) & !1;
                rect.top = rect.top.max(0) & !1;
                rect.width = rect.width.min(1920 - rect.left as u32) & !1;
                rect.height = rect.height.min(1080 - rect.top as u32) & !1;
                self.crop = rect;
                Ok(())
            }
            Request::VIDIOC_SUBSCRIBE_EVENT => {
                let sub = Subscription::decode(layout, (), record).map_err(|_| einval())?;
                self.subscriptions.insert((sub.typ, sub.id));
                Ok(())
            }
            Request::VIDIOC_UNSUBSCRIBE_EVENT => {
                let sub = Subscription::decode(layout, (), record).map_err(|_| einval())?;
                if sub.typ == event::Type::All {
                    self.subscriptions.clear();
                } else {
                    self.subscriptions.remove(&(sub.typ, sub.id));
                }
                Ok(())
            }
            Request::VIDIOC_DQEVENT => {
                let mut event = self.events.pop_front().ok_or_else(|| errno(libc::ENOENT))?;
                event.pending = self.events.len() as u32;
                event.encode(layout, (), record).map_err(|_| einval())
            }
        }
    }

    fn querycap(&mut self, layout: &Layout, record: &mut Record) -> io::Result<()> {
        let caps = Capabilities {
            driver: "fake".to_string(),
            card: "Fake Camera".to_string(),
            bus: "platform:fake".to_string(),
            version: self.config.version,
            capabilities: self.config.caps | capability::Flags::DEVICE_CAPS,
            device_caps: self.config.caps,
        };
        caps.encode(layout, (), record).map_err(|_| einval())
    }

    fn enum_fmt(&mut self, layout: &Layout, record: &mut Record) -> io::Result<()> {
        let query = format::Description::decode(layout, (), record).map_err(|_| einval())?;
        let codes: &[&[u8; 4]] = if query.typ.is_multiplanar() {
            &[b"NM12", b"YM12"]
        } else {
            &[b"YUYV", b"MJPG", b"GREY"]
        };
        let code = codes.get(query.index as usize).ok_or_else(einval)?;
        let fourcc = FourCC::new(code);
        let desc = format::Description {
            index: query.index,
            typ: query.typ,
            flags: if fourcc == FourCC::new(b"MJPG") {
                format::description::Flags::COMPRESSED
            } else {
                format::description::Flags::empty()
            },
            description: format::catalog::lookup(fourcc)
                .and_then(|e| e.aliases.first())
                .map(|s| s.to_string())
                .unwrap_or_default(),
            fourcc,
        };
        desc.encode(layout, (), record).map_err(|_| einval())
    }

    fn set_fmt(&mut self, layout: &Layout, record: &mut Record, apply: bool) -> io::Result<()> {
        let typ = buffer_type(record.u32(layout.format.type_))?;
        let requested = FormatPayload::decode(layout, typ, record).map_err(|_| einval())?;
        let adjusted = adjust_format(&self.config, requested);
        if apply {
            let queue = self.queue(typ);
            if !queue.buffers.is_empty() {
                return Err(errno(libc::EBUSY));
            }
            queue.format = adjusted.clone();
        }
        adjusted.encode(layout, typ, record).map_err(|_| einval())
    }

    fn reqbufs(&mut self, layout: &Layout, record: &mut Record) -> io::Result<()> {
        let mut req = RequestBuffers::decode(layout, (), record).map_err(|_| einval())?;
        if req.memory != Memory::Mmap {
            return Err(einval());
        }
        let max_buffers = self.config.max_buffers;
        let typ = req.typ;
        let busy = {
            let queue = self.queues.get(&typ);
            queue.map_or(false, |q| {
                q.streaming || q.buffers.iter().any(|b| self.is_mapped(b))
            })
        };
        if busy {
            return Err(errno(libc::EBUSY));
        }

        let queue = self.queue(typ);
        queue.buffers.clear();
        queue.ready.clear();

        let granted = req.count.min(max_buffers);
        let sizes = queue.format.plane_sizes();
        for index in 0..granted {
            queue.buffers.push(FakeBuffer {
                planes: sizes
                    .iter()
                    .map(|size| vec![0u8; *size as usize].into_boxed_slice())
                    .collect(),
                offsets: (0..sizes.len() as u32)
                    .map(|plane| ((typ as u32) << 24) | (index << 16) | (plane << 12))
                    .collect(),
                bytes_used: vec![0; sizes.len()],
                queued: false,
            });
        }

        req.count = granted;
        req.capabilities = 0x1;
        req.encode(layout, (), record).map_err(|_| einval())
    }

    fn describe(typ: buffer::Type, index: u32, buf: &FakeBuffer) -> Descriptor {
        let mut desc = Descriptor::new(typ, Memory::Mmap, index, buf.planes.len());
        for (i, plane) in desc.planes.iter_mut().enumerate() {
            plane.length = buf.planes[i].len() as u32;
            plane.location = BufferLocation::Offset(buf.offsets[i]);
            plane.bytes_used = buf.bytes_used[i];
        }
        if buf.queued {
            desc.flags |= buffer::Flags::QUEUED;
        }
        desc
    }

    fn querybuf(&mut self, layout: &Layout, record: &mut Record) -> io::Result<()> {
        let typ = buffer_type(record.u32(layout.buffer.type_))?;
        let index = record.u32(layout.buffer.index);
        let queue = self.queue(typ);
        let buf = queue.buffers.get(index as usize).ok_or_else(einval)?;
        let desc = State::describe(typ, index, buf);
        write_descriptor(layout, record, &desc)
    }

    fn qbuf(&mut self, layout: &Layout, record: &mut Record) -> io::Result<()> {
        if self.config.failing_qbufs > 0 {
            self.config.failing_qbufs -= 1;
            return Err(errno(libc::EIO));
        }
        let typ = buffer_type(record.u32(layout.buffer.type_))?;
        let desc = read_descriptor(layout, typ, record)?;
        if desc.memory != Memory::Mmap {
            return Err(einval());
        }
        let queue = self.queue(typ);
        let buf = queue
            .buffers
            .get_mut(desc.index as usize)
            .ok_or_else(einval)?;
        if buf.queued || desc.planes.len() != buf.planes.len() {
            return Err(einval());
        }

        for (i, plane) in desc.planes.iter().enumerate() {
            buf.bytes_used[i] = if typ.is_output() {
                if plane.bytes_used as usize > buf.planes[i].len() {
                    return Err(einval());
                }
                plane.bytes_used
            } else {
                0
            };
        }
        buf.queued = true;
        queue.ready.push_back(desc.index);
        Ok(())
    }

    fn dqbuf(&mut self, layout: &Layout, record: &mut Record) -> io::Result<()> {
        let typ = buffer_type(record.u32(layout.buffer.type_))?;
        let swap = self.config.swap_completions && typ.is_capture();
        let fill = self.config.fill;

        // a mem-to-mem device produces the capture buffer from the oldest output buffer
        let source = if typ.is_capture() {
            let output = if typ.is_multiplanar() {
                buffer::Type::VideoOutputMplane
            } else {
                buffer::Type::VideoOutput
            };
            self.queues.get(&output).and_then(|q| {
                let index = *q.ready.front()?;
                let buf = &q.buffers[index as usize];
                Some(
                    buf.planes
                        .iter()
                        .zip(buf.bytes_used.iter())
                        .map(|(p, used)| p[..*used as usize].to_vec())
                        .collect::<Vec<_>>(),
                )
            })
        } else {
            None
        };

        let queue = self.queue(typ);
        if !queue.streaming {
            return Err(einval());
        }
        let index = if swap && queue.ready.len() >= 2 {
            queue.ready.remove(1)
        } else {
            queue.ready.pop_front()
        }
        .ok_or_else(|| errno(libc::EAGAIN))?;

        let sequence = queue.sequence;
        queue.sequence += 1;
        let buf = &mut queue.buffers[index as usize];
        buf.queued = false;

        if typ.is_capture() {
            for (i, plane) in buf.planes.iter_mut().enumerate() {
                let used = match source.as_ref().and_then(|s| s.get(i)) {
                    Some(data) => {
                        let n = data.len().min(plane.len());
                        plane[..n].copy_from_slice(&data[..n]);
                        n as u32
                    }
                    None => {
                        for (j, byte) in plane.iter_mut().enumerate() {
                            *byte = (sequence as usize + j) as u8;
                        }
                        fill.unwrap_or(plane.len() as u32)
                    }
                };
                buf.bytes_used[i] = used;
            }
        }

        let mut desc = State::describe(typ, index, buf);
        desc.flags |= buffer::Flags::DONE | buffer::Flags::TIMESTAMP_MONOTONIC;
        desc.field = FieldOrder::Progressive;
        desc.sequence = sequence;
        desc.timestamp = Timestamp::new(1, i64::from(sequence) * 33_333);
        write_descriptor(layout, record, &desc)
    }

    fn parm(&mut self, layout: &Layout, record: &mut Record, apply: bool) -> io::Result<()> {
        let typ = buffer_type(record.u32(layout.streamparm.type_))?;
        let current = *self.params.entry(typ).or_insert_with(|| {
            let interval = Fraction::new(1, 30);
            if typ.is_output() {
                StreamParams::Output(OutputParams {
                    capabilities: parameters::Capabilities::TIME_PER_FRAME,
                    interval,
                    ..OutputParams::default()
                })
            } else {
                StreamParams::Capture(CaptureParams {
                    capabilities: parameters::Capabilities::TIME_PER_FRAME,
                    interval,
                    ..CaptureParams::default()
                })
            }
        });

        let params = if apply {
            let requested = StreamParams::decode(layout, typ, record).map_err(|_| einval())?;
            let interval = requested.interval();
            // only 15 and 30 fps are supported
            let interval = match interval.fps() {
                Some(fps) if fps > 20.0 => Fraction::from_fps(30),
                Some(_) => Fraction::from_fps(15),
                None => current.interval(),
            };
            let applied = StreamParams::with_interval(typ.is_output(), interval);
            let applied = match (applied, current) {
                (StreamParams::Capture(mut a), StreamParams::Capture(c)) => {
                    a.capabilities = c.capabilities;
                    StreamParams::Capture(a)
                }
                (StreamParams::Output(mut a), StreamParams::Output(c)) => {
                    a.capabilities = c.capabilities;
                    StreamParams::Output(a)
                }
                (applied, _) => applied,
            };
            self.params.insert(typ, applied);
            applied
        } else {
            current
        };
        params.encode(layout, typ, record).map_err(|_| einval())
    }

    fn find(&mut self, id: u32) -> io::Result<&mut Ctrl> {
        self.controls
            .iter_mut()
            .find(|c| c.desc.id == id)
            .ok_or_else(einval)
    }

    fn ctrl(&mut self, layout: &Layout, record: &mut Record, apply: bool) -> io::Result<()> {
        let request = Control::decode(layout, (), record).map_err(|_| einval())?;
        let ctrl = self.find(request.id)?;
        if ctrl.desc.typ.has_payload() || ctrl.desc.typ == control::Type::Integer64 {
            return Err(einval());
        }
        if apply {
            let value = match request.value {
                Value::Integer(v) => v,
                _ => return Err(einval()),
            };
            ctrl.value = value.max(ctrl.desc.minimum).min(ctrl.desc.maximum);
        }
        let response = Control {
            id: ctrl.desc.id,
            value: Value::Integer(ctrl.value),
        };
        response.encode(layout, (), record).map_err(|_| einval())
    }

    fn next_control(&self, raw: u32) -> Option<&Ctrl> {
        let next_flags = u32::from(control::Flags::NEXT_CTRL | control::Flags::NEXT_COMPOUND);
        let id = raw & !next_flags;
        if raw & next_flags == 0 {
            return self.controls.iter().find(|c| c.desc.id == id);
        }
        let compound = raw & u32::from(control::Flags::NEXT_COMPOUND) != 0;
        self.controls
            .iter()
            .filter(|c| c.desc.id > id)
            .filter(|c| compound || !c.desc.typ.has_payload())
            .min_by_key(|c| c.desc.id)
    }

    fn queryctrl(&mut self, layout: &Layout, record: &mut Record) -> io::Result<()> {
        let QueryCtrl(query) = QueryCtrl::decode(layout, (), record).map_err(|_| einval())?;
        let ctrl = self.next_control(query.id).ok_or_else(einval)?;
        let mut desc = ctrl.desc.clone();
        desc.minimum = desc.minimum.max(i64::from(i32::MIN));
        desc.maximum = desc.maximum.min(i64::from(i32::MAX));
        QueryCtrl(desc)
            .encode(layout, (), record)
            .map_err(|_| einval())
    }

    fn query_ext_ctrl(&mut self, layout: &Layout, record: &mut Record) -> io::Result<()> {
        let QueryExtCtrl(query) = QueryExtCtrl::decode(layout, (), record).map_err(|_| einval())?;
        let ctrl = self.next_control(query.id).ok_or_else(einval)?;
        QueryExtCtrl(ctrl.desc.clone())
            .encode(layout, (), record)
            .map_err(|_| einval())
    }

    fn querymenu(&mut self, layout: &Layout, record: &mut Record) -> io::Result<()> {
        let id = record.u32(layout.querymenu.id);
        let index = record.u32(layout.querymenu.index);
        if self.config.hidden_menu_items.contains(&index) {
            return Err(einval());
        }
        let ctrl = self.find(id)?;
        if ctrl.desc.typ != control::Type::Menu {
            return Err(einval());
        }
        let name = MENU_NAMES.get(index as usize).ok_or_else(einval)?;
        let entry = control_codec::MenuEntry {
            id,
            index,
            item: MenuItem::Name(name.to_string()),
        };
        entry
            .encode(layout, control::Type::Menu, record)
            .map_err(|_| einval())
    }

    fn ext_ctrls(
        &mut self,
        layout: &Layout,
        record: &mut Record,
        write: bool,
        apply: bool,
    ) -> io::Result<()> {
        let l = &layout.ext_controls;
        let c = &layout.ext_control;
        let count = record.u32(l.count) as usize;
        let which = record.u32(l.which);
        let array = control_codec::control_array(layout, record);
        if count == 0 || array == 0 {
            return Err(einval());
        }

        let raw = unsafe { slice::from_raw_parts_mut(array as *mut u8, count * c.size) };
        let mut controls = Record::from_bytes(raw);
        let mut result = Ok(());

        for i in 0..count {
            let base = i * c.size;
            let id = controls.u32(base + c.id);
            let class_mismatch = which & 0x0fff_0000 != 0
                && which < 0x0f00_0000
                && id & 0x0fff_0000 != which;
            let ctrl = match self.controls.iter_mut().find(|x| x.desc.id == id) {
                Some(ctrl) if !class_mismatch => ctrl,
                _ => {
                    record.put_u32(l.error_idx, i as u32);
                    result = Err(einval());
                    break;
                }
            };

            match ctrl.desc.typ {
                control::Type::String => {
                    let size = controls.u32(base + c.size_) as usize;
                    let address = controls.address(base + c.value, layout.pointer_width());
                    let payload = unsafe { slice::from_raw_parts_mut(address as *mut u8, size) };
                    if write {
                        let end = payload.iter().position(|&b| b == 0).unwrap_or(size);
                        if end as i64 > ctrl.desc.maximum {
                            record.put_u32(l.error_idx, i as u32);
                            result = Err(errno(libc::ERANGE));
                            break;
                        }
                        if apply {
                            ctrl.text = String::from_utf8_lossy(&payload[..end]).into_owned();
                        }
                    } else {
                        if size <= ctrl.text.len() {
                            controls.put_u32(base + c.size_, ctrl.text.len() as u32 + 1);
                            record.put_u32(l.error_idx, i as u32);
                            result = Err(errno(libc::ENOSPC));
                            break;
                        }
                        payload[..ctrl.text.len()].copy_from_slice(ctrl.text.as_bytes());
                        payload[ctrl.text.len()] = 0;
                    }
                }
                control::Type::Integer64 => {
                    if write {
                        let value = controls.i64(base + c.value);
                        if apply {
                            ctrl.value = value.max(ctrl.desc.minimum).min(ctrl.desc.maximum);
                        }
                    }
                    controls.put_i64(base + c.value, ctrl.value);
                }
                _ => {
                    if write {
                        let value = i64::from(controls.i32(base + c.value));
                        if apply {
                            ctrl.value = value.max(ctrl.desc.minimum).min(ctrl.desc.maximum);
                        }
                    }
                    controls.put_i32(base + c.value, ctrl.value as i32);
                }
            }
        }

        raw.copy_from_slice(controls.as_bytes());
        result
    }
}

impl Driver for FakeDriver {
    unsafe fn ioctl(&self, code: Code, arg: &mut [u8]) -> io::Result<()> {
        if arg.len() != code.size() {
            return Err(einval());
        }
        let mut state = self.lock();
        state.requests.push(code.request);
        let mut record = Record::from_bytes(arg);
        let res = state.handle(&self.layout, code.request, &mut record);
        arg.copy_from_slice(record.as_bytes());
        res
    }

    fn map(&self, offset: u32, len: usize) -> io::Result<*mut u8> {
        let mut state = self.lock();
        if state.config.fail_map_after == Some(state.map_log.len()) {
            return Err(errno(libc::ENOMEM));
        }
        let ptr = state
            .queues
            .values_mut()
            .flat_map(|q| q.buffers.iter_mut())
            .flat_map(|b| b.planes.iter_mut().zip(b.offsets.iter()))
            .find(|(_, o)| **o == offset)
            .and_then(|(plane, _)| {
                if len <= plane.len() {
                    Some(plane.as_mut_ptr())
                } else {
                    None
                }
            })
            .ok_or_else(einval)?;
        state.mappings.insert(ptr as usize, offset);
        state.map_log.push((offset, len));
        Ok(ptr)
    }

    unsafe fn unmap(&self, ptr: *mut u8, _len: usize) -> io::Result<()> {
        match self.lock().mappings.remove(&(ptr as usize)) {
            Some(_) => Ok(()),
            None => Err(einval()),
        }
    }

    fn wait(
        &self,
        interest: Interest,
        timeout: Option<Duration>,
        waker: Option<&Waker>,
    ) -> io::Result<Readiness> {
        if let Some(waker) = waker {
            if waker.is_woken()? {
                return Ok(Readiness::Woken);
            }
        }

        let state = self.lock();
        let ready = |output: bool| {
            state
                .queues
                .iter()
                .any(|(t, q)| t.is_output() == output && q.streaming && !q.ready.is_empty())
        };
        let readable = ready(false);
        let writable = ready(true);
        if (interest.read && readable) || (interest.write && writable) {
            return Ok(Readiness::Ready { readable, writable });
        }
        match timeout {
            Some(_) => Ok(Readiness::TimedOut),
            None => Err(io::Error::new(
                io::ErrorKind::Other,
                "nothing can complete, waiting would never return",
            )),
        }
    }

    fn is_nonblocking(&self) -> bool {
        self.lock().config.nonblocking
    }
}
