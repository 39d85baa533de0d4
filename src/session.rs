//! Device sessions.
//!
//! A [`Session`] owns the open device, reads its capabilities once and picks the record layout
//! every later exchange uses. Formats are negotiated per queue and buffer pools are created from
//! the negotiated format.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use log::{debug, warn};

use crate::buffer;
use crate::capability::{self, Capabilities};
use crate::codec::{
    self, ExtControl, ExtControlsRecord, MenuEntry, Message, QueryCtrl, QueryExtCtrl,
};
use crate::control::{self, Control, Description as ControlDescription, Value, Which};
use crate::crop::{Crop, CropCapability, Rect};
use crate::device::{Driver, Handle};
use crate::error::{Error, Result};
use crate::event::{Event, Subscription};
use crate::format::{catalog, description, Description, FormatPayload, FourCC};
use crate::io::Pool;
use crate::parameters::StreamParams;
use crate::v4l2;
use crate::v4l2::layout::{Abi, HeaderVersion, Layout, LayoutKey};
use crate::v4l2::record::Record;
use crate::v4l2::vidioc::Request;

/// Major number of video4linux character devices
pub const VIDEO_MAJOR: u32 = 81;

/// Session configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Options {
    /// Open the device with O_NONBLOCK, dequeueing then fails with `WouldBlock` instead of
    /// waiting
    pub nonblocking: bool,
    /// Record layout to use instead of the one derived from the target and driver version
    pub layout: Option<LayoutKey>,
    /// Default timeout of blocking dequeues on pools created by the session
    pub timeout: Option<Duration>,
    /// Expected major number of the device node, `None` skips the check
    pub verify_major: Option<u32>,
}

impl Default for Options {
    fn default() -> Self {
        Options {
            nonblocking: false,
            layout: None,
            timeout: None,
            verify_major: Some(VIDEO_MAJOR),
        }
    }
}

/// Marks a buffer type as owned by a live pool, released on drop
#[derive(Debug)]
pub(crate) struct Claim {
    claimed: Arc<Mutex<HashSet<buffer::Type>>>,
    typ: buffer::Type,
}

impl Drop for Claim {
    fn drop(&mut self) {
        match self.claimed.lock() {
            Ok(mut claimed) => {
                claimed.remove(&self.typ);
            }
            Err(poisoned) => {
                poisoned.into_inner().remove(&self.typ);
            }
        }
    }
}

/// Capability bits a node must report to serve queues of type `typ`, with the mem-to-mem flag
/// that implies them
fn queue_caps(typ: buffer::Type) -> (capability::Flags, Option<capability::Flags>) {
    use crate::buffer::Type::*;
    use crate::capability::Flags;

    match typ {
        VideoCapture => (Flags::VIDEO_CAPTURE, Some(Flags::VIDEO_M2M)),
        VideoOutput => (Flags::VIDEO_OUTPUT, Some(Flags::VIDEO_M2M)),
        VideoCaptureMplane => (Flags::VIDEO_CAPTURE_MPLANE, Some(Flags::VIDEO_M2M_MPLANE)),
        VideoOutputMplane => (Flags::VIDEO_OUTPUT_MPLANE, Some(Flags::VIDEO_M2M_MPLANE)),
        VideoOverlay => (Flags::VIDEO_OVERLAY, None),
        VbiCapture => (Flags::VBI_CAPTURE, None),
        VbiOutput => (Flags::VBI_OUTPUT, None),
        SlicedVbiCapture => (Flags::SLICED_VBI_CAPTURE, None),
        SlicedVbiOutput => (Flags::SLICED_VBI_OUTPUT, None),
        VideoOutputOverlay => (Flags::VIDEO_OUTPUT_OVERLAY, None),
        SdrCapture => (Flags::SDR_CAPTURE, None),
        SdrOutput => (Flags::SDR_OUTPUT, None),
        MetaCapture => (Flags::META_CAPTURE, None),
        MetaOutput => (Flags::META_OUTPUT, None),
    }
}

/// An open video device
///
/// # Example
///
/// ```no_run
/// use v4l2_mmap::buffer::Type;
/// use v4l2_mmap::Session;
///
/// let mut session = Session::open("/dev/video0").expect("failed to open device");
/// let format = session
///     .negotiate(Type::VideoCapture, 800, 600, "YUYV")
///     .expect("failed to negotiate format");
/// println!("{}", format);
///
/// let mut pool = session.allocate_and_map(Type::VideoCapture, 4).unwrap();
/// let (frame, meta) = pool.capture().unwrap();
/// println!("{} bytes, seq {}", frame.len(), meta.seq);
/// ```
pub struct Session<D: Driver = Handle> {
    driver: Arc<D>,
    layout: Layout,
    caps: Capabilities,
    path: Option<PathBuf>,
    timeout: Option<Duration>,
    claimed: Arc<Mutex<HashSet<buffer::Type>>>,
    formats: HashMap<buffer::Type, FormatPayload>,
}

impl Session<Handle> {
    /// Opens a device node with default options
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Session::open_with(path, Options::default())
    }

    /// Opens a device node
    ///
    /// Fails with [`Error::NotAVideoDevice`] if the node is not a character device with the
    /// expected major number.
    pub fn open_with<P: AsRef<Path>>(path: P, options: Options) -> Result<Self> {
        let path = path.as_ref();
        let handle =
            Handle::open(path, options.nonblocking).map_err(|source| Error::DeviceOpenFailed {
                path: path.to_path_buf(),
                source,
            })?;

        if let Some(expected) = options.verify_major {
            match v4l2::char_device(handle.fd()) {
                Ok(Some((major, _))) if major == expected => {}
                Ok(_) => {
                    return Err(Error::NotAVideoDevice {
                        path: path.to_path_buf(),
                    })
                }
                Err(source) => {
                    return Err(Error::DeviceOpenFailed {
                        path: path.to_path_buf(),
                        source,
                    })
                }
            }
        }

        debug!("opened {}", path.display());
        let mut session = Session::with_driver(handle, options)?;
        session.path = Some(path.to_path_buf());
        Ok(session)
    }
}

impl<D: Driver> Session<D> {
    /// Starts a session on an already open driver
    ///
    /// Capabilities are queried right away. The layout is taken from `options` or derived from
    /// the target ABI and the kernel version the driver reports.
    pub fn with_driver(driver: D, options: Options) -> Result<Self> {
        // the capability record is the same on every ABI and header generation
        let native = Layout::native();
        let mut record = Record::new(Capabilities::size(&native));
        codec::exchange(&driver, &native, Request::VIDIOC_QUERYCAP, &mut record)?;
        let caps = Capabilities::decode(&native, (), &record)?;

        let key = options.layout.unwrap_or(LayoutKey {
            headers: HeaderVersion::from_kernel(caps.version),
            abi: Abi::native(),
        });
        debug!(
            "{} ({}), capabilities {}, layout {}",
            caps.card,
            caps.driver,
            caps.effective(),
            key
        );

        Ok(Session {
            driver: Arc::new(driver),
            layout: Layout::new(key),
            caps,
            path: None,
            timeout: options.timeout,
            claimed: Arc::new(Mutex::new(HashSet::new())),
            formats: HashMap::new(),
        })
    }

    /// Capabilities read when the session was opened
    pub fn caps(&self) -> &Capabilities {
        &self.caps
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    pub fn driver(&self) -> &Arc<D> {
        &self.driver
    }

    /// Path of the device node, if the session opened one
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Fails with [`Error::CapabilityMissing`] unless every `required` bit is reported
    pub fn require(&self, required: capability::Flags) -> Result<()> {
        if self.caps.supports(required) {
            Ok(())
        } else {
            Err(Error::CapabilityMissing {
                required: required - self.caps.effective(),
            })
        }
    }

    /// Fails with [`Error::CapabilityMissing`] unless the node serves queues of type `typ`
    pub fn require_queue(&self, typ: buffer::Type) -> Result<()> {
        let (direct, m2m) = queue_caps(typ);
        match m2m {
            Some(m2m) if self.caps.supports(m2m) => Ok(()),
            _ => self.require(direct),
        }
    }

    fn is_claimed(&self, typ: buffer::Type) -> bool {
        match self.claimed.lock() {
            Ok(claimed) => claimed.contains(&typ),
            Err(poisoned) => poisoned.into_inner().contains(&typ),
        }
    }

    fn claim(&self, typ: buffer::Type) -> Result<Claim> {
        let mut claimed = match self.claimed.lock() {
            Ok(claimed) => claimed,
            Err(poisoned) => poisoned.into_inner(),
        };
        if !claimed.insert(typ) {
            return Err(Error::violation(format!("a pool for {} already exists", typ)));
        }
        Ok(Claim {
            claimed: Arc::clone(&self.claimed),
            typ,
        })
    }

    fn exchange(&self, request: Request, record: &mut Record) -> Result<()> {
        codec::exchange(&*self.driver, &self.layout, request, record)
    }

    fn transact<M: Message>(&self, request: Request, msg: &M, ctx: M::Context) -> Result<M> {
        codec::transact(&*self.driver, &self.layout, request, msg, ctx)
    }

    /// Returns the formats a queue supports
    pub fn enum_formats(&self, typ: buffer::Type) -> Result<Vec<Description>> {
        let mut formats = Vec::new();
        for index in 0.. {
            let query = Description {
                index,
                typ,
                flags: description::Flags::empty(),
                description: String::new(),
                fourcc: FourCC::default(),
            };
            match self.transact(Request::VIDIOC_ENUM_FMT, &query, ()) {
                Ok(desc) => formats.push(desc),
                // the driver signals the end of the list with EINVAL
                Err(e) if e.errno() == Some(libc::EINVAL) => break,
                Err(e) => return Err(e),
            }
        }
        Ok(formats)
    }

    /// Returns the current format of a queue
    pub fn format(&self, typ: buffer::Type) -> Result<FormatPayload> {
        let mut record = Record::new(FormatPayload::size(&self.layout));
        record.put_u32(self.layout.format.type_, typ as u32);
        self.exchange(Request::VIDIOC_G_FMT, &mut record)?;
        FormatPayload::decode(&self.layout, typ, &record)
    }

    /// Asks the driver how it would adjust `fmt` without applying it
    pub fn try_format(&self, typ: buffer::Type, fmt: &FormatPayload) -> Result<FormatPayload> {
        self.transact(Request::VIDIOC_TRY_FMT, fmt, typ)
    }

    /// Applies `fmt` to a queue and returns what the driver actually configured
    ///
    /// Not allowed while a pool of the queue exists, since its buffers were sized for the
    /// previous format.
    pub fn set_format(&mut self, typ: buffer::Type, fmt: &FormatPayload) -> Result<FormatPayload> {
        if self.is_claimed(typ) {
            return Err(Error::violation(format!(
                "cannot change the format of {} while its buffers are allocated",
                typ
            )));
        }
        let applied = self.transact(Request::VIDIOC_S_FMT, fmt, typ)?;
        self.formats.insert(typ, applied.clone());
        Ok(applied)
    }

    /// Negotiates a format by name
    ///
    /// The name is resolved through the format catalog before the device is touched. The
    /// driver may adjust dimensions and plane sizes, the returned format is authoritative.
    pub fn negotiate(
        &mut self,
        typ: buffer::Type,
        width: u32,
        height: u32,
        name: &str,
    ) -> Result<FormatPayload> {
        let fourcc = catalog::resolve(name)?;
        self.require_queue(typ)?;

        let request = FormatPayload::request(typ, width, height, fourcc);
        let applied = self
            .set_format(typ, &request)
            .map_err(|e| Error::FormatNegotiationFailed {
                requested: format!("{} {}x{}", name, width, height),
                source: Box::new(e),
            })?;

        if applied.width() != width || applied.height() != height || applied.fourcc() != fourcc
        {
            debug!(
                "{}: requested {} {}x{}, driver chose {} {}x{}",
                typ,
                fourcc,
                width,
                height,
                applied.fourcc(),
                applied.width(),
                applied.height()
            );
        }
        debug!("{}: negotiated {}", typ, applied.fourcc());
        Ok(applied)
    }

    /// Allocates `count` buffers for a queue and maps them
    ///
    /// The plane count comes from the negotiated format, or from the driver if no format was
    /// negotiated in this session.
    pub fn allocate_and_map(&mut self, typ: buffer::Type, count: u32) -> Result<Pool<D>> {
        self.require(capability::Flags::STREAMING)?;
        let claim = self.claim(typ)?;

        let planes = match self.formats.get(&typ) {
            Some(fmt) => fmt.plane_count(),
            None => self.format(typ)?.plane_count(),
        };
        let mut pool = Pool::allocate(
            Arc::clone(&self.driver),
            self.layout,
            typ,
            planes,
            count,
        )?
        .with_claim(claim);
        pool.set_timeout(self.timeout);
        pool.map_all()?;
        Ok(pool)
    }

    /// Queues every buffer the application owns and starts streaming
    pub fn start(&self, pool: &mut Pool<D>) -> Result<()> {
        for index in 0..pool.len() as u32 {
            if pool.buffer_state(index) != Some(buffer::State::Queued) {
                pool.enqueue(index)?;
            }
        }
        pool.stream_on()
    }

    /// Stops streaming, all buffers return to the application
    pub fn stop(&self, pool: &mut Pool<D>) -> Result<()> {
        pool.stream_off()
    }

    /// Returns the current value of a control
    pub fn control(&self, id: u32) -> Result<Control> {
        self.transact(
            Request::VIDIOC_G_CTRL,
            &Control {
                id,
                value: Value::Integer(0),
            },
            (),
        )
    }

    /// Sets a control, returns the value the driver applied
    pub fn set_control(&self, ctrl: &Control) -> Result<Control> {
        self.transact(Request::VIDIOC_S_CTRL, ctrl, ())
    }

    /// Lists every control of the device, menu controls with their items
    pub fn query_controls(&self) -> Result<Vec<ControlDescription>> {
        let mut controls = Vec::new();
        let mut id = 0;
        loop {
            let next = control::Flags::NEXT_CTRL | control::Flags::NEXT_COMPOUND;
            let query = QueryCtrl::new(id | u32::from(next));
            let mut desc = match self.transact(Request::VIDIOC_QUERYCTRL, &query, ()) {
                Ok(QueryCtrl(desc)) => desc,
                Err(e) if e.errno() == Some(libc::EINVAL) => break,
                Err(e) => return Err(e),
            };
            id = desc.id;

            if desc.typ.is_menu() {
                desc.items = Some(self.menu_items(&desc)?);
            }
            controls.push(desc);
        }
        Ok(controls)
    }

    fn menu_items(&self, desc: &ControlDescription) -> Result<Vec<(u32, control::MenuItem)>> {
        let mut items = Vec::new();
        for index in desc.minimum.max(0)..=desc.maximum.max(0) {
            let query = MenuEntry {
                id: desc.id,
                index: index as u32,
                item: control::MenuItem::Value(0),
            };
            match self.transact(Request::VIDIOC_QUERYMENU, &query, desc.typ) {
                Ok(entry) => items.push((entry.index, entry.item)),
                // drivers may reject indices inside the advertised range, skip them
                Err(e) if e.errno() == Some(libc::EINVAL) => continue,
                Err(e) => return Err(e),
            }
        }
        Ok(items)
    }

    /// Describes one control, including 64-bit limits and array dimensions
    pub fn query_ext_control(&self, id: u32) -> Result<ControlDescription> {
        let QueryExtCtrl(desc) =
            self.transact(Request::VIDIOC_QUERY_EXT_CTRL, &QueryExtCtrl::new(id), ())?;
        Ok(desc)
    }

    fn ext_elements(&self, values: &[(u32, Value)]) -> Result<Vec<ExtControl>> {
        values
            .iter()
            .map(|(id, value)| {
                let desc = self.query_ext_control(*id)?;
                Ok(ExtControl::with_value(&desc, value.clone()))
            })
            .collect()
    }

    fn ext_request(
        &self,
        request: Request,
        which: Which,
        elements: &[ExtControl],
    ) -> Result<Vec<ExtControl>> {
        let mut record = ExtControlsRecord::encode(&self.layout, which, elements, None)?;
        if let Err(e) = self.exchange(request, &mut record.main) {
            let idx = record.error_idx(&self.layout) as usize;
            match elements.get(idx) {
                Some(element) => warn!("{} rejected control {:#x}", request, element.id),
                None => warn!("{} failed before validating any control", request),
            }
            return Err(e);
        }
        record.decode(&self.layout)
    }

    /// Reads several controls at once
    ///
    /// Every control is described first, so string and compound values are returned with
    /// their proper type.
    pub fn ext_controls(&self, which: Which, ids: &[u32]) -> Result<Vec<ExtControl>> {
        let elements = ids
            .iter()
            .map(|id| Ok(ExtControl::query(&self.query_ext_control(*id)?)))
            .collect::<Result<Vec<_>>>()?;
        self.ext_request(Request::VIDIOC_G_EXT_CTRLS, which, &elements)
    }

    /// Sets several controls atomically
    pub fn set_ext_controls(
        &self,
        which: Which,
        values: &[(u32, Value)],
    ) -> Result<Vec<ExtControl>> {
        let elements = self.ext_elements(values)?;
        self.ext_request(Request::VIDIOC_S_EXT_CTRLS, which, &elements)
    }

    /// Validates several control values without applying them
    pub fn try_ext_controls(
        &self,
        which: Which,
        values: &[(u32, Value)],
    ) -> Result<Vec<ExtControl>> {
        let elements = self.ext_elements(values)?;
        self.ext_request(Request::VIDIOC_TRY_EXT_CTRLS, which, &elements)
    }

    /// Returns the cropping limits of a queue
    pub fn crop_capabilities(&self, typ: buffer::Type) -> Result<CropCapability> {
        let query = CropCapability {
            typ,
            bounds: Rect::default(),
            defrect: Rect::default(),
            pixel_aspect: Default::default(),
        };
        self.transact(Request::VIDIOC_CROPCAP, &query, ())
    }

    /// Returns the active cropping rectangle of a queue
    pub fn crop(&self, typ: buffer::Type) -> Result<Crop> {
        let query = Crop {
            typ,
            rect: Rect::default(),
        };
        self.transact(Request::VIDIOC_G_CROP, &query, ())
    }

    /// Sets the cropping rectangle
    ///
    /// The driver may round the rectangle, read it back with [`Session::crop`].
    pub fn set_crop(&self, crop: &Crop) -> Result<()> {
        let mut record = crop.to_record(&self.layout, ())?;
        self.exchange(Request::VIDIOC_S_CROP, &mut record)
    }

    /// Returns the streaming parameters of a queue
    pub fn params(&self, typ: buffer::Type) -> Result<StreamParams> {
        let mut record = Record::new(StreamParams::size(&self.layout));
        record.put_u32(self.layout.streamparm.type_, typ as u32);
        self.exchange(Request::VIDIOC_G_PARM, &mut record)?;
        StreamParams::decode(&self.layout, typ, &record)
    }

    /// Sets the streaming parameters of a queue, returns what the driver applied
    pub fn set_params(&self, typ: buffer::Type, params: &StreamParams) -> Result<StreamParams> {
        self.transact(Request::VIDIOC_S_PARM, params, typ)
    }

    pub fn subscribe_event(&self, sub: &Subscription) -> Result<()> {
        let mut record = sub.to_record(&self.layout, ())?;
        self.exchange(Request::VIDIOC_SUBSCRIBE_EVENT, &mut record)
    }

    pub fn unsubscribe_event(&self, sub: &Subscription) -> Result<()> {
        let mut record = sub.to_record(&self.layout, ())?;
        self.exchange(Request::VIDIOC_UNSUBSCRIBE_EVENT, &mut record)
    }

    /// Takes the oldest pending event
    ///
    /// Fails with [`Error::WouldBlock`] if no event is pending on a non-blocking handle.
    pub fn dequeue_event(&self) -> Result<Event> {
        let mut record = Record::new(Event::size(&self.layout));
        match self.exchange(Request::VIDIOC_DQEVENT, &mut record) {
            Err(ref e) if e.errno() == Some(libc::ENOENT) || e.errno() == Some(libc::EAGAIN) => {
                Err(Error::WouldBlock)
            }
            Err(e) => Err(e),
            Ok(()) => Event::decode(&self.layout, (), &record),
        }
    }

    /// Closes the session
    ///
    /// Pools must be dropped first. The device stays open until the last reference to it is
    /// gone, so a pool that is still alive never loses its mappings.
    pub fn close(self) -> Result<()> {
        let live = match self.claimed.lock() {
            Ok(claimed) => claimed.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        };
        if live > 0 {
            return Err(Error::violation(format!(
                "{} buffer pools are still alive",
                live
            )));
        }
        debug!("closing session");
        Ok(())
    }
}
