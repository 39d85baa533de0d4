//! Byte layouts of the videodev2.h records.
//!
//! Every offset the codec reads or writes lives in one of the tables below. A table is selected
//! once per session by [`LayoutKey`], which combines the userspace ABI (pointer and `time_t`
//! width) with the kernel header generation the driver speaks. Nothing outside of this module
//! hardcodes a record offset.

use std::fmt;

/// Width of a native address as embedded in union payloads
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum PointerWidth {
    Bits32,
    Bits64,
}

impl PointerWidth {
    pub const fn bytes(self) -> usize {
        match self {
            PointerWidth::Bits32 => 4,
            PointerWidth::Bits64 => 8,
        }
    }
}

/// Userspace ABI the records are laid out for
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Abi {
    /// 64-bit pointers and time values (x86_64, aarch64)
    Lp64,
    /// 32-bit pointers and time values, 64-bit members aligned to 8 bytes (arm EABI)
    Ilp32,
    /// 32-bit pointers with a 64-bit `time_t` (arm EABI built against time64 libc)
    Ilp32Time64,
}

impl Abi {
    /// ABI of the target this crate is compiled for
    pub fn native() -> Self {
        if cfg!(target_pointer_width = "64") {
            Abi::Lp64
        } else if std::mem::size_of::<libc::time_t>() == 8 {
            Abi::Ilp32Time64
        } else {
            Abi::Ilp32
        }
    }

    pub fn pointer_width(self) -> PointerWidth {
        match self {
            Abi::Lp64 => PointerWidth::Bits64,
            Abi::Ilp32 | Abi::Ilp32Time64 => PointerWidth::Bits32,
        }
    }

    /// Width of each `timeval`/`timespec` member
    pub fn time_width(self) -> usize {
        match self {
            Abi::Lp64 | Abi::Ilp32Time64 => 8,
            Abi::Ilp32 => 4,
        }
    }
}

/// Generation of the videodev2.h definitions spoken by the driver
///
/// Newer generations turn reserved words into meaningful fields. The byte positions of existing
/// fields never move, but a field unknown to the driver must stay zero.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum HeaderVersion {
    /// Before the request API: no `request_fd` anywhere
    Linux4_14,
    /// `request_fd` in `v4l2_buffer` and `v4l2_ext_controls`
    Linux4_20,
    /// `capabilities` in `v4l2_requestbuffers`
    Linux5_0,
}

impl HeaderVersion {
    /// Picks the header generation from a `KERNEL_VERSION(a, b, c)` style version number as
    /// reported by VIDIOC_QUERYCAP.
    pub fn from_kernel(version: u32) -> Self {
        let major = (version >> 16) & 0xff;
        let minor = (version >> 8) & 0xff;
        match (major, minor) {
            (major, _) if major >= 5 => HeaderVersion::Linux5_0,
            (4, minor) if minor >= 20 => HeaderVersion::Linux4_20,
            _ => HeaderVersion::Linux4_14,
        }
    }
}

/// Key of a layout table
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct LayoutKey {
    pub headers: HeaderVersion,
    pub abi: Abi,
}

impl LayoutKey {
    /// Layout for the compile target, speaking the newest header generation
    pub fn native() -> Self {
        LayoutKey {
            headers: HeaderVersion::Linux5_0,
            abi: Abi::native(),
        }
    }
}

impl fmt::Display for LayoutKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}/{:?}", self.abi, self.headers)
    }
}

/// Describes one record: its total size and the byte offset of every field.
///
/// Fields in the `optional` group exist only for some header generations and are `None`
/// otherwise.
macro_rules! record_layout {
    (
        $(#[$meta:meta])*
        $name:ident { $($field:ident: $width:expr),* $(,)? }
        $(optional { $($opt:ident: $owidth:expr),* $(,)? })?
    ) => {
        $(#[$meta])*
        #[derive(Debug, Copy, Clone, PartialEq, Eq)]
        pub struct $name {
            /// Total size of the record in bytes
            pub size: usize,
            $(pub $field: usize,)*
            $($(pub $opt: Option<usize>,)*)?
        }

        impl $name {
            /// Name, offset and minimal width of every field present in this layout
            pub fn fields(&self) -> Vec<(&'static str, usize, usize)> {
                #[allow(unused_mut)]
                let mut fields = vec![$((stringify!($field), self.$field, $width)),*];
                $($(
                    if let Some(offset) = self.$opt {
                        fields.push((stringify!($opt), offset, $owidth));
                    }
                )*)?
                fields
            }
        }
    };
}

record_layout! {
    /// `struct v4l2_capability`
    CapabilityLayout {
        driver: 16,
        card: 32,
        bus_info: 32,
        version: 4,
        capabilities: 4,
        device_caps: 4,
    }
}

record_layout! {
    /// `struct v4l2_fmtdesc`
    FmtDescLayout {
        index: 4,
        type_: 4,
        flags: 4,
        description: 32,
        pixelformat: 4,
    }
}

record_layout! {
    /// `struct v4l2_format`, the payload union starts at `fmt`
    FormatLayout {
        type_: 4,
        fmt: 200,
    }
}

record_layout! {
    /// `struct v4l2_pix_format`, relative to the start of the format union
    PixFormatLayout {
        width: 4,
        height: 4,
        pixelformat: 4,
        field: 4,
        bytesperline: 4,
        sizeimage: 4,
        colorspace: 4,
        priv_: 4,
        flags: 4,
        ycbcr_enc: 4,
        quantization: 4,
        xfer_func: 4,
    }
}

record_layout! {
    /// `struct v4l2_pix_format_mplane` (packed), relative to the start of the format union
    PixFormatMplaneLayout {
        width: 4,
        height: 4,
        pixelformat: 4,
        field: 4,
        colorspace: 4,
        plane_fmt: 20,
        num_planes: 1,
        flags: 1,
        ycbcr_enc: 1,
        quantization: 1,
        xfer_func: 1,
    }
}

record_layout! {
    /// `struct v4l2_plane_pix_format` (packed)
    PlanePixFormatLayout {
        sizeimage: 4,
        bytesperline: 4,
    }
}

record_layout! {
    /// `struct v4l2_requestbuffers`
    RequestBuffersLayout {
        count: 4,
        type_: 4,
        memory: 4,
    }
    optional {
        capabilities: 4,
    }
}

record_layout! {
    /// `struct v4l2_buffer`
    BufferLayout {
        index: 4,
        type_: 4,
        bytesused: 4,
        flags: 4,
        field: 4,
        timestamp: 8,
        timecode: 16,
        sequence: 4,
        memory: 4,
        m: 4,
        length: 4,
    }
    optional {
        request_fd: 4,
    }
}

record_layout! {
    /// `struct v4l2_plane`
    PlaneLayout {
        bytesused: 4,
        length: 4,
        m: 4,
        data_offset: 4,
    }
}

record_layout! {
    /// `struct v4l2_timecode`, relative to its position in `v4l2_buffer`
    TimecodeLayout {
        type_: 4,
        flags: 4,
        frames: 1,
        seconds: 1,
        minutes: 1,
        hours: 1,
        userbits: 4,
    }
}

record_layout! {
    /// `struct v4l2_control`
    ControlLayout {
        id: 4,
        value: 4,
    }
}

record_layout! {
    /// `struct v4l2_queryctrl`
    QueryCtrlLayout {
        id: 4,
        type_: 4,
        name: 32,
        minimum: 4,
        maximum: 4,
        step: 4,
        default_value: 4,
        flags: 4,
    }
}

record_layout! {
    /// `struct v4l2_querymenu` (packed), `name` and `value` share the anonymous union
    QueryMenuLayout {
        id: 4,
        index: 4,
        name: 32,
        value: 8,
    }
}

record_layout! {
    /// `struct v4l2_query_ext_ctrl`
    QueryExtCtrlLayout {
        id: 4,
        type_: 4,
        name: 32,
        minimum: 8,
        maximum: 8,
        step: 8,
        default_value: 8,
        flags: 4,
        elem_size: 4,
        elems: 4,
        nr_of_dims: 4,
        dims: 16,
    }
}

record_layout! {
    /// `struct v4l2_ext_control` (packed), `value` is the anonymous union
    ExtControlLayout {
        id: 4,
        size_: 4,
        value: 8,
    }
}

record_layout! {
    /// `struct v4l2_ext_controls`, `which` used to be called `ctrl_class`
    ExtControlsLayout {
        which: 4,
        count: 4,
        error_idx: 4,
        controls: 4,
    }
    optional {
        request_fd: 4,
    }
}

record_layout! {
    /// `struct v4l2_rect`
    RectLayout {
        left: 4,
        top: 4,
        width: 4,
        height: 4,
    }
}

record_layout! {
    /// `struct v4l2_cropcap`
    CropCapLayout {
        type_: 4,
        bounds: 16,
        defrect: 16,
        pixelaspect: 8,
    }
}

record_layout! {
    /// `struct v4l2_crop`
    CropLayout {
        type_: 4,
        c: 16,
    }
}

record_layout! {
    /// `struct v4l2_streamparm`, the payload union starts at `parm`
    StreamParmLayout {
        type_: 4,
        parm: 200,
    }
}

record_layout! {
    /// `struct v4l2_captureparm`, relative to the start of the parameter union
    CaptureParmLayout {
        capability: 4,
        capturemode: 4,
        timeperframe: 8,
        extendedmode: 4,
        readbuffers: 4,
    }
}

record_layout! {
    /// `struct v4l2_outputparm`, relative to the start of the parameter union
    OutputParmLayout {
        capability: 4,
        outputmode: 4,
        timeperframe: 8,
        extendedmode: 4,
        writebuffers: 4,
    }
}

record_layout! {
    /// `struct v4l2_event_subscription`
    EventSubscriptionLayout {
        type_: 4,
        id: 4,
        flags: 4,
    }
}

record_layout! {
    /// `struct v4l2_event`, the payload union starts at `u`
    EventLayout {
        type_: 4,
        u: 64,
        pending: 4,
        sequence: 4,
        timestamp: 8,
        id: 4,
    }
}

record_layout! {
    /// `struct v4l2_event_ctrl`, relative to the start of the event union
    EventCtrlLayout {
        changes: 4,
        type_: 4,
        value: 8,
        flags: 4,
        minimum: 4,
        maximum: 4,
        step: 4,
        default_value: 4,
    }
}

/// Complete set of record layouts for one [`LayoutKey`]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Layout {
    pub key: LayoutKey,
    pub capability: CapabilityLayout,
    pub fmtdesc: FmtDescLayout,
    pub format: FormatLayout,
    pub pix: PixFormatLayout,
    pub pix_mp: PixFormatMplaneLayout,
    pub plane_pix: PlanePixFormatLayout,
    pub requestbuffers: RequestBuffersLayout,
    pub buffer: BufferLayout,
    pub plane: PlaneLayout,
    pub timecode: TimecodeLayout,
    pub control: ControlLayout,
    pub queryctrl: QueryCtrlLayout,
    pub querymenu: QueryMenuLayout,
    pub query_ext_ctrl: QueryExtCtrlLayout,
    pub ext_control: ExtControlLayout,
    pub ext_controls: ExtControlsLayout,
    pub rect: RectLayout,
    pub cropcap: CropCapLayout,
    pub crop: CropLayout,
    pub streamparm: StreamParmLayout,
    pub captureparm: CaptureParmLayout,
    pub outputparm: OutputParmLayout,
    pub event_subscription: EventSubscriptionLayout,
    pub event: EventLayout,
    pub event_ctrl: EventCtrlLayout,
}

/// Records whose layout does not depend on the ABI
const CAPABILITY: CapabilityLayout = CapabilityLayout {
    size: 104,
    driver: 0,
    card: 16,
    bus_info: 48,
    version: 80,
    capabilities: 84,
    device_caps: 88,
};

const FMTDESC: FmtDescLayout = FmtDescLayout {
    size: 64,
    index: 0,
    type_: 4,
    flags: 8,
    description: 12,
    pixelformat: 44,
};

const PIX: PixFormatLayout = PixFormatLayout {
    size: 48,
    width: 0,
    height: 4,
    pixelformat: 8,
    field: 12,
    bytesperline: 16,
    sizeimage: 20,
    colorspace: 24,
    priv_: 28,
    flags: 32,
    ycbcr_enc: 36,
    quantization: 40,
    xfer_func: 44,
};

const PIX_MP: PixFormatMplaneLayout = PixFormatMplaneLayout {
    size: 192,
    width: 0,
    height: 4,
    pixelformat: 8,
    field: 12,
    colorspace: 16,
    plane_fmt: 20,
    num_planes: 180,
    flags: 181,
    ycbcr_enc: 182,
    quantization: 183,
    xfer_func: 184,
};

const PLANE_PIX: PlanePixFormatLayout = PlanePixFormatLayout {
    size: 20,
    sizeimage: 0,
    bytesperline: 4,
};

const REQUESTBUFFERS: RequestBuffersLayout = RequestBuffersLayout {
    size: 20,
    count: 0,
    type_: 4,
    memory: 8,
    capabilities: Some(12),
};

const TIMECODE: TimecodeLayout = TimecodeLayout {
    size: 16,
    type_: 0,
    flags: 4,
    frames: 8,
    seconds: 9,
    minutes: 10,
    hours: 11,
    userbits: 12,
};

const CONTROL: ControlLayout = ControlLayout {
    size: 8,
    id: 0,
    value: 4,
};

const QUERYCTRL: QueryCtrlLayout = QueryCtrlLayout {
    size: 68,
    id: 0,
    type_: 4,
    name: 8,
    minimum: 40,
    maximum: 44,
    step: 48,
    default_value: 52,
    flags: 56,
};

const QUERYMENU: QueryMenuLayout = QueryMenuLayout {
    size: 44,
    id: 0,
    index: 4,
    name: 8,
    value: 8,
};

const QUERY_EXT_CTRL: QueryExtCtrlLayout = QueryExtCtrlLayout {
    size: 232,
    id: 0,
    type_: 4,
    name: 8,
    minimum: 40,
    maximum: 48,
    step: 56,
    default_value: 64,
    flags: 72,
    elem_size: 76,
    elems: 80,
    nr_of_dims: 84,
    dims: 88,
};

const EXT_CONTROL: ExtControlLayout = ExtControlLayout {
    size: 20,
    id: 0,
    size_: 4,
    value: 12,
};

const RECT: RectLayout = RectLayout {
    size: 16,
    left: 0,
    top: 4,
    width: 8,
    height: 12,
};

const CROPCAP: CropCapLayout = CropCapLayout {
    size: 44,
    type_: 0,
    bounds: 4,
    defrect: 20,
    pixelaspect: 36,
};

const CROP: CropLayout = CropLayout {
    size: 20,
    type_: 0,
    c: 4,
};

const STREAMPARM: StreamParmLayout = StreamParmLayout {
    size: 204,
    type_: 0,
    parm: 4,
};

const CAPTUREPARM: CaptureParmLayout = CaptureParmLayout {
    size: 40,
    capability: 0,
    capturemode: 4,
    timeperframe: 8,
    extendedmode: 16,
    readbuffers: 20,
};

const OUTPUTPARM: OutputParmLayout = OutputParmLayout {
    size: 40,
    capability: 0,
    outputmode: 4,
    timeperframe: 8,
    extendedmode: 16,
    writebuffers: 20,
};

const EVENT_SUBSCRIPTION: EventSubscriptionLayout = EventSubscriptionLayout {
    size: 32,
    type_: 0,
    id: 4,
    flags: 8,
};

const EVENT_CTRL: EventCtrlLayout = EventCtrlLayout {
    size: 40,
    changes: 0,
    type_: 4,
    value: 8,
    flags: 16,
    minimum: 20,
    maximum: 24,
    step: 28,
    default_value: 32,
};

/// Tables for the newest header generation, one per ABI
const LP64: Layout = Layout {
    key: LayoutKey {
        headers: HeaderVersion::Linux5_0,
        abi: Abi::Lp64,
    },
    capability: CAPABILITY,
    fmtdesc: FMTDESC,
    format: FormatLayout {
        size: 208,
        type_: 0,
        fmt: 8,
    },
    pix: PIX,
    pix_mp: PIX_MP,
    plane_pix: PLANE_PIX,
    requestbuffers: REQUESTBUFFERS,
    buffer: BufferLayout {
        size: 88,
        index: 0,
        type_: 4,
        bytesused: 8,
        flags: 12,
        field: 16,
        timestamp: 24,
        timecode: 40,
        sequence: 56,
        memory: 60,
        m: 64,
        length: 72,
        request_fd: Some(80),
    },
    plane: PlaneLayout {
        size: 64,
        bytesused: 0,
        length: 4,
        m: 8,
        data_offset: 16,
    },
    timecode: TIMECODE,
    control: CONTROL,
    queryctrl: QUERYCTRL,
    querymenu: QUERYMENU,
    query_ext_ctrl: QUERY_EXT_CTRL,
    ext_control: EXT_CONTROL,
    ext_controls: ExtControlsLayout {
        size: 32,
        which: 0,
        count: 4,
        error_idx: 8,
        controls: 24,
        request_fd: Some(12),
    },
    rect: RECT,
    cropcap: CROPCAP,
    crop: CROP,
    streamparm: STREAMPARM,
    captureparm: CAPTUREPARM,
    outputparm: OUTPUTPARM,
    event_subscription: EVENT_SUBSCRIPTION,
    event: EventLayout {
        size: 136,
        type_: 0,
        u: 8,
        pending: 72,
        sequence: 76,
        timestamp: 80,
        id: 96,
    },
    event_ctrl: EVENT_CTRL,
};

const ILP32: Layout = Layout {
    key: LayoutKey {
        headers: HeaderVersion::Linux5_0,
        abi: Abi::Ilp32,
    },
    format: FormatLayout {
        size: 204,
        type_: 0,
        fmt: 4,
    },
    buffer: BufferLayout {
        size: 68,
        index: 0,
        type_: 4,
        bytesused: 8,
        flags: 12,
        field: 16,
        timestamp: 20,
        timecode: 28,
        sequence: 44,
        memory: 48,
        m: 52,
        length: 56,
        request_fd: Some(64),
    },
    plane: PlaneLayout {
        size: 60,
        bytesused: 0,
        length: 4,
        m: 8,
        data_offset: 12,
    },
    ext_controls: ExtControlsLayout {
        size: 24,
        which: 0,
        count: 4,
        error_idx: 8,
        controls: 20,
        request_fd: Some(12),
    },
    event: EventLayout {
        size: 128,
        type_: 0,
        u: 8,
        pending: 72,
        sequence: 76,
        timestamp: 80,
        id: 88,
    },
    ..LP64
};

const ILP32_TIME64: Layout = Layout {
    key: LayoutKey {
        headers: HeaderVersion::Linux5_0,
        abi: Abi::Ilp32Time64,
    },
    buffer: BufferLayout {
        size: 80,
        index: 0,
        type_: 4,
        bytesused: 8,
        flags: 12,
        field: 16,
        timestamp: 24,
        timecode: 40,
        sequence: 56,
        memory: 60,
        m: 64,
        length: 68,
        request_fd: Some(76),
    },
    event: EventLayout {
        size: 136,
        type_: 0,
        u: 8,
        pending: 72,
        sequence: 76,
        timestamp: 80,
        id: 96,
    },
    ..ILP32
};

impl Layout {
    /// Returns the layout table for the given key
    pub fn new(key: LayoutKey) -> Self {
        let mut layout = match key.abi {
            Abi::Lp64 => LP64,
            Abi::Ilp32 => ILP32,
            Abi::Ilp32Time64 => ILP32_TIME64,
        };
        layout.key = key;

        if key.headers < HeaderVersion::Linux5_0 {
            layout.requestbuffers.capabilities = None;
        }
        if key.headers < HeaderVersion::Linux4_20 {
            layout.buffer.request_fd = None;
            layout.ext_controls.request_fd = None;
        }
        layout
    }

    /// Layout for the compile target
    pub fn native() -> Self {
        Layout::new(LayoutKey::native())
    }

    pub fn pointer_width(&self) -> PointerWidth {
        self.key.abi.pointer_width()
    }

    pub fn time_width(&self) -> usize {
        self.key.abi.time_width()
    }
}
