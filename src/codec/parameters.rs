use crate::buffer;
use crate::codec::Message;
use crate::error::{Error, Result};
use crate::fraction::Fraction;
use crate::parameters::{Capabilities, CaptureParams, Modes, OutputParams, StreamParams};
use crate::v4l2::layout::Layout;
use crate::v4l2::record::Record;

/// `struct v4l2_streamparm`
///
/// The union holds capture or output parameters depending on the class of the queue the caller
/// asked about.
impl Message for StreamParams {
    type Context = buffer::Type;

    fn size(layout: &Layout) -> usize {
        layout.streamparm.size
    }

    fn encode(&self, layout: &Layout, typ: buffer::Type, record: &mut Record) -> Result<()> {
        let base = layout.streamparm.parm;
        record.put_u32(layout.streamparm.type_, typ as u32);
        match (self, typ.is_output()) {
            (StreamParams::Capture(p), false) => {
                let l = &layout.captureparm;
                record.put_u32(base + l.capability, p.capabilities.into());
                record.put_u32(base + l.capturemode, p.modes.into());
                record.put_u32(base + l.timeperframe, p.interval.numerator);
                record.put_u32(base + l.timeperframe + 4, p.interval.denominator);
                record.put_u32(base + l.extendedmode, p.extended_mode);
                record.put_u32(base + l.readbuffers, p.read_buffers);
            }
            (StreamParams::Output(p), true) => {
                let l = &layout.outputparm;
                record.put_u32(base + l.capability, p.capabilities.into());
                record.put_u32(base + l.outputmode, p.modes.into());
                record.put_u32(base + l.timeperframe, p.interval.numerator);
                record.put_u32(base + l.timeperframe + 4, p.interval.denominator);
                record.put_u32(base + l.extendedmode, p.extended_mode);
                record.put_u32(base + l.writebuffers, p.write_buffers);
            }
            _ => {
                return Err(Error::violation(format!(
                    "stream parameters do not match buffer type {}",
                    typ
                )))
            }
        }
        Ok(())
    }

    fn decode(layout: &Layout, typ: buffer::Type, record: &Record) -> Result<Self> {
        let base = layout.streamparm.parm;
        if typ.is_output() {
            let l = &layout.outputparm;
            Ok(StreamParams::Output(OutputParams {
                capabilities: Capabilities::from(record.u32(base + l.capability)),
                modes: Modes::from(record.u32(base + l.outputmode)),
                interval: Fraction::new(
                    record.u32(base + l.timeperframe),
                    record.u32(base + l.timeperframe + 4),
                ),
                extended_mode: record.u32(base + l.extendedmode),
                write_buffers: record.u32(base + l.writebuffers),
            }))
        } else {
            let l = &layout.captureparm;
            Ok(StreamParams::Capture(CaptureParams {
                capabilities: Capabilities::from(record.u32(base + l.capability)),
                modes: Modes::from(record.u32(base + l.capturemode)),
                interval: Fraction::new(
                    record.u32(base + l.timeperframe),
                    record.u32(base + l.timeperframe + 4),
                ),
                extended_mode: record.u32(base + l.extendedmode),
                read_buffers: record.u32(base + l.readbuffers),
            }))
        }
    }
}
