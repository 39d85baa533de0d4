use crate::buffer;
use crate::codec::{discriminant, Message};
use crate::error::{Error, Result};
use crate::format::{
    description, Colorimetry, Description, FieldOrder, Flags, Format, FormatMplane,
    FormatPayload, FourCC, PlaneFormat, MAX_PLANES,
};
use crate::v4l2::layout::Layout;
use crate::v4l2::record::Record;

impl Message for Description {
    type Context = ();

    fn size(layout: &Layout) -> usize {
        layout.fmtdesc.size
    }

    fn encode(&self, layout: &Layout, _ctx: (), record: &mut Record) -> Result<()> {
        let l = &layout.fmtdesc;
        record.put_u32(l.index, self.index);
        record.put_u32(l.type_, self.typ as u32);
        record.put_u32(l.flags, self.flags.into());
        record.put_string(l.description, 32, &self.description);
        record.put_u32(l.pixelformat, self.fourcc.into());
        Ok(())
    }

    fn decode(layout: &Layout, _ctx: (), record: &Record) -> Result<Self> {
        let l = &layout.fmtdesc;
        Ok(Description {
            index: record.u32(l.index),
            typ: discriminant("v4l2_fmtdesc.type", record.u32(l.type_))?,
            flags: description::Flags::from(record.u32(l.flags)),
            description: record.string(l.description, 32),
            fourcc: FourCC::from(record.u32(l.pixelformat)),
        })
    }
}

fn colorimetry(
    colorspace: u32,
    encoding: u32,
    quantization: u32,
    xfer_func: u32,
) -> Result<Colorimetry> {
    Ok(Colorimetry {
        colorspace: discriminant("colorspace", colorspace)?,
        encoding: discriminant("ycbcr_enc", encoding)?,
        quantization: discriminant("quantization", quantization)?,
        transfer: discriminant("xfer_func", xfer_func)?,
    })
}

/// `struct v4l2_format`, the payload shape is chosen by the buffer type
impl Message for FormatPayload {
    type Context = buffer::Type;

    fn size(layout: &Layout) -> usize {
        layout.format.size
    }

    fn encode(&self, layout: &Layout, typ: buffer::Type, record: &mut Record) -> Result<()> {
        if !self.fits(typ) {
            return Err(Error::violation(format!(
                "format payload does not match buffer type {}",
                typ
            )));
        }

        record.put_u32(layout.format.type_, typ as u32);
        let base = layout.format.fmt;
        match self {
            FormatPayload::Single(fmt) => {
                let l = &layout.pix;
                record.put_u32(base + l.width, fmt.width);
                record.put_u32(base + l.height, fmt.height);
                record.put_u32(base + l.pixelformat, fmt.fourcc.into());
                record.put_u32(base + l.field, fmt.field_order as u32);
                record.put_u32(base + l.bytesperline, fmt.stride);
                record.put_u32(base + l.sizeimage, fmt.size);
                record.put_u32(base + l.colorspace, fmt.colorimetry.colorspace as u32);
                record.put_u32(base + l.flags, fmt.flags.into());
                record.put_u32(base + l.ycbcr_enc, fmt.colorimetry.encoding.code());
                record.put_u32(base + l.quantization, fmt.colorimetry.quantization as u32);
                record.put_u32(base + l.xfer_func, fmt.colorimetry.transfer as u32);
            }
            FormatPayload::Multi(fmt) => {
                if fmt.planes.len() > MAX_PLANES {
                    return Err(Error::violation(format!(
                        "{} planes requested, at most {} supported",
                        fmt.planes.len(),
                        MAX_PLANES
                    )));
                }

                let l = &layout.pix_mp;
                record.put_u32(base + l.width, fmt.width);
                record.put_u32(base + l.height, fmt.height);
                record.put_u32(base + l.pixelformat, fmt.fourcc.into());
                record.put_u32(base + l.field, fmt.field_order as u32);
                record.put_u32(base + l.colorspace, fmt.colorimetry.colorspace as u32);
                for (i, plane) in fmt.planes.iter().enumerate() {
                    let p = base + l.plane_fmt + i * layout.plane_pix.size;
                    record.put_u32(p + layout.plane_pix.sizeimage, plane.size);
                    record.put_u32(p + layout.plane_pix.bytesperline, plane.stride);
                }
                record.put_u8(base + l.num_planes, fmt.planes.len() as u8);
                record.put_u8(base + l.flags, u32::from(fmt.flags) as u8);
                record.put_u8(base + l.ycbcr_enc, fmt.colorimetry.encoding.code() as u8);
                record.put_u8(base + l.quantization, fmt.colorimetry.quantization as u8);
                record.put_u8(base + l.xfer_func, fmt.colorimetry.transfer as u8);
            }
        }
        Ok(())
    }

    fn decode(layout: &Layout, typ: buffer::Type, record: &Record) -> Result<Self> {
        let base = layout.format.fmt;
        if !typ.is_multiplanar() {
            let l = &layout.pix;
            return Ok(FormatPayload::Single(Format {
                width: record.u32(base + l.width),
                height: record.u32(base + l.height),
                fourcc: FourCC::from(record.u32(base + l.pixelformat)),
                field_order: discriminant::<FieldOrder>("field", record.u32(base + l.field))?,
                stride: record.u32(base + l.bytesperline),
                size: record.u32(base + l.sizeimage),
                flags: Flags::from(record.u32(base + l.flags)),
                colorimetry: colorimetry(
                    record.u32(base + l.colorspace),
                    record.u32(base + l.ycbcr_enc),
                    record.u32(base + l.quantization),
                    record.u32(base + l.xfer_func),
                )?,
            }));
        }

        let l = &layout.pix_mp;
        let num_planes = record.u8(base + l.num_planes) as usize;
        if num_planes > MAX_PLANES {
            return Err(Error::InvalidDiscriminant {
                field: "v4l2_pix_format_mplane.num_planes",
                value: num_planes as u32,
            });
        }
        let planes = (0..num_planes)
            .map(|i| {
                let p = base + l.plane_fmt + i * layout.plane_pix.size;
                PlaneFormat {
                    stride: record.u32(p + layout.plane_pix.bytesperline),
                    size: record.u32(p + layout.plane_pix.sizeimage),
                }
            })
            .collect();

        Ok(FormatPayload::Multi(FormatMplane {
            width: record.u32(base + l.width),
            height: record.u32(base + l.height),
            fourcc: FourCC::from(record.u32(base + l.pixelformat)),
            field_order: discriminant::<FieldOrder>("field", record.u32(base + l.field))?,
            planes,
            flags: Flags::from(record.u8(base + l.flags) as u32),
            colorimetry: colorimetry(
                record.u32(base + l.colorspace),
                record.u8(base + l.ycbcr_enc) as u32,
                record.u8(base + l.quantization) as u32,
                record.u8(base + l.xfer_func) as u32,
            )?,
        }))
    }
}
