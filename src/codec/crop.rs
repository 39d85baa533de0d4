use crate::codec::{discriminant, Message};
use crate::crop::{Crop, CropCapability, Rect};
use crate::error::Result;
use crate::fraction::Fraction;
use crate::v4l2::layout::Layout;
use crate::v4l2::record::Record;

fn put_rect(layout: &Layout, record: &mut Record, base: usize, rect: &Rect) {
    let l = &layout.rect;
    record.put_i32(base + l.left, rect.left);
    record.put_i32(base + l.top, rect.top);
    record.put_u32(base + l.width, rect.width);
    record.put_u32(base + l.height, rect.height);
}

fn rect(layout: &Layout, record: &Record, base: usize) -> Rect {
    let l = &layout.rect;
    Rect {
        left: record.i32(base + l.left),
        top: record.i32(base + l.top),
        width: record.u32(base + l.width),
        height: record.u32(base + l.height),
    }
}

/// `struct v4l2_cropcap`
impl Message for CropCapability {
    type Context = ();

    fn size(layout: &Layout) -> usize {
        layout.cropcap.size
    }

    fn encode(&self, layout: &Layout, _ctx: (), record: &mut Record) -> Result<()> {
        let l = &layout.cropcap;
        record.put_u32(l.type_, self.typ as u32);
        put_rect(layout, record, l.bounds, &self.bounds);
        put_rect(layout, record, l.defrect, &self.defrect);
        record.put_u32(l.pixelaspect, self.pixel_aspect.numerator);
        record.put_u32(l.pixelaspect + 4, self.pixel_aspect.denominator);
        Ok(())
    }

    fn decode(layout: &Layout, _ctx: (), record: &Record) -> Result<Self> {
        let l = &layout.cropcap;
        Ok(CropCapability {
            typ: discriminant("v4l2_cropcap.type", record.u32(l.type_))?,
            bounds: rect(layout, record, l.bounds),
            defrect: rect(layout, record, l.defrect),
            pixel_aspect: Fraction::new(
                record.u32(l.pixelaspect),
                record.u32(l.pixelaspect + 4),
            ),
        })
    }
}

/// `struct v4l2_crop`
impl Message for Crop {
    type Context = ();

    fn size(layout: &Layout) -> usize {
        layout.crop.size
    }

    fn encode(&self, layout: &Layout, _ctx: (), record: &mut Record) -> Result<()> {
        record.put_u32(layout.crop.type_, self.typ as u32);
        put_rect(layout, record, layout.crop.c, &self.rect);
        Ok(())
    }

    fn decode(layout: &Layout, _ctx: (), record: &Record) -> Result<Self> {
        Ok(Crop {
            typ: discriminant("v4l2_crop.type", record.u32(layout.crop.type_))?,
            rect: rect(layout, record, layout.crop.c),
        })
    }
}
