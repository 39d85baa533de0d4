use crate::capability::{Capabilities, Flags};
use crate::codec::Message;
use crate::error::Result;
use crate::v4l2::layout::Layout;
use crate::v4l2::record::Record;

impl Message for Capabilities {
    type Context = ();

    fn size(layout: &Layout) -> usize {
        layout.capability.size
    }

    fn encode(&self, layout: &Layout, _ctx: (), record: &mut Record) -> Result<()> {
        let l = &layout.capability;
        record.put_string(l.driver, 16, &self.driver);
        record.put_string(l.card, 32, &self.card);
        record.put_string(l.bus_info, 32, &self.bus);
        record.put_u32(l.version, self.version);
        record.put_u32(l.capabilities, self.capabilities.into());
        record.put_u32(l.device_caps, self.device_caps.into());
        Ok(())
    }

    fn decode(layout: &Layout, _ctx: (), record: &Record) -> Result<Self> {
        let l = &layout.capability;
        Ok(Capabilities {
            driver: record.string(l.driver, 16),
            card: record.string(l.card, 32),
            bus: record.string(l.bus_info, 32),
            version: record.u32(l.version),
            capabilities: Flags::from(record.u32(l.capabilities)),
            device_caps: Flags::from(record.u32(l.device_caps)),
        })
    }
}
