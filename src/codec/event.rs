use crate::codec::Message;
use crate::control;
use crate::error::Result;
use crate::event::{
    CtrlChanges, CtrlEvent, Event, Payload, SourceChanges, Subscription, SubscriptionFlags, Type,
};
use crate::timestamp::Timestamp;
use crate::v4l2::layout::Layout;
use crate::v4l2::record::Record;

/// Size of the event payload union
const PAYLOAD: usize = 64;

/// `struct v4l2_event_subscription`
impl Message for Subscription {
    type Context = ();

    fn size(layout: &Layout) -> usize {
        layout.event_subscription.size
    }

    fn encode(&self, layout: &Layout, _ctx: (), record: &mut Record) -> Result<()> {
        let l = &layout.event_subscription;
        record.put_u32(l.type_, self.typ.into());
        record.put_u32(l.id, self.id);
        record.put_u32(l.flags, self.flags.into());
        Ok(())
    }

    fn decode(layout: &Layout, _ctx: (), record: &Record) -> Result<Self> {
        let l = &layout.event_subscription;
        Ok(Subscription {
            typ: Type::from(record.u32(l.type_)),
            id: record.u32(l.id),
            flags: SubscriptionFlags::from(record.u32(l.flags)),
        })
    }
}

/// `struct v4l2_event`
///
/// The event type is part of the response itself. For control events the value member is read
/// as 64 bits only when the embedded control type says so.
impl Message for Event {
    type Context = ();

    fn size(layout: &Layout) -> usize {
        layout.event.size
    }

    fn encode(&self, layout: &Layout, _ctx: (), record: &mut Record) -> Result<()> {
        let l = &layout.event;
        let u = l.u;
        record.put_u32(l.type_, self.typ.into());
        match &self.payload {
            Payload::Vsync { field } => record.put_u8(u, *field),
            Payload::Ctrl(ctrl) => {
                let c = &layout.event_ctrl;
                record.put_u32(u + c.changes, ctrl.changes.bits());
                record.put_u32(u + c.type_, ctrl.typ.into());
                if ctrl.typ == control::Type::Integer64 {
                    record.put_i64(u + c.value, ctrl.value);
                } else {
                    record.put_i32(u + c.value, ctrl.value as i32);
                }
                record.put_u32(u + c.flags, ctrl.flags.into());
                record.put_i32(u + c.minimum, ctrl.minimum);
                record.put_i32(u + c.maximum, ctrl.maximum);
                record.put_i32(u + c.step, ctrl.step);
                record.put_i32(u + c.default_value, ctrl.default);
            }
            Payload::FrameSync { frame_sequence } => record.put_u32(u, *frame_sequence),
            Payload::SourceChange { changes } => record.put_u32(u, changes.bits()),
            Payload::MotionDet {
                flags,
                frame_sequence,
                region_mask,
            } => {
                record.put_u32(u, *flags);
                record.put_u32(u + 4, *frame_sequence);
                record.put_u32(u + 8, *region_mask);
            }
            Payload::Raw(bytes) => {
                let n = bytes.len().min(PAYLOAD);
                record.put_bytes(u, &bytes[..n]);
            }
        }
        record.put_u32(l.pending, self.pending);
        record.put_u32(l.sequence, self.sequence);
        record.put_time(
            l.timestamp,
            layout.time_width(),
            (self.timestamp.sec, self.timestamp.usec * 1000),
        );
        record.put_u32(l.id, self.id);
        Ok(())
    }

    fn decode(layout: &Layout, _ctx: (), record: &Record) -> Result<Self> {
        let l = &layout.event;
        let u = l.u;
        let typ = Type::from(record.u32(l.type_));
        let payload = match typ {
            Type::Vsync => Payload::Vsync {
                field: record.u8(u),
            },
            Type::Ctrl => {
                let c = &layout.event_ctrl;
                let ctrl_type = control::Type::from(record.u32(u + c.type_));
                Payload::Ctrl(CtrlEvent {
                    changes: CtrlChanges::from_bits_retain(record.u32(u + c.changes)),
                    typ: ctrl_type,
                    value: if ctrl_type == control::Type::Integer64 {
                        record.i64(u + c.value)
                    } else {
                        i64::from(record.i32(u + c.value))
                    },
                    flags: control::Flags::from(record.u32(u + c.flags)),
                    minimum: record.i32(u + c.minimum),
                    maximum: record.i32(u + c.maximum),
                    step: record.i32(u + c.step),
                    default: record.i32(u + c.default_value),
                })
            }
            Type::FrameSync => Payload::FrameSync {
                frame_sequence: record.u32(u),
            },
            Type::SourceChange => Payload::SourceChange {
                changes: SourceChanges::from_bits_retain(record.u32(u)),
            },
            Type::MotionDet => Payload::MotionDet {
                flags: record.u32(u),
                frame_sequence: record.u32(u + 4),
                region_mask: record.u32(u + 8),
            },
            _ => Payload::Raw(record.bytes(u, PAYLOAD).to_vec()),
        };

        let (sec, nsec) = record.time(l.timestamp, layout.time_width());
        Ok(Event {
            typ,
            payload,
            pending: record.u32(l.pending),
            sequence: record.u32(l.sequence),
            timestamp: Timestamp::new(sec, nsec / 1000),
            id: record.u32(l.id),
        })
    }
}
