
v4l2_enum! {
    /// Represents how fields are interlaced (if they are)
    FieldOrder {
        /// Driver picks progressive, top, bottom or interlaced
        Any = 0 => "any",
        Progressive = 1 => "progressive",
        /// top, or odd, field
        Top = 2 => "top",
        /// bottom, or even, field
        Bottom = 3 => "bottom",
        Interlaced = 4 => "interlaced",
        SequentialTB = 5 => "sequential, top then bottom",
        SequentialBT = 6 => "sequential, bottom then top",
        /// one field at a time, alternates between top and bottom
        Alternate = 7 => "alternate between fields",
        InterlacedTB = 8 => "interlaced, starting with top",
        InterlacedBT = 9 => "interlaced, starting with bottom",
    }
}

impl FieldOrder {
    /// Whether a buffer of this order holds a single field rather than a frame
    pub fn is_single_field(self) -> bool {
        matches!(self, FieldOrder::Top | FieldOrder::Bottom | FieldOrder::Alternate)
    }
}

impl Default for FieldOrder {
    fn default() -> Self {
        FieldOrder::Any
    }
}
