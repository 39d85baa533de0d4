use std::fmt;

/// Rational number as exchanged with the driver
///
/// Stream parameters use it for the time per frame, cropping for the pixel aspect.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Fraction {
    pub numerator: u32,
    pub denominator: u32,
}

impl Fraction {
    /// # Example
    ///
    /// ```
    /// use v4l2_mmap::Fraction;
    /// let frame_interval = Fraction::new(1, 30);
    /// assert_eq!(frame_interval.reciprocal(), Some(Fraction::new(30, 1)));
    /// ```
    pub fn new(numerator: u32, denominator: u32) -> Self {
        Fraction {
            numerator,
            denominator,
        }
    }

    /// Frame interval producing `fps` frames per second
    pub fn from_fps(fps: u32) -> Self {
        Fraction::new(1, fps)
    }

    /// Swaps numerator and denominator, `None` for a zero numerator
    pub fn reciprocal(&self) -> Option<Fraction> {
        if self.numerator == 0 {
            return None;
        }
        Some(Fraction::new(self.denominator, self.numerator))
    }

    /// Value as a float, `None` when the denominator is zero
    ///
    /// Drivers leave both members zero when a parameter is unsupported.
    pub fn value(&self) -> Option<f64> {
        if self.denominator == 0 {
            return None;
        }
        Some(f64::from(self.numerator) / f64::from(self.denominator))
    }

    /// Frames per second when this fraction is a frame interval
    pub fn fps(&self) -> Option<f64> {
        self.reciprocal().and_then(|r| r.value())
    }
}

impl fmt::Display for Fraction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.numerator, self.denominator)
    }
}
