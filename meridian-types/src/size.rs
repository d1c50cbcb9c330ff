use num_traits::{FromPrimitive, NumCast};
use serde::{Deserialize, Serialize};

/// Width and height of a rectangular area, e.g. of an image in pixels.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Size<Num: num_traits::Num + PartialOrd + Copy + PartialEq = f64> {
    width: Num,
    height: Num,
}

impl<Num: num_traits::Num + FromPrimitive + PartialOrd + Copy + NumCast> Size<Num> {
    /// Creates a new size.
    pub fn new(width: Num, height: Num) -> Self {
        Self { width, height }
    }

    /// Width.
    pub fn width(&self) -> Num {
        self.width
    }

    /// Height.
    pub fn height(&self) -> Num {
        self.height
    }

    /// Returns true if either of the dimensions is zero.
    pub fn is_zero(&self) -> bool {
        self.width.is_zero() || self.height.is_zero()
    }

    /// Converts the size into another numeric type, returning `None` if a dimension cannot be represented.
    pub fn cast<T: num_traits::Num + FromPrimitive + PartialOrd + Copy + NumCast>(
        &self,
    ) -> Option<Size<T>> {
        Some(Size {
            width: NumCast::from(self.width)?,
            height: NumCast::from(self.height)?,
        })
    }
}
