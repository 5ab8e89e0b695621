pub trait FloatExt: Copy {
    /// True if the values differ by strictly less than `tolerance`.
    fn close_to(self, other: Self, tolerance: Self) -> bool;

    fn approximately_eq(self, other: Self) -> bool;
}

impl FloatExt for f64 {
    fn close_to(self, other: Self, tolerance: Self) -> bool {
        (self - other).abs() < tolerance
    }

    fn approximately_eq(self, other: Self) -> bool {
        self.close_to(other, crate::EPSILON)
    }
}
