// FLAG macro in harfbuzz.
#[inline]
pub(crate) const fn rb_flag(x: u32) -> u32 {
    1 << x
}

// FLAG_UNSAFE macro in harfbuzz.
#[inline]
pub(crate) fn rb_flag_unsafe(x: u32) -> u32 {
    if x < 32 {
        1 << x
    } else {
        0
    }
}

// hb_unsigned_mul_overflows in harfbuzz.
//
// Returns the product when it fits into `usize`.
#[inline]
pub(crate) fn rb_unsigned_mul(count: usize, size: usize) -> Option<usize> {
    count.checked_mul(size)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags() {
        assert_eq!(rb_flag(3), 0b1000);
        assert_eq!(rb_flag_unsafe(5), 0b10_0000);
        assert_eq!(rb_flag_unsafe(40), 0);
    }

    #[test]
    fn mul_overflow() {
        assert_eq!(rb_unsigned_mul(3, 20), Some(60));
        assert_eq!(rb_unsigned_mul(usize::MAX, 20), None);
    }
}
