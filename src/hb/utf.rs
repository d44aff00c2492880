use super::common::hb_codepoint_t;

/// A text encoding the buffer can ingest.
///
/// `next` decodes the codepoint starting at `text[0]`, `prev` the one ending
/// at `text[text.len() - 1]`. Both return the codepoint and how many code
/// units it took. Ill-formed input decodes to `replacement` and always
/// consumes at least one unit, so decoding never stalls.
pub trait hb_utf_t {
    type CodeUnit: Copy + Default + PartialEq;

    fn next(text: &[Self::CodeUnit], replacement: hb_codepoint_t) -> (hb_codepoint_t, usize);

    fn prev(text: &[Self::CodeUnit], replacement: hb_codepoint_t) -> (hb_codepoint_t, usize);

    /// Length up to the first zero unit.
    fn strlen(text: &[Self::CodeUnit]) -> usize {
        let zero = Self::CodeUnit::default();
        text.iter().position(|&c| c == zero).unwrap_or(text.len())
    }
}

pub struct hb_utf8_t;

impl hb_utf_t for hb_utf8_t {
    type CodeUnit = u8;

    // Replaces each maximal subpart of an ill-formed sequence with a single
    // `replacement`, the way Unicode chapter 3 recommends.
    fn next(text: &[u8], replacement: hb_codepoint_t) -> (hb_codepoint_t, usize) {
        let c = text[0];
        if c < 0x80 {
            return (u32::from(c), 1);
        }

        // Trailing byte count and the valid range of the first trailing byte.
        let (need, lo, hi) = match c {
            0xC2..=0xDF => (1, 0x80, 0xBF),
            0xE0 => (2, 0xA0, 0xBF),
            0xE1..=0xEC | 0xEE..=0xEF => (2, 0x80, 0xBF),
            0xED => (2, 0x80, 0x9F),
            0xF0 => (3, 0x90, 0xBF),
            0xF1..=0xF3 => (3, 0x80, 0xBF),
            0xF4 => (3, 0x80, 0x8F),
            _ => return (replacement, 1),
        };

        let mut u = u32::from(c) & (0x3F >> need);
        for i in 1..=need {
            let (lo, hi) = if i == 1 { (lo, hi) } else { (0x80, 0xBF) };
            match text.get(i) {
                Some(&t) if (lo..=hi).contains(&t) => u = (u << 6) | u32::from(t & 0x3F),
                _ => return (replacement, i),
            }
        }

        (u, need + 1)
    }

    fn prev(text: &[u8], replacement: hb_codepoint_t) -> (hb_codepoint_t, usize) {
        let end = text.len();
        let mut start = end - 1;
        while start > 0 && (text[start] & 0xC0) == 0x80 && end - start < 4 {
            start -= 1;
        }

        let (u, n) = Self::next(&text[start..], replacement);
        if start + n == end {
            (u, n)
        } else {
            (replacement, 1)
        }
    }
}

pub struct hb_utf16_t;

impl hb_utf16_t {
    #[inline]
    fn combine(high: u32, low: u32) -> hb_codepoint_t {
        (high << 10) + low - ((0xD800 << 10) - 0x10000 + 0xDC00)
    }
}

impl hb_utf_t for hb_utf16_t {
    type CodeUnit = u16;

    fn next(text: &[u16], replacement: hb_codepoint_t) -> (hb_codepoint_t, usize) {
        let c = u32::from(text[0]);
        if !(0xD800..=0xDFFF).contains(&c) {
            return (c, 1);
        }

        if c <= 0xDBFF {
            if let Some(&l) = text.get(1) {
                let l = u32::from(l);
                if (0xDC00..=0xDFFF).contains(&l) {
                    return (Self::combine(c, l), 2);
                }
            }
        }

        // Lonely / out-of-order surrogate.
        (replacement, 1)
    }

    fn prev(text: &[u16], replacement: hb_codepoint_t) -> (hb_codepoint_t, usize) {
        let end = text.len();
        let c = u32::from(text[end - 1]);
        if !(0xD800..=0xDFFF).contains(&c) {
            return (c, 1);
        }

        if c >= 0xDC00 && end >= 2 {
            let h = u32::from(text[end - 2]);
            if (0xD800..=0xDBFF).contains(&h) {
                return (Self::combine(h, c), 2);
            }
        }

        (replacement, 1)
    }
}

pub struct hb_utf32_t;

impl hb_utf32_t {
    #[inline]
    fn validate(c: u32, replacement: hb_codepoint_t) -> hb_codepoint_t {
        if c > 0x10FFFF || (0xD800..=0xDFFF).contains(&c) {
            replacement
        } else {
            c
        }
    }
}

impl hb_utf_t for hb_utf32_t {
    type CodeUnit = u32;

    fn next(text: &[u32], replacement: hb_codepoint_t) -> (hb_codepoint_t, usize) {
        (Self::validate(text[0], replacement), 1)
    }

    fn prev(text: &[u32], replacement: hb_codepoint_t) -> (hb_codepoint_t, usize) {
        (Self::validate(text[text.len() - 1], replacement), 1)
    }
}

// Raw codepoints, passed through untouched.
pub struct hb_utf32_novalidate_t;

impl hb_utf_t for hb_utf32_novalidate_t {
    type CodeUnit = u32;

    fn next(text: &[u32], _: hb_codepoint_t) -> (hb_codepoint_t, usize) {
        (text[0], 1)
    }

    fn prev(text: &[u32], _: hb_codepoint_t) -> (hb_codepoint_t, usize) {
        (text[text.len() - 1], 1)
    }
}

pub struct hb_latin1_t;

impl hb_utf_t for hb_latin1_t {
    type CodeUnit = u8;

    fn next(text: &[u8], _: hb_codepoint_t) -> (hb_codepoint_t, usize) {
        (u32::from(text[0]), 1)
    }

    fn prev(text: &[u8], _: hb_codepoint_t) -> (hb_codepoint_t, usize) {
        (u32::from(text[text.len() - 1]), 1)
    }
}
