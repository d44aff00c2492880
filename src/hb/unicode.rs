use alloc::sync::Arc;
use core::fmt;

use unicode_properties::UnicodeGeneralCategory;
pub use unicode_properties::GeneralCategory;
use unicode_script::UnicodeScript;

use super::algs::{rb_flag, rb_flag_unsafe};
use super::buffer::hb_glyph_info_t;
use super::common::hb_codepoint_t;
use super::{hb_tag_t, script, Script};

/// Unicode character properties consumed by the buffer.
///
/// The buffer only asks for scripts (when guessing segment properties) and
/// for the properties stored by [`hb_buffer_t::set_unicode_props`]. Shaping
/// clients that carry their own, possibly newer, tables implement this trait
/// and install it with [`hb_buffer_t::set_unicode_funcs`].
///
/// [`hb_buffer_t::set_unicode_props`]: super::buffer::hb_buffer_t::set_unicode_props
/// [`hb_buffer_t::set_unicode_funcs`]: super::buffer::hb_buffer_t::set_unicode_funcs
pub trait UnicodeFuncs: Send + Sync {
    /// The general category of `u`. Non-characters map to `Unassigned`.
    fn general_category(&self, u: hb_codepoint_t) -> GeneralCategory;

    /// The canonical combining class of `u`.
    fn combining_class(&self, u: hb_codepoint_t) -> u8;

    /// The Bidi_Mirroring_Glyph of `u`, or `u` itself.
    fn mirroring(&self, u: hb_codepoint_t) -> hb_codepoint_t;

    /// The script `u` belongs to.
    fn script(&self, u: hb_codepoint_t) -> Script;

    /// Checks that `u` is Default_Ignorable, minus the few characters that
    /// fonts are expected to render with a visible glyph.
    fn is_default_ignorable(&self, u: hb_codepoint_t) -> bool {
        is_default_ignorable(u)
    }

    /// The combining class used for mark reordering: the canonical one with
    /// a few script-specific adjustments.
    fn modified_combining_class(&self, u: hb_codepoint_t) -> u8 {
        match u {
            // Reorder SAKOT to ensure it comes after any tone marks.
            0x1A60 => 254,
            // Reorder PADMA to ensure it comes after any vowel marks.
            0x0FC6 => 254,
            // Reorder TSA -PHRU to reorder before U+0F74.
            0x0F39 => 127,
            _ => modified_combining_class(self.combining_class(u)),
        }
    }
}

/// Unicode properties backed by the `unicode-*` crates.
#[derive(Clone, Copy, Default, Debug)]
pub struct hb_unicode_funcs_default;

impl UnicodeFuncs for hb_unicode_funcs_default {
    fn general_category(&self, u: hb_codepoint_t) -> GeneralCategory {
        match char::from_u32(u) {
            Some(c) => c.general_category(),
            None if (0xD800..=0xDFFF).contains(&u) => GeneralCategory::Surrogate,
            None => GeneralCategory::Unassigned,
        }
    }

    fn combining_class(&self, u: hb_codepoint_t) -> u8 {
        char::from_u32(u).map_or(0, |c| unicode_ccc::get_canonical_combining_class(c) as u8)
    }

    fn mirroring(&self, u: hb_codepoint_t) -> hb_codepoint_t {
        char::from_u32(u)
            .and_then(unicode_bidi_mirroring::get_mirrored)
            .map_or(u, u32::from)
    }

    fn script(&self, u: hb_codepoint_t) -> Script {
        let Some(c) = char::from_u32(u) else {
            return script::UNKNOWN;
        };

        let tag = hb_tag_t::from_bytes_lossy(c.script().short_name().as_bytes());
        Script::from_iso15924_tag(tag).unwrap_or(script::UNKNOWN)
    }
}

/// A shareable handle to a Unicode-functions object.
#[derive(Clone)]
pub struct hb_unicode_funcs_t(pub(crate) Arc<dyn UnicodeFuncs>);

impl hb_unicode_funcs_t {
    /// Wraps a custom implementation.
    pub fn new(funcs: impl UnicodeFuncs + 'static) -> Self {
        hb_unicode_funcs_t(Arc::new(funcs))
    }
}

impl Default for hb_unicode_funcs_t {
    fn default() -> Self {
        Self::new(hb_unicode_funcs_default)
    }
}

impl core::ops::Deref for hb_unicode_funcs_t {
    type Target = dyn UnicodeFuncs;

    #[inline]
    fn deref(&self) -> &Self::Target {
        &*self.0
    }
}

impl fmt::Debug for hb_unicode_funcs_t {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("hb_unicode_funcs_t")
    }
}

// Default_Ignorable codepoints:
//
// Note: While U+115F, U+1160, U+3164 and U+FFA0 are Default_Ignorable,
// we do NOT want to hide them, as the way Uniscribe has implemented them
// is with regular spacing glyphs, and that's the way fonts are made to work.
// As such, we make exceptions for those four.
// Also ignoring U+1BCA0..1BCA3. https://github.com/harfbuzz/harfbuzz/issues/503
pub(crate) fn is_default_ignorable(ch: hb_codepoint_t) -> bool {
    let plane = ch >> 16;
    if plane == 0 {
        // BMP
        let page = ch >> 8;
        match page {
            0x00 => ch == 0x00AD,
            0x03 => ch == 0x034F,
            0x06 => ch == 0x061C,
            0x17 => (0x17B4..=0x17B5).contains(&ch),
            0x18 => (0x180B..=0x180F).contains(&ch),
            0x20 => {
                (0x200B..=0x200F).contains(&ch)
                    || (0x202A..=0x202E).contains(&ch)
                    || (0x2060..=0x206F).contains(&ch)
            }
            0xFE => (0xFE00..=0xFE0F).contains(&ch) || ch == 0xFEFF,
            0xFF => (0xFFF0..=0xFFF8).contains(&ch),
            _ => false,
        }
    } else {
        // Other planes
        match plane {
            0x01 => (0x1D173..=0x1D17A).contains(&ch),
            0x0E => (0xE0000..=0xE0FFF).contains(&ch),
            _ => false,
        }
    }
}

/// Remaps canonical combining classes for mark reordering.
pub(crate) fn modified_combining_class(ccc: u8) -> u8 {
    match ccc {
        // Hebrew
        //
        // The "fixed-position" classes 10-26 are permuted into the order
        // described in the SBL Hebrew manual.
        10 => 22, // sheva
        11 => 15, // hataf segol
        12 => 16, // hataf patah
        13 => 17, // hataf qamats
        14 => 23, // hiriq
        15 => 18, // tsere
        16 => 19, // segol
        17 => 20, // patah
        18 => 21, // qamats
        19 => 14, // holam
        20 => 24, // qubuts
        21 => 12, // dagesh
        22 => 25, // meteg
        23 => 13, // rafe
        24 => 10, // shin dot
        25 => 11, // sin dot

        // Arabic
        //
        // Shadda (ccc=33) moves before the other marks.
        27..=32 => ccc + 1,
        33 => 27, // shadda

        // Telugu
        //
        // Length marks are the only matras of the main Indic ranges with a
        // non-zero ccc, which makes them reorder with the halant.
        84 | 91 => 0,

        // Thai
        //
        // U+0E38 and U+0E39 (ccc=103) go before U+0E3A (ccc=9).
        103 => 3,

        // Tibetan
        //
        // Vowel sign u goes first (but after achung).
        130 => 132, // sign i
        132 => 131, // sign u

        _ => ccc,
    }
}

#[inline]
pub(crate) fn is_regional_indicator(u: hb_codepoint_t) -> bool {
    (0x1F1E6..=0x1F1FF).contains(&u)
}

/// General category in harfbuzz numbering, which is what ends up in the
/// low five bits of the unicode props.
pub trait GeneralCategoryExt {
    /// Converts to the harfbuzz enumeration value.
    fn to_rb(&self) -> u32;
    /// Converts from the harfbuzz enumeration value.
    fn from_rb(gc: u32) -> Self;
    /// Mn, Mc or Me.
    fn is_mark(&self) -> bool;
}

impl GeneralCategoryExt for GeneralCategory {
    fn to_rb(&self) -> u32 {
        match *self {
            GeneralCategory::Control => 0,
            GeneralCategory::Format => 1,
            GeneralCategory::Unassigned => 2,
            GeneralCategory::PrivateUse => 3,
            GeneralCategory::Surrogate => 4,
            GeneralCategory::LowercaseLetter => 5,
            GeneralCategory::ModifierLetter => 6,
            GeneralCategory::OtherLetter => 7,
            GeneralCategory::TitlecaseLetter => 8,
            GeneralCategory::UppercaseLetter => 9,
            GeneralCategory::SpacingMark => 10,
            GeneralCategory::EnclosingMark => 11,
            GeneralCategory::NonspacingMark => 12,
            GeneralCategory::DecimalNumber => 13,
            GeneralCategory::LetterNumber => 14,
            GeneralCategory::OtherNumber => 15,
            GeneralCategory::ConnectorPunctuation => 16,
            GeneralCategory::DashPunctuation => 17,
            GeneralCategory::ClosePunctuation => 18,
            GeneralCategory::FinalPunctuation => 19,
            GeneralCategory::InitialPunctuation => 20,
            GeneralCategory::OtherPunctuation => 21,
            GeneralCategory::OpenPunctuation => 22,
            GeneralCategory::CurrencySymbol => 23,
            GeneralCategory::ModifierSymbol => 24,
            GeneralCategory::MathSymbol => 25,
            GeneralCategory::OtherSymbol => 26,
            GeneralCategory::LineSeparator => 27,
            GeneralCategory::ParagraphSeparator => 28,
            GeneralCategory::SpaceSeparator => 29,
        }
    }

    fn from_rb(gc: u32) -> Self {
        match gc {
            0 => GeneralCategory::Control,
            1 => GeneralCategory::Format,
            2 => GeneralCategory::Unassigned,
            3 => GeneralCategory::PrivateUse,
            4 => GeneralCategory::Surrogate,
            5 => GeneralCategory::LowercaseLetter,
            6 => GeneralCategory::ModifierLetter,
            7 => GeneralCategory::OtherLetter,
            8 => GeneralCategory::TitlecaseLetter,
            9 => GeneralCategory::UppercaseLetter,
            10 => GeneralCategory::SpacingMark,
            11 => GeneralCategory::EnclosingMark,
            12 => GeneralCategory::NonspacingMark,
            13 => GeneralCategory::DecimalNumber,
            14 => GeneralCategory::LetterNumber,
            15 => GeneralCategory::OtherNumber,
            16 => GeneralCategory::ConnectorPunctuation,
            17 => GeneralCategory::DashPunctuation,
            18 => GeneralCategory::ClosePunctuation,
            19 => GeneralCategory::FinalPunctuation,
            20 => GeneralCategory::InitialPunctuation,
            21 => GeneralCategory::OtherPunctuation,
            22 => GeneralCategory::OpenPunctuation,
            23 => GeneralCategory::CurrencySymbol,
            24 => GeneralCategory::ModifierSymbol,
            25 => GeneralCategory::MathSymbol,
            26 => GeneralCategory::OtherSymbol,
            27 => GeneralCategory::LineSeparator,
            28 => GeneralCategory::ParagraphSeparator,
            29 => GeneralCategory::SpaceSeparator,
            _ => GeneralCategory::Unassigned,
        }
    }

    #[inline]
    fn is_mark(&self) -> bool {
        matches!(
            *self,
            GeneralCategory::SpacingMark
                | GeneralCategory::EnclosingMark
                | GeneralCategory::NonspacingMark
        )
    }
}

// Categories that always start a new grapheme.
const GRAPHEME_BASE_CATEGORIES: u32 = rb_flag(5) // LowercaseLetter
    | rb_flag(9) // UppercaseLetter
    | rb_flag(8) // TitlecaseLetter
    | rb_flag(7) // OtherLetter
    | rb_flag(29); // SpaceSeparator

pub(crate) fn is_grapheme_base_category(gc: GeneralCategory) -> bool {
    rb_flag_unsafe(gc.to_rb()) & GRAPHEME_BASE_CATEGORIES != 0
}

bitflags::bitflags! {
    /// Layout of the unicode props stored in `var2`.
    ///
    /// The high byte holds the modified combining class for marks.
    #[derive(Default, Clone, Copy, Debug, PartialEq, Eq)]
    pub struct UnicodeProps: u16 {
        /// General category, numbered as in [`GeneralCategoryExt::to_rb`].
        const GENERAL_CATEGORY  = 0x001F;
        /// Default ignorable.
        const IGNORABLE         = 0x0020;
        /// Hidden from shaping lookups only.
        // MONGOLIAN FREE VARIATION SELECTOR 1..4, or TAG characters
        const HIDDEN            = 0x0040;
        /// Continues the grapheme of the previous item.
        const CONTINUATION      = 0x0080;

        // If GEN_CAT=FORMAT, top byte masks:
        /// ZERO WIDTH JOINER.
        const CF_ZWJ            = 0x0100;
        /// ZERO WIDTH NON-JOINER.
        const CF_ZWNJ           = 0x0200;
    }
}

impl hb_glyph_info_t {
    #[inline]
    pub(crate) fn unicode_props(&self) -> u16 {
        let v: &[u16; 2] = bytemuck::cast_ref(&self.var2);
        v[0]
    }

    #[inline]
    pub(crate) fn set_unicode_props(&mut self, n: u16) {
        let v: &mut [u16; 2] = bytemuck::cast_mut(&mut self.var2);
        v[0] = n;
    }

    /// The general category recorded by `set_unicode_props`.
    #[inline]
    pub fn general_category(&self) -> GeneralCategory {
        let n = self.unicode_props() & UnicodeProps::GENERAL_CATEGORY.bits();
        GeneralCategory::from_rb(u32::from(n))
    }

    /// The combining class recorded for marks, zero otherwise.
    #[inline]
    pub fn modified_combining_class(&self) -> u8 {
        if self.general_category().is_mark() {
            (self.unicode_props() >> 8) as u8
        } else {
            0
        }
    }

    /// Checks that the glyph continues the grapheme of the previous one.
    #[inline]
    pub fn is_continuation(&self) -> bool {
        self.unicode_props() & UnicodeProps::CONTINUATION.bits() != 0
    }

    #[inline]
    pub(crate) fn set_continuation(&mut self) {
        let n = self.unicode_props() | UnicodeProps::CONTINUATION.bits();
        self.set_unicode_props(n);
    }

    /// Checks that the glyph is a default-ignorable character.
    #[inline]
    pub fn is_default_ignorable(&self) -> bool {
        self.unicode_props() & UnicodeProps::IGNORABLE.bits() != 0
    }

    /// Checks that the glyph is ZERO WIDTH JOINER.
    #[inline]
    pub fn is_zwj(&self) -> bool {
        self.general_category() == GeneralCategory::Format
            && (self.unicode_props() & UnicodeProps::CF_ZWJ.bits() != 0)
    }

    /// Checks that the glyph is ZERO WIDTH NON-JOINER.
    #[inline]
    pub fn is_zwnj(&self) -> bool {
        self.general_category() == GeneralCategory::Format
            && (self.unicode_props() & UnicodeProps::CF_ZWNJ.bits() != 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_funcs() {
        let funcs = hb_unicode_funcs_default;
        assert_eq!(funcs.script(0x0041), script::LATIN);
        assert_eq!(funcs.script(0x0301), script::INHERITED);
        assert_eq!(funcs.script(0x0020), script::COMMON);
        assert_eq!(funcs.script(0x05D0), script::HEBREW);
        assert_eq!(funcs.script(0xD800), script::UNKNOWN);

        assert_eq!(funcs.general_category(0x0301), GeneralCategory::NonspacingMark);
        assert_eq!(funcs.general_category(0xDC00), GeneralCategory::Surrogate);
        assert_eq!(funcs.combining_class(0x0301), 230);
        assert_eq!(funcs.combining_class(0x0041), 0);
        assert_eq!(funcs.mirroring(u32::from('(')), u32::from(')'));
        assert_eq!(funcs.mirroring(0x0041), 0x0041);
    }

    #[test]
    fn default_ignorables() {
        assert!(is_default_ignorable(0x200D));
        assert!(is_default_ignorable(0x00AD));
        assert!(is_default_ignorable(0xE0041));
        assert!(!is_default_ignorable(0x3164));
        assert!(!is_default_ignorable(0x0041));
        assert!(is_default_ignorable(0x180F));
        assert!(!is_default_ignorable(0x1810));
    }

    #[test]
    fn modified_combining_classes() {
        let funcs = hb_unicode_funcs_default;
        assert_eq!(funcs.modified_combining_class(0x0651), 27); // shadda
        assert_eq!(funcs.modified_combining_class(0x064E), 31); // fatha
        assert_eq!(funcs.modified_combining_class(0x0E38), 3);
        assert_eq!(funcs.modified_combining_class(0x05B0), 22); // sheva
        assert_eq!(funcs.modified_combining_class(0x0C55), 0);
        assert_eq!(funcs.modified_combining_class(0x0F72), 132);
        assert_eq!(funcs.modified_combining_class(0x0F74), 131);
        assert_eq!(funcs.modified_combining_class(0x1A60), 254);
        assert_eq!(funcs.modified_combining_class(0x0301), 230);
    }

    #[test]
    fn general_category_round_trips_through_harfbuzz_numbering() {
        for gc in 0..30 {
            assert_eq!(GeneralCategory::from_rb(gc).to_rb(), gc);
        }
    }
}
