use alloc::boxed::Box;
use alloc::string::String;
use alloc::vec::Vec;
use core::cmp::min;
use core::fmt;
use core::ops::RangeBounds;

use smallvec::SmallVec;

use super::algs::rb_unsigned_mul;
use super::common::{hb_codepoint_t, hb_segment_properties_t, resolve_range};
use super::errors::BufferError;
use super::object::{hb_object_ext, hb_object_header_t};
use super::unicode::{
    hb_unicode_funcs_t, is_grapheme_base_category, is_regional_indicator, GeneralCategory,
    GeneralCategoryExt, UnicodeFuncs, UnicodeProps,
};
use super::utf::{hb_latin1_t, hb_utf16_t, hb_utf32_novalidate_t, hb_utf32_t, hb_utf8_t, hb_utf_t};
use super::{hb_mask_t, script, Direction, Language, Script};

const CONTEXT_LENGTH: usize = 8;

// Messages longer than this, in bytes, are truncated.
const MESSAGE_BUFFER_SIZE: usize = 100;

/// Glyph flags, stored in the low bits of [`hb_glyph_info_t::mask`].
pub mod glyph_flag {
    /// Indicates that if input text is broken at the
    /// beginning of the cluster this glyph is part of,
    /// then both sides need to be re-shaped, as the
    /// result might be different.
    ///
    /// On the flip side, it means that when
    /// this flag is not present, then it is safe
    /// to break the glyph-run at the beginning of
    /// this cluster, and the two sides will represent
    /// the exact same result one would get if breaking
    /// input text at the beginning of this cluster and
    /// shaping the two sides separately.
    ///
    /// This can be used to optimize paragraph layout,
    /// by avoiding re-shaping of each line after line-breaking.
    pub const UNSAFE_TO_BREAK: u32 = 0x00000001;
    /// Indicates that if input text is changed on one side
    /// of the beginning of the cluster this glyph is part
    /// of, then the shaping results for the other side
    /// might change.
    ///
    /// Note that the absence of this flag will NOT by
    /// itself mean that it IS safe to concat text. Only
    /// two pieces of text both of which clear of this
    /// flag can be concatenated safely.
    ///
    /// This can be used to optimize paragraph layout,
    /// by avoiding re-shaping of each line after
    /// line-breaking, by limiting the reshaping to a
    /// small piece around the breaking position only,
    /// even if the breaking position carries the
    /// UNSAFE_TO_BREAK or when hyphenation or
    /// other text transformation happens at
    /// line-break position, in the following way:
    ///
    /// 1. Iterate back from the line-break
    ///    position until the first cluster
    ///    start position that is NOT unsafe-to-concat,
    /// 2. shape the segment from there till the
    ///    end of line,
    /// 3. check whether the resulting glyph-run also
    ///    is clear of the unsafe-to-concat at its
    ///    start-of-text position; if it is, just
    ///    splice it into place and the line is shaped;
    ///    If not, move on to a position further
    ///    back that is clear of unsafe-to-concat
    ///    and retry from there, and repeat.
    ///
    /// At the start of next line a similar
    /// algorithm can be implemented.
    /// That is: 1. Iterate forward from
    /// the line-break position until the first cluster
    /// start position that is NOT unsafe-to-concat, 2.
    /// shape the segment from beginning of the line to
    /// that position, 3. check whether the resulting
    /// glyph-run also is clear of the unsafe-to-concat
    /// at its end-of-text position; if it is, just splice
    /// it into place and the beginning is shaped; If not,
    /// move on to a position further forward that is clear
    /// of unsafe-to-concat and retry up to there, and repeat.
    ///
    /// A slight complication will arise in the
    /// implementation of the algorithm above,
    /// because while
    /// our buffer API has a way to return flags
    /// for position corresponding to
    /// start-of-text, there is currently no
    /// position corresponding to end-of-text.
    /// This limitation can be alleviated by
    /// shaping more text than needed and
    /// looking for unsafe-to-concat flag
    /// within text clusters.
    ///
    /// The UNSAFE_TO_BREAK flag will always imply this flag.
    /// To use this flag, you must enable the buffer flag
    /// PRODUCE_UNSAFE_TO_CONCAT during shaping, otherwise
    /// the buffer flag will not be reliably produced.
    pub const UNSAFE_TO_CONCAT: u32 = 0x00000002;

    /// In scripts that use elongation (Arabic,
    /// Mongolian, Syriac, etc.), this flag signifies
    /// that it is safe to insert a U+0640 TATWEEL
    /// character before this cluster for elongation.
    pub const SAFE_TO_INSERT_TATWEEL: u32 = 0x00000004;

    /// All the currently defined flags.
    pub const DEFINED: u32 = 0x00000007; // OR of all defined flags
}

/// Holds the positions of the glyph in both horizontal and vertical directions.
///
/// All positions are relative to the current point.
#[repr(C)]
#[derive(Clone, Copy, Default, Debug, PartialEq, Eq)]
pub struct GlyphPosition {
    /// How much the line advances after drawing this glyph when setting text in
    /// horizontal direction.
    pub x_advance: i32,
    /// How much the line advances after drawing this glyph when setting text in
    /// vertical direction.
    pub y_advance: i32,
    /// How much the glyph moves on the X-axis before drawing it, this should
    /// not affect how much the line advances.
    pub x_offset: i32,
    /// How much the glyph moves on the Y-axis before drawing it, this should
    /// not affect how much the line advances.
    pub y_offset: i32,
    pub(crate) var: u32,
}

unsafe impl bytemuck::Zeroable for GlyphPosition {}
unsafe impl bytemuck::Pod for GlyphPosition {}

/// A glyph info.
///
/// Holds a codepoint before shaping and a glyph id after it.
#[repr(C)]
#[derive(Clone, Copy, Default, Debug, PartialEq, Eq)]
pub struct hb_glyph_info_t {
    // NOTE: Stores a Unicode codepoint before shaping and a glyph ID after.
    //       Just like harfbuzz, we are using the same variable for two purposes.
    //       Occupies u32 as a codepoint and u16 as a glyph id.
    /// A selected glyph.
    ///
    /// Guarantee to be <= `u16::MAX`.
    pub glyph_id: u32,
    /// The low bits are the [`glyph_flag`]s, the rest is free for shaping
    /// clients.
    pub mask: hb_mask_t,
    /// An index to the start of the grapheme cluster in the original string.
    pub cluster: u32,
    pub(crate) var1: u32,
    pub(crate) var2: u32,
}

unsafe impl bytemuck::Zeroable for hb_glyph_info_t {}
unsafe impl bytemuck::Pod for hb_glyph_info_t {}

impl hb_glyph_info_t {
    /// Indicates that if input text is broken at the beginning of the cluster this glyph
    /// is part of, then both sides need to be re-shaped, as the result might be different.
    #[inline]
    pub fn unsafe_to_break(&self) -> bool {
        self.mask & glyph_flag::UNSAFE_TO_BREAK != 0
    }

    /// Indicates that if input text is changed on one side of the beginning of the cluster
    /// this glyph is part of, then the shaping results for the other side might change.
    #[inline]
    pub fn unsafe_to_concat(&self) -> bool {
        self.mask & glyph_flag::UNSAFE_TO_CONCAT != 0
    }

    /// Indicates that it is safe to insert a U+0640 TATWEEL character before this cluster.
    #[inline]
    pub fn safe_to_insert_tatweel(&self) -> bool {
        self.mask & glyph_flag::SAFE_TO_INSERT_TATWEEL != 0
    }

    /// Only the [`glyph_flag`] bits of the mask.
    #[inline]
    pub fn glyph_flags(&self) -> hb_mask_t {
        self.mask & glyph_flag::DEFINED
    }

    #[inline]
    pub(crate) fn as_char(&self) -> char {
        char::from_u32(self.glyph_id).unwrap_or(char::REPLACEMENT_CHARACTER)
    }
}

/// A cluster level.
#[allow(missing_docs)]
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default)]
pub enum BufferClusterLevel {
    #[default]
    MonotoneGraphemes,
    MonotoneCharacters,
    Characters,
}

impl BufferClusterLevel {
    /// Checks that clusters stay monotone in the logical order.
    #[inline]
    pub fn is_monotone(self) -> bool {
        matches!(
            self,
            BufferClusterLevel::MonotoneGraphemes | BufferClusterLevel::MonotoneCharacters
        )
    }

    /// Checks that marks get merged into the cluster of their base.
    #[inline]
    pub fn is_graphemes(self) -> bool {
        self == BufferClusterLevel::MonotoneGraphemes
    }
}

/// What the buffer currently holds.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default)]
pub enum BufferContentType {
    /// Nothing was added yet.
    #[default]
    Invalid,
    /// Unicode codepoints waiting to be shaped.
    Unicode,
    /// Glyph ids produced by a shaper.
    Glyphs,
}

bitflags::bitflags! {
    /// Flags for buffers.
    #[derive(Default, Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct BufferFlags: u32 {
        /// Indicates that special handling of the beginning of text paragraph can be applied to this buffer. Should usually be set, unless you are passing to the buffer only part of the text without the full context.
        const BEGINNING_OF_TEXT             = 0x00000001;
        /// Indicates that special handling of the end of text paragraph can be applied to this buffer, similar to [`BufferFlags::BEGINNING_OF_TEXT`].
        const END_OF_TEXT                   = 0x00000002;
        /// Indicates that characters with `Default_Ignorable` Unicode property should use the corresponding glyph from the font, instead of hiding them (done by replacing them with the space glyph and zeroing the advance width.) This flag takes precedence over [`BufferFlags::REMOVE_DEFAULT_IGNORABLES`].
        const PRESERVE_DEFAULT_IGNORABLES   = 0x00000004;
        /// Indicates that characters with `Default_Ignorable` Unicode property should be removed from glyph string instead of hiding them (done by replacing them with the space glyph and zeroing the advance width.) [`BufferFlags::PRESERVE_DEFAULT_IGNORABLES`] takes precedence over this flag.
        const REMOVE_DEFAULT_IGNORABLES     = 0x00000008;
        /// Indicates that a dotted circle should not be inserted in the rendering of incorrect character sequences (such as `<0905 093E>`).
        const DO_NOT_INSERT_DOTTED_CIRCLE   = 0x00000010;
        /// Asks the shaper to check its own output, for example by reshaping
        /// at safe-to-break positions and comparing.
        const VERIFY                        = 0x00000020;
        /// Indicates that the [`glyph_flag::UNSAFE_TO_CONCAT`] glyph-flag should be produced by the shaper. By default it will not be produced since it incurs a cost.
        const PRODUCE_UNSAFE_TO_CONCAT      = 0x00000040;
        /// Indicates that the [`glyph_flag::SAFE_TO_INSERT_TATWEEL`] glyph-flag should be produced by the shaper. By default it will not be produced.
        const PRODUCE_SAFE_TO_INSERT_TATWEEL = 0x00000080;
    }
}

/// Buffer-wide facts collected while shaping.
pub type hb_buffer_scratch_flags_t = u32;
/// No facts recorded.
pub const HB_BUFFER_SCRATCH_FLAG_DEFAULT: u32 = 0x00000000;
/// Some item is outside of ASCII.
pub const HB_BUFFER_SCRATCH_FLAG_HAS_NON_ASCII: u32 = 0x00000001;
/// Some item is a default ignorable.
pub const HB_BUFFER_SCRATCH_FLAG_HAS_DEFAULT_IGNORABLES: u32 = 0x00000002;
/// Some space needs fallback positioning.
pub const HB_BUFFER_SCRATCH_FLAG_HAS_SPACE_FALLBACK: u32 = 0x00000004;
/// Some glyph is attached to another one.
pub const HB_BUFFER_SCRATCH_FLAG_HAS_GPOS_ATTACHMENT: u32 = 0x00000008;
/// Some item is COMBINING GRAPHEME JOINER.
pub const HB_BUFFER_SCRATCH_FLAG_HAS_CGJ: u32 = 0x00000010;
/// Some glyph carries a glyph flag.
pub const HB_BUFFER_SCRATCH_FLAG_HAS_GLYPH_FLAGS: u32 = 0x00000020;
/// Some syllable is broken.
pub const HB_BUFFER_SCRATCH_FLAG_HAS_BROKEN_SYLLABLE: u32 = 0x00000040;

/// Reserved for shaper-specific use.
pub const HB_BUFFER_SCRATCH_FLAG_SHAPER0: u32 = 0x01000000;

/// A scratch slot of the glyph infos: a byte range within `var1` (bytes
/// 0..4) and `var2` (bytes 4..8).
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct hb_buffer_var_t {
    start: u8,
    count: u8,
}

impl hb_buffer_var_t {
    /// A slot of `count` bytes starting at byte `start`.
    pub const fn new(start: u8, count: u8) -> Self {
        hb_buffer_var_t { start, count }
    }

    #[inline]
    fn bits(self) -> u8 {
        debug_assert!(self.start as usize + self.count as usize <= 8);
        let ones = ((1u16 << self.count) - 1) as u8;
        ones << self.start
    }
}

/// Where `set_unicode_props` stores its results.
pub const UNICODE_PROPS_VAR: hb_buffer_var_t = hb_buffer_var_t::new(4, 2);

/// Safety ceilings applied on `enter`.
///
/// While a shaping pass runs, the buffer refuses to grow beyond
/// `max(len * max_len_factor, max_len_min)` items and allows at most
/// `max(len * max_ops_factor, max_ops_min)` counted operations.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct BufferLimits {
    /// Growth allowed per input item.
    pub max_len_factor: usize,
    /// Lower bound of the computed length ceiling.
    pub max_len_min: usize,
    /// Operations allowed per input item.
    pub max_ops_factor: i32,
    /// Lower bound of the computed operation budget.
    pub max_ops_min: i32,
}

impl BufferLimits {
    /// Length ceiling outside of a shaping pass.
    pub const MAX_LEN_DEFAULT: usize = 0x3FFFFFFF;
    /// Operation budget outside of a shaping pass.
    pub const MAX_OPS_DEFAULT: i32 = 0x1FFFFFFF;
}

impl Default for BufferLimits {
    fn default() -> Self {
        BufferLimits {
            max_len_factor: 64,
            max_len_min: 16384,
            max_ops_factor: 1024,
            max_ops_min: 16384,
        }
    }
}

/// A callback receiving debug messages from shaping clients.
///
/// Returning `false` asks the client to skip the step the message announced.
pub type hb_buffer_message_func_t = dyn FnMut(&hb_buffer_t, &str) -> bool + Send + Sync;

/// A buffer of Unicode text or glyphs, plus the state a shaper keeps
/// while rewriting it.
pub struct hb_buffer_t {
    header: hb_object_header_t,

    // Information about how the text in the buffer should be treated.
    unicode: hb_unicode_funcs_t,
    flags: BufferFlags,
    cluster_level: BufferClusterLevel,
    replacement: hb_codepoint_t,
    invisible: hb_codepoint_t,
    not_found: hb_codepoint_t,

    // Buffer contents.
    content_type: BufferContentType,
    props: hb_segment_properties_t,

    /// Allocations successful.
    successful: bool,
    last_error: Option<BufferError>,
    /// Whether we have an output buffer going on.
    pub(crate) have_output: bool,
    /// Whether the output lives in the position storage.
    pub(crate) have_separate_output: bool,
    /// Whether we have positions
    pub(crate) have_positions: bool,

    pub(crate) idx: usize,
    pub(crate) len: usize,
    pub(crate) out_len: usize,

    // `info` and `pos` always have the same length, the allocated size.
    pub(crate) info: Vec<hb_glyph_info_t>,
    pub(crate) pos: Vec<GlyphPosition>,

    // Text before / after the main buffer contents.
    // Always in Unicode, and ordered outward.
    // Index 0 is for "pre-context", 1 for "post-context".
    context: [SmallVec<[hb_codepoint_t; CONTEXT_LENGTH]>; 2],

    serial: u8,
    /// Bits of `var1`/`var2` currently in use.
    allocated_var_bits: u8,
    /// Facts collected during the current shaping pass.
    pub scratch_flags: hb_buffer_scratch_flags_t,
    /// Maximum allowed len.
    pub(crate) max_len: usize,
    /// Maximum allowed operations.
    pub(crate) max_ops: i32,
    limits: BufferLimits,
    random_state: u32,

    message_func: Option<Box<hb_buffer_message_func_t>>,
    message_depth: u32,
}

impl hb_buffer_t {
    /// Default growth allowed per input item.
    pub const MAX_LEN_FACTOR: usize = 64;
    /// Default lower bound of the length ceiling.
    pub const MAX_LEN_MIN: usize = 16384;
    /// Length ceiling outside of a shaping pass.
    pub const MAX_LEN_DEFAULT: usize = BufferLimits::MAX_LEN_DEFAULT;

    /// Default operations allowed per input item.
    pub const MAX_OPS_FACTOR: i32 = 1024;
    /// Default lower bound of the operation budget.
    pub const MAX_OPS_MIN: i32 = 16384;
    /// Operation budget outside of a shaping pass.
    pub const MAX_OPS_DEFAULT: i32 = BufferLimits::MAX_OPS_DEFAULT;

    /// Codepoint used for invalid input by default.
    pub const REPLACEMENT_CODEPOINT_DEFAULT: hb_codepoint_t = 0xFFFD;

    /// Creates a new `Buffer`.
    pub fn new() -> Self {
        hb_buffer_t {
            header: hb_object_header_t::default(),
            unicode: hb_unicode_funcs_t::default(),
            flags: BufferFlags::empty(),
            cluster_level: BufferClusterLevel::default(),
            replacement: Self::REPLACEMENT_CODEPOINT_DEFAULT,
            invisible: 0,
            not_found: 0,
            content_type: BufferContentType::Invalid,
            props: hb_segment_properties_t::default(),
            successful: true,
            last_error: None,
            have_output: false,
            have_separate_output: false,
            have_positions: false,
            idx: 0,
            len: 0,
            out_len: 0,
            info: Vec::new(),
            pos: Vec::new(),
            context: Default::default(),
            serial: 0,
            allocated_var_bits: 0,
            scratch_flags: HB_BUFFER_SCRATCH_FLAG_DEFAULT,
            max_len: Self::MAX_LEN_DEFAULT,
            max_ops: Self::MAX_OPS_DEFAULT,
            limits: BufferLimits::default(),
            random_state: 1,
            message_func: None,
            message_depth: 0,
        }
    }

    /// Creates an empty buffer carrying the configuration of `src`: Unicode
    /// functions, flags, cluster level, replacement, invisible and not-found
    /// glyphs, and limits.
    pub fn create_similar(src: &hb_buffer_t) -> Self {
        let mut buffer = hb_buffer_t::new();
        buffer.unicode = src.unicode.clone();
        buffer.flags = src.flags;
        buffer.cluster_level = src.cluster_level;
        buffer.replacement = src.replacement;
        buffer.invisible = src.invisible;
        buffer.not_found = src.not_found;
        buffer.limits = src.limits;
        buffer
    }

    #[inline]
    fn is_immutable(&self) -> bool {
        self.header.is_immutable()
    }

    /// Marks the buffer as immutable. Mutating calls become no-ops.
    pub fn make_immutable(&self) {
        self.header.make_immutable();
    }

    // Records the first failure and poisons the buffer. Always returns false.
    #[cold]
    fn fail(&mut self, error: BufferError) -> bool {
        if self.successful {
            log::debug!("buffer operation failed: {}", error);
            self.last_error = Some(error);
        }

        self.successful = false;
        false
    }

    /// Checks that no allocation or limit failure happened since the last
    /// clear.
    #[inline]
    pub fn allocation_successful(&self) -> bool {
        self.successful
    }

    /// The failure that poisoned the buffer, if any.
    #[inline]
    pub fn last_error(&self) -> Option<BufferError> {
        self.last_error
    }

    #[inline]
    fn check_usable(&self) -> Result<(), BufferError> {
        if self.is_immutable() {
            Err(BufferError::Immutable)
        } else if !self.successful {
            Err(BufferError::Poisoned)
        } else {
            Ok(())
        }
    }

    #[inline]
    fn error_or_poisoned(&self) -> BufferError {
        self.last_error.unwrap_or(BufferError::Poisoned)
    }

    /// Resets the buffer to its initial status, as if it was just newly
    /// created, configuration included.
    pub fn reset(&mut self) {
        if self.is_immutable() {
            return;
        }

        self.unicode = hb_unicode_funcs_t::default();
        self.flags = BufferFlags::empty();
        self.cluster_level = BufferClusterLevel::default();
        self.replacement = Self::REPLACEMENT_CODEPOINT_DEFAULT;
        self.invisible = 0;
        self.not_found = 0;

        self.clear();
    }

    /// Clears the contents and the segment properties, keeping the
    /// configuration.
    pub fn clear_contents(&mut self) {
        if self.is_immutable() {
            return;
        }

        self.clear();
    }

    fn clear(&mut self) {
        self.content_type = BufferContentType::Invalid;
        self.props = hb_segment_properties_t::default();

        self.successful = true;
        self.last_error = None;
        self.have_output = false;
        self.have_separate_output = false;
        self.have_positions = false;

        self.idx = 0;
        self.len = 0;
        self.out_len = 0;

        self.serial = 0;
        self.scratch_flags = HB_BUFFER_SCRATCH_FLAG_DEFAULT;
        self.random_state = 1;
        self.allocated_var_bits = 0;

        self.context = Default::default();
    }

    /// Starts a shaping pass: resets the scratch state and computes the
    /// length and operation ceilings from the current length.
    pub fn enter(&mut self) {
        self.deallocate_var_all();
        self.serial = 0;
        self.scratch_flags = HB_BUFFER_SCRATCH_FLAG_DEFAULT;

        if let Some(len) = self.len.checked_mul(self.limits.max_len_factor) {
            self.max_len = len.max(self.limits.max_len_min);
        }

        let ops = i32::try_from(self.len)
            .ok()
            .and_then(|len| len.checked_mul(self.limits.max_ops_factor));
        if let Some(ops) = ops {
            self.max_ops = ops.max(self.limits.max_ops_min);
        }

        log::trace!(
            "entering shaping pass: len {}, max_len {}, max_ops {}",
            self.len,
            self.max_len,
            self.max_ops
        );
    }

    /// Ends a shaping pass. The failure state is kept.
    pub fn leave(&mut self) {
        self.max_len = Self::MAX_LEN_DEFAULT;
        self.max_ops = Self::MAX_OPS_DEFAULT;
        self.deallocate_var_all();
        self.serial = 0;
    }

    /// Replaces the factors and minimums used by `enter`.
    pub fn set_limits(&mut self, limits: BufferLimits) {
        if self.is_immutable() {
            return;
        }

        self.limits = limits;
    }

    /// The ceilings applied on the next `enter`.
    #[inline]
    pub fn limits(&self) -> BufferLimits {
        self.limits
    }

    /// Charges `count` operations against the budget set up by `enter`.
    ///
    /// Returns `false` and poisons the buffer once the budget runs out.
    pub fn consume_ops(&mut self, count: usize) -> bool {
        let count = i32::try_from(count).unwrap_or(i32::MAX);
        self.max_ops = self.max_ops.saturating_sub(count);
        if self.max_ops < 0 {
            return self.fail(BufferError::OperationLimitExceeded);
        }

        true
    }

    // Storage.

    /// The number of items the storage can hold.
    #[inline]
    pub fn allocated(&self) -> usize {
        self.info.len()
    }

    /// Makes room for at least `size` items.
    ///
    /// Returns `false` and poisons the buffer when the storage cannot grow.
    #[inline]
    pub fn ensure(&mut self, size: usize) -> bool {
        if !self.successful {
            return false;
        }

        if size == 0 || size < self.info.len() {
            return true;
        }

        self.enlarge(size)
    }

    /// Like [`hb_buffer_t::ensure`], but reports why it failed.
    pub fn try_ensure(&mut self, size: usize) -> Result<(), BufferError> {
        self.check_usable()?;
        if self.ensure(size) {
            Ok(())
        } else {
            Err(self.error_or_poisoned())
        }
    }

    /// Pre-allocates storage for `size` items.
    pub fn pre_allocate(&mut self, size: usize) -> bool {
        self.ensure(size)
    }

    fn enlarge(&mut self, size: usize) -> bool {
        if !self.successful {
            return false;
        }

        if size > self.max_len {
            return self.fail(BufferError::CapacityExceeded {
                requested: size,
                max_len: self.max_len,
            });
        }

        let allocated = self.info.len();
        let mut new_allocated = allocated;
        while size >= new_allocated {
            match new_allocated.checked_add((new_allocated >> 1) + 32) {
                Some(n) => new_allocated = n,
                None => return self.fail(BufferError::AllocationFailed),
            }
        }

        if rb_unsigned_mul(new_allocated, core::mem::size_of::<hb_glyph_info_t>()).is_none() {
            return self.fail(BufferError::AllocationFailed);
        }

        // Both arrays are reserved before either one grows, so that their
        // lengths stay equal when the allocator gives up.
        let additional = new_allocated - allocated;
        if self.info.try_reserve_exact(additional).is_err()
            || self.pos.try_reserve_exact(additional).is_err()
        {
            return self.fail(BufferError::AllocationFailed);
        }

        self.info.resize(new_allocated, hb_glyph_info_t::default());
        self.pos.resize(new_allocated, GlyphPosition::default());
        true
    }

    /// Makes sure the output can take `num_out` items while `num_in` input
    /// items get consumed, switching to separate output storage if the output
    /// would overtake the input.
    pub fn make_room_for(&mut self, num_in: usize, num_out: usize) -> bool {
        if !self.ensure(self.out_len + num_out) {
            return false;
        }

        if !self.have_separate_output && self.out_len + num_out > self.idx + num_in {
            debug_assert!(self.have_output);

            self.have_separate_output = true;
            let out_len = self.out_len;
            let out: &mut [hb_glyph_info_t] = bytemuck::cast_slice_mut(&mut self.pos);
            out[..out_len].copy_from_slice(&self.info[..out_len]);
        }

        true
    }

    fn shift_forward(&mut self, count: usize) -> bool {
        debug_assert!(self.have_output);
        if !self.ensure(self.len + count) {
            return false;
        }

        if !self.consume_ops(self.len - self.idx) {
            return false;
        }

        self.info.copy_within(self.idx..self.len, self.idx + count);
        if self.idx + count > self.len {
            // Under memory failure we might expose this area. At least
            // clean it up.
            for info in &mut self.info[self.len..self.idx + count] {
                *info = hb_glyph_info_t::default();
            }
        }

        self.len += count;
        self.idx += count;
        true
    }

    // Accessors.

    /// The logical length.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Checks that the buffer holds no items.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The read cursor.
    #[inline]
    pub fn idx(&self) -> usize {
        self.idx
    }

    /// The length of the output produced so far.
    #[inline]
    pub fn out_len(&self) -> usize {
        self.out_len
    }

    /// Checks that output mode is on.
    #[inline]
    pub fn have_output(&self) -> bool {
        self.have_output
    }

    /// Checks that positions are active.
    #[inline]
    pub fn has_positions(&self) -> bool {
        self.have_positions
    }

    /// Glyph infos of the buffer.
    #[inline]
    pub fn glyph_infos(&self) -> &[hb_glyph_info_t] {
        &self.info[..self.len]
    }

    /// Mutable glyph infos of the buffer.
    #[inline]
    pub fn glyph_infos_mut(&mut self) -> &mut [hb_glyph_info_t] {
        &mut self.info[..self.len]
    }

    /// Glyph positions of the buffer, empty while positions are inactive.
    #[inline]
    pub fn glyph_positions(&self) -> &[GlyphPosition] {
        if self.have_positions {
            &self.pos[..self.len]
        } else {
            &[]
        }
    }

    /// Glyph positions, activating them first if needed.
    ///
    /// Returns `None` when called while a message is being delivered.
    pub fn get_glyph_positions(&mut self) -> Option<&mut [GlyphPosition]> {
        if !self.have_positions {
            if self.message_depth > 0 {
                return None;
            }

            self.clear_positions();
        }

        Some(&mut self.pos[..self.len])
    }

    /// The output produced so far.
    #[inline]
    pub fn out_info(&self) -> &[hb_glyph_info_t] {
        if self.have_separate_output {
            &bytemuck::cast_slice::<GlyphPosition, hb_glyph_info_t>(&self.pos)[..self.out_len]
        } else {
            &self.info[..self.out_len]
        }
    }

    /// Mutable output produced so far.
    #[inline]
    pub fn out_info_mut(&mut self) -> &mut [hb_glyph_info_t] {
        let out_len = self.out_len;
        &mut self.out_storage_mut()[..out_len]
    }

    // The whole output storage, capacity included.
    #[inline]
    fn out_storage_mut(&mut self) -> &mut [hb_glyph_info_t] {
        if self.have_separate_output {
            bytemuck::cast_slice_mut(self.pos.as_mut_slice())
        } else {
            &mut self.info
        }
    }

    /// The input item `i` places after the cursor.
    #[inline]
    pub fn cur(&self, i: usize) -> &hb_glyph_info_t {
        &self.info[self.idx + i]
    }

    /// Mutable input item `i` places after the cursor.
    #[inline]
    pub fn cur_mut(&mut self, i: usize) -> &mut hb_glyph_info_t {
        let idx = self.idx + i;
        &mut self.info[idx]
    }

    /// Position of the item under the cursor.
    #[inline]
    pub fn cur_pos_mut(&mut self) -> &mut GlyphPosition {
        let i = self.idx;
        &mut self.pos[i]
    }

    /// The last output item, or the first storage slot when the output is
    /// empty.
    #[inline]
    pub fn prev(&self) -> &hb_glyph_info_t {
        let i = self.out_len.saturating_sub(1);
        if self.have_separate_output {
            &bytemuck::cast_slice::<GlyphPosition, hb_glyph_info_t>(&self.pos)[i]
        } else {
            &self.info[i]
        }
    }

    /// Mutable last output item.
    #[inline]
    pub fn prev_mut(&mut self) -> &mut hb_glyph_info_t {
        let i = self.out_len.saturating_sub(1);
        &mut self.out_storage_mut()[i]
    }

    /// How many items lie behind the cursor.
    #[inline]
    pub fn backtrack_len(&self) -> usize {
        if self.have_output {
            self.out_len
        } else {
            self.idx
        }
    }

    /// How many items lie at and after the cursor.
    #[inline]
    pub fn lookahead_len(&self) -> usize {
        self.len - self.idx
    }

    /// Codepoints of the buffer, replacing invalid values with U+FFFD.
    pub fn codepoints(&self) -> impl Iterator<Item = char> + '_ {
        self.glyph_infos().iter().map(hb_glyph_info_t::as_char)
    }

    // Configuration.

    /// The Unicode functions used for property lookups.
    #[inline]
    pub fn unicode_funcs(&self) -> &hb_unicode_funcs_t {
        &self.unicode
    }

    /// Sets the Unicode functions used for property lookups.
    pub fn set_unicode_funcs(&mut self, funcs: hb_unicode_funcs_t) {
        if self.is_immutable() {
            return;
        }

        self.unicode = funcs;
    }

    /// Buffer flags.
    #[inline]
    pub fn flags(&self) -> BufferFlags {
        self.flags
    }

    /// Sets the buffer flags.
    pub fn set_flags(&mut self, flags: BufferFlags) {
        if self.is_immutable() {
            return;
        }

        self.flags = flags;
    }

    /// How clusters are formed and merged.
    #[inline]
    pub fn cluster_level(&self) -> BufferClusterLevel {
        self.cluster_level
    }

    /// Sets the cluster level.
    pub fn set_cluster_level(&mut self, cluster_level: BufferClusterLevel) {
        if self.is_immutable() {
            return;
        }

        self.cluster_level = cluster_level;
    }

    /// Codepoint that replaces invalid input.
    #[inline]
    pub fn replacement_codepoint(&self) -> hb_codepoint_t {
        self.replacement
    }

    /// Sets the codepoint that replaces invalid input.
    pub fn set_replacement_codepoint(&mut self, replacement: hb_codepoint_t) {
        if self.is_immutable() {
            return;
        }

        self.replacement = replacement;
    }

    /// Glyph that replaces hidden default ignorables, or zero to remove them.
    #[inline]
    pub fn invisible_glyph(&self) -> hb_codepoint_t {
        self.invisible
    }

    /// Sets the glyph that replaces hidden default ignorables.
    pub fn set_invisible_glyph(&mut self, invisible: hb_codepoint_t) {
        if self.is_immutable() {
            return;
        }

        self.invisible = invisible;
    }

    /// Glyph used for characters missing from the font.
    #[inline]
    pub fn not_found_glyph(&self) -> hb_codepoint_t {
        self.not_found
    }

    /// Sets the glyph used for characters missing from the font.
    pub fn set_not_found_glyph(&mut self, not_found: hb_codepoint_t) {
        if self.is_immutable() {
            return;
        }

        self.not_found = not_found;
    }

    /// What the buffer holds.
    #[inline]
    pub fn content_type(&self) -> BufferContentType {
        self.content_type
    }

    /// Sets what the buffer holds.
    pub fn set_content_type(&mut self, content_type: BufferContentType) {
        if self.is_immutable() {
            return;
        }

        self.content_type = content_type;
    }

    /// Direction, script and language of the buffer.
    #[inline]
    pub fn segment_properties(&self) -> &hb_segment_properties_t {
        &self.props
    }

    /// Replaces the segment properties.
    pub fn set_segment_properties(&mut self, props: hb_segment_properties_t) {
        if self.is_immutable() {
            return;
        }

        self.props = props;
    }

    /// Text direction.
    #[inline]
    pub fn direction(&self) -> Direction {
        self.props.direction
    }

    /// Sets the text direction.
    pub fn set_direction(&mut self, direction: Direction) {
        if self.is_immutable() {
            return;
        }

        self.props.direction = direction;
    }

    /// Text script.
    #[inline]
    pub fn script(&self) -> Option<Script> {
        self.props.script
    }

    /// Sets the text script.
    pub fn set_script(&mut self, script: Option<Script>) {
        if self.is_immutable() {
            return;
        }

        self.props.script = script;
    }

    /// Text language.
    #[inline]
    pub fn language(&self) -> Option<&Language> {
        self.props.language.as_ref()
    }

    /// Sets the text language.
    pub fn set_language(&mut self, language: Option<Language>) {
        if self.is_immutable() {
            return;
        }

        self.props.language = language;
    }

    /// The pre-context (`0`) or post-context (`1`), ordered outward.
    #[inline]
    pub fn context(&self, index: usize) -> &[hb_codepoint_t] {
        &self.context[index]
    }

    /// Length of the pre-context (`0`) or post-context (`1`).
    #[inline]
    pub fn context_len(&self, index: usize) -> usize {
        self.context[index].len()
    }

    fn clear_context(&mut self, side: usize) {
        self.context[side].clear();
    }

    /// Replaces the pre-context with the text of `s`, nearest character first.
    pub fn set_pre_context(&mut self, s: &str) {
        if self.is_immutable() {
            return;
        }

        self.clear_context(0);
        for c in s.chars().rev().take(CONTEXT_LENGTH) {
            self.context[0].push(c as hb_codepoint_t);
        }
    }

    /// Replaces the post-context with the text of `s`.
    pub fn set_post_context(&mut self, s: &str) {
        if self.is_immutable() {
            return;
        }

        self.clear_context(1);
        for c in s.chars().take(CONTEXT_LENGTH) {
            self.context[1].push(c as hb_codepoint_t);
        }
    }

    /// Fills in unset segment properties from the buffer contents.
    ///
    /// The script comes from the first character that has a real one, the
    /// direction from the script. The language is left alone.
    pub fn guess_segment_properties(&mut self) {
        if self.is_immutable() {
            return;
        }

        if self.props.script.is_none() {
            for info in &self.info[..self.len] {
                match self.unicode.script(info.glyph_id) {
                    script::COMMON | script::INHERITED | script::UNKNOWN => {}
                    s => {
                        self.props.script = Some(s);
                        break;
                    }
                }
            }
        }

        if self.props.direction == Direction::Invalid {
            if let Some(script) = self.props.script {
                self.props.direction =
                    Direction::from_script(script).unwrap_or(Direction::Invalid);
            }

            if self.props.direction == Direction::Invalid {
                self.props.direction = Direction::LeftToRight;
            }
        }

        log::trace!("guessed segment properties: {:?}", self.props);
    }

    // Adding content.

    /// Sets the logical length, zero-filling new items.
    ///
    /// Truncating to zero also drops the content type and the pre-context.
    /// The post-context is always dropped.
    pub fn set_length(&mut self, len: usize) -> bool {
        if self.is_immutable() {
            return len == 0;
        }

        if !self.ensure(len) {
            return false;
        }

        // Wipe the new space.
        if len > self.len {
            for info in &mut self.info[self.len..len] {
                *info = hb_glyph_info_t::default();
            }

            if self.have_positions {
                for pos in &mut self.pos[self.len..len] {
                    *pos = GlyphPosition::default();
                }
            }
        }

        self.len = len;

        if len == 0 {
            self.content_type = BufferContentType::Invalid;
            self.clear_context(0);
        }

        self.clear_context(1);
        true
    }

    /// Like [`hb_buffer_t::set_length`], but reports why it failed.
    pub fn try_set_length(&mut self, len: usize) -> Result<(), BufferError> {
        self.check_usable()?;
        if self.set_length(len) {
            Ok(())
        } else {
            Err(self.error_or_poisoned())
        }
    }

    fn add_info(&mut self, codepoint: hb_codepoint_t, cluster: u32) {
        if !self.ensure(self.len + 1) {
            return;
        }

        self.info[self.len] = hb_glyph_info_t {
            glyph_id: codepoint,
            cluster,
            ..hb_glyph_info_t::default()
        };
        self.len += 1;
    }

    /// Appends a single codepoint with an explicit cluster value.
    pub fn add(&mut self, codepoint: hb_codepoint_t, cluster: u32) {
        if self.is_immutable() || !self.successful {
            return;
        }

        self.add_info(codepoint, cluster);
        self.clear_context(1);
        self.content_type = BufferContentType::Unicode;
    }

    /// Appends the text of `text`, using byte offsets as clusters.
    pub fn push_str(&mut self, text: &str) {
        self.add_utf8(text.as_bytes(), Some(text.len()), 0, None);
    }

    fn add_utf<U: hb_utf_t>(
        &mut self,
        text: &[U::CodeUnit],
        text_length: Option<usize>,
        item_offset: usize,
        item_length: Option<usize>,
    ) -> Result<(), BufferError> {
        debug_assert!(
            self.content_type == BufferContentType::Unicode
                || (self.len == 0 && self.content_type == BufferContentType::Invalid)
        );

        self.check_usable()?;

        let text_length = match text_length {
            Some(n) if n <= text.len() => n,
            Some(_) => return Err(BufferError::InvalidRange),
            None => U::strlen(text),
        };

        let item_length = match item_length {
            Some(n) => n,
            None => text_length
                .checked_sub(item_offset)
                .ok_or(BufferError::InvalidRange)?,
        };

        if item_offset > text_length
            || item_length > text_length - item_offset
            || item_length > i32::MAX as usize / 8
        {
            return Err(BufferError::InvalidRange);
        }

        let units = item_length * core::mem::size_of::<U::CodeUnit>() / 4;
        if !self.ensure(self.len + units) {
            return Err(self.error_or_poisoned());
        }

        let text = &text[..text_length];
        let replacement = self.replacement;

        // If buffer is empty and pre-context provided, install it.
        // This check is written this way, to make sure people can
        // provide pre-context in one add_utf() call, then provide
        // text in a follow-up call.
        if self.len == 0 && item_offset > 0 {
            self.clear_context(0);
            let mut prev = item_offset;
            while prev > 0 && self.context[0].len() < CONTEXT_LENGTH {
                let (u, n) = U::prev(&text[..prev], replacement);
                prev -= n;
                self.context[0].push(u);
            }
        }

        let end = item_offset + item_length;
        let mut next = item_offset;
        while next < end {
            let (u, n) = U::next(&text[next..end], replacement);
            self.add_info(u, next as u32);
            next += n;
        }

        // Add post-context.
        self.clear_context(1);
        while next < text_length && self.context[1].len() < CONTEXT_LENGTH {
            let (u, n) = U::next(&text[next..], replacement);
            self.context[1].push(u);
            next += n;
        }

        self.content_type = BufferContentType::Unicode;

        if self.successful {
            Ok(())
        } else {
            Err(self.error_or_poisoned())
        }
    }

    /// Appends `text[item_offset..item_offset + item_length]` as UTF-8.
    ///
    /// `text_length` limits the usable text (the rest of `text` when `None`
    /// stops at the first zero byte); `item_length` defaults to the rest of
    /// it. Text around the item becomes the pre- and post-context. Clusters
    /// are byte offsets into `text`, and ill-formed sequences become the
    /// replacement codepoint.
    pub fn add_utf8(
        &mut self,
        text: &[u8],
        text_length: Option<usize>,
        item_offset: usize,
        item_length: Option<usize>,
    ) {
        let _ = self.try_add_utf8(text, text_length, item_offset, item_length);
    }

    /// Like [`hb_buffer_t::add_utf8`], but reports why nothing was added.
    pub fn try_add_utf8(
        &mut self,
        text: &[u8],
        text_length: Option<usize>,
        item_offset: usize,
        item_length: Option<usize>,
    ) -> Result<(), BufferError> {
        self.add_utf::<hb_utf8_t>(text, text_length, item_offset, item_length)
    }

    /// Like [`hb_buffer_t::add_utf8`], for UTF-16. Clusters are code unit
    /// offsets.
    pub fn add_utf16(
        &mut self,
        text: &[u16],
        text_length: Option<usize>,
        item_offset: usize,
        item_length: Option<usize>,
    ) {
        let _ = self.add_utf::<hb_utf16_t>(text, text_length, item_offset, item_length);
    }

    /// Like [`hb_buffer_t::add_utf8`], for UTF-32. Surrogates and values
    /// above U+10FFFF become the replacement codepoint.
    pub fn add_utf32(
        &mut self,
        text: &[u32],
        text_length: Option<usize>,
        item_offset: usize,
        item_length: Option<usize>,
    ) {
        let _ = self.add_utf::<hb_utf32_t>(text, text_length, item_offset, item_length);
    }

    /// Like [`hb_buffer_t::add_utf8`], for Latin-1.
    pub fn add_latin1(
        &mut self,
        text: &[u8],
        text_length: Option<usize>,
        item_offset: usize,
        item_length: Option<usize>,
    ) {
        let _ = self.add_utf::<hb_latin1_t>(text, text_length, item_offset, item_length);
    }

    /// Like [`hb_buffer_t::add_utf32`], without validating the values.
    pub fn add_codepoints(
        &mut self,
        text: &[hb_codepoint_t],
        text_length: Option<usize>,
        item_offset: usize,
        item_length: Option<usize>,
    ) {
        let _ =
            self.add_utf::<hb_utf32_novalidate_t>(text, text_length, item_offset, item_length);
    }

    /// Appends `range` of `source`, contents and positions, to the end of
    /// this buffer.
    pub fn append(&mut self, source: &hb_buffer_t, range: impl RangeBounds<usize>) {
        if self.is_immutable() {
            return;
        }

        debug_assert!(!self.have_output && !source.have_output);
        debug_assert!(
            self.have_positions == source.have_positions || self.len == 0 || source.len == 0
        );
        debug_assert!(
            self.content_type == source.content_type
                || self.len == 0
                || source.len == 0
        );

        let (mut start, mut end) = resolve_range(range, source.len);
        if start == end {
            return;
        }

        let orig_len = self.len;
        let count = end - start;
        let Some(len) = orig_len.checked_add(count) else {
            self.fail(BufferError::AllocationFailed);
            return;
        };

        if !self.set_length(len) {
            return;
        }

        if orig_len == 0 {
            self.content_type = source.content_type;
        }

        if !self.have_positions && source.have_positions {
            self.clear_positions();
        }

        self.props.overlay(&source.props);

        self.info[orig_len..len].copy_from_slice(&source.info[start..end]);
        if self.have_positions {
            self.pos[orig_len..len].copy_from_slice(&source.pos[start..end]);
        }

        if source.content_type == BufferContentType::Unicode {
            // See similar logic in add_utf.

            // Pre-context.
            if orig_len == 0 && start + source.context_len(0) > 0 {
                self.clear_context(0);
                while start > 0 && self.context[0].len() < CONTEXT_LENGTH {
                    start -= 1;
                    self.context[0].push(source.info[start].glyph_id);
                }

                for &u in &source.context[0] {
                    if self.context[0].len() == CONTEXT_LENGTH {
                        break;
                    }

                    self.context[0].push(u);
                }
            }

            // Post-context.
            self.clear_context(1);
            while end < source.len && self.context[1].len() < CONTEXT_LENGTH {
                self.context[1].push(source.info[end].glyph_id);
                end += 1;
            }

            for &u in &source.context[1] {
                if self.context[1].len() == CONTEXT_LENGTH {
                    break;
                }

                self.context[1].push(u);
            }
        }
    }

    // Output buffer.

    /// Starts output mode: the cursor and the output are reset and
    /// positions are deactivated.
    pub fn clear_output(&mut self) {
        if self.is_immutable() {
            return;
        }

        self.have_output = true;
        self.have_positions = false;

        self.out_len = 0;
        self.have_separate_output = false;
    }

    /// Leaves output mode and activates zeroed positions.
    pub fn clear_positions(&mut self) {
        if self.is_immutable() {
            return;
        }

        self.have_output = false;
        self.have_positions = true;

        self.out_len = 0;
        self.have_separate_output = false;

        for pos in &mut self.pos[..self.len] {
            *pos = GlyphPosition::default();
        }
    }

    /// Commits the output: passes the rest of the input through and makes
    /// the output the new contents.
    ///
    /// On failure the previous contents stay, and only the output state is
    /// reset. Without output mode nothing happens and `false` is returned.
    pub fn sync(&mut self) -> bool {
        if !self.have_output {
            return false;
        }

        debug_assert!(self.idx <= self.len);

        let ok = self.successful && self.next_glyphs(self.len - self.idx);
        if ok {
            if self.have_separate_output {
                let info: Vec<GlyphPosition> = bytemuck::cast_vec(core::mem::take(&mut self.info));
                let pos: Vec<hb_glyph_info_t> = bytemuck::cast_vec(core::mem::take(&mut self.pos));
                self.pos = info;
                self.info = pos;
            }

            self.len = self.out_len;
        }

        self.have_output = false;
        self.have_separate_output = false;
        self.out_len = 0;
        self.idx = 0;

        ok
    }

    /// Like [`hb_buffer_t::sync`], but reports why it failed.
    pub fn try_sync(&mut self) -> Result<(), BufferError> {
        if !self.have_output {
            return Err(BufferError::OutputInactive);
        }

        if self.sync() {
            Ok(())
        } else {
            Err(self.error_or_poisoned())
        }
    }

    /// Commits the output produced so far and continues with the rest of
    /// the input, keeping the cursor on the same item.
    ///
    /// Returns how far the cursor moved.
    pub fn sync_so_far(&mut self) -> isize {
        if !self.have_output {
            return 0;
        }

        let out_i = self.out_len;
        let i = self.idx;
        let old_idx = self.idx;

        if self.sync() {
            self.idx = out_i;
        } else {
            self.idx = i;
        }

        self.have_output = true;
        self.out_len = self.idx;

        debug_assert!(self.idx <= self.len);

        self.idx as isize - old_idx as isize
    }

    // Copies `count` items from the cursor into the output.
    fn copy_to_output(&mut self, count: usize) {
        let (idx, out_len) = (self.idx, self.out_len);
        if self.have_separate_output {
            let out: &mut [hb_glyph_info_t] = bytemuck::cast_slice_mut(&mut self.pos);
            out[out_len..out_len + count].copy_from_slice(&self.info[idx..idx + count]);
        } else if idx != out_len {
            self.info.copy_within(idx..idx + count, out_len);
        }
    }

    // Copies `count` items from the end of the output back before the cursor.
    fn copy_from_output(&mut self, count: usize) {
        let (idx, out_len) = (self.idx, self.out_len);
        if self.have_separate_output {
            let out: &[hb_glyph_info_t] = bytemuck::cast_slice(&self.pos);
            self.info[idx..idx + count].copy_from_slice(&out[out_len..out_len + count]);
        } else if idx != out_len {
            self.info.copy_within(out_len..out_len + count, idx);
        }
    }

    /// Moves the cursor so that `i` items lie behind it, moving items between
    /// input and output as needed.
    pub fn move_to(&mut self, i: usize) -> bool {
        if !self.have_output {
            if i > self.len {
                return false;
            }

            self.idx = i;
            return true;
        }

        if !self.successful {
            return false;
        }

        if i > self.out_len + (self.len - self.idx) {
            return false;
        }

        if self.out_len < i {
            let count = i - self.out_len;
            if !self.make_room_for(count, count) {
                return false;
            }

            self.copy_to_output(count);
            self.idx += count;
            self.out_len += count;
        } else if self.out_len > i {
            // Tricky part: rewinding...
            let count = self.out_len - i;

            // This will blow in our face if memory allocation fails later
            // in this same lookup...
            //
            // We used to shift with extra 32 items.
            // But that would leave empty slots in the buffer in case of allocation
            // failures.  See comments in shift_forward().  This can cause O(N^2)
            // behavior more severely than adding 32 empty slots can...
            if self.idx < count && !self.shift_forward(count - self.idx) {
                return false;
            }

            debug_assert!(self.idx >= count);

            self.idx -= count;
            self.out_len -= count;
            self.copy_from_output(count);
        }

        true
    }

    /// Like [`hb_buffer_t::move_to`], but reports why it failed.
    pub fn try_move_to(&mut self, i: usize) -> Result<(), BufferError> {
        if self.have_output && self.successful && i > self.out_len + (self.len - self.idx) {
            return Err(BufferError::InvalidRange);
        }

        if !self.have_output && i > self.len {
            return Err(BufferError::InvalidRange);
        }

        if self.move_to(i) {
            Ok(())
        } else {
            Err(self.error_or_poisoned())
        }
    }

    /// Copies the current item to the output and advances.
    pub fn next_glyph(&mut self) {
        if self.have_output {
            if self.have_separate_output || self.out_len != self.idx {
                if !self.make_room_for(1, 1) {
                    return;
                }

                let out_len = self.out_len;
                let info = self.info[self.idx];
                self.out_storage_mut()[out_len] = info;
            }

            self.out_len += 1;
        }

        self.idx += 1;
    }

    /// Copies `n` items to the output and advances.
    pub fn next_glyphs(&mut self, n: usize) -> bool {
        if self.have_output {
            if self.have_separate_output || self.out_len != self.idx {
                if !self.make_room_for(n, n) {
                    return false;
                }

                self.copy_to_output(n);
            }

            self.out_len += n;
        }

        self.idx += n;
        true
    }

    /// Advances past the current item without copying it.
    #[inline]
    pub fn skip_glyph(&mut self) {
        self.idx += 1;
    }

    /// Replaces `num_in` input items with `glyph_data.len()` copies of the
    /// first of them, each carrying one of the given glyph ids. The consumed
    /// range is merged into one cluster first.
    pub fn replace_glyphs(&mut self, num_in: usize, num_out: usize, glyph_data: &[u32]) {
        if !self.make_room_for(num_in, num_out) {
            return;
        }

        debug_assert!(self.idx + num_in <= self.len);

        self.merge_clusters(self.idx, self.idx + num_in);

        let orig_info = if self.idx < self.len {
            self.info[self.idx]
        } else {
            *self.prev()
        };

        let out_len = self.out_len;
        let out = self.out_storage_mut();
        for (i, &glyph) in glyph_data[..num_out].iter().enumerate() {
            out[out_len + i] = orig_info;
            out[out_len + i].glyph_id = glyph;
        }

        self.idx += num_in;
        self.out_len += num_out;
    }

    /// Replaces the current item's glyph id and advances.
    pub fn replace_glyph(&mut self, glyph_index: u32) {
        if self.have_separate_output || self.out_len != self.idx {
            if !self.make_room_for(1, 1) {
                return;
            }

            let out_len = self.out_len;
            let info = self.info[self.idx];
            self.out_storage_mut()[out_len] = info;
        }

        let out_len = self.out_len;
        self.out_storage_mut()[out_len].glyph_id = glyph_index;

        self.idx += 1;
        self.out_len += 1;
    }

    /// Writes a copy of the current item with a new glyph id to the output,
    /// without advancing.
    pub fn output_glyph(&mut self, glyph_index: u32) {
        if !self.make_room_for(0, 1) {
            return;
        }

        if self.idx == self.len && self.out_len == 0 {
            self.fail(BufferError::InvalidRange);
            return;
        }

        let out_len = self.out_len;
        let info = if self.idx < self.len {
            self.info[self.idx]
        } else {
            *self.prev()
        };

        let out = self.out_storage_mut();
        out[out_len] = info;
        out[out_len].glyph_id = glyph_index;

        self.out_len += 1;
    }

    /// Writes `glyph_info` to the output, without advancing.
    pub fn output_info(&mut self, glyph_info: hb_glyph_info_t) {
        if !self.make_room_for(0, 1) {
            return;
        }

        let out_len = self.out_len;
        self.out_storage_mut()[out_len] = glyph_info;
        self.out_len += 1;
    }

    /// Copies the current item to the output, without advancing.
    pub fn copy_glyph(&mut self) {
        if !self.make_room_for(0, 1) {
            return;
        }

        let out_len = self.out_len;
        let info = self.info[self.idx];
        self.out_storage_mut()[out_len] = info;
        self.out_len += 1;
    }

    // Serials.

    /// Bumps the serial counter, skipping zero.
    pub fn next_serial(&mut self) -> u8 {
        // A `serial` overflow/wrap-around here is perfectly fine.
        self.serial = self.serial.wrapping_add(1);

        if self.serial == 0 {
            self.serial += 1;
        }

        self.serial
    }

    /// Allocates a non-zero three-bit ligature id.
    pub fn allocate_lig_id(&mut self) -> u8 {
        let mut lig_id = self.next_serial() & 0x07;

        if lig_id == 0 {
            lig_id = self.allocate_lig_id();
        }

        lig_id
    }

    /// A Lehmer generator seeded to 1 on clear, shared by shapers that
    /// randomize alternates.
    pub fn random_number(&mut self) -> u32 {
        self.random_state = self.random_state.wrapping_mul(48271) % 2147483647;
        self.random_state
    }

    #[inline]
    /// Returns the state of the random number generator.
    pub fn random_state(&self) -> u32 {
        self.random_state
    }

    /// Reseeds the random number generator.
    pub fn set_random_state(&mut self, state: u32) {
        if self.is_immutable() {
            return;
        }

        self.random_state = state;
    }

    // Scratch variables.

    /// Claims a scratch slot. Debug builds check it is free.
    pub fn allocate_var(&mut self, var: hb_buffer_var_t) {
        let bits = var.bits();
        debug_assert_eq!(self.allocated_var_bits & bits, 0, "{:?} is in use", var);
        self.allocated_var_bits |= bits;
    }

    /// Releases a scratch slot.
    pub fn deallocate_var(&mut self, var: hb_buffer_var_t) {
        let bits = var.bits();
        debug_assert_eq!(self.allocated_var_bits & bits, bits, "{:?} is not in use", var);
        self.allocated_var_bits &= !bits;
    }

    /// Debug builds check that the slot is claimed.
    pub fn assert_var(&self, var: hb_buffer_var_t) {
        let bits = var.bits();
        debug_assert_eq!(self.allocated_var_bits & bits, bits, "{:?} is not in use", var);
    }

    /// Releases every scratch slot.
    pub fn deallocate_var_all(&mut self) {
        self.allocated_var_bits = 0;
    }

    /// Claims the slot of the unicode props.
    pub fn allocate_unicode_vars(&mut self) {
        self.allocate_var(UNICODE_PROPS_VAR);
    }

    /// Releases the slot of the unicode props.
    pub fn deallocate_unicode_vars(&mut self) {
        self.deallocate_var(UNICODE_PROPS_VAR);
    }

    // Groups.

    /// The end of the group starting at `start`, where consecutive items
    /// belong together while `group` says so.
    pub fn group_end<F>(&self, mut start: usize, group: F) -> usize
    where
        F: Fn(&hb_glyph_info_t, &hb_glyph_info_t) -> bool,
    {
        start += 1;

        while start < self.len && group(&self.info[start - 1], &self.info[start]) {
            start += 1;
        }

        start
    }

    /// The end of the cluster starting at `start`.
    #[inline]
    pub fn next_cluster(&self, start: usize) -> usize {
        self.group_end(start, |a, b| a.cluster == b.cluster)
    }

    /// Reverses the items in `start..end`, positions included.
    pub fn reverse_range(&mut self, start: usize, end: usize) {
        let end = min(end, self.len);
        if end.saturating_sub(start) < 2 {
            return;
        }

        self.info[start..end].reverse();
        if self.have_positions {
            self.pos[start..end].reverse();
        }
    }

    /// Reverses the whole buffer.
    pub fn reverse(&mut self) {
        if self.len == 0 {
            return;
        }

        self.reverse_range(0, self.len);
    }

    /// Reverses each group in place, then the whole buffer, which keeps
    /// the groups in their original internal order.
    pub fn reverse_groups<F>(&mut self, group: F, merge_clusters: bool)
    where
        F: Fn(&hb_glyph_info_t, &hb_glyph_info_t) -> bool,
    {
        if self.is_empty() {
            return;
        }

        let mut start = 0;
        let mut i = 1;

        while i < self.len {
            if !group(&self.info[i - 1], &self.info[i]) {
                if merge_clusters {
                    self.merge_clusters(start, i);
                }

                self.reverse_range(start, i);
                start = i;
            }

            i += 1;
        }

        if merge_clusters {
            self.merge_clusters(start, i);
        }

        self.reverse_range(start, i);

        self.reverse();
    }

    /// Reverses the buffer keeping the items of each cluster in order.
    pub fn reverse_clusters(&mut self) {
        self.reverse_groups(|a, b| a.cluster == b.cluster, false);
    }

    /// Reverses the buffer keeping each grapheme (a base and its
    /// continuations) in logical order. Needs the unicode props.
    pub fn reverse_graphemes(&mut self) {
        let merge = self.cluster_level == BufferClusterLevel::MonotoneCharacters;
        self.reverse_groups(|_, b| b.is_continuation(), merge);
    }

    /// Sets each item's cluster to its index.
    pub fn reset_clusters(&mut self) {
        for (i, info) in self.info[..self.len].iter_mut().enumerate() {
            info.cluster = i as u32;
        }
    }

    /// Stable-sorts `start..end` with `cmp` (`true` means "greater"),
    /// merging the clusters of every item that moves.
    pub fn sort(
        &mut self,
        start: usize,
        end: usize,
        cmp: impl Fn(&hb_glyph_info_t, &hb_glyph_info_t) -> bool,
    ) {
        debug_assert!(!self.have_positions);

        for i in start + 1..end {
            let mut j = i;
            while j > start && cmp(&self.info[j - 1], &self.info[i]) {
                j -= 1;
            }

            if i == j {
                continue;
            }

            // Move item i to occupy place for item j, shift what's in between.
            self.merge_clusters(j, i + 1);

            {
                let t = self.info[i];
                for idx in (0..i - j).rev() {
                    self.info[idx + j + 1] = self.info[idx + j];
                }

                self.info[j] = t;
            }
        }
    }

    // Clusters.

    /// Makes `start..end` one cluster, taking the smallest cluster value.
    ///
    /// The range grows to cover whole clusters, including the part of the
    /// first cluster that was already moved to the output. Outside of the
    /// monotone levels nothing merges and the range only becomes unsafe to
    /// break.
    pub fn merge_clusters(&mut self, start: usize, end: usize) {
        if end.saturating_sub(start) < 2 {
            return;
        }

        self.merge_clusters_impl(start, end);
    }

    fn merge_clusters_impl(&mut self, mut start: usize, mut end: usize) {
        if !self.cluster_level.is_monotone() {
            self.unsafe_to_break(Some(start), Some(end));
            return;
        }

        if !self.successful || !self.consume_ops(end - start) {
            return;
        }

        let mut cluster = self.info[start].cluster;

        for i in start + 1..end {
            cluster = min(cluster, self.info[i].cluster);
        }

        // Extend end
        if cluster != self.info[end - 1].cluster {
            while end < self.len && self.info[end - 1].cluster == self.info[end].cluster {
                end += 1;
            }
        }

        // Extend start
        if cluster != self.info[start].cluster {
            while self.idx < start && self.info[start - 1].cluster == self.info[start].cluster {
                start -= 1;
            }
        }

        // If we hit the start of buffer, continue in out-buffer.
        if self.idx == start && self.info[start].cluster != cluster {
            let old_cluster = self.info[start].cluster;
            let out_len = self.out_len;
            let out = self.out_storage_mut();
            for info in out[..out_len].iter_mut().rev() {
                if info.cluster != old_cluster {
                    break;
                }

                set_cluster(info, cluster, 0);
            }
        }

        for info in &mut self.info[start..end] {
            set_cluster(info, cluster, 0);
        }
    }

    /// Like [`hb_buffer_t::merge_clusters`], over an output range. The
    /// range grows into the input when it touches the end of the output.
    pub fn merge_out_clusters(&mut self, mut start: usize, mut end: usize) {
        if self.cluster_level == BufferClusterLevel::Characters {
            return;
        }

        if end.saturating_sub(start) < 2 {
            return;
        }

        if !self.successful || !self.consume_ops(end - start) {
            return;
        }

        let out_len = self.out_len;
        let (idx, len) = (self.idx, self.len);
        let mut cluster = self.out_info()[start].cluster;

        for i in start + 1..end {
            cluster = min(cluster, self.out_info()[i].cluster);
        }

        let out = self.out_storage_mut();

        // Extend start
        while start != 0 && out[start - 1].cluster == out[start].cluster {
            start -= 1;
        }

        // Extend end
        while end < out_len && out[end - 1].cluster == out[end].cluster {
            end += 1;
        }

        let last_cluster = out[end - 1].cluster;

        for info in &mut out[start..end] {
            set_cluster(info, cluster, 0);
        }

        // If we hit the end of out-buffer, continue in buffer.
        if end == out_len {
            for info in &mut self.info[idx..len] {
                if info.cluster != last_cluster {
                    break;
                }

                set_cluster(info, cluster, 0);
            }
        }
    }

    /// Drops the current item.
    ///
    /// When it is the last item of its cluster, the cluster is handed to a
    /// neighbor so that no cluster value disappears.
    pub fn delete_glyph(&mut self) {
        let cluster = self.info[self.idx].cluster;

        if (self.idx + 1 < self.len && cluster == self.info[self.idx + 1].cluster)
            || (self.out_len != 0 && cluster == self.prev().cluster)
        {
            // Cluster survives; do nothing.
            self.skip_glyph();
            return;
        }

        if self.out_len != 0 {
            // Merge cluster backward.
            if cluster < self.prev().cluster {
                let mask = self.info[self.idx].mask;
                let old_cluster = self.prev().cluster;

                let out_len = self.out_len;
                let out = self.out_storage_mut();
                for info in out[..out_len].iter_mut().rev() {
                    if info.cluster != old_cluster {
                        break;
                    }

                    set_cluster(info, cluster, mask);
                }
            }

            self.skip_glyph();
            return;
        }

        if self.idx + 1 < self.len {
            // Merge cluster forward.
            self.merge_clusters(self.idx, self.idx + 2);
        }

        self.skip_glyph();
    }

    /// Drops, without an output pass, every item `filter` selects, handing
    /// their clusters over the way [`hb_buffer_t::delete_glyph`] does.
    pub fn delete_glyphs_inplace(&mut self, filter: impl Fn(&hb_glyph_info_t) -> bool) {
        if !self.successful {
            return;
        }

        // Merge clusters and delete filtered glyphs.
        // NOTE! We can't use out-buffer as we have positioning data.
        let mut j = 0;

        for i in 0..self.len {
            if filter(&self.info[i]) {
                // Merge clusters.
                // Same logic as delete_glyph(), but for in-place removal.

                let cluster = self.info[i].cluster;
                if i + 1 < self.len && cluster == self.info[i + 1].cluster {
                    // Cluster survives; do nothing.
                    continue;
                }

                if j != 0 {
                    // Merge cluster backward.
                    if cluster < self.info[j - 1].cluster {
                        let mask = self.info[i].mask;
                        let old_cluster = self.info[j - 1].cluster;

                        for info in self.info[..j].iter_mut().rev() {
                            if info.cluster != old_cluster {
                                break;
                            }

                            set_cluster(info, cluster, mask);
                        }
                    }

                    continue;
                }

                if i + 1 < self.len {
                    // Merge cluster forward.
                    self.merge_clusters(i, i + 2);
                }

                continue;
            }

            if j != i {
                self.info[j] = self.info[i];
                self.pos[j] = self.pos[i];
            }

            j += 1;
        }

        self.len = j;
    }

    // Glyph flags.

    /// Marks `start..end` unsafe to break, sparing the items of the
    /// minimum cluster.
    pub fn unsafe_to_break(&mut self, start: Option<usize>, end: Option<usize>) {
        self.set_glyph_flags(
            glyph_flag::UNSAFE_TO_BREAK | glyph_flag::UNSAFE_TO_CONCAT,
            start,
            end,
            Some(true),
            None,
        );
    }

    /// Like [`hb_buffer_t::unsafe_to_break`], with `start` in the output
    /// and `end` in the input.
    pub fn unsafe_to_break_from_outbuffer(&mut self, start: Option<usize>, end: Option<usize>) {
        self.set_glyph_flags(
            glyph_flag::UNSAFE_TO_BREAK | glyph_flag::UNSAFE_TO_CONCAT,
            start,
            end,
            Some(true),
            Some(true),
        );
    }

    /// Marks `start..end` unsafe to concat.
    ///
    /// Does nothing without [`BufferFlags::PRODUCE_UNSAFE_TO_CONCAT`].
    pub fn unsafe_to_concat(&mut self, start: Option<usize>, end: Option<usize>) {
        if !self.flags.contains(BufferFlags::PRODUCE_UNSAFE_TO_CONCAT) {
            return;
        }

        self.set_glyph_flags(glyph_flag::UNSAFE_TO_CONCAT, start, end, Some(false), None);
    }

    /// Like [`hb_buffer_t::unsafe_to_concat`], across output and input.
    pub fn unsafe_to_concat_from_outbuffer(&mut self, start: Option<usize>, end: Option<usize>) {
        if !self.flags.contains(BufferFlags::PRODUCE_UNSAFE_TO_CONCAT) {
            return;
        }

        self.set_glyph_flags(
            glyph_flag::UNSAFE_TO_CONCAT,
            start,
            end,
            Some(false),
            Some(true),
        );
    }

    /// Marks `start..end` safe for tatweel insertion, or unsafe to break
    /// without [`BufferFlags::PRODUCE_SAFE_TO_INSERT_TATWEEL`].
    pub fn safe_to_insert_tatweel(&mut self, start: Option<usize>, end: Option<usize>) {
        if !self.flags.contains(BufferFlags::PRODUCE_SAFE_TO_INSERT_TATWEEL) {
            self.unsafe_to_break(start, end);
            return;
        }

        self.set_glyph_flags(
            glyph_flag::SAFE_TO_INSERT_TATWEEL,
            start,
            end,
            Some(true),
            None,
        );
    }

    /// Sets `mask` on `start..end` (defaulting to the whole buffer).
    ///
    /// With `interior`, the cluster holding the smallest cluster value is
    /// spared, since breaking inside a cluster is never offered anyway.
    /// With `from_out_buffer`, `start` indexes the output and the range runs
    /// up to the cursor of the input.
    pub fn set_glyph_flags(
        &mut self,
        mask: hb_mask_t,
        start: Option<usize>,
        end: Option<usize>,
        interior: Option<bool>,
        from_out_buffer: Option<bool>,
    ) {
        let start = start.unwrap_or(0);
        let end = min(end.unwrap_or(self.len), self.len);
        let interior = interior.unwrap_or(false);
        let from_out_buffer = from_out_buffer.unwrap_or(false);

        if interior && !from_out_buffer && end.saturating_sub(start) < 2 {
            return;
        }

        self.scratch_flags |= HB_BUFFER_SCRATCH_FLAG_HAS_GLYPH_FLAGS;

        let level = self.cluster_level;

        if !from_out_buffer || !self.have_output {
            let start = min(start, end);
            if !interior {
                for info in &mut self.info[start..end] {
                    info.mask |= mask;
                }
            } else {
                let cluster = find_min_cluster(&self.info[start..end], u32::MAX);
                infos_set_glyph_flags(&mut self.info[start..end], cluster, mask, level);
            }
        } else {
            debug_assert!(start <= self.out_len);
            debug_assert!(self.idx <= end);

            let (idx, out_len) = (self.idx, self.out_len);

            if !interior {
                for info in &mut self.out_storage_mut()[start..out_len] {
                    info.mask |= mask;
                }

                for info in &mut self.info[idx..end] {
                    info.mask |= mask;
                }
            } else {
                let cluster = find_min_cluster(&self.info[idx..end], u32::MAX);
                let cluster = find_min_cluster(&self.out_info()[start..out_len], cluster);

                infos_set_glyph_flags(
                    &mut self.out_storage_mut()[start..out_len],
                    cluster,
                    mask,
                    level,
                );
                infos_set_glyph_flags(&mut self.info[idx..end], cluster, mask, level);
            }
        }
    }

    // Unicode properties.

    /// Records general category, ignorability and continuation of every
    /// item, and raises the matching scratch flags.
    pub fn set_unicode_props(&mut self) {
        self.assert_var(UNICODE_PROPS_VAR);

        let mut i = 0;
        while i < self.len {
            self.compute_unicode_props(i);

            if is_grapheme_base_category(self.info[i].general_category()) {
                i += 1;
                continue;
            }

            // Marks are already set as continuation by the above line.
            // Handle Emoji_Modifier and ZWJ-continuation.
            let u = self.info[i].glyph_id;
            let gc = self.info[i].general_category();
            if gc == GeneralCategory::ModifierSymbol && (0x1F3FB..=0x1F3FF).contains(&u) {
                self.info[i].set_continuation();
            } else if i != 0 && is_regional_indicator(u) {
                // Regional indicators are hairy as hell...
                // https://github.com/harfbuzz/harfbuzz/issues/2265
                let prev = &self.info[i - 1];
                if is_regional_indicator(prev.glyph_id) && !prev.is_continuation() {
                    self.info[i].set_continuation();
                }
            } else if self.info[i].is_zwj() {
                self.info[i].set_continuation();
                if i + 1 < self.len {
                    self.compute_unicode_props(i + 1);
                    // Approximates Extended_Pictographic with So.
                    if self.info[i + 1].general_category() == GeneralCategory::OtherSymbol {
                        self.info[i + 1].set_continuation();
                        i += 1;
                    }
                }
            } else if (0xFF9E..=0xFF9F).contains(&u) || (0xE0020..=0xE007F).contains(&u) {
                // Or part of the Other_Grapheme_Extend that is not marks.
                // As of Unicode 15 that is just:
                //
                // 200C          ; Other_Grapheme_Extend # Cf       ZERO WIDTH NON-JOINER
                // FF9E..FF9F    ; Other_Grapheme_Extend # Lm   [2] HALFWIDTH KATAKANA VOICED SOUND MARK..HALFWIDTH KATAKANA SEMI-VOICED SOUND MARK
                // E0020..E007F  ; Other_Grapheme_Extend # Cf  [96] TAG SPACE..CANCEL TAG
                //
                // ZWNJ is special, we don't want to merge it as there's no need, and keeping
                // it separate results in more granular clusters.
                // Tags are used for Emoji sub-region flag sequences:
                // https://github.com/harfbuzz/harfbuzz/issues/1556
                self.info[i].set_continuation();
            }

            i += 1;
        }
    }

    fn compute_unicode_props(&mut self, i: usize) {
        let u = self.info[i].glyph_id;
        let gc = self.unicode.general_category(u);
        let mut props = gc.to_rb() as u16;

        if u >= 0x80 {
            self.scratch_flags |= HB_BUFFER_SCRATCH_FLAG_HAS_NON_ASCII;

            if self.unicode.is_default_ignorable(u) {
                self.scratch_flags |= HB_BUFFER_SCRATCH_FLAG_HAS_DEFAULT_IGNORABLES;
                props |= UnicodeProps::IGNORABLE.bits();

                match u {
                    0x200C => props |= UnicodeProps::CF_ZWNJ.bits(),
                    0x200D => props |= UnicodeProps::CF_ZWJ.bits(),
                    // Mongolian Free Variation Selectors need to be remembered
                    // because although we need to hide them like default-ignorables,
                    // they need to non-ignorable during shaping.  This is similar to
                    // what we do for joiners in Indic-like shapers, but since the
                    // FVSes are GC=Mn, we have use a separate bit to remember them.
                    // Fixes:
                    // https://github.com/harfbuzz/harfbuzz/issues/234
                    0x180B..=0x180D | 0x180F => props |= UnicodeProps::HIDDEN.bits(),
                    // TAG characters need similar treatment. Fixes:
                    // https://github.com/harfbuzz/harfbuzz/issues/463
                    0xE0020..=0xE007F => props |= UnicodeProps::HIDDEN.bits(),
                    // COMBINING GRAPHEME JOINER should not be skipped during GSUB either.
                    // https://github.com/harfbuzz/harfbuzz/issues/554
                    0x034F => {
                        props |= UnicodeProps::HIDDEN.bits();
                        self.scratch_flags |= HB_BUFFER_SCRATCH_FLAG_HAS_CGJ;
                    }
                    _ => {}
                }
            }

            if gc.is_mark() {
                props |= UnicodeProps::CONTINUATION.bits();
                props |= (self.unicode.modified_combining_class(u) as u16) << 8;
            }
        }

        self.info[i].set_unicode_props(props);
    }

    /// Groups each base with its continuations: merged into one cluster at
    /// the graphemes level, marked unsafe to break otherwise.
    pub fn form_clusters(&mut self) {
        if self.scratch_flags & HB_BUFFER_SCRATCH_FLAG_HAS_NON_ASCII == 0 {
            return;
        }

        self.assert_var(UNICODE_PROPS_VAR);

        let mut start = 0;
        while start < self.len {
            let end = self.group_end(start, |_, b| b.is_continuation());

            if self.cluster_level.is_graphemes() {
                self.merge_clusters(start, end);
            } else {
                self.unsafe_to_break(Some(start), Some(end));
            }

            start = end;
        }
    }

    /// Hides default-ignorable items: replaced by the invisible glyph (or
    /// `space_glyph`) with zero advance, or removed when there is neither or
    /// when [`BufferFlags::REMOVE_DEFAULT_IGNORABLES`] is set.
    pub fn hide_default_ignorables(&mut self, space_glyph: Option<u32>) {
        if self.scratch_flags & HB_BUFFER_SCRATCH_FLAG_HAS_DEFAULT_IGNORABLES == 0
            || self.flags.contains(BufferFlags::PRESERVE_DEFAULT_IGNORABLES)
        {
            return;
        }

        let Some(first) = self.info[..self.len]
            .iter()
            .position(hb_glyph_info_t::is_default_ignorable)
        else {
            return;
        };

        let invisible = if self.invisible != 0 {
            Some(self.invisible)
        } else {
            space_glyph
        };

        match invisible {
            Some(invisible) if !self.flags.contains(BufferFlags::REMOVE_DEFAULT_IGNORABLES) => {
                for i in first..self.len {
                    if self.info[i].is_default_ignorable() {
                        self.info[i].glyph_id = invisible;
                        if self.have_positions {
                            self.pos[i].x_advance = 0;
                            self.pos[i].y_advance = 0;
                        }
                    }
                }
            }
            _ => self.delete_glyphs_inplace(hb_glyph_info_t::is_default_ignorable),
        }
    }

    // Messaging.

    /// Installs or removes the message callback.
    pub fn set_message_func(&mut self, func: Option<Box<hb_buffer_message_func_t>>) {
        if self.is_immutable() {
            return;
        }

        self.message_func = func;
    }

    /// Checks that a message callback is installed.
    #[inline]
    pub fn messaging(&self) -> bool {
        self.message_func.is_some()
    }

    /// Delivers a message to the callback.
    ///
    /// Returns the callback's verdict, or `true` without a callback. Inside
    /// the callback the buffer is only readable and positions are not
    /// activated on demand.
    pub fn message(&mut self, args: fmt::Arguments<'_>) -> bool {
        let Some(mut func) = self.message_func.take() else {
            return true;
        };

        let mut text = String::new();
        let _ = fmt::write(&mut text, args);
        if text.len() >= MESSAGE_BUFFER_SIZE {
            let mut end = MESSAGE_BUFFER_SIZE - 1;
            while !text.is_char_boundary(end) {
                end -= 1;
            }

            text.truncate(end);
        }

        self.message_depth += 1;
        let ret = func(&*self, &text);
        self.message_depth -= 1;

        if self.message_func.is_none() {
            self.message_func = Some(func);
        }

        ret
    }
}

impl Default for hb_buffer_t {
    fn default() -> Self {
        Self::new()
    }
}

impl hb_object_ext for hb_buffer_t {
    fn header(&self) -> &hb_object_header_t {
        &self.header
    }
}

impl fmt::Debug for hb_buffer_t {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("hb_buffer_t")
            .field("content_type", &self.content_type)
            .field("props", &self.props)
            .field("successful", &self.successful)
            .field("len", &self.len)
            .field("idx", &self.idx)
            .field("out_len", &self.out_len)
            .field("have_output", &self.have_output)
            .field("have_positions", &self.have_positions)
            .finish()
    }
}

#[inline]
fn set_cluster(info: &mut hb_glyph_info_t, cluster: u32, mask: hb_mask_t) {
    if info.cluster != cluster {
        info.mask = (info.mask & !glyph_flag::DEFINED) | (mask & glyph_flag::DEFINED);
    }

    info.cluster = cluster;
}

fn find_min_cluster(infos: &[hb_glyph_info_t], cluster: u32) -> u32 {
    infos.iter().fold(cluster, |cluster, info| min(cluster, info.cluster))
}

fn infos_set_glyph_flags(
    infos: &mut [hb_glyph_info_t],
    cluster: u32,
    mask: hb_mask_t,
    level: BufferClusterLevel,
) {
    if infos.is_empty() {
        return;
    }

    let first = infos[0].cluster;
    let last = infos[infos.len() - 1].cluster;

    if level == BufferClusterLevel::Characters || (cluster != first && cluster != last) {
        for info in infos.iter_mut() {
            if info.cluster != cluster {
                info.mask |= mask;
            }
        }

        return;
    }

    // Monotone clusters
    if cluster == first {
        for info in infos.iter_mut().rev() {
            if info.cluster == cluster {
                break;
            }

            info.mask |= mask;
        }
    } else {
        for info in infos.iter_mut() {
            if info.cluster == cluster {
                break;
            }

            info.mask |= mask;
        }
    }
}

/// A buffer that contains an input string ready for shaping.
#[derive(Debug, Default)]
pub struct UnicodeBuffer(pub(crate) hb_buffer_t);

impl UnicodeBuffer {
    /// Create a new `UnicodeBuffer`.
    #[inline]
    pub fn new() -> UnicodeBuffer {
        UnicodeBuffer(hb_buffer_t::new())
    }

    /// Returns the length of the data of the buffer.
    ///
    /// This corresponds to the number of unicode codepoints contained in the
    /// buffer.
    #[inline]
    pub fn len(&self) -> usize {
        self.0.len
    }

    /// Ensures that the buffer can hold at least `size` codepoints.
    pub fn reserve(&mut self, size: usize) -> bool {
        self.0.ensure(size)
    }

    /// Returns `true` if the buffer contains no elements.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Pushes a string to a buffer.
    #[inline]
    pub fn push_str(&mut self, str: &str) {
        self.0.push_str(str);
    }

    /// Sets the pre-context for this buffer.
    #[inline]
    pub fn set_pre_context(&mut self, str: &str) {
        self.0.set_pre_context(str)
    }

    /// Sets the post-context for this buffer.
    #[inline]
    pub fn set_post_context(&mut self, str: &str) {
        self.0.set_post_context(str)
    }

    /// Appends a character to a buffer with the given cluster value.
    #[inline]
    pub fn add(&mut self, codepoint: char, cluster: u32) {
        self.0.add(codepoint as u32, cluster);
    }

    /// Set the text direction of the `Buffer`'s contents.
    #[inline]
    pub fn set_direction(&mut self, direction: Direction) {
        self.0.set_direction(direction);
    }

    /// Returns the `Buffer`'s text direction.
    #[inline]
    pub fn direction(&self) -> Direction {
        self.0.direction()
    }

    /// Set the script from an ISO15924 tag.
    #[inline]
    pub fn set_script(&mut self, script: Script) {
        self.0.set_script(Some(script));
    }

    /// Get the ISO15924 script tag.
    pub fn script(&self) -> Script {
        self.0.script().unwrap_or(script::UNKNOWN)
    }

    /// Set the buffer language.
    #[inline]
    pub fn set_language(&mut self, lang: Language) {
        self.0.set_language(Some(lang));
    }

    /// Get the buffer language.
    #[inline]
    pub fn language(&self) -> Option<Language> {
        self.0.language().cloned()
    }

    /// Guess the segment properties (direction, language, script) for the
    /// current buffer.
    #[inline]
    pub fn guess_segment_properties(&mut self) {
        self.0.guess_segment_properties()
    }

    /// Set the flags for this buffer.
    #[inline]
    pub fn set_flags(&mut self, flags: BufferFlags) {
        self.0.set_flags(flags);
    }

    /// Get the flags for this buffer.
    #[inline]
    pub fn flags(&self) -> BufferFlags {
        self.0.flags()
    }

    /// Set the cluster level of the buffer.
    #[inline]
    pub fn set_cluster_level(&mut self, cluster_level: BufferClusterLevel) {
        self.0.set_cluster_level(cluster_level)
    }

    /// Retrieve the cluster level of the buffer.
    #[inline]
    pub fn cluster_level(&self) -> BufferClusterLevel {
        self.0.cluster_level()
    }

    /// Resets clusters.
    #[inline]
    pub fn reset_clusters(&mut self) {
        self.0.reset_clusters();
    }

    /// Clear the contents of the buffer.
    #[inline]
    pub fn clear(&mut self) {
        self.0.clear_contents()
    }

    /// Gives a shaping client the underlying buffer.
    #[inline]
    pub fn into_inner(self) -> hb_buffer_t {
        self.0
    }
}

/// A buffer that contains the results of the shaping process.
#[derive(Debug)]
pub struct GlyphBuffer(pub(crate) hb_buffer_t);

impl GlyphBuffer {
    /// Wraps a buffer a shaping client has filled with glyphs.
    ///
    /// Positions are activated if the client did not do it.
    pub fn from_shaped(mut buffer: hb_buffer_t) -> Self {
        buffer.content_type = BufferContentType::Glyphs;
        if !buffer.have_positions {
            buffer.clear_positions();
        }

        GlyphBuffer(buffer)
    }

    /// Returns the length of the data of the buffer.
    ///
    /// When called before shaping this is the number of unicode codepoints
    /// contained in the buffer. When called after shaping it returns the number
    /// of glyphs stored.
    #[inline]
    pub fn len(&self) -> usize {
        self.0.len
    }

    /// Returns `true` if the buffer contains no elements.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Get the glyph infos.
    #[inline]
    pub fn glyph_infos(&self) -> &[hb_glyph_info_t] {
        self.0.glyph_infos()
    }

    /// Get the glyph positions.
    #[inline]
    pub fn glyph_positions(&self) -> &[GlyphPosition] {
        self.0.glyph_positions()
    }

    /// Reorders glyphs and moves advances so that the result no longer
    /// depends on the shaper's ordering choices within a cluster.
    #[inline]
    pub fn normalize_glyphs(&mut self) {
        self.0.normalize_glyphs();
    }

    /// Clears the content of the glyph buffer and returns an empty
    /// `UnicodeBuffer` reusing the existing allocation.
    #[inline]
    pub fn clear(mut self) -> UnicodeBuffer {
        self.0.clear_contents();
        UnicodeBuffer(self.0)
    }

    /// The underlying buffer.
    #[inline]
    pub fn as_buffer(&self) -> &hb_buffer_t {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn buffer_from(codepoints: &[u32]) -> hb_buffer_t {
        let mut buffer = hb_buffer_t::new();
        buffer.add_codepoints(codepoints, Some(codepoints.len()), 0, None);
        buffer
    }

    fn clusters(infos: &[hb_glyph_info_t]) -> Vec<u32> {
        infos.iter().map(|info| info.cluster).collect()
    }

    #[test]
    fn storage_arrays_stay_in_step() {
        let mut buffer = hb_buffer_t::new();
        assert!(buffer.ensure(100));
        assert!(buffer.allocated() > 100);
        assert_eq!(buffer.info.len(), buffer.pos.len());
        assert!(buffer.ensure(0));
    }

    #[test]
    fn growth_past_max_len_poisons() {
        let mut buffer = buffer_from(&[0x41]);
        buffer.enter();
        assert_eq!(buffer.max_len, 16384);
        assert!(!buffer.ensure(20000));
        assert!(!buffer.allocation_successful());
        assert!(matches!(
            buffer.last_error(),
            Some(BufferError::CapacityExceeded { requested: 20000, max_len: 16384 })
        ));

        // Sticky until cleared.
        buffer.add(0x42, 1);
        assert_eq!(buffer.len(), 1);
        assert!(!buffer.set_length(0));
        assert_eq!(buffer.len(), 1);

        buffer.clear_contents();
        assert!(buffer.allocation_successful());
        assert_eq!(buffer.last_error(), None);
    }

    fn assert_storage_kept(buffer: &hb_buffer_t, allocated: usize) {
        assert_eq!(buffer.info.len(), buffer.pos.len());
        assert_eq!(buffer.allocated(), allocated);
        assert!(buffer.len <= buffer.allocated());
        assert!(buffer.out_len <= buffer.allocated());
    }

    #[test]
    fn storage_stays_in_step_when_growth_fails() {
        let mut buffer = buffer_from(&[0x41]);
        buffer.enter();
        let allocated = buffer.allocated();
        assert!(!buffer.ensure(20000));
        assert_storage_kept(&buffer, allocated);

        let mut buffer = buffer_from(&[1, 2]);
        buffer.set_limits(BufferLimits {
            max_len_factor: 1,
            max_len_min: 1,
            ..BufferLimits::default()
        });
        buffer.enter();
        buffer.clear_output();
        let allocated = buffer.allocated();
        assert!(!buffer.make_room_for(0, 100));
        assert_storage_kept(&buffer, allocated);
        assert_eq!(buffer.len, 2);

        let mut buffer = buffer_from(&[1, 2]);
        buffer.set_limits(BufferLimits {
            max_len_factor: 1,
            max_len_min: 4,
            ..BufferLimits::default()
        });
        buffer.enter();
        buffer.clear_output();
        let allocated = buffer.allocated();
        assert!(!buffer.shift_forward(100));
        assert_storage_kept(&buffer, allocated);
        assert_eq!((buffer.len, buffer.idx), (2, 0));
    }

    #[test]
    fn backward_move_under_exhausted_budget() {
        let mut buffer = buffer_from(&[1, 2]);
        buffer.set_limits(BufferLimits {
            max_ops_factor: 0,
            max_ops_min: 0,
            ..BufferLimits::default()
        });
        buffer.enter();
        buffer.clear_output();
        buffer.replace_glyphs(1, 3, &[10, 11, 12]);
        assert_eq!((buffer.idx, buffer.out_len), (1, 3));

        let allocated = buffer.allocated();
        assert!(!buffer.move_to(0));
        assert!(!buffer.allocation_successful());
        assert_eq!(buffer.last_error(), Some(BufferError::OperationLimitExceeded));
        assert_storage_kept(&buffer, allocated);
        assert_eq!((buffer.len, buffer.idx, buffer.out_len), (2, 1, 3));

        // The failed sync keeps the previous contents.
        assert!(!buffer.sync());
        let glyphs: Vec<u32> = buffer.glyph_infos().iter().map(|i| i.glyph_id).collect();
        assert_eq!(glyphs, [1, 2]);
        assert_storage_kept(&buffer, allocated);
    }

    #[test]
    fn shift_forward_clears_the_gap() {
        let mut buffer = buffer_from(&[1, 2]);
        buffer.clear_output();
        buffer.idx = 1;
        assert!(buffer.shift_forward(3));
        assert_eq!(buffer.len, 5);
        assert_eq!(buffer.idx, 4);
        assert_eq!(buffer.info[4].glyph_id, 2);
        assert_eq!(buffer.info[2].glyph_id, 0);
        assert_eq!(buffer.info[3].glyph_id, 0);
    }

    #[test]
    fn separate_output_after_sync_swaps_storage() {
        let mut buffer = buffer_from(&[1, 2]);
        buffer.clear_output();
        buffer.replace_glyphs(1, 3, &[10, 11, 12]);
        assert!(buffer.have_separate_output);
        buffer.next_glyph();
        assert!(buffer.sync());
        assert!(!buffer.have_separate_output);
        assert_eq!(buffer.info.len(), buffer.pos.len());

        let glyphs: Vec<u32> = buffer.glyph_infos().iter().map(|i| i.glyph_id).collect();
        assert_eq!(glyphs, [10, 11, 12, 2]);
        assert_eq!(clusters(buffer.glyph_infos()), [0, 0, 0, 1]);
    }

    #[test]
    fn sync_so_far_keeps_the_cursor_on_the_same_item() {
        let mut buffer = buffer_from(&[1, 2, 3]);
        buffer.clear_output();
        buffer.replace_glyphs(1, 2, &[10, 11]);
        assert_eq!(buffer.idx, 1);
        assert_eq!(buffer.sync_so_far(), 1);
        assert_eq!(buffer.idx, 2);
        assert_eq!(buffer.out_len, 2);
        assert_eq!(buffer.cur(0).glyph_id, 2);
        assert!(buffer.have_output);
    }

    #[test]
    fn interior_flags_spare_the_minimum_cluster() {
        let mut buffer = buffer_from(&[1, 2, 3]);
        buffer.info[1].cluster = 0;
        buffer.info[2].cluster = 2;
        buffer.unsafe_to_break(Some(0), Some(3));

        let infos = buffer.glyph_infos();
        assert!(!infos[0].unsafe_to_break());
        assert!(!infos[1].unsafe_to_break());
        assert!(infos[2].unsafe_to_break());
        assert!(infos[2].unsafe_to_concat());
        assert_ne!(buffer.scratch_flags & HB_BUFFER_SCRATCH_FLAG_HAS_GLYPH_FLAGS, 0);
    }

    #[test]
    fn unsafe_to_concat_requires_the_flag() {
        let mut buffer = buffer_from(&[1, 2]);
        buffer.unsafe_to_concat(None, None);
        assert!(!buffer.glyph_infos()[0].unsafe_to_concat());

        buffer.set_flags(BufferFlags::PRODUCE_UNSAFE_TO_CONCAT);
        buffer.unsafe_to_concat(None, None);
        assert!(buffer.glyph_infos().iter().all(|i| i.unsafe_to_concat()));
    }

    #[test]
    fn tatweel_falls_back_to_unsafe_to_break() {
        let mut buffer = buffer_from(&[1, 2]);
        buffer.safe_to_insert_tatweel(Some(0), Some(2));
        assert!(buffer.glyph_infos()[1].unsafe_to_break());
        assert!(!buffer.glyph_infos()[1].safe_to_insert_tatweel());
    }

    #[test]
    fn serials_skip_zero() {
        let mut buffer = hb_buffer_t::new();
        buffer.serial = u8::MAX;
        assert_eq!(buffer.next_serial(), 1);

        buffer.serial = 7;
        assert_eq!(buffer.allocate_lig_id(), 1);
    }

    #[test]
    fn random_numbers() {
        let mut buffer = hb_buffer_t::new();
        assert_eq!(buffer.random_number(), 48271);
        assert_eq!(buffer.random_number(), 182605794);
        buffer.clear_contents();
        assert_eq!(buffer.random_state(), 1);
    }

    #[test]
    fn var_bits() {
        assert_eq!(UNICODE_PROPS_VAR.bits(), 0b0011_0000);
        assert_eq!(hb_buffer_var_t::new(0, 4).bits(), 0x0F);

        let mut buffer = hb_buffer_t::new();
        buffer.allocate_var(hb_buffer_var_t::new(0, 1));
        buffer.allocate_unicode_vars();
        buffer.deallocate_unicode_vars();
        buffer.leave();
        assert_eq!(buffer.allocated_var_bits, 0);
    }
}
