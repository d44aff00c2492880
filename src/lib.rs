/*!
A [harfbuzz](https://github.com/harfbuzz/harfbuzz)-compatible shaping buffer.

The buffer is the working memory of a text shaper: it takes in Unicode text,
tracks how output glyphs map back to input clusters while a shaper rewrites
the glyph string, and hands out glyph infos and positions at the end.

```
use glyphbuf::{BufferClusterLevel, UnicodeBuffer};

let mut buffer = UnicodeBuffer::new();
buffer.push_str("Hello");
buffer.set_cluster_level(BufferClusterLevel::MonotoneCharacters);
buffer.guess_segment_properties();
assert_eq!(buffer.len(), 5);
```
*/

#![warn(missing_docs)]

extern crate alloc;

mod hb;

pub use ttf_parser::Tag;

pub use hb::buffer::hb_buffer_t as Buffer;
pub use hb::buffer::hb_glyph_info_t as GlyphInfo;
pub use hb::buffer::{
    glyph_flag, hb_buffer_message_func_t as MessageFunc, hb_buffer_var_t as BufferVar,
    BufferClusterLevel, BufferContentType, BufferFlags, BufferLimits, GlyphBuffer, GlyphPosition,
    UnicodeBuffer, UNICODE_PROPS_VAR,
};
pub use hb::buffer::{
    HB_BUFFER_SCRATCH_FLAG_DEFAULT, HB_BUFFER_SCRATCH_FLAG_HAS_BROKEN_SYLLABLE,
    HB_BUFFER_SCRATCH_FLAG_HAS_CGJ, HB_BUFFER_SCRATCH_FLAG_HAS_DEFAULT_IGNORABLES,
    HB_BUFFER_SCRATCH_FLAG_HAS_GLYPH_FLAGS, HB_BUFFER_SCRATCH_FLAG_HAS_GPOS_ATTACHMENT,
    HB_BUFFER_SCRATCH_FLAG_HAS_NON_ASCII, HB_BUFFER_SCRATCH_FLAG_HAS_SPACE_FALLBACK,
    HB_BUFFER_SCRATCH_FLAG_SHAPER0,
};
pub use hb::buffer_diff::BufferDiffFlags;
pub use hb::common::hb_segment_properties_t as SegmentProperties;
pub use hb::common::{script, Direction, Language, Script};
pub use hb::errors::BufferError;
pub use hb::object::hb_user_data_key_t as UserDataKey;
pub use hb::object::{hb_object_ext as ObjectExt, hb_object_header_t as ObjectHeader, Shared};
pub use hb::unicode::hb_unicode_funcs_default as DefaultUnicodeFuncs;
pub use hb::unicode::hb_unicode_funcs_t as UnicodeFuncsHandle;
pub use hb::unicode::{GeneralCategory, GeneralCategoryExt, UnicodeFuncs, UnicodeProps};
