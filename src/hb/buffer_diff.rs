use super::buffer::{glyph_flag, hb_buffer_t, BufferContentType};

bitflags::bitflags! {
    /// How a buffer differs from a reference buffer.
    ///
    /// Anything except `NOTDEF_PRESENT` and `DOTTED_CIRCLE_PRESENT` is a
    /// real difference.
    #[derive(Default, Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct BufferDiffFlags: u32 {
        /// Equal buffers.
        const EQUAL                 = 0x0000;
        /// Buffers with different content types.
        const CONTENT_TYPE_MISMATCH = 0x0001;
        /// Buffers with differing length.
        const LENGTH_MISMATCH       = 0x0002;
        /// `.notdef` glyph is present in the reference buffer.
        const NOTDEF_PRESENT        = 0x0004;
        /// Dotted circle glyph is present in the reference buffer.
        const DOTTED_CIRCLE_PRESENT = 0x0008;
        /// Difference in codepoint / glyph id.
        const CODEPOINT_MISMATCH    = 0x0010;
        /// Difference in cluster.
        const CLUSTER_MISMATCH      = 0x0020;
        /// Difference in glyph flags.
        const GLYPH_FLAGS_MISMATCH  = 0x0040;
        /// Difference in glyph position.
        const POSITION_MISMATCH     = 0x0080;
    }
}

impl hb_buffer_t {
    /// Compares this buffer with `reference`.
    ///
    /// `dottedcircle_glyph` enables the dotted circle and `.notdef` presence
    /// checks. Positions compare equal while every field differs by at most
    /// `position_fuzz`.
    ///
    /// Glyph buffers are expected to carry positions on both sides. Debug
    /// builds assert this; release builds skip the position comparison.
    pub fn diff(
        &self,
        reference: &hb_buffer_t,
        dottedcircle_glyph: Option<u32>,
        position_fuzz: u32,
    ) -> BufferDiffFlags {
        if self.content_type() != reference.content_type() && self.len != 0 && reference.len != 0
        {
            return BufferDiffFlags::CONTENT_TYPE_MISMATCH;
        }

        let mut result = BufferDiffFlags::EQUAL;
        let contains = dottedcircle_glyph.is_some();
        let dottedcircle_glyph = dottedcircle_glyph.unwrap_or(u32::MAX);

        let ref_info = reference.glyph_infos();

        if self.len != reference.len {
            result |= BufferDiffFlags::LENGTH_MISMATCH;
        }

        if contains {
            for info in ref_info {
                if info.glyph_id == dottedcircle_glyph {
                    result |= BufferDiffFlags::DOTTED_CIRCLE_PRESENT;
                }

                if info.glyph_id == 0 {
                    result |= BufferDiffFlags::NOTDEF_PRESENT;
                }
            }
        }

        if self.len != reference.len {
            return result;
        }

        for (buf, rf) in self.glyph_infos().iter().zip(ref_info) {
            if buf.glyph_id != rf.glyph_id {
                result |= BufferDiffFlags::CODEPOINT_MISMATCH;
            }

            if buf.cluster != rf.cluster {
                result |= BufferDiffFlags::CLUSTER_MISMATCH;
            }

            if (buf.mask ^ rf.mask) & glyph_flag::DEFINED != 0 {
                result |= BufferDiffFlags::GLYPH_FLAGS_MISMATCH;
            }
        }

        if self.content_type() == BufferContentType::Glyphs && self.len != 0 {
            debug_assert!(
                self.has_positions() && reference.has_positions(),
                "glyph buffers compared without positions"
            );
        }

        if self.content_type() == BufferContentType::Glyphs
            && self.has_positions()
            && reference.has_positions()
        {
            let positions = self.glyph_positions().iter().zip(reference.glyph_positions());
            for (buf, rf) in positions {
                if buf.x_advance.abs_diff(rf.x_advance) > position_fuzz
                    || buf.y_advance.abs_diff(rf.y_advance) > position_fuzz
                    || buf.x_offset.abs_diff(rf.x_offset) > position_fuzz
                    || buf.y_offset.abs_diff(rf.y_offset) > position_fuzz
                {
                    result |= BufferDiffFlags::POSITION_MISMATCH;
                    break;
                }
            }
        }

        result
    }
}
