use super::buffer::{hb_buffer_t, hb_glyph_info_t, BufferContentType, GlyphPosition};

impl hb_buffer_t {
    /// Reorders glyphs and moves advances so that the result no longer
    /// depends on the shaper's ordering choices within a cluster.
    ///
    /// Within each cluster the advances are folded into the offsets and the
    /// whole cluster advance is carried by one glyph: the first in forward
    /// directions, the last in backward ones. The remaining glyphs are then
    /// stably sorted by descending glyph id. The total advance is preserved.
    pub fn normalize_glyphs(&mut self) {
        debug_assert!(self.has_positions());
        debug_assert!(
            self.content_type() == BufferContentType::Glyphs
                || (self.len == 0 && self.content_type() == BufferContentType::Invalid)
        );

        if !self.has_positions() {
            return;
        }

        let backward = self.direction().is_backward();

        let mut start = 0;
        while start < self.len {
            let end = self.next_cluster(start);
            normalize_glyphs_cluster(
                &mut self.info[start..end],
                &mut self.pos[start..end],
                backward,
            );
            start = end;
        }
    }
}

fn normalize_glyphs_cluster(
    infos: &mut [hb_glyph_info_t],
    pos: &mut [GlyphPosition],
    backward: bool,
) {
    let mut total_x_advance: i32 = 0;
    let mut total_y_advance: i32 = 0;
    for p in pos.iter() {
        total_x_advance = total_x_advance.wrapping_add(p.x_advance);
        total_y_advance = total_y_advance.wrapping_add(p.y_advance);
    }

    let mut x_advance: i32 = 0;
    let mut y_advance: i32 = 0;
    for p in pos.iter_mut() {
        p.x_offset = p.x_offset.wrapping_add(x_advance);
        p.y_offset = p.y_offset.wrapping_add(y_advance);

        x_advance = x_advance.wrapping_add(p.x_advance);
        y_advance = y_advance.wrapping_add(p.y_advance);

        p.x_advance = 0;
        p.y_advance = 0;
    }

    let last = pos.len() - 1;
    if backward {
        // Transfer all cluster advance to the last glyph.
        pos[last].x_advance = total_x_advance;
        pos[last].y_advance = total_y_advance;

        sort_by_glyph_descending(&mut infos[..last], &mut pos[..last]);
    } else {
        // Transfer all cluster advance to the first glyph.
        pos[0].x_advance = pos[0].x_advance.wrapping_add(total_x_advance);
        pos[0].y_advance = pos[0].y_advance.wrapping_add(total_y_advance);
        for p in &mut pos[1..] {
            p.x_offset = p.x_offset.wrapping_sub(total_x_advance);
            p.y_offset = p.y_offset.wrapping_sub(total_y_advance);
        }

        sort_by_glyph_descending(&mut infos[1..], &mut pos[1..]);
    }
}

// Stable insertion sort, moving positions along with their glyphs.
fn sort_by_glyph_descending(infos: &mut [hb_glyph_info_t], pos: &mut [GlyphPosition]) {
    for i in 1..infos.len() {
        let mut j = i;
        while j > 0 && infos[j - 1].glyph_id < infos[j].glyph_id {
            infos.swap(j - 1, j);
            pos.swap(j - 1, j);
            j -= 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(glyph_id: u32, cluster: u32) -> hb_glyph_info_t {
        hb_glyph_info_t {
            glyph_id,
            cluster,
            ..hb_glyph_info_t::default()
        }
    }

    fn advance(x_advance: i32) -> GlyphPosition {
        GlyphPosition {
            x_advance,
            ..GlyphPosition::default()
        }
    }

    #[test]
    fn forward_cluster() {
        let mut infos = [info(1, 0), info(5, 0), info(3, 0)];
        let mut pos = [advance(10), advance(20), advance(30)];
        normalize_glyphs_cluster(&mut infos, &mut pos, false);

        assert_eq!(infos.map(|i| i.glyph_id), [1, 5, 3]);
        assert_eq!(pos.map(|p| p.x_advance), [60, 0, 0]);
        // Offsets keep every glyph where it was drawn before.
        assert_eq!(pos.map(|p| p.x_offset), [0, 10 - 60, 30 - 60]);
    }

    #[test]
    fn backward_cluster() {
        let mut infos = [info(1, 0), info(5, 0), info(3, 0)];
        let mut pos = [advance(10), advance(20), advance(30)];
        normalize_glyphs_cluster(&mut infos, &mut pos, true);

        assert_eq!(infos.map(|i| i.glyph_id), [5, 1, 3]);
        assert_eq!(pos.map(|p| p.x_advance), [0, 0, 60]);
        assert_eq!(pos.map(|p| p.x_offset), [10, 0, 30]);
    }

    #[test]
    fn sort_is_stable() {
        let mut infos = [info(2, 0), info(7, 1), info(2, 2), info(7, 3)];
        let mut pos = [GlyphPosition::default(); 4];
        sort_by_glyph_descending(&mut infos, &mut pos);
        assert_eq!(infos.map(|i| i.cluster), [1, 3, 0, 2]);
    }
}
