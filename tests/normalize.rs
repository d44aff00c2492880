use glyphbuf::*;

fn shaped(direction: Direction) -> GlyphBuffer {
    let mut buffer = Buffer::new();
    buffer.set_direction(direction);
    buffer.add_codepoints(&[1, 5, 3, 2], Some(4), 0, None);
    for (info, cluster) in buffer.glyph_infos_mut().iter_mut().zip([0, 0, 0, 1]) {
        info.cluster = cluster;
    }

    for (i, pos) in buffer.get_glyph_positions().unwrap().iter_mut().enumerate() {
        pos.x_advance = (i as i32 + 1) * 10;
        pos.y_offset = 7;
    }

    GlyphBuffer::from_shaped(buffer)
}

fn total_advance(buffer: &GlyphBuffer) -> i32 {
    buffer.glyph_positions().iter().map(|pos| pos.x_advance).sum()
}

#[test]
fn from_shaped_activates_positions() {
    let mut buffer = Buffer::new();
    buffer.add_codepoints(&[1, 2], Some(2), 0, None);
    let buffer = GlyphBuffer::from_shaped(buffer);

    assert_eq!(buffer.len(), 2);
    assert_eq!(buffer.glyph_positions().len(), 2);
    assert_eq!(buffer.as_buffer().content_type(), BufferContentType::Glyphs);
}

#[test]
fn forward_cluster_advance_moves_to_the_first_glyph() {
    let mut buffer = shaped(Direction::LeftToRight);
    let before = total_advance(&buffer);
    buffer.normalize_glyphs();

    assert_eq!(total_advance(&buffer), before);
    let ids: Vec<u32> = buffer.glyph_infos().iter().map(|i| i.glyph_id).collect();
    assert_eq!(ids, [1, 5, 3, 2]);

    let advances: Vec<i32> = buffer.glyph_positions().iter().map(|p| p.x_advance).collect();
    assert_eq!(advances, [60, 0, 0, 40]);
    assert!(buffer.glyph_positions().iter().all(|p| p.y_offset == 7));
}

#[test]
fn backward_cluster_advance_moves_to_the_last_glyph() {
    let mut buffer = shaped(Direction::RightToLeft);
    let before = total_advance(&buffer);
    buffer.normalize_glyphs();

    assert_eq!(total_advance(&buffer), before);
    let ids: Vec<u32> = buffer.glyph_infos().iter().map(|i| i.glyph_id).collect();
    assert_eq!(ids, [5, 1, 3, 2]);

    let advances: Vec<i32> = buffer.glyph_positions().iter().map(|p| p.x_advance).collect();
    assert_eq!(advances, [0, 0, 60, 40]);
}

#[test]
fn clear_keeps_configuration() {
    let mut buffer = Buffer::new();
    buffer.set_cluster_level(BufferClusterLevel::Characters);
    buffer.add_codepoints(&[1], Some(1), 0, None);

    let unicode = GlyphBuffer::from_shaped(buffer).clear();
    assert!(unicode.is_empty());
    assert_eq!(unicode.cluster_level(), BufferClusterLevel::Characters);
}
