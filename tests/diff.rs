use glyphbuf::*;

fn shaped(glyphs: &[u32]) -> Buffer {
    let mut buffer = Buffer::new();
    buffer.add_codepoints(glyphs, Some(glyphs.len()), 0, None);
    buffer.set_content_type(BufferContentType::Glyphs);
    for pos in buffer.get_glyph_positions().unwrap() {
        pos.x_advance = 100;
    }

    buffer
}

#[test]
fn equal_buffers() {
    let mut a = Buffer::new();
    a.push_str("abc");
    let mut b = Buffer::new();
    b.push_str("abc");

    assert_eq!(a.diff(&b, None, 0), BufferDiffFlags::EQUAL);
    assert_eq!(shaped(&[1, 2]).diff(&shaped(&[1, 2]), Some(3), 0), BufferDiffFlags::EQUAL);
}

#[test]
fn content_type_mismatch_short_circuits() {
    let mut a = Buffer::new();
    a.push_str("a");
    let b = shaped(&[1, 2]);

    assert_eq!(a.diff(&b, Some(1), 0), BufferDiffFlags::CONTENT_TYPE_MISMATCH);
}

#[test]
fn empty_buffer_has_no_content_type_to_mismatch() {
    let a = Buffer::new();
    let b = shaped(&[1]);
    assert_eq!(a.diff(&b, None, 0), BufferDiffFlags::LENGTH_MISMATCH);
}

#[test]
fn length_mismatch_still_reports_presence() {
    let a = shaped(&[1, 2]);
    let reference = shaped(&[0, 7, 3]);

    assert_eq!(
        a.diff(&reference, Some(7), 0),
        BufferDiffFlags::LENGTH_MISMATCH
            | BufferDiffFlags::DOTTED_CIRCLE_PRESENT
            | BufferDiffFlags::NOTDEF_PRESENT
    );
    assert_eq!(a.diff(&reference, None, 0), BufferDiffFlags::LENGTH_MISMATCH);
}

#[test]
fn presence_flags_come_from_the_reference() {
    let a = shaped(&[0, 7]);
    let reference = shaped(&[1, 2]);
    assert_eq!(
        a.diff(&reference, Some(7), 0),
        BufferDiffFlags::CODEPOINT_MISMATCH
    );
}

#[test]
fn codepoint_and_cluster_mismatch() {
    let a = shaped(&[1, 2]);
    let mut b = shaped(&[1, 3]);
    b.glyph_infos_mut()[0].cluster = 5;

    assert_eq!(
        a.diff(&b, None, 0),
        BufferDiffFlags::CODEPOINT_MISMATCH | BufferDiffFlags::CLUSTER_MISMATCH
    );
}

#[test]
fn only_defined_glyph_flags_count() {
    let a = shaped(&[1, 2]);

    let mut b = shaped(&[1, 2]);
    b.glyph_infos_mut()[1].mask |= 0x100;
    assert_eq!(a.diff(&b, None, 0), BufferDiffFlags::EQUAL);

    b.glyph_infos_mut()[1].mask |= glyph_flag::UNSAFE_TO_BREAK;
    assert_eq!(a.diff(&b, None, 0), BufferDiffFlags::GLYPH_FLAGS_MISMATCH);
}

#[test]
fn position_fuzz_is_inclusive() {
    let a = shaped(&[1, 2]);
    let mut b = shaped(&[1, 2]);
    b.get_glyph_positions().unwrap()[1].x_offset = -2;

    assert_eq!(a.diff(&b, None, 2), BufferDiffFlags::EQUAL);
    assert_eq!(a.diff(&b, None, 1), BufferDiffFlags::POSITION_MISMATCH);
}

#[test]
#[cfg(debug_assertions)]
#[should_panic(expected = "without positions")]
fn positions_need_both_sides() {
    let a = shaped(&[1, 2]);
    let mut b = Buffer::new();
    b.add_codepoints(&[1, 2], Some(2), 0, None);
    b.set_content_type(BufferContentType::Glyphs);

    a.diff(&b, None, 0);
}
