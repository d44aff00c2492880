use std::sync::{Arc, Mutex};

use glyphbuf::*;

fn glyph_ids(buffer: &Buffer) -> Vec<u32> {
    buffer.glyph_infos().iter().map(|info| info.glyph_id).collect()
}

#[test]
fn new_buffer_is_empty() {
    let buffer = Buffer::new();
    assert_eq!(buffer.len(), 0);
    assert_eq!(buffer.content_type(), BufferContentType::Invalid);
    assert_eq!(buffer.direction(), Direction::Invalid);
    assert_eq!(buffer.script(), None);
    assert_eq!(buffer.replacement_codepoint(), 0xFFFD);
    assert!(buffer.allocation_successful());
    assert!(!buffer.has_positions());
    assert!(buffer.glyph_positions().is_empty());
}

#[test]
fn set_length_resets_content_type() {
    let mut buffer = Buffer::new();
    buffer.push_str("abc");
    assert_eq!(buffer.content_type(), BufferContentType::Unicode);

    assert!(buffer.set_length(0));
    assert_eq!(buffer.len(), 0);
    assert_eq!(buffer.content_type(), BufferContentType::Invalid);

    assert!(buffer.set_length(5));
    assert_eq!(buffer.len(), 5);
    assert_eq!(buffer.content_type(), BufferContentType::Invalid);
    assert!(buffer
        .glyph_infos()
        .iter()
        .all(|info| *info == GlyphInfo::default()));
}

#[test]
fn set_length_drops_post_context() {
    let mut buffer = Buffer::new();
    buffer.add_utf8(b"abcdef", Some(6), 2, Some(2));
    assert_eq!(buffer.context(0), &[0x62, 0x61]);
    assert_eq!(buffer.context(1), &[0x65, 0x66]);

    assert!(buffer.set_length(1));
    assert_eq!(buffer.context(0), &[0x62, 0x61]);
    assert_eq!(buffer.context_len(1), 0);

    assert!(buffer.set_length(0));
    assert_eq!(buffer.context_len(0), 0);
}

#[test]
fn reset_restores_configuration() {
    let mut buffer = Buffer::new();
    buffer.set_flags(BufferFlags::BEGINNING_OF_TEXT);
    buffer.set_cluster_level(BufferClusterLevel::Characters);
    buffer.set_replacement_codepoint(0x3F);
    buffer.set_invisible_glyph(3);
    buffer.set_direction(Direction::RightToLeft);
    buffer.push_str("abc");

    buffer.clear_contents();
    assert_eq!(buffer.len(), 0);
    assert_eq!(buffer.direction(), Direction::Invalid);
    assert_eq!(buffer.flags(), BufferFlags::BEGINNING_OF_TEXT);
    assert_eq!(buffer.cluster_level(), BufferClusterLevel::Characters);
    assert_eq!(buffer.replacement_codepoint(), 0x3F);

    buffer.reset();
    assert_eq!(buffer.flags(), BufferFlags::empty());
    assert_eq!(buffer.cluster_level(), BufferClusterLevel::MonotoneGraphemes);
    assert_eq!(buffer.replacement_codepoint(), 0xFFFD);
    assert_eq!(buffer.invisible_glyph(), 0);
}

#[test]
fn create_similar_copies_configuration_only() {
    let mut buffer = Buffer::new();
    buffer.set_flags(BufferFlags::REMOVE_DEFAULT_IGNORABLES);
    buffer.set_not_found_glyph(9);
    buffer.set_direction(Direction::RightToLeft);
    buffer.push_str("abc");

    let similar = Buffer::create_similar(&buffer);
    assert_eq!(similar.len(), 0);
    assert_eq!(similar.flags(), BufferFlags::REMOVE_DEFAULT_IGNORABLES);
    assert_eq!(similar.not_found_glyph(), 9);
    assert_eq!(similar.direction(), Direction::Invalid);
}

#[test]
fn immutable_buffer_ignores_mutations() {
    let mut buffer = Buffer::new();
    buffer.push_str("ab");
    buffer.make_immutable();

    buffer.set_direction(Direction::RightToLeft);
    buffer.push_str("cd");
    buffer.add(0x41, 9);
    assert_eq!(buffer.direction(), Direction::Invalid);
    assert_eq!(buffer.len(), 2);

    assert!(buffer.set_length(0));
    assert!(!buffer.set_length(3));
    assert_eq!(buffer.len(), 2);
    assert_eq!(buffer.try_set_length(3), Err(BufferError::Immutable));
    assert_eq!(
        buffer.try_add_utf8(b"x", None, 0, None),
        Err(BufferError::Immutable)
    );

    buffer.set_random_state(42);
    assert_eq!(buffer.random_state(), 1);
    buffer.set_message_func(Some(Box::new(|_: &Buffer, _: &str| true)));
    assert!(!buffer.messaging());

    // Not sticky.
    assert!(buffer.allocation_successful());
}

#[test]
fn poisoned_buffer_stays_poisoned() {
    let mut buffer = Buffer::new();
    buffer.set_limits(BufferLimits {
        max_len_factor: 1,
        max_len_min: 4,
        ..BufferLimits::default()
    });
    buffer.push_str("ab");
    buffer.enter();

    assert!(!buffer.pre_allocate(100));
    assert!(!buffer.allocation_successful());
    assert_eq!(
        buffer.last_error(),
        Some(BufferError::CapacityExceeded {
            requested: 100,
            max_len: 4
        })
    );

    buffer.push_str("cd");
    buffer.add(0x41, 0);
    assert!(!buffer.set_length(0));
    assert_eq!(buffer.try_set_length(1), Err(BufferError::Poisoned));
    assert_eq!(buffer.try_ensure(1), Err(BufferError::Poisoned));
    assert_eq!(
        buffer.try_add_utf8(b"x", None, 0, None),
        Err(BufferError::Poisoned)
    );
    assert_eq!(glyph_ids(&buffer), [0x61, 0x62]);

    buffer.leave();
    assert!(!buffer.allocation_successful());

    buffer.clear_contents();
    assert!(buffer.allocation_successful());
    buffer.push_str("x");
    assert_eq!(buffer.len(), 1);
}

#[test]
fn enter_computes_ceilings() {
    let mut buffer = Buffer::new();
    buffer.push_str("abc");
    buffer.enter();

    // The minimum applies to short input.
    assert!(buffer.pre_allocate(16000));
    assert!(buffer.allocation_successful());

    buffer.leave();
    assert!(buffer.pre_allocate(20000));
    assert!(buffer.allocation_successful());
}

#[test]
fn operation_budget() {
    let mut buffer = Buffer::new();
    buffer.set_limits(BufferLimits {
        max_ops_factor: 1,
        max_ops_min: 2,
        ..BufferLimits::default()
    });
    buffer.push_str("abc");
    buffer.enter();

    assert!(buffer.consume_ops(3));
    assert!(!buffer.consume_ops(1));
    assert_eq!(
        buffer.last_error(),
        Some(BufferError::OperationLimitExceeded)
    );
}

#[test]
fn sync_without_pending_work() {
    let mut buffer = Buffer::new();
    buffer.push_str("ab");
    buffer.clear_output();
    assert!(buffer.sync());
    assert_eq!(glyph_ids(&buffer), [0x61, 0x62]);
    assert!(!buffer.have_output());

    let mut buffer = Buffer::new();
    buffer.clear_output();
    assert!(buffer.sync());
    assert_eq!(buffer.len(), 0);
}

#[test]
fn sync_needs_output_mode() {
    let mut buffer = Buffer::new();
    buffer.push_str("ab");

    assert!(!buffer.sync());
    assert_eq!(glyph_ids(&buffer), [0x61, 0x62]);
    assert_eq!(buffer.try_sync(), Err(BufferError::OutputInactive));
    assert_eq!(buffer.len(), 2);
    assert!(buffer.allocation_successful());
}

#[test]
fn failed_sync_keeps_previous_contents() {
    let mut buffer = Buffer::new();
    buffer.set_limits(BufferLimits {
        max_len_factor: 1,
        max_len_min: 1,
        ..BufferLimits::default()
    });
    buffer.push_str("ab");
    buffer.enter();
    buffer.clear_output();

    // Growing past the ceiling fails.
    assert!(!buffer.make_room_for(0, 100));
    assert_eq!(buffer.try_sync(), Err(BufferError::CapacityExceeded {
        requested: 100,
        max_len: 2
    }));
    assert_eq!(glyph_ids(&buffer), [0x61, 0x62]);
    assert!(!buffer.have_output());
    assert_eq!(buffer.idx(), 0);
}

#[test]
fn output_cursor() {
    let mut buffer = Buffer::new();
    buffer.add_codepoints(&[1, 2, 3, 4], None, 0, None);
    buffer.clear_output();

    buffer.next_glyph();
    buffer.replace_glyph(20);
    buffer.output_glyph(30);
    buffer.skip_glyph();
    buffer.copy_glyph();
    buffer.next_glyph();

    assert_eq!(buffer.backtrack_len(), 5);
    assert_eq!(buffer.lookahead_len(), 0);
    assert!(buffer.sync());
    assert_eq!(glyph_ids(&buffer), [1, 20, 30, 4, 4]);

    let clusters: Vec<u32> = buffer.glyph_infos().iter().map(|i| i.cluster).collect();
    assert_eq!(clusters, [0, 1, 2, 3, 3]);
}

#[test]
fn output_info_and_cursor_access() {
    let mut buffer = Buffer::new();
    buffer.add_codepoints(&[1, 2], None, 0, None);
    buffer.clear_output();

    buffer.cur_mut(1).mask = 0x100;
    assert_eq!(buffer.cur(1).mask, 0x100);

    let mut info = *buffer.cur(0);
    info.glyph_id = 7;
    buffer.output_info(info);
    buffer.skip_glyph();
    assert_eq!(buffer.prev().glyph_id, 7);
    buffer.prev_mut().glyph_id = 8;
    assert_eq!(buffer.out_info()[0].glyph_id, 8);

    buffer.next_glyph();
    assert!(buffer.sync());
    assert_eq!(glyph_ids(&buffer), [8, 2]);
}

#[test]
fn positions_are_activated_lazily() {
    let mut buffer = Buffer::new();
    buffer.push_str("ab");
    assert!(!buffer.has_positions());

    let positions = buffer.get_glyph_positions().unwrap();
    assert_eq!(positions.len(), 2);
    positions[1].x_advance = 500;

    assert!(buffer.has_positions());
    assert_eq!(buffer.glyph_positions()[1].x_advance, 500);
    assert_eq!(buffer.glyph_positions()[0], GlyphPosition::default());
}

#[test]
fn reverse_keeps_positions_in_step() {
    let mut buffer = Buffer::new();
    buffer.add_codepoints(&[1, 2, 3], None, 0, None);
    buffer.get_glyph_positions().unwrap()[0].x_advance = 10;

    buffer.reverse();
    assert_eq!(glyph_ids(&buffer), [3, 2, 1]);
    assert_eq!(buffer.glyph_positions()[2].x_advance, 10);

    buffer.reverse_range(0, 2);
    assert_eq!(glyph_ids(&buffer), [2, 3, 1]);

    // Out of range ends are clamped.
    buffer.reverse_range(1, 100);
    assert_eq!(glyph_ids(&buffer), [2, 1, 3]);
}

#[test]
fn reset_clusters_and_codepoints() {
    let mut buffer = Buffer::new();
    buffer.push_str("a\u{e9}b");
    buffer.add(0xD800, 9);

    let text: String = buffer.codepoints().collect();
    assert_eq!(text, "a\u{e9}b\u{FFFD}");

    buffer.reset_clusters();
    let clusters: Vec<u32> = buffer.glyph_infos().iter().map(|i| i.cluster).collect();
    assert_eq!(clusters, [0, 1, 2, 3]);
}

#[test]
fn guess_segment_properties_skips_common_and_inherited() {
    let mut buffer = Buffer::new();
    buffer.add_codepoints(&[0x0020, 0x0301, 0x05D0], None, 0, None);
    buffer.guess_segment_properties();
    assert_eq!(buffer.script(), Some(script::HEBREW));
    assert_eq!(buffer.direction(), Direction::RightToLeft);
    assert_eq!(buffer.language(), None);

    let mut buffer = Buffer::new();
    buffer.push_str("123");
    buffer.guess_segment_properties();
    assert_eq!(buffer.script(), None);
    assert_eq!(buffer.direction(), Direction::LeftToRight);

    // Set properties are kept.
    let mut buffer = Buffer::new();
    buffer.push_str("abc");
    buffer.set_direction(Direction::TopToBottom);
    buffer.guess_segment_properties();
    assert_eq!(buffer.direction(), Direction::TopToBottom);
    assert_eq!(buffer.script(), Some(script::LATIN));
}

#[test]
fn random_state_is_explicit() {
    let mut buffer = Buffer::new();
    let first = buffer.random_number();
    buffer.random_number();

    buffer.set_random_state(1);
    assert_eq!(buffer.random_number(), first);
}

#[test]
fn message_callback() {
    let messages = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&messages);

    let mut buffer = Buffer::new();
    assert!(!buffer.messaging());
    assert!(buffer.message(format_args!("nobody listens")));

    buffer.push_str("abc");
    buffer.set_message_func(Some(Box::new(move |buffer: &Buffer, msg: &str| {
        sink.lock().unwrap().push(format!("{} {}", msg, buffer.len()));
        !msg.starts_with("skip")
    })));
    assert!(buffer.messaging());

    assert!(buffer.message(format_args!("start table {}", "GSUB")));
    assert!(!buffer.message(format_args!("skip lookup {}", 3)));

    let long = "x".repeat(300);
    buffer.message(format_args!("{}", long));

    let messages = messages.lock().unwrap();
    assert_eq!(messages[0], "start table GSUB 3");
    assert_eq!(messages[1], "skip lookup 3 3");
    assert!(messages[2].len() <= 100 + 2);
    assert!(messages[2].starts_with("xxx"));

    // Still installed.
    assert!(buffer.messaging());
    buffer.set_message_func(None);
    assert!(!buffer.messaging());
}

#[test]
fn unicode_buffer_round_trip() {
    let mut buffer = UnicodeBuffer::new();
    buffer.push_str("Hello");
    buffer.set_direction(Direction::LeftToRight);
    buffer.set_script(script::LATIN);
    buffer.set_cluster_level(BufferClusterLevel::MonotoneCharacters);
    assert_eq!(buffer.len(), 5);
    assert_eq!(buffer.script(), script::LATIN);

    let mut inner = buffer.into_inner();
    inner.clear_output();
    inner.replace_glyphs(2, 1, &[42]);
    assert!(inner.sync());

    let glyphs = GlyphBuffer::from_shaped(inner);
    assert_eq!(glyphs.len(), 4);
    assert_eq!(glyphs.glyph_infos()[0].glyph_id, 42);
    assert_eq!(glyphs.glyph_positions().len(), 4);
    assert_eq!(glyphs.as_buffer().content_type(), BufferContentType::Glyphs);

    let buffer = glyphs.clear();
    assert!(buffer.is_empty());
    assert_eq!(buffer.cluster_level(), BufferClusterLevel::MonotoneCharacters);
}
