use std::any::Any;
use std::sync::Arc;
use std::thread;

use glyphbuf::*;

const KEY: UserDataKey = UserDataKey(1);
const OTHER_KEY: UserDataKey = UserDataKey(2);

#[test]
fn reference_counting() {
    let buffer = Shared::new(Buffer::new());
    assert_eq!(buffer.reference_count(), 1);

    let other = buffer.reference();
    assert_eq!(buffer.reference_count(), 2);
    assert!(buffer.ptr_eq(&other));

    drop(other);
    assert_eq!(buffer.reference_count(), 1);
}

#[test]
fn writes_are_seen_through_every_handle() {
    let buffer = Shared::new(Buffer::new());
    let other = buffer.reference();

    buffer.write().unwrap().push_str("abc");
    assert_eq!(other.read().len(), 3);
}

#[test]
fn immutable_object_refuses_writes() {
    let buffer = Shared::new(Buffer::new());
    buffer.write().unwrap().push_str("a");

    buffer.make_immutable();
    assert!(buffer.is_immutable());
    assert!(buffer.write().is_none());
    assert_eq!(buffer.read().len(), 1);
}

#[test]
fn user_data() {
    let buffer = Shared::new(Buffer::new());

    let data: Arc<dyn Any + Send + Sync> = Arc::new(5u32);
    assert!(buffer.set_user_data(KEY, Some(data), false));
    assert_eq!(buffer.get_user_data::<u32>(KEY).as_deref(), Some(&5));
    assert!(buffer.get_user_data::<i64>(KEY).is_none());
    assert!(buffer.get_user_data::<u32>(OTHER_KEY).is_none());

    let data: Arc<dyn Any + Send + Sync> = Arc::new(6u32);
    assert!(!buffer.set_user_data(KEY, Some(data.clone()), false));
    assert_eq!(buffer.get_user_data::<u32>(KEY).as_deref(), Some(&5));

    assert!(buffer.set_user_data(KEY, Some(data), true));
    assert_eq!(buffer.get_user_data::<u32>(KEY).as_deref(), Some(&6));

    assert!(buffer.set_user_data(KEY, None, true));
    assert!(buffer.get_user_data::<u32>(KEY).is_none());
}

#[test]
fn user_data_survives_immutability() {
    let buffer = Shared::new(Buffer::new());
    buffer.make_immutable();

    let data: Arc<dyn Any + Send + Sync> = Arc::new("font cache");
    assert!(buffer.set_user_data(KEY, Some(data), false));
    assert_eq!(
        buffer.get_user_data::<&str>(KEY).as_deref(),
        Some(&"font cache")
    );
}

#[test]
fn handles_cross_threads() {
    let buffer = Shared::new(Buffer::new());
    let other = buffer.reference();

    thread::spawn(move || {
        other.write().unwrap().push_str("hello");
    })
    .join()
    .unwrap();

    assert_eq!(buffer.read().len(), 5);
    assert_eq!(buffer.reference_count(), 1);
}

#[test]
fn header_on_a_plain_buffer() {
    let buffer = Buffer::new();
    let data: Arc<dyn Any + Send + Sync> = Arc::new(1u8);
    assert!(buffer.header().set_user_data(KEY, Some(data), false));
    assert_eq!(buffer.header().get_user_data::<u8>(KEY).as_deref(), Some(&1));
}
