//! Shared-ownership primitives: reference counting, the immutability flag and
//! user-data attachment.

use alloc::sync::Arc;
use core::any::Any;
use core::fmt;
use core::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use smallvec::SmallVec;

/// A key under which user data is attached to a shared object.
///
/// Independent subsystems pick distinct keys so their attachments never
/// collide.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct hb_user_data_key_t(pub u32);

type UserData = Arc<dyn Any + Send + Sync>;

/// The header every shared shaping object carries.
///
/// The immutability flag is cooperative: once set, mutating entry points of
/// the owning object turn into no-ops. The user-data table has its own small
/// lock so that attaching metadata never interferes with the object state.
#[derive(Default)]
pub struct hb_object_header_t {
    immutable: AtomicBool,
    user_data: Mutex<SmallVec<[(hb_user_data_key_t, UserData); 2]>>,
}

impl hb_object_header_t {
    /// Marks the owning object as immutable. There is no way back.
    #[inline]
    pub fn make_immutable(&self) {
        self.immutable.store(true, Ordering::Release);
    }

    /// Checks whether the owning object was made immutable.
    #[inline]
    pub fn is_immutable(&self) -> bool {
        self.immutable.load(Ordering::Acquire)
    }

    /// Attaches `data` under `key`.
    ///
    /// Passing `None` removes an existing attachment. When `replace` is
    /// `false` and the key is already taken, nothing happens and `false` is
    /// returned.
    pub fn set_user_data(
        &self,
        key: hb_user_data_key_t,
        data: Option<UserData>,
        replace: bool,
    ) -> bool {
        let mut items = self
            .user_data
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        let existing = items.iter().position(|(k, _)| *k == key);
        match (existing, data) {
            (Some(i), None) => {
                items.remove(i);
                true
            }
            (None, None) => true,
            (Some(i), Some(data)) => {
                if !replace {
                    return false;
                }

                items[i].1 = data;
                true
            }
            (None, Some(data)) => {
                items.push((key, data));
                true
            }
        }
    }

    /// Returns the data attached under `key`, if it has type `T`.
    pub fn get_user_data<T: Any + Send + Sync>(&self, key: hb_user_data_key_t) -> Option<Arc<T>> {
        let items = self
            .user_data
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        let data = items.iter().find(|(k, _)| *k == key)?.1.clone();
        data.downcast::<T>().ok()
    }
}

impl fmt::Debug for hb_object_header_t {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("hb_object_header_t")
            .field("immutable", &self.is_immutable())
            .finish()
    }
}

/// Implemented by objects that embed a [`hb_object_header_t`].
pub trait hb_object_ext {
    /// The object's header.
    fn header(&self) -> &hb_object_header_t;
}

/// A reference-counted handle to a shaping object.
///
/// `reference()` adds an owner, dropping a handle releases it, and the object
/// is destroyed together with the last handle. Mutation goes through
/// [`Shared::write`], which refuses to hand out access once the object is
/// immutable.
pub struct Shared<T>(Arc<RwLock<T>>);

impl<T: hb_object_ext> Shared<T> {
    /// Wraps `value` into a handle with a reference count of one.
    pub fn new(value: T) -> Self {
        Shared(Arc::new(RwLock::new(value)))
    }

    /// Returns a new handle to the same object.
    #[inline]
    pub fn reference(&self) -> Self {
        Shared(Arc::clone(&self.0))
    }

    /// The number of live handles.
    #[inline]
    pub fn reference_count(&self) -> usize {
        Arc::strong_count(&self.0)
    }

    /// Checks that two handles point to the same object.
    #[inline]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    /// Read access to the object.
    pub fn read(&self) -> RwLockReadGuard<'_, T> {
        self.0.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Write access to the object, or `None` when it is immutable.
    pub fn write(&self) -> Option<RwLockWriteGuard<'_, T>> {
        let guard = self.0.write().unwrap_or_else(PoisonError::into_inner);
        if guard.header().is_immutable() {
            log::warn!("refusing write access to an immutable object");
            return None;
        }

        Some(guard)
    }

    /// Marks the object as immutable.
    pub fn make_immutable(&self) {
        self.read().header().make_immutable();
    }

    /// Checks whether the object is immutable.
    pub fn is_immutable(&self) -> bool {
        self.read().header().is_immutable()
    }

    /// See [`hb_object_header_t::set_user_data`].
    pub fn set_user_data(
        &self,
        key: hb_user_data_key_t,
        data: Option<Arc<dyn Any + Send + Sync>>,
        replace: bool,
    ) -> bool {
        self.read().header().set_user_data(key, data, replace)
    }

    /// See [`hb_object_header_t::get_user_data`].
    pub fn get_user_data<U: Any + Send + Sync>(&self, key: hb_user_data_key_t) -> Option<Arc<U>> {
        self.read().header().get_user_data(key)
    }
}

impl<T> fmt::Debug for Shared<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Shared")
            .field("reference_count", &Arc::strong_count(&self.0))
            .finish()
    }
}
