//! Single-owner wrapper around Rc<>
//!
//! A SharedBox<T> is the one owner of a value. Anything else holds a
//! WeakBox<T>, which is how long-lived callbacks (command completions,
//! advertisement tokens) refer back to the component that issued them
//! without keeping it alive.

use std::{
    ops::Deref,
    rc::{Rc, Weak},
};

/// A Box<> where static "weak" references to the contents can be taken,
/// and fallibly upgraded at a later point.
#[derive(Debug)]
pub struct SharedBox<T: ?Sized>(Rc<T>);

impl<T> SharedBox<T> {
    /// Constructor
    pub fn new(t: T) -> Self {
        Self(t.into())
    }

    /// Construct a value that holds a weak reference to itself
    pub fn new_cyclic(f: impl FnOnce(WeakBox<T>) -> T) -> Self {
        Self(Rc::new_cyclic(|weak| f(WeakBox(weak.clone()))))
    }

    /// Produce a weak reference to the contents
    pub fn downgrade(&self) -> WeakBox<T> {
        WeakBox(Rc::downgrade(&self.0))
    }
}

impl<T> From<T> for SharedBox<T> {
    fn from(value: T) -> Self {
        Self(value.into())
    }
}

impl<T> Deref for SharedBox<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        self.0.deref()
    }
}

/// A weak reference to the contents within a SharedBox<>
pub struct WeakBox<T>(Weak<T>);

impl<T> WeakBox<T> {
    /// Fallibly upgrade, passing the result into the supplied closure. The
    /// upgraded reference cannot escape the closure.
    pub fn with<U>(&self, f: impl FnOnce(Option<WeakBoxRef<T>>) -> U) -> U {
        f(self.0.upgrade().as_deref().map(|x| WeakBoxRef(x, self.0.clone())))
    }

    /// Whether the owning SharedBox<> has been dropped
    pub fn is_dropped(&self) -> bool {
        self.0.strong_count() == 0
    }

    /// Whether both references point at the same SharedBox<>
    pub fn ptr_eq(&self, other: &Self) -> bool {
        self.0.ptr_eq(&other.0)
    }
}

impl<T> Clone for WeakBox<T> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<T> std::fmt::Debug for WeakBox<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("WeakBox").field(&self.0.as_ptr()).finish()
    }
}

/// A strong reference to the contents within a SharedBox<>.
pub struct WeakBoxRef<'a, T>(&'a T, Weak<T>);

impl<'a, T> WeakBoxRef<'a, T> {
    /// Downgrade to a weak reference (with static lifetime)
    pub fn downgrade(&self) -> WeakBox<T> {
        WeakBox(self.1.clone())
    }
}

impl<'a, T> Deref for WeakBoxRef<'a, T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        self.0
    }
}

#[cfg(test)]
mod test {
    use super::*;

    struct Node {
        this: WeakBox<Node>,
        value: u32,
    }

    #[test]
    fn test_new_cyclic_self_reference() {
        let node = SharedBox::new_cyclic(|this| Node { this, value: 7 });

        let value = node.this.with(|node| node.map(|node| node.value));

        assert_eq!(value, Some(7));
        assert!(node.this.ptr_eq(&node.downgrade()));
    }

    #[test]
    fn test_weak_upgrade_fails_after_drop() {
        let node = SharedBox::new(5);
        let weak = node.downgrade();

        drop(node);

        assert!(weak.is_dropped());
        assert!(weak.with(|node| node.is_none()));
    }
}
