use std::fmt;
use std::hash::{Hash, Hasher};
use std::ops::Deref;

/// Wrapper type whose "identity" for equality and hashing is determined from the reference itself
/// (ie. the pointer) and not from the underlying data.
///
/// Decoded instructions point back at the code unit they came from this way: two structurally
/// equal code units are still different owners.
pub struct RefId<'a, T: ?Sized>(pub &'a T);

impl<'a, T: ?Sized> RefId<'a, T> {
    /// Address of the referenced value
    pub fn address(self) -> usize {
        self.0 as *const T as *const () as usize
    }

    /// Last five hex digits of the address
    ///
    /// Enough to tell apart the handful of values that show up together in one dump.
    pub fn short_tag(self) -> String {
        let hex = format!("{:x}", self.address());
        let start = hex.len().saturating_sub(5);
        hex[start..].to_owned()
    }
}

impl<'a, T: ?Sized> Clone for RefId<'a, T> {
    fn clone(&self) -> Self {
        RefId(self.0)
    }
}

impl<'a, T: ?Sized> Copy for RefId<'a, T> {}

impl<'a, T: ?Sized> Hash for RefId<'a, T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.address().hash(state)
    }
}

impl<'a, 'b, T: ?Sized> PartialEq<RefId<'b, T>> for RefId<'a, T> {
    fn eq(&self, other: &RefId<'b, T>) -> bool {
        self.address() == other.address()
    }
}

impl<'a, T: ?Sized> Eq for RefId<'a, T> {}

impl<'a, T: ?Sized> Deref for RefId<'a, T> {
    type Target = T;

    fn deref(&self) -> &T {
        self.0
    }
}

/// Only the address: the referenced value may be arbitrarily large
impl<'a, T: ?Sized> fmt::Debug for RefId<'a, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RefId({:#x})", self.address())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn identity_not_value() {
        let (a, b) = (String::from("same"), String::from("same"));
        assert_eq!(RefId(&a), RefId(&a));
        assert_ne!(RefId(&a), RefId(&b));
    }

    #[test]
    fn short_tag_is_suffix_of_address() {
        let value = 42u64;
        let id = RefId(&value);
        let tag = id.short_tag();
        assert!(tag.len() <= 5);
        assert!(format!("{:x}", id.address()).ends_with(&tag));
    }
}
