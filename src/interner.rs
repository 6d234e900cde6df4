//! String interning.
//!
//! Owns the intern table and is the only way new [StringRef]s come into being. Any path that
//! materializes a string -- literal compilation or runtime concatenation -- goes through here
//! first, so at most one string object exists per byte sequence.
//!
//! (See Crafting Interpreters, ch. 20: "Hash Tables", `copyString`/`takeString`.)

use std::rc::Rc;

use crate::object::{fnv1a_hash, StringObject, StringRef};
use crate::table::Table;
use crate::value::Value;

/// Owns the set of canonical string objects for one VM run.
///
/// This also serves as the object registry described by the original design (the "intrusive
/// linked list of all live objects"): every live string is reachable via [Table::live_keys], and
/// dropping the [Interner] drops every handle it holds.
#[derive(Default)]
pub struct Interner {
    strings: Table,
}

impl Interner {
    pub fn new() -> Self {
        Interner::default()
    }

    /// Interns `bytes`, returning the canonical handle. If an identical string already exists,
    /// the existing handle is reused and no new allocation happens.
    pub fn intern(&mut self, bytes: &[u8]) -> StringRef {
        let hash = fnv1a_hash(bytes);
        if let Some(existing) = self.strings.find_string(bytes, hash) {
            return existing;
        }

        let interned: StringRef = Rc::new(StringObject::new(bytes.into()));
        self.strings.set(interned.clone(), Value::Nil);
        interned
    }

    /// Interns the concatenation of two strings.
    ///
    /// (See Crafting Interpreters, ch. 19: "Strings", `concatenate`.)
    pub fn concat(&mut self, a: &[u8], b: &[u8]) -> StringRef {
        let mut bytes = Vec::with_capacity(a.len() + b.len());
        bytes.extend_from_slice(a);
        bytes.extend_from_slice(b);
        self.intern(&bytes)
    }

    /// Number of distinct strings currently interned. Exposed for tests and debug tooling.
    pub fn len(&self) -> usize {
        self.strings.live_keys().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn interning_same_bytes_returns_same_handle() {
        let mut interner = Interner::new();
        let a = interner.intern(b"hello");
        let b = interner.intern(b"hello");
        assert!(Rc::ptr_eq(&a, &b));
        assert_eq!(1, interner.len());
    }

    #[test]
    fn interning_different_bytes_returns_different_handles() {
        let mut interner = Interner::new();
        let a = interner.intern(b"hello");
        let b = interner.intern(b"world");
        assert!(!Rc::ptr_eq(&a, &b));
        assert_eq!(2, interner.len());
    }

    #[test]
    fn concat_reuses_interned_result() {
        let mut interner = Interner::new();
        let expected = interner.intern(b"helloworld");
        let concatenated = interner.concat(b"hello", b"world");
        assert!(Rc::ptr_eq(&expected, &concatenated));
        assert_eq!(1, interner.len());
    }

    #[test]
    fn concat_of_interned_pieces_matches_intern_of_whole() {
        let mut interner = Interner::new();
        interner.intern(b"hello");
        interner.intern(b"world");
        let concatenated = interner.concat(b"hello", b"world");
        let direct = interner.intern(b"helloworld");
        assert!(Rc::ptr_eq(&concatenated, &direct));
    }
}
