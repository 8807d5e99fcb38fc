//! Arena index newtypes.
//!
//! AST nodes are stored in flat arenas and referenced by 32-bit indices.
//! The index doubles as the node's stable identity: external tables (the
//! checker's memo table, diagnostics attribution) key off these ids, so the
//! AST itself stays immutable and shareable.

macro_rules! arena_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
        #[repr(transparent)]
        pub struct $name(u32);

        impl $name {
            /// Create an id from a raw u32 index.
            #[inline]
            pub const fn from_raw(raw: u32) -> Self {
                Self(raw)
            }

            /// Get the raw u32 index.
            #[inline]
            pub const fn raw(self) -> u32 {
                self.0
            }

            /// Get the index as usize for arena access.
            #[inline]
            pub const fn index(self) -> usize {
                self.0 as usize
            }
        }

        impl std::fmt::Debug for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, concat!(stringify!($name), "({})"), self.0)
            }
        }
    };
}

arena_id! {
    /// Index of an expression in the [`AstArena`](crate::AstArena).
    ExprId
}

arena_id! {
    /// Index of a statement in the [`AstArena`](crate::AstArena).
    StmtId
}

arena_id! {
    /// Index of a declaration in the [`AstArena`](crate::AstArena).
    DeclId
}

arena_id! {
    /// Index of a scope (symbol table) in the [`AstArena`](crate::AstArena).
    ScopeId
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip() {
        let id = ExprId::from_raw(42);
        assert_eq!(id.raw(), 42);
        assert_eq!(id.index(), 42);
    }

    #[test]
    fn ids_are_copy_and_ord() {
        let a = DeclId::from_raw(1);
        let b = a;
        assert_eq!(a, b);
        assert!(DeclId::from_raw(0) < DeclId::from_raw(1));
    }
}
