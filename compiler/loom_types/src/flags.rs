//! Flag sets attached to class and function details.

use bitflags::bitflags;

bitflags! {
    /// Properties of a class declaration, shared across all instantiations.
    #[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Default)]
    pub struct ClassFlags: u16 {
        /// Declared by the builtin table, not user code.
        const BUILTIN = 1 << 0;
        /// Record-style class: gets a synthesized field-order constructor
        /// when none is declared.
        const DATA_CLASS = 1 << 1;
        /// Structural protocol: assignability is judged by member presence,
        /// not declared inheritance.
        const PROTOCOL = 1 << 2;
        /// Graph node archetype.
        const NODE = 1 << 3;
        /// Graph edge archetype.
        const EDGE = 1 << 4;
        /// Graph-walking agent archetype.
        const WALKER = 1 << 5;
        /// The builtin fixed-arity tuple: positional type arguments compare
        /// covariantly rather than through declared type parameters.
        const TUPLE = 1 << 6;
    }
}

bitflags! {
    /// Properties of a function or method signature.
    #[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Default)]
    pub struct FunctionFlags: u8 {
        /// `@staticmethod`: no implicit first parameter.
        const STATIC_METHOD = 1 << 0;
        /// `@classmethod`: first parameter binds the class object.
        const CLASS_METHOD = 1 << 1;
        /// `@property`: attribute access applies the call transform.
        const PROPERTY = 1 << 2;
        /// A constructor (`__init__`), declared or synthesized.
        const CONSTRUCTOR = 1 << 3;
        /// Synthesized by the checker (data-class constructor).
        const SYNTHESIZED = 1 << 4;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn archetype_flags_are_disjoint() {
        let f = ClassFlags::NODE | ClassFlags::DATA_CLASS;
        assert!(f.contains(ClassFlags::NODE));
        assert!(!f.contains(ClassFlags::EDGE));
    }

    #[test]
    fn default_is_empty() {
        assert_eq!(FunctionFlags::default(), FunctionFlags::empty());
    }
}
