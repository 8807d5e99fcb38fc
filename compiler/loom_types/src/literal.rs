//! Literal types: a concrete primitive value plus the class it widens to.

use loom_ir::Name;

use crate::ty::{ClassType, Type};

/// A concrete literal value.
///
/// Floats and complex components are stored as raw bits so the value is
/// `Eq`/`Hash` and two literals compare exactly, not approximately.
#[derive(Clone, Eq, PartialEq, Hash, Debug)]
pub enum LiteralValue {
    Int(i64),
    Str(Name),
    Bool(bool),
    Float(u64),
    Complex { real: u64, imag: u64 },
}

impl LiteralValue {
    pub fn float(v: f64) -> Self {
        LiteralValue::Float(v.to_bits())
    }

    pub fn complex(real: f64, imag: f64) -> Self {
        LiteralValue::Complex {
            real: real.to_bits(),
            imag: imag.to_bits(),
        }
    }
}

/// A literal type: one concrete value and the builtin primitive class it
/// widens to when it flows into a non-literal context.
#[derive(Clone, PartialEq, Debug)]
pub struct LiteralType {
    pub value: LiteralValue,
    /// Instance form of the primitive class (str/int/float/bool/complex).
    pub base: ClassType,
}

impl LiteralType {
    pub fn new(value: LiteralValue, base: ClassType) -> Self {
        debug_assert!(base.is_instance(), "literal base must be an instance type");
        LiteralType { value, base }
    }

    /// Widen to the base class's instance form.
    ///
    /// Applied when a literal flows into a context with no literal-specific
    /// target, e.g. assignment to a variable with an inferred type.
    pub fn widen(&self) -> Type {
        Type::Class(self.base.clone())
    }
}
