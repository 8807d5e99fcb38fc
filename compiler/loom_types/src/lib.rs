//! Gradual type checker for Loom modules.
//!
//! The crate is organized around a value-level [`Type`] enum with shared
//! class descriptors:
//! - `ty`: the type representation, typevar substitution, and rendering
//! - `builtins`: the shared builtin class table, constructed once per run
//! - `relate`: linearization, member lookup, and assignability
//! - `call`: pure call matching and generic solving
//! - `check` / `infer`: the per-module walker that registers declarations,
//!   infers expression types, and collects diagnostics
//!
//! Entry point is [`check_module`], which produces a [`TypeCheckResult`]
//! pairing the expression type table with rendered diagnostics. Checkers
//! never mutate the builtin table, so independent modules can be checked
//! from separate threads against one `Arc<BuiltinTypes>`.

mod builtins;
mod call;
mod check;
mod error;
mod flags;
mod infer;
mod literal;
mod output;
mod relate;
mod ty;

pub use builtins::BuiltinTypes;
pub use check::{check_module, CheckConfig, ModuleChecker};
pub use error::{TypeCheckError, TypeCheckErrorKind};
pub use flags::{ClassFlags, FunctionFlags};
pub use literal::{LiteralType, LiteralValue};
pub use output::{TypeCheckResult, TypedModule};
pub use relate::{assign_type, lookup_member, Mro};
pub use ty::{
    substitute, ClassDetails, ClassType, FnParam, FunctionType, Member, MemberKind, ModuleType,
    Type, TypeVarDetails, TypeVarMap,
};
