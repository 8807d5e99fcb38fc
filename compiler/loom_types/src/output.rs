//! What a finished check hands back to the caller.

use loom_diagnostic::Diagnostic;
use loom_ir::{DeclId, ExprId};
use rustc_hash::FxHashMap;

use crate::ty::Type;

/// Per-node inferred types for one module.
///
/// Types live in an external table keyed by arena id, so the AST stays
/// immutable and shareable and the whole cache drops with this value on
/// recompilation.
#[derive(Clone, Debug)]
pub struct TypedModule {
    expr_types: Vec<Type>,
    decl_types: FxHashMap<DeclId, Type>,
}

impl TypedModule {
    pub(crate) fn new(
        expr_types: Vec<Option<Type>>,
        decl_types: FxHashMap<DeclId, Type>,
    ) -> Self {
        TypedModule {
            // Unreached expressions (e.g. inside never-visited branches of
            // malformed declarations) read back as Unknown.
            expr_types: expr_types
                .into_iter()
                .map(|t| t.unwrap_or(Type::Unknown))
                .collect(),
            decl_types,
        }
    }

    /// The inferred type of an expression.
    pub fn type_of(&self, id: ExprId) -> &Type {
        static UNKNOWN: Type = Type::Unknown;
        self.expr_types.get(id.index()).unwrap_or(&UNKNOWN)
    }

    /// The resolved type of a declaration, if it was reached.
    pub fn decl_type(&self, id: DeclId) -> Option<&Type> {
        self.decl_types.get(&id)
    }

    pub fn expr_count(&self) -> usize {
        self.expr_types.len()
    }
}

/// Inferred types plus the ordered diagnostics produced while checking.
#[derive(Clone, Debug)]
pub struct TypeCheckResult {
    pub module: TypedModule,
    pub diagnostics: Vec<Diagnostic>,
}

impl TypeCheckResult {
    pub fn has_errors(&self) -> bool {
        self.diagnostics.iter().any(Diagnostic::is_error)
    }

    pub fn error_count(&self) -> usize {
        self.diagnostics.iter().filter(|d| d.is_error()).count()
    }
}
