//! The type check pass: walks one module's AST, drives the evaluator and
//! matcher per node, and accumulates diagnostics.
//!
//! The pass owns all mutable state for a run: the per-expression memo
//! table, the resolved-declaration cache, the "currently resolving" stack,
//! and the error list. The AST arena, interner, and builtin table are
//! shared read-only, so modules can be checked on parallel threads with
//! one checker each.

mod bodies;
mod registration;

#[cfg(test)]
mod integration_tests;

use std::sync::Arc;

use loom_ir::{AstArena, DeclId, DeclKind, ExprId, Module, Name, ScopeId, Span, StringInterner};
use rustc_hash::FxHashMap;

use crate::builtins::BuiltinTypes;
use crate::call::CallContext;
use crate::error::{TypeCheckError, TypeCheckErrorKind};
use crate::output::{TypeCheckResult, TypedModule};
use crate::ty::{ClassDetails, ClassType, Type, TypeVarDetails};

/// Knobs for behavior the checker deliberately leaves configurable.
#[derive(Clone, Debug, Default)]
pub struct CheckConfig {
    /// When the same type variable is solved against incompatible argument
    /// types in one call, report a mismatch instead of widening the
    /// solution to a union.
    pub strict_type_var_solving: bool,
}

/// Check one module and return its inferred types plus diagnostics.
#[tracing::instrument(level = "debug", skip_all, fields(module = interner.resolve(module.name)))]
pub fn check_module(
    module: &Module,
    arena: &AstArena,
    interner: &StringInterner,
    builtins: &BuiltinTypes,
    config: CheckConfig,
) -> TypeCheckResult {
    let mut checker = ModuleChecker::new(arena, interner, builtins, config);
    checker.scope_stack.push(module.scope);
    checker.register_module(module);
    checker.check_body(&module.body);
    checker.finish()
}

/// All mutable state for checking one module.
pub struct ModuleChecker<'a> {
    pub(crate) arena: &'a AstArena,
    pub(crate) interner: &'a StringInterner,
    pub(crate) builtins: &'a BuiltinTypes,
    pub(crate) config: CheckConfig,

    /// Per-expression memo table, indexed by `ExprId`.
    expr_types: Vec<Option<Type>>,
    /// Resolved declaration types.
    decl_types: FxHashMap<DeclId, Type>,
    /// Shared class details per class declaration.
    pub(crate) class_details: FxHashMap<DeclId, Arc<ClassDetails>>,
    /// Declarations currently being resolved; re-entry resolves to
    /// `Unknown` with no diagnostic instead of recursing forever.
    resolving: Vec<DeclId>,
    /// Lexical scope chain of the current traversal position.
    pub(crate) scope_stack: Vec<ScopeId>,
    /// Enclosing instance types, innermost last.
    pub(crate) self_types: Vec<Type>,
    /// Declared return types of enclosing functions, innermost last.
    pub(crate) return_types: Vec<Type>,

    errors: Vec<TypeCheckError>,
}

impl<'a> ModuleChecker<'a> {
    pub fn new(
        arena: &'a AstArena,
        interner: &'a StringInterner,
        builtins: &'a BuiltinTypes,
        config: CheckConfig,
    ) -> Self {
        ModuleChecker {
            arena,
            interner,
            builtins,
            config,
            expr_types: vec![None; arena.expr_count()],
            decl_types: FxHashMap::default(),
            class_details: FxHashMap::default(),
            resolving: Vec::new(),
            scope_stack: Vec::new(),
            self_types: Vec::new(),
            return_types: Vec::new(),
            errors: Vec::new(),
        }
    }

    /// Consume the checker into its result.
    pub fn finish(self) -> TypeCheckResult {
        TypeCheckResult {
            module: TypedModule::new(self.expr_types, self.decl_types),
            diagnostics: self
                .errors
                .into_iter()
                .map(TypeCheckError::into_diagnostic)
                .collect(),
        }
    }

    // === Diagnostics ===

    pub(crate) fn report(&mut self, err: TypeCheckError) {
        self.errors.push(err);
    }

    pub(crate) fn render(&self, ty: &Type) -> String {
        ty.display(self.interner).to_string()
    }

    /// Borrow the immutable pieces a matching run needs. The borrow must
    /// end before errors from the outcome are reported back.
    pub(crate) fn call_ctx(&self) -> CallContext<'_> {
        CallContext {
            interner: self.interner,
            config: &self.config,
        }
    }

    // === Expression inference (memoized) ===

    /// Infer the type of an expression, memoized against its arena id.
    pub fn infer_expr(&mut self, id: ExprId) -> Type {
        if let Some(Some(ty)) = self.expr_types.get(id.index()) {
            return ty.clone();
        }
        let ty = crate::infer::infer(self, id);
        self.set_expr_type(id, ty.clone());
        ty
    }

    pub(crate) fn set_expr_type(&mut self, id: ExprId, ty: Type) {
        if let Some(slot) = self.expr_types.get_mut(id.index()) {
            *slot = Some(ty);
        }
    }

    pub(crate) fn expr_type(&self, id: ExprId) -> Option<&Type> {
        self.expr_types.get(id.index()).and_then(Option::as_ref)
    }

    // === Scopes & names ===

    pub(crate) fn current_scope(&self) -> ScopeId {
        self.scope_stack
            .last()
            .copied()
            .unwrap_or_else(|| ScopeId::from_raw(0))
    }

    pub(crate) fn current_self(&self) -> Option<&Type> {
        self.self_types.last()
    }

    /// Resolve an identifier in expression position. Classes resolve to
    /// their class-object type; builtin class names are the fallback when
    /// no lexical binding exists.
    pub(crate) fn resolve_ident(&mut self, name: Name, span: Span) -> Type {
        if let Some(decl) = self.arena.resolve_name(self.current_scope(), name) {
            return self.resolve_decl(decl);
        }
        if let Some(class) = self.builtins.by_name(name) {
            return Type::Class(class.clone());
        }
        self.report(TypeCheckError::new(
            TypeCheckErrorKind::UndefinedName {
                name: self.interner.resolve(name).to_string(),
            },
            span,
        ));
        Type::Unknown
    }

    // === Declaration resolution ===

    /// Resolve a declaration's type, memoized. Re-entrant requests (a
    /// self-referential default, a recursive alias) resolve to `Unknown`
    /// silently so the pass terminates.
    pub(crate) fn resolve_decl(&mut self, id: DeclId) -> Type {
        if let Some(ty) = self.decl_types.get(&id) {
            return ty.clone();
        }
        if self.resolving.contains(&id) {
            tracing::trace!(decl = id.raw(), "cyclic resolution, yielding Unknown");
            return Type::Unknown;
        }
        self.resolving.push(id);
        let ty = self.resolve_decl_uncached(id);
        self.resolving.pop();
        self.decl_types.insert(id, ty.clone());
        ty
    }

    pub(crate) fn set_decl_type(&mut self, id: DeclId, ty: Type) {
        self.decl_types.insert(id, ty);
    }

    fn resolve_decl_uncached(&mut self, id: DeclId) -> Type {
        let decl = self.arena.decl(id);
        match &decl.kind {
            DeclKind::Variable { annotation, value } => {
                if let Some(ann) = annotation {
                    crate::infer::annotations::resolve_annotation(self, *ann)
                } else if let Some(value) = value {
                    self.infer_expr(*value).widened()
                } else {
                    Type::Unknown
                }
            }
            DeclKind::Function(_) => {
                let sig = self.function_signature(id, None);
                Type::Function(Arc::new(sig))
            }
            DeclKind::Class(_) => {
                self.register_class(id);
                self.decl_types
                    .get(&id)
                    .cloned()
                    .unwrap_or(Type::Unknown)
            }
            DeclKind::TypeParam { variance, bound } => {
                let bound_ty = bound
                    .map(|b| crate::infer::annotations::resolve_annotation(self, b));
                Type::TypeVar(TypeVarDetails::new(decl.name, *variance, bound_ty))
            }
            DeclKind::Module { symbols } => {
                let scope = self.arena.scope(*symbols);
                let bindings: Vec<(Name, DeclId)> = scope.symbols.iter().collect();
                let exports: Vec<(Name, Type)> = bindings
                    .into_iter()
                    .map(|(name, decl)| (name, self.resolve_decl(decl)))
                    .collect();
                Type::Module(Arc::new(crate::ty::ModuleType::new(decl.name, exports)))
            }
        }
    }

    /// The generic instance form of a class under declaration: its own
    /// type parameters stand in as arguments.
    pub(crate) fn generic_instance(&self, details: &Arc<ClassDetails>) -> ClassType {
        let args = if details.type_params.is_empty() {
            None
        } else {
            Some(
                details
                    .type_params
                    .iter()
                    .map(|p| Type::TypeVar(p.clone()))
                    .collect::<Vec<_>>()
                    .into(),
            )
        };
        ClassType {
            details: details.clone(),
            args,
            instance: true,
        }
    }
}
