//! Module construction facade.
//!
//! `ModuleBuilder` is the front door for producers of the checker's input:
//! it allocates arena nodes, wires up scopes and symbol tables, and hands
//! back a bound [`Module`]. The parser/binder pipeline uses it upstream; the
//! checker's integration tests use it to assemble programs directly.

use std::sync::Arc;

use crate::{
    ArchetypeKind, AstArena, BinaryOp, BoolOp, CallArg, ClassDecl, ComprehensionKind, DeclId,
    DeclKind, Declaration, Decorator, ExprId, ExprKind, FieldDecl, FunctionDecl, Module, Name,
    Param, ParamKind, ScopeId, Span, StmtId, StmtKind, StringInterner, UnaryOp, Variance,
};

/// Accumulates the parts of a class body while it is being built.
#[derive(Default)]
pub struct ClassParts {
    pub fields: Vec<FieldDecl>,
    pub methods: Vec<DeclId>,
    pub type_params: Vec<DeclId>,
    pub endpoints: Option<(ExprId, ExprId)>,
}

/// Builder for one module's arena, scopes, and top-level body.
///
/// Spans are synthesized as distinct one-byte ranges per node so tests can
/// assert diagnostic attribution without a real source file.
pub struct ModuleBuilder {
    arena: AstArena,
    interner: Arc<StringInterner>,
    module_name: Name,
    module_scope: ScopeId,
    scope_stack: Vec<ScopeId>,
    body: Vec<StmtId>,
    next_pos: u32,
}

impl ModuleBuilder {
    pub fn new(interner: Arc<StringInterner>, module_name: &str) -> Self {
        let mut arena = AstArena::new();
        let module_scope = arena.alloc_scope(None);
        let module_name = interner.intern(module_name);
        ModuleBuilder {
            arena,
            interner,
            module_name,
            module_scope,
            scope_stack: vec![module_scope],
            body: Vec::new(),
            next_pos: 0,
        }
    }

    pub fn interner(&self) -> &StringInterner {
        &self.interner
    }

    /// Intern an identifier.
    pub fn name(&self, s: &str) -> Name {
        self.interner.intern(s)
    }

    /// The scope currently being populated.
    pub fn current_scope(&self) -> ScopeId {
        *self.scope_stack.last().unwrap_or(&self.module_scope)
    }

    fn next_span(&mut self) -> Span {
        let start = self.next_pos;
        self.next_pos += 1;
        Span::new(start, start + 1)
    }

    // ========================================
    // Expressions
    // ========================================

    pub fn expr(&mut self, kind: ExprKind) -> ExprId {
        let span = self.next_span();
        self.arena.alloc_expr(kind, span)
    }

    pub fn int(&mut self, v: i64) -> ExprId {
        self.expr(ExprKind::Int(v))
    }

    pub fn float(&mut self, v: f64) -> ExprId {
        self.expr(ExprKind::Float(v))
    }

    pub fn str_lit(&mut self, s: &str) -> ExprId {
        let name = self.name(s);
        self.expr(ExprKind::Str(name))
    }

    pub fn bool_lit(&mut self, v: bool) -> ExprId {
        self.expr(ExprKind::Bool(v))
    }

    pub fn none(&mut self) -> ExprId {
        self.expr(ExprKind::NoneLit)
    }

    pub fn ident(&mut self, s: &str) -> ExprId {
        let name = self.name(s);
        self.expr(ExprKind::Ident(name))
    }

    pub fn self_ref(&mut self) -> ExprId {
        self.expr(ExprKind::SelfRef)
    }

    pub fn member(&mut self, object: ExprId, field: &str) -> ExprId {
        let member = self.name(field);
        self.expr(ExprKind::Member { object, member })
    }

    pub fn index(&mut self, object: ExprId, index: ExprId) -> ExprId {
        self.expr(ExprKind::Index { object, index })
    }

    pub fn list(&mut self, elems: Vec<ExprId>) -> ExprId {
        self.expr(ExprKind::List(elems))
    }

    pub fn set(&mut self, elems: Vec<ExprId>) -> ExprId {
        self.expr(ExprKind::Set(elems))
    }

    pub fn tuple(&mut self, elems: Vec<ExprId>) -> ExprId {
        self.expr(ExprKind::Tuple(elems))
    }

    pub fn dict(&mut self, entries: Vec<(ExprId, ExprId)>) -> ExprId {
        self.expr(ExprKind::Dict(entries))
    }

    pub fn binary(&mut self, op: BinaryOp, left: ExprId, right: ExprId) -> ExprId {
        self.expr(ExprKind::Binary { op, left, right })
    }

    pub fn unary(&mut self, op: UnaryOp, operand: ExprId) -> ExprId {
        self.expr(ExprKind::Unary { op, operand })
    }

    pub fn bool_op(&mut self, op: BoolOp, left: ExprId, right: ExprId) -> ExprId {
        self.expr(ExprKind::BoolOp { op, left, right })
    }

    pub fn ternary(&mut self, condition: ExprId, then: ExprId, otherwise: ExprId) -> ExprId {
        self.expr(ExprKind::Ternary {
            condition,
            then,
            otherwise,
        })
    }

    /// Call with positional arguments only.
    pub fn call(&mut self, callee: ExprId, args: Vec<ExprId>) -> ExprId {
        let args = args
            .into_iter()
            .map(|value| CallArg { name: None, value })
            .collect();
        self.expr(ExprKind::Call { callee, args })
    }

    /// Call with mixed positional and keyword arguments.
    pub fn call_with(&mut self, callee: ExprId, args: Vec<(Option<&str>, ExprId)>) -> ExprId {
        let args = args
            .into_iter()
            .map(|(kw, value)| CallArg {
                name: kw.map(|s| self.interner.intern(s)),
                value,
            })
            .collect();
        self.expr(ExprKind::Call { callee, args })
    }

    /// Lambda whose body is built inside a fresh child scope.
    pub fn lambda(
        &mut self,
        params: Vec<Param>,
        build_body: impl FnOnce(&mut Self) -> ExprId,
    ) -> ExprId {
        let scope = self.push_scope();
        self.declare_params(scope, &params);
        let body = build_body(self);
        self.pop_scope();
        self.expr(ExprKind::Lambda {
            params,
            body,
            scope,
        })
    }

    /// Comprehension with one generator clause, built inside a fresh scope.
    ///
    /// The loop variable is declared in the synthetic scope; `build` produces
    /// `(key, element)` where `key` is `Some` only for dict comprehensions.
    pub fn comprehension(
        &mut self,
        kind: ComprehensionKind,
        binding: &str,
        iter: ExprId,
        build: impl FnOnce(&mut Self) -> (Option<ExprId>, ExprId),
    ) -> ExprId {
        let binding = self.name(binding);
        let scope = self.push_scope();
        let span = self.next_span();
        let decl = self.arena.alloc_decl(Declaration {
            name: binding,
            kind: DeclKind::Variable {
                annotation: None,
                value: None,
            },
            span,
        });
        self.arena.scope_mut(scope).symbols.insert(binding, decl);
        let (key, element) = build(self);
        self.pop_scope();
        self.expr(ExprKind::Comprehension {
            kind,
            binding,
            iter,
            condition: None,
            key,
            element,
            scope,
        })
    }

    // ========================================
    // Parameters
    // ========================================

    pub fn param(&mut self, name: &str, annotation: Option<ExprId>) -> Param {
        let name = self.name(name);
        let span = self.next_span();
        Param {
            name,
            kind: ParamKind::Positional,
            annotation,
            default: None,
            span,
        }
    }

    pub fn param_with_default(
        &mut self,
        name: &str,
        annotation: Option<ExprId>,
        default: ExprId,
    ) -> Param {
        let mut p = self.param(name, annotation);
        p.default = Some(default);
        p
    }

    // ========================================
    // Statements
    // ========================================

    fn stmt(&mut self, kind: StmtKind) -> StmtId {
        let span = self.next_span();
        self.arena.alloc_stmt(kind, span)
    }

    /// Append a statement to the module's top-level body.
    pub fn push(&mut self, stmt: StmtId) {
        self.body.push(stmt);
    }

    pub fn expr_stmt(&mut self, expr: ExprId) -> StmtId {
        self.stmt(StmtKind::Expr(expr))
    }

    pub fn assign(&mut self, target: ExprId, value: ExprId) -> StmtId {
        self.stmt(StmtKind::Assign { target, value })
    }

    pub fn return_stmt(&mut self, value: Option<ExprId>) -> StmtId {
        self.stmt(StmtKind::Return { value })
    }

    pub fn for_stmt(&mut self, binding: &str, iter: ExprId, body: Vec<StmtId>) -> StmtId {
        let binding = self.name(binding);
        let span = self.next_span();
        let decl = self.arena.alloc_decl(Declaration {
            name: binding,
            kind: DeclKind::Variable {
                annotation: None,
                value: None,
            },
            span,
        });
        let scope = self.current_scope();
        self.arena.scope_mut(scope).symbols.insert(binding, decl);
        self.stmt(StmtKind::For {
            binding,
            iter,
            body,
        })
    }

    pub fn with_stmt(
        &mut self,
        context: ExprId,
        binding: Option<&str>,
        body: Vec<StmtId>,
    ) -> StmtId {
        let binding = binding.map(|b| {
            let name = self.name(b);
            let span = self.next_span();
            let decl = self.arena.alloc_decl(Declaration {
                name,
                kind: DeclKind::Variable {
                    annotation: None,
                    value: None,
                },
                span,
            });
            let scope = self.current_scope();
            self.arena.scope_mut(scope).symbols.insert(name, decl);
            name
        });
        self.stmt(StmtKind::With {
            context,
            binding,
            body,
        })
    }

    /// Declare a variable in the current scope and emit its (annotated)
    /// assignment statement. Returns the statement for body assembly.
    pub fn var(
        &mut self,
        name: &str,
        annotation: Option<ExprId>,
        value: Option<ExprId>,
    ) -> StmtId {
        let name_id = self.name(name);
        let span = self.next_span();
        let decl = self.arena.alloc_decl(Declaration {
            name: name_id,
            kind: DeclKind::Variable { annotation, value },
            span,
        });
        let scope = self.current_scope();
        self.arena.scope_mut(scope).symbols.insert(name_id, decl);
        let target = self.expr(ExprKind::Ident(name_id));
        match (annotation, value) {
            (Some(annotation), _) => self.stmt(StmtKind::AnnAssign {
                target,
                annotation,
                value,
            }),
            (None, Some(value)) => self.stmt(StmtKind::Assign { target, value }),
            (None, None) => self.stmt(StmtKind::Pass),
        }
    }

    // ========================================
    // Declarations
    // ========================================

    fn push_scope(&mut self) -> ScopeId {
        let parent = self.current_scope();
        let scope = self.arena.alloc_scope(Some(parent));
        self.scope_stack.push(scope);
        scope
    }

    fn pop_scope(&mut self) {
        self.scope_stack.pop();
    }

    fn declare_params(&mut self, scope: ScopeId, params: &[Param]) {
        for p in params {
            let decl = self.arena.alloc_decl(Declaration {
                name: p.name,
                kind: DeclKind::Variable {
                    annotation: p.annotation,
                    value: p.default,
                },
                span: p.span,
            });
            self.arena.scope_mut(scope).symbols.insert(p.name, decl);
        }
    }

    /// Declare a function in the current scope.
    ///
    /// The body closure runs with the function's scope current, so locals
    /// declared inside bind correctly.
    pub fn function(
        &mut self,
        name: &str,
        params: Vec<Param>,
        return_annotation: Option<ExprId>,
        decorators: Vec<Decorator>,
        build_body: impl FnOnce(&mut Self) -> Vec<StmtId>,
    ) -> DeclId {
        let name_id = self.name(name);
        let parent = self.current_scope();
        let scope = self.push_scope();
        self.declare_params(scope, &params);
        let body = build_body(self);
        self.pop_scope();
        let span = self.next_span();
        let decl = self.arena.alloc_decl(Declaration {
            name: name_id,
            kind: DeclKind::Function(FunctionDecl {
                params,
                return_annotation,
                body,
                decorators,
                scope,
            }),
            span,
        });
        self.arena.scope_mut(parent).symbols.insert(name_id, decl);
        decl
    }

    /// Declare a function and append its `FunctionDef` statement.
    pub fn def(
        &mut self,
        name: &str,
        params: Vec<Param>,
        return_annotation: Option<ExprId>,
        build_body: impl FnOnce(&mut Self) -> Vec<StmtId>,
    ) -> DeclId {
        let decl = self.function(name, params, return_annotation, Vec::new(), build_body);
        let stmt = self.stmt(StmtKind::FunctionDef(decl));
        self.push(stmt);
        decl
    }

    /// Declare a class/archetype in the current scope.
    ///
    /// The closure populates fields, methods, type parameters, and endpoints
    /// with the class scope current.
    pub fn class(
        &mut self,
        name: &str,
        archetype: ArchetypeKind,
        bases: Vec<ExprId>,
        build: impl FnOnce(&mut Self, &mut ClassParts),
    ) -> DeclId {
        let name_id = self.name(name);
        let parent = self.current_scope();
        let scope = self.push_scope();
        let mut parts = ClassParts::default();
        build(self, &mut parts);
        self.pop_scope();
        let span = self.next_span();
        let decl = self.arena.alloc_decl(Declaration {
            name: name_id,
            kind: DeclKind::Class(ClassDecl {
                archetype,
                bases,
                type_params: parts.type_params,
                fields: parts.fields,
                methods: parts.methods,
                endpoints: parts.endpoints,
                scope,
            }),
            span,
        });
        self.arena.scope_mut(parent).symbols.insert(name_id, decl);
        decl
    }

    /// Declare a class and append its `ClassDef` statement.
    pub fn class_def(
        &mut self,
        name: &str,
        archetype: ArchetypeKind,
        bases: Vec<ExprId>,
        build: impl FnOnce(&mut Self, &mut ClassParts),
    ) -> DeclId {
        let decl = self.class(name, archetype, bases, build);
        let stmt = self.stmt(StmtKind::ClassDef(decl));
        self.push(stmt);
        decl
    }

    /// An attribute declaration for use inside a `class` closure.
    pub fn field(
        &mut self,
        name: &str,
        annotation: Option<ExprId>,
        default: Option<ExprId>,
    ) -> FieldDecl {
        let name = self.name(name);
        let span = self.next_span();
        FieldDecl {
            name,
            annotation,
            default,
            span,
        }
    }

    /// A generic type parameter declaration for use inside a `class` closure.
    pub fn type_param(&mut self, name: &str, variance: Variance, bound: Option<ExprId>) -> DeclId {
        let name_id = self.name(name);
        let span = self.next_span();
        let scope = self.current_scope();
        let decl = self.arena.alloc_decl(Declaration {
            name: name_id,
            kind: DeclKind::TypeParam { variance, bound },
            span,
        });
        self.arena.scope_mut(scope).symbols.insert(name_id, decl);
        decl
    }

    /// Declare an imported module namespace in the current scope.
    ///
    /// The closure populates the module's exported symbol table.
    pub fn import_module(&mut self, name: &str, build: impl FnOnce(&mut Self)) -> DeclId {
        let name_id = self.name(name);
        let parent = self.current_scope();
        let symbols = self.push_scope();
        build(self);
        self.pop_scope();
        let span = self.next_span();
        let decl = self.arena.alloc_decl(Declaration {
            name: name_id,
            kind: DeclKind::Module { symbols },
            span,
        });
        self.arena.scope_mut(parent).symbols.insert(name_id, decl);
        decl
    }

    // ========================================
    // Finish
    // ========================================

    /// Consume the builder, producing the bound module and its arena.
    pub fn finish(self) -> (Module, AstArena) {
        (
            Module {
                name: self.module_name,
                body: self.body,
                scope: self.module_scope,
            },
            self.arena,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_a_function_with_params_in_scope() {
        let interner = Arc::new(StringInterner::new());
        let mut b = ModuleBuilder::new(interner, "m");
        let int_ann = b.ident("int");
        let p = b.param("x", Some(int_ann));
        let decl = b.def("double", vec![p], Some(int_ann), |b| {
            let x = b.ident("x");
            let two = b.int(2);
            let body = b.binary(BinaryOp::Mul, x, two);
            let ret = b.return_stmt(Some(body));
            vec![ret]
        });
        let (module, arena) = b.finish();

        assert_eq!(module.body.len(), 1);
        let DeclKind::Function(f) = &arena.decl(decl).kind else {
            panic!("expected function decl");
        };
        // The parameter is bound in the function scope.
        let x = arena.scope(f.scope).symbols.get(f.params[0].name);
        assert!(x.is_some());
    }

    #[test]
    fn class_scope_is_child_of_module_scope() {
        let interner = Arc::new(StringInterner::new());
        let mut b = ModuleBuilder::new(interner, "m");
        let decl = b.class_def("Animal", ArchetypeKind::Class, vec![], |b, parts| {
            let ann = b.ident("str");
            let field = b.field("name", Some(ann), None);
            parts.fields.push(field);
        });
        let (module, arena) = b.finish();

        let DeclKind::Class(c) = &arena.decl(decl).kind else {
            panic!("expected class decl");
        };
        assert_eq!(arena.scope(c.scope).parent, Some(module.scope));
        assert_eq!(c.fields.len(), 1);
    }
}
