//! Statement traversal: assignments, returns, control flow, and function
//! and class bodies.
//!
//! Traversal never aborts; every failure becomes a diagnostic and the walk
//! continues to the end of the module.

use loom_ir::{DeclId, DeclKind, Name, Span, StmtId, StmtKind};

use crate::error::TypeCheckError;
use crate::relate::assign_type;
use crate::ty::{ClassType, Type};

use super::ModuleChecker;

impl ModuleChecker<'_> {
    pub(crate) fn check_body(&mut self, stmts: &[StmtId]) {
        for &stmt in stmts {
            self.check_stmt(stmt);
        }
    }

    fn check_stmt(&mut self, id: StmtId) {
        let stmt = self.arena.stmt(id);
        match &stmt.kind {
            StmtKind::Expr(expr) => {
                self.infer_expr(*expr);
            }

            StmtKind::Assign { target, value } => {
                let value_ty = self.infer_expr(*value);
                let target_ty = self.infer_expr(*target);
                self.check_assignable(&value_ty, &target_ty, self.arena.expr(*value).span);
            }

            StmtKind::AnnAssign {
                target,
                annotation,
                value,
            } => {
                let declared = crate::infer::annotations::resolve_annotation(self, *annotation);
                self.set_expr_type(*target, declared.clone());
                if let Some(value) = value {
                    let value_ty = self.infer_expr(*value);
                    self.check_assignable(&value_ty, &declared, self.arena.expr(*value).span);
                }
            }

            StmtKind::Return { value } => {
                let (value_ty, span) = match value {
                    Some(v) => (self.infer_expr(*v), self.arena.expr(*v).span),
                    None => (self.builtins.none_instance(), stmt.span),
                };
                if let Some(expected) = self.return_types.last().cloned() {
                    self.check_assignable(&value_ty, &expected, span);
                }
            }

            StmtKind::If {
                condition,
                then_body,
                else_body,
            } => {
                self.infer_expr(*condition);
                self.check_body(then_body);
                self.check_body(else_body);
            }

            StmtKind::While { condition, body } => {
                self.infer_expr(*condition);
                self.check_body(body);
            }

            StmtKind::For {
                binding,
                iter,
                body,
            } => {
                let iter_ty = self.infer_expr(*iter);
                let elem =
                    crate::infer::iteration::element_type(self, &iter_ty, self.arena.expr(*iter).span);
                self.bind_local(*binding, elem);
                self.check_body(body);
            }

            StmtKind::With {
                context,
                binding,
                body,
            } => {
                let ctx_ty = self.infer_expr(*context);
                let acquired = crate::infer::iteration::context_enter_type(
                    self,
                    &ctx_ty,
                    self.arena.expr(*context).span,
                );
                if let Some(name) = binding {
                    self.bind_local(*name, acquired);
                }
                self.check_body(body);
            }

            StmtKind::FunctionDef(decl) => {
                self.resolve_decl(*decl);
                self.check_function_body(*decl, None);
            }

            StmtKind::ClassDef(decl) => {
                self.register_class(*decl);
                self.check_class_bodies(*decl);
            }

            StmtKind::Pass => {}
        }
    }

    fn check_assignable(&mut self, value: &Type, declared: &Type, span: Span) {
        if declared.is_unknown() || value.is_unknown() {
            return;
        }
        if !assign_type(value, declared) {
            let err = TypeCheckError::type_mismatch(
                self.render(declared),
                self.render(value),
                span,
            );
            self.report(err);
        }
    }

    /// Rebind a loop/context variable declared in the current scope.
    fn bind_local(&mut self, name: Name, ty: Type) {
        let scope = self.current_scope();
        if let Some(decl) = self.arena.scope(scope).symbols.get(name) {
            self.set_decl_type(decl, ty);
        }
    }

    // === Function bodies ===

    /// Check one function's body against its signature: parameter types
    /// seed the local scope, returns check against the declared type, and
    /// a declared non-optional return requires at least one value return.
    pub(crate) fn check_function_body(&mut self, id: DeclId, owner: Option<&ClassType>) {
        let decl = self.arena.decl(id);
        let DeclKind::Function(func) = &decl.kind else {
            return;
        };
        let sig = self.function_signature(id, owner);

        self.scope_stack.push(func.scope);
        self.return_types.push(sig.ret.clone());
        if let Some(owner) = owner {
            self.self_types.push(Type::Class(owner.clone()));
        }

        for param in &sig.params {
            self.bind_local(param.name, param.ty.clone());
        }
        self.check_body(&func.body);

        if owner.is_some() {
            self.self_types.pop();
        }
        self.return_types.pop();
        self.scope_stack.pop();

        let returns_value = func.body.iter().any(|&s| self.has_value_return(s));
        if !returns_value
            && !sig.ret.is_unknown()
            && !sig.ret.is_any()
            && !assign_type(&self.builtins.none_instance(), &sig.ret)
        {
            let err = TypeCheckError::type_mismatch(
                self.render(&sig.ret),
                self.render(&self.builtins.none_instance()),
                decl.span,
            );
            self.report(err);
        }
    }

    fn has_value_return(&self, id: StmtId) -> bool {
        match &self.arena.stmt(id).kind {
            StmtKind::Return { value } => value.is_some(),
            StmtKind::If {
                then_body,
                else_body,
                ..
            } => {
                then_body.iter().any(|&s| self.has_value_return(s))
                    || else_body.iter().any(|&s| self.has_value_return(s))
            }
            StmtKind::While { body, .. } | StmtKind::For { body, .. } => {
                body.iter().any(|&s| self.has_value_return(s))
            }
            StmtKind::With { body, .. } => body.iter().any(|&s| self.has_value_return(s)),
            _ => false,
        }
    }

    // === Class bodies ===

    /// Check all method bodies of a registered class.
    fn check_class_bodies(&mut self, id: DeclId) {
        let decl = self.arena.decl(id);
        let DeclKind::Class(class) = &decl.kind else {
            return;
        };
        let Some(details) = self.class_details.get(&id).cloned() else {
            return;
        };
        let owner = self.generic_instance(&details);

        self.scope_stack.push(class.scope);
        for &method in &class.methods {
            self.check_function_body(method, Some(&owner));
        }
        // Nested class declarations are statements only at module or
        // function level; class bodies hold fields and methods.
        self.scope_stack.pop();
    }
}
