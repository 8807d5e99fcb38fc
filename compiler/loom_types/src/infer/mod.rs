//! Expression type inference, dispatched per expression shape.
//!
//! Every shape produces a type; there is no failure path out of `infer`.
//! Unresolvable subexpressions surface as `Unknown`, which downstream
//! rules absorb without emitting secondary diagnostics.

pub(crate) mod annotations;
pub(crate) mod iteration;
pub(crate) mod operators;

use loom_ir::{ComprehensionKind, ExprId, ExprKind, Name, Param, ScopeId, Span};

use crate::call::{self, CallArgValue};
use crate::check::ModuleChecker;
use crate::error::{TypeCheckError, TypeCheckErrorKind};
use crate::flags::ClassFlags;
use crate::literal::{LiteralType, LiteralValue};
use crate::relate::lookup_member;
use crate::ty::{FnParam, FunctionType, Type};

use std::sync::Arc;

/// Infer one expression's type. Called through the checker's memo table,
/// never directly.
#[tracing::instrument(level = "trace", skip(checker))]
pub(crate) fn infer(checker: &mut ModuleChecker<'_>, id: ExprId) -> Type {
    let expr = checker.arena.expr(id);
    let span = expr.span;
    match &expr.kind {
        // === Literals ===
        ExprKind::Int(v) => Type::Literal(LiteralType::new(
            LiteralValue::Int(*v),
            checker.builtins.int.to_instance(),
        )),
        ExprKind::Float(v) => Type::Literal(LiteralType::new(
            LiteralValue::float(*v),
            checker.builtins.float.to_instance(),
        )),
        ExprKind::Complex(imag) => Type::Literal(LiteralType::new(
            LiteralValue::complex(0.0, *imag),
            checker.builtins.complex.to_instance(),
        )),
        ExprKind::Str(s) => Type::Literal(LiteralType::new(
            LiteralValue::Str(*s),
            checker.builtins.str.to_instance(),
        )),
        ExprKind::Bool(v) => Type::Literal(LiteralType::new(
            LiteralValue::Bool(*v),
            checker.builtins.bool.to_instance(),
        )),
        ExprKind::NoneLit => checker.builtins.none_instance(),

        // === Containers ===
        ExprKind::List(elems) => {
            let elem = element_union(checker, elems);
            checker.builtins.list_of(elem)
        }
        ExprKind::Set(elems) => {
            let elem = element_union(checker, elems);
            checker.builtins.set_of(elem)
        }
        ExprKind::Tuple(elems) => {
            let tys: Vec<Type> = elems
                .iter()
                .map(|&e| checker.infer_expr(e).widened())
                .collect();
            checker.builtins.tuple_of(tys)
        }
        ExprKind::Dict(entries) => {
            let keys: Vec<Type> = entries
                .iter()
                .map(|&(k, _)| checker.infer_expr(k).widened())
                .collect();
            let values: Vec<Type> = entries
                .iter()
                .map(|&(_, v)| checker.infer_expr(v).widened())
                .collect();
            let key = if keys.is_empty() {
                Type::Unknown
            } else {
                Type::union_of(keys)
            };
            let value = if values.is_empty() {
                Type::Unknown
            } else {
                Type::union_of(values)
            };
            checker.builtins.dict_of(key, value)
        }

        ExprKind::Comprehension {
            kind,
            binding,
            iter,
            condition,
            key,
            element,
            scope,
        } => infer_comprehension(
            checker, *kind, *binding, *iter, *condition, *key, *element, *scope,
        ),

        ExprKind::Lambda {
            params,
            body,
            scope,
        } => infer_lambda(checker, params, *body, *scope),

        // === Branches ===
        ExprKind::Ternary {
            condition,
            then,
            otherwise,
        } => {
            checker.infer_expr(*condition);
            let a = checker.infer_expr(*then);
            let b = checker.infer_expr(*otherwise);
            Type::union_of([a, b])
        }
        // Best-effort: no truthiness narrowing, the result covers both
        // operands.
        ExprKind::BoolOp { left, right, .. } => {
            let a = checker.infer_expr(*left);
            let b = checker.infer_expr(*right);
            Type::union_of([a, b])
        }

        // === Operators ===
        ExprKind::Binary { op, left, right } => {
            operators::infer_binary(checker, *op, *left, *right, span)
        }
        ExprKind::Unary { op, operand } => operators::infer_unary(checker, *op, *operand, span),

        // === Access ===
        ExprKind::Member { object, member } => {
            let object_ty = checker.infer_expr(*object);
            if object_ty.is_unknown() {
                return Type::Unknown;
            }
            if matches!(object_ty, Type::Never) {
                return Type::Never;
            }
            match lookup_member(&object_ty, *member) {
                Some(ty) => ty,
                None => {
                    let err = TypeCheckError::new(
                        TypeCheckErrorKind::UnknownMember {
                            ty: checker.render(&object_ty),
                            member: checker.interner.resolve(*member).to_string(),
                        },
                        span,
                    );
                    checker.report(err);
                    Type::Unknown
                }
            }
        }

        ExprKind::Index { object, index } => infer_index(checker, *object, *index, span),

        ExprKind::Slice {
            object,
            lower,
            upper,
            step,
        } => {
            for bound in [lower, upper, step].into_iter().flatten() {
                checker.infer_expr(*bound);
            }
            let object_ty = checker.infer_expr(*object);
            if object_ty.is_unknown() {
                return Type::Unknown;
            }
            // Slicing a sequence yields the same container type.
            let getitem = checker.interner.intern("__getitem__");
            if lookup_member(&object_ty, getitem).is_some() {
                object_ty.widened()
            } else {
                let err = TypeCheckError::new(
                    TypeCheckErrorKind::NotSubscriptable {
                        ty: checker.render(&object_ty),
                    },
                    span,
                );
                checker.report(err);
                Type::Unknown
            }
        }

        // === Calls ===
        ExprKind::Call { callee, args } => {
            let callee_ty = checker.infer_expr(*callee);
            let arg_values: Vec<CallArgValue> = args
                .iter()
                .map(|arg| CallArgValue {
                    name: arg.name,
                    ty: checker.infer_expr(arg.value),
                    span: checker.arena.expr(arg.value).span,
                })
                .collect();
            let outcome = {
                let ctx = checker.call_ctx();
                call::resolve_call(&ctx, &callee_ty, span, &arg_values)
            };
            for err in outcome.errors {
                checker.report(err);
            }
            outcome.ret
        }

        // === Names ===
        ExprKind::Ident(name) => checker.resolve_ident(*name, span),
        ExprKind::SelfRef => checker.current_self().cloned().unwrap_or(Type::Unknown),
    }
}

fn element_union(checker: &mut ModuleChecker<'_>, elems: &[ExprId]) -> Type {
    if elems.is_empty() {
        return Type::Unknown;
    }
    let tys: Vec<Type> = elems
        .iter()
        .map(|&e| checker.infer_expr(e).widened())
        .collect();
    Type::union_of(tys)
}

#[allow(clippy::too_many_arguments)]
fn infer_comprehension(
    checker: &mut ModuleChecker<'_>,
    kind: ComprehensionKind,
    binding: Name,
    iter: ExprId,
    condition: Option<ExprId>,
    key: Option<ExprId>,
    element: ExprId,
    scope: ScopeId,
) -> Type {
    let iter_ty = checker.infer_expr(iter);
    let elem = iteration::element_type(checker, &iter_ty, checker.arena.expr(iter).span);

    checker.scope_stack.push(scope);
    if let Some(decl) = checker.arena.scope(scope).symbols.get(binding) {
        checker.set_decl_type(decl, elem);
    }
    if let Some(cond) = condition {
        checker.infer_expr(cond);
    }
    let key_ty = key.map(|k| checker.infer_expr(k).widened());
    let element_ty = checker.infer_expr(element).widened();
    checker.scope_stack.pop();

    match kind {
        ComprehensionKind::List => checker.builtins.list_of(element_ty),
        ComprehensionKind::Set => checker.builtins.set_of(element_ty),
        ComprehensionKind::Dict => checker
            .builtins
            .dict_of(key_ty.unwrap_or(Type::Unknown), element_ty),
        ComprehensionKind::Generator => checker.builtins.iterator_of(element_ty),
    }
}

/// Parameter types come only from annotations or widened defaults;
/// unannotated parameters stay `Unknown`. Lambdas are inferred before
/// any enclosing call is matched, so an expected signature at the use
/// site does not flow back into the parameters.
fn infer_lambda(
    checker: &mut ModuleChecker<'_>,
    params: &[Param],
    body: ExprId,
    scope: ScopeId,
) -> Type {
    let mut fn_params = Vec::with_capacity(params.len());
    for param in params {
        let ty = match param.annotation {
            Some(ann) => annotations::resolve_annotation(checker, ann),
            None => match param.default {
                Some(default) => checker.infer_expr(default).widened(),
                None => Type::Unknown,
            },
        };
        fn_params.push(FnParam {
            name: param.name,
            kind: param.kind,
            ty,
            has_default: param.default.is_some(),
        });
    }

    checker.scope_stack.push(scope);
    for param in &fn_params {
        if let Some(decl) = checker.arena.scope(scope).symbols.get(param.name) {
            checker.set_decl_type(decl, param.ty.clone());
        }
    }
    let ret = checker.infer_expr(body);
    checker.scope_stack.pop();

    Type::Function(Arc::new(FunctionType::new(
        Name::EMPTY,
        fn_params,
        ret,
    )))
}

fn infer_index(
    checker: &mut ModuleChecker<'_>,
    object: ExprId,
    index: ExprId,
    span: Span,
) -> Type {
    let object_ty = checker.infer_expr(object);
    if object_ty.is_unknown() {
        checker.infer_expr(index);
        return Type::Unknown;
    }

    // Subscripting a class object is generic specialization, not item
    // access: `list[int]` in expression position.
    if let Type::Class(c) = &object_ty {
        if !c.instance {
            return annotations::specialize(checker, object, index, span);
        }
        // Fixed-arity tuples index by position when the index is a known
        // literal.
        if c.has_flag(ClassFlags::TUPLE) {
            let index_ty = checker.infer_expr(index);
            if let Some(args) = c.args.as_deref() {
                if let Type::Literal(lit) = &index_ty {
                    if let LiteralValue::Int(i) = lit.value {
                        if let Ok(i) = usize::try_from(i) {
                            if let Some(arg) = args.get(i) {
                                return arg.clone();
                            }
                        }
                    }
                }
                return Type::union_of(args.iter().cloned());
            }
            return Type::Unknown;
        }
    }

    let index_ty = checker.infer_expr(index);
    let getitem = checker.interner.intern("__getitem__");
    match lookup_member(&object_ty, getitem) {
        Some(member) => {
            let args = [CallArgValue {
                name: None,
                ty: index_ty,
                span: checker.arena.expr(index).span,
            }];
            let outcome = {
                let ctx = checker.call_ctx();
                call::resolve_call(&ctx, &member, span, &args)
            };
            for err in outcome.errors {
                checker.report(err);
            }
            outcome.ret
        }
        None => {
            let err = TypeCheckError::new(
                TypeCheckErrorKind::NotSubscriptable {
                    ty: checker.render(&object_ty),
                },
                span,
            );
            checker.report(err);
            Type::Unknown
        }
    }
}
