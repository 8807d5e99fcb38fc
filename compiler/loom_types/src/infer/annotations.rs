//! Type-position evaluation: interpreting ordinary expressions as type
//! annotations.
//!
//! Annotations are plain expressions (`list[int]` is an `Index` node), so
//! evaluation resolves the same identifiers as value inference and then
//! converts class objects to instance types. Results are memoized per
//! expression, which also keeps an invalid annotation from being reported
//! twice.

use loom_ir::{BinaryOp, ExprId, ExprKind, Span};

use crate::check::ModuleChecker;
use crate::error::{TypeCheckError, TypeCheckErrorKind};
use crate::flags::ClassFlags;
use crate::ty::Type;

/// Evaluate an annotation expression to the instance type it denotes.
pub(crate) fn resolve_annotation(checker: &mut ModuleChecker<'_>, id: ExprId) -> Type {
    if let Some(ty) = checker.expr_type(id) {
        return ty.clone();
    }
    let ty = resolve_uncached(checker, id);
    checker.set_expr_type(id, ty.clone());
    ty
}

fn resolve_uncached(checker: &mut ModuleChecker<'_>, id: ExprId) -> Type {
    let expr = checker.arena.expr(id);
    let span = expr.span;
    match &expr.kind {
        ExprKind::NoneLit => checker.builtins.none_instance(),

        ExprKind::Ident(name) => {
            // `Any` and `Never` are annotation-only names, not classes.
            match checker.interner.resolve(*name) {
                "Any" if checker.arena.resolve_name(checker.current_scope(), *name).is_none() => {
                    return Type::Any;
                }
                "Never" if checker.arena.resolve_name(checker.current_scope(), *name).is_none() => {
                    return Type::Never;
                }
                _ => {}
            }
            let ty = checker.resolve_ident(*name, span);
            as_instance(ty)
        }

        // A string annotation is a forward reference to a name.
        ExprKind::Str(name) => {
            let ty = checker.resolve_ident(*name, span);
            as_instance(ty)
        }

        ExprKind::Index { object, index } => {
            let specialized = specialize(checker, *object, *index, span);
            as_instance(specialized)
        }

        // `A | B` in type position is a union annotation.
        ExprKind::Binary {
            op: BinaryOp::BitOr,
            left,
            right,
        } => {
            let a = resolve_annotation(checker, *left);
            let b = resolve_annotation(checker, *right);
            Type::union_of([a, b])
        }

        // A qualified name: the exported type of a module member.
        ExprKind::Member { .. } => {
            let ty = checker.infer_expr(id);
            as_instance(ty)
        }

        // Any other shape is not a valid annotation; stay gradual.
        _ => Type::Unknown,
    }
}

/// Specialize a generic class object with explicit type arguments, in
/// annotation or expression position. Returns the class-object form.
pub(crate) fn specialize(
    checker: &mut ModuleChecker<'_>,
    object: ExprId,
    index: ExprId,
    span: Span,
) -> Type {
    let base = checker.infer_expr(object);
    let class = match base {
        Type::Class(c) if !c.instance => c,
        Type::Unknown | Type::Unbound => return Type::Unknown,
        other => {
            let err = TypeCheckError::new(
                TypeCheckErrorKind::NotSubscriptable {
                    ty: checker.render(&other),
                },
                span,
            );
            checker.report(err);
            return Type::Unknown;
        }
    };

    let arg_exprs: Vec<ExprId> = match &checker.arena.expr(index).kind {
        ExprKind::Tuple(elems) => elems.clone(),
        _ => vec![index],
    };
    let args: Vec<Type> = arg_exprs
        .iter()
        .map(|&e| resolve_annotation(checker, e))
        .collect();

    // Tuples take any number of arguments; everything else must match its
    // declared parameter count.
    if !class.has_flag(ClassFlags::TUPLE) && args.len() != class.details.type_params.len() {
        let err = TypeCheckError::new(
            TypeCheckErrorKind::TypeArgCount {
                name: checker.interner.resolve(class.name()).to_string(),
                expected: class.details.type_params.len(),
                found: args.len(),
            },
            span,
        );
        checker.report(err);
        return Type::Class(class);
    }

    Type::Class(class.with_args(args))
}

/// Convert what a name resolved to into the type it denotes in type
/// position: a class object denotes its instances.
fn as_instance(ty: Type) -> Type {
    match ty {
        Type::Class(c) if !c.instance => Type::Class(c.to_instance()),
        Type::Class(_)
        | Type::TypeVar(_)
        | Type::Any
        | Type::Never
        | Type::Union(_)
        | Type::Function(_) => ty,
        Type::Unknown | Type::Unbound => Type::Unknown,
        // Modules, literals, and overloads denote no instance type.
        _ => Type::Unknown,
    }
}
