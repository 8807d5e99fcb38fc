//! Binary and unary operator typing.
//!
//! Numeric operands take a promotion fast path keyed on the builtin tower
//! (`bool < int < float < complex`); everything else dispatches through the
//! operator's dunder member, trying the reflected form on the right operand
//! when the left-hand candidate rejects the call.

use loom_ir::{BinaryOp, ExprId, Span, UnaryOp};

use crate::call::{self, CallArgValue};
use crate::check::ModuleChecker;
use crate::error::{TypeCheckError, TypeCheckErrorKind};
use crate::relate::lookup_member;
use crate::ty::Type;

pub(crate) fn infer_binary(
    checker: &mut ModuleChecker<'_>,
    op: BinaryOp,
    left: ExprId,
    right: ExprId,
    span: Span,
) -> Type {
    let lhs = checker.infer_expr(left);
    let rhs = checker.infer_expr(right);

    // A silent operand stays silent: no operator error cascades.
    if lhs.is_unknown() || rhs.is_unknown() {
        return if op.is_comparison() {
            checker.builtins.bool_instance()
        } else {
            Type::Unknown
        };
    }
    if lhs.is_any() || rhs.is_any() {
        return if op.is_comparison() {
            checker.builtins.bool_instance()
        } else {
            Type::Any
        };
    }

    // Identity and membership never consult a dunder on the operand pair
    // being compared, and equality is defined on every object.
    match op {
        BinaryOp::Is | BinaryOp::IsNot | BinaryOp::Eq | BinaryOp::NotEq => {
            return checker.builtins.bool_instance();
        }
        BinaryOp::In | BinaryOp::NotIn => {
            return membership(checker, &lhs, &rhs, span);
        }
        _ => {}
    }

    if op.is_comparison() {
        return ordered_comparison(checker, op, &lhs, &rhs, span);
    }

    if let Some(result) = numeric_binary(checker, op, &lhs, &rhs) {
        return result;
    }
    if let Some(result) = sequence_binary(checker, op, &lhs, &rhs) {
        return result;
    }
    if let Some(result) = dunder_binary(checker, op, &lhs, &rhs, span) {
        return result;
    }

    report_binary(checker, op, &lhs, &rhs, span);
    Type::Unknown
}

pub(crate) fn infer_unary(
    checker: &mut ModuleChecker<'_>,
    op: UnaryOp,
    operand: ExprId,
    span: Span,
) -> Type {
    let ty = checker.infer_expr(operand);

    if let UnaryOp::Not = op {
        // `not` accepts anything and always yields bool.
        return checker.builtins.bool_instance();
    }
    if ty.is_unknown() {
        return Type::Unknown;
    }
    if ty.is_any() {
        return Type::Any;
    }

    if let Some(rank) = checker.builtins.numeric_rank(&ty) {
        match op {
            // Negating or asserting a bool produces an int.
            UnaryOp::Neg | UnaryOp::Pos => {
                return checker.builtins.numeric_of_rank(rank.max(1));
            }
            UnaryOp::Invert if rank <= 1 => {
                return checker.builtins.int_instance();
            }
            _ => {}
        }
    }

    if let Some(dunder) = op.dunder() {
        let name = checker.interner.intern(dunder);
        if let Some(member) = lookup_member(&ty, name) {
            if let Some(ret) = try_call(checker, &member, span, &[]) {
                return ret;
            }
        }
    }

    let err = TypeCheckError::new(
        TypeCheckErrorKind::UnsupportedUnaryOperator {
            op: op.as_symbol().to_string(),
            operand: checker.render(&ty),
        },
        span,
    );
    checker.report(err);
    Type::Unknown
}

/// `x in c` checks for a containment member on the container and always
/// yields bool; the element side is not constrained beyond call matching.
fn membership(
    checker: &mut ModuleChecker<'_>,
    element: &Type,
    container: &Type,
    span: Span,
) -> Type {
    let contains = checker.interner.intern("__contains__");
    let supported = match lookup_member(container, contains) {
        Some(member) => {
            let args = [CallArgValue {
                name: None,
                ty: element.clone(),
                span,
            }];
            try_call(checker, &member, span, &args).is_some()
        }
        // Anything iterable supports linear membership.
        None => {
            let iter = checker.interner.intern("__iter__");
            lookup_member(container, iter).is_some()
        }
    };
    if !supported {
        report_binary(checker, BinaryOp::In, element, container, span);
    }
    checker.builtins.bool_instance()
}

fn ordered_comparison(
    checker: &mut ModuleChecker<'_>,
    op: BinaryOp,
    lhs: &Type,
    rhs: &Type,
    span: Span,
) -> Type {
    let bool_ty = checker.builtins.bool_instance();
    let numeric = checker.builtins.numeric_rank(lhs).is_some()
        && checker.builtins.numeric_rank(rhs).is_some();
    if numeric || (is_str(checker, lhs) && is_str(checker, rhs)) {
        return bool_ty;
    }
    if dunder_binary(checker, op, lhs, rhs, span).is_some() {
        return bool_ty;
    }
    report_binary(checker, op, lhs, rhs, span);
    bool_ty
}

/// Promotion over the numeric tower. Returns None when either operand is
/// non-numeric, deferring to dunder dispatch.
fn numeric_binary(
    checker: &mut ModuleChecker<'_>,
    op: BinaryOp,
    lhs: &Type,
    rhs: &Type,
) -> Option<Type> {
    let lrank = checker.builtins.numeric_rank(lhs)?;
    let rrank = checker.builtins.numeric_rank(rhs)?;
    let rank = lrank.max(rrank);
    match op {
        BinaryOp::Add
        | BinaryOp::Sub
        | BinaryOp::Mul
        | BinaryOp::Mod
        | BinaryOp::Pow
        | BinaryOp::FloorDiv => {
            // bool arithmetic lands in int.
            Some(checker.builtins.numeric_of_rank(rank.max(1)))
        }
        // True division always produces at least a float.
        BinaryOp::Div => Some(checker.builtins.numeric_of_rank(rank.max(2))),
        BinaryOp::LShift
        | BinaryOp::RShift
        | BinaryOp::BitAnd
        | BinaryOp::BitOr
        | BinaryOp::BitXor => {
            // Integral only; let the error path report float/complex operands.
            (rank <= 1).then(|| checker.builtins.int_instance())
        }
        _ => None,
    }
}

/// Builtin sequence shortcuts that the class tables do not spell out as
/// reflected overloads: concatenation, repetition, and str formatting.
fn sequence_binary(
    checker: &mut ModuleChecker<'_>,
    op: BinaryOp,
    lhs: &Type,
    rhs: &Type,
) -> Option<Type> {
    match op {
        BinaryOp::Add if is_str(checker, lhs) && is_str(checker, rhs) => {
            Some(checker.builtins.str_instance())
        }
        BinaryOp::Add => {
            let (le, re) = (list_element(checker, lhs)?, list_element(checker, rhs)?);
            Some(checker.builtins.list_of(Type::union_of([le, re])))
        }
        BinaryOp::Mul if is_str(checker, lhs) && is_int(checker, rhs) => {
            Some(checker.builtins.str_instance())
        }
        BinaryOp::Mul if is_int(checker, rhs) => {
            let elem = list_element(checker, lhs)?;
            Some(checker.builtins.list_of(elem))
        }
        BinaryOp::Mod if is_str(checker, lhs) => Some(checker.builtins.str_instance()),
        _ => None,
    }
}

/// Dunder dispatch: the left operand's method first, then the reflected
/// method on the right operand. Candidate rejection is silent; only total
/// failure surfaces as an unsupported-operator error at the call site.
fn dunder_binary(
    checker: &mut ModuleChecker<'_>,
    op: BinaryOp,
    lhs: &Type,
    rhs: &Type,
    span: Span,
) -> Option<Type> {
    let dunder = op.dunder()?;
    let name = checker.interner.intern(dunder);
    if let Some(member) = lookup_member(lhs, name) {
        let args = [CallArgValue {
            name: None,
            ty: rhs.clone(),
            span,
        }];
        if let Some(ret) = try_call(checker, &member, span, &args) {
            return Some(ret);
        }
    }
    let reflected = op.reflected_dunder()?;
    let name = checker.interner.intern(reflected);
    let member = lookup_member(rhs, name)?;
    let args = [CallArgValue {
        name: None,
        ty: lhs.clone(),
        span,
    }];
    try_call(checker, &member, span, &args)
}

/// Run a call match, discarding its errors; None means the candidate
/// rejected the arguments.
fn try_call(
    checker: &mut ModuleChecker<'_>,
    callee: &Type,
    span: Span,
    args: &[CallArgValue],
) -> Option<Type> {
    let outcome = {
        let ctx = checker.call_ctx();
        call::resolve_call(&ctx, callee, span, args)
    };
    outcome.errors.is_empty().then_some(outcome.ret)
}

fn report_binary(
    checker: &mut ModuleChecker<'_>,
    op: BinaryOp,
    lhs: &Type,
    rhs: &Type,
    span: Span,
) {
    let err = TypeCheckError::new(
        TypeCheckErrorKind::UnsupportedBinaryOperator {
            op: op.as_symbol().to_string(),
            left: checker.render(lhs),
            right: checker.render(rhs),
        },
        span,
    );
    checker.report(err);
}

fn is_str(checker: &ModuleChecker<'_>, ty: &Type) -> bool {
    match ty {
        Type::Class(c) => c.instance && c.same_class(&checker.builtins.str),
        Type::Literal(lit) => lit.base.same_class(&checker.builtins.str),
        _ => false,
    }
}

fn is_int(checker: &ModuleChecker<'_>, ty: &Type) -> bool {
    checker
        .builtins
        .numeric_rank(ty)
        .is_some_and(|rank| rank <= 1)
}

fn list_element(checker: &ModuleChecker<'_>, ty: &Type) -> Option<Type> {
    let Type::Class(c) = ty else { return None };
    (c.instance && c.same_class(&checker.builtins.list)).then(|| c.arg(0))
}
