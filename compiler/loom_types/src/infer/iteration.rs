//! Element and context-acquisition typing for loops, comprehensions, and
//! `with` blocks.

use loom_ir::Span;

use crate::call::{self, CallArgValue};
use crate::check::ModuleChecker;
use crate::error::{TypeCheckError, TypeCheckErrorKind};
use crate::flags::ClassFlags;
use crate::relate::lookup_member;
use crate::ty::Type;

/// The element type produced by iterating `iterable`.
///
/// Preference order: the container's declared element argument (which the
/// `__iter__`/`__next__` pair surfaces through member projection), then
/// legacy item access via `__getitem__`. Reports `NotIterable` when
/// neither protocol is present.
pub(crate) fn element_type(
    checker: &mut ModuleChecker<'_>,
    iterable: &Type,
    span: Span,
) -> Type {
    match iterable {
        Type::Unknown | Type::Unbound => return Type::Unknown,
        Type::Any => return Type::Any,
        Type::Never => return Type::Never,
        // Iterating a union iterates every branch.
        Type::Union(branches) => {
            let elems: Vec<Type> = branches
                .iter()
                .map(|b| element_type(checker, &b.clone(), span))
                .collect();
            return Type::union_of(elems);
        }
        // A fixed-arity tuple yields the union of its element types.
        Type::Class(c) if c.instance && c.has_flag(ClassFlags::TUPLE) => {
            return match c.args.as_deref() {
                Some(args) => Type::union_of(args.iter().cloned()),
                None => checker.builtins.object_instance(),
            };
        }
        _ => {}
    }

    if let Some(elem) = iterator_element(checker, iterable, span) {
        return elem;
    }
    if let Some(elem) = getitem_element(checker, iterable, span) {
        return elem;
    }

    let err = TypeCheckError::new(
        TypeCheckErrorKind::NotIterable {
            ty: checker.render(iterable),
        },
        span,
    );
    checker.report(err);
    Type::Unknown
}

/// Resolve the "produces an iterator, which produces elements" pair.
fn iterator_element(
    checker: &mut ModuleChecker<'_>,
    iterable: &Type,
    span: Span,
) -> Option<Type> {
    let dunder_iter = checker.interner.intern("__iter__");
    let iter_method = lookup_member(iterable, dunder_iter)?;
    let iterator = call_no_args(checker, &iter_method, span)?;

    let dunder_next = checker.interner.intern("__next__");
    let next_method = lookup_member(&iterator, dunder_next)?;
    call_no_args(checker, &next_method, span)
}

/// Legacy fallback: integer item access.
fn getitem_element(
    checker: &mut ModuleChecker<'_>,
    iterable: &Type,
    span: Span,
) -> Option<Type> {
    let getitem = checker.interner.intern("__getitem__");
    let member = lookup_member(iterable, getitem)?;
    let args = [CallArgValue {
        name: None,
        ty: checker.builtins.int_instance(),
        span,
    }];
    let outcome = {
        let ctx = checker.call_ctx();
        call::resolve_call(&ctx, &member, span, &args)
    };
    outcome.errors.is_empty().then_some(outcome.ret)
}

/// The type bound by `with context as name`: requires the enter/exit
/// member pair and yields the enter member's return type.
pub(crate) fn context_enter_type(
    checker: &mut ModuleChecker<'_>,
    context: &Type,
    span: Span,
) -> Type {
    match context {
        Type::Unknown | Type::Unbound => return Type::Unknown,
        Type::Any => return Type::Any,
        _ => {}
    }

    let enter = checker.interner.intern("__enter__");
    let exit = checker.interner.intern("__exit__");
    let enter_member = lookup_member(context, enter);
    let exit_member = lookup_member(context, exit);
    if let (Some(enter_member), Some(_)) = (enter_member, exit_member) {
        if let Some(acquired) = call_no_args(checker, &enter_member, span) {
            return acquired;
        }
    }

    let err = TypeCheckError::new(
        TypeCheckErrorKind::NotContextManager {
            ty: checker.render(context),
        },
        span,
    );
    checker.report(err);
    Type::Unknown
}

fn call_no_args(checker: &mut ModuleChecker<'_>, callable: &Type, span: Span) -> Option<Type> {
    let outcome = {
        let ctx = checker.call_ctx();
        call::resolve_call(&ctx, callable, span, &[])
    };
    outcome.errors.is_empty().then_some(outcome.ret)
}
