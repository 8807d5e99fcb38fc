//! Call-site matching: argument binding, overload resolution, callable
//! validation, and generic specialization.
//!
//! Matching is pure: it returns the result type plus every error it found,
//! and the caller decides whether to surface them. Overload probing relies
//! on this; a candidate's errors are discarded unless it is the one that
//! matched.

use std::sync::Arc;

use loom_ir::{Name, ParamKind, Span, StringInterner};

use crate::check::CheckConfig;
use crate::error::{TypeCheckError, TypeCheckErrorKind};
use crate::relate::{assign_type, lookup_member};
use crate::ty::{substitute, ClassType, FunctionType, Type, TypeVarMap};

/// One evaluated argument at a call site.
#[derive(Clone, Debug)]
pub struct CallArgValue {
    pub name: Option<Name>,
    pub ty: Type,
    pub span: Span,
}

/// What matching produced: the call's result type and the errors found.
#[derive(Debug)]
pub struct CallOutcome {
    pub ret: Type,
    pub errors: Vec<TypeCheckError>,
    pub solved: TypeVarMap,
}

impl CallOutcome {
    fn ok(ret: Type) -> Self {
        CallOutcome {
            ret,
            errors: Vec::new(),
            solved: TypeVarMap::new(),
        }
    }

    fn failed(err: TypeCheckError) -> Self {
        CallOutcome {
            ret: Type::Unknown,
            errors: vec![err],
            solved: TypeVarMap::new(),
        }
    }
}

/// Shared immutable context for one matching run.
pub(crate) struct CallContext<'a> {
    pub interner: &'a StringInterner,
    pub config: &'a CheckConfig,
}

impl<'a> CallContext<'a> {
    fn render(&self, ty: &Type) -> String {
        ty.display(self.interner).to_string()
    }
}

/// Resolve a call of `callee` with the given arguments.
pub(crate) fn resolve_call(
    ctx: &CallContext<'_>,
    callee: &Type,
    span: Span,
    args: &[CallArgValue],
) -> CallOutcome {
    match callee {
        // Gradual callees absorb the call without complaint.
        Type::Any => CallOutcome::ok(Type::Any),
        Type::Unknown | Type::Unbound => CallOutcome::ok(Type::Unknown),
        Type::Never => CallOutcome::ok(Type::Never),
        Type::Function(f) => match_signature(ctx, f, span, args),
        Type::Overloaded(sigs) => resolve_overloads(ctx, sigs, span, args),
        Type::Class(c) if !c.instance => instantiate(ctx, c, span, args),
        Type::Class(_) => call_instance(ctx, callee, span, args),
        Type::Literal(lit) => call_instance(ctx, &lit.widen(), span, args),
        Type::TypeVar(var) => match &var.bound {
            Some(bound) => resolve_call(ctx, bound, span, args),
            None => CallOutcome::failed(TypeCheckError::new(
                TypeCheckErrorKind::NotCallable {
                    ty: ctx.render(callee),
                },
                span,
            )),
        },
        // A union is callable when every branch is; try each branch and
        // union the results rather than reporting per-branch noise.
        Type::Union(branches) => {
            let mut rets = Vec::with_capacity(branches.len());
            for branch in branches.iter() {
                let outcome = resolve_call(ctx, branch, span, args);
                if !outcome.errors.is_empty() {
                    return CallOutcome::failed(TypeCheckError::new(
                        TypeCheckErrorKind::NotCallable {
                            ty: ctx.render(callee),
                        },
                        span,
                    ));
                }
                rets.push(outcome.ret);
            }
            CallOutcome::ok(Type::union_of(rets))
        }
        Type::Module(_) => CallOutcome::failed(TypeCheckError::new(
            TypeCheckErrorKind::NotCallable {
                ty: ctx.render(callee),
            },
            span,
        )),
    }
}

/// Call through an instance's `__call__` member, bound to the instance.
fn call_instance(
    ctx: &CallContext<'_>,
    callee: &Type,
    span: Span,
    args: &[CallArgValue],
) -> CallOutcome {
    let dunder_call = ctx.interner.intern("__call__");
    match lookup_member(callee, dunder_call) {
        // The member arrives already bound by the access transform. The
        // result is whatever its signature declares, even when that is
        // itself another callable instance.
        Some(member) => resolve_call(ctx, &member, span, args),
        None => CallOutcome::failed(TypeCheckError::new(
            TypeCheckErrorKind::NotCallable {
                ty: ctx.render(callee),
            },
            span,
        )),
    }
}

/// Call a class object: match the constructor and produce an instance
/// specialized by whatever the arguments solved for the class parameters.
fn instantiate(
    ctx: &CallContext<'_>,
    class: &ClassType,
    span: Span,
    args: &[CallArgValue],
) -> CallOutcome {
    let instance = class.to_instance();
    let init = ctx.interner.intern("__init__");
    let ctor = lookup_member(&Type::Class(instance.clone()), init);
    let mut outcome = match ctor {
        Some(Type::Function(f)) => match_signature(ctx, &f, span, args),
        Some(Type::Overloaded(sigs)) => resolve_overloads(ctx, &sigs, span, args),
        // No declared constructor: accept the arguments as-is.
        _ => CallOutcome::ok(Type::Unknown),
    };
    outcome.ret = Type::Class(specialized_instance(&instance, &outcome.solved));
    outcome
}

/// Fill a generic instance's arguments from a constructor's solutions;
/// unsolved parameters stay `Unknown`.
fn specialized_instance(instance: &ClassType, solved: &TypeVarMap) -> ClassType {
    if instance.args.is_some() || instance.details.type_params.is_empty() {
        return instance.clone();
    }
    let args: Vec<Type> = instance
        .details
        .type_params
        .iter()
        .map(|p| solved.get(p).cloned().unwrap_or(Type::Unknown))
        .collect();
    instance.with_args(args)
}

/// Try each signature in declaration order; the first that binds and
/// validates with zero errors wins, even if a later one would also match.
fn resolve_overloads(
    ctx: &CallContext<'_>,
    sigs: &[Arc<FunctionType>],
    span: Span,
    args: &[CallArgValue],
) -> CallOutcome {
    for sig in sigs {
        let outcome = match_signature(ctx, sig, span, args);
        if outcome.errors.is_empty() {
            return outcome;
        }
    }
    let name = sigs
        .first()
        .map_or(String::new(), |s| ctx.interner.resolve(s.name).to_string());
    CallOutcome::failed(TypeCheckError::new(
        TypeCheckErrorKind::NoMatchingOverload { name },
        span,
    ))
}

/// Bind arguments to one signature's parameters, solve its type variables,
/// and validate every bound pair. Collects every error rather than
/// stopping at the first.
pub(crate) fn match_signature(
    ctx: &CallContext<'_>,
    func: &FunctionType,
    span: Span,
    args: &[CallArgValue],
) -> CallOutcome {
    let mut errors = Vec::new();
    let bound = bind_arguments(ctx, func, span, args, &mut errors);
    // A shape that failed to bind produces no trustworthy result type;
    // argument-type mismatches further down still yield the declared one.
    let binding_failed = !errors.is_empty();

    let mut solved = TypeVarMap::new();
    for (param_idx, arg) in &bound {
        unify(
            ctx,
            &func.params[*param_idx].ty,
            arg,
            &mut solved,
            &mut errors,
        );
    }

    for (param_idx, arg) in &bound {
        let expected = substitute(&func.params[*param_idx].ty, &solved);
        if !assign_type(&arg.ty, &expected) {
            errors.push(TypeCheckError::type_mismatch(
                ctx.render(&expected),
                ctx.render(&arg.ty),
                arg.span,
            ));
        }
    }

    CallOutcome {
        ret: if binding_failed {
            Type::Unknown
        } else {
            substitute(&func.ret, &solved)
        },
        errors,
        solved,
    }
}

/// Pair each argument with a parameter index. Binding failures surface as
/// at most one `ArgumentCount` plus one error per bad keyword.
fn bind_arguments<'v>(
    ctx: &CallContext<'_>,
    func: &FunctionType,
    span: Span,
    args: &'v [CallArgValue],
    errors: &mut Vec<TypeCheckError>,
) -> Vec<(usize, &'v CallArgValue)> {
    let mut bound: Vec<(usize, &CallArgValue)> = Vec::with_capacity(args.len());
    let mut filled = vec![false; func.params.len()];

    let positional: Vec<usize> = func
        .params
        .iter()
        .enumerate()
        .filter(|(_, p)| p.kind == ParamKind::Positional)
        .map(|(i, _)| i)
        .collect();
    let varargs = func.params.iter().position(|p| p.kind == ParamKind::VarArgs);
    let kwargs = func.params.iter().position(|p| p.kind == ParamKind::KwArgs);

    let mut next_positional = 0usize;
    let mut positional_given = 0usize;
    let mut overflowed = false;

    for arg in args {
        match arg.name {
            None => {
                positional_given += 1;
                if let Some(&idx) = positional.get(next_positional) {
                    next_positional += 1;
                    filled[idx] = true;
                    bound.push((idx, arg));
                } else if let Some(idx) = varargs {
                    bound.push((idx, arg));
                } else {
                    overflowed = true;
                }
            }
            Some(name) => {
                let target = func
                    .params
                    .iter()
                    .position(|p| p.name == name && p.kind != ParamKind::VarArgs && p.kind != ParamKind::KwArgs);
                match target {
                    Some(idx) if filled[idx] => {
                        errors.push(TypeCheckError::new(
                            TypeCheckErrorKind::DuplicateBinding {
                                name: ctx.interner.resolve(name).to_string(),
                            },
                            arg.span,
                        ));
                    }
                    Some(idx) => {
                        filled[idx] = true;
                        bound.push((idx, arg));
                    }
                    None => {
                        if let Some(idx) = kwargs {
                            bound.push((idx, arg));
                        } else {
                            errors.push(TypeCheckError::new(
                                TypeCheckErrorKind::UnknownKeyword {
                                    keyword: ctx.interner.resolve(name).to_string(),
                                },
                                arg.span,
                            ));
                        }
                    }
                }
            }
        }
    }

    let missing_required = func
        .params
        .iter()
        .enumerate()
        .any(|(i, p)| {
            !filled[i]
                && !p.has_default
                && matches!(p.kind, ParamKind::Positional | ParamKind::KeywordOnly)
        });

    if overflowed || missing_required {
        let required = func.required_positional();
        let expected = match func.max_positional() {
            Some(max) if max == required => format!("{required}"),
            Some(max) => format!("{required} to {max}"),
            None => format!("at least {required}"),
        };
        errors.push(TypeCheckError::new(
            TypeCheckErrorKind::ArgumentCount {
                name: ctx.interner.resolve(func.name).to_string(),
                expected,
                found: positional_given,
            },
            span,
        ));
    }

    bound
}

/// Solve type variables occurring in `param` against `arg`'s type. The
/// first occurrence binds; later occurrences must fit the binding or the
/// binding widens to a union (a mismatch under strict solving).
fn unify(
    ctx: &CallContext<'_>,
    param: &Type,
    arg: &CallArgValue,
    solved: &mut TypeVarMap,
    errors: &mut Vec<TypeCheckError>,
) {
    unify_types(ctx, param, &arg.ty, arg.span, solved, errors);
}

fn unify_types(
    ctx: &CallContext<'_>,
    param: &Type,
    arg: &Type,
    span: Span,
    solved: &mut TypeVarMap,
    errors: &mut Vec<TypeCheckError>,
) {
    match param {
        Type::TypeVar(var) => {
            if arg.is_unknown() {
                return;
            }
            if let Some(bound) = &var.bound {
                if !assign_type(arg, bound) {
                    errors.push(TypeCheckError::type_mismatch(
                        ctx.render(bound),
                        ctx.render(arg),
                        span,
                    ));
                    return;
                }
            }
            match solved.get(var).cloned() {
                None => solved.bind(var.clone(), arg.widened()),
                Some(existing) => {
                    if assign_type(arg, &existing) {
                        return;
                    }
                    if ctx.config.strict_type_var_solving {
                        errors.push(TypeCheckError::type_mismatch(
                            ctx.render(&existing),
                            ctx.render(arg),
                            span,
                        ));
                    } else {
                        solved.bind(var.clone(), Type::union_of([existing, arg.widened()]));
                    }
                }
            }
        }
        Type::Class(pc) => {
            let Some(p_args) = pc.args.as_deref() else {
                return;
            };
            let arg_class = match &arg.widened() {
                Type::Class(ac) if ac.instance == pc.instance => ac.clone(),
                _ => return,
            };
            let Some(view) = crate::relate::mro::ancestor_as(&arg_class, &pc.details) else {
                return;
            };
            if let Some(v_args) = view.args.as_deref() {
                for (p, a) in p_args.iter().zip(v_args) {
                    unify_types(ctx, p, a, span, solved, errors);
                }
            }
        }
        Type::Function(pf) => {
            if let Type::Function(af) = arg {
                for (pp, ap) in pf.params.iter().zip(&af.params) {
                    unify_types(ctx, &pp.ty, &ap.ty, span, solved, errors);
                }
                unify_types(ctx, &pf.ret, &af.ret, span, solved, errors);
            }
        }
        // Best effort on unions: solve against the sole variable member
        // when the argument fits no concrete member.
        Type::Union(members) => {
            if members.iter().any(|m| assign_type(arg, m)) {
                return;
            }
            let mut vars = members.iter().filter(|m| matches!(m, Type::TypeVar(_)));
            if let (Some(var_member), None) = (vars.next(), vars.next()) {
                unify_types(ctx, var_member, arg, span, solved, errors);
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flags::ClassFlags;
    use crate::ty::{ClassDetails, FnParam, TypeVarDetails};
    use loom_ir::Variance;
    use pretty_assertions::assert_eq;

    use crate::builtins::BuiltinTypes;

    fn ctx<'a>(interner: &'a StringInterner, config: &'a CheckConfig) -> CallContext<'a> {
        CallContext { interner, config }
    }

    fn arg(ty: Type) -> CallArgValue {
        CallArgValue {
            name: None,
            ty,
            span: Span::DUMMY,
        }
    }

    fn kwarg(name: Name, ty: Type) -> CallArgValue {
        CallArgValue {
            name: Some(name),
            ty,
            span: Span::DUMMY,
        }
    }

    #[test]
    fn missing_argument_is_one_count_error() {
        let i = StringInterner::new();
        let b = BuiltinTypes::new(&i);
        let cfg = CheckConfig::default();
        let ctx = ctx(&i, &cfg);
        let f = FunctionType::new(
            i.intern("f"),
            vec![
                FnParam::positional(i.intern("a"), b.int_instance()),
                FnParam::positional(i.intern("b"), b.int_instance()),
            ],
            b.str_instance(),
        );
        let outcome = match_signature(&ctx, &f, Span::new(1, 5), &[arg(b.int_instance())]);
        assert_eq!(outcome.errors.len(), 1);
        assert!(matches!(
            outcome.errors[0].kind,
            TypeCheckErrorKind::ArgumentCount { .. }
        ));
        assert_eq!(outcome.errors[0].span, Span::new(1, 5));
        // A failed binding yields no trustworthy result type.
        assert_eq!(outcome.ret, Type::Unknown);
    }

    #[test]
    fn argument_type_mismatch_keeps_the_declared_return() {
        let i = StringInterner::new();
        let b = BuiltinTypes::new(&i);
        let cfg = CheckConfig::default();
        let ctx = ctx(&i, &cfg);
        let f = FunctionType::new(
            i.intern("f"),
            vec![FnParam::positional(i.intern("a"), b.int_instance())],
            b.str_instance(),
        );
        let outcome = match_signature(&ctx, &f, Span::DUMMY, &[arg(b.str_instance())]);
        assert_eq!(outcome.errors.len(), 1);
        assert!(matches!(
            outcome.errors[0].kind,
            TypeCheckErrorKind::TypeMismatch { .. }
        ));
        assert_eq!(outcome.ret, b.str_instance());
    }

    #[test]
    fn unknown_keyword_reported() {
        let i = StringInterner::new();
        let b = BuiltinTypes::new(&i);
        let cfg = CheckConfig::default();
        let ctx = ctx(&i, &cfg);
        let f = FunctionType::new(
            i.intern("f"),
            vec![FnParam::positional(i.intern("a"), b.int_instance())],
            b.none_instance(),
        );
        let outcome = match_signature(
            &ctx,
            &f,
            Span::DUMMY,
            &[
                arg(b.int_instance()),
                kwarg(i.intern("bogus"), b.int_instance()),
            ],
        );
        assert_eq!(outcome.errors.len(), 1);
        assert!(matches!(
            outcome.errors[0].kind,
            TypeCheckErrorKind::UnknownKeyword { .. }
        ));
    }

    #[test]
    fn duplicate_binding_reported() {
        let i = StringInterner::new();
        let b = BuiltinTypes::new(&i);
        let cfg = CheckConfig::default();
        let ctx = ctx(&i, &cfg);
        let a_name = i.intern("a");
        let f = FunctionType::new(
            i.intern("f"),
            vec![FnParam::positional(a_name, b.int_instance())],
            b.none_instance(),
        );
        let outcome = match_signature(
            &ctx,
            &f,
            Span::DUMMY,
            &[arg(b.int_instance()), kwarg(a_name, b.int_instance())],
        );
        assert_eq!(outcome.errors.len(), 1);
        assert!(matches!(
            outcome.errors[0].kind,
            TypeCheckErrorKind::DuplicateBinding { .. }
        ));
    }

    #[test]
    fn earlier_overload_wins() {
        let i = StringInterner::new();
        let b = BuiltinTypes::new(&i);
        let cfg = CheckConfig::default();
        let ctx = ctx(&i, &cfg);
        let x = i.intern("x");
        // Both overloads accept an int; declaration order decides.
        let first = Arc::new(FunctionType::new(
            i.intern("f"),
            vec![FnParam::positional(x, b.int_instance())],
            b.str_instance(),
        ));
        let second = Arc::new(FunctionType::new(
            i.intern("f"),
            vec![FnParam::positional(x, b.object_instance())],
            b.float_instance(),
        ));
        let outcome = resolve_overloads(
            &ctx,
            &[first, second],
            Span::DUMMY,
            &[arg(b.int_instance())],
        );
        assert!(outcome.errors.is_empty());
        assert_eq!(outcome.ret, b.str_instance());
    }

    #[test]
    fn no_matching_overload_is_one_error() {
        let i = StringInterner::new();
        let b = BuiltinTypes::new(&i);
        let cfg = CheckConfig::default();
        let ctx = ctx(&i, &cfg);
        let x = i.intern("x");
        let first = Arc::new(FunctionType::new(
            i.intern("f"),
            vec![FnParam::positional(x, b.int_instance())],
            b.str_instance(),
        ));
        let second = Arc::new(FunctionType::new(
            i.intern("f"),
            vec![FnParam::positional(x, b.float_instance())],
            b.str_instance(),
        ));
        let outcome = resolve_overloads(
            &ctx,
            &[first, second],
            Span::new(7, 9),
            &[arg(b.str_instance())],
        );
        assert_eq!(outcome.errors.len(), 1);
        assert!(matches!(
            outcome.errors[0].kind,
            TypeCheckErrorKind::NoMatchingOverload { .. }
        ));
        assert_eq!(outcome.errors[0].span, Span::new(7, 9));
    }

    #[test]
    fn type_var_solves_from_first_occurrence() {
        let i = StringInterner::new();
        let b = BuiltinTypes::new(&i);
        let cfg = CheckConfig::default();
        let ctx = ctx(&i, &cfg);
        let t = TypeVarDetails::new(i.intern("T"), Variance::Invariant, None);
        let f = FunctionType::new(
            i.intern("identity"),
            vec![FnParam::positional(i.intern("x"), Type::TypeVar(t.clone()))],
            Type::TypeVar(t),
        );
        let outcome = match_signature(&ctx, &f, Span::DUMMY, &[arg(b.int_instance())]);
        assert!(outcome.errors.is_empty());
        assert_eq!(outcome.ret, b.int_instance());
    }

    #[test]
    fn conflicting_solutions_widen_to_union_by_default() {
        let i = StringInterner::new();
        let b = BuiltinTypes::new(&i);
        let cfg = CheckConfig::default();
        let ctx = ctx(&i, &cfg);
        let t = TypeVarDetails::new(i.intern("T"), Variance::Invariant, None);
        let f = FunctionType::new(
            i.intern("pair"),
            vec![
                FnParam::positional(i.intern("a"), Type::TypeVar(t.clone())),
                FnParam::positional(i.intern("b"), Type::TypeVar(t.clone())),
            ],
            Type::TypeVar(t),
        );
        let outcome = match_signature(
            &ctx,
            &f,
            Span::DUMMY,
            &[arg(b.int_instance()), arg(b.str_instance())],
        );
        assert!(outcome.errors.is_empty());
        assert_eq!(
            outcome.ret,
            Type::union_of([b.int_instance(), b.str_instance()])
        );
    }

    #[test]
    fn conflicting_solutions_error_under_strict_solving() {
        let i = StringInterner::new();
        let b = BuiltinTypes::new(&i);
        let cfg = CheckConfig {
            strict_type_var_solving: true,
        };
        let ctx = ctx(&i, &cfg);
        let t = TypeVarDetails::new(i.intern("T"), Variance::Invariant, None);
        let f = FunctionType::new(
            i.intern("pair"),
            vec![
                FnParam::positional(i.intern("a"), Type::TypeVar(t.clone())),
                FnParam::positional(i.intern("b"), Type::TypeVar(t.clone())),
            ],
            Type::TypeVar(t),
        );
        let outcome = match_signature(
            &ctx,
            &f,
            Span::DUMMY,
            &[arg(b.int_instance()), arg(b.str_instance())],
        );
        assert!(!outcome.errors.is_empty());
    }

    #[test]
    fn generic_container_param_solves_element() {
        let i = StringInterner::new();
        let b = BuiltinTypes::new(&i);
        let cfg = CheckConfig::default();
        let ctx = ctx(&i, &cfg);
        let t = TypeVarDetails::new(i.intern("T"), Variance::Invariant, None);
        let f = FunctionType::new(
            i.intern("first"),
            vec![FnParam::positional(
                i.intern("items"),
                Type::Class(
                    b.list
                        .with_args(vec![Type::TypeVar(t.clone())])
                        .to_instance(),
                ),
            )],
            Type::TypeVar(t),
        );
        let outcome = match_signature(
            &ctx,
            &f,
            Span::DUMMY,
            &[arg(b.list_of(b.str_instance()))],
        );
        assert!(outcome.errors.is_empty());
        assert_eq!(outcome.ret, b.str_instance());
    }

    #[test]
    fn class_object_call_specializes_instance() {
        let i = StringInterner::new();
        let b = BuiltinTypes::new(&i);
        let cfg = CheckConfig::default();
        let ctx = ctx(&i, &cfg);
        let t = TypeVarDetails::new(i.intern("T"), Variance::Invariant, None);
        let details = ClassDetails::new(i.intern("Box"), ClassFlags::empty(), vec![t.clone()]);
        details.set_bases(Vec::new());
        let init = FunctionType::new(
            i.intern("__init__"),
            vec![
                FnParam::positional(i.intern("self"), Type::Any),
                FnParam::positional(i.intern("item"), Type::TypeVar(t)),
            ],
            b.none_instance(),
        );
        details.set_members(vec![crate::ty::Member {
            name: i.intern("__init__"),
            ty: Type::Function(Arc::new(init)),
            kind: crate::ty::MemberKind::Method,
        }]);
        let class = ClassType::reference(details);
        let outcome = resolve_call(
            &ctx,
            &Type::Class(class),
            Span::DUMMY,
            &[arg(b.int_instance())],
        );
        assert!(outcome.errors.is_empty());
        let Type::Class(inst) = &outcome.ret else {
            panic!("expected instance, got {:?}", outcome.ret);
        };
        assert!(inst.instance);
        assert_eq!(inst.arg(0), b.int_instance());
    }
}
