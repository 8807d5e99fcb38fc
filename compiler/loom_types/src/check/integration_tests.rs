//! End-to-end checks over builder-assembled modules.
//!
//! Each test constructs a small program with `ModuleBuilder`, runs the
//! checker, and asserts on the inferred types and the diagnostic stream.

use std::sync::Arc;

use loom_diagnostic::ErrorCode;
use loom_ir::{
    ArchetypeKind, AstArena, BinaryOp, BoolOp, ComprehensionKind, Decorator, ExprId, ExprKind,
    ModuleBuilder, StringInterner, Variance,
};
use pretty_assertions::assert_eq;

use crate::builtins::BuiltinTypes;
use crate::check::{check_module, CheckConfig};
use crate::output::TypeCheckResult;

fn check<T>(
    build: impl FnOnce(&mut ModuleBuilder) -> T,
) -> (TypeCheckResult, AstArena, Arc<StringInterner>, T) {
    check_with(CheckConfig::default(), build)
}

fn check_with<T>(
    config: CheckConfig,
    build: impl FnOnce(&mut ModuleBuilder) -> T,
) -> (TypeCheckResult, AstArena, Arc<StringInterner>, T) {
    let interner = Arc::new(StringInterner::new());
    let mut b = ModuleBuilder::new(Arc::clone(&interner), "main");
    let out = build(&mut b);
    let (module, arena) = b.finish();
    let builtins = BuiltinTypes::new(&interner);
    let result = check_module(&module, &arena, &interner, &builtins, config);
    (result, arena, interner, out)
}

fn render(result: &TypeCheckResult, interner: &StringInterner, expr: ExprId) -> String {
    result.module.type_of(expr).display(interner).to_string()
}

fn codes(result: &TypeCheckResult) -> Vec<ErrorCode> {
    result.diagnostics.iter().map(|d| d.code).collect()
}

#[test]
fn inherited_field_feeds_synthesized_constructor() {
    let (result, _, interner, (dog_expr, speak_call)) = check(|b| {
        b.class_def("Animal", ArchetypeKind::Class, vec![], |b, parts| {
            let str_ann = b.ident("str");
            let field = b.field("name", Some(str_ann), None);
            parts.fields.push(field);

            let str_ann = b.ident("str");
            let self_p = b.param("self", None);
            let speak = b.function("speak", vec![self_p], Some(str_ann), vec![], |b| {
                let me = b.self_ref();
                let name = b.member(me, "name");
                let ret = b.return_stmt(Some(name));
                vec![ret]
            });
            parts.methods.push(speak);
        });

        let animal = b.ident("Animal");
        b.class_def("Dog", ArchetypeKind::Class, vec![animal], |b, parts| {
            let int_ann = b.ident("int");
            let zero = b.int(0);
            let field = b.field("tricks", Some(int_ann), Some(zero));
            parts.fields.push(field);
        });

        // d = Dog("Rex"): the inherited `name` field is the first
        // constructor parameter, `tricks` defaults.
        let ctor = b.ident("Dog");
        let rex = b.str_lit("Rex");
        let new_dog = b.call(ctor, vec![rex]);
        let stmt = b.var("d", None, Some(new_dog));
        b.push(stmt);

        let d = b.ident("d");
        let speak = b.member(d, "speak");
        let call = b.call(speak, vec![]);
        let stmt = b.var("s", None, Some(call));
        b.push(stmt);
        (d, call)
    });

    assert_eq!(result.diagnostics, vec![]);
    assert_eq!(render(&result, &interner, dog_expr), "Dog");
    assert_eq!(render(&result, &interner, speak_call), "str");
}

#[test]
fn annotated_assignment_mismatch_points_at_the_value() {
    let (result, arena, _, value) = check(|b| {
        let int_ann = b.ident("int");
        let value = b.float(3.14);
        let stmt = b.var("x", Some(int_ann), Some(value));
        b.push(stmt);
        value
    });

    assert_eq!(codes(&result), vec![ErrorCode::E2001]);
    assert_eq!(result.diagnostics[0].span, arena.expr(value).span);
}

#[test]
fn callable_instance_checks_call_arguments() {
    let (result, _, interner, call) = check(|b| {
        b.class_def("Greeter", ArchetypeKind::Class, vec![], |b, parts| {
            let int_ann = b.ident("int");
            let str_ann = b.ident("str");
            let self_p = b.param("self", None);
            let x = b.param("x", Some(int_ann));
            let call = b.function("__call__", vec![self_p, x], Some(str_ann), vec![], |b| {
                let s = b.str_lit("hi");
                let ret = b.return_stmt(Some(s));
                vec![ret]
            });
            parts.methods.push(call);
        });

        let ctor = b.ident("Greeter");
        let new = b.call(ctor, vec![]);
        let stmt = b.var("g", None, Some(new));
        b.push(stmt);

        let g = b.ident("g");
        let bad = b.str_lit("oops");
        let call = b.call(g, vec![bad]);
        let stmt = b.expr_stmt(call);
        b.push(stmt);
        call
    });

    assert_eq!(codes(&result), vec![ErrorCode::E2001]);
    // The mismatch does not destroy the call's result type.
    assert_eq!(render(&result, &interner, call), "str");
}

#[test]
fn dict_iteration_yields_the_key_type() {
    let (result, _, interner, key_use) = check(|b| {
        let dict = b.ident("dict");
        let str_ann = b.ident("str");
        let int_ann = b.ident("int");
        let args = b.tuple(vec![str_ann, int_ann]);
        let ann = b.index(dict, args);
        let stmt = b.var("d", Some(ann), None);
        b.push(stmt);

        let d = b.ident("d");
        let key_use = b.ident("k");
        let int_ann = b.ident("int");
        let body = b.var("x", Some(int_ann), Some(key_use));
        let stmt = b.for_stmt("k", d, vec![body]);
        b.push(stmt);
        key_use
    });

    assert_eq!(render(&result, &interner, key_use), "str");
    assert_eq!(codes(&result), vec![ErrorCode::E2001]);
}

#[test]
fn missing_argument_reports_once_and_degrades_the_result() {
    let (result, _, interner, call) = check(|b| {
        let int_ann = b.ident("int");
        let x = b.param("x", Some(int_ann));
        let int_ann = b.ident("int");
        b.def("f", vec![x], Some(int_ann), |b| {
            let x = b.ident("x");
            let ret = b.return_stmt(Some(x));
            vec![ret]
        });

        let f = b.ident("f");
        let call = b.call(f, vec![]);
        let stmt = b.expr_stmt(call);
        b.push(stmt);
        call
    });

    assert_eq!(codes(&result), vec![ErrorCode::E2002]);
    // Checking continues, but the failed binding gives no result type.
    assert_eq!(render(&result, &interner, call), "Unknown");
}

#[test]
fn self_referential_initializer_resolves_silently() {
    let (result, _, interner, x_use) = check(|b| {
        let x_use = b.ident("x");
        let stmt = b.var("x", None, Some(x_use));
        b.push(stmt);
        x_use
    });

    assert_eq!(result.diagnostics, vec![]);
    assert_eq!(render(&result, &interner, x_use), "Unknown");
}

#[test]
fn diamond_inheritance_finds_the_shared_method_once() {
    let (result, _, interner, call) = check(|b| {
        b.class_def("Top", ArchetypeKind::Class, vec![], |b, parts| {
            let int_ann = b.ident("int");
            let self_p = b.param("self", None);
            let m = b.function("measure", vec![self_p], Some(int_ann), vec![], |b| {
                let v = b.int(1);
                let ret = b.return_stmt(Some(v));
                vec![ret]
            });
            parts.methods.push(m);
        });
        let top = b.ident("Top");
        b.class_def("Left", ArchetypeKind::Class, vec![top], |_, _| {});
        let top = b.ident("Top");
        b.class_def("Right", ArchetypeKind::Class, vec![top], |_, _| {});
        let left = b.ident("Left");
        let right = b.ident("Right");
        b.class_def("Bottom", ArchetypeKind::Class, vec![left, right], |_, _| {});

        let ctor = b.ident("Bottom");
        let new = b.call(ctor, vec![]);
        let stmt = b.var("bottom", None, Some(new));
        b.push(stmt);

        let v = b.ident("bottom");
        let m = b.member(v, "measure");
        let call = b.call(m, vec![]);
        let stmt = b.expr_stmt(call);
        b.push(stmt);
        call
    });

    assert_eq!(result.diagnostics, vec![]);
    assert_eq!(render(&result, &interner, call), "int");
}

#[test]
fn overload_resolution_takes_the_first_match() {
    let (result, _, interner, (int_call, str_call)) = check(|b| {
        b.class_def("Codec", ArchetypeKind::Class, vec![], |b, parts| {
            let int_ann = b.ident("int");
            let self_p = b.param("self", None);
            let x = b.param("x", Some(int_ann));
            let int_ann = b.ident("int");
            let first = b.function(
                "pick",
                vec![self_p, x],
                Some(int_ann),
                vec![Decorator::Overload],
                |b| {
                    let x = b.ident("x");
                    let ret = b.return_stmt(Some(x));
                    vec![ret]
                },
            );
            parts.methods.push(first);

            let str_ann = b.ident("str");
            let self_p = b.param("self", None);
            let x = b.param("x", Some(str_ann));
            let str_ann = b.ident("str");
            let second = b.function(
                "pick",
                vec![self_p, x],
                Some(str_ann),
                vec![Decorator::Overload],
                |b| {
                    let x = b.ident("x");
                    let ret = b.return_stmt(Some(x));
                    vec![ret]
                },
            );
            parts.methods.push(second);
        });

        let ctor = b.ident("Codec");
        let new = b.call(ctor, vec![]);
        let stmt = b.var("c", None, Some(new));
        b.push(stmt);

        let c = b.ident("c");
        let pick = b.member(c, "pick");
        let one = b.int(1);
        let int_call = b.call(pick, vec![one]);
        let stmt = b.expr_stmt(int_call);
        b.push(stmt);

        let c = b.ident("c");
        let pick = b.member(c, "pick");
        let s = b.str_lit("s");
        let str_call = b.call(pick, vec![s]);
        let stmt = b.expr_stmt(str_call);
        b.push(stmt);
        (int_call, str_call)
    });

    assert_eq!(result.diagnostics, vec![]);
    assert_eq!(render(&result, &interner, int_call), "int");
    assert_eq!(render(&result, &interner, str_call), "str");
}

#[test]
fn constructor_call_specializes_the_generic_class() {
    let (result, _, interner, (box_use, item_use)) = check(|b| {
        b.class_def("Box", ArchetypeKind::Class, vec![], |b, parts| {
            let t = b.type_param("T", Variance::Invariant, None);
            parts.type_params.push(t);
            let t_ann = b.ident("T");
            let field = b.field("item", Some(t_ann), None);
            parts.fields.push(field);
        });

        let ctor = b.ident("Box");
        let three = b.int(3);
        let new = b.call(ctor, vec![three]);
        let stmt = b.var("bx", None, Some(new));
        b.push(stmt);

        let box_use = b.ident("bx");
        let stmt = b.expr_stmt(box_use);
        b.push(stmt);

        let bx = b.ident("bx");
        let item_use = b.member(bx, "item");
        let stmt = b.expr_stmt(item_use);
        b.push(stmt);
        (box_use, item_use)
    });

    assert_eq!(result.diagnostics, vec![]);
    // Literal arguments widen before they solve the type parameter.
    assert_eq!(render(&result, &interner, box_use), "Box[int]");
    assert_eq!(render(&result, &interner, item_use), "int");
}

#[test]
fn edge_endpoints_must_be_node_archetypes() {
    let (result, _, _, ()) = check(|b| {
        b.class_def("Place", ArchetypeKind::Node, vec![], |_, _| {});

        let from = b.ident("Place");
        let to = b.ident("Place");
        b.class_def("Road", ArchetypeKind::Edge, vec![], |_, parts| {
            parts.endpoints = Some((from, to));
        });

        let from = b.ident("Place");
        let to = b.ident("str");
        b.class_def("Detour", ArchetypeKind::Edge, vec![], |_, parts| {
            parts.endpoints = Some((from, to));
        });
    });

    assert_eq!(codes(&result), vec![ErrorCode::E2014]);
}

#[test]
fn union_annotation_accepts_both_sides_but_narrows_nothing() {
    let (result, _, interner, u_use) = check(|b| {
        let int_ann = b.ident("int");
        let str_ann = b.ident("str");
        let ann = b.binary(BinaryOp::BitOr, int_ann, str_ann);
        let one = b.int(1);
        let stmt = b.var("u", Some(ann), Some(one));
        b.push(stmt);

        let u_use = b.ident("u");
        let int_ann = b.ident("int");
        let stmt = b.var("v", Some(int_ann), Some(u_use));
        b.push(stmt);
        u_use
    });

    assert_eq!(render(&result, &interner, u_use), "int | str");
    assert_eq!(codes(&result), vec![ErrorCode::E2001]);
}

#[test]
fn iterating_a_non_iterable_reports_once() {
    let (result, _, _, ()) = check(|b| {
        let one = b.int(1);
        let stmt = b.var("n", None, Some(one));
        b.push(stmt);

        let n = b.ident("n");
        let e = b.ident("e");
        let body = b.expr_stmt(e);
        let stmt = b.for_stmt("e", n, vec![body]);
        b.push(stmt);
    });

    assert_eq!(codes(&result), vec![ErrorCode::E2011]);
}

#[test]
fn property_access_yields_the_getter_return() {
    let (result, _, interner, prop_use) = check(|b| {
        b.class_def("Circle", ArchetypeKind::Class, vec![], |b, parts| {
            let float_ann = b.ident("float");
            let one = b.float(1.0);
            let field = b.field("radius", Some(float_ann), Some(one));
            parts.fields.push(field);

            let float_ann = b.ident("float");
            let self_p = b.param("self", None);
            let area = b.function(
                "area",
                vec![self_p],
                Some(float_ann),
                vec![Decorator::Property],
                |b| {
                    let me = b.self_ref();
                    let r = b.member(me, "radius");
                    let me = b.self_ref();
                    let r2 = b.member(me, "radius");
                    let product = b.binary(BinaryOp::Mul, r, r2);
                    let ret = b.return_stmt(Some(product));
                    vec![ret]
                },
            );
            parts.methods.push(area);
        });

        let ctor = b.ident("Circle");
        let new = b.call(ctor, vec![]);
        let stmt = b.var("c", None, Some(new));
        b.push(stmt);

        let c = b.ident("c");
        let prop_use = b.member(c, "area");
        let stmt = b.expr_stmt(prop_use);
        b.push(stmt);
        prop_use
    });

    assert_eq!(result.diagnostics, vec![]);
    assert_eq!(render(&result, &interner, prop_use), "float");
}

#[test]
fn ternary_of_literals_types_as_their_union() {
    let (result, _, interner, x_use) = check(|b| {
        let flag = b.bool_lit(true);
        let one = b.int(1);
        let two = b.int(2);
        let pick = b.ternary(flag, one, two);
        let stmt = b.var("x", None, Some(pick));
        b.push(stmt);

        let x_use = b.ident("x");
        let stmt = b.expr_stmt(x_use);
        b.push(stmt);

        // Reassigning one of the member literals stays within the union.
        let x = b.ident("x");
        let one = b.int(1);
        let stmt = b.assign(x, one);
        b.push(stmt);
        x_use
    });

    assert_eq!(result.diagnostics, vec![]);
    assert_eq!(render(&result, &interner, x_use), "Literal[1] | Literal[2]");
}

#[test]
fn boolean_operators_cover_both_operands() {
    let (result, _, interner, (or_expr, and_expr)) = check(|b| {
        let one = b.int(1);
        let stmt = b.var("a", None, Some(one));
        b.push(stmt);
        let hello = b.str_lit("hi");
        let stmt = b.var("s", None, Some(hello));
        b.push(stmt);

        let a = b.ident("a");
        let s = b.ident("s");
        let or_expr = b.bool_op(BoolOp::Or, a, s);
        let stmt = b.expr_stmt(or_expr);
        b.push(stmt);

        let a = b.ident("a");
        let s = b.ident("s");
        let and_expr = b.bool_op(BoolOp::And, a, s);
        let stmt = b.expr_stmt(and_expr);
        b.push(stmt);
        (or_expr, and_expr)
    });

    assert_eq!(result.diagnostics, vec![]);
    assert_eq!(render(&result, &interner, or_expr), "int | str");
    assert_eq!(render(&result, &interner, and_expr), "int | str");
}

#[test]
fn comprehension_binds_the_loop_variable_in_its_own_scope() {
    let (result, _, interner, (comp, x_use)) = check(|b| {
        let list = b.ident("list");
        let int_ann = b.ident("int");
        let ann = b.index(list, int_ann);
        let stmt = b.var("nums", Some(ann), None);
        b.push(stmt);

        let nums = b.ident("nums");
        let mut x_use = None;
        let comp = b.comprehension(ComprehensionKind::List, "x", nums, |b| {
            let x = b.ident("x");
            let x2 = b.ident("x");
            x_use = Some(x);
            (None, b.binary(BinaryOp::Mul, x, x2))
        });
        let stmt = b.expr_stmt(comp);
        b.push(stmt);
        (comp, x_use)
    });

    assert_eq!(result.diagnostics, vec![]);
    assert_eq!(render(&result, &interner, comp), "list[int]");
    if let Some(x_use) = x_use {
        assert_eq!(render(&result, &interner, x_use), "int");
    }
}

#[test]
fn lambda_infers_a_function_type_from_its_annotations() {
    let (result, _, interner, lambda) = check(|b| {
        let int_ann = b.ident("int");
        let n = b.param("n", Some(int_ann));
        let lambda = b.lambda(vec![n], |b| {
            let n = b.ident("n");
            let one = b.int(1);
            b.binary(BinaryOp::Add, n, one)
        });
        let stmt = b.expr_stmt(lambda);
        b.push(stmt);
        lambda
    });

    assert_eq!(result.diagnostics, vec![]);
    assert_eq!(render(&result, &interner, lambda), "(n: int) -> int");
}

#[test]
fn with_binds_the_acquired_resource_type() {
    let (result, _, interner, h_use) = check(|b| {
        b.class_def("File", ArchetypeKind::Class, vec![], |b, parts| {
            let str_ann = b.ident("str");
            let self_p = b.param("self", None);
            let enter = b.function("__enter__", vec![self_p], Some(str_ann), vec![], |b| {
                let text = b.str_lit("contents");
                let ret = b.return_stmt(Some(text));
                vec![ret]
            });
            parts.methods.push(enter);

            let none_ann = b.none();
            let self_p = b.param("self", None);
            let exit = b.function("__exit__", vec![self_p], Some(none_ann), vec![], |_| vec![]);
            parts.methods.push(exit);
        });

        let ctor = b.ident("File");
        let new = b.call(ctor, vec![]);
        let h_use = b.ident("h");
        let body = b.expr_stmt(h_use);
        let stmt = b.with_stmt(new, Some("h"), vec![body]);
        b.push(stmt);
        h_use
    });

    assert_eq!(result.diagnostics, vec![]);
    assert_eq!(render(&result, &interner, h_use), "str");
}

#[test]
fn slicing_preserves_the_container_type() {
    let (result, _, interner, slice) = check(|b| {
        let list = b.ident("list");
        let int_ann = b.ident("int");
        let ann = b.index(list, int_ann);
        let stmt = b.var("xs", Some(ann), None);
        b.push(stmt);

        let xs = b.ident("xs");
        let lower = b.int(1);
        let upper = b.int(3);
        let slice = b.expr(ExprKind::Slice {
            object: xs,
            lower: Some(lower),
            upper: Some(upper),
            step: None,
        });
        let stmt = b.expr_stmt(slice);
        b.push(stmt);
        slice
    });

    assert_eq!(result.diagnostics, vec![]);
    assert_eq!(render(&result, &interner, slice), "list[int]");
}

#[test]
fn strict_solving_rejects_conflicting_type_var_arguments() {
    let config = CheckConfig {
        strict_type_var_solving: true,
    };
    let (result, _, _, ()) = check_with(config, |b| {
        b.class_def("Pair", ArchetypeKind::Class, vec![], |b, parts| {
            let t = b.type_param("T", Variance::Invariant, None);
            parts.type_params.push(t);
            let t_ann = b.ident("T");
            let field = b.field("first", Some(t_ann), None);
            parts.fields.push(field);
            let t_ann = b.ident("T");
            let field = b.field("second", Some(t_ann), None);
            parts.fields.push(field);
        });

        let ctor = b.ident("Pair");
        let one = b.int(1);
        let s = b.str_lit("x");
        let new = b.call(ctor, vec![one, s]);
        let stmt = b.var("p", None, Some(new));
        b.push(stmt);
    });

    // One conflict from solving, one from re-validating the argument
    // against the kept solution.
    assert_eq!(codes(&result), vec![ErrorCode::E2001, ErrorCode::E2001]);
}
