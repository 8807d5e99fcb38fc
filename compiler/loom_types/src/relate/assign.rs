//! Variance-aware assignability.
//!
//! `assign_type(src, dst)` answers "may a value of `src` flow into a slot
//! declared `dst`". Gradual types short-circuit to true on either side so
//! one unresolved type never cascades into downstream diagnostics.

use loom_ir::{Name, Variance};

use crate::flags::ClassFlags;
use crate::relate::members::lookup_member;
use crate::relate::mro;
use crate::ty::{ClassType, FnParam, FunctionType, Type};

pub fn assign_type(src: &Type, dst: &Type) -> bool {
    if src == dst {
        return true;
    }
    match (src, dst) {
        (Type::Unknown | Type::Unbound, _) | (_, Type::Unknown | Type::Unbound) => true,
        (Type::Any, _) | (_, Type::Any) => true,
        (Type::Never, _) => true,
        // A literal flows into its own base class; into a different
        // literal, never. Identical literals hit the equality fast path.
        (Type::Literal(lit), Type::Literal(_)) => {
            matches!(dst, Type::Literal(other) if other == lit)
        }
        // Every branch of a source union must fit; a destination union
        // accepts anything fitting at least one member. The union arms
        // run before literal widening so a literal source still matches
        // an identical literal member of the destination.
        (Type::Union(branches), _) => branches.iter().all(|m| assign_type(m, dst)),
        (_, Type::Union(branches)) => branches.iter().any(|m| assign_type(src, m)),
        (Type::Literal(lit), _) => assign_type(&lit.widen(), dst),
        (_, Type::Literal(_)) => false,
        // An unsolved variable stands for anything satisfying its bound.
        (Type::TypeVar(var), _) => var
            .bound
            .as_ref()
            .is_some_and(|bound| assign_type(bound, dst)),
        (Type::Class(s), Type::Class(d)) => class_assign(s, d),
        (Type::Function(s), Type::Function(d)) => function_assign(s, d),
        (Type::Overloaded(sigs), Type::Function(d)) => {
            sigs.iter().any(|s| function_assign(s, d))
        }
        (Type::Function(s), Type::Overloaded(sigs)) => {
            sigs.iter().all(|d| function_assign(s, d))
        }
        (Type::Module(a), Type::Module(b)) => a.name == b.name,
        _ => false,
    }
}

fn class_assign(src: &ClassType, dst: &ClassType) -> bool {
    if src.instance != dst.instance {
        return false;
    }
    if dst.instance && dst.has_flag(ClassFlags::PROTOCOL) && !src.same_class(dst) {
        return protocol_matches(&Type::Class(src.clone()), dst);
    }
    let Some(view) = mro::ancestor_as(src, &dst.details) else {
        return false;
    };
    // Fixed-arity tuples are covariant element-wise.
    if dst.has_flag(ClassFlags::TUPLE) {
        return match (view.args.as_deref(), dst.args.as_deref()) {
            (_, None) | (None, _) => true,
            (Some(s), Some(d)) => {
                s.len() == d.len() && s.iter().zip(d).all(|(a, b)| assign_type(a, b))
            }
        };
    }
    let (Some(src_args), Some(dst_args)) = (view.args.as_deref(), dst.args.as_deref()) else {
        // Unspecialized on either side: gradual match.
        return true;
    };
    dst.details
        .type_params
        .iter()
        .zip(src_args.iter().zip(dst_args))
        .all(|(param, (s, d))| match param.variance {
            Variance::Invariant => s == d || s.is_unknown() || d.is_unknown() || s.is_any() || d.is_any(),
            Variance::Covariant => assign_type(s, d),
            Variance::Contravariant => assign_type(d, s),
        })
}

/// Contravariant on parameters, covariant on return.
fn function_assign(src: &FunctionType, dst: &FunctionType) -> bool {
    let src_pos: Vec<&FnParam> = positional(src).collect();
    let dst_pos: Vec<&FnParam> = positional(dst).collect();
    if src.required_positional() > dst_pos.len() {
        return false;
    }
    if let Some(max) = src.max_positional() {
        if max < dst_pos.len() {
            return false;
        }
    }
    src_pos
        .iter()
        .zip(&dst_pos)
        .all(|(s, d)| assign_type(&d.ty, &s.ty))
        && assign_type(&src.ret, &dst.ret)
}

fn positional(f: &FunctionType) -> impl Iterator<Item = &FnParam> {
    f.params
        .iter()
        .filter(|p| p.kind == loom_ir::ParamKind::Positional)
}

/// Structural check: `src` satisfies `protocol` when every member the
/// protocol requires exists on `src` with an assignable type.
pub fn protocol_matches(src: &Type, protocol: &ClassType) -> bool {
    let required_instance = Type::Class(protocol.to_instance());
    let mut seen: Vec<Name> = Vec::new();
    for entry in protocol.details.mro().iter() {
        for member in entry.details.members() {
            if seen.contains(&member.name) {
                continue;
            }
            seen.push(member.name);
            let Some(required) = lookup_member(&required_instance, member.name) else {
                continue;
            };
            match lookup_member(src, member.name) {
                Some(found) => {
                    if !assign_type(&found, &required) {
                        return false;
                    }
                }
                None => return false,
            }
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flags::ClassFlags;
    use crate::literal::{LiteralType, LiteralValue};
    use crate::ty::{ClassDetails, Member, MemberKind, TypeVarDetails};
    use loom_ir::StringInterner;
    use std::sync::Arc;

    fn class(i: &StringInterner, name: &str, bases: Vec<ClassType>) -> ClassType {
        let d = ClassDetails::new(i.intern(name), ClassFlags::empty(), Vec::new());
        d.set_bases(bases);
        d.set_members(Vec::new());
        ClassType::reference(d)
    }

    fn generic_class(
        i: &StringInterner,
        name: &str,
        variance: Variance,
        flags: ClassFlags,
    ) -> (ClassType, Arc<TypeVarDetails>) {
        let t = TypeVarDetails::new(i.intern("T"), variance, None);
        let d = ClassDetails::new(i.intern(name), flags, vec![t.clone()]);
        d.set_bases(Vec::new());
        d.set_members(Vec::new());
        (ClassType::reference(d), t)
    }

    #[test]
    fn any_and_unknown_accept_both_ways() {
        let i = StringInterner::new();
        let a = Type::Class(class(&i, "A", vec![]).to_instance());
        assert!(assign_type(&a, &Type::Any));
        assert!(assign_type(&Type::Any, &a));
        assert!(assign_type(&a, &Type::Unknown));
        assert!(assign_type(&Type::Unknown, &a));
    }

    #[test]
    fn subclass_flows_into_base() {
        let i = StringInterner::new();
        let animal = class(&i, "Animal", vec![]);
        let dog = class(&i, "Dog", vec![animal.clone()]);
        assert!(assign_type(
            &Type::Class(dog.to_instance()),
            &Type::Class(animal.to_instance())
        ));
        assert!(!assign_type(
            &Type::Class(animal.to_instance()),
            &Type::Class(dog.to_instance())
        ));
    }

    #[test]
    fn literal_flows_into_base_not_back() {
        let i = StringInterner::new();
        let s = class(&i, "str", vec![]).to_instance();
        let lit = Type::Literal(LiteralType::new(
            LiteralValue::Str(i.intern("x")),
            s.clone(),
        ));
        assert!(assign_type(&lit, &Type::Class(s.clone())));
        assert!(!assign_type(&Type::Class(s.clone()), &lit));
        let other = Type::Literal(LiteralType::new(LiteralValue::Str(i.intern("y")), s));
        assert!(!assign_type(&lit, &other));
        assert!(assign_type(&lit, &lit));
    }

    #[test]
    fn literal_matches_its_own_member_of_a_union_destination() {
        let i = StringInterner::new();
        let int = class(&i, "int", vec![]).to_instance();
        let one = Type::Literal(LiteralType::new(LiteralValue::Int(1), int.clone()));
        let two = Type::Literal(LiteralType::new(LiteralValue::Int(2), int));
        let ones = Type::union_of([one.clone(), two.clone()]);
        assert!(assign_type(&one, &ones));
        assert!(assign_type(&two, &ones));
        // A literal of another base fits none of the members.
        let s = class(&i, "str", vec![]).to_instance();
        let sx = Type::Literal(LiteralType::new(LiteralValue::Str(i.intern("x")), s));
        assert!(!assign_type(&sx, &ones));
    }

    #[test]
    fn invariant_container_rejects_subtype_argument() {
        let i = StringInterner::new();
        let animal = class(&i, "Animal", vec![]);
        let dog = class(&i, "Dog", vec![animal.clone()]);
        let (list, _) = generic_class(&i, "list", Variance::Invariant, ClassFlags::BUILTIN);
        let list_dog = list
            .with_args(vec![Type::Class(dog.to_instance())])
            .to_instance();
        let list_animal = list
            .with_args(vec![Type::Class(animal.to_instance())])
            .to_instance();
        assert!(!assign_type(&Type::Class(list_dog), &Type::Class(list_animal)));
    }

    #[test]
    fn tuple_arguments_are_covariant() {
        let i = StringInterner::new();
        let animal = class(&i, "Animal", vec![]);
        let dog = class(&i, "Dog", vec![animal.clone()]);
        let tup = ClassDetails::new(
            i.intern("tuple"),
            ClassFlags::BUILTIN | ClassFlags::TUPLE,
            Vec::new(),
        );
        tup.set_bases(Vec::new());
        tup.set_members(Vec::new());
        let tup = ClassType::reference(tup);
        let tup_dog = tup
            .with_args(vec![Type::Class(dog.to_instance())])
            .to_instance();
        let tup_animal = tup
            .with_args(vec![Type::Class(animal.to_instance())])
            .to_instance();
        assert!(assign_type(&Type::Class(tup_dog), &Type::Class(tup_animal)));
    }

    #[test]
    fn union_source_and_destination_rules() {
        let i = StringInterner::new();
        let a = Type::Class(class(&i, "A", vec![]).to_instance());
        let b = Type::Class(class(&i, "B", vec![]).to_instance());
        let c = Type::Class(class(&i, "C", vec![]).to_instance());
        let ab = Type::union_of([a.clone(), b.clone()]);
        assert!(assign_type(&a, &ab));
        assert!(!assign_type(&c, &ab));
        assert!(assign_type(&ab, &Type::union_of([a.clone(), b.clone(), c.clone()])));
        assert!(!assign_type(&ab, &a));
    }

    #[test]
    fn function_params_contravariant_return_covariant() {
        let i = StringInterner::new();
        let animal = class(&i, "Animal", vec![]);
        let dog = class(&i, "Dog", vec![animal.clone()]);
        let animal_i = Type::Class(animal.to_instance());
        let dog_i = Type::Class(dog.to_instance());
        let x = i.intern("x");
        let takes_animal_returns_dog = FunctionType::new(
            Name::EMPTY,
            vec![FnParam::positional(x, animal_i.clone())],
            dog_i.clone(),
        );
        let takes_dog_returns_animal = FunctionType::new(
            Name::EMPTY,
            vec![FnParam::positional(x, dog_i.clone())],
            animal_i.clone(),
        );
        assert!(assign_type(
            &Type::Function(Arc::new(takes_animal_returns_dog.clone())),
            &Type::Function(Arc::new(takes_dog_returns_animal.clone())),
        ));
        assert!(!assign_type(
            &Type::Function(Arc::new(takes_dog_returns_animal)),
            &Type::Function(Arc::new(takes_animal_returns_dog)),
        ));
    }

    #[test]
    fn protocol_matches_structurally() {
        let i = StringInterner::new();
        let next = i.intern("advance");
        let int_i = Type::Class(class(&i, "int", vec![]).to_instance());
        let proto = ClassDetails::new(i.intern("Steppable"), ClassFlags::PROTOCOL, Vec::new());
        proto.set_bases(Vec::new());
        proto.set_members(vec![Member {
            name: next,
            ty: int_i.clone(),
            kind: MemberKind::InstanceField,
        }]);
        let proto = ClassType::reference(proto);

        let conforming = ClassDetails::new(i.intern("Counter"), ClassFlags::empty(), Vec::new());
        conforming.set_bases(Vec::new());
        conforming.set_members(vec![Member {
            name: next,
            ty: int_i,
            kind: MemberKind::InstanceField,
        }]);
        let conforming = Type::Class(ClassType::reference(conforming).to_instance());
        let lacking = Type::Class(class(&i, "Empty", vec![]).to_instance());

        assert!(assign_type(&conforming, &Type::Class(proto.to_instance())));
        assert!(!assign_type(&lacking, &Type::Class(proto.to_instance())));
    }
}
