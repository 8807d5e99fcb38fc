//! Member lookup along the MRO, with access transforms.
//!
//! Lookup walks the receiver's linearization front to back and stops at the
//! first class that declares the member. The declared type is projected
//! through the receiver's type arguments, then transformed according to the
//! member kind and whether the receiver is an instance or the class object.

use std::sync::Arc;

use loom_ir::Name;

use crate::ty::{substitute, ClassType, MemberKind, Type, TypeVarMap};

/// Resolve `name` on `receiver`. `None` means the member does not exist
/// (distinct from `Some(Unknown)`, which means it exists but its type is
/// not known).
pub fn lookup_member(receiver: &Type, name: Name) -> Option<Type> {
    match receiver {
        Type::Class(class) => lookup_on_class(class, name),
        Type::Literal(lit) => lookup_on_class(&lit.base, name),
        Type::Module(module) => module.get(name).cloned(),
        // Gradual types absorb member access.
        Type::Any => Some(Type::Any),
        Type::Unknown | Type::Unbound => Some(Type::Unknown),
        // Access on a union requires the member on every branch.
        Type::Union(members) => {
            let mut results = Vec::with_capacity(members.len());
            for member in members.iter() {
                results.push(lookup_member(member, name)?);
            }
            Some(Type::union_of(results))
        }
        _ => None,
    }
}

fn lookup_on_class(receiver: &ClassType, name: Name) -> Option<Type> {
    let receiver_map = TypeVarMap::for_class(receiver);
    let mro = receiver.details.mro();
    for entry in mro.iter() {
        let Some(member) = entry.details.own_member(name) else {
            continue;
        };
        // Instance fields are invisible through the class object; a
        // shadowed ancestor method of the same name can still apply.
        if !receiver.instance && member.kind == MemberKind::InstanceField {
            continue;
        }
        // Project the declaring class's view through the receiver's
        // concrete arguments, then substitute into the member type.
        let mut map = TypeVarMap::for_class(&project_entry(entry, &receiver_map));
        for (var, ty) in receiver_map.iter() {
            map.bind(var.clone(), ty.clone());
        }
        let declared = substitute(&member.ty, &map);
        return Some(apply_access_transform(&declared, member.kind, receiver));
    }
    None
}

fn project_entry(entry: &ClassType, map: &TypeVarMap) -> ClassType {
    let Some(args) = entry.args.as_deref() else {
        return entry.clone();
    };
    let projected: Vec<Type> = args.iter().map(|a| substitute(a, map)).collect();
    ClassType {
        details: entry.details.clone(),
        args: Some(projected.into()),
        instance: entry.instance,
    }
}

fn apply_access_transform(declared: &Type, kind: MemberKind, receiver: &ClassType) -> Type {
    match kind {
        MemberKind::InstanceField | MemberKind::StaticMethod => declared.clone(),
        MemberKind::Method => {
            if receiver.instance {
                bind_callable(declared, Type::Class(receiver.clone()))
            } else {
                declared.clone()
            }
        }
        MemberKind::Property => {
            if receiver.instance {
                getter_return(declared)
            } else {
                declared.clone()
            }
        }
        // Class methods bind the class object on both access forms.
        MemberKind::ClassMethod => {
            bind_callable(declared, Type::Class(receiver.to_class_object()))
        }
    }
}

fn bind_callable(ty: &Type, receiver: Type) -> Type {
    match ty {
        Type::Function(f) => Type::Function(Arc::new(f.bind_to(receiver))),
        Type::Overloaded(sigs) => Type::Overloaded(
            sigs.iter()
                .map(|f| Arc::new(f.bind_to(receiver.clone())))
                .collect::<Vec<_>>()
                .into(),
        ),
        other => other.clone(),
    }
}

fn getter_return(ty: &Type) -> Type {
    match ty {
        Type::Function(f) => f.ret.clone(),
        Type::Overloaded(sigs) => sigs.first().map_or(Type::Unknown, |f| f.ret.clone()),
        other => other.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flags::{ClassFlags, FunctionFlags};
    use crate::ty::{ClassDetails, FnParam, FunctionType, Member, TypeVarDetails};
    use loom_ir::{StringInterner, Variance};
    use pretty_assertions::assert_eq;

    fn int_instance(i: &StringInterner) -> Type {
        let d = ClassDetails::new(i.intern("int"), ClassFlags::BUILTIN, Vec::new());
        d.set_bases(Vec::new());
        Type::Class(ClassType::reference(d).to_instance())
    }

    #[test]
    fn instance_field_invisible_on_class_object() {
        let i = StringInterner::new();
        let name = i.intern("x");
        let d = ClassDetails::new(i.intern("Point"), ClassFlags::empty(), Vec::new());
        d.set_bases(Vec::new());
        d.set_members(vec![Member {
            name,
            ty: int_instance(&i),
            kind: MemberKind::InstanceField,
        }]);
        let class_obj = ClassType::reference(d);
        assert_eq!(lookup_member(&Type::Class(class_obj.clone()), name), None);
        assert!(lookup_member(&Type::Class(class_obj.to_instance()), name).is_some());
    }

    #[test]
    fn method_binds_receiver_on_instance_access() {
        let i = StringInterner::new();
        let m = i.intern("speak");
        let d = ClassDetails::new(i.intern("Dog"), ClassFlags::empty(), Vec::new());
        d.set_bases(Vec::new());
        let func = FunctionType::new(
            m,
            vec![FnParam::positional(i.intern("self"), Type::Unknown)],
            int_instance(&i),
        );
        d.set_members(vec![Member {
            name: m,
            ty: Type::Function(Arc::new(func)),
            kind: MemberKind::Method,
        }]);
        let inst = ClassType::reference(d).to_instance();
        let Some(Type::Function(bound)) = lookup_member(&Type::Class(inst), m) else {
            panic!("expected bound function");
        };
        assert!(bound.params.is_empty());
        assert!(bound.bound_self.is_some());
    }

    #[test]
    fn property_access_yields_getter_return() {
        let i = StringInterner::new();
        let p = i.intern("area");
        let d = ClassDetails::new(i.intern("Circle"), ClassFlags::empty(), Vec::new());
        d.set_bases(Vec::new());
        let ret = int_instance(&i);
        let mut getter = FunctionType::new(
            p,
            vec![FnParam::positional(i.intern("self"), Type::Unknown)],
            ret.clone(),
        );
        getter.flags |= FunctionFlags::PROPERTY;
        d.set_members(vec![Member {
            name: p,
            ty: Type::Function(Arc::new(getter)),
            kind: MemberKind::Property,
        }]);
        let inst = ClassType::reference(d).to_instance();
        assert_eq!(lookup_member(&Type::Class(inst), p), Some(ret));
    }

    #[test]
    fn inherited_member_found_through_mro() {
        let i = StringInterner::new();
        let m = i.intern("x");
        let base = ClassDetails::new(i.intern("Base"), ClassFlags::empty(), Vec::new());
        base.set_bases(Vec::new());
        base.set_members(vec![Member {
            name: m,
            ty: int_instance(&i),
            kind: MemberKind::InstanceField,
        }]);
        let sub = ClassDetails::new(i.intern("Sub"), ClassFlags::empty(), Vec::new());
        sub.set_bases(vec![ClassType::reference(base)]);
        sub.set_members(Vec::new());
        let inst = ClassType::reference(sub).to_instance();
        assert_eq!(lookup_member(&Type::Class(inst), m), Some(int_instance(&i)));
    }

    #[test]
    fn generic_field_projects_receiver_args() {
        let i = StringInterner::new();
        let t = TypeVarDetails::new(i.intern("T"), Variance::Invariant, None);
        let field = i.intern("item");
        let d = ClassDetails::new(i.intern("Box"), ClassFlags::empty(), vec![t.clone()]);
        d.set_bases(Vec::new());
        d.set_members(vec![Member {
            name: field,
            ty: Type::TypeVar(t),
            kind: MemberKind::InstanceField,
        }]);
        let int_ty = int_instance(&i);
        let inst = ClassType::reference(d)
            .with_args(vec![int_ty.clone()])
            .to_instance();
        assert_eq!(lookup_member(&Type::Class(inst), field), Some(int_ty));
    }

    #[test]
    fn union_access_requires_member_on_all_branches() {
        let i = StringInterner::new();
        let m = i.intern("x");
        let with = ClassDetails::new(i.intern("With"), ClassFlags::empty(), Vec::new());
        with.set_bases(Vec::new());
        with.set_members(vec![Member {
            name: m,
            ty: int_instance(&i),
            kind: MemberKind::InstanceField,
        }]);
        let without = ClassDetails::new(i.intern("Without"), ClassFlags::empty(), Vec::new());
        without.set_bases(Vec::new());
        without.set_members(Vec::new());
        let u = Type::union_of([
            Type::Class(ClassType::reference(with).to_instance()),
            Type::Class(ClassType::reference(without).to_instance()),
        ]);
        assert_eq!(lookup_member(&u, m), None);
    }

    #[test]
    fn any_and_unknown_absorb_access() {
        let i = StringInterner::new();
        let m = i.intern("whatever");
        assert_eq!(lookup_member(&Type::Any, m), Some(Type::Any));
        assert_eq!(lookup_member(&Type::Unknown, m), Some(Type::Unknown));
    }
}
