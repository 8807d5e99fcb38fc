//! The read-only table of well-known builtin classes.
//!
//! Populated once before any checking begins and never mutated afterward,
//! so concurrently-checked modules can share one table behind an `Arc`.

use std::sync::Arc;

use loom_ir::{Name, StringInterner, Variance};
use rustc_hash::FxHashMap;

use crate::flags::{ClassFlags, FunctionFlags};
use crate::ty::{
    ClassDetails, ClassType, FnParam, FunctionType, Member, MemberKind, Type, TypeVarDetails,
};

/// Well-known classes the evaluator needs by identity.
///
/// Each field is the class-object form; use the `*_instance`/`*_of`
/// helpers for instance types.
pub struct BuiltinTypes {
    pub object: ClassType,
    pub int: ClassType,
    pub float: ClassType,
    pub complex: ClassType,
    pub bool: ClassType,
    pub str: ClassType,
    pub none: ClassType,
    pub list: ClassType,
    pub set: ClassType,
    pub dict: ClassType,
    pub tuple: ClassType,
    pub range: ClassType,
    pub slice: ClassType,
    pub iterator: ClassType,
    /// Root classes the graph archetypes implicitly extend.
    pub node_root: ClassType,
    pub edge_root: ClassType,
    pub walker_root: ClassType,
    by_name: FxHashMap<Name, ClassType>,
}

impl BuiltinTypes {
    /// Build the table. Call once per interner; the result is immutable.
    pub fn new(interner: &StringInterner) -> Arc<Self> {
        let b = Builder { interner };

        let object = b.class("object", ClassFlags::BUILTIN, Vec::new(), Vec::new());
        let obj_base = || vec![object.clone()];

        let int = b.class("int", ClassFlags::BUILTIN, Vec::new(), obj_base());
        let float = b.class("float", ClassFlags::BUILTIN, Vec::new(), obj_base());
        let complex = b.class("complex", ClassFlags::BUILTIN, Vec::new(), obj_base());
        // bool subclasses int, which is all numeric promotion needs.
        let bool_ = b.class("bool", ClassFlags::BUILTIN, Vec::new(), vec![int.clone()]);
        let none = b.class("None", ClassFlags::BUILTIN, Vec::new(), obj_base());
        let range = b.class("range", ClassFlags::BUILTIN, Vec::new(), obj_base());
        let slice = b.class("slice", ClassFlags::BUILTIN, Vec::new(), obj_base());
        let tuple = b.class(
            "tuple",
            ClassFlags::BUILTIN | ClassFlags::TUPLE,
            Vec::new(),
            obj_base(),
        );

        let int_i = Type::Class(int.to_instance());
        let bool_i = Type::Class(bool_.to_instance());

        // iterator[T] (covariant): yields T, iterates as itself.
        let iter_t = b.type_var("T", Variance::Covariant);
        let iterator = b.generic("iterator", vec![iter_t.clone()], obj_base());
        let iterator_of_t = |elem: Type| {
            Type::Class(iterator.with_args(vec![elem]).to_instance())
        };
        iterator.details.set_members(vec![
            b.method("__iter__", vec![], iterator_of_t(Type::TypeVar(iter_t.clone()))),
            b.method("__next__", vec![], Type::TypeVar(iter_t.clone())),
        ]);

        let str_ = b.class("str", ClassFlags::BUILTIN, Vec::new(), obj_base());
        let str_i = Type::Class(str_.to_instance());
        str_.details.set_members(vec![
            b.method("__len__", vec![], int_i.clone()),
            b.method("__iter__", vec![], iterator_of_t(str_i.clone())),
            b.method("__getitem__", vec![("index", int_i.clone())], str_i.clone()),
            b.method("__contains__", vec![("item", str_i.clone())], bool_i.clone()),
            b.method("upper", vec![], str_i.clone()),
            b.method("lower", vec![], str_i.clone()),
        ]);

        // list[T] (invariant).
        let list_t = b.type_var("T", Variance::Invariant);
        let list = b.generic("list", vec![list_t.clone()], obj_base());
        let t = Type::TypeVar(list_t.clone());
        list.details.set_members(vec![
            b.method("__len__", vec![], int_i.clone()),
            b.method("__iter__", vec![], iterator_of_t(t.clone())),
            b.method("__getitem__", vec![("index", int_i.clone())], t.clone()),
            b.method("__contains__", vec![("item", t.clone())], bool_i.clone()),
            b.method("append", vec![("item", t.clone())], Type::Class(none.to_instance())),
        ]);

        // set[T] (invariant).
        let set_t = b.type_var("T", Variance::Invariant);
        let set = b.generic("set", vec![set_t.clone()], obj_base());
        let t = Type::TypeVar(set_t.clone());
        set.details.set_members(vec![
            b.method("__len__", vec![], int_i.clone()),
            b.method("__iter__", vec![], iterator_of_t(t.clone())),
            b.method("__contains__", vec![("item", t.clone())], bool_i.clone()),
            b.method("add", vec![("item", t)], Type::Class(none.to_instance())),
        ]);

        // dict[K, V] (invariant); iteration yields keys.
        let dict_k = b.type_var("K", Variance::Invariant);
        let dict_v = b.type_var("V", Variance::Invariant);
        let dict = b.generic("dict", vec![dict_k.clone(), dict_v.clone()], obj_base());
        let k = Type::TypeVar(dict_k.clone());
        let v = Type::TypeVar(dict_v.clone());
        dict.details.set_members(vec![
            b.method("__len__", vec![], int_i.clone()),
            b.method("__iter__", vec![], iterator_of_t(k.clone())),
            b.method("__getitem__", vec![("key", k.clone())], v.clone()),
            b.method("__contains__", vec![("key", k.clone())], bool_i.clone()),
            b.method(
                "get",
                vec![("key", k)],
                Type::union_of([v, Type::Class(none.to_instance())]),
            ),
        ]);

        range.details.set_members(vec![
            b.method("__len__", vec![], int_i.clone()),
            b.method("__iter__", vec![], iterator_of_t(int_i.clone())),
            b.method("__getitem__", vec![("index", int_i.clone())], int_i.clone()),
        ]);

        tuple.details.set_members(vec![b.method("__len__", vec![], int_i)]);

        let node_root = b.class("Node", ClassFlags::BUILTIN | ClassFlags::NODE, Vec::new(), obj_base());
        let edge_root = b.class("Edge", ClassFlags::BUILTIN | ClassFlags::EDGE, Vec::new(), obj_base());
        let walker_root = b.class(
            "Walker",
            ClassFlags::BUILTIN | ClassFlags::WALKER,
            Vec::new(),
            obj_base(),
        );

        let mut by_name = FxHashMap::default();
        for class in [
            &object, &int, &float, &complex, &bool_, &str_, &none, &list, &set, &dict, &tuple,
            &range, &slice, &iterator, &node_root, &edge_root, &walker_root,
        ] {
            by_name.insert(class.name(), class.clone());
        }

        Arc::new(BuiltinTypes {
            object,
            int,
            float,
            complex,
            bool: bool_,
            str: str_,
            none,
            list,
            set,
            dict,
            tuple,
            range,
            slice,
            iterator,
            node_root,
            edge_root,
            walker_root,
            by_name,
        })
    }

    /// Resolve a builtin class object by name (scope-lookup fallback).
    pub fn by_name(&self, name: Name) -> Option<&ClassType> {
        self.by_name.get(&name)
    }

    pub fn int_instance(&self) -> Type {
        Type::Class(self.int.to_instance())
    }

    pub fn float_instance(&self) -> Type {
        Type::Class(self.float.to_instance())
    }

    pub fn complex_instance(&self) -> Type {
        Type::Class(self.complex.to_instance())
    }

    pub fn bool_instance(&self) -> Type {
        Type::Class(self.bool.to_instance())
    }

    pub fn str_instance(&self) -> Type {
        Type::Class(self.str.to_instance())
    }

    pub fn none_instance(&self) -> Type {
        Type::Class(self.none.to_instance())
    }

    pub fn object_instance(&self) -> Type {
        Type::Class(self.object.to_instance())
    }

    pub fn list_of(&self, elem: Type) -> Type {
        Type::Class(self.list.with_args(vec![elem]).to_instance())
    }

    pub fn set_of(&self, elem: Type) -> Type {
        Type::Class(self.set.with_args(vec![elem]).to_instance())
    }

    pub fn dict_of(&self, key: Type, value: Type) -> Type {
        Type::Class(self.dict.with_args(vec![key, value]).to_instance())
    }

    pub fn tuple_of(&self, elems: Vec<Type>) -> Type {
        Type::Class(self.tuple.with_args(elems).to_instance())
    }

    pub fn iterator_of(&self, elem: Type) -> Type {
        Type::Class(self.iterator.with_args(vec![elem]).to_instance())
    }

    /// A numeric instance, ranked for promotion. `None` for non-numerics.
    pub fn numeric_rank(&self, ty: &Type) -> Option<u8> {
        let class = match ty {
            Type::Class(c) if c.instance => c,
            Type::Literal(lit) => &lit.base,
            _ => return None,
        };
        if class.same_class(&self.bool) || class.same_class(&self.int) {
            Some(if class.same_class(&self.bool) { 0 } else { 1 })
        } else if class.same_class(&self.float) {
            Some(2)
        } else if class.same_class(&self.complex) {
            Some(3)
        } else {
            None
        }
    }

    /// The instance for a promotion rank produced by [`numeric_rank`].
    ///
    /// [`numeric_rank`]: BuiltinTypes::numeric_rank
    pub fn numeric_of_rank(&self, rank: u8) -> Type {
        match rank {
            0 => self.bool_instance(),
            1 => self.int_instance(),
            2 => self.float_instance(),
            _ => self.complex_instance(),
        }
    }
}

struct Builder<'a> {
    interner: &'a StringInterner,
}

impl Builder<'_> {
    fn class(
        &self,
        name: &str,
        flags: ClassFlags,
        type_params: Vec<Arc<TypeVarDetails>>,
        bases: Vec<ClassType>,
    ) -> ClassType {
        let details = ClassDetails::new(self.interner.intern(name), flags, type_params);
        details.set_bases(bases);
        ClassType::reference(details)
    }

    fn generic(
        &self,
        name: &str,
        type_params: Vec<Arc<TypeVarDetails>>,
        bases: Vec<ClassType>,
    ) -> ClassType {
        self.class(name, ClassFlags::BUILTIN, type_params, bases)
    }

    fn type_var(&self, name: &str, variance: Variance) -> Arc<TypeVarDetails> {
        TypeVarDetails::new(self.interner.intern(name), variance, None)
    }

    fn method(&self, name: &str, params: Vec<(&str, Type)>, ret: Type) -> Member {
        let name = self.interner.intern(name);
        let mut fn_params = vec![FnParam::positional(self.interner.intern("self"), Type::Any)];
        fn_params.extend(
            params
                .into_iter()
                .map(|(p, ty)| FnParam::positional(self.interner.intern(p), ty)),
        );
        let mut func = FunctionType::new(name, fn_params, ret);
        func.flags = FunctionFlags::empty();
        Member {
            name,
            ty: Type::Function(Arc::new(func)),
            kind: MemberKind::Method,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::relate::assign_type;
    use pretty_assertions::assert_eq;

    #[test]
    fn bool_is_assignable_to_int() {
        let i = StringInterner::new();
        let b = BuiltinTypes::new(&i);
        assert!(assign_type(&b.bool_instance(), &b.int_instance()));
        assert!(!assign_type(&b.int_instance(), &b.bool_instance()));
    }

    #[test]
    fn everything_flows_into_object() {
        let i = StringInterner::new();
        let b = BuiltinTypes::new(&i);
        for ty in [b.int_instance(), b.str_instance(), b.list_of(b.int_instance())] {
            assert!(assign_type(&ty, &b.object_instance()));
        }
    }

    #[test]
    fn list_element_member_projects() {
        let i = StringInterner::new();
        let b = BuiltinTypes::new(&i);
        let list_int = b.list_of(b.int_instance());
        let got = crate::relate::lookup_member(&list_int, i.intern("__getitem__"));
        let Some(Type::Function(f)) = got else {
            panic!("expected __getitem__, got {got:?}");
        };
        assert_eq!(f.ret, b.int_instance());
    }

    #[test]
    fn dict_iteration_member_yields_keys() {
        let i = StringInterner::new();
        let b = BuiltinTypes::new(&i);
        let d = b.dict_of(b.str_instance(), b.int_instance());
        let Some(Type::Function(f)) = crate::relate::lookup_member(&d, i.intern("__iter__"))
        else {
            panic!("expected __iter__");
        };
        assert_eq!(f.ret, b.iterator_of(b.str_instance()));
    }

    #[test]
    fn numeric_rank_ordering() {
        let i = StringInterner::new();
        let b = BuiltinTypes::new(&i);
        let bi = b.numeric_rank(&b.bool_instance());
        let ii = b.numeric_rank(&b.int_instance());
        let fi = b.numeric_rank(&b.float_instance());
        let ci = b.numeric_rank(&b.complex_instance());
        assert!(bi < ii && ii < fi && fi < ci);
        assert_eq!(b.numeric_rank(&b.str_instance()), None);
    }
}
