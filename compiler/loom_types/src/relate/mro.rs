//! C3 method-resolution-order linearization.
//!
//! Each class caches one linearization for its lifetime. Entries carry type
//! arguments expressed in terms of the head class's own type parameters, so
//! a concrete instantiation projects the whole chain with one substitution.

use std::sync::Arc;

use crate::ty::{substitute, ClassDetails, ClassType, Type, TypeVarMap};

/// A computed linearization.
#[derive(Clone, Debug)]
pub struct Mro {
    /// The class itself first, then ancestors, `object` last.
    pub order: Vec<ClassType>,
    /// `false` when C3 merge failed and the order fell back to a
    /// depth-first walk.
    pub consistent: bool,
}

impl Mro {
    pub fn iter(&self) -> impl Iterator<Item = &ClassType> {
        self.order.iter()
    }

    pub fn contains(&self, details: &Arc<ClassDetails>) -> bool {
        self.order.iter().any(|e| Arc::ptr_eq(&e.details, details))
    }
}

/// Compute the linearization for one class declaration.
///
/// Requires the declaration's bases to be set (and acyclic); called through
/// the details cache, never directly during registration.
pub fn linearize(details: &Arc<ClassDetails>) -> Mro {
    let head = generic_reference(details);
    let bases = details.bases();
    if bases.is_empty() {
        return Mro {
            order: vec![head],
            consistent: true,
        };
    }

    let mut sequences: Vec<Vec<ClassType>> = bases.iter().map(base_linearization).collect();
    sequences.push(bases.to_vec());

    if let Some(mut order) = c3_merge(sequences) {
        order.insert(0, head);
        return Mro {
            order,
            consistent: true,
        };
    }

    // Inconsistent hierarchy: fall back to depth-first preorder so member
    // lookup still has a deterministic chain to walk.
    let mut order = Vec::new();
    dfs_collect(head, &mut order);
    Mro {
        order,
        consistent: false,
    }
}

/// The class-object form of `details` with its own parameters as arguments.
fn generic_reference(details: &Arc<ClassDetails>) -> ClassType {
    let args = if details.type_params.is_empty() {
        None
    } else {
        Some(
            details
                .type_params
                .iter()
                .map(|p| Type::TypeVar(p.clone()))
                .collect::<Vec<_>>()
                .into(),
        )
    };
    ClassType {
        details: details.clone(),
        args,
        instance: false,
    }
}

/// A base's cached linearization with the base's parameters replaced by the
/// arguments the subclass declared for it.
fn base_linearization(base: &ClassType) -> Vec<ClassType> {
    let map = TypeVarMap::for_class(base);
    base.details
        .mro()
        .order
        .iter()
        .map(|entry| project(entry, &map))
        .collect()
}

fn project(entry: &ClassType, map: &TypeVarMap) -> ClassType {
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

/// Standard C3 merge: repeatedly take the first head that appears in no
/// sequence tail. `None` when no such head exists.
fn c3_merge(mut sequences: Vec<Vec<ClassType>>) -> Option<Vec<ClassType>> {
    let mut order = Vec::new();
    loop {
        sequences.retain(|s| !s.is_empty());
        if sequences.is_empty() {
            return Some(order);
        }
        let picked = sequences
            .iter()
            .map(|s| &s[0])
            .find(|head| {
                sequences
                    .iter()
                    .all(|s| !s[1..].iter().any(|c| c.same_class(head)))
            })?
            .clone();
        for s in &mut sequences {
            if s[0].same_class(&picked) {
                s.remove(0);
            }
        }
        order.push(picked);
    }
}

fn dfs_collect(entry: ClassType, out: &mut Vec<ClassType>) {
    if out.iter().any(|e| e.same_class(&entry)) {
        return;
    }
    let map = TypeVarMap::for_class(&entry);
    let details = entry.details.clone();
    out.push(entry);
    for base in details.bases() {
        dfs_collect(project(base, &map), out);
    }
}

/// Project `src`'s view of the ancestor `target`: the MRO entry for
/// `target` with `src`'s concrete arguments substituted through the chain.
/// `None` when `target` is not an ancestor.
pub fn ancestor_as(src: &ClassType, target: &Arc<ClassDetails>) -> Option<ClassType> {
    let map = TypeVarMap::for_class(src);
    src.details
        .mro()
        .order
        .iter()
        .find(|e| Arc::ptr_eq(&e.details, target))
        .map(|e| project(e, &map))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flags::ClassFlags;
    use loom_ir::{StringInterner, Variance};
    use pretty_assertions::assert_eq;

    fn class(interner: &StringInterner, name: &str, bases: Vec<ClassType>) -> Arc<ClassDetails> {
        let details = ClassDetails::new(interner.intern(name), ClassFlags::empty(), Vec::new());
        details.set_bases(bases);
        details
    }

    #[test]
    fn single_inheritance_chain() {
        let i = StringInterner::new();
        let a = class(&i, "A", vec![]);
        let b = class(&i, "B", vec![ClassType::reference(a.clone())]);
        let c = class(&i, "C", vec![ClassType::reference(b.clone())]);
        let mro = c.mro();
        assert!(mro.consistent);
        let names: Vec<&str> = mro.order.iter().map(|e| i.resolve(e.name())).collect();
        assert_eq!(names, vec!["C", "B", "A"]);
    }

    #[test]
    fn diamond_linearizes_once() {
        let i = StringInterner::new();
        let top = class(&i, "Top", vec![]);
        let left = class(&i, "Left", vec![ClassType::reference(top.clone())]);
        let right = class(&i, "Right", vec![ClassType::reference(top.clone())]);
        let bottom = class(
            &i,
            "Bottom",
            vec![
                ClassType::reference(left.clone()),
                ClassType::reference(right.clone()),
            ],
        );
        let mro = bottom.mro();
        assert!(mro.consistent);
        let names: Vec<&str> = mro.order.iter().map(|e| i.resolve(e.name())).collect();
        assert_eq!(names, vec!["Bottom", "Left", "Right", "Top"]);
    }

    #[test]
    fn inconsistent_hierarchy_falls_back_to_dfs() {
        let i = StringInterner::new();
        let a = class(&i, "A", vec![]);
        let b = class(&i, "B", vec![ClassType::reference(a.clone())]);
        // C(A, B): C3 cannot place A before B while honoring B's chain.
        let c = class(
            &i,
            "C",
            vec![ClassType::reference(a.clone()), ClassType::reference(b.clone())],
        );
        let mro = c.mro();
        assert!(!mro.consistent);
        let names: Vec<&str> = mro.order.iter().map(|e| i.resolve(e.name())).collect();
        assert_eq!(names, vec!["C", "A", "B"]);
    }

    #[test]
    fn generic_base_args_project_through() {
        let i = StringInterner::new();
        let t = crate::ty::TypeVarDetails::new(i.intern("T"), Variance::Invariant, None);
        let boxed = ClassDetails::new(i.intern("Box"), ClassFlags::empty(), vec![t.clone()]);
        boxed.set_bases(vec![]);
        let int_cls = class(&i, "int", vec![]);
        let int_inst = Type::Class(ClassType::reference(int_cls).to_instance());
        // IntBox(Box[int])
        let int_box = class(
            &i,
            "IntBox",
            vec![ClassType::reference(boxed.clone()).with_args(vec![int_inst.clone()])],
        );
        let mro = int_box.mro();
        let boxed_entry = mro
            .order
            .iter()
            .find(|e| Arc::ptr_eq(&e.details, &boxed))
            .unwrap();
        assert_eq!(boxed_entry.arg(0), int_inst);
    }
}
