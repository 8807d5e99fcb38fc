//! Declaration registration: turns class and function declarations into
//! shared type-model objects before bodies are checked.
//!
//! Classes register in three steps against one shared-details object: the
//! details are created and published first (so self-referential member
//! types resolve), then bases and the MRO, then the member table. All of
//! it is idempotent and triggered lazily for forward references.

use std::sync::Arc;

use loom_ir::{
    ArchetypeKind, AstArena, ClassDecl, DeclId, DeclKind, Decorator, ExprId, ExprKind, Module,
    Name, ParamKind, Span, StmtKind,
};

use crate::error::{TypeCheckError, TypeCheckErrorKind};
use crate::flags::{ClassFlags, FunctionFlags};
use crate::relate::{assign_type, lookup_member};
use crate::ty::{ClassDetails, ClassType, FnParam, FunctionType, Member, MemberKind, Type};

use super::ModuleChecker;

impl ModuleChecker<'_> {
    /// Register every top-level class and function signature of a module.
    pub(crate) fn register_module(&mut self, module: &Module) {
        for &stmt in &module.body {
            if let StmtKind::ClassDef(decl) = self.arena.stmt(stmt).kind {
                self.register_class(decl);
            }
        }
        let mut functions = Vec::new();
        for &stmt in &module.body {
            if let StmtKind::FunctionDef(decl) = self.arena.stmt(stmt).kind {
                functions.push(decl);
            }
        }
        self.register_function_signatures(&functions, None);
    }

    // === Classes ===

    /// Register one class declaration. Idempotent; safe to call for
    /// forward references from annotations or base lists.
    pub(crate) fn register_class(&mut self, id: DeclId) {
        if self.class_details.contains_key(&id) {
            return;
        }
        let decl = self.arena.decl(id);
        let DeclKind::Class(class) = &decl.kind else {
            return;
        };

        let mut type_params = Vec::new();
        for &tp in &class.type_params {
            if let Type::TypeVar(var) = self.resolve_decl(tp) {
                type_params.push(var);
            }
        }

        let mut flags = match class.archetype {
            ArchetypeKind::Class => ClassFlags::empty(),
            ArchetypeKind::Node => ClassFlags::NODE | ClassFlags::DATA_CLASS,
            ArchetypeKind::Edge => ClassFlags::EDGE | ClassFlags::DATA_CLASS,
            ArchetypeKind::Walker => ClassFlags::WALKER | ClassFlags::DATA_CLASS,
        };
        let mut base_exprs = Vec::new();
        for &base in &class.bases {
            if self.is_protocol_marker(base) {
                flags |= ClassFlags::PROTOCOL;
            } else {
                base_exprs.push(base);
            }
        }

        // Publish the details before touching bases or members so that
        // self-references inside the class body resolve to this object.
        let details = ClassDetails::new(decl.name, flags, type_params);
        self.class_details.insert(id, details.clone());
        self.set_decl_type(id, Type::Class(ClassType::reference(details.clone())));

        let bases = self.resolve_bases(&details, &base_exprs, class);
        details.set_bases(bases);
        if !details.mro().consistent {
            self.report(TypeCheckError::new(
                TypeCheckErrorKind::InconsistentMro {
                    class: self.interner.resolve(decl.name).to_string(),
                },
                decl.span,
            ));
        }

        self.check_edge_endpoints(class);
        self.register_members(class, &details);
        self.validate_overrides(class, &details);
    }

    /// A base written as `Protocol` that binds to no declaration marks the
    /// class as structurally matched instead of contributing a base.
    fn is_protocol_marker(&self, expr: ExprId) -> bool {
        let ExprKind::Ident(name) = self.arena.expr(expr).kind else {
            return false;
        };
        self.interner.resolve(name) == "Protocol"
            && self.arena.resolve_name(self.current_scope(), name).is_none()
    }

    fn resolve_bases(
        &mut self,
        details: &Arc<ClassDetails>,
        base_exprs: &[ExprId],
        class: &ClassDecl,
    ) -> Vec<ClassType> {
        let mut bases = Vec::new();
        for &expr in base_exprs {
            let span = self.arena.expr(expr).span;
            let Some(base) = self.resolve_base(expr, span) else {
                continue;
            };
            if transitively_extends(&base.details, details) {
                self.report(TypeCheckError::new(
                    TypeCheckErrorKind::InvalidBase {
                        ty: self.interner.resolve(base.name()).to_string(),
                    },
                    span,
                ));
                continue;
            }
            bases.push(base);
        }

        // Archetypes implicitly extend their root; plain classes extend
        // object when no base is declared.
        let implicit_root = match class.archetype {
            ArchetypeKind::Node => Some((&self.builtins.node_root, ClassFlags::NODE)),
            ArchetypeKind::Edge => Some((&self.builtins.edge_root, ClassFlags::EDGE)),
            ArchetypeKind::Walker => {
                Some((&self.builtins.walker_root, ClassFlags::WALKER))
            }
            ArchetypeKind::Class => None,
        };
        match implicit_root {
            Some((root, flag)) => {
                let covered = bases
                    .iter()
                    .any(|b| b.details.mro().iter().any(|e| e.details.flags.contains(flag)));
                if !covered {
                    bases.push(root.clone());
                }
            }
            None => {
                if bases.is_empty() {
                    bases.push(self.builtins.object.clone());
                }
            }
        }
        bases
    }

    fn resolve_base(&mut self, expr: ExprId, span: Span) -> Option<ClassType> {
        let ty = match &self.arena.expr(expr).kind {
            ExprKind::Index { object, index } => {
                crate::infer::annotations::specialize(self, *object, *index, span)
            }
            _ => self.infer_expr(expr),
        };
        match ty {
            Type::Class(c) if !c.instance => Some(c),
            Type::Unknown | Type::Unbound => None,
            other => {
                self.report(TypeCheckError::new(
                    TypeCheckErrorKind::InvalidBase {
                        ty: self.render(&other),
                    },
                    span,
                ));
                None
            }
        }
    }

    fn check_edge_endpoints(&mut self, class: &ClassDecl) {
        let Some((from, to)) = class.endpoints else {
            return;
        };
        for expr in [from, to] {
            let span = self.arena.expr(expr).span;
            let ty = self.infer_expr(expr);
            let is_node = match &ty {
                Type::Class(c) => c
                    .details
                    .mro()
                    .iter()
                    .any(|e| e.details.flags.contains(ClassFlags::NODE)),
                Type::Unknown | Type::Unbound => true,
                _ => false,
            };
            if !is_node {
                self.report(TypeCheckError::new(
                    TypeCheckErrorKind::InvalidEdgeEndpoint {
                        ty: self.render(&ty),
                    },
                    span,
                ));
            }
        }
    }

    // === Members ===

    fn register_members(&mut self, class: &ClassDecl, details: &Arc<ClassDetails>) {
        let mut members = Vec::new();

        for field in &class.fields {
            let ty = match field.annotation {
                Some(ann) => crate::infer::annotations::resolve_annotation(self, ann),
                None => match field.default {
                    Some(default) => self.infer_expr(default).widened(),
                    None => Type::Unknown,
                },
            };
            if let (Some(_), Some(default)) = (field.annotation, field.default) {
                let default_ty = self.infer_expr(default);
                if !assign_type(&default_ty, &ty) {
                    let err = TypeCheckError::type_mismatch(
                        self.render(&ty),
                        self.render(&default_ty),
                        self.arena.expr(default).span,
                    );
                    self.report(err);
                }
            }
            members.push(Member {
                name: field.name,
                ty,
                kind: MemberKind::InstanceField,
            });
        }

        let owner = self.generic_instance(details);
        members.extend(self.method_members(&class.methods, &owner));

        let init = self.interner.intern("__init__");
        let has_own_init = members.iter().any(|m| m.name == init);
        if !has_own_init {
            if let Some(ctor) = self.synthesize_constructor(details, class, &members, init) {
                members.push(ctor);
            }
        }

        details.set_members(members);
    }

    /// Build members for a list of method declarations, grouping
    /// `@overload`-marked signatures of the same name into one member.
    fn method_members(&mut self, methods: &[DeclId], owner: &ClassType) -> Vec<Member> {
        let mut members = Vec::new();
        for (name, decls) in group_by_name(self.arena, methods) {
            members.push(self.function_member(name, &decls, Some(owner)));
        }
        members
    }

    fn function_member(
        &mut self,
        name: Name,
        decls: &[DeclId],
        owner: Option<&ClassType>,
    ) -> Member {
        let overloads: Vec<DeclId> = decls
            .iter()
            .copied()
            .filter(|&d| self.decl_has_decorator(d, Decorator::Overload))
            .collect();

        let (ty, kind_decl) = if overloads.len() > 1 {
            let sigs: Vec<Arc<FunctionType>> = overloads
                .iter()
                .map(|&d| Arc::new(self.function_signature(d, owner)))
                .collect();
            let ty = Type::Overloaded(sigs.into());
            // Every declaration of the group, implementation included,
            // resolves to the whole overloaded symbol.
            for &d in decls {
                self.set_decl_type(d, ty.clone());
            }
            (ty, overloads[0])
        } else {
            // Plain functions shadow: the last declaration wins.
            let last = *decls.last().unwrap_or(&decls[0]);
            let sig = self.function_signature(last, owner);
            let ty = Type::Function(Arc::new(sig));
            self.set_decl_type(last, ty.clone());
            (ty, last)
        };

        let kind = if self.decl_has_decorator(kind_decl, Decorator::Property) {
            MemberKind::Property
        } else if self.decl_has_decorator(kind_decl, Decorator::ClassMethod) {
            MemberKind::ClassMethod
        } else if self.decl_has_decorator(kind_decl, Decorator::StaticMethod) {
            MemberKind::StaticMethod
        } else {
            MemberKind::Method
        };
        Member { name, ty, kind }
    }

    /// Field-order constructor for classes that declare fields but no
    /// `__init__` of their own: inherited constructor parameters first,
    /// then this class's fields in declaration order.
    fn synthesize_constructor(
        &mut self,
        details: &Arc<ClassDetails>,
        class: &ClassDecl,
        members: &[Member],
        init: Name,
    ) -> Option<Member> {
        let own_fields: Vec<&Member> = members
            .iter()
            .filter(|m| m.kind == MemberKind::InstanceField)
            .collect();

        // Own members are not set yet, so this lookup finds only an
        // inherited constructor, already receiver-stripped and projected.
        let inherited = lookup_member(&Type::Class(self.generic_instance(details)), init);
        if own_fields.is_empty() && inherited.is_none() {
            return None;
        }

        let mut params = vec![FnParam::positional(self.interner.intern("self"), Type::Any)];
        if let Some(Type::Function(base_ctor)) = &inherited {
            params.extend(
                base_ctor
                    .params
                    .iter()
                    .filter(|p| own_fields.iter().all(|f| f.name != p.name))
                    .cloned(),
            );
        }
        for field in &own_fields {
            let has_default = class
                .fields
                .iter()
                .any(|f| f.name == field.name && f.default.is_some());
            params.push(FnParam {
                name: field.name,
                kind: ParamKind::Positional,
                ty: field.ty.clone(),
                has_default,
            });
        }

        let mut ctor = FunctionType::new(init, params, self.builtins.none_instance());
        ctor.flags = FunctionFlags::CONSTRUCTOR | FunctionFlags::SYNTHESIZED;
        Some(Member {
            name: init,
            ty: Type::Function(Arc::new(ctor)),
            kind: MemberKind::Method,
        })
    }

    /// Every overriding method must be assignable (receiver stripped) to
    /// the signature it overrides.
    fn validate_overrides(&mut self, class: &ClassDecl, details: &Arc<ClassDetails>) {
        let init = self.interner.intern("__init__");
        let spans: Vec<(Name, Span)> = class
            .methods
            .iter()
            .map(|&d| {
                let decl = self.arena.decl(d);
                (decl.name, decl.span)
            })
            .collect();

        let mut failures = Vec::new();
        for member in details.members() {
            if member.kind == MemberKind::InstanceField || member.name == init {
                continue;
            }
            let Some(inherited) = details
                .mro()
                .iter()
                .skip(1)
                .find_map(|e| e.details.own_member(member.name))
            else {
                continue;
            };
            let own = strip_receiver(&member.ty);
            let theirs = strip_receiver(&inherited.ty);
            if !assign_type(&own, &theirs) {
                let span = spans
                    .iter()
                    .find(|(n, _)| *n == member.name)
                    .map_or(Span::DUMMY, |(_, s)| *s);
                failures.push(TypeCheckError::new(
                    TypeCheckErrorKind::IncompatibleOverride {
                        name: self.interner.resolve(member.name).to_string(),
                    },
                    span,
                ));
            }
        }
        for err in failures {
            self.report(err);
        }
    }

    // === Function signatures ===

    /// Register signatures for a batch of function declarations sharing a
    /// scope, grouping module-level overloads the same way methods group.
    pub(crate) fn register_function_signatures(
        &mut self,
        decls: &[DeclId],
        owner: Option<&ClassType>,
    ) {
        for (name, group) in group_by_name(self.arena, decls) {
            self.function_member(name, &group, owner);
        }
    }

    /// Compute one function declaration's signature type.
    ///
    /// For methods, the unannotated first parameter takes the owner's
    /// instance type (the class object under `@classmethod`).
    pub(crate) fn function_signature(
        &mut self,
        id: DeclId,
        owner: Option<&ClassType>,
    ) -> FunctionType {
        let decl = self.arena.decl(id);
        let DeclKind::Function(func) = &decl.kind else {
            return FunctionType::new(decl.name, Vec::new(), Type::Unknown);
        };
        let is_static = func.has_decorator(Decorator::StaticMethod);
        let is_classmethod = func.has_decorator(Decorator::ClassMethod);

        let mut params = Vec::with_capacity(func.params.len());
        for (i, param) in func.params.iter().enumerate() {
            let ty = if let Some(ann) = param.annotation {
                crate::infer::annotations::resolve_annotation(self, ann)
            } else if i == 0
                && param.kind == ParamKind::Positional
                && !is_static
                && owner.is_some()
            {
                match owner {
                    Some(o) if is_classmethod => Type::Class(o.to_class_object()),
                    Some(o) => Type::Class(o.clone()),
                    None => Type::Unknown,
                }
            } else if let Some(default) = param.default {
                self.infer_expr(default).widened()
            } else {
                Type::Unknown
            };

            // An annotated default must fit the annotation.
            if let (Some(_), Some(default)) = (param.annotation, param.default) {
                let default_ty = self.infer_expr(default);
                if !assign_type(&default_ty, &ty) {
                    let err = TypeCheckError::type_mismatch(
                        self.render(&ty),
                        self.render(&default_ty),
                        self.arena.expr(default).span,
                    );
                    self.report(err);
                }
            }

            params.push(FnParam {
                name: param.name,
                kind: param.kind,
                ty,
                has_default: param.default.is_some(),
            });
        }

        let ret = match func.return_annotation {
            Some(ann) => crate::infer::annotations::resolve_annotation(self, ann),
            None => Type::Unknown,
        };

        let mut sig = FunctionType::new(decl.name, params, ret);
        if is_static {
            sig.flags |= FunctionFlags::STATIC_METHOD;
        }
        if is_classmethod {
            sig.flags |= FunctionFlags::CLASS_METHOD;
        }
        if func.has_decorator(Decorator::Property) {
            sig.flags |= FunctionFlags::PROPERTY;
        }
        sig
    }

    fn decl_has_decorator(&self, id: DeclId, decorator: Decorator) -> bool {
        match &self.arena.decl(id).kind {
            DeclKind::Function(f) => f.has_decorator(decorator),
            _ => false,
        }
    }
}

/// Group declarations by name, preserving first-appearance order.
fn group_by_name(arena: &AstArena, decls: &[DeclId]) -> Vec<(Name, Vec<DeclId>)> {
    let mut groups: Vec<(Name, Vec<DeclId>)> = Vec::new();
    for &decl in decls {
        let name = arena.decl(decl).name;
        match groups.iter_mut().find(|(n, _)| *n == name) {
            Some((_, group)) => group.push(decl),
            None => groups.push((name, vec![decl])),
        }
    }
    groups
}

/// Whether `base` already has `details` somewhere in its ancestry, which
/// would make the new edge a cycle.
fn transitively_extends(base: &Arc<ClassDetails>, details: &Arc<ClassDetails>) -> bool {
    if Arc::ptr_eq(base, details) {
        return true;
    }
    base.bases()
        .iter()
        .any(|b| transitively_extends(&b.details, details))
}

/// Drop the receiver parameter so override compatibility compares the
/// externally visible signature.
fn strip_receiver(ty: &Type) -> Type {
    fn strip(f: &FunctionType) -> FunctionType {
        if f.flags.contains(FunctionFlags::STATIC_METHOD) || f.params.is_empty() {
            return f.clone();
        }
        let mut stripped = f.clone();
        stripped.params.remove(0);
        stripped
    }
    match ty {
        Type::Function(f) => Type::Function(Arc::new(strip(f))),
        Type::Overloaded(sigs) => Type::Overloaded(
            sigs.iter()
                .map(|f| Arc::new(strip(f)))
                .collect::<Vec<_>>()
                .into(),
        ),
        other => other.clone(),
    }
}
