//! The closed type variant set and its value semantics.
//!
//! Every type the checker manipulates is a [`Type`]. Class types split into
//! shared details (one [`ClassDetails`] per declaration, holding the member
//! table and cached MRO) and private per-instantiation data (the concrete
//! type arguments), so `list[int]` and `list[str]` share one details object.
//!
//! Equality is value semantics except where identity is the meaning:
//! two `Class` types are equal only when they share the same details object
//! (by pointer) with pointwise-equal arguments; two `TypeVar`s are equal
//! only when they are the same declaration.

use std::fmt;
use std::sync::{Arc, OnceLock};

use loom_ir::{Name, ParamKind, StringInterner, Variance};
use smallvec::SmallVec;

use crate::flags::{ClassFlags, FunctionFlags};
use crate::literal::{LiteralType, LiteralValue};
use crate::relate::mro::{self, Mro};

/// The closed set of type variants.
#[derive(Clone, Debug)]
pub enum Type {
    /// Not yet resolved; behaves like `Unknown` in checks.
    Unbound,
    /// Could not be determined. Absorbs operations without emitting
    /// secondary diagnostics.
    Unknown,
    /// Bottom type: no values, assignable to everything.
    Never,
    /// Top type: accepts and is accepted by everything.
    Any,
    /// Namespace of an imported module's exported symbol types.
    Module(Arc<ModuleType>),
    /// Generic type parameter.
    TypeVar(Arc<TypeVarDetails>),
    /// Class object or class instance.
    Class(ClassType),
    /// Function or method signature.
    Function(Arc<FunctionType>),
    /// Ordered overload signatures, first match wins.
    Overloaded(Arc<[Arc<FunctionType>]>),
    /// Deduplicated, flattened set of two or more member types.
    Union(Arc<[Type]>),
    /// A concrete primitive value plus the class it widens to.
    Literal(LiteralType),
}

impl PartialEq for Type {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Type::Unbound, Type::Unbound)
            | (Type::Unknown, Type::Unknown)
            | (Type::Never, Type::Never)
            | (Type::Any, Type::Any) => true,
            (Type::Module(a), Type::Module(b)) => Arc::ptr_eq(a, b) || a.name == b.name,
            (Type::TypeVar(a), Type::TypeVar(b)) => Arc::ptr_eq(a, b),
            (Type::Class(a), Type::Class(b)) => a == b,
            (Type::Function(a), Type::Function(b)) => a == b,
            (Type::Overloaded(a), Type::Overloaded(b)) => a == b,
            (Type::Union(a), Type::Union(b)) => {
                // Unions are unordered sets; compare by mutual membership.
                a.len() == b.len()
                    && a.iter().all(|m| b.contains(m))
                    && b.iter().all(|m| a.contains(m))
            }
            (Type::Literal(a), Type::Literal(b)) => a == b,
            _ => false,
        }
    }
}

impl Type {
    /// Build a normalized union: flattens nested unions, drops `Never`,
    /// deduplicates, and degenerates to the single member when only one
    /// remains. `Any` and `Unknown` absorb the whole union.
    pub fn union_of(members: impl IntoIterator<Item = Type>) -> Type {
        let mut flat: SmallVec<[Type; 4]> = SmallVec::new();
        let mut saw_unknown = false;
        for member in members {
            match member {
                Type::Any => return Type::Any,
                Type::Unknown | Type::Unbound => saw_unknown = true,
                Type::Never => {}
                Type::Union(inner) => {
                    for m in inner.iter() {
                        if !flat.contains(m) {
                            flat.push(m.clone());
                        }
                    }
                }
                other => {
                    if !flat.contains(&other) {
                        flat.push(other);
                    }
                }
            }
        }
        if saw_unknown {
            return Type::Unknown;
        }
        match flat.len() {
            0 => Type::Never,
            1 => flat.swap_remove(0),
            _ => Type::Union(flat.into_vec().into()),
        }
    }

    /// A literal widens to its base instance; everything else is unchanged.
    pub fn widened(&self) -> Type {
        match self {
            Type::Literal(lit) => lit.widen(),
            other => other.clone(),
        }
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, Type::Unknown | Type::Unbound)
    }

    pub fn is_any(&self) -> bool {
        matches!(self, Type::Any)
    }

    /// Whether this is an instance of some class (including literals, which
    /// are instances of their base class).
    pub fn is_class_instance(&self) -> bool {
        match self {
            Type::Class(c) => c.instance,
            Type::Literal(_) => true,
            _ => false,
        }
    }

    /// Whether calling this type constructs an instance (a class object).
    pub fn is_instantiable(&self) -> bool {
        matches!(self, Type::Class(c) if !c.instance)
    }

    /// Whether the shape alone makes this callable. Instances with a
    /// `__call__` member are discovered through member lookup, not here.
    pub fn is_callable_shaped(&self) -> bool {
        matches!(self, Type::Function(_) | Type::Overloaded(_)) || self.is_instantiable()
    }

    /// Shallow-recursive check for `Unknown` anywhere in the type.
    pub fn contains_unknown(&self) -> bool {
        match self {
            Type::Unknown | Type::Unbound => true,
            Type::Class(c) => c
                .args
                .as_deref()
                .is_some_and(|args| args.iter().any(Type::contains_unknown)),
            Type::Union(members) => members.iter().any(Type::contains_unknown),
            Type::Function(f) => {
                f.ret.contains_unknown() || f.params.iter().any(|p| p.ty.contains_unknown())
            }
            _ => false,
        }
    }

    /// Render with identifier names resolved through the interner.
    pub fn display<'a>(&'a self, interner: &'a StringInterner) -> TypeDisplay<'a> {
        TypeDisplay { ty: self, interner }
    }
}

// ============================================================================
// Type variables
// ============================================================================

/// Shared details of one generic type parameter declaration.
///
/// Identity is the declaration: two `TypeVar` types are the same variable
/// only when they point at the same details object.
#[derive(Debug)]
pub struct TypeVarDetails {
    pub name: Name,
    pub variance: Variance,
    /// Upper bound the solved argument must satisfy, if declared.
    pub bound: Option<Type>,
}

impl TypeVarDetails {
    pub fn new(name: Name, variance: Variance, bound: Option<Type>) -> Arc<Self> {
        Arc::new(TypeVarDetails {
            name,
            variance,
            bound,
        })
    }
}

/// Substitution map from type variables to solved types.
///
/// Keys compare by declaration identity. Small and short-lived: one per
/// call-site specialization or member projection.
#[derive(Clone, Debug, Default)]
pub struct TypeVarMap {
    entries: Vec<(Arc<TypeVarDetails>, Type)>,
}

impl TypeVarMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a map from a class's declared parameters to its arguments.
    pub fn for_class(class: &ClassType) -> Self {
        let mut map = TypeVarMap::new();
        if let Some(args) = class.args.as_deref() {
            for (param, arg) in class.details.type_params.iter().zip(args.iter()) {
                map.bind(param.clone(), arg.clone());
            }
        }
        map
    }

    pub fn bind(&mut self, var: Arc<TypeVarDetails>, ty: Type) {
        if let Some(entry) = self.entries.iter_mut().find(|(v, _)| Arc::ptr_eq(v, &var)) {
            entry.1 = ty;
        } else {
            self.entries.push((var, ty));
        }
    }

    pub fn get(&self, var: &Arc<TypeVarDetails>) -> Option<&Type> {
        self.entries
            .iter()
            .find(|(v, _)| Arc::ptr_eq(v, var))
            .map(|(_, t)| t)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Arc<TypeVarDetails>, &Type)> {
        self.entries.iter().map(|(v, t)| (v, t))
    }
}

/// Replace type variables per `map`, leaving unmapped variables in place.
pub fn substitute(ty: &Type, map: &TypeVarMap) -> Type {
    if map.is_empty() {
        return ty.clone();
    }
    match ty {
        Type::TypeVar(var) => map.get(var).cloned().unwrap_or_else(|| ty.clone()),
        Type::Class(class) => {
            let Some(args) = class.args.as_deref() else {
                return ty.clone();
            };
            let new_args: Vec<Type> = args.iter().map(|a| substitute(a, map)).collect();
            Type::Class(ClassType {
                details: class.details.clone(),
                args: Some(new_args.into()),
                instance: class.instance,
            })
        }
        Type::Function(f) => Type::Function(Arc::new(f.substituted(map))),
        Type::Overloaded(sigs) => Type::Overloaded(
            sigs.iter()
                .map(|f| Arc::new(f.substituted(map)))
                .collect::<Vec<_>>()
                .into(),
        ),
        Type::Union(members) => Type::union_of(members.iter().map(|m| substitute(m, map))),
        other => other.clone(),
    }
}

// ============================================================================
// Classes
// ============================================================================

/// A class member as recorded in the shared details table.
#[derive(Clone, PartialEq, Debug)]
pub struct Member {
    pub name: Name,
    pub ty: Type,
    pub kind: MemberKind,
}

/// How a member participates in access transforms.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum MemberKind {
    /// Per-instance attribute; invisible to class-object access.
    InstanceField,
    /// Ordinary method; binds its receiver on instance access.
    Method,
    /// `@property`: instance access applies the getter's return type.
    Property,
    /// `@classmethod`: binds the class object on either access form.
    ClassMethod,
    /// `@staticmethod`: no binding on either access form.
    StaticMethod,
}

/// Shared details of one class declaration.
///
/// Created once per declaration and shared (via `Arc`) by every
/// instantiation. Bases, members, and the MRO are filled in set-once cells
/// during registration; the MRO cache lives for the declaration's lifetime
/// and is discarded only with the details object itself.
#[derive(Debug)]
pub struct ClassDetails {
    pub name: Name,
    pub flags: ClassFlags,
    /// Ordered declared type parameters.
    pub type_params: Vec<Arc<TypeVarDetails>>,
    bases: OnceLock<Vec<ClassType>>,
    members: OnceLock<Vec<Member>>,
    mro: OnceLock<Mro>,
}

impl ClassDetails {
    pub fn new(name: Name, flags: ClassFlags, type_params: Vec<Arc<TypeVarDetails>>) -> Arc<Self> {
        Arc::new(ClassDetails {
            name,
            flags,
            type_params,
            bases: OnceLock::new(),
            members: OnceLock::new(),
            mro: OnceLock::new(),
        })
    }

    /// Record the resolved base classes. Later calls are ignored.
    pub fn set_bases(&self, bases: Vec<ClassType>) {
        let _ = self.bases.set(bases);
    }

    /// Declared base classes, empty until registration resolves them.
    pub fn bases(&self) -> &[ClassType] {
        self.bases.get().map_or(&[], Vec::as_slice)
    }

    /// Record the member table. Later calls are ignored.
    pub fn set_members(&self, members: Vec<Member>) {
        let _ = self.members.set(members);
    }

    pub fn members(&self) -> &[Member] {
        self.members.get().map_or(&[], Vec::as_slice)
    }

    /// Find a member declared directly on this class.
    pub fn own_member(&self, name: Name) -> Option<&Member> {
        self.members().iter().find(|m| m.name == name)
    }

    /// The linearized ancestor order, computed on first need and cached.
    pub fn mro(self: &Arc<Self>) -> &Mro {
        self.mro.get_or_init(|| mro::linearize(self))
    }

    /// Whether the MRO has been computed yet (used by registration to
    /// force-and-diagnose exactly once).
    pub fn mro_is_cached(&self) -> bool {
        self.mro.get().is_some()
    }
}

/// A class type: shared details plus per-instantiation arguments.
#[derive(Clone, Debug)]
pub struct ClassType {
    pub details: Arc<ClassDetails>,
    /// Concrete type arguments; `None` when unspecialized.
    pub args: Option<Arc<[Type]>>,
    /// `true` for instances of the class, `false` for the class object.
    pub instance: bool,
}

impl PartialEq for ClassType {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.details, &other.details)
            && self.instance == other.instance
            && match (self.args.as_deref(), other.args.as_deref()) {
                (None, None) => true,
                (Some(a), Some(b)) => a == b,
                _ => false,
            }
    }
}

impl ClassType {
    /// The class-object form of a declaration.
    pub fn reference(details: Arc<ClassDetails>) -> Self {
        ClassType {
            details,
            args: None,
            instance: false,
        }
    }

    pub fn name(&self) -> Name {
        self.details.name
    }

    pub fn is_instance(&self) -> bool {
        self.instance
    }

    /// Same declaration, ignoring arguments and instance-ness.
    pub fn same_class(&self, other: &ClassType) -> bool {
        Arc::ptr_eq(&self.details, &other.details)
    }

    /// Instance form with the same arguments.
    #[must_use]
    pub fn to_instance(&self) -> ClassType {
        ClassType {
            details: self.details.clone(),
            args: self.args.clone(),
            instance: true,
        }
    }

    /// Class-object form with the same arguments.
    #[must_use]
    pub fn to_class_object(&self) -> ClassType {
        ClassType {
            details: self.details.clone(),
            args: self.args.clone(),
            instance: false,
        }
    }

    /// Specialized form with concrete arguments.
    #[must_use]
    pub fn with_args(&self, args: Vec<Type>) -> ClassType {
        ClassType {
            details: self.details.clone(),
            args: Some(args.into()),
            instance: self.instance,
        }
    }

    /// The i-th type argument, `Unknown` when unspecialized or out of range.
    pub fn arg(&self, i: usize) -> Type {
        self.args
            .as_deref()
            .and_then(|args| args.get(i).cloned())
            .unwrap_or(Type::Unknown)
    }

    pub fn has_flag(&self, flag: ClassFlags) -> bool {
        self.details.flags.contains(flag)
    }
}

// ============================================================================
// Functions
// ============================================================================

/// One declared parameter in a signature.
#[derive(Clone, PartialEq, Debug)]
pub struct FnParam {
    pub name: Name,
    pub kind: ParamKind,
    pub ty: Type,
    pub has_default: bool,
}

impl FnParam {
    pub fn positional(name: Name, ty: Type) -> Self {
        FnParam {
            name,
            kind: ParamKind::Positional,
            ty,
            has_default: false,
        }
    }
}

/// A function or method signature.
#[derive(Clone, PartialEq, Debug)]
pub struct FunctionType {
    /// Declared name; `Name::EMPTY` for lambdas.
    pub name: Name,
    pub params: Vec<FnParam>,
    pub ret: Type,
    pub flags: FunctionFlags,
    /// Receiver type once bound through member access.
    pub bound_self: Option<Type>,
}

impl FunctionType {
    pub fn new(name: Name, params: Vec<FnParam>, ret: Type) -> Self {
        FunctionType {
            name,
            params,
            ret,
            flags: FunctionFlags::empty(),
            bound_self: None,
        }
    }

    /// Bind the receiver: drops the implicit first parameter (unless the
    /// function is a static method) and records the owner.
    #[must_use]
    pub fn bind_to(&self, receiver: Type) -> FunctionType {
        let mut bound = self.clone();
        if !self.flags.contains(FunctionFlags::STATIC_METHOD) && !bound.params.is_empty() {
            bound.params.remove(0);
        }
        bound.bound_self = Some(receiver);
        bound
    }

    /// Minimum number of positional arguments the signature requires.
    pub fn required_positional(&self) -> usize {
        self.params
            .iter()
            .filter(|p| p.kind == ParamKind::Positional && !p.has_default)
            .count()
    }

    /// Maximum number of positional arguments, `None` with `*args`.
    pub fn max_positional(&self) -> Option<usize> {
        if self.params.iter().any(|p| p.kind == ParamKind::VarArgs) {
            None
        } else {
            Some(
                self.params
                    .iter()
                    .filter(|p| p.kind == ParamKind::Positional)
                    .count(),
            )
        }
    }

    pub(crate) fn substituted(&self, map: &TypeVarMap) -> FunctionType {
        FunctionType {
            name: self.name,
            params: self
                .params
                .iter()
                .map(|p| FnParam {
                    name: p.name,
                    kind: p.kind,
                    ty: substitute(&p.ty, map),
                    has_default: p.has_default,
                })
                .collect(),
            ret: substitute(&self.ret, map),
            flags: self.flags,
            bound_self: self.bound_self.clone(),
        }
    }
}

// ============================================================================
// Modules
// ============================================================================

/// Namespace type for an imported module.
#[derive(Clone, PartialEq, Debug)]
pub struct ModuleType {
    pub name: Name,
    /// Exported symbol types.
    ///
    /// # Invariant
    /// Sorted by `Name` ascending, enabling O(log n) lookup.
    pub exports: Vec<(Name, Type)>,
}

impl ModuleType {
    pub fn new(name: Name, mut exports: Vec<(Name, Type)>) -> Self {
        exports.sort_by_key(|(n, _)| *n);
        ModuleType { name, exports }
    }

    pub fn get(&self, name: Name) -> Option<&Type> {
        self.exports
            .binary_search_by_key(&name, |(n, _)| *n)
            .ok()
            .map(|i| &self.exports[i].1)
    }
}

// ============================================================================
// Display
// ============================================================================

/// Renders a type with names resolved through the interner.
pub struct TypeDisplay<'a> {
    ty: &'a Type,
    interner: &'a StringInterner,
}

impl fmt::Display for TypeDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_type(f, self.ty, self.interner)
    }
}

fn write_type(f: &mut fmt::Formatter<'_>, ty: &Type, interner: &StringInterner) -> fmt::Result {
    match ty {
        Type::Unbound => write!(f, "Unbound"),
        Type::Unknown => write!(f, "Unknown"),
        Type::Never => write!(f, "Never"),
        Type::Any => write!(f, "Any"),
        Type::Module(m) => write!(f, "module '{}'", interner.resolve(m.name)),
        Type::TypeVar(v) => write!(f, "{}", interner.resolve(v.name)),
        Type::Class(c) => write_class(f, c, interner),
        Type::Function(func) => write_function(f, func, interner),
        Type::Overloaded(sigs) => {
            write!(f, "Overload[")?;
            for (i, sig) in sigs.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write_function(f, sig, interner)?;
            }
            write!(f, "]")
        }
        Type::Union(members) => {
            for (i, member) in members.iter().enumerate() {
                if i > 0 {
                    write!(f, " | ")?;
                }
                write_type(f, member, interner)?;
            }
            Ok(())
        }
        Type::Literal(lit) => match &lit.value {
            LiteralValue::Int(v) => write!(f, "Literal[{v}]"),
            LiteralValue::Str(s) => write!(f, "Literal[\"{}\"]", interner.resolve(*s)),
            LiteralValue::Bool(true) => write!(f, "Literal[True]"),
            LiteralValue::Bool(false) => write!(f, "Literal[False]"),
            LiteralValue::Float(bits) => write!(f, "Literal[{}]", f64::from_bits(*bits)),
            LiteralValue::Complex { real, imag } => write!(
                f,
                "Literal[{}+{}j]",
                f64::from_bits(*real),
                f64::from_bits(*imag)
            ),
        },
    }
}

fn write_class(f: &mut fmt::Formatter<'_>, c: &ClassType, interner: &StringInterner) -> fmt::Result {
    if !c.instance {
        write!(f, "type[")?;
    }
    write!(f, "{}", interner.resolve(c.name()))?;
    if let Some(args) = c.args.as_deref() {
        write!(f, "[")?;
        for (i, arg) in args.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write_type(f, arg, interner)?;
        }
        write!(f, "]")?;
    }
    if !c.instance {
        write!(f, "]")?;
    }
    Ok(())
}

fn write_function(
    f: &mut fmt::Formatter<'_>,
    func: &FunctionType,
    interner: &StringInterner,
) -> fmt::Result {
    write!(f, "(")?;
    for (i, p) in func.params.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        match p.kind {
            ParamKind::VarArgs => write!(f, "*")?,
            ParamKind::KwArgs => write!(f, "**")?,
            _ => {}
        }
        write!(f, "{}: ", interner.resolve(p.name))?;
        write_type(f, &p.ty, interner)?;
    }
    write!(f, ") -> ")?;
    write_type(f, &func.ret, interner)
}
