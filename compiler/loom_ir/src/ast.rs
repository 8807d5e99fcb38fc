//! Flat AST types using arena allocation.
//!
//! - No `Box<Expr>`: expressions reference each other through `ExprId(u32)`
//!   indices into the [`AstArena`].
//! - Every scope-introducing declaration carries a [`ScopeId`] whose symbol
//!   table maps names to declarations.
//! - Type annotations are ordinary expressions (`list[int]` is an `Index`
//!   whose object is the `list` identifier); the checker interprets them.
//!
//! The arena is produced upstream (parser + binder) and consumed read-only
//! by the type checker; inferred types live in an external table keyed by
//! `ExprId`, never on the nodes themselves.

use rustc_hash::FxHashMap;

use crate::{DeclId, ExprId, Name, ScopeId, Span, StmtId};

// ============================================================================
// Operators
// ============================================================================

/// Binary operators, including comparisons.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    FloorDiv,
    Mod,
    Pow,
    MatMul,
    LShift,
    RShift,
    BitAnd,
    BitOr,
    BitXor,
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    In,
    NotIn,
    Is,
    IsNot,
}

impl BinaryOp {
    /// The special method name the left operand must provide, e.g. `__add__`.
    pub fn dunder(self) -> Option<&'static str> {
        match self {
            BinaryOp::Add => Some("__add__"),
            BinaryOp::Sub => Some("__sub__"),
            BinaryOp::Mul => Some("__mul__"),
            BinaryOp::Div => Some("__truediv__"),
            BinaryOp::FloorDiv => Some("__floordiv__"),
            BinaryOp::Mod => Some("__mod__"),
            BinaryOp::Pow => Some("__pow__"),
            BinaryOp::MatMul => Some("__matmul__"),
            BinaryOp::LShift => Some("__lshift__"),
            BinaryOp::RShift => Some("__rshift__"),
            BinaryOp::BitAnd => Some("__and__"),
            BinaryOp::BitOr => Some("__or__"),
            BinaryOp::BitXor => Some("__xor__"),
            BinaryOp::Eq => Some("__eq__"),
            BinaryOp::NotEq => Some("__ne__"),
            BinaryOp::Lt => Some("__lt__"),
            BinaryOp::LtEq => Some("__le__"),
            BinaryOp::Gt => Some("__gt__"),
            BinaryOp::GtEq => Some("__ge__"),
            // Membership and identity tests have fixed result types.
            BinaryOp::In | BinaryOp::NotIn | BinaryOp::Is | BinaryOp::IsNot => None,
        }
    }

    /// The reflected special method tried on the right operand, e.g. `__radd__`.
    pub fn reflected_dunder(self) -> Option<&'static str> {
        match self {
            BinaryOp::Add => Some("__radd__"),
            BinaryOp::Sub => Some("__rsub__"),
            BinaryOp::Mul => Some("__rmul__"),
            BinaryOp::Div => Some("__rtruediv__"),
            BinaryOp::FloorDiv => Some("__rfloordiv__"),
            BinaryOp::Mod => Some("__rmod__"),
            BinaryOp::Pow => Some("__rpow__"),
            BinaryOp::MatMul => Some("__rmatmul__"),
            BinaryOp::LShift => Some("__rlshift__"),
            BinaryOp::RShift => Some("__rrshift__"),
            BinaryOp::BitAnd => Some("__rand__"),
            BinaryOp::BitOr => Some("__ror__"),
            BinaryOp::BitXor => Some("__rxor__"),
            _ => None,
        }
    }

    /// Whether this operator always produces a boolean result.
    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            BinaryOp::Eq
                | BinaryOp::NotEq
                | BinaryOp::Lt
                | BinaryOp::LtEq
                | BinaryOp::Gt
                | BinaryOp::GtEq
                | BinaryOp::In
                | BinaryOp::NotIn
                | BinaryOp::Is
                | BinaryOp::IsNot
        )
    }

    /// Display symbol for error messages.
    pub fn as_symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::FloorDiv => "//",
            BinaryOp::Mod => "%",
            BinaryOp::Pow => "**",
            BinaryOp::MatMul => "@",
            BinaryOp::LShift => "<<",
            BinaryOp::RShift => ">>",
            BinaryOp::BitAnd => "&",
            BinaryOp::BitOr => "|",
            BinaryOp::BitXor => "^",
            BinaryOp::Eq => "==",
            BinaryOp::NotEq => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::LtEq => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::GtEq => ">=",
            BinaryOp::In => "in",
            BinaryOp::NotIn => "not in",
            BinaryOp::Is => "is",
            BinaryOp::IsNot => "is not",
        }
    }
}

/// Unary operators.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum UnaryOp {
    Neg,
    Pos,
    Invert,
    Not,
}

impl UnaryOp {
    /// The special method name for this operator, if type-driven.
    pub fn dunder(self) -> Option<&'static str> {
        match self {
            UnaryOp::Neg => Some("__neg__"),
            UnaryOp::Pos => Some("__pos__"),
            UnaryOp::Invert => Some("__invert__"),
            // `not` always produces bool.
            UnaryOp::Not => None,
        }
    }

    /// Display symbol for error messages.
    pub fn as_symbol(self) -> &'static str {
        match self {
            UnaryOp::Neg => "-",
            UnaryOp::Pos => "+",
            UnaryOp::Invert => "~",
            UnaryOp::Not => "not",
        }
    }
}

/// Short-circuit boolean operators.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum BoolOp {
    And,
    Or,
}

// ============================================================================
// Expressions
// ============================================================================

/// An expression node with its source span.
#[derive(Clone, PartialEq, Debug)]
pub struct Expr {
    pub kind: ExprKind,
    pub span: Span,
}

/// One argument at a call site.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub struct CallArg {
    /// Keyword name, or `None` for a positional argument.
    pub name: Option<Name>,
    pub value: ExprId,
}

/// Comprehension flavor.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum ComprehensionKind {
    List,
    Set,
    Dict,
    Generator,
}

/// Expression shapes.
///
/// This enum is closed: the checker matches it exhaustively, so adding a
/// variant is a compile-time obligation in every dispatch site.
#[derive(Clone, PartialEq, Debug)]
pub enum ExprKind {
    /// Integer literal.
    Int(i64),
    /// Float literal.
    Float(f64),
    /// Imaginary literal (`2j`); the value is the imaginary component.
    Complex(f64),
    /// String literal (content interned).
    Str(Name),
    /// Boolean literal.
    Bool(bool),
    /// The `None` literal.
    NoneLit,

    /// List literal `[a, b]`.
    List(Vec<ExprId>),
    /// Set literal `{a, b}`.
    Set(Vec<ExprId>),
    /// Tuple literal `(a, b)`.
    Tuple(Vec<ExprId>),
    /// Dict literal `{k: v}`.
    Dict(Vec<(ExprId, ExprId)>),

    /// Comprehension over a single generator clause.
    ///
    /// `key` is present only for dict comprehensions. The loop variable is
    /// bound in the synthetic scope `scope`.
    Comprehension {
        kind: ComprehensionKind,
        binding: Name,
        iter: ExprId,
        condition: Option<ExprId>,
        key: Option<ExprId>,
        element: ExprId,
        scope: ScopeId,
    },

    /// Anonymous function.
    Lambda {
        params: Vec<Param>,
        body: ExprId,
        scope: ScopeId,
    },

    /// Conditional expression `a if cond else b`.
    Ternary {
        condition: ExprId,
        then: ExprId,
        otherwise: ExprId,
    },

    /// Short-circuit boolean operation.
    BoolOp {
        op: BoolOp,
        left: ExprId,
        right: ExprId,
    },

    /// Binary operation (arithmetic, bitwise, comparison).
    Binary {
        op: BinaryOp,
        left: ExprId,
        right: ExprId,
    },

    /// Unary operation.
    Unary { op: UnaryOp, operand: ExprId },

    /// Attribute access `object.member`.
    Member { object: ExprId, member: Name },

    /// Subscript `object[index]`.
    Index { object: ExprId, index: ExprId },

    /// Slice `object[lower:upper:step]`.
    Slice {
        object: ExprId,
        lower: Option<ExprId>,
        upper: Option<ExprId>,
        step: Option<ExprId>,
    },

    /// Call `callee(args...)`.
    Call {
        callee: ExprId,
        args: Vec<CallArg>,
    },

    /// Identifier reference, resolved lexically through the scope chain.
    Ident(Name),

    /// Implicit-instance reference (`self`, or the walker's `here`/`visitor`).
    SelfRef,
}

// ============================================================================
// Parameters
// ============================================================================

/// How a parameter binds arguments.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum ParamKind {
    /// Ordinary positional-or-keyword parameter.
    Positional,
    /// Keyword-only parameter (declared after `*`).
    KeywordOnly,
    /// Variadic positional (`*args`).
    VarArgs,
    /// Variadic keyword (`**kwargs`).
    KwArgs,
}

/// A declared parameter.
#[derive(Clone, PartialEq, Debug)]
pub struct Param {
    pub name: Name,
    pub kind: ParamKind,
    /// Declared type annotation expression, if any.
    pub annotation: Option<ExprId>,
    /// Default value expression, if any.
    pub default: Option<ExprId>,
    pub span: Span,
}

impl Param {
    /// A plain positional parameter with no annotation or default.
    pub fn positional(name: Name, span: Span) -> Self {
        Param {
            name,
            kind: ParamKind::Positional,
            annotation: None,
            default: None,
            span,
        }
    }
}

// ============================================================================
// Statements
// ============================================================================

/// A statement node with its source span.
#[derive(Clone, PartialEq, Debug)]
pub struct Stmt {
    pub kind: StmtKind,
    pub span: Span,
}

/// Statement shapes.
#[derive(Clone, PartialEq, Debug)]
pub enum StmtKind {
    /// Bare expression statement.
    Expr(ExprId),

    /// Assignment `target = value` (target is an identifier, member, or index).
    Assign { target: ExprId, value: ExprId },

    /// Annotated assignment `target: annotation = value`.
    AnnAssign {
        target: ExprId,
        annotation: ExprId,
        value: Option<ExprId>,
    },

    /// `return` with optional value.
    Return { value: Option<ExprId> },

    /// `if`/`elif`/`else` chain (elif encoded as nested `If` in `else_body`).
    If {
        condition: ExprId,
        then_body: Vec<StmtId>,
        else_body: Vec<StmtId>,
    },

    /// `while` loop.
    While { condition: ExprId, body: Vec<StmtId> },

    /// `for binding in iter` loop.
    For {
        binding: Name,
        iter: ExprId,
        body: Vec<StmtId>,
    },

    /// `with context as binding` block.
    With {
        context: ExprId,
        binding: Option<Name>,
        body: Vec<StmtId>,
    },

    /// Nested function declaration.
    FunctionDef(DeclId),

    /// Nested class/archetype declaration.
    ClassDef(DeclId),

    /// `pass`, `break`, `continue` (no typing effect).
    Pass,
}

// ============================================================================
// Declarations
// ============================================================================

/// Declared variance of a type parameter.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Default)]
pub enum Variance {
    #[default]
    Invariant,
    Covariant,
    Contravariant,
}

/// Archetype of a class-like declaration.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Default)]
pub enum ArchetypeKind {
    /// Plain class.
    #[default]
    Class,
    /// Graph node record.
    Node,
    /// Graph edge record.
    Edge,
    /// Graph-walking agent.
    Walker,
}

impl ArchetypeKind {
    /// Node/edge/walker archetypes get data-class treatment (synthesized
    /// field-order constructors) unless they declare their own.
    pub fn is_record(self) -> bool {
        !matches!(self, ArchetypeKind::Class)
    }
}

/// Recognized decorators on a method/function declaration.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum Decorator {
    Property,
    ClassMethod,
    StaticMethod,
    /// Marks one signature of an overload group. All `@overload` functions
    /// with the same name in one scope form a single overloaded symbol.
    Overload,
}

/// A function or method declaration.
#[derive(Clone, PartialEq, Debug)]
pub struct FunctionDecl {
    pub params: Vec<Param>,
    pub return_annotation: Option<ExprId>,
    pub body: Vec<StmtId>,
    pub decorators: Vec<Decorator>,
    /// Scope holding parameter and local bindings.
    pub scope: ScopeId,
}

impl FunctionDecl {
    /// Whether the declaration carries a given decorator.
    pub fn has_decorator(&self, d: Decorator) -> bool {
        self.decorators.contains(&d)
    }
}

/// An attribute declaration inside a class body.
#[derive(Clone, PartialEq, Debug)]
pub struct FieldDecl {
    pub name: Name,
    pub annotation: Option<ExprId>,
    pub default: Option<ExprId>,
    pub span: Span,
}

/// A class or graph-archetype declaration.
#[derive(Clone, PartialEq, Debug)]
pub struct ClassDecl {
    pub archetype: ArchetypeKind,
    /// Base-class expressions in declaration order.
    pub bases: Vec<ExprId>,
    /// Type parameter declarations (`DeclKind::TypeParam`).
    pub type_params: Vec<DeclId>,
    /// Attribute declarations in declaration order.
    pub fields: Vec<FieldDecl>,
    /// Method declarations (`DeclKind::Function`) in declaration order.
    pub methods: Vec<DeclId>,
    /// For `edge` archetypes: declared endpoint node classes.
    pub endpoints: Option<(ExprId, ExprId)>,
    /// Scope holding member bindings.
    pub scope: ScopeId,
}

/// What a declaration declares.
#[derive(Clone, PartialEq, Debug)]
pub enum DeclKind {
    /// Module-level or local variable.
    Variable {
        annotation: Option<ExprId>,
        value: Option<ExprId>,
    },
    /// Function or method.
    Function(FunctionDecl),
    /// Class or archetype.
    Class(ClassDecl),
    /// Generic type parameter.
    TypeParam {
        variance: Variance,
        bound: Option<ExprId>,
    },
    /// Imported module namespace; `symbols` is the exported symbol table.
    Module { symbols: ScopeId },
}

/// A named declaration.
#[derive(Clone, PartialEq, Debug)]
pub struct Declaration {
    pub name: Name,
    pub kind: DeclKind,
    pub span: Span,
}

// ============================================================================
// Scopes & symbol tables
// ============================================================================

/// Name-to-declaration symbol table for one scope.
#[derive(Clone, PartialEq, Debug, Default)]
pub struct SymbolTable {
    entries: FxHashMap<Name, DeclId>,
    /// Insertion order, for deterministic iteration.
    order: Vec<Name>,
}

impl SymbolTable {
    /// Insert a binding; the last insertion for a name wins.
    pub fn insert(&mut self, name: Name, decl: DeclId) {
        if self.entries.insert(name, decl).is_none() {
            self.order.push(name);
        }
    }

    /// Look up a name in this table only (no parent-chain walk).
    pub fn get(&self, name: Name) -> Option<DeclId> {
        self.entries.get(&name).copied()
    }

    /// Iterate bindings in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (Name, DeclId)> + '_ {
        self.order
            .iter()
            .filter_map(|n| self.entries.get(n).map(|d| (*n, *d)))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// A lexical scope: a symbol table plus a parent link.
#[derive(Clone, PartialEq, Debug)]
pub struct Scope {
    pub parent: Option<ScopeId>,
    pub symbols: SymbolTable,
}

// ============================================================================
// Arena & module
// ============================================================================

/// Flat storage for all AST nodes of one module.
#[derive(Clone, PartialEq, Debug, Default)]
pub struct AstArena {
    exprs: Vec<Expr>,
    stmts: Vec<Stmt>,
    decls: Vec<Declaration>,
    scopes: Vec<Scope>,
}

impl AstArena {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate an expression, returning its id.
    pub fn alloc_expr(&mut self, kind: ExprKind, span: Span) -> ExprId {
        let id = ExprId::from_raw(self.exprs.len() as u32);
        self.exprs.push(Expr { kind, span });
        id
    }

    /// Allocate a statement, returning its id.
    pub fn alloc_stmt(&mut self, kind: StmtKind, span: Span) -> StmtId {
        let id = StmtId::from_raw(self.stmts.len() as u32);
        self.stmts.push(Stmt { kind, span });
        id
    }

    /// Allocate a declaration, returning its id.
    pub fn alloc_decl(&mut self, decl: Declaration) -> DeclId {
        let id = DeclId::from_raw(self.decls.len() as u32);
        self.decls.push(decl);
        id
    }

    /// Allocate a scope, returning its id.
    pub fn alloc_scope(&mut self, parent: Option<ScopeId>) -> ScopeId {
        let id = ScopeId::from_raw(self.scopes.len() as u32);
        self.scopes.push(Scope {
            parent,
            symbols: SymbolTable::default(),
        });
        id
    }

    pub fn expr(&self, id: ExprId) -> &Expr {
        &self.exprs[id.index()]
    }

    pub fn stmt(&self, id: StmtId) -> &Stmt {
        &self.stmts[id.index()]
    }

    pub fn decl(&self, id: DeclId) -> &Declaration {
        &self.decls[id.index()]
    }

    pub fn scope(&self, id: ScopeId) -> &Scope {
        &self.scopes[id.index()]
    }

    /// Mutable access to a scope (used while binding symbols upstream).
    pub fn scope_mut(&mut self, id: ScopeId) -> &mut Scope {
        &mut self.scopes[id.index()]
    }

    /// Mutable access to a declaration (used while binding upstream).
    pub fn decl_mut(&mut self, id: DeclId) -> &mut Declaration {
        &mut self.decls[id.index()]
    }

    /// Number of allocated expressions; sizes the checker's memo table.
    pub fn expr_count(&self) -> usize {
        self.exprs.len()
    }

    /// Resolve a name lexically, walking the parent chain from `scope`.
    pub fn resolve_name(&self, scope: ScopeId, name: Name) -> Option<DeclId> {
        let mut current = Some(scope);
        while let Some(sid) = current {
            let s = self.scope(sid);
            if let Some(decl) = s.symbols.get(name) {
                return Some(decl);
            }
            current = s.parent;
        }
        None
    }
}

/// One parsed, bound module: the checker's unit of work.
#[derive(Clone, PartialEq, Debug)]
pub struct Module {
    pub name: Name,
    /// Top-level statements in source order.
    pub body: Vec<StmtId>,
    /// Module-level scope.
    pub scope: ScopeId,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arena_ids_are_sequential() {
        let mut arena = AstArena::new();
        let a = arena.alloc_expr(ExprKind::Int(1), Span::DUMMY);
        let b = arena.alloc_expr(ExprKind::Int(2), Span::DUMMY);
        assert_eq!(a.raw(), 0);
        assert_eq!(b.raw(), 1);
        assert_eq!(arena.expr_count(), 2);
    }

    #[test]
    fn scope_chain_resolution() {
        let mut arena = AstArena::new();
        let outer = arena.alloc_scope(None);
        let inner = arena.alloc_scope(Some(outer));
        let name = Name::from_raw(7);
        let decl = arena.alloc_decl(Declaration {
            name,
            kind: DeclKind::Variable {
                annotation: None,
                value: None,
            },
            span: Span::DUMMY,
        });
        arena.scope_mut(outer).symbols.insert(name, decl);

        assert_eq!(arena.resolve_name(inner, name), Some(decl));
        assert_eq!(arena.resolve_name(inner, Name::from_raw(99)), None);
    }

    #[test]
    fn shadowing_resolves_to_innermost() {
        let mut arena = AstArena::new();
        let outer = arena.alloc_scope(None);
        let inner = arena.alloc_scope(Some(outer));
        let name = Name::from_raw(3);
        let outer_decl = arena.alloc_decl(Declaration {
            name,
            kind: DeclKind::Variable {
                annotation: None,
                value: None,
            },
            span: Span::DUMMY,
        });
        let inner_decl = arena.alloc_decl(Declaration {
            name,
            kind: DeclKind::Variable {
                annotation: None,
                value: None,
            },
            span: Span::DUMMY,
        });
        arena.scope_mut(outer).symbols.insert(name, outer_decl);
        arena.scope_mut(inner).symbols.insert(name, inner_decl);

        assert_eq!(arena.resolve_name(inner, name), Some(inner_decl));
        assert_eq!(arena.resolve_name(outer, name), Some(outer_decl));
    }

    #[test]
    fn symbol_table_iterates_in_insertion_order() {
        let mut table = SymbolTable::default();
        let d0 = DeclId::from_raw(0);
        let d1 = DeclId::from_raw(1);
        table.insert(Name::from_raw(10), d0);
        table.insert(Name::from_raw(5), d1);
        let names: Vec<_> = table.iter().map(|(n, _)| n.raw()).collect();
        assert_eq!(names, vec![10, 5]);
    }
}
