//! IR input contract for the Loom type checker.
//!
//! This crate defines everything the checker consumes: interned names,
//! source spans, the flat arena AST with per-scope symbol tables, and the
//! [`ModuleBuilder`] facade producers use to assemble bound modules.
//!
//! # Design
//!
//! - Flat arenas, no `Box<Expr>`: nodes reference each other through
//!   `u32` id newtypes. A node's id is its stable identity; downstream
//!   tables (inferred types, diagnostics) key off it so the AST itself
//!   stays immutable and shareable across checker runs.
//! - Symbol tables live on scopes; name resolution walks the parent chain.
//! - Interned `Name`s make identifier comparison O(1).

mod ast;
mod builder;
mod ids;
mod interner;
mod name;
mod span;

pub use ast::{
    ArchetypeKind, AstArena, BinaryOp, BoolOp, CallArg, ClassDecl, ComprehensionKind, DeclKind,
    Declaration, Decorator, Expr, ExprKind, FieldDecl, FunctionDecl, Module, Param, ParamKind,
    Scope, Stmt, StmtKind, SymbolTable, UnaryOp, Variance,
};
pub use builder::{ClassParts, ModuleBuilder};
pub use ids::{DeclId, ExprId, ScopeId, StmtId};
pub use interner::StringInterner;
pub use name::Name;
pub use span::Span;
