//! Checker-internal error values.
//!
//! Errors are accumulated, never raised: the pass always runs to
//! completion. Type names are rendered to strings at construction so the
//! error value stays independent of the interner's lifetime.

use loom_diagnostic::{Diagnostic, ErrorCode};
use loom_ir::Span;
use thiserror::Error;

/// One type-check failure, before conversion to a diagnostic.
#[derive(Clone, PartialEq, Debug)]
pub struct TypeCheckError {
    pub kind: TypeCheckErrorKind,
    pub span: Span,
}

#[derive(Clone, PartialEq, Debug, Error)]
pub enum TypeCheckErrorKind {
    #[error("type mismatch: expected `{expected}`, found `{found}`")]
    TypeMismatch { expected: String, found: String },

    #[error("`{name}` takes {expected} argument(s), {found} given")]
    ArgumentCount {
        name: String,
        expected: String,
        found: usize,
    },

    #[error("unknown keyword argument `{keyword}`")]
    UnknownKeyword { keyword: String },

    #[error("argument `{name}` bound more than once")]
    DuplicateBinding { name: String },

    #[error("no overload of `{name}` matches these arguments")]
    NoMatchingOverload { name: String },

    #[error("cannot create a consistent method resolution order for `{class}`")]
    InconsistentMro { class: String },

    #[error("`{ty}` has no member `{member}`")]
    UnknownMember { ty: String, member: String },

    #[error("undefined name `{name}`")]
    UndefinedName { name: String },

    #[error("`{ty}` is not callable")]
    NotCallable { ty: String },

    #[error("operator `{op}` is not supported between `{left}` and `{right}`")]
    UnsupportedBinaryOperator {
        op: String,
        left: String,
        right: String,
    },

    #[error("operator `{op}` is not supported on `{operand}`")]
    UnsupportedUnaryOperator { op: String, operand: String },

    #[error("`{ty}` is not iterable")]
    NotIterable { ty: String },

    #[error("`{ty}` does not support the context manager protocol")]
    NotContextManager { ty: String },

    #[error("invalid base class `{ty}`")]
    InvalidBase { ty: String },

    #[error("edge endpoint must be a node class, found `{ty}`")]
    InvalidEdgeEndpoint { ty: String },

    #[error("`{ty}` is not subscriptable")]
    NotSubscriptable { ty: String },

    #[error("`{name}` expects {expected} type argument(s), {found} given")]
    TypeArgCount {
        name: String,
        expected: usize,
        found: usize,
    },

    #[error("override of `{name}` is incompatible with the inherited signature")]
    IncompatibleOverride { name: String },
}

impl TypeCheckError {
    pub fn new(kind: TypeCheckErrorKind, span: Span) -> Self {
        TypeCheckError { kind, span }
    }

    pub fn type_mismatch(expected: String, found: String, span: Span) -> Self {
        Self::new(TypeCheckErrorKind::TypeMismatch { expected, found }, span)
    }

    pub fn code(&self) -> ErrorCode {
        match &self.kind {
            TypeCheckErrorKind::TypeMismatch { .. }
            | TypeCheckErrorKind::IncompatibleOverride { .. } => ErrorCode::E2001,
            TypeCheckErrorKind::ArgumentCount { .. } => ErrorCode::E2002,
            TypeCheckErrorKind::UnknownKeyword { .. } => ErrorCode::E2003,
            TypeCheckErrorKind::DuplicateBinding { .. } => ErrorCode::E2004,
            TypeCheckErrorKind::NoMatchingOverload { .. } => ErrorCode::E2005,
            TypeCheckErrorKind::InconsistentMro { .. } => ErrorCode::E2006,
            TypeCheckErrorKind::UnknownMember { .. } => ErrorCode::E2007,
            TypeCheckErrorKind::UndefinedName { .. } => ErrorCode::E2008,
            TypeCheckErrorKind::NotCallable { .. } => ErrorCode::E2009,
            TypeCheckErrorKind::UnsupportedBinaryOperator { .. }
            | TypeCheckErrorKind::UnsupportedUnaryOperator { .. } => ErrorCode::E2010,
            TypeCheckErrorKind::NotIterable { .. } => ErrorCode::E2011,
            TypeCheckErrorKind::NotContextManager { .. } => ErrorCode::E2012,
            TypeCheckErrorKind::InvalidBase { .. } => ErrorCode::E2013,
            TypeCheckErrorKind::InvalidEdgeEndpoint { .. } => ErrorCode::E2014,
            TypeCheckErrorKind::NotSubscriptable { .. } => ErrorCode::E2015,
            TypeCheckErrorKind::TypeArgCount { .. } => ErrorCode::E2016,
        }
    }

    pub fn into_diagnostic(self) -> Diagnostic {
        let code = self.code();
        Diagnostic::error(code, self.kind.to_string(), self.span)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use loom_diagnostic::Severity;
    use pretty_assertions::assert_eq;

    #[test]
    fn renders_message_and_code() {
        let err = TypeCheckError::type_mismatch(
            "int".to_string(),
            "float".to_string(),
            Span::new(4, 9),
        );
        assert_eq!(err.code(), ErrorCode::E2001);
        let diag = err.into_diagnostic();
        assert_eq!(diag.severity, Severity::Error);
        assert_eq!(diag.message, "type mismatch: expected `int`, found `float`");
        assert_eq!(diag.span, Span::new(4, 9));
    }
}
