use std::fmt;

/// Error codes for compiler diagnostics.
///
/// Format: E#### where the first digit indicates the phase:
/// - E2xxx: Type errors
/// - E9xxx: Internal errors
///
/// Lexer/parser phases live upstream and own their own code blocks; only
/// the type phase emits codes from this crate.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum ErrorCode {
    // Type Errors (E2xxx)
    /// Type mismatch (assignment, argument, return, or override)
    E2001,
    /// Wrong number of call arguments
    E2002,
    /// Unknown keyword argument
    E2003,
    /// Parameter bound more than once at a call site
    E2004,
    /// No overload matches the call
    E2005,
    /// Inconsistent method resolution order
    E2006,
    /// Member not found on the receiver type
    E2007,
    /// Name not defined in any enclosing scope
    E2008,
    /// Value is not callable
    E2009,
    /// Type does not support the operator
    E2010,
    /// Type is not iterable
    E2011,
    /// Type is not a context manager
    E2012,
    /// Base-class expression does not name a class
    E2013,
    /// Edge endpoint is not a node archetype
    E2014,
    /// Value is not subscriptable
    E2015,
    /// Wrong number of type arguments for a generic class
    E2016,

    // Internal Errors (E9xxx)
    /// Internal invariant violated (checker bug, not user error)
    E9001,
}

impl ErrorCode {
    /// Short description for documentation indexes.
    pub fn description(self) -> &'static str {
        match self {
            ErrorCode::E2001 => "type mismatch",
            ErrorCode::E2002 => "wrong number of arguments",
            ErrorCode::E2003 => "unknown keyword argument",
            ErrorCode::E2004 => "duplicate argument binding",
            ErrorCode::E2005 => "no matching overload",
            ErrorCode::E2006 => "inconsistent method resolution order",
            ErrorCode::E2007 => "unknown member",
            ErrorCode::E2008 => "undefined name",
            ErrorCode::E2009 => "not callable",
            ErrorCode::E2010 => "unsupported operator",
            ErrorCode::E2011 => "not iterable",
            ErrorCode::E2012 => "not a context manager",
            ErrorCode::E2013 => "invalid base class",
            ErrorCode::E2014 => "invalid edge endpoint",
            ErrorCode::E2015 => "not subscriptable",
            ErrorCode::E2016 => "wrong number of type arguments",
            ErrorCode::E9001 => "internal error",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Debug renders the variant name, which is the code itself.
        write!(f, "{self:?}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_render_as_identifiers() {
        assert_eq!(ErrorCode::E2001.to_string(), "E2001");
        assert_eq!(ErrorCode::E9001.to_string(), "E9001");
    }

    #[test]
    fn every_code_has_a_description() {
        assert!(!ErrorCode::E2005.description().is_empty());
    }
}
