//! Relationship queries between types: ancestor linearization, member
//! lookup with access transforms, and assignability.

pub mod assign;
pub mod members;
pub mod mro;

pub use assign::assign_type;
pub use members::lookup_member;
pub use mro::Mro;
