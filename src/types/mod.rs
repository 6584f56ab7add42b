//! Types of OxC Lang

mod type_system;

pub use type_system::{Builtin, Type};
