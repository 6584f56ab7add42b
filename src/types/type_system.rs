//! Type System for OxC Lang
//!
//! Five primitives, `vacuum` for functions without a result, and structure
//! ("gust") types by name. The conversion tables are fixed; nothing here is
//! mutated after construction.

use std::fmt;

/// A resolved type
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Type {
    Int,
    Float,
    Char,
    Str,
    Bool,
    /// Return type of a function with no result
    Vacuum,
    /// A structure type, by name
    Struct(String),
}

impl Type {
    /// Parse a type spelling; anything that is not a primitive is a structure name
    pub fn from_name(name: &str) -> Self {
        match name {
            "int" => Type::Int,
            "float" => Type::Float,
            "char" => Type::Char,
            "string" => Type::Str,
            "bool" => Type::Bool,
            "vacuum" => Type::Vacuum,
            other => Type::Struct(other.to_string()),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Type::Int => "int",
            Type::Float => "float",
            Type::Char => "char",
            Type::Str => "string",
            Type::Bool => "bool",
            Type::Vacuum => "vacuum",
            Type::Struct(name) => name,
        }
    }

    /// Operand of `+ - * /` and of ordering comparisons
    pub fn is_arithmetic(&self) -> bool {
        matches!(self, Type::Int | Type::Float | Type::Char)
    }

    /// Operand of `++` and `--`
    pub fn is_unary(&self) -> bool {
        matches!(self, Type::Int | Type::Char)
    }

    /// Operand of the `&` join
    pub fn is_concat(&self) -> bool {
        matches!(self, Type::Str | Type::Char)
    }

    /// Accepted as an `if` / `elseif` condition
    pub fn is_condition(&self) -> bool {
        matches!(self, Type::Bool | Type::Int | Type::Float | Type::Char)
    }

    /// Permissive table: declaration, assignment, return and structure init
    pub fn accepts(&self, source: &Type) -> bool {
        if self == source {
            return true;
        }
        match source {
            Type::Int => matches!(self, Type::Float | Type::Bool | Type::Char),
            Type::Float => matches!(self, Type::Int | Type::Char | Type::Bool),
            Type::Char => matches!(self, Type::Str | Type::Int | Type::Float),
            Type::Bool => matches!(self, Type::Int | Type::Float),
            _ => false,
        }
    }

    /// Strict table: function arguments, numeric widening only
    pub fn accepts_argument(&self, arg: &Type) -> bool {
        self == arg || matches!((self, arg), (Type::Int, Type::Float) | (Type::Float, Type::Int))
    }

    /// Whether an array of `self` may hold an element of `element`
    pub fn accepts_element(&self, element: &Type) -> bool {
        if self == element {
            return true;
        }
        match self {
            Type::Int => matches!(element, Type::Bool | Type::Char | Type::Float),
            Type::Float => *element == Type::Int,
            Type::Char => *element == Type::Int,
            Type::Str => *element == Type::Char,
            Type::Bool => *element == Type::Int,
            _ => false,
        }
    }

    /// Result of `+ - * /` over two operand types
    pub fn arithmetic_result(left: Option<&Type>, right: Option<&Type>) -> Option<Type> {
        match (left, right) {
            (Some(Type::Float), _) | (_, Some(Type::Float)) => Some(Type::Float),
            (Some(Type::Char), _) | (_, Some(Type::Char)) => Some(Type::Int),
            (Some(left), _) => Some(left.clone()),
            (None, right) => right.cloned(),
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Builtin conversion and measurement functions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Builtin {
    ToRise,
    ToFall,
    Horizon,
    SizeOf,
    ToInt,
    ToFloat,
    ToString,
    ToChar,
    ToBool,
    Waft,
}

impl Builtin {
    pub const ALL: [Builtin; 10] = [
        Builtin::ToRise,
        Builtin::ToFall,
        Builtin::Horizon,
        Builtin::SizeOf,
        Builtin::ToInt,
        Builtin::ToFloat,
        Builtin::ToString,
        Builtin::ToChar,
        Builtin::ToBool,
        Builtin::Waft,
    ];

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|builtin| builtin.name() == name)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Builtin::ToRise => "toRise",
            Builtin::ToFall => "toFall",
            Builtin::Horizon => "horizon",
            Builtin::SizeOf => "sizeOf",
            Builtin::ToInt => "toInt",
            Builtin::ToFloat => "toFloat",
            Builtin::ToString => "toString",
            Builtin::ToChar => "toChar",
            Builtin::ToBool => "toBool",
            Builtin::Waft => "waft",
        }
    }

    pub fn return_type(&self) -> Type {
        match self {
            Builtin::ToRise | Builtin::ToFall | Builtin::ToString => Type::Str,
            Builtin::Horizon | Builtin::SizeOf | Builtin::ToInt => Type::Int,
            Builtin::ToFloat | Builtin::Waft => Type::Float,
            Builtin::ToChar => Type::Char,
            Builtin::ToBool => Type::Bool,
        }
    }

    pub fn arity(&self) -> usize {
        match self {
            Builtin::Waft => 2,
            _ => 1,
        }
    }
}

impl fmt::Display for Builtin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_permissive_table() {
        assert!(Type::Float.accepts(&Type::Int));
        assert!(Type::Str.accepts(&Type::Char));
        assert!(Type::Int.accepts(&Type::Bool));
        assert!(!Type::Int.accepts(&Type::Str));
        assert!(!Type::Char.accepts(&Type::Str));
        assert!(!Type::Bool.accepts(&Type::Char));
    }

    #[test]
    fn test_strict_table() {
        assert!(Type::Float.accepts_argument(&Type::Int));
        assert!(Type::Int.accepts_argument(&Type::Float));
        assert!(!Type::Int.accepts_argument(&Type::Char));
        assert!(!Type::Str.accepts_argument(&Type::Char));
    }

    #[test]
    fn test_element_table() {
        assert!(Type::Int.accepts_element(&Type::Float));
        assert!(!Type::Float.accepts_element(&Type::Char));
        assert!(Type::Str.accepts_element(&Type::Char));
        assert!(!Type::Bool.accepts_element(&Type::Float));
    }

    #[test]
    fn test_arithmetic_promotion() {
        assert_eq!(Type::arithmetic_result(Some(&Type::Int), Some(&Type::Float)), Some(Type::Float));
        assert_eq!(Type::arithmetic_result(Some(&Type::Char), Some(&Type::Char)), Some(Type::Int));
        assert_eq!(Type::arithmetic_result(Some(&Type::Int), Some(&Type::Int)), Some(Type::Int));
        assert_eq!(Type::arithmetic_result(None, Some(&Type::Int)), Some(Type::Int));
    }

    #[test]
    fn test_names_round_trip_through_from_name() {
        for ty in [Type::Int, Type::Float, Type::Char, Type::Str, Type::Bool, Type::Vacuum] {
            assert_eq!(Type::from_name(ty.name()), ty);
        }
        assert_eq!(Type::from_name("Point"), Type::Struct("Point".to_string()));
    }

    #[test]
    fn test_builtins() {
        assert_eq!(Builtin::from_name("waft"), Some(Builtin::Waft));
        assert_eq!(Builtin::Waft.arity(), 2);
        assert_eq!(Builtin::SizeOf.return_type(), Type::Int);
        assert_eq!(Builtin::from_name("print"), None);
    }
}
