//! Element types: kernel type names, store semantics, and host arithmetic.

use core::fmt;

use pulsar_core::{PulsarError, Result};

/// Arithmetic family of a kernel element type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ScalarKind {
    /// `float`: stores multiply by an `f`-suffixed reciprocal literal.
    Float,
    /// `double`: stores multiply by a reciprocal literal.
    Double,
    /// Any other name: stores use truncating integer division.
    Integer,
}

/// A kernel element type: OpenCL type name plus its size in bytes.
///
/// The kind is derived from the name. Names other than `float` and `double`
/// are treated as integers, so an unrecognized name still produces a kernel
/// that divides by the integration factor.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ScalarType {
    name: String,
    size_bytes: usize,
}

impl ScalarType {
    pub fn new(name: impl Into<String>, size_bytes: usize) -> Self {
        Self {
            name: name.into(),
            size_bytes,
        }
    }

    /// The scalar type matching a host [`Sample`] type.
    pub fn of<T: Sample>() -> Self {
        Self::new(T::DATA_NAME, core::mem::size_of::<T>())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn size_bytes(&self) -> usize {
        self.size_bytes
    }

    pub fn kind(&self) -> ScalarKind {
        match self.name.as_str() {
            "float" => ScalarKind::Float,
            "double" => ScalarKind::Double,
            _ => ScalarKind::Integer,
        }
    }

    /// Renders the statement right-hand side that turns an accumulated sum
    /// into the integrated value.
    pub fn store_expr(&self, sum: &str, integration: u32) -> String {
        match self.kind() {
            ScalarKind::Float => {
                format!("{sum} * {:?}f", 1.0f32 / integration as f32)
            }
            ScalarKind::Double => format!("{sum} * {:?}", 1.0f64 / integration as f64),
            ScalarKind::Integer => format!("{sum} / {integration}"),
        }
    }
}

impl fmt::Display for ScalarType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// Width of the integer type used for index arithmetic in generated kernels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum IntType {
    #[default]
    U32,
    U64,
}

impl IntType {
    /// Kernel-language spelling.
    pub fn name(&self) -> &'static str {
        match self {
            Self::U32 => "unsigned int",
            Self::U64 => "unsigned long int",
        }
    }

    /// Persisted code (`0` or `1`).
    pub fn code(&self) -> u8 {
        match self {
            Self::U32 => 0,
            Self::U64 => 1,
        }
    }

    pub fn from_code(code: u8) -> Result<Self> {
        match code {
            0 => Ok(Self::U32),
            1 => Ok(Self::U64),
            other => Err(PulsarError::InvalidInput(format!(
                "integer type code must be 0 or 1, got {other}"
            ))),
        }
    }
}

/// Host element types the reference reducer and simulator operate on.
///
/// Integer accumulation wraps, matching the fixed-width arithmetic of the
/// generated kernels.
pub trait Sample: Copy + Default + PartialEq + fmt::Debug + Send + Sync + 'static {
    /// OpenCL scalar type name.
    const DATA_NAME: &'static str;

    /// Adds `other` into an accumulator.
    fn accumulate(self, other: Self) -> Self;

    /// Reference semantics: `sum / integration`, truncating for integers.
    fn integrate(sum: Self, integration: u32) -> Self;

    /// Kernel store semantics: reciprocal multiply for floats, division for integers.
    fn scale(sum: Self, integration: u32) -> Self;

    /// Converts a small test or fill value.
    fn from_u32(value: u32) -> Self;
}

macro_rules! impl_integer_sample {
    ($($t:ty => $name:literal),* $(,)?) => {$(
        impl Sample for $t {
            const DATA_NAME: &'static str = $name;

            fn accumulate(self, other: Self) -> Self {
                self.wrapping_add(other)
            }

            fn integrate(sum: Self, integration: u32) -> Self {
                (sum as i128 / integration as i128) as $t
            }

            fn scale(sum: Self, integration: u32) -> Self {
                Self::integrate(sum, integration)
            }

            fn from_u32(value: u32) -> Self {
                value as $t
            }
        }
    )*};
}

impl_integer_sample! {
    i8 => "char",
    u8 => "uchar",
    i16 => "short",
    u16 => "ushort",
    i32 => "int",
    u32 => "uint",
    i64 => "long",
    u64 => "ulong",
}

impl Sample for f32 {
    const DATA_NAME: &'static str = "float";

    fn accumulate(self, other: Self) -> Self {
        self + other
    }

    fn integrate(sum: Self, integration: u32) -> Self {
        sum / integration as f32
    }

    fn scale(sum: Self, integration: u32) -> Self {
        sum * (1.0f32 / integration as f32)
    }

    fn from_u32(value: u32) -> Self {
        value as f32
    }
}

impl Sample for f64 {
    const DATA_NAME: &'static str = "double";

    fn accumulate(self, other: Self) -> Self {
        self + other
    }

    fn integrate(sum: Self, integration: u32) -> Self {
        sum / integration as f64
    }

    fn scale(sum: Self, integration: u32) -> Self {
        sum * (1.0f64 / integration as f64)
    }

    fn from_u32(value: u32) -> Self {
        value as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_from_name() {
        assert_eq!(ScalarType::new("float", 4).kind(), ScalarKind::Float);
        assert_eq!(ScalarType::new("double", 8).kind(), ScalarKind::Double);
        assert_eq!(ScalarType::new("int", 4).kind(), ScalarKind::Integer);
        assert_eq!(ScalarType::new("half", 2).kind(), ScalarKind::Integer);
    }

    #[test]
    fn test_of_host_type() {
        assert_eq!(ScalarType::of::<f32>(), ScalarType::new("float", 4));
        assert_eq!(ScalarType::of::<u8>(), ScalarType::new("uchar", 1));
        assert_eq!(ScalarType::of::<i64>().size_bytes(), 8);
    }

    #[test]
    fn test_store_expressions() {
        assert_eq!(
            ScalarType::new("float", 4).store_expr("x", 4),
            "x * 0.25f"
        );
        assert_eq!(ScalarType::new("float", 4).store_expr("x", 1), "x * 1.0f");
        assert_eq!(
            ScalarType::new("double", 8).store_expr("x", 8),
            "x * 0.125"
        );
        assert_eq!(ScalarType::new("int", 4).store_expr("x", 10), "x / 10");
        assert_eq!(ScalarType::new("mystery", 4).store_expr("x", 3), "x / 3");
    }

    #[test]
    fn test_float_literal_round_trips_reciprocal() {
        let text = ScalarType::new("float", 4).store_expr("x", 3);
        let literal = text.trim_start_matches("x * ").trim_end_matches('f');
        let parsed: f32 = literal.parse().unwrap();
        assert_eq!(parsed, 1.0f32 / 3.0);
    }

    #[test]
    fn test_int_type_codes() {
        assert_eq!(IntType::U32.name(), "unsigned int");
        assert_eq!(IntType::U64.name(), "unsigned long int");
        assert_eq!(IntType::from_code(1).unwrap(), IntType::U64);
        assert_eq!(IntType::from_code(IntType::U32.code()).unwrap(), IntType::U32);
        assert!(IntType::from_code(2).is_err());
    }

    #[test]
    fn test_integer_division_truncates() {
        assert_eq!(<u32 as Sample>::integrate(6, 4), 1);
        assert_eq!(<i32 as Sample>::integrate(-7, 2), -3);
        assert_eq!(<u8 as Sample>::integrate(200, 255), 0);
        assert_eq!(<u16 as Sample>::scale(22, 4), 5);
    }

    #[test]
    fn test_integer_accumulation_wraps() {
        assert_eq!(<u8 as Sample>::accumulate(250, 10), 4);
        assert_eq!(<i8 as Sample>::accumulate(127, 1), -128);
    }

    #[test]
    fn test_float_semantics() {
        assert_eq!(<f32 as Sample>::integrate(10.0, 4), 2.5);
        assert_eq!(<f32 as Sample>::scale(10.0, 4), 2.5);
        assert_eq!(<f64 as Sample>::scale(3.0, 2), 1.5);
    }
}
