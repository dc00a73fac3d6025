//! Semantic column types.
//!
//! The semantic type of a column drives value coercion on save and on load,
//! and decides how auto-populated timestamps are rendered.

use std::fmt;
use std::str::FromStr;

/// Semantic type of a stored column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SemanticType {
    /// Variable-length string.
    #[default]
    Varchar,
    /// Fixed-length string.
    Char,
    /// Long text.
    Text,
    /// 8-bit integer.
    TinyInt,
    /// 16-bit integer.
    SmallInt,
    /// 24-bit integer.
    MediumInt,
    /// 32-bit integer.
    Int,
    /// 64-bit integer.
    BigInt,
    /// Exact decimal.
    Decimal,
    /// Single precision float.
    Float,
    /// Double precision float.
    Double,
    /// Boolean.
    Bool,
    /// Calendar date (`YYYY-MM-DD`).
    Date,
    /// Time of day (`HH:MM:SS`).
    Time,
    /// Date and time (`YYYY-MM-DD HH:MM:SS`).
    DateTime,
    /// Timestamp, rendered like `DateTime`.
    Timestamp,
    /// Four-digit year.
    Year,
    /// Structured JSON document.
    Json,
    /// Delimited list stored as text.
    List,
    /// MySQL-style `SET`, stored as comma separated text.
    Set,
    /// Binary data.
    Blob,
}

impl SemanticType {
    /// Lowercase SQL-ish name of this type.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            SemanticType::Varchar => "varchar",
            SemanticType::Char => "char",
            SemanticType::Text => "text",
            SemanticType::TinyInt => "tinyint",
            SemanticType::SmallInt => "smallint",
            SemanticType::MediumInt => "mediumint",
            SemanticType::Int => "int",
            SemanticType::BigInt => "bigint",
            SemanticType::Decimal => "decimal",
            SemanticType::Float => "float",
            SemanticType::Double => "double",
            SemanticType::Bool => "bool",
            SemanticType::Date => "date",
            SemanticType::Time => "time",
            SemanticType::DateTime => "datetime",
            SemanticType::Timestamp => "timestamp",
            SemanticType::Year => "year",
            SemanticType::Json => "json",
            SemanticType::List => "list",
            SemanticType::Set => "set",
            SemanticType::Blob => "blob",
        }
    }

    /// Whether the type stores character data.
    #[must_use]
    pub const fn is_textual(&self) -> bool {
        matches!(
            self,
            SemanticType::Varchar | SemanticType::Char | SemanticType::Text
        )
    }

    /// Whether the type stores whole numbers.
    #[must_use]
    pub const fn is_integer(&self) -> bool {
        matches!(
            self,
            SemanticType::TinyInt
                | SemanticType::SmallInt
                | SemanticType::MediumInt
                | SemanticType::Int
                | SemanticType::BigInt
        )
    }

    /// Whether a create/update timestamp role can be attached to this type.
    #[must_use]
    pub const fn supports_timestamp(&self) -> bool {
        matches!(
            self,
            SemanticType::Date
                | SemanticType::Time
                | SemanticType::DateTime
                | SemanticType::Timestamp
                | SemanticType::Int
                | SemanticType::BigInt
                | SemanticType::Year
        )
    }
}

impl fmt::Display for SemanticType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for SemanticType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let ty = match s.to_ascii_lowercase().as_str() {
            "varchar" | "string" => SemanticType::Varchar,
            "char" => SemanticType::Char,
            "text" | "tinytext" | "mediumtext" | "longtext" => SemanticType::Text,
            "tinyint" => SemanticType::TinyInt,
            "smallint" => SemanticType::SmallInt,
            "mediumint" => SemanticType::MediumInt,
            "int" | "integer" => SemanticType::Int,
            "bigint" => SemanticType::BigInt,
            "decimal" | "numeric" => SemanticType::Decimal,
            "float" => SemanticType::Float,
            "double" | "real" => SemanticType::Double,
            "bool" | "boolean" => SemanticType::Bool,
            "date" => SemanticType::Date,
            "time" => SemanticType::Time,
            "datetime" => SemanticType::DateTime,
            "timestamp" => SemanticType::Timestamp,
            "year" => SemanticType::Year,
            "json" => SemanticType::Json,
            "list" => SemanticType::List,
            "set" => SemanticType::Set,
            "blob" | "binary" | "varbinary" => SemanticType::Blob,
            other => return Err(format!("unknown column type `{other}`")),
        };
        Ok(ty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_aliases() {
        assert_eq!("INT".parse::<SemanticType>(), Ok(SemanticType::Int));
        assert_eq!("mediumtext".parse::<SemanticType>(), Ok(SemanticType::Text));
        assert_eq!("timestamp".parse::<SemanticType>(), Ok(SemanticType::Timestamp));
        assert!("geometry".parse::<SemanticType>().is_err());
    }

    #[test]
    fn test_timestamp_support() {
        assert!(SemanticType::DateTime.supports_timestamp());
        assert!(SemanticType::BigInt.supports_timestamp());
        assert!(!SemanticType::Varchar.supports_timestamp());
        assert!(!SemanticType::SmallInt.supports_timestamp());
    }
}
