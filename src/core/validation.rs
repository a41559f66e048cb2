//! Checks on table and column names typed by the user
//!
//! A [`ValidationError`] rejects the name outright. A [`NameWarning`] is
//! only logged: DDL generators quote identifiers, so keywords and odd
//! underscores still produce working SQL.

/// Identifier length limit shared by MySQL and PostgreSQL (63 + terminator)
pub const MAX_IDENTIFIER_LENGTH: usize = 64;

/// Keywords that need quoting in at least one supported dialect, sorted
const SQL_KEYWORDS: &[&str] = &[
    "ADD", "ALL", "ALTER", "AND", "ANY", "ARRAY", "AS", "ASC", "BETWEEN", "BY", "CASE", "CAST",
    "CHECK", "COLUMN", "CONSTRAINT", "CREATE", "CROSS", "DATABASE", "DEFAULT", "DELETE", "DESC",
    "DISTINCT", "DROP", "ELSE", "END", "EXCEPT", "EXISTS", "FALSE", "FETCH", "FOR", "FOREIGN",
    "FROM", "FULL", "GRANT", "GROUP", "HAVING", "IF", "IN", "INDEX", "INNER", "INSERT",
    "INTERSECT", "INTO", "IS", "JOIN", "KEY", "LATERAL", "LEFT", "LIKE", "LIMIT", "NOT", "NULL",
    "OFFSET", "ON", "OR", "ORDER", "OUTER", "PRIMARY", "REFERENCES", "RETURNING", "RIGHT",
    "SELECT", "SET", "TABLE", "THEN", "TO", "TRUE", "UNION", "UNIQUE", "UPDATE", "USER",
    "USING", "VALUES", "WHEN", "WHERE", "WINDOW", "WITH",
];

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("Name cannot be empty")]
    Empty,
    #[error("Name is {0} characters long; the limit is {max}", max = MAX_IDENTIFIER_LENGTH)]
    TooLong(usize),
    #[error("Character '{0}' is not allowed; use letters, digits and underscores")]
    BadCharacter(char),
    #[error("Name cannot start with a digit")]
    LeadingDigit,
    #[error("Name needs at least one letter")]
    NoLetter,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NameWarning {
    Keyword(String),
    LeadingUnderscore,
    TrailingUnderscore,
    DoubleUnderscore,
}

impl std::fmt::Display for NameWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NameWarning::Keyword(word) => write!(f, "'{word}' is an SQL keyword and will be quoted"),
            NameWarning::LeadingUnderscore => f.write_str("starts with an underscore"),
            NameWarning::TrailingUnderscore => f.write_str("ends with an underscore"),
            NameWarning::DoubleUnderscore => f.write_str("contains '__'"),
        }
    }
}

pub fn is_sql_keyword(name: &str) -> bool {
    SQL_KEYWORDS
        .binary_search(&name.to_ascii_uppercase().as_str())
        .is_ok()
}

/// First hard error in a (trimmed) name
pub fn check_name(name: &str) -> Result<(), ValidationError> {
    let name = name.trim();
    let Some(first) = name.chars().next() else {
        return Err(ValidationError::Empty);
    };
    if let Some(bad) = name.chars().find(|c| !(c.is_ascii_alphanumeric() || *c == '_')) {
        return Err(ValidationError::BadCharacter(bad));
    }
    // Only ASCII from here on, so bytes == chars
    if name.len() > MAX_IDENTIFIER_LENGTH {
        return Err(ValidationError::TooLong(name.len()));
    }
    if first.is_ascii_digit() {
        return Err(ValidationError::LeadingDigit);
    }
    if !name.bytes().any(|b| b.is_ascii_alphabetic()) {
        return Err(ValidationError::NoLetter);
    }
    Ok(())
}

pub fn name_warnings(name: &str) -> Vec<NameWarning> {
    let name = name.trim();
    let mut warnings = Vec::new();
    if is_sql_keyword(name) {
        warnings.push(NameWarning::Keyword(name.to_string()));
    }
    if name.starts_with('_') {
        warnings.push(NameWarning::LeadingUnderscore);
    }
    if name.len() > 1 && name.ends_with('_') {
        warnings.push(NameWarning::TrailingUnderscore);
    }
    if name.contains("__") {
        warnings.push(NameWarning::DoubleUnderscore);
    }
    warnings
}

/// Rejects invalid names; warnings only go to the log
pub fn validate_name(name: &str) -> Result<(), ValidationError> {
    check_name(name)?;
    for warning in name_warnings(name) {
        tracing::debug!("Name '{}' {}", name.trim(), warning);
    }
    Ok(())
}
