//! AI collaborator interface
//!
//! The text-to-schema service is consumed as a black box. Every call is
//! asynchronous and may fail; callers must leave their state untouched on
//! failure.

use std::future::Future;

use derive_more::Display;
use serde::{Deserialize, Serialize};

use crate::core::schema::Schema;

/// SQL dialect for DDL generation
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
pub enum SqlDialect {
    #[default]
    #[display("MySQL")]
    MySQL,
    #[display("PostgreSQL")]
    PostgreSQL,
    #[display("SQLite")]
    SQLite,
}

/// What DDL to generate: a known dialect or a free-form description
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, Display)]
pub enum DdlTarget {
    #[display("{_0}")]
    Dialect(SqlDialect),
    #[display("{_0}")]
    Freeform(String),
}

impl From<SqlDialect> for DdlTarget {
    fn from(dialect: SqlDialect) -> Self {
        DdlTarget::Dialect(dialect)
    }
}

/// Assistant errors
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AssistantError {
    #[error("Assistant request failed: {0}")]
    Network(String),

    #[error("Assistant returned a malformed response: {0}")]
    MalformedResponse(String),

    #[error("Assistant declined the request: {0}")]
    Rejected(String),
}

/// Text-to-schema service
pub trait SchemaAssistant {
    /// Parses raw DDL into a schema
    fn parse(&self, ddl: &str) -> impl Future<Output = Result<Schema, AssistantError>>;

    /// Builds a schema from a natural-language description
    fn create_from_prompt(
        &self,
        prompt: &str,
    ) -> impl Future<Output = Result<Schema, AssistantError>>;

    /// Returns a complete replacement for `current`
    fn modify(
        &self,
        prompt: &str,
        current: &Schema,
    ) -> impl Future<Output = Result<Schema, AssistantError>>;

    fn generate_ddl(
        &self,
        schema: &Schema,
        target: &DdlTarget,
    ) -> impl Future<Output = Result<String, AssistantError>>;
}
