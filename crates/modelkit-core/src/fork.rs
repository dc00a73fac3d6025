//! Table/pool forks of a model.
//!
//! A fork is a view over an existing descriptor that routes queries to
//! another table or pool without compiling a new descriptor.

use std::sync::Arc;

use crate::meta::ModelDescriptor;

/// Descriptor plus table and pool overrides.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelFork {
    descriptor: Arc<ModelDescriptor>,
    table: Option<String>,
    pool: Option<String>,
}

impl ModelFork {
    /// Fork without overrides.
    pub fn new(descriptor: Arc<ModelDescriptor>) -> Self {
        Self {
            descriptor,
            table: None,
            pool: None,
        }
    }

    /// Override the table, optionally `database.table`.
    pub fn with_table(mut self, table: impl Into<String>) -> Self {
        self.table = Some(table.into());
        self
    }

    /// Override the pool.
    pub fn with_pool(mut self, pool: impl Into<String>) -> Self {
        self.pool = Some(pool.into());
        self
    }

    /// The forked descriptor.
    pub fn descriptor(&self) -> &Arc<ModelDescriptor> {
        &self.descriptor
    }

    /// Whether the fork changes anything.
    pub fn is_identity(&self) -> bool {
        self.table.is_none() && self.pool.is_none()
    }

    /// Effective database name.
    pub fn database_name(&self) -> Option<&str> {
        match &self.table {
            Some(table) => table.split_once('.').map(|(db, _)| db),
            None => self.descriptor.database_name(),
        }
    }

    /// Effective unqualified table name.
    pub fn table_name(&self) -> Option<&str> {
        match &self.table {
            Some(table) => Some(table.split_once('.').map_or(table.as_str(), |(_, t)| t)),
            None => self.descriptor.table_name(),
        }
    }

    /// Effective pool name.
    pub fn pool_name(&self) -> Option<&str> {
        self.pool
            .as_deref()
            .or_else(|| self.descriptor.pool_name())
    }
}

impl From<Arc<ModelDescriptor>> for ModelFork {
    fn from(descriptor: Arc<ModelDescriptor>) -> Self {
        Self::new(descriptor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::NoCatalog;
    use crate::config::EmptyConfig;
    use crate::declare::{DeclarationSet, ModelDeclaration, TableSpec};
    use crate::meta::CompileContext;

    fn descriptor() -> Arc<ModelDescriptor> {
        let set = DeclarationSet::new().with(
            ModelDeclaration::builder("app::Log")
                .table(TableSpec::new("main.tb_log").pool("logs"))
                .build(),
        );
        let ctx = CompileContext {
            declarations: &set,
            config: &EmptyConfig,
            relations: &NoCatalog,
            generators: &NoCatalog,
        };
        Arc::new(ModelDescriptor::compile("app::Log", false, ctx).unwrap())
    }

    #[test]
    fn test_identity_fork() {
        let fork = ModelFork::new(descriptor());
        assert!(fork.is_identity());
        assert_eq!(fork.database_name(), Some("main"));
        assert_eq!(fork.table_name(), Some("tb_log"));
        assert_eq!(fork.pool_name(), Some("logs"));
    }

    #[test]
    fn test_overrides() {
        let base = descriptor();
        let fork = ModelFork::new(Arc::clone(&base))
            .with_table("tb_log_2024")
            .with_pool("archive");
        assert_eq!(fork.database_name(), None);
        assert_eq!(fork.table_name(), Some("tb_log_2024"));
        assert_eq!(fork.pool_name(), Some("archive"));
        // the descriptor itself is untouched
        assert_eq!(base.table_name(), Some("tb_log"));

        let qualified = ModelFork::new(base).with_table("other.tb_x");
        assert_eq!(qualified.database_name(), Some("other"));
        assert_eq!(qualified.table_name(), Some("tb_x"));
        assert_eq!(qualified.pool_name(), Some("logs"));
    }
}
