use async_trait::async_trait;

use super::{Table, TableCollection};
use crate::{Result, TableId};

/// Schema discovery for one data source
#[async_trait]
pub trait MetadataProvider: Send + Sync {
    /// Describe a single table with its columns; `NotFound` when absent.
    ///
    /// An empty schema matches the table in whichever schema the provider
    /// lists it.
    async fn get_table(&self, table: &TableId) -> Result<Table> {
        let tables = self
            .list_tables(Some(std::slice::from_ref(table)), true)
            .await?;
        if table.schema.is_empty() {
            return tables.get_by_name(&table.name).cloned();
        }
        tables
            .get_by_name_and_schema(&table.name, &table.schema)
            .cloned()
    }

    /// List tables, restricted to `whitelist` when given. With
    /// `load_columns == false` the tables are built without columns.
    async fn list_tables(
        &self,
        whitelist: Option<&[TableId]>,
        load_columns: bool,
    ) -> Result<TableCollection>;
}
