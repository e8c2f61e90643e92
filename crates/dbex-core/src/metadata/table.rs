use serde::Serialize;

use super::{
    BuilderProperty, ColumnBuilder, ColumnCollection, ColumnProperty, ensure_set,
    required_properties, sanitize_name,
};
use crate::{ExtractorError, Result};

/// Properties of a [`TableBuilder`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableProperty {
    Name,
    SanitizedName,
    Columns,
    Description,
    Schema,
    Catalog,
    Type,
    RowCount,
}

impl BuilderProperty for TableProperty {
    const OBJECT: &'static str = "Table";
    const ALWAYS_REQUIRED: &'static [Self] = &[Self::Name, Self::SanitizedName, Self::Columns];
    const OPTIONALLY_REQUIRED: &'static [Self] = &[
        Self::Description,
        Self::Schema,
        Self::Catalog,
        Self::Type,
        Self::RowCount,
    ];

    fn as_str(self) -> &'static str {
        match self {
            Self::Name => "name",
            Self::SanitizedName => "sanitizedName",
            Self::Columns => "columns",
            Self::Description => "description",
            Self::Schema => "schema",
            Self::Catalog => "catalog",
            Self::Type => "type",
            Self::RowCount => "rowCount",
        }
    }
}

/// Described table, with or without its columns
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Table {
    name: String,
    sanitized_name: String,
    description: Option<String>,
    schema: Option<String>,
    catalog: Option<String>,
    #[serde(rename = "type")]
    table_type: Option<String>,
    row_count: Option<u64>,
    columns: Option<ColumnCollection>,
}

impl Table {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn sanitized_name(&self) -> &str {
        &self.sanitized_name
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn schema(&self) -> Option<&str> {
        self.schema.as_deref()
    }

    pub fn catalog(&self) -> Option<&str> {
        self.catalog.as_deref()
    }

    /// Table type as reported by the database (e.g. "table", "view")
    pub fn table_type(&self) -> Option<&str> {
        self.table_type.as_deref()
    }

    pub fn row_count(&self) -> Option<u64> {
        self.row_count
    }

    /// False when the table was described without its columns
    pub fn has_columns(&self) -> bool {
        self.columns.is_some()
    }

    pub fn columns(&self) -> Result<&ColumnCollection> {
        self.columns.as_ref().ok_or_else(|| {
            ExtractorError::InvalidState(format!(
                "Columns of the table \"{}\" were not loaded.",
                self.name
            ))
        })
    }
}

#[derive(Debug, Clone)]
pub struct TableBuilder {
    required: Vec<TableProperty>,
    column_required: Vec<ColumnProperty>,
    columns_expected: bool,
    name: Option<String>,
    sanitized_name: Option<String>,
    description: Option<String>,
    schema: Option<String>,
    catalog: Option<String>,
    table_type: Option<String>,
    row_count: Option<u64>,
    columns: Vec<ColumnBuilder>,
}

impl TableBuilder {
    /// Builder requiring name, sanitized name and columns only
    pub fn new() -> Self {
        Self {
            required: TableProperty::ALWAYS_REQUIRED.to_vec(),
            column_required: Vec::new(),
            columns_expected: true,
            name: None,
            sanitized_name: None,
            description: None,
            schema: None,
            catalog: None,
            table_type: None,
            row_count: None,
            columns: Vec::new(),
        }
    }

    /// Builder that additionally requires the given table properties; every
    /// column added through [`TableBuilder::add_column`] requires
    /// `column_required` as well.
    pub fn create(required: &[TableProperty], column_required: &[ColumnProperty]) -> Result<Self> {
        // validated up front so add_column cannot fail on it later
        ColumnBuilder::create(column_required)?;
        Ok(Self {
            required: required_properties(required)?,
            column_required: column_required.to_vec(),
            ..Self::new()
        })
    }

    /// Set the raw name; also derives the sanitized name
    pub fn set_name(&mut self, name: impl Into<String>) -> &mut Self {
        let name = name.into();
        self.sanitized_name = Some(sanitize_name(&name));
        self.name = Some(name);
        self
    }

    pub fn set_sanitized_name(&mut self, name: impl Into<String>) -> &mut Self {
        self.sanitized_name = Some(name.into());
        self
    }

    pub fn set_description(&mut self, description: impl Into<String>) -> &mut Self {
        self.description = Some(description.into());
        self
    }

    pub fn set_schema(&mut self, schema: impl Into<String>) -> &mut Self {
        self.schema = Some(schema.into());
        self
    }

    pub fn set_catalog(&mut self, catalog: impl Into<String>) -> &mut Self {
        self.catalog = Some(catalog.into());
        self
    }

    pub fn set_type(&mut self, table_type: impl Into<String>) -> &mut Self {
        self.table_type = Some(table_type.into());
        self
    }

    pub fn set_row_count(&mut self, row_count: u64) -> &mut Self {
        self.row_count = Some(row_count);
        self
    }

    /// Describe the table without columns.
    pub fn set_columns_not_expected(&mut self) -> Result<&mut Self> {
        if !self.columns.is_empty() {
            return Err(ExtractorError::InvalidState(
                "Columns are not expected, but some have already been added.".into(),
            ));
        }
        self.columns_expected = false;
        self.required.retain(|p| *p != TableProperty::Columns);
        Ok(self)
    }

    pub fn has_columns(&self) -> bool {
        !self.columns.is_empty()
    }

    /// Start a new column, returned for configuration.
    pub fn add_column(&mut self) -> Result<&mut ColumnBuilder> {
        if !self.columns_expected {
            return Err(ExtractorError::InvalidState(
                "Columns are not expected, cannot add a column.".into(),
            ));
        }
        let column = ColumnBuilder::create(&self.column_required)?;
        let index = self.columns.len();
        self.columns.push(column);
        Ok(&mut self.columns[index])
    }

    pub fn build(&self) -> Result<Table> {
        ensure_set(&self.required, |property| match property {
            TableProperty::Name => self.name.is_some(),
            TableProperty::SanitizedName => self.sanitized_name.is_some(),
            TableProperty::Columns => !self.columns.is_empty(),
            TableProperty::Description => self.description.is_some(),
            TableProperty::Schema => self.schema.is_some(),
            TableProperty::Catalog => self.catalog.is_some(),
            TableProperty::Type => self.table_type.is_some(),
            TableProperty::RowCount => self.row_count.is_some(),
        })?;

        let columns = if self.columns_expected {
            let columns = self
                .columns
                .iter()
                .map(ColumnBuilder::build)
                .collect::<Result<Vec<_>>>()?;
            Some(ColumnCollection::new(columns))
        } else {
            None
        };

        Ok(Table {
            name: self.name.clone().unwrap_or_default(),
            sanitized_name: self.sanitized_name.clone().unwrap_or_default(),
            description: self.description.clone(),
            schema: self.schema.clone(),
            catalog: self.catalog.clone(),
            table_type: self.table_type.clone(),
            row_count: self.row_count,
            columns,
        })
    }
}

impl Default for TableBuilder {
    fn default() -> Self {
        Self::new()
    }
}
