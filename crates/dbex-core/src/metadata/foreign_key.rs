use serde::Serialize;

use super::{BuilderProperty, ensure_set, required_properties};
use crate::Result;

/// Properties of a [`ForeignKeyBuilder`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForeignKeyProperty {
    Name,
    RefSchema,
    RefTable,
    RefColumn,
}

impl BuilderProperty for ForeignKeyProperty {
    const OBJECT: &'static str = "ForeignKey";
    const ALWAYS_REQUIRED: &'static [Self] = &[Self::RefTable, Self::RefColumn];
    const OPTIONALLY_REQUIRED: &'static [Self] = &[Self::Name, Self::RefSchema];

    fn as_str(self) -> &'static str {
        match self {
            Self::Name => "name",
            Self::RefSchema => "refSchema",
            Self::RefTable => "refTable",
            Self::RefColumn => "refColumn",
        }
    }
}

/// Reference from a column to a column of another table
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ForeignKey {
    name: Option<String>,
    ref_schema: Option<String>,
    ref_table: String,
    ref_column: String,
}

impl ForeignKey {
    /// Constraint name
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn ref_schema(&self) -> Option<&str> {
        self.ref_schema.as_deref()
    }

    pub fn ref_table(&self) -> &str {
        &self.ref_table
    }

    pub fn ref_column(&self) -> &str {
        &self.ref_column
    }
}

#[derive(Debug, Clone)]
pub struct ForeignKeyBuilder {
    required: Vec<ForeignKeyProperty>,
    name: Option<String>,
    ref_schema: Option<String>,
    ref_table: Option<String>,
    ref_column: Option<String>,
}

impl ForeignKeyBuilder {
    /// Builder requiring the referenced table and column only
    pub fn new() -> Self {
        Self {
            required: ForeignKeyProperty::ALWAYS_REQUIRED.to_vec(),
            name: None,
            ref_schema: None,
            ref_table: None,
            ref_column: None,
        }
    }

    /// Builder that additionally requires the given properties
    pub fn create(required: &[ForeignKeyProperty]) -> Result<Self> {
        Ok(Self {
            required: required_properties(required)?,
            ..Self::new()
        })
    }

    pub fn set_name(&mut self, name: impl Into<String>) -> &mut Self {
        self.name = Some(name.into());
        self
    }

    pub fn set_ref_schema(&mut self, schema: impl Into<String>) -> &mut Self {
        self.ref_schema = Some(schema.into());
        self
    }

    pub fn set_ref_table(&mut self, table: impl Into<String>) -> &mut Self {
        self.ref_table = Some(table.into());
        self
    }

    pub fn set_ref_column(&mut self, column: impl Into<String>) -> &mut Self {
        self.ref_column = Some(column.into());
        self
    }

    pub fn build(&self) -> Result<ForeignKey> {
        ensure_set(&self.required, |property| match property {
            ForeignKeyProperty::Name => self.name.is_some(),
            ForeignKeyProperty::RefSchema => self.ref_schema.is_some(),
            ForeignKeyProperty::RefTable => self.ref_table.is_some(),
            ForeignKeyProperty::RefColumn => self.ref_column.is_some(),
        })?;

        Ok(ForeignKey {
            name: self.name.clone(),
            ref_schema: self.ref_schema.clone(),
            ref_table: self.ref_table.clone().unwrap_or_default(),
            ref_column: self.ref_column.clone().unwrap_or_default(),
        })
    }
}

impl Default for ForeignKeyBuilder {
    fn default() -> Self {
        Self::new()
    }
}
