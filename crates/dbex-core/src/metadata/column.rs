use serde::Serialize;

use super::{
    BuilderProperty, ForeignKey, ForeignKeyBuilder, ensure_set, required_properties,
    sanitize_name,
};
use crate::Result;

/// Properties of a [`ColumnBuilder`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnProperty {
    Name,
    SanitizedName,
    Type,
    Description,
    Nullable,
    Length,
    OrdinalPosition,
    AutoIncrement,
    Default,
}

impl BuilderProperty for ColumnProperty {
    const OBJECT: &'static str = "Column";
    const ALWAYS_REQUIRED: &'static [Self] = &[Self::Name, Self::SanitizedName, Self::Type];
    const OPTIONALLY_REQUIRED: &'static [Self] = &[
        Self::Description,
        Self::Nullable,
        Self::Length,
        Self::OrdinalPosition,
        Self::AutoIncrement,
        Self::Default,
    ];

    fn as_str(self) -> &'static str {
        match self {
            Self::Name => "name",
            Self::SanitizedName => "sanitizedName",
            Self::Type => "type",
            Self::Description => "description",
            Self::Nullable => "nullable",
            Self::Length => "length",
            Self::OrdinalPosition => "ordinalPosition",
            Self::AutoIncrement => "autoIncrement",
            Self::Default => "default",
        }
    }
}

/// Column of a described table
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Column {
    name: String,
    sanitized_name: String,
    description: Option<String>,
    #[serde(rename = "type")]
    data_type: String,
    nullable: Option<bool>,
    length: Option<String>,
    ordinal_position: Option<u32>,
    primary_key: bool,
    unique_key: bool,
    auto_increment: Option<bool>,
    auto_increment_value: Option<i64>,
    has_default: bool,
    default: Option<String>,
    foreign_key: Option<ForeignKey>,
    constraints: Vec<String>,
}

impl Column {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn sanitized_name(&self) -> &str {
        &self.sanitized_name
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Declared database type
    pub fn data_type(&self) -> &str {
        &self.data_type
    }

    pub fn is_nullable(&self) -> Option<bool> {
        self.nullable
    }

    /// Declared length, e.g. `255` or `10,2`
    pub fn length(&self) -> Option<&str> {
        self.length.as_deref()
    }

    pub fn ordinal_position(&self) -> Option<u32> {
        self.ordinal_position
    }

    pub fn is_primary_key(&self) -> bool {
        self.primary_key
    }

    pub fn is_unique_key(&self) -> bool {
        self.unique_key
    }

    pub fn is_auto_increment(&self) -> Option<bool> {
        self.auto_increment
    }

    /// Next value of the auto-increment sequence, when the database reports it
    pub fn auto_increment_value(&self) -> Option<i64> {
        self.auto_increment_value
    }

    pub fn has_default(&self) -> bool {
        self.has_default
    }

    pub fn default(&self) -> Option<&str> {
        self.default.as_deref()
    }

    pub fn foreign_key(&self) -> Option<&ForeignKey> {
        self.foreign_key.as_ref()
    }

    pub fn has_foreign_key(&self) -> bool {
        self.foreign_key.is_some()
    }

    /// Names of the constraints the column takes part in
    pub fn constraints(&self) -> &[String] {
        &self.constraints
    }
}

#[derive(Debug, Clone)]
pub struct ColumnBuilder {
    required: Vec<ColumnProperty>,
    name: Option<String>,
    sanitized_name: Option<String>,
    description: Option<String>,
    data_type: Option<String>,
    nullable: Option<bool>,
    length: Option<String>,
    ordinal_position: Option<u32>,
    primary_key: bool,
    unique_key: bool,
    auto_increment: Option<bool>,
    auto_increment_value: Option<i64>,
    has_default: Option<bool>,
    default: Option<String>,
    foreign_key: Option<ForeignKeyBuilder>,
    constraints: Vec<String>,
}

impl ColumnBuilder {
    /// Builder requiring name, sanitized name and type only
    pub fn new() -> Self {
        Self {
            required: ColumnProperty::ALWAYS_REQUIRED.to_vec(),
            name: None,
            sanitized_name: None,
            description: None,
            data_type: None,
            nullable: None,
            length: None,
            ordinal_position: None,
            primary_key: false,
            unique_key: false,
            auto_increment: None,
            auto_increment_value: None,
            has_default: None,
            default: None,
            foreign_key: None,
            constraints: Vec::new(),
        }
    }

    /// Builder that additionally requires the given properties
    pub fn create(required: &[ColumnProperty]) -> Result<Self> {
        Ok(Self {
            required: required_properties(required)?,
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

    pub fn set_type(&mut self, data_type: impl Into<String>) -> &mut Self {
        self.data_type = Some(data_type.into());
        self
    }

    pub fn set_nullable(&mut self, nullable: bool) -> &mut Self {
        self.nullable = Some(nullable);
        self
    }

    pub fn set_length(&mut self, length: impl Into<String>) -> &mut Self {
        self.length = Some(length.into());
        self
    }

    pub fn set_ordinal_position(&mut self, position: u32) -> &mut Self {
        self.ordinal_position = Some(position);
        self
    }

    pub fn set_primary_key(&mut self, primary_key: bool) -> &mut Self {
        self.primary_key = primary_key;
        self
    }

    pub fn set_unique_key(&mut self, unique_key: bool) -> &mut Self {
        self.unique_key = unique_key;
        self
    }

    pub fn set_auto_increment(&mut self, auto_increment: bool) -> &mut Self {
        self.auto_increment = Some(auto_increment);
        self
    }

    pub fn set_auto_increment_value(&mut self, value: i64) -> &mut Self {
        self.auto_increment_value = Some(value);
        self
    }

    /// Record the default value; `None` records that the column has none
    pub fn set_default(&mut self, default: Option<String>) -> &mut Self {
        self.has_default = Some(default.is_some());
        self.default = default;
        self
    }

    /// Foreign key builder of this column, created on first use
    pub fn add_foreign_key(&mut self) -> &mut ForeignKeyBuilder {
        self.foreign_key.get_or_insert_with(ForeignKeyBuilder::new)
    }

    pub fn add_constraint(&mut self, constraint: impl Into<String>) -> &mut Self {
        self.constraints.push(constraint.into());
        self
    }

    pub fn build(&self) -> Result<Column> {
        ensure_set(&self.required, |property| match property {
            ColumnProperty::Name => self.name.is_some(),
            ColumnProperty::SanitizedName => self.sanitized_name.is_some(),
            ColumnProperty::Type => self.data_type.is_some(),
            ColumnProperty::Description => self.description.is_some(),
            ColumnProperty::Nullable => self.nullable.is_some(),
            ColumnProperty::Length => self.length.is_some(),
            ColumnProperty::OrdinalPosition => self.ordinal_position.is_some(),
            ColumnProperty::AutoIncrement => self.auto_increment.is_some(),
            ColumnProperty::Default => self.has_default.is_some(),
        })?;

        let foreign_key = self
            .foreign_key
            .as_ref()
            .map(ForeignKeyBuilder::build)
            .transpose()?;

        Ok(Column {
            name: self.name.clone().unwrap_or_default(),
            sanitized_name: self.sanitized_name.clone().unwrap_or_default(),
            description: self.description.clone(),
            data_type: self.data_type.clone().unwrap_or_default(),
            nullable: self.nullable,
            length: self.length.clone(),
            ordinal_position: self.ordinal_position,
            primary_key: self.primary_key,
            unique_key: self.unique_key,
            auto_increment: self.auto_increment,
            auto_increment_value: self.auto_increment_value,
            has_default: self.has_default.unwrap_or(false),
            default: self.default.clone(),
            foreign_key,
            constraints: self.constraints.clone(),
        })
    }
}

impl Default for ColumnBuilder {
    fn default() -> Self {
        Self::new()
    }
}
