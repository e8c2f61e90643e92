//! Schema description model
//!
//! Value objects ([`Table`], [`Column`], [`ForeignKey`]) are immutable once
//! built. They are produced by builders that validate a configurable set of
//! required properties, and grouped into collections with case-insensitive
//! lookup.
//!
//! # Example
//!
//! ```
//! use dbex_core::metadata::{ColumnProperty, TableBuilder};
//!
//! let mut builder = TableBuilder::create(&[], &[ColumnProperty::OrdinalPosition]).unwrap();
//! builder.set_name("cities").set_schema("main");
//! builder
//!     .add_column()
//!     .unwrap()
//!     .set_name("id")
//!     .set_type("INTEGER")
//!     .set_ordinal_position(1);
//!
//! let table = builder.build().unwrap();
//! assert_eq!(table.columns().unwrap().len(), 1);
//! ```

mod collection;
mod column;
mod foreign_key;
mod provider;
mod sanitize;
mod table;

#[cfg(test)]
mod tests;

pub use collection::{ColumnCollection, TableCollection};
pub use column::{Column, ColumnBuilder, ColumnProperty};
pub use foreign_key::{ForeignKey, ForeignKeyBuilder, ForeignKeyProperty};
pub use provider::MetadataProvider;
pub use sanitize::sanitize_name;
pub use table::{Table, TableBuilder, TableProperty};

use crate::{ExtractorError, Result};

/// A settable property of a builder, partitioned into the ones that are
/// always required and the ones a caller may additionally require.
pub(crate) trait BuilderProperty: Copy + Eq + std::fmt::Debug + 'static {
    /// Name of the built type, used in error messages
    const OBJECT: &'static str;
    const ALWAYS_REQUIRED: &'static [Self];
    const OPTIONALLY_REQUIRED: &'static [Self];

    fn as_str(self) -> &'static str;
}

/// Union of the always-required properties with the caller's selection.
pub(crate) fn required_properties<P: BuilderProperty>(optional: &[P]) -> Result<Vec<P>> {
    let mut required = P::ALWAYS_REQUIRED.to_vec();
    for property in optional {
        if !P::OPTIONALLY_REQUIRED.contains(property) {
            return Err(ExtractorError::InvalidConfig(format!(
                "Property \"{}\" cannot be required in \"{}\".",
                property.as_str(),
                P::OBJECT
            )));
        }
        if !required.contains(property) {
            required.push(*property);
        }
    }
    Ok(required)
}

/// Check every required property is set, reporting the first missing one.
pub(crate) fn ensure_set<P: BuilderProperty>(
    required: &[P],
    is_set: impl Fn(P) -> bool,
) -> Result<()> {
    match required.iter().find(|property| !is_set(**property)) {
        Some(property) => Err(ExtractorError::PropertyNotSet {
            property: property.as_str(),
            object: P::OBJECT,
        }),
        None => Ok(()),
    }
}
