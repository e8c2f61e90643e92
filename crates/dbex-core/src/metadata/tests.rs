//! Tests for the metadata module

use super::*;
use crate::ExtractorError;

fn column(name: &str, position: Option<u32>) -> Column {
    let mut builder = ColumnBuilder::new();
    builder.set_name(name).set_type("INTEGER");
    if let Some(position) = position {
        builder.set_ordinal_position(position);
    }
    builder.build().unwrap()
}

fn table(name: &str, schema: &str) -> Table {
    let mut builder = TableBuilder::new();
    builder.set_name(name).set_schema(schema);
    builder.set_columns_not_expected().unwrap();
    builder.build().unwrap()
}

mod column_builder_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_missing_type_is_reported() {
        let err = ColumnBuilder::new().set_name("x").build().unwrap_err();
        assert!(matches!(
            err,
            ExtractorError::PropertyNotSet {
                property: "type",
                object: "Column"
            }
        ));
        assert_eq!(err.to_string(), "Property \"type\" is not set in \"Column\".");
    }

    #[test]
    fn test_name_derives_sanitized_name() {
        let column = ColumnBuilder::new()
            .set_name("first name")
            .set_type("TEXT")
            .build()
            .unwrap();
        assert_eq!(column.name(), "first name");
        assert_eq!(column.sanitized_name(), "first_name");

        let column = ColumnBuilder::new()
            .set_name("first name")
            .set_sanitized_name("fname")
            .set_type("TEXT")
            .build()
            .unwrap();
        assert_eq!(column.sanitized_name(), "fname");
    }

    #[test]
    fn test_optional_required_property() {
        let mut builder = ColumnBuilder::create(&[ColumnProperty::OrdinalPosition]).unwrap();
        builder.set_name("id").set_type("INTEGER");
        let err = builder.build().unwrap_err();
        assert_eq!(
            err.to_string(),
            "Property \"ordinalPosition\" is not set in \"Column\"."
        );

        builder.set_ordinal_position(1);
        assert_eq!(builder.build().unwrap().ordinal_position(), Some(1));
    }

    #[test]
    fn test_always_required_cannot_be_selected() {
        let err = ColumnBuilder::create(&[ColumnProperty::Name]).unwrap_err();
        assert!(matches!(err, ExtractorError::InvalidConfig(_)));
    }

    #[test]
    fn test_default_and_foreign_key() {
        let mut builder = ColumnBuilder::create(&[ColumnProperty::Default]).unwrap();
        builder
            .set_name("country_id")
            .set_type("INTEGER")
            .set_default(None)
            .add_constraint("fk_country");
        builder
            .add_foreign_key()
            .set_name("fk_country")
            .set_ref_table("countries")
            .set_ref_column("id");

        let column = builder.build().unwrap();
        assert!(!column.has_default());
        assert_eq!(column.default(), None);
        let fk = column.foreign_key().unwrap();
        assert_eq!(fk.ref_table(), "countries");
        assert_eq!(fk.ref_column(), "id");
        assert_eq!(column.constraints(), &["fk_country".to_string()]);
    }

    #[test]
    fn test_incomplete_foreign_key_fails_column() {
        let mut builder = ColumnBuilder::new();
        builder.set_name("country_id").set_type("INTEGER");
        builder.add_foreign_key().set_ref_table("countries");

        let err = builder.build().unwrap_err();
        assert_eq!(
            err.to_string(),
            "Property \"refColumn\" is not set in \"ForeignKey\"."
        );
    }
}

mod table_builder_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_columns_required_by_default() {
        let err = TableBuilder::new().set_name("cities").build().unwrap_err();
        assert_eq!(err.to_string(), "Property \"columns\" is not set in \"Table\".");
    }

    #[test]
    fn test_columns_not_expected() {
        let table = table("cities", "main");
        assert!(!table.has_columns());
        assert!(matches!(
            table.columns().unwrap_err(),
            ExtractorError::InvalidState(_)
        ));
    }

    #[test]
    fn test_columns_not_expected_conflicts() {
        let mut builder = TableBuilder::new();
        builder.add_column().unwrap().set_name("id").set_type("INTEGER");
        assert!(builder.set_columns_not_expected().is_err());

        let mut builder = TableBuilder::new();
        builder.set_columns_not_expected().unwrap();
        assert!(builder.add_column().is_err());
    }

    #[test]
    fn test_column_requirements_propagate() {
        let mut builder =
            TableBuilder::create(&[TableProperty::Schema], &[ColumnProperty::Nullable]).unwrap();
        builder.set_name("cities").set_schema("main");
        builder.add_column().unwrap().set_name("id").set_type("INTEGER");

        let err = builder.build().unwrap_err();
        assert_eq!(
            err.to_string(),
            "Property \"nullable\" is not set in \"Column\"."
        );
    }

    #[test]
    fn test_invalid_column_requirement_rejected_at_create() {
        assert!(TableBuilder::create(&[], &[ColumnProperty::Type]).is_err());
        assert!(TableBuilder::create(&[TableProperty::Columns], &[]).is_err());
    }

    #[test]
    fn test_build_table() {
        let mut builder = TableBuilder::create(&[TableProperty::RowCount], &[]).unwrap();
        builder
            .set_name("Big Cities")
            .set_schema("main")
            .set_type("table")
            .set_row_count(6);
        builder
            .add_column()
            .unwrap()
            .set_name("name")
            .set_type("TEXT")
            .set_ordinal_position(2);
        builder
            .add_column()
            .unwrap()
            .set_name("id")
            .set_type("INTEGER")
            .set_primary_key(true)
            .set_ordinal_position(1);

        let table = builder.build().unwrap();
        assert_eq!(table.sanitized_name(), "Big_Cities");
        assert_eq!(table.row_count(), Some(6));
        assert_eq!(table.columns().unwrap().names(), vec!["id", "name"]);
        assert!(table.columns().unwrap().get_by_name("ID").unwrap().is_primary_key());
    }
}

mod collection_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_columns_sorted_by_ordinal_position() {
        let collection = ColumnCollection::new(vec![
            column("c", Some(3)),
            column("a", Some(1)),
            column("b", Some(2)),
        ]);
        let positions: Vec<_> = collection.iter().map(|c| c.ordinal_position()).collect();
        assert_eq!(positions, vec![Some(1), Some(2), Some(3)]);
    }

    #[test]
    fn test_unpositioned_columns_sort_last_and_stay_stable() {
        let collection = ColumnCollection::new(vec![
            column("x", None),
            column("b", Some(2)),
            column("y", None),
            column("a", Some(1)),
            column("a2", Some(1)),
        ]);
        assert_eq!(collection.names(), vec!["a", "a2", "b", "x", "y"]);
    }

    #[test]
    fn test_column_lookup() {
        let collection = ColumnCollection::new(vec![column("Population", Some(1))]);
        assert_eq!(collection.get_by_name("population").unwrap().name(), "Population");
        assert!(matches!(
            collection.get_by_name("area").unwrap_err(),
            ExtractorError::NotFound(_)
        ));
    }

    #[test]
    fn test_table_lookup_is_case_insensitive() {
        let collection = TableCollection::new(vec![table("abc", "test"), table("def", "test")]);
        let found = collection.get_by_name_and_schema("ABC", "Test").unwrap();
        assert_eq!(found.name(), "abc");
        assert_eq!(found.schema(), Some("test"));

        assert!(matches!(
            collection.get_by_name_and_schema("abc", "other").unwrap_err(),
            ExtractorError::NotFound(_)
        ));
    }

    #[test]
    fn test_table_lookup_by_name_in_any_schema() {
        let collection = TableCollection::new(vec![table("abc", "test"), table("def", "main")]);
        assert_eq!(collection.get_by_name("DEF").unwrap().schema(), Some("main"));
        assert!(matches!(
            collection.get_by_name("ghi").unwrap_err(),
            ExtractorError::NotFound(_)
        ));
    }
}

mod provider_tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use crate::{Result, TableId};
    use async_trait::async_trait;

    struct FixedSchema;

    #[async_trait]
    impl MetadataProvider for FixedSchema {
        async fn list_tables(
            &self,
            _whitelist: Option<&[TableId]>,
            _load_columns: bool,
        ) -> Result<TableCollection> {
            Ok(TableCollection::new(vec![table("cities", "main")]))
        }
    }

    #[tokio::test]
    async fn test_get_table_with_empty_schema() {
        let found = FixedSchema.get_table(&TableId::new("", "Cities")).await.unwrap();
        assert_eq!(found.schema(), Some("main"));
    }

    #[tokio::test]
    async fn test_get_table_with_other_schema_is_not_found() {
        let err = FixedSchema
            .get_table(&TableId::new("public", "cities"))
            .await
            .unwrap_err();
        assert!(matches!(err, ExtractorError::NotFound(_)));
    }
}
