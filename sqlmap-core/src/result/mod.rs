//! Result-set materialization (`spec.md` §4.7): discriminator dispatch,
//! object instantiation, auto-mapping, nested result composition, and lazy
//! loading.

mod mapper;
pub mod lazy;

pub use mapper::{build_object, map_rows, NestedQueryRunner, NoNestedQueries};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalogue::Configuration;
    use crate::config::Settings;
    use crate::dbtype::LangType;
    use crate::mapping::{ResultMapBuilder, ResultMapping};
    use crate::value::Value;

    fn row(pairs: &[(&str, serde_json::Value)]) -> Value {
        Value::object(pairs.iter().map(|(k, v)| (k.to_string(), v.clone())))
    }

    #[tokio::test]
    async fn maps_simple_columns_to_properties() {
        let config = Configuration::new(Settings::default());
        let result_map = ResultMapBuilder::new("ns.user", LangType::Other("User".into()))
            .mapping(ResultMapping::simple("id", "id"))
            .mapping(ResultMapping::simple("name", "name"))
            .build(|_| None)
            .unwrap();

        let rows = Value::Array(vec![row(&[("id", serde_json::json!(1)), ("name", serde_json::json!("Ada"))])]);
        let mapped = map_rows(&config, &result_map, rows, &config.settings, &NoNestedQueries).await.unwrap();

        assert_eq!(mapped.len(), 1);
        assert_eq!(crate::reflect::get_path(&mapped[0], "name", false), Some(Value::Str("Ada".into())));
    }

    #[tokio::test]
    async fn folds_repeated_parent_rows_into_one_collection() {
        let config = Configuration::new(Settings::default());

        let role = ResultMapBuilder::new("ns.role", LangType::Other("Role".into()))
            .mapping(ResultMapping::simple("id", "role_id"))
            .build(|_| None)
            .unwrap();
        config.add_result_map(role).unwrap();

        let mut collection_mapping = ResultMapping::simple("roles", "");
        collection_mapping.column = None;
        collection_mapping.nested_result_map_id = Some("ns.role".into());
        collection_mapping.is_collection = true;

        let mut id_mapping = ResultMapping::simple("id", "id");
        id_mapping.flags = crate::mapping::ResultMappingFlags::ID;

        let user = ResultMapBuilder::new("ns.userWithRoles", LangType::Other("User".into()))
            .mapping(id_mapping)
            .mapping(collection_mapping)
            .build(|_| None)
            .unwrap();

        let rows = Value::Array(vec![
            row(&[("id", serde_json::json!(1)), ("role_id", serde_json::json!(10))]),
            row(&[("id", serde_json::json!(1)), ("role_id", serde_json::json!(20))]),
        ]);

        let mapped = map_rows(&config, &user, rows, &config.settings, &NoNestedQueries).await.unwrap();
        assert_eq!(mapped.len(), 1);
        let roles = crate::reflect::get_path(&mapped[0], "roles", false).unwrap();
        assert_eq!(roles.as_array().unwrap().len(), 2);
    }
}
