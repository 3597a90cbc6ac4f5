//! The Statement Compiler (`spec.md` §4.4): turns `<configuration>` and
//! `<mapper>` XML documents into a populated [`crate::catalogue::Configuration`].
//!
//! Layered bottom-up: [`dom`] is a generic, mixed-content XML tree (quick-xml
//! as a tokenizer underneath); [`include`] splices `<include>` fragments and
//! substitutes their `<property>` scope before anything else runs;
//! [`sql_node`] turns a spliced element into a [`crate::dynamic_sql::SqlNode`]
//! tree; [`result_map`] and [`statement`] compile `<resultMap>` and
//! `<select>/<insert>/<update>/<delete>` respectively; [`mapper`] drives a
//! whole `<mapper>` document through those, parking forward references on
//! the catalogue; [`configuration_doc`] parses the root `<configuration>`
//! document (settings/environments/databaseIdProvider/mapper locations);
//! [`annotated`] is the second compilation input `spec.md` §4.4 names —
//! method-level annotations on interface declarations — reworked as a
//! builder since Rust traits carry no runtime-inspectable annotations.

pub mod annotated;
pub mod configuration_doc;
pub mod dom;
mod include;
pub mod mapper;
mod result_map;
mod sql_node;
mod statement;

pub use annotated::{compile_annotated_statement, AnnotatedStatement};
pub use configuration_doc::{parse_configuration_document, ConfigurationDocument, MapperLocation};
pub use mapper::compile_mapper_document;

use crate::catalogue::Configuration;
use crate::error::ConfigurationError;

/// Parses the root `<configuration>` document and produces a [`Configuration`]
/// ready to receive mapper documents, plus the `<mappers>` locations it
/// named. Loading each location's XML text is the caller's job (`spec.md`
/// §1: resource/classpath loading is out of scope) — feed the result into
/// [`compile_mapper_document`] once loaded, then call
/// [`crate::catalogue::Configuration::finish_compilation`].
///
/// `environment_id` overrides `<environments default="...">` when given.
/// `database_product_name` is whatever the established connection reports
/// (e.g. `"PostgreSQL"`); it's looked up in `<databaseIdProvider>` to set
/// [`Configuration::database_id`].
pub fn compile_configuration(
    xml: &str,
    environment_id: Option<&str>,
    database_product_name: Option<&str>,
) -> Result<(Configuration, Vec<MapperLocation>), ConfigurationError> {
    let doc = parse_configuration_document(xml)?;
    let mut config = Configuration::new(doc.settings);

    for (name, value) in doc.global_properties {
        config.global_properties.insert(name, value);
    }

    let chosen_id = environment_id.or(doc.default_environment.as_deref());
    if let Some(id) = chosen_id {
        config.environment = doc.environments.into_iter().find(|e| e.id == id);
    }

    if let (Some(provider), Some(product_name)) = (&doc.database_id_provider, database_product_name) {
        config.database_id = provider.resolve(product_name).map(str::to_owned);
    }

    Ok((config, doc.mapper_locations))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compiles_configuration_then_mapper_document_end_to_end() {
        let config_xml = r#"
            <configuration>
                <settings><setting name="mapUnderscoreToCamelCase" value="true"/></settings>
                <environments default="prod">
                    <environment id="prod">
                        <transactionManager type="JDBC"/>
                        <dataSource type="POOLED"/>
                    </environment>
                </environments>
                <databaseIdProvider type="DB_VENDOR">
                    <property name="PostgreSQL" value="postgresql"/>
                </databaseIdProvider>
                <mappers><mapper resource="user.xml"/></mappers>
            </configuration>
        "#;
        let (config, locations) = compile_configuration(config_xml, None, Some("PostgreSQL")).unwrap();
        assert!(config.settings.map_underscore_to_camel_case);
        assert_eq!(config.environment.as_ref().map(|e| e.id.as_str()), Some("prod"));
        assert_eq!(config.database_id.as_deref(), Some("postgresql"));
        assert_eq!(locations.len(), 1);
        assert_eq!(locations[0].resource.as_deref(), Some("user.xml"));

        let mapper_xml = r#"
            <mapper namespace="user">
                <resultMap id="userMap" type="User"><id property="id" column="id"/></resultMap>
                <select id="find" resultMap="userMap">select * from users where id = #{id}</select>
            </mapper>
        "#;
        compile_mapper_document(&config, mapper_xml).unwrap();
        assert!(config.finish_compilation().is_ok());
        assert!(config.has_statement("user.find"));
    }
}
