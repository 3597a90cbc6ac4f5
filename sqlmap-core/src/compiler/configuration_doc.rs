//! Parses the root `<configuration>` document (`spec.md` §6): `<properties>`,
//! `<settings>`, `<environments>`, `<databaseIdProvider>`, and the
//! `<mappers>` location list.
//!
//! Actually loading a `<mappers><mapper resource="..."/></mappers>` entry
//! from disk/classpath is the "outer CLI/configuration loader" `spec.md`
//! §1 calls out of scope; this module only parses the document into a
//! [`ConfigurationDocument`] the caller combines with whatever mapper XML
//! text it already has (see [`crate::compiler::compile_configuration`]).
//!
//! `<typeAliases>`, `<plugins>`, `<objectFactory>`, `<objectWrapperFactory>`
//! and `<reflectorFactory>` parse without error (this reader looks up
//! children by name rather than rejecting unrecognised ones) but are
//! otherwise inert: `spec.md` §2/§4 names nine components and none of them
//! is an interceptor chain or a pluggable object-construction/reflection
//! facility — aliasing is handled by callers passing full type names, and
//! object construction/reflection are `reflect::Reflect` (`spec.md` §9's
//! named stand-in for host reflection), not a swappable factory.

use std::collections::HashMap;

use crate::compiler::dom::parse_document;
use crate::config::{DatabaseIdProvider, Environment, Settings};
use crate::error::ConfigurationError;

/// One `<mappers><mapper .../></mappers>` entry, naming where a mapper
/// document can be found. Left unresolved here — the caller's loader picks
/// the field that applies to its environment.
#[derive(Debug, Clone, Default)]
pub struct MapperLocation {
    pub resource: Option<String>,
    pub url: Option<String>,
    pub class: Option<String>,
}

/// The parsed `<configuration>` document, before any mapper document has
/// been compiled.
pub struct ConfigurationDocument {
    pub settings: Settings,
    pub global_properties: HashMap<String, String>,
    pub environments: Vec<Environment>,
    pub default_environment: Option<String>,
    pub database_id_provider: Option<DatabaseIdProvider>,
    pub mapper_locations: Vec<MapperLocation>,
}

pub fn parse_configuration_document(xml: &str) -> Result<ConfigurationDocument, ConfigurationError> {
    let root = parse_document(xml)?;
    if root.name != "configuration" {
        return Err(ConfigurationError::MalformedDocument {
            namespace: String::new(),
            reason: format!("expected root element <configuration>, found <{}>", root.name),
        });
    }

    let mut global_properties = HashMap::new();
    if let Some(props) = root.first_child_named("properties") {
        for prop in props.child_elements_named("property") {
            let (Some(name), Some(value)) = (prop.attr("name"), prop.attr("value")) else { continue };
            global_properties.insert(name.to_owned(), value.to_owned());
        }
    }

    let mut settings = Settings::default();
    if let Some(settings_elem) = root.first_child_named("settings") {
        for setting in settings_elem.child_elements_named("setting") {
            let (Some(name), Some(value)) = (setting.attr("name"), setting.attr("value")) else { continue };
            settings.apply(name, value)?;
        }
    }

    let mut environments = Vec::new();
    let mut default_environment = None;
    if let Some(envs) = root.first_child_named("environments") {
        default_environment = envs.attr("default").map(str::to_owned);
        for env_elem in envs.child_elements_named("environment") {
            let id = env_elem.attr("id").ok_or_else(|| ConfigurationError::MalformedDocument {
                namespace: String::new(),
                reason: "<environment> missing id".into(),
            })?;
            let tx_type = env_elem
                .first_child_named("transactionManager")
                .and_then(|e| e.attr("type"))
                .unwrap_or("JDBC");
            let ds_elem = env_elem.first_child_named("dataSource");
            let ds_type = ds_elem.and_then(|e| e.attr("type")).unwrap_or("UNPOOLED");
            let mut environment = Environment::new(id, tx_type, ds_type);
            if let Some(ds) = ds_elem {
                for prop in ds.child_elements_named("property") {
                    let (Some(name), Some(value)) = (prop.attr("name"), prop.attr("value")) else { continue };
                    environment.properties.insert(name.to_owned(), value.to_owned());
                }
            }
            environments.push(environment);
        }
    }

    let database_id_provider = root.first_child_named("databaseIdProvider").map(|provider| {
        let mut aliases = HashMap::new();
        for prop in provider.child_elements_named("property") {
            let (Some(name), Some(value)) = (prop.attr("name"), prop.attr("value")) else { continue };
            aliases.insert(name.to_owned(), value.to_owned());
        }
        DatabaseIdProvider::new(aliases)
    });

    let mut mapper_locations = Vec::new();
    if let Some(mappers) = root.first_child_named("mappers") {
        for mapper_elem in mappers.child_elements_named("mapper") {
            mapper_locations.push(MapperLocation {
                resource: mapper_elem.attr("resource").map(str::to_owned),
                url: mapper_elem.attr("url").map(str::to_owned),
                class: mapper_elem.attr("class").map(str::to_owned),
            });
        }
    }

    Ok(ConfigurationDocument {
        settings,
        global_properties,
        environments,
        default_environment,
        database_id_provider,
        mapper_locations,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_settings_and_environment() {
        let xml = r#"
            <configuration>
                <settings>
                    <setting name="mapUnderscoreToCamelCase" value="true"/>
                    <setting name="defaultExecutorType" value="REUSE"/>
                </settings>
                <environments default="dev">
                    <environment id="dev">
                        <transactionManager type="JDBC"/>
                        <dataSource type="POOLED">
                            <property name="url" value="postgres://localhost/dev"/>
                        </dataSource>
                    </environment>
                </environments>
                <mappers>
                    <mapper resource="mappers/user.xml"/>
                </mappers>
            </configuration>
        "#;
        let doc = parse_configuration_document(xml).unwrap();
        assert!(doc.settings.map_underscore_to_camel_case);
        assert_eq!(doc.default_environment.as_deref(), Some("dev"));
        assert_eq!(doc.environments.len(), 1);
        assert_eq!(doc.environments[0].properties.get("url").map(String::as_str), Some("postgres://localhost/dev"));
        assert_eq!(doc.mapper_locations.len(), 1);
        assert_eq!(doc.mapper_locations[0].resource.as_deref(), Some("mappers/user.xml"));
    }

    #[test]
    fn unknown_setting_is_an_error() {
        let xml = r#"<configuration><settings><setting name="bogus" value="x"/></settings></configuration>"#;
        assert!(parse_configuration_document(xml).is_err());
    }

    #[test]
    fn inert_sections_parse_without_error() {
        let xml = r#"
            <configuration>
                <typeAliases><typeAlias alias="User" type="app.User"/></typeAliases>
                <plugins><plugin interceptor="app.AuditInterceptor"/></plugins>
                <objectFactory type="app.CustomObjectFactory"/>
                <objectWrapperFactory type="app.CustomWrapperFactory"/>
                <reflectorFactory type="app.CustomReflectorFactory"/>
            </configuration>
        "#;
        assert!(parse_configuration_document(xml).is_ok());
    }
}
