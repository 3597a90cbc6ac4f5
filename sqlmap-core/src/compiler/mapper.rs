//! Compiles a whole `<mapper namespace="...">` document (`spec.md` §4.4/§6)
//! into the catalogue: SQL fragments, `<cache>`/`<cache-ref>`, `<resultMap>`s
//! (with deferred retry), and every statement element.

use std::time::Duration;

use crate::cache::{CacheBuilder, Eviction};
use crate::catalogue::{qualify, DeferredResultMap, DeferredStatement};
use crate::catalogue::Configuration;
use crate::compiler::dom::{parse_document, serialize_children};
use crate::compiler::result_map::build_result_map;
use crate::compiler::statement::compile_statement;
use crate::error::{ConfigurationError, IncompleteElement};

const STATEMENT_TAGS: &[&str] = &["select", "insert", "update", "delete"];

/// Parses and compiles `xml` as one mapper document, registering everything
/// it declares into `config`. Forward references that can't resolve yet
/// (an `extends` parent, a statement's `resultMap`/`<include>` naming
/// something not yet compiled) are parked for the catalogue's
/// end-of-compilation retry sweep (`spec.md` §4.4) rather than failing the
/// whole document.
pub fn compile_mapper_document(config: &Configuration, xml: &str) -> Result<(), ConfigurationError> {
    let root = parse_document(xml)?;
    if root.name != "mapper" {
        return Err(ConfigurationError::MalformedDocument {
            namespace: String::new(),
            reason: format!("expected root element <mapper>, found <{}>", root.name),
        });
    }
    let namespace = root
        .attr("namespace")
        .ok_or_else(|| ConfigurationError::MalformedDocument { namespace: String::new(), reason: "<mapper> missing namespace".into() })?
        .to_owned();

    for sql in root.child_elements_named("sql") {
        let local_id = sql.attr("id").ok_or_else(|| ConfigurationError::MalformedDocument {
            namespace: namespace.clone(),
            reason: "<sql> missing id".into(),
        })?;
        config.add_sql_fragment(qualify(&namespace, local_id), serialize_children(&sql.children));
    }

    if let Some(cache_elem) = root.first_child_named("cache") {
        let cache = build_cache(cache_elem, &namespace);
        config.add_cache(namespace.clone(), cache)?;
    }
    for cache_ref in root.child_elements_named("cache-ref") {
        let target = cache_ref.attr("namespace").ok_or_else(|| ConfigurationError::MalformedDocument {
            namespace: namespace.clone(),
            reason: "<cache-ref> missing namespace".into(),
        })?;
        config.add_cache_ref(&namespace, target);
    }

    for rm_elem in root.child_elements_named("resultMap") {
        let builder = build_result_map(rm_elem, &namespace, config)?;
        match builder.clone().build(|pid| config.result_map(pid).map(|a| (*a).clone())) {
            Ok(result_map) => config.add_result_map(result_map)?,
            Err(_incomplete) => config.park_result_map(DeferredResultMap { builder }),
        }
    }

    let use_generated_keys_default = config.settings.use_generated_keys;
    for tag in STATEMENT_TAGS {
        for stmt_elem in root.child_elements_named(tag) {
            match compile_statement(stmt_elem, &namespace, config, use_generated_keys_default) {
                Ok(()) => {}
                Err(ConfigurationError::UnresolvedReference { reference, .. }) => {
                    let local_id = stmt_elem.attr("id").unwrap_or("?");
                    let id = qualify(&namespace, local_id);
                    let element = stmt_elem.clone();
                    let namespace = namespace.clone();
                    let parked_id = id.clone();
                    let awaiting = reference.clone();
                    config.park_statement(DeferredStatement {
                        id,
                        awaiting: reference,
                        retry: Box::new(move |cfg| {
                            compile_statement(&element, &namespace, cfg, use_generated_keys_default).map_err(|_| {
                                IncompleteElement { id: parked_id.clone(), awaiting: awaiting.clone() }
                            })
                        }),
                    });
                }
                Err(e) => return Err(e),
            }
        }
    }

    Ok(())
}

fn build_cache(element: &crate::compiler::dom::XmlElement, namespace: &str) -> crate::cache::Cache {
    let mut builder = CacheBuilder::new(namespace);
    if let Some(eviction) = element.attr("eviction") {
        builder = builder.eviction(match eviction {
            "FIFO" => Eviction::Fifo,
            _ => Eviction::Lru,
        });
    }
    if let Some(size) = element.attr("size").and_then(|v| v.parse().ok()) {
        builder = builder.size(size);
    }
    let blocking = element.attr("blocking").map(|v| v.eq_ignore_ascii_case("true")).unwrap_or(false);
    let timeout = element.attr("blockingTimeout").and_then(|v| v.parse().ok()).map(Duration::from_millis);
    builder = builder.blocking(blocking, timeout);
    builder.build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;

    #[test]
    fn compiles_full_document_with_fragment_cache_and_statement() {
        let config = Configuration::new(Settings::default());
        let xml = r#"
            <mapper namespace="user">
                <cache eviction="LRU" size="512"/>
                <sql id="cols">id, name</sql>
                <resultMap id="userMap" type="User">
                    <id property="id" column="id"/>
                    <result property="name" column="name"/>
                </resultMap>
                <select id="find" resultMap="userMap">
                    select <include refid="cols"/> from users where id = #{id}
                </select>
            </mapper>
        "#;
        compile_mapper_document(&config, xml).unwrap();
        assert!(config.has_statement("user.find"));
        assert!(config.result_map("user.userMap").is_some());
        assert!(config.cache("user").is_some());
        assert!(config.finish_compilation().is_ok());
    }

    #[test]
    fn statement_referencing_another_namespaces_not_yet_built_result_map_is_parked_then_resolved() {
        let config = Configuration::new(Settings::default());
        let order_doc = r#"
            <mapper namespace="order">
                <select id="find" resultMap="item.itemMap">select * from orders</select>
            </mapper>
        "#;
        compile_mapper_document(&config, order_doc).unwrap();
        // Not yet built: the statement should be parked, not registered.
        assert!(!config.has_statement("order.find"));

        let item_doc = r#"
            <mapper namespace="item">
                <resultMap id="itemMap" type="Item"><id property="id" column="id"/></resultMap>
            </mapper>
        "#;
        compile_mapper_document(&config, item_doc).unwrap();

        assert!(config.finish_compilation().is_ok());
        assert!(config.has_statement("order.find"));
    }

    #[test]
    fn cross_document_cache_ref_resolves_after_sweep() {
        let config = Configuration::new(Settings::default());
        compile_mapper_document(&config, r#"<mapper namespace="b"><cache-ref namespace="a"/></mapper>"#).unwrap();
        compile_mapper_document(&config, r#"<mapper namespace="a"><cache/></mapper>"#).unwrap();
        assert!(config.finish_compilation().is_ok());
        assert!(config.cache("b").is_some());
    }
}
