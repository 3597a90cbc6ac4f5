//! Annotation-equivalent statement declarations (`spec.md` §1/§4.4 point
//! (c): "method-level annotations on interface declarations" as a second
//! compilation input alongside mapper documents).
//!
//! Rust traits carry no runtime-inspectable annotations, so there is no
//! host-level equivalent of scanning a method for `@Select`/`@Insert`
//! metadata. The idiomatic stand-in is a fluent builder that a mapper
//! author calls once per interface method, right next to the method's
//! declaration, and that compiles through the exact same `SqlSource`/
//! `ResultMap` pipeline [`super::statement::compile_statement`] uses for a
//! `<select>`/`<insert>`/`<update>`/`<delete>` element — an
//! [`AnnotatedStatement`] builder call plays the role one annotation plays
//! in the source system. The SQL text is reparsed through [`parse_fragment`]
//! so dynamic tags (`<if>`, `<foreach>`, ...) work inside an annotated body
//! exactly as they would inside a `<script>`-wrapped annotation body.

use std::collections::HashMap;

use crate::catalogue::Configuration;
use crate::compiler::dom::{parse_fragment, XmlElement};
use crate::compiler::statement::compile_statement;
use crate::error::ConfigurationError;
use crate::mapping::CommandKind;

/// One annotation-equivalent statement declaration. Construct with
/// [`AnnotatedStatement::select`]/`insert`/`update`/`delete`, chain the
/// builder methods that correspond to the annotation's optional members,
/// then pass to [`compile_annotated_statement`].
pub struct AnnotatedStatement {
    command: CommandKind,
    id: String,
    sql: String,
    result_map: Option<String>,
    result_type: Option<String>,
    key_property: Vec<String>,
    key_column: Vec<String>,
    use_generated_keys: Option<bool>,
    flush_cache: Option<bool>,
    use_cache: Option<bool>,
    timeout: Option<u32>,
    fetch_size: Option<u32>,
    database_id: Option<String>,
    result_sets: Vec<String>,
}

impl AnnotatedStatement {
    fn new(command: CommandKind, id: impl Into<String>, sql: impl Into<String>) -> Self {
        Self {
            command,
            id: id.into(),
            sql: sql.into(),
            result_map: None,
            result_type: None,
            key_property: Vec::new(),
            key_column: Vec::new(),
            use_generated_keys: None,
            flush_cache: None,
            use_cache: None,
            timeout: None,
            fetch_size: None,
            database_id: None,
            result_sets: Vec::new(),
        }
    }

    /// The Rust analogue of `@Select("...")`.
    pub fn select(id: impl Into<String>, sql: impl Into<String>) -> Self {
        Self::new(CommandKind::Select, id, sql)
    }

    /// The Rust analogue of `@Insert("...")`.
    pub fn insert(id: impl Into<String>, sql: impl Into<String>) -> Self {
        Self::new(CommandKind::Insert, id, sql)
    }

    /// The Rust analogue of `@Update("...")`.
    pub fn update(id: impl Into<String>, sql: impl Into<String>) -> Self {
        Self::new(CommandKind::Update, id, sql)
    }

    /// The Rust analogue of `@Delete("...")`.
    pub fn delete(id: impl Into<String>, sql: impl Into<String>) -> Self {
        Self::new(CommandKind::Delete, id, sql)
    }

    /// The Rust analogue of `@Results(id = "...")` referencing a
    /// previously declared (XML- or annotation-built) `ResultMap`.
    pub fn result_map(mut self, id: impl Into<String>) -> Self {
        self.result_map = Some(id.into());
        self
    }

    /// The Rust analogue of a bare `@Select` with no `@Results`: an
    /// anonymous auto-mapping result map over the named output type.
    pub fn result_type(mut self, ty: impl Into<String>) -> Self {
        self.result_type = Some(ty.into());
        self
    }

    /// The Rust analogue of `@Options(useGeneratedKeys = true, keyProperty =
    /// "...", keyColumn = "...")`.
    pub fn generated_keys(mut self, key_property: impl Into<String>, key_column: impl Into<String>) -> Self {
        self.use_generated_keys = Some(true);
        self.key_property = key_property.into().split(',').map(|s| s.trim().to_owned()).filter(|s| !s.is_empty()).collect();
        self.key_column = key_column.into().split(',').map(|s| s.trim().to_owned()).filter(|s| !s.is_empty()).collect();
        self
    }

    pub fn flush_cache(mut self, flush: bool) -> Self {
        self.flush_cache = Some(flush);
        self
    }

    pub fn use_cache(mut self, use_cache: bool) -> Self {
        self.use_cache = Some(use_cache);
        self
    }

    pub fn timeout(mut self, seconds: u32) -> Self {
        self.timeout = Some(seconds);
        self
    }

    pub fn fetch_size(mut self, size: u32) -> Self {
        self.fetch_size = Some(size);
        self
    }

    pub fn database_id(mut self, id: impl Into<String>) -> Self {
        self.database_id = Some(id.into());
        self
    }

    /// The Rust analogue of `@ResultSets("one,two")` for a multi-result-set
    /// callable statement (`spec.md` §3's `ResultMapping::foreign_column`
    /// pairing, §9's "multi-result-set linking ... unstable" caveat).
    pub fn result_sets(mut self, names: impl Into<String>) -> Self {
        self.result_sets = names.into().split(',').map(|s| s.trim().to_owned()).filter(|s| !s.is_empty()).collect();
        self
    }

    fn tag(&self) -> &'static str {
        match self.command {
            CommandKind::Select => "select",
            CommandKind::Insert => "insert",
            CommandKind::Update => "update",
            CommandKind::Delete => "delete",
            CommandKind::Flush | CommandKind::Unknown => "select",
        }
    }
}

/// Compiles one [`AnnotatedStatement`] into `config`, the same way
/// [`compile_statement`] compiles a markup element — because it *is*
/// [`compile_statement`], fed a synthetic [`XmlElement`] built from the
/// builder's fields instead of one parsed off a `<mapper>` document.
pub fn compile_annotated_statement(
    stmt: AnnotatedStatement,
    namespace: &str,
    config: &Configuration,
    use_generated_keys_default: bool,
) -> Result<(), ConfigurationError> {
    let mut attrs = HashMap::new();
    attrs.insert("id".to_owned(), stmt.id.clone());
    if let Some(rm) = &stmt.result_map {
        attrs.insert("resultMap".to_owned(), rm.clone());
    }
    if let Some(rt) = &stmt.result_type {
        attrs.insert("resultType".to_owned(), rt.clone());
    }
    if !stmt.key_property.is_empty() {
        attrs.insert("keyProperty".to_owned(), stmt.key_property.join(","));
    }
    if !stmt.key_column.is_empty() {
        attrs.insert("keyColumn".to_owned(), stmt.key_column.join(","));
    }
    if let Some(v) = stmt.use_generated_keys {
        attrs.insert("useGeneratedKeys".to_owned(), v.to_string());
    }
    if let Some(v) = stmt.flush_cache {
        attrs.insert("flushCache".to_owned(), v.to_string());
    }
    if let Some(v) = stmt.use_cache {
        attrs.insert("useCache".to_owned(), v.to_string());
    }
    if let Some(v) = stmt.timeout {
        attrs.insert("timeout".to_owned(), v.to_string());
    }
    if let Some(v) = stmt.fetch_size {
        attrs.insert("fetchSize".to_owned(), v.to_string());
    }
    if let Some(v) = &stmt.database_id {
        attrs.insert("databaseId".to_owned(), v.clone());
    }
    if !stmt.result_sets.is_empty() {
        attrs.insert("resultSets".to_owned(), stmt.result_sets.join(","));
    }

    let children = parse_fragment(&stmt.sql)?;
    let element = XmlElement { name: stmt.tag().to_owned(), attrs, children };
    compile_statement(&element, namespace, config, use_generated_keys_default)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;

    fn config() -> Configuration {
        Configuration::new(Settings::default())
    }

    #[test]
    fn annotated_select_compiles_like_markup() {
        let cfg = config();
        let stmt = AnnotatedStatement::select("find", "select id from t where id = #{id}").result_type("i64");
        compile_annotated_statement(stmt, "ns", &cfg, false).unwrap();
        let ms = cfg.statement("ns.find").unwrap();
        assert_eq!(ms.command, CommandKind::Select);
        match &*ms.sql_source {
            crate::mapping::SqlSource::Static { sql, parameter_mappings } => {
                assert_eq!(sql, "select id from t where id = ?");
                assert_eq!(parameter_mappings.len(), 1);
            }
            _ => panic!("expected static source"),
        }
    }

    #[test]
    fn annotated_insert_with_generated_keys() {
        let cfg = config();
        let stmt = AnnotatedStatement::insert("create", "insert into t(name) values(#{name})").generated_keys("id", "id");
        compile_annotated_statement(stmt, "ns", &cfg, false).unwrap();
        let ms = cfg.statement("ns.create").unwrap();
        assert_eq!(ms.key_properties, vec!["id".to_owned()]);
    }

    #[test]
    fn annotated_body_supports_dynamic_tags() {
        let cfg = config();
        let stmt = AnnotatedStatement::select(
            "find",
            r#"select * from t <where><if test="id != null">id = #{id}</if></where>"#,
        );
        compile_annotated_statement(stmt, "ns", &cfg, false).unwrap();
        let ms = cfg.statement("ns.find").unwrap();
        assert!(matches!(&*ms.sql_source, crate::mapping::SqlSource::Dynamic { .. }));
    }

    #[test]
    fn annotated_statement_can_reference_xml_declared_result_map() {
        let cfg = config();
        let result_map = crate::mapping::ResultMapBuilder::new("ns.userMap".to_owned(), crate::dbtype::LangType::parse("User"))
            .build(|_| None)
            .unwrap();
        cfg.add_result_map(result_map).unwrap();
        let stmt = AnnotatedStatement::select("find", "select * from users where id = #{id}").result_map("userMap");
        compile_annotated_statement(stmt, "ns", &cfg, false).unwrap();
        let ms = cfg.statement("ns.find").unwrap();
        assert_eq!(ms.result_maps.len(), 1);
        assert_eq!(ms.result_maps[0].id, "ns.userMap");
    }
}
