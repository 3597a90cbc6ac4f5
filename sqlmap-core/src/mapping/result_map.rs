use std::collections::HashSet;

use crate::dbtype::{DbType, LangType};
use crate::error::IncompleteElement;

/// Flags on a [`ResultMapping`] (`spec.md` §3: "flags `{ID, CONSTRUCTOR}`").
/// A plain struct rather than a bitflags-style type: the pack carries no
/// bitflags crate, and two booleans need no bit-packing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResultMappingFlags {
    pub id: bool,
    pub constructor: bool,
}

impl ResultMappingFlags {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn contains(&self, other: Self) -> bool {
        (!other.id || self.id) && (!other.constructor || self.constructor)
    }

    pub const ID: Self = Self { id: true, constructor: false };
    pub const CONSTRUCTOR: Self = Self { id: false, constructor: true };
}

/// One property/column pairing inside a [`ResultMap`] (`spec.md` §3).
#[derive(Debug, Clone)]
pub struct ResultMapping {
    pub property: String,
    pub column: Option<String>,
    pub lang_type: Option<LangType>,
    pub db_type: Option<DbType>,
    pub type_handler: Option<String>,
    pub flags: ResultMappingFlags,
    pub nested_query_id: Option<String>,
    pub nested_result_map_id: Option<String>,
    pub column_prefix: Option<String>,
    pub not_null_columns: HashSet<String>,
    pub composite: Vec<(String, String)>,
    pub lazy: bool,
    pub foreign_column: Option<String>,
    pub result_set: Option<String>,
    /// `<collection>` (true) vs `<association>` (false) — distinguishes a
    /// nested result map that accumulates into a list across rows from one
    /// that embeds a single nested object (`spec.md` §4.7 point 6, §6
    /// grammar). Meaningless unless `nested_result_map_id`/`nested_query_id`
    /// is set.
    pub is_collection: bool,
}

impl ResultMapping {
    pub fn simple(property: impl Into<String>, column: impl Into<String>) -> Self {
        Self {
            property: property.into(),
            column: Some(column.into()),
            lang_type: None,
            db_type: None,
            type_handler: None,
            flags: ResultMappingFlags::empty(),
            nested_query_id: None,
            nested_result_map_id: None,
            column_prefix: None,
            not_null_columns: HashSet::new(),
            composite: Vec::new(),
            lazy: false,
            foreign_column: None,
            result_set: None,
            is_collection: false,
        }
    }

    pub fn collection(mut self, value: bool) -> Self {
        self.is_collection = value;
        self
    }

    pub fn is_constructor_arg(&self) -> bool {
        self.flags.contains(ResultMappingFlags::CONSTRUCTOR)
    }

    pub fn is_id(&self) -> bool {
        self.flags.contains(ResultMappingFlags::ID)
    }
}

/// A [`ResultMapping`] whose value selects the next `ResultMap` id
/// (`spec.md` §3).
#[derive(Debug, Clone)]
pub struct Discriminator {
    pub column: String,
    pub lang_type: LangType,
    pub cases: Vec<(String, String)>,
}

impl Discriminator {
    pub fn resolve(&self, value: &str) -> Option<&str> {
        self.cases.iter().find(|(case, _)| case == value).map(|(_, id)| id.as_str())
    }
}

/// A declarative schema for materializing a row into an object (`spec.md`
/// §3).
#[derive(Debug, Clone)]
pub struct ResultMap {
    pub id: String,
    pub lang_type: LangType,
    pub mappings: Vec<ResultMapping>,
    pub discriminator: Option<Discriminator>,
    pub auto_mapping: Option<bool>,
    pub has_nested_result_maps: bool,
    pub has_nested_queries: bool,
}

impl ResultMap {
    pub fn id_mappings(&self) -> impl Iterator<Item = &ResultMapping> {
        self.mappings.iter().filter(|m| m.is_id())
    }

    pub fn constructor_mappings(&self) -> impl Iterator<Item = &ResultMapping> {
        self.mappings.iter().filter(|m| m.is_constructor_arg())
    }

    pub fn property_mappings(&self) -> impl Iterator<Item = &ResultMapping> {
        self.mappings.iter().filter(|m| !m.is_constructor_arg())
    }

    pub fn mapped_columns(&self) -> HashSet<String> {
        self.mappings.iter().filter_map(|m| m.column.clone()).collect()
    }

    pub fn mapped_properties(&self) -> HashSet<String> {
        self.mappings.iter().map(|m| m.property.clone()).collect()
    }
}

/// Builds a [`ResultMap`], applying `extends` inheritance (`spec.md` §3):
/// the child's own mappings are unioned with the parent's, minus any
/// parent mapping whose property the child also declares; if the child
/// declares any constructor mapping, every inherited constructor mapping is
/// dropped (the child's constructor fully replaces the parent's).
///
/// Grounded in the catalogue's own deferred-retry shape
/// (`spec.md` §4.4/§9): a builder that names an `extends` parent not yet
/// compiled returns [`IncompleteElement`] instead of failing outright, so
/// the catalogue can park and retry it at the end of compilation.
#[derive(Clone)]
pub struct ResultMapBuilder {
    id: String,
    lang_type: LangType,
    extends: Option<String>,
    own_mappings: Vec<ResultMapping>,
    discriminator: Option<Discriminator>,
    auto_mapping: Option<bool>,
}

impl ResultMapBuilder {
    pub fn new(id: impl Into<String>, lang_type: LangType) -> Self {
        Self {
            id: id.into(),
            lang_type,
            extends: None,
            own_mappings: Vec::new(),
            discriminator: None,
            auto_mapping: None,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn extends_id(&self) -> Option<&str> {
        self.extends.as_deref()
    }

    pub fn extends(mut self, parent_id: impl Into<String>) -> Self {
        self.extends = Some(parent_id.into());
        self
    }

    pub fn mapping(mut self, mapping: ResultMapping) -> Self {
        self.own_mappings.push(mapping);
        self
    }

    pub fn discriminator(mut self, discriminator: Discriminator) -> Self {
        self.discriminator = Some(discriminator);
        self
    }

    pub fn auto_mapping(mut self, value: bool) -> Self {
        self.auto_mapping = Some(value);
        self
    }

    /// Resolves `extends` against `lookup` (typically
    /// `Configuration::result_map`), returning [`IncompleteElement`] if the
    /// parent is named but not yet built.
    pub fn build(self, lookup: impl Fn(&str) -> Option<ResultMap>) -> Result<ResultMap, IncompleteElement> {
        let mut mappings = Vec::new();
        let mut has_own_constructor = self.own_mappings.iter().any(|m| m.is_constructor_arg());

        if let Some(parent_id) = &self.extends {
            let parent = lookup(parent_id).ok_or_else(|| IncompleteElement {
                id: self.id.clone(),
                awaiting: parent_id.clone(),
            })?;

            if !has_own_constructor {
                has_own_constructor = parent.mappings.iter().any(|m| m.is_constructor_arg());
            }

            let own_properties: HashSet<&str> = self.own_mappings.iter().map(|m| m.property.as_str()).collect();
            for parent_mapping in parent.mappings {
                if parent_mapping.is_constructor_arg() && has_own_constructor && !self.own_mappings.is_empty() {
                    // Child declares its own constructor: drop every inherited ctor arg.
                    if self.own_mappings.iter().any(|m| m.is_constructor_arg()) {
                        continue;
                    }
                }
                if own_properties.contains(parent_mapping.property.as_str()) {
                    continue;
                }
                mappings.push(parent_mapping);
            }
        }

        mappings.extend(self.own_mappings);

        let has_nested_result_maps = mappings.iter().any(|m| m.nested_result_map_id.is_some());
        let has_nested_queries = mappings.iter().any(|m| m.nested_query_id.is_some());

        Ok(ResultMap {
            id: self.id,
            lang_type: self.lang_type,
            mappings,
            discriminator: self.discriminator,
            auto_mapping: self.auto_mapping,
            has_nested_result_maps,
            has_nested_queries,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extends_unions_mappings_minus_overrides() {
        let parent = ResultMapBuilder::new("parent", LangType::Other("User".into()))
            .mapping(ResultMapping::simple("id", "id"))
            .mapping(ResultMapping::simple("name", "name"))
            .build(|_| None)
            .unwrap();

        let lookup = move |id: &str| if id == "parent" { Some(parent.clone()) } else { None };

        let child = ResultMapBuilder::new("child", LangType::Other("User".into()))
            .extends("parent")
            .mapping(ResultMapping::simple("name", "full_name"))
            .build(lookup)
            .unwrap();

        assert_eq!(child.mapped_properties().len(), 2);
        let name_mapping = child.mappings.iter().find(|m| m.property == "name").unwrap();
        assert_eq!(name_mapping.column.as_deref(), Some("full_name"));
    }

    #[test]
    fn missing_parent_is_incomplete_not_failed() {
        let result = ResultMapBuilder::new("child", LangType::Other("User".into()))
            .extends("parent")
            .build(|_| None);

        assert!(result.is_err());
    }

    #[test]
    fn own_constructor_drops_inherited_constructor_args() {
        let mut parent_ctor = ResultMapping::simple("id", "id");
        parent_ctor.flags = ResultMappingFlags::CONSTRUCTOR;
        let parent = ResultMapBuilder::new("parent", LangType::Other("User".into()))
            .mapping(parent_ctor)
            .build(|_| None)
            .unwrap();

        let lookup = move |id: &str| if id == "parent" { Some(parent.clone()) } else { None };

        let mut own_ctor = ResultMapping::simple("name", "name");
        own_ctor.flags = ResultMappingFlags::CONSTRUCTOR;
        let child = ResultMapBuilder::new("child", LangType::Other("User".into()))
            .extends("parent")
            .mapping(own_ctor)
            .build(lookup)
            .unwrap();

        assert_eq!(child.constructor_mappings().count(), 1);
        assert_eq!(child.constructor_mappings().next().unwrap().property, "name");
    }
}
