//! `<include refid="...">` splicing (`spec.md` §4.4): replaces each
//! `<include>` with a clone of the referenced `<sql>` fragment's children,
//! recursively (a fragment may itself `<include>` another), substituting
//! `${name}` tokens in attribute values and text from an accumulated
//! variable scope (`spec.md` §4.4: "base = global variables ∪
//! fragment-declared `<property>` children").

use std::collections::HashMap;

use crate::catalogue::{qualify, Configuration};
use crate::compiler::dom::{parse_fragment, XmlElement, XmlNode};
use crate::error::ConfigurationError;

/// Splices every `<include>` in `element`'s subtree in place, returning a
/// new tree with no `<include>` nodes left.
pub fn splice_includes(
    element: &XmlElement,
    namespace: &str,
    config: &Configuration,
    scope: &HashMap<String, String>,
) -> Result<XmlElement, ConfigurationError> {
    let children = splice_children(&element.children, namespace, config, scope)?;
    Ok(XmlElement { name: element.name.clone(), attrs: substitute_attrs(&element.attrs, scope), children })
}

fn splice_children(
    children: &[XmlNode],
    namespace: &str,
    config: &Configuration,
    scope: &HashMap<String, String>,
) -> Result<Vec<XmlNode>, ConfigurationError> {
    let mut out = Vec::with_capacity(children.len());
    for child in children {
        match child {
            XmlNode::Text(text) => out.push(XmlNode::Text(substitute(text, scope))),
            XmlNode::Element(e) if e.name == "include" => {
                out.extend(splice_one_include(e, namespace, config, scope)?);
            }
            XmlNode::Element(e) => {
                out.push(XmlNode::Element(splice_includes(e, namespace, config, scope)?));
            }
        }
    }
    Ok(out)
}

fn splice_one_include(
    include: &XmlElement,
    namespace: &str,
    config: &Configuration,
    outer_scope: &HashMap<String, String>,
) -> Result<Vec<XmlNode>, ConfigurationError> {
    let refid = include.attr("refid").ok_or_else(|| ConfigurationError::MalformedDocument {
        namespace: namespace.to_owned(),
        reason: "<include> missing refid".into(),
    })?;
    let qualified = qualify(namespace, refid);

    let Some(raw) = config.sql_fragment(&qualified) else {
        return Err(ConfigurationError::UnresolvedReference { namespace: namespace.to_owned(), reference: qualified });
    };

    let mut scope = outer_scope.clone();
    for property in include.child_elements_named("property") {
        let (Some(name), Some(value)) = (property.attr("name"), property.attr("value")) else { continue };
        scope.insert(name.to_owned(), substitute(value, outer_scope));
    }

    let fragment_children = parse_fragment(&raw)?;
    splice_children(&fragment_children, namespace, config, &scope)
}

fn substitute_attrs(attrs: &HashMap<String, String>, scope: &HashMap<String, String>) -> HashMap<String, String> {
    attrs.iter().map(|(k, v)| (k.clone(), substitute(v, scope))).collect()
}

/// Replaces every `${name}` occurrence whose `name` is a known scope key;
/// tokens naming an unknown variable are left untouched for the dynamic-SQL
/// renderer to evaluate at call time against the parameter object
/// (`spec.md` §4.5's runtime `${...}` substitution is a distinct,
/// later-stage mechanism from this compile-time property substitution).
pub fn substitute(text: &str, scope: &HashMap<String, String>) -> String {
    if !text.contains("${") || scope.is_empty() {
        return text.to_owned();
    }
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let Some(end) = after.find('}') else {
            out.push_str(&rest[start..]);
            return out;
        };
        let name = &after[..end];
        match scope.get(name) {
            Some(value) => out.push_str(value),
            None => {
                out.push_str("${");
                out.push_str(name);
                out.push('}');
            }
        }
        rest = &after[end + 1..];
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::dom::parse_document;
    use crate::config::Settings;

    #[test]
    fn splices_fragment_in_place() {
        let config = Configuration::new(Settings::default());
        config.add_sql_fragment("ns.cols", "id, name");
        let root = parse_document(r#"<select>select <include refid="cols"/> from t</select>"#).unwrap();
        let spliced = splice_includes(&root, "ns", &config, &HashMap::new()).unwrap();
        assert_eq!(spliced.own_text(), "select id, name from t");
    }

    #[test]
    fn include_property_scopes_substitution_to_the_fragment() {
        let config = Configuration::new(Settings::default());
        config.add_sql_fragment("ns.byId", "where id = ${idColumn}");
        let root = parse_document(
            r#"<select>select * from t <include refid="byId"><property name="idColumn" value="pk"/></include></select>"#,
        )
        .unwrap();
        let spliced = splice_includes(&root, "ns", &config, &HashMap::new()).unwrap();
        assert_eq!(spliced.own_text(), "select * from t where id = pk");
    }

    #[test]
    fn unresolved_refid_is_an_error() {
        let config = Configuration::new(Settings::default());
        let root = parse_document(r#"<select><include refid="missing"/></select>"#).unwrap();
        assert!(splice_includes(&root, "ns", &config, &HashMap::new()).is_err());
    }
}
