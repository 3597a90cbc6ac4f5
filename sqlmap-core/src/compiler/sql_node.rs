//! Builds a [`SqlNode`] tree from an include-spliced [`XmlElement`]
//! (`spec.md` §4.5/§6). Also decides whether a statement's body is static
//! or dynamic (`spec.md` §4.4: "if the source body contains any dynamic
//! construct or any `${…}` token, emit a dynamic source").

use crate::compiler::dom::{XmlElement, XmlNode};
use crate::dynamic_sql::SqlNode;
use crate::error::ConfigurationError;

const DYNAMIC_TAGS: &[&str] = &["if", "choose", "where", "set", "trim", "foreach", "bind"];

/// Whether `element`'s subtree needs the dynamic-SQL renderer at all, or
/// can be flattened to static text up front.
pub fn is_dynamic(element: &XmlElement) -> bool {
    element.children.iter().any(|child| match child {
        XmlNode::Text(t) => t.contains("${"),
        XmlNode::Element(e) => DYNAMIC_TAGS.contains(&e.name.as_str()) || is_dynamic(e),
    })
}

/// Concatenates every text child verbatim, for the static-source path.
/// Only valid to call when [`is_dynamic`] is false (no non-text children
/// remain once `<selectKey>` has been stripped).
pub fn flatten_static_text(element: &XmlElement) -> String {
    element.children.iter().map(|c| match c {
        XmlNode::Text(t) => t.as_str(),
        XmlNode::Element(_) => "",
    }).collect()
}

pub fn build_mixed(element: &XmlElement) -> Result<SqlNode, ConfigurationError> {
    let mut children = Vec::with_capacity(element.children.len());
    for child in &element.children {
        children.push(build_node(child)?);
    }
    Ok(SqlNode::Mixed(children))
}

fn build_node(node: &XmlNode) -> Result<SqlNode, ConfigurationError> {
    match node {
        XmlNode::Text(text) => Ok(if text.contains("${") {
            SqlNode::DynamicText { text: text.clone(), injection_filter: None }
        } else {
            SqlNode::StaticText(text.clone())
        }),
        XmlNode::Element(e) => build_element(e),
    }
}

fn children_of(element: &XmlElement) -> Result<Vec<SqlNode>, ConfigurationError> {
    element.children.iter().map(build_node).collect()
}

fn build_element(e: &XmlElement) -> Result<SqlNode, ConfigurationError> {
    match e.name.as_str() {
        "if" => {
            let test = required_attr(e, "test")?;
            Ok(SqlNode::If { test, children: children_of(e)? })
        }
        "choose" => {
            let mut whens = Vec::new();
            let mut otherwise = None;
            for child in e.child_elements() {
                match child.name.as_str() {
                    "when" => {
                        let test = required_attr(child, "test")?;
                        whens.push((test, children_of(child)?));
                    }
                    "otherwise" => otherwise = Some(children_of(child)?),
                    _ => {}
                }
            }
            Ok(SqlNode::Choose { whens, otherwise })
        }
        "where" => Ok(SqlNode::Where(children_of(e)?)),
        "set" => Ok(SqlNode::Set(children_of(e)?)),
        "trim" => Ok(SqlNode::Trim {
            prefix: e.attr("prefix").map(str::to_owned),
            prefix_overrides: split_overrides(e.attr("prefixOverrides")),
            suffix: e.attr("suffix").map(str::to_owned),
            suffix_overrides: split_overrides(e.attr("suffixOverrides")),
            children: children_of(e)?,
        }),
        "foreach" => Ok(SqlNode::Foreach {
            collection: required_attr(e, "collection")?,
            item: e.attr("item").map(str::to_owned),
            index: e.attr("index").map(str::to_owned),
            open: e.attr("open").map(str::to_owned),
            close: e.attr("close").map(str::to_owned),
            separator: e.attr("separator").map(str::to_owned),
            children: children_of(e)?,
        }),
        "bind" => Ok(SqlNode::Bind { name: required_attr(e, "name")?, value: required_attr(e, "value")? }),
        other => Err(ConfigurationError::MalformedDocument {
            namespace: String::new(),
            reason: format!("unrecognised dynamic-SQL tag `<{other}>`"),
        }),
    }
}

fn required_attr(e: &XmlElement, name: &str) -> Result<String, ConfigurationError> {
    e.attr(name).map(str::to_owned).ok_or_else(|| ConfigurationError::MalformedDocument {
        namespace: String::new(),
        reason: format!("<{}> missing required `{name}` attribute", e.name),
    })
}

/// `prefixOverrides`/`suffixOverrides` are declared as a `|`-separated list
/// of candidate strings (`spec.md` §6/§8: `Trim(prefix=P, prefixOverrides={O₁,O₂,…})`).
fn split_overrides(raw: Option<&str>) -> Vec<String> {
    raw.map(|s| s.split('|').map(|p| p.trim().to_owned()).filter(|p| !p.is_empty()).collect()).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::dom::parse_document;

    #[test]
    fn detects_dynamic_body() {
        let elem = parse_document(r#"<select>select * where <if test="x">1=1</if></select>"#).unwrap();
        assert!(is_dynamic(&elem));
    }

    #[test]
    fn static_body_is_not_dynamic() {
        let elem = parse_document(r#"<select>select * from t where id = #{id}</select>"#).unwrap();
        assert!(!is_dynamic(&elem));
    }

    #[test]
    fn dollar_token_forces_dynamic() {
        let elem = parse_document(r#"<select>select * from ${table}</select>"#).unwrap();
        assert!(is_dynamic(&elem));
    }

    #[test]
    fn trim_overrides_are_split_on_pipe() {
        let elem = parse_document(r#"<trim prefixOverrides="AND |OR ">x</trim>"#).unwrap();
        let SqlNode::Trim { prefix_overrides, .. } = build_element(&elem).unwrap() else { panic!() };
        assert_eq!(prefix_overrides, vec!["AND".to_owned(), "OR".to_owned()]);
    }
}
