use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;

// Helper function to deserialize null as default value
fn deserialize_null_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    let opt = Option::deserialize(deserializer)?;
    Ok(opt.unwrap_or_default())
}

/// Page payload returned by the content API.
///
/// The binary CRDT snapshot and its JSON projection live side by side;
/// loading prefers the binary, falling back to the tree, falling back to an
/// empty document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageResponse {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<PageTree>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description_binary: Option<String>,
}

/// Body of the PATCH persisting a page back to the content API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageUpdateRequest {
    pub description_binary: String,
    pub description: PageTree,
}

/// Rich-text tree as stored by the content API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageTree {
    #[serde(rename = "nodeName")]
    pub node_name: String,
    #[serde(default, deserialize_with = "deserialize_null_default")]
    pub attributes: HashMap<String, String>,
    #[serde(default, deserialize_with = "deserialize_null_default")]
    pub children: Vec<PageNode>,
}

impl PageTree {
    /// The tree a page without any persisted content starts from.
    pub fn empty() -> Self {
        Self {
            node_name: "doc".to_string(),
            attributes: HashMap::new(),
            children: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageNode {
    #[serde(rename = "nodeName")]
    pub node_name: String,
    #[serde(default, deserialize_with = "deserialize_null_default")]
    pub attributes: HashMap<String, String>,
    #[serde(default)]
    pub children: PageNodeChildren,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PageNodeChildren {
    AsChildren(Vec<PageNode>),
    AsStringArray(Vec<String>),
    AsString(String),
}

impl Default for PageNodeChildren {
    fn default() -> Self {
        PageNodeChildren::AsChildren(Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn children_variants_deserialize() {
        let node: PageNode = serde_json::from_str(
            r#"{"nodeName":"paragraph","attributes":{},"children":["Hello"]}"#,
        )
        .unwrap();
        assert!(matches!(node.children, PageNodeChildren::AsStringArray(ref v) if v == &["Hello"]));

        let node: PageNode = serde_json::from_str(
            r#"{"nodeName":"blockquote","children":[{"nodeName":"paragraph","children":"quoted"}]}"#,
        )
        .unwrap();
        match node.children {
            PageNodeChildren::AsChildren(children) => {
                assert_eq!(children.len(), 1);
                assert!(matches!(
                    children[0].children,
                    PageNodeChildren::AsString(ref s) if s == "quoted"
                ));
            }
            other => panic!("expected nested children, got {:?}", other),
        }
    }

    #[test]
    fn page_response_tolerates_null_description() {
        let page: PageResponse = serde_json::from_str(
            r#"{"id":"pg1","name":"Roadmap","description":null,"description_binary":null}"#,
        )
        .unwrap();
        assert!(page.description.is_none());
        assert!(page.description_binary.is_none());
    }
}
