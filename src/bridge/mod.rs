use base64::{engine::general_purpose, Engine as _};
use loro::{LoroDoc, LoroList, LoroMap, LoroText, ToJson};

use crate::models::{PageNode, PageNodeChildren, PageResponse, PageTree, RelayError};

const MAX_DEPTH: usize = 100; // Prevent stack overflow

/// Produce the CRDT snapshot a session is seeded with.
///
/// Binary content wins over the JSON tree; a page that exists but carries
/// neither yields an empty initial snapshot, never an error.
pub fn page_to_snapshot(page: &PageResponse) -> Result<Vec<u8>, RelayError> {
    if let Some(encoded) = &page.description_binary {
        let bytes = general_purpose::STANDARD
            .decode(encoded)
            .map_err(|e| RelayError::Conversion(format!("invalid base64 snapshot: {}", e)))?;

        // Validate before handing the bytes to a session.
        let probe = LoroDoc::new();
        probe
            .import(&bytes)
            .map_err(|e| RelayError::Conversion(format!("stored snapshot does not import: {}", e)))?;
        return Ok(bytes);
    }

    if let Some(tree) = &page.description {
        return tree_to_snapshot(tree);
    }

    tree_to_snapshot(&PageTree::empty())
}

/// Deterministic tree → snapshot encoding.
pub fn tree_to_snapshot(tree: &PageTree) -> Result<Vec<u8>, RelayError> {
    let doc = LoroDoc::new();
    let page_map = doc.get_map("page");

    let _ = page_map.insert("nodeName", tree.node_name.as_str());

    let attributes_map = page_map
        .get_or_create_container("attributes", LoroMap::new())
        .map_err(container_err)?;
    for (key, value) in &tree.attributes {
        let _ = attributes_map.insert(key, value.as_str());
    }

    let children_list = page_map
        .get_or_create_container("children", LoroList::new())
        .map_err(container_err)?;
    for (idx, child) in tree.children.iter().enumerate() {
        let child_map = children_list
            .insert_container(idx, LoroMap::new())
            .map_err(container_err)?;
        write_node(child, &child_map, 1)?;
    }

    doc.export(loro::ExportMode::Snapshot)
        .map_err(|e| RelayError::Conversion(format!("failed to export snapshot: {}", e)))
}

/// Inverse direction: read a snapshot back into the content API's tree shape.
///
/// Used for the JSON projection stored beside the binary snapshot, and for
/// rendering server truth outside a collaborative session.
pub fn snapshot_to_tree(snapshot: &[u8]) -> Result<PageTree, RelayError> {
    let doc = LoroDoc::new();
    doc.import(snapshot)
        .map_err(|e| RelayError::Conversion(format!("failed to import snapshot: {}", e)))?;

    let value = doc.get_deep_value().to_json_value();
    let page = match value.get("page") {
        Some(page) if !page.is_null() => page.clone(),
        // A blank document has no page container yet.
        _ => return Ok(PageTree::empty()),
    };

    serde_json::from_value(page)
        .map_err(|e| RelayError::Conversion(format!("snapshot does not decode as a page tree: {}", e)))
}

fn write_node(node: &PageNode, map: &LoroMap, depth: usize) -> Result<(), RelayError> {
    if depth >= MAX_DEPTH {
        return Err(RelayError::Conversion(format!(
            "page tree deeper than {} levels",
            MAX_DEPTH
        )));
    }

    let _ = map.insert("nodeName", node.node_name.as_str());

    let attributes_map = map
        .get_or_create_container("attributes", LoroMap::new())
        .map_err(container_err)?;
    for (key, value) in &node.attributes {
        let _ = attributes_map.insert(key, value.as_str());
    }

    let children_list = map
        .get_or_create_container("children", LoroList::new())
        .map_err(container_err)?;
    match &node.children {
        PageNodeChildren::AsChildren(children) => {
            for (idx, child) in children.iter().enumerate() {
                let child_map = children_list
                    .insert_container(idx, LoroMap::new())
                    .map_err(container_err)?;
                write_node(child, &child_map, depth + 1)?;
            }
        }
        PageNodeChildren::AsStringArray(strings) => {
            for (idx, s) in strings.iter().enumerate() {
                let text = children_list
                    .insert_container(idx, LoroText::new())
                    .map_err(container_err)?;
                let _ = text.insert(0, s.as_str());
            }
        }
        PageNodeChildren::AsString(s) => {
            let text = children_list
                .insert_container(0, LoroText::new())
                .map_err(container_err)?;
            let _ = text.insert(0, s.as_str());
        }
    }

    Ok(())
}

fn container_err(e: loro::LoroError) -> RelayError {
    RelayError::Conversion(format!("failed to build document container: {}", e))
}
