use std::fmt;

/// Composite identifier addressing one collaborative page.
///
/// All three segments are opaque strings owned by the content API; the relay
/// routes on them but never parses them.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct PageKey {
    pub workspace_slug: String,
    pub project_id: String,
    pub page_id: String,
}

impl PageKey {
    pub fn new(
        workspace_slug: impl Into<String>,
        project_id: impl Into<String>,
        page_id: impl Into<String>,
    ) -> Self {
        Self {
            workspace_slug: workspace_slug.into(),
            project_id: project_id.into(),
            page_id: page_id.into(),
        }
    }
}

impl fmt::Display for PageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.workspace_slug, self.project_id, self.page_id)
    }
}
