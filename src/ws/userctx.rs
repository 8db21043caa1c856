use serde::Deserialize;

/// User identity attached to a collaboration connection.
///
/// Derived from the query string of the initiating request; connections
/// without identity parameters get an anonymous context.
#[derive(Clone, Debug, Deserialize)]
pub struct UserCtx {
    #[serde(default = "anonymous_id")]
    pub user_id: String,
    #[serde(default = "anonymous_name")]
    pub user_name: String,
}

impl Default for UserCtx {
    fn default() -> Self {
        Self {
            user_id: anonymous_id(),
            user_name: anonymous_name(),
        }
    }
}

fn anonymous_id() -> String {
    "anonymous".to_string()
}

fn anonymous_name() -> String {
    "Anonymous".to_string()
}
