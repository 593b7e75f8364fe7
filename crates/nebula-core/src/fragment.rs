use serde::{Deserialize, Serialize};

/// One submitted text item from the shared feed. Immutable once created.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fragment {
    pub id: String,
    pub content: String,
    /// Server-assigned creation time, unix milliseconds.
    #[serde(rename = "createdAt")]
    pub created_at: i64,
}

/// A full feed snapshot, newest first.
pub type Snapshot = std::sync::Arc<Vec<Fragment>>;

/// Order newest-first and keep at most `limit` fragments.
pub fn newest_first(mut fragments: Vec<Fragment>, limit: usize) -> Vec<Fragment> {
    fragments.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    fragments.truncate(limit);
    fragments
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frag(id: &str, created_at: i64) -> Fragment {
        Fragment {
            id: id.to_string(),
            content: format!("content of {id}"),
            created_at,
        }
    }

    #[test]
    fn test_newest_first_orders_and_caps() {
        let out = newest_first(vec![frag("a", 1), frag("b", 3), frag("c", 2)], 2);
        let ids: Vec<&str> = out.iter().map(|f| f.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "c"]);
    }

    #[test]
    fn test_wire_uses_camel_case() {
        let json = serde_json::to_string(&frag("x", 5)).unwrap();
        assert!(json.contains("\"createdAt\":5"), "{json}");
    }
}
