use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::hash::Hash;

/// Offset-paginated list envelope returned by list endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaginatedResponse<T> {
    pub count: u64,
    pub next: Option<String>,
    pub previous: Option<String>,
    pub results: Vec<T>,
}

impl<T> Default for PaginatedResponse<T> {
    fn default() -> Self {
        Self {
            count: 0,
            next: None,
            previous: None,
            results: Vec::new(),
        }
    }
}

/// Items with a stable unique id, used to deduplicate across pages.
pub trait Identified {
    type Id: Eq + Hash + Clone;

    fn id(&self) -> Self::Id;
}

/// Append `page` to `acc`, replacing items whose id is already present.
///
/// A replaced item keeps the position of its first occurrence.
pub fn merge_pages<T: Identified>(acc: &mut Vec<T>, page: Vec<T>) {
    let mut index: HashMap<T::Id, usize> = acc
        .iter()
        .enumerate()
        .map(|(i, item)| (item.id(), i))
        .collect();

    for item in page {
        let id = item.id();
        match index.get(&id) {
            Some(&at) => acc[at] = item,
            None => {
                index.insert(id, acc.len());
                acc.push(item);
            }
        }
    }
}

impl<T: Identified> PaginatedResponse<T> {
    /// Fold a later page into this one. Cursor fields and `count` follow the later page.
    pub fn merge(mut self, later: PaginatedResponse<T>) -> Self {
        merge_pages(&mut self.results, later.results);
        self.count = later.count;
        self.next = later.next;
        self.previous = later.previous;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq, Deserialize)]
    struct Item {
        id: u32,
        name: String,
    }

    impl Identified for Item {
        type Id = u32;
        fn id(&self) -> u32 {
            self.id
        }
    }

    fn item(id: u32, name: &str) -> Item {
        Item {
            id,
            name: name.to_string(),
        }
    }

    #[test]
    fn overlapping_id_appears_once_with_later_copy() {
        let mut acc = vec![item(1, "a"), item(2, "b")];
        merge_pages(&mut acc, vec![item(2, "b-updated"), item(3, "c")]);

        assert_eq!(acc, vec![item(1, "a"), item(2, "b-updated"), item(3, "c")]);
    }

    #[test]
    fn merging_same_page_twice_is_idempotent() {
        let page = vec![item(1, "a"), item(2, "b")];
        let mut acc = Vec::new();
        merge_pages(&mut acc, page.clone());
        merge_pages(&mut acc, page.clone());
        assert_eq!(acc, page);
    }

    #[test]
    fn response_merge_takes_cursor_from_later_page() {
        let first: PaginatedResponse<Item> = serde_json::from_value(serde_json::json!({
            "count": 3,
            "next": "http://api.local/items/?offset=2",
            "previous": null,
            "results": [{"id": 1, "name": "a"}, {"id": 2, "name": "b"}]
        }))
        .unwrap();
        let second = PaginatedResponse {
            count: 3,
            next: None,
            previous: Some("http://api.local/items/?offset=0".into()),
            results: vec![item(2, "b2"), item(3, "c")],
        };

        let merged = first.merge(second);
        assert_eq!(merged.results.len(), 3);
        assert_eq!(merged.results[1].name, "b2");
        assert!(merged.next.is_none());
    }
}
