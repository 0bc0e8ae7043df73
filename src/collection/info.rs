//! Static collection metadata

use crate::broker::{DataProvider, DataResult, DataSegment};
use crate::filter::KEY_FIELD;

/// Name, data segment and sorted indexes of one collection
///
/// The index list always ends with the single-field `_key` index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionInfo {
    pub name: String,
    pub segment: DataSegment,
    pub indexes: Vec<Vec<String>>,
}

/// Segment queries of `collection` are routed to
pub fn segment_of(collection: &str) -> DataSegment {
    match collection {
        "accounts" => DataSegment::Mutable,
        _ => DataSegment::Immutable,
    }
}

impl CollectionInfo {
    pub fn new(name: &str, declared: Vec<Vec<String>>) -> Self {
        let mut indexes: Vec<Vec<String>> = declared
            .into_iter()
            .filter(|fields| !fields.is_empty() && !is_key_index(fields))
            .collect();
        indexes.push(vec![KEY_FIELD.to_string()]);
        Self {
            name: name.to_string(),
            segment: segment_of(name),
            indexes,
        }
    }

    /// Declared indexes merged with the ones the store reports.
    pub async fn discover(
        name: &str,
        declared: Vec<Vec<String>>,
        store: &dyn DataProvider,
    ) -> DataResult<Self> {
        let mut merged = declared;
        for fields in store.collection_indexes(name).await? {
            if !merged.contains(&fields) {
                merged.push(fields);
            }
        }
        Ok(Self::new(name, merged))
    }
}

fn is_key_index(fields: &[String]) -> bool {
    fields.len() == 1 && fields[0] == KEY_FIELD
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_index_is_last_and_unique() {
        let info = CollectionInfo::new(
            "accounts",
            vec![vec!["_key".into()], vec!["balance".into()], vec![]],
        );
        assert_eq!(info.indexes, vec![vec!["balance".to_string()], vec!["_key".to_string()]]);
        assert_eq!(info.segment, DataSegment::Mutable);
        assert_eq!(CollectionInfo::new("blocks", vec![]).segment, DataSegment::Immutable);
    }
}
