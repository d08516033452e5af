//! Field-path helpers for in-memory documents.
//!
//! Paths use dot notation (`address.city`) and descend through embedded documents only.

use bson::{Bson, Document};

use docstate_core::index::{ExistingIndex, IndexKind};

/// Looks up a (possibly dotted) field path.
pub(crate) fn lookup<'a>(document: &'a Document, path: &str) -> Option<&'a Bson> {
    match path.split_once('.') {
        Some((head, rest)) => match document.get(head)? {
            Bson::Document(inner) => lookup(inner, rest),
            _ => None,
        },
        None => document.get(path),
    }
}

/// Removes a (possibly dotted) field path. Returns whether anything was removed.
pub(crate) fn unset(document: &mut Document, path: &str) -> bool {
    match path.split_once('.') {
        Some((head, rest)) => match document.get_mut(head) {
            Some(Bson::Document(inner)) => unset(inner, rest),
            _ => false,
        },
        None => document.remove(path).is_some(),
    }
}

/// The values a document contributes to a directional index, or `None` when a sparse
/// index skips it. Missing fields count as null, as in the store.
pub(crate) fn index_key(document: &Document, index: &ExistingIndex) -> Option<Vec<Bson>> {
    let fields = index
        .keys
        .iter()
        .filter(|(_, kind)| {
            matches!(
                IndexKind::from_bson(kind),
                Some(IndexKind::Ascending | IndexKind::Descending)
            )
        })
        .map(|(field, _)| field.as_str())
        .collect::<Vec<_>>();

    if index.sparse
        && fields
            .iter()
            .all(|field| lookup(document, field).is_none())
    {
        return None;
    }

    Some(
        fields
            .iter()
            .map(|field| {
                lookup(document, field)
                    .cloned()
                    .unwrap_or(Bson::Null)
            })
            .collect(),
    )
}

/// Weighted count of search terms found in the text-indexed fields of a document.
pub(crate) fn text_score(document: &Document, weights: &Document, terms: &[String]) -> f64 {
    weights
        .iter()
        .filter_map(|(field, weight)| {
            let text = lookup(document, field)?.as_str()?.to_lowercase();
            let words = text
                .split(|c: char| !c.is_alphanumeric())
                .filter(|word| !word.is_empty())
                .collect::<Vec<_>>();
            let hits = terms
                .iter()
                .filter(|term| words.contains(&term.as_str()))
                .count();

            Some(hits as f64 * weight_value(weight))
        })
        .sum()
}

fn weight_value(weight: &Bson) -> f64 {
    match weight {
        Bson::Int32(v) => *v as f64,
        Bson::Int64(v) => *v as f64,
        Bson::Double(v) => *v,
        _ => 1.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;
    use docstate_core::index::IndexSpec;

    #[test]
    fn dotted_paths_descend_into_documents() {
        let mut document = doc! { "address": { "city": "Ghent", "zip": "9000" }, "name": "x" };

        assert_eq!(lookup(&document, "address.city"), Some(&Bson::String("Ghent".into())));
        assert_eq!(lookup(&document, "name.first"), None);

        assert!(unset(&mut document, "address.zip"));
        assert!(!unset(&mut document, "address.zip"));
        assert_eq!(document, doc! { "address": { "city": "Ghent" }, "name": "x" });
    }

    #[test]
    fn sparse_indexes_skip_documents_without_fields() {
        let spec = IndexSpec::ascending("code").with_options(docstate_core::index::IndexOptions {
            unique: true,
            sparse: true,
        });
        let index = ExistingIndex::from_spec("code_1", &spec);

        assert_eq!(index_key(&doc! { "other": 1 }, &index), None);
        assert_eq!(index_key(&doc! { "code": "NL" }, &index), Some(vec![Bson::String("NL".into())]));
    }

    #[test]
    fn text_score_weights_hits() {
        let weights = doc! { "title": 2, "body": 1 };
        let terms = vec!["bar".to_string()];

        assert_eq!(text_score(&doc! { "title": "Foo Bar", "body": "bar none" }, &weights, &terms), 3.0);
        assert_eq!(text_score(&doc! { "title": "foo" }, &weights, &terms), 0.0);
    }
}
