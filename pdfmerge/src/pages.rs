use std::collections::{BTreeSet, HashSet};

use serde_pdf::{Dictionary, ObjectId, Value};

use crate::document::ParsedDocument;
use crate::error::{Error, Result};

/// Page attributes a page may inherit from its ancestors in the page tree.
const INHERITABLE: [&str; 4] = ["Resources", "MediaBox", "CropBox", "Rotate"];

/// A leaf of the page tree.
#[derive(Debug, Clone, PartialEq)]
pub struct PageLeaf {
    id: ObjectId,
    inherited: Dictionary,
}

impl PageLeaf {
    pub fn id(&self) -> ObjectId {
        self.id
    }

    /// Inheritable attributes the page does not define itself, taken from its nearest ancestor
    /// that does.
    pub fn inherited(&self) -> &Dictionary {
        &self.inherited
    }
}

/// The pages of a document in reading order, plus every object id they transitively depend on.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageClosure {
    pages: Vec<PageLeaf>,
    reachable: BTreeSet<ObjectId>,
}

impl PageClosure {
    pub fn pages(&self) -> &[PageLeaf] {
        &self.pages
    }

    pub fn page_ids(&self) -> impl Iterator<Item = ObjectId> + '_ {
        self.pages.iter().map(PageLeaf::id)
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    /// All object ids reachable from the pages, the pages included. The catalog and the
    /// interior nodes of the page tree are never part of it.
    pub fn reachable(&self) -> &BTreeSet<ObjectId> {
        &self.reachable
    }

    pub fn contains(&self, id: ObjectId) -> bool {
        self.reachable.contains(&id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Node {
    Pages,
    Page,
}

fn node_kind(dict: &Dictionary) -> Node {
    match dict.type_name() {
        Some("Pages") => Node::Pages,
        Some("Page") => Node::Page,
        // untyped nodes are told apart by whether they have children
        _ if dict.contains_key("Kids") => Node::Pages,
        _ => Node::Page,
    }
}

/// Walks the page tree of `doc` and collects its pages together with their object closure.
///
/// Fails with [`Error::InvalidPageTree`] if the trailer's `/Root` is not a catalog or the
/// catalog has no page tree root. Cycles in the tree are cut; nodes that are not dictionaries
/// are skipped.
pub fn extract_pages(doc: &ParsedDocument) -> Result<PageClosure> {
    let catalog_id = doc
        .root()
        .ok_or_else(|| Error::invalid_page_tree("trailer has no /Root reference"))?;
    let catalog = doc
        .get(catalog_id)
        .and_then(Value::as_dict)
        .filter(|dict| matches!(dict.type_name(), None | Some("Catalog")))
        .ok_or_else(|| {
            Error::invalid_page_tree(format!("/Root {} is not a catalog", catalog_id))
        })?;

    let root_id = catalog
        .get("Pages")
        .and_then(Value::as_reference)
        .ok_or_else(|| Error::invalid_page_tree("catalog has no /Pages reference"))?;
    match doc.get(root_id).and_then(Value::as_dict) {
        Some(root) if node_kind(root) == Node::Pages => {}
        _ => {
            return Err(Error::invalid_page_tree(format!(
                "/Pages {} is not a page tree node",
                root_id
            )))
        }
    }

    let mut pages = Vec::new();
    let mut excluded = HashSet::new();
    excluded.insert(catalog_id);

    let mut visited = HashSet::new();
    let mut stack = vec![(root_id, Dictionary::new())];
    while let Some((id, inherited)) = stack.pop() {
        if !visited.insert(id) {
            tracing::debug!(node = %id, "page tree node visited twice, cutting cycle");
            continue;
        }
        let dict = match doc.get(id).and_then(Value::as_dict) {
            Some(dict) => dict,
            None => {
                tracing::debug!(node = %id, "skipping page tree node that is not a dictionary");
                continue;
            }
        };

        match node_kind(dict) {
            Node::Pages => {
                excluded.insert(id);

                let mut inherited = inherited;
                for key in INHERITABLE {
                    if let Some(value) = dict.get(key) {
                        inherited.insert(key, value.clone());
                    }
                }

                let kids: Vec<ObjectId> = dict
                    .get("Kids")
                    .map(|kids| doc.resolve(kids))
                    .and_then(Value::as_array)
                    .map(|kids| kids.iter().filter_map(Value::as_reference).collect())
                    .unwrap_or_default();
                // reversed, so that the first kid is popped first
                for kid in kids.into_iter().rev() {
                    stack.push((kid, inherited.clone()));
                }
            }
            Node::Page => {
                let inherited = inherited
                    .into_iter()
                    .filter(|(key, _)| !dict.contains_key(key))
                    .collect();
                pages.push(PageLeaf { id, inherited });
            }
        }
    }

    let reachable = closure(doc, &pages, &excluded);
    tracing::debug!(
        pages = pages.len(),
        objects = reachable.len(),
        "extracted page tree"
    );

    Ok(PageClosure { pages, reachable })
}

/// Collects every object transitively referenced by `pages`. Page `/Parent` links are not
/// followed, and ids in `excluded` are never entered.
fn closure(
    doc: &ParsedDocument,
    pages: &[PageLeaf],
    excluded: &HashSet<ObjectId>,
) -> BTreeSet<ObjectId> {
    let mut reachable = BTreeSet::new();
    let mut queue = Vec::new();
    for page in pages {
        queue.push(page.id);
        for value in page.inherited.values() {
            value.for_each_reference(&mut |id| queue.push(id));
        }
    }

    while let Some(id) = queue.pop() {
        if excluded.contains(&id) || reachable.contains(&id) {
            continue;
        }
        let value = match doc.get(id) {
            Some(Value::Null) | None => {
                tracing::trace!(object = %id, "reference to missing object");
                continue;
            }
            Some(value) => value,
        };
        reachable.insert(id);

        match value.as_dict() {
            Some(dict) if matches!(value.type_name(), Some("Page") | Some("Pages")) => {
                for (key, value) in dict {
                    if key != "Parent" {
                        value.for_each_reference(&mut |id| queue.push(id));
                    }
                }
            }
            _ => value.for_each_reference(&mut |id| queue.push(id)),
        }
    }

    reachable
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    fn id(num: u32) -> ObjectId {
        ObjectId::new(num, 0)
    }

    fn r(num: u32) -> Value {
        Value::Reference(id(num))
    }

    fn name(name: &str) -> Value {
        Value::Name(name.into())
    }

    fn dict(entries: Vec<(&str, Value)>) -> Value {
        Value::Dictionary(entries.into_iter().collect())
    }

    fn document(objects: Vec<(u32, Value)>) -> ParsedDocument {
        let mut trailer = Dictionary::new();
        trailer.insert("Root", r(1));
        ParsedDocument::from_objects(
            objects.into_iter().map(|(num, v)| (id(num), v)).collect(),
            trailer,
        )
    }

    fn catalog() -> (u32, Value) {
        (1, dict(vec![("Type", name("Catalog")), ("Pages", r(2))]))
    }

    #[test]
    fn collects_pages_in_reading_order() {
        let doc = document(vec![
            catalog(),
            (
                2,
                dict(vec![
                    ("Type", name("Pages")),
                    ("Kids", Value::Array(vec![r(3), r(5)])),
                    ("Count", Value::Integer(3)),
                ]),
            ),
            (3, dict(vec![("Type", name("Pages")), ("Kids", Value::Array(vec![r(4), r(6)])), ("Parent", r(2))])),
            (4, dict(vec![("Type", name("Page")), ("Parent", r(3))])),
            (5, dict(vec![("Type", name("Page")), ("Parent", r(2))])),
            (6, dict(vec![("Type", name("Page")), ("Parent", r(3))])),
        ]);

        let closure = extract_pages(&doc).unwrap();
        assert_eq!(closure.page_ids().collect::<Vec<_>>(), vec![id(4), id(6), id(5)]);
        assert_eq!(
            closure.reachable().iter().copied().collect::<Vec<_>>(),
            vec![id(4), id(5), id(6)]
        );
    }

    #[test]
    fn materializes_inherited_attributes() {
        let media_box = Value::Array(vec![
            Value::Integer(0),
            Value::Integer(0),
            Value::Integer(612),
            Value::Integer(792),
        ]);
        let doc = document(vec![
            catalog(),
            (
                2,
                dict(vec![
                    ("Type", name("Pages")),
                    ("Kids", Value::Array(vec![r(3)])),
                    ("Resources", r(5)),
                    ("MediaBox", media_box.clone()),
                    ("Rotate", Value::Integer(90)),
                ]),
            ),
            (
                3,
                dict(vec![
                    ("Type", name("Pages")),
                    ("Kids", Value::Array(vec![r(4)])),
                    ("Rotate", Value::Integer(180)),
                ]),
            ),
            (4, dict(vec![("Type", name("Page")), ("MediaBox", media_box), ("Rotate", Value::Integer(0))])),
            (5, dict(vec![("Font", dict(vec![("F1", r(6))]))])),
            (6, dict(vec![("Type", name("Font"))])),
        ]);

        let closure = extract_pages(&doc).unwrap();
        let page = &closure.pages()[0];
        let mut expected = Dictionary::new();
        expected.insert("Resources", r(5));
        assert_eq!(page.inherited(), &expected);
        assert!(closure.contains(id(5)));
        assert!(closure.contains(id(6)));
    }

    #[test]
    fn cuts_cycles_in_the_page_tree() {
        let doc = document(vec![
            catalog(),
            (2, dict(vec![("Type", name("Pages")), ("Kids", Value::Array(vec![r(3), r(2)]))])),
            (3, dict(vec![("Type", name("Page")), ("Parent", r(2))])),
        ]);
        let closure = extract_pages(&doc).unwrap();
        assert_eq!(closure.page_ids().collect::<Vec<_>>(), vec![id(3)]);
    }

    #[test]
    fn cyclic_references_terminate() {
        let doc = document(vec![
            catalog(),
            (2, dict(vec![("Type", name("Pages")), ("Kids", Value::Array(vec![r(3)]))])),
            (3, dict(vec![("Type", name("Page")), ("Annots", Value::Array(vec![r(4)]))])),
            (4, dict(vec![("Subtype", name("Link")), ("P", r(3)), ("Next", r(5))])),
            (5, dict(vec![("Subtype", name("Link")), ("Next", r(4)), ("Missing", r(99))])),
        ]);
        let closure = extract_pages(&doc).unwrap();
        assert_eq!(
            closure.reachable().iter().copied().collect::<Vec<_>>(),
            vec![id(3), id(4), id(5)]
        );
    }

    #[test]
    fn excludes_catalog_and_tree_nodes() {
        // an annotation pointing back at the catalog must not drag it into the closure
        let doc = document(vec![
            catalog(),
            (2, dict(vec![("Type", name("Pages")), ("Kids", Value::Array(vec![r(3)]))])),
            (3, dict(vec![("Type", name("Page")), ("Parent", r(2)), ("Annots", Value::Array(vec![r(4)]))])),
            (4, dict(vec![("Root", r(1)), ("Tree", r(2))])),
        ]);
        let closure = extract_pages(&doc).unwrap();
        assert!(!closure.contains(id(1)));
        assert!(!closure.contains(id(2)));
        assert!(closure.contains(id(4)));
    }

    #[test]
    fn skips_nodes_that_are_not_dictionaries() {
        let doc = document(vec![
            catalog(),
            (2, dict(vec![("Kids", Value::Array(vec![r(3), r(4), r(5)]))])),
            (3, Value::Integer(1)),
            (5, dict(vec![("Contents", r(6))])),
            (6, Value::Integer(0)),
        ]);
        let closure = extract_pages(&doc).unwrap();
        assert_eq!(closure.page_ids().collect::<Vec<_>>(), vec![id(5)]);
        assert!(closure.contains(id(6)));
    }

    #[test]
    fn empty_page_tree() {
        let doc = document(vec![
            catalog(),
            (2, dict(vec![("Type", name("Pages")), ("Kids", Value::Array(vec![])), ("Count", Value::Integer(0))])),
        ]);
        let closure = extract_pages(&doc).unwrap();
        assert!(closure.is_empty());
        assert!(closure.reachable().is_empty());
    }

    #[test]
    fn broken_catalog_chains() {
        let no_root = ParsedDocument::from_objects(vec![], Dictionary::new());
        assert!(matches!(extract_pages(&no_root), Err(Error::InvalidPageTree(_))));

        let not_a_catalog = document(vec![(1, Value::Integer(3))]);
        assert!(matches!(extract_pages(&not_a_catalog), Err(Error::InvalidPageTree(_))));

        let no_pages = document(vec![(1, dict(vec![("Type", name("Catalog"))]))]);
        assert!(matches!(extract_pages(&no_pages), Err(Error::InvalidPageTree(_))));

        let dangling_pages = document(vec![catalog()]);
        assert!(matches!(extract_pages(&dangling_pages), Err(Error::InvalidPageTree(_))));
    }
}
