//! Abstract DOM tree with shadow roots and named slots
//!
//! The client agent's contract is a tree of elements and text, some elements
//! owning an encapsulated shadow tree that ordinary subtree queries never
//! enter; it must be requested explicitly from its host. This module models
//! exactly that: `Rc<RefCell<Node>>` nodes with weak parent links, light-only
//! queries, shadow attachment, and slot assignment resolution.

/// The reactive annotation agent driving scans over this tree.
pub mod agent;

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::{Rc, Weak};

/// Stable identity of a node, used for observed-set bookkeeping.
pub type NodeId = usize;
/// Shared node handle.
pub type NodeRef = Rc<RefCell<Node>>;
/// Weak node handle, for parent links.
pub type WeakNodeRef = Weak<RefCell<Node>>;

/// Pseudo tag of a shadow root node.
pub const SHADOW_ROOT_TAG: &str = "#shadow-root";
/// Pseudo tag of the document root node.
pub const DOCUMENT_TAG: &str = "#document";

/// A node in the tree.
#[derive(Debug)]
pub struct Node {
    /// Stable identity
    pub id: NodeId,
    /// Element or text payload
    pub kind: NodeKind,
    /// Parent (or shadow host, for a shadow root)
    pub parent: Option<WeakNodeRef>,
    /// Light children, in document order
    pub children: Vec<NodeRef>,
}

/// Payload of a node.
#[derive(Debug)]
pub enum NodeKind {
    /// An element with a tag, attributes, and possibly a shadow root
    Element(Element),
    /// A text node
    Text(String),
}

/// Element payload.
#[derive(Debug)]
pub struct Element {
    /// Tag name, lowercase by convention
    pub tag: String,
    /// Attribute map
    pub attributes: HashMap<String, String>,
    /// Shadow root, once attached
    pub shadow_root: Option<NodeRef>,
}

/// Node factory and root holder.
#[derive(Debug)]
pub struct Document {
    root: NodeRef,
    next_id: Cell<NodeId>,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    /// Create an empty document.
    pub fn new() -> Self {
        let root = Rc::new(RefCell::new(Node {
            id: 0,
            kind: NodeKind::Element(Element {
                tag: DOCUMENT_TAG.to_string(),
                attributes: HashMap::new(),
                shadow_root: None,
            }),
            parent: None,
            children: Vec::new(),
        }));
        Self { root, next_id: Cell::new(1) }
    }

    /// The document root.
    pub fn root(&self) -> NodeRef {
        self.root.clone()
    }

    fn alloc(&self) -> NodeId {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        id
    }

    /// Create a detached element.
    pub fn create_element(&self, tag: &str) -> NodeRef {
        Rc::new(RefCell::new(Node {
            id: self.alloc(),
            kind: NodeKind::Element(Element {
                tag: tag.to_string(),
                attributes: HashMap::new(),
                shadow_root: None,
            }),
            parent: None,
            children: Vec::new(),
        }))
    }

    /// Create a detached text node.
    pub fn create_text(&self, text: &str) -> NodeRef {
        Rc::new(RefCell::new(Node {
            id: self.alloc(),
            kind: NodeKind::Text(text.to_string()),
            parent: None,
            children: Vec::new(),
        }))
    }

    /// Attach a shadow root to `host` and return it.
    ///
    /// Models the asynchronous upgrade of a custom element: hosts start
    /// without a shadow root and gain one later.
    pub fn attach_shadow(&self, host: &NodeRef) -> NodeRef {
        let shadow = Rc::new(RefCell::new(Node {
            id: self.alloc(),
            kind: NodeKind::Element(Element {
                tag: SHADOW_ROOT_TAG.to_string(),
                attributes: HashMap::new(),
                shadow_root: None,
            }),
            parent: Some(Rc::downgrade(host)),
            children: Vec::new(),
        }));
        if let NodeKind::Element(element) = &mut host.borrow_mut().kind {
            element.shadow_root = Some(shadow.clone());
        }
        shadow
    }
}

/// Append `child` to `parent`'s light children.
pub fn append_child(parent: &NodeRef, child: &NodeRef) {
    child.borrow_mut().parent = Some(Rc::downgrade(parent));
    parent.borrow_mut().children.push(child.clone());
}

/// Set an attribute on an element node.
pub fn set_attribute(node: &NodeRef, name: &str, value: &str) {
    if let NodeKind::Element(element) = &mut node.borrow_mut().kind {
        element.attributes.insert(name.to_string(), value.to_string());
    }
}

/// Read an attribute from an element node.
pub fn attribute(node: &NodeRef, name: &str) -> Option<String> {
    match &node.borrow().kind {
        NodeKind::Element(element) => element.attributes.get(name).cloned(),
        NodeKind::Text(_) => None,
    }
}

/// Tag name of an element node.
pub fn tag_name(node: &NodeRef) -> Option<String> {
    match &node.borrow().kind {
        NodeKind::Element(element) => Some(element.tag.clone()),
        NodeKind::Text(_) => None,
    }
}

/// The shadow root owned by `node`, if one has been attached.
pub fn shadow_root(node: &NodeRef) -> Option<NodeRef> {
    match &node.borrow().kind {
        NodeKind::Element(element) => element.shadow_root.clone(),
        NodeKind::Text(_) => None,
    }
}

/// Whether an element carries `class` in its space-separated class list.
pub fn has_class(node: &NodeRef, class: &str) -> bool {
    attribute(node, "class")
        .is_some_and(|list| list.split_ascii_whitespace().any(|c| c == class))
}

/// Concatenated text of the light subtree. Shadow content is not included;
/// it is invisible to the outside, like everything else behind the boundary.
pub fn text_content(node: &NodeRef) -> String {
    let mut out = String::new();
    collect_text(node, &mut out);
    out
}

fn collect_text(node: &NodeRef, out: &mut String) {
    let children: Vec<NodeRef> = {
        let borrowed = node.borrow();
        if let NodeKind::Text(text) = &borrowed.kind {
            out.push_str(text);
            return;
        }
        borrowed.children.clone()
    };
    for child in children {
        collect_text(&child, out);
    }
}

/// Parent of a node, when it is an ordinary element (shadow and document
/// roots are boundaries, not parents).
pub fn parent_element(node: &NodeRef) -> Option<NodeRef> {
    let parent = node.borrow().parent.as_ref().and_then(Weak::upgrade)?;
    match tag_name(&parent) {
        Some(tag) if !tag.starts_with('#') => Some(parent),
        _ => None,
    }
}

/// Nearest ancestor (including `node` itself) carrying `class`, without
/// crossing a shadow boundary.
pub fn closest_by_class(node: &NodeRef, class: &str) -> Option<NodeRef> {
    let mut cursor = node.clone();
    loop {
        if has_class(&cursor, class) {
            return Some(cursor);
        }
        cursor = parent_element(&cursor)?;
    }
}

/// What a query matches on.
#[derive(Debug, Clone)]
pub enum Selector {
    /// Element tag name (case-insensitive)
    Tag(String),
    /// Class-list membership
    Class(String),
    /// Attribute presence
    Attr(String),
    /// Attribute equality
    AttrValue(String, String),
    /// A `<slot>` element with the given name
    NamedSlot(String),
    /// Any of the alternatives
    Any(Vec<Selector>),
}

impl Selector {
    /// Whether `node` matches this selector.
    pub fn matches(&self, node: &NodeRef) -> bool {
        match self {
            Selector::Tag(tag) => {
                tag_name(node).is_some_and(|t| t.eq_ignore_ascii_case(tag))
            }
            Selector::Class(class) => has_class(node, class),
            Selector::Attr(name) => attribute(node, name).is_some(),
            Selector::AttrValue(name, value) => {
                attribute(node, name).as_deref() == Some(value.as_str())
            }
            Selector::NamedSlot(name) => {
                tag_name(node).is_some_and(|t| t.eq_ignore_ascii_case("slot"))
                    && attribute(node, "name").as_deref() == Some(name.as_str())
            }
            Selector::Any(alternatives) => alternatives.iter().any(|s| s.matches(node)),
        }
    }
}

/// All descendants of `scope` matching `selector`, in document order.
///
/// Light DOM only: the walk never descends into a shadow root.
pub fn query_all(scope: &NodeRef, selector: &Selector) -> Vec<NodeRef> {
    let mut out = Vec::new();
    collect_matches(scope, selector, &mut out);
    out
}

/// First descendant of `scope` matching `selector`, if any.
pub fn query_first(scope: &NodeRef, selector: &Selector) -> Option<NodeRef> {
    query_all(scope, selector).into_iter().next()
}

fn collect_matches(node: &NodeRef, selector: &Selector, out: &mut Vec<NodeRef>) {
    let children: Vec<NodeRef> = node.borrow().children.clone();
    for child in children {
        if selector.matches(&child) {
            out.push(child.clone());
        }
        collect_matches(&child, selector, out);
    }
}

/// The light nodes of the host assigned to a named slot.
///
/// These are the rendered contents of the slot (the host's children whose
/// `slot` attribute names it), not the slot element itself.
pub fn assigned_nodes(slot: &NodeRef) -> Vec<NodeRef> {
    let Some(name) = attribute(slot, "name") else { return Vec::new() };
    let mut cursor = slot.clone();
    loop {
        let parent = cursor.borrow().parent.as_ref().and_then(Weak::upgrade);
        let Some(parent) = parent else { return Vec::new() };
        if tag_name(&parent).as_deref() == Some(SHADOW_ROOT_TAG) {
            let host = parent.borrow().parent.as_ref().and_then(Weak::upgrade);
            let Some(host) = host else { return Vec::new() };
            let children: Vec<NodeRef> = host.borrow().children.clone();
            return children
                .into_iter()
                .filter(|child| attribute(child, "slot").as_deref() == Some(name.as_str()))
                .collect();
        }
        cursor = parent;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> (Document, NodeRef, NodeRef) {
        let document = Document::new();
        let root = document.root();
        let checkout = document.create_element("shop-checkout");
        append_child(&root, &checkout);
        (document, root, checkout)
    }

    #[test]
    fn test_query_by_tag_and_class() {
        let (document, root, checkout) = sample();
        let total = document.create_element("shop-total");
        set_attribute(&total, "class", "total grand");
        append_child(&checkout, &total);

        assert_eq!(query_all(&root, &Selector::Tag("shop-total".to_string())).len(), 1);
        assert!(query_first(&root, &Selector::Class("grand".to_string())).is_some());
        assert!(query_first(&root, &Selector::Class("gran".to_string())).is_none());
    }

    #[test]
    fn test_queries_do_not_pierce_shadow() {
        let (document, root, checkout) = sample();
        let host = document.create_element("shop-line-items");
        append_child(&checkout, &host);
        let shadow = document.attach_shadow(&host);
        let inner = document.create_element("shop-total");
        append_child(&shadow, &inner);

        assert!(query_first(&root, &Selector::Tag("shop-total".to_string())).is_none());
        assert!(query_first(&shadow, &Selector::Tag("shop-total".to_string())).is_some());
    }

    #[test]
    fn test_text_content_excludes_shadow() {
        let (document, _root, checkout) = sample();
        append_child(&checkout, &document.create_text("light"));
        let shadow = document.attach_shadow(&checkout);
        append_child(&shadow, &document.create_text("dark"));

        assert_eq!(text_content(&checkout), "light");
        assert_eq!(text_content(&shadow), "dark");
    }

    #[test]
    fn test_closest_stops_at_shadow_boundary() {
        let (document, _root, checkout) = sample();
        set_attribute(&checkout, "class", "price");
        let shadow = document.attach_shadow(&checkout);
        let leaf = document.create_element("span");
        append_child(&shadow, &leaf);

        // The host's class is invisible from inside its shadow tree.
        assert!(closest_by_class(&leaf, "price").is_none());

        let light_leaf = document.create_element("span");
        append_child(&checkout, &light_leaf);
        assert!(closest_by_class(&light_leaf, "price").is_some());
    }

    #[test]
    fn test_assigned_nodes_resolve_host_children() {
        let (document, _root, checkout) = sample();
        let item = document.create_element("shop-line-item");
        append_child(&checkout, &item);

        let priced = document.create_element("div");
        set_attribute(&priced, "slot", "price");
        append_child(&item, &priced);
        let unrelated = document.create_element("div");
        append_child(&item, &unrelated);

        let shadow = document.attach_shadow(&item);
        let slot = document.create_element("slot");
        set_attribute(&slot, "name", "price");
        append_child(&shadow, &slot);

        let assigned = assigned_nodes(&slot);
        assert_eq!(assigned.len(), 1);
        assert_eq!(assigned[0].borrow().id, priced.borrow().id);
    }

    #[test]
    fn test_capability_selector() {
        let (document, _root, checkout) = sample();
        let el = document.create_element("span");
        set_attribute(&el, "part", "price__amount");
        append_child(&checkout, &el);

        let capability = Selector::Any(vec![
            Selector::AttrValue("part".to_string(), "price__amount".to_string()),
            Selector::Class("line-item__price-amount".to_string()),
            Selector::NamedSlot("price".to_string()),
        ]);
        assert!(query_first(&checkout, &capability).is_some());
    }
}
