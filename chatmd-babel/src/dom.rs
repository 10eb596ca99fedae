//! HTML tree capability used by the extractors
//!
//! The extractors never talk to a parser directly. They go through
//! [`HtmlFragment`], which offers the handful of operations they need: parse a
//! string into a mutable tree, query elements in document order, read text,
//! replace a node, and serialize the tree back.
//!
//! # Library Choice
//!
//! Parsing and serialization use `html5ever` with the `markup5ever_rcdom`
//! reference-counted tree. The parser follows the WHATWG algorithm, so
//! implicitly closed `<tr>`/`<td>`/`<th>` and other malformed markup are
//! repaired by the tree builder rather than by string heuristics.

use html5ever::tendril::TendrilSink;
use html5ever::{
    ns, parse_document, serialize, serialize::SerializeOpts, serialize::TraversalScope, Attribute,
    LocalName, ParseOpts, QualName,
};
use markup5ever_rcdom::{Handle, Node, NodeData, RcDom, SerializableHandle};
use std::cell::{Cell, RefCell};
use std::io;
use std::rc::Rc;

/// A parsed HTML fragment whose `<body>` children are the content
pub struct HtmlFragment {
    _dom: RcDom,
    body: Handle,
}

impl HtmlFragment {
    /// Parse a fragment. Never fails: malformed input is repaired by the
    /// tree builder, and an input without content yields an empty body.
    pub fn parse(html: &str) -> Self {
        let dom = parse_document(RcDom::default(), ParseOpts::default()).one(html);
        let body = find_descendant(&dom.document, &|node| is_tag(node, "body"))
            .unwrap_or_else(|| dom.document.clone());
        Self { _dom: dom, body }
    }

    /// All elements matching `pred`, in document order
    pub fn select<F>(&self, pred: F) -> Vec<Handle>
    where
        F: Fn(&Handle) -> bool,
    {
        descendants_matching(&self.body, &pred)
    }

    /// All elements with the given tag name, in document order
    pub fn elements(&self, tag: &str) -> Vec<Handle> {
        self.select(|node| is_tag(node, tag))
    }

    /// Serialize the fragment content back to HTML
    pub fn to_html(&self) -> io::Result<String> {
        inner_html(&self.body)
    }
}

/// Lower-case tag name of an element node
pub fn tag_name(node: &Handle) -> Option<&str> {
    match &node.data {
        NodeData::Element { name, .. } => Some(&*name.local),
        _ => None,
    }
}

pub fn is_tag(node: &Handle, tag: &str) -> bool {
    tag_name(node).is_some_and(|name| name.eq_ignore_ascii_case(tag))
}

/// Attribute value of an element, if present
pub fn attr(node: &Handle, attr_name: &str) -> Option<String> {
    match &node.data {
        NodeData::Element { attrs, .. } => attrs
            .borrow()
            .iter()
            .find(|a| (*a.name.local).eq_ignore_ascii_case(attr_name))
            .map(|a| a.value.to_string()),
        _ => None,
    }
}

/// Whitespace-separated class list of an element
pub fn classes(node: &Handle) -> Vec<String> {
    attr(node, "class")
        .map(|value| value.split_whitespace().map(str::to_string).collect())
        .unwrap_or_default()
}

pub fn has_class(node: &Handle, class: &str) -> bool {
    attr(node, "class").is_some_and(|value| value.split_whitespace().any(|c| c == class))
}

/// Concatenated text of every text node below `node`
pub fn text_content(node: &Handle) -> String {
    let mut out = String::new();
    collect_text(node, &mut out);
    out
}

fn collect_text(node: &Handle, out: &mut String) {
    match &node.data {
        NodeData::Text { contents } => out.push_str(&contents.borrow()),
        _ => {
            for child in node.children.borrow().iter() {
                collect_text(child, out);
            }
        }
    }
}

/// Parent of a node, if it is still attached
pub fn parent_of(node: &Handle) -> Option<Handle> {
    let weak = node.parent.take();
    let parent = weak.as_ref().and_then(|w| w.upgrade());
    node.parent.set(weak);
    parent
}

/// Whether any ancestor of `node` satisfies `pred`
pub fn has_ancestor<F>(node: &Handle, pred: F) -> bool
where
    F: Fn(&Handle) -> bool,
{
    let mut current = parent_of(node);
    while let Some(parent) = current {
        if pred(&parent) {
            return true;
        }
        current = parent_of(&parent);
    }
    false
}

/// Whether any descendant element of `node` satisfies `pred`
pub fn contains<F>(node: &Handle, pred: F) -> bool
where
    F: Fn(&Handle) -> bool,
{
    find_descendant(node, &pred).is_some()
}

/// First descendant element matching `pred` (pre-order)
pub fn find_descendant<F>(node: &Handle, pred: &F) -> Option<Handle>
where
    F: Fn(&Handle) -> bool,
{
    for child in node.children.borrow().iter() {
        if matches!(child.data, NodeData::Element { .. }) && pred(child) {
            return Some(child.clone());
        }
        if let Some(found) = find_descendant(child, pred) {
            return Some(found);
        }
    }
    None
}

/// Descendant elements matching `pred`, in document order
pub fn descendants_matching<F>(node: &Handle, pred: &F) -> Vec<Handle>
where
    F: Fn(&Handle) -> bool,
{
    let mut found = Vec::new();
    let mut stack: Vec<Handle> = node.children.borrow().iter().rev().cloned().collect();
    while let Some(current) = stack.pop() {
        if matches!(current.data, NodeData::Element { .. }) && pred(&current) {
            found.push(current.clone());
        }
        for child in current.children.borrow().iter().rev() {
            stack.push(child.clone());
        }
    }
    found
}

/// Element children of `node` (text and comments skipped)
pub fn element_children(node: &Handle) -> Vec<Handle> {
    node.children
        .borrow()
        .iter()
        .filter(|c| matches!(c.data, NodeData::Element { .. }))
        .cloned()
        .collect()
}

/// Create a detached element holding a single text node
pub fn new_text_element(tag: &str, text: &str) -> Handle {
    let element = create_element(tag);
    let text_node = create_text(text);
    text_node.parent.set(Some(Rc::downgrade(&element)));
    element.children.borrow_mut().push(text_node);
    element
}

/// Replace `old` with `new` in its parent. Returns false if `old` was detached.
pub fn replace(old: &Handle, new: Handle) -> bool {
    let Some(parent) = parent_of(old) else {
        return false;
    };
    let mut children = parent.children.borrow_mut();
    match children.iter().position(|child| Rc::ptr_eq(child, old)) {
        Some(index) => {
            new.parent.set(Some(Rc::downgrade(&parent)));
            old.parent.set(None);
            children[index] = new;
            true
        }
        None => false,
    }
}

/// Replace the children of `node` with the nodes parsed from `html`
pub fn set_inner_html(node: &Handle, html: &str) {
    let parsed = HtmlFragment::parse(html);
    let new_children: Vec<Handle> = parsed.body.children.borrow_mut().drain(..).collect();

    for old in node.children.borrow_mut().drain(..) {
        old.parent.set(None);
    }
    let mut children = node.children.borrow_mut();
    for child in new_children {
        child.parent.set(Some(Rc::downgrade(node)));
        children.push(child);
    }
}

/// Serialize the children of `node`
pub fn inner_html(node: &Handle) -> io::Result<String> {
    let mut output = Vec::new();
    let opts = SerializeOpts {
        traversal_scope: TraversalScope::ChildrenOnly(None),
        ..Default::default()
    };
    let serializable = SerializableHandle::from(node.clone());
    serialize(&mut output, &serializable, opts)?;
    String::from_utf8(output).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}

fn create_element(tag: &str) -> Handle {
    Rc::new(Node {
        parent: Cell::new(None),
        children: RefCell::new(Vec::new()),
        data: NodeData::Element {
            name: QualName::new(None, ns!(html), LocalName::from(tag)),
            attrs: RefCell::new(Vec::<Attribute>::new()),
            template_contents: Default::default(),
            mathml_annotation_xml_integration_point: false,
        },
    })
}

fn create_text(text: &str) -> Handle {
    Rc::new(Node {
        parent: Cell::new(None),
        children: RefCell::new(Vec::new()),
        data: NodeData::Text {
            contents: RefCell::new(text.to_string().into()),
        },
    })
}
