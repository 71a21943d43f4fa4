//! In-memory document.
//!
//! [`Document`] holds an ordered list of top-level elements, each the root
//! of a subtree, plus a scroll position. Descendants and later elements
//! paint over earlier ones, so hit testing walks the pre-order list
//! backwards. Element rectangles are in document coordinates; viewport
//! points are shifted by the scroll position before testing.
//!
//! Selector queries render the tree to markup inside `<body>`, parse it
//! with `scraper` and map the first match back to its element handle.

// ============================================================================
// Imports
// ============================================================================

use parking_lot::Mutex;
use scraper::Html;
use tracing::trace;

use crate::error::Result;

use super::element::{Element, FrameElement, push_attribute};
use super::selector::Selector;
use super::utils::HtmlElementUtils;

// ============================================================================
// Constants
// ============================================================================

/// Attribute carrying the pre-order index of each rendered element.
const NODE_INDEX_ATTRIBUTE: &str = "data-frame-messenger-node";

// ============================================================================
// Document
// ============================================================================

/// One element in pre-order, with the index of its parent.
struct Node {
    element: Element,
    parent: Option<usize>,
}

/// An in-memory document implementing [`HtmlElementUtils`].
#[derive(Debug, Default)]
pub struct Document {
    elements: Mutex<Vec<Element>>,
    scroll: Mutex<(f64, f64)>,
}

impl Document {
    /// Creates an empty document.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a document holding `elements` as top-level children of
    /// `<body>`, in order.
    #[must_use]
    pub fn with_elements(elements: impl IntoIterator<Item = Element>) -> Self {
        Self {
            elements: Mutex::new(elements.into_iter().collect()),
            scroll: Mutex::new((0.0, 0.0)),
        }
    }

    /// Appends a top-level element and returns a handle to it.
    pub fn append(&self, element: Element) -> Element {
        self.elements.lock().push(element.clone());
        element
    }

    /// Removes a top-level element together with its subtree. Returns
    /// `false` if it was not a top-level element of this document.
    pub fn remove(&self, element: &Element) -> bool {
        let mut elements = self.elements.lock();
        let before = elements.len();
        elements.retain(|existing| existing != element);
        before != elements.len()
    }

    /// Snapshot of the top-level elements in document order.
    #[must_use]
    pub fn elements(&self) -> Vec<Element> {
        self.elements.lock().clone()
    }

    /// Snapshot of every element, descendants included, in document order.
    #[must_use]
    pub fn descendants(&self) -> Vec<Element> {
        self.nodes().into_iter().map(|node| node.element).collect()
    }

    /// Sets the viewport scroll offset.
    pub fn set_scroll_position(&self, x: f64, y: f64) {
        *self.scroll.lock() = (x, y);
    }

    /// Flattens the tree in pre-order.
    fn nodes(&self) -> Vec<Node> {
        fn visit(element: &Element, parent: Option<usize>, nodes: &mut Vec<Node>) {
            let index = nodes.len();
            nodes.push(Node {
                element: element.clone(),
                parent,
            });
            for child in element.children() {
                visit(child, Some(index), nodes);
            }
        }

        let mut nodes = Vec::new();
        for element in self.elements.lock().iter() {
            visit(element, None, &mut nodes);
        }
        nodes
    }

    /// Renders the document with every element tagged by its pre-order index.
    fn render(&self) -> String {
        let mut html = String::from("<!DOCTYPE html><html><head></head><body>");
        let mut next = 0usize;
        let mut tag = |html: &mut String| {
            push_attribute(html, NODE_INDEX_ATTRIBUTE, &next.to_string());
            next += 1;
        };
        for element in self.elements.lock().iter() {
            element.write_html(&mut html, &mut tag);
        }
        html.push_str("</body></html>");
        html
    }

    /// 1-based position of `nodes[index]` among same-tag siblings.
    fn nth_of_type(nodes: &[Node], index: usize) -> usize {
        let node = &nodes[index];
        nodes[..=index]
            .iter()
            .filter(|n| n.parent == node.parent && n.element.tag_name() == node.element.tag_name())
            .count()
    }
}

impl HtmlElementUtils for Document {
    fn all_iframes(&self) -> Vec<FrameElement> {
        self.nodes()
            .into_iter()
            .filter_map(|node| FrameElement::try_from(node.element).ok())
            .collect()
    }

    fn query_selector(&self, selector: &str) -> Result<Option<Element>> {
        let parsed = Selector::parse(selector)?;
        let nodes = self.nodes();
        let html = Html::parse_document(&self.render());

        let found = html
            .select(parsed.scraper())
            .filter_map(|matched| matched.value().attr(NODE_INDEX_ATTRIBUTE))
            .filter_map(|index| index.parse::<usize>().ok())
            .find_map(|index| nodes.get(index))
            .map(|node| node.element.clone());

        trace!(selector, found = found.is_some(), "query_selector");
        Ok(found)
    }

    fn elements_from_point(&self, x: f64, y: f64) -> Vec<Element> {
        let (scroll_x, scroll_y) = *self.scroll.lock();
        let (doc_x, doc_y) = (x + scroll_x, y + scroll_y);

        self.nodes()
            .into_iter()
            .rev()
            .map(|node| node.element)
            .filter(|e| e.rect().contains(doc_x, doc_y))
            .collect()
    }

    fn scroll_position(&self) -> (f64, f64) {
        *self.scroll.lock()
    }

    /// `#id` when the element has one. Otherwise a `>` chain of
    /// `tag:nth-of-type(n)` steps up to the nearest ancestor with an id,
    /// or to `body`.
    fn unique_selector(&self, element: &Element) -> String {
        let nodes = self.nodes();
        let Some(mut index) = nodes.iter().position(|node| node.element == *element) else {
            return match element.id().filter(|id| !id.is_empty()) {
                Some(id) => Selector::for_id(id),
                None => element.tag_name().to_string(),
            };
        };

        let mut steps = Vec::new();
        loop {
            let node = &nodes[index];
            if let Some(id) = node.element.id().filter(|id| !id.is_empty()) {
                steps.push(Selector::for_id(id));
                break;
            }
            steps.push(Selector::for_position(
                node.element.tag_name(),
                Self::nth_of_type(&nodes, index),
            ));
            match node.parent {
                Some(parent) => index = parent,
                None => {
                    steps.push("body".to_string());
                    break;
                }
            }
        }

        steps.reverse();
        steps.join(" > ")
    }
}

// ============================================================================
// Tests
// ============================================================================
