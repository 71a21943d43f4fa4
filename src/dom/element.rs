//! DOM element handles.
//!
//! An [`Element`] is an immutable, cheaply cloned snapshot of the parts of
//! a DOM node the frame finders need: tag, id, classes, attributes, layout
//! box, child elements, and (for iframes) the content window. Two handles
//! are equal only if they point at the same node.
//!
//! # Example
//!
//! ```ignore
//! use frame_messenger::dom::{Element, Rect};
//!
//! let frame = Element::builder("iframe")
//!     .id("ad")
//!     .attribute("sandbox", "allow-scripts")
//!     .rect(Rect::new(50.0, 100.0, 300.0, 250.0))
//!     .content_window(child.handle())
//!     .build();
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::transport::WindowHandle;

// ============================================================================
// Constants
// ============================================================================

/// Sandbox token that permits scripts inside a frame.
const ALLOW_SCRIPTS_TOKEN: &str = "allow-scripts";

// ============================================================================
// Geometry
// ============================================================================

/// Layout box in document coordinates.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Rect {
    /// Left edge.
    pub left: f64,
    /// Top edge.
    pub top: f64,
    /// Width.
    pub width: f64,
    /// Height.
    pub height: f64,
}

impl Rect {
    /// Creates a rectangle.
    #[inline]
    #[must_use]
    pub const fn new(left: f64, top: f64, width: f64, height: f64) -> Self {
        Self {
            left,
            top,
            width,
            height,
        }
    }

    /// Right edge.
    #[inline]
    #[must_use]
    pub fn right(&self) -> f64 {
        self.left + self.width
    }

    /// Bottom edge.
    #[inline]
    #[must_use]
    pub fn bottom(&self) -> f64 {
        self.top + self.height
    }

    /// Returns `true` if the point lies inside. Right and bottom edges are
    /// exclusive.
    #[inline]
    #[must_use]
    pub fn contains(&self, x: f64, y: f64) -> bool {
        x >= self.left && x < self.right() && y >= self.top && y < self.bottom()
    }
}

/// Element position relative to the document origin.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Offset {
    /// Distance from the document's left edge.
    pub left: f64,
    /// Distance from the document's top edge.
    pub top: f64,
}

// ============================================================================
// Element
// ============================================================================

struct ElementInner {
    tag_name: String,
    id: Option<String>,
    classes: Vec<String>,
    attributes: Vec<(String, String)>,
    text: String,
    rect: Rect,
    children: Vec<Element>,
    content_window: Option<WindowHandle>,
}

/// Handle to a DOM element.
#[derive(Clone)]
pub struct Element {
    inner: Arc<ElementInner>,
}

impl fmt::Debug for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Element")
            .field("tag_name", &self.inner.tag_name)
            .field("id", &self.inner.id)
            .field("classes", &self.inner.classes)
            .field("rect", &self.inner.rect)
            .field("children", &self.inner.children.len())
            .finish_non_exhaustive()
    }
}

/// Short `tag#id.class` description, used in log and error text.
impl fmt::Display for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.inner.tag_name)?;
        if let Some(id) = &self.inner.id {
            write!(f, "#{id}")?;
        }
        for class in &self.inner.classes {
            write!(f, ".{class}")?;
        }
        Ok(())
    }
}

impl PartialEq for Element {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for Element {}

impl Element {
    /// Starts building an element with the given tag.
    #[must_use]
    pub fn builder(tag_name: impl Into<String>) -> ElementBuilder {
        ElementBuilder::new(tag_name)
    }

    /// Lower-case tag name.
    #[inline]
    #[must_use]
    pub fn tag_name(&self) -> &str {
        &self.inner.tag_name
    }

    /// The `id` attribute, if set.
    #[inline]
    #[must_use]
    pub fn id(&self) -> Option<&str> {
        self.inner.id.as_deref()
    }

    /// Class list.
    #[inline]
    #[must_use]
    pub fn classes(&self) -> &[String] {
        &self.inner.classes
    }

    /// Returns `true` if `class` is in the class list.
    #[must_use]
    pub fn has_class(&self, class: &str) -> bool {
        self.inner.classes.iter().any(|c| c == class)
    }

    /// Value of attribute `name`. `id` and `class` resolve too.
    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<String> {
        match name {
            "id" => self.inner.id.clone(),
            "class" if !self.inner.classes.is_empty() => Some(self.inner.classes.join(" ")),
            _ => self
                .inner
                .attributes
                .iter()
                .find(|(key, _)| key.eq_ignore_ascii_case(name))
                .map(|(_, value)| value.clone()),
        }
    }

    /// Text content.
    #[inline]
    #[must_use]
    pub fn text(&self) -> &str {
        &self.inner.text
    }

    /// Layout box in document coordinates.
    #[inline]
    #[must_use]
    pub fn rect(&self) -> Rect {
        self.inner.rect
    }

    /// Child elements in document order.
    #[inline]
    #[must_use]
    pub fn children(&self) -> &[Element] {
        &self.inner.children
    }

    /// Returns `true` for `iframe` and `frame` elements.
    #[inline]
    #[must_use]
    pub fn is_frame(&self) -> bool {
        matches!(self.inner.tag_name.as_str(), "iframe" | "frame")
    }

    /// Browsing context hosted by a frame element.
    #[inline]
    #[must_use]
    pub fn content_window(&self) -> Option<WindowHandle> {
        self.inner.content_window.clone()
    }

    /// Serialized markup of the element and its subtree.
    #[must_use]
    pub fn outer_html(&self) -> String {
        let mut html = String::new();
        self.write_html(&mut html, &mut |_: &mut String| {});
        html
    }

    /// Appends the markup of this subtree to `html`.
    ///
    /// `extra` runs once per element, in pre-order, after the element's own
    /// attributes have been written, and may append further attributes.
    pub(crate) fn write_html<F>(&self, html: &mut String, extra: &mut F)
    where
        F: FnMut(&mut String),
    {
        html.push('<');
        html.push_str(&self.inner.tag_name);

        if let Some(id) = &self.inner.id {
            push_attribute(html, "id", id);
        }
        if !self.inner.classes.is_empty() {
            push_attribute(html, "class", &self.inner.classes.join(" "));
        }
        for (name, value) in &self.inner.attributes {
            push_attribute(html, name, value);
        }
        extra(html);

        html.push('>');
        html.push_str(&escape_text(&self.inner.text));
        for child in &self.inner.children {
            child.write_html(html, extra);
        }
        html.push_str("</");
        html.push_str(&self.inner.tag_name);
        html.push('>');
    }
}

pub(crate) fn push_attribute(html: &mut String, name: &str, value: &str) {
    html.push(' ');
    html.push_str(name);
    html.push_str("=\"");
    html.push_str(&value.replace('&', "&amp;").replace('"', "&quot;"));
    html.push('"');
}

fn escape_text(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

// ============================================================================
// ElementBuilder
// ============================================================================

/// Builder for [`Element`].
#[derive(Default)]
pub struct ElementBuilder {
    tag_name: String,
    id: Option<String>,
    classes: Vec<String>,
    attributes: Vec<(String, String)>,
    text: String,
    rect: Rect,
    children: Vec<Element>,
    content_window: Option<WindowHandle>,
}

impl ElementBuilder {
    /// Creates a builder. The tag is lower-cased.
    #[must_use]
    pub fn new(tag_name: impl Into<String>) -> Self {
        Self {
            tag_name: tag_name.into().to_ascii_lowercase(),
            ..Self::default()
        }
    }

    /// Sets the `id`.
    #[must_use]
    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Adds a class.
    #[must_use]
    pub fn class(mut self, class: impl Into<String>) -> Self {
        self.classes.push(class.into());
        self
    }

    /// Sets an attribute. `id` and `class` are routed to their fields.
    #[must_use]
    pub fn attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let name = name.into().to_ascii_lowercase();
        let value = value.into();
        match name.as_str() {
            "id" => self.id = Some(value),
            "class" => self
                .classes
                .extend(value.split_whitespace().map(str::to_string)),
            _ => {
                self.attributes.retain(|(existing, _)| *existing != name);
                self.attributes.push((name, value));
            }
        }
        self
    }

    /// Sets the text content.
    #[must_use]
    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    /// Sets the layout box.
    #[must_use]
    pub fn rect(mut self, rect: Rect) -> Self {
        self.rect = rect;
        self
    }

    /// Appends a child element.
    #[must_use]
    pub fn child(mut self, child: Element) -> Self {
        self.children.push(child);
        self
    }

    /// Sets the hosted browsing context.
    #[must_use]
    pub fn content_window(mut self, window: WindowHandle) -> Self {
        self.content_window = Some(window);
        self
    }

    /// Builds the element.
    #[must_use]
    pub fn build(self) -> Element {
        Element {
            inner: Arc::new(ElementInner {
                tag_name: self.tag_name,
                id: self.id,
                classes: self.classes,
                attributes: self.attributes,
                text: self.text,
                rect: self.rect,
                children: self.children,
                content_window: self.content_window,
            }),
        }
    }
}

// ============================================================================
// FrameElement
// ============================================================================

/// An element known to be a frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameElement(Element);

impl FrameElement {
    /// The underlying element.
    #[inline]
    #[must_use]
    pub fn element(&self) -> &Element {
        &self.0
    }

    /// Consumes the frame and returns the element.
    #[inline]
    #[must_use]
    pub fn into_element(self) -> Element {
        self.0
    }

    /// The `sandbox` attribute, if present.
    #[must_use]
    pub fn sandbox(&self) -> Option<String> {
        self.0.attribute("sandbox")
    }

    /// Returns `false` if the frame is sandboxed without `allow-scripts`.
    ///
    /// Token matching is case-insensitive. A frame without a `sandbox`
    /// attribute supports scripting.
    #[must_use]
    pub fn supports_scripting(&self) -> bool {
        match self.sandbox() {
            None => true,
            Some(tokens) => tokens
                .split_whitespace()
                .any(|token| token.eq_ignore_ascii_case(ALLOW_SCRIPTS_TOKEN)),
        }
    }

    /// Browsing context hosted by this frame.
    #[inline]
    #[must_use]
    pub fn content_window(&self) -> Option<WindowHandle> {
        self.0.content_window()
    }
}

impl TryFrom<Element> for FrameElement {
    type Error = Error;

    fn try_from(element: Element) -> Result<Self> {
        if element.is_frame() {
            Ok(Self(element))
        } else {
            Err(Error::invalid_argument(format!(
                "{element} is not a frame element"
            )))
        }
    }
}

impl AsRef<Element> for FrameElement {
    fn as_ref(&self) -> &Element {
        &self.0
    }
}

impl From<FrameElement> for Element {
    fn from(frame: FrameElement) -> Self {
        frame.0
    }
}

impl fmt::Display for FrameElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

// ============================================================================
// Tests
// ============================================================================
