use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::DomError;

/// Opaque handle to an element of a live document. Handles are only
/// meaningful for the [`Document`] that produced them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub u64);

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Where a lookup starts: the whole document or the subtree of one element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Scope {
    #[default]
    Document,
    Node(NodeId),
}

impl Scope {
    pub fn node(self) -> Option<NodeId> {
        match self {
            Scope::Document => None,
            Scope::Node(id) => Some(id),
        }
    }
}

/// Client rectangle of an element, as returned by `getBoundingClientRect`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn center(&self) -> (f64, f64) {
        (self.left + self.width / 2.0, self.top + self.height / 2.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MouseEventKind {
    Mousedown,
    Mousemove,
    Mouseup,
}

/// The live page (or frame) the engine runs against.
///
/// Futures are not `Send`: the engine is scheduled cooperatively on a single
/// thread and every "parallel" evaluation is merely interleaved.
#[async_trait(?Send)]
pub trait Document {
    /// `window.location.href`
    async fn location(&self) -> Result<String, DomError>;

    /// `window.top === window`
    async fn is_top_frame(&self) -> Result<bool, DomError>;

    /// `document.readyState`
    async fn ready_state(&self) -> Result<String, DomError>;

    /// `document.cookie`
    async fn cookie(&self) -> Result<String, DomError>;

    /// `querySelectorAll` on the document or below `scope`, in document order.
    /// The scope element itself never matches.
    async fn query_all(&self, scope: Scope, selector: &str) -> Result<Vec<NodeId>, DomError>;

    async fn text_content(&self, node: NodeId) -> Result<String, DomError>;

    /// Computed value of one CSS property, `None` when the backend has none.
    async fn computed_style(&self, node: NodeId, property: &str)
    -> Result<Option<String>, DomError>;

    async fn offset_height(&self, node: NodeId) -> Result<f64, DomError>;

    /// `offsetParent !== null`, or a fixed-position element that is displayed.
    async fn is_visible(&self, node: NodeId) -> Result<bool, DomError>;

    /// `.checked` of a form control
    async fn is_checked(&self, node: NodeId) -> Result<bool, DomError>;

    async fn click(&self, node: NodeId) -> Result<(), DomError>;

    async fn add_class(&self, node: NodeId, class: &str) -> Result<(), DomError>;

    async fn bounding_rect(&self, node: NodeId) -> Result<Rect, DomError>;

    /// Dispatches a synthetic mouse event on `node` at client coordinates.
    async fn dispatch_mouse(
        &self,
        node: NodeId,
        kind: MouseEventKind,
        client_x: f64,
        client_y: f64,
    ) -> Result<(), DomError>;

    /// Appends CSS text to the `<style id=style_id>` element, creating it on
    /// first use.
    async fn append_style(&self, style_id: &str, css: &str) -> Result<(), DomError>;

    /// Removes the style element; `true` if it existed.
    async fn remove_style(&self, style_id: &str) -> Result<bool, DomError>;

    /// Evaluates `code` in the page's own script context.
    async fn evaluate(&self, code: &str) -> Result<serde_json::Value, DomError>;

    /// `window.close()`
    async fn close(&self) -> Result<(), DomError>;
}
