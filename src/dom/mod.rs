//! Host page abstraction.
//!
//! The controller never touches a concrete document. Everything it needs
//! (lookups by id, inline style writes, geometry, appending markup, mutation
//! notifications) goes through the [`Dom`] trait. [`HeadlessPage`] is the
//! in-memory implementation used by the CLI and the tests.

pub mod headless;

pub use headless::HeadlessPage;

use crate::models::{Rect, Viewport};
use tokio::sync::broadcast;

/// Handle to an element inside a [`Dom`].
pub type NodeId = usize;

/// Markup for a single element to append.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ElementSpec {
    pub tag: String,
    pub attrs: Vec<(String, String)>,
    pub styles: Vec<(String, String)>,
    pub text: Option<String>,
}

impl ElementSpec {
    pub fn new(tag: &str) -> Self {
        Self { tag: tag.to_string(), ..Default::default() }
    }

    pub fn id(self, id: &str) -> Self {
        self.attr("id", id)
    }

    pub fn attr(mut self, name: &str, value: &str) -> Self {
        self.attrs.push((name.to_string(), value.to_string()));
        self
    }

    pub fn style(mut self, property: &str, value: &str) -> Self {
        self.styles.push((property.to_string(), value.to_string()));
        self
    }

    pub fn text(mut self, text: &str) -> Self {
        self.text = Some(text.to_string());
        self
    }
}

/// Subtree insertion seen by mutation observers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MutationRecord {
    /// Inserted elements, roots first.
    pub added_nodes: Vec<NodeId>,
    /// `id` attributes found anywhere in the inserted subtrees.
    pub added_ids: Vec<String>,
}

pub trait Dom {
    fn viewport(&self) -> Viewport;

    /// Root container everything is rendered under.
    fn body(&self) -> NodeId;

    /// First attached element with this `id`.
    fn get_element_by_id(&self, id: &str) -> Option<NodeId>;

    /// Attached elements with this tag name, in document order.
    fn elements_by_tag(&self, tag: &str) -> Vec<NodeId>;

    /// Attached elements whose attribute `name` equals `value`.
    fn elements_by_attr(&self, name: &str, value: &str) -> Vec<NodeId>;

    fn attr(&self, node: NodeId, name: &str) -> Option<String>;

    fn style(&self, node: NodeId, property: &str) -> Option<String>;

    fn set_style(&mut self, node: NodeId, property: &str, value: &str);

    fn set_attr(&mut self, node: NodeId, name: &str, value: &str);

    fn children(&self, node: NodeId) -> Vec<NodeId>;

    /// Append one element and notify mutation observers.
    fn append_child(&mut self, parent: NodeId, element: ElementSpec) -> NodeId;

    /// Parse `html` and append the resulting nodes; observers get one record.
    fn append_html(&mut self, parent: NodeId, html: &str) -> Vec<NodeId>;

    /// Equivalent of `innerHTML = ""`.
    fn clear_children(&mut self, node: NodeId);

    /// Viewport-relative bounding box; `None` for detached nodes.
    fn bounding_rect(&self, node: NodeId) -> Option<Rect>;

    /// Subscribe to subtree insertions. Dropping the receiver disconnects.
    fn observe_mutations(&self) -> broadcast::Receiver<MutationRecord>;
}
