//! In-memory page with a simple vertical block layout.
//!
//! Layout rules, enough to drive scroll geometry deterministically:
//! - every element spans the viewport width and stacks below its previous sibling;
//! - text takes [`LINE_HEIGHT`] per wrapped line at [`CHAR_WIDTH`] px per character;
//! - `height`, `min-height` and `max-height` inline styles in px are honoured;
//! - `display: none` collapses to zero; empty iframes and images get a default box.

use crate::dom::{Dom, ElementSpec, MutationRecord, NodeId};
use crate::models::{Rect, Viewport};
use scraper::{ElementRef, Html};
use std::collections::BTreeMap;
use tokio::sync::broadcast;
use tracing::debug;

pub const LINE_HEIGHT: f64 = 24.0;
pub const CHAR_WIDTH: f64 = 8.0;
const DEFAULT_IFRAME_HEIGHT: f64 = 150.0;
const DEFAULT_IMG_HEIGHT: f64 = 200.0;

#[derive(Debug, Clone, Default)]
struct Node {
    tag: String,
    attrs: BTreeMap<String, String>,
    styles: BTreeMap<String, String>,
    text: String,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

/// A page held entirely in memory.
#[derive(Debug)]
pub struct HeadlessPage {
    nodes: Vec<Node>,
    viewport: Viewport,
    scroll_y: f64,
    mutations: broadcast::Sender<MutationRecord>,
}

fn parse_px(value: &str) -> Option<f64> {
    value.trim().strip_suffix("px")?.trim().parse().ok()
}

fn parse_style_attr(style: &str) -> BTreeMap<String, String> {
    style
        .split(';')
        .filter_map(|decl| {
            let (prop, value) = decl.split_once(':')?;
            let prop = prop.trim();
            (!prop.is_empty()).then(|| (prop.to_ascii_lowercase(), value.trim().to_string()))
        })
        .collect()
}

impl HeadlessPage {
    const ROOT: NodeId = 0;

    pub fn new(viewport: Viewport) -> Self {
        let (mutations, _) = broadcast::channel(64);
        let body = Node { tag: "body".into(), ..Default::default() };
        Self { nodes: vec![body], viewport, scroll_y: 0.0, mutations }
    }

    pub fn set_viewport(&mut self, viewport: Viewport) {
        self.viewport = viewport;
        self.scroll_to(self.scroll_y);
    }

    pub fn scroll_y(&self) -> f64 {
        self.scroll_y
    }

    /// Scroll to `y`, clamped to the scrollable range.
    pub fn scroll_to(&mut self, y: f64) {
        let max = (self.document_height() - self.viewport.height).max(0.0);
        self.scroll_y = y.clamp(0.0, max);
    }

    pub fn scroll_by(&mut self, dy: f64) {
        self.scroll_to(self.scroll_y + dy);
    }

    pub fn document_height(&self) -> f64 {
        self.layout_height(Self::ROOT)
    }

    /// Concatenated text of `node` and its descendants.
    pub fn text_content(&self, node: NodeId) -> String {
        let mut out = self.nodes[node].text.clone();
        for &child in &self.nodes[node].children {
            let text = self.text_content(child);
            if !text.is_empty() {
                if !out.is_empty() {
                    out.push(' ');
                }
                out.push_str(&text);
            }
        }
        out
    }

    pub fn tag(&self, node: NodeId) -> &str {
        &self.nodes[node].tag
    }

    fn is_attached(&self, mut node: NodeId) -> bool {
        loop {
            if node == Self::ROOT {
                return true;
            }
            match self.nodes[node].parent {
                Some(parent) => node = parent,
                None => return false,
            }
        }
    }

    fn attached_in_order(&self) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![Self::ROOT];
        while let Some(node) = stack.pop() {
            out.push(node);
            stack.extend(self.nodes[node].children.iter().rev());
        }
        out
    }

    fn push_node(&mut self, parent: NodeId, node: Node) -> NodeId {
        let id = self.nodes.len();
        self.nodes.push(Node { parent: Some(parent), ..node });
        self.nodes[parent].children.push(id);
        id
    }

    fn copy_element(&mut self, parent: NodeId, element: ElementRef<'_>) -> NodeId {
        let value = element.value();
        let mut node = Node { tag: value.name().to_ascii_lowercase(), ..Default::default() };
        for (name, attr) in value.attrs() {
            if name.eq_ignore_ascii_case("style") {
                node.styles = parse_style_attr(attr);
            }
            node.attrs.insert(name.to_ascii_lowercase(), attr.to_string());
        }
        let id = self.push_node(parent, node);
        self.copy_children(id, element);
        id
    }

    fn copy_children(&mut self, parent: NodeId, element: ElementRef<'_>) {
        for child in element.children() {
            if let Some(child_el) = ElementRef::wrap(child) {
                self.copy_element(parent, child_el);
            } else if let scraper::Node::Text(text) = child.value() {
                let text = text.trim();
                if !text.is_empty() {
                    let own = &mut self.nodes[parent].text;
                    if !own.is_empty() {
                        own.push(' ');
                    }
                    own.push_str(text);
                }
            }
        }
    }

    fn collect_ids(&self, node: NodeId, out: &mut Vec<String>) {
        if let Some(id) = self.nodes[node].attrs.get("id") {
            out.push(id.clone());
        }
        for &child in &self.nodes[node].children {
            self.collect_ids(child, out);
        }
    }

    fn notify(&self, added_nodes: Vec<NodeId>) {
        if added_nodes.is_empty() {
            return;
        }
        let mut added_ids = Vec::new();
        for &node in &added_nodes {
            self.collect_ids(node, &mut added_ids);
        }
        debug!(nodes = added_nodes.len(), ids = ?added_ids, "DOM mutation");
        // No receivers simply means nobody is observing.
        let _ = self.mutations.send(MutationRecord { added_nodes, added_ids });
    }

    fn text_height(&self, text: &str) -> f64 {
        if text.is_empty() {
            return 0.0;
        }
        let per_line = (self.viewport.width / CHAR_WIDTH).floor().max(1.0);
        let lines = (text.chars().count() as f64 / per_line).ceil();
        lines * LINE_HEIGHT
    }

    fn style_px(&self, node: NodeId, property: &str) -> Option<f64> {
        self.nodes[node].styles.get(property).and_then(|v| parse_px(v))
    }

    fn layout_height(&self, node: NodeId) -> f64 {
        let n = &self.nodes[node];
        if n.styles.get("display").is_some_and(|d| d == "none") {
            return 0.0;
        }
        let mut height = match self.style_px(node, "height") {
            Some(h) => h,
            None => {
                let content = self.text_height(&n.text)
                    + n.children.iter().map(|&c| self.layout_height(c)).sum::<f64>();
                match n.tag.as_str() {
                    "iframe" if content == 0.0 => DEFAULT_IFRAME_HEIGHT,
                    "img" if content == 0.0 => DEFAULT_IMG_HEIGHT,
                    "script" | "style" => 0.0,
                    _ => content,
                }
            }
        };
        if let Some(min) = self.style_px(node, "min-height") {
            height = height.max(min);
        }
        if let Some(max) = self.style_px(node, "max-height") {
            height = height.min(max);
        }
        height
    }

    /// Document-relative top of `node`.
    fn offset_top(&self, node: NodeId) -> f64 {
        let Some(parent) = self.nodes[node].parent else {
            return 0.0;
        };
        let mut top = self.offset_top(parent) + self.text_height(&self.nodes[parent].text);
        for &sibling in &self.nodes[parent].children {
            if sibling == node {
                break;
            }
            top += self.layout_height(sibling);
        }
        top
    }

    fn is_displayed(&self, mut node: NodeId) -> bool {
        loop {
            if self.nodes[node].styles.get("display").is_some_and(|d| d == "none") {
                return false;
            }
            match self.nodes[node].parent {
                Some(parent) => node = parent,
                None => return true,
            }
        }
    }
}

impl Dom for HeadlessPage {
    fn viewport(&self) -> Viewport {
        self.viewport
    }

    fn body(&self) -> NodeId {
        Self::ROOT
    }

    fn get_element_by_id(&self, id: &str) -> Option<NodeId> {
        self.attached_in_order()
            .into_iter()
            .find(|&n| self.nodes[n].attrs.get("id").is_some_and(|v| v == id))
    }

    fn elements_by_tag(&self, tag: &str) -> Vec<NodeId> {
        self.attached_in_order()
            .into_iter()
            .filter(|&n| self.nodes[n].tag.eq_ignore_ascii_case(tag))
            .collect()
    }

    fn elements_by_attr(&self, name: &str, value: &str) -> Vec<NodeId> {
        self.attached_in_order()
            .into_iter()
            .filter(|&n| self.nodes[n].attrs.get(name).is_some_and(|v| v == value))
            .collect()
    }

    fn attr(&self, node: NodeId, name: &str) -> Option<String> {
        self.nodes.get(node)?.attrs.get(name).cloned()
    }

    fn style(&self, node: NodeId, property: &str) -> Option<String> {
        self.nodes.get(node)?.styles.get(property).cloned()
    }

    fn set_style(&mut self, node: NodeId, property: &str, value: &str) {
        if let Some(n) = self.nodes.get_mut(node) {
            n.styles.insert(property.to_string(), value.to_string());
        }
    }

    fn set_attr(&mut self, node: NodeId, name: &str, value: &str) {
        if let Some(n) = self.nodes.get_mut(node) {
            n.attrs.insert(name.to_ascii_lowercase(), value.to_string());
        }
    }

    fn children(&self, node: NodeId) -> Vec<NodeId> {
        self.nodes.get(node).map(|n| n.children.clone()).unwrap_or_default()
    }

    fn append_child(&mut self, parent: NodeId, element: ElementSpec) -> NodeId {
        let node = Node {
            tag: element.tag.to_ascii_lowercase(),
            attrs: element.attrs.into_iter().collect(),
            styles: element.styles.into_iter().collect(),
            text: element.text.unwrap_or_default(),
            ..Default::default()
        };
        let id = self.push_node(parent, node);
        self.notify(vec![id]);
        id
    }

    fn append_html(&mut self, parent: NodeId, html: &str) -> Vec<NodeId> {
        let fragment = Html::parse_fragment(html);
        let mut added = Vec::new();
        let root = fragment.root_element();
        for child in root.children() {
            if let Some(element) = ElementRef::wrap(child) {
                added.push(self.copy_element(parent, element));
            } else if let scraper::Node::Text(text) = child.value() {
                let text = text.trim();
                if !text.is_empty() {
                    let id = self.push_node(
                        parent,
                        Node { tag: "#text".into(), text: text.to_string(), ..Default::default() },
                    );
                    added.push(id);
                }
            }
        }
        self.notify(added.clone());
        added
    }

    fn clear_children(&mut self, node: NodeId) {
        let Some(n) = self.nodes.get_mut(node) else {
            return;
        };
        let children = std::mem::take(&mut n.children);
        n.text.clear();
        for child in children {
            self.nodes[child].parent = None;
        }
    }

    fn bounding_rect(&self, node: NodeId) -> Option<Rect> {
        if node >= self.nodes.len() || !self.is_attached(node) {
            return None;
        }
        if !self.is_displayed(node) {
            return Some(Rect { top: 0.0, left: 0.0, width: 0.0, height: 0.0 });
        }
        Some(Rect {
            top: self.offset_top(node) - self.scroll_y,
            left: 0.0,
            width: self.viewport.width,
            height: self.layout_height(node),
        })
    }

    fn observe_mutations(&self) -> broadcast::Receiver<MutationRecord> {
        self.mutations.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page() -> HeadlessPage {
        HeadlessPage::new(Viewport { width: 800.0, height: 600.0 })
    }

    #[test]
    fn test_append_html_and_lookup() {
        let mut page = page();
        let body = page.body();
        page.append_html(body, r#"<div id="a"><p>hello</p><div id="qctaboo-mid"></div></div>"#);
        let mid = page.get_element_by_id("qctaboo-mid").unwrap();
        assert_eq!(page.tag(mid), "div");
        assert_eq!(page.text_content(page.get_element_by_id("a").unwrap()), "hello");
    }

    #[test]
    fn test_style_attribute_is_parsed() {
        let mut page = page();
        let body = page.body();
        page.append_html(body, r#"<div id="box" style="height: 120px; Display:block"></div>"#);
        let node = page.get_element_by_id("box").unwrap();
        assert_eq!(page.style(node, "height").as_deref(), Some("120px"));
        assert_eq!(page.style(node, "display").as_deref(), Some("block"));
    }

    #[test]
    fn test_block_layout_and_scroll() {
        let mut page = page();
        let body = page.body();
        page.append_child(body, ElementSpec::new("div").id("a").style("height", "1000px"));
        let b = page.append_child(body, ElementSpec::new("div").id("b").style("height", "500px"));

        assert_eq!(page.document_height(), 1500.0);
        assert_eq!(page.bounding_rect(b).unwrap().top, 1000.0);

        page.scroll_to(400.0);
        assert_eq!(page.bounding_rect(b).unwrap().top, 600.0);

        page.scroll_to(10_000.0);
        assert_eq!(page.scroll_y(), 900.0);
    }

    #[test]
    fn test_min_and_max_height() {
        let mut page = page();
        let body = page.body();
        let clipped = page.append_child(
            body,
            ElementSpec::new("div").style("max-height", "0px").text(&"x".repeat(500)),
        );
        let grown = page.append_child(body, ElementSpec::new("div").style("min-height", "350px"));
        assert_eq!(page.bounding_rect(clipped).unwrap().height, 0.0);
        assert_eq!(page.bounding_rect(grown).unwrap().height, 350.0);

        page.set_style(clipped, "max-height", "none");
        assert!(page.bounding_rect(clipped).unwrap().height > 0.0);
    }

    #[test]
    fn test_clear_children_detaches() {
        let mut page = page();
        let body = page.body();
        let host = page.append_child(body, ElementSpec::new("div").id("host"));
        let child = page.append_child(host, ElementSpec::new("div").id("inner"));
        page.clear_children(host);
        assert!(page.get_element_by_id("inner").is_none());
        assert!(page.bounding_rect(child).is_none());
        assert!(page.children(host).is_empty());
    }

    #[tokio::test]
    async fn test_mutation_records_include_nested_ids() {
        let mut page = page();
        let mut rx = page.observe_mutations();
        let body = page.body();
        page.append_html(body, r#"<section><div id="js_adsconex_parallax_1"></div></section>"#);
        let record = rx.recv().await.unwrap();
        assert_eq!(record.added_nodes.len(), 1);
        assert_eq!(record.added_ids, vec!["js_adsconex_parallax_1".to_string()]);
    }

    #[test]
    fn test_display_none_collapses() {
        let mut page = page();
        let body = page.body();
        let hidden = page.append_child(body, ElementSpec::new("div").style("display", "none").style("height", "90px"));
        let after = page.append_child(body, ElementSpec::new("div"));
        assert_eq!(page.bounding_rect(hidden).unwrap().height, 0.0);
        assert_eq!(page.bounding_rect(after).unwrap().top, 0.0);
    }
}
