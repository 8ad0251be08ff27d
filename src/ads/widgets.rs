//! Placement markup and lifecycle for Taboola, MGID and FEJI widgets.
//!
//! Ad libraries never clean up after themselves, so every mount returns a
//! [`MountedWidget`] and the page owns clearing it again.

use crate::ads::{AdQueue, TaboolaEntry};
use crate::dom::{Dom, ElementSpec, NodeId};
use crate::models::{AdNetwork, AdSlotDescriptor};
use tracing::{debug, info};

pub const MGID_WIDGET_TYPE: &str = "_mgwidget";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WidgetKind {
    Taboola,
    Mgid,
    FejiBanner,
    FejiPlayer,
}

/// A rendered placement the page must clear on teardown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountedWidget {
    pub kind: WidgetKind,
    /// Element the vendor renders into.
    pub element: NodeId,
    /// Container id (Taboola, FEJI) or `data-widget-id` (MGID).
    pub key: String,
}

/// `node` and everything below it, depth first.
pub fn descendants<D: Dom>(dom: &D, node: NodeId) -> Vec<NodeId> {
    let mut out = Vec::new();
    let mut stack = vec![node];
    while let Some(n) = stack.pop() {
        out.push(n);
        stack.extend(dom.children(n).into_iter().rev());
    }
    out
}

/// Whether `host` already carries this slot's widget markup.
pub fn has_widget_marker<D: Dom>(dom: &D, host: NodeId, slot: &AdSlotDescriptor) -> bool {
    descendants(dom, host).into_iter().any(|n| match slot.network {
        AdNetwork::Taboola => dom.attr(n, "id").as_deref() == Some(slot.container_id.as_str()),
        AdNetwork::Mgid => {
            dom.attr(n, "data-type").as_deref() == Some(MGID_WIDGET_TYPE)
                && dom.attr(n, "data-widget-id").as_deref() == Some(slot.widget_id.as_str())
        }
    })
}

/// Render `slot` into `host` and push its vendor config.
///
/// Emits exactly one provider's markup. Returns `None` without pushing
/// anything when the widget is already present.
pub fn mount_widget<D: Dom>(
    dom: &mut D,
    host: NodeId,
    slot: &AdSlotDescriptor,
    queue: &dyn AdQueue,
) -> Option<MountedWidget> {
    if has_widget_marker(dom, host, slot) {
        debug!(container = %slot.container_id, "Widget already mounted; skipping");
        return None;
    }

    let widget = match slot.network {
        AdNetwork::Taboola => {
            let element =
                dom.append_child(host, ElementSpec::new("div").id(&slot.container_id));
            queue.push_taboola_config(TaboolaEntry::placement(
                &slot.mode,
                &slot.container_id,
                &slot.placement_label,
            ));
            if slot.flush_after {
                queue.push_taboola_config(TaboolaEntry::flush());
            }
            MountedWidget { kind: WidgetKind::Taboola, element, key: slot.container_id.clone() }
        }
        AdNetwork::Mgid => {
            let element = dom.append_child(
                host,
                ElementSpec::new("div")
                    .attr("data-type", MGID_WIDGET_TYPE)
                    .attr("data-widget-id", &slot.widget_id),
            );
            queue.push_mgid_load();
            MountedWidget { kind: WidgetKind::Mgid, element, key: slot.widget_id.clone() }
        }
    };
    info!(network = ?slot.network, placement = %slot.placement_label, "Mounted ad widget");
    Some(widget)
}

/// Render the FEJI banner placeholder. Article 1 uses `banner1`, article 2 `banner10`.
pub fn render_feji_banner<D: Dom>(dom: &mut D, parent: NodeId, primary: bool) -> MountedWidget {
    let placement = if primary { "banner1" } else { "banner10" };
    let id = format!("ub-{placement}");
    let element = dom.append_child(
        parent,
        ElementSpec::new("div")
            .id(&id)
            .attr("class", "adsconex-banner")
            .attr("data-ad-placement", placement),
    );
    MountedWidget { kind: WidgetKind::FejiBanner, element, key: id }
}

/// Render the FEJI video container `div-ub-{player_id}`.
pub fn render_feji_player<D: Dom>(dom: &mut D, parent: NodeId, player_id: &str) -> MountedWidget {
    let id = format!("div-ub-{player_id}");
    let element = dom.append_child(parent, ElementSpec::new("div").id(&id));
    MountedWidget { kind: WidgetKind::FejiPlayer, element, key: id }
}

/// Queue the FEJI header-bidding banner and video player for the page.
pub fn init_feji(queue: &dyn AdQueue, zone: &str, player_id: &str) {
    queue.push_feji_banner(zone);
    queue.push_feji_player(player_id);
    debug!(zone, player_id, "Queued FEJI banner and player");
}

/// Clear what the vendor rendered into a widget.
pub fn unmount_widget<D: Dom>(dom: &mut D, widget: &MountedWidget) {
    dom.clear_children(widget.element);
    if widget.kind == WidgetKind::Mgid {
        for node in dom.elements_by_attr("data-widget-id", &widget.key) {
            dom.clear_children(node);
        }
    }
    debug!(kind = ?widget.kind, key = %widget.key, "Unmounted ad widget");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ads::{RecordingAdQueue, VendorCommand};
    use crate::dom::HeadlessPage;
    use crate::models::Viewport;

    fn page_with_host() -> (HeadlessPage, NodeId) {
        let mut page = HeadlessPage::new(Viewport { width: 1024.0, height: 768.0 });
        let body = page.body();
        let host = page.append_child(body, ElementSpec::new("div").id("qctaboo-mid"));
        (page, host)
    }

    #[test]
    fn test_taboola_mid_slot_pushes_one_entry() {
        let (mut page, host) = page_with_host();
        let queue = RecordingAdQueue::new();
        let slot = AdSlotDescriptor::mid_article(AdNetwork::Taboola, "1903360");

        let widget = mount_widget(&mut page, host, &slot, &queue).unwrap();
        assert_eq!(widget.kind, WidgetKind::Taboola);
        assert!(page.get_element_by_id("taboola-below-mid-article").is_some());
        assert_eq!(
            queue.taboola_entries(),
            vec![TaboolaEntry::placement(
                "thumbs-feed-01-b",
                "taboola-below-mid-article",
                "Mid article"
            )]
        );
        assert_eq!(queue.mgid_loads(), 0);
    }

    #[test]
    fn test_taboola_end_slot_pushes_flush() {
        let (mut page, host) = page_with_host();
        let queue = RecordingAdQueue::new();
        let slot = AdSlotDescriptor::end_article(AdNetwork::Taboola, "1903357");

        mount_widget(&mut page, host, &slot, &queue).unwrap();
        let entries = queue.taboola_entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1], TaboolaEntry::flush());
    }

    #[test]
    fn test_mgid_slot_renders_widget_element() {
        let (mut page, host) = page_with_host();
        let queue = RecordingAdQueue::new();
        let slot = AdSlotDescriptor::mid_article(AdNetwork::Mgid, "1903360");

        let widget = mount_widget(&mut page, host, &slot, &queue).unwrap();
        assert_eq!(page.attr(widget.element, "data-type").as_deref(), Some("_mgwidget"));
        assert_eq!(page.attr(widget.element, "data-widget-id").as_deref(), Some("1903360"));
        assert_eq!(queue.commands(), vec![VendorCommand::MgidLoad]);
        assert!(page.get_element_by_id("taboola-below-mid-article").is_none());
    }

    #[test]
    fn test_second_mount_is_skipped() {
        let (mut page, host) = page_with_host();
        let queue = RecordingAdQueue::new();
        let slot = AdSlotDescriptor::mid_article(AdNetwork::Mgid, "1903360");

        assert!(mount_widget(&mut page, host, &slot, &queue).is_some());
        assert!(mount_widget(&mut page, host, &slot, &queue).is_none());
        assert_eq!(queue.mgid_loads(), 1);
        assert_eq!(page.children(host).len(), 1);
    }

    #[test]
    fn test_unmount_clears_vendor_content() {
        let (mut page, host) = page_with_host();
        let queue = RecordingAdQueue::new();
        let slot = AdSlotDescriptor::mid_article(AdNetwork::Taboola, "1903360");
        let widget = mount_widget(&mut page, host, &slot, &queue).unwrap();
        page.append_html(widget.element, "<div id=\"trc_wrapper\"><iframe src=\"https://trc.taboola.com\"></iframe></div>");
        assert!(page.get_element_by_id("trc_wrapper").is_some());

        unmount_widget(&mut page, &widget);
        assert!(page.get_element_by_id("trc_wrapper").is_none());
        assert!(page.elements_by_tag("iframe").is_empty());
    }

    #[test]
    fn test_feji_placements() {
        let (mut page, host) = page_with_host();
        let queue = RecordingAdQueue::new();
        let banner = render_feji_banner(&mut page, host, true);
        let second = render_feji_banner(&mut page, host, false);
        let player = render_feji_player(&mut page, host, "feji.io_1723454353847");
        init_feji(&queue, "feji.io_long", "feji.io_1723454353847");

        assert_eq!(banner.key, "ub-banner1");
        assert_eq!(second.key, "ub-banner10");
        assert_eq!(page.attr(second.element, "data-ad-placement").as_deref(), Some("banner10"));
        assert!(page.get_element_by_id("div-ub-feji.io_1723454353847").is_some());
        assert_eq!(player.kind, WidgetKind::FejiPlayer);
        assert_eq!(
            queue.commands(),
            vec![
                VendorCommand::FejiBanner { zone: "feji.io_long".into() },
                VendorCommand::FejiPlayer { player_id: "feji.io_1723454353847".into() },
            ]
        );
    }
}
