//! Iframe normalizer: size social embeds after every content change.

use crate::dom::Dom;
use tracing::{debug, instrument, warn};

/// Viewports at or below this width get the mobile sizes.
pub const MOBILE_BREAKPOINT: f64 = 525.0;

/// Inline `height` / `width` for one iframe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IframeSize {
    pub height: &'static str,
    pub width: &'static str,
}

/// Size for an embed, picked by source URL and viewport width.
pub fn iframe_size(src: &str, viewport_width: f64, breakpoint: f64) -> IframeSize {
    let mobile = viewport_width <= breakpoint;
    if src.contains("twitter") {
        IframeSize {
            height: if mobile { "650px" } else { "827px" },
            width: if mobile { "100%" } else { "550px" },
        }
    } else if src.contains("instagram") {
        IframeSize { height: if mobile { "553px" } else { "628px" }, width: "100%" }
    } else {
        IframeSize { height: if mobile { "250px" } else { "300px" }, width: "100%" }
    }
}

/// Rewrite inline sizes of every iframe in the document.
///
/// Values are absolute, so running it again changes nothing. Iframes
/// without a `src` are logged and left alone. Returns how many were sized.
#[instrument(level = "debug", skip(dom))]
pub fn normalize_iframes<D: Dom>(dom: &mut D, breakpoint: f64) -> usize {
    let viewport_width = dom.viewport().width;
    let mut adjusted = 0;
    for iframe in dom.elements_by_tag("iframe") {
        let Some(src) = dom.attr(iframe, "src").filter(|s| !s.is_empty()) else {
            warn!(node = iframe, "Error adjusting iframe: missing src");
            continue;
        };
        let size = iframe_size(&src, viewport_width, breakpoint);
        dom.set_style(iframe, "height", size.height);
        dom.set_style(iframe, "width", size.width);
        adjusted += 1;
    }
    debug!(adjusted, viewport_width, "Normalized iframes");
    adjusted
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::HeadlessPage;
    use crate::models::Viewport;

    const EMBEDS: &str = r#"
        <iframe src="https://platform.twitter.com/embed/Tweet.html?id=1"></iframe>
        <iframe src="https://www.instagram.com/p/abc/embed"></iframe>
        <iframe src="https://www.youtube.com/embed/xyz"></iframe>
        <iframe></iframe>
    "#;

    fn sizes(page: &HeadlessPage) -> Vec<(Option<String>, Option<String>)> {
        page.elements_by_tag("iframe")
            .into_iter()
            .map(|n| (page.style(n, "height"), page.style(n, "width")))
            .collect()
    }

    fn page(width: f64) -> HeadlessPage {
        let mut page = HeadlessPage::new(Viewport { width, height: 800.0 });
        let body = page.body();
        page.append_html(body, EMBEDS);
        page
    }

    #[test]
    fn test_size_table() {
        assert_eq!(iframe_size("https://twitter.com/x", 400.0, MOBILE_BREAKPOINT), IframeSize { height: "650px", width: "100%" });
        assert_eq!(iframe_size("https://twitter.com/x", 1200.0, MOBILE_BREAKPOINT), IframeSize { height: "827px", width: "550px" });
        assert_eq!(iframe_size("https://instagram.com/p", 400.0, MOBILE_BREAKPOINT), IframeSize { height: "553px", width: "100%" });
        assert_eq!(iframe_size("https://instagram.com/p", 1200.0, MOBILE_BREAKPOINT), IframeSize { height: "628px", width: "100%" });
        assert_eq!(iframe_size("https://youtube.com/e", 400.0, MOBILE_BREAKPOINT), IframeSize { height: "250px", width: "100%" });
        assert_eq!(iframe_size("https://youtube.com/e", 1200.0, MOBILE_BREAKPOINT), IframeSize { height: "300px", width: "100%" });
    }

    #[test]
    fn test_breakpoint_is_inclusive() {
        assert_eq!(iframe_size("x", 525.0, MOBILE_BREAKPOINT).height, "250px");
        assert_eq!(iframe_size("x", 526.0, MOBILE_BREAKPOINT).height, "300px");
    }

    #[test]
    fn test_normalize_desktop() {
        let mut page = page(1280.0);
        assert_eq!(normalize_iframes(&mut page, MOBILE_BREAKPOINT), 3);
        let got = sizes(&page);
        assert_eq!(got[0], (Some("827px".into()), Some("550px".into())));
        assert_eq!(got[1], (Some("628px".into()), Some("100%".into())));
        assert_eq!(got[2], (Some("300px".into()), Some("100%".into())));
        assert_eq!(got[3], (None, None));
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let mut page = page(390.0);
        normalize_iframes(&mut page, MOBILE_BREAKPOINT);
        let once = sizes(&page);
        normalize_iframes(&mut page, MOBILE_BREAKPOINT);
        assert_eq!(sizes(&page), once);
        assert_eq!(once[0], (Some("650px".into()), Some("100%".into())));
    }

    #[test]
    fn test_sizes_drive_layout() {
        let mut page = page(1280.0);
        normalize_iframes(&mut page, MOBILE_BREAKPOINT);
        let tweet = page.elements_by_tag("iframe")[0];
        assert_eq!(page.bounding_rect(tweet).unwrap().height, 827.0);
    }
}
