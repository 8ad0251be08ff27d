//! Article page skeleton.
//!
//! ```text
//! main#article-page
//! ├── ub-banner1                FEJI banner
//! ├── h1                        title
//! ├── div-ub-{player}           FEJI video
//! ├── p                         Posted: YYYY-MM-DD
//! ├── article#article-primary   normalized HTML (may contain #qctaboo-mid)
//! ├── div#reveal-sentinel       1px marker
//! ├── div#end-article-ads       hidden until the sentinel fires, clipped until adsMoved
//! ├── div#related-article       collapsed until adsMoved
//! │   ├── ub-banner10
//! │   ├── h1 / p / article#article-related
//! ├── footer#page-footer
//! └── div#rewardModal           hidden unless the rewarded ad is shown
//! ```

use crate::ads::widgets::{MountedWidget, render_feji_banner, render_feji_player};
use crate::config::PageParameters;
use crate::dom::{Dom, ElementSpec, NodeId};
use crate::models::Article;
use crate::utils::{format_posted_date, normalize_html_content};
use tracing::{info, instrument, warn};

pub const MID_ARTICLE_TARGET_ID: &str = "qctaboo-mid";
pub const REVEAL_SENTINEL_ID: &str = "reveal-sentinel";
pub const END_ARTICLE_ADS_ID: &str = "end-article-ads";
pub const RELATED_ARTICLE_ID: &str = "related-article";
pub const NOT_FOUND_ID: &str = "not-found";
pub const REWARD_MODAL_ID: &str = "rewardModal";

const FOOTER_HEIGHT: &str = "400px";
/// The end-of-article block shows only this much until the related article is revealed.
pub const END_ADS_PARTIAL_HEIGHT: &str = "200px";

/// Handles to the containers the controller drives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedPage {
    pub title: String,
    pub primary: NodeId,
    pub sentinel: NodeId,
    pub end_ads: NodeId,
    pub related: Option<NodeId>,
    pub reward_modal: NodeId,
    /// FEJI placements to clear on teardown.
    pub feji: Vec<MountedWidget>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageRender {
    Article(RenderedPage),
    NotFound,
}

fn render_header<D: Dom>(dom: &mut D, parent: NodeId, article: &Article) {
    dom.append_child(parent, ElementSpec::new("h1").text(&article.name));
    let posted = format_posted_date(&article.date_time_start);
    if posted.is_empty() {
        warn!(date_time_start = %article.date_time_start, "Unparseable publish date");
    } else {
        dom.append_child(parent, ElementSpec::new("p").text(&format!("Posted: {posted}")));
    }
}

fn render_body<D: Dom>(dom: &mut D, parent: NodeId, id: &str, article: &Article) -> NodeId {
    let body = dom.append_child(parent, ElementSpec::new("article").id(id));
    dom.append_html(body, &normalize_html_content(&article.content));
    body
}

/// Render `articles[0]` (and `articles[1]` collapsed, when present), or the
/// not-found state when there is nothing to show.
#[instrument(level = "info", skip_all, fields(articles = articles.len()))]
pub fn render_article_page<D: Dom>(
    dom: &mut D,
    articles: &[Article],
    params: &PageParameters,
) -> PageRender {
    let root = dom.body();
    let Some(primary) = articles.first() else {
        let main = dom.append_child(root, ElementSpec::new("main").id(NOT_FOUND_ID));
        dom.append_child(main, ElementSpec::new("h1").text("Article not found"));
        warn!("No article to render; showing not found");
        return PageRender::NotFound;
    };

    let main = dom.append_child(root, ElementSpec::new("main").id("article-page"));
    let mut feji = vec![render_feji_banner(dom, main, true)];
    render_header(dom, main, primary);
    feji.push(render_feji_player(dom, main, &params.feji_player_id));
    let primary_node = render_body(dom, main, "article-primary", primary);

    let sentinel = dom.append_child(
        main,
        ElementSpec::new("div").id(REVEAL_SENTINEL_ID).style("height", "1px"),
    );
    let end_ads = dom.append_child(
        main,
        ElementSpec::new("div")
            .id(END_ARTICLE_ADS_ID)
            .style("min-height", "0px")
            .style("max-height", END_ADS_PARTIAL_HEIGHT)
            .style("visibility", "hidden"),
    );

    let related = articles.get(1).map(|second| {
        let wrapper = dom.append_child(
            main,
            ElementSpec::new("div")
                .id(RELATED_ARTICLE_ID)
                .attr("aria-hidden", "true")
                .style("max-height", "0px")
                .style("overflow", "hidden")
                .style("opacity", "0"),
        );
        feji.push(render_feji_banner(dom, wrapper, false));
        render_header(dom, wrapper, second);
        render_body(dom, wrapper, "article-related", second);
        wrapper
    });

    dom.append_child(
        main,
        ElementSpec::new("footer").id("page-footer").style("height", FOOTER_HEIGHT),
    );
    let reward_modal = dom.append_child(
        main,
        ElementSpec::new("div")
            .id(REWARD_MODAL_ID)
            .attr("class", "modal")
            .style("display", "none"),
    );

    let title = primary.page_title();
    info!(%title, has_related = related.is_some(), "Rendered article page");
    PageRender::Article(RenderedPage {
        title,
        primary: primary_node,
        sentinel,
        end_ads,
        related,
        reward_modal,
        feji,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::HeadlessPage;
    use crate::models::Viewport;

    fn article(name: &str, content: &str) -> Article {
        Article {
            name: name.into(),
            content: content.into(),
            date_time_start: "2024-05-01T08:00:00".into(),
            user_code: "u7".into(),
            ..Default::default()
        }
    }

    fn page() -> HeadlessPage {
        HeadlessPage::new(Viewport { width: 1024.0, height: 768.0 })
    }

    #[test]
    fn test_not_found() {
        let mut page = page();
        let render = render_article_page(&mut page, &[], &PageParameters::default());
        assert_eq!(render, PageRender::NotFound);
        let node = page.get_element_by_id(NOT_FOUND_ID).unwrap();
        assert_eq!(page.text_content(node), "Article not found");
        assert!(page.get_element_by_id(REVEAL_SENTINEL_ID).is_none());
    }

    #[test]
    fn test_single_article_layout() {
        let mut page = page();
        let articles = [article("Big news", "<p></p><h2>Title</h2><div id=\"qctaboo-mid\"></div>")];
        let PageRender::Article(rendered) =
            render_article_page(&mut page, &articles, &PageParameters::default())
        else {
            panic!("expected article");
        };
        assert_eq!(rendered.title, "Big news-u7");
        assert!(rendered.related.is_none());
        assert!(page.get_element_by_id("ub-banner1").is_some());
        assert!(page.get_element_by_id("div-ub-feji.io_1723454353847").is_some());
        assert!(page.get_element_by_id(MID_ARTICLE_TARGET_ID).is_some());
        assert!(page.elements_by_tag("p").iter().any(|&p| page.text_content(p) == "Posted: 2024-05-01"));
        // Empty paragraph removed before rendering.
        assert_eq!(page.children(rendered.primary).len(), 2);
        assert_eq!(page.bounding_rect(rendered.end_ads).unwrap().height, 0.0);
        assert_eq!(page.style(rendered.end_ads, "max-height").as_deref(), Some(END_ADS_PARTIAL_HEIGHT));
        assert_eq!(page.get_element_by_id(REWARD_MODAL_ID), Some(rendered.reward_modal));
        assert_eq!(page.style(rendered.reward_modal, "display").as_deref(), Some("none"));
    }

    #[test]
    fn test_related_article_starts_collapsed() {
        let mut page = page();
        let articles = [article("One", "<p>a</p>"), article("Two", &"<p>long text</p>".repeat(50))];
        let PageRender::Article(rendered) =
            render_article_page(&mut page, &articles, &PageParameters::default())
        else {
            panic!("expected article");
        };
        let related = rendered.related.unwrap();
        assert_eq!(page.bounding_rect(related).unwrap().height, 0.0);
        assert_eq!(page.attr(related, "aria-hidden").as_deref(), Some("true"));
        assert!(page.get_element_by_id("ub-banner10").is_some());
        assert_eq!(rendered.feji.len(), 3);
    }
}
