//! Data models for articles, ad placements and viewport geometry.
//!
//! This module defines the small, transient structures the controller works with:
//! - [`Article`]: an article as served by the news API (or its JSON backup)
//! - [`AdSlotDescriptor`]: one ad placement and the network that fills it
//! - [`ViewportTriggerConfig`]: when the sentinel and the scroll trigger fire
//! - [`Viewport`] / [`Rect`]: geometry read from the host page
//!
//! Nothing here is persisted. An article lives for a single page render.

use crate::reveal::sentinel::RootMargin;
use serde::{Deserialize, Serialize};

/// A news article as returned by the article API.
///
/// The API is inconsistent about casing, so every field also accepts its
/// PascalCase spelling. Missing fields default to empty strings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Article {
    /// Headline.
    #[serde(default, alias = "Name")]
    pub name: String,
    /// Raw article HTML (normalized before display).
    #[serde(default, alias = "Content")]
    pub content: String,
    /// Cover image URL.
    #[serde(default, alias = "AvatarLink")]
    pub avatar_link: String,
    /// Publication timestamp, ISO-like.
    #[serde(default, alias = "DateTimeStart")]
    pub date_time_start: String,
    /// Author / user code, appended to the page title.
    #[serde(default, alias = "UserCode")]
    pub user_code: String,
    /// Soft-deleted records are filtered out before rendering.
    #[serde(default, alias = "IsDeleted", skip_serializing)]
    pub is_deleted: bool,
}

impl Article {
    /// Page title in the `"{name}-{userCode}"` form used by the site.
    pub fn page_title(&self) -> String {
        format!("{}-{}", self.name, self.user_code)
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum OneOrMany<T> {
    Many(Vec<T>),
    One(T),
}

/// Envelope returned by `/News/news-detailvip` and by the JSON backup.
///
/// `data` is either a single article or a list (primary + related).
#[derive(Debug, Deserialize)]
pub struct ArticleResponse {
    #[serde(default, alias = "Data")]
    data: Option<OneOrMany<Article>>,
}

impl ArticleResponse {
    /// Flatten the envelope into a list, dropping soft-deleted records.
    pub fn into_articles(self) -> Vec<Article> {
        let articles = match self.data {
            Some(OneOrMany::Many(list)) => list,
            Some(OneOrMany::One(article)) => vec![article],
            None => Vec::new(),
        };
        articles.into_iter().filter(|a| !a.is_deleted).collect()
    }
}

/// Which ad provider fills a slot. Exactly one per slot, never both.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AdNetwork {
    Taboola,
    Mgid,
}

impl AdNetwork {
    /// `isMgid == 1` selects MGID; anything else selects Taboola.
    pub fn from_is_mgid(is_mgid: i64) -> Self {
        if is_mgid == 1 {
            AdNetwork::Mgid
        } else {
            AdNetwork::Taboola
        }
    }
}

/// Describes a single ad placement on the page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AdSlotDescriptor {
    /// Id of the element the widget renders into (Taboola container id).
    pub container_id: String,
    pub network: AdNetwork,
    /// Taboola `placement` label.
    pub placement_label: String,
    /// Taboola `mode`.
    pub mode: String,
    /// Push `{flush: true}` after the Taboola config.
    pub flush_after: bool,
    /// MGID `data-widget-id`.
    pub widget_id: String,
}

impl AdSlotDescriptor {
    pub const MID_ARTICLE_CONTAINER: &'static str = "taboola-below-mid-article";
    pub const END_ARTICLE_CONTAINER: &'static str = "taboola-below-article-thumbnails";

    /// Slot portaled into `#qctaboo-mid` inside the primary article body.
    pub fn mid_article(network: AdNetwork, widget_id: &str) -> Self {
        Self {
            container_id: Self::MID_ARTICLE_CONTAINER.to_string(),
            network,
            placement_label: "Mid article".to_string(),
            mode: "thumbs-feed-01-b".to_string(),
            flush_after: false,
            widget_id: widget_id.to_string(),
        }
    }

    /// Feed slot shown below the primary article once the sentinel fires.
    pub fn end_article(network: AdNetwork, widget_id: &str) -> Self {
        Self {
            container_id: Self::END_ARTICLE_CONTAINER.to_string(),
            network,
            placement_label: "Below Article Thumbnails".to_string(),
            mode: "thumbs-feed-01".to_string(),
            flush_after: true,
            widget_id: widget_id.to_string(),
        }
    }
}

/// When the sentinel and the scroll trigger fire.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ViewportTriggerConfig {
    /// Expansion applied to the viewport before intersecting the sentinel.
    pub root_margin: RootMargin,
    /// Fraction of viewport height the ad block's top edge must reach.
    pub threshold_fraction: f64,
    /// Also require `top > 0`, so jumping straight past the block never fires.
    pub require_positive_top: bool,
}

impl Default for ViewportTriggerConfig {
    fn default() -> Self {
        Self {
            root_margin: RootMargin::vertical(600.0),
            threshold_fraction: 0.7,
            require_positive_top: true,
        }
    }
}

/// Visible area of the host window, in CSS pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Viewport {
    pub width: f64,
    pub height: f64,
}

/// Bounding rectangle relative to the viewport's top-left corner.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Rect {
    pub top: f64,
    pub left: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn bottom(&self) -> f64 {
        self.top + self.height
    }

    pub fn right(&self) -> f64 {
        self.left + self.width
    }
}
