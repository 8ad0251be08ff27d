//! # article_reveal
//!
//! Viewport-driven reveal and ad insertion for news article pages.
//!
//! An article page shows the primary story, then an end-of-article ad block,
//! then a second ("related") story. The related story stays collapsed until
//! the reader has scrolled the ad block far enough into view. Ad widgets are
//! mounted lazily into containers that arrive inside the article HTML, and
//! social embeds are resized whenever content becomes visible.
//!
//! ## Architecture
//!
//! 1. **Fetch**: [`api::get_articles`] resolves a slug through the API, then a
//!    JSON backup, never failing
//! 2. **Render**: [`render::render_article_page`] lays the page out in a [`dom::Dom`]
//! 3. **Mount**: [`reveal::RevealController`] wires reveal state, sentinel,
//!    scroll trigger, mount resolver and iframe normalizer to the page
//! 4. **Drive**: the host feeds scroll ticks; [`simulate`] does so headlessly
//!
//! Ad vendors are reached only through [`ads::AdQueue`].

pub mod ads;
pub mod api;
pub mod cli;
pub mod config;
pub mod dom;
pub mod error;
pub mod models;
pub mod render;
pub mod reveal;
pub mod simulate;
pub mod utils;

pub use error::{Error, Result};
