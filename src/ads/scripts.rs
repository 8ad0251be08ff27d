//! Vendor script loading.
//!
//! Adsconex containers arrive inside the article HTML, so the vendor scripts
//! are only worth loading once one of those containers is in the document.
//! [`AdScriptsLoader`] waits for any known container (observe strategy with a
//! timeout fallback) and then loads the scripts in order, at most once.

use crate::ads::{AdQueue, TaboolaEntry};
use crate::dom::{Dom, ElementSpec};
use crate::reveal::resolver::{AwaitStrategy, TeardownSignal, await_element};
use itertools::Itertools;
use std::cell::{Cell, RefCell};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info, instrument, warn};

/// Container ids that Adsconex, Taboola and the video player render into.
pub const AD_CONTAINER_IDS: &[&str] = &[
    "js_adsconex_parallax_1",
    "js_adsconex_parallax_2",
    "div_adsconex_inpage_1",
    "div_adsconex_inpage_2",
    "div_adsconex_banner_responsive_1",
    "div_adsconex_banner_responsive_2",
    "div_adsconex_banner_responsive_3",
    "div_adsconex_banner_responsive_4",
    "div_adsconex_banner_responsive_5",
    "div_adsconex_banner_responsive_6",
    "div_adsconex_banner_responsive_7",
    "div_adsconex_banner_responsive_8",
    "div_adsconex_banner_responsive_9",
    "div_adsconex_banner_responsive_11",
    "div_adsconex_banner_responsive_12",
    "div_adsconex_banner_responsive_13",
    "div_adsconex_banner_responsive_14",
    "div_adsconex_banner_responsive_15",
    "div_adsconex_banner_responsive_16",
    "div_adsconex_banner_responsive_17",
    "div_adsconex_banner_responsive_18",
    "qctaboo-mid",
    "adsconex-video-container",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptLoad {
    Defer,
    Async,
}

/// An external `<script>` include.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScriptSpec {
    pub src: &'static str,
    pub id: &'static str,
    pub load: ScriptLoad,
}

pub const ADSCONEX_PLAYER: ScriptSpec = ScriptSpec {
    src: "https://cdn.adsconex.com/js/adsconex-player.js",
    id: "adsconex-player",
    load: ScriptLoad::Defer,
};

pub const GOOGLE_PUBLISHER_TAG: ScriptSpec = ScriptSpec {
    src: "https://securepubads.g.doubleclick.net/tag/js/gpt.js",
    id: "gpt-js",
    load: ScriptLoad::Async,
};

pub const ADSCONEX_BANNER: ScriptSpec = ScriptSpec {
    src: "https://cdn.adsconex.com/js/adsconex-banner-bw-feji-rl.js",
    id: "adsconex-banner",
    load: ScriptLoad::Defer,
};

/// Append a `<script>` unless one with the same `src` is already present.
/// Returns whether a new element was appended.
pub fn ensure_script<D: Dom>(dom: &mut D, src: &str, id: Option<&str>, load: ScriptLoad) -> bool {
    let exists = dom
        .elements_by_tag("script")
        .into_iter()
        .any(|n| dom.attr(n, "src").as_deref() == Some(src));
    if exists {
        debug!(src, "Script already present");
        return false;
    }

    let mut spec = ElementSpec::new("script").attr("src", src);
    if let Some(id) = id {
        spec = spec.id(id);
    }
    spec = match load {
        ScriptLoad::Defer => spec.attr("defer", ""),
        ScriptLoad::Async => spec.attr("async", ""),
    };
    let body = dom.body();
    dom.append_child(body, spec);
    true
}

/// Taboola loader: queue `{article: "auto"}` and include the publisher loader.
pub fn load_taboola_loader<D: Dom>(dom: &mut D, queue: &dyn AdQueue, publisher_id: &str) -> bool {
    let src = format!("//cdn.taboola.com/libtrc/metaconex-{publisher_id}/loader.js");
    if dom.get_element_by_id("tb_loader_script").is_some() {
        return false;
    }
    queue.push_taboola_config(TaboolaEntry::auto_article());
    ensure_script(dom, &src, Some("tb_loader_script"), ScriptLoad::Async)
}

/// Waits for ad containers, then loads the Adsconex and GPT scripts once.
#[derive(Debug)]
pub struct AdScriptsLoader {
    /// Pause after mount before the container wait starts.
    start_delay: Duration,
    /// How long to observe before loading anyway.
    timeout: Duration,
    /// Set by the first [`AdScriptsLoader::load_scripts`].
    loaded: Cell<bool>,
    /// Cancels the delay and the wait; nothing is loaded after it fires.
    teardown: TeardownSignal,
}

impl AdScriptsLoader {
    pub fn new(start_delay: Duration, timeout: Duration) -> Self {
        Self { start_delay, timeout, loaded: Cell::new(false), teardown: TeardownSignal::never() }
    }

    /// Tie this loader to a page's teardown.
    pub fn with_teardown(mut self, teardown: TeardownSignal) -> Self {
        self.teardown = teardown;
        self
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded.get()
    }

    /// Wait for any of [`AD_CONTAINER_IDS`] and load the scripts. On timeout
    /// the scripts are loaded anyway.
    ///
    /// # Returns
    ///
    /// The container that was found. `None` on timeout, and also after
    /// teardown, in which case no script is appended.
    #[instrument(level = "info", skip_all)]
    pub async fn run<D: Dom>(&self, dom: &RefCell<D>) -> Option<String> {
        tokio::select! {
            biased;
            _ = self.teardown.cancelled() => {
                debug!("Page torn down before the start delay elapsed");
                return None;
            }
            _ = sleep(self.start_delay) => {}
        }
        let strategy = AwaitStrategy::Observe { timeout_ms: self.timeout.as_millis() as u64 };
        let found = await_element(dom, AD_CONTAINER_IDS, strategy, &self.teardown).await;
        if self.teardown.is_cancelled() {
            debug!("Page torn down; scripts not loaded");
            return None;
        }
        match &found {
            Some(found) => info!(container = %found.id, "Found ad container"),
            None => warn!(
                timeout_ms = self.timeout.as_millis() as u64,
                watched = %AD_CONTAINER_IDS.iter().join(","),
                "Timeout reached, loading scripts anyway"
            ),
        }
        self.load_scripts(&mut *dom.borrow_mut());
        found.map(|f| f.id)
    }

    /// Load player, GPT and banner scripts in that order. No-op after the first call.
    pub fn load_scripts<D: Dom>(&self, dom: &mut D) -> bool {
        if self.loaded.replace(true) {
            return false;
        }
        for script in [ADSCONEX_PLAYER, GOOGLE_PUBLISHER_TAG, ADSCONEX_BANNER] {
            ensure_script(dom, script.src, Some(script.id), script.load);
        }
        info!("All ad scripts loaded");
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ads::RecordingAdQueue;
    use crate::dom::HeadlessPage;
    use crate::models::Viewport;
    use crate::reveal::resolver::Teardown;

    fn page() -> RefCell<HeadlessPage> {
        RefCell::new(HeadlessPage::new(Viewport { width: 1024.0, height: 768.0 }))
    }

    fn script_srcs(page: &HeadlessPage) -> Vec<String> {
        page.elements_by_tag("script")
            .into_iter()
            .filter_map(|n| page.attr(n, "src"))
            .collect()
    }

    #[test]
    fn test_ensure_script_dedupes_by_src() {
        let dom = page();
        let mut page = dom.borrow_mut();
        assert!(ensure_script(&mut *page, "https://a/x.js", None, ScriptLoad::Async));
        assert!(!ensure_script(&mut *page, "https://a/x.js", Some("other"), ScriptLoad::Defer));
        assert_eq!(script_srcs(&page), vec!["https://a/x.js".to_string()]);
    }

    #[test]
    fn test_load_scripts_in_order_once() {
        let dom = page();
        let loader = AdScriptsLoader::new(Duration::ZERO, Duration::from_millis(10));
        let mut page = dom.borrow_mut();
        assert!(loader.load_scripts(&mut *page));
        assert!(!loader.load_scripts(&mut *page));
        assert_eq!(
            script_srcs(&page),
            vec![ADSCONEX_PLAYER.src, GOOGLE_PUBLISHER_TAG.src, ADSCONEX_BANNER.src]
        );
        let player = page.get_element_by_id("adsconex-player").unwrap();
        assert!(page.attr(player, "defer").is_some());
    }

    #[tokio::test]
    async fn test_run_loads_when_container_present() {
        let dom = page();
        {
            let mut page = dom.borrow_mut();
            let body = page.body();
            page.append_html(body, r#"<p>x</p><div id="div_adsconex_inpage_1"></div>"#);
        }
        let loader = AdScriptsLoader::new(Duration::from_millis(1), Duration::from_millis(500));
        assert_eq!(loader.run(&dom).await.as_deref(), Some("div_adsconex_inpage_1"));
        assert!(loader.is_loaded());
        assert_eq!(script_srcs(&dom.borrow()).len(), 3);
    }

    #[tokio::test]
    async fn test_run_loads_anyway_on_timeout() {
        let dom = page();
        let loader = AdScriptsLoader::new(Duration::ZERO, Duration::from_millis(10));
        assert!(loader.run(&dom).await.is_none());
        assert!(loader.is_loaded());
        assert_eq!(script_srcs(&dom.borrow()).len(), 3);
    }

    #[test]
    fn test_taboola_loader_once() {
        let dom = page();
        let queue = RecordingAdQueue::new();
        let mut page = dom.borrow_mut();
        assert!(load_taboola_loader(&mut *page, &queue, "topnewsusfejiio"));
        assert!(!load_taboola_loader(&mut *page, &queue, "topnewsusfejiio"));
        assert_eq!(queue.taboola_entries(), vec![TaboolaEntry::auto_article()]);
        assert_eq!(
            script_srcs(&page),
            vec!["//cdn.taboola.com/libtrc/metaconex-topnewsusfejiio/loader.js".to_string()]
        );
    }

    #[tokio::test]
    async fn test_run_after_teardown_loads_nothing() {
        let dom = page();
        let teardown = Teardown::new();
        let loader = AdScriptsLoader::new(Duration::from_millis(1), Duration::from_millis(500))
            .with_teardown(teardown.signal());
        let (found, _) = tokio::join!(loader.run(&dom), async {
            sleep(Duration::from_millis(5)).await;
            teardown.trigger();
            let mut page = dom.borrow_mut();
            let body = page.body();
            page.append_html(body, r#"<div id="div_adsconex_inpage_1"></div>"#);
        });
        assert!(found.is_none());
        assert!(!loader.is_loaded());
        assert!(script_srcs(&dom.borrow()).is_empty());
    }
}
