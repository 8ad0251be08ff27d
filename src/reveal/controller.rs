//! Composition root for one article page.
//!
//! [`RevealController::mount`] renders the page, wires the reveal state,
//! sentinel, trigger and iframe normalizer together and hands back a
//! controller the host drives with scroll ticks. The async parts
//! ([`RevealController::mount_mid_slot`], [`RevealController::load_scripts`])
//! borrow the controller shared, so they can be joined with the scroll loop
//! on the same task.

use crate::ads::AdQueue;
use crate::ads::rewarded::{queue_rewarded_ad, rewarded_due};
use crate::ads::scripts::{AdScriptsLoader, ScriptLoad, ensure_script, load_taboola_loader};
use crate::ads::widgets::{MountedWidget, init_feji, mount_widget, unmount_widget};
use crate::config::{ControllerConfig, PageParameters};
use crate::dom::{Dom, NodeId};
use crate::error::Result;
use crate::models::{AdNetwork, AdSlotDescriptor, Article};
use crate::render::{MID_ARTICLE_TARGET_ID, PageRender, RenderedPage, render_article_page};
use crate::reveal::iframes::normalize_iframes;
use crate::reveal::resolver::{AdMountResolver, Teardown};
use crate::reveal::sentinel::SentinelObserver;
use crate::reveal::state::{RevealProvider, RevealState, Subscription, use_reveal_state};
use crate::reveal::trigger::ScrollTrigger;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::cell::{Cell, RefCell};
use std::rc::Rc;
use tracing::{debug, info, instrument};

/// What a single scroll tick changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ScrollOutcome {
    /// The sentinel fired and the end-of-article ads were shown.
    pub ads_shown: bool,
    /// The trigger fired and the related article was revealed.
    pub revealed: bool,
}

fn reveal_related<D: Dom>(dom: &RefCell<D>, end_ads: NodeId, related: Option<NodeId>, breakpoint: f64) {
    let mut dom = dom.borrow_mut();
    dom.set_style(end_ads, "max-height", "none");
    let Some(node) = related else {
        debug!("adsMoved set but there is no related article; nothing to reveal");
        return;
    };
    dom.set_style(node, "max-height", "none");
    dom.set_style(node, "overflow", "visible");
    dom.set_style(node, "opacity", "1");
    dom.set_attr(node, "aria-hidden", "false");
    let adjusted = normalize_iframes(&mut *dom, breakpoint);
    info!(adjusted, "Related article revealed");
}

/// Drives one rendered article page from mount to teardown.
///
/// All methods take `&self`, so the scroll loop and the async waits can
/// share one controller on a single task.
pub struct RevealController<D: Dom + 'static> {
    /// The page, shared with the reveal listener.
    dom: Rc<RefCell<D>>,
    /// Vendor queues every widget pushes onto.
    queue: Rc<dyn AdQueue>,
    params: PageParameters,
    config: ControllerConfig,
    /// Handles to the rendered containers.
    page: RenderedPage,
    /// Owns the `adsMoved` flag for this page.
    provider: RevealProvider,
    sentinel: RefCell<SentinelObserver>,
    trigger: RefCell<ScrollTrigger>,
    /// Set once the sentinel has fired.
    ads_visible: Cell<bool>,
    /// Mounted Taboola/MGID widgets, cleared on teardown.
    widgets: RefCell<Vec<MountedWidget>>,
    /// Reveal-state listeners; dropping them unsubscribes.
    subscriptions: RefCell<Vec<Subscription>>,
    mid_resolver: AdMountResolver,
    scripts: AdScriptsLoader,
    /// Cancels pending resolver and loader waits.
    lifecycle: Teardown,
    torn_down: Cell<bool>,
}

impl<D: Dom + 'static> RevealController<D> {
    /// Render `articles` into `dom` and arm the sentinel.
    ///
    /// Returns `Ok(None)` when there is no article: the not-found state is
    /// rendered and no controller is mounted.
    #[instrument(level = "info", skip_all, fields(articles = articles.len(), is_mgid = params.is_mgid))]
    pub fn mount(
        dom: Rc<RefCell<D>>,
        queue: Rc<dyn AdQueue>,
        articles: &[Article],
        params: PageParameters,
        config: ControllerConfig,
    ) -> Result<Option<Self>> {
        let page = {
            let mut d = dom.borrow_mut();
            match render_article_page(&mut *d, articles, &params) {
                PageRender::NotFound => return Ok(None),
                PageRender::Article(page) => page,
            }
        };

        {
            let mut d = dom.borrow_mut();
            init_feji(&*queue, &params.feji_hb_zone, &params.feji_player_id);
            match params.network() {
                AdNetwork::Taboola => {
                    load_taboola_loader(&mut *d, &*queue, &params.taboola_publisher_id);
                }
                AdNetwork::Mgid => {
                    ensure_script(&mut *d, &params.ads_keeper_src, None, ScriptLoad::Async);
                }
            }
            normalize_iframes(&mut *d, config.mobile_breakpoint);
        }

        let provider = RevealProvider::new();
        let state = use_reveal_state(Some(&provider))?;

        let listener_dom = Rc::clone(&dom);
        let related = page.related;
        let end_ads = page.end_ads;
        let breakpoint = config.mobile_breakpoint;
        let subscription = state.subscribe(move |moved| {
            if moved {
                reveal_related(&listener_dom, end_ads, related, breakpoint);
            }
        })?;

        let lifecycle = Teardown::new();

        info!(title = %page.title, network = ?params.network(), "Reveal controller mounted");
        Ok(Some(Self {
            sentinel: RefCell::new(SentinelObserver::new(config.trigger.root_margin)),
            trigger: RefCell::new(ScrollTrigger::new(config.trigger.clone(), state)),
            mid_resolver: AdMountResolver::new(config.mid_slot).with_teardown(lifecycle.signal()),
            scripts: AdScriptsLoader::new(config.scripts_start_delay(), config.scripts_timeout())
                .with_teardown(lifecycle.signal()),
            lifecycle,
            dom,
            queue,
            params,
            config,
            page,
            provider,
            ads_visible: Cell::new(false),
            widgets: RefCell::new(Vec::new()),
            subscriptions: RefCell::new(vec![subscription]),
            torn_down: Cell::new(false),
        }))
    }

    pub fn dom(&self) -> &Rc<RefCell<D>> {
        &self.dom
    }

    pub fn page(&self) -> &RenderedPage {
        &self.page
    }

    pub fn reveal_state(&self) -> RevealState {
        self.provider.state()
    }

    pub fn ads_visible(&self) -> bool {
        self.ads_visible.get()
    }

    pub fn is_revealed(&self) -> Result<bool> {
        Ok(self.provider.state().ads_moved()?)
    }

    pub fn is_torn_down(&self) -> bool {
        self.torn_down.get()
    }

    pub fn mounted_widgets(&self) -> Vec<MountedWidget> {
        self.widgets.borrow().clone()
    }

    fn show_end_ads(&self) {
        let slot = AdSlotDescriptor::end_article(self.params.network(), &self.params.mg_widget_feed_id);
        let mut dom = self.dom.borrow_mut();
        let host = self.page.end_ads;
        dom.set_style(host, "min-height", "350px");
        dom.set_style(host, "visibility", "visible");
        if let Some(widget) = mount_widget(&mut *dom, host, &slot, &*self.queue) {
            self.widgets.borrow_mut().push(widget);
        }
    }

    /// Handle one scroll event.
    pub fn on_scroll(&self) -> Result<ScrollOutcome> {
        let mut outcome = ScrollOutcome::default();
        if self.torn_down.get() {
            return Ok(outcome);
        }

        let (sentinel_rect, viewport) = {
            let dom = self.dom.borrow();
            (dom.bounding_rect(self.page.sentinel), dom.viewport())
        };
        if self.sentinel.borrow_mut().observe(sentinel_rect, viewport) {
            self.ads_visible.set(true);
            self.show_end_ads();
            outcome.ads_shown = true;
        }

        let mut trigger = self.trigger.borrow_mut();
        trigger.arm(self.ads_visible.get())?;
        let top = self.dom.borrow().bounding_rect(self.page.end_ads).map(|r| r.top);
        // The dom borrow above is released: reveal listeners re-borrow it.
        outcome.revealed = trigger.on_scroll(top, viewport.height)?;
        Ok(outcome)
    }

    /// Wait for `#qctaboo-mid` and mount the mid-article slot into it.
    ///
    /// # Returns
    ///
    /// The mounted widget. `None` when the target never appeared, the slot
    /// was already mounted, or the page was torn down during the wait; in the
    /// last case nothing reaches the vendor queues.
    pub async fn mount_mid_slot(&self) -> Option<MountedWidget> {
        if self.torn_down.get() {
            return None;
        }
        let slot = AdSlotDescriptor::mid_article(self.params.network(), &self.params.mg_widget_id1);
        let widget = self
            .mid_resolver
            .mount_into(&self.dom, MID_ARTICLE_TARGET_ID, &slot, &*self.queue)
            .await?;
        if self.torn_down.get() {
            unmount_widget(&mut *self.dom.borrow_mut(), &widget);
            return None;
        }
        self.widgets.borrow_mut().push(widget.clone());
        Some(widget)
    }

    /// Wait for an ad container, then load the vendor scripts.
    pub async fn load_scripts(&self) -> Option<String> {
        if self.torn_down.get() {
            return None;
        }
        self.scripts.run(&self.dom).await
    }

    pub fn scripts_loaded(&self) -> bool {
        self.scripts.is_loaded()
    }

    /// Queue the rewarded ad unless it was shown within the cap window.
    ///
    /// # Arguments
    ///
    /// * `last_shown` - When the reader last saw the rewarded ad, if ever
    /// * `now` - The current time
    ///
    /// # Returns
    ///
    /// The new "last shown" timestamp, or `None` while capped. The reward
    /// modal is shown when the ad is queued and hidden otherwise.
    pub fn queue_rewarded(
        &self,
        last_shown: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Option<DateTime<Utc>> {
        if self.torn_down.get() {
            return None;
        }
        let display = if rewarded_due(last_shown, now) { "block" } else { "none" };
        self.dom.borrow_mut().set_style(self.page.reward_modal, "display", display);
        queue_rewarded_ad(&*self.queue, &self.params.rewarded_ad_unit, last_shown, now)
    }

    /// Release every registration and clear vendor markup. Idempotent.
    #[instrument(level = "info", skip_all)]
    pub fn teardown(&self) {
        if self.torn_down.replace(true) {
            return;
        }
        self.lifecycle.trigger();
        self.sentinel.borrow_mut().disconnect();
        self.trigger.borrow_mut().disarm();
        self.subscriptions.borrow_mut().clear();

        let widgets: Vec<MountedWidget> = self.widgets.borrow_mut().drain(..).collect();
        let mut dom = self.dom.borrow_mut();
        for widget in widgets.iter().chain(&self.page.feji) {
            unmount_widget(&mut *dom, widget);
        }
        info!(widgets = widgets.len(), feji = self.page.feji.len(), "Reveal controller torn down");
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }
}

impl<D: Dom + 'static> Drop for RevealController<D> {
    fn drop(&mut self) {
        self.teardown();
    }
}
