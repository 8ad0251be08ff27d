//! Scripted reader: scroll a mounted page top to bottom and report what happened.
//!
//! The scroll loop, the mid-slot resolver and the script loader run as three
//! futures joined on the current task, the same way a browser interleaves
//! scroll events with timers and mutation callbacks.

use crate::ads::WindowQueues;
use crate::dom::{Dom, HeadlessPage};
use crate::error::Result;
use crate::models::Viewport;
use crate::render::{END_ARTICLE_ADS_ID, RELATED_ARTICLE_ID};
use crate::reveal::controller::RevealController;
use chrono::Utc;
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info, instrument};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimulationOptions {
    /// Pixels per frame; negative scrolls up.
    pub scroll_step: f64,
    pub frame: Duration,
    pub max_frames: usize,
}

impl Default for SimulationOptions {
    fn default() -> Self {
        Self { scroll_step: 120.0, frame: Duration::from_millis(16), max_frames: 2000 }
    }
}

/// One scroll position where something changed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScrollEvent {
    pub frame: usize,
    pub scroll_y: f64,
    pub event: &'static str,
}

#[derive(Debug, Clone, Serialize)]
pub struct SimulationReport {
    pub title: Option<String>,
    pub not_found: bool,
    pub viewport: Viewport,
    pub frames: usize,
    pub events: Vec<ScrollEvent>,
    pub ads_visible: bool,
    pub revealed: bool,
    pub related_height: Option<f64>,
    pub end_ads_height: Option<f64>,
    pub mid_slot_mounted: bool,
    pub scripts_trigger: Option<String>,
    pub scripts_loaded: bool,
    pub rewarded_queued: bool,
    pub document_height: f64,
    /// Vendor globals as they would appear on `window`.
    pub queues: Value,
}

impl SimulationReport {
    pub fn not_found(page: &HeadlessPage, queues: &WindowQueues) -> Self {
        Self {
            title: None,
            not_found: true,
            viewport: page.viewport(),
            frames: 0,
            events: Vec::new(),
            ads_visible: false,
            revealed: false,
            related_height: None,
            end_ads_height: None,
            mid_slot_mounted: false,
            scripts_trigger: None,
            scripts_loaded: false,
            rewarded_queued: false,
            document_height: page.document_height(),
            queues: queues.snapshot(),
        }
    }
}

async fn scroll_loop(
    controller: &RevealController<HeadlessPage>,
    options: SimulationOptions,
) -> Result<(usize, Vec<ScrollEvent>)> {
    let dom = controller.dom();
    let mut events = Vec::new();
    let mut frames = 0;
    while frames < options.max_frames {
        frames += 1;
        let moved = {
            let mut page = dom.borrow_mut();
            let before = page.scroll_y();
            page.scroll_by(options.scroll_step);
            page.scroll_y() != before
        };
        let outcome = controller.on_scroll()?;
        let scroll_y = dom.borrow().scroll_y();
        if outcome.ads_shown {
            events.push(ScrollEvent { frame: frames, scroll_y, event: "ads_shown" });
        }
        if outcome.revealed {
            events.push(ScrollEvent { frame: frames, scroll_y, event: "revealed" });
        }
        if !moved {
            debug!(frames, scroll_y, "Reached end of page");
            break;
        }
        sleep(options.frame).await;
    }
    Ok((frames, events))
}

fn height_of(page: &HeadlessPage, id: &str) -> Option<f64> {
    page.get_element_by_id(id)
        .and_then(|n| page.bounding_rect(n))
        .map(|r| r.height)
}

/// Drive a mounted controller through one read of the page.
#[instrument(level = "info", skip_all, fields(step = options.scroll_step))]
pub async fn run_simulation(
    controller: &RevealController<HeadlessPage>,
    queues: &WindowQueues,
    options: SimulationOptions,
) -> Result<SimulationReport> {
    let rewarded_queued = controller.queue_rewarded(None, Utc::now()).is_some();

    let (scrolled, mid, scripts_trigger) = futures::join!(
        scroll_loop(controller, options),
        controller.mount_mid_slot(),
        controller.load_scripts(),
    );
    let (frames, events) = scrolled?;

    let page = controller.dom().borrow();
    let report = SimulationReport {
        title: Some(controller.page().title.clone()),
        not_found: false,
        viewport: page.viewport(),
        frames,
        events,
        ads_visible: controller.ads_visible(),
        revealed: controller.is_revealed()?,
        related_height: height_of(&page, RELATED_ARTICLE_ID),
        end_ads_height: height_of(&page, END_ARTICLE_ADS_ID),
        mid_slot_mounted: mid.is_some(),
        scripts_trigger,
        scripts_loaded: controller.scripts_loaded(),
        rewarded_queued,
        document_height: page.document_height(),
        queues: queues.snapshot(),
    };
    info!(
        frames = report.frames,
        revealed = report.revealed,
        mid_slot_mounted = report.mid_slot_mounted,
        "Simulation finished"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ControllerConfig, PageParameters};
    use crate::models::Article;
    use crate::reveal::resolver::AwaitStrategy;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn articles() -> Vec<Article> {
        let body = "<p>Sentence of reasonable length for a news article body.</p>".repeat(30);
        vec![
            Article {
                name: "First".into(),
                content: format!("{body}<div id=\"qctaboo-mid\"></div>{body}"),
                user_code: "u1".into(),
                ..Default::default()
            },
            Article { name: "Second".into(), content: body.clone(), ..Default::default() },
        ]
    }

    fn config() -> ControllerConfig {
        ControllerConfig {
            mid_slot: AwaitStrategy::Observe { timeout_ms: 50 },
            scripts_start_delay_ms: 0,
            scripts_timeout_ms: 50,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_simulation_reveals_and_reports_queues() {
        let dom = Rc::new(RefCell::new(HeadlessPage::new(Viewport { width: 1280.0, height: 800.0 })));
        let queues = Rc::new(WindowQueues::new());
        let controller = RevealController::mount(
            Rc::clone(&dom),
            queues.clone(),
            &articles(),
            PageParameters::default(),
            config(),
        )
        .unwrap()
        .unwrap();
        let options = SimulationOptions { frame: Duration::from_millis(1), ..Default::default() };

        let report = run_simulation(&controller, &queues, options).await.unwrap();

        assert_eq!(report.title.as_deref(), Some("First-u1"));
        assert!(report.ads_visible);
        assert!(report.revealed);
        assert!(report.related_height.unwrap() > 0.0);
        assert!(report.mid_slot_mounted);
        assert_eq!(report.scripts_trigger.as_deref(), Some("qctaboo-mid"));
        assert!(report.rewarded_queued);
        assert_eq!(report.events.iter().filter(|e| e.event == "revealed").count(), 1);
        // auto + mid placement + end placement + flush
        assert_eq!(report.queues["_taboola"].as_array().unwrap().len(), 4);
        assert_eq!(report.queues["googletag.cmd"].as_array().unwrap().len(), 4);
    }

    #[test]
    fn test_not_found_report() {
        let page = HeadlessPage::new(Viewport { width: 390.0, height: 844.0 });
        let report = SimulationReport::not_found(&page, &WindowQueues::new());
        assert!(report.not_found);
        assert_eq!(report.queues, serde_json::json!({}));
    }
}
