//! Ad vendor integration.
//!
//! Vendors are driven by pushing entries onto well-known global queues
//! (`window._taboola`, `window._mgq`, `unibotshb.cmd`, `unibots.cmd`,
//! `googletag.cmd`). The [`AdQueue`] trait is that capability; the entry shapes
//! are the vendors' de-facto wire protocol and are reproduced exactly.
//!
//! # Submodules
//!
//! - [`widgets`]: render and tear down Taboola / MGID / FEJI placements
//! - [`scripts`]: vendor script loading once ad containers show up
//! - [`rewarded`]: Google Ad Manager rewarded slot with a frequency cap

pub mod rewarded;
pub mod scripts;
pub mod widgets;

use serde::Serialize;
use serde_json::{Value, json};
use std::cell::RefCell;
use std::collections::BTreeMap;

/// Entry pushed onto `window._taboola`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum TaboolaEntry {
    /// `{mode, container, placement, target_type}`
    Placement {
        mode: String,
        container: String,
        placement: String,
        target_type: String,
    },
    /// `{flush: true}`
    Flush { flush: bool },
    /// `{article: "auto"}`, pushed once by the loader.
    PageType { article: String },
}

impl TaboolaEntry {
    pub fn placement(mode: &str, container: &str, placement: &str) -> Self {
        TaboolaEntry::Placement {
            mode: mode.to_string(),
            container: container.to_string(),
            placement: placement.to_string(),
            target_type: "mix".to_string(),
        }
    }

    pub fn flush() -> Self {
        TaboolaEntry::Flush { flush: true }
    }

    pub fn auto_article() -> Self {
        TaboolaEntry::PageType { article: "auto".to_string() }
    }
}

/// Command queued on `googletag.cmd`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "call", rename_all = "camelCase")]
pub enum GoogleTagCommand {
    DefineOutOfPageSlot { ad_unit_path: String, format: String, force_safe_frame: bool },
    EnableAsyncRendering,
    EnableServices,
    Display { ad_unit_path: String },
}

/// Everything the controller can push to a vendor, in push order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "queue", rename_all = "snake_case")]
pub enum VendorCommand {
    Taboola { entry: TaboolaEntry },
    MgidLoad,
    FejiBanner { zone: String },
    FejiPlayer { player_id: String },
    GoogleTag { command: GoogleTagCommand },
}

/// Capability to push onto the vendor queues.
///
/// Pushes take `&self`: like the browser globals, a queue is shared by every
/// placement on the page.
pub trait AdQueue {
    fn push_taboola_config(&self, entry: TaboolaEntry);

    /// `["_mgc.load"]` onto `_mgq`.
    fn push_mgid_load(&self);

    fn push_google_tag_command(&self, command: GoogleTagCommand);

    /// `ubHB(zone)` onto `unibotshb.cmd`.
    fn push_feji_banner(&self, zone: &str);

    /// `unibotsPlayer(id)` onto `unibots.cmd`.
    fn push_feji_player(&self, player_id: &str);
}

/// Queues laid out the way they appear on `window`: one JSON array per
/// global, created on first push (`window.x = window.x || []`).
#[derive(Debug, Default)]
pub struct WindowQueues {
    globals: RefCell<BTreeMap<&'static str, Vec<Value>>>,
}

impl WindowQueues {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&self, global: &'static str, value: Value) {
        self.globals.borrow_mut().entry(global).or_default().push(value);
    }

    /// Entries currently queued on `global` (e.g. `"_taboola"`).
    pub fn entries(&self, global: &str) -> Vec<Value> {
        self.globals.borrow().get(global).cloned().unwrap_or_default()
    }

    /// All globals as one JSON object.
    pub fn snapshot(&self) -> Value {
        let globals = self.globals.borrow();
        Value::Object(
            globals
                .iter()
                .map(|(k, v)| (k.to_string(), Value::Array(v.clone())))
                .collect(),
        )
    }
}

impl AdQueue for WindowQueues {
    fn push_taboola_config(&self, entry: TaboolaEntry) {
        self.push("_taboola", json!(entry));
    }

    fn push_mgid_load(&self) {
        self.push("_mgq", json!(["_mgc.load"]));
    }

    fn push_google_tag_command(&self, command: GoogleTagCommand) {
        self.push("googletag.cmd", json!(command));
    }

    fn push_feji_banner(&self, zone: &str) {
        self.push("unibotshb.cmd", json!({ "call": "ubHB", "args": [zone] }));
    }

    fn push_feji_player(&self, player_id: &str) {
        self.push("unibots.cmd", json!({ "call": "unibotsPlayer", "args": [player_id] }));
    }
}

/// In-memory recorder of every push, in order.
#[derive(Debug, Default)]
pub struct RecordingAdQueue {
    commands: RefCell<Vec<VendorCommand>>,
}

impl RecordingAdQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn commands(&self) -> Vec<VendorCommand> {
        self.commands.borrow().clone()
    }

    pub fn taboola_entries(&self) -> Vec<TaboolaEntry> {
        self.commands
            .borrow()
            .iter()
            .filter_map(|c| match c {
                VendorCommand::Taboola { entry } => Some(entry.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn mgid_loads(&self) -> usize {
        self.commands
            .borrow()
            .iter()
            .filter(|c| matches!(c, VendorCommand::MgidLoad))
            .count()
    }
}

impl AdQueue for RecordingAdQueue {
    fn push_taboola_config(&self, entry: TaboolaEntry) {
        self.commands.borrow_mut().push(VendorCommand::Taboola { entry });
    }

    fn push_mgid_load(&self) {
        self.commands.borrow_mut().push(VendorCommand::MgidLoad);
    }

    fn push_google_tag_command(&self, command: GoogleTagCommand) {
        self.commands.borrow_mut().push(VendorCommand::GoogleTag { command });
    }

    fn push_feji_banner(&self, zone: &str) {
        self.commands
            .borrow_mut()
            .push(VendorCommand::FejiBanner { zone: zone.to_string() });
    }

    fn push_feji_player(&self, player_id: &str) {
        self.commands
            .borrow_mut()
            .push(VendorCommand::FejiPlayer { player_id: player_id.to_string() });
    }
}
