//! Viewport-driven reveal of the second article.
//!
//! The pieces, in the order a page uses them:
//!
//! - [`state`]: the page-lifetime `adsMoved` flag and its subscribers
//! - [`sentinel`]: "ads visible" once the end-of-article marker nears the viewport
//! - [`trigger`]: sets `adsMoved` once the ad block has scrolled up far enough
//! - [`resolver`]: waits for server-rendered containers and mounts ads into them
//! - [`iframes`]: sizes embeds after every visibility change
//! - [`controller`]: wires all of the above to one rendered page

pub mod controller;
pub mod iframes;
pub mod resolver;
pub mod sentinel;
pub mod state;
pub mod trigger;

pub use controller::{RevealController, ScrollOutcome};
pub use resolver::{AdMountResolver, AwaitStrategy, Teardown, TeardownSignal, await_element, poll_until};
pub use sentinel::{RootMargin, SentinelObserver};
pub use state::{RevealProvider, RevealState, Subscription, use_reveal_state};
pub use trigger::ScrollTrigger;
