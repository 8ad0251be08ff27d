//! Shared reveal state: has the second article been revealed yet?
//!
//! A [`RevealProvider`] owns the flag for one page lifetime. Consumers hold a
//! [`RevealState`] handle obtained from the provider. Handles only reach the
//! flag through a weak reference, so a handle that outlives its page fails
//! with [`RevealScopeError::ProviderDropped`] instead of reading stale state.
//!
//! The flag is monotonic: once `true` it stays `true` until a new provider
//! is created for the next page.

use crate::error::RevealScopeError;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};
use tracing::{debug, info};

type Listener = Rc<dyn Fn(bool)>;

#[derive(Default)]
struct Inner {
    ads_moved: Cell<bool>,
    listeners: RefCell<Vec<(u64, Listener)>>,
    next_listener: Cell<u64>,
}

/// Owner of the reveal flag for one page render.
#[derive(Default)]
pub struct RevealProvider {
    inner: Rc<Inner>,
}

impl RevealProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hand out a consumer handle scoped to this provider.
    pub fn state(&self) -> RevealState {
        RevealState { inner: Rc::downgrade(&self.inner) }
    }
}

impl fmt::Debug for RevealProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RevealProvider")
            .field("ads_moved", &self.inner.ads_moved.get())
            .field("listeners", &self.inner.listeners.borrow().len())
            .finish()
    }
}

/// Resolve a consumer handle from an optional provider scope.
///
/// Fails fast when there is no provider rather than defaulting to `false`.
pub fn use_reveal_state(scope: Option<&RevealProvider>) -> Result<RevealState, RevealScopeError> {
    scope
        .map(RevealProvider::state)
        .ok_or(RevealScopeError::OutsideProvider)
}

/// Consumer handle onto a provider's reveal flag.
#[derive(Clone)]
pub struct RevealState {
    inner: Weak<Inner>,
}

impl RevealState {
    fn upgrade(&self) -> Result<Rc<Inner>, RevealScopeError> {
        self.inner.upgrade().ok_or(RevealScopeError::ProviderDropped)
    }

    pub fn ads_moved(&self) -> Result<bool, RevealScopeError> {
        Ok(self.upgrade()?.ads_moved.get())
    }

    /// Set the flag. Returns `true` only for the call that performed the
    /// `false -> true` transition; listeners are notified exactly then.
    ///
    /// Setting `false` after the flag is `true` is ignored.
    pub fn set_ads_moved(&self, moved: bool) -> Result<bool, RevealScopeError> {
        let inner = self.upgrade()?;
        if !moved {
            if inner.ads_moved.get() {
                debug!("Ignoring attempt to clear adsMoved; state is monotonic");
            }
            return Ok(false);
        }
        if inner.ads_moved.replace(true) {
            return Ok(false);
        }

        // Snapshot so listeners may subscribe or drop subscriptions re-entrantly.
        let listeners: Vec<Listener> = inner
            .listeners
            .borrow()
            .iter()
            .map(|(_, l)| Rc::clone(l))
            .collect();
        info!(listeners = listeners.len(), "adsMoved set; notifying listeners");
        for listener in listeners {
            listener(true);
        }
        Ok(true)
    }

    /// Register a listener for the reveal transition. The listener is removed
    /// when the returned [`Subscription`] is dropped.
    pub fn subscribe(
        &self,
        listener: impl Fn(bool) + 'static,
    ) -> Result<Subscription, RevealScopeError> {
        let inner = self.upgrade()?;
        let id = inner.next_listener.get();
        inner.next_listener.set(id + 1);
        inner.listeners.borrow_mut().push((id, Rc::new(listener)));
        Ok(Subscription { inner: Rc::downgrade(&inner), id })
    }
}

impl fmt::Debug for RevealState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RevealState")
            .field("ads_moved", &self.ads_moved().ok())
            .finish()
    }
}

/// Live listener registration; unsubscribes on drop.
#[derive(Debug)]
pub struct Subscription {
    inner: Weak<Inner>,
    id: u64,
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(inner) = self.inner.upgrade() {
            inner.listeners.borrow_mut().retain(|(id, _)| *id != self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_starts_false() {
        let provider = RevealProvider::new();
        assert_eq!(provider.state().ads_moved(), Ok(false));
    }

    #[test]
    fn test_outside_provider_fails_fast() {
        let err = use_reveal_state(None).unwrap_err();
        assert_eq!(err, RevealScopeError::OutsideProvider);
    }

    #[test]
    fn test_dropped_provider_fails() {
        let provider = RevealProvider::new();
        let state = use_reveal_state(Some(&provider)).unwrap();
        drop(provider);
        assert_eq!(state.ads_moved(), Err(RevealScopeError::ProviderDropped));
        assert_eq!(state.set_ads_moved(true), Err(RevealScopeError::ProviderDropped));
    }

    #[test]
    fn test_monotonic_single_transition() {
        let provider = RevealProvider::new();
        let a = provider.state();
        let b = provider.state();

        assert_eq!(a.set_ads_moved(true), Ok(true));
        assert_eq!(b.set_ads_moved(true), Ok(false));
        assert_eq!(b.set_ads_moved(false), Ok(false));
        assert_eq!(a.ads_moved(), Ok(true));
    }

    #[test]
    fn test_listeners_notified_once() {
        let provider = RevealProvider::new();
        let state = provider.state();
        let calls = Rc::new(Cell::new(0));
        let seen = Rc::clone(&calls);
        let _sub = state.subscribe(move |moved| {
            assert!(moved);
            seen.set(seen.get() + 1);
        })
        .unwrap();

        state.set_ads_moved(true).unwrap();
        state.set_ads_moved(true).unwrap();
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn test_dropped_subscription_is_not_called() {
        let provider = RevealProvider::new();
        let state = provider.state();
        let calls = Rc::new(Cell::new(0));
        let seen = Rc::clone(&calls);
        let sub = state.subscribe(move |_| seen.set(seen.get() + 1)).unwrap();
        drop(sub);

        state.set_ads_moved(true).unwrap();
        assert_eq!(calls.get(), 0);
    }

    #[test]
    fn test_fresh_provider_per_page() {
        let first = RevealProvider::new();
        first.state().set_ads_moved(true).unwrap();
        let second = RevealProvider::new();
        assert_eq!(second.state().ads_moved(), Ok(false));
    }
}
