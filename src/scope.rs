//! Ambient access to the request currently being served.
//!
//! The slot is indexed per thread, the logical concurrency unit of the
//! synchronous dispatcher, so concurrent requests never observe each
//! other's scope. Teardown is tied to a guard's `Drop`, which runs even
//! when dispatch unwinds.

use crate::http::Request;

use std::cell::RefCell;
use std::marker::PhantomData;

thread_local! {
    static CURRENT: RefCell<Option<Request>> = const { RefCell::new(None) };
}

/// Clears the scope slot when dropped.
///
/// Deliberately `!Send`: the scope must be torn down on the thread that
/// entered it.
pub struct ScopeGuard {
    _not_send: PhantomData<*const ()>,
}

/// Enter a request scope for the duration of the returned guard.
pub fn enter(req: Request) -> ScopeGuard {
    CURRENT.with(|slot| *slot.borrow_mut() = Some(req));
    ScopeGuard {
        _not_send: PhantomData,
    }
}

/// Replace the request seen by ambient lookups within the current scope,
/// used after parameter binding so `current()` reflects the bound request.
pub fn update(req: Request) {
    CURRENT.with(|slot| {
        let mut slot = slot.borrow_mut();
        if slot.is_some() {
            *slot = Some(req);
        }
    });
}

/// The request currently being served on this thread, if any.
pub fn current() -> Option<Request> {
    CURRENT.with(|slot| slot.borrow().clone())
}

impl Drop for ScopeGuard {
    fn drop(&mut self) {
        CURRENT.with(|slot| *slot.borrow_mut() = None);
    }
}
