//! Reference accounting for in-flight endpoint handles.
//!
//! The transport calls `note_embedded` when a handle to an endpoint is
//! enqueued inside a message and `note_consumed` when it leaves the queue
//! (received or discarded). Both run under the domain's collection lock.
//! `open_count` has already been raised by the duplicate path before a handle
//! is embedded, so only `inflight_count` moves here.
//!
//! 在途端点句柄的引用计数。
//! 传输层在端点句柄随消息入队时调用 `note_embedded`，
//! 在其离开队列（被接收或丢弃）时调用 `note_consumed`。二者都在域回收锁下执行。

use crate::endpoint::Endpoint;
use crate::state::SharedState;
use crate::sync::Ordering;

#[inline]
pub(crate) fn note_embedded(shared: &SharedState, endpoint: &Endpoint) {
    endpoint.inflight_count.fetch_add(1, Ordering::AcqRel);
    shared.total_inflight.fetch_add(1, Ordering::AcqRel);
}

#[inline]
pub(crate) fn note_consumed(shared: &SharedState, endpoint: &Endpoint) {
    let previous = endpoint.inflight_count.fetch_sub(1, Ordering::AcqRel);
    debug_assert!(
        previous > 0,
        "BUG: {} consumed more in-flight references than were embedded",
        endpoint.id()
    );
    shared.total_inflight.fetch_sub(1, Ordering::AcqRel);
}

/// An endpoint is externally referenced iff some handle to it is not in flight.
/// 当且仅当存在不处于在途状态的句柄时，端点才被外部引用。
#[inline]
pub(crate) fn is_externally_referenced(endpoint: &Endpoint) -> bool {
    let inflight = endpoint.inflight_count();
    endpoint.open_count() > inflight
}
