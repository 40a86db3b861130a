use crate::accounting;
use crate::endpoint::{Endpoint, Passed};
use crate::error::CollectError;
use crate::state::{MAX_COLLECTION_PASSES, OverflowPolicy, SharedState};
use crate::sync::{Arc, AtomicBool, MutexGuard, Ordering};
use crate::walker::{self, WalkError};
use std::any::Any;
use std::boxed::Box;
use std::vec::Vec;

/// Outcome of `GcDomain::collect()`.
///
/// `GcDomain::collect()` 的结果。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Collection {
    /// Another pass was already running; this call did nothing.
    /// 已有回收正在进行；本次调用未做任何事。
    Skipped,
    /// A full pass ran to completion.
    /// 完整执行了一轮回收。
    Completed(CollectStats),
}

impl Collection {
    /// Statistics of the pass, if one ran.
    #[inline]
    pub fn stats(&self) -> Option<&CollectStats> {
        match self {
            Collection::Skipped => None,
            Collection::Completed(stats) => Some(stats),
        }
    }

    /// Number of endpoints destroyed, zero when skipped.
    #[inline]
    pub fn destroyed(&self) -> usize {
        self.stats().map_or(0, |stats| stats.destroyed)
    }
}

/// Statistics from one `collect()` invocation.
///
/// `roots`, `marked` and `peak_stack_depth` describe the last root-and-mark
/// pass; `destroyed` and `vetoed` accumulate over every pass of the invocation.
///
/// 单次 `collect()` 调用的统计信息。
/// `roots`、`marked` 和 `peak_stack_depth` 描述最后一轮根选择与标记；
/// `destroyed` 和 `vetoed` 累计本次调用中的所有轮次。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CollectStats {
    /// Endpoints scanned in the registry.
    pub endpoints: usize,
    /// Externally referenced endpoints.
    pub roots: usize,
    /// Endpoints reachable from the roots, roots included.
    pub marked: usize,
    /// Endpoints destroyed, including those freed by the purge cascade.
    pub destroyed: usize,
    /// Destroys refused by the liveness re-check.
    pub vetoed: usize,
    /// Root-and-mark passes run.
    pub passes: usize,
    /// Peak occupancy of the walker's explicit stack.
    pub peak_stack_depth: usize,
}

/// Work produced by the destroy path that must complete after the
/// collection lock is released: the teardown hook and dropping whatever
/// non-endpoint objects the purged queues carried.
///
/// 销毁路径产生的、必须在释放回收锁之后完成的工作：
/// 调用拆除回调，以及释放被清空队列中携带的非端点对象。
#[must_use]
pub(crate) struct Teardown {
    destroyed: Vec<Arc<Endpoint>>,
    vetoed: usize,
    residue: Vec<Box<dyn Any + Send>>,
}

impl Teardown {
    pub(crate) fn new() -> Self {
        Self {
            destroyed: Vec::new(),
            vetoed: 0,
            residue: Vec::new(),
        }
    }

    #[inline]
    pub(crate) fn destroyed(&self) -> usize {
        self.destroyed.len()
    }

    #[inline]
    pub(crate) fn vetoed(&self) -> usize {
        self.vetoed
    }

    pub(crate) fn finish(self, shared: &SharedState) {
        for endpoint in &self.destroyed {
            tracing::trace!(endpoint = %endpoint.id(), "endpoint_destroyed");
            if let Some(hook) = &shared.config.on_destroy {
                hook(endpoint.id());
            }
        }
        drop(self.residue);
        drop(self.destroyed);
    }
}

/// The single teardown entry point.
///
/// Each candidate is re-checked for liveness first: an endpoint that is
/// externally referenced at this moment is left alone and counted as vetoed.
/// Otherwise it is flagged destroyed, removed from the registry and its
/// pending queue is purged. Every endpoint handle found in the purged queue
/// stops being in flight and is closed; closes that bring a count to zero are
/// destroyed through the same worklist rather than by recursion.
///
/// Used both by the close path (count reached zero) and by the sweep.
///
/// 唯一的拆除入口。
///
/// 每个候选端点首先重新检查存活性：此刻被外部引用的端点不会被处理，并计为否决。
/// 否则将其标记为已销毁、从注册表移除，并清空其待处理队列。
/// 被清空队列中的每个端点句柄都不再处于在途状态并被关闭；
/// 计数降为零的端点通过同一工作列表销毁，而非递归。
///
/// 关闭路径（计数归零）和清扫阶段都使用此入口。
pub(crate) fn destroy_locked(
    shared: &SharedState,
    _gc: &MutexGuard<'_, ()>,
    candidates: impl IntoIterator<Item = Arc<Endpoint>>,
) -> Teardown {
    let mut teardown = Teardown::new();
    destroy_into(shared, candidates, &mut teardown);
    teardown
}

fn destroy_into(
    shared: &SharedState,
    candidates: impl IntoIterator<Item = Arc<Endpoint>>,
    teardown: &mut Teardown,
) {
    let mut work: Vec<Arc<Endpoint>> = candidates.into_iter().collect();
    work.reverse();

    while let Some(endpoint) = work.pop() {
        if endpoint.is_destroyed() {
            continue;
        }
        if accounting::is_externally_referenced(&endpoint) {
            tracing::debug!(
                endpoint = %endpoint.id(),
                open = endpoint.open_count(),
                inflight = endpoint.inflight_count(),
                "destroy_vetoed"
            );
            teardown.vetoed += 1;
            continue;
        }
        if !endpoint.set_destroyed() {
            continue;
        }
        shared.registry.remove(endpoint.id());

        for message in endpoint.take_queue() {
            let (_payload, passed) = message.into_parts();
            for passed in passed {
                match passed {
                    Passed::Endpoint(handle) => {
                        let inner = handle.into_endpoint();
                        accounting::note_consumed(shared, &inner);
                        if inner.release() {
                            work.push(inner);
                        }
                    }
                    Passed::Other(object) => teardown.residue.push(object),
                }
            }
        }
        teardown.destroyed.push(endpoint);
    }
}

/// Resets the reentrancy flag when the invocation ends, panics included.
struct RunningFlag<'a>(&'a AtomicBool);

impl Drop for RunningFlag<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Runs a collection unless one is already in progress.
///
/// Root selection, mark, sweep and unmark run under the domain's collection
/// lock. If the sweep had a destroy vetoed, root selection and mark are run
/// again on the current topology, up to `MAX_COLLECTION_PASSES` times.
/// Teardown hooks run after the lock is released but before the reentrancy
/// flag is cleared.
///
/// 除非已有回收正在进行，否则执行一次回收。
///
/// 根选择、标记、清扫和清除标记都在域回收锁下执行。
/// 若清扫中有销毁被否决，则基于当前拓扑重新执行根选择与标记，
/// 至多 `MAX_COLLECTION_PASSES` 次。
/// 拆除回调在释放锁之后、清除重入标志之前执行。
pub(crate) fn collect(shared: &SharedState) -> Result<Collection, CollectError> {
    if shared
        .collecting
        .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
        .is_err()
    {
        tracing::trace!("collection already running, skipped");
        return Ok(Collection::Skipped);
    }
    let _running = RunningFlag(&shared.collecting);

    let gc_id = shared.next_gc_id.fetch_add(1, Ordering::Relaxed);
    let _span = tracing::debug_span!("ipc_gc_collect", gc_id).entered();

    let mut stats = CollectStats::default();
    let mut teardown = Teardown::new();
    let result = {
        let gc = shared.gc_lock.lock();
        run_passes(shared, &gc, &mut stats, &mut teardown)
    };
    stats.destroyed = teardown.destroyed();
    stats.vetoed = teardown.vetoed();
    teardown.finish(shared);

    result.map(|()| {
        tracing::debug!(
            destroyed = stats.destroyed,
            vetoed = stats.vetoed,
            passes = stats.passes,
            "collection_complete"
        );
        Collection::Completed(stats)
    })
}

fn run_passes(
    shared: &SharedState,
    _gc: &MutexGuard<'_, ()>,
    stats: &mut CollectStats,
    teardown: &mut Teardown,
) -> Result<(), CollectError> {
    loop {
        stats.passes += 1;

        let endpoints = shared.registry.snapshot();
        let roots: Vec<Arc<Endpoint>> = endpoints
            .iter()
            .filter(|endpoint| accounting::is_externally_referenced(endpoint))
            .cloned()
            .collect();
        stats.endpoints = endpoints.len();
        stats.roots = roots.len();
        tracing::debug!(endpoints = endpoints.len(), roots = roots.len(), "roots_selected");

        let marked = match walker::mark_reachable(&roots, shared.config.max_stack_depth) {
            Ok(marked) => marked,
            Err(err) => {
                unmark_all(&endpoints);
                unmark_all(&err.marked);
                return Err(stack_exhausted(shared, err, roots.len(), endpoints.len()));
            }
        };
        stats.marked = marked.endpoints.len();
        stats.peak_stack_depth = stats.peak_stack_depth.max(marked.peak_depth);
        tracing::debug!(
            marked = marked.endpoints.len(),
            peak_depth = marked.peak_depth,
            "mark_end"
        );

        #[cfg(all(test, not(feature = "loom")))]
        if let Some(hook) = &*shared.before_sweep.lock() {
            hook(&endpoints);
        }

        let hit_list: Vec<Arc<Endpoint>> = endpoints
            .iter()
            .filter(|endpoint| !endpoint.is_marked())
            .cloned()
            .collect();
        let vetoed_before = teardown.vetoed();
        let destroyed_before = teardown.destroyed();
        destroy_into(shared, hit_list, teardown);
        unmark_all(&endpoints);

        let vetoed = teardown.vetoed() - vetoed_before;
        tracing::debug!(
            destroyed = teardown.destroyed() - destroyed_before,
            vetoed,
            "sweep_end"
        );

        if vetoed == 0 {
            return Ok(());
        }
        if stats.passes >= MAX_COLLECTION_PASSES {
            tracing::warn!(
                vetoed,
                passes = stats.passes,
                "destroys still vetoed after maximum passes"
            );
            return Ok(());
        }
        tracing::debug!(vetoed, "endpoints resurrected, re-running root selection");
    }
}

fn unmark_all(endpoints: &[Arc<Endpoint>]) {
    for endpoint in endpoints {
        endpoint.unmark();
    }
}

fn stack_exhausted(
    shared: &SharedState,
    err: WalkError,
    roots: usize,
    endpoints: usize,
) -> CollectError {
    let marked = err.marked.len();
    tracing::error!(
        roots,
        endpoints,
        capacity = err.capacity,
        marked,
        "walker stack exhausted, endpoint graph too deep"
    );
    match shared.config.overflow_policy {
        OverflowPolicy::Abort => panic!(
            "ipc-gc: walker stack exhausted (capacity {}, {} roots, {} endpoints)",
            err.capacity, roots, endpoints
        ),
        OverflowPolicy::Degrade => CollectError::GraphTooDeep {
            roots,
            endpoints,
            capacity: err.capacity,
            marked,
        },
    }
}
