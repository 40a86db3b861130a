use crate::collector::{self, Collection};
use crate::endpoint::{Endpoint, EndpointHandle, EndpointId};
use crate::error::CollectError;
use crate::state::{
    Config, DEFAULT_AUTO_COLLECT_THRESHOLD, DEFAULT_MAX_STACK_DEPTH, DestroyHook, OverflowPolicy,
    SharedState,
};
use crate::sync::{Arc, Ordering};
use std::boxed::Box;
use std::fmt;

/// Builder for configuring a `GcDomain`.
///
/// Use this builder to customize collection behavior:
/// - `max_stack_depth`: ceiling of the mark phase's explicit stack
/// - `overflow_policy`: what happens when that ceiling is hit
/// - `auto_collect_threshold`: in-flight total that makes a send trigger a collection
/// - `collect_on_close`: run a collection whenever a handle is closed while references are in flight
/// - `on_destroy`: hook invoked for every destroyed endpoint
///
/// # Example
/// ```
/// use ipc_cycle_gc::{GcDomain, OverflowPolicy};
///
/// let domain = GcDomain::builder()
///     .max_stack_depth(1024)
///     .overflow_policy(OverflowPolicy::Degrade)
///     .auto_collect_threshold(None)
///     .build();
/// ```
///
/// 用于配置 `GcDomain` 的构建器。
pub struct GcDomainBuilder {
    max_stack_depth: usize,
    overflow_policy: OverflowPolicy,
    auto_collect_threshold: Option<usize>,
    collect_on_close: bool,
    on_destroy: Option<DestroyHook>,
}

impl GcDomainBuilder {
    /// Create a new builder with default settings.
    /// 创建一个带有默认设置的新构建器。
    #[inline]
    pub fn new() -> Self {
        Self {
            max_stack_depth: DEFAULT_MAX_STACK_DEPTH,
            overflow_policy: OverflowPolicy::default(),
            auto_collect_threshold: Some(DEFAULT_AUTO_COLLECT_THRESHOLD),
            collect_on_close: false,
            on_destroy: None,
        }
    }

    /// Set the ceiling of the mark phase's explicit stack, in endpoints.
    ///
    /// Only fan-out consumes stack slots; a chain of any length needs none.
    ///
    /// Default: `512`
    ///
    /// 设置标记阶段显式栈的上限（以端点数计）。
    /// 只有分叉会占用栈槽位，任意长度的链都不需要。
    #[inline]
    pub fn max_stack_depth(mut self, depth: usize) -> Self {
        self.max_stack_depth = depth;
        self
    }

    /// Set the behavior when the stack ceiling is hit.
    ///
    /// Default: `OverflowPolicy::Degrade`
    ///
    /// 设置达到栈上限时的行为。
    #[inline]
    pub fn overflow_policy(mut self, policy: OverflowPolicy) -> Self {
        self.overflow_policy = policy;
        self
    }

    /// Set the automatic collection threshold.
    ///
    /// When a send leaves more than this many references in flight across the
    /// domain, `collect()` is called before the send returns.
    /// Pass `None` to disable automatic collection on send.
    ///
    /// Default: `Some(16000)`
    ///
    /// 设置自动回收阈值。
    /// 当一次发送后整个域的在途引用数超过此值时，在发送返回前调用 `collect()`。
    /// 传递 `None` 可禁用发送时的自动回收。
    #[inline]
    pub fn auto_collect_threshold(mut self, threshold: impl Into<Option<usize>>) -> Self {
        self.auto_collect_threshold = threshold.into();
        self
    }

    /// Run a collection from the close path of any handle while references
    /// are in flight.
    ///
    /// Default: `false`
    ///
    /// 在有在途引用时，于任一句柄的关闭路径上执行回收。
    #[inline]
    pub fn collect_on_close(mut self, enabled: bool) -> Self {
        self.collect_on_close = enabled;
        self
    }

    /// Install a hook called once for every destroyed endpoint.
    ///
    /// The hook runs after the collection lock is released. It may call
    /// `collect()`; during a collection that call returns `Collection::Skipped`.
    ///
    /// 安装一个回调，每个被销毁的端点调用一次。
    /// 回调在释放回收锁之后执行。回调中可以调用 `collect()`；
    /// 若处于回收过程中，该调用返回 `Collection::Skipped`。
    #[inline]
    pub fn on_destroy(mut self, hook: impl Fn(EndpointId) + Send + Sync + 'static) -> Self {
        self.on_destroy = Some(Box::new(hook));
        self
    }

    /// Build the `GcDomain` with the configured settings.
    /// 使用配置的设置构建 `GcDomain`。
    #[inline]
    pub fn build(self) -> GcDomain {
        let config = Config {
            max_stack_depth: self.max_stack_depth,
            overflow_policy: self.overflow_policy,
            auto_collect_threshold: self.auto_collect_threshold,
            collect_on_close: self.collect_on_close,
            on_destroy: self.on_destroy,
        };
        GcDomain::from_shared(Arc::new(SharedState::new(config)))
    }
}

impl Default for GcDomainBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A collector domain: one endpoint registry, one collection lock.
///
/// `GcDomain` is the entry point of the crate. It creates endpoints and runs
/// collection passes.
///
/// `GcDomain` is `Clone` and can be safely shared across threads. Dropping the
/// last `GcDomain` (clones and those returned by `EndpointHandle::domain`)
/// runs one final collection. Endpoints and the domain keep each other alive,
/// so a cycle formed after that point, with no `GcDomain` left to collect it
/// and no automatic trigger configured, is never reclaimed.
///
/// **Typical Usage**:
/// ```
/// use ipc_cycle_gc::{GcDomain, Message};
///
/// let domain = GcDomain::new();
/// let a = domain.create_endpoint();
/// let b = domain.create_endpoint();
///
/// // a and b each carry the other in their queue, then both are closed
/// a.send(Message::new("b").with_endpoint(&b)).unwrap();
/// b.send(Message::new("a").with_endpoint(&a)).unwrap();
/// drop(a);
/// drop(b);
/// assert_eq!(domain.endpoint_count(), 2);
///
/// let collection = domain.collect().unwrap();
/// assert_eq!(collection.destroyed(), 2);
/// assert_eq!(domain.endpoint_count(), 0);
/// ```
///
/// 一个回收域：一个端点注册表，一把回收锁。
/// `GcDomain` 是本 crate 的入口。它创建端点并执行回收。
/// `GcDomain` 是 `Clone` 的，可以安全地在线程间共享。
/// 最后一个 `GcDomain` 被 drop 时会执行一次最终回收。
pub struct GcDomain {
    shared: Arc<SharedState>,
}

impl GcDomain {
    /// Create a new domain with default settings.
    /// 使用默认设置创建一个新域。
    #[inline]
    pub fn new() -> Self {
        Self::builder().build()
    }

    /// Create a builder for configuring the domain.
    /// 创建一个用于配置域的构建器。
    #[inline]
    pub fn builder() -> GcDomainBuilder {
        GcDomainBuilder::new()
    }

    pub(crate) fn from_shared(shared: Arc<SharedState>) -> Self {
        shared.domains.fetch_add(1, Ordering::Relaxed);
        Self { shared }
    }

    #[cfg(all(test, not(feature = "loom")))]
    pub(crate) fn shared(&self) -> &Arc<SharedState> {
        &self.shared
    }

    /// Create and register a new endpoint, returning its first handle.
    /// 创建并注册一个新端点，返回其第一个句柄。
    pub fn create_endpoint(&self) -> EndpointHandle {
        let id = EndpointId::new(self.shared.next_endpoint_id.fetch_add(1, Ordering::Relaxed));
        let endpoint = Arc::new(Endpoint::new(id, Arc::clone(&self.shared)));
        self.shared.registry.insert(Arc::clone(&endpoint));
        tracing::trace!(endpoint = %id, "endpoint_created");
        EndpointHandle::from_new(endpoint)
    }

    /// Run a collection pass.
    ///
    /// Returns `Collection::Skipped` immediately if a pass is already running.
    /// Otherwise returns once root selection, mark, sweep and unmark are done.
    ///
    /// # Errors
    /// `CollectError::GraphTooDeep` if the mark phase exhausted its stack under
    /// `OverflowPolicy::Degrade`. Nothing was destroyed in that case.
    ///
    /// # Panics
    /// Under `OverflowPolicy::Abort`, when the mark phase exhausts its stack.
    ///
    /// 执行一轮回收。
    /// 若已有回收正在进行，立即返回 `Collection::Skipped`。
    /// 否则在根选择、标记、清扫与清除标记完成后返回。
    pub fn collect(&self) -> Result<Collection, CollectError> {
        collector::collect(&self.shared)
    }

    /// Whether a collection pass is running right now.
    #[inline]
    pub fn is_collecting(&self) -> bool {
        self.shared.collecting.load(Ordering::Acquire)
    }

    /// Number of registered, not yet destroyed endpoints.
    #[inline]
    pub fn endpoint_count(&self) -> usize {
        self.shared.registry.len()
    }

    /// Total number of endpoint handles currently in flight across the domain.
    #[inline]
    pub fn total_inflight(&self) -> usize {
        self.shared.total_inflight.load(Ordering::Acquire)
    }
}


impl Clone for GcDomain {
    fn clone(&self) -> Self {
        Self::from_shared(Arc::clone(&self.shared))
    }
}

impl Drop for GcDomain {
    fn drop(&mut self) {
        if self.shared.domains.fetch_sub(1, Ordering::AcqRel) == 1 {
            tracing::trace!("last domain reference dropped, final collection");
            let _ = collector::collect(&self.shared);
        }
    }
}

impl Default for GcDomain {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for GcDomain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GcDomain")
            .field("endpoints", &self.endpoint_count())
            .field("total_inflight", &self.total_inflight())
            .field("collecting", &self.is_collecting())
            .finish()
    }
}
