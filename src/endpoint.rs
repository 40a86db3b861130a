use crate::accounting;
use crate::collector;
use crate::domain::GcDomain;
use crate::error::SendError;
use crate::state::SharedState;
use crate::sync::{Arc, AtomicBool, AtomicUsize, Mutex, Ordering};
use std::any::Any;
use std::boxed::Box;
use std::collections::VecDeque;
use std::fmt;
use std::mem::ManuallyDrop;
use std::vec::Vec;

/// Stable identity of an endpoint, unique within its domain.
/// 端点的稳定标识，在其所属域内唯一。
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EndpointId(u64);

impl EndpointId {
    pub(crate) fn new(raw: u64) -> Self {
        Self(raw)
    }

    #[inline]
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for EndpointId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ep#{}", self.0)
    }
}

/// A local IPC endpoint as the collector sees it.
///
/// `open_count` counts every live handle, including handles embedded in
/// pending messages; `inflight_count` counts only the embedded ones.
/// `marked` is meaningful only while a collection pass holds the domain lock.
///
/// 回收器视角下的本地 IPC 端点。
/// `open_count` 统计所有存活句柄（包括嵌入待处理消息中的句柄）；
/// `inflight_count` 只统计嵌入的句柄。
/// `marked` 仅在回收过程持有域锁期间有意义。
pub(crate) struct Endpoint {
    id: EndpointId,
    shared: Arc<SharedState>,
    pub(crate) open_count: AtomicUsize,
    pub(crate) inflight_count: AtomicUsize,
    marked: AtomicBool,
    destroyed: AtomicBool,
    queue: Mutex<VecDeque<Message>>,
}

impl Endpoint {
    pub(crate) fn new(id: EndpointId, shared: Arc<SharedState>) -> Self {
        Self {
            id,
            shared,
            open_count: AtomicUsize::new(1),
            inflight_count: AtomicUsize::new(0),
            marked: AtomicBool::new(false),
            destroyed: AtomicBool::new(false),
            queue: Mutex::new(VecDeque::new()),
        }
    }

    #[inline]
    pub(crate) fn id(&self) -> EndpointId {
        self.id
    }

    #[inline]
    pub(crate) fn shared(&self) -> &Arc<SharedState> {
        &self.shared
    }

    #[inline]
    pub(crate) fn open_count(&self) -> usize {
        self.open_count.load(Ordering::Acquire)
    }

    #[inline]
    pub(crate) fn inflight_count(&self) -> usize {
        self.inflight_count.load(Ordering::Acquire)
    }

    /// Marks the endpoint; returns `false` if it was already marked.
    #[inline]
    pub(crate) fn try_mark(&self) -> bool {
        !self.marked.swap(true, Ordering::Relaxed)
    }

    #[inline]
    pub(crate) fn is_marked(&self) -> bool {
        self.marked.load(Ordering::Relaxed)
    }

    #[inline]
    pub(crate) fn unmark(&self) {
        self.marked.store(false, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn is_destroyed(&self) -> bool {
        self.destroyed.load(Ordering::Acquire)
    }

    /// Flags the endpoint as destroyed; returns `false` if it already was.
    #[inline]
    pub(crate) fn set_destroyed(&self) -> bool {
        !self.destroyed.swap(true, Ordering::AcqRel)
    }

    /// Duplicate path: one more handle references this endpoint.
    #[inline]
    pub(crate) fn retain(&self) {
        self.open_count.fetch_add(1, Ordering::Relaxed);
    }

    /// Close path: one handle fewer. Returns `true` when the count reached zero.
    #[inline]
    pub(crate) fn release(&self) -> bool {
        let previous = self.open_count.fetch_sub(1, Ordering::AcqRel);
        debug_assert!(previous > 0, "BUG: {} closed more often than opened", self.id);
        previous == 1
    }

    #[inline]
    pub(crate) fn pending_len(&self) -> usize {
        self.queue.lock().len()
    }

    /// Visits every endpoint referenced by a passed handle in the pending
    /// queue, in queue order. Non-endpoint passed objects are skipped.
    ///
    /// 按队列顺序访问待处理队列中所有被传递句柄引用的端点。
    /// 非端点的传递对象会被跳过。
    pub(crate) fn try_for_each_pending_endpoint<E>(
        &self,
        mut f: impl FnMut(&Arc<Endpoint>) -> Result<(), E>,
    ) -> Result<(), E> {
        let queue = self.queue.lock();
        for message in queue.iter() {
            for handle in message.endpoints() {
                f(&handle.endpoint)?;
            }
        }
        Ok(())
    }

    pub(crate) fn push_message(&self, message: Message) {
        self.queue.lock().push_back(message);
    }

    pub(crate) fn pop_message(&self) -> Option<Message> {
        self.queue.lock().pop_front()
    }

    /// Empties the pending queue, handing every message to the caller.
    pub(crate) fn take_queue(&self) -> VecDeque<Message> {
        std::mem::take(&mut *self.queue.lock())
    }
}

/// An open handle to an endpoint.
///
/// Cloning a handle is the duplicate path (`open_count + 1`); dropping it is
/// the close path (`open_count - 1`). When the last handle goes away the
/// endpoint is destroyed and its pending messages are discarded, which in
/// turn closes every handle embedded in them.
///
/// A handle placed in a `Message` and sent is an *in-flight* reference: it
/// still counts towards `open_count`, but it alone does not keep the endpoint
/// alive across a collection.
///
/// 端点的一个打开句柄。
///
/// 克隆句柄即复制路径（`open_count + 1`）；drop 即关闭路径（`open_count - 1`）。
/// 最后一个句柄消失时端点被销毁，其待处理消息被丢弃，
/// 从而关闭嵌入其中的每一个句柄。
///
/// 放入 `Message` 并发送的句柄是*在途*引用：它仍计入 `open_count`，
/// 但仅凭它无法让端点在回收中存活。
pub struct EndpointHandle {
    endpoint: Arc<Endpoint>,
}

impl EndpointHandle {
    pub(crate) fn from_new(endpoint: Arc<Endpoint>) -> Self {
        Self { endpoint }
    }

    /// Converts the handle into its endpoint without running the close path.
    /// The caller takes over the handle's share of `open_count`.
    pub(crate) fn into_endpoint(self) -> Arc<Endpoint> {
        let this = ManuallyDrop::new(self);
        // SAFETY: `this` is never dropped, so the Arc is moved out exactly once.
        unsafe { std::ptr::read(&this.endpoint) }
    }

    #[cfg(all(test, not(feature = "loom")))]
    #[inline]
    pub(crate) fn endpoint(&self) -> &Arc<Endpoint> {
        &self.endpoint
    }

    #[inline]
    pub fn id(&self) -> EndpointId {
        self.endpoint.id()
    }

    /// Total number of live handles, including in-flight ones.
    /// 存活句柄总数，包括在途句柄。
    #[inline]
    pub fn open_count(&self) -> usize {
        self.endpoint.open_count()
    }

    /// Number of handles currently embedded in pending messages.
    /// 当前嵌入在待处理消息中的句柄数量。
    #[inline]
    pub fn inflight_count(&self) -> usize {
        self.endpoint.inflight_count()
    }

    /// Number of messages waiting in this endpoint's queue.
    #[inline]
    pub fn pending_len(&self) -> usize {
        self.endpoint.pending_len()
    }

    /// Whether both handles refer to the same endpoint.
    #[inline]
    pub fn same_endpoint(&self, other: &EndpointHandle) -> bool {
        Arc::ptr_eq(&self.endpoint, &other.endpoint)
    }

    /// The domain this endpoint belongs to.
    pub fn domain(&self) -> GcDomain {
        GcDomain::from_shared(Arc::clone(self.endpoint.shared()))
    }

    /// Enqueue a message on this endpoint.
    ///
    /// Every endpoint handle carried by the message becomes an in-flight
    /// reference. The send is serialized against collection passes. If the
    /// domain's in-flight total then exceeds the configured threshold, a
    /// collection is run before returning.
    ///
    /// Fails only if the endpoint has already been destroyed, which can only
    /// happen after an accounting misuse; the message is handed back.
    ///
    /// 向此端点的队列追加一条消息。
    ///
    /// 消息携带的每个端点句柄都成为在途引用。发送与回收过程串行化。
    /// 若此后域的在途总数超过配置阈值，则在返回前执行一次回收。
    ///
    /// 仅当端点已被销毁时失败（只可能源于计数误用），消息会被交还。
    pub fn send(&self, message: Message) -> Result<(), SendError> {
        let shared = self.endpoint.shared();
        {
            let _gc = shared.gc_lock.lock();
            if self.endpoint.is_destroyed() {
                return Err(SendError::new(message));
            }
            for handle in message.endpoints() {
                accounting::note_embedded(shared, &handle.endpoint);
            }
            self.endpoint.push_message(message);
        }

        if let Some(threshold) = shared.config.auto_collect_threshold {
            if shared.total_inflight.load(Ordering::Acquire) > threshold {
                let _ = collector::collect(shared);
            }
        }
        Ok(())
    }

    /// Dequeue the oldest pending message.
    ///
    /// The endpoint handles it carries stop being in flight and now belong
    /// to the caller.
    ///
    /// 取出最早的待处理消息。
    /// 其携带的端点句柄不再处于在途状态，归调用者所有。
    pub fn recv(&self) -> Option<Message> {
        let shared = self.endpoint.shared();
        let _gc = shared.gc_lock.lock();
        let message = self.endpoint.pop_message()?;
        for handle in message.endpoints() {
            accounting::note_consumed(shared, &handle.endpoint);
        }
        Some(message)
    }
}

impl Clone for EndpointHandle {
    fn clone(&self) -> Self {
        self.endpoint.retain();
        Self {
            endpoint: Arc::clone(&self.endpoint),
        }
    }
}

impl Drop for EndpointHandle {
    fn drop(&mut self) {
        close(&self.endpoint);
    }
}

impl fmt::Debug for EndpointHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EndpointHandle")
            .field("id", &self.endpoint.id())
            .field("open_count", &self.endpoint.open_count())
            .field("inflight_count", &self.endpoint.inflight_count())
            .finish()
    }
}

/// Close path shared by every handle drop.
fn close(endpoint: &Arc<Endpoint>) {
    let shared = endpoint.shared();
    if endpoint.release() {
        let teardown = {
            let guard = shared.gc_lock.lock();
            collector::destroy_locked(shared, &guard, [Arc::clone(endpoint)])
        };
        teardown.finish(shared);
    }

    if shared.config.collect_on_close && shared.total_inflight.load(Ordering::Acquire) > 0 {
        let _ = collector::collect(shared);
    }
}

/// A reference carried inside a message.
///
/// 消息中携带的引用。
pub enum Passed {
    /// A handle to another endpoint. The collector follows these.
    /// 指向另一个端点的句柄。回收器会沿其遍历。
    Endpoint(EndpointHandle),
    /// Any other open object. Ignored by the collector, dropped with the message.
    /// 其他任意打开对象。回收器忽略它，随消息一同释放。
    Other(Box<dyn Any + Send>),
}

impl fmt::Debug for Passed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Passed::Endpoint(handle) => f.debug_tuple("Endpoint").field(&handle.id()).finish(),
            Passed::Other(_) => f.write_str("Other(..)"),
        }
    }
}

/// A message queued on an endpoint: an opaque payload plus passed references.
///
/// 端点队列中的消息：不透明负载加上传递的引用。
#[derive(Debug, Default)]
pub struct Message {
    payload: Vec<u8>,
    passed: Vec<Passed>,
}

impl Message {
    pub fn new(payload: impl Into<Vec<u8>>) -> Self {
        Self {
            payload: payload.into(),
            passed: Vec::new(),
        }
    }

    /// Attach a duplicate of `handle`.
    /// 附加 `handle` 的一个副本。
    #[inline]
    pub fn with_endpoint(self, handle: &EndpointHandle) -> Self {
        self.with_passed(Passed::Endpoint(handle.clone()))
    }

    #[inline]
    pub fn with_other<T: Any + Send>(self, object: T) -> Self {
        self.with_passed(Passed::Other(Box::new(object)))
    }

    #[inline]
    pub fn with_passed(mut self, passed: Passed) -> Self {
        self.passed.push(passed);
        self
    }

    #[inline]
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    #[inline]
    pub fn passed(&self) -> &[Passed] {
        &self.passed
    }

    /// The endpoint handles among the passed references.
    pub fn endpoints(&self) -> impl Iterator<Item = &EndpointHandle> {
        self.passed.iter().filter_map(|passed| match passed {
            Passed::Endpoint(handle) => Some(handle),
            Passed::Other(_) => None,
        })
    }

    pub fn into_parts(self) -> (Vec<u8>, Vec<Passed>) {
        (self.payload, self.passed)
    }
}
