//! A mark-and-sweep collector for local IPC endpoints that are kept alive only
//! by cycles of passed descriptors.
//!
//! An endpoint can carry handles to other endpoints inside its pending
//! messages. Plain reference counting never frees a group of endpoints that
//! only reference each other this way: every member still has a non-zero
//! count contributed by another member. Each endpoint therefore tracks, next to
//! its `open_count`, how many of those references are *in flight*
//! (`inflight_count`). An endpoint with `open_count > inflight_count` is held
//! by something outside the message graph and is a root; `collect()` marks
//! everything reachable from the roots through pending messages and destroys
//! the rest.
//!
//! 一个标记-清除回收器，用于回收仅被传递描述符构成的环所保活的本地 IPC 端点。
//!
//! 端点的待处理消息中可以携带指向其他端点的句柄。仅以这种方式互相引用的一组端点
//! 永远无法被普通引用计数释放：每个成员的计数都由其他成员贡献。因此每个端点除
//! `open_count` 之外还记录其中有多少引用处于*在途*状态（`inflight_count`）。
//! `open_count > inflight_count` 的端点被消息图之外的对象持有，是根；
//! `collect()` 标记所有通过待处理消息从根可达的端点，并销毁其余端点。
//!
//! # Example
//! ```
//! use ipc_cycle_gc::{GcDomain, Message};
//!
//! let domain = GcDomain::builder().auto_collect_threshold(None).build();
//! let a = domain.create_endpoint();
//! let b = domain.create_endpoint();
//!
//! // b travels inside a's queue: b is only in flight, but a is a root
//! a.send(Message::new("hello").with_endpoint(&b)).unwrap();
//! drop(b);
//!
//! assert_eq!(domain.collect().unwrap().destroyed(), 0);
//!
//! // receiving the message hands b back to the caller
//! let message = a.recv().unwrap();
//! let b = message.endpoints().next().unwrap().clone();
//! assert_eq!(b.inflight_count(), 0);
//! ```

mod accounting;
mod collector;
mod domain;
mod endpoint;
mod error;
mod registry;
mod state;
mod sync;
mod walker;

pub use collector::{CollectStats, Collection};
pub use domain::{GcDomain, GcDomainBuilder};
pub use endpoint::{EndpointHandle, EndpointId, Message, Passed};
pub use error::{CollectError, SendError};
pub use state::OverflowPolicy;

#[cfg(all(test, not(feature = "loom")))]
mod tests;
