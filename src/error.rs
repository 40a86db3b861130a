use crate::endpoint::Message;
use std::fmt;

/// Errors returned by `GcDomain::collect()`.
///
/// 由 `GcDomain::collect()` 返回的错误。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectError {
    /// The reachable graph needed more stack slots than the configured ceiling.
    /// The pass destroyed nothing and every mark was cleared.
    ///
    /// 可达图所需的栈槽位超过了配置上限。本轮未销毁任何端点，所有标记均已清除。
    GraphTooDeep {
        /// Externally referenced endpoints at the start of the pass.
        roots: usize,
        /// Registered endpoints at the start of the pass.
        endpoints: usize,
        /// The stack ceiling that was hit.
        capacity: usize,
        /// Endpoints marked before the walk was abandoned.
        marked: usize,
    },
}

impl fmt::Display for CollectError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CollectError::GraphTooDeep {
                roots,
                endpoints,
                capacity,
                marked,
            } => write!(
                f,
                "endpoint graph too deep: stack capacity {capacity} exhausted after marking \
                 {marked} of {endpoints} endpoints from {roots} roots"
            ),
        }
    }
}

impl std::error::Error for CollectError {}

/// The destination endpoint was already destroyed; the unsent message is returned.
///
/// 目标端点已被销毁；未发送的消息被交还。
#[derive(Debug)]
pub struct SendError {
    message: Message,
}

impl SendError {
    pub(crate) fn new(message: Message) -> Self {
        Self { message }
    }

    pub fn message(&self) -> &Message {
        &self.message
    }

    pub fn into_message(self) -> Message {
        self.message
    }
}

impl fmt::Display for SendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("sending on a destroyed endpoint")
    }
}

impl std::error::Error for SendError {}
