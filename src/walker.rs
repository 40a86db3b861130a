use crate::endpoint::Endpoint;
use crate::sync::Arc;
use std::vec::Vec;

/// Result of a completed mark phase.
/// 标记阶段完成后的结果。
pub(crate) struct MarkSet {
    /// Every endpoint marked by this walk, roots included.
    pub(crate) endpoints: Vec<Arc<Endpoint>>,
    /// Largest number of endpoints held on the explicit stack at once.
    pub(crate) peak_depth: usize,
}

/// The walk needed more than `capacity` stack slots.
///
/// `marked` is the partial result; those endpoints are still marked and the
/// caller must clear them.
///
/// 遍历所需栈槽位超过 `capacity`。
/// `marked` 为部分结果，这些端点仍处于标记状态，调用者必须清除。
pub(crate) struct WalkError {
    pub(crate) marked: Vec<Arc<Endpoint>>,
    pub(crate) capacity: usize,
}

/// Marks every endpoint reachable from `roots` through passed references.
///
/// Depth-first over an explicit stack. An endpoint is marked the moment it is
/// discovered and is never pushed twice, so each endpoint is scanned at most
/// once. The first newly discovered neighbour of the endpoint being scanned is
/// not pushed: it becomes the next endpoint to scan. A chain therefore walks
/// with an empty stack; only fan-out consumes slots.
///
/// Roots are seeded one at a time, each starting from an empty stack, so
/// `max_depth` limits fan-out and not the number of roots.
///
/// Must be called with the domain's collection lock held and every mark clear.
///
/// 通过传递的引用标记所有从 `roots` 可达的端点。
///
/// 基于显式栈的深度优先遍历。端点在被发现时即被标记，且不会被重复压栈，
/// 因此每个端点至多扫描一次。正在扫描的端点新发现的第一个邻居不会入栈，
/// 而是直接成为下一个被扫描的端点。因此链式结构遍历时栈始终为空，只有分叉会占用槽位。
///
/// 根逐个加入，每个根都从空栈开始，因此 `max_depth` 限制的是分叉而不是根的数量。
///
/// 调用时必须持有域回收锁，且所有标记均已清除。
pub(crate) fn mark_reachable(
    roots: &[Arc<Endpoint>],
    max_depth: usize,
) -> Result<MarkSet, WalkError> {
    let mut marked = Vec::new();
    let mut stack: Vec<Arc<Endpoint>> = Vec::new();
    let mut peak_depth = 0;

    for root in roots {
        if !root.try_mark() {
            continue;
        }
        marked.push(Arc::clone(root));

        let mut next = Some(Arc::clone(root));
        while let Some(current) = next.take().or_else(|| stack.pop()) {
            let mut first_child = None;

            let scanned = current.try_for_each_pending_endpoint(|child| {
                if !child.try_mark() {
                    return Ok(());
                }
                marked.push(Arc::clone(child));

                if first_child.is_none() {
                    first_child = Some(Arc::clone(child));
                    return Ok(());
                }
                if stack.len() >= max_depth {
                    return Err(());
                }
                stack.push(Arc::clone(child));
                peak_depth = peak_depth.max(stack.len());
                Ok(())
            });

            if scanned.is_err() {
                return Err(WalkError {
                    marked,
                    capacity: max_depth,
                });
            }
            next = first_child;
        }
    }

    Ok(MarkSet {
        endpoints: marked,
        peak_depth,
    })
}
