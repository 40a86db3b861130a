/// 遍历器测试模块
/// 测试显式栈深度优先遍历、首子节点省略、环安全以及栈上限
use super::{manual_domain, pass, Lcg};
use crate::endpoint::{Endpoint, EndpointId};
use crate::sync::Arc;
use crate::walker::mark_reachable;
use crate::{EndpointHandle, GcDomain, Message};
use std::collections::BTreeSet;

fn roots_of(handles: &[&EndpointHandle]) -> Vec<Arc<Endpoint>> {
    handles.iter().map(|h| Arc::clone(h.endpoint())).collect()
}

fn ids(endpoints: &[Arc<Endpoint>]) -> BTreeSet<EndpointId> {
    endpoints.iter().map(|e| e.id()).collect()
}

fn unmark(endpoints: &[Arc<Endpoint>]) {
    for endpoint in endpoints {
        endpoint.unmark();
    }
}

/// 测试1: 链式结构无需占用栈槽位
#[test]
fn test_chain_needs_no_stack() {
    let domain = manual_domain();
    let handles: Vec<_> = (0..100).map(|_| domain.create_endpoint()).collect();
    for pair in handles.windows(2) {
        pass(&pair[0], &pair[1]);
    }

    let marked = mark_reachable(&roots_of(&[&handles[0]]), 0).ok().unwrap();

    assert_eq!(marked.endpoints.len(), 100);
    assert_eq!(marked.peak_depth, 0);
    unmark(&marked.endpoints);
}

/// 测试2: 分叉需要 n-1 个栈槽位
#[test]
fn test_fan_out_uses_n_minus_one_slots() {
    let domain = manual_domain();
    let root = domain.create_endpoint();
    let children: Vec<_> = (0..10).map(|_| domain.create_endpoint()).collect();
    for child in &children {
        pass(&root, child);
    }

    let marked = mark_reachable(&roots_of(&[&root]), 9).ok().unwrap();

    assert_eq!(marked.endpoints.len(), 11);
    assert_eq!(marked.peak_depth, 9);
    unmark(&marked.endpoints);
}

/// 测试3: 超过栈上限时返回部分结果
#[test]
fn test_fan_out_beyond_capacity_fails() {
    let domain = manual_domain();
    let root = domain.create_endpoint();
    let children: Vec<_> = (0..10).map(|_| domain.create_endpoint()).collect();
    for child in &children {
        pass(&root, child);
    }

    let err = match mark_reachable(&roots_of(&[&root]), 8) {
        Ok(_) => panic!("walk should have exhausted its stack"),
        Err(err) => err,
    };

    assert_eq!(err.capacity, 8);
    assert_eq!(err.marked.len(), 11);
    unmark(&err.marked);
}

/// 测试4: 环不会导致重复访问
#[test]
fn test_cycle_is_visited_once() {
    let domain = manual_domain();
    let a = domain.create_endpoint();
    let b = domain.create_endpoint();
    let c = domain.create_endpoint();
    pass(&a, &b);
    pass(&b, &c);
    pass(&c, &a);
    pass(&c, &b);

    let marked = mark_reachable(&roots_of(&[&a]), 4).ok().unwrap();

    assert_eq!(marked.endpoints.len(), 3);
    unmark(&marked.endpoints);
}

/// 测试5: 同一端点作为多个根时只标记一次
#[test]
fn test_duplicate_roots() {
    let domain = manual_domain();
    let a = domain.create_endpoint();

    let marked = mark_reachable(&roots_of(&[&a, &a, &a]), 0).ok().unwrap();

    assert_eq!(marked.endpoints.len(), 1);
    unmark(&marked.endpoints);
}

/// 测试6: 根的数量不受栈上限限制
#[test]
fn test_many_roots_with_zero_capacity() {
    let domain = manual_domain();
    let handles: Vec<_> = (0..50).map(|_| domain.create_endpoint()).collect();
    let refs: Vec<&EndpointHandle> = handles.iter().collect();

    let marked = mark_reachable(&roots_of(&refs), 0).ok().unwrap();

    assert_eq!(marked.endpoints.len(), 50);
    unmark(&marked.endpoints);
}

/// 测试7: 非端点对象不会被遍历
#[test]
fn test_other_objects_are_ignored() {
    let domain = manual_domain();
    let a = domain.create_endpoint();
    let b = domain.create_endpoint();
    a.send(Message::new("x").with_other(String::from("not an endpoint")))
        .unwrap();
    a.send(Message::new("y").with_other(7u8).with_endpoint(&b))
        .unwrap();

    let marked = mark_reachable(&roots_of(&[&a]), 0).ok().unwrap();

    assert_eq!(ids(&marked.endpoints), [a.id(), b.id()].into_iter().collect());
    unmark(&marked.endpoints);
}

/// 测试8: 不可达的端点不会被标记
#[test]
fn test_unreachable_not_marked() {
    let domain = manual_domain();
    let a = domain.create_endpoint();
    let b = domain.create_endpoint();
    let c = domain.create_endpoint();
    pass(&b, &c);
    pass(&c, &a);

    let marked = mark_reachable(&roots_of(&[&a]), 4).ok().unwrap();

    assert_eq!(ids(&marked.endpoints), [a.id()].into_iter().collect());
    assert!(!b.endpoint().is_marked());
    assert!(!c.endpoint().is_marked());
    unmark(&marked.endpoints);
}

/// 按给定顺序构建同一张随机图，返回从 0 号端点可达的集合
fn reachable_with_order(edges: &[(usize, usize)], nodes: usize, root_order: &[usize]) -> BTreeSet<EndpointId> {
    let domain: GcDomain = manual_domain();
    let handles: Vec<_> = (0..nodes).map(|_| domain.create_endpoint()).collect();
    for &(from, to) in edges {
        pass(&handles[from], &handles[to]);
    }
    let roots: Vec<&EndpointHandle> = root_order.iter().map(|&i| &handles[i]).collect();

    let marked = mark_reachable(&roots_of(&roots), nodes).ok().unwrap();
    let result = ids(&marked.endpoints);
    unmark(&marked.endpoints);
    result
}

/// 测试9: 遍历结果与根的顺序和队列顺序无关
#[test]
fn test_order_independence() {
    let nodes = 40;
    let mut rng = Lcg::new(7);
    let edges: Vec<(usize, usize)> = (0..60)
        .map(|_| (rng.next_below(nodes), rng.next_below(nodes)))
        .collect();
    let mut reversed_edges = edges.clone();
    reversed_edges.reverse();

    let roots = [0, 5, 17];
    let baseline = reachable_with_order(&edges, nodes, &roots);

    assert_eq!(reachable_with_order(&reversed_edges, nodes, &roots), baseline);
    assert_eq!(reachable_with_order(&edges, nodes, &[17, 5, 0]), baseline);
    assert_eq!(reachable_with_order(&reversed_edges, nodes, &[5, 0, 17]), baseline);
}
