//! End-to-end frame lifecycles over a counting allocator

use std::panic::{self, AssertUnwindSafe};

use pretty_assertions::assert_eq;
use rstest::rstest;
use scopestack::{
    Address, BaseAllocator, CountingAllocator, FrameKind, ScopeError, ScopeStack, StackConfig,
    SystemAllocator, TrackingFailureReason,
};

type Counting = CountingAllocator<SystemAllocator>;

fn counting() -> Counting {
    CountingAllocator::new(SystemAllocator::new())
}

#[test]
fn array_frame_full_then_popped() {
    let alloc = counting();
    let stack = ScopeStack::new(&alloc);
    let frame = stack.push_frame(FrameKind::array(4));

    let owned: Vec<_> = (0..4).map(|_| stack.allocate(24).unwrap()).collect();
    let err = stack.allocate(24).unwrap_err();

    assert_eq!(
        err,
        ScopeError::TrackingFailure {
            reason: TrackingFailureReason::CapacityExceeded { capacity: 4 }
        }
    );
    // the rejected block went straight back
    assert_eq!(alloc.counts().released, 1);
    assert_eq!(stack.current().unwrap().len, 4);

    drop(frame);
    assert_eq!(alloc.counts().released, 5);
    assert_eq!(alloc.live(), 0);
    assert!(owned.iter().all(|&ptr| stack.owner_of(ptr).is_none()));
}

#[test]
fn resize_moves_ownership_to_new_address() {
    let alloc = counting();
    let stack = ScopeStack::new(&alloc);
    let _frame = stack.push_frame(FrameKind::Tree);

    let a = stack.allocate(16).unwrap();
    // keep a neighbour alive so growing in place is unlikely
    let _pin = stack.allocate(16).unwrap();
    let b = stack.resize(a, 1 << 20).unwrap();

    assert!(stack.owns(b));
    if a != b {
        assert!(!stack.owns(a));
        let released = alloc.counts().released;
        stack.release(a);
        assert_eq!(alloc.counts().released, released);
    }
}

#[test]
fn promoted_address_survives_child_and_dies_with_parent() {
    let alloc = counting();
    let stack = ScopeStack::new(&alloc);

    let parent = stack.push_frame(FrameKind::Tree);
    let child = stack.push_frame(FrameKind::Tree);
    let x = stack.allocate(8).unwrap();
    stack.promote(x).unwrap();

    child.pop().unwrap();
    assert_eq!(alloc.counts().released, 0);
    assert_eq!(stack.owner_of(x), Some(parent.id()));

    parent.pop().unwrap();
    assert_eq!(alloc.counts().released, 1);
}

#[test]
fn promoted_out_of_bottom_frame_is_never_released() {
    let alloc = counting();
    let stack = ScopeStack::new(&alloc);
    let x;
    {
        let _bottom = stack.push_frame(FrameKind::array(2));
        x = stack.allocate(8).unwrap();
        stack.promote(x).unwrap();
    }
    {
        let _again = stack.push_frame(FrameKind::Tree);
    }

    assert_eq!(alloc.counts().released, 0);
    unsafe { alloc.release(x) };
}

#[test]
fn pop_releases_each_address_exactly_once() {
    let alloc = counting();
    let stack = ScopeStack::new(&alloc);
    {
        let _outer = stack.push_frame(FrameKind::Tree);
        for _ in 0..50 {
            stack.allocate(8).unwrap();
        }
        let _inner = stack.push_frame(FrameKind::array(8));
        for _ in 0..8 {
            stack.allocate(8).unwrap();
        }
    }

    let counts = alloc.counts();
    assert_eq!(counts.acquired, 58);
    assert_eq!(counts.released, 58);
}

#[test]
fn guard_pops_when_scope_unwinds() {
    let alloc = counting();
    let stack = ScopeStack::new(&alloc);

    let result = panic::catch_unwind(AssertUnwindSafe(|| {
        let _frame = stack.push_frame(FrameKind::Tree);
        stack.allocate(32).unwrap();
        panic!("boom");
    }));

    assert!(result.is_err());
    assert!(stack.is_empty());
    assert_eq!(alloc.live(), 0);
}

#[test]
fn oversized_array_frame_degrades_instead_of_aborting() {
    let alloc = counting();
    let stack = ScopeStack::new(&alloc);
    let _outer = stack.push_frame(FrameKind::Tree);
    let kept = stack.allocate(8).unwrap();

    let pushed = panic::catch_unwind(AssertUnwindSafe(|| {
        let _frame = stack.push_frame(FrameKind::array(usize::MAX));
        assert_eq!(stack.depth(), 2);
        let err = stack.allocate(8).unwrap_err();
        assert_eq!(
            err,
            ScopeError::TrackingFailure {
                reason: TrackingFailureReason::CapacityExceeded { capacity: 0 }
            }
        );
    }));
    assert!(pushed.is_ok());

    let err = stack.try_push_frame(FrameKind::array(usize::MAX)).unwrap_err();
    assert!(matches!(err, ScopeError::SizeOverflow { count: usize::MAX, .. }));

    assert_eq!(stack.depth(), 1);
    assert!(stack.owns(kept));
    assert_eq!(alloc.live(), 1);
}

#[test]
fn bounded_tree_frames_report_node_exhaustion() {
    let alloc = counting();
    let stack = ScopeStack::with_config(&alloc, StackConfig::bounded(3)).unwrap();
    let _frame = stack.push_default_frame();

    for _ in 0..3 {
        stack.allocate(8).unwrap();
    }
    let err = stack.allocate(8).unwrap_err();

    assert_eq!(
        err,
        ScopeError::TrackingFailure {
            reason: TrackingFailureReason::NodeExhausted { limit: Some(3) }
        }
    );
    assert!(err.is_retryable());
}

#[rstest]
#[case::tree(FrameKind::Tree)]
#[case::array(FrameKind::array(16))]
fn adopted_blocks_are_released_with_frame(#[case] kind: FrameKind) {
    let alloc = counting();
    let stack = ScopeStack::new(&alloc);
    let foreign = alloc.acquire(64).unwrap();
    {
        let _frame = stack.push_frame(kind);
        unsafe { stack.adopt(foreign).unwrap() };
        assert_eq!(
            unsafe { stack.adopt(foreign) },
            Err(ScopeError::TrackingFailure {
                reason: TrackingFailureReason::AlreadyTracked {
                    addr: Address::new(foreign)
                }
            })
        );
    }
    assert_eq!(alloc.live(), 0);
}

#[rstest]
#[case::tree_into_array(FrameKind::array(1), FrameKind::Tree)]
#[case::array_into_tree(FrameKind::Tree, FrameKind::array(1))]
#[case::array_into_array(FrameKind::array(2), FrameKind::array(2))]
fn promotion_across_kinds(#[case] parent: FrameKind, #[case] child: FrameKind) {
    let alloc = counting();
    let stack = ScopeStack::new(&alloc);
    let parent = stack.push_frame(parent);
    let x;
    {
        let _child = stack.push_frame(child);
        x = stack.allocate(8).unwrap();
        stack.promote(x).unwrap();
    }
    assert_eq!(stack.owner_of(x), Some(parent.id()));
    drop(parent);
    assert_eq!(alloc.live(), 0);
}

#[test]
fn passthrough_is_counted_and_untracked() {
    let alloc = counting();
    let stack = ScopeStack::new(&alloc);

    let ptr = stack.allocate(8).unwrap();
    assert!(stack.snapshot().frames.is_empty());
    if cfg!(feature = "stats") {
        assert_eq!(stack.stats().passthrough_allocations, 1);
    }

    unsafe { alloc.release(ptr) };
    assert_eq!(alloc.live(), 0);
}

#[test]
fn dump_lists_frames_bottom_first() {
    let stack = ScopeStack::new(SystemAllocator::new());
    let outer = stack.push_frame(FrameKind::Tree);
    let x = stack.allocate(8).unwrap();
    let inner = stack.push_frame(FrameKind::array(4));

    let expected = format!(
        "---- {} tree depth=0 owned=1\n  {}\n---- {} array[4] depth=1 owned=0\n----\n",
        outer.id(),
        Address::new(x),
        inner.id()
    );
    assert_eq!(stack.dump(), expected);
}

#[test]
#[cfg(feature = "stats")]
fn stats_follow_operations() {
    let stack = ScopeStack::new(counting());
    {
        let _outer = stack.push_frame(FrameKind::Tree);
        let _inner = stack.push_frame(FrameKind::Tree);
        let a = stack.allocate(8).unwrap();
        let b = stack.allocate(8).unwrap();
        stack.release(a);
        let b = stack.resize(b, 64).unwrap();
        stack.promote(b).unwrap();
    }

    let stats = stack.stats();
    assert_eq!(stats.frames_pushed, 2);
    assert_eq!(stats.frames_popped, 2);
    assert_eq!(stats.peak_depth, 2);
    assert_eq!(stats.tracked_allocations, 2);
    assert_eq!(stats.releases, 1);
    assert_eq!(stats.resizes, 1);
    assert_eq!(stats.promotions, 1);
    assert_eq!(stats.exit_releases, 1);
    assert_eq!(stats.tracking_failures, 0);
}

#[test]
fn production_config_keeps_counters_off() {
    let stack = ScopeStack::with_config(SystemAllocator::new(), StackConfig::production()).unwrap();
    let _frame = stack.push_default_frame();
    stack.allocate(8).unwrap();
    assert_eq!(stack.stats(), scopestack::StackStats::default());
}
