//! Public macros for the scopestack crate

/// Opens a frame on the thread-local stack for the rest of the enclosing block
///
/// - `scope!()` opens a frame of the default kind (tree unless configured)
/// - `scope!(tree)` opens a tree frame
/// - `scope!(array N)` opens an array frame with room for `N` addresses
///
/// The frame is popped, and everything it still owns released, when the
/// enclosing block exits by any path.
///
/// # Examples
/// ```
/// use scopestack::{local, scope};
///
/// fn build() -> scopestack::ScopeResult<()> {
///     scope!(array 4);
///     let a = local::allocate(16)?;
///     let b = local::allocate(16)?;
///     assert_eq!(local::depth(), 1);
///     # let _ = (a, b);
///     Ok(())
/// }
///
/// build().unwrap();
/// assert_eq!(local::depth(), 0);
/// ```
#[macro_export]
macro_rules! scope {
    () => {
        let _scope_frame = $crate::local::default_scope();
    };

    (tree) => {
        let _scope_frame = $crate::local::scope($crate::FrameKind::Tree);
    };

    (array $capacity:expr) => {
        let _scope_frame = $crate::local::scope($crate::FrameKind::array($capacity));
    };
}

/// Pushes a guarded frame on an explicit stack
///
/// `scoped!(stack)` uses the stack's default kind, `scoped!(stack, tree)` and
/// `scoped!(stack, array N)` pick one. Evaluates to the [`FrameGuard`].
///
/// [`FrameGuard`]: crate::FrameGuard
///
/// # Examples
/// ```
/// use scopestack::{ScopeStack, SystemAllocator, scoped};
///
/// let stack = ScopeStack::new(SystemAllocator::new());
/// {
///     let _frame = scoped!(stack, array 2);
///     stack.allocate(8).unwrap();
/// }
/// assert!(stack.is_empty());
/// ```
#[macro_export]
macro_rules! scoped {
    ($stack:expr) => {
        $stack.push_default_frame()
    };

    ($stack:expr, tree) => {
        $stack.push_frame($crate::FrameKind::Tree)
    };

    ($stack:expr, array $capacity:expr) => {
        $stack.push_frame($crate::FrameKind::array($capacity))
    };
}

#[cfg(test)]
mod tests {
    use crate::allocator::{CountingAllocator, SystemAllocator};
    use crate::{FrameKind, ScopeStack, local};

    #[test]
    fn scope_macro_forms() {
        {
            scope!();
            assert_eq!(local::depth(), 1);
            {
                scope!(tree);
                scope!(array 3);
                assert_eq!(local::depth(), 3);
                assert_eq!(
                    local::with_local_stack(|stack| stack.current().unwrap().kind),
                    FrameKind::array(3)
                );
            }
            assert_eq!(local::depth(), 1);
        }
        assert_eq!(local::depth(), 0);
    }

    #[test]
    fn scoped_macro_releases_on_exit() {
        let stack = ScopeStack::new(CountingAllocator::new(SystemAllocator::new()));
        {
            let _outer = scoped!(stack);
            let _inner = scoped!(stack, tree);
            stack.allocate(8).unwrap();
            {
                let _arr = scoped!(stack, array 1);
                stack.allocate(8).unwrap();
            }
            assert_eq!(stack.allocator().counts().released, 1);
        }
        assert_eq!(stack.allocator().live(), 0);
    }
}
