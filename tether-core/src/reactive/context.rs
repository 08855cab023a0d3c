//! Reactive Context
//!
//! The reactive context tracks which watcher is currently evaluating.
//! This enables automatic dependency tracking: when a reactive property is
//! read, its dep is recorded against the current watcher.
//!
//! # Implementation
//!
//! We use a thread-local stack of collector frames. Evaluating a watcher
//! pushes a frame; every `Dep::depend()` during the evaluation lands in the
//! top frame; the frame is popped when the guard drops. The stack (rather
//! than a single "current watcher" slot) lets a computed property be
//! evaluated in the middle of another watcher's evaluation without either
//! losing its dependencies.
//!
//! [`ReactiveContext::untracked`] pushes a frame with no owner, so reads
//! performed by callbacks never leak into an outer evaluation.

use std::cell::RefCell;

use indexmap::IndexMap;

use super::dep::Dep;
use super::subscriber::{DepId, WatcherId};

thread_local! {
    static CONTEXT_STACK: RefCell<Vec<ContextEntry>> = const { RefCell::new(Vec::new()) };
}

/// A collector frame on the context stack.
struct ContextEntry {
    /// The watcher being evaluated; `None` for an untracked frame.
    watcher_id: Option<WatcherId>,
    /// Deps read during this evaluation, in first-read order.
    dependencies: IndexMap<DepId, Dep>,
}

/// Guard that pops the context when dropped.
///
/// This ensures the context stack is properly maintained even if
/// the evaluation unwinds.
pub struct ReactiveContext {
    watcher_id: Option<WatcherId>,
}

impl ReactiveContext {
    /// Enter a new collector frame for the given watcher.
    pub fn enter(watcher_id: WatcherId) -> Self {
        Self::push(Some(watcher_id))
    }

    fn push(watcher_id: Option<WatcherId>) -> Self {
        CONTEXT_STACK.with(|stack| {
            stack.borrow_mut().push(ContextEntry {
                watcher_id,
                dependencies: IndexMap::new(),
            });
        });

        Self { watcher_id }
    }

    /// Run `f` with dependency collection suspended.
    pub fn untracked<R>(f: impl FnOnce() -> R) -> R {
        let _guard = Self::push(None);
        f()
    }

    /// Check whether reads are currently being collected.
    pub fn is_active() -> bool {
        Self::current_watcher().is_some()
    }

    /// Get the watcher whose evaluation is in progress, if any.
    pub fn current_watcher() -> Option<WatcherId> {
        CONTEXT_STACK.with(|stack| stack.borrow().last().and_then(|entry| entry.watcher_id))
    }

    /// Record a dependency on the given dep in the top frame.
    pub fn track_dependency(dep: &Dep) {
        CONTEXT_STACK.with(|stack| {
            if let Some(entry) = stack.borrow_mut().last_mut() {
                if entry.watcher_id.is_some() {
                    entry
                        .dependencies
                        .entry(dep.id())
                        .or_insert_with(|| dep.clone());
                }
            }
        });
    }

    /// Take the deps collected in the top frame so far.
    pub fn take_dependencies() -> IndexMap<DepId, Dep> {
        CONTEXT_STACK.with(|stack| {
            stack
                .borrow_mut()
                .last_mut()
                .map(|entry| std::mem::take(&mut entry.dependencies))
                .unwrap_or_default()
        })
    }
}

impl Drop for ReactiveContext {
    fn drop(&mut self) {
        CONTEXT_STACK.with(|stack| {
            let popped = stack.borrow_mut().pop();

            if let Some(entry) = popped {
                debug_assert_eq!(
                    entry.watcher_id, self.watcher_id,
                    "ReactiveContext mismatch: expected {:?}, got {:?}",
                    self.watcher_id, entry.watcher_id
                );
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn context_tracks_watcher() {
        let id = WatcherId::new();

        assert!(!ReactiveContext::is_active());
        assert!(ReactiveContext::current_watcher().is_none());

        {
            let _ctx = ReactiveContext::enter(id);

            assert!(ReactiveContext::is_active());
            assert_eq!(ReactiveContext::current_watcher(), Some(id));
        }

        // Context should be cleaned up after drop
        assert!(!ReactiveContext::is_active());
        assert!(ReactiveContext::current_watcher().is_none());
    }

    #[test]
    fn context_deduplicates_dependencies() {
        let id = WatcherId::new();
        let _ctx = ReactiveContext::enter(id);

        let a = Dep::new();
        let b = Dep::new();
        ReactiveContext::track_dependency(&a);
        ReactiveContext::track_dependency(&b);
        ReactiveContext::track_dependency(&a);

        let deps = ReactiveContext::take_dependencies();
        assert_eq!(deps.keys().copied().collect::<Vec<_>>(), vec![a.id(), b.id()]);
    }

    #[test]
    fn nested_contexts_keep_separate_frames() {
        let outer = WatcherId::new();
        let inner = WatcherId::new();
        let outer_dep = Dep::new();
        let inner_dep = Dep::new();

        let _ctx1 = ReactiveContext::enter(outer);
        ReactiveContext::track_dependency(&outer_dep);

        {
            let _ctx2 = ReactiveContext::enter(inner);
            assert_eq!(ReactiveContext::current_watcher(), Some(inner));
            ReactiveContext::track_dependency(&inner_dep);
            let deps = ReactiveContext::take_dependencies();
            assert!(deps.contains_key(&inner_dep.id()));
            assert!(!deps.contains_key(&outer_dep.id()));
        }

        assert_eq!(ReactiveContext::current_watcher(), Some(outer));
        let deps = ReactiveContext::take_dependencies();
        assert_eq!(deps.len(), 1);
        assert!(deps.contains_key(&outer_dep.id()));
    }

    #[test]
    fn untracked_frames_collect_nothing() {
        let id = WatcherId::new();
        let _ctx = ReactiveContext::enter(id);
        let dep = Dep::new();

        ReactiveContext::untracked(|| {
            assert!(!ReactiveContext::is_active());
            ReactiveContext::track_dependency(&dep);
        });

        assert!(ReactiveContext::take_dependencies().is_empty());
    }
}
