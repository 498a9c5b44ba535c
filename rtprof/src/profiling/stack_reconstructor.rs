//! Live call-stack mirror per thread
//!
//! Stack samples arrive as deltas against the thread's previous stack:
//! "unwind N frames, store the top frame's instruction pointer, push these new
//! frames". `LiveStack` replays those deltas so that, after every event, it
//! holds the literal stack the thread had at that instant.
//!
//! ```text
//! delta { match_prefix: 1, stack_size: 2, new_frames: [f3] }
//!
//!   before         unwind 1        push f3
//!   ┌────┐
//!   │ f2 │ ← top
//!   ├────┤         ┌────┐          ┌────┐
//!   │ f1 │         │ f1 │ ← top    │ f3 │ ← top
//!   ├────┤         ├────┤          ├────┤
//!   │root│         │root│          │ f1 │
//!   └────┘         └────┘          ├────┤
//!                                  │root│
//!                                  └────┘
//! ```
//!
//! The singly-linked "top → parent → root" chain is stored as a vector whose
//! first slot is the permanent root sentinel and whose last slot is the top.
//! Unwinding truncates, extending pushes; pushed frames are always new entries
//! even if an identical frame was popped a moment ago. Path deduplication is
//! the call tree's job, not this one's.

use rtprof_common::StackSampleDelta;

use crate::domain::{FunctionId, SourceLineId, StackDeltaError, ThreadId};

/// One frame of a materialized sample stack
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StackItem {
    pub function: FunctionId,
    pub line: Option<SourceLineId>,
}

impl StackItem {
    #[must_use]
    pub fn new(function: FunctionId) -> Self {
        Self { function, line: None }
    }

    #[must_use]
    pub fn with_line(function: FunctionId, line: SourceLineId) -> Self {
        Self { function, line: Some(line) }
    }
}

#[derive(Debug, Clone, Copy)]
struct LiveFrame {
    function: FunctionId,
    line: Option<SourceLineId>,
}

/// Most recently observed stack of one thread
#[derive(Debug, Clone)]
pub struct LiveStack {
    thread: ThreadId,
    /// `frames[0]` is the root sentinel, `frames.last()` is the current top
    frames: Vec<LiveFrame>,
}

impl LiveStack {
    #[must_use]
    pub fn new(thread: ThreadId) -> Self {
        Self { thread, frames: vec![LiveFrame { function: FunctionId::FAKE, line: None }] }
    }

    /// Number of frames above the root sentinel
    #[must_use]
    pub fn depth(&self) -> usize {
        self.frames.len() - 1
    }

    /// Apply a stack delta.
    ///
    /// On error the stack is left exactly as it was.
    ///
    /// # Errors
    /// Returns [`StackDeltaError`] when the delta asks to unwind more frames
    /// than the live stack holds, or when its prefix exceeds its stack size.
    pub fn apply(&mut self, delta: &StackSampleDelta) -> Result<(), StackDeltaError> {
        if delta.match_prefix == 0 {
            self.frames.truncate(1);
        } else {
            let unwind = delta.stack_size.checked_sub(delta.match_prefix).ok_or(
                StackDeltaError::NegativeUnwind {
                    thread: self.thread,
                    match_prefix: delta.match_prefix,
                    stack_size: delta.stack_size,
                },
            )?;
            let depth = self.depth();
            if unwind as usize > depth {
                return Err(StackDeltaError::UnwindPastRoot { thread: self.thread, unwind, depth });
            }
            self.frames.truncate(self.frames.len() - unwind as usize);
        }

        if let (Some(line), Some(top)) = (delta.top_line, self.frames.last_mut()) {
            top.line = Some(SourceLineId(line));
        }

        self.frames.extend(delta.new_frames.iter().map(|frame| LiveFrame {
            function: FunctionId(frame.function),
            line: frame.line.map(SourceLineId),
        }));

        Ok(())
    }

    /// Walk from the top towards the root, innermost first.
    ///
    /// The root sentinel and any unresolved (fake) frames are left out.
    #[must_use]
    pub fn stack_items(&self) -> Vec<StackItem> {
        self.frames[1..]
            .iter()
            .rev()
            .filter(|frame| !frame.function.is_fake())
            .map(|frame| StackItem { function: frame.function, line: frame.line })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rtprof_common::FrameRecord;

    fn delta(match_prefix: u32, stack_size: u32, frames: &[u32]) -> StackSampleDelta {
        StackSampleDelta {
            thread: 1,
            tick: 0,
            match_prefix,
            stack_size,
            new_frames: frames.iter().map(|&f| FrameRecord::new(f)).collect(),
            samples: 1,
            top_line: None,
        }
    }

    fn functions(stack: &LiveStack) -> Vec<u32> {
        stack.stack_items().iter().map(|item| item.function.0).collect()
    }

    #[test]
    fn test_push_from_empty() {
        let mut stack = LiveStack::new(ThreadId(1));
        stack.apply(&delta(0, 2, &[1, 2])).unwrap();

        assert_eq!(stack.depth(), 2);
        // Innermost first
        assert_eq!(functions(&stack), vec![2, 1]);
    }

    #[test]
    fn test_unwind_then_extend() {
        let mut stack = LiveStack::new(ThreadId(1));
        stack.apply(&delta(0, 0, &[1, 2])).unwrap();
        stack.apply(&delta(1, 2, &[3])).unwrap();

        assert_eq!(functions(&stack), vec![3, 1]);
    }

    #[test]
    fn test_zero_prefix_resets_to_root() {
        let mut stack = LiveStack::new(ThreadId(1));
        stack.apply(&delta(0, 0, &[1, 2, 3])).unwrap();
        stack.apply(&delta(0, 3, &[])).unwrap();

        assert_eq!(stack.depth(), 0);
        assert!(stack.stack_items().is_empty());
    }

    #[test]
    fn test_unwind_to_root_is_allowed() {
        let mut stack = LiveStack::new(ThreadId(1));
        stack.apply(&delta(0, 0, &[1, 2])).unwrap();
        stack.apply(&delta(1, 3, &[4])).unwrap();

        assert_eq!(functions(&stack), vec![4]);
    }

    #[test]
    fn test_unwind_past_root_is_rejected_without_mutation() {
        let mut stack = LiveStack::new(ThreadId(7));
        stack.apply(&delta(0, 0, &[1, 2])).unwrap();

        let err = stack.apply(&delta(1, 5, &[9])).unwrap_err();
        assert_eq!(err, StackDeltaError::UnwindPastRoot { thread: ThreadId(7), unwind: 4, depth: 2 });
        assert_eq!(functions(&stack), vec![2, 1]);
    }

    #[test]
    fn test_prefix_larger_than_stack_size_is_rejected() {
        let mut stack = LiveStack::new(ThreadId(1));
        let err = stack.apply(&delta(3, 1, &[])).unwrap_err();
        assert!(matches!(err, StackDeltaError::NegativeUnwind { .. }));
    }

    #[test]
    fn test_top_line_lands_on_unwound_top() {
        let mut stack = LiveStack::new(ThreadId(1));
        stack.apply(&delta(0, 0, &[1, 2])).unwrap();

        let mut d = delta(1, 2, &[3]);
        d.top_line = Some(40);
        stack.apply(&d).unwrap();

        let items = stack.stack_items();
        assert_eq!(items[0], StackItem::new(FunctionId(3)));
        assert_eq!(items[1], StackItem::with_line(FunctionId(1), SourceLineId(40)));
    }

    #[test]
    fn test_repeated_subpath_creates_fresh_frames() {
        let mut stack = LiveStack::new(ThreadId(1));
        stack.apply(&delta(0, 0, &[1, 2])).unwrap();
        stack.apply(&delta(0, 2, &[1, 2, 1, 2])).unwrap();

        assert_eq!(functions(&stack), vec![2, 1, 2, 1]);
    }

    #[test]
    fn test_fake_frames_are_not_materialized() {
        let mut stack = LiveStack::new(ThreadId(1));
        stack.apply(&delta(0, 0, &[0, 5])).unwrap();

        assert_eq!(stack.depth(), 2);
        assert_eq!(functions(&stack), vec![5]);
    }
}
