//! # Shared Event Model (Decoder ↔ Engine)
//!
//! Typed, immutable records for every trace event kind the aggregation engine
//! consumes. The trace decoder produces these; `rtprof` turns them into call
//! trees, rolled-up statistics, job timelines and heap series.
//!
//! ## Identifiers
//!
//! Every metadata entity (thread, module, class, function, source file, source
//! line) is referenced by a dense integer "internal id" assigned by the decoder
//! at first reference. Id `0` is reserved in every namespace:
//!
//! - [`FAKE_FUNCTION_ID`] marks an unresolved root frame
//! - [`FAKE_THREAD_ID`] owns events with no real thread association
//!
//! Neither ever shows up in user-visible aggregates.
//!
//! ## Key Types
//!
//! - [`TraceEvent`] - One decoded record, tagged by kind
//! - [`StackSampleDelta`] - "unwind N frames, then push these" stack update
//! - [`AllocationSample`] - Per-class allocation counts at one tick
//! - [`GcMarker`] / [`JitMarker`] - Job phase boundaries
//!
//! ## Time
//!
//! All `tick` fields are milliseconds relative to the session start time
//! recorded in the session's system-info file.

// ============================================================================
// Reserved Identifiers
// ============================================================================

/// Function id of the synthetic root frame every live stack hangs from.
pub const FAKE_FUNCTION_ID: u32 = 0;

/// Thread id holding events that are not associated with a real thread.
pub const FAKE_THREAD_ID: u32 = 0;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

// ============================================================================
// Metadata Records
// ============================================================================

/// Thread lifecycle record
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreadRecord {
    /// Internal thread id
    pub thread: u32,
    /// Tick at which the record was emitted
    pub tick: u64,
}

/// Binding of an internal thread id to the OS thread that runs it
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreadAssignment {
    pub thread: u32,
    pub os_thread_id: u64,
    #[cfg_attr(feature = "serde", serde(default))]
    pub name: Option<String>,
}

/// Module (assembly / shared object) load record
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleRecord {
    pub id: u32,
    pub path: String,
}

/// Class name record
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassRecord {
    pub id: u32,
    #[cfg_attr(feature = "serde", serde(default))]
    pub module: Option<u32>,
    pub name: String,
}

/// Function name record
///
/// May arrive after the function id has already been referenced by a stack
/// sample; the engine fills in the placeholder it created at that point.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionRecord {
    pub id: u32,
    pub name: String,
    #[cfg_attr(feature = "serde", serde(default))]
    pub signature: Option<String>,
    /// Metadata token inside the owning module
    #[cfg_attr(feature = "serde", serde(default))]
    pub token: Option<u32>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub class: Option<u32>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub module: Option<u32>,
}

/// Source file record
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFileRecord {
    pub id: u32,
    pub path: String,
}

/// Source line record (a line/column span inside one function)
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLineRecord {
    pub id: u32,
    pub file: u32,
    pub function: u32,
    pub start_line: u32,
    pub end_line: u32,
    #[cfg_attr(feature = "serde", serde(default))]
    pub start_column: u32,
    #[cfg_attr(feature = "serde", serde(default))]
    pub end_column: u32,
}

// ============================================================================
// Timeline Records
// ============================================================================

/// CPU time consumed since the previous tick of the same scope
///
/// `thread == None` is a whole-process tick.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CpuTick {
    #[cfg_attr(feature = "serde", serde(default))]
    pub thread: Option<u32>,
    pub tick: u64,
    /// CPU time (milliseconds, summed over all cores) used since the last tick
    pub cpu_time: u64,
}

/// Profiler pause or resume marker
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfilerToggle {
    pub tick: u64,
}

// ============================================================================
// Sample Records
// ============================================================================

/// A frame pushed by a stack delta
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameRecord {
    pub function: u32,
    /// Instruction pointer already mapped to a source-line id by the decoder
    #[cfg_attr(feature = "serde", serde(default))]
    pub line: Option<u32>,
}

impl FrameRecord {
    #[must_use]
    pub fn new(function: u32) -> Self {
        Self { function, line: None }
    }

    #[must_use]
    pub fn with_line(function: u32, line: u32) -> Self {
        Self { function, line: Some(line) }
    }
}

/// Stack sample expressed as a delta against the thread's previous stack
///
/// **Semantics**:
/// - `match_prefix == 0`: the stack is rebuilt from the root
/// - otherwise: unwind `stack_size - match_prefix` frames from the current top
/// - `top_line` (if any) is stored on the top frame left after unwinding
/// - `new_frames` are pushed outermost first (last element is innermost)
///
/// `samples == 0` is a shape-only record: the live stack changes but no
/// sample is produced.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackSampleDelta {
    pub thread: u32,
    pub tick: u64,
    pub match_prefix: u32,
    /// Depth of the previous stack this delta is expressed against
    pub stack_size: u32,
    #[cfg_attr(feature = "serde", serde(default))]
    pub new_frames: Vec<FrameRecord>,
    pub samples: u32,
    #[cfg_attr(feature = "serde", serde(default))]
    pub top_line: Option<u32>,
}

/// One class entry inside an allocation sample or a heap census
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AllocationEntry {
    pub class: u32,
    pub count: u64,
    pub size: u64,
    #[cfg_attr(feature = "serde", serde(default))]
    pub line: Option<u32>,
}

/// Allocations observed on one thread at one tick
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllocationSample {
    pub thread: u32,
    pub tick: u64,
    pub entries: Vec<AllocationEntry>,
}

/// Periodic census of live objects by class (heap snapshot input)
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeapCensus {
    pub tick: u64,
    pub entries: Vec<AllocationEntry>,
}

// ============================================================================
// Job Markers
// ============================================================================

/// Garbage collection phase
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GcPhase {
    /// Runtime starts suspending managed threads (GC begins)
    SuspendBegin,
    /// All managed threads suspended
    SuspendEnd,
    /// Runtime starts resuming managed threads
    RestartBegin,
    /// All managed threads resumed (GC ends)
    RestartEnd,
    /// The running collection covers this generation
    GenerationRange { generation: u32 },
}

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GcMarker {
    pub thread: u32,
    pub tick: u64,
    pub phase: GcPhase,
}

/// JIT compilation phase
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JitPhase {
    /// Compilation of `function` started
    Started,
    /// Compiled code for `function` was loaded (compilation ends)
    MethodLoaded,
}

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JitMarker {
    pub thread: u32,
    pub tick: u64,
    pub function: u32,
    pub phase: JitPhase,
}

// ============================================================================
// Event Envelope
// ============================================================================

/// One decoded trace record
///
/// Serialized (with the `serde` feature) as an internally tagged object:
/// `{"kind": "stack_sample", "thread": 1, ...}`.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "kind", rename_all = "snake_case"))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TraceEvent {
    ThreadCreated(ThreadRecord),
    ThreadAssigned(ThreadAssignment),
    ThreadDestroyed(ThreadRecord),
    ModuleLoaded(ModuleRecord),
    ClassName(ClassRecord),
    FunctionName(FunctionRecord),
    SourceFile(SourceFileRecord),
    SourceLine(SourceLineRecord),
    CpuTick(CpuTick),
    ProfilingPaused(ProfilerToggle),
    ProfilingResumed(ProfilerToggle),
    StackSample(StackSampleDelta),
    AllocationSample(AllocationSample),
    HeapCensus(HeapCensus),
    Gc(GcMarker),
    Jit(JitMarker),
}

impl TraceEvent {
    /// Short stable name of the event kind (used for counters and logs)
    #[must_use]
    pub fn kind_name(&self) -> &'static str {
        match self {
            TraceEvent::ThreadCreated(_) => "thread_created",
            TraceEvent::ThreadAssigned(_) => "thread_assigned",
            TraceEvent::ThreadDestroyed(_) => "thread_destroyed",
            TraceEvent::ModuleLoaded(_) => "module_loaded",
            TraceEvent::ClassName(_) => "class_name",
            TraceEvent::FunctionName(_) => "function_name",
            TraceEvent::SourceFile(_) => "source_file",
            TraceEvent::SourceLine(_) => "source_line",
            TraceEvent::CpuTick(_) => "cpu_tick",
            TraceEvent::ProfilingPaused(_) => "profiling_paused",
            TraceEvent::ProfilingResumed(_) => "profiling_resumed",
            TraceEvent::StackSample(_) => "stack_sample",
            TraceEvent::AllocationSample(_) => "allocation_sample",
            TraceEvent::HeapCensus(_) => "heap_census",
            TraceEvent::Gc(_) => "gc",
            TraceEvent::Jit(_) => "jit",
        }
    }

    /// Tick carried by the event, if it has one
    #[must_use]
    pub fn tick(&self) -> Option<u64> {
        match self {
            TraceEvent::ThreadCreated(r) | TraceEvent::ThreadDestroyed(r) => Some(r.tick),
            TraceEvent::CpuTick(t) => Some(t.tick),
            TraceEvent::ProfilingPaused(t) | TraceEvent::ProfilingResumed(t) => Some(t.tick),
            TraceEvent::StackSample(s) => Some(s.tick),
            TraceEvent::AllocationSample(a) => Some(a.tick),
            TraceEvent::HeapCensus(c) => Some(c.tick),
            TraceEvent::Gc(g) => Some(g.tick),
            TraceEvent::Jit(j) => Some(j.tick),
            TraceEvent::ThreadAssigned(_)
            | TraceEvent::ModuleLoaded(_)
            | TraceEvent::ClassName(_)
            | TraceEvent::FunctionName(_)
            | TraceEvent::SourceFile(_)
            | TraceEvent::SourceLine(_) => None,
        }
    }
}
