//! Domain types providing compile-time safety and self-documentation
//!
//! These newtype wrappers prevent common bugs like passing a class id where a
//! function id is expected, and make function signatures more expressive.
//! All ids are dense integers assigned by the trace decoder; id `0` is the
//! reserved "fake" id in every namespace.

use serde::Serialize;
use std::fmt;

macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident, $label:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize)]
        #[serde(transparent)]
        pub struct $name(pub u32);

        impl $name {
            /// The reserved id (`0`)
            pub const FAKE: Self = Self(0);

            /// Returns true for the reserved id
            #[must_use]
            pub fn is_fake(self) -> bool {
                self.0 == 0
            }

            /// Position of this id in dense storage
            #[must_use]
            pub fn index(self) -> usize {
                self.0 as usize
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($label, ":{}"), self.0)
            }
        }

        impl From<u32> for $name {
            fn from(id: u32) -> Self {
                Self(id)
            }
        }
    };
}

define_id!(
    /// Internal thread id (not the OS thread id)
    ThreadId,
    "T"
);
define_id!(
    /// Internal function id
    FunctionId,
    "F"
);
define_id!(
    /// Internal class (type) id
    ClassId,
    "C"
);
define_id!(
    /// Internal module id
    ModuleId,
    "M"
);
define_id!(
    /// Internal source file id
    SourceFileId,
    "SF"
);
define_id!(
    /// Internal source line id
    SourceLineId,
    "SL"
);

/// Timestamp in milliseconds since session start
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize)]
#[serde(transparent)]
pub struct Timestamp(pub u64);

impl Timestamp {
    pub const MAX: Self = Self(u64::MAX);

    /// Convert to seconds (f64)
    #[allow(clippy::cast_precision_loss)]
    #[must_use]
    pub fn as_seconds(self) -> f64 {
        self.0 as f64 / 1_000.0
    }

    /// Milliseconds elapsed since `earlier` (saturating)
    #[must_use]
    pub fn since(self, earlier: Timestamp) -> u64 {
        self.0.saturating_sub(earlier.0)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.3}s", self.as_seconds())
    }
}

/// The three weights every counter set tracks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    /// Number of stack samples
    Samples,
    /// Elapsed time attributed to samples (milliseconds)
    Time,
    /// Allocated bytes
    Memory,
}

impl Metric {
    pub const ALL: [Metric; 3] = [Metric::Samples, Metric::Time, Metric::Memory];
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Metric::Samples => "samples",
            Metric::Time => "time",
            Metric::Memory => "memory",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_display() {
        assert_eq!(ThreadId(5).to_string(), "T:5");
        assert_eq!(FunctionId(12).to_string(), "F:12");
        assert_eq!(SourceLineId(3).to_string(), "SL:3");
    }

    #[test]
    fn test_fake_ids() {
        assert!(FunctionId::FAKE.is_fake());
        assert!(ThreadId(0).is_fake());
        assert!(!ThreadId(1).is_fake());
        assert_eq!(ClassId(7).index(), 7);
    }

    #[test]
    fn test_timestamp_conversions() {
        let ts = Timestamp(1_500);
        assert_eq!(ts.as_seconds(), 1.5);
        assert_eq!(ts.since(Timestamp(500)), 1_000);
        assert_eq!(Timestamp(10).since(Timestamp(20)), 0);
        assert_eq!(ts.to_string(), "1.500s");
    }

    #[test]
    fn test_metric_display() {
        assert_eq!(Metric::Memory.to_string(), "memory");
        assert_eq!(Metric::ALL.len(), 3);
    }
}
