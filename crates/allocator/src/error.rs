//! Error types shared by the allocator crate and its consumers.
//!
//! Allocation exhaustion is never reported through these types inside this
//! crate: allocators signal it with `None`. The errors here describe
//! configuration mistakes (an unusable pool layout) and are the currency
//! containers use when they surface an exhausted allocator to their callers.

use core::{fmt, panic};

use snafu::{GenerateImplicitData, Snafu};

/// Source location captured where an error was created.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Location(&'static panic::Location<'static>);

impl Default for Location {
    #[track_caller]
    fn default() -> Self {
        Self(panic::Location::caller())
    }
}

impl GenerateImplicitData for Location {
    #[track_caller]
    fn generate() -> Self {
        Self::default()
    }
}

impl fmt::Debug for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.0, f)
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl Location {
    #[must_use]
    pub fn file(&self) -> &'static str {
        self.0.file()
    }

    #[must_use]
    pub fn line(&self) -> u32 {
        self.0.line()
    }
}

/// Error returned when a fixed pool cannot be laid out over a buffer.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum PoolInitError {
    #[snafu(display(
        "node size {node_size} is smaller than a free-list link ({min_size} bytes)"
    ))]
    NodeTooSmall {
        node_size: usize,
        min_size: usize,
        #[snafu(implicit)]
        location: Location,
    },
}

/// Error returned when an allocator could not satisfy a request.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
#[snafu(display("failed to allocate {size} bytes aligned to {alignment}"))]
pub struct AllocError {
    size: usize,
    alignment: usize,
    #[snafu(implicit)]
    location: Location,
}

impl AllocError {
    #[must_use]
    pub fn size(&self) -> usize {
        self.size
    }

    #[must_use]
    pub fn alignment(&self) -> usize {
        self.alignment
    }

    #[must_use]
    pub fn location(&self) -> Location {
        self.location
    }
}
