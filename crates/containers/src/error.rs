use allocator::Location;
use snafu::Snafu;

/// Error returned when two containers cannot exchange their contents.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum SwapError {
    #[snafu(display("cannot swap containers whose allocators are not equal"))]
    AllocatorMismatch {
        #[snafu(implicit)]
        location: Location,
    },
}
