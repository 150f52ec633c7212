use std::error::Error;
use std::fmt;

/// Budgeting error kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BudgetError {
    /// The memory required to decode exceeds the memory available
    MemoryShortfall(MemoryShortfall),

    /// The caller supplied invalid decode options
    Usage(UsageError),

    /// Computing the required byte count overflowed, so the request
    /// cannot fit any budget
    DimensionsTooLarge,
}

/// The payload of a failed budget check: how many bytes were available
/// and how many the decode would have needed.
///
/// Both counts are set at construction and immutable afterwards. The
/// `Display` rendering is suitable for logs or direct user display.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryShortfall {
    available_memory: u64,
    need_memory: u64,
}

impl MemoryShortfall {
    /// Records a shortfall of `need_memory` bytes against
    /// `available_memory` bytes. The counts are stored unchanged;
    /// callers are expected to supply accurate measurements.
    pub fn new(available_memory: u64, need_memory: u64) -> MemoryShortfall {
        MemoryShortfall {
            available_memory,
            need_memory,
        }
    }

    /// Bytes available at the time of the failed check.
    pub fn available_memory(&self) -> u64 {
        self.available_memory
    }

    /// Bytes the decode would have required.
    pub fn need_memory(&self) -> u64 {
        self.need_memory
    }
}

impl fmt::Display for MemoryShortfall {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        write!(
            fmt,
            "Available memory is not enough to decode image. Available {} bytes. Need {} bytes.",
            self.available_memory, self.need_memory
        )
    }
}

impl Error for MemoryShortfall {}

/// Caller misuse detected before any estimate is attempted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UsageError {
    /// Subsampling factors other than powers of two are not supported
    SampleSizeNotPowerOfTwo(u32),
}

impl fmt::Display for UsageError {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            UsageError::SampleSizeNotPowerOfTwo(n) => {
                write!(fmt, "sample size should be a power of 2, got {}", n)
            }
        }
    }
}

impl Error for UsageError {}

impl fmt::Display for BudgetError {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            BudgetError::MemoryShortfall(ref e) => e.fmt(fmt),
            BudgetError::Usage(ref e) => write!(fmt, "Usage error: {}", e),
            BudgetError::DimensionsTooLarge => {
                write!(fmt, "image dimensions are too large to estimate")
            }
        }
    }
}

impl Error for BudgetError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match *self {
            BudgetError::MemoryShortfall(ref e) => Some(e),
            BudgetError::Usage(ref e) => Some(e),
            BudgetError::DimensionsTooLarge => None,
        }
    }
}

impl From<MemoryShortfall> for BudgetError {
    fn from(err: MemoryShortfall) -> BudgetError {
        BudgetError::MemoryShortfall(err)
    }
}

impl From<UsageError> for BudgetError {
    fn from(err: UsageError) -> BudgetError {
        BudgetError::Usage(err)
    }
}

/// Result of a budget or estimate operation
pub type BudgetResult<T> = Result<T, BudgetError>;
