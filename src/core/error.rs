//! Error classification
//!
//! Every kernel return code maps onto one [`OsError`] variant. The
//! discriminants are the positive POSIX errno values, so codes coming from
//! a C-style kernel convert losslessly. The one exception is
//! [`OsError::WouldBlock`]: POSIX makes `EWOULDBLOCK` an alias of `EAGAIN`,
//! and a no-wait miss must stay distinct from [`OsError::Again`], so it
//! carries the crate's own code 140.

use core::fmt;

/// Kernel error classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(i32)]
pub enum OsError {
    /// Operation not permitted (e.g. unlock by a thread that is not the owner)
    Perm = 1,
    /// No such object
    NoEnt = 2,
    /// No such thread (the thread has already terminated)
    Srch = 3,
    /// Interrupted call
    Intr = 4,
    /// I/O error
    Io = 5,
    /// Try again (e.g. a semaphore was reset while waiting)
    Again = 11,
    /// Out of memory in a bounded allocator
    NoMem = 12,
    /// Bad address
    Fault = 14,
    /// Object busy
    Busy = 16,
    /// Object already exists
    Exist = 17,
    /// Invalid argument or invalid object state
    Inval = 22,
    /// Operation would deadlock
    Deadlk = 35,
    /// No message available
    NoMsg = 42,
    /// Function not implemented
    NoSys = 38,
    /// Value overflow
    Overflow = 75,
    /// Operation not supported
    NotSup = 95,
    /// Operation already in progress
    Already = 114,
    /// Operation now in progress
    InProgress = 115,
    /// Wait was cancelled
    Canceled = 125,
    /// Finite timeout elapsed
    TimedOut = 110,
    /// A non-blocking attempt found the object unavailable.
    ///
    /// Not a POSIX errno: the code 140 is private to this crate.
    WouldBlock = 140,
}

/// Result type alias for kernel-internal operations
pub type OsResult<T> = core::result::Result<T, OsError>;

impl OsError {
    /// The positive errno value of this error
    #[inline]
    pub const fn errno(self) -> i32 {
        self as i32
    }

    /// Classify an errno value. Negative values (kernel style `-EAGAIN`)
    /// are accepted; unknown codes map to [`OsError::Inval`].
    pub const fn from_errno(code: i32) -> Self {
        match code.wrapping_abs() {
            1 => OsError::Perm,
            2 => OsError::NoEnt,
            3 => OsError::Srch,
            4 => OsError::Intr,
            5 => OsError::Io,
            11 => OsError::Again,
            12 => OsError::NoMem,
            14 => OsError::Fault,
            16 => OsError::Busy,
            17 => OsError::Exist,
            35 => OsError::Deadlk,
            38 => OsError::NoSys,
            42 => OsError::NoMsg,
            75 => OsError::Overflow,
            95 => OsError::NotSup,
            110 => OsError::TimedOut,
            114 => OsError::Already,
            115 => OsError::InProgress,
            125 => OsError::Canceled,
            140 => OsError::WouldBlock,
            _ => OsError::Inval,
        }
    }

    /// Short description
    pub const fn as_str(self) -> &'static str {
        match self {
            OsError::Perm => "operation not permitted",
            OsError::NoEnt => "no such object",
            OsError::Srch => "no such thread",
            OsError::Intr => "interrupted",
            OsError::Io => "i/o error",
            OsError::Again => "try again",
            OsError::NoMem => "out of memory",
            OsError::Fault => "bad address",
            OsError::Busy => "busy",
            OsError::Exist => "already exists",
            OsError::Inval => "invalid argument",
            OsError::Deadlk => "would deadlock",
            OsError::NoMsg => "no message",
            OsError::NoSys => "not implemented",
            OsError::Overflow => "overflow",
            OsError::NotSup => "not supported",
            OsError::Already => "already in progress",
            OsError::InProgress => "in progress",
            OsError::Canceled => "cancelled",
            OsError::TimedOut => "timed out",
            OsError::WouldBlock => "would block",
        }
    }

    /// True for the two "not now" outcomes of a bounded wait
    #[inline]
    pub const fn is_timeout(self) -> bool {
        matches!(self, OsError::TimedOut | OsError::WouldBlock)
    }
}

impl Default for OsError {
    fn default() -> Self {
        OsError::Inval
    }
}

impl fmt::Display for OsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (errno {})", self.as_str(), self.errno())
    }
}

#[cfg(feature = "std")]
impl std::error::Error for OsError {}
