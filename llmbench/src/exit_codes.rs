#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    Success = 0,

    /// The run completed but every measured request failed.
    AllRequestsFailed = 10,

    /// Invalid CLI/config/options (bad flags, unknown provider, unreadable workload file, etc.).
    InvalidInput = 30,

    /// Internal/runtime error (IO errors, task failures).
    RuntimeError = 40,
}

impl ExitCode {
    #[must_use]
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    #[must_use]
    pub fn from_outcome(total: u64, success: u64) -> Self {
        if total > 0 && success == 0 {
            Self::AllRequestsFailed
        } else {
            Self::Success
        }
    }
}
