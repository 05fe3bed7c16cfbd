use hammr_core::runner::Assessment;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    Success = 0,

    /// The run finished but missed at least one required threshold.
    CriteriaFailed = 10,

    /// Login/setup against the target API failed; no load was generated.
    SetupFailed = 20,

    /// Invalid CLI/config input (bad flags, invalid durations, zero VUs, etc.).
    InvalidInput = 30,

    /// Internal/runtime error (IO errors, worker panics, unexpected invariants).
    RuntimeError = 40,
}

impl ExitCode {
    #[must_use]
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    #[must_use]
    pub fn from_assessment(assessment: &Assessment) -> Self {
        if assessment.passed {
            Self::Success
        } else {
            Self::CriteriaFailed
        }
    }
}
