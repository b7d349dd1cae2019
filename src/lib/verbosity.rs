//! Diagnostic verbosity flags.
//!
//! Each `-v` on the command line shifts the level left and sets the low bit, so one
//! flag yields `0b1`, two yield `0b11`, and so on. Individual bits gate individual
//! categories of diagnostics.

/// Bit-set of enabled diagnostic categories.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Verbosity(u32);

impl Verbosity {
    /// Reference renames and the rewritten header text.
    pub const HEADER: u32 = 1;
    /// Per-record trace of duplicate mate-slot observations.
    pub const DUPLICATES: u32 = 1 << 1;

    /// No diagnostics beyond the default log output.
    #[must_use]
    pub fn quiet() -> Self {
        Self(0)
    }

    /// Builds the level from the number of `-v` flags given.
    #[must_use]
    pub fn from_flag_count(count: u8) -> Self {
        let level = (0..count.min(31)).fold(0u32, |level, _| (level << 1) | 1);
        Self(level)
    }

    /// Builds the level from raw bits.
    #[must_use]
    pub fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    /// The raw level.
    #[must_use]
    pub fn bits(self) -> u32 {
        self.0
    }

    /// True if any of `flag`'s bits are set.
    #[must_use]
    pub fn enabled(self, flag: u32) -> bool {
        self.0 & flag != 0
    }

    #[must_use]
    pub fn header(self) -> bool {
        self.enabled(Self::HEADER)
    }

    #[must_use]
    pub fn duplicates(self) -> bool {
        self.enabled(Self::DUPLICATES)
    }
}
