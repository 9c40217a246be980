//! DVFS collaborator interface.
//!
//! Level selection policy lives outside this subsystem; the standby machine
//! only pushes the core down to the S2 tier on light-sleep entry and
//! restores the previous tier on exit.

/// Core voltage/frequency tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DvfsLevel {
    /// Minimum tier, only valid while light-sleeping in S2.
    S2,
    /// Lowest run tier.
    Low,
    /// Default run tier.
    Normal,
    /// Performance tier (decode-heavy audio paths).
    High,
}

/// Dynamic voltage/frequency scaling provider.
///
/// Levels are refcounted per requester in the real implementation; `reason`
/// tags the request for its diagnostics.
pub trait Dvfs {
    /// Request `level`.
    fn set_level(&mut self, level: DvfsLevel, reason: &str);

    /// Withdraw a previous request for `level`.
    fn unset_level(&mut self, level: DvfsLevel, reason: &str);

    /// Currently effective tier.
    fn current_level(&self) -> DvfsLevel;
}

impl<D: Dvfs + ?Sized> Dvfs for &mut D {
    fn set_level(&mut self, level: DvfsLevel, reason: &str) {
        (**self).set_level(level, reason);
    }

    fn unset_level(&mut self, level: DvfsLevel, reason: &str) {
        (**self).unset_level(level, reason);
    }

    fn current_level(&self) -> DvfsLevel {
        (**self).current_level()
    }
}
