use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use bitflags::bitflags;

use super::Error;
use super::oracle::Oracle;
use crate::term::Name;

bitflags! {
    /// The reduction rules the machine may fire
    #[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
    pub struct RedFlags: u8 {
        /// Substitute arguments into lambda abstractions
        const BETA = 0b0001;
        /// Unfold definitions of constants and local variables
        const DELTA = 0b0010;
        /// Reduce case analyses on constructors, and unfold guarded fixpoints
        const IOTA = 0b0100;
        /// Substitute let-bound values
        const ZETA = 0b1000;
        /// Every rule but delta
        const BETAIOTAZETA = Self::BETA.bits() | Self::IOTA.bits() | Self::ZETA.bits();
        /// Every rule
        const ALL = Self::BETAIOTAZETA.bits() | Self::DELTA.bits();
        /// No rule at all
        const NONE = 0;
    }
}

/// A flag polled by long-running kernel operations, which abort with [`Error::Interrupted`] once
/// it is raised
///
/// Clones share the same flag, so one can be handed to another thread.
#[derive(Debug, Clone, Default)]
pub struct Interrupt(Arc<AtomicBool>);

impl Interrupt {
    /// Create a new, lowered flag
    pub fn new() -> Self {
        Self::default()
    }

    /// Raise the flag
    pub fn raise(&self) {
        self.0.store(true, Ordering::Relaxed)
    }

    /// Lower the flag
    pub fn clear(&self) {
        self.0.store(false, Ordering::Relaxed)
    }

    /// Check whether the flag is raised
    pub fn is_raised(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    /// Fail with [`Error::Interrupted`] if the flag is raised
    pub fn check(&self) -> Result<(), Error> {
        if self.is_raised() {
            return Err(Error::Interrupted);
        }
        Ok(())
    }
}

/// An equivalence between inductive types, deciding when two names denote the same type
pub trait IndEquiv {
    fn eq_ind(&self, lhs: &Name, rhs: &Name) -> bool;
}

/// Inductive types are equivalent exactly when their names are equal
#[derive(Debug, Copy, Clone, Default)]
pub struct SyntacticIndEquiv;

impl IndEquiv for SyntacticIndEquiv {
    fn eq_ind(&self, lhs: &Name, rhs: &Name) -> bool {
        lhs == rhs
    }
}

impl<F: Fn(&Name, &Name) -> bool> IndEquiv for F {
    fn eq_ind(&self, lhs: &Name, rhs: &Name) -> bool {
        self(lhs, rhs)
    }
}

/// Limits on a single kernel call
#[derive(Debug, Copy, Clone, Default)]
pub struct Limits<'a> {
    /// A flag aborting the call when raised
    pub interrupt: Option<&'a Interrupt>,
    /// The maximum number of machine steps and head comparisons
    pub fuel: Option<u64>,
}

/// Options for a conversion problem
#[derive(Clone, Copy)]
pub struct ConvOptions<'a> {
    /// The rules used to bring terms to weak head normal form
    ///
    /// Delta-unfoldings are never performed by the machine during conversion: they are decided
    /// lazily by the oracle, and only if [`RedFlags::DELTA`] is set.
    pub flags: RedFlags,
    /// The unfolding heuristic
    pub oracle: &'a Oracle,
    /// The equivalence used to compare inductive types and constructors
    pub ind_equiv: &'a dyn IndEquiv,
    /// Whether the oracle breaks ties towards the left-hand side
    pub l2r: bool,
    /// Limits on the call
    pub limits: Limits<'a>,
}

impl<'a> ConvOptions<'a> {
    /// Default options using the given oracle
    pub fn new(oracle: &'a Oracle) -> Self {
        ConvOptions {
            flags: RedFlags::ALL,
            oracle,
            ind_equiv: &SyntacticIndEquiv,
            l2r: false,
            limits: Limits::default(),
        }
    }

    /// Set the reduction rules
    pub fn with_flags(self, flags: RedFlags) -> Self {
        ConvOptions { flags, ..self }
    }

    /// Set the inductive equivalence
    pub fn with_ind_equiv(self, ind_equiv: &'a dyn IndEquiv) -> Self {
        ConvOptions { ind_equiv, ..self }
    }

    /// Break oracle ties towards the left-hand side
    pub fn with_l2r(self, l2r: bool) -> Self {
        ConvOptions { l2r, ..self }
    }

    /// Abort when `interrupt` is raised
    pub fn with_interrupt(self, interrupt: &'a Interrupt) -> Self {
        ConvOptions {
            limits: Limits {
                interrupt: Some(interrupt),
                ..self.limits
            },
            ..self
        }
    }

    /// Abort after `fuel` steps
    pub fn with_fuel(self, fuel: u64) -> Self {
        ConvOptions {
            limits: Limits {
                fuel: Some(fuel),
                ..self.limits
            },
            ..self
        }
    }
}
