use fxhash::FxBuildHasher;
use hashbrown::HashMap;

use super::closure::TableKey;
use crate::term::Name;

/// The unfolding strategy of a reference
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum Level {
    /// Unfold eagerly, before any other reference
    Expand,
    /// Unfold in increasing level order
    Level(i32),
    /// Unfold only as a last resort
    Opaque,
}

impl Default for Level {
    fn default() -> Self {
        Level::Level(0)
    }
}

/// A heuristic deciding which of two references to unfold first during conversion
///
/// The oracle never affects whether two terms are convertible, only how quickly this is found out.
#[derive(Debug, Clone)]
pub struct Oracle {
    consts: HashMap<Name, Level, FxBuildHasher>,
    vars: HashMap<Name, Level, FxBuildHasher>,
    var_default: Level,
}

impl Default for Oracle {
    fn default() -> Self {
        Oracle {
            consts: HashMap::default(),
            vars: HashMap::default(),
            var_default: Level::Expand,
        }
    }
}

impl Oracle {
    /// Get the strategy for a reference
    pub fn strategy(&self, key: &TableKey) -> Level {
        match key {
            TableKey::Const(c) => self.consts.get(c).copied().unwrap_or_default(),
            TableKey::Var(x) => self.vars.get(x).copied().unwrap_or(self.var_default),
        }
    }

    /// Set the strategy for a global constant
    pub fn set_strategy(&mut self, name: Name, level: Level) {
        if level == Level::default() {
            self.consts.remove(&name);
        } else {
            self.consts.insert(name, level);
        }
    }

    /// Set the strategy for a local variable
    pub fn set_var_strategy(&mut self, name: Name, level: Level) {
        self.vars.insert(name, level);
    }

    /// Decide whether to unfold `lhs` before `rhs`
    ///
    /// Ties are broken towards the left if `l2r` is set, and towards the right otherwise.
    ///
    /// # Examples
    /// ```
    /// # use redex_kernel::kernel::*;
    /// let mut oracle = Oracle::default();
    /// let (f, g) = (TableKey::Const("f".into()), TableKey::Const("g".into()));
    /// assert!(!oracle.order(false, &f, &g));
    /// assert!(oracle.order(true, &f, &g));
    /// oracle.set_strategy("g".into(), Level::Level(5));
    /// assert!(oracle.order(false, &f, &g));
    /// oracle.set_strategy("f".into(), Level::Opaque);
    /// assert!(!oracle.order(true, &f, &g));
    /// ```
    pub fn order(&self, l2r: bool, lhs: &TableKey, rhs: &TableKey) -> bool {
        match (self.strategy(lhs), self.strategy(rhs)) {
            (Level::Expand, Level::Expand) => l2r,
            (Level::Expand, _) => true,
            (_, Level::Expand) => false,
            (Level::Opaque, Level::Opaque) => l2r,
            (_, Level::Opaque) => true,
            (Level::Opaque, _) => false,
            (Level::Level(n1), Level::Level(n2)) if n1 == n2 => l2r,
            (Level::Level(n1), Level::Level(n2)) => n1 < n2,
        }
    }
}
