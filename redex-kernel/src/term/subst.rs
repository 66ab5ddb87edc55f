//! Eager substitution on hash-consed terms
//!
//! These operations rewrite terms immediately, and serve both for building terms and as the
//! reference semantics of the delayed substitutions used by the reduction machine.
use fxhash::FxBuildHasher;
use hashbrown::HashMap;

use super::*;
use crate::kernel::Error;
use crate::kernel::esubst::{Expand, Subs, Subst};

impl TermStore {
    /// Apply a substitution to a term
    ///
    /// # Example
    /// ```
    /// # use redex_kernel::term::*;
    /// # use redex_kernel::kernel::esubst::Subs;
    /// # let mut store = TermStore::default();
    /// let a = store.constant("a");
    /// let x1 = store.rel(1);
    /// let x2 = store.rel(2);
    /// let t = store.app(x1, [x2]);
    /// let s = Subs::shift(3).cons(a);
    /// let x4 = store.rel(4);
    /// assert_eq!(store.apply(t, &s), Ok(store.app(a, [x4])));
    /// ```
    pub fn apply(&mut self, tm: TermId, subs: &Subs<TermId>) -> Result<TermId, Error> {
        if subs.is_id() {
            return Ok(tm);
        }
        let mut cache = HashMap::default();
        self.apply_under(tm, 0, subs, subs.identity_prefix(), &mut cache)
    }

    fn apply_under(
        &mut self,
        tm: TermId,
        depth: u32,
        subs: &Subs<TermId>,
        fixed: u32,
        cache: &mut HashMap<(TermId, u32), TermId, FxBuildHasher>,
    ) -> Result<TermId, Error> {
        if self.bv(tm) <= depth.saturating_add(fixed) {
            return Ok(tm);
        }
        if let Some(&result) = cache.get(&(tm, depth)) {
            return Ok(result);
        }
        let result = match self.node(tm).clone() {
            GNode::Rel(k) if k <= depth => tm,
            GNode::Rel(k) => match subs.expand(k - depth)? {
                Expand::Value(n, v) => {
                    let n = depth
                        .checked_add(n)
                        .ok_or(Error::Anomaly("TermStore::apply (lift overflow)"))?;
                    self.lift(v, n)?
                }
                Expand::Rel(i) => {
                    let i = i
                        .checked_add(depth)
                        .ok_or(Error::Anomaly("TermStore::apply (index overflow)"))?;
                    self.rel(i)
                }
            },
            node => {
                let node = node.with_binders().map_err(|(b, x)| {
                    let depth = depth
                        .checked_add(b)
                        .ok_or(Error::Anomaly("TermStore::apply (binder overflow)"))?;
                    self.apply_under(x, depth, subs, fixed, cache)
                })?;
                self.add_flat(node)
            }
        };
        cache.insert((tm, depth), result);
        Ok(result)
    }

    /// Lift a term over `n` binders
    pub fn lift(&mut self, tm: TermId, n: u32) -> Result<TermId, Error> {
        self.lift_above(tm, 0, n)
    }

    /// Lift the variables of a term above index `k` over `n` binders
    ///
    /// # Example
    /// ```
    /// # use redex_kernel::term::*;
    /// # let mut store = TermStore::default();
    /// let x1 = store.rel(1);
    /// let x2 = store.rel(2);
    /// let t = store.app(x1, [x2]);
    /// let x4 = store.rel(4);
    /// assert_eq!(store.lift_above(t, 1, 2), Ok(store.app(x1, [x4])));
    /// ```
    pub fn lift_above(&mut self, tm: TermId, k: u32, n: u32) -> Result<TermId, Error> {
        if n == 0 || self.bv(tm) <= k {
            return Ok(tm);
        }
        self.apply(tm, &Subs::shift(n).lift(k))
    }

    /// Substitute `value` for index 1 in `body`, lowering the other variables by one
    ///
    /// # Example
    /// ```
    /// # use redex_kernel::term::*;
    /// # let mut store = TermStore::default();
    /// let a = store.constant("a");
    /// let x1 = store.rel(1);
    /// let x3 = store.rel(3);
    /// let t = store.app(x1, [x3]);
    /// let x2 = store.rel(2);
    /// assert_eq!(store.subst1(t, a), Ok(store.app(a, [x2])));
    /// ```
    pub fn subst1(&mut self, body: TermId, value: TermId) -> Result<TermId, Error> {
        self.apply(body, &Subs::id().cons(value))
    }
}

impl Subst<TermId> for TermStore {
    fn rel(&mut self, k: u32) -> Result<TermId, Error> {
        Ok(TermStore::rel(self, k))
    }

    fn shift(&mut self, value: &TermId, n: u32) -> Result<TermId, Error> {
        self.lift(*value, n)
    }

    fn apply(&mut self, value: &TermId, subs: &Subs<TermId>) -> Result<TermId, Error> {
        TermStore::apply(self, *value, subs)
    }
}
