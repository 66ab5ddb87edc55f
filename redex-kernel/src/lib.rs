pub mod kernel;
pub mod term;

pub use kernel::*;
use term::{CaseInfo, FixInfo, Name, TermId};

/// # Term construction
///
/// Shorthands for inserting common nodes into a kernel's term store
impl Kernel {
    /// Insert the sort of propositions
    pub fn prop(&mut self) -> TermId {
        self.store_mut().prop()
    }

    /// Insert the predicative sort at universe `u`
    pub fn type_(&mut self, u: u32) -> TermId {
        self.store_mut().type_(u)
    }

    /// Insert a bound variable
    pub fn rel(&mut self, k: u32) -> TermId {
        self.store_mut().rel(k)
    }

    /// Insert a named local variable
    pub fn var(&mut self, name: impl Into<Name>) -> TermId {
        self.store_mut().var(name)
    }

    /// Insert a global constant
    pub fn constant(&mut self, name: impl Into<Name>) -> TermId {
        self.store_mut().constant(name)
    }

    /// Insert an inductive type
    pub fn ind(&mut self, name: impl Into<Name>) -> TermId {
        self.store_mut().ind(name)
    }

    /// Insert a constructor
    pub fn construct(&mut self, ind: impl Into<Name>, ix: u32) -> TermId {
        self.store_mut().construct(ind, ix)
    }

    /// Insert an application
    pub fn app(&mut self, func: TermId, args: impl IntoIterator<Item = TermId>) -> TermId {
        self.store_mut().app(func, args)
    }

    /// Insert a lambda abstraction
    pub fn lambda(&mut self, ty: TermId, body: TermId) -> TermId {
        self.store_mut().lambda(ty, body)
    }

    /// Insert a dependent function type
    pub fn prod(&mut self, dom: TermId, codom: TermId) -> TermId {
        self.store_mut().prod(dom, codom)
    }

    /// Insert a let-binding
    pub fn let_in(&mut self, value: TermId, ty: TermId, body: TermId) -> TermId {
        self.store_mut().let_in(value, ty, body)
    }

    /// Insert a case analysis
    pub fn case(
        &mut self,
        info: CaseInfo,
        motive: TermId,
        scrutinee: TermId,
        branches: impl IntoIterator<Item = TermId>,
    ) -> TermId {
        self.store_mut().case(info, motive, scrutinee, branches)
    }

    /// Insert a fixpoint block
    pub fn fix(
        &mut self,
        info: FixInfo,
        tys: impl IntoIterator<Item = TermId>,
        bodies: impl IntoIterator<Item = TermId>,
    ) -> TermId {
        self.store_mut().fix(info, tys, bodies)
    }

    /// Insert a cofixpoint block
    pub fn cofix(
        &mut self,
        index: u32,
        tys: impl IntoIterator<Item = TermId>,
        bodies: impl IntoIterator<Item = TermId>,
    ) -> TermId {
        self.store_mut().cofix(index, tys, bodies)
    }
}
