use std::rc::Rc;

use super::Error;

/// An explicit substitution
///
/// A substitution maps the de Bruijn index `k` of a term to either a value or another index. It
/// is never applied eagerly: the machine consults it with [`Subs::expand`] when it reaches a
/// variable, and [`Subs::compose`] combines two substitutions without touching any term.
///
/// Values of type `T` stored in a substitution live in the context the substitution was built
/// in; [`Expand::Value`] reports how many binders the value must be lifted over to be valid at the
/// point of use.
#[derive(Debug)]
pub struct Subs<T>(Rc<SubsNode<T>>);

impl<T> Clone for Subs<T> {
    fn clone(&self) -> Self {
        Subs(self.0.clone())
    }
}

#[derive(Debug)]
enum SubsNode<T> {
    Id,
    /// Index 1 is the value, index `k + 1` is index `k` of the tail
    Cons(T, Subs<T>),
    /// Every result of the tail is shifted by `n`
    Shift(u32, Subs<T>),
    /// Indices `1..=n` are left alone, index `k + n` is index `k` of the tail shifted by `n`
    Lift(u32, Subs<T>),
}

/// The result of looking up an index in a [`Subs`]
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum Expand<T> {
    /// A value, to be lifted over the given number of binders
    Value(u32, T),
    /// A variable
    Rel(u32),
}

/// Operations on the values stored in a substitution, needed to compose substitutions
pub trait Subst<T> {
    /// Build a value standing for the bound variable `k`
    fn rel(&mut self, k: u32) -> Result<T, Error>;

    /// Lift a value over `n` binders
    fn shift(&mut self, value: &T, n: u32) -> Result<T, Error>;

    /// Apply a substitution to a value
    fn apply(&mut self, value: &T, subs: &Subs<T>) -> Result<T, Error>;
}

impl<T> Default for Subs<T> {
    fn default() -> Self {
        Subs::id()
    }
}

impl<T> Subs<T> {
    /// The identity substitution
    pub fn id() -> Self {
        Subs(Rc::new(SubsNode::Id))
    }

    /// The substitution adding `n` to every index
    pub fn shift(n: u32) -> Self {
        Subs::id().shifted(n)
    }

    /// Get whether this is the identity substitution
    pub fn is_id(&self) -> bool {
        matches!(*self.0, SubsNode::Id)
    }

    /// Bind index 1 to `value`, shifting the indices of this substitution up by one
    pub fn cons(&self, value: T) -> Self {
        Subs(Rc::new(SubsNode::Cons(value, self.clone())))
    }

    /// Shift every result of this substitution by `n`
    pub fn shifted(&self, n: u32) -> Self {
        if n == 0 {
            return self.clone();
        }
        if let SubsNode::Shift(k, s) = &*self.0 {
            return Subs(Rc::new(SubsNode::Shift(k + n, s.clone())));
        }
        Subs(Rc::new(SubsNode::Shift(n, self.clone())))
    }

    /// Push this substitution under `n` binders
    pub fn lift(&self, n: u32) -> Self {
        if n == 0 || self.is_id() {
            return self.clone();
        }
        if let SubsNode::Lift(k, s) = &*self.0 {
            return Subs(Rc::new(SubsNode::Lift(k + n, s.clone())));
        }
        Subs(Rc::new(SubsNode::Lift(n, self.clone())))
    }

    /// Get the number of leading indices this substitution maps to themselves
    ///
    /// Terms whose bound variables all lie below this bound are unchanged by the substitution.
    pub fn identity_prefix(&self) -> u32 {
        match &*self.0 {
            SubsNode::Id => u32::MAX,
            SubsNode::Lift(n, s) => n.saturating_add(s.identity_prefix()),
            SubsNode::Cons(..) | SubsNode::Shift(..) => 0,
        }
    }
}

impl<T: Clone> Subs<T> {
    /// Look up the 1-based index `k`
    ///
    /// # Example
    /// ```
    /// # use redex_kernel::kernel::esubst::*;
    /// let s = Subs::shift(2).cons('a').lift(1);
    /// assert_eq!(s.expand(1), Ok(Expand::Rel(1)));
    /// assert_eq!(s.expand(2), Ok(Expand::Value(1, 'a')));
    /// assert_eq!(s.expand(3), Ok(Expand::Rel(4)));
    /// ```
    pub fn expand(&self, k: u32) -> Result<Expand<T>, Error> {
        if k == 0 {
            return Err(Error::Anomaly("Subs::expand (index 0)"));
        }
        let mut k = k;
        let mut shift = 0u32;
        let mut s = self;
        loop {
            match &*s.0 {
                SubsNode::Id => return Ok(Expand::Rel(add(k, shift)?)),
                SubsNode::Cons(v, rest) => {
                    if k == 1 {
                        return Ok(Expand::Value(shift, v.clone()));
                    }
                    k -= 1;
                    s = rest;
                }
                SubsNode::Shift(n, rest) => {
                    shift = add(shift, *n)?;
                    s = rest;
                }
                SubsNode::Lift(n, rest) => {
                    if k <= *n {
                        return Ok(Expand::Rel(add(k, shift)?));
                    }
                    k -= n;
                    shift = add(shift, *n)?;
                    s = rest;
                }
            }
        }
    }

    /// Drop the first `n` indices of this substitution, so that index `k` of the result is index
    /// `k + n` of this substitution
    fn skip(&self, n: u32) -> Subs<T> {
        if n == 0 {
            return self.clone();
        }
        match &*self.0 {
            SubsNode::Id => Subs::shift(n),
            SubsNode::Cons(_, rest) => rest.skip(n - 1),
            SubsNode::Shift(k, rest) => rest.skip(n).shifted(*k),
            SubsNode::Lift(m, rest) if n >= *m => rest.skip(n - m).shifted(*m),
            SubsNode::Lift(m, rest) => rest.lift(m - n).shifted(n),
        }
    }

    /// Compose two substitutions
    ///
    /// Applying `self.compose(other)` to a term is the same as applying `self` and then `other`.
    pub fn compose<C: Subst<T>>(&self, other: &Subs<T>, cx: &mut C) -> Result<Subs<T>, Error> {
        match &*self.0 {
            SubsNode::Id => Ok(other.clone()),
            SubsNode::Shift(n, rest) => rest.compose(&other.skip(*n), cx),
            SubsNode::Cons(v, rest) => {
                let v = cx.apply(v, other)?;
                Ok(rest.compose(other, cx)?.cons(v))
            }
            SubsNode::Lift(n, rest) => {
                let mut result = rest.compose(&other.skip(*n), cx)?;
                for k in (1..=*n).rev() {
                    let v = match other.expand(k)? {
                        Expand::Value(shift, v) => cx.shift(&v, shift)?,
                        Expand::Rel(i) => cx.rel(i)?,
                    };
                    result = result.cons(v);
                }
                Ok(result)
            }
        }
    }
}

fn add(x: u32, y: u32) -> Result<u32, Error> {
    x.checked_add(y)
        .ok_or(Error::Anomaly("Subs::expand (index overflow)"))
}

/// A lift: a renaming of the free variables of a term under comparison
///
/// Lifts record the binders crossed on one side of a conversion problem, so that bound
/// variables reached on both sides can be compared after relocation.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Lift(Rc<LiftNode>);

#[derive(Debug, Clone, Eq, PartialEq)]
enum LiftNode {
    Id,
    Shift(u32, Lift),
    Lift(u32, Lift),
}

impl Default for Lift {
    fn default() -> Self {
        Lift::id()
    }
}

impl Lift {
    /// The identity lift
    pub fn id() -> Self {
        Lift(Rc::new(LiftNode::Id))
    }

    /// Get whether this is the identity lift
    pub fn is_id(&self) -> bool {
        matches!(*self.0, LiftNode::Id)
    }

    /// Shift every variable by `n`
    pub fn shift(&self, n: u32) -> Self {
        match &*self.0 {
            _ if n == 0 => self.clone(),
            LiftNode::Shift(k, rest) => Lift(Rc::new(LiftNode::Shift(k + n, rest.clone()))),
            _ => Lift(Rc::new(LiftNode::Shift(n, self.clone()))),
        }
    }

    /// Go under `n` binders
    pub fn lift(&self, n: u32) -> Self {
        match &*self.0 {
            _ if n == 0 || self.is_id() => self.clone(),
            LiftNode::Lift(k, rest) => Lift(Rc::new(LiftNode::Lift(k + n, rest.clone()))),
            _ => Lift(Rc::new(LiftNode::Lift(n, self.clone()))),
        }
    }

    /// Relocate a 1-based index
    ///
    /// # Example
    /// ```
    /// # use redex_kernel::kernel::esubst::*;
    /// let l = Lift::id().shift(3).lift(1);
    /// assert_eq!(l.reloc(1), Ok(1));
    /// assert_eq!(l.reloc(2), Ok(5));
    /// ```
    pub fn reloc(&self, k: u32) -> Result<u32, Error> {
        let mut k = k;
        let mut base = 0u32;
        let mut l = self;
        loop {
            match &*l.0 {
                LiftNode::Id => return add(k, base),
                LiftNode::Shift(n, rest) => {
                    k = add(k, *n)?;
                    l = rest;
                }
                LiftNode::Lift(n, rest) => {
                    if k <= *n {
                        return add(k, base);
                    }
                    k -= n;
                    base = add(base, *n)?;
                    l = rest;
                }
            }
        }
    }
}
