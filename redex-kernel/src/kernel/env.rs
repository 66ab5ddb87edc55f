use fxhash::FxBuildHasher;
use indexmap::IndexMap;
use tracing::debug;

use super::Error;
use super::univ::{ConstraintSet, UGraph};
use crate::term::{Name, TermId};

/// A global constant
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct ConstantBody {
    /// The type of the constant
    pub ty: TermId,
    /// The definition of the constant, if any
    pub body: Option<TermId>,
    /// Whether the definition is hidden from conversion
    pub opaque: bool,
}

/// A constructor of an inductive type
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct ConstructorBody {
    pub name: Name,
    pub ty: TermId,
}

/// An inductive type
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct InductiveBody {
    /// The arity of the inductive type
    pub ty: TermId,
    /// The number of uniform parameters
    pub nparams: u32,
    /// The constructors, in order
    pub constructors: Vec<ConstructorBody>,
}

/// A declaration in the local context
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct LocalDecl {
    pub ty: TermId,
    /// The value of a local definition
    pub body: Option<TermId>,
}

/// A typing environment
///
/// All tables are append-only: a published declaration is never changed, and can only be removed
/// by restoring a [`EnvSnapshot`] taken before it was added.
#[derive(Debug, Clone, Default)]
pub struct Env {
    constants: IndexMap<Name, ConstantBody, FxBuildHasher>,
    inductives: IndexMap<Name, InductiveBody, FxBuildHasher>,
    locals: IndexMap<Name, LocalDecl, FxBuildHasher>,
    universes: UGraph,
}

/// The state of an [`Env`] at some point in time
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct EnvSnapshot {
    constants: usize,
    inductives: usize,
    locals: usize,
    universes: usize,
}

impl Env {
    fn check_fresh(&self, name: &Name) -> Result<(), Error> {
        if self.constants.contains_key(name)
            || self.inductives.contains_key(name)
            || self.locals.contains_key(name)
        {
            return Err(Error::AlreadyDeclared(name.clone()));
        }
        Ok(())
    }

    /// Declare a global constant
    pub fn add_constant(
        &mut self,
        name: Name,
        ty: TermId,
        body: Option<TermId>,
        opaque: bool,
    ) -> Result<(), Error> {
        self.check_fresh(&name)?;
        debug!(%name, defined = body.is_some(), opaque, "declaring constant");
        self.constants.insert(name, ConstantBody { ty, body, opaque });
        Ok(())
    }

    /// Declare a global constant without a definition
    pub fn add_axiom(&mut self, name: Name, ty: TermId) -> Result<(), Error> {
        self.add_constant(name, ty, None, false)
    }

    /// Declare an inductive type
    pub fn add_inductive(&mut self, name: Name, body: InductiveBody) -> Result<(), Error> {
        self.check_fresh(&name)?;
        debug!(%name, constructors = body.constructors.len(), "declaring inductive");
        self.inductives.insert(name, body);
        Ok(())
    }

    /// Push a declaration onto the local context
    pub fn push_local(&mut self, name: Name, ty: TermId, body: Option<TermId>) -> Result<(), Error> {
        self.check_fresh(&name)?;
        debug!(%name, defined = body.is_some(), "pushing local");
        self.locals.insert(name, LocalDecl { ty, body });
        Ok(())
    }

    /// Merge universe constraints into the global graph
    ///
    /// Fails, leaving the graph unchanged, if the constraints are inconsistent with it.
    pub fn add_constraints(&mut self, cs: &ConstraintSet) -> Result<(), Error> {
        self.universes.merge(cs)
    }

    /// Get a global constant
    pub fn constant(&self, name: &Name) -> Result<&ConstantBody, Error> {
        self.constants
            .get(name)
            .ok_or_else(|| Error::UnknownConstant(name.clone()))
    }

    /// Get the definition of a constant, if it is transparent
    pub fn constant_body(&self, name: &Name) -> Result<Option<TermId>, Error> {
        let c = self.constant(name)?;
        Ok(if c.opaque { None } else { c.body })
    }

    /// Get an inductive type
    pub fn inductive(&self, name: &Name) -> Result<&InductiveBody, Error> {
        self.inductives
            .get(name)
            .ok_or_else(|| Error::UnknownInductive(name.clone()))
    }

    /// Get a constructor of an inductive type
    pub fn constructor(&self, ind: &Name, ix: u32) -> Result<&ConstructorBody, Error> {
        self.inductive(ind)?
            .constructors
            .get(ix as usize)
            .ok_or_else(|| Error::UnknownInductive(ind.clone()))
    }

    /// Get a local declaration
    pub fn local(&self, name: &Name) -> Result<&LocalDecl, Error> {
        self.locals
            .get(name)
            .ok_or_else(|| Error::UnknownVariable(name.clone()))
    }

    /// Get the value of a local definition
    pub fn local_body(&self, name: &Name) -> Result<Option<TermId>, Error> {
        Ok(self.local(name)?.body)
    }

    /// Iterate over the local context, oldest declaration first
    pub fn locals(&self) -> impl Iterator<Item = (&Name, &LocalDecl)> + '_ {
        self.locals.iter()
    }

    /// Get the global universe graph
    pub fn universes(&self) -> &UGraph {
        &self.universes
    }

    /// Record the current state of this environment
    pub fn snapshot(&self) -> EnvSnapshot {
        EnvSnapshot {
            constants: self.constants.len(),
            inductives: self.inductives.len(),
            locals: self.locals.len(),
            universes: self.universes.snapshot(),
        }
    }

    /// Discard everything added since `snapshot` was taken
    pub fn restore(&mut self, snapshot: EnvSnapshot) {
        self.constants.truncate(snapshot.constants);
        self.inductives.truncate(snapshot.inductives);
        self.locals.truncate(snapshot.locals);
        self.universes.restore(snapshot.universes);
    }
}
