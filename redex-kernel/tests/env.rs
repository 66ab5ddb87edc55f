mod common;

use common::Fixture;
use redex_kernel::kernel::*;
use redex_kernel::term::*;

#[test]
fn declarations_are_unique() {
    let mut fx = Fixture::new();
    let nat = fx.nat;
    assert_eq!(
        fx.ker.add_axiom("k", nat),
        Err(Error::AlreadyDeclared("k".into()))
    );
    assert_eq!(
        fx.ker.push_local("Nat", nat, None),
        Err(Error::AlreadyDeclared("Nat".into()))
    );
    let body = InductiveBody {
        ty: fx.set,
        nparams: 0,
        constructors: vec![],
    };
    assert_eq!(
        fx.ker.add_inductive("id", body),
        Err(Error::AlreadyDeclared("id".into()))
    );
}

#[test]
fn lookups() {
    let fx = Fixture::new();
    let env = fx.ker.env();
    let nat = env.inductive(&"Nat".into()).unwrap();
    assert_eq!(nat.constructors.len(), 2);
    assert_eq!(env.constructor(&"Nat".into(), 1).unwrap().name, "S");
    assert_eq!(
        env.constructor(&"Nat".into(), 2),
        Err(Error::UnknownInductive("Nat".into()))
    );
    assert_eq!(
        env.inductive(&"Bool".into()),
        Err(Error::UnknownInductive("Bool".into()))
    );
    let k = env.constant(&"k".into()).unwrap();
    assert_eq!(k.body, None);
    assert!(!k.opaque);
    assert_eq!(env.constant_body(&"k".into()), Ok(None));
    assert!(env.constant_body(&"id".into()).unwrap().is_some());
}

#[test]
fn snapshots_discard_later_declarations() {
    let mut fx = Fixture::new();
    let nat = fx.nat;
    let before = fx.ker.snapshot();
    let k = fx.ker.constant("k");
    fx.ker.add_constant("alias", nat, Some(k), false).unwrap();
    fx.ker.push_local("x", nat, Some(k)).unwrap();
    let lt: ConstraintSet = [Constraint::Lt(Universe(0), Universe(1))].into_iter().collect();
    fx.ker.add_constraints(&lt).unwrap();

    let alias = fx.ker.constant("alias");
    assert_eq!(fx.ker.whnf(RedFlags::ALL, alias), Ok(k));
    assert_eq!(fx.ker.env().locals().count(), 1);
    assert_eq!(fx.ker.env().universes().len(), 1);

    fx.ker.restore(before);
    assert_eq!(
        fx.ker.whnf(RedFlags::ALL, alias),
        Err(Error::UnknownConstant("alias".into()))
    );
    assert_eq!(fx.ker.env().locals().count(), 0);
    assert!(fx.ker.env().universes().is_empty());
    // Names can be reused after restoring
    fx.ker.add_axiom("alias", nat).unwrap();
    assert_eq!(fx.ker.whnf(RedFlags::ALL, alias), Ok(alias));
}

#[test]
fn universe_graph_rejects_strict_cycles() {
    let (u, v, w) = (Universe(0), Universe(1), Universe(2));
    let mut graph = UGraph::default();
    let chain: ConstraintSet = [Constraint::Le(u, v), Constraint::Le(v, w)].into_iter().collect();
    graph.merge(&chain).unwrap();
    assert!(graph.is_consistent());

    // A cycle of non-strict edges only forces equality
    let back: ConstraintSet = [Constraint::Eq(w, u)].into_iter().collect();
    assert!(graph.check(&back));
    graph.merge(&back).unwrap();

    let strict: ConstraintSet = [Constraint::Lt(u, w)].into_iter().collect();
    assert!(!graph.check(&strict));
    assert_eq!(graph.merge(&strict), Err(Error::InconsistentConstraints));
    assert_eq!(graph.len(), 3);
    assert!(graph.is_consistent());

    let self_loop: ConstraintSet = [Constraint::Lt(v, v)].into_iter().collect();
    assert_eq!(graph.merge(&self_loop), Err(Error::InconsistentConstraints));
}

#[test]
fn conversion_constraints_feed_the_graph() {
    let mut ker = Kernel::default();
    let (t1, t2) = (ker.type_(1), ker.type_(2));
    let lt: ConstraintSet = [Constraint::Lt(Universe(2), Universe(1))].into_iter().collect();
    ker.add_constraints(&lt).unwrap();
    let cs = ker.convert(ConvPb::LessOrEqual, t1, t2).unwrap();
    assert_eq!(ker.add_constraints(&cs), Err(Error::InconsistentConstraints));
    let cs = ker.convert(ConvPb::LessOrEqual, t2, t1).unwrap();
    assert!(ker.add_constraints(&cs).is_ok());
}

#[test]
fn constraint_sets_mirror_equalities() {
    let (u, v) = (Universe(3), Universe(4));
    let cs: ConstraintSet = [Constraint::Eq(u, v), Constraint::Le(u, v), Constraint::Eq(u, u)]
        .into_iter()
        .collect();
    assert_eq!(cs.len(), 2);
    let mirrored = cs.mirror();
    assert!(mirrored.contains(&Constraint::Eq(v, u)));
    assert!(mirrored.contains(&Constraint::Le(u, v)));
    assert_eq!(mirrored.mirror(), cs);
    assert_eq!(
        compare_sorts(ConvPb::Equal, Sort::Type(u), Sort::Type(v)).map(|cs| cs.mirror()),
        compare_sorts(ConvPb::Equal, Sort::Type(v), Sort::Type(u))
    );
}

#[test]
fn oracle_order() {
    let mut oracle = Oracle::default();
    let c = |name: &str| TableKey::Const(name.into());
    let (a, b, x) = (c("a"), c("b"), TableKey::Var("x".into()));
    assert_eq!(oracle.strategy(&a), Level::Level(0));
    assert_eq!(oracle.strategy(&x), Level::Expand);
    // Local variables unfold before constants
    assert!(oracle.order(false, &x, &a));
    assert!(!oracle.order(true, &a, &x));

    oracle.set_strategy("a".into(), Level::Level(2));
    oracle.set_strategy("b".into(), Level::Level(-1));
    assert!(!oracle.order(true, &a, &b));
    assert!(oracle.order(false, &b, &a));

    oracle.set_strategy("a".into(), Level::Opaque);
    oracle.set_strategy("b".into(), Level::Opaque);
    assert!(oracle.order(true, &a, &b));
    assert!(!oracle.order(false, &a, &b));

    oracle.set_var_strategy("x".into(), Level::Opaque);
    oracle.set_strategy("a".into(), Level::Expand);
    assert!(oracle.order(false, &a, &x));
    assert!(!oracle.order(false, &a, &a));
    assert!(!oracle.order(false, &x, &x));
}
