//! Incremental leg turnover against a full walk of the tree.

use canopy_engine::{EngineConfig, Network};
use canopy_payout::{MatchingConfig, Money, SponsorBonus};
use canopy_topology::{NodeId, Role, Side};
use proptest::prelude::*;

#[derive(Debug, Clone)]
enum Op {
    Customer { sponsor: Option<usize> },
    BrandOwner,
    Purchase { buyer: usize, minor: u64 },
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        4 => prop::option::of(0usize..1000).prop_map(|sponsor| Op::Customer { sponsor }),
        1 => Just(Op::BrandOwner),
        5 => (0usize..1000, 1u64..5_000_000).prop_map(|(buyer, minor)| Op::Purchase { buyer, minor }),
    ]
}

fn paying_network() -> Network {
    Network::in_memory(EngineConfig {
        matching: MatchingConfig {
            threshold: Money::from_major(100),
            rate_bps: 1_000,
        },
        sponsor_bonus: SponsorBonus { rate_bps: 500 },
        ..EngineConfig::default()
    })
    .unwrap()
}

fn assert_walks_agree(network: &Network, ids: &[NodeId]) -> Result<(), TestCaseError> {
    for id in ids {
        for side in Side::BOTH {
            prop_assert_eq!(
                network.leg_turnover(id, side).unwrap(),
                network.leg_turnover_full_walk(id, side).unwrap(),
                "{} leg {}",
                id,
                side
            );
        }
    }
    Ok(())
}

#[test]
fn purchase_reaches_every_ancestor_once() {
    let network = paying_network();
    let founder = NodeId::new(Role::Founder, 1);
    let a = network.register_customer("A", "a@example.com", None).unwrap().id;
    let b = network.register_customer("B", "b@example.com", Some(&a)).unwrap().id;
    let c = network.register_customer("C", "c@example.com", Some(&b)).unwrap().id;

    let receipt = network.record_purchase(&c, Money::from_major(2_000)).unwrap();
    assert_eq!(receipt.ancestors, 3);

    assert_eq!(network.leg_turnover(&b, Side::Left).unwrap(), Money::from_major(2_000));
    assert_eq!(network.leg_turnover(&a, Side::Left).unwrap(), Money::from_major(2_000));
    assert_eq!(network.leg_turnover(&founder, Side::Left).unwrap(), Money::from_major(2_000));
    assert_eq!(network.leg_turnover(&founder, Side::Right).unwrap(), Money::ZERO);
    assert_eq!(network.by_id(&c).unwrap().account.purchase_value, Money::from_major(2_000));
}

#[test]
fn zero_purchase_changes_nothing() {
    let network = paying_network();
    let a = network.register_customer("A", "a@example.com", None).unwrap().id;
    assert!(network.record_purchase(&a, Money::ZERO).is_err());
    assert_eq!(network.by_id(&a).unwrap().account.purchase_value, Money::ZERO);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn incremental_turnover_matches_full_walk(ops in prop::collection::vec(op(), 1..60)) {
        let network = paying_network();
        let mut ids = vec![NodeId::new(Role::Founder, 1)];
        let mut contacts = 0u32;

        for op in ops {
            match op {
                Op::Customer { sponsor } => {
                    contacts += 1;
                    let sponsor = sponsor.map(|pick| ids[pick % ids.len()].clone());
                    let placed = network
                        .register_customer("C", &format!("c{contacts}@example.com"), sponsor.as_ref())
                        .unwrap();
                    ids.push(placed.id);
                }
                Op::BrandOwner => {
                    contacts += 1;
                    if let Ok(placed) =
                        network.register_brand_owner("B", &format!("b{contacts}@example.com"))
                    {
                        ids.push(placed.id);
                    }
                }
                Op::Purchase { buyer, minor } => {
                    let buyer = ids[buyer % ids.len()].clone();
                    network.record_purchase(&buyer, Money::from_minor(minor)).unwrap();
                }
            }
            assert_walks_agree(&network, &ids)?;
        }
    }
}
