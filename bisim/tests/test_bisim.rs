#![allow(missing_docs)] // test only
use std::collections::BTreeMap;

use num::BigRational;
use pmctk_bisim::*;
use pmctk_ids::Id;
use pmctk_model::{state_set_from_iter, Model, ModelBuilder, ModelKind, StateId, StateSet};
use rand::{rngs::SmallRng, Rng, SeedableRng};

fn s(index: usize) -> StateId {
    StateId::from_id_index(index)
}

fn ratio(numer: i64, denom: i64) -> BigRational {
    BigRational::new(numer.into(), denom.into())
}

fn decompose<V: pmctk_model::Weight, C: Comparator<V>>(
    model: &Model<V>,
    options: &BisimulationOptions,
    comparator: C,
) -> Result<BisimulationDecomposition<V>, BisimError> {
    let backward = model.transitions().transpose();
    BisimulationDecomposition::new(model, &backward, options, comparator)
}

fn class_indices<V>(decomposition: &BisimulationDecomposition<V>) -> Vec<Vec<usize>> {
    let mut classes: Vec<Vec<usize>> = decomposition
        .classes()
        .into_iter()
        .map(|class| class.into_iter().map(|state| state.id_index()).collect())
        .collect();
    classes.sort_unstable();
    classes
}

#[test]
fn branching_into_equivalent_sinks() {
    pmctk_logger::setup_for_tests();

    let mut builder = ModelBuilder::<f64>::new(ModelKind::Dtmc, 4);
    builder
        .transition(s(0), s(1), 1.0)
        .transition(s(1), s(2), 0.5)
        .transition(s(1), s(3), 0.5)
        .transition(s(2), s(2), 1.0)
        .transition(s(3), s(3), 1.0)
        .label("done", s(2))
        .label("done", s(3))
        .initial(s(0));
    let model = builder.build().unwrap();

    let decomposition = decompose(
        &model,
        &BisimulationOptions::default(),
        EpsilonComparator::default(),
    )
    .unwrap();

    assert_eq!(class_indices(&decomposition), [vec![0], vec![1], vec![2, 3]]);
    decomposition.partition().check().unwrap();

    let quotient = decomposition.quotient().unwrap();
    assert_eq!(quotient.state_count(), 3);
    let middle = decomposition.class_of(s(1));
    let sink = decomposition.class_of(s(2));
    assert_eq!(quotient.transitions().row(s(middle)), &[(s(sink), 1.0)]);
    assert!(quotient.labeling().has_label("done", s(sink)));
    assert!(!quotient.labeling().has_label("done", s(middle)));
    assert_eq!(
        quotient.initial_states().ones().collect::<Vec<_>>(),
        [decomposition.class_of(s(0))]
    );
}

#[test]
fn measure_driven_partition_before_refinement() {
    let prob0 = state_set_from_iter(6, [s(4)]);
    let prob1 = state_set_from_iter(6, [s(5)]);
    let partition = Partition::<f64>::measure_driven(6, &prob0, &prob1, "psi", "other").unwrap();
    partition.check().unwrap();
    assert_eq!(partition.block_count(), 3);
}

fn near_equal_distributions<V: pmctk_model::Weight>(
    low: V,
    high: V,
    other_low: V,
    other_high: V,
) -> Model<V> {
    let mut builder = ModelBuilder::<V>::new(ModelKind::Dtmc, 4);
    builder
        .transition(s(0), s(2), low)
        .transition(s(0), s(3), high)
        .transition(s(1), s(2), other_low)
        .transition(s(1), s(3), other_high)
        .transition(s(2), s(2), V::one())
        .transition(s(3), s(3), V::one())
        .label("a", s(2))
        .label("b", s(3));
    builder.build().unwrap()
}

#[test]
fn comparator_decides_near_equal_distributions() {
    pmctk_logger::setup_for_tests();

    let model = near_equal_distributions(0.3, 0.7, 0.30000001, 0.69999999);
    let decomposition = decompose(
        &model,
        &BisimulationOptions::default(),
        EpsilonComparator::default(),
    )
    .unwrap();
    assert!(decomposition.are_equivalent(s(0), s(1)));
    assert_eq!(decomposition.class_count(), 3);

    let model = near_equal_distributions(
        ratio(3, 10),
        ratio(7, 10),
        ratio(30000001, 100000000),
        ratio(69999999, 100000000),
    );
    let decomposition =
        decompose(&model, &BisimulationOptions::default(), ExactComparator).unwrap();
    assert!(!decomposition.are_equivalent(s(0), s(1)));
    assert_eq!(decomposition.class_count(), 4);
}

#[test]
fn repeated_label_split_is_noop() {
    let mut partition = Partition::<f64>::new(5);
    let label = state_set_from_iter(5, [s(1), s(3)]);
    assert_eq!(partition.split_label(&label), 1);
    let before: Vec<Vec<StateId>> = partition
        .block_ids()
        .map(|block| partition.states_in_block(block).collect())
        .collect();
    assert_eq!(partition.split_label(&label), 0);
    let after: Vec<Vec<StateId>> = partition
        .block_ids()
        .map(|block| partition.states_in_block(block).collect())
        .collect();
    assert_eq!(before, after);
    partition.check().unwrap();
}

/// A random chain with a known bisimulation: states are assigned to planted classes and every
/// state distributes its class's distribution among random members of the target classes.
struct PlantedModel {
    model: Model<BigRational>,
    planted: Vec<usize>,
}

fn planted_model(rng: &mut SmallRng, classes: usize, states: usize) -> PlantedModel {
    let mut planted: Vec<usize> = (0..classes).collect();
    while planted.len() < states {
        planted.push(rng.gen_range(0..classes));
    }

    let members: Vec<Vec<usize>> = (0..classes)
        .map(|class| (0..states).filter(|&state| planted[state] == class).collect())
        .collect();

    let mut distributions: Vec<Vec<(usize, BigRational)>> = vec![];
    for _ in 0..classes {
        let successors = rng.gen_range(1..=3);
        let mut targets = vec![];
        let mut total = 0;
        for _ in 0..successors {
            let weight = rng.gen_range(1..=4);
            targets.push((rng.gen_range(0..classes), weight));
            total += weight;
        }
        distributions.push(
            targets
                .into_iter()
                .map(|(target, weight)| (target, ratio(weight, total)))
                .collect(),
        );
    }

    let mut builder = ModelBuilder::new(ModelKind::Dtmc, states);
    for state in 0..states {
        let class = planted[state];
        for (target_class, mass) in &distributions[class] {
            let candidates = &members[*target_class];
            let first = candidates[rng.gen_range(0..candidates.len())];
            let second = candidates[rng.gen_range(0..candidates.len())];
            let first_mass = mass.clone() * ratio(rng.gen_range(1..4), 4);
            let second_mass = mass.clone() - first_mass.clone();
            builder
                .transition(s(state), s(first), first_mass)
                .transition(s(state), s(second), second_mass);
        }
        if class % 2 == 1 {
            builder.label("odd", s(state));
        }
        if class == 0 {
            builder.label("goal", s(state));
        }
    }
    builder.initial(s(0));

    PlantedModel {
        model: builder.build().unwrap(),
        planted,
    }
}

fn signature(
    model: &Model<BigRational>,
    decomposition: &BisimulationDecomposition<BigRational>,
    state: StateId,
) -> BTreeMap<usize, BigRational> {
    let mut signature: BTreeMap<usize, BigRational> = BTreeMap::new();
    for (target, weight) in model.transitions().row(state) {
        *signature
            .entry(decomposition.class_of(*target))
            .or_insert_with(|| ratio(0, 1)) += weight;
    }
    signature
}

#[test]
fn random_models_are_stable_and_coarsest() {
    pmctk_logger::setup_for_tests();
    let mut rng = SmallRng::seed_from_u64(7);

    for _ in 0..40 {
        let classes = rng.gen_range(1..6);
        let states = rng.gen_range(classes..30);
        let PlantedModel { model, planted } = planted_model(&mut rng, classes, states);

        let decomposition =
            decompose(&model, &BisimulationOptions::default(), ExactComparator).unwrap();
        decomposition.partition().check().unwrap();

        // soundness: equal labels and equal mass into every class
        for class in decomposition.classes() {
            let first = class[0];
            let labels: Vec<&str> = model.labeling().labels_of_state(first).collect();
            let first_signature = signature(&model, &decomposition, first);
            for &state in &class[1..] {
                assert_eq!(
                    model.labeling().labels_of_state(state).collect::<Vec<_>>(),
                    labels
                );
                assert_eq!(signature(&model, &decomposition, state), first_signature);
            }
        }

        // coarsest: the planted bisimulation is never split
        for state in 0..states {
            let class_member = planted.iter().position(|&class| class == planted[state]);
            let class_member = class_member.unwrap();
            assert!(decomposition.are_equivalent(s(state), s(class_member)));
        }
        assert!(decomposition.class_count() <= classes);
    }
}

#[test]
fn quotient_conserves_mass() {
    let mut rng = SmallRng::seed_from_u64(11);

    for _ in 0..20 {
        let classes = rng.gen_range(2..6);
        let states = rng.gen_range(classes..25);
        let PlantedModel { model, .. } = planted_model(&mut rng, classes, states);

        let decomposition =
            decompose(&model, &BisimulationOptions::default(), ExactComparator).unwrap();
        let quotient = decomposition.quotient().unwrap();
        assert_eq!(quotient.state_count(), decomposition.class_count());

        for (index, class) in decomposition.classes().into_iter().enumerate() {
            let expected = signature(&model, &decomposition, class[0]);
            let row: BTreeMap<usize, BigRational> = quotient
                .transitions()
                .row(s(index))
                .iter()
                .map(|(target, weight)| (target.id_index(), weight.clone()))
                .collect();
            assert_eq!(row, expected);

            let total = row.values().fold(ratio(0, 1), |sum, weight| sum + weight);
            assert_eq!(total, ratio(1, 1));

            for (name, _) in model.labeling().iter() {
                assert_eq!(
                    quotient.labeling().has_label(name, s(index)),
                    model.labeling().has_label(name, class[0])
                );
            }
        }
    }
}

#[test]
fn result_is_independent_of_order() {
    let mut rng = SmallRng::seed_from_u64(3);

    for _ in 0..20 {
        let classes = rng.gen_range(1..6);
        let states = rng.gen_range(classes..30);
        let PlantedModel { model, .. } = planted_model(&mut rng, classes, states);
        let backward = model.transitions().transpose();

        let fifo = decompose(&model, &BisimulationOptions::default(), ExactComparator).unwrap();
        let lifo = decompose(
            &model,
            &BisimulationOptions {
                worklist_order: WorklistOrder::Lifo,
                ..Default::default()
            },
            ExactComparator,
        )
        .unwrap();
        assert_eq!(class_indices(&fifo), class_indices(&lifo));

        // labels in reverse order produce a different initial block order
        let labels: Vec<&StateSet> = model.labeling().iter().map(|(_, states)| states).collect();
        let reversed =
            Partition::respecting_labels(model.state_count(), labels.into_iter().rev()).unwrap();
        let from_reversed = BisimulationDecomposition::refine(
            reversed,
            &model,
            &backward,
            ExactComparator,
            &BisimulationOptions::default(),
        )
        .unwrap();
        assert_eq!(class_indices(&fifo), class_indices(&from_reversed));
    }
}

#[test]
fn refining_a_stable_partition_is_idempotent() {
    let mut rng = SmallRng::seed_from_u64(5);
    let PlantedModel { model, .. } = planted_model(&mut rng, 4, 20);
    let backward = model.transitions().transpose();
    let options = BisimulationOptions::default();

    let first =
        BisimulationDecomposition::new(&model, &backward, &options, ExactComparator).unwrap();
    let classes = class_indices(&first);

    let second = BisimulationDecomposition::refine(
        first.into_partition(),
        &model,
        &backward,
        ExactComparator,
        &options,
    )
    .unwrap();
    assert_eq!(second.stats().splits, 0);
    assert_eq!(class_indices(&second), classes);
}

fn two_step_chain() -> Model<f64> {
    let mut builder = ModelBuilder::<f64>::new(ModelKind::Dtmc, 4);
    builder
        .transition(s(0), s(1), 1.0)
        .transition(s(1), s(2), 1.0)
        .transition(s(2), s(2), 1.0)
        .transition(s(3), s(3), 1.0)
        .label("psi", s(2))
        .initial(s(0));
    builder.build().unwrap()
}

#[test]
fn measure_driven_unbounded_and_bounded() {
    pmctk_logger::setup_for_tests();
    let model = two_step_chain();
    let prob0 = state_set_from_iter(4, [s(3)]);
    let prob1 = state_set_from_iter(4, [s(0), s(1), s(2)]);
    let psi = state_set_from_iter(4, [s(2)]);

    let unbounded = BisimulationOptions::measure_driven(MeasureDrivenOptions::new(
        prob0.clone(),
        prob1.clone(),
    ));
    let decomposition = decompose(&model, &unbounded, EpsilonComparator::default()).unwrap();
    assert_eq!(class_indices(&decomposition), [vec![0, 1, 2], vec![3]]);

    let quotient = decomposition.quotient().unwrap();
    let goal = s(decomposition.class_of(s(0)));
    let sink = s(decomposition.class_of(s(3)));
    assert!(quotient.labeling().has_label("psi", goal));
    assert!(quotient.labeling().has_label("other", sink));
    assert_eq!(quotient.transitions().row(goal), &[(goal, 1.0)]);

    let bounded = BisimulationOptions::measure_driven(
        MeasureDrivenOptions::new(prob0.clone(), prob1.clone()).bounded(psi),
    );
    let decomposition = decompose(&model, &bounded, EpsilonComparator::default()).unwrap();
    assert_eq!(
        class_indices(&decomposition),
        [vec![0], vec![1], vec![2], vec![3]]
    );
    let quotient = decomposition.quotient().unwrap();
    assert!(quotient
        .labeling()
        .has_label("phi", s(decomposition.class_of(s(0)))));
    assert!(quotient
        .labeling()
        .has_label("psi", s(decomposition.class_of(s(2)))));

    let missing_psi = BisimulationOptions::measure_driven(MeasureDrivenOptions {
        bounded: true,
        ..MeasureDrivenOptions::new(prob0, prob1)
    });
    assert_eq!(
        decompose(&model, &missing_psi, EpsilonComparator::default()).err(),
        Some(BisimError::MissingPsiStates)
    );
}

#[test]
fn precondition_errors() {
    let model = two_step_chain();

    let overlapping = BisimulationOptions::measure_driven(MeasureDrivenOptions::new(
        state_set_from_iter(4, [s(2)]),
        state_set_from_iter(4, [s(2)]),
    ));
    assert_eq!(
        decompose(&model, &overlapping, EpsilonComparator::default()).err(),
        Some(BisimError::OverlappingMeasureSets)
    );

    let short = BisimulationOptions::measure_driven(MeasureDrivenOptions::new(
        StateSet::with_capacity(3),
        state_set_from_iter(4, [s(2)]),
    ));
    assert_eq!(
        decompose(&model, &short, EpsilonComparator::default()).err(),
        Some(BisimError::StateSetSizeMismatch {
            what: "prob0 states",
            len: 3,
            states: 4
        })
    );

    let unknown = BisimulationOptions {
        respected_labels: Some(vec!["missing".into()]),
        ..Default::default()
    };
    assert_eq!(
        decompose(&model, &unknown, EpsilonComparator::default()).err(),
        Some(BisimError::UnknownLabel("missing".into()))
    );

    let backward = model.transitions().transpose();
    assert_eq!(
        BisimulationDecomposition::refine(
            Partition::new(3),
            &model,
            &backward,
            EpsilonComparator::default(),
            &BisimulationOptions::default(),
        )
        .err(),
        Some(BisimError::PartitionSizeMismatch {
            partition: 3,
            states: 4
        })
    );
}

#[test]
fn respected_labels_limit_initial_split() {
    let mut builder = ModelBuilder::<f64>::new(ModelKind::Dtmc, 2);
    builder
        .transition(s(0), s(0), 1.0)
        .transition(s(1), s(1), 1.0)
        .label("a", s(0))
        .label("b", s(1))
        .label("both", s(0))
        .label("both", s(1));
    let model = builder.build().unwrap();

    let all = decompose(&model, &Default::default(), EpsilonComparator::default()).unwrap();
    assert_eq!(all.class_count(), 2);

    let options = BisimulationOptions {
        respected_labels: Some(vec!["both".into()]),
        ..Default::default()
    };
    let respected = decompose(&model, &options, EpsilonComparator::default()).unwrap();
    assert_eq!(respected.class_count(), 1);
    let quotient = respected.quotient().unwrap();
    assert_eq!(quotient.labeling().label_names().collect::<Vec<_>>(), ["both"]);
    assert!(quotient.labeling().has_label("both", s(0)));
}

#[test]
fn ctmc_exit_rates_are_respected() {
    pmctk_logger::setup_for_tests();

    let mut builder = ModelBuilder::<f64>::new(ModelKind::Ctmc, 4);
    builder
        .transition(s(0), s(3), 1.0)
        .transition(s(1), s(3), 1.0)
        .transition(s(2), s(3), 1.0)
        .transition(s(3), s(3), 1.0)
        .exit_rates(vec![2.0, 2.0, 5.0, 1.0]);
    let model = builder.build().unwrap();

    let decomposition = decompose(
        &model,
        &BisimulationOptions::default(),
        EpsilonComparator::default(),
    )
    .unwrap();
    assert!(decomposition.are_equivalent(s(0), s(1)));
    assert!(!decomposition.are_equivalent(s(0), s(2)));

    let quotient = decomposition.quotient().unwrap();
    let rates = quotient.exit_rates().unwrap();
    assert_eq!(rates[decomposition.class_of(s(0))], 2.0);
    assert_eq!(rates[decomposition.class_of(s(2))], 5.0);
}

#[test]
fn rewards_are_kept_on_request() {
    let mut builder = ModelBuilder::<f64>::new(ModelKind::Dtmc, 3);
    builder
        .transition(s(0), s(2), 1.0)
        .transition(s(1), s(2), 1.0)
        .transition(s(2), s(2), 1.0)
        .label("end", s(2))
        .reward_model("cost", vec![1.0, 3.0, 0.0]);
    let model = builder.build().unwrap();

    let ignored = decompose(
        &model,
        &BisimulationOptions::default(),
        EpsilonComparator::default(),
    )
    .unwrap();
    assert!(ignored.are_equivalent(s(0), s(1)));
    assert!(ignored.quotient().unwrap().reward_models().is_empty());

    let options = BisimulationOptions {
        keep_rewards: true,
        ..Default::default()
    };
    let kept = decompose(&model, &options, EpsilonComparator::default()).unwrap();
    assert!(!kept.are_equivalent(s(0), s(1)));
    let quotient = kept.quotient().unwrap();
    let costs = &quotient.reward_models()["cost"];
    assert_eq!(costs[kept.class_of(s(1))], 3.0);
    assert_eq!(costs[kept.class_of(s(2))], 0.0);
}

#[test]
fn quotient_is_optional() {
    let model = two_step_chain();
    let options = BisimulationOptions {
        build_quotient: false,
        initial: InitialPartitionKind::Uniform,
        ..Default::default()
    };
    let decomposition = decompose(&model, &options, EpsilonComparator::default()).unwrap();
    assert!(decomposition.quotient().is_none());
    // without labels every state loops forever with probability one
    assert_eq!(decomposition.class_count(), 1);
}
