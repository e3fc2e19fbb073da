#![allow(missing_docs)]

mod qualitative;

use clap::{Parser, ValueEnum};
use pmctk_bisim::{
    BisimulationDecomposition, BisimulationOptions, EpsilonComparator, InitialPartitionKind,
    MeasureDrivenOptions, WorklistOrder,
};
use pmctk_ids::Id;
use pmctk_model::{Model, ModelBuilder, ModelKind, StateId, StateSet};
use rand::{rngs::SmallRng, Rng, SeedableRng};
use serde_json::json;

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Family {
    /// A ring where every state stays or advances with equal probability.
    Ring,
    /// A random chain built around a planted bisimulation.
    Random,
}

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    #[clap(value_enum, default_value = "ring")]
    family: Family,
    #[clap(short = 'n', long, default_value = "1000")]
    states: usize,
    /// Label period of the ring, number of planted classes of random chains.
    #[clap(short = 'p', long, default_value = "10")]
    period: usize,
    #[clap(short = 's', long, default_value = "0")]
    seed: u64,
    #[clap(short = 'e', long, default_value = "1e-6")]
    epsilon: f64,

    /// Preserve reaching the `mark` label instead of all labels.
    #[clap(long)]
    measure_driven: bool,
    /// Use the bounded measure-driven partition.
    #[clap(long, requires = "measure_driven")]
    bounded: bool,
    #[clap(long)]
    lifo: bool,
    #[clap(long)]
    no_quotient: bool,

    #[clap(long)]
    jsonl_output: bool,
}

fn ring(states: usize, period: usize) -> color_eyre::Result<Model<f64>> {
    let mut builder = ModelBuilder::new(ModelKind::Dtmc, states);
    for index in 0..states {
        let state = StateId::from_id_index(index);
        builder
            .transition(state, state, 0.5)
            .transition(state, StateId::from_id_index((index + 1) % states), 0.5);
        if index % period == 0 {
            builder.label("mark", state);
        }
    }
    if states > 0 {
        builder.initial(StateId::MIN_ID);
    }
    Ok(builder.build()?)
}

fn random(states: usize, classes: usize, seed: u64) -> color_eyre::Result<Model<f64>> {
    let mut rng = SmallRng::seed_from_u64(seed);
    let classes = classes.clamp(1, states.max(1));

    let mut planted: Vec<usize> = (0..classes.min(states)).collect();
    while planted.len() < states {
        planted.push(rng.gen_range(0..classes));
    }
    let mut members = vec![vec![]; classes];
    for (state, &class) in planted.iter().enumerate() {
        members[class].push(StateId::from_id_index(state));
    }

    let mut distributions = vec![];
    for _ in 0..classes {
        let mut targets = vec![];
        for _ in 0..rng.gen_range(1..=3) {
            targets.push((rng.gen_range(0..classes), rng.gen_range(1..=4) as f64));
        }
        let total: f64 = targets.iter().map(|&(_, weight)| weight).sum();
        distributions.push(
            targets
                .into_iter()
                .map(|(target, weight)| (target, weight / total))
                .collect::<Vec<_>>(),
        );
    }

    let mut builder = ModelBuilder::new(ModelKind::Dtmc, states);
    for (index, &class) in planted.iter().enumerate() {
        let state = StateId::from_id_index(index);
        for &(target_class, mass) in &distributions[class] {
            let candidates = &members[target_class];
            let first = candidates[rng.gen_range(0..candidates.len())];
            let second = candidates[rng.gen_range(0..candidates.len())];
            let share = rng.gen_range(1..4) as f64 / 4.0;
            builder
                .transition(state, first, mass * share)
                .transition(state, second, mass * (1.0 - share));
        }
        if class == 0 {
            builder.label("mark", state);
        }
    }
    if states > 0 {
        builder.initial(StateId::MIN_ID);
    }
    Ok(builder.build()?)
}

fn main() -> color_eyre::Result<()> {
    let args = Args::parse();

    color_eyre::install()?;
    pmctk_logger::setup();

    let model = match args.family {
        Family::Ring => ring(args.states, args.period.max(1))?,
        Family::Random => random(args.states, args.period, args.seed)?,
    };
    let backward = model.transitions().transpose();

    log::info!(
        "{:?} model with {} states and {} transitions",
        args.family,
        model.state_count(),
        model.transitions().entry_count()
    );

    let mut options = BisimulationOptions {
        build_quotient: !args.no_quotient,
        worklist_order: if args.lifo {
            WorklistOrder::Lifo
        } else {
            WorklistOrder::Fifo
        },
        ..Default::default()
    };

    if args.measure_driven {
        let psi = model
            .labeling()
            .states_with_label("mark")
            .cloned()
            .unwrap_or_else(|| StateSet::with_capacity(model.state_count()));
        let (prob0, prob1) = qualitative::prob01(&backward, &psi);
        log::info!(
            "{} states with probability zero, {} with probability one",
            prob0.count_ones(..),
            prob1.count_ones(..)
        );

        let mut measure = MeasureDrivenOptions::new(prob0, prob1);
        if args.bounded {
            measure = measure.bounded(psi);
        }
        options.initial = InitialPartitionKind::MeasureDriven(measure);
    }

    let decomposition = BisimulationDecomposition::new(
        &model,
        &backward,
        &options,
        EpsilonComparator::absolute(args.epsilon),
    )?;
    let stats = decomposition.stats();

    if let Some(quotient) = decomposition.quotient() {
        log::info!(
            "quotient with {} states and {} transitions",
            quotient.state_count(),
            quotient.transitions().entry_count()
        );
    }

    if args.jsonl_output {
        println!(
            "{}",
            json!({
                "states": model.state_count(),
                "classes": decomposition.class_count(),
                "splitters": stats.splitters,
                "splits": stats.splits,
                "predecessor_edges": stats.predecessor_edges,
                "touched_blocks": stats.touched_blocks,
            })
        );
    }

    Ok(())
}
