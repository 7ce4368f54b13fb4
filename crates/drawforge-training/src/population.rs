//! The per-generation evolution state machine.
//!
//! Each call to [`PopulationManager::tick`] consumes one revealed draw:
//!
//! ```text
//! EVALUATE ──→ RANK ──→ SELECT / REPRODUCE ──→ REPLACE
//!    │           │               │                  │
//!    │           │               │                  └─ commit players, history, rng, generation
//!    │           │               └─ survivors age; children fill the rest
//!    │           └─ fitness desc, age asc, stable
//!    └─ predict (parallel), record hits, recompute fitness
//! ```
//!
//! Every stage works on copies. If prediction fails, the tick returns an error
//! and the manager is exactly as it was before the call.
//!
//! # Determinism
//!
//! All randomness comes from one [`Pcg32`] seeded by an [`EvolutionSeed`]. The
//! generator is part of [`PopulationSnapshot`], so a resumed run continues the
//! same random sequence.

use std::{
    cmp::Ordering,
    collections::HashSet,
    num::NonZero,
    sync::{
        Arc,
        atomic::{self, AtomicBool},
    },
    thread,
};

use drawforge_engine::{
    DrawHistory, DrawRecord, EvolutionSeed, Niche, NumberSet, Player, PlayerId,
};
use drawforge_evaluator::{
    fitness::FitnessEvaluator,
    niche::NicheClassifier,
    predictor::{PredictionError, Predictor},
};
use rand::Rng as _;
use rand_pcg::Pcg32;
use serde::{Deserialize, Serialize};
use tracing::{Span, debug, info, info_span};

use crate::{
    operators::{self, CrossoverOperator, MutationOperator},
    stats::FitnessSummary,
    weights,
};

/// Tunable evolution parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EvolutionParams {
    /// Population size, constant across generations.
    pub total_players: usize,
    /// Index of the player initialized with head-start weights.
    pub elite_slot: Option<usize>,
    /// Number of top-ranked players carried into the next generation.
    pub survivor_count: usize,
    /// Probability that a new slot is filled by crossover rather than mutation.
    pub crossover_rate: f64,
    pub tournament_size: usize,
    pub mutation: MutationOperator,
    pub crossover: CrossoverOperator,
}

impl Default for EvolutionParams {
    fn default() -> Self {
        Self {
            total_players: 100,
            elite_slot: Some(10),
            survivor_count: 20,
            crossover_rate: 0.5,
            tournament_size: 3,
            mutation: MutationOperator::default(),
            crossover: CrossoverOperator::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, derive_more::Display, derive_more::Error)]
pub enum ParamsError {
    #[display("population must contain at least one player")]
    EmptyPopulation,
    #[display("survivor count {survivors} must be in 1..={total}")]
    SurvivorCount { survivors: usize, total: usize },
    #[display("elite slot {slot} is outside a population of {total}")]
    EliteSlot { slot: usize, total: usize },
    #[display("tournament size must be at least 1")]
    TournamentSize,
    #[display("crossover rate {rate} is not a probability")]
    CrossoverRate { rate: f64 },
    #[display("snapshot holds {actual} players, expected {expected}")]
    SnapshotSize { expected: usize, actual: usize },
}

impl EvolutionParams {
    pub fn validate(&self) -> Result<(), ParamsError> {
        if self.total_players == 0 {
            return Err(ParamsError::EmptyPopulation);
        }
        if !(1..=self.total_players).contains(&self.survivor_count) {
            return Err(ParamsError::SurvivorCount {
                survivors: self.survivor_count,
                total: self.total_players,
            });
        }
        if let Some(slot) = self.elite_slot
            && slot >= self.total_players
        {
            return Err(ParamsError::EliteSlot {
                slot,
                total: self.total_players,
            });
        }
        if self.tournament_size == 0 {
            return Err(ParamsError::TournamentSize);
        }
        if !(0.0..=1.0).contains(&self.crossover_rate) {
            return Err(ParamsError::CrossoverRate {
                rate: self.crossover_rate,
            });
        }
        Ok(())
    }
}

#[derive(Debug, derive_more::Display, derive_more::Error)]
pub enum TickError {
    #[display("generation {generation} aborted at draw {draw_index}")]
    Prediction {
        generation: u32,
        draw_index: u32,
        source: PredictionError,
    },
}

/// Cooperative cancellation flag, checked between ticks.
#[derive(Debug, Default, Clone)]
pub struct StopSignal(Arc<AtomicBool>);

impl StopSignal {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn raise(&self) {
        self.0.store(true, atomic::Ordering::Relaxed);
    }

    #[must_use]
    pub fn is_raised(&self) -> bool {
        self.0.load(atomic::Ordering::Relaxed)
    }
}

/// The best player of a generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChampionSummary {
    pub id: PlayerId,
    pub fitness: f32,
    pub score: u32,
    pub age: u32,
    pub generation: u32,
    pub niche: Niche,
    pub prediction: NumberSet,
}

/// Outcome of one generation tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationReport {
    /// Generation that was evaluated.
    pub generation: u32,
    pub draw_index: u32,
    pub champion: ChampionSummary,
    pub fitness: FitnessSummary,
    /// Mean of each weight over the evaluated generation.
    pub weight_means: Vec<f32>,
    pub survivors: usize,
    pub mutants: usize,
    pub children: usize,
    /// Niche that would have earned the largest bonus on this draw.
    pub dominant_niche: Niche,
}

/// How a [`PopulationManager::run`] call ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunOutcome {
    pub ticks: usize,
    pub stopped: bool,
}

/// Persistent form of a [`PopulationManager`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PopulationSnapshot {
    pub generation: u32,
    pub players: Vec<Player>,
    pub rng: Pcg32,
    pub history: DrawHistory,
}

/// Owns a population and advances it one generation per draw.
#[derive(Debug, Clone)]
pub struct PopulationManager {
    params: EvolutionParams,
    players: Vec<Player>,
    history: DrawHistory,
    generation: u32,
    rng: Pcg32,
    span: Span,
}

impl PopulationManager {
    /// Creates generation 1 with ids `1..=total_players`.
    pub fn new(params: EvolutionParams, seed: EvolutionSeed) -> Result<Self, ParamsError> {
        params.validate()?;
        let mut rng = seed.rng();
        let players = (0..params.total_players)
            .map(|i| {
                let weights = if params.elite_slot == Some(i) {
                    weights::elite(&mut rng)
                } else {
                    weights::random(&mut rng)
                };
                let niche = NicheClassifier.random(&mut rng);
                Player::new(PlayerId(i as u64 + 1), weights, niche, 1)
            })
            .collect();
        Ok(Self {
            params,
            players,
            history: DrawHistory::new(),
            generation: 1,
            rng,
            span: info_span!("population", seed = %seed),
        })
    }

    /// Restores a manager from a snapshot.
    pub fn from_snapshot(
        params: EvolutionParams,
        snapshot: PopulationSnapshot,
    ) -> Result<Self, ParamsError> {
        params.validate()?;
        if snapshot.players.len() != params.total_players {
            return Err(ParamsError::SnapshotSize {
                expected: params.total_players,
                actual: snapshot.players.len(),
            });
        }
        Ok(Self {
            params,
            players: snapshot.players,
            history: snapshot.history,
            generation: snapshot.generation,
            rng: snapshot.rng,
            span: info_span!("population", resumed_at = snapshot.generation),
        })
    }

    /// Replaces the span entered by every operation of this manager.
    #[must_use]
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    #[must_use]
    pub fn snapshot(&self) -> PopulationSnapshot {
        PopulationSnapshot {
            generation: self.generation,
            players: self.players.clone(),
            rng: self.rng.clone(),
            history: self.history.clone(),
        }
    }

    #[must_use]
    pub fn params(&self) -> &EvolutionParams {
        &self.params
    }

    #[must_use]
    pub fn players(&self) -> &[Player] {
        &self.players
    }

    #[must_use]
    pub fn history(&self) -> &DrawHistory {
        &self.history
    }

    /// Generation the next tick evaluates.
    #[must_use]
    pub fn generation(&self) -> u32 {
        self.generation
    }

    /// Top-ranked survivor of the latest tick.
    ///
    /// Survivors lead the population in rank order, so this holds after a
    /// snapshot round-trip too. Before the first tick it is the first player.
    #[must_use]
    pub fn champion(&self) -> Option<&Player> {
        self.players.first()
    }

    /// Advances the population by one generation using `draw`.
    pub fn tick<P>(
        &mut self,
        draw: &DrawRecord,
        predictor: &P,
        evaluator: &FitnessEvaluator,
    ) -> Result<GenerationReport, TickError>
    where
        P: Predictor + ?Sized,
    {
        let span = self.span.clone();
        let _enter = span.enter();

        // EVALUATE
        let predictions = predict_all(&self.players, &self.history, predictor).map_err(|source| {
            TickError::Prediction {
                generation: self.generation,
                draw_index: draw.draw_index,
                source,
            }
        })?;
        let mut ranked = self
            .players
            .iter()
            .zip(predictions)
            .map(|(player, prediction)| {
                let mut player = player.clone();
                player.record_prediction(prediction, draw.numbers);
                player.set_fitness(evaluator.evaluate(&player, draw.numbers));
                player
            })
            .collect::<Vec<_>>();

        // RANK
        ranked.sort_by(rank_order);
        let report_base = self.summarize(&ranked, draw);

        // SELECT / REPRODUCE
        let mut rng = self.rng.clone();
        let (next, counts) = self.reproduce(&ranked, &mut rng);

        // REPLACE
        debug_assert_eq!(next.len(), self.params.total_players);
        self.players = next;
        self.history.push(draw.clone());
        self.rng = rng;
        let report = GenerationReport {
            survivors: counts.survivors,
            mutants: counts.mutants,
            children: counts.children,
            ..report_base
        };
        self.generation += 1;

        info!(
            generation = report.generation,
            draw_index = report.draw_index,
            best = report.fitness.max,
            mean = report.fitness.mean,
            champion = %report.champion.id,
            "generation evaluated"
        );
        Ok(report)
    }

    /// Ticks through `draws` until they run out or `stop` is raised.
    ///
    /// `stop` is checked before every tick; a tick in progress always completes.
    pub fn run<I, P, F>(
        &mut self,
        draws: I,
        predictor: &P,
        evaluator: &FitnessEvaluator,
        stop: &StopSignal,
        mut on_generation: F,
    ) -> Result<RunOutcome, TickError>
    where
        I: IntoIterator<Item = DrawRecord>,
        P: Predictor + ?Sized,
        F: FnMut(&Self, &GenerationReport),
    {
        let mut ticks = 0;
        for draw in draws {
            if stop.is_raised() {
                info!(ticks, "stop requested");
                return Ok(RunOutcome {
                    ticks,
                    stopped: true,
                });
            }
            let report = self.tick(&draw, predictor, evaluator)?;
            ticks += 1;
            on_generation(self, &report);
        }
        Ok(RunOutcome {
            ticks,
            stopped: false,
        })
    }

    fn summarize(&self, ranked: &[Player], draw: &DrawRecord) -> GenerationReport {
        let best = &ranked[0];
        let champion = ChampionSummary {
            id: best.id(),
            fitness: best.fitness(),
            score: best.score(),
            age: best.age(),
            generation: best.generation(),
            niche: best.niche(),
            prediction: best.predictions().last().copied().unwrap_or(NumberSet::EMPTY),
        };
        let fitness = FitnessSummary::new(ranked.iter().map(Player::fitness))
            .expect("population is never empty");
        GenerationReport {
            generation: self.generation,
            draw_index: draw.draw_index,
            champion,
            fitness,
            weight_means: weights::means(ranked.iter().map(Player::weights)),
            survivors: 0,
            mutants: 0,
            children: 0,
            dominant_niche: NicheClassifier.dominant(draw.numbers),
        }
    }

    fn reproduce(&self, ranked: &[Player], rng: &mut Pcg32) -> (Vec<Player>, ReproductionCounts) {
        let params = &self.params;
        let pool = &ranked[..params.survivor_count];
        let mut next = Vec::with_capacity(params.total_players);
        let mut ids = HashSet::with_capacity(params.total_players);
        let mut counts = ReproductionCounts::default();

        for survivor in pool {
            let mut survivor = survivor.clone();
            survivor.grow_older();
            ids.insert(survivor.id());
            next.push(survivor);
            counts.survivors += 1;
        }

        while next.len() < params.total_players {
            let child = if rng.random_bool(params.crossover_rate) {
                let a = operators::tournament_select(pool, params.tournament_size, rng);
                let b = operators::tournament_select(pool, params.tournament_size, rng);
                counts.children += 1;
                params.crossover.crossover(a, b, rng)
            } else {
                let parent = operators::tournament_select(pool, params.tournament_size, rng);
                counts.mutants += 1;
                params.mutation.mutate(parent, rng)
            };
            let child = if ids.contains(&child.id()) {
                let id = operators::fresh_id(&ids, rng);
                child.with_id(id)
            } else {
                child
            };
            ids.insert(child.id());
            next.push(child);
        }

        debug!(
            survivors = counts.survivors,
            mutants = counts.mutants,
            children = counts.children,
            "reproduced"
        );
        (next, counts)
    }
}

#[derive(Debug, Default, Clone, Copy)]
struct ReproductionCounts {
    survivors: usize,
    mutants: usize,
    children: usize,
}

/// Ranking order: fitness descending, then age ascending.
fn rank_order(a: &Player, b: &Player) -> Ordering {
    b.fitness()
        .total_cmp(&a.fitness())
        .then_with(|| a.age().cmp(&b.age()))
}

/// Runs `predictor` for every player on scoped worker threads.
///
/// Results are returned in player order. The first failure in player order is
/// reported.
fn predict_all<P>(
    players: &[Player],
    history: &DrawHistory,
    predictor: &P,
) -> Result<Vec<NumberSet>, PredictionError>
where
    P: Predictor + ?Sized,
{
    let workers = thread::available_parallelism().map_or(1, NonZero::get);
    let chunk_size = players.len().div_ceil(workers).max(1);
    thread::scope(|s| {
        let handles = players
            .chunks(chunk_size)
            .map(|chunk| {
                s.spawn(move || {
                    chunk
                        .iter()
                        .map(|player| predictor.predict(player, history))
                        .collect::<Vec<_>>()
                })
            })
            .collect::<Vec<_>>();
        handles
            .into_iter()
            .flat_map(|handle| {
                handle
                    .join()
                    .unwrap_or_else(|payload| std::panic::resume_unwind(payload))
            })
            .collect()
    })
}
