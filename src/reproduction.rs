//! Sexual reproduction and inheritance.

use crate::agent::{Agent, Endowment, Sex};
use crate::cell::CellId;
use crate::config::ReproductionConfig;
use crate::environment::Environment;
use rand::seq::SliceRandom;
use rand::Rng;

/// Both fertile and of opposite sex
pub fn can_mate(a: &Agent, b: &Agent) -> bool {
    a.id != b.id && a.endowment.sex != b.endowment.sex && a.is_fertile() && b.is_fertile()
}

/// Whether a fertile pair conceives this tick
pub fn conceives<R: Rng + ?Sized>(a: &Agent, b: &Agent, rng: &mut R) -> bool {
    let chance = a.fertility().min(b.fertility()).clamp(0.0, 1.0);
    rng.gen::<f64>() < chance
}

/// A random free cell adjacent to either parent
pub fn birth_cell<R: Rng + ?Sized>(env: &Environment, a: CellId, b: CellId, rng: &mut R) -> Option<CellId> {
    let mut free: Vec<CellId> = env
        .cell(a)
        .neighbors()
        .chain(env.cell(b).neighbors())
        .filter(|&id| !env.cell(id).is_occupied())
        .collect();
    free.sort_unstable();
    free.dedup();
    free.choose(rng).copied()
}

/// Amounts each parent hands over: half its own starting endowment
pub fn parental_share(parent: &Agent) -> (f64, f64) {
    (
        parent.endowment.starting_sugar / 2.0,
        parent.endowment.starting_spice / 2.0,
    )
}

fn pick<'e, R: Rng + ?Sized>(a: &'e Endowment, b: &'e Endowment, rng: &mut R) -> &'e Endowment {
    if rng.gen::<bool>() {
        a
    } else {
        b
    }
}

/// Each genetic trait comes from a random parent; the child starts with the
/// sum of both parental shares
pub fn child_endowment<R: Rng + ?Sized>(
    a: &Agent,
    b: &Agent,
    config: &ReproductionConfig,
    rng: &mut R,
) -> Endowment {
    let (ea, eb) = (&a.endowment, &b.endowment);

    let sex = if rng.gen::<bool>() { Sex::Female } else { Sex::Male };
    let infertility_age = match sex {
        Sex::Female => config.female_infertility_age.sample(rng),
        Sex::Male => config.male_infertility_age.sample(rng),
    };
    let (sugar_a, spice_a) = parental_share(a);
    let (sugar_b, spice_b) = parental_share(b);

    Endowment {
        sugar_metabolism: pick(ea, eb, rng).sugar_metabolism,
        spice_metabolism: pick(ea, eb, rng).spice_metabolism,
        vision: pick(ea, eb, rng).vision,
        movement: pick(ea, eb, rng).movement,
        starting_sugar: sugar_a + sugar_b,
        starting_spice: spice_a + spice_b,
        max_age: pick(ea, eb, rng).max_age,
        aggression: pick(ea, eb, rng).aggression,
        tribe: pick(ea, eb, rng).tribe,
        sex,
        fertility_age: config.fertility_age.sample(rng),
        infertility_age,
        fertility: pick(ea, eb, rng).fertility,
        selfishness: pick(ea, eb, rng).selfishness,
        lookahead_discount: pick(ea, eb, rng).lookahead_discount,
        tribal_factor: pick(ea, eb, rng).tribal_factor,
    }
}
