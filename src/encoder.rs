//! Builds the 0-1 timetable model from a normalized [`Dataset`].
//!
//! Steps run in a fixed order and later steps only see what earlier ones
//! left open:
//! 1. lab sessions (two adjacent slots, once a week)
//! 2. weekly-once subjects (slot drawn up front from a seeded PRNG)
//! 3. regular subjects (per-day cap, weekly minimum)
//! 4. faculty double-booking indicators feeding the objective

use itertools::Itertools;
use log::{info, trace, warn};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::{BTreeMap, HashMap, HashSet};

use crate::data::{Day, FacultyId, SlotId, SubjectId};
use crate::error::{DataGap, DataGapKind};
use crate::model::{LinearConstraint, Model, Relation, VarRef};
use crate::normalize::{Dataset, SectionKey};

/// No subject may take more than this many periods of one day.
pub const MAX_PERIODS_PER_DAY: i64 = 2;
/// Every regular subject wants at least this many periods a week.
pub const MIN_PERIODS_PER_WEEK: i64 = 5;
/// Objective weight of one faculty double-booking.
pub const FACULTY_CONFLICT_WEIGHT: i64 = 5;

/// Lookup key of a single-slot placement.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PlacementKey {
    pub section: SectionKey,
    pub subject: SubjectId,
    pub day: Day,
    pub slot: SlotId,
}

/// A candidate two-slot lab session.
#[derive(Debug, Clone)]
pub struct LabPlacement {
    pub subject: SubjectId,
    pub faculty: FacultyId,
    pub day: Day,
    pub first: SlotId,
    pub second: SlotId,
    pub var: VarRef,
}

impl LabPlacement {
    pub fn occupies(&self, day: Day, slot: &str) -> bool {
        self.day == day && (self.first == slot || self.second == slot)
    }
}

/// The slot drawn for a weekly-once subject.
#[derive(Debug, Clone)]
pub struct WeeklyOncePlacement {
    pub subject: SubjectId,
    pub day: Day,
    pub slot: SlotId,
    pub var: VarRef,
}

/// Indicator that fires when one faculty member holds more than one
/// section in the same slot.
#[derive(Debug, Clone)]
pub struct FacultyConflict {
    pub faculty: FacultyId,
    pub day: Day,
    pub slot: SlotId,
    pub var: VarRef,
    pub members: Vec<(SectionKey, VarRef)>,
}

/// The encoded model plus the variable maps needed to read a solution back.
#[derive(Debug, Clone, Default)]
pub struct Encoding {
    pub model: Model,
    pub seed: u64,
    pub labs: HashMap<SectionKey, Vec<LabPlacement>>,
    pub weekly_once: HashMap<SectionKey, Vec<WeeklyOncePlacement>>,
    pub regular: HashMap<PlacementKey, VarRef>,
    pub conflicts: Vec<FacultyConflict>,
    pub gaps: Vec<DataGap>,
}

impl Encoding {
    pub fn labs_of(&self, section: &SectionKey) -> &[LabPlacement] {
        self.labs.get(section).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn weekly_once_of(&self, section: &SectionKey) -> &[WeeklyOncePlacement] {
        self.weekly_once
            .get(section)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn regular_var(
        &self,
        section: &SectionKey,
        subject: &str,
        day: Day,
        slot: &str,
    ) -> Option<VarRef> {
        self.regular
            .get(&PlacementKey {
                section: section.clone(),
                subject: subject.to_string(),
                day,
                slot: slot.to_string(),
            })
            .copied()
    }

    fn gap(&mut self, kind: DataGapKind, section: &SectionKey, subject: &str, message: String) {
        warn!("{}: {} ({})", section, message, subject);
        self.gaps.push(DataGap::new(kind, section.as_str(), subject, message));
    }
}

/// Encodes the whole timetable. Never fails: sections without usable slots
/// simply contribute no variables and a [`DataGap`].
pub fn encode(dataset: &Dataset, seed: u64) -> Encoding {
    info!(
        "Setting up timetable model with {} sections, {} slots per day and {} days...",
        dataset.sections.len(),
        dataset.slots.len(),
        Day::ALL.len()
    );
    let mut enc = Encoding {
        seed,
        ..Encoding::default()
    };
    let mut rng = StdRng::seed_from_u64(seed);

    encode_labs(dataset, &mut enc);
    encode_weekly_once(dataset, &mut rng, &mut enc);
    let by_cell = encode_regular(dataset, &mut enc);
    encode_cell_occupancy(dataset, &mut enc);
    encode_faculty_conflicts(dataset, by_cell, &mut enc);

    info!("Timetable model built: {}", enc.model);
    enc
}

fn encode_labs(dataset: &Dataset, enc: &mut Encoding) {
    info!("Adding lab session variables and constraints...");
    // (day, index of the pair's first slot) -> every lab variable on that pair
    let mut by_pair: BTreeMap<(Day, usize), Vec<VarRef>> = BTreeMap::new();

    for section in &dataset.sections {
        let key = &section.key;
        let labs = dataset.labs_of(key);
        if labs.is_empty() {
            continue;
        }
        let mut by_day: BTreeMap<Day, Vec<VarRef>> = BTreeMap::new();
        let mut placements = Vec::new();

        for teaching in labs {
            let mut candidates = Vec::new();
            for day in Day::ALL {
                for (i, (a, b)) in dataset.adjacent_pairs().enumerate() {
                    if !dataset.is_open(key, day, &a.id) || !dataset.is_open(key, day, &b.id) {
                        continue;
                    }
                    let var = enc.model.new_bool_var(format!(
                        "lab_{}_{}_{}_{}_{}",
                        key, teaching.subject, day, a.id, b.id
                    ));
                    candidates.push(var);
                    by_day.entry(day).or_default().push(var);
                    by_pair.entry((day, i)).or_default().push(var);
                    placements.push(LabPlacement {
                        subject: teaching.subject.clone(),
                        faculty: teaching.faculty.clone(),
                        day,
                        first: a.id.clone(),
                        second: b.id.clone(),
                        var,
                    });
                }
            }
            trace!(
                "{} lab candidates for {} in {}.",
                candidates.len(),
                teaching.subject,
                key
            );
            if candidates.is_empty() {
                enc.gap(
                    DataGapKind::NoLabPlacement,
                    key,
                    &teaching.subject,
                    "no two adjacent open slots for the lab".to_string(),
                );
            } else {
                enc.model.add_exactly_one(candidates);
            }
        }

        // one lab session per section per day
        for vars in by_day.into_values() {
            enc.model.add_at_most_one(vars);
        }
        enc.labs.insert(key.clone(), placements);
    }

    // the lab room, and therefore its faculty, hosts one session per pair
    for vars in by_pair.into_values() {
        enc.model.add_at_most_one(vars);
    }
}

fn encode_weekly_once(dataset: &Dataset, rng: &mut StdRng, enc: &mut Encoding) {
    info!("Drawing weekly-once slots (seed {})...", enc.seed);
    for section in &dataset.sections {
        let key = &section.key;
        let mut placements = Vec::new();

        for subject in dataset.weekly_once_for(&section.year) {
            let candidates: Vec<(Day, &str)> = Day::ALL
                .into_iter()
                .flat_map(|day| dataset.slots.iter().map(move |s| (day, s.id.as_str())))
                .filter(|(day, slot)| dataset.is_open(key, *day, slot))
                .collect();
            if candidates.is_empty() {
                enc.gap(
                    DataGapKind::NoWeeklyOnceSlot,
                    key,
                    subject,
                    "no open slot for the weekly-once subject".to_string(),
                );
                continue;
            }

            // drawn independently per subject; collisions are left to the
            // per-cell at-most-one
            let (day, slot) = candidates[rng.random_range(0..candidates.len())];
            let var = enc
                .model
                .new_bool_var(format!("weekly_{}_{}_{}_{}", key, subject, day, slot));
            enc.model.add_exactly_one(vec![var]);
            placements.push(WeeklyOncePlacement {
                subject: subject.clone(),
                day,
                slot: slot.to_string(),
                var,
            });
        }
        if !placements.is_empty() {
            enc.weekly_once.insert(key.clone(), placements);
        }
    }
}

type FacultyCells = BTreeMap<(Day, usize), Vec<(FacultyId, SectionKey, VarRef)>>;

fn encode_regular(dataset: &Dataset, enc: &mut Encoding) -> FacultyCells {
    info!("Adding regular subject variables and constraints...");
    let mut by_cell: FacultyCells = BTreeMap::new();

    for section in &dataset.sections {
        let key = &section.key;
        let weekly_cells: HashSet<(Day, String)> = enc
            .weekly_once_of(key)
            .iter()
            .map(|w| (w.day, w.slot.clone()))
            .collect();

        for teaching in dataset.subjects_of(key) {
            let mut week = Vec::new();
            for day in Day::ALL {
                let mut day_vars = Vec::new();
                for (i, slot) in dataset.slots.iter().enumerate() {
                    if !dataset.is_open(key, day, &slot.id)
                        || weekly_cells.contains(&(day, slot.id.clone()))
                    {
                        continue;
                    }
                    let var = enc.model.new_bool_var(format!(
                        "subject_{}_{}_{}_{}",
                        key, teaching.subject, day, slot.id
                    ));
                    enc.regular.insert(
                        PlacementKey {
                            section: key.clone(),
                            subject: teaching.subject.clone(),
                            day,
                            slot: slot.id.clone(),
                        },
                        var,
                    );
                    if !teaching.faculty.is_empty() {
                        by_cell.entry((day, i)).or_default().push((
                            teaching.faculty.clone(),
                            key.clone(),
                            var,
                        ));
                    }
                    day_vars.push(var);
                }
                if day_vars.len() as i64 > MAX_PERIODS_PER_DAY {
                    enc.model.add_linear(
                        day_vars.iter().map(|v| (*v, 1)).collect(),
                        Relation::Le,
                        MAX_PERIODS_PER_DAY,
                    );
                }
                week.extend(day_vars);
            }

            if week.is_empty() {
                enc.gap(
                    DataGapKind::NoRegularSlot,
                    key,
                    &teaching.subject,
                    "no open slot for the subject".to_string(),
                );
                continue;
            }
            enc.model.add_linear(
                week.iter().map(|v| (*v, 1)).collect(),
                Relation::Ge,
                MIN_PERIODS_PER_WEEK,
            );
        }
    }
    by_cell
}

// One occupant per (section, day, slot) across labs, weekly-once and
// regular subjects.
fn encode_cell_occupancy(dataset: &Dataset, enc: &mut Encoding) {
    info!("Adding one-occupant-per-slot constraints...");
    for section in &dataset.sections {
        let key = &section.key;
        for day in Day::ALL {
            for slot in &dataset.slots {
                if !dataset.is_open(key, day, &slot.id) {
                    continue;
                }
                let occupants: Vec<VarRef> = enc
                    .labs_of(key)
                    .iter()
                    .filter(|lab| lab.occupies(day, &slot.id))
                    .map(|lab| lab.var)
                    .chain(
                        enc.weekly_once_of(key)
                            .iter()
                            .filter(|w| w.day == day && w.slot == slot.id)
                            .map(|w| w.var),
                    )
                    .chain(
                        dataset
                            .subjects_of(key)
                            .iter()
                            .filter_map(|t| enc.regular_var(key, &t.subject, day, &slot.id)),
                    )
                    .collect();
                if occupants.len() > 1 {
                    enc.model.add_at_most_one(occupants);
                }
            }
        }
    }
}

fn encode_faculty_conflicts(dataset: &Dataset, by_cell: FacultyCells, enc: &mut Encoding) {
    info!("Adding faculty double-booking penalties...");
    for ((day, slot_index), entries) in by_cell {
        let slot = &dataset.slots[slot_index].id;
        let by_faculty = entries
            .into_iter()
            .map(|(faculty, section, var)| (faculty, (section, var)))
            .into_group_map();
        for (faculty, members) in by_faculty.into_iter().sorted_by(|a, b| a.0.cmp(&b.0)) {
            if members.len() < 2 {
                continue;
            }
            let vars: Vec<VarRef> = members.iter().map(|(_, v)| *v).collect();
            let var = enc
                .model
                .new_bool_var(format!("faculty_conflict_{}_{}_{}", faculty, day, slot));
            enc.model
                .add_conditional(LinearConstraint::sum(&vars, Relation::Ge, 2), var);
            enc.model
                .add_conditional(LinearConstraint::sum(&vars, Relation::Le, 1), var.not());
            enc.conflicts.push(FacultyConflict {
                faculty,
                day,
                slot: slot.clone(),
                var,
                members,
            });
        }
    }
    trace!("{} faculty conflict indicators.", enc.conflicts.len());

    let objective = enc
        .conflicts
        .iter()
        .map(|c| (c.var, FACULTY_CONFLICT_WEIGHT))
        .collect();
    enc.model.minimize(objective);
}
