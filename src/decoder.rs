//! Reads a solved valuation back into one weekly grid per section.

use itertools::Itertools;
use log::debug;
use std::collections::HashMap;

use crate::data::{Day, SectionGrid, UnmetSoftConstraint};
use crate::encoder::{Encoding, MAX_PERIODS_PER_DAY, MIN_PERIODS_PER_WEEK};
use crate::model::Valuation;
use crate::normalize::{Dataset, SectionKey, TimeSlot};

pub const FREE: &str = "Free";
pub const UNALLOCATED: &str = "Unallocated";
pub const FREE_PERIOD: &str = "Free Period";

/// Labelling rules in priority order. The first rule that yields a label
/// owns the cell; later rules are not consulted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellRule {
    Recess,
    Fixed,
    Lab,
    WeeklyOnce,
    Regular,
}

impl CellRule {
    pub const PRIORITY: [CellRule; 5] = [
        CellRule::Recess,
        CellRule::Fixed,
        CellRule::Lab,
        CellRule::WeeklyOnce,
        CellRule::Regular,
    ];
}

struct Cell<'a> {
    section: &'a SectionKey,
    day: Day,
    slot: &'a TimeSlot,
}

pub struct Decoder<'a> {
    dataset: &'a Dataset,
    encoding: &'a Encoding,
    valuation: &'a Valuation,
}

impl<'a> Decoder<'a> {
    pub fn new(dataset: &'a Dataset, encoding: &'a Encoding, valuation: &'a Valuation) -> Self {
        Self {
            dataset,
            encoding,
            valuation,
        }
    }

    /// Every section's grid, gap-filled, grouped by year.
    pub fn render_all(&self) -> Vec<SectionGrid> {
        self.dataset
            .sections_by_year()
            .into_iter()
            .map(|section| {
                let mut grid = self.render_section(&section.key);
                let declared: Vec<&str> = self
                    .dataset
                    .subjects_of(&section.key)
                    .iter()
                    .map(|t| self.dataset.subject_name(&t.subject))
                    .collect();
                fill_unallocated(&mut grid, &declared, &self.dataset.target_subjects);
                debug!("\n{}", grid);
                grid
            })
            .collect()
    }

    /// First pass only: labels from the valuation, one "Free" per week,
    /// everything else left "Unallocated".
    pub fn render_section(&self, section: &SectionKey) -> SectionGrid {
        let mut free_left = 1usize;
        let cells: Vec<Vec<String>> = Day::ALL
            .iter()
            .map(|day| {
                self.dataset
                    .slots
                    .iter()
                    .map(|slot| {
                        let cell = Cell {
                            section,
                            day: *day,
                            slot,
                        };
                        CellRule::PRIORITY
                            .iter()
                            .find_map(|rule| self.apply(*rule, &cell))
                            .unwrap_or_else(|| {
                                if free_left > 0 {
                                    free_left -= 1;
                                    FREE.to_string()
                                } else {
                                    UNALLOCATED.to_string()
                                }
                            })
                    })
                    .collect::<Vec<String>>()
            })
            .collect();

        SectionGrid {
            section: section.to_string(),
            days: Day::ALL.to_vec(),
            slots: self.dataset.slots.iter().map(|s| s.id.clone()).collect(),
            cells,
        }
    }

    fn apply(&self, rule: CellRule, cell: &Cell<'_>) -> Option<String> {
        let ds = self.dataset;
        let slot = cell.slot.id.as_str();
        match rule {
            CellRule::Recess => cell
                .slot
                .break_type
                .is_recess()
                .then(|| cell.slot.break_type.to_string()),
            CellRule::Fixed => ds
                .fixed_label(cell.section, cell.day, slot)
                .map(str::to_string),
            CellRule::Lab => self
                .encoding
                .labs_of(cell.section)
                .iter()
                .find(|lab| lab.occupies(cell.day, slot) && self.valuation.value(lab.var))
                .map(|lab| format!("{} (Lab)", ds.subject_name(&lab.subject))),
            CellRule::WeeklyOnce => self
                .encoding
                .weekly_once_of(cell.section)
                .iter()
                .find(|w| w.day == cell.day && w.slot == slot && self.valuation.value(w.var))
                .map(|w| ds.subject_name(&w.subject).to_string()),
            CellRule::Regular => ds
                .subjects_of(cell.section)
                .iter()
                .find(|t| {
                    self.encoding
                        .regular_var(cell.section, &t.subject, cell.day, slot)
                        .is_some_and(|v| self.valuation.value(v))
                })
                .map(|t| ds.subject_name(&t.subject).to_string()),
        }
    }

    /// Faculty double-bookings the solver could not avoid.
    pub fn unmet_soft_constraints(&self) -> Vec<UnmetSoftConstraint> {
        self.encoding
            .conflicts
            .iter()
            .filter(|c| self.valuation.value(c.var))
            .map(|c| {
                let sections = c
                    .members
                    .iter()
                    .filter(|(_, v)| self.valuation.value(*v))
                    .map(|(s, _)| s.as_str())
                    .join(", ");
                UnmetSoftConstraint {
                    constraint_type: "Faculty Double Booking".to_string(),
                    description: format!(
                        "Faculty {} is scheduled for sections {} on {}, slot {}.",
                        self.dataset.faculty_name(&c.faculty),
                        sections,
                        c.day,
                        c.slot
                    ),
                }
            })
            .collect()
    }
}

/// Replaces "Unallocated" cells with the first declared subject still under
/// both the weekly and the per-day cap, or "Free Period" when none is.
///
/// Weekly counts come from the labels already on the grid; target and
/// declared subjects missing from it start at zero.
pub fn fill_unallocated(grid: &mut SectionGrid, declared: &[&str], targets: &[String]) {
    let mut counts: HashMap<String, usize> = grid.labels().map(str::to_string).counts();
    for name in targets.iter().map(String::as_str).chain(declared.iter().copied()) {
        counts.entry(name.to_string()).or_insert(0);
    }

    let weekly_cap = MIN_PERIODS_PER_WEEK as usize;
    let daily_cap = MAX_PERIODS_PER_DAY as usize;
    for d in 0..grid.cells.len() {
        for s in 0..grid.cells[d].len() {
            if grid.cells[d][s] != UNALLOCATED {
                continue;
            }
            let row = &grid.cells[d];
            let pick = declared.iter().copied().find(|name| {
                let today = row.iter().filter(|l| l.as_str() == *name).count();
                counts
                    .get(*name)
                    .is_some_and(|week| *week < weekly_cap && today < daily_cap)
            });
            grid.cells[d][s] = match pick {
                Some(name) => {
                    if let Some(week) = counts.get_mut(name) {
                        *week += 1;
                    }
                    name.to_string()
                }
                None => FREE_PERIOD.to_string(),
            };
        }
    }
}
