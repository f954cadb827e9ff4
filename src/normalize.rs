//! Turns raw input rows into the lookups the encoder and decoder join on.

use itertools::Itertools;
use log::{debug, warn};
use std::collections::{HashMap, HashSet};
use std::fmt;

use crate::data::{BreakType, Day, FacultyId, SlotId, SubjectId, TimetableInput};

/// Join key of a class group: `year_department_section`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SectionKey(String);

impl SectionKey {
    pub const SEPARATOR: char = '_';

    pub fn new(year: &str, department: &str, section: &str) -> Self {
        let sep = Self::SEPARATOR;
        SectionKey(format!("{year}{sep}{department}{sep}{section}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SectionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone)]
pub struct Section {
    pub key: SectionKey,
    pub year: String,
}

#[derive(Debug, Clone)]
pub struct TimeSlot {
    pub id: SlotId,
    pub ordinal: u32,
    pub break_type: BreakType,
}

/// A subject together with the faculty member teaching it to one section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Teaching {
    pub subject: SubjectId,
    pub faculty: FacultyId,
}

/// The normalized dataset. Immutable once built.
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    pub sections: Vec<Section>,
    /// Sorted by ordinal.
    pub slots: Vec<TimeSlot>,
    pub subject_names: HashMap<SubjectId, String>,
    pub faculty_names: HashMap<FacultyId, String>,
    pub section_subjects: HashMap<SectionKey, Vec<Teaching>>,
    pub section_labs: HashMap<SectionKey, Vec<Teaching>>,
    pub fixed: HashMap<SectionKey, HashMap<Day, HashMap<SlotId, String>>>,
    pub break_types: HashMap<SlotId, BreakType>,
    pub weekly_once: HashMap<String, Vec<SubjectId>>,
    pub target_subjects: Vec<String>,
}

impl Dataset {
    pub fn from_input(input: &TimetableInput) -> Self {
        let mut sections = Vec::new();
        let mut declared = HashSet::new();
        for row in &input.sections {
            let key = SectionKey::new(&row.year, &row.department, &row.section);
            if declared.insert(key.clone()) {
                sections.push(Section {
                    key,
                    year: row.year.clone(),
                });
            } else {
                debug!("Section {} declared twice; keeping the first.", key);
            }
        }

        let slots: Vec<TimeSlot> = input
            .time_slots
            .iter()
            .map(|s| TimeSlot {
                id: s.slot_id.clone(),
                ordinal: s.ordinal,
                break_type: s.break_type,
            })
            .sorted_by_key(|s| s.ordinal)
            .collect();
        let break_types = slots.iter().map(|s| (s.id.clone(), s.break_type)).collect();

        let subject_names = input
            .subjects
            .iter()
            .map(|s| (s.id.clone(), s.name.clone()))
            .collect();
        let faculty_names = input
            .teachers
            .iter()
            .map(|t| (t.id.clone(), t.name.clone()))
            .collect();

        let section_subjects = bucket_teachings(
            &declared,
            "regular",
            input.section_subjects.iter().map(|r| {
                (
                    SectionKey::new(&r.year, &r.department, &r.section),
                    Teaching {
                        subject: r.subject_id.clone(),
                        faculty: r.faculty_id.clone(),
                    },
                )
            }),
        );
        let section_labs = bucket_teachings(
            &declared,
            "lab",
            input.lab_sessions.iter().map(|r| {
                (
                    SectionKey::new(&r.year, &r.department, &r.section),
                    Teaching {
                        subject: r.subject_id.clone(),
                        faculty: r.faculty_id.clone(),
                    },
                )
            }),
        );

        let mut fixed: HashMap<SectionKey, HashMap<Day, HashMap<SlotId, String>>> = HashMap::new();
        for row in &input.fixed_activities {
            let key = SectionKey::new(&row.year, &row.department, &row.section);
            if !declared.contains(&key) {
                debug!("Fixed activity for undeclared section {} ignored.", key);
                continue;
            }
            fixed
                .entry(key)
                .or_default()
                .entry(row.day)
                .or_default()
                .insert(row.slot_id.clone(), row.activity.clone());
        }

        let mut weekly_once: HashMap<String, Vec<SubjectId>> = HashMap::new();
        for row in &input.weekly_once_subjects {
            let subjects = weekly_once.entry(row.year.clone()).or_default();
            if !subjects.contains(&row.subject_id) {
                subjects.push(row.subject_id.clone());
            }
        }

        Dataset {
            sections,
            slots,
            subject_names,
            faculty_names,
            section_subjects,
            section_labs,
            fixed,
            break_types,
            weekly_once,
            target_subjects: input.target_subjects.clone(),
        }
    }

    pub fn is_recess(&self, slot: &str) -> bool {
        self.break_type(slot).is_recess()
    }

    pub fn break_type(&self, slot: &str) -> BreakType {
        self.break_types.get(slot).copied().unwrap_or_default()
    }

    pub fn fixed_label(&self, section: &SectionKey, day: Day, slot: &str) -> Option<&str> {
        self.fixed
            .get(section)?
            .get(&day)?
            .get(slot)
            .map(String::as_str)
    }

    /// A teachable cell: neither a recess nor taken by a fixed activity.
    pub fn is_open(&self, section: &SectionKey, day: Day, slot: &str) -> bool {
        !self.is_recess(slot) && self.fixed_label(section, day, slot).is_none()
    }

    pub fn subjects_of(&self, section: &SectionKey) -> &[Teaching] {
        self.section_subjects
            .get(section)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn labs_of(&self, section: &SectionKey) -> &[Teaching] {
        self.section_labs
            .get(section)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn weekly_once_for(&self, year: &str) -> &[SubjectId] {
        self.weekly_once
            .get(year)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Display name, falling back to the id.
    pub fn subject_name<'a>(&'a self, subject: &'a str) -> &'a str {
        self.subject_names
            .get(subject)
            .map(String::as_str)
            .unwrap_or(subject)
    }

    pub fn faculty_name<'a>(&'a self, faculty: &'a str) -> &'a str {
        self.faculty_names
            .get(faculty)
            .map(String::as_str)
            .unwrap_or(faculty)
    }

    /// Consecutive slots in ordinal order.
    pub fn adjacent_pairs(&self) -> impl Iterator<Item = (&TimeSlot, &TimeSlot)> {
        self.slots.iter().tuple_windows()
    }

    /// Sections grouped by year in order of first appearance, then by
    /// declaration order.
    pub fn sections_by_year(&self) -> Vec<&Section> {
        let year_rank: HashMap<&str, usize> = self
            .sections
            .iter()
            .map(|s| s.year.as_str())
            .unique()
            .enumerate()
            .map(|(i, y)| (y, i))
            .collect();
        self.sections
            .iter()
            .sorted_by_key(|s| year_rank.get(s.year.as_str()).copied().unwrap_or(usize::MAX))
            .collect()
    }
}

fn bucket_teachings(
    declared: &HashSet<SectionKey>,
    kind: &str,
    rows: impl Iterator<Item = (SectionKey, Teaching)>,
) -> HashMap<SectionKey, Vec<Teaching>> {
    let mut buckets: HashMap<SectionKey, Vec<Teaching>> = HashMap::new();
    for (key, teaching) in rows {
        if !declared.contains(&key) {
            debug!(
                "Dropping {} subject {} for undeclared section {}.",
                kind, teaching.subject, key
            );
            continue;
        }
        let bucket = buckets.entry(key).or_default();
        if let Some(existing) = bucket.iter().find(|t| t.subject == teaching.subject) {
            warn!(
                "{} subject {} listed twice for one section; keeping faculty {}.",
                kind, teaching.subject, existing.faculty
            );
            continue;
        }
        bucket.push(teaching);
    }
    buckets
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{
        FixedActivityRow, SectionRow, SectionSubjectRow, SubjectRow, TimeSlotRow, WeeklyOnceRow,
    };

    fn section(year: &str, dept: &str, sec: &str) -> SectionRow {
        SectionRow {
            year: year.into(),
            department: dept.into(),
            section: sec.into(),
        }
    }

    fn teaching_row(year: &str, sec: &str, subject: &str, faculty: &str) -> SectionSubjectRow {
        SectionSubjectRow {
            year: year.into(),
            department: "CSM".into(),
            section: sec.into(),
            subject_id: subject.into(),
            faculty_id: faculty.into(),
        }
    }

    fn sample_input() -> TimetableInput {
        TimetableInput {
            sections: vec![
                section("II", "CSM", "A"),
                section("III", "CSM", "A"),
                section("II", "CSM", "B"),
                section("II", "CSM", "A"),
            ],
            subjects: vec![SubjectRow {
                id: "M1".into(),
                name: "Mathematics".into(),
            }],
            time_slots: vec![
                TimeSlotRow {
                    slot_id: "S3".into(),
                    ordinal: 3,
                    break_type: BreakType::Lunch,
                },
                TimeSlotRow {
                    slot_id: "S1".into(),
                    ordinal: 1,
                    break_type: BreakType::None,
                },
                TimeSlotRow {
                    slot_id: "S2".into(),
                    ordinal: 2,
                    break_type: BreakType::None,
                },
            ],
            section_subjects: vec![
                teaching_row("II", "A", "M1", "F1"),
                teaching_row("II", "A", "M1", "F9"),
                teaching_row("II", "Z", "M1", "F1"),
                teaching_row("II", "B", "P1", "F2"),
            ],
            fixed_activities: vec![
                FixedActivityRow {
                    year: "II".into(),
                    department: "CSM".into(),
                    section: "A".into(),
                    day: Day::Monday,
                    slot_id: "S1".into(),
                    activity: "Assembly".into(),
                },
                FixedActivityRow {
                    year: "IV".into(),
                    department: "CSM".into(),
                    section: "A".into(),
                    day: Day::Monday,
                    slot_id: "S1".into(),
                    activity: "Ghost".into(),
                },
            ],
            weekly_once_subjects: vec![
                WeeklyOnceRow {
                    year: "II".into(),
                    subject_id: "LIB".into(),
                },
                WeeklyOnceRow {
                    year: "II".into(),
                    subject_id: "LIB".into(),
                },
            ],
            ..Default::default()
        }
    }

    #[test]
    fn section_key_joins_with_separator() {
        assert_eq!(SectionKey::new("II", "CSM", "A").as_str(), "II_CSM_A");
    }

    #[test]
    fn duplicate_sections_collapse() {
        let ds = Dataset::from_input(&sample_input());
        let keys: Vec<_> = ds.sections.iter().map(|s| s.key.as_str()).collect();
        assert_eq!(keys, ["II_CSM_A", "III_CSM_A", "II_CSM_B"]);
    }

    #[test]
    fn slots_are_sorted_and_classified() {
        let ds = Dataset::from_input(&sample_input());
        let ids: Vec<_> = ds.slots.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, ["S1", "S2", "S3"]);
        assert!(ds.is_recess("S3"));
        assert!(!ds.is_recess("S1"));
        assert_eq!(ds.adjacent_pairs().count(), 2);
    }

    #[test]
    fn rows_for_undeclared_sections_are_excluded() {
        let ds = Dataset::from_input(&sample_input());
        let a = SectionKey::new("II", "CSM", "A");
        let b = SectionKey::new("II", "CSM", "B");
        assert_eq!(
            ds.subjects_of(&a),
            [Teaching {
                subject: "M1".into(),
                faculty: "F1".into()
            }]
        );
        assert_eq!(ds.subjects_of(&b).len(), 1);
        assert!(ds.subjects_of(&SectionKey::new("II", "CSM", "Z")).is_empty());
        assert_eq!(ds.fixed.len(), 1);
    }

    #[test]
    fn fixed_grid_blocks_cells() {
        let ds = Dataset::from_input(&sample_input());
        let a = SectionKey::new("II", "CSM", "A");
        assert_eq!(ds.fixed_label(&a, Day::Monday, "S1"), Some("Assembly"));
        assert!(!ds.is_open(&a, Day::Monday, "S1"));
        assert!(ds.is_open(&a, Day::Tuesday, "S1"));
        assert!(!ds.is_open(&a, Day::Tuesday, "S3"));
    }

    #[test]
    fn weekly_once_is_per_year_and_deduplicated() {
        let ds = Dataset::from_input(&sample_input());
        assert_eq!(ds.weekly_once_for("II"), ["LIB".to_string()]);
        assert!(ds.weekly_once_for("III").is_empty());
    }

    #[test]
    fn names_fall_back_to_ids() {
        let ds = Dataset::from_input(&sample_input());
        assert_eq!(ds.subject_name("M1"), "Mathematics");
        assert_eq!(ds.subject_name("P1"), "P1");
        assert_eq!(ds.faculty_name("F1"), "F1");
    }

    #[test]
    fn sections_group_by_year() {
        let ds = Dataset::from_input(&sample_input());
        let order: Vec<_> = ds
            .sections_by_year()
            .into_iter()
            .map(|s| s.key.as_str())
            .collect();
        assert_eq!(order, ["II_CSM_A", "II_CSM_B", "III_CSM_A"]);
    }
}
