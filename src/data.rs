use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::DataGap;
use crate::solver::SolveStatus;

// Type aliases for clarity
pub type SubjectId = String;
pub type FacultyId = String;
pub type SlotId = String;

/// One of the six teaching days of the fixed week.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize, Serialize)]
pub enum Day {
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
}

impl Day {
    pub const ALL: [Day; 6] = [
        Day::Monday,
        Day::Tuesday,
        Day::Wednesday,
        Day::Thursday,
        Day::Friday,
        Day::Saturday,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Day::Monday => "Monday",
            Day::Tuesday => "Tuesday",
            Day::Wednesday => "Wednesday",
            Day::Thursday => "Thursday",
            Day::Friday => "Friday",
            Day::Saturday => "Saturday",
        }
    }
}

impl fmt::Display for Day {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether a slot is teachable or a recess.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize, Serialize)]
pub enum BreakType {
    #[default]
    None,
    Break,
    Lunch,
}

impl BreakType {
    pub fn is_recess(self) -> bool {
        matches!(self, BreakType::Break | BreakType::Lunch)
    }
}

impl fmt::Display for BreakType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            BreakType::None => "None",
            BreakType::Break => "Break",
            BreakType::Lunch => "Lunch",
        })
    }
}

/// A declared class group.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SectionRow {
    pub year: String,
    pub department: String,
    pub section: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SubjectRow {
    pub id: SubjectId,
    pub name: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TeacherRow {
    pub id: FacultyId,
    pub name: String,
}

/// A period of the day; `ordinal` fixes its position.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeSlotRow {
    pub slot_id: SlotId,
    pub ordinal: u32,
    #[serde(default)]
    pub break_type: BreakType,
}

/// A regular subject taught to a section by one faculty member.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SectionSubjectRow {
    pub year: String,
    pub department: String,
    pub section: String,
    pub subject_id: SubjectId,
    pub faculty_id: FacultyId,
}

/// Pre-assigned content that always occupies its cell.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FixedActivityRow {
    pub year: String,
    pub department: String,
    pub section: String,
    pub day: Day,
    pub slot_id: SlotId,
    pub activity: String,
}

/// A practical session needing two adjacent slots once a week.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LabSessionRow {
    pub year: String,
    pub department: String,
    pub section: String,
    pub subject_id: SubjectId,
    pub faculty_id: FacultyId,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WeeklyOnceRow {
    pub year: String,
    pub subject_id: SubjectId,
}

/// The complete input for one timetable request.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimetableInput {
    pub sections: Vec<SectionRow>,
    pub subjects: Vec<SubjectRow>,
    #[serde(default)]
    pub teachers: Vec<TeacherRow>,
    pub time_slots: Vec<TimeSlotRow>,
    #[serde(default)]
    pub section_subjects: Vec<SectionSubjectRow>,
    #[serde(default)]
    pub fixed_activities: Vec<FixedActivityRow>,
    #[serde(default)]
    pub lab_sessions: Vec<LabSessionRow>,
    #[serde(default)]
    pub weekly_once_subjects: Vec<WeeklyOnceRow>,
    /// Subject names eligible for gap filling.
    #[serde(default)]
    pub target_subjects: Vec<String>,
    /// Seed for the weekly-once slot draw.
    #[serde(default)]
    pub seed: Option<u64>,
}

/// The rendered week of one section. `cells[d][s]` is the label of
/// `days[d]` at `slots[s]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SectionGrid {
    pub section: String,
    pub days: Vec<Day>,
    pub slots: Vec<SlotId>,
    pub cells: Vec<Vec<String>>,
}

impl SectionGrid {
    pub fn cell(&self, day: Day, slot: &str) -> Option<&str> {
        let d = self.days.iter().position(|d| *d == day)?;
        let s = self.slots.iter().position(|s| s == slot)?;
        self.cells.get(d)?.get(s).map(String::as_str)
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.cells.iter().flatten().map(String::as_str)
    }
}

impl fmt::Display for SectionGrid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let width = self
            .labels()
            .map(str::len)
            .chain(self.slots.iter().map(String::len))
            .max()
            .unwrap_or(0);
        writeln!(f, "Timetable for {}", self.section)?;
        write!(f, "{:<10}", "")?;
        for slot in &self.slots {
            write!(f, " | {:<width$}", slot)?;
        }
        writeln!(f)?;
        for (day, row) in self.days.iter().zip(&self.cells) {
            write!(f, "{:<10}", day.as_str())?;
            for label in row {
                write!(f, " | {:<width$}", label)?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

/// Describes a soft constraint that was not met in the final schedule.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UnmetSoftConstraint {
    pub constraint_type: String,
    pub description: String,
}

impl fmt::Display for UnmetSoftConstraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.constraint_type, self.description)
    }
}

/// The final output of the solver.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimetableOutput {
    pub status: SolveStatus,
    pub seed: u64,
    pub grids: Vec<SectionGrid>,
    pub unmet_soft_constraints: Vec<UnmetSoftConstraint>,
    pub warnings: Vec<DataGap>,
}
