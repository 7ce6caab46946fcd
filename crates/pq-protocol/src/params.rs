//! Structured, partially-populated constraints extracted from question text.
//!
//! Unset fields mean "not constrained". Constrained values are validated
//! when they are built, and model-provided parameters go through the same
//! checks via [`RawParameters`].

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Upper bound for any numeric limit carried in parameters.
pub const MAX_LIMIT: u32 = 1000;

/// Errors raised while constructing parameter values.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ParamError {
    #[error("month out of range: {0}")]
    InvalidMonth(u32),

    #[error("date range is inverted: {start} > {end}")]
    InvertedRange { start: NaiveDate, end: NaiveDate },

    #[error("limit must be between 1 and 1000, got {0}")]
    InvalidLimit(u32),

    #[error("row ordinal must be at least 1")]
    InvalidOrdinal,

    #[error("invalid equipment identifier: {0}")]
    InvalidEquipment(String),

    #[error("invalid shift code: {0}")]
    InvalidShift(String),
}

// ── Scalar value types ─────────────────────────────────────────

/// Calendar month, 1..=12.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct Month(u8);

const MONTH_NAMES: [&str; 12] = [
    "January",
    "February",
    "March",
    "April",
    "May",
    "June",
    "July",
    "August",
    "September",
    "October",
    "November",
    "December",
];

impl Month {
    pub fn new(number: u32) -> Result<Self, ParamError> {
        if (1..=12).contains(&number) {
            Ok(Self(number as u8))
        } else {
            Err(ParamError::InvalidMonth(number))
        }
    }

    pub fn number(self) -> u32 {
        u32::from(self.0)
    }

    pub fn name(self) -> &'static str {
        MONTH_NAMES[usize::from(self.0) - 1]
    }
}

impl TryFrom<u32> for Month {
    type Error = ParamError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        Month::new(value)
    }
}

impl From<Month> for u32 {
    fn from(month: Month) -> Self {
        month.number()
    }
}

/// Production shift code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Shift {
    A,
    B,
    C,
}

impl Shift {
    pub const ALL: [Shift; 3] = [Shift::A, Shift::B, Shift::C];

    pub fn from_letter(letter: char) -> Option<Self> {
        match letter.to_ascii_uppercase() {
            'A' => Some(Shift::A),
            'B' => Some(Shift::B),
            'C' => Some(Shift::C),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Shift::A => "A",
            Shift::B => "B",
            Shift::C => "C",
        }
    }
}

impl std::str::FromStr for Shift {
    type Err = ParamError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let mut chars = trimmed.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => Shift::from_letter(c),
            _ => None,
        }
        .ok_or_else(|| ParamError::InvalidShift(s.to_string()))
    }
}

/// Equipment identifier normalized to `PREFIX-NUMBER` (e.g. `EX-189`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct EquipmentId(String);

impl EquipmentId {
    /// Parse `ex189`, `EX 189` or `ex-189` into `EX-189`.
    pub fn parse(raw: &str) -> Result<Self, ParamError> {
        let compact: String = raw
            .chars()
            .filter(|c| !c.is_whitespace() && *c != '-' && *c != '_')
            .collect();
        let split = compact
            .find(|c: char| c.is_ascii_digit())
            .ok_or_else(|| ParamError::InvalidEquipment(raw.to_string()))?;
        let (prefix, number) = compact.split_at(split);
        let valid_prefix = (2..=4).contains(&prefix.len())
            && prefix.chars().all(|c| c.is_ascii_alphabetic());
        let valid_number = (1..=5).contains(&number.len())
            && number.chars().all(|c| c.is_ascii_digit());
        if !valid_prefix || !valid_number {
            return Err(ParamError::InvalidEquipment(raw.to_string()));
        }
        Ok(Self(format!("{}-{}", prefix.to_ascii_uppercase(), number)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Alphabetic prefix, e.g. `EX`.
    pub fn prefix(&self) -> &str {
        self.0.split('-').next().unwrap_or_default()
    }
}

impl TryFrom<String> for EquipmentId {
    type Error = ParamError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        EquipmentId::parse(&value)
    }
}

impl From<EquipmentId> for String {
    fn from(id: EquipmentId) -> Self {
        id.0
    }
}

impl std::fmt::Display for EquipmentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Inclusive date range with `start <= end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawDateRange")]
pub struct DateRange {
    start: NaiveDate,
    end: NaiveDate,
}

#[derive(Deserialize)]
struct RawDateRange {
    start: NaiveDate,
    end: NaiveDate,
}

impl TryFrom<RawDateRange> for DateRange {
    type Error = ParamError;

    fn try_from(raw: RawDateRange) -> Result<Self, Self::Error> {
        DateRange::new(raw.start, raw.end)
    }
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, ParamError> {
        if start > end {
            return Err(ParamError::InvertedRange { start, end });
        }
        Ok(Self { start, end })
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end(&self) -> NaiveDate {
        self.end
    }
}

/// Which row of an ordered listing the question points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RowOrdinal {
    /// 1-based position.
    Nth(u32),
    Last,
}

impl RowOrdinal {
    pub fn nth(position: u32) -> Result<Self, ParamError> {
        if position == 0 {
            return Err(ParamError::InvalidOrdinal);
        }
        Ok(RowOrdinal::Nth(position))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RankDirection {
    Top,
    Bottom,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComparisonKind {
    Month,
    Shift,
    Equipment,
    Date,
}

/// Two entities of the same kind being compared.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comparison {
    pub entity_a: String,
    pub entity_b: String,
    pub kind: ComparisonKind,
}

// ── Statistical template ───────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatOp {
    Count,
    Mean,
    Median,
    Mode,
    /// Population standard deviation.
    StdDev,
    Min,
    Max,
    Sum,
}

impl StatOp {
    /// Operation set used when a general statistical analysis is requested.
    pub const FULL: [StatOp; 8] = [
        StatOp::Count,
        StatOp::Mean,
        StatOp::Median,
        StatOp::Mode,
        StatOp::StdDev,
        StatOp::Min,
        StatOp::Max,
        StatOp::Sum,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            StatOp::Count => "count",
            StatOp::Mean => "mean",
            StatOp::Median => "median",
            StatOp::Mode => "mode",
            StatOp::StdDev => "std_dev",
            StatOp::Min => "min",
            StatOp::Max => "max",
            StatOp::Sum => "sum",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupDim {
    Shift,
    Month,
    Date,
    Tipper,
    Excavator,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterDim {
    Date,
    DateRange,
    Month,
    Year,
    Shift,
    Equipment,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatQueryType {
    /// One row of statistics over the filtered set.
    Aggregate,
    /// One row of statistics per group.
    Grouped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    Asc,
    Desc,
}

/// Statistical request shape extracted from text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatTemplate {
    pub operations: Vec<StatOp>,
    pub target_column: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_by: Option<GroupDim>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub filters: Vec<FilterDim>,
    pub query_type: StatQueryType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_by: Option<SortOrder>,
}

// ── Parameters ─────────────────────────────────────────────────

/// Structured constraints extracted from a question.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawParameters")]
pub struct Parameters {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_range: Option<DateRange>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub month: Option<Month>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub year: Option<i32>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub shifts: Vec<Shift>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub equipment: Vec<EquipmentId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comparison: Option<Comparison>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rank: Option<RankDirection>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub row_ordinal: Option<RowOrdinal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stats: Option<StatTemplate>,
}

/// Unvalidated wire form of [`Parameters`] (model output, stored context).
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawParameters {
    pub date: Option<NaiveDate>,
    pub date_range: Option<DateRange>,
    pub month: Option<u32>,
    pub year: Option<i32>,
    pub shifts: Vec<String>,
    pub equipment: Vec<String>,
    pub comparison: Option<Comparison>,
    pub rank: Option<RankDirection>,
    pub row_ordinal: Option<RowOrdinal>,
    pub limit: Option<u32>,
    pub stats: Option<StatTemplate>,
}

impl TryFrom<RawParameters> for Parameters {
    type Error = ParamError;

    fn try_from(raw: RawParameters) -> Result<Self, Self::Error> {
        let month = raw.month.map(Month::new).transpose()?;
        let shifts = raw
            .shifts
            .iter()
            .map(|s| s.parse::<Shift>())
            .collect::<Result<Vec<_>, _>>()?;
        let equipment = raw
            .equipment
            .iter()
            .map(|e| EquipmentId::parse(e))
            .collect::<Result<Vec<_>, _>>()?;
        if let Some(limit) = raw.limit {
            check_limit(limit)?;
        }
        if let Some(RowOrdinal::Nth(0)) = raw.row_ordinal {
            return Err(ParamError::InvalidOrdinal);
        }
        let mut params = Parameters {
            date: raw.date,
            date_range: raw.date_range,
            month,
            year: raw.year,
            shifts: Vec::new(),
            equipment: Vec::new(),
            comparison: raw.comparison,
            rank: raw.rank,
            row_ordinal: raw.row_ordinal,
            limit: raw.limit,
            stats: raw.stats,
        };
        for shift in shifts {
            params.add_shift(shift);
        }
        for id in equipment {
            params.add_equipment(id);
        }
        Ok(params)
    }
}

fn check_limit(limit: u32) -> Result<(), ParamError> {
    if limit == 0 || limit > MAX_LIMIT {
        return Err(ParamError::InvalidLimit(limit));
    }
    Ok(())
}

impl Parameters {
    pub fn with_month(mut self, month: u32) -> Result<Self, ParamError> {
        self.month = Some(Month::new(month)?);
        Ok(self)
    }

    pub fn with_year(mut self, year: i32) -> Self {
        self.year = Some(year);
        self
    }

    pub fn with_limit(mut self, limit: u32) -> Result<Self, ParamError> {
        check_limit(limit)?;
        self.limit = Some(limit);
        Ok(self)
    }

    pub fn with_shift(mut self, shift: Shift) -> Self {
        self.add_shift(shift);
        self
    }

    /// Append a shift, keeping the list free of duplicates.
    pub fn add_shift(&mut self, shift: Shift) {
        if !self.shifts.contains(&shift) {
            self.shifts.push(shift);
        }
    }

    /// Append an equipment id, keeping the list free of duplicates.
    pub fn add_equipment(&mut self, id: EquipmentId) {
        if !self.equipment.contains(&id) {
            self.equipment.push(id);
        }
    }

    /// True when no field is populated.
    pub fn is_empty(&self) -> bool {
        *self == Parameters::default()
    }

    /// Names of populated fields, for logging and reasons.
    pub fn populated_fields(&self) -> Vec<&'static str> {
        let mut fields = Vec::new();
        if self.date.is_some() {
            fields.push("date");
        }
        if self.date_range.is_some() {
            fields.push("date_range");
        }
        if self.month.is_some() {
            fields.push("month");
        }
        if self.year.is_some() {
            fields.push("year");
        }
        if !self.shifts.is_empty() {
            fields.push("shifts");
        }
        if !self.equipment.is_empty() {
            fields.push("equipment");
        }
        if self.comparison.is_some() {
            fields.push("comparison");
        }
        if self.rank.is_some() {
            fields.push("rank");
        }
        if self.row_ordinal.is_some() {
            fields.push("row_ordinal");
        }
        if self.limit.is_some() {
            fields.push("limit");
        }
        if self.stats.is_some() {
            fields.push("stats");
        }
        fields
    }

    /// Merge `self` (the newer turn) over `inherited`.
    ///
    /// Populated fields of `self` win; unset fields keep the inherited value.
    /// A new date, date range or month replaces the whole inherited time
    /// window so the merged record never carries two conflicting windows.
    pub fn merged_over(&self, inherited: &Parameters) -> Parameters {
        let new_window =
            self.date.is_some() || self.date_range.is_some() || self.month.is_some();
        let (date, date_range, month) = if new_window {
            (self.date, self.date_range, self.month)
        } else {
            (inherited.date, inherited.date_range, inherited.month)
        };

        Parameters {
            date,
            date_range,
            month,
            year: self.year.or(inherited.year),
            shifts: if self.shifts.is_empty() {
                inherited.shifts.clone()
            } else {
                self.shifts.clone()
            },
            equipment: if self.equipment.is_empty() {
                inherited.equipment.clone()
            } else {
                self.equipment.clone()
            },
            comparison: self.comparison.clone().or_else(|| inherited.comparison.clone()),
            rank: self.rank.or(inherited.rank),
            row_ordinal: self.row_ordinal.or(inherited.row_ordinal),
            limit: self.limit.or(inherited.limit),
            stats: self.stats.clone().or_else(|| inherited.stats.clone()),
        }
    }
}
