#![deny(warnings)]

//! Core domain models and invariants for the quest tracker.
//!
//! This crate defines the serializable types shared by the recurrence
//! calculator, the expansion engine and the stores: recurrence rules, the
//! quests they generate, and validation helpers that guard rule invariants
//! before a rule is ever saved.

use chrono::{Datelike, NaiveDate, NaiveTime, Weekday};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Unique identifier of a recurrence rule.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RuleId(pub String);

impl RuleId {
    /// Fresh random identifier (UUID v4).
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}

impl fmt::Display for RuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Unique identifier of a quest instance.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct QuestId(pub String);

impl QuestId {
    /// Fresh random identifier (UUID v4).
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}

impl fmt::Display for QuestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Quest difficulty; determines the XP awarded on completion.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum QuestRank {
    #[default]
    Common,
    Rare,
    Epic,
    Legendary,
}

impl QuestRank {
    /// XP earned when a quest of this rank is completed.
    pub fn xp(self) -> u32 {
        match self {
            QuestRank::Common => 25,
            QuestRank::Rare => 50,
            QuestRank::Epic => 75,
            QuestRank::Legendary => 100,
        }
    }
}

impl FromStr for QuestRank {
    type Err = LabelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "common" => Ok(QuestRank::Common),
            "rare" => Ok(QuestRank::Rare),
            "epic" => Ok(QuestRank::Epic),
            "legendary" => Ok(QuestRank::Legendary),
            _ => Err(LabelError::UnknownRank(s.to_string())),
        }
    }
}

impl fmt::Display for QuestRank {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            QuestRank::Common => "Common",
            QuestRank::Rare => "Rare",
            QuestRank::Epic => "Epic",
            QuestRank::Legendary => "Legendary",
        };
        f.write_str(s)
    }
}

/// Progress state of a quest.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum QuestStatus {
    #[default]
    Pending,
    #[serde(rename = "In Progress")]
    InProgress,
    Completed,
    Incomplete,
}

impl QuestStatus {
    /// Label used in storage and on screen.
    pub fn label(self) -> &'static str {
        match self {
            QuestStatus::Pending => "Pending",
            QuestStatus::InProgress => "In Progress",
            QuestStatus::Completed => "Completed",
            QuestStatus::Incomplete => "Incomplete",
        }
    }
}

impl fmt::Display for QuestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for QuestStatus {
    type Err = LabelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(QuestStatus::Pending),
            "in progress" | "in_progress" => Ok(QuestStatus::InProgress),
            "completed" => Ok(QuestStatus::Completed),
            "incomplete" => Ok(QuestStatus::Incomplete),
            _ => Err(LabelError::UnknownStatus(s.to_string())),
        }
    }
}

/// How often a rule repeats.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Frequency {
    Daily,
    Weekly,
    /// Monday through Friday.
    Weekdays,
    Monthly,
    Annual,
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Frequency::Daily => "Daily",
            Frequency::Weekly => "Weekly",
            Frequency::Weekdays => "Weekdays",
            Frequency::Monthly => "Monthly",
            Frequency::Annual => "Annual",
        };
        f.write_str(s)
    }
}

/// Errors parsing human-entered labels.
#[derive(Debug, Error, PartialEq)]
pub enum LabelError {
    #[error("unknown weekday label: {0:?}")]
    UnknownWeekday(String),
    #[error("week index must be 1..=5 or -1, got {0}")]
    InvalidWeekIndex(i8),
    #[error("unknown quest status: {0:?}")]
    UnknownStatus(String),
    #[error("unknown quest rank: {0:?}")]
    UnknownRank(String),
}

const WEEK: [Weekday; 7] = [
    Weekday::Mon,
    Weekday::Tue,
    Weekday::Wed,
    Weekday::Thu,
    Weekday::Fri,
    Weekday::Sat,
    Weekday::Sun,
];

/// Parse a weekday label. Three-letter and full names, any case.
pub fn parse_weekday(label: &str) -> Result<Weekday, LabelError> {
    match label.trim().to_ascii_lowercase().as_str() {
        "mon" | "monday" => Ok(Weekday::Mon),
        "tue" | "tuesday" => Ok(Weekday::Tue),
        "wed" | "wednesday" => Ok(Weekday::Wed),
        "thu" | "thursday" => Ok(Weekday::Thu),
        "fri" | "friday" => Ok(Weekday::Fri),
        "sat" | "saturday" => Ok(Weekday::Sat),
        "sun" | "sunday" => Ok(Weekday::Sun),
        _ => Err(LabelError::UnknownWeekday(label.trim().to_string())),
    }
}

/// Canonical three-letter label.
pub fn weekday_label(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "Mon",
        Weekday::Tue => "Tue",
        Weekday::Wed => "Wed",
        Weekday::Thu => "Thu",
        Weekday::Fri => "Fri",
        Weekday::Sat => "Sat",
        Weekday::Sun => "Sun",
    }
}

/// Set of weekdays a weekly rule fires on.
///
/// Encoded on the wire as a comma-separated label list, e.g. `"Mon, Fri"`.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct WeekdaySet(u8);

impl WeekdaySet {
    pub fn new() -> Self {
        Self(0)
    }

    pub fn insert(&mut self, day: Weekday) {
        self.0 |= 1 << day.num_days_from_monday();
    }

    pub fn contains(&self, day: Weekday) -> bool {
        self.0 & (1 << day.num_days_from_monday()) != 0
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn len(&self) -> usize {
        self.0.count_ones() as usize
    }

    /// Days in Monday-first order.
    pub fn iter(&self) -> impl Iterator<Item = Weekday> + '_ {
        WEEK.iter().copied().filter(move |d| self.contains(*d))
    }
}

impl FromIterator<Weekday> for WeekdaySet {
    fn from_iter<I: IntoIterator<Item = Weekday>>(iter: I) -> Self {
        let mut set = WeekdaySet::new();
        for day in iter {
            set.insert(day);
        }
        set
    }
}

impl fmt::Debug for WeekdaySet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter().map(weekday_label)).finish()
    }
}

impl fmt::Display for WeekdaySet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let labels: Vec<&str> = self.iter().map(weekday_label).collect();
        f.write_str(&labels.join(", "))
    }
}

impl FromStr for WeekdaySet {
    type Err = LabelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut set = WeekdaySet::new();
        for part in s.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            set.insert(parse_weekday(part)?);
        }
        Ok(set)
    }
}

impl Serialize for WeekdaySet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for WeekdaySet {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(serde::de::Error::custom)
    }
}

/// Which occurrence of a weekday inside a month: 1st..5th, or the last one.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "i8", into = "i8")]
pub enum WeekIndex {
    First,
    Second,
    Third,
    Fourth,
    Fifth,
    Last,
}

impl WeekIndex {
    /// 1-based ordinal, `None` for [`WeekIndex::Last`].
    pub fn ordinal(self) -> Option<u32> {
        match self {
            WeekIndex::First => Some(1),
            WeekIndex::Second => Some(2),
            WeekIndex::Third => Some(3),
            WeekIndex::Fourth => Some(4),
            WeekIndex::Fifth => Some(5),
            WeekIndex::Last => None,
        }
    }
}

impl TryFrom<i8> for WeekIndex {
    type Error = LabelError;

    fn try_from(value: i8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(WeekIndex::First),
            2 => Ok(WeekIndex::Second),
            3 => Ok(WeekIndex::Third),
            4 => Ok(WeekIndex::Fourth),
            5 => Ok(WeekIndex::Fifth),
            -1 => Ok(WeekIndex::Last),
            other => Err(LabelError::InvalidWeekIndex(other)),
        }
    }
}

impl From<WeekIndex> for i8 {
    fn from(index: WeekIndex) -> Self {
        match index.ordinal() {
            Some(n) => n as i8,
            None => -1,
        }
    }
}

/// Day selection for monthly rules.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum MonthlySpec {
    /// Fixed day of month (1..=31); clamps to the last day of shorter months.
    Date { on_date: u8 },
    /// The nth (or last) given weekday of the month.
    Weekday {
        week_index: WeekIndex,
        weekday: Weekday,
    },
}

/// When a rule stops producing quests.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EndCondition {
    #[default]
    Never,
    /// Last date (inclusive) the rule may fire.
    OnDate { until_date: NaiveDate },
    /// Maximum number of firings.
    After { count: u32 },
}

fn default_interval() -> u32 {
    1
}

/// A recurrence rule that generates quest instances over time.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    /// Immutable identifier.
    pub id: RuleId,
    /// Name given to generated quests.
    pub task_name: String,
    /// Rank carried onto generated quests.
    pub quest_rank: QuestRank,
    /// Base repetition unit.
    pub frequency: Frequency,
    /// Every N units (>= 1). Ignored for `Weekdays`.
    #[serde(default = "default_interval")]
    pub interval: u32,
    /// Weekly firing days; empty means the anchor's weekday.
    #[serde(default, skip_serializing_if = "WeekdaySet::is_empty")]
    pub days: WeekdaySet,
    /// Monthly day selection; `None` means the anchor's day of month.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub monthly: Option<MonthlySpec>,
    /// End condition.
    #[serde(default)]
    pub ends: EndCondition,
    /// Status given to generated quests.
    #[serde(default)]
    pub status: QuestStatus,
    /// Reference date for interval arithmetic; the rule never fires before it.
    pub anchor_date: NaiveDate,
    /// Date of the most recent firing.
    #[serde(default)]
    pub last_fired_date: Option<NaiveDate>,
    /// Number of firings so far.
    #[serde(default)]
    pub fired_count: u32,
}

impl Rule {
    pub fn anchor_weekday(&self) -> Weekday {
        self.anchor_date.weekday()
    }

    /// Bookkeeping after a successful firing on `date`.
    ///
    /// `last_fired_date` only moves forward, so backfilling an earlier date
    /// still counts the firing without rewinding it.
    pub fn record_firing(&mut self, date: NaiveDate) {
        self.fired_count = self.fired_count.saturating_add(1);
        self.last_fired_date = Some(match self.last_fired_date {
            Some(last) => last.max(date),
            None => date,
        });
    }
}

/// User input for a new rule, before an id and bookkeeping are assigned.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RuleDraft {
    pub task_name: String,
    #[serde(default)]
    pub quest_rank: QuestRank,
    pub frequency: Frequency,
    #[serde(default = "default_interval")]
    pub interval: u32,
    #[serde(default)]
    pub days: WeekdaySet,
    #[serde(default)]
    pub monthly: Option<MonthlySpec>,
    #[serde(default)]
    pub ends: EndCondition,
    #[serde(default)]
    pub status: QuestStatus,
    /// Defaults to the creation date.
    #[serde(default)]
    pub anchor_date: Option<NaiveDate>,
}

impl RuleDraft {
    pub fn into_rule(self, id: RuleId, today: NaiveDate) -> Rule {
        Rule {
            id,
            task_name: self.task_name.trim().to_string(),
            quest_rank: self.quest_rank,
            frequency: self.frequency,
            interval: self.interval,
            days: self.days,
            monthly: self.monthly,
            ends: self.ends,
            status: self.status,
            anchor_date: self.anchor_date.unwrap_or(today),
            last_fired_date: None,
            fired_count: 0,
        }
    }
}

/// A stored quest instance.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Quest {
    pub id: QuestId,
    pub quest_name: String,
    pub quest_rank: QuestRank,
    pub due_date: NaiveDate,
    #[serde(default)]
    pub due_time: Option<NaiveTime>,
    #[serde(default)]
    pub duration_minutes: Option<u32>,
    #[serde(default)]
    pub status: QuestStatus,
    /// Rule that generated this quest, if any.
    #[serde(default)]
    pub source_rule: Option<RuleId>,
}

/// Quest creation command.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NewQuest {
    pub quest_name: String,
    pub quest_rank: QuestRank,
    pub due_date: NaiveDate,
    #[serde(default)]
    pub due_time: Option<NaiveTime>,
    #[serde(default)]
    pub duration_minutes: Option<u32>,
    #[serde(default)]
    pub status: QuestStatus,
    #[serde(default)]
    pub source_rule: Option<RuleId>,
}

impl NewQuest {
    /// The quest a rule generates for `date`.
    pub fn from_rule(rule: &Rule, date: NaiveDate) -> Self {
        Self {
            quest_name: rule.task_name.clone(),
            quest_rank: rule.quest_rank,
            due_date: date,
            due_time: None,
            duration_minutes: None,
            status: rule.status,
            source_rule: Some(rule.id.clone()),
        }
    }

    pub fn into_quest(self, id: QuestId) -> Quest {
        Quest {
            id,
            quest_name: self.quest_name,
            quest_rank: self.quest_rank,
            due_date: self.due_date,
            due_time: self.due_time,
            duration_minutes: self.duration_minutes,
            status: self.status,
            source_rule: self.source_rule,
        }
    }
}

/// Validation errors for domain invariants.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ValidationError {
    /// Year outside supported range [1970, 2100].
    #[error("year {0} is out of supported range [1970, 2100]")]
    YearOutOfRange(i32),
    /// Names must contain something besides whitespace.
    #[error("name must not be empty")]
    EmptyName,
    /// Interval must be at least one unit.
    #[error("interval must be >= 1")]
    ZeroInterval,
    /// Monthly day outside 1..=31.
    #[error("monthly day {0} is out of range [1, 31]")]
    MonthDayOutOfRange(u8),
    /// Monthly pattern on a rule that is not monthly.
    #[error("monthly pattern given for a {0} rule")]
    MonthlyOnNonMonthly(Frequency),
    /// `after` end condition with zero firings.
    #[error("end count must be >= 1")]
    ZeroCount,
    /// `on_date` end condition before the anchor date.
    #[error("until date {until} is before anchor date {anchor}")]
    UntilBeforeAnchor { until: NaiveDate, anchor: NaiveDate },
    /// Duration must be positive when present.
    #[error("duration must be > 0 minutes")]
    ZeroDuration,
}

/// Validate a calendar date used as an anchor, due date or run target.
pub fn validate_date(date: NaiveDate) -> Result<(), ValidationError> {
    if !(1970..=2100).contains(&date.year()) {
        return Err(ValidationError::YearOutOfRange(date.year()));
    }
    Ok(())
}

/// Validate a rule before it is saved or expanded.
pub fn validate_rule(rule: &Rule) -> Result<(), ValidationError> {
    if rule.task_name.trim().is_empty() {
        return Err(ValidationError::EmptyName);
    }
    if rule.interval == 0 {
        return Err(ValidationError::ZeroInterval);
    }
    validate_date(rule.anchor_date)?;
    if let Some(spec) = rule.monthly {
        if rule.frequency != Frequency::Monthly {
            return Err(ValidationError::MonthlyOnNonMonthly(rule.frequency));
        }
        if let MonthlySpec::Date { on_date } = spec {
            if !(1..=31).contains(&on_date) {
                return Err(ValidationError::MonthDayOutOfRange(on_date));
            }
        }
    }
    match rule.ends {
        EndCondition::Never => {}
        EndCondition::After { count } => {
            if count == 0 {
                return Err(ValidationError::ZeroCount);
            }
        }
        EndCondition::OnDate { until_date } => {
            validate_date(until_date)?;
            if until_date < rule.anchor_date {
                return Err(ValidationError::UntilBeforeAnchor {
                    until: until_date,
                    anchor: rule.anchor_date,
                });
            }
        }
    }
    Ok(())
}

/// Validate a quest creation command.
pub fn validate_new_quest(quest: &NewQuest) -> Result<(), ValidationError> {
    if quest.quest_name.trim().is_empty() {
        return Err(ValidationError::EmptyName);
    }
    validate_date(quest.due_date)?;
    if quest.duration_minutes == Some(0) {
        return Err(ValidationError::ZeroDuration);
    }
    Ok(())
}
