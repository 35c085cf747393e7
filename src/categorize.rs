//! Failure categorization by error code
//!
//! The error-code table is a closed mapping validated when it is loaded.
//! Lookups are total: any code outside the table is [`FailureCategory::Unknown`].
//! A [`Categorizer`] memoizes its answers for the lifetime of one analysis run
//! and is dropped with it, so a code can never map to two categories in a run.

use crate::error::{ConfigError, InputError};
use crate::record::{Condition, RecordStore, TestType};
use crate::stats::{self, Statistic, UndefinedReason};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::sync::OnceLock;

/// Root-cause family of a failing test
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureCategory {
    Timing,
    Overcurrent,
    DataCorruption,
    Thermal,
    Unknown,
}

impl FailureCategory {
    pub const ALL: [FailureCategory; 5] = [
        FailureCategory::Timing,
        FailureCategory::Overcurrent,
        FailureCategory::DataCorruption,
        FailureCategory::Thermal,
        FailureCategory::Unknown,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            FailureCategory::Timing => "Timing Failure",
            FailureCategory::Overcurrent => "Overcurrent",
            FailureCategory::DataCorruption => "Data Corruption",
            FailureCategory::Thermal => "Thermal Issue",
            FailureCategory::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for FailureCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

fn identifier_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[A-Za-z0-9][A-Za-z0-9_.\-]*$").expect("identifier pattern compiles")
    })
}

/// Whether `code` is a well-formed error-code identifier
pub fn is_valid_error_code(code: &str) -> bool {
    identifier_pattern().is_match(code)
}

/// One category and the error codes that map to it (TOML `[[category_map]]`)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryMapping {
    pub category: FailureCategory,
    pub codes: Vec<String>,
}

/// Closed error-code → category lookup
///
/// # Example TOML
/// ```toml
/// [[category_map]]
/// category = "timing"
/// codes = ["ERR_T01", "ERR_T02"]
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<CategoryMapping>", into = "Vec<CategoryMapping>")]
pub struct CategoryTable {
    lookup: BTreeMap<String, FailureCategory>,
}

impl CategoryTable {
    /// Build and validate a table; rejects malformed and duplicated codes
    pub fn from_mappings(mappings: Vec<CategoryMapping>) -> Result<Self, ConfigError> {
        let mut lookup = BTreeMap::new();
        for mapping in mappings {
            for code in mapping.codes {
                if !is_valid_error_code(&code) {
                    return Err(ConfigError::InvalidErrorCode { code });
                }
                if let Some(existing) = lookup.get(&code) {
                    return Err(ConfigError::DuplicateErrorCode {
                        first: format!("{existing:?}"),
                        second: format!("{:?}", mapping.category),
                        code,
                    });
                }
                lookup.insert(code, mapping.category);
            }
        }
        Ok(Self { lookup })
    }

    /// Total lookup: codes outside the table are `Unknown`
    pub fn lookup(&self, code: &str) -> FailureCategory {
        self.lookup
            .get(code)
            .copied()
            .unwrap_or(FailureCategory::Unknown)
    }

    pub fn len(&self) -> usize {
        self.lookup.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lookup.is_empty()
    }

    pub fn codes(&self) -> impl Iterator<Item = (&str, FailureCategory)> {
        self.lookup.iter().map(|(k, v)| (k.as_str(), *v))
    }
}

impl Default for CategoryTable {
    /// Error codes emitted by the production test floor
    fn default() -> Self {
        use FailureCategory::{DataCorruption, Overcurrent, Thermal, Timing};
        let pairs: [(&str, FailureCategory); 18] = [
            ("ERR_T01", Timing),
            ("ERR_T02", Timing),
            ("ERR_T03", Timing),
            ("ERR_V01", Overcurrent),
            ("ERR_V02", Overcurrent),
            ("ERR_B01", Thermal),
            ("ERR_B02", Thermal),
            ("ERR_B03", DataCorruption),
            ("ERR_S01", Thermal),
            ("ERR_S02", DataCorruption),
            ("ERR_D01", DataCorruption),
            ("ERR_D02", DataCorruption),
            ("ERR_F01", Timing),
            ("ERR_F02", Overcurrent),
            ("ERR_L01", Overcurrent),
            ("ERR_L02", Thermal),
            ("ERR_P01", DataCorruption),
            ("ERR_P02", Overcurrent),
        ];
        Self {
            lookup: pairs
                .into_iter()
                .map(|(code, cat)| (code.to_string(), cat))
                .collect(),
        }
    }
}

impl TryFrom<Vec<CategoryMapping>> for CategoryTable {
    type Error = ConfigError;

    fn try_from(mappings: Vec<CategoryMapping>) -> Result<Self, Self::Error> {
        Self::from_mappings(mappings)
    }
}

impl From<CategoryTable> for Vec<CategoryMapping> {
    fn from(table: CategoryTable) -> Self {
        let mut grouped: BTreeMap<FailureCategory, Vec<String>> = BTreeMap::new();
        for (code, category) in table.lookup {
            grouped.entry(category).or_default().push(code);
        }
        grouped
            .into_iter()
            .map(|(category, codes)| CategoryMapping { category, codes })
            .collect()
    }
}

/// Run-scoped categorizer with a memo of every code it has resolved
#[derive(Debug)]
pub struct Categorizer<'t> {
    table: &'t CategoryTable,
    cache: HashMap<String, FailureCategory>,
}

impl<'t> Categorizer<'t> {
    pub fn new(table: &'t CategoryTable) -> Self {
        Self {
            table,
            cache: HashMap::new(),
        }
    }

    /// Category of an error code; never fails
    pub fn categorize(&mut self, code: &str) -> FailureCategory {
        if let Some(category) = self.cache.get(code) {
            return *category;
        }
        let category = self.table.lookup(code);
        self.cache.insert(code.to_string(), category);
        category
    }

    /// Number of distinct codes resolved so far in this run
    pub fn cached_codes(&self) -> usize {
        self.cache.len()
    }

    /// Category of every record, by index: `None` for passing records and for
    /// failing records without an error code
    pub fn assign(&mut self, store: &RecordStore) -> Vec<Option<FailureCategory>> {
        store
            .records()
            .iter()
            .map(|record| match record.error_code.as_deref().map(str::trim) {
                Some(code) if record.failed && !code.is_empty() => Some(self.categorize(code)),
                _ => None,
            })
            .collect()
    }

    /// Categorize every failing record and summarize by category and code
    ///
    /// Every failing record must carry a non-empty error code.
    pub fn analyze(&mut self, store: &RecordStore) -> Result<CategoryReport, InputError> {
        #[derive(Default)]
        struct Group {
            count: usize,
            codes: BTreeSet<String>,
            temperatures: Vec<f64>,
            voltages: Vec<f64>,
        }

        #[derive(Default)]
        struct CodeGroup {
            count: usize,
            temperatures: Vec<f64>,
            voltages: Vec<f64>,
            execution_times: Vec<f64>,
        }

        store.require_non_empty()?;

        let mut by_category: BTreeMap<FailureCategory, Group> = BTreeMap::new();
        let mut by_code: BTreeMap<(String, TestType), (FailureCategory, CodeGroup)> =
            BTreeMap::new();
        let mut total_failures = 0usize;

        for (index, record) in store.records().iter().enumerate() {
            if !record.failed {
                continue;
            }
            let code = match record.error_code.as_deref().map(str::trim) {
                Some(code) if !code.is_empty() => code,
                _ => {
                    return Err(InputError::MissingField {
                        index,
                        field: "error_code",
                    })
                }
            };
            total_failures += 1;
            let category = self.categorize(code);
            let temperature = store.optional_reading(index, Condition::Temperature)?;
            let voltage = store.optional_reading(index, Condition::Voltage)?;
            let execution_time = store.optional_reading(index, Condition::ExecutionTime)?;

            let group = by_category.entry(category).or_default();
            group.count += 1;
            group.codes.insert(code.to_string());
            group.temperatures.extend(temperature);
            group.voltages.extend(voltage);

            let (_, code_group) = by_code
                .entry((code.to_string(), record.test_type))
                .or_insert_with(|| (category, CodeGroup::default()));
            code_group.count += 1;
            code_group.temperatures.extend(temperature);
            code_group.voltages.extend(voltage);
            code_group.execution_times.extend(execution_time);
        }

        let categories = FailureCategory::ALL
            .into_iter()
            .map(|category| {
                let group = by_category.remove(&category).unwrap_or_default();
                CategoryBreakdown {
                    category,
                    count: group.count,
                    rate: stats::rate(group.count, total_failures),
                    distinct_error_codes: group.codes.len(),
                    mean_temperature: mean_or_empty(&group.temperatures),
                    mean_voltage: mean_or_empty(&group.voltages),
                }
            })
            .collect();

        let mut error_codes: Vec<ErrorCodeSummary> = by_code
            .into_iter()
            .map(|((error_code, test_type), (category, g))| ErrorCodeSummary {
                error_code,
                test_type,
                category,
                count: g.count,
                mean_temperature: mean_or_empty(&g.temperatures),
                mean_voltage: mean_or_empty(&g.voltages),
                mean_execution_time: mean_or_empty(&g.execution_times),
            })
            .collect();
        // BTreeMap order already breaks ties by (code, test type)
        error_codes.sort_by(|a, b| b.count.cmp(&a.count));

        tracing::debug!(
            failures = total_failures,
            codes = self.cached_codes(),
            "categorized failing records"
        );

        Ok(CategoryReport {
            total_failures,
            categories,
            error_codes,
        })
    }
}

fn mean_or_empty(values: &[f64]) -> Statistic {
    stats::mean(values)
        .map(Statistic::value)
        .unwrap_or(Statistic::undefined(UndefinedReason::EmptyGroup))
}

/// Failures attributed to one category
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryBreakdown {
    pub category: FailureCategory,
    pub count: usize,
    /// Share of all failures
    pub rate: Statistic,
    pub distinct_error_codes: usize,
    pub mean_temperature: Statistic,
    pub mean_voltage: Statistic,
}

/// Failures sharing one error code on one test type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorCodeSummary {
    pub error_code: String,
    pub test_type: TestType,
    pub category: FailureCategory,
    pub count: usize,
    pub mean_temperature: Statistic,
    pub mean_voltage: Statistic,
    pub mean_execution_time: Statistic,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryReport {
    pub total_failures: usize,
    /// Every category in declaration order, including empty ones
    pub categories: Vec<CategoryBreakdown>,
    /// Sorted by count descending, then error code and test type
    pub error_codes: Vec<ErrorCodeSummary>,
}

impl CategoryReport {
    pub fn get(&self, category: FailureCategory) -> Option<&CategoryBreakdown> {
        self.categories.iter().find(|c| c.category == category)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::fixtures::{fail, pass};

    #[test]
    fn test_known_codes_map_to_categories() {
        let table = CategoryTable::default();
        let mut c = Categorizer::new(&table);
        assert_eq!(c.categorize("ERR_T01"), FailureCategory::Timing);
        assert_eq!(c.categorize("ERR_V02"), FailureCategory::Overcurrent);
        assert_eq!(c.categorize("ERR_B03"), FailureCategory::DataCorruption);
        assert_eq!(c.categorize("ERR_L02"), FailureCategory::Thermal);
    }

    #[test]
    fn test_unmapped_code_is_unknown() {
        let table = CategoryTable::default();
        let mut c = Categorizer::new(&table);
        assert_eq!(c.categorize("ERR_X99"), FailureCategory::Unknown);
        assert_eq!(c.categorize("not a code at all"), FailureCategory::Unknown);
    }

    #[test]
    fn test_cache_is_per_categorizer() {
        let table = CategoryTable::default();
        let mut c = Categorizer::new(&table);
        c.categorize("ERR_T01");
        c.categorize("ERR_T01");
        c.categorize("ERR_Z00");
        assert_eq!(c.cached_codes(), 2);

        let fresh = Categorizer::new(&table);
        assert_eq!(fresh.cached_codes(), 0);
    }

    #[test]
    fn test_assign_skips_passing_records() {
        let store = RecordStore::new(vec![
            pass("D1", "B1", (2025, 1, 1)),
            fail("D2", "B1", (2025, 1, 1), "ERR_D01"),
        ]);
        let table = CategoryTable::default();
        let assigned = Categorizer::new(&table).assign(&store);
        assert_eq!(assigned, vec![None, Some(FailureCategory::DataCorruption)]);
    }

    #[test]
    fn test_table_rejects_duplicate_codes() {
        let result = CategoryTable::from_mappings(vec![
            CategoryMapping {
                category: FailureCategory::Timing,
                codes: vec!["E1".into()],
            },
            CategoryMapping {
                category: FailureCategory::Thermal,
                codes: vec!["E1".into()],
            },
        ]);
        assert!(matches!(
            result,
            Err(ConfigError::DuplicateErrorCode { .. })
        ));
    }

    #[test]
    fn test_table_rejects_malformed_codes() {
        let result = CategoryTable::from_mappings(vec![CategoryMapping {
            category: FailureCategory::Timing,
            codes: vec!["ERR T01".into()],
        }]);
        assert!(matches!(result, Err(ConfigError::InvalidErrorCode { .. })));
    }

    #[test]
    fn test_analyze_counts_and_rates() {
        let store = RecordStore::new(vec![
            pass("D1", "B1", (2025, 1, 1)),
            fail("D2", "B1", (2025, 1, 1), "ERR_T01"),
            fail("D3", "B1", (2025, 1, 2), "ERR_T02"),
            fail("D4", "B2", (2025, 1, 2), "ERR_V01"),
            fail("D5", "B2", (2025, 1, 3), "ERR_QQQ"),
        ]);
        let table = CategoryTable::default();
        let report = Categorizer::new(&table).analyze(&store).unwrap();

        assert_eq!(report.total_failures, 4);
        let timing = report.get(FailureCategory::Timing).unwrap();
        assert_eq!(timing.count, 2);
        assert_eq!(timing.rate.as_value(), Some(0.5));
        assert_eq!(timing.distinct_error_codes, 2);

        let unknown = report.get(FailureCategory::Unknown).unwrap();
        assert_eq!(unknown.count, 1);

        let thermal = report.get(FailureCategory::Thermal).unwrap();
        assert_eq!(thermal.count, 0);
        assert!(thermal.mean_temperature.is_undefined());

        assert_eq!(report.error_codes.len(), 4);
        assert_eq!(report.error_codes[0].error_code, "ERR_QQQ");
    }

    #[test]
    fn test_analyze_without_failures_has_undefined_rates() {
        let store = RecordStore::new(vec![pass("D1", "B1", (2025, 1, 1))]);
        let table = CategoryTable::default();
        let report = Categorizer::new(&table).analyze(&store).unwrap();
        assert_eq!(report.total_failures, 0);
        assert!(report.categories.iter().all(|c| c.rate.is_undefined()));
    }

    #[test]
    fn test_failing_record_without_code_is_rejected() {
        let mut r = fail("D1", "B1", (2025, 1, 1), "ERR_T01");
        r.error_code = Some("  ".into());
        let store = RecordStore::new(vec![r]);
        let table = CategoryTable::default();
        let err = Categorizer::new(&table).analyze(&store).unwrap_err();
        assert_eq!(
            err,
            InputError::MissingField {
                index: 0,
                field: "error_code"
            }
        );
    }

    #[test]
    fn test_table_toml_round_trip() {
        #[derive(Serialize, Deserialize)]
        struct Wrapper {
            category_map: CategoryTable,
        }
        let text = r#"
            [[category_map]]
            category = "timing"
            codes = ["ERR_T01", "ERR_F01"]

            [[category_map]]
            category = "thermal"
            codes = ["ERR_B01"]
        "#;
        let parsed: Wrapper = toml::from_str(text).unwrap();
        assert_eq!(parsed.category_map.len(), 3);
        assert_eq!(parsed.category_map.lookup("ERR_F01"), FailureCategory::Timing);
    }
}
