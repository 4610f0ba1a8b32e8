use std::collections::BTreeSet;

use serde::Serialize;
use tracing::{info, warn};

use crate::models::{AttributeColumns, DemographicSelection, RespondentRecord, TranscriptTable};

/// Predicates that survive column availability checks
#[derive(Debug, Clone, Copy)]
struct ActivePredicates<'a> {
    age_range: Option<(i64, i64)>,
    genders: Option<&'a BTreeSet<String>>,
    regions: Option<&'a BTreeSet<String>>,
}

impl<'a> ActivePredicates<'a> {
    /// A predicate on a column the table lacks is dropped, not an error
    fn resolve(columns: AttributeColumns, selection: &'a DemographicSelection) -> Self {
        let mut predicates = Self {
            age_range: selection.age_range,
            genders: selection.gender_in.as_ref(),
            regions: selection.region_in.as_ref(),
        };

        if predicates.age_range.is_some() && !columns.age {
            warn!("Table has no age column, ignoring age filter");
            predicates.age_range = None;
        }
        if predicates.genders.is_some() && !columns.gender {
            warn!("Table has no gender column, ignoring gender filter");
            predicates.genders = None;
        }
        if predicates.regions.is_some() && !columns.region {
            warn!("Table has no region column, ignoring region filter");
            predicates.regions = None;
        }

        predicates
    }

    /// A row missing the attribute of an active predicate does not match
    fn matches(&self, record: &RespondentRecord) -> bool {
        let age_ok = self.age_range.is_none_or(|(min, max)| {
            record.age.is_some_and(|age| age >= min && age <= max)
        });
        let gender_ok = self
            .genders
            .is_none_or(|allowed| record.gender.as_ref().is_some_and(|g| allowed.contains(g)));
        let region_ok = self
            .regions
            .is_none_or(|allowed| record.region.as_ref().is_some_and(|r| allowed.contains(r)));

        age_ok && gender_ok && region_ok
    }
}

/// Narrow a table to the rows matching every active predicate.
///
/// Row order is preserved. An empty result is a valid outcome.
pub fn filter_table(table: &TranscriptTable, selection: &DemographicSelection) -> TranscriptTable {
    let predicates = ActivePredicates::resolve(table.columns, selection);

    let records: Vec<RespondentRecord> = table
        .records
        .iter()
        .filter(|r| predicates.matches(r))
        .cloned()
        .collect();

    info!("Matched transcripts: {} of {}", records.len(), table.len());

    TranscriptTable::new(records, table.columns)
}

/// Choices available for each demographic attribute of a table
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FilterOptions {
    /// Observed (min, max) age, when the column exists and has values
    pub age_range: Option<(i64, i64)>,
    /// Sorted distinct genders; `None` when the column is absent
    pub genders: Option<Vec<String>>,
    /// Sorted distinct regions; `None` when the column is absent
    pub regions: Option<Vec<String>>,
}

impl FilterOptions {
    pub fn from_table(table: &TranscriptTable) -> Self {
        let age_range = if table.columns.age {
            let ages = table.records.iter().filter_map(|r| r.age);
            ages.clone().min().zip(ages.max())
        } else {
            None
        };

        let distinct = |present: bool, value: fn(&RespondentRecord) -> Option<&String>| {
            present.then(|| {
                table
                    .records
                    .iter()
                    .filter_map(value)
                    .cloned()
                    .collect::<BTreeSet<_>>()
                    .into_iter()
                    .collect::<Vec<_>>()
            })
        };

        Self {
            age_range,
            genders: distinct(table.columns.gender, |r| r.gender.as_ref()),
            regions: distinct(table.columns.region, |r| r.region.as_ref()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn sample_table() -> TranscriptTable {
        TranscriptTable::new(
            vec![
                RespondentRecord::new("r1", "...")
                    .with_age(30)
                    .with_gender("female")
                    .with_region("north"),
                RespondentRecord::new("r2", "...")
                    .with_age(55)
                    .with_gender("male")
                    .with_region("south"),
                RespondentRecord::new("r3", "...").with_gender("female"),
            ],
            AttributeColumns::all(),
        )
    }

    fn ids(table: &TranscriptTable) -> Vec<&str> {
        table.records.iter().map(|r| r.respondent_id.as_str()).collect()
    }

    #[test]
    fn test_age_range_scenario() {
        let table = TranscriptTable::new(
            vec![
                RespondentRecord::new("r1", "...").with_age(30),
                RespondentRecord::new("r2", "...").with_age(55),
            ],
            AttributeColumns {
                age: true,
                ..Default::default()
            },
        );

        let result = filter_table(&table, &DemographicSelection::new().with_age_range(25, 40));
        assert_eq!(ids(&result), vec!["r1"]);
    }

    #[test]
    fn test_age_range_is_inclusive() {
        let result = filter_table(&sample_table(), &DemographicSelection::new().with_age_range(30, 55));
        assert_eq!(ids(&result), vec!["r1", "r2"]);
    }

    #[test]
    fn test_missing_attribute_excluded_by_active_predicate() {
        let result = filter_table(&sample_table(), &DemographicSelection::new().with_age_range(0, 200));
        assert_eq!(ids(&result), vec!["r1", "r2"]);
    }

    #[test]
    fn test_predicates_combine_with_and() {
        let selection = DemographicSelection::new()
            .with_genders(["female"])
            .with_regions(["north", "south"]);
        let result = filter_table(&sample_table(), &selection);
        assert_eq!(ids(&result), vec!["r1"]);
    }

    #[test]
    fn test_absent_column_disables_predicate() {
        let mut table = sample_table();
        table.columns.region = false;
        for record in &mut table.records {
            record.region = None;
        }

        let result = filter_table(&table, &DemographicSelection::new().with_regions(["nowhere"]));
        assert_eq!(result.len(), 3);
    }

    #[test]
    fn test_no_match_is_empty_not_error() {
        let result = filter_table(&sample_table(), &DemographicSelection::new().with_genders(["other"]));
        assert!(result.is_empty());
        assert_eq!(result.columns, AttributeColumns::all());
    }

    #[test]
    fn test_filter_options() {
        let options = FilterOptions::from_table(&sample_table());
        assert_eq!(options.age_range, Some((30, 55)));
        assert_eq!(
            options.genders,
            Some(vec!["female".to_string(), "male".to_string()])
        );
        assert_eq!(
            options.regions,
            Some(vec!["north".to_string(), "south".to_string()])
        );

        let bare = TranscriptTable::new(
            vec![RespondentRecord::new("r1", "...")],
            AttributeColumns::default(),
        );
        assert_eq!(FilterOptions::from_table(&bare), FilterOptions::default());
    }

    fn table_strategy() -> impl Strategy<Value = TranscriptTable> {
        let row = (
            proptest::option::of(18i64..90),
            proptest::option::of("(female|male|nonbinary)"),
            proptest::option::of("(north|south|west)"),
        );
        (
            prop::collection::vec(row, 0..30),
            any::<(bool, bool, bool)>(),
        )
            .prop_map(|(rows, (age, gender, region))| {
                let records = rows
                    .into_iter()
                    .enumerate()
                    .map(|(i, (a, g, r))| RespondentRecord {
                        respondent_id: format!("r{}", i),
                        transcript_text: "...".to_string(),
                        age: a.filter(|_| age),
                        gender: g.filter(|_| gender),
                        region: r.filter(|_| region),
                    })
                    .collect();
                TranscriptTable::new(
                    records,
                    AttributeColumns {
                        age,
                        gender,
                        region,
                    },
                )
            })
    }

    fn selection_strategy() -> impl Strategy<Value = DemographicSelection> {
        (
            proptest::option::of((0i64..100, 0i64..100)),
            proptest::option::of(prop::collection::btree_set("(female|male|nonbinary)", 0..3)),
            proptest::option::of(prop::collection::btree_set("(north|south|west)", 0..3)),
        )
            .prop_map(|(age_range, gender_in, region_in)| DemographicSelection {
                age_range,
                gender_in,
                region_in,
            })
    }

    proptest! {
        #[test]
        fn proptest_unrestricted_filter_is_identity(table in table_strategy()) {
            let result = filter_table(&table, &DemographicSelection::new());
            prop_assert_eq!(result, table);
        }

        #[test]
        fn proptest_filter_result_is_subset_satisfying_predicates(
            table in table_strategy(),
            selection in selection_strategy(),
        ) {
            let result = filter_table(&table, &selection);

            prop_assert!(result.len() <= table.len());
            for record in &result.records {
                prop_assert!(table.records.contains(record));

                if let (true, Some((min, max))) = (table.columns.age, selection.age_range) {
                    let age = record.age;
                    prop_assert!(age.is_some_and(|a| a >= min && a <= max));
                }
                if let (true, Some(allowed)) = (table.columns.gender, &selection.gender_in) {
                    prop_assert!(record.gender.as_ref().is_some_and(|g| allowed.contains(g)));
                }
                if let (true, Some(allowed)) = (table.columns.region, &selection.region_in) {
                    prop_assert!(record.region.as_ref().is_some_and(|r| allowed.contains(r)));
                }
            }
        }
    }
}
