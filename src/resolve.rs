use crate::models::RatingRecord;

/// Picks the record for the target institution out of the service's
/// candidate list. Exact, case-sensitive school name match; no match is an
/// expected outcome, not an error.
pub fn resolve<'a>(records: &'a [RatingRecord], institution: &str) -> Option<&'a RatingRecord> {
    records.iter().find(|r| r.school.name == institution)
}
