use chrono::{DateTime, Datelike, Local};

use super::selector::CandidateFile;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct YearBucket<T = CandidateFile> {
    pub year: i32,
    pub files: Vec<T>,
}

/// Partitions `items` by the calendar year of their timestamp.
///
/// Buckets appear in order of first occurrence and items keep their input
/// order inside a bucket.
pub fn group_by_year<T, F>(items: impl IntoIterator<Item = T>, timestamp: F) -> Vec<YearBucket<T>>
where
    F: Fn(&T) -> DateTime<Local>,
{
    let mut buckets: Vec<YearBucket<T>> = Vec::new();

    for item in items {
        let year = timestamp(&item).year();
        // a directory rarely spans more than a few years, linear search is enough
        match buckets.iter_mut().find(|b| b.year == year) {
            Some(bucket) => bucket.files.push(item),
            None => buckets.push(YearBucket { year, files: vec![item] }),
        }
    }

    buckets
}
