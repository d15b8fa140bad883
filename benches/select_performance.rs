use chrono::{Duration as ChronoDuration, Local};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use std::fs::{self, File};
use std::path::Path;
use std::time::SystemTime;
use tempfile::TempDir;
use yearzip::archive::grouper::group_by_year;
use yearzip::archive::selector;
use yearzip::config::TimeSource;

/// Fixture generator for watched directories
mod fixtures {
    use super::*;

    /// Fill `base` with `count` small files spread over the last `years` years,
    /// plus a few existing containers that must be skipped
    pub fn create_watched_dir(base: &Path, count: usize, years: i64) -> std::io::Result<()> {
        let now = Local::now();

        for i in 0..count {
            let path = base.join(format!("report-{i:05}.log"));
            fs::write(&path, format!("line {i}\n"))?;

            let age_days = (i as i64 * 37) % (years * 365);
            let modified = now - ChronoDuration::days(age_days);
            File::options()
                .write(true)
                .open(&path)?
                .set_modified(SystemTime::from(modified))?;
        }

        for year in 0..years {
            fs::write(base.join(format!("{}.zip", 2000 + year)), b"PK")?;
        }

        Ok(())
    }
}

fn bench_select(c: &mut Criterion) {
    let mut group = c.benchmark_group("select_by_file_count");

    for count in [100, 1_000, 5_000] {
        let temp = TempDir::new().unwrap();
        fixtures::create_watched_dir(temp.path(), count, 5).unwrap();
        let threshold = Local::now() - ChronoDuration::days(365);

        group.bench_with_input(BenchmarkId::new("files", count), &count, |b, _| {
            b.iter(|| {
                let selected = selector::select(temp.path(), threshold, TimeSource::Modified).unwrap();
                black_box(selected)
            });
        });
    }

    group.finish();
}

fn bench_select_and_group(c: &mut Criterion) {
    let temp = TempDir::new().unwrap();
    fixtures::create_watched_dir(temp.path(), 2_000, 10).unwrap();
    let threshold = Local::now();

    c.bench_function("select_and_group_ten_years", |b| {
        b.iter(|| {
            let selected = selector::select(temp.path(), threshold, TimeSource::Modified).unwrap();
            black_box(group_by_year(selected, |f| f.timestamp))
        });
    });
}

criterion_group!(benches, bench_select, bench_select_and_group);
criterion_main!(benches);
