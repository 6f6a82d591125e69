//! # musicman Performance Benchmarks
//!
//! Benchmarks for the operations that scale with library size.
//!
//! ## Benchmark Categories
//!
//! - **Auto Playlists**: Condition evaluation plus multi-key sorting
//! - **Catalog**: Serialization and parsing of the catalog file
//!
//! ## Running Benchmarks
//!
//! ```bash
//! # Run all benchmarks
//! cargo bench
//!
//! # Run specific benchmark group
//! cargo bench auto_playlist
//! cargo bench catalog
//! ```

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use musicman::catalog::Catalog;
use musicman::condition::{Condition, Operator, RuleValue};
use musicman::playlist::{AutoPlaylist, Playlist};
use musicman::song::{timestamp, Song};
use std::hint::black_box;
use std::path::Path;

const GENRES: [&str; 5] = ["Electro House", "Drum and Bass", "Britpop", "Jazz", "Deep House"];

/// Helper function to create a catalog with realistic metadata
fn create_benchmark_catalog(count: usize) -> Catalog {
    let mut catalog = Catalog::new(Path::new("/bench/library")).expect("absolute root");
    let date = timestamp::parse("2015-06-01T10:00:00").expect("valid date");

    for i in 0..count {
        let mut song = Song::new(format!("{i:05}-Track.mp3"), date + chrono::Duration::minutes(i as i64));
        song.metadata.insert("artist".into(), format!("Artist {}", i % 97).into());
        song.metadata.insert("title".into(), format!("Track {}", count - i).into());
        song.metadata.insert("genre".into(), GENRES[i % GENRES.len()].into());
        song.metadata.insert("year".into(), (1990 + (i % 30) as i64).into());
        song.metadata.insert("length".into(), (120 + (i % 300) as i64).into());
        catalog.insert_song(song);
    }

    catalog
}

fn house_playlist() -> Playlist {
    Playlist::Auto(AutoPlaylist::new(
        vec![
            Condition::leaf("genre", Operator::Contains, RuleValue::text("house")).expect("valid rule"),
            Condition::any(vec![
                Condition::leaf("year", Operator::In, RuleValue::list(["2001", "2005", "2010", "2015"])).expect("valid rule"),
                Condition::leaf("artist", Operator::IsNot, RuleValue::text("artist 3")).expect("valid rule"),
            ]),
        ],
        vec!["artist".into(), "!year".into(), "title".into()],
    ))
}

/// Benchmark auto playlist evaluation
fn benchmark_auto_playlist(c: &mut Criterion) {
    let mut group = c.benchmark_group("auto_playlist");
    let playlist = house_playlist();

    for size in [100, 1_000, 10_000].iter() {
        let catalog = create_benchmark_catalog(*size);

        group.bench_with_input(BenchmarkId::new("get_songs", size), &catalog, |b, catalog| {
            b.iter(|| playlist.get_songs(black_box(catalog)).len())
        });

        group.bench_with_input(BenchmarkId::new("get_m3u", size), &catalog, |b, catalog| {
            b.iter(|| playlist.get_m3u(black_box(catalog)).map(|line| line.len()).sum::<usize>())
        });
    }

    group.finish();
}

/// Benchmark catalog serialization
fn benchmark_catalog(c: &mut Criterion) {
    let mut group = c.benchmark_group("catalog");
    let mut catalog = create_benchmark_catalog(5_000);
    catalog.playlists.insert("house".into(), house_playlist());
    let json = catalog.to_json().expect("serializable catalog");

    group.bench_function("to_json_5000", |b| b.iter(|| black_box(&catalog).to_json()));

    group.bench_function("from_json_5000", |b| {
        b.iter(|| Catalog::from_json(Path::new("/bench/library"), black_box(&json)))
    });

    group.finish();
}

criterion_group!(benches, benchmark_auto_playlist, benchmark_catalog);

criterion_main!(benches);
