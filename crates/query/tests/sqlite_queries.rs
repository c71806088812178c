use dtm_matrix_store::{
    store_path, Edge, MatrixReader, MatrixWriter, PostalCode, SqliteMatrixStore,
};
use dtm_query::{ClientProfiles, QueryEngine, QueryError};
use pretty_assertions::assert_eq;
use std::sync::Arc;
use tempfile::TempDir;

fn pc(raw: &str) -> PostalCode {
    PostalCode::parse(raw).unwrap()
}

fn engine_over(temp: &TempDir, raw: &[(&str, &str, u32, u32)]) -> QueryEngine {
    let path = store_path(temp.path());
    let mut writer = MatrixWriter::create(&path).expect("create");
    let edges: Vec<Edge> = raw
        .iter()
        .flat_map(|&(from, to, time, dist)| {
            let edge = Edge::new(pc(from), pc(to), time, dist);
            [edge.clone(), edge.reversed()]
        })
        .collect();
    writer.write_batch(&edges).expect("write");
    writer.finish().expect("finish");

    let store: Arc<dyn MatrixReader> = Arc::new(SqliteMatrixStore::open(&path).expect("open"));
    QueryEngine::new(store, ClientProfiles::default())
}

#[test]
fn threshold_row_equals_filtered_full_row() {
    let temp = TempDir::new().expect("tempdir");
    let engine = engine_over(
        &temp,
        &[
            ("1012", "3011", 15, 125),
            ("1012", "2000", 5, 40),
            ("1012", "0021", 60, 700),
            ("1012", "4000", 15, 140),
        ],
    );

    let full = engine.row(Some("1012"), None).expect("full row");
    for max_time in ["0", "5", "15", "59", "60", "600"] {
        let limit: u32 = max_time.parse().unwrap();
        let filtered = engine.row(Some("1012"), Some(max_time)).expect("row");
        let expected: Vec<_> = full
            .results
            .iter()
            .filter(|entry| entry.time_min <= limit)
            .cloned()
            .collect();
        assert_eq!(filtered.results, expected, "maxTime={max_time}");
        assert_eq!(filtered.count, expected.len());
    }
}

#[test]
fn reference_example_round_trips_through_sqlite() {
    let temp = TempDir::new().expect("tempdir");
    let engine = engine_over(&temp, &[("1012", "3011", 15, 125)]);

    let pair = engine.pair(Some("1012"), Some("3011")).expect("pair");
    assert_eq!((pair.time_min, pair.distance_km), (15, 12.5));

    let row = engine.row(Some("3011"), None).expect("row");
    assert_eq!(row.count, 1);
    assert_eq!(row.results[0].dest_pc4, "1012");
    assert_eq!(row.results[0].distance_km, 12.5);

    assert!(matches!(
        engine.row(Some("9999"), None),
        Err(QueryError::NotFound(_))
    ));
    assert_eq!(engine.origins().expect("origins").origins, vec!["1012", "3011"]);
}
