use race_core::{
    Bib, DirectoryEntry, EventRecord, Passing, RaceConfig, RaceState, RiderRecord, Tod,
};
use runtime::{
    FileRecordRepository, InMemoryRecordRepository, RecordFormat, RecordRepository,
    RepositoryError,
};

fn secs(s: f64) -> Tod {
    Tod::from_secs_f64(s)
}

/// An event with sub-second passings, places and a comment.
fn sample_record() -> EventRecord {
    let directory: Vec<DirectoryEntry> = ["1", "2"]
        .into_iter()
        .map(|bib| {
            let mut entry = DirectoryEntry::new(bib, "");
            entry.refid = format!("chip{bib}");
            entry
        })
        .collect();

    let mut state = RaceState::new(RaceConfig::default());
    state
        .add_riders(&directory, &[Bib::new("1"), Bib::new("2")])
        .unwrap();
    state.set_start(Some(secs(36_000.0)));
    state.submit_passing(&directory, &Passing::new("chip1", secs(36_061.2345)));
    state.submit_passing(&directory, &Passing::new("chip2", secs(36_061.2401)));
    state.set_places("1 2").unwrap();
    state.add_comment("photo finish for first");
    state.recalculate();
    state.to_record()
}

#[test]
fn json_round_trip_keeps_sub_second_precision() {
    let record = sample_record();
    let json = serde_json::to_string(&record).unwrap();
    assert!(json.contains("10h01:01.2345"));

    let decoded: EventRecord = serde_json::from_str(&json).unwrap();
    assert_eq!(decoded, record);
}

#[test]
fn bincode_round_trip_keeps_sub_second_precision() {
    let record = sample_record();
    let bytes = bincode::serialize(&record).unwrap();
    let decoded: EventRecord = bincode::deserialize(&bytes).unwrap();
    assert_eq!(decoded, record);
    assert_eq!(decoded.riders[1].seen, vec![secs(36_061.2401)]);
}

#[test]
fn rider_record_accepts_plain_seconds() {
    let rider: RiderRecord =
        serde_json::from_str(r#"{"bib": "7", "in_race": true, "seen": [61.5, "1:02.25"]}"#).unwrap();
    assert_eq!(rider.bib, Bib::new("7"));
    assert_eq!(rider.seen, vec![secs(61.5), secs(62.25)]);
    assert_eq!(rider.laps, 0);
}

#[test]
fn oversized_integer_times_are_rejected() {
    for text in ["9223372036854775807", "18446744073709551615", "\"99999999999999999\""] {
        assert!(serde_json::from_str::<Tod>(text).is_err(), "{text}");
    }
    let err = serde_json::from_str::<RiderRecord>(r#"{"bib": "7", "seen": [9223372036854775807]}"#)
        .unwrap_err();
    assert!(err.to_string().contains("out of range"), "{err}");
    assert_eq!(serde_json::from_str::<Tod>("86405").unwrap(), Tod::from_seconds(5));
}

#[test]
fn file_repository_round_trips_both_formats() {
    let dir = tempfile::tempdir().unwrap();
    let record = sample_record();

    for format in [RecordFormat::Json, RecordFormat::Bincode] {
        let repository = FileRecordRepository::new(dir.path(), format).unwrap();
        repository.save("crit", &record).unwrap();
        assert!(repository.exists("crit"));
        assert_eq!(repository.load("crit").unwrap(), Some(record.clone()));
        assert_eq!(repository.list_names().unwrap(), vec!["crit".to_owned()]);

        // no temp file left behind
        let leftovers = std::fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .count();
        assert_eq!(leftovers, 0);
    }
}

#[test]
fn file_repository_rejects_path_names() {
    let dir = tempfile::tempdir().unwrap();
    let repository = FileRecordRepository::new(dir.path(), RecordFormat::Json).unwrap();
    assert!(matches!(
        repository.save("../escape", &sample_record()),
        Err(RepositoryError::InvalidName(_))
    ));
    assert!(!repository.exists("../escape"));
    assert_eq!(repository.load("missing").unwrap(), None);
}

#[test]
fn corrupted_bincode_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let repository = FileRecordRepository::new(dir.path(), RecordFormat::Bincode).unwrap();
    std::fs::write(repository.record_path("bad"), [0xff, 0x00, 0x13]).unwrap();
    assert!(matches!(
        repository.load("bad"),
        Err(RepositoryError::CorruptedData(_))
    ));
}

#[test]
fn memory_repository_stores_copies() {
    let repository = InMemoryRecordRepository::new();
    let record = sample_record();
    repository.save("b", &record).unwrap();
    repository.save("a", &EventRecord::default()).unwrap();
    assert_eq!(repository.list_names().unwrap(), vec!["a".to_owned(), "b".to_owned()]);
    assert_eq!(repository.load("b").unwrap(), Some(record));
    repository.delete("b").unwrap();
    assert!(!repository.exists("b"));
}
