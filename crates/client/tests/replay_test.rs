use std::sync::Arc;

use race_core::{Bib, Clock, DirectoryEntry, DnfCode, FixedClock, Tod};
use racetimer::Script;
use runtime::{Runtime, RuntimeConfig};

fn directory() -> Vec<DirectoryEntry> {
    ["1", "2", "3"]
        .into_iter()
        .map(|bib| {
            let mut entry = DirectoryEntry::new(bib, "");
            entry.refid = format!("chip{bib}");
            entry.name = format!("Rider {bib}");
            entry.categories = vec!["A".to_owned()];
            entry
        })
        .collect()
}

const FEED: &str = "\
add 1 2 3
armstart
start 0
armfinish
pass 100 chip1
dns 9          # not on the startlist
pass 1:45 chip2 C1
dnf 3
show
";

#[tokio::test]
async fn replay_produces_result_and_counts_refusals() {
    let clock = Arc::new(FixedClock::new(Tod::ZERO));
    let runtime = Runtime::builder()
        .config(RuntimeConfig::default())
        .directory(directory())
        .clock(clock.clone())
        .build()
        .await
        .unwrap();
    let handle = runtime.handle();

    let script = Script::parse(FEED).unwrap();
    let mut out = Vec::new();
    let summary = racetimer::script::run(&handle, &clock, &script, &mut out)
        .await
        .unwrap();

    assert_eq!(summary.passings, 2);
    assert_eq!(summary.rejected, 0);
    assert_eq!(summary.refused, 1);
    assert_eq!(clock.now(), Tod::from_seconds(105));

    let text = String::from_utf8(out).unwrap();
    assert!(text.contains("line 6:"), "{text}");
    assert!(text.contains("status:"), "{text}");

    let standings = handle.standings().await.unwrap();
    let order: Vec<&Bib> = standings.rows.iter().map(|row| &row.bib).collect();
    assert_eq!(order, [&Bib::new("1"), &Bib::new("2"), &Bib::new("3")]);
    assert_eq!(standings.rows[0].rank, Some(1));
    assert_eq!(standings.rows[2].code, Some(DnfCode::Dnf));

    drop(handle);
    runtime.shutdown().await.unwrap();
}

#[tokio::test]
async fn runtime_failure_stops_the_replay() {
    let clock = Arc::new(FixedClock::new(Tod::ZERO));
    let runtime = Runtime::builder().clock(clock.clone()).build().await.unwrap();
    let handle = runtime.handle();

    // No repository configured, so saving fails outside the command layer.
    let script = Script::parse("save\nadd 1\n").unwrap();
    let mut out = Vec::new();
    let err = racetimer::script::run(&handle, &clock, &script, &mut out)
        .await
        .unwrap_err();
    assert!(format!("{err:#}").contains("line 1"));
    assert!(handle.standings().await.unwrap().rows.is_empty());

    drop(handle);
    runtime.shutdown().await.unwrap();
}
