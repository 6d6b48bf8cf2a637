use chrono::{DateTime, TimeZone, Utc};
use harbour_db::{SqliteStore, StoreSettings};
use harbour_query::{
    Aggregation, Aggregator, Cursor, FilterSpec, QueryEngine, SearchStore, SortOrder, StoreQuery,
};
use harbour_types::{
    ChangeDetail, ChangeInfo, LogField, LogPayload, LogRecord, LogType, Priority, Status,
};
use std::sync::Arc;

fn open_store() -> (SqliteStore, tempfile::TempDir) {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("logs.db");
    let store = SqliteStore::open(
        path.to_str().expect("utf-8 path"),
        StoreSettings::default(),
    )
    .expect("store should open");
    (store, dir)
}

fn at(minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 10, 9, minute, 0)
        .single()
        .expect("valid time")
}

fn record(id: &str, minute: u32, payload: LogPayload, priority: Option<Priority>) -> LogRecord {
    LogRecord {
        id: id.to_string(),
        app: "kra".to_string(),
        system: "linux".to_string(),
        module: "kyc".to_string(),
        priority,
        who: "user2".to_string(),
        op: "update".to_string(),
        when: at(minute),
        class_name: "Customer".to_string(),
        instance_id: "c-1".to_string(),
        status: Status::Success,
        error: String::new(),
        remote_ip: "10.0.0.1".to_string(),
        message: "msg".to_string(),
        payload,
    }
}

fn activity(id: &str, minute: u32, priority: Priority) -> LogRecord {
    record(id, minute, LogPayload::Activity("viewed".to_string()), Some(priority))
}

fn change(id: &str, minute: u32, field: &str) -> LogRecord {
    let info = ChangeInfo::new("customer", "update").with_change(ChangeDetail::new(field, "a", "b"));
    record(id, minute, LogPayload::Change(info), None)
}

fn query(log_type: LogType) -> StoreQuery {
    StoreQuery {
        log_type,
        matches: Vec::new(),
        changed_field: None,
        min_priority: None,
        from: None,
        to: None,
        order: SortOrder::Ascending,
        after: None,
        limit: 100,
    }
}

fn ids(records: &[LogRecord]) -> Vec<&str> {
    records.iter().map(|r| r.id.as_str()).collect()
}

fn seed(store: &SqliteStore) {
    for r in [
        change("c1", 1, "age"),
        activity("a1", 2, Priority::Info),
        change("c2", 3, "name"),
        activity("a2", 4, Priority::Warn),
        change("c3", 5, "age"),
    ] {
        store.index(&r).expect("index");
    }
}

// ── index / search ───────────────────────────────────────────────────

#[test]
fn indexed_records_read_back_unchanged() {
    let (store, _dir) = open_store();
    let original = change("c1", 1, "age");
    store.index(&original).expect("index");

    let found = store.search(&query(LogType::Change)).expect("search");
    assert_eq!(found, vec![original]);
}

#[test]
fn indexing_the_same_id_twice_keeps_one_copy() {
    let (store, _dir) = open_store();
    let r = activity("a1", 2, Priority::Info);
    store.index(&r).expect("first index");
    store.index(&r).expect("second index");
    assert_eq!(store.count().expect("count"), 1);
}

#[test]
fn search_orders_by_when_then_id() {
    let (store, _dir) = open_store();
    for r in [
        activity("b", 7, Priority::Info),
        activity("c", 7, Priority::Info),
        activity("a", 7, Priority::Info),
        activity("z", 1, Priority::Info),
    ] {
        store.index(&r).expect("index");
    }

    let asc = store.search(&query(LogType::Activity)).expect("search");
    assert_eq!(ids(&asc), ["z", "a", "b", "c"]);

    let desc = store
        .search(&StoreQuery {
            order: SortOrder::Descending,
            ..query(LogType::Activity)
        })
        .expect("search");
    assert_eq!(ids(&desc), ["a", "b", "c", "z"]);
}

#[test]
fn search_applies_every_predicate() {
    let (store, _dir) = open_store();
    seed(&store);
    let mut other = activity("a3", 3, Priority::Crit);
    other.who = "user9".to_string();
    store.index(&other).expect("index");

    let by_who = store
        .search(&StoreQuery {
            matches: vec![(LogField::Who, "user9".to_string())],
            ..query(LogType::Activity)
        })
        .expect("search");
    assert_eq!(ids(&by_who), ["a3"]);

    let by_floor = store
        .search(&StoreQuery {
            min_priority: Some(Priority::Warn),
            ..query(LogType::Activity)
        })
        .expect("search");
    assert_eq!(ids(&by_floor), ["a3", "a2"]);

    let by_range = store
        .search(&StoreQuery {
            from: Some(at(2)),
            to: Some(at(3)),
            ..query(LogType::Activity)
        })
        .expect("search");
    assert_eq!(ids(&by_range), ["a1", "a3"]);

    let by_change = store
        .search(&StoreQuery {
            changed_field: Some("age".to_string()),
            ..query(LogType::Change)
        })
        .expect("search");
    assert_eq!(ids(&by_change), ["c1", "c3"]);

    let limited = store
        .search(&StoreQuery {
            limit: 2,
            ..query(LogType::Change)
        })
        .expect("search");
    assert_eq!(ids(&limited), ["c1", "c2"]);
}

#[test]
fn search_resumes_after_a_cursor() {
    let (store, _dir) = open_store();
    for r in [
        activity("a", 7, Priority::Info),
        activity("b", 7, Priority::Info),
        activity("c", 7, Priority::Info),
        activity("y", 3, Priority::Info),
        activity("z", 9, Priority::Info),
    ] {
        store.index(&r).expect("index");
    }
    let cursor = Cursor {
        when: at(7),
        id: "a".to_string(),
    };

    let asc = store
        .search(&StoreQuery {
            after: Some(cursor.clone()),
            ..query(LogType::Activity)
        })
        .expect("search");
    assert_eq!(ids(&asc), ["b", "c", "z"]);

    let desc = store
        .search(&StoreQuery {
            order: SortOrder::Descending,
            after: Some(cursor),
            ..query(LogType::Activity)
        })
        .expect("search");
    assert_eq!(ids(&desc), ["b", "c", "y"]);
}

#[test]
fn count_matching_ignores_the_limit() {
    let (store, _dir) = open_store();
    seed(&store);

    let n = store
        .count_matching(&StoreQuery {
            limit: 1,
            ..query(LogType::Change)
        })
        .expect("count");
    assert_eq!(n, 3);

    let n = store
        .count_matching(&StoreQuery {
            changed_field: Some("age".to_string()),
            ..query(LogType::Change)
        })
        .expect("count");
    assert_eq!(n, 2);
}

// ── terms ────────────────────────────────────────────────────────────

#[test]
fn terms_counts_values_most_frequent_first() {
    let (store, _dir) = open_store();
    seed(&store);
    let mut other = activity("a3", 6, Priority::Warn);
    other.who = "user9".to_string();
    store.index(&other).expect("index");

    let buckets = store
        .terms(&query(LogType::Activity), LogField::Priority, 10)
        .expect("terms");
    let pairs: Vec<(&str, u64)> = buckets.iter().map(|b| (b.value.as_str(), b.count)).collect();
    assert_eq!(pairs, [("WARN", 2), ("INFO", 1)]);

    let capped = store
        .terms(&query(LogType::Activity), LogField::Who, 1)
        .expect("terms");
    assert_eq!(capped.len(), 1);
    assert_eq!(capped[0].value, "user2");
}

#[test]
fn change_records_have_a_blank_priority_bucket() {
    let (store, _dir) = open_store();
    seed(&store);
    let buckets = store
        .terms(&query(LogType::Change), LogField::Priority, 10)
        .expect("terms");
    assert_eq!(buckets.len(), 1);
    assert_eq!(buckets[0].value, "");
    assert_eq!(buckets[0].count, 3);
}

// ── engine over SQLite ───────────────────────────────────────────────

#[test]
fn engine_merges_types_from_sqlite() {
    let (store, _dir) = open_store();
    seed(&store);
    let engine = QueryEngine::new(Arc::new(store));

    let result = engine.query(&FilterSpec::default()).expect("query");
    assert_eq!(ids(&result.records), ["c1", "a1", "c2", "a2", "c3"]);
}

#[test]
fn engine_pages_past_the_record_cap() {
    let (store, _dir) = open_store();
    let mut expected = Vec::new();
    for i in 0..8 {
        let id = format!("c{i}");
        store.index(&change(&id, i, "age")).expect("index");
        expected.push(id);
    }
    for i in 0..8 {
        let id = format!("a{i}");
        store
            .index(&activity(&id, 30 + i, Priority::Info))
            .expect("index");
        expected.push(id);
    }
    let engine = QueryEngine::new(Arc::new(store)).with_max_records(3);

    let mut seen = Vec::new();
    let mut cursor: Option<Cursor> = None;
    for _ in 0..100 {
        let spec = FilterSpec {
            cursor: cursor.clone(),
            ..Default::default()
        };
        let page = engine.query(&spec).expect("query").page(cursor.as_ref(), 2);
        seen.extend(page.records.iter().map(|r| r.id.clone()));
        match page.next_cursor {
            Some(next) => cursor = Some(next),
            None => break,
        }
    }
    assert_eq!(seen, expected);
    assert_eq!(engine.count(&FilterSpec::default()).expect("count"), 16);
}

#[test]
fn aggregate_counts_more_records_than_the_cap() {
    let (store, _dir) = open_store();
    seed(&store);
    let aggregator = Aggregator::new(QueryEngine::new(Arc::new(store)).with_max_records(1));

    let aggregation = aggregator
        .aggregate(&FilterSpec::default(), "who")
        .expect("aggregate");
    assert_eq!(aggregation.total(), 5);
}

#[test]
fn aggregate_and_top_values_agree() {
    let (store, _dir) = open_store();
    seed(&store);
    let aggregator = Aggregator::new(QueryEngine::new(Arc::new(store)));

    let counts = aggregator
        .aggregate(&FilterSpec::default(), "logType")
        .expect("aggregate");
    let Aggregation::Counts(counts) = counts else {
        panic!("expected counts");
    };
    assert_eq!(counts.get("CHANGE"), Some(&3));
    assert_eq!(counts.get("ACTIVITY"), Some(&2));

    let top = aggregator
        .top_values(&FilterSpec::default(), "logType", 5)
        .expect("top values");
    assert_eq!(top[0].value, "CHANGE");
    assert_eq!(top[0].count, 3);
    assert_eq!(top[1].value, "ACTIVITY");
    assert_eq!(top[1].count, 2);
}
