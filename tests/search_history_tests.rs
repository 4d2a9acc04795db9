/// Search and history tests
///
/// Run with: cargo test --test search_history_tests
use bitemporal_master::{
    Blob, ExternalId, ExternalIdSearch, ExternalIdSearchType, HistoryRequest, Instant, ManualClock, Master,
    MasterConfig, MasterError, ObjectId, PagingRequest, SearchRequest, SortOrder, UniqueId, VersionCorrection,
    VersionId,
};
use chrono::{Duration, TimeZone, Utc};
use serde_json::json;
use std::sync::Arc;

fn start() -> Instant {
    Utc.with_ymd_and_hms(2024, 6, 3, 8, 0, 0).unwrap()
}

fn setup() -> (Master<Blob>, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new(start()));
    let master = Master::with_clock(MasterConfig::new("DbCrv"), clock.clone()).unwrap();
    (master, clock)
}

fn named(name: &str) -> Blob {
    Blob::new(json!({ "label": name })).named(name)
}

async fn add_all(master: &Master<Blob>, names: &[&str]) -> Vec<UniqueId> {
    let mut ids = Vec::new();
    for name in names {
        ids.push(master.add(named(name), *name).await.unwrap());
    }
    ids
}

fn names(rows: &[bitemporal_master::Row<Blob>]) -> Vec<&str> {
    rows.iter().map(|row| row.business_key.as_str()).collect()
}

#[tokio::test]
async fn test_name_wildcard_selects_one_of_four() {
    let (master, _) = setup();
    let ids = add_all(&master, &["A", "B", "C", "D"]).await;

    let page = master.search(&SearchRequest::new().name("A*")).await.unwrap();
    assert_eq!(page.len(), 1);
    assert_eq!(page.items[0].unique_id(), ids[0]);

    let page = master.search(&SearchRequest::new().name("a")).await.unwrap();
    assert_eq!(names(&page.items), vec!["A"]);

    let page = master.search(&SearchRequest::new().name("?")).await.unwrap();
    assert_eq!(names(&page.items), vec!["A", "B", "C", "D"]);
}

#[tokio::test]
async fn test_sort_orders_and_paging() {
    let (master, clock) = setup();
    add_all(&master, &["C", "A"]).await;
    clock.advance(Duration::minutes(1));
    add_all(&master, &["D", "B"]).await;

    let all = master.search(&SearchRequest::new()).await.unwrap();
    assert_eq!(names(&all.items), vec!["C", "A", "D", "B"]);

    let by_name = SearchRequest::new().sort_order(SortOrder::NAME_DESC);
    assert_eq!(names(&master.search(&by_name).await.unwrap().items), vec!["D", "C", "B", "A"]);

    let newest_first = SearchRequest::new().sort_order(SortOrder::VERSION_FROM_INSTANT_DESC);
    assert_eq!(
        names(&master.search(&newest_first).await.unwrap().items),
        vec!["D", "B", "C", "A"]
    );

    let second_page = SearchRequest::new()
        .sort_order(SortOrder::NAME_ASC)
        .paging(PagingRequest::of_page(2, 3).unwrap());
    let page = master.search(&second_page).await.unwrap();
    assert_eq!(names(&page.items), vec!["D"]);
    assert_eq!(page.total(), 4);
    assert_eq!(page.paging.total_pages(), 2);

    let counted = master
        .search(&SearchRequest::new().paging(PagingRequest::NONE))
        .await
        .unwrap();
    assert!(counted.is_empty());
    assert_eq!(counted.total(), 4);
}

#[tokio::test]
async fn test_object_id_list_restricts_the_scan() {
    let (master, _) = setup();
    let ids = add_all(&master, &["A", "B", "C", "D"]).await;

    let wanted = SearchRequest::new().object_ids([ids[3].object_id().clone(), ids[1].object_id().clone()]);
    assert_eq!(names(&master.search(&wanted).await.unwrap().items), vec!["B", "D"]);

    let nothing = SearchRequest::new().object_ids(Vec::<ObjectId>::new());
    assert!(master.search(&nothing).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_external_id_search_types() {
    let (master, _) = setup();
    let bbg = ExternalId::of("BLOOMBERG", "USSW10");
    let ric = ExternalId::of("RIC", "USDIRS10Y");
    master
        .add(named("both").with_external_id(bbg.clone()).with_external_id(ric.clone()), "both")
        .await
        .unwrap();
    master.add(named("bbg").with_external_id(bbg.clone()), "bbg").await.unwrap();
    master.add(named("plain"), "plain").await.unwrap();

    let search = |kind, ids: Vec<ExternalId>| {
        SearchRequest::new()
            .external_ids(ExternalIdSearch::of(kind, ids))
            .sort_order(SortOrder::NAME_ASC)
    };

    let any = search(ExternalIdSearchType::Any, vec![bbg.clone(), ric.clone()]);
    assert_eq!(names(&master.search(&any).await.unwrap().items), vec!["bbg", "both"]);

    let all = search(ExternalIdSearchType::All, vec![bbg.clone(), ric.clone()]);
    assert_eq!(names(&master.search(&all).await.unwrap().items), vec!["both"]);

    let exact = search(ExternalIdSearchType::Exact, vec![bbg.clone()]);
    assert_eq!(names(&master.search(&exact).await.unwrap().items), vec!["bbg"]);

    let none = search(ExternalIdSearchType::None, vec![ric.clone()]);
    assert_eq!(names(&master.search(&none).await.unwrap().items), vec!["bbg", "plain"]);

    let empty_any = search(ExternalIdSearchType::Any, vec![]);
    assert!(master.search(&empty_any).await.unwrap().is_empty());

    let by_scheme = SearchRequest::new()
        .external_id_scheme("bloom*")
        .sort_order(SortOrder::NAME_ASC);
    assert_eq!(names(&master.search(&by_scheme).await.unwrap().items), vec!["bbg", "both"]);
}

#[tokio::test]
async fn test_attribute_and_kind_filters() {
    let (master, _) = setup();
    master
        .add(named("eur").with_attribute("currency", "EUR").of_kind("Curve"), "eur")
        .await
        .unwrap();
    master
        .add(named("usd").with_attribute("currency", "USD").of_kind("Surface"), "usd")
        .await
        .unwrap();
    master.add(named("bare"), "bare").await.unwrap();

    let eur = SearchRequest::new().attribute("currency", "E*");
    assert_eq!(names(&master.search(&eur).await.unwrap().items), vec!["eur"]);

    let curves = SearchRequest::new().kind("curve");
    assert_eq!(names(&master.search(&curves).await.unwrap().items), vec!["eur"]);

    let kinds = SearchRequest::new().sort_order(SortOrder::KIND_ASC);
    assert_eq!(names(&master.search(&kinds).await.unwrap().items), vec!["eur", "usd", "bare"]);

    let kinds_desc = SearchRequest::new().sort_order(SortOrder::KIND_DESC);
    assert_eq!(names(&master.search(&kinds_desc).await.unwrap().items), vec!["bare", "usd", "eur"]);
}

#[tokio::test]
async fn test_search_at_a_past_coordinate() {
    let (master, clock) = setup();
    let ids = add_all(&master, &["A", "B"]).await;
    let before = clock.advance(Duration::minutes(1));
    clock.advance(Duration::minutes(1));
    master.update(&ids[0], named("Z")).await.unwrap();
    master.remove(ids[1].object_id()).await.unwrap();

    let latest = master.search(&SearchRequest::new()).await.unwrap();
    assert_eq!(names(&latest.items), vec!["Z"]);

    let past = SearchRequest::new().version_correction(VersionCorrection::of_version_as_of(before));
    assert_eq!(names(&master.search(&past).await.unwrap().items), vec!["A", "B"]);

    master.set_default_version_correction(VersionCorrection::of_version_as_of(before));
    assert_eq!(names(&master.search(&SearchRequest::new()).await.unwrap().items), vec!["A", "B"]);
}

#[tokio::test]
async fn test_malformed_search_is_rejected() {
    let (master, _) = setup();
    let err = master.search(&SearchRequest::new().name("")).await.unwrap_err();
    assert!(matches!(err, MasterError::InvalidRequest(_)));

    let err = master.search(&SearchRequest::new().attribute("", "x")).await.unwrap_err();
    assert!(matches!(err, MasterError::InvalidRequest(_)));
}

#[tokio::test]
async fn test_history_scans_both_axes() {
    let (master, clock) = setup();
    let t0 = start();
    let v1 = master.add(named("one"), "one").await.unwrap();
    let t1 = clock.advance(Duration::minutes(10));
    let v2 = master.update(&v1, named("two")).await.unwrap();
    let t2 = clock.advance(Duration::minutes(10));
    master.correct(&v1, named("one-fixed")).await.unwrap();

    let oid = v1.object_id().clone();
    let all = master.history(&HistoryRequest::new(oid.clone())).await.unwrap();
    let order: Vec<(VersionId, Instant)> = all.items.iter().map(|row| (row.version_id, row.correction_from())).collect();
    assert_eq!(
        order,
        vec![
            (v2.version().unwrap(), t1),
            (VersionId::FIRST, t2),
            (VersionId::FIRST, t0),
        ]
    );

    let first_version = HistoryRequest::new(oid.clone()).version_point(t0 + Duration::minutes(5));
    assert_eq!(master.history(&first_version).await.unwrap().total(), 2);

    let known_before_fix = HistoryRequest::new(oid.clone()).correction_point(t1 + Duration::minutes(5));
    let rows = master.history(&known_before_fix).await.unwrap();
    assert_eq!(rows.total(), 2);
    assert!(rows.items.iter().all(|row| row.value().name.as_deref() != Some("one-fixed")));

    let paged = HistoryRequest::new(oid).paging(PagingRequest::ONE);
    let page = master.history(&paged).await.unwrap();
    assert_eq!(page.len(), 1);
    assert_eq!(page.total(), 3);

    let unknown = HistoryRequest::new(ObjectId::of("DbCrv", "404"));
    assert!(master.history(&unknown).await.unwrap_err().is_not_found());
}

#[tokio::test]
async fn test_history_rejects_ranges_that_end_before_they_start() {
    let (master, clock) = setup();
    let t0 = start();
    let uid = master.add(named("one"), "one").await.unwrap();
    let t1 = clock.advance(Duration::minutes(10));
    let oid = uid.object_id().clone();

    let backwards = HistoryRequest::new(oid.clone()).versions(Some(t1), Some(t0));
    let err = master.history(&backwards).await.unwrap_err();
    assert!(matches!(err, MasterError::InvalidRequest(_)));

    let backwards = HistoryRequest::new(oid.clone()).corrections(Some(t1), Some(t0));
    let err = master.history(&backwards).await.unwrap_err();
    assert!(matches!(err, MasterError::InvalidRequest(_)));

    let forwards = HistoryRequest::new(oid).versions(Some(t0), Some(t1));
    assert_eq!(master.history(&forwards).await.unwrap().total(), 1);
}
