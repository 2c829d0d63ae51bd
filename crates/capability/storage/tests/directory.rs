use domain::ErrorKind;
use hub_storage::{DEFAULT_PAGE_SIZE, DirectoryStore, IdFilter};

fn td(id: &str, title: &str) -> String {
    format!(r#"{{"id":"{id}","title":"{title}","properties":{{"temp":{{"type":"number"}}}}}}"#)
}

#[tokio::test]
async fn td_is_returned_verbatim() {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = DirectoryStore::open(dir.path().join("directory.json")).expect("open");
    let doc = "{ \"id\" : \"t1\",\n  \"title\": \"Lamp\" }";
    store.update_td("t1", doc).expect("update");
    assert_eq!(store.get_td("t1").expect("get"), doc);
}

#[tokio::test]
async fn missing_td_is_not_found_and_remove_is_idempotent() {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = DirectoryStore::open(dir.path().join("directory.json")).expect("open");
    let err = store.get_td("nope").expect_err("missing");
    assert_eq!(err.kind(), ErrorKind::NotFound);
    store.remove_td("nope").expect("remove absent");
}

#[tokio::test]
async fn invalid_json_is_rejected() {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = DirectoryStore::open(dir.path().join("directory.json")).expect("open");
    let err = store.update_td("t1", "{not json").expect_err("invalid");
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert_eq!(store.count(), 0);
}

#[tokio::test]
async fn paging_is_sorted_and_capped() {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = DirectoryStore::open(dir.path().join("directory.json")).expect("open");
    for index in (0..120).rev() {
        let id = format!("t{index:03}");
        store.update_td(&id, &td(&id, "x")).expect("update");
    }
    let first = store.list_tds(0, 0, None).expect("list");
    assert_eq!(first.len(), DEFAULT_PAGE_SIZE);
    assert!(first[0].contains("\"t000\""));

    let page = store.list_tds(5, 10, None).expect("page");
    assert_eq!(page.len(), 5);
    assert!(page[0].contains("\"t010\""));
    assert!(page[4].contains("\"t014\""));

    let tail = store.list_tds(50, 100, None).expect("tail");
    assert_eq!(tail.len(), 20);
}

#[tokio::test]
async fn id_filter_applies_to_list_and_query() {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = DirectoryStore::open(dir.path().join("directory.json")).expect("open");
    store.update_td("a1", &td("a1", "Lamp")).expect("a1");
    store.update_td("b1", &td("b1", "Lamp")).expect("b1");
    let only_a: IdFilter<'_> = &|id: &str| id.starts_with('a');

    let listed = store.list_tds(0, 0, Some(only_a)).expect("list");
    assert_eq!(listed.len(), 1);
    let queried = store
        .query_tds("$[?@.title == 'Lamp']", 0, 0, Some(only_a))
        .expect("query");
    assert_eq!(queried, vec![td("a1", "Lamp")]);
}

#[tokio::test]
async fn query_pages_after_filtering() {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = DirectoryStore::open(dir.path().join("directory.json")).expect("open");
    for index in 0..6 {
        let id = format!("t{index}");
        let title = if index % 2 == 0 { "Lamp" } else { "Fan" };
        store.update_td(&id, &td(&id, title)).expect("update");
    }
    let lamps = store
        .query_tds("$[?@.title == 'Lamp']", 2, 1, None)
        .expect("query");
    assert_eq!(lamps, vec![td("t2", "Lamp"), td("t4", "Lamp")]);

    let with_temp = store
        .query_tds("$.*.properties.temp", 0, 0, None)
        .expect("nested");
    assert_eq!(with_temp.len(), 6);

    let err = store.query_tds("$[", 0, 0, None).expect_err("bad path");
    assert_eq!(err.kind(), ErrorKind::Validation);
}

#[tokio::test]
async fn close_persists_for_next_open() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("directory.json");
    let store = DirectoryStore::open(&path).expect("open");
    store.update_td("t1", &td("t1", "Lamp")).expect("update");
    store.close().expect("close");

    let reopened = DirectoryStore::open(&path).expect("reopen");
    assert_eq!(reopened.get_td("t1").expect("get"), td("t1", "Lamp"));
}
