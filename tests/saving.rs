//! Saving, mutating, and deleting records through the document backend.

use std::sync::Arc;

use formdb::schema::FieldMap;
use formdb::{MemoryCollection, Query, Record, RecordError, Repository, StoreContext};
use serde_json::{json, Value};

// =============================================================================
// Helper Functions
// =============================================================================

fn setup() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn fields(value: Value) -> FieldMap {
    value.as_object().unwrap().clone()
}

fn seeded_repository() -> Repository {
    let context = StoreContext::new().with_document(Arc::new(MemoryCollection::new()));
    let document = json!({
        "name": "Country",
        "id": "#Country",
        "properties": {
            "name": {"type": "string"},
            "abbreviation": {"type": "string"},
            "languages": {
                "type": ["array", "null"],
                "items": {"type": "string"}
            }
        },
        "additionalProperties": false
    });
    let repo = Repository::from_document(&document, &context).unwrap();

    let mut sweden = repo
        .new_record(fields(json!({
            "name": "Sweden",
            "abbreviation": "SE",
            "languages": ["swedish"]
        })))
        .unwrap();
    repo.save(&mut sweden).unwrap();

    repo
}

// =============================================================================
// Save Semantics
// =============================================================================

#[test]
fn repeated_saves_do_not_create_duplicates() {
    setup();
    let repo = seeded_repository();
    assert_eq!(repo.count(&FieldMap::new()).unwrap(), 1);

    let mut sweden = repo
        .find_one(&fields(json!({"abbreviation": "SE"})))
        .unwrap()
        .unwrap();

    sweden.set("name", json!("Sverige")).unwrap();
    sweden.validate().unwrap();
    repo.save(&mut sweden).unwrap();

    assert_eq!(repo.count(&FieldMap::new()).unwrap(), 1);

    let sverige = repo
        .find_one(&fields(json!({"abbreviation": "SE"})))
        .unwrap()
        .unwrap();
    assert_eq!(sverige.get("name"), Some(&json!("Sverige")));
    assert_eq!(sverige.get("abbreviation"), Some(&json!("SE")));
    let languages = sverige.get("languages").unwrap().as_array().unwrap();
    assert_eq!(languages.len(), 1);
    assert!(languages.contains(&json!("swedish")));
}

#[test]
fn update_then_save_keeps_one_record() {
    setup();
    let repo = seeded_repository();

    let mut sweden = repo
        .find_one(&fields(json!({"abbreviation": "SE"})))
        .unwrap()
        .unwrap();
    let ident = sweden.identifier().unwrap();

    sweden
        .update(
            fields(json!({"name": "Sverige", "_id": ident.to_string()})),
            false,
        )
        .unwrap();
    sweden.validate().unwrap();
    repo.save(&mut sweden).unwrap();

    assert_eq!(repo.count(&FieldMap::new()).unwrap(), 1);
    let sverige = repo
        .find_one(&fields(json!({"abbreviation": "SE"})))
        .unwrap()
        .unwrap();
    assert_eq!(sverige.get("name"), Some(&json!("Sverige")));
}

#[test]
fn save_assigns_an_identifier_once() {
    setup();
    let repo = seeded_repository();

    let mut norway = repo
        .new_record(fields(json!({"name": "Norway", "abbreviation": "NO"})))
        .unwrap();
    assert!(norway.identifier().is_none());
    assert!(!norway.is_persisted());

    repo.save(&mut norway).unwrap();
    let assigned = norway.identifier().unwrap();
    assert!(norway.is_persisted());

    repo.save(&mut norway).unwrap();
    assert_eq!(norway.identifier().unwrap(), assigned);
}

// =============================================================================
// Mutation Rollback
// =============================================================================

#[test]
fn failed_set_leaves_the_record_untouched() {
    setup();
    let repo = seeded_repository();

    let mut sweden = repo
        .find_one(&fields(json!({"abbreviation": "SE"})))
        .unwrap()
        .unwrap();

    let result = sweden.set("name", json!(42));
    assert!(matches!(result, Err(RecordError::Validation(_))));
    assert_eq!(sweden.get("name"), Some(&json!("Sweden")));

    // The stored copy is unaffected too.
    let stored = repo
        .find_one(&fields(json!({"abbreviation": "SE"})))
        .unwrap()
        .unwrap();
    assert_eq!(stored.get("name"), Some(&json!("Sweden")));
}

#[test]
fn failed_update_discards_the_whole_batch() {
    setup();
    let repo = seeded_repository();

    let mut sweden = repo
        .find_one(&fields(json!({"abbreviation": "SE"})))
        .unwrap()
        .unwrap();

    let result = sweden.update(
        fields(json!({"name": "Sverige", "languages": "broken"})),
        false,
    );
    assert!(result.is_err());
    assert_eq!(sweden.get("name"), Some(&json!("Sweden")));
    assert_eq!(sweden.get("languages"), Some(&json!(["swedish"])));
}

// =============================================================================
// Delete / Bulk Create / Public View
// =============================================================================

#[test]
fn delete_removes_the_stored_record() {
    setup();
    let repo = seeded_repository();

    let mut sweden = repo
        .find_one(&fields(json!({"abbreviation": "SE"})))
        .unwrap()
        .unwrap();
    assert!(repo.delete(&mut sweden).unwrap());
    assert!(!sweden.is_persisted());
    assert_eq!(repo.count(&FieldMap::new()).unwrap(), 0);
}

#[test]
fn delete_before_save_fails() {
    setup();
    let repo = seeded_repository();

    let mut unsaved = repo
        .new_record(fields(json!({"name": "Norway", "abbreviation": "NO"})))
        .unwrap();
    let result = repo.delete(&mut unsaved);
    assert!(result.is_err());
}

#[test]
fn bulk_create_stores_every_record() {
    setup();
    let repo = seeded_repository();

    let records = repo
        .bulk_create(vec![
            fields(json!({"name": "Norway", "abbreviation": "NO"})),
            fields(json!({"name": "Denmark", "abbreviation": "DK"})),
        ])
        .unwrap();

    assert_eq!(records.len(), 2);
    assert!(records.iter().all(Record::is_persisted));
    assert_eq!(repo.count(&FieldMap::new()).unwrap(), 3);

    let idents: Vec<_> = records.iter().map(|r| r.identifier().unwrap()).collect();
    assert_ne!(idents[0], idents[1]);
}

#[test]
fn public_view_carries_schema_id_and_string_identifier() {
    setup();
    let repo = seeded_repository();

    let sweden = repo
        .find_one(&fields(json!({"abbreviation": "SE"})))
        .unwrap()
        .unwrap();
    let view = sweden.to_public_view();

    assert_eq!(view["id"], json!("#Country"));
    assert_eq!(
        view["_id"],
        json!(sweden.identifier().unwrap().to_string())
    );
    assert_eq!(view["name"], json!("Sweden"));
}

#[test]
fn find_or_create_is_find_one_then_insert() {
    setup();
    let repo = seeded_repository();

    let existing = repo
        .find_or_create(&fields(json!({"abbreviation": "SE"})))
        .unwrap();
    assert_eq!(existing.get("name"), Some(&json!("Sweden")));
    assert_eq!(repo.count(&FieldMap::new()).unwrap(), 1);

    let created = repo
        .find_or_create(&fields(json!({"abbreviation": "NO", "name": "Norway"})))
        .unwrap();
    assert!(created.is_persisted());
    assert_eq!(repo.count(&FieldMap::new()).unwrap(), 2);
}

#[test]
fn reload_reflects_out_of_band_changes() {
    setup();
    let repo = seeded_repository();

    let mut handle_a = repo
        .find_one(&fields(json!({"abbreviation": "SE"})))
        .unwrap()
        .unwrap();
    let mut handle_b = repo
        .find_one(&fields(json!({"abbreviation": "SE"})))
        .unwrap()
        .unwrap();

    handle_b.set("name", json!("Sverige")).unwrap();
    repo.save(&mut handle_b).unwrap();

    repo.reload(&mut handle_a).unwrap();
    assert_eq!(handle_a.get("name"), Some(&json!("Sverige")));

    // Deleting the stored record makes a later reload fail.
    repo.delete(&mut handle_b).unwrap();
    assert!(repo.reload(&mut handle_a).is_err());

    // The failed reload leaves the in-memory state alone.
    assert_eq!(handle_a.get("name"), Some(&json!("Sverige")));
}

#[test]
fn cursor_restarts_fresh_for_each_find() {
    setup();
    let repo = seeded_repository();

    let first: Vec<_> = repo
        .find(Query::new())
        .unwrap()
        .collect::<Result<_, _>>()
        .unwrap();
    let second: Vec<_> = repo
        .find(Query::new())
        .unwrap()
        .collect::<Result<_, _>>()
        .unwrap();
    assert_eq!(first.len(), second.len());
}
