//! The relational backend through the repository façade.
//!
//! The engine double below records every synthesized statement and replays
//! canned row sets, so these tests pin both the SQL text and the positional
//! row-to-record reconstruction.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use formdb::schema::FieldMap;
use formdb::store::{Row, StoreResult};
use formdb::{Query, RelationalEngine, Repository, SortOrder, StoreContext, StoreError};
use serde_json::{json, Value};

// =============================================================================
// Engine Double
// =============================================================================

struct ScriptedEngine {
    statements: Mutex<Vec<String>>,
    responses: Mutex<VecDeque<Vec<Row>>>,
}

impl ScriptedEngine {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            statements: Mutex::new(Vec::new()),
            responses: Mutex::new(VecDeque::new()),
        })
    }

    fn push_rows(&self, rows: Vec<Row>) {
        self.responses.lock().unwrap().push_back(rows);
    }

    fn statements(&self) -> Vec<String> {
        self.statements.lock().unwrap().clone()
    }

    fn last_statement(&self) -> String {
        self.statements().last().cloned().unwrap_or_default()
    }
}

impl RelationalEngine for ScriptedEngine {
    fn execute(&self, statement: &str) -> StoreResult<Vec<Row>> {
        self.statements.lock().unwrap().push(statement.to_string());
        Ok(self
            .responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_default())
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

fn setup() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn country_document() -> Value {
    json!({
        "name": "Country",
        "sql": true,
        "id": "#Country",
        "properties": {
            "name": {"type": "string"},
            "abbreviation": {"type": "string", "primary": true},
            "dialcode": {"type": "integer"}
        },
        "additionalProperties": false
    })
}

fn repository(engine: Arc<ScriptedEngine>) -> Repository {
    let context = StoreContext::new().with_relational(engine);
    Repository::from_document(&country_document(), &context).unwrap()
}

fn fields(value: Value) -> FieldMap {
    value.as_object().unwrap().clone()
}

// =============================================================================
// Query Translation
// =============================================================================

#[test]
fn find_synthesizes_select_and_zips_rows_in_declared_order() {
    setup();
    let engine = ScriptedEngine::new();
    engine.push_rows(vec![
        vec![json!("Canada"), json!("CA"), json!(1)],
        vec![json!("USA"), json!("US"), json!(1)],
    ]);
    let repo = repository(engine.clone());

    let countries: Vec<_> = repo
        .find(Query::new().field("dialcode", json!(1)))
        .unwrap()
        .collect::<Result<_, _>>()
        .unwrap();

    assert_eq!(
        engine.last_statement(),
        "SELECT name,abbreviation,dialcode FROM Country WHERE Country.dialcode = 1"
    );

    assert_eq!(countries.len(), 2);
    assert_eq!(countries[0].get("name"), Some(&json!("Canada")));
    assert_eq!(countries[0].get("abbreviation"), Some(&json!("CA")));
    assert_eq!(countries[0].get("dialcode"), Some(&json!(1)));
    assert_eq!(countries[1].get("name"), Some(&json!("USA")));
    assert_eq!(countries[1].get("abbreviation"), Some(&json!("US")));
}

#[test]
fn sort_and_limit_are_translated() {
    setup();
    let engine = ScriptedEngine::new();
    let repo = repository(engine.clone());

    let _ = repo
        .find(
            Query::new()
                .field("dialcode", json!(1))
                .sort("name", SortOrder::Descending)
                .limit(3),
        )
        .unwrap()
        .count();

    assert_eq!(
        engine.last_statement(),
        "SELECT name,abbreviation,dialcode FROM Country \
         WHERE Country.dialcode = 1 ORDER BY name DESC LIMIT 3"
    );
}

#[test]
fn string_predicates_are_quote_wrapped() {
    setup();
    let engine = ScriptedEngine::new();
    let repo = repository(engine.clone());

    let _ = repo.find_one(&fields(json!({"abbreviation": "SE"}))).unwrap();

    assert_eq!(
        engine.last_statement(),
        "SELECT name,abbreviation,dialcode FROM Country \
         WHERE Country.abbreviation = 'SE' LIMIT 1"
    );
}

#[test]
fn count_translates_the_filter() {
    setup();
    let engine = ScriptedEngine::new();
    engine.push_rows(vec![vec![json!(2)]]);
    let repo = repository(engine.clone());

    let count = repo.count(&fields(json!({"dialcode": 1}))).unwrap();
    assert_eq!(count, 2);
    assert_eq!(
        engine.last_statement(),
        "SELECT COUNT(*) FROM Country WHERE Country.dialcode = 1"
    );
}

#[test]
fn find_by_id_targets_the_primary_key() {
    setup();
    let engine = ScriptedEngine::new();
    engine.push_rows(vec![vec![json!("Sweden"), json!("SE"), json!(46)]]);
    let repo = repository(engine.clone());

    let sweden = repo.find_by_id(&json!("SE")).unwrap().unwrap();
    assert_eq!(sweden.get("name"), Some(&json!("Sweden")));
    assert_eq!(
        engine.last_statement(),
        "SELECT name,abbreviation,dialcode FROM Country \
         WHERE Country.abbreviation = 'SE' LIMIT 1"
    );
}

#[test]
fn find_latest_orders_by_primary_key_descending() {
    setup();
    let engine = ScriptedEngine::new();
    let repo = repository(engine.clone());

    let _ = repo.find_latest(&FieldMap::new()).unwrap();
    assert_eq!(
        engine.last_statement(),
        "SELECT name,abbreviation,dialcode FROM Country \
         ORDER BY abbreviation DESC LIMIT 1"
    );
}

// =============================================================================
// Writes
// =============================================================================

#[test]
fn creating_records_issues_inserts() {
    setup();
    let engine = ScriptedEngine::new();
    let repo = repository(engine.clone());

    for (name, abbreviation, dialcode) in [
        ("Sweden", "SE", 46),
        ("United States of America", "US", 1),
        ("Canada", "CA", 1),
    ] {
        let mut record = repo
            .new_record(fields(json!({
                "name": name,
                "abbreviation": abbreviation,
                "dialcode": dialcode
            })))
            .unwrap();
        repo.save(&mut record).unwrap();
        assert!(record.is_persisted());
    }

    let statements = engine.statements();
    assert_eq!(
        statements[0],
        "INSERT INTO Country (name, abbreviation, dialcode) VALUES ('Sweden', 'SE', 46)"
    );
    assert_eq!(
        statements[2],
        "INSERT INTO Country (name, abbreviation, dialcode) VALUES ('Canada', 'CA', 1)"
    );
}

#[test]
fn saving_a_persisted_record_updates_in_place() {
    setup();
    let engine = ScriptedEngine::new();
    let repo = repository(engine.clone());

    let mut sweden = repo
        .new_record(fields(json!({
            "name": "Sweden",
            "abbreviation": "SE",
            "dialcode": 46
        })))
        .unwrap();
    repo.save(&mut sweden).unwrap();

    sweden.set("name", json!("Sverige")).unwrap();
    repo.save(&mut sweden).unwrap();

    assert_eq!(
        engine.last_statement(),
        "UPDATE Country SET name = 'Sverige', dialcode = 46 \
         WHERE Country.abbreviation = 'SE'"
    );
}

#[test]
fn delete_targets_the_primary_key() {
    setup();
    let engine = ScriptedEngine::new();
    let repo = repository(engine.clone());

    let mut canada = repo
        .new_record(fields(json!({
            "name": "Canada",
            "abbreviation": "CA",
            "dialcode": 1
        })))
        .unwrap();
    repo.save(&mut canada).unwrap();
    repo.delete(&mut canada).unwrap();

    assert_eq!(
        engine.last_statement(),
        "DELETE FROM Country WHERE Country.abbreviation = 'CA'"
    );
    assert!(!canada.is_persisted());
}

#[test]
fn bulk_create_issues_one_multi_row_insert() {
    setup();
    let engine = ScriptedEngine::new();
    let repo = repository(engine.clone());

    let records = repo
        .bulk_create(vec![
            fields(json!({"name": "Sweden", "abbreviation": "SE", "dialcode": 46})),
            fields(json!({"name": "USA", "abbreviation": "US", "dialcode": 1})),
        ])
        .unwrap();

    assert_eq!(records.len(), 2);
    assert_eq!(
        engine.last_statement(),
        "INSERT INTO Country (name,abbreviation,dialcode) VALUES \
         ('Sweden', 'SE', 46), ('USA', 'US', 1)"
    );
}

// =============================================================================
// Backend Selection and Gaps
// =============================================================================

#[test]
fn sql_schema_requires_a_relational_handle() {
    setup();
    let result = Repository::from_document(&country_document(), &StoreContext::new());
    assert!(matches!(result, Err(StoreError::NotConnected(_))));
}

#[test]
fn duplicate_primary_keys_are_rejected_at_open() {
    setup();
    let mut document = country_document();
    document["properties"]["dialcode"]["primary"] = json!(true);

    let context = StoreContext::new().with_relational(ScriptedEngine::new());
    let result = Repository::from_document(&document, &context);
    assert!(matches!(result, Err(StoreError::Schema(_))));
}

#[test]
fn reload_fetches_the_row_again() {
    setup();
    let engine = ScriptedEngine::new();
    let repo = repository(engine.clone());

    let mut sweden = repo
        .new_record(fields(json!({
            "name": "Sweden",
            "abbreviation": "SE",
            "dialcode": 46
        })))
        .unwrap();
    repo.save(&mut sweden).unwrap();

    engine.push_rows(vec![vec![json!("Sverige"), json!("SE"), json!(46)]]);
    repo.reload(&mut sweden).unwrap();
    assert_eq!(sweden.get("name"), Some(&json!("Sverige")));
}
