use idp::{
    ConnectionSource, DataAccessTemplate, ErrorKind, Operation, Parameters, QuerySpec, Result,
    RowLabeled,
};
use std::{
    cell::{Cell, RefCell},
    sync::{LazyLock, Mutex, PoisonError},
};

#[derive(Debug, PartialEq)]
struct Check {
    id: i64,
    name: String,
    score: Option<i32>,
}

fn map_check(row: &RowLabeled, _index: usize) -> Result<Check> {
    Ok(Check {
        id: row.get_as("id")?,
        name: row.get_as("name")?,
        score: row.get_as("score")?,
    })
}

pub fn template<S: ConnectionSource>(source: &S) {
    static MUTEX: LazyLock<Mutex<()>> = LazyLock::new(|| Mutex::new(()));
    let _lock = MUTEX.lock().unwrap_or_else(PoisonError::into_inner);

    let template = DataAccessTemplate::new(source);

    // Setup
    template
        .execute_update("DROP TABLE IF EXISTS template_check")
        .expect("Failed to drop template_check table");
    template
        .execute_update(
            "CREATE TABLE template_check (id INTEGER PRIMARY KEY AUTOINCREMENT, name VARCHAR(64) NOT NULL, score INTEGER)",
        )
        .expect("Failed to create template_check table");

    // Empty
    let rows = template
        .query("SELECT id, name, score FROM template_check", map_check)
        .expect("Failed to query the empty table");
    assert!(rows.is_empty());
    let row = template
        .fetch_single("SELECT id, name, score FROM template_check", map_check)
        .expect("Failed to fetch from the empty table");
    assert_eq!(row, None);

    // Insert
    let mut ids = Vec::new();
    for (name, score) in [("alpha", Some(10)), ("bravo", None), ("charlie", Some(-3))] {
        let filter = |parameters: &mut Parameters| -> Result<()> {
            parameters.bind(name)?.bind(score)?;
            Ok(())
        };
        let id = template
            .execute_insert(
                QuerySpec::new("INSERT INTO template_check (name, score) VALUES (?, ?)")
                    .filter(&filter),
                true,
            )
            .expect("Failed to insert a row")
            .expect("The generated id is missing");
        ids.push(id);
    }
    assert!(ids.windows(2).all(|w| w[0] < w[1]));
    let id = template
        .execute_insert(
            "INSERT INTO template_check (name, score) VALUES ('delta', 4)",
            false,
        )
        .expect("Failed to insert without fetching the id");
    assert_eq!(id, None);

    // Query in order
    let indexes = RefCell::new(Vec::new());
    let rows = template
        .query(
            "SELECT id, name, score FROM template_check ORDER BY id",
            |row: &RowLabeled, index: usize| -> Result<Check> {
                indexes.borrow_mut().push(index);
                map_check(row, index)
            },
        )
        .expect("Failed to query template_check");
    assert_eq!(*indexes.borrow(), [0, 1, 2, 3]);
    assert_eq!(
        rows.iter().map(|r| r.name.as_str()).collect::<Vec<_>>(),
        ["alpha", "bravo", "charlie", "delta"]
    );
    assert_eq!(rows[0].id, ids[0]);
    assert_eq!(rows[1].score, None);
    assert_eq!(rows[2].score, Some(-3));

    // Single row
    let filter = |parameters: &mut Parameters| -> Result<()> {
        parameters.bind(ids[1])?;
        Ok(())
    };
    let row = template
        .fetch_single(
            QuerySpec::new("SELECT id, name, score FROM template_check WHERE id = ?")
                .filter(&filter),
            map_check,
        )
        .expect("Failed to fetch a single row")
        .expect("Row bravo not found");
    assert_eq!(
        row,
        Check {
            id: ids[1],
            name: "bravo".into(),
            score: None,
        }
    );
    let calls = Cell::new(0);
    let error = template
        .fetch_single(
            "SELECT id, name, score FROM template_check WHERE score IS NOT NULL",
            |row: &RowLabeled, index: usize| -> Result<Check> {
                calls.set(calls.get() + 1);
                map_check(row, index)
            },
        )
        .expect_err("More than one row must fail");
    assert_eq!(error.kind(), ErrorKind::MultipleRecords);
    assert_eq!(error.operation(), Operation::Query);
    assert_eq!(calls.get(), 0);

    // Update
    let filter = |parameters: &mut Parameters| -> Result<()> {
        parameters.bind(100)?.bind("alpha")?;
        Ok(())
    };
    let affected = template
        .execute(
            QuerySpec::new("UPDATE template_check SET score = ? WHERE name = ?").filter(&filter),
        )
        .expect("Failed to update alpha");
    assert_eq!(affected.rows_affected, 1);
    let affected = template
        .execute("UPDATE template_check SET score = 0 WHERE name = 'nobody'")
        .expect("Failed to update nothing");
    assert_eq!(affected.rows_affected, 0);
    let score = template
        .fetch_single(
            "SELECT score FROM template_check WHERE name = 'alpha'",
            |row: &RowLabeled, _: usize| row.get_as::<i32>(0),
        )
        .expect("Failed to read the score of alpha");
    assert_eq!(score, Some(100));

    // No generated key
    let error = template
        .execute_insert(
            "INSERT INTO template_check (name, score) SELECT 'echo', 5 WHERE 1 = 0",
            true,
        )
        .expect_err("Inserting nothing cannot produce a key");
    assert_eq!(error.kind(), ErrorKind::NoGeneratedKey);
    assert_eq!(error.operation(), Operation::Insert);

    // Failures
    let error = template
        .query("SELECT * FROM template_missing", map_check)
        .expect_err("Querying a missing table must fail");
    assert_eq!(error.kind(), ErrorKind::Statement);
    assert_eq!(error.query(), "SELECT * FROM template_missing");
    let error = template
        .query(
            "SELECT id, name FROM template_check",
            |row: &RowLabeled, _: usize| row.get_as::<i32>("score"),
        )
        .expect_err("Mapping a missing column must fail");
    assert_eq!(error.kind(), ErrorKind::Mapping);
    let error = template
        .execute_update("INSERT INTO template_check (name) VALUES (NULL)")
        .expect_err("A null name violates the constraint");
    assert_eq!(error.kind(), ErrorKind::Statement);
    assert_eq!(error.operation(), Operation::Update);
    let count = template
        .fetch_single("SELECT COUNT(*) FROM template_check", |row: &RowLabeled, _: usize| {
            row.get_as::<i64>(0)
        })
        .expect("Failed to count the rows");
    assert_eq!(count, Some(4));
}
