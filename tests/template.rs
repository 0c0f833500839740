#[cfg(test)]
mod tests {
    use idp::{
        DataAccessTemplate, Error, ErrorKind, Operation, Parameters, QuerySpec, Result,
        RowLabeled, Value,
    };
    use idp_tests::{MemorySource, Response, Stage, init_logs, silent_logs};
    use std::{
        cell::{Cell, RefCell},
        sync::Arc,
        thread,
    };

    const SELECT_NAMES: &str = "SELECT id, name FROM idp";
    const INSERT_NAME: &str = "INSERT INTO idp (name) VALUES (?)";

    fn names(rows: usize) -> Response {
        Response::rows(
            ["id", "name"],
            (0..rows).map(|i| [Value::from(i as i64 + 1), format!("idp_{i}").into()]),
        )
    }

    fn map_name(row: &RowLabeled, _index: usize) -> Result<String> {
        row.get_as("name")
    }

    #[test]
    fn query_maps_every_row_in_order() {
        init_logs();
        let source = MemorySource::new().on(SELECT_NAMES, names(3));
        let template = DataAccessTemplate::new(source.clone());
        let indexes = RefCell::new(Vec::new());
        let result = template
            .query(SELECT_NAMES, |row: &RowLabeled, index: usize| -> Result<(i64, String)> {
                indexes.borrow_mut().push(index);
                Ok((row.get_as("id")?, row.get_as("name")?))
            })
            .expect("Failed to query");
        assert_eq!(*indexes.borrow(), [0, 1, 2]);
        assert_eq!(
            result,
            [
                (1, "idp_0".to_string()),
                (2, "idp_1".to_string()),
                (3, "idp_2".to_string())
            ]
        );
        assert_eq!(source.acquired(), 1);
        source.assert_released();
    }

    #[test]
    fn query_empty_result() {
        let source = MemorySource::new().on(SELECT_NAMES, names(0));
        let template = DataAccessTemplate::new(source.clone());
        let calls = Cell::new(0);
        let result = template
            .query(SELECT_NAMES, |row: &RowLabeled, index: usize| {
                calls.set(calls.get() + 1);
                map_name(row, index)
            })
            .expect("Failed to query");
        assert!(result.is_empty());
        assert_eq!(calls.get(), 0);
        source.assert_released();
    }

    #[test]
    fn fetch_single_cardinality() {
        let source = MemorySource::new()
            .on("SELECT name FROM none", names(0))
            .on("SELECT name FROM one", names(1))
            .on("SELECT name FROM two", names(2))
            .on("SELECT name FROM many", names(5));
        let template = DataAccessTemplate::new(source.clone());
        let calls = Cell::new(0);
        let mapper = |row: &RowLabeled, index: usize| -> Result<String> {
            calls.set(calls.get() + 1);
            assert_eq!(index, 0);
            map_name(row, index)
        };

        let none = template
            .fetch_single("SELECT name FROM none", &mapper)
            .expect("Failed to fetch");
        assert_eq!(none, None);
        assert_eq!(calls.get(), 0);

        let one = template
            .fetch_single("SELECT name FROM one", &mapper)
            .expect("Failed to fetch");
        assert_eq!(one.as_deref(), Some("idp_0"));
        assert_eq!(calls.get(), 1);

        for sql in ["SELECT name FROM two", "SELECT name FROM many"] {
            let error = template
                .fetch_single(sql, &mapper)
                .expect_err("More than one row must fail");
            assert_eq!(error.kind(), ErrorKind::MultipleRecords);
            assert!(error.is_multiple_records());
            assert_eq!(error.operation(), Operation::Query);
            assert_eq!(error.query(), sql);
            assert!(
                error
                    .cause()
                    .to_string()
                    .contains("There are more records than one found for query")
            );
        }
        assert_eq!(calls.get(), 1);
        source.assert_released();
    }

    #[test]
    fn filter_binds_in_order() {
        let source = MemorySource::new().on(SELECT_NAMES, names(1));
        let template = DataAccessTemplate::new(source.clone());
        let filter = |parameters: &mut Parameters| -> Result<()> {
            parameters.bind(true)?.bind("google")?.bind_null::<i64>()?;
            Ok(())
        };
        template
            .query(QuerySpec::new(SELECT_NAMES).filter(&filter), map_name)
            .expect("Failed to query");
        let mut parameters = Parameters::new();
        parameters.bind(7).expect("Failed to bind");
        template
            .execute(QuerySpec::new("DELETE FROM idp WHERE id = ?").filter(&parameters))
            .expect("Failed to delete");
        let executed = source.executed();
        assert_eq!(executed.len(), 2);
        assert_eq!(
            executed[0].1,
            [
                (1, Value::Boolean(Some(true))),
                (2, Value::Varchar(Some("google".into()))),
                (3, Value::Int64(None)),
            ]
        );
        assert_eq!(executed[1].1, [(1, Value::Int32(Some(7)))]);
        source.assert_released();
    }

    #[test]
    fn insert_generated_key() {
        init_logs();
        let source = MemorySource::new().on(INSERT_NAME, Response::affected(1).generated_key(42));
        let template = DataAccessTemplate::new(source.clone());
        let filter = |parameters: &mut Parameters| -> Result<()> {
            parameters.bind("github")?;
            Ok(())
        };
        let spec = QuerySpec::new(INSERT_NAME).filter(&filter);
        assert_eq!(template.execute_insert(spec, true).expect("Failed to insert"), Some(42));
        assert_eq!(template.execute_insert(spec, false).expect("Failed to insert"), None);
        assert_eq!(template.insert_returning_id(spec).expect("Failed to insert"), 42);
        assert_eq!(source.executions(), 3);
        source.assert_released();
    }

    #[test]
    fn insert_without_generated_key() {
        let source = MemorySource::new().on(INSERT_NAME, Response::affected(0));
        let template = DataAccessTemplate::new(source.clone());
        let error = template
            .execute_insert(INSERT_NAME, true)
            .expect_err("A missing key must fail");
        assert_eq!(error.kind(), ErrorKind::NoGeneratedKey);
        assert!(error.is_no_generated_key());
        assert_eq!(error.operation(), Operation::Insert);
        assert!(
            error
                .cause()
                .to_string()
                .contains("no id obtained")
        );
        assert_eq!(
            template
                .execute_insert(INSERT_NAME, false)
                .expect("Not fetching the key must succeed"),
            None
        );
        source.assert_released();
    }

    #[test]
    fn execute_update_reports_affected_rows() {
        let source = MemorySource::new().on("UPDATE idp SET enabled = 0", Response::affected(4));
        let template = DataAccessTemplate::new(source.clone());
        let affected = template
            .execute("UPDATE idp SET enabled = 0")
            .expect("Failed to update");
        assert_eq!(affected.rows_affected, 4);
        template
            .execute_update("UPDATE idp SET enabled = 0")
            .expect("Failed to update");
        source.assert_released();
    }

    #[test]
    fn empty_query() {
        let source = MemorySource::new();
        let template = DataAccessTemplate::new(source.clone());
        for sql in ["", "   \n"] {
            let error = template
                .query(sql, map_name)
                .expect_err("An empty query must fail");
            assert_eq!(error.kind(), ErrorKind::EmptyQuery);
            let error = template
                .execute_update(sql)
                .expect_err("An empty update must fail");
            assert_eq!(error.kind(), ErrorKind::EmptyQuery);
            assert_eq!(error.operation(), Operation::Update);
        }
        assert_eq!(source.acquired(), 0);
    }

    #[test]
    fn acquire_failure() {
        let source = MemorySource::new().on(SELECT_NAMES, names(1));
        source.fail_acquire(true);
        let template = DataAccessTemplate::new(source.clone());
        silent_logs! {
            let error = template
                .query(SELECT_NAMES, map_name)
                .expect_err("No connection must fail");
            assert_eq!(error.kind(), ErrorKind::Connection);
            assert_eq!(error.operation(), Operation::Query);
        }
        assert_eq!(source.executions(), 0);
        source.fail_acquire(false);
        assert_eq!(template.query(SELECT_NAMES, map_name).expect("Failed to query").len(), 1);
        source.assert_released();
    }

    #[test]
    fn failing_filter_prevents_execution() {
        let source = MemorySource::new().on(INSERT_NAME, Response::affected(1).generated_key(1));
        let template = DataAccessTemplate::new(source.clone());
        let filter = |parameters: &mut Parameters| -> Result<()> {
            parameters.bind("first")?;
            Err(Error::msg("The second value is not available"))
        };
        let error = template
            .execute_insert(QuerySpec::new(INSERT_NAME).filter(&filter), true)
            .expect_err("The filter failed");
        assert_eq!(error.kind(), ErrorKind::Binding);
        assert_eq!(error.operation(), Operation::Insert);
        assert_eq!(error.query(), INSERT_NAME);
        assert_eq!(source.executions(), 0);
        let filter = |parameters: &mut Parameters| -> Result<()> {
            parameters.bind_index("value", 0)?;
            Ok(())
        };
        let error = template
            .execute_update(QuerySpec::new(INSERT_NAME).filter(&filter))
            .expect_err("Index 0 is not a placeholder");
        assert_eq!(error.kind(), ErrorKind::Binding);
        assert_eq!(source.executions(), 0);
        source.assert_released();
    }

    #[test]
    fn filter_runs_once_per_call() {
        let source = MemorySource::new()
            .on(SELECT_NAMES, names(3))
            .on("SELECT id, name FROM idp WHERE id = 1", names(1))
            .on("UPDATE idp SET enabled = 0", Response::affected(2))
            .on(INSERT_NAME, Response::affected(1).generated_key(9));
        let template = DataAccessTemplate::new(source.clone());
        let calls = Cell::new(0);
        let filter = |_: &mut Parameters| -> Result<()> {
            calls.set(calls.get() + 1);
            Ok(())
        };
        let filtered = |sql: &'static str| QuerySpec::new(sql).filter(&filter);

        template
            .query(filtered(SELECT_NAMES), map_name)
            .expect("Failed to query");
        assert_eq!(calls.get(), 1);
        template
            .fetch_single(filtered("SELECT id, name FROM idp WHERE id = 1"), map_name)
            .expect("Failed to fetch");
        assert_eq!(calls.get(), 2);
        template
            .execute(filtered("UPDATE idp SET enabled = 0"))
            .expect("Failed to update");
        assert_eq!(calls.get(), 3);
        template
            .execute_insert(filtered(INSERT_NAME), false)
            .expect("Failed to insert");
        assert_eq!(calls.get(), 4);
        template
            .execute_insert(filtered(INSERT_NAME), true)
            .expect("Failed to insert");
        assert_eq!(calls.get(), 5);
        assert_eq!(source.executions(), 5);
        source.assert_released();
    }

    #[test]
    fn out_of_range_index_is_a_binding_error() {
        let source = MemorySource::new().on(INSERT_NAME, Response::affected(1));
        let template = DataAccessTemplate::new(source.clone());
        let filter = |parameters: &mut Parameters| -> Result<()> {
            parameters.bind_index("x", u64::MAX)?;
            Ok(())
        };
        let error = template
            .execute_update(QuerySpec::new(INSERT_NAME).filter(&filter))
            .expect_err("The last index cannot be bound");
        assert_eq!(error.kind(), ErrorKind::Binding);
        assert_eq!(error.operation(), Operation::Update);
        assert_eq!(source.executions(), 0);
        source.assert_released();
    }

    #[test]
    fn null_generated_key() {
        let source = MemorySource::new().on(
            INSERT_NAME,
            Response::affected(1).generated_key(5).null_generated_key(),
        );
        let template = DataAccessTemplate::new(source.clone());
        let error = template
            .execute_insert(INSERT_NAME, true)
            .expect_err("A NULL key is no key");
        assert_eq!(error.kind(), ErrorKind::NoGeneratedKey);
        assert!(error.is_no_generated_key());
        source.assert_released();
    }

    #[test]
    fn failing_mapper_releases_everything() {
        let source = MemorySource::new()
            .on(SELECT_NAMES, names(3))
            .on("SELECT id, name FROM idp WHERE id = 1", names(1));
        let template = DataAccessTemplate::new(source.clone());
        let calls = Cell::new(0);
        let error = template
            .query(SELECT_NAMES, |row: &RowLabeled, index: usize| -> Result<String> {
                calls.set(calls.get() + 1);
                if index == 1 {
                    return Err(Error::msg("Unexpected name"));
                }
                map_name(row, index)
            })
            .expect_err("The mapper failed");
        assert_eq!(error.kind(), ErrorKind::Mapping);
        assert_eq!(calls.get(), 2);
        assert_eq!(source.open_cursors(), 0);
        let error = template
            .fetch_single("SELECT id, name FROM idp WHERE id = 1", |row: &RowLabeled, _: usize| {
                row.get_as::<bool>("name")
            })
            .expect_err("A name is not a boolean");
        assert_eq!(error.kind(), ErrorKind::Mapping);
        source.assert_released();
    }

    #[test]
    fn driver_failures_release_everything() {
        let cases = [
            (Stage::Prepare, Operation::Query),
            (Stage::Bind, Operation::Query),
            (Stage::Execute, Operation::Query),
            (Stage::Row(0), Operation::Query),
            (Stage::Row(1), Operation::Query),
            (Stage::Execute, Operation::Update),
            (Stage::Execute, Operation::Insert),
            (Stage::GeneratedKeys, Operation::Insert),
        ];
        for (stage, operation) in cases {
            let sql = "SELECT id, name FROM idp WHERE name = ?";
            let source = MemorySource::new().on(sql, names(2).generated_key(1).fail_at(stage));
            let template = DataAccessTemplate::new(source.clone());
            let filter = |parameters: &mut Parameters| -> Result<()> {
                parameters.bind("google")?;
                Ok(())
            };
            let spec = QuerySpec::new(sql).filter(&filter);
            let error = match operation {
                Operation::Query => template.query(spec, map_name).map(|_| ()),
                Operation::Update => template.execute_update(spec),
                Operation::Insert => template.execute_insert(spec, true).map(|_| ()),
            }
            .expect_err("The driver failed");
            assert_eq!(error.kind(), ErrorKind::Statement, "{stage:?}");
            assert_eq!(error.operation(), operation);
            assert!(error.to_string().contains(sql));
            source.assert_released();
        }
    }

    #[test]
    fn error_message() {
        let source = MemorySource::new().on(SELECT_NAMES, names(0).fail_at(Stage::Execute));
        let template = DataAccessTemplate::new(source);
        let error = template
            .query(SELECT_NAMES, map_name)
            .expect_err("The driver failed");
        assert_eq!(
            error.to_string(),
            "Error in performing database query: SELECT id, name FROM idp"
        );
        assert_eq!(error.cause().to_string(), "Constraint violation");
    }

    #[test]
    fn concurrent_calls() {
        init_logs();
        let source = MemorySource::with_responder(|_, bound| {
            let Some((_, value)) = bound.first() else {
                return Response::default();
            };
            Response::rows(["echo"], [[value.clone()]])
        });
        let template = DataAccessTemplate::new(Arc::new(source.clone()));
        thread::scope(|scope| {
            for t in 0..8i64 {
                let template = &template;
                scope.spawn(move || {
                    for i in 0..50i64 {
                        let expected = t * 1000 + i;
                        let filter = |parameters: &mut Parameters| -> Result<()> {
                            parameters.bind(expected)?;
                            Ok(())
                        };
                        let value = template
                            .fetch_single(
                                QuerySpec::new("SELECT ? AS echo").filter(&filter),
                                |row: &RowLabeled, _: usize| row.get_as::<i64>("echo"),
                            )
                            .expect("Failed to echo");
                        assert_eq!(value, Some(expected));
                    }
                });
            }
        });
        assert_eq!(source.acquired(), 8 * 50);
        assert_eq!(source.executions(), 8 * 50);
        source.assert_released();
    }
}
