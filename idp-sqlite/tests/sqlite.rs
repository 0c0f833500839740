#[cfg(test)]
mod tests {
    use idp_sqlite::SqliteSource;
    use idp_tests::{execute_tests, init_logs};
    use std::{fs, path::Path, sync::Mutex};

    static MUTEX: Mutex<()> = Mutex::new(());

    #[test]
    fn sqlite() {
        init_logs();
        const DB_PATH: &'static str = "../target/debug/tests.sqlite";
        let _guard = MUTEX.lock().unwrap();
        if Path::new(DB_PATH).exists() {
            fs::remove_file(DB_PATH).expect(
                format!("Failed to remove existing test database file {}", DB_PATH).as_str(),
            );
        }
        assert!(
            !Path::new(DB_PATH).exists(),
            "Database file should not exist before test"
        );
        let source = SqliteSource::new(&format!("sqlite://{}?mode=rwc&busy_timeout=10000", DB_PATH))
            .expect("Could not create the sqlite source");
        execute_tests(source);
    }
}
