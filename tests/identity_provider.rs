#[cfg(test)]
mod tests {
    use idp::{
        ErrorKind, IdentityProvider, IdentityProviderDao, IdentityProviderProperty,
        ResidentIdentityProvider, Value,
    };
    use idp_tests::{MemorySource, Response, Stage, init_logs};

    fn idp_row(id: i64, name: &str, enabled: bool) -> Vec<Value> {
        vec![
            id.into(),
            name.into(),
            Option::<String>::None.into(),
            format!("{name} description").into(),
            enabled.into(),
            true.into(),
        ]
    }

    /// Answers like a database holding `google` (id 1) and `LOCAL` (id 2).
    fn source() -> MemorySource {
        MemorySource::with_responder(|sql, bound| {
            let id = bound.first().map(|(_, v)| v.clone());
            let labels = [
                "id",
                "name",
                "display_name",
                "description",
                "enabled",
                "jit_enabled",
            ];
            if sql.contains("FROM idp_property") {
                let rows = [(1, "client_id", "abc"), (1, "scope", "openid"), (2, "theme", "dark")]
                    .into_iter()
                    .filter(|(i, _, _)| id.is_none() || id == Some(Value::from(*i as i64)))
                    .map(|(i, n, v)| [Value::from(i as i64), n.into(), v.into()]);
                Response::rows(["idp_id", "name", "value"], rows)
            } else if sql.contains("FROM idp_provisioning_idp") {
                let rows = [(1, "facebook")]
                    .into_iter()
                    .filter(|(i, _)| id.is_none() || id == Some(Value::from(*i as i64)))
                    .map(|(i, p)| [Value::from(i as i64), p.into()]);
                Response::rows(["idp_id", "provisioning_idp"], rows)
            } else if sql.contains("WHERE name = ?") {
                let rows = match id {
                    Some(Value::Varchar(Some(name))) if name == "google" => {
                        vec![idp_row(1, "google", true)]
                    }
                    Some(Value::Varchar(Some(name))) if name == "LOCAL" => {
                        vec![idp_row(2, "LOCAL", true)]
                    }
                    _ => vec![],
                };
                Response::rows(labels, rows)
            } else if sql.contains("WHERE id = ?") && sql.contains("SELECT") {
                let rows = match id {
                    Some(Value::Int64(Some(1))) => vec![idp_row(1, "google", true)],
                    _ => vec![],
                };
                Response::rows(labels, rows)
            } else if sql.contains("FROM idp") {
                Response::rows(labels, [idp_row(1, "google", true), idp_row(2, "LOCAL", false)])
            } else if sql.contains("INSERT INTO idp (") {
                Response::affected(1).generated_key(7)
            } else if sql.contains("UPDATE idp") {
                let found = bound
                    .iter()
                    .any(|(i, v)| *i == 2 && *v == Value::from(1i64));
                Response::affected(found as u64)
            } else {
                Response::affected(1)
            }
        })
    }

    #[test]
    fn add_stores_children() {
        init_logs();
        let source = source();
        let dao = IdentityProviderDao::new(source.clone());
        let idp = IdentityProvider::builder(0, "github")
            .display_name("GitHub")
            .add_property(IdentityProviderProperty::new("client_id", "xyz"))
            .add_provisioning_idp("google")
            .build();
        assert_eq!(dao.add(&idp).expect("Failed to add"), 7);
        let executed = source.executed();
        assert_eq!(executed.len(), 3);
        assert!(executed[0].0.contains("INSERT INTO idp ("));
        assert_eq!(
            executed[0].1,
            [
                (1, Value::from("github")),
                (2, Value::from("GitHub")),
                (3, Value::Varchar(None)),
                (4, Value::from(true)),
                (5, Value::from(false)),
            ]
        );
        assert!(executed[1].0.contains("INSERT INTO idp_property"));
        assert_eq!(
            executed[1].1,
            [(1, Value::from(7i64)), (2, "client_id".into()), (3, "xyz".into())]
        );
        assert!(executed[2].0.contains("INSERT INTO idp_provisioning_idp"));
        assert_eq!(executed[2].1, [(1, Value::from(7i64)), (2, "google".into())]);
        source.assert_released();
    }

    #[test]
    fn get_assembles_children() {
        let source = source();
        let dao = IdentityProviderDao::new(source.clone());
        let google = dao
            .get(1)
            .expect("Failed to get")
            .expect("Google not found");
        assert_eq!(google.name(), "google");
        assert_eq!(google.display_name(), None);
        assert_eq!(google.description(), Some("google description"));
        assert_eq!(google.property("scope"), Some("openid"));
        assert_eq!(google.properties().len(), 2);
        assert!(google.jit_provisioning().is_jit_enabled());
        assert!(google.jit_provisioning().provisioning_idps().contains("facebook"));
        assert_eq!(dao.get(5).expect("Failed to get"), None);
        let by_name = dao
            .get_by_name("google")
            .expect("Failed to get by name")
            .expect("Google not found");
        assert_eq!(by_name, google);
        source.assert_released();
    }

    #[test]
    fn resident_and_list() {
        let source = source();
        let dao = IdentityProviderDao::new(source.clone());
        let resident: ResidentIdentityProvider = dao
            .get_resident()
            .expect("Failed to get the resident")
            .expect("Resident not found");
        assert_eq!(resident.id(), 2);
        assert_eq!(resident.name(), ResidentIdentityProvider::NAME);
        assert_eq!(resident.property("theme"), Some("dark"));
        let all = dao.list().expect("Failed to list");
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].properties().len(), 2);
        assert_eq!(all[1].properties().len(), 1);
        assert!(!all[1].is_enabled());
        assert!(all[1].jit_provisioning().provisioning_idps().is_empty());
        source.assert_released();
    }

    #[test]
    fn set_enabled_and_delete() {
        let source = source();
        let dao = IdentityProviderDao::new(source.clone());
        assert!(dao.set_enabled(1, false).expect("Failed to disable"));
        assert!(!dao.set_enabled(3, false).expect("Failed to disable"));
        dao.delete(1).expect("Failed to delete");
        let executed = source.executed();
        assert_eq!(executed.len(), 5);
        assert!(executed[2].0.contains("DELETE FROM idp_property"));
        assert!(executed[4].0.contains("DELETE FROM idp WHERE"));
        assert!(executed[2..].iter().all(|(_, b)| *b == [(1, Value::from(1i64))]));
        source.assert_released();
    }

    #[test]
    fn failed_child_insert() {
        let source = MemorySource::new()
            .on(
                "INSERT INTO idp_property (idp_id, name, value) VALUES (?, ?, ?)",
                Response::default().fail_at(Stage::Execute),
            )
            .on(
                "INSERT INTO idp (name, display_name, description, enabled, jit_enabled)\nVALUES (?, ?, ?, ?, ?)",
                Response::affected(1).generated_key(3),
            );
        let dao = IdentityProviderDao::new(source.clone());
        let idp = IdentityProvider::builder(0, "github")
            .add_property(IdentityProviderProperty::new("client_id", "xyz"))
            .build();
        let error = dao.add(&idp).expect_err("The property insert failed");
        assert_eq!(error.kind(), ErrorKind::Statement);
        assert!(error.query().starts_with("INSERT INTO idp_property"));
        source.assert_released();
    }
}
