use idp::{
    ConnectionSource, ErrorKind, IdentityProvider, IdentityProviderDao, IdentityProviderProperty,
    Operation, ResidentIdentityProvider,
};
use std::sync::{LazyLock, Mutex, PoisonError};

pub(crate) static MUTEX: LazyLock<Mutex<()>> = LazyLock::new(|| Mutex::new(()));

/// Drop and recreate the identity provider tables.
pub(crate) fn reset_schema<S: ConnectionSource>(dao: &IdentityProviderDao<S>) {
    for table in ["idp_provisioning_idp", "idp_property", "idp"] {
        dao.template()
            .execute_update(format!("DROP TABLE IF EXISTS {table}").as_str())
            .expect("Failed to drop an identity provider table");
    }
    dao.create_schema()
        .expect("Failed to create the identity provider tables");
}

pub fn identity_providers<S: ConnectionSource>(source: &S) {
    let _lock = MUTEX.lock().unwrap_or_else(PoisonError::into_inner);
    let dao = IdentityProviderDao::new(source);

    // Setup
    reset_schema(&dao);
    dao.create_schema()
        .expect("Creating the schema twice must not fail");
    assert!(dao.list().expect("Failed to list").is_empty());
    assert_eq!(dao.get(1).expect("Failed to get"), None);
    assert_eq!(dao.get_resident().expect("Failed to get the resident"), None);

    // Add
    let google = IdentityProvider::builder(0, "google")
        .display_name("Google")
        .description("Sign in with Google")
        .jit_enabled(true)
        .add_provisioning_idp("facebook")
        .add_provisioning_idp("github")
        .add_property(IdentityProviderProperty::new("client_id", "abc123"))
        .add_property(IdentityProviderProperty::new("scope", "openid"))
        .add_property(IdentityProviderProperty::new("scope", "email"))
        .build();
    let google_id = dao.add(&google).expect("Failed to add google");
    let github = IdentityProvider::builder(0, "github")
        .enabled(false)
        .build();
    let github_id = dao.add(&github).expect("Failed to add github");
    assert_ne!(google_id, github_id);
    let resident = ResidentIdentityProvider::builder(0, ResidentIdentityProvider::NAME)
        .map(|b| b.description("Resident identity provider"))
        .build();
    let resident_id = dao.add(&resident).expect("Failed to add the resident");

    // Get
    let loaded = dao
        .get(google_id)
        .expect("Failed to get google")
        .expect("Google not found");
    assert_eq!(loaded, google.to_builder().id(google_id).build());
    assert_eq!(loaded.property("client_id"), Some("abc123"));
    assert_eq!(loaded.properties().len(), 3);
    assert_eq!(
        loaded
            .jit_provisioning()
            .provisioning_idps()
            .iter()
            .collect::<Vec<_>>(),
        ["facebook", "github"]
    );
    let loaded = dao
        .get_by_name("github")
        .expect("Failed to get github by name")
        .expect("Github not found");
    assert_eq!(loaded.id(), github_id);
    assert!(!loaded.is_enabled());
    assert_eq!(loaded.display_name(), None);
    assert!(loaded.properties().is_empty());
    assert_eq!(dao.get_by_name("twitter").expect("Failed to get"), None);
    let loaded = dao
        .get_resident()
        .expect("Failed to get the resident")
        .expect("Resident not found");
    assert_eq!(loaded.id(), resident_id);
    assert_eq!(loaded.description(), Some("Resident identity provider"));

    // Duplicate name
    let error = dao
        .add(&IdentityProvider::builder(0, "google").build())
        .expect_err("The name is unique");
    assert_eq!(error.kind(), ErrorKind::Statement);
    assert_eq!(error.operation(), Operation::Insert);

    // List
    let all = dao.list().expect("Failed to list");
    assert_eq!(
        all.iter().map(IdentityProvider::id).collect::<Vec<_>>(),
        [google_id, github_id, resident_id]
    );
    assert_eq!(all[0].properties(), google.properties());
    assert_eq!(
        all[0].jit_provisioning(),
        google.jit_provisioning(),
    );

    // Enable
    assert!(dao.set_enabled(github_id, true).expect("Failed to enable"));
    assert!(
        dao.get(github_id)
            .expect("Failed to get github")
            .expect("Github not found")
            .is_enabled()
    );
    assert!(!dao.set_enabled(9999, true).expect("Failed to enable"));

    // Delete
    dao.delete(google_id).expect("Failed to delete google");
    assert_eq!(dao.get(google_id).expect("Failed to get"), None);
    let count = dao
        .template()
        .fetch_single(
            "SELECT COUNT(*) FROM idp_property",
            |row: &idp::RowLabeled, _: usize| row.get_as::<i64>(0),
        )
        .expect("Failed to count the properties");
    assert_eq!(count, Some(0));
    assert_eq!(dao.list().expect("Failed to list").len(), 2);
    dao.delete(google_id)
        .expect("Deleting twice must not fail");
}
