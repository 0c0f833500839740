use crate::identity_providers::{MUTEX, reset_schema};
use idp::{ConnectionSource, IdentityProvider, IdentityProviderDao, IdentityProviderProperty};
use std::{sync::PoisonError, thread};

const THREADS: usize = 4;
const PER_THREAD: usize = 5;

/// Threads sharing one dao, each working on its own identity providers.
pub fn concurrent<S: ConnectionSource>(source: &S) {
    let _lock = MUTEX.lock().unwrap_or_else(PoisonError::into_inner);
    let dao = IdentityProviderDao::new(source);

    // Setup
    reset_schema(&dao);

    thread::scope(|scope| {
        for t in 0..THREADS {
            let dao = &dao;
            scope.spawn(move || {
                for i in 0..PER_THREAD {
                    let name = format!("idp_{t}_{i}");
                    let idp = IdentityProvider::builder(0, name.as_str())
                        .add_property(IdentityProviderProperty::new("thread", t.to_string()))
                        .add_provisioning_idp(format!("idp_{t}_{}", (i + 1) % PER_THREAD))
                        .build();
                    let id = dao.add(&idp).expect("Failed to add from a thread");
                    let loaded = dao
                        .get_by_name(&name)
                        .expect("Failed to get from a thread")
                        .expect("Identity provider added by this thread is missing");
                    assert_eq!(loaded.id(), id);
                    assert_eq!(loaded.property("thread"), Some(t.to_string().as_str()));
                    if i % 2 == 1 {
                        assert!(dao.set_enabled(id, false).expect("Failed to disable"));
                    }
                }
            });
        }
    });

    let all = dao.list().expect("Failed to list");
    assert_eq!(all.len(), THREADS * PER_THREAD);
    for t in 0..THREADS {
        let mine = all
            .iter()
            .filter(|idp| idp.property("thread") == Some(t.to_string().as_str()))
            .collect::<Vec<_>>();
        assert_eq!(mine.len(), PER_THREAD);
        assert_eq!(mine.iter().filter(|idp| !idp.is_enabled()).count(), PER_THREAD / 2);
        assert!(mine.iter().all(|idp| idp.name().starts_with(&format!("idp_{t}_"))));
        assert!(
            mine.iter()
                .all(|idp| idp.jit_provisioning().provisioning_idps().len() == 1)
        );
    }
}
