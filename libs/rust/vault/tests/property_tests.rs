//! Property-based tests for secret store semantics.

use envelope_vault_client::{CreateOutcome, InMemorySecretStore, SecretLookup, SecretStore};
use proptest::prelude::*;

fn secret_name_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        "[a-z0-9-]{1,24}".prop_map(|t| format!("dek-{t}")),
        "[a-z0-9-]{1,24}".prop_map(|t| format!("kek-ref-{t}")),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// The first conditional create wins; later ones never overwrite it.
    #[test]
    fn prop_first_create_wins(
        name in secret_name_strategy(),
        values in prop::collection::vec("[A-Za-z0-9+/=]{4,44}", 1..8),
    ) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let store = InMemorySecretStore::new();
            let mut created = 0;
            for value in &values {
                if store.create_secret(&name, value).await.unwrap() == CreateOutcome::Created {
                    created += 1;
                }
            }
            prop_assert_eq!(created, 1);
            prop_assert_eq!(
                store.get_secret(&name).await.unwrap(),
                SecretLookup::Found(values[0].clone())
            );
            Ok(())
        })?;
    }

    /// An unconditional set always leaves the last written value.
    #[test]
    fn prop_set_is_last_writer_wins(
        name in secret_name_strategy(),
        values in prop::collection::vec("[A-Za-z0-9+/=]{4,44}", 1..8),
    ) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let store = InMemorySecretStore::new();
            for value in &values {
                store.set_secret(&name, value).await.unwrap();
            }
            prop_assert_eq!(
                store.get_secret(&name).await.unwrap().into_option(),
                values.last().cloned()
            );
            Ok(())
        })?;
    }
}
