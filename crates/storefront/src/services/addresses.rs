//! The saved address book.
//!
//! At most one address per user is the default. The write path makes that
//! explicit: saving with "default" checked clears the flag on the user's
//! other addresses in the same transaction that writes the row, and
//! [`AddressStore::set_default_address`](crate::db::AddressStore::set_default_address)
//! swaps it the same way.

use thiserror::Error;
use tracing::instrument;

use tienda_core::{AddressId, UserId};

use crate::db::{RepositoryError, Store};
use crate::models::{Address, AddressInput, ValidationError};

#[derive(Debug, Error)]
pub enum AddressError {
    #[error("address not found")]
    NotFound,

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Repository(RepositoryError),
}

impl From<RepositoryError> for AddressError {
    fn from(e: RepositoryError) -> Self {
        match e {
            RepositoryError::NotFound => Self::NotFound,
            other => Self::Repository(other),
        }
    }
}

pub struct AddressBook<'a> {
    store: &'a dyn Store,
}

impl<'a> AddressBook<'a> {
    #[must_use]
    pub const fn new(store: &'a dyn Store) -> Self {
        Self { store }
    }

    /// Default first, then newest first.
    ///
    /// # Errors
    ///
    /// Returns `AddressError::Repository` if the store fails.
    pub async fn list(&self, user: UserId) -> Result<Vec<Address>, AddressError> {
        Ok(self.store.addresses(user).await?)
    }

    /// # Errors
    ///
    /// Returns `AddressError::NotFound` unless `user` owns the address.
    pub async fn get(&self, user: UserId, id: AddressId) -> Result<Address, AddressError> {
        self.store
            .address(user, id)
            .await?
            .ok_or(AddressError::NotFound)
    }

    /// Create (`id` is `None`) or edit an address.
    ///
    /// With `is_default` the address becomes the user's only default. Editing
    /// the current default with `is_default` unchecked clears its flag.
    ///
    /// # Errors
    ///
    /// - `AddressError::Validation` for bad form input
    /// - `AddressError::NotFound` when editing an address the user doesn't own
    #[instrument(skip(self, input), fields(user_id = %user))]
    pub async fn save(
        &self,
        user: UserId,
        id: Option<AddressId>,
        input: &AddressInput,
        is_default: bool,
    ) -> Result<Address, AddressError> {
        let fields = input.validate()?;
        let saved = self
            .store
            .save_address(user, id, &fields, is_default)
            .await?;
        if is_default {
            tracing::info!(address_id = %saved.id, "Default address changed");
        }
        Ok(saved)
    }

    /// # Errors
    ///
    /// Returns `AddressError::NotFound` unless `user` owns the address.
    #[instrument(skip(self), fields(user_id = %user))]
    pub async fn set_default(&self, user: UserId, id: AddressId) -> Result<(), AddressError> {
        self.store.set_default_address(user, id).await?;
        tracing::info!(address_id = %id, "Default address changed");
        Ok(())
    }

    /// Delete an address. Deleting the default leaves the user without one.
    ///
    /// # Errors
    ///
    /// Returns `AddressError::NotFound` unless `user` owns the address.
    #[instrument(skip(self), fields(user_id = %user))]
    pub async fn delete(&self, user: UserId, id: AddressId) -> Result<(), AddressError> {
        Ok(self.store.delete_address(user, id).await?)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::db::MemoryStore;

    fn input(street: &str) -> AddressInput {
        AddressInput {
            full_name: Some("Camila Soto".to_owned()),
            phone: Some("+56912345678".to_owned()),
            street: Some(street.to_owned()),
            comuna: Some("Valparaíso".to_owned()),
            region: Some("valparaiso".to_owned()),
            ..AddressInput::default()
        }
    }

    fn defaults(addresses: &[Address]) -> Vec<AddressId> {
        addresses
            .iter()
            .filter(|a| a.is_default)
            .map(|a| a.id)
            .collect()
    }

    #[tokio::test]
    async fn test_saving_with_default_keeps_a_single_default() {
        let store = MemoryStore::new();
        let book = AddressBook::new(&store);
        let user = UserId::new(1);

        let a = book.save(user, None, &input("Calle 1"), true).await.unwrap();
        let b = book.save(user, None, &input("Calle 2"), true).await.unwrap();
        book.save(user, None, &input("Calle 3"), false).await.unwrap();
        book.save(user, Some(a.id), &input("Calle 1 B"), true)
            .await
            .unwrap();

        let all = book.list(user).await.unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(defaults(&all), vec![a.id]);
        assert_eq!(all[0].id, a.id);
        assert!(!book.get(user, b.id).await.unwrap().is_default);
    }

    #[tokio::test]
    async fn test_unchecking_default_on_edit_clears_it() {
        let store = MemoryStore::new();
        let book = AddressBook::new(&store);
        let user = UserId::new(1);
        let a = book.save(user, None, &input("Calle 1"), true).await.unwrap();

        let edited = book
            .save(user, Some(a.id), &input("Calle 1"), false)
            .await
            .unwrap();

        assert!(!edited.is_default);
        assert!(defaults(&book.list(user).await.unwrap()).is_empty());
    }

    #[tokio::test]
    async fn test_rejected_default_edit_changes_nothing() {
        let store = MemoryStore::new();
        let book = AddressBook::new(&store);
        let owner = UserId::new(1);
        let stranger = UserId::new(2);
        let theirs = book.save(owner, None, &input("Calle 1"), true).await.unwrap();
        let mine = book
            .save(stranger, None, &input("Calle 2"), true)
            .await
            .unwrap();

        let err = book
            .save(stranger, Some(theirs.id), &input("Robada"), true)
            .await
            .unwrap_err();

        assert!(matches!(err, AddressError::NotFound));
        assert_eq!(defaults(&book.list(stranger).await.unwrap()), vec![mine.id]);
        let kept = book.get(owner, theirs.id).await.unwrap();
        assert!(kept.is_default);
        assert_eq!(kept.fields.street, "Calle 1");
    }

    #[tokio::test]
    async fn test_defaults_are_per_user() {
        let store = MemoryStore::new();
        let book = AddressBook::new(&store);
        book.save(UserId::new(1), None, &input("Calle 1"), true)
            .await
            .unwrap();
        book.save(UserId::new(2), None, &input("Calle 2"), true)
            .await
            .unwrap();

        assert_eq!(defaults(&book.list(UserId::new(1)).await.unwrap()).len(), 1);
        assert_eq!(defaults(&book.list(UserId::new(2)).await.unwrap()).len(), 1);
    }

    #[tokio::test]
    async fn test_invalid_input_saves_nothing() {
        let store = MemoryStore::new();
        let book = AddressBook::new(&store);
        let mut bad = input("Calle 1");
        bad.region = Some("Patagonia Norte".to_owned());

        let err = book.save(UserId::new(1), None, &bad, true).await.unwrap_err();

        assert!(matches!(err, AddressError::Validation(ref v) if v.field == "region"));
        assert!(book.list(UserId::new(1)).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_foreign_address_is_not_found() {
        let store = MemoryStore::new();
        let book = AddressBook::new(&store);
        let a = book
            .save(UserId::new(1), None, &input("Calle 1"), false)
            .await
            .unwrap();

        let stranger = UserId::new(2);
        assert!(matches!(
            book.save(stranger, Some(a.id), &input("Robada"), false).await,
            Err(AddressError::NotFound)
        ));
        assert!(matches!(
            book.delete(stranger, a.id).await,
            Err(AddressError::NotFound)
        ));
        assert!(matches!(
            book.set_default(stranger, a.id).await,
            Err(AddressError::NotFound)
        ));
    }
}
