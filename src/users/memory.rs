use std::collections::HashMap;

use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::repo::{StoreError, UniqueField, UserStore};
use super::repo_types::{NewUser, User};

/// In-process store with the same uniqueness and not-found rules as the Postgres one.
#[derive(Default)]
pub struct InMemoryUserStore {
    users: RwLock<HashMap<Uuid, User>>,
}

impl InMemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn conflict_with(users: &HashMap<Uuid, User>, candidate: &User) -> Option<UniqueField> {
    let taken = |same: fn(&User, &User) -> bool| {
        users
            .values()
            .any(|u| u.id != candidate.id && same(u, candidate))
    };
    if taken(|a, b| a.username == b.username) {
        Some(UniqueField::Username)
    } else if taken(|a, b| a.email == b.email) {
        Some(UniqueField::Email)
    } else {
        None
    }
}

#[async_trait]
impl UserStore for InMemoryUserStore {
    async fn create(&self, user: NewUser) -> Result<User, StoreError> {
        let now = OffsetDateTime::now_utc();
        let created = User {
            id: Uuid::new_v4(),
            username: user.username,
            email: user.email,
            password_hash: user.password_hash,
            role: user.role,
            created_at: now,
            updated_at: now,
        };
        let mut users = self.users.write().await;
        if let Some(field) = conflict_with(&users, &created) {
            return Err(StoreError::Conflict(field));
        }
        users.insert(created.id, created.clone());
        Ok(created)
    }

    async fn get_by_id(&self, id: Uuid) -> Result<User, StoreError> {
        self.users
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn get_by_username(&self, username: &str) -> Result<User, StoreError> {
        self.users
            .read()
            .await
            .values()
            .find(|u| u.username == username)
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn get_by_email(&self, email: &str) -> Result<User, StoreError> {
        self.users
            .read()
            .await
            .values()
            .find(|u| u.email == email)
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn update(&self, user: &User) -> Result<User, StoreError> {
        let mut users = self.users.write().await;
        if !users.contains_key(&user.id) {
            return Err(StoreError::NotFound);
        }
        if let Some(field) = conflict_with(&users, user) {
            return Err(StoreError::Conflict(field));
        }
        let stored = users.get_mut(&user.id).ok_or(StoreError::NotFound)?;
        stored.username = user.username.clone();
        stored.email = user.email.clone();
        stored.password_hash = user.password_hash.clone();
        stored.role = user.role.clone();
        stored.updated_at = OffsetDateTime::now_utc();
        Ok(stored.clone())
    }

    async fn delete(&self, id: Uuid) -> Result<(), StoreError> {
        self.users
            .write()
            .await
            .remove(&id)
            .map(|_| ())
            .ok_or(StoreError::NotFound)
    }

    async fn list_all(&self) -> Result<Vec<User>, StoreError> {
        let mut users: Vec<User> = self.users.read().await.values().cloned().collect();
        users.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(users)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_user(username: &str, email: &str) -> NewUser {
        NewUser {
            username: username.into(),
            email: email.into(),
            password_hash: "$argon2id$stub".into(),
            role: "user".into(),
        }
    }

    #[tokio::test]
    async fn create_rejects_duplicate_keys() {
        let store = InMemoryUserStore::new();
        store.create(new_user("alice", "alice@x.com")).await.unwrap();

        let err = store
            .create(new_user("alice", "other@x.com"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict(UniqueField::Username)));

        let err = store
            .create(new_user("other", "alice@x.com"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict(UniqueField::Email)));
    }

    #[tokio::test]
    async fn mutations_on_missing_rows_are_not_found() {
        let store = InMemoryUserStore::new();
        let ghost = store.create(new_user("ghost", "g@x.com")).await.unwrap();
        store.delete(ghost.id).await.unwrap();

        assert!(matches!(store.delete(ghost.id).await, Err(StoreError::NotFound)));
        assert!(matches!(store.update(&ghost).await, Err(StoreError::NotFound)));
        assert!(matches!(store.get_by_id(ghost.id).await, Err(StoreError::NotFound)));
    }

    #[tokio::test]
    async fn update_refreshes_updated_at_only() {
        let store = InMemoryUserStore::new();
        let mut user = store.create(new_user("carol", "c@x.com")).await.unwrap();
        user.username = "caroline".into();

        let updated = store.update(&user).await.unwrap();
        assert_eq!(updated.username, "caroline");
        assert_eq!(updated.created_at, user.created_at);
        assert!(updated.updated_at >= user.updated_at);
        let stored = store.get_by_username("caroline").await.unwrap();
        assert_eq!(stored.id, user.id);
        assert_eq!(stored.updated_at, updated.updated_at);
    }

    #[tokio::test]
    async fn username_conflict_wins_over_email_conflict() {
        let store = InMemoryUserStore::new();
        for i in 0..16 {
            store
                .create(new_user(&format!("user{i}"), &format!("user{i}@x.com")))
                .await
                .unwrap();
        }

        for i in 0..16 {
            let j = (i + 1) % 16;
            let err = store
                .create(new_user(&format!("user{i}"), &format!("user{j}@x.com")))
                .await
                .unwrap_err();
            assert!(matches!(err, StoreError::Conflict(UniqueField::Username)));
        }
    }
}
