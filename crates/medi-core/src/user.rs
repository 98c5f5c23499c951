//! # Users and Roles
//!
//! Registration is idempotent by email. Role checks are advisory: nothing in
//! the HTTP layer enforces them.

use crate::error::MarketResult;
use crate::store::{
    from_document, to_document, BoxedStore, Collection, Document, Filter, InsertOutcome, Patch,
    UpdateOutcome,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, instrument};

/// Roles the marketplace checks for. A user without one is a plain buyer.
///
/// The stored `role` field is free text: anything other than these two
/// values simply grants neither.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Seller,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Seller => "seller",
        }
    }

    /// Whether a stored `role` value names this role
    pub fn matches(&self, value: Option<&Value>) -> bool {
        value.and_then(Value::as_str) == Some(self.as_str())
    }
}

impl From<Role> for Value {
    fn from(role: Role) -> Self {
        Value::String(role.as_str().to_string())
    }
}

/// A registered user. Profile fields other than email and role are kept as-is.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(default)]
    pub email: String,

    /// As stored; see [`Role`]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<Value>,

    #[serde(flatten)]
    pub profile: Document,
}

impl User {
    pub fn new(email: impl Into<String>) -> Self {
        Self {
            id: None,
            email: email.into(),
            role: None,
            profile: Document::new(),
        }
    }

    /// Builder: set role
    pub fn with_role(mut self, role: Role) -> Self {
        self.role = Some(role.into());
        self
    }

    pub fn has_role(&self, role: Role) -> bool {
        role.matches(self.role.as_ref())
    }
}

/// Result of a registration attempt
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Registration {
    Created(InsertOutcome),
    AlreadyExists {
        message: &'static str,
        #[serde(rename = "insertedId")]
        inserted_id: Option<String>,
    },
}

impl Registration {
    fn already_exists() -> Self {
        Registration::AlreadyExists {
            message: "user already exists",
            inserted_id: None,
        }
    }

    pub fn is_created(&self) -> bool {
        matches!(self, Registration::Created(_))
    }
}

/// User/role service over the `users` collection
#[derive(Clone)]
pub struct UserService {
    store: BoxedStore,
}

impl UserService {
    pub fn new(store: BoxedStore) -> Self {
        Self { store }
    }

    /// Insert the user unless one with the same email exists.
    ///
    /// The existence check and the insert are separate round trips.
    #[instrument(skip(self, user), fields(email = %user.email))]
    pub async fn register_user(&self, user: User) -> MarketResult<Registration> {
        let existing = self
            .store
            .find_one(Collection::Users, &Filter::eq("email", user.email.as_str()))
            .await?;
        if existing.is_some() {
            return Ok(Registration::already_exists());
        }

        let outcome = self
            .store
            .insert_one(Collection::Users, to_document(&user)?)
            .await?;
        info!("Registered user: {}", user.email);
        Ok(Registration::Created(outcome))
    }

    pub async fn list_all_users(&self) -> MarketResult<Vec<User>> {
        self.find(&Filter::all()).await
    }

    /// Users with this email (a list, normally of at most one)
    pub async fn find_users_by_email(&self, email: Option<&str>) -> MarketResult<Vec<User>> {
        self.find(&Filter::eq("email", email)).await
    }

    /// Set the user's role to whatever value is given. Without a role the
    /// update is still issued, with an empty patch, and modifies nothing.
    #[instrument(skip(self))]
    pub async fn set_role(&self, email: &str, role: Option<Value>) -> MarketResult<UpdateOutcome> {
        let patch = match role {
            Some(role) => Patch::new().set("role", role),
            None => Patch::new(),
        };
        self.store
            .update_one(Collection::Users, &Filter::eq("email", email), &patch)
            .await
    }

    /// `false` for unknown emails as well as for other roles
    pub async fn is_admin(&self, email: &str) -> MarketResult<bool> {
        self.has_role(email, Role::Admin).await
    }

    /// `false` for unknown emails as well as for other roles
    pub async fn is_seller(&self, email: &str) -> MarketResult<bool> {
        self.has_role(email, Role::Seller).await
    }

    /// Checked on the raw document so an unusual profile cannot turn a
    /// `false` into an error
    async fn has_role(&self, email: &str, role: Role) -> MarketResult<bool> {
        let user = self
            .store
            .find_one(Collection::Users, &Filter::eq("email", email))
            .await?;
        Ok(user.is_some_and(|doc| role.matches(doc.get("role"))))
    }

    async fn find(&self, filter: &Filter) -> MarketResult<Vec<User>> {
        self.store
            .find(Collection::Users, filter)
            .await?
            .into_iter()
            .map(from_document::<User>)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;
    use crate::store::DocumentStore;
    use serde_json::json;
    use std::sync::Arc;

    fn service() -> (Arc<MemoryStore>, UserService) {
        let store = Arc::new(MemoryStore::new());
        (store.clone(), UserService::new(store))
    }

    #[tokio::test]
    async fn test_register_same_email_twice() {
        let (store, users) = service();

        let first = users.register_user(User::new("rahim@example.com")).await.unwrap();
        assert!(first.is_created());

        let second = users.register_user(User::new("rahim@example.com")).await.unwrap();
        assert_eq!(
            serde_json::to_value(&second).unwrap(),
            serde_json::json!({ "message": "user already exists", "insertedId": null })
        );
        assert_eq!(store.count(Collection::Users), 1);
    }

    #[tokio::test]
    async fn test_profile_fields_survive_round_trip() {
        let (_, users) = service();
        let mut user = User::new("karim@example.com");
        user.profile
            .insert("name".to_string(), serde_json::json!("Karim"));
        users.register_user(user).await.unwrap();

        let found = users
            .find_users_by_email(Some("karim@example.com"))
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].profile["name"], "Karim");
        assert!(found[0].id.is_some());
    }

    #[tokio::test]
    async fn test_set_role_without_role_is_a_no_op() {
        let (_, users) = service();
        users.register_user(User::new("a@example.com")).await.unwrap();

        let outcome = users.set_role("a@example.com", None).await.unwrap();
        assert_eq!(outcome, UpdateOutcome::new(1, 0));

        let outcome = users
            .set_role("a@example.com", Some(Role::Seller.into()))
            .await
            .unwrap();
        assert_eq!(outcome, UpdateOutcome::new(1, 1));
        assert!(users.is_seller("a@example.com").await.unwrap());
    }

    #[tokio::test]
    async fn test_role_checks_conflate_missing_and_mismatch() {
        let (_, users) = service();
        users
            .register_user(User::new("seller@example.com").with_role(Role::Seller))
            .await
            .unwrap();
        users
            .register_user(User::new("admin@example.com").with_role(Role::Admin))
            .await
            .unwrap();

        assert!(users.is_admin("admin@example.com").await.unwrap());
        assert!(!users.is_admin("seller@example.com").await.unwrap());
        assert!(!users.is_admin("ghost@example.com").await.unwrap());
        assert!(!users.is_seller("admin@example.com").await.unwrap());
        assert!(!users.is_seller("ghost@example.com").await.unwrap());
    }

    #[tokio::test]
    async fn test_list_all_users() {
        let (_, users) = service();
        for email in ["a@example.com", "b@example.com"] {
            users.register_user(User::new(email)).await.unwrap();
        }
        assert_eq!(users.list_all_users().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_free_text_role_grants_nothing() {
        let (store, users) = service();
        store
            .insert_one(
                Collection::Users,
                json!({ "email": "n@example.com", "role": "none" })
                    .as_object()
                    .cloned()
                    .unwrap(),
            )
            .await
            .unwrap();
        store
            .insert_one(
                Collection::Users,
                json!({ "email": "odd@example.com", "role": 7 })
                    .as_object()
                    .cloned()
                    .unwrap(),
            )
            .await
            .unwrap();

        assert!(!users.is_admin("n@example.com").await.unwrap());
        assert!(!users.is_seller("n@example.com").await.unwrap());
        assert!(!users.is_admin("odd@example.com").await.unwrap());

        let all = users.list_all_users().await.unwrap();
        assert_eq!(all.len(), 2);
        let found = users.find_users_by_email(Some("n@example.com")).await.unwrap();
        assert_eq!(found[0].role, Some(json!("none")));
    }

    #[tokio::test]
    async fn test_set_role_writes_any_value() {
        let (_, users) = service();
        users
            .register_user(User::new("a@example.com").with_role(Role::Seller))
            .await
            .unwrap();

        let outcome = users
            .set_role("a@example.com", Some(json!("none")))
            .await
            .unwrap();
        assert_eq!(outcome, UpdateOutcome::new(1, 1));
        assert!(!users.is_seller("a@example.com").await.unwrap());

        let found = users.find_users_by_email(Some("a@example.com")).await.unwrap();
        assert_eq!(found[0].role, Some(json!("none")));
    }
}
