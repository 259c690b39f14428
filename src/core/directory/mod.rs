// src/core/directory/mod.rs

//! The user directory: the authoritative set of user records and the only
//! place they are mutated.
//!
//! Every mutation follows the same shape. The acting user is authorized
//! first, input is validated and any Argon2 work is done off the async
//! runtime, then the directory write lock is taken, invariants are checked
//! against the current state, the complete next snapshot is persisted, and
//! only then is it published in memory. A rejected or failed operation
//! therefore leaves both the store and the in-memory state untouched.

pub mod store;
pub mod user;
pub mod validate;

pub use store::{JsonFileStore, MemoryStore, UserStore, UsersFile};
pub use user::{CreatedUser, NewUser, User, UserId, UserRecord, UserUpdate};

use crate::core::AccessError;
use crate::core::acl::{Actor, Operation, Role, authorize};
use crate::core::credential::{CredentialPolicy, TemporarySecret};
use crate::core::visibility::TagFilter;
use chrono::Utc;
use indexmap::IndexMap;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use tokio::sync::{OwnedRwLockWriteGuard, RwLock};
use tracing::{info, warn};

/// Records keyed by id, in creation order.
type Records = IndexMap<UserId, UserRecord>;

#[derive(Debug)]
pub struct UserDirectory {
    records: Arc<RwLock<Records>>,
    store: Arc<dyn UserStore>,
    policy: Arc<CredentialPolicy>,
}

impl UserDirectory {
    /// Opens a directory over `store`, loading the persisted records.
    pub async fn open(
        store: Arc<dyn UserStore>,
        policy: CredentialPolicy,
    ) -> Result<Self, AccessError> {
        let mut loaded = store.load().await?;
        // Stable sort, so records sharing a timestamp keep their stored order.
        loaded.sort_by_key(|record| record.created_at);

        let mut usernames = HashSet::with_capacity(loaded.len());
        for record in &loaded {
            if !usernames.insert(record.username.as_str()) {
                return Err(AccessError::Storage(format!(
                    "stored users contain duplicate username '{}'",
                    record.username
                )));
            }
        }

        let mut records = Records::with_capacity(loaded.len());
        for record in loaded {
            if records.insert(record.id, record).is_some() {
                return Err(AccessError::Storage(
                    "stored users contain a duplicate id".to_string(),
                ));
            }
        }

        if !records.is_empty() && admin_count(&records) == 0 {
            warn!("The user directory has no admin. Run the admin bootstrap to restore access.");
        }
        info!("User directory opened with {} users", records.len());

        Ok(Self {
            records: Arc::new(RwLock::new(records)),
            store,
            policy: Arc::new(policy),
        })
    }

    /// An empty directory backed by a `MemoryStore`.
    pub fn in_memory(policy: CredentialPolicy) -> Self {
        Self {
            records: Arc::new(RwLock::new(Records::new())),
            store: Arc::new(MemoryStore::new()),
            policy: Arc::new(policy),
        }
    }

    pub fn policy(&self) -> &CredentialPolicy {
        &self.policy
    }

    /// Creates a user. Without a supplied secret, the generated temporary
    /// secret is returned in the result and is never retrievable again.
    pub async fn create(&self, actor: &Actor, new_user: NewUser) -> Result<CreatedUser, AccessError> {
        authorize(actor, Operation::ManageUsers)?;

        let NewUser {
            username,
            role,
            display_name,
            secret,
            visible_tags,
            hidden_tags,
        } = new_user;

        validate::username(&username)?;
        let role = Role::parse(&role)?;
        let display_name = validate::display_name(display_name.as_deref())?;
        if let Some(secret) = &secret {
            self.policy.validate(secret)?;
        }
        let visible_tags = validate::tags(visible_tags);
        let hidden_tags = validate::tags(hidden_tags);

        // Cheap early rejection before paying for a hash. The check is repeated
        // under the write lock, which is the one that counts.
        if self.find_by_username(&username).await.is_some() {
            return Err(AccessError::DuplicateUsername(username));
        }

        let issued = self
            .with_policy(move |policy| policy.issue_initial(secret.as_deref()))
            .await?;

        let records = self.lock().await;
        if records.values().any(|r| r.username == username) {
            return Err(AccessError::DuplicateUsername(username));
        }

        let now = Utc::now();
        let record = UserRecord {
            id: UserId::new(),
            username,
            display_name,
            role,
            credential_hash: issued.hash,
            must_change_credential: issued.must_change,
            is_first_login: true,
            visible_tags,
            hidden_tags,
            created_at: now,
            updated_at: now,
            last_login_at: None,
        };

        let mut next = records.clone();
        next.insert(record.id, record.clone());
        self.commit(records, next).await?;

        info!(
            "User '{}' created with role '{}' by '{}'",
            record.username, record.role, actor.username
        );

        Ok(CreatedUser {
            user: record.to_user(),
            temporary_secret: issued.plaintext,
        })
    }

    pub async fn get(&self, actor: &Actor, id: UserId) -> Result<User, AccessError> {
        authorize(actor, Operation::ManageUsers)?;
        let records = self.records.read().await;
        records
            .get(&id)
            .map(UserRecord::to_user)
            .ok_or_else(|| not_found(id))
    }

    /// Updates the mutable fields of a user. Demoting the last admin is
    /// rejected; a user may change their own role as long as another admin
    /// remains. An admin may force a password change but never waive one.
    pub async fn update(
        &self,
        actor: &Actor,
        id: UserId,
        update: UserUpdate,
    ) -> Result<User, AccessError> {
        authorize(actor, Operation::ManageUsers)?;

        let role = update.role.as_deref().map(Role::parse).transpose()?;
        let display_name = update
            .display_name
            .as_deref()
            .map(|name| validate::display_name(Some(name)))
            .transpose()?;
        if update.must_change_credential == Some(false) {
            return Err(AccessError::InvalidCredential(
                "the password change requirement is only cleared by the user changing their password"
                    .to_string(),
            ));
        }
        let visible_tags = update.visible_tags.map(validate::tags);
        let hidden_tags = update.hidden_tags.map(validate::tags);

        let records = self.lock().await;
        let current = records.get(&id).ok_or_else(|| not_found(id))?;

        if let Some(new_role) = role
            && current.role.is_admin()
            && !new_role.is_admin()
            && admin_count(&records) <= 1
        {
            warn!(
                "Refused to change role of last admin '{}' (requested by '{}')",
                current.username, actor.username
            );
            return Err(AccessError::LastAdminViolation(
                "cannot change role of the last admin user".to_string(),
            ));
        }

        let mut updated = current.clone();
        if let Some(display_name) = display_name {
            updated.display_name = display_name;
        }
        if let Some(role) = role {
            updated.role = role;
        }
        if update.must_change_credential == Some(true) {
            updated.must_change_credential = true;
        }
        if let Some(tags) = visible_tags {
            updated.visible_tags = tags;
        }
        if let Some(tags) = hidden_tags {
            updated.hidden_tags = tags;
        }
        updated.updated_at = Utc::now();

        let mut next = records.clone();
        next.insert(id, updated.clone());
        self.commit(records, next).await?;

        info!("User '{}' updated by '{}'", updated.username, actor.username);
        Ok(updated.to_user())
    }

    /// Deletes a user. Deleting one's own account is always refused, as is
    /// deleting the last admin.
    pub async fn delete(&self, actor: &Actor, id: UserId) -> Result<(), AccessError> {
        if id == actor.id {
            return Err(AccessError::SelfDeleteForbidden);
        }
        authorize(actor, Operation::ManageUsers)?;

        let records = self.lock().await;
        let target = records.get(&id).ok_or_else(|| not_found(id))?;

        if target.role.is_admin() && admin_count(&records) <= 1 {
            warn!(
                "Refused to delete last admin '{}' (requested by '{}')",
                target.username, actor.username
            );
            return Err(AccessError::LastAdminViolation(
                "cannot delete the last admin user".to_string(),
            ));
        }
        let username = target.username.clone();

        let mut next = records.clone();
        next.shift_remove(&id);
        self.commit(records, next).await?;

        info!("User '{}' deleted by '{}'", username, actor.username);
        Ok(())
    }

    /// Replaces a user's credential with a generated one and forces rotation.
    /// The returned secret is the caller's only chance to read it.
    pub async fn reset_credential(
        &self,
        actor: &Actor,
        id: UserId,
    ) -> Result<TemporarySecret, AccessError> {
        authorize(actor, Operation::ManageUsers)?;

        if !self.records.read().await.contains_key(&id) {
            return Err(not_found(id));
        }
        let reset = self.with_policy(|policy| policy.reset()).await?;

        let records = self.lock().await;
        let mut updated = records.get(&id).cloned().ok_or_else(|| not_found(id))?;
        updated.credential_hash = reset.hash;
        updated.must_change_credential = true;
        updated.updated_at = Utc::now();

        let mut next = records.clone();
        next.insert(id, updated.clone());
        self.commit(records, next).await?;

        info!(
            "Password reset for user '{}' by '{}'",
            updated.username, actor.username
        );
        Ok(reset.plaintext)
    }

    /// All users in creation order, without credential hashes.
    pub async fn list(&self, actor: &Actor) -> Result<Vec<User>, AccessError> {
        authorize(actor, Operation::ManageUsers)?;
        let records = self.records.read().await;
        Ok(records.values().map(UserRecord::to_user).collect())
    }

    /// Self-service credential change. Requires the current secret and clears
    /// the mandatory-rotation flag on success.
    pub async fn change_credential(
        &self,
        actor: &Actor,
        current_secret: &str,
        new_secret: &str,
    ) -> Result<User, AccessError> {
        self.policy.validate(new_secret)?;
        if current_secret == new_secret {
            return Err(AccessError::InvalidCredential(
                "new password must differ from the current one".to_string(),
            ));
        }

        let seen_hash = self
            .records
            .read()
            .await
            .get(&actor.id)
            .map(|r| r.credential_hash.clone())
            .ok_or_else(|| not_found(actor.id))?;

        let current_secret = current_secret.to_string();
        let new_secret = new_secret.to_string();
        let verify_hash = seen_hash.clone();
        let new_hash = self
            .with_policy(move |policy| {
                if !policy.verify(&current_secret, &verify_hash) {
                    return Err(AccessError::InvalidCredential(
                        "current password is incorrect".to_string(),
                    ));
                }
                policy.rotate(&new_secret)
            })
            .await?;

        let records = self.lock().await;
        let mut updated = records
            .get(&actor.id)
            .cloned()
            .ok_or_else(|| not_found(actor.id))?;
        if updated.credential_hash != seen_hash {
            return Err(AccessError::InvalidCredential(
                "password was changed concurrently, please retry".to_string(),
            ));
        }
        updated.credential_hash = new_hash;
        updated.must_change_credential = false;
        updated.updated_at = Utc::now();

        let mut next = records.clone();
        next.insert(actor.id, updated.clone());
        self.commit(records, next).await?;

        info!("User '{}' changed their password", updated.username);
        Ok(updated.to_user())
    }

    /// Checks a username/secret pair. On success the login is recorded and the
    /// user returned; unknown users and wrong secrets both yield `None`.
    pub async fn authenticate(
        &self,
        username: &str,
        secret: &str,
    ) -> Result<Option<User>, AccessError> {
        let Some((id, hash)) = self.find_by_username(username).await else {
            return Ok(None);
        };

        let secret = secret.to_string();
        let verified = self
            .with_policy(move |policy| Ok(policy.verify(&secret, &hash)))
            .await?;
        if !verified {
            return Ok(None);
        }
        self.record_login(id).await.map(Some)
    }

    /// Stamps `last_login_at` and clears the first-login flag.
    pub async fn record_login(&self, id: UserId) -> Result<User, AccessError> {
        let records = self.lock().await;
        let mut updated = records.get(&id).cloned().ok_or_else(|| not_found(id))?;
        updated.last_login_at = Some(Utc::now());
        updated.is_first_login = false;

        let mut next = records.clone();
        next.insert(id, updated.clone());
        self.commit(records, next).await?;
        Ok(updated.to_user())
    }

    /// Creates an admin named `username` with a generated secret when the
    /// directory has no admin at all. Returns `None` if an admin exists.
    pub async fn bootstrap_admin(&self, username: &str) -> Result<Option<CreatedUser>, AccessError> {
        validate::username(username)?;
        if admin_count(&*self.records.read().await) > 0 {
            return Ok(None);
        }

        let issued = self.with_policy(|policy| policy.issue_initial(None)).await?;

        let records = self.lock().await;
        if admin_count(&records) > 0 {
            return Ok(None);
        }
        if records.values().any(|r| r.username == username) {
            return Err(AccessError::DuplicateUsername(username.to_string()));
        }

        let now = Utc::now();
        let record = UserRecord {
            id: UserId::new(),
            username: username.to_string(),
            display_name: None,
            role: Role::Admin,
            credential_hash: issued.hash,
            must_change_credential: true,
            is_first_login: true,
            visible_tags: Default::default(),
            hidden_tags: Default::default(),
            created_at: now,
            updated_at: now,
            last_login_at: None,
        };

        let mut next = records.clone();
        next.insert(record.id, record.clone());
        self.commit(records, next).await?;

        warn!("Bootstrapped admin user '{}'", record.username);
        Ok(Some(CreatedUser {
            user: record.to_user(),
            temporary_secret: issued.plaintext,
        }))
    }

    /// The visibility filter for a user, for the resource inventory.
    pub async fn tag_filter(&self, id: UserId) -> Result<TagFilter, AccessError> {
        let records = self.records.read().await;
        records
            .get(&id)
            .map(|r| TagFilter::new(r.visible_tags.clone(), r.hidden_tags.clone()))
            .ok_or_else(|| not_found(id))
    }

    /// Number of users per role. Exposes no user data.
    pub async fn role_counts(&self) -> BTreeMap<Role, usize> {
        let records = self.records.read().await;
        let mut counts = BTreeMap::new();
        for record in records.values() {
            *counts.entry(record.role).or_insert(0) += 1;
        }
        counts
    }

    async fn find_by_username(&self, username: &str) -> Option<(UserId, String)> {
        self.records
            .read()
            .await
            .values()
            .find(|r| r.username == username)
            .map(|r| (r.id, r.credential_hash.clone()))
    }

    /// Runs Argon2 work on the blocking pool.
    async fn with_policy<F, T>(&self, f: F) -> Result<T, AccessError>
    where
        F: FnOnce(&CredentialPolicy) -> Result<T, AccessError> + Send + 'static,
        T: Send + 'static,
    {
        let policy = Arc::clone(&self.policy);
        tokio::task::spawn_blocking(move || f(&policy)).await?
    }

    async fn lock(&self) -> OwnedRwLockWriteGuard<Records> {
        Arc::clone(&self.records).write_owned().await
    }

    /// Persists `next` and, only if that succeeds, publishes it. Both steps
    /// run in one task that owns the write guard, so they complete together
    /// even if the caller's future is dropped midway.
    async fn commit(
        &self,
        mut current: OwnedRwLockWriteGuard<Records>,
        next: Records,
    ) -> Result<(), AccessError> {
        let store = Arc::clone(&self.store);
        tokio::spawn(async move {
            store.save(next.values().cloned().collect()).await?;
            *current = next;
            Ok::<(), AccessError>(())
        })
        .await?
    }
}

fn admin_count(records: &Records) -> usize {
    records.values().filter(|r| r.role.is_admin()).count()
}

fn not_found(id: UserId) -> AccessError {
    AccessError::NotFound(format!("user {id} not found"))
}
