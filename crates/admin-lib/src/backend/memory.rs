// ============================
// crates/admin-lib/src/backend/memory.rs
// ============================
//! In-process backend: accounts, profiles, the catalog tables and an object
//! store, all in memory. Backs offline mode and the test suites, with knobs
//! for latency, failures and call counting.
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::Mutex;
use tracing::debug;
use uuid::Uuid;

use crate::auth::provider::{AuthFeed, IdentityProvider, Subscription};
use crate::error::AppError;
use crate::storage::{CatalogStore, ObjectStore, ProfileStore};
use santorini_common::{
    AuthEvent, Category, CategoryId, Identity, Locale, Profile, ProductDetail, ProductId,
    ProductRow, ProductSummary, ProductTranslation, Role, Session, UserId, UNCATEGORIZED,
};

/// Base of the public URLs handed out for stored objects
pub const PUBLIC_OBJECT_BASE: &str = "http://localhost/storage/v1/object/public";

const SESSION_TTL_SECS: i64 = 60 * 60;

#[derive(Debug, Clone)]
struct Account {
    id: UserId,
    email: String,
    password: String,
}

#[derive(Debug, Clone)]
struct CategoryRecord {
    id: CategoryId,
    slug: String,
    image_url: Option<String>,
    names: HashMap<Locale, String>,
    created_at: DateTime<Utc>,
    seq: u64,
}

#[derive(Debug, Clone)]
struct ProductRecord {
    id: ProductId,
    row: ProductRow,
    created_at: DateTime<Utc>,
    seq: u64,
}

#[derive(Debug, Clone)]
struct StoredObject {
    content_type: String,
    size: usize,
}

/// In-memory implementation of every backend trait
#[derive(Debug, Default)]
pub struct MemoryBackend {
    feed: AuthFeed,
    accounts: Mutex<HashMap<String, Account>>,
    profiles: Mutex<HashMap<UserId, Profile>>,
    session: Mutex<Option<Session>>,
    categories: Mutex<Vec<CategoryRecord>>,
    products: Mutex<Vec<ProductRecord>>,
    translations: Mutex<HashMap<(ProductId, Locale), ProductTranslation>>,
    objects: DashMap<String, StoredObject>,
    profile_delays: Mutex<HashMap<UserId, Duration>>,
    seq: AtomicU64,

    fail_current_session: AtomicBool,
    fail_profiles: AtomicBool,
    fail_uploads: AtomicBool,
    fail_translations: AtomicBool,

    current_session_calls: AtomicUsize,
    sign_in_calls: AtomicUsize,
    sign_out_calls: AtomicUsize,
    profile_calls: AtomicUsize,
}

fn unavailable(what: &str) -> AppError {
    AppError::Backend {
        status: 503,
        code: None,
        message: format!("{what} unavailable"),
    }
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_seq(&self) -> u64 {
        self.seq.fetch_add(1, Ordering::SeqCst)
    }

    // ----- accounts and sessions -----

    /// Register an account. `role = None` leaves the user without a profile.
    pub fn add_user(&self, email: &str, password: &str, role: Option<Role>) -> UserId {
        let id = Uuid::new_v4();
        let email = email.trim().to_lowercase();
        self.accounts.lock().insert(
            email.clone(),
            Account { id, email, password: password.to_string() },
        );
        if let Some(role) = role {
            self.profiles.lock().insert(
                id,
                Profile { id, role, full_name: String::new(), avatar_url: None, email: None },
            );
        }
        id
    }

    /// Insert or replace a profile row
    pub fn set_profile(&self, profile: Profile) {
        self.profiles.lock().insert(profile.id, profile);
    }

    pub fn remove_profile(&self, user: UserId) {
        self.profiles.lock().remove(&user);
    }

    fn account(&self, user: UserId) -> Option<Account> {
        self.accounts.lock().values().find(|a| a.id == user).cloned()
    }

    fn issue_session(&self, account: &Account) -> Session {
        Session {
            access_token: format!("access-{}", Uuid::new_v4().simple()),
            refresh_token: format!("refresh-{}", Uuid::new_v4().simple()),
            token_type: "bearer".to_string(),
            expires_at: Utc::now() + chrono::Duration::seconds(SESSION_TTL_SECS),
            user: Identity { id: account.id, email: Some(account.email.clone()) },
        }
    }

    /// Store a session for `user` as if it survived a restart. No event is
    /// published.
    pub fn persist_session_for(&self, user: UserId) -> Option<Session> {
        let account = self.account(user)?;
        let session = self.issue_session(&account);
        *self.session.lock() = Some(session.clone());
        Some(session)
    }

    /// Publish an event on the feed and mirror it in the stored session
    pub fn emit(&self, event: AuthEvent) {
        {
            let mut current = self.session.lock();
            match &event {
                AuthEvent::SignedOut => *current = None,
                AuthEvent::SignedIn(s) | AuthEvent::TokenRefreshed(s) => *current = Some(s.clone()),
            }
        }
        self.feed.emit(event);
    }

    /// Rotate the tokens of the stored session and publish `TokenRefreshed`
    pub fn refresh_session(&self) -> Option<Session> {
        let previous = self.session.lock().clone()?;
        let account = self.account(previous.user_id())?;
        let session = self.issue_session(&account);
        self.emit(AuthEvent::TokenRefreshed(session.clone()));
        Some(session)
    }

    pub fn stored_session(&self) -> Option<Session> {
        self.session.lock().clone()
    }

    // ----- failure and latency knobs -----

    pub fn fail_current_session(&self, fail: bool) {
        self.fail_current_session.store(fail, Ordering::SeqCst);
    }

    pub fn fail_profiles(&self, fail: bool) {
        self.fail_profiles.store(fail, Ordering::SeqCst);
    }

    pub fn fail_uploads(&self, fail: bool) {
        self.fail_uploads.store(fail, Ordering::SeqCst);
    }

    pub fn fail_translations(&self, fail: bool) {
        self.fail_translations.store(fail, Ordering::SeqCst);
    }

    /// Delay every profile lookup for `user`
    pub fn set_profile_delay(&self, user: UserId, delay: Duration) {
        self.profile_delays.lock().insert(user, delay);
    }

    // ----- call counters -----

    pub fn current_session_calls(&self) -> usize {
        self.current_session_calls.load(Ordering::SeqCst)
    }

    pub fn sign_in_calls(&self) -> usize {
        self.sign_in_calls.load(Ordering::SeqCst)
    }

    pub fn sign_out_calls(&self) -> usize {
        self.sign_out_calls.load(Ordering::SeqCst)
    }

    pub fn profile_calls(&self) -> usize {
        self.profile_calls.load(Ordering::SeqCst)
    }

    // ----- catalog -----

    /// Add a category named in both locales
    pub fn add_category(&self, slug: &str, vi_name: &str, en_name: &str) -> CategoryId {
        let id = Uuid::new_v4();
        let names = HashMap::from([
            (Locale::Vi, vi_name.to_string()),
            (Locale::En, en_name.to_string()),
        ]);
        self.categories.lock().push(CategoryRecord {
            id,
            slug: slug.to_string(),
            image_url: None,
            names,
            created_at: Utc::now(),
            seq: self.next_seq(),
        });
        id
    }

    pub fn object_count(&self) -> usize {
        self.objects.len()
    }

    /// Content type and size of a stored object
    pub fn object(&self, bucket: &str, path: &str) -> Option<(String, usize)> {
        self.objects
            .get(&format!("{bucket}/{path}"))
            .map(|o| (o.content_type.clone(), o.size))
    }

    /// Demo data for offline mode: one owner, one customer, a small menu
    pub fn seed_demo(&self) {
        let owner = self.add_user("owner@santorini.vn", "santorini", Some(Role::Owner));
        self.set_profile(Profile {
            id: owner,
            role: Role::Owner,
            full_name: "Santorini Owner".to_string(),
            avatar_url: None,
            email: None,
        });
        self.add_user("customer@santorini.vn", "santorini", Some(Role::Customer));
        self.seed_menu();
    }

    /// Two categories and three products, no accounts
    pub fn seed_menu(&self) {
        let fruit = self.add_category("fruit-tea", "Trà trái cây", "Fruit tea");
        let milk = self.add_category("milk-tea", "Trà sữa", "Milk tea");

        let menu = [
            (fruit, "tra-dao-cam-sa", "Trà đào cam sả", "Peach lemongrass tea", 45000.0),
            (fruit, "tra-vai", "Trà vải", "Lychee tea", 42000.0),
            (milk, "tra-sua-truyen-thong", "Trà sữa truyền thống", "Classic milk tea", 35000.0),
        ];
        for (category_id, slug, vi, en, price) in menu {
            let id = self.insert_record(ProductRow {
                base_price: price,
                image_url: None,
                category_id,
                is_active: true,
                slug: slug.to_string(),
            });
            let mut rows = self.translations.lock();
            for (locale, name) in [(Locale::Vi, vi), (Locale::En, en)] {
                rows.insert(
                    (id, locale),
                    ProductTranslation { product_id: id, locale, name: name.to_string(), description: None },
                );
            }
        }
        debug!("memory backend seeded with demo data");
    }

    fn insert_record(&self, row: ProductRow) -> ProductId {
        let id = Uuid::new_v4();
        self.products.lock().push(ProductRecord {
            id,
            row,
            created_at: Utc::now(),
            seq: self.next_seq(),
        });
        id
    }

    fn category_name(&self, id: Option<CategoryId>, locale: Locale) -> Option<String> {
        let id = id?;
        self.categories
            .lock()
            .iter()
            .find(|c| c.id == id)
            .and_then(|c| c.names.get(&locale).cloned())
    }
}

#[async_trait]
impl IdentityProvider for MemoryBackend {
    async fn current_session(&self) -> Result<Option<Session>, AppError> {
        self.current_session_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_current_session.load(Ordering::SeqCst) {
            return Err(unavailable("session cache"));
        }
        let session = self.session.lock().clone();
        Ok(session.filter(|s| !s.is_expired_at(Utc::now())))
    }

    async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<Session, AppError> {
        self.sign_in_calls.fetch_add(1, Ordering::SeqCst);
        let account = self.accounts.lock().get(&email.trim().to_lowercase()).cloned();
        let account = match account {
            Some(a) if a.password == password => a,
            _ => return Err(AppError::Auth("Invalid login credentials".to_string())),
        };
        let session = self.issue_session(&account);
        self.emit(AuthEvent::SignedIn(session.clone()));
        Ok(session)
    }

    async fn sign_out(&self) -> Result<(), AppError> {
        self.sign_out_calls.fetch_add(1, Ordering::SeqCst);
        self.emit(AuthEvent::SignedOut);
        Ok(())
    }

    fn subscribe(&self) -> Subscription {
        self.feed.subscribe()
    }
}

#[async_trait]
impl ProfileStore for MemoryBackend {
    async fn get_by_user_id(&self, id: UserId) -> Result<Option<Profile>, AppError> {
        self.profile_calls.fetch_add(1, Ordering::SeqCst);
        let delay = self.profile_delays.lock().get(&id).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_profiles.load(Ordering::SeqCst) {
            return Err(unavailable("profiles"));
        }
        Ok(self.profiles.lock().get(&id).cloned())
    }
}

#[async_trait]
impl CatalogStore for MemoryBackend {
    async fn list_categories(&self, locale: Locale) -> Result<Vec<Category>, AppError> {
        let mut records = self.categories.lock().clone();
        records.sort_by(|a, b| (b.created_at, b.seq).cmp(&(a.created_at, a.seq)));
        Ok(records
            .into_iter()
            .map(|c| Category {
                name: c.names.get(&locale).cloned(),
                id: c.id,
                slug: c.slug,
                image_url: c.image_url,
                created_at: c.created_at,
            })
            .collect())
    }

    async fn list_products(&self, locale: Locale) -> Result<Vec<ProductSummary>, AppError> {
        let mut records = self.products.lock().clone();
        records.sort_by(|a, b| (b.created_at, b.seq).cmp(&(a.created_at, a.seq)));

        let summaries = records
            .into_iter()
            .map(|p| {
                let translation = self.translations.lock().get(&(p.id, locale)).cloned();
                let category = self
                    .category_name(Some(p.row.category_id), locale)
                    .unwrap_or_else(|| UNCATEGORIZED.to_string());
                ProductSummary {
                    id: p.id,
                    slug: p.row.slug,
                    name: translation.as_ref().map(|t| t.name.clone()),
                    description: translation.and_then(|t| t.description),
                    category_id: Some(p.row.category_id),
                    category,
                    base_price: p.row.base_price,
                    image_url: p.row.image_url,
                    is_active: p.row.is_active,
                    created_at: p.created_at,
                }
            })
            .collect();
        Ok(summaries)
    }

    async fn get_product(&self, id: ProductId) -> Result<Option<ProductDetail>, AppError> {
        let Some(record) = self.products.lock().iter().find(|p| p.id == id).cloned() else {
            return Ok(None);
        };
        let translations = {
            let rows = self.translations.lock();
            Locale::ALL
                .iter()
                .filter_map(|locale| rows.get(&(id, *locale)).cloned())
                .collect()
        };
        Ok(Some(ProductDetail {
            id,
            slug: record.row.slug,
            category_id: Some(record.row.category_id),
            base_price: record.row.base_price,
            image_url: record.row.image_url,
            is_active: record.row.is_active,
            translations,
        }))
    }

    async fn insert_product(&self, row: &ProductRow) -> Result<ProductId, AppError> {
        if self.products.lock().iter().any(|p| p.row.slug == row.slug) {
            return Err(AppError::Backend {
                status: 409,
                code: Some("23505".to_string()),
                message: format!("duplicate slug {}", row.slug),
            });
        }
        Ok(self.insert_record(row.clone()))
    }

    async fn update_product(&self, id: ProductId, row: &ProductRow) -> Result<(), AppError> {
        let mut products = self.products.lock();
        let record = products
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or_else(|| AppError::NotFound(format!("product {id}")))?;
        record.row = row.clone();
        Ok(())
    }

    async fn upsert_translations(&self, rows: &[ProductTranslation]) -> Result<(), AppError> {
        if self.fail_translations.load(Ordering::SeqCst) {
            return Err(unavailable("product_translations"));
        }
        let mut stored = self.translations.lock();
        for row in rows {
            stored.insert((row.product_id, row.locale), row.clone());
        }
        Ok(())
    }
}

#[async_trait]
impl ObjectStore for MemoryBackend {
    async fn upload(
        &self,
        bucket: &str,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<(), AppError> {
        if self.fail_uploads.load(Ordering::SeqCst) {
            return Err(unavailable("storage"));
        }
        let key = format!("{bucket}/{path}");
        if self.objects.contains_key(&key) {
            return Err(AppError::Backend {
                status: 409,
                code: Some("Duplicate".to_string()),
                message: "The resource already exists".to_string(),
            });
        }
        self.objects.insert(
            key,
            StoredObject { content_type: content_type.to_string(), size: bytes.len() },
        );
        Ok(())
    }

    fn public_url(&self, bucket: &str, path: &str) -> String {
        format!("{PUBLIC_OBJECT_BASE}/{bucket}/{path}")
    }
}
