//! The record store: per-table operations over a [`KeyValueStore`].
//!
//! Every table lives under its own key (see [`keys`]) as a single JSON
//! document. Operations are read, modify, write of that one document with
//! last-write-wins semantics; nothing here spans tables atomically.
//!
//! ```no_run
//! use quickhelp_store::record_store::RecordStore;
//! use quickhelp_store::records::NewBooking;
//! use quickhelp_store::storage::MemoryStorage;
//!
//! let store = RecordStore::with_defaults(MemoryStorage::new())?;
//! let booking = store.create_booking(NewBooking::new("Cleaning", 40))?;
//! store.add_review(&booking.id, 5.0, "great")?;
//! assert_eq!(store.compute_statistics()?.average_rating, 5.0);
//! # Ok::<(), quickhelp_store::app_response::AppResponse>(())
//! ```

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::app_response::AppResponse;
use crate::ids;
use crate::records::{
    strip_reserved, AuthFailure, AuthOutcome, Booking, BookingPatch, BookingStatus, Favorite,
    HistoryEntry, NewBooking, NewPromo, NewTransaction, Preferences, ProfileUpdate, PromoCode,
    Review, ServiceListing, Statistics, Transaction, User, UserProfile, Wallet, BOOKING_FIELDS,
    GUEST_EMAIL, GUEST_NAME,
};
use crate::storage::KeyValueStore;
use crate::store_config::StoreConfig;

/// Names of the persisted documents.
pub mod keys {
    pub const INITIALIZED: &str = "qhp_initialized";
    pub const USERS: &str = "test_users";
    pub const CURRENT_USER: &str = "current_user";
    pub const BOOKINGS: &str = "bookings";
    pub const HISTORY: &str = "services_history";
    pub const FAVORITES: &str = "favorites";
    pub const REVIEWS: &str = "reviews";
    pub const PREFERENCES: &str = "user_preferences";
    pub const WALLET: &str = "wallet";
    pub const PROMOS: &str = "promos";
    pub const USER_DATA: &str = "user_data";
}

const SIGNUP_AVATAR: &str = "👤";

pub struct RecordStore<S: KeyValueStore> {
    storage: S,
    history_limit: usize,
    seed_defaults: bool,
}

impl<S: KeyValueStore> RecordStore<S> {
    /// Wraps `storage` and runs [`init`](Self::init).
    pub fn open(storage: S, config: &StoreConfig) -> Result<Self, AppResponse> {
        config.validate()?;
        let store = Self {
            storage,
            history_limit: config.history_limit,
            seed_defaults: config.seed_defaults,
        };
        store.init()?;
        Ok(store)
    }

    pub fn with_defaults(storage: S) -> Result<Self, AppResponse> {
        Self::open(storage, &StoreConfig::default())
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn storage_mut(&mut self) -> &mut S {
        &mut self.storage
    }

    pub fn into_storage(self) -> S {
        self.storage
    }

    pub fn history_limit(&self) -> usize {
        self.history_limit
    }

    // ======== INITIALIZATION ========

    /// Seeds default tables the first time a medium is used.
    ///
    /// Returns `true` when defaults were written. Once the sentinel is set
    /// this only checks that every table still parses. Recovery from a
    /// malformed table wipes every table, including intact ones such as
    /// registered users and bookings, and then seeds again.
    pub fn init(&self) -> Result<bool, AppResponse> {
        if self.is_initialized()? {
            match self.verify_tables() {
                Ok(()) => return Ok(false),
                Err(AppResponse::SerializationError(msg)) => {
                    warn!("Persisted data is malformed, re-seeding defaults: {msg}");
                    self.storage.clear()?;
                }
                Err(e) => return Err(e),
            }
        }

        self.initialize_defaults()?;
        Ok(true)
    }

    pub fn is_initialized(&self) -> Result<bool, AppResponse> {
        Ok(self.storage.get(keys::INITIALIZED)?.as_deref() == Some("true"))
    }

    fn verify_tables(&self) -> Result<(), AppResponse> {
        self.get_all_users()?;
        self.get_current_user()?;
        self.get_bookings()?;
        self.get_service_history()?;
        self.get_favorites()?;
        self.get_reviews()?;
        self.get_preferences()?;
        self.get_wallet()?;
        self.get_promos()?;
        self.get_user()?;
        Ok(())
    }

    fn initialize_defaults(&self) -> Result<(), AppResponse> {
        let users = if self.seed_defaults {
            seed_users(ids::now())
        } else {
            Vec::new()
        };

        self.write(keys::USERS, &users)?;
        self.storage.set(keys::CURRENT_USER, "null")?;
        self.write(keys::BOOKINGS, &Vec::<Booking>::new())?;
        self.write(keys::HISTORY, &Vec::<HistoryEntry>::new())?;
        self.write(keys::FAVORITES, &Vec::<Favorite>::new())?;
        self.write(keys::REVIEWS, &Vec::<Review>::new())?;
        self.write(keys::PROMOS, &Vec::<PromoCode>::new())?;
        self.write(keys::WALLET, &Wallet::default())?;
        self.write(keys::PREFERENCES, &Preferences::default())?;
        self.storage.set(keys::INITIALIZED, "true")?;

        info!("Store initialized with {} seeded users", users.len());
        Ok(())
    }

    // ======== AUTHENTICATION ========

    /// Logs in on an exact email and password match.
    pub fn authenticate(&self, email: &str, password: &str) -> Result<AuthOutcome, AppResponse> {
        let user = self
            .get_all_users()?
            .into_iter()
            .find(|u| u.email == email && u.password == password);

        match user {
            Some(user) => {
                self.write(keys::CURRENT_USER, &user)?;
                info!("User {} logged in", user.id);
                Ok(AuthOutcome::Authenticated(user))
            }
            None => {
                debug!("Rejected login for {email}");
                Ok(AuthOutcome::Rejected(AuthFailure::InvalidCredentials))
            }
        }
    }

    /// Creates an account and makes it the current session.
    ///
    /// Email comparison is exact and case-sensitive.
    pub fn register(&self, name: &str, email: &str, password: &str) -> Result<AuthOutcome, AppResponse> {
        let mut users = self.get_all_users()?;
        if users.iter().any(|u| u.email == email) {
            return Ok(AuthOutcome::Rejected(AuthFailure::EmailAlreadyRegistered));
        }

        let joined = ids::now();
        let id = ids::user_id(joined, |candidate| users.iter().any(|u| u.id == candidate));
        let user = User {
            id,
            name: name.to_string(),
            email: email.to_string(),
            password: password.to_string(),
            phone: String::new(),
            avatar: SIGNUP_AVATAR.to_string(),
            join_date: joined,
            address: String::new(),
            city: String::new(),
            postal_code: String::new(),
        };

        users.push(user.clone());
        self.write(keys::USERS, &users)?;
        self.write(keys::CURRENT_USER, &user)?;

        info!("Registered user {}", user.id);
        Ok(AuthOutcome::Authenticated(user))
    }

    /// Clears the session. Calling it while logged out is harmless.
    pub fn end_session(&self) -> Result<(), AppResponse> {
        self.storage.set(keys::CURRENT_USER, "null")
    }

    pub fn get_current_user(&self) -> Result<Option<User>, AppResponse> {
        Ok(self.read::<Option<User>>(keys::CURRENT_USER)?.flatten())
    }

    pub fn get_all_users(&self) -> Result<Vec<User>, AppResponse> {
        self.read_or_default(keys::USERS)
    }

    // ======== LEGACY PROFILE ========

    pub fn set_user(&self, update: ProfileUpdate) -> Result<UserProfile, AppResponse> {
        let profile = UserProfile {
            name: non_empty(update.name).unwrap_or_else(|| GUEST_NAME.to_string()),
            email: non_empty(update.email).unwrap_or_else(|| GUEST_EMAIL.to_string()),
            phone: non_empty(update.phone).unwrap_or_default(),
            avatar: non_empty(update.avatar).unwrap_or_default(),
            join_date: Some(update.join_date.unwrap_or_else(ids::now)),
            address: non_empty(update.address).unwrap_or_default(),
            city: non_empty(update.city).unwrap_or_default(),
            postal_code: non_empty(update.postal_code).unwrap_or_default(),
            preferences: update.preferences.unwrap_or_default(),
        };
        self.write(keys::USER_DATA, &profile)?;
        Ok(profile)
    }

    /// The `user_data` profile, or a guest profile when none was stored.
    pub fn get_user(&self) -> Result<UserProfile, AppResponse> {
        Ok(self
            .read(keys::USER_DATA)?
            .unwrap_or_else(UserProfile::guest))
    }

    /// Stores a profile for a name/email pair tracked outside the store,
    /// unless a profile already exists. Returns whether one was written.
    pub fn adopt_legacy_profile(&self, name: &str, email: &str) -> Result<bool, AppResponse> {
        if name.is_empty() || email.is_empty() || self.storage.get(keys::USER_DATA)?.is_some() {
            return Ok(false);
        }

        self.set_user(ProfileUpdate {
            name: Some(name.to_string()),
            email: Some(email.to_string()),
            ..ProfileUpdate::default()
        })?;
        Ok(true)
    }

    // ======== BOOKINGS ========

    /// Stores a confirmed booking and records it in the history.
    pub fn create_booking(&self, request: NewBooking) -> Result<Booking, AppResponse> {
        let mut bookings = self.get_bookings()?;
        let id = ids::unique_random_id(ids::BOOKING_PREFIX, |candidate| {
            bookings.iter().any(|b| b.id == candidate)
        });

        let booking = Booking {
            id,
            service: request.service,
            eta: request.eta,
            created_at: ids::now(),
            status: BookingStatus::Confirmed,
            rating: 0.0,
            review: String::new(),
            reviewed: false,
            cancelled_at: None,
            extra: strip_reserved(request.extra, BOOKING_FIELDS),
        };

        bookings.push(booking.clone());
        self.write(keys::BOOKINGS, &bookings)?;
        self.add_to_history(&booking)?;

        debug!("Created booking {} for {}", booking.id, booking.service);
        Ok(booking)
    }

    pub fn get_bookings(&self) -> Result<Vec<Booking>, AppResponse> {
        self.read_or_default(keys::BOOKINGS)
    }

    pub fn get_booking_by_id(&self, id: &str) -> Result<Option<Booking>, AppResponse> {
        Ok(self.get_bookings()?.into_iter().find(|b| b.id == id))
    }

    /// Merges `patch` into booking `id`. Unknown ids are ignored; the return
    /// value says whether a booking matched.
    pub fn update_booking(&self, id: &str, patch: BookingPatch) -> Result<bool, AppResponse> {
        let mut bookings = self.get_bookings()?;
        let Some(booking) = bookings.iter_mut().find(|b| b.id == id) else {
            debug!("update_booking: no booking with id {id}");
            return Ok(false);
        };

        patch.apply(booking);
        self.write(keys::BOOKINGS, &bookings)?;
        Ok(true)
    }

    pub fn cancel_booking(&self, id: &str) -> Result<bool, AppResponse> {
        self.update_booking(
            id,
            BookingPatch {
                status: Some(BookingStatus::Cancelled),
                cancelled_at: Some(ids::now()),
                ..BookingPatch::default()
            },
        )
    }

    // ======== SERVICE HISTORY ========

    fn add_to_history(&self, booking: &Booking) -> Result<(), AppResponse> {
        let mut history = self.get_service_history()?;
        history.insert(
            0,
            HistoryEntry {
                booking: booking.clone(),
                completed_at: ids::now(),
            },
        );
        history.truncate(self.history_limit);
        self.write(keys::HISTORY, &history)
    }

    /// Booking snapshots, newest first.
    pub fn get_service_history(&self) -> Result<Vec<HistoryEntry>, AppResponse> {
        self.read_or_default(keys::HISTORY)
    }

    // ======== FAVORITES ========

    /// Adds `service` unless a favorite with the same id exists. Returns
    /// whether it was added.
    pub fn add_favorite(&self, service: ServiceListing) -> Result<bool, AppResponse> {
        let mut favorites = self.get_favorites()?;
        if favorites.iter().any(|f| f.id == service.id) {
            return Ok(false);
        }

        favorites.push(Favorite {
            id: service.id,
            fields: strip_reserved(service.fields, &["favoritedAt"]),
            favorited_at: ids::now(),
        });
        self.write(keys::FAVORITES, &favorites)?;
        Ok(true)
    }

    pub fn remove_favorite(&self, service_id: &str) -> Result<bool, AppResponse> {
        let mut favorites = self.get_favorites()?;
        let before = favorites.len();
        favorites.retain(|f| f.id != service_id);
        if favorites.len() == before {
            return Ok(false);
        }

        self.write(keys::FAVORITES, &favorites)?;
        Ok(true)
    }

    pub fn is_favorited(&self, service_id: &str) -> Result<bool, AppResponse> {
        Ok(self.get_favorites()?.iter().any(|f| f.id == service_id))
    }

    pub fn get_favorites(&self) -> Result<Vec<Favorite>, AppResponse> {
        self.read_or_default(keys::FAVORITES)
    }

    // ======== REVIEWS ========

    /// Records a review and copies its rating and text onto the booking.
    ///
    /// `booking_id` is not checked; reviewing an unknown booking stores the
    /// review and leaves the bookings table alone.
    pub fn add_review(&self, booking_id: &str, rating: f64, text: &str) -> Result<Review, AppResponse> {
        ensure_json_number(rating, "rating")?;

        let mut reviews = self.get_reviews()?;
        let id = ids::unique_random_id(ids::REVIEW_PREFIX, |candidate| {
            reviews.iter().any(|r| r.id == candidate)
        });
        let review = Review {
            id,
            booking_id: booking_id.to_string(),
            rating,
            review: text.to_string(),
            created_at: ids::now(),
        };

        reviews.push(review.clone());
        self.write(keys::REVIEWS, &reviews)?;

        self.update_booking(
            booking_id,
            BookingPatch {
                rating: Some(rating),
                review: Some(text.to_string()),
                reviewed: Some(true),
                ..BookingPatch::default()
            },
        )?;

        Ok(review)
    }

    pub fn get_reviews(&self) -> Result<Vec<Review>, AppResponse> {
        self.read_or_default(keys::REVIEWS)
    }

    /// Reviews of bookings for `service_name` that are still in the history.
    pub fn get_reviews_by_service(&self, service_name: &str) -> Result<Vec<Review>, AppResponse> {
        let booking_ids: HashSet<String> = self
            .get_service_history()?
            .into_iter()
            .filter(|entry| entry.booking.service == service_name)
            .map(|entry| entry.booking.id)
            .collect();

        Ok(self
            .get_reviews()?
            .into_iter()
            .filter(|r| booking_ids.contains(&r.booking_id))
            .collect())
    }

    // ======== PREFERENCES ========

    pub fn set_preferences(&self, preferences: &Preferences) -> Result<(), AppResponse> {
        self.write(keys::PREFERENCES, preferences)
    }

    pub fn get_preferences(&self) -> Result<Preferences, AppResponse> {
        self.read_or_default(keys::PREFERENCES)
    }

    // ======== STATISTICS ========

    pub fn compute_statistics(&self) -> Result<Statistics, AppResponse> {
        let bookings = self.get_bookings()?;
        let reviews = self.get_reviews()?;

        let active_bookings = bookings.iter().filter(|b| b.status.is_active()).count();
        let cancelled_bookings = bookings
            .iter()
            .filter(|b| b.status == BookingStatus::Cancelled)
            .count();

        Ok(Statistics {
            total_bookings: bookings.len(),
            completed_services: self.get_service_history()?.len(),
            active_bookings,
            cancelled_bookings,
            average_rating: average_rating(&reviews),
            favorite_count: self.get_favorites()?.len(),
            review_count: reviews.len(),
        })
    }

    // ======== WALLET ========

    pub fn get_wallet(&self) -> Result<Wallet, AppResponse> {
        self.read_or_default(keys::WALLET)
    }

    /// Prepends a transaction and adds its amount to the balance.
    pub fn record_transaction(&self, request: NewTransaction) -> Result<Transaction, AppResponse> {
        ensure_json_number(request.amount, "amount")?;

        let mut wallet = self.get_wallet()?;
        let id = ids::unique_random_id(ids::TRANSACTION_PREFIX, |candidate| {
            wallet.transactions.iter().any(|t| t.id == candidate)
        });

        let transaction = Transaction {
            id,
            amount: request.amount,
            details: strip_reserved(request.details, &["id", "amount", "timestamp"]),
            timestamp: ids::now(),
        };

        wallet.balance += transaction.amount;
        wallet.transactions.insert(0, transaction.clone());
        self.write(keys::WALLET, &wallet)?;
        Ok(transaction)
    }

    // ======== PROMO CODES ========

    pub fn get_promos(&self) -> Result<Vec<PromoCode>, AppResponse> {
        self.read_or_default(keys::PROMOS)
    }

    /// Returns `false`, without writing, if `promo.code` was already applied.
    pub fn add_promo_code(&self, promo: NewPromo) -> Result<bool, AppResponse> {
        let mut promos = self.get_promos()?;
        if promos.iter().any(|p| p.code == promo.code) {
            return Ok(false);
        }

        promos.push(PromoCode {
            code: promo.code,
            fields: strip_reserved(promo.fields, &["appliedAt"]),
            applied_at: ids::now(),
        });
        self.write(keys::PROMOS, &promos)?;
        Ok(true)
    }

    // ======== DOCUMENT ACCESS ========

    fn read<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, AppResponse> {
        match self.storage.get(key)? {
            Some(text) => serde_json::from_str(&text).map(Some).map_err(|e| {
                AppResponse::SerializationError(format!("Table '{key}' is malformed: {e}"))
            }),
            None => Ok(None),
        }
    }

    fn read_or_default<T: DeserializeOwned + Default>(&self, key: &str) -> Result<T, AppResponse> {
        Ok(self.read(key)?.unwrap_or_default())
    }

    fn write<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<(), AppResponse> {
        let json = serde_json::to_string(value)?;
        self.storage.set(key, &json)
    }
}

/// Empty strings fall back to defaults the same way missing fields do.
fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.is_empty())
}

/// NaN and infinities have no JSON form and would be written as `null`,
/// leaving a table that no longer parses.
fn ensure_json_number(value: f64, field: &str) -> Result<(), AppResponse> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(AppResponse::SerializationError(format!(
            "{field} must be a finite number, got {value}"
        )))
    }
}

fn average_rating(reviews: &[Review]) -> f64 {
    if reviews.is_empty() {
        return 0.0;
    }
    let total: f64 = reviews.iter().map(|r| r.rating).sum();
    let mean = total / reviews.len() as f64;
    (mean * 10.0).round() / 10.0
}

fn seed_user(
    id: &str,
    name: &str,
    email: &str,
    phone: &str,
    avatar: &str,
    address: (&str, &str, &str),
    joined: DateTime<Utc>,
) -> User {
    let (street, city, postal_code) = address;
    User {
        id: id.to_string(),
        name: name.to_string(),
        email: email.to_string(),
        password: "password123".to_string(),
        phone: phone.to_string(),
        avatar: avatar.to_string(),
        join_date: joined,
        address: street.to_string(),
        city: city.to_string(),
        postal_code: postal_code.to_string(),
    }
}

/// The example accounts written on first use.
pub fn seed_users(joined: DateTime<Utc>) -> Vec<User> {
    vec![
        seed_user(
            "user1",
            "John Doe",
            "john@example.com",
            "(555) 123-4567",
            "👨",
            ("123 Main St", "New York", "10001"),
            joined,
        ),
        seed_user(
            "user2",
            "Sarah Johnson",
            "sarah@example.com",
            "(555) 234-5678",
            "👩",
            ("456 Oak Ave", "Los Angeles", "90001"),
            joined,
        ),
        seed_user(
            "user3",
            "Mike Smith",
            "mike@example.com",
            "(555) 345-6789",
            "👨‍💼",
            ("789 Pine Rd", "Chicago", "60601"),
            joined,
        ),
    ]
}
