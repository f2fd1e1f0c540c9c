//! # Test Suite for QuickHelp Store
//!
//! ## Test Categories
//!
//! ### 1. Record Store Tests
//! - Run against [`MemoryStorage`](crate::storage::MemoryStorage)
//! - Cover seeding, sessions, bookings, history, favorites, reviews,
//!   statistics, wallet, promo codes, preferences and the legacy profile
//!
//! ### 2. LMDB Medium Tests
//! - Run against [`AppDbState`](crate::local_db_state::AppDbState) in a
//!   temporary directory
//! - Cover persistence across reopen, removal, clearing and closed handles
//!
//! ### 3. FFI Function Tests
//! - Exercise the `extern "C"` surface end to end, including null pointers,
//!   malformed JSON and rejected logins
//!
//! ```bash
//! cargo test test_store_    # record store
//! cargo test test_lmdb_     # LMDB medium
//! cargo test test_ffi_      # C ABI
//! ```

#[cfg(test)]
pub mod tests {
    use std::collections::HashSet;
    use std::ffi::{CStr, CString};
    use std::os::raw::c_char;

    use log::info;
    use serde_json::json;
    use tempfile::TempDir;

    use crate::app_response::AppResponse;
    use crate::local_db_state::AppDbState;
    use crate::record_store::{keys, RecordStore};
    use crate::records::{
        AuthFailure, AuthOutcome, Booking, BookingPatch, BookingStatus, NewBooking, NewPromo,
        NewTransaction, Preferences, ProfileUpdate, ServiceListing, Statistics, User,
    };
    use crate::storage::{KeyValueStore, MemoryStorage};
    use crate::store_config::StoreConfig;
    use crate::*;

    fn memory_store() -> RecordStore<MemoryStorage> {
        RecordStore::with_defaults(MemoryStorage::new()).unwrap()
    }

    fn temp_config(dir: &TempDir, name: &str) -> StoreConfig {
        StoreConfig::with_path(dir.path().join(name).to_string_lossy().into_owned())
    }

    /// Reads, frees and decodes a response returned by an FFI function.
    fn take_response(ptr: *const c_char) -> AppResponse {
        assert!(!ptr.is_null(), "FFI call returned a null response");
        let json = unsafe { CStr::from_ptr(ptr) }.to_str().unwrap().to_string();
        free_response(ptr as *mut c_char);
        serde_json::from_str(&json).unwrap()
    }

    fn ok_payload(response: AppResponse) -> String {
        match response {
            AppResponse::Ok(payload) => payload,
            other => panic!("expected Ok response, got {other:?}"),
        }
    }

    // ===============================
    // RECORD STORE
    // ===============================

    #[test]
    fn test_store_first_open_seeds_defaults() {
        let store = memory_store();

        let users = store.get_all_users().unwrap();
        let emails: Vec<&str> = users.iter().map(|u| u.email.as_str()).collect();
        assert_eq!(
            emails,
            vec!["john@example.com", "sarah@example.com", "mike@example.com"]
        );
        assert!(users.iter().all(|u| u.password == "password123"));

        assert!(store.is_initialized().unwrap());
        assert_eq!(store.get_current_user().unwrap(), None);
        assert!(store.get_bookings().unwrap().is_empty());
        assert!(store.get_service_history().unwrap().is_empty());
        assert!(store.get_favorites().unwrap().is_empty());
        assert!(store.get_reviews().unwrap().is_empty());
        assert!(store.get_promos().unwrap().is_empty());
        assert_eq!(store.get_preferences().unwrap(), Preferences::default());

        let wallet = store.get_wallet().unwrap();
        assert_eq!(wallet.balance, 0.0);
        assert!(wallet.transactions.is_empty());
    }

    #[test]
    fn test_store_reads_absent_tables_as_empty() {
        let store = memory_store();
        store.storage().clear().unwrap();
        assert!(store.storage().is_empty());

        assert!(store.get_all_users().unwrap().is_empty());
        assert_eq!(store.get_current_user().unwrap(), None);
        assert!(store.get_bookings().unwrap().is_empty());
        assert!(store.get_service_history().unwrap().is_empty());
        assert!(!store.is_favorited("anything").unwrap());
        assert_eq!(store.get_wallet().unwrap().balance, 0.0);
        assert_eq!(store.compute_statistics().unwrap(), Statistics::default());
        assert_eq!(store.get_user().unwrap().name, "Guest");
    }

    #[test]
    fn test_store_init_is_idempotent() {
        let storage = MemoryStorage::new();
        let store = RecordStore::with_defaults(&storage).unwrap();

        let booking = store.create_booking(NewBooking::new("Cleaning", 40)).unwrap();
        assert!(store.register("Ann", "ann@x.com", "pw").unwrap().is_success());

        assert!(!store.init().unwrap(), "second init must not seed again");

        let reopened = RecordStore::with_defaults(&storage).unwrap();
        assert_eq!(reopened.get_bookings().unwrap(), vec![booking]);
        assert_eq!(reopened.get_all_users().unwrap().len(), 4);
        assert_eq!(
            reopened.get_current_user().unwrap().map(|u| u.email),
            Some("ann@x.com".to_string())
        );
    }

    #[test]
    fn test_store_malformed_table_triggers_reseed() {
        let storage = MemoryStorage::new();
        {
            let store = RecordStore::with_defaults(&storage).unwrap();
            store.create_booking(NewBooking::new("Plumbing", 20)).unwrap();
        }

        storage.set(keys::BOOKINGS, "{not json").unwrap();

        let store = RecordStore::with_defaults(&storage).unwrap();
        assert!(store.get_bookings().unwrap().is_empty());
        assert!(store.get_service_history().unwrap().is_empty());
        assert_eq!(store.get_all_users().unwrap().len(), 3);
        assert!(store.is_initialized().unwrap());
    }

    #[test]
    fn test_store_reseed_wipes_intact_tables() {
        let storage = MemoryStorage::new();
        {
            let store = RecordStore::with_defaults(&storage).unwrap();
            assert!(store.register("Ann", "ann@x.com", "pw").unwrap().is_success());
            store
                .add_favorite(ServiceListing::new("svc-1").with_field("name", json!("Cleaning")))
                .unwrap();
        }

        storage.set(keys::HISTORY, "oops").unwrap();

        let store = RecordStore::with_defaults(&storage).unwrap();
        let emails: Vec<String> = store.get_all_users().unwrap().into_iter().map(|u| u.email).collect();
        assert!(!emails.contains(&"ann@x.com".to_string()));
        assert_eq!(store.get_current_user().unwrap(), None);
        assert!(store.get_favorites().unwrap().is_empty());
    }

    #[test]
    fn test_store_malformed_table_is_reported_after_init() {
        let store = memory_store();
        store.storage().set(keys::FAVORITES, "[{]").unwrap();

        match store.get_favorites() {
            Err(AppResponse::SerializationError(msg)) => assert!(msg.contains("favorites")),
            other => panic!("expected SerializationError, got {other:?}"),
        }
    }

    #[test]
    fn test_store_without_seed_users() {
        let config = StoreConfig {
            seed_defaults: false,
            ..StoreConfig::default()
        };
        let store = RecordStore::open(MemoryStorage::new(), &config).unwrap();

        assert!(store.get_all_users().unwrap().is_empty());
        assert!(store.is_initialized().unwrap());
        assert_eq!(
            store.authenticate("john@example.com", "password123").unwrap(),
            AuthOutcome::Rejected(AuthFailure::InvalidCredentials)
        );
    }

    #[test]
    fn test_store_register_and_authenticate() {
        let store = memory_store();

        let outcome = store.register("Ann", "ann@x.com", "pw").unwrap();
        let ann: User = outcome.user().cloned().unwrap();
        assert!(ann.id.starts_with("user_"));
        assert_eq!(ann.name, "Ann");
        assert_eq!(ann.avatar, "👤");
        assert!(ann.phone.is_empty());
        assert_eq!(store.get_current_user().unwrap(), Some(ann.clone()));

        let duplicate = store.register("Other Ann", "ann@x.com", "pw2").unwrap();
        assert_eq!(
            duplicate,
            AuthOutcome::Rejected(AuthFailure::EmailAlreadyRegistered)
        );
        assert_eq!(
            AuthFailure::EmailAlreadyRegistered.to_string(),
            "Email already registered"
        );

        store.end_session().unwrap();
        assert_eq!(store.get_current_user().unwrap(), None);

        let login = store.authenticate("ann@x.com", "pw").unwrap();
        assert_eq!(login, AuthOutcome::Authenticated(ann.clone()));
        assert_eq!(store.get_current_user().unwrap(), Some(ann));
    }

    #[test]
    fn test_store_register_email_is_case_sensitive() {
        let store = memory_store();
        assert!(store
            .register("John Again", "John@Example.com", "pw")
            .unwrap()
            .is_success());
    }

    #[test]
    fn test_store_register_generates_unique_ids() {
        let store = memory_store();
        let mut ids = HashSet::new();
        for i in 0..20 {
            let outcome = store
                .register("User", &format!("user{i}@x.com"), "pw")
                .unwrap();
            assert!(ids.insert(outcome.user().unwrap().id.clone()));
        }
    }

    #[test]
    fn test_store_failed_login_keeps_session() {
        let store = memory_store();
        let john = store
            .authenticate("john@example.com", "password123")
            .unwrap();
        assert!(john.is_success());

        let rejected = store.authenticate("john@example.com", "wrong").unwrap();
        assert_eq!(
            rejected,
            AuthOutcome::Rejected(AuthFailure::InvalidCredentials)
        );
        assert_eq!(
            store.get_current_user().unwrap().map(|u| u.id),
            Some("user1".to_string())
        );
    }

    #[test]
    fn test_store_end_session_is_idempotent() {
        let store = memory_store();
        store.end_session().unwrap();
        store.end_session().unwrap();
        assert_eq!(store.get_current_user().unwrap(), None);
        assert_eq!(
            store.storage().get(keys::CURRENT_USER).unwrap().as_deref(),
            Some("null")
        );
    }

    #[test]
    fn test_store_bookings_are_counted_with_unique_ids() {
        let store = memory_store();
        let mut ids = HashSet::new();

        for i in 0..50 {
            let booking = store
                .create_booking(NewBooking::new("Cleaning", 30 + i))
                .unwrap();
            assert!(booking.id.starts_with("QHP-"));
            assert_eq!(booking.id.len(), 13);
            assert!(ids.insert(booking.id));
        }

        assert_eq!(store.get_bookings().unwrap().len(), 50);
    }

    #[test]
    fn test_store_create_booking_defaults() {
        let store = memory_store();
        let request = NewBooking::new("Cleaning", 40)
            .with_field("date", json!("1/2/2026"))
            .with_field("id", json!("caller-chosen"));

        let booking = store.create_booking(request).unwrap();
        assert_eq!(booking.status, BookingStatus::Confirmed);
        assert_eq!(booking.rating, 0.0);
        assert!(booking.review.is_empty());
        assert!(!booking.reviewed);
        assert_eq!(booking.eta, 40);
        assert_ne!(booking.id, "caller-chosen");
        assert_eq!(booking.extra.get("date"), Some(&json!("1/2/2026")));
        assert!(!booking.extra.contains_key("id"));

        let stored = store.get_booking_by_id(&booking.id).unwrap();
        assert_eq!(stored, Some(booking.clone()));

        let history = store.get_service_history().unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].booking, booking);
    }

    #[test]
    fn test_store_history_is_capped_newest_first() {
        let store = memory_store();
        let created: Vec<Booking> = (0..150)
            .map(|i| {
                store
                    .create_booking(NewBooking::new(format!("Service {i}"), 30))
                    .unwrap()
            })
            .collect();

        let history = store.get_service_history().unwrap();
        assert_eq!(history.len(), 100);

        let expected: Vec<&str> = created.iter().rev().take(100).map(|b| b.id.as_str()).collect();
        let actual: Vec<&str> = history.iter().map(|h| h.booking.id.as_str()).collect();
        assert_eq!(actual, expected);

        assert_eq!(store.get_bookings().unwrap().len(), 150);
        assert_eq!(store.compute_statistics().unwrap().completed_services, 100);
    }

    #[test]
    fn test_store_history_limit_follows_config() {
        let config = StoreConfig {
            history_limit: 3,
            ..StoreConfig::default()
        };
        let store = RecordStore::open(MemoryStorage::new(), &config).unwrap();
        for _ in 0..5 {
            store.create_booking(NewBooking::new("Cooking", 60)).unwrap();
        }
        assert_eq!(store.get_service_history().unwrap().len(), 3);
    }

    #[test]
    fn test_store_update_and_cancel_booking() {
        let store = memory_store();
        let booking = store.create_booking(NewBooking::new("Electrician", 25)).unwrap();

        let mut patch = BookingPatch::status(BookingStatus::Assigned);
        patch.extra.insert("helper".to_string(), json!("Dana"));
        patch.extra.insert("createdAt".to_string(), json!("1999-01-01T00:00:00Z"));
        assert!(store.update_booking(&booking.id, patch).unwrap());

        let updated = store.get_booking_by_id(&booking.id).unwrap().unwrap();
        assert_eq!(updated.status, BookingStatus::Assigned);
        assert_eq!(updated.extra.get("helper"), Some(&json!("Dana")));
        assert_eq!(updated.created_at, booking.created_at);
        assert!(!updated.extra.contains_key("createdAt"));

        assert!(store.cancel_booking(&booking.id).unwrap());
        let cancelled = store.get_booking_by_id(&booking.id).unwrap().unwrap();
        assert_eq!(cancelled.status, BookingStatus::Cancelled);
        assert!(cancelled.cancelled_at.is_some());

        let stats = store.compute_statistics().unwrap();
        assert_eq!(stats.cancelled_bookings, 1);
        assert_eq!(stats.active_bookings, 0);
    }

    #[test]
    fn test_store_update_unknown_booking_is_noop() {
        let store = memory_store();
        let booking = store.create_booking(NewBooking::new("Cleaning", 40)).unwrap();

        assert!(!store
            .update_booking("QHP-MISSING00", BookingPatch::status(BookingStatus::Cancelled))
            .unwrap());
        assert!(!store.cancel_booking("QHP-MISSING00").unwrap());
        assert_eq!(store.get_bookings().unwrap(), vec![booking]);
    }

    #[test]
    fn test_store_favorites_set_semantics() {
        let store = memory_store();
        let listing = ServiceListing::new("svc-cleaning").with_field("price", json!(49.99));

        assert!(!store.is_favorited("svc-cleaning").unwrap());
        assert!(store.add_favorite(listing.clone()).unwrap());
        assert!(!store.add_favorite(listing).unwrap());

        let favorites = store.get_favorites().unwrap();
        assert_eq!(favorites.len(), 1);
        assert_eq!(favorites[0].fields.get("price"), Some(&json!(49.99)));
        assert!(store.is_favorited("svc-cleaning").unwrap());

        assert!(store.remove_favorite("svc-cleaning").unwrap());
        assert!(!store.is_favorited("svc-cleaning").unwrap());
        assert!(!store.remove_favorite("svc-cleaning").unwrap());
        assert!(store.get_favorites().unwrap().is_empty());
    }

    #[test]
    fn test_store_review_updates_booking_and_stats() {
        let store = memory_store();
        let booking = store.create_booking(NewBooking::new("Cleaning", 40)).unwrap();
        assert_eq!(booking.status, BookingStatus::Confirmed);
        assert_eq!(booking.rating, 0.0);

        let review = store.add_review(&booking.id, 5.0, "great").unwrap();
        assert!(review.id.starts_with("REV-"));
        assert_eq!(review.booking_id, booking.id);

        let rated = store.get_booking_by_id(&booking.id).unwrap().unwrap();
        assert_eq!(rated.rating, 5.0);
        assert_eq!(rated.review, "great");
        assert!(rated.reviewed);

        assert_eq!(store.get_reviews().unwrap(), vec![review]);

        let stats = store.compute_statistics().unwrap();
        assert_eq!(stats.average_rating, 5.0);
        assert_eq!(stats.review_count, 1);
        assert_eq!(stats.total_bookings, 1);
        assert_eq!(stats.active_bookings, 1);
    }

    #[test]
    fn test_store_average_rating_rounds_to_one_decimal() {
        let store = memory_store();
        for rating in [5.0, 4.0, 4.0] {
            let booking = store.create_booking(NewBooking::new("Plumbing", 20)).unwrap();
            store.add_review(&booking.id, rating, "").unwrap();
        }
        assert_eq!(store.compute_statistics().unwrap().average_rating, 4.3);
    }

    #[test]
    fn test_store_review_keeps_any_rating() {
        let store = memory_store();
        for rating in [0.0, 6.0, 4.5, -1.0] {
            let booking = store.create_booking(NewBooking::new("Cleaning", 40)).unwrap();
            let review = store.add_review(&booking.id, rating, "as given").unwrap();
            assert_eq!(review.rating, rating);
            assert_eq!(
                store.get_booking_by_id(&booking.id).unwrap().unwrap().rating,
                rating
            );
        }
        assert_eq!(store.get_reviews().unwrap().len(), 4);
    }

    #[test]
    fn test_store_non_finite_numbers_are_not_written() {
        let store = memory_store();
        let booking = store.create_booking(NewBooking::new("Cleaning", 40)).unwrap();

        assert!(matches!(
            store.add_review(&booking.id, f64::NAN, "nan"),
            Err(AppResponse::SerializationError(_))
        ));
        assert!(matches!(
            store.record_transaction(NewTransaction::new(f64::INFINITY)),
            Err(AppResponse::SerializationError(_))
        ));

        assert!(store.get_reviews().unwrap().is_empty());
        assert!(store.get_wallet().unwrap().transactions.is_empty());
        assert_eq!(store.get_booking_by_id(&booking.id).unwrap().unwrap().rating, 0.0);
    }

    #[test]
    fn test_store_review_for_unknown_booking_is_kept() {
        let store = memory_store();
        let review = store.add_review("QHP-GONE00000", 3.0, "ok").unwrap();
        assert_eq!(store.get_reviews().unwrap(), vec![review]);
        assert!(store.get_bookings().unwrap().is_empty());
    }

    #[test]
    fn test_store_reviews_by_service() {
        let store = memory_store();
        let cleaning = store.create_booking(NewBooking::new("Cleaning", 40)).unwrap();
        let plumbing = store.create_booking(NewBooking::new("Plumbing", 20)).unwrap();

        let cleaning_review = store.add_review(&cleaning.id, 4.0, "tidy").unwrap();
        store.add_review(&plumbing.id, 2.0, "leaky").unwrap();

        assert_eq!(
            store.get_reviews_by_service("Cleaning").unwrap(),
            vec![cleaning_review]
        );
        assert!(store.get_reviews_by_service("Cooking").unwrap().is_empty());
    }

    #[test]
    fn test_store_wallet_running_balance() {
        let store = memory_store();
        for amount in [10.0, -3.0, 7.0] {
            let txn = store
                .record_transaction(NewTransaction::new(amount).with_field("description", json!("test")))
                .unwrap();
            assert!(txn.id.starts_with("TXN-"));
        }

        let wallet = store.get_wallet().unwrap();
        assert_eq!(wallet.balance, 14.0);
        let amounts: Vec<f64> = wallet.transactions.iter().map(|t| t.amount).collect();
        assert_eq!(amounts, vec![7.0, -3.0, 10.0]);
        assert_eq!(
            wallet.transactions[0].details.get("description"),
            Some(&json!("test"))
        );
    }

    #[test]
    fn test_store_promo_codes_reject_duplicates() {
        let store = memory_store();
        let promo = NewPromo::new("WELCOME10").with_field("discount", json!(10));

        assert!(store.add_promo_code(promo.clone()).unwrap());
        assert!(!store.add_promo_code(promo).unwrap());
        assert!(store.add_promo_code(NewPromo::new("SPRING5")).unwrap());

        let promos = store.get_promos().unwrap();
        assert_eq!(promos.len(), 2);
        assert_eq!(promos[0].code, "WELCOME10");
        assert_eq!(promos[0].fields.get("discount"), Some(&json!(10)));
    }

    #[test]
    fn test_store_preferences_are_overwritten_wholesale() {
        let store = memory_store();
        let mut preferences = Preferences {
            dark_mode: false,
            ..Preferences::default()
        };
        preferences.extra.insert("language".to_string(), json!("en"));

        store.set_preferences(&preferences).unwrap();
        assert_eq!(store.get_preferences().unwrap(), preferences);

        store.set_preferences(&Preferences::default()).unwrap();
        assert!(store.get_preferences().unwrap().extra.is_empty());
    }

    #[test]
    fn test_store_set_user_treats_empty_strings_as_missing() {
        let store = memory_store();
        let profile = store
            .set_user(ProfileUpdate {
                name: Some(String::new()),
                email: Some(String::new()),
                city: Some("Lyon".to_string()),
                ..ProfileUpdate::default()
            })
            .unwrap();

        assert_eq!(profile.name, "Guest");
        assert_eq!(profile.email, "user@example.com");
        assert_eq!(profile.city, "Lyon");
        assert_eq!(store.get_user().unwrap(), profile);
    }

    #[test]
    fn test_store_legacy_profile_adoption() {
        let store = memory_store();

        let guest = store.get_user().unwrap();
        assert_eq!(guest.name, "Guest");
        assert_eq!(guest.email, "user@example.com");

        assert!(!store.adopt_legacy_profile("", "dana@x.com").unwrap());
        assert!(store.adopt_legacy_profile("Dana", "dana@x.com").unwrap());

        let profile = store.get_user().unwrap();
        assert_eq!(profile.name, "Dana");
        assert_eq!(profile.email, "dana@x.com");
        assert!(profile.join_date.is_some());

        assert!(!store.adopt_legacy_profile("Someone", "else@x.com").unwrap());
        assert_eq!(store.get_user().unwrap().name, "Dana");
    }

    #[test]
    fn test_store_persisted_layout_uses_camel_case() {
        let store = memory_store();
        store.create_booking(NewBooking::new("Cleaning", 40)).unwrap();

        let raw = store.storage().get(keys::BOOKINGS).unwrap().unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        let first = &value[0];
        assert_eq!(first["status"], json!("confirmed"));
        assert!(first.get("createdAt").is_some());

        let raw_history = store.storage().get(keys::HISTORY).unwrap().unwrap();
        let history: serde_json::Value = serde_json::from_str(&raw_history).unwrap();
        assert!(history[0].get("completedAt").is_some());
        assert_eq!(history[0]["service"], json!("Cleaning"));

        let raw_users = store.storage().get(keys::USERS).unwrap().unwrap();
        assert!(raw_users.contains("\"postalCode\":\"10001\""));
    }

    // ===============================
    // LMDB MEDIUM
    // ===============================

    #[test]
    fn test_lmdb_round_trip_and_remove() {
        let dir = TempDir::new().unwrap();
        let db = AppDbState::open(&temp_config(&dir, "round_trip")).unwrap();

        assert_eq!(db.get("missing").unwrap(), None);
        db.set("bookings", "[]").unwrap();
        assert_eq!(db.get("bookings").unwrap().as_deref(), Some("[]"));

        assert!(db.remove("bookings").unwrap());
        assert!(!db.remove("bookings").unwrap());
        assert_eq!(db.get("bookings").unwrap(), None);

        db.set("a", "1").unwrap();
        db.set("b", "2").unwrap();
        db.clear().unwrap();
        assert_eq!(db.get("a").unwrap(), None);
        assert_eq!(db.get("b").unwrap(), None);
    }

    #[test]
    fn test_lmdb_closed_handle_reports_error() {
        let dir = TempDir::new().unwrap();
        let mut db = AppDbState::open(&temp_config(&dir, "closed")).unwrap();

        db.close_database().unwrap();
        assert!(!db.is_open());
        db.close_database().unwrap();

        match db.get("bookings") {
            Err(AppResponse::DatabaseError(_)) => {}
            other => panic!("expected DatabaseError, got {other:?}"),
        }
    }

    #[test]
    fn test_lmdb_store_persists_across_reopen() {
        let dir = TempDir::new().unwrap();
        let config = temp_config(&dir, "persist");

        let booking_id = {
            let store = RecordStore::open(AppDbState::open(&config).unwrap(), &config).unwrap();
            store.register("Ann", "ann@x.com", "pw").unwrap();
            let booking = store.create_booking(NewBooking::new("Cleaning", 40)).unwrap();
            store.add_favorite(ServiceListing::new("svc-1")).unwrap();

            let mut db = store.into_storage();
            db.close_database().unwrap();
            booking.id
        };
        info!("Reopening LMDB store at {}", config.lmdb_dir());

        let store = RecordStore::open(AppDbState::open(&config).unwrap(), &config).unwrap();
        assert!(!store.init().unwrap());
        assert!(store.get_booking_by_id(&booking_id).unwrap().is_some());
        assert!(store.is_favorited("svc-1").unwrap());
        assert_eq!(store.get_all_users().unwrap().len(), 4);
        assert_eq!(
            store.get_current_user().unwrap().map(|u| u.email),
            Some("ann@x.com".to_string())
        );
    }

    #[test]
    fn test_lmdb_rejects_invalid_config() {
        let config = StoreConfig {
            map_size: 0,
            ..StoreConfig::with_path("unused")
        };
        assert!(matches!(
            AppDbState::open(&config),
            Err(AppResponse::ValidationError(_))
        ));
    }

    #[test]
    fn test_config_from_partial_json() {
        let config = StoreConfig::from_json(r#"{"path":"custom","history_limit":25}"#).unwrap();
        assert_eq!(config.path, "custom");
        assert_eq!(config.history_limit, 25);
        assert!(config.seed_defaults);
        assert_eq!(config.lmdb_dir(), "custom.lmdb");

        assert!(matches!(
            StoreConfig::from_json(r#"{"path":""}"#),
            Err(AppResponse::ValidationError(_))
        ));
        assert!(matches!(
            StoreConfig::from_json("not json"),
            Err(AppResponse::SerializationError(_))
        ));
    }

    // ===============================
    // FFI FUNCTIONS
    // ===============================

    fn ffi_store(dir: &TempDir, name: &str) -> *mut LocalStore {
        let config = json!({ "path": temp_config(dir, name).path }).to_string();
        let config = CString::new(config).unwrap();
        let store = create_store_with_config(config.as_ptr());
        assert!(!store.is_null());
        store
    }

    #[test]
    fn test_ffi_booking_flow() {
        let dir = TempDir::new().unwrap();
        let store = ffi_store(&dir, "ffi_booking");

        let request = CString::new(r#"{"service":"Cleaning","eta":40,"date":"1/2/2026"}"#).unwrap();
        let booking: Booking =
            serde_json::from_str(&ok_payload(take_response(add_booking(store, request.as_ptr()))))
                .unwrap();
        assert_eq!(booking.status, BookingStatus::Confirmed);

        let id = CString::new(booking.id.clone()).unwrap();
        let text = CString::new("great").unwrap();
        take_response(add_review(store, id.as_ptr(), 5.0, text.as_ptr()));

        let stats: Statistics =
            serde_json::from_str(&ok_payload(take_response(get_stats(store)))).unwrap();
        assert_eq!(stats.total_bookings, 1);
        assert_eq!(stats.average_rating, 5.0);

        let fetched: Booking =
            serde_json::from_str(&ok_payload(take_response(get_booking(store, id.as_ptr()))))
                .unwrap();
        assert_eq!(fetched.rating, 5.0);
        assert!(fetched.reviewed);

        let missing = CString::new("QHP-MISSING00").unwrap();
        assert_eq!(
            take_response(get_booking(store, missing.as_ptr())),
            AppResponse::NotFound("No booking found with id: QHP-MISSING00".to_string())
        );
        assert_eq!(
            ok_payload(take_response(cancel_booking(store, missing.as_ptr()))),
            "false"
        );
        assert_eq!(
            ok_payload(take_response(cancel_booking(store, id.as_ptr()))),
            "true"
        );

        assert_eq!(
            take_response(close_store(store)),
            AppResponse::success("Store closed successfully")
        );
    }

    #[test]
    fn test_ffi_login_and_signup() {
        let dir = TempDir::new().unwrap();
        let store = ffi_store(&dir, "ffi_auth");

        let email = CString::new("john@example.com").unwrap();
        let wrong = CString::new("nope").unwrap();
        assert_eq!(
            take_response(login_user(store, email.as_ptr(), wrong.as_ptr())),
            AppResponse::ValidationError("Invalid email or password".to_string())
        );

        let right = CString::new("password123").unwrap();
        let user: User =
            serde_json::from_str(&ok_payload(take_response(login_user(store, email.as_ptr(), right.as_ptr()))))
                .unwrap();
        assert_eq!(user.id, "user1");

        let name = CString::new("John Again").unwrap();
        assert_eq!(
            take_response(signup_user(store, name.as_ptr(), email.as_ptr(), right.as_ptr())),
            AppResponse::ValidationError("Email already registered".to_string())
        );

        take_response(logout_user(store));
        assert_eq!(ok_payload(take_response(get_current_user(store))), "null");

        take_response(close_store(store));
    }

    #[test]
    fn test_ffi_wallet_favorites_and_promos() {
        let dir = TempDir::new().unwrap();
        let store = ffi_store(&dir, "ffi_wallet");

        for amount in ["10", "-3", "7"] {
            let txn = CString::new(format!(r#"{{"amount":{amount},"description":"x"}}"#)).unwrap();
            ok_payload(take_response(add_transaction(store, txn.as_ptr())));
        }
        let wallet: serde_json::Value =
            serde_json::from_str(&ok_payload(take_response(get_wallet(store)))).unwrap();
        assert_eq!(wallet["balance"], json!(14.0));

        let service = CString::new(r#"{"id":"svc-1","name":"Cleaning"}"#).unwrap();
        assert_eq!(ok_payload(take_response(add_favorite(store, service.as_ptr()))), "true");
        assert_eq!(ok_payload(take_response(add_favorite(store, service.as_ptr()))), "false");
        let id = CString::new("svc-1").unwrap();
        assert_eq!(ok_payload(take_response(is_favorited(store, id.as_ptr()))), "true");

        let promo = CString::new(r#"{"code":"WELCOME10"}"#).unwrap();
        assert_eq!(ok_payload(take_response(add_promo(store, promo.as_ptr()))), "true");
        assert_eq!(ok_payload(take_response(add_promo(store, promo.as_ptr()))), "false");

        take_response(close_store(store));
    }

    #[test]
    fn test_ffi_rejects_bad_input() {
        let dir = TempDir::new().unwrap();
        let store = ffi_store(&dir, "ffi_bad_input");

        assert!(matches!(
            take_response(get_bookings(std::ptr::null_mut())),
            AppResponse::BadRequest(_)
        ));
        assert!(matches!(
            take_response(add_booking(store, std::ptr::null())),
            AppResponse::BadRequest(_)
        ));

        let malformed = CString::new(r#"{"service":"Cleaning""#).unwrap();
        assert!(matches!(
            take_response(add_booking(store, malformed.as_ptr())),
            AppResponse::SerializationError(_)
        ));

        let text = CString::new("x").unwrap();
        assert!(matches!(
            take_response(add_review(store, std::ptr::null(), 4.0, text.as_ptr())),
            AppResponse::BadRequest(_)
        ));
        assert!(matches!(
            take_response(get_booking(store, std::ptr::null())),
            AppResponse::BadRequest(_)
        ));

        assert!(create_store(std::ptr::null()).is_null());
        assert!(matches!(
            take_response(close_store(std::ptr::null_mut())),
            AppResponse::BadRequest(_)
        ));

        take_response(close_store(store));
    }
}
