//! # QuickHelp Store
//!
//! Local persistence for a home-services booking client. User accounts, the
//! current session, bookings, booking history, favorites, reviews,
//! preferences, a wallet and applied promo codes are each kept as one named
//! JSON document in an LMDB environment.
//!
//! ## Layers
//!
//! - [`storage::KeyValueStore`]: the storage port (`get`/`set` of named documents)
//! - [`local_db_state::AppDbState`]: LMDB implementation of the port
//! - [`storage::MemoryStorage`]: in-memory implementation for tests
//! - [`record_store::RecordStore`]: per-table operations, generic over the port
//! - the `extern "C"` functions below: the same operations for host apps
//!
//! ## Quick Start
//!
//! ```no_run
//! use quickhelp_store::{create_store, add_booking, free_response};
//! use std::ffi::CString;
//!
//! let name = CString::new("quickhelp").unwrap();
//! let store = create_store(name.as_ptr());
//!
//! let request = CString::new(r#"{"service":"Cleaning","eta":40}"#).unwrap();
//! let response = add_booking(store, request.as_ptr());
//! free_response(response as *mut _);
//! ```
//!
//! ## FFI Conventions
//!
//! Every function except [`create_store`] and [`create_store_with_config`]
//! returns a JSON-serialized [`AppResponse`]. Successful calls return
//! `{"Ok":"<json payload>"}`; the payload is itself JSON text. Release every
//! returned string with [`free_response`].

pub mod app_response;
pub mod ids;
pub mod local_db_state;
pub mod record_store;
pub mod records;
pub mod storage;
pub mod store_config;
mod test;

use std::ffi::{CStr, CString};
use std::os::raw::c_char;

use log::{info, warn};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::app_response::AppResponse;
use crate::local_db_state::AppDbState;
use crate::record_store::RecordStore;
use crate::records::{
    AuthOutcome, BookingPatch, NewBooking, NewPromo, NewTransaction, Preferences, ProfileUpdate,
    ServiceListing,
};
use crate::store_config::StoreConfig;

/// The store handed across the C ABI.
pub type LocalStore = RecordStore<AppDbState>;

/// Opens `<name>.lmdb` with default settings and initializes it.
///
/// Returns a pointer to the store, or null on failure. Release it with
/// [`close_store`].
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn create_store(name: *const c_char) -> *mut LocalStore {
    let name = match c_ptr_to_string(name, "name") {
        Ok(name) => name,
        Err(e) => {
            warn!("create_store: {e}");
            return std::ptr::null_mut();
        }
    };

    open_store(StoreConfig::with_path(name))
}

/// Opens a store from a JSON [`StoreConfig`] document.
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn create_store_with_config(config_json: *const c_char) -> *mut LocalStore {
    let config = match c_ptr_to_string(config_json, "config")
        .and_then(|json| StoreConfig::from_json(&json))
    {
        Ok(config) => config,
        Err(e) => {
            warn!("create_store_with_config: {e}");
            return std::ptr::null_mut();
        }
    };

    open_store(config)
}

fn open_store(config: StoreConfig) -> *mut LocalStore {
    info!("Attempting to open store at: {}", config.lmdb_dir());

    let store = AppDbState::open(&config).and_then(|db| RecordStore::open(db, &config));
    match store {
        Ok(store) => {
            info!("✅ Store initialized successfully");
            Box::into_raw(Box::new(store))
        }
        Err(e) => {
            warn!("❌ Failed to initialize store: {e}");
            warn!("Attempted path: {}", config.lmdb_dir());
            std::ptr::null_mut()
        }
    }
}

/// Logs in with an exact email and password match.
///
/// A wrong combination returns `ValidationError("Invalid email or password")`.
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn login_user(
    state: *mut LocalStore,
    email: *const c_char,
    password: *const c_char,
) -> *const c_char {
    with_store(state, "login_user", |store| {
        let email = c_ptr_to_string(email, "email")?;
        let password = c_ptr_to_string(password, "password")?;
        auth_response(store.authenticate(&email, &password)?)
    })
}

/// Registers a new account and logs it in.
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn signup_user(
    state: *mut LocalStore,
    name: *const c_char,
    email: *const c_char,
    password: *const c_char,
) -> *const c_char {
    with_store(state, "signup_user", |store| {
        let name = c_ptr_to_string(name, "name")?;
        let email = c_ptr_to_string(email, "email")?;
        let password = c_ptr_to_string(password, "password")?;
        auth_response(store.register(&name, &email, &password)?)
    })
}

#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn logout_user(state: *mut LocalStore) -> *const c_char {
    with_store(state, "logout_user", |store| {
        store.end_session()?;
        Ok(AppResponse::success("Logged out"))
    })
}

/// Payload is the current user, or `null` when logged out.
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn get_current_user(state: *mut LocalStore) -> *const c_char {
    with_store(state, "get_current_user", |store| {
        json_response(store.get_current_user())
    })
}

#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn get_user(state: *mut LocalStore) -> *const c_char {
    with_store(state, "get_user", |store| json_response(store.get_user()))
}

#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn set_user(state: *mut LocalStore, json_ptr: *const c_char) -> *const c_char {
    with_store(state, "set_user", |store| {
        let update: ProfileUpdate = parse_json(json_ptr, "profile")?;
        json_response(store.set_user(update))
    })
}

/// Creates a booking from `{"service": .., "eta": .., ...}`.
///
/// Payload is the stored booking including its generated `id`.
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn add_booking(state: *mut LocalStore, json_ptr: *const c_char) -> *const c_char {
    with_store(state, "add_booking", |store| {
        let request: NewBooking = parse_json(json_ptr, "booking")?;
        json_response(store.create_booking(request))
    })
}

#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn get_bookings(state: *mut LocalStore) -> *const c_char {
    with_store(state, "get_bookings", |store| json_response(store.get_bookings()))
}

/// Payload is the booking with `id`; an unknown id returns `NotFound`.
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn get_booking(state: *mut LocalStore, id: *const c_char) -> *const c_char {
    with_store(state, "get_booking", |store| {
        let id = c_ptr_to_string(id, "id")?;
        match store.get_booking_by_id(&id)? {
            Some(booking) => Ok(AppResponse::ok_json(&booking)),
            None => Err(AppResponse::NotFound(format!("No booking found with id: {id}"))),
        }
    })
}

/// Merges a partial booking into booking `id`.
///
/// Payload is `true` if a booking matched and `false` otherwise; an unknown
/// id is not an error.
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn update_booking(
    state: *mut LocalStore,
    id: *const c_char,
    json_ptr: *const c_char,
) -> *const c_char {
    with_store(state, "update_booking", |store| {
        let id = c_ptr_to_string(id, "id")?;
        let patch: BookingPatch = parse_json(json_ptr, "patch")?;
        json_response(store.update_booking(&id, patch))
    })
}

#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn cancel_booking(state: *mut LocalStore, id: *const c_char) -> *const c_char {
    with_store(state, "cancel_booking", |store| {
        let id = c_ptr_to_string(id, "id")?;
        json_response(store.cancel_booking(&id))
    })
}

#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn get_service_history(state: *mut LocalStore) -> *const c_char {
    with_store(state, "get_service_history", |store| {
        json_response(store.get_service_history())
    })
}

#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn add_favorite(state: *mut LocalStore, json_ptr: *const c_char) -> *const c_char {
    with_store(state, "add_favorite", |store| {
        let service: ServiceListing = parse_json(json_ptr, "service")?;
        json_response(store.add_favorite(service))
    })
}

#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn remove_favorite(state: *mut LocalStore, id: *const c_char) -> *const c_char {
    with_store(state, "remove_favorite", |store| {
        let id = c_ptr_to_string(id, "id")?;
        json_response(store.remove_favorite(&id))
    })
}

#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn is_favorited(state: *mut LocalStore, id: *const c_char) -> *const c_char {
    with_store(state, "is_favorited", |store| {
        let id = c_ptr_to_string(id, "id")?;
        json_response(store.is_favorited(&id))
    })
}

#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn get_favorites(state: *mut LocalStore) -> *const c_char {
    with_store(state, "get_favorites", |store| json_response(store.get_favorites()))
}

/// Reviews booking `booking_id`. The rating is stored as given.
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn add_review(
    state: *mut LocalStore,
    booking_id: *const c_char,
    rating: f64,
    text: *const c_char,
) -> *const c_char {
    with_store(state, "add_review", |store| {
        let booking_id = c_ptr_to_string(booking_id, "booking_id")?;
        let text = c_ptr_to_string(text, "text")?;
        json_response(store.add_review(&booking_id, rating, &text))
    })
}

#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn get_reviews_by_service(
    state: *mut LocalStore,
    service: *const c_char,
) -> *const c_char {
    with_store(state, "get_reviews_by_service", |store| {
        let service = c_ptr_to_string(service, "service")?;
        json_response(store.get_reviews_by_service(&service))
    })
}

#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn get_stats(state: *mut LocalStore) -> *const c_char {
    with_store(state, "get_stats", |store| json_response(store.compute_statistics()))
}

#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn get_wallet(state: *mut LocalStore) -> *const c_char {
    with_store(state, "get_wallet", |store| json_response(store.get_wallet()))
}

/// Applies `{"amount": .., ...}` to the wallet. Negative amounts are debits.
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn add_transaction(state: *mut LocalStore, json_ptr: *const c_char) -> *const c_char {
    with_store(state, "add_transaction", |store| {
        let request: NewTransaction = parse_json(json_ptr, "transaction")?;
        json_response(store.record_transaction(request))
    })
}

/// Payload is `false` if the code was already applied.
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn add_promo(state: *mut LocalStore, json_ptr: *const c_char) -> *const c_char {
    with_store(state, "add_promo", |store| {
        let promo: NewPromo = parse_json(json_ptr, "promo")?;
        json_response(store.add_promo_code(promo))
    })
}

#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn get_preferences(state: *mut LocalStore) -> *const c_char {
    with_store(state, "get_preferences", |store| {
        json_response(store.get_preferences())
    })
}

#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn set_preferences(state: *mut LocalStore, json_ptr: *const c_char) -> *const c_char {
    with_store(state, "set_preferences", |store| {
        let preferences: Preferences = parse_json(json_ptr, "preferences")?;
        store.set_preferences(&preferences)?;
        Ok(AppResponse::success("Preferences saved"))
    })
}

/// Closes the LMDB environment and frees the store.
///
/// `state` must not be used after this call.
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn close_store(state: *mut LocalStore) -> *const c_char {
    if state.is_null() {
        let error = AppResponse::BadRequest("Null state pointer passed to close_store".to_string());
        return response_to_c_string(&error);
    }

    let mut store = unsafe { Box::from_raw(state) };
    let response = match store.storage_mut().close_database() {
        Ok(()) => AppResponse::success("Store closed successfully"),
        Err(e) => e,
    };
    drop(store);
    response_to_c_string(&response)
}

/// Releases a string returned by any function in this library.
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn free_response(ptr: *mut c_char) {
    if ptr.is_null() {
        return;
    }
    drop(unsafe { CString::from_raw(ptr) });
}

/// Runs `op` against the store behind `state` and converts the outcome to a
/// C string. Errors short-circuit into the response itself.
fn with_store<F>(state: *mut LocalStore, name: &str, op: F) -> *const c_char
where
    F: FnOnce(&LocalStore) -> Result<AppResponse, AppResponse>,
{
    let store = match unsafe { state.as_ref() } {
        Some(store) => store,
        None => {
            let error = AppResponse::BadRequest(format!("Null state pointer passed to {name}"));
            return response_to_c_string(&error);
        }
    };

    let response = op(store).unwrap_or_else(|e| e);
    response_to_c_string(&response)
}

fn json_response<T: Serialize>(result: Result<T, AppResponse>) -> Result<AppResponse, AppResponse> {
    result.map(|payload| AppResponse::ok_json(&payload))
}

fn auth_response(outcome: AuthOutcome) -> Result<AppResponse, AppResponse> {
    match outcome {
        AuthOutcome::Authenticated(user) => Ok(AppResponse::ok_json(&user)),
        AuthOutcome::Rejected(reason) => Err(AppResponse::ValidationError(reason.to_string())),
    }
}

fn parse_json<T: DeserializeOwned>(ptr: *const c_char, field_name: &str) -> Result<T, AppResponse> {
    let json = c_ptr_to_string(ptr, field_name)?;
    serde_json::from_str(&json)
        .map_err(|e| AppResponse::SerializationError(format!("Invalid {field_name} JSON: {e}")))
}

/// Serializes `response` into a C string owned by the caller.
///
/// Returns null if serialization or C string creation fails.
fn response_to_c_string(response: &AppResponse) -> *const c_char {
    let json = match serde_json::to_string(response) {
        Ok(j) => j,
        Err(e) => {
            warn!("Error serializing response: {e}");
            return std::ptr::null();
        }
    };

    match CString::new(json) {
        Ok(c_str) => c_str.into_raw(),
        Err(e) => {
            warn!("Error creating CString: {e}");
            std::ptr::null()
        }
    }
}

/// Copies a C string argument, rejecting null pointers and invalid UTF-8.
fn c_ptr_to_string(ptr: *const c_char, field_name: &str) -> Result<String, AppResponse> {
    if ptr.is_null() {
        return Err(AppResponse::BadRequest(format!("Null {field_name} pointer")));
    }

    match unsafe { CStr::from_ptr(ptr).to_str() } {
        Ok(s) => Ok(s.to_string()),
        Err(e) => Err(AppResponse::BadRequest(format!(
            "Invalid UTF-8 in {field_name}: {e}"
        ))),
    }
}
