//! Record definitions for every table kept by the store.
//!
//! Each table is persisted as one JSON document, so these types are the
//! on-disk schema as much as they are the in-memory API. Field names are
//! serialized in camelCase (`joinDate`, `createdAt`, ...) and timestamps as
//! RFC 3339 UTC strings.
//!
//! Several records carry caller-defined fields next to the ones the store
//! understands (a booking's `date`, a favorite's `price`, a transaction's
//! `description`). Those land in a flattened [`Fields`] map and are written
//! back verbatim.

use std::fmt::{Display, Formatter};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

/// Arbitrary caller fields carried alongside a record's own fields.
pub type Fields = Map<String, JsonValue>;

/// Removes keys a record owns itself so flattened extras can never shadow them.
pub(crate) fn strip_reserved(mut fields: Fields, reserved: &[&str]) -> Fields {
    for key in reserved {
        fields.remove(*key);
    }
    fields
}

/// A registered account.
///
/// Users are created by first-time seeding or by
/// [`RecordStore::register`](crate::record_store::RecordStore::register)
/// and are never modified or deleted afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub name: String,
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub avatar: String,
    pub join_date: DateTime<Utc>,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub postal_code: String,
}

/// Why a login or signup was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuthFailure {
    InvalidCredentials,
    EmailAlreadyRegistered,
}

impl Display for AuthFailure {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthFailure::InvalidCredentials => write!(f, "Invalid email or password"),
            AuthFailure::EmailAlreadyRegistered => write!(f, "Email already registered"),
        }
    }
}

/// Result of [`authenticate`](crate::record_store::RecordStore::authenticate)
/// and [`register`](crate::record_store::RecordStore::register).
///
/// A rejection is an expected answer, not an error: storage failures still
/// travel through `Result<_, AppResponse>`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AuthOutcome {
    Authenticated(User),
    Rejected(AuthFailure),
}

impl AuthOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, AuthOutcome::Authenticated(_))
    }

    pub fn user(&self) -> Option<&User> {
        match self {
            AuthOutcome::Authenticated(user) => Some(user),
            AuthOutcome::Rejected(_) => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BookingStatus {
    Confirmed,
    Cancelled,
    Assigned,
}

impl BookingStatus {
    /// Confirmed and assigned bookings still need a visit.
    pub fn is_active(self) -> bool {
        matches!(self, BookingStatus::Confirmed | BookingStatus::Assigned)
    }
}

/// A booking request as the caller submits it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewBooking {
    /// Service name, e.g. `"Cleaning"`.
    pub service: String,
    /// Estimated arrival in minutes.
    pub eta: u32,
    #[serde(flatten)]
    pub extra: Fields,
}

impl NewBooking {
    pub fn new(service: impl Into<String>, eta: u32) -> Self {
        Self {
            service: service.into(),
            eta,
            extra: Fields::new(),
        }
    }

    pub fn with_field(mut self, key: impl Into<String>, value: JsonValue) -> Self {
        self.extra.insert(key.into(), value);
        self
    }
}

/// A stored booking.
///
/// Bookings are never physically deleted; cancellation is a status change.
/// `rating` is `0` until a review is attached; any number the caller
/// supplies is kept as given.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Booking {
    pub id: String,
    pub service: String,
    pub eta: u32,
    pub created_at: DateTime<Utc>,
    pub status: BookingStatus,
    #[serde(default)]
    pub rating: f64,
    #[serde(default)]
    pub review: String,
    #[serde(default)]
    pub reviewed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cancelled_at: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub extra: Fields,
}

pub(crate) const BOOKING_FIELDS: &[&str] = &[
    "id",
    "service",
    "eta",
    "createdAt",
    "status",
    "rating",
    "review",
    "reviewed",
    "cancelledAt",
    "completedAt",
];

/// Partial update merged into a [`Booking`] by
/// [`update_booking`](crate::record_store::RecordStore::update_booking).
///
/// `None` leaves a field alone. Unknown keys are merged into the booking's
/// extra fields; `id` and `createdAt` cannot be changed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub eta: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<BookingStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub review: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reviewed: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cancelled_at: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub extra: Fields,
}

impl BookingPatch {
    pub fn status(status: BookingStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    pub fn apply(self, booking: &mut Booking) {
        if let Some(service) = self.service {
            booking.service = service;
        }
        if let Some(eta) = self.eta {
            booking.eta = eta;
        }
        if let Some(status) = self.status {
            booking.status = status;
        }
        if let Some(rating) = self.rating {
            booking.rating = rating;
        }
        if let Some(review) = self.review {
            booking.review = review;
        }
        if let Some(reviewed) = self.reviewed {
            booking.reviewed = reviewed;
        }
        if let Some(cancelled_at) = self.cancelled_at {
            booking.cancelled_at = Some(cancelled_at);
        }
        booking
            .extra
            .extend(strip_reserved(self.extra, BOOKING_FIELDS));
    }
}

/// Snapshot of a booking taken when it was created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    #[serde(flatten)]
    pub booking: Booking,
    pub completed_at: DateTime<Utc>,
}

/// A service listing as shown to the user; `id` is the service id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceListing {
    pub id: String,
    #[serde(flatten)]
    pub fields: Fields,
}

impl ServiceListing {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            fields: Fields::new(),
        }
    }

    pub fn with_field(mut self, key: impl Into<String>, value: JsonValue) -> Self {
        self.fields.insert(key.into(), value);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Favorite {
    pub id: String,
    #[serde(flatten)]
    pub fields: Fields,
    pub favorited_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Review {
    pub id: String,
    pub booking_id: String,
    pub rating: f64,
    pub review: String,
    pub created_at: DateTime<Utc>,
}

fn enabled() -> bool {
    true
}

/// Notification and display flags. Updates replace the whole document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Preferences {
    #[serde(default = "enabled")]
    pub notifications: bool,
    #[serde(default = "enabled")]
    pub sms_alerts: bool,
    #[serde(default = "enabled")]
    pub email_updates: bool,
    #[serde(default = "enabled")]
    pub dark_mode: bool,
    #[serde(flatten)]
    pub extra: Fields,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            notifications: true,
            sms_alerts: true,
            email_updates: true,
            dark_mode: true,
            extra: Fields::new(),
        }
    }
}

/// A wallet movement as the caller submits it. Negative amounts are debits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewTransaction {
    pub amount: f64,
    #[serde(flatten)]
    pub details: Fields,
}

impl NewTransaction {
    pub fn new(amount: f64) -> Self {
        Self {
            amount,
            details: Fields::new(),
        }
    }

    pub fn with_field(mut self, key: impl Into<String>, value: JsonValue) -> Self {
        self.details.insert(key.into(), value);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: String,
    pub amount: f64,
    #[serde(flatten)]
    pub details: Fields,
    pub timestamp: DateTime<Utc>,
}

/// Running balance plus every transaction applied to it, newest first.
///
/// `balance` is updated incrementally on each transaction and is never
/// recomputed from `transactions`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Wallet {
    #[serde(default)]
    pub balance: f64,
    #[serde(default)]
    pub transactions: Vec<Transaction>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewPromo {
    pub code: String,
    #[serde(flatten)]
    pub fields: Fields,
}

impl NewPromo {
    pub fn new(code: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            fields: Fields::new(),
        }
    }

    pub fn with_field(mut self, key: impl Into<String>, value: JsonValue) -> Self {
        self.fields.insert(key.into(), value);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromoCode {
    pub code: String,
    #[serde(flatten)]
    pub fields: Fields,
    pub applied_at: DateTime<Utc>,
}

pub const GUEST_NAME: &str = "Guest";
pub const GUEST_EMAIL: &str = "user@example.com";

/// The simplified `user_data` profile kept for screens that only know a
/// display name and email.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub avatar: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub join_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub postal_code: String,
    #[serde(default)]
    pub preferences: Fields,
}

impl UserProfile {
    pub fn guest() -> Self {
        Self {
            name: GUEST_NAME.to_string(),
            email: GUEST_EMAIL.to_string(),
            phone: String::new(),
            avatar: String::new(),
            join_date: None,
            address: String::new(),
            city: String::new(),
            postal_code: String::new(),
            preferences: Fields::new(),
        }
    }
}

/// Input to [`set_user`](crate::record_store::RecordStore::set_user); every
/// missing field falls back to the guest profile's value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileUpdate {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub avatar: Option<String>,
    pub join_date: Option<DateTime<Utc>>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub postal_code: Option<String>,
    pub preferences: Option<Fields>,
}

/// Aggregate counters shown on the dashboard.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Statistics {
    pub total_bookings: usize,
    /// Length of the booking history.
    pub completed_services: usize,
    /// Bookings that are confirmed or assigned.
    pub active_bookings: usize,
    pub cancelled_bookings: usize,
    /// Mean review rating rounded to one decimal, `0.0` without reviews.
    pub average_rating: f64,
    pub favorite_count: usize,
    pub review_count: usize,
}
