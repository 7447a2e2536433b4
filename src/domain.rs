use serde::{Deserialize, Serialize};

pub mod order;
pub use order::*;

/// A geographic position with its human-readable address.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Coords {
    pub latitude: f64,
    pub longitude: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
}

/// User record, owned by the identity service and mirrored here for
/// populated order reads.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    /// Avatar URL
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile: Option<String>,
}

/// Delivery address record, owned by the address service.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Address {
    pub id: String,
    pub line1: String,
    pub city: String,
    pub district: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub postal_code: Option<String>,
}

/// Food record, owned by the catalog service. Joined into populated order
/// reads so the apps can render line items without a second round trip.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Food {
    pub id: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    /// Preparation time as displayed by the apps, e.g. "20 min"
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time: Option<String>,
}

/// Restaurant record, owned by the catalog service.
///
/// `earnings` is the one field this core mutates: the settlement path credits
/// it with the order total of every delivered order. It never decreases.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Restaurant {
    pub id: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time: Option<String>,
    pub coords: Coords,
    pub is_available: bool,
    pub earnings: f64,
}

/// Driver record, owned by the identity service.
///
/// `total_deliveries` and `total_earnings` are mutated by the settlement path
/// only, as atomic increments. Both are monotonically non-decreasing.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Driver {
    pub id: String,
    /// Id of the user account the driver signs in with.
    pub user_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    pub is_available: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_location: Option<Coords>,
    pub total_deliveries: u32,
    pub total_earnings: f64,
}
