use serde::{Deserialize, Serialize};

use super::Coords;

/// Delivery lifecycle of an order.
///
/// The happy path is Placed → Preparing → Ready → Out_for_Delivery →
/// Delivered. Cancelled can be reached from any non-terminal status, Manual
/// marks a delivery that had to be resolved outside the app (reachable once a
/// driver could have been involved). Delivered, Cancelled and Manual are
/// terminal.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderStatus {
    Placed,
    Preparing,
    Ready,
    #[serde(rename = "Out_for_Delivery")]
    OutForDelivery,
    Delivered,
    Manual,
    Cancelled,
}

impl OrderStatus {
    /// Canonical wire representation, matching the stored value.
    pub fn as_str(self) -> &'static str {
        match self {
            OrderStatus::Placed => "Placed",
            OrderStatus::Preparing => "Preparing",
            OrderStatus::Ready => "Ready",
            OrderStatus::OutForDelivery => "Out_for_Delivery",
            OrderStatus::Delivered => "Delivered",
            OrderStatus::Manual => "Manual",
            OrderStatus::Cancelled => "Cancelled",
        }
    }

    /// Parse the canonical representation. Returns None for anything else,
    /// callers decide whether that is a validation or an argument error.
    pub fn parse(value: &str) -> Option<OrderStatus> {
        match value {
            "Placed" => Some(OrderStatus::Placed),
            "Preparing" => Some(OrderStatus::Preparing),
            "Ready" => Some(OrderStatus::Ready),
            "Out_for_Delivery" => Some(OrderStatus::OutForDelivery),
            "Delivered" => Some(OrderStatus::Delivered),
            "Manual" => Some(OrderStatus::Manual),
            "Cancelled" => Some(OrderStatus::Cancelled),
            _ => None,
        }
    }

    /// Parse the lowercase keyword form used by the restaurant app in query
    /// strings, e.g. "out_for_delivery".
    pub fn from_keyword(keyword: &str) -> Option<OrderStatus> {
        match keyword {
            "placed" => Some(OrderStatus::Placed),
            "preparing" => Some(OrderStatus::Preparing),
            "ready" => Some(OrderStatus::Ready),
            "out_for_delivery" => Some(OrderStatus::OutForDelivery),
            "delivered" => Some(OrderStatus::Delivered),
            "manual" => Some(OrderStatus::Manual),
            "cancelled" => Some(OrderStatus::Cancelled),
            _ => None,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            OrderStatus::Delivered | OrderStatus::Cancelled | OrderStatus::Manual
        )
    }

    /// Whether the state machine allows moving from `self` to `next`.
    pub fn can_transition_to(self, next: OrderStatus) -> bool {
        use OrderStatus::*;
        matches!(
            (self, next),
            (Placed, Preparing | Cancelled)
                | (Preparing, Ready | Cancelled)
                | (Ready, OutForDelivery | Manual | Cancelled)
                | (OutForDelivery, Delivered | Manual | Cancelled)
        )
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Payment state as reported by the payment collaborator.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentStatus {
    Pending,
    Completed,
    Failed,
}

impl PaymentStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            PaymentStatus::Pending => "Pending",
            PaymentStatus::Completed => "Completed",
            PaymentStatus::Failed => "Failed",
        }
    }

    pub fn parse(value: &str) -> Option<PaymentStatus> {
        match value {
            "Pending" => Some(PaymentStatus::Pending),
            "Completed" => Some(PaymentStatus::Completed),
            "Failed" => Some(PaymentStatus::Failed),
            _ => None,
        }
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An additive picked for a line item, normalized to this exact shape on
/// placement. Unknown client fields are dropped.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Additive {
    pub id: String,
    pub title: String,
    pub price: f64,
}

/// One line of an order. Immutable after placement, there are no item-level
/// edit operations.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
    pub food_id: String,
    pub quantity: u32,
    pub price: f64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub additives: Vec<Additive>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,
}

/// The central entity: one placed purchase linking a user, a restaurant,
/// line items and a delivery address.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: i64,
    pub user_id: String,
    pub order_items: Vec<OrderItem>,
    pub order_total: f64,
    pub delivery_fee: f64,
    pub grand_total: f64,
    pub delivery_address: String,
    pub restaurant_id: String,
    /// Absent until the assignment path binds a driver, then never rewritten.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub driver_id: Option<String>,
    pub payment_status: PaymentStatus,
    pub order_status: OrderStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_method: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rating: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub feedback: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub promo_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub discount_amount: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    /// Unix seconds, set at creation.
    pub order_date: i64,
}

/// Insert payload for the order repository. Everything the store needs,
/// already validated and normalized by the boundary.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub user_id: String,
    pub order_items: Vec<OrderItem>,
    pub order_total: f64,
    pub delivery_fee: f64,
    pub grand_total: f64,
    pub delivery_address: String,
    pub restaurant_id: String,
    pub payment_method: Option<String>,
    pub promo_code: Option<String>,
    pub discount_amount: Option<f64>,
    pub notes: Option<String>,
    pub order_date: i64,
}

/// Current unix time in seconds, the resolution `order_date` is stored at.
pub fn now_epoch() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

/// Subset of the user record inlined into populated order reads.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    pub name: String,
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile: Option<String>,
}

/// Subset of the restaurant record inlined into populated order reads.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct RestaurantSummary {
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time: Option<String>,
    pub coords: Coords,
}

/// Subset of the driver record inlined into populated order reads.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct DriverSummary {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

/// Subset of the address record inlined into populated order reads.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct AddressSummary {
    pub line1: String,
    pub city: String,
    pub district: String,
}

/// A line item joined with its catalog record.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct PopulatedItem {
    #[serde(flatten)]
    pub item: OrderItem,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub food: Option<super::Food>,
}

/// The populated/joined projection of an order.
///
/// Every read endpoint returns this one shape. Referenced records that have
/// not been synced from their owning service yet come back as None rather
/// than failing the read.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct OrderDetails {
    #[serde(flatten)]
    pub order: Order,
    pub items: Vec<PopulatedItem>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<UserSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub restaurant: Option<RestaurantSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub driver: Option<DriverSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<AddressSummary>,
}
