// This file contains the types used to communicate through the API
use serde::{Deserialize, Serialize};

use crate::domain::{Additive, NewOrder, OrderItem};
use crate::errors::{Error, Result};
use crate::http::Response;

/// Body of a place-order request.
///
/// The monetary fields are trusted client input, the server does not
/// recompute them from the items. Missing required fields fail
/// deserialization, which the handler reports as a validation error.
#[derive(Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct PlaceOrder {
    pub order_items: Vec<NewOrderItem>,
    pub order_total: f64,
    pub delivery_fee: f64,
    pub grand_total: f64,
    pub delivery_address: String,
    pub restaurant_id: String,
    #[serde(default)]
    pub payment_method: Option<String>,
    #[serde(default)]
    pub promo_code: Option<String>,
    #[serde(default)]
    pub discount_amount: Option<f64>,
    #[serde(default)]
    pub notes: Option<String>,
}

/// One line item as sent by the client app.
#[derive(Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct NewOrderItem {
    pub food_id: String,
    pub quantity: u32,
    pub price: f64,
    /// Deserializing through [`Additive`] trims each entry down to
    /// {id, title, price}; whatever else the client attached is dropped.
    #[serde(default)]
    pub additives: Vec<Additive>,
    #[serde(default)]
    pub instructions: Option<String>,
}

impl From<NewOrderItem> for OrderItem {
    fn from(item: NewOrderItem) -> OrderItem {
        OrderItem {
            food_id: item.food_id,
            quantity: item.quantity,
            price: item.price,
            additives: item.additives,
            instructions: item.instructions,
        }
    }
}

impl PlaceOrder {
    /// Turn the request body into an insert payload for the repository.
    pub fn into_new_order(self, user_id: String, order_date: i64) -> NewOrder {
        NewOrder {
            user_id,
            order_items: self.order_items.into_iter().map(OrderItem::from).collect(),
            order_total: self.order_total,
            delivery_fee: self.delivery_fee,
            grand_total: self.grand_total,
            delivery_address: self.delivery_address,
            restaurant_id: self.restaurant_id,
            payment_method: self.payment_method,
            promo_code: self.promo_code,
            discount_amount: self.discount_amount,
            notes: self.notes,
            order_date,
        }
    }
}

/// Body of a rate-order request.
#[derive(Serialize, Deserialize, Debug)]
pub struct RateOrder {
    pub rating: u8,
    #[serde(default)]
    pub feedback: Option<String>,
}

/// Body of a direct order-status write.
#[derive(Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct StatusUpdate {
    pub order_status: String,
}

/// Body of a direct payment-status write.
#[derive(Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct PaymentUpdate {
    pub payment_status: String,
}

/// The response envelope every endpoint answers with.
#[derive(Serialize, Deserialize, Debug)]
pub struct ApiResponse {
    pub status: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ApiResponse {
    /// A successful envelope carrying `data`.
    pub fn ok<T: Serialize>(data: &T) -> Result<ApiResponse> {
        Ok(ApiResponse {
            status: true,
            message: None,
            data: Some(to_value(data)?),
            error: None,
        })
    }

    /// A successful envelope carrying a message and `data`.
    pub fn ok_with_message<T: Serialize>(message: &str, data: &T) -> Result<ApiResponse> {
        Ok(ApiResponse {
            status: true,
            message: Some(message.to_string()),
            data: Some(to_value(data)?),
            error: None,
        })
    }

    /// A successful envelope carrying only a message.
    pub fn message(message: &str) -> ApiResponse {
        ApiResponse {
            status: true,
            message: Some(message.to_string()),
            data: None,
            error: None,
        }
    }

    /// The failure envelope for an error, carrying its public message.
    pub fn failure(err: &Error) -> ApiResponse {
        ApiResponse {
            status: false,
            message: None,
            data: None,
            error: Some(err.public_message()),
        }
    }
}

fn to_value<T: Serialize>(data: &T) -> Result<serde_json::Value> {
    serde_json::to_value(data).map_err(|err| Error::Internal(err.to_string()))
}

/// Serialize an envelope into a JSON response with the given status code.
pub fn json_response(code: u16, envelope: &ApiResponse) -> Result<Response> {
    let body = serde_json::to_string(envelope).map_err(|err| Error::Internal(err.to_string()))?;
    Ok(Response::json(code, body))
}

/// The response for a failed request. Infallible so the server layer can
/// always answer something.
pub fn error_response(err: &Error) -> Response {
    let envelope = ApiResponse::failure(err);
    match serde_json::to_string(&envelope) {
        Ok(body) => Response::json(err.status_code(), body),
        Err(_) => Response::error(500),
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_place_order_requires_totals() {
        // grandTotal missing
        let body = r#"{
            "orderItems": [{"foodId": "f1", "quantity": 1, "price": 10.0}],
            "orderTotal": 10.0,
            "deliveryFee": 2.0,
            "deliveryAddress": "a1",
            "restaurantId": "r1"
        }"#;
        assert!(serde_json::from_str::<PlaceOrder>(body).is_err());
    }

    #[test]
    fn test_place_order_normalizes_additives() {
        let body = r#"{
            "orderItems": [{
                "foodId": "f1",
                "quantity": 2,
                "price": 10.0,
                "additives": [{"id": "a1", "title": "Cheese", "price": 1.0, "isChecked": true}]
            }],
            "orderTotal": 21.0,
            "deliveryFee": 2.0,
            "grandTotal": 23.0,
            "deliveryAddress": "a1",
            "restaurantId": "r1"
        }"#;
        let parsed: PlaceOrder = serde_json::from_str(body).unwrap();
        let additives = &parsed.order_items[0].additives;
        assert_eq!(additives.len(), 1);
        assert_eq!(additives[0].title, "Cheese");
        let json = serde_json::to_string(&parsed).unwrap();
        assert!(!json.contains("isChecked"));
    }

    #[test]
    fn test_error_envelope_shape() {
        let err = Error::NotFound("no order with id 7".to_string());
        let resp = error_response(&err);
        assert_eq!(resp.status, Some(404));
        let envelope: ApiResponse = serde_json::from_str(&resp.body).unwrap();
        assert!(!envelope.status);
        assert!(envelope.error.unwrap().contains("no order with id 7"));
    }
}
