use serde::de::DeserializeOwned;

use crate::api::{self, ApiResponse, PaymentUpdate, PlaceOrder, RateOrder, StatusUpdate};
use crate::auth::Principal;
use crate::database::Database;
use crate::domain::{now_epoch, OrderStatus, PaymentStatus};
use crate::errors::{Error, Result};
use crate::http::{Request, Response};
use crate::notify::Notifier;
use crate::routes::{params, HttpParams};

fn path_param<'a>(http_params: &'a HttpParams, key: &str) -> Result<&'a str> {
    http_params
        .get(key)
        .map(String::as_str)
        .ok_or_else(|| Error::InvalidArgument(format!("missing path parameter '{}'", key)))
}

fn order_id(http_params: &HttpParams) -> Result<i64> {
    path_param(http_params, params::ORDER_ID)?
        .parse::<i64>()
        .map_err(|_| Error::InvalidArgument("order id must be an integer".to_string()))
}

fn parse_body<T: DeserializeOwned>(request: &Request) -> Result<T> {
    serde_json::from_str(&request.body).map_err(|err| Error::Validation(err.to_string()))
}

fn order_status_param(http_params: &HttpParams) -> Result<OrderStatus> {
    let raw = path_param(http_params, params::STATUS)?;
    OrderStatus::parse(raw)
        .ok_or_else(|| Error::InvalidArgument(format!("unknown order status '{}'", raw)))
}

/// POST /api/orders
///
/// Place an order for the authenticated user. The totals are taken as sent
/// by the client app, only their sign is checked.
pub fn place_order(
    request: Request,
    _http_params: HttpParams,
    principal: Principal,
    db: &mut dyn Database,
    _notifier: &dyn Notifier,
) -> Result<Response> {
    let body: PlaceOrder = parse_body(&request)?;
    for item in &body.order_items {
        if item.quantity == 0 {
            return Err(Error::Validation(format!(
                "quantity for food {} must be positive",
                item.food_id
            )));
        }
    }
    for (field, value) in [
        ("orderTotal", body.order_total),
        ("deliveryFee", body.delivery_fee),
        ("grandTotal", body.grand_total),
    ] {
        if value < 0.0 {
            return Err(Error::Validation(format!("{} must not be negative", field)));
        }
    }

    let order = db.insert_order(body.into_new_order(principal.id, now_epoch()))?;
    api::json_response(201, &ApiResponse::ok_with_message("order placed", &order)?)
}

/// GET /api/orders/{order_id}
pub fn get_order_details(
    _request: Request,
    http_params: HttpParams,
    _principal: Principal,
    db: &mut dyn Database,
    _notifier: &dyn Notifier,
) -> Result<Response> {
    let details = db.get_order_details(order_id(&http_params)?)?;
    api::json_response(200, &ApiResponse::ok(&details)?)
}

/// DELETE /api/orders/{order_id}
///
/// Unconditional delete, no ownership or status check.
pub fn delete_order(
    _request: Request,
    http_params: HttpParams,
    _principal: Principal,
    db: &mut dyn Database,
    _notifier: &dyn Notifier,
) -> Result<Response> {
    let id = order_id(&http_params)?;
    if !db.delete_order(id)? {
        return Err(Error::NotFound(format!("no order with id {}", id)));
    }
    api::json_response(200, &ApiResponse::message("order deleted"))
}

/// GET /api/orders/userOrders
pub fn user_orders(
    _request: Request,
    _http_params: HttpParams,
    principal: Principal,
    db: &mut dyn Database,
    _notifier: &dyn Notifier,
) -> Result<Response> {
    let orders = db.user_orders(&principal.id)?;
    api::json_response(200, &ApiResponse::ok(&orders)?)
}

/// POST /api/orders/rate/{order_id}
pub fn rate_order(
    request: Request,
    http_params: HttpParams,
    _principal: Principal,
    db: &mut dyn Database,
    _notifier: &dyn Notifier,
) -> Result<Response> {
    let body: RateOrder = parse_body(&request)?;
    if !(1..=5).contains(&body.rating) {
        return Err(Error::Validation("rating must be between 1 and 5".to_string()));
    }
    let order = db.rate_order(order_id(&http_params)?, body.rating, body.feedback)?;
    api::json_response(200, &ApiResponse::ok_with_message("rating saved", &order)?)
}

/// POST /api/orders/status/{order_id}
///
/// Direct status write, used by back-office tooling. The closed enum is the
/// only check applied.
pub fn update_order_status(
    request: Request,
    http_params: HttpParams,
    _principal: Principal,
    db: &mut dyn Database,
    _notifier: &dyn Notifier,
) -> Result<Response> {
    let body: StatusUpdate = parse_body(&request)?;
    let status = OrderStatus::parse(&body.order_status).ok_or_else(|| {
        Error::Validation(format!("unknown order status '{}'", body.order_status))
    })?;
    let order = db.set_order_status(order_id(&http_params)?, status)?;
    api::json_response(200, &ApiResponse::ok_with_message("status updated", &order)?)
}

/// POST /api/orders/payment-status/{order_id}
pub fn update_payment_status(
    request: Request,
    http_params: HttpParams,
    _principal: Principal,
    db: &mut dyn Database,
    _notifier: &dyn Notifier,
) -> Result<Response> {
    let body: PaymentUpdate = parse_body(&request)?;
    let status = PaymentStatus::parse(&body.payment_status).ok_or_else(|| {
        Error::Validation(format!("unknown payment status '{}'", body.payment_status))
    })?;
    let order = db.set_payment_status(order_id(&http_params)?, status)?;
    api::json_response(
        200,
        &ApiResponse::ok_with_message("payment status updated", &order)?,
    )
}

/// GET /api/orders/orderslist/{restaurant_id}?status=keyword
///
/// A restaurant's queue. The status keyword comes from the restaurant app in
/// its lowercase form; anything unknown is rejected rather than silently
/// matching nothing.
pub fn restaurant_orders(
    request: Request,
    http_params: HttpParams,
    _principal: Principal,
    db: &mut dyn Database,
    _notifier: &dyn Notifier,
) -> Result<Response> {
    let restaurant_id = path_param(&http_params, params::RESTAURANT_ID)?;
    let keyword = request
        .query_param("status")
        .ok_or_else(|| Error::InvalidArgument("missing status query parameter".to_string()))?;
    let status = OrderStatus::from_keyword(keyword)
        .ok_or_else(|| Error::InvalidArgument(format!("unknown status keyword '{}'", keyword)))?;
    let orders = db.restaurant_orders(restaurant_id, status)?;
    api::json_response(200, &ApiResponse::ok(&orders)?)
}

/// GET /api/orders/delivery/{status}
///
/// The pickup feed: paid orders with the exact given status. The distance
/// cut happens in the driver app against the maps provider, not here.
pub fn nearby_orders(
    _request: Request,
    http_params: HttpParams,
    _principal: Principal,
    db: &mut dyn Database,
    _notifier: &dyn Notifier,
) -> Result<Response> {
    let status = order_status_param(&http_params)?;
    let orders = db.orders_by_status(status)?;
    api::json_response(200, &ApiResponse::ok(&orders)?)
}

/// PUT /api/orders/process/{order_id}/{status}
///
/// Move an order along the state machine and tell the consumer, in that
/// order: the notification fires only after the write went through, and a
/// notification failure never surfaces to the caller.
pub fn process_order(
    _request: Request,
    http_params: HttpParams,
    _principal: Principal,
    db: &mut dyn Database,
    notifier: &dyn Notifier,
) -> Result<Response> {
    let id = order_id(&http_params)?;
    let raw = path_param(&http_params, params::STATUS)?;
    let status = OrderStatus::parse(raw)
        .ok_or_else(|| Error::Validation(format!("unknown order status '{}'", raw)))?;

    let details = db.transition_order(id, status)?;
    notifier.notify_user(
        &details.order.user_id,
        "Order update",
        &format!("Your order is now {}", status),
    );
    api::json_response(200, &ApiResponse::ok(&details)?)
}

/// PUT /api/orders/picked-orders/{order_id}/{driver_id}
///
/// A driver claims an order. The claim is conditional in the store, so of
/// two racing drivers exactly one wins and the other gets a conflict.
pub fn add_driver(
    _request: Request,
    http_params: HttpParams,
    _principal: Principal,
    db: &mut dyn Database,
    _notifier: &dyn Notifier,
) -> Result<Response> {
    let id = order_id(&http_params)?;
    let driver_id = path_param(&http_params, params::DRIVER_ID)?;
    let details = db.assign_driver(id, driver_id)?;
    api::json_response(200, &ApiResponse::ok(&details)?)
}

/// GET /api/orders/picked/{status}/{driver_id}
pub fn picked_orders(
    _request: Request,
    http_params: HttpParams,
    _principal: Principal,
    db: &mut dyn Database,
    _notifier: &dyn Notifier,
) -> Result<Response> {
    const QUEUE_STATUSES: [OrderStatus; 4] = [
        OrderStatus::OutForDelivery,
        OrderStatus::Delivered,
        OrderStatus::Manual,
        OrderStatus::Cancelled,
    ];

    let status = order_status_param(&http_params)?;
    if !QUEUE_STATUSES.contains(&status) {
        return Err(Error::InvalidArgument(format!(
            "'{}' is not a driver queue status",
            status
        )));
    }
    let driver_id = path_param(&http_params, params::DRIVER_ID)?;
    let orders = db.picked_orders(driver_id, status)?;
    api::json_response(200, &ApiResponse::ok(&orders)?)
}

/// PUT /api/orders/delivered/{order_id}
///
/// Complete a delivery as the authenticated driver. The store settles the
/// order and the earnings in one transaction; the consumer is told after it
/// commits.
pub fn mark_delivered(
    _request: Request,
    http_params: HttpParams,
    principal: Principal,
    db: &mut dyn Database,
    notifier: &dyn Notifier,
) -> Result<Response> {
    let id = order_id(&http_params)?;
    let details = db.settle_delivery(id, &principal.id)?;
    notifier.notify_user(
        &details.order.user_id,
        "Order delivered",
        "Your order has been delivered, enjoy!",
    );
    api::json_response(200, &ApiResponse::ok(&details)?)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::auth::StaticIdentity;
    use crate::database::mock::MockDB;
    use crate::domain::{Address, Coords, Driver, Food, Restaurant, User};
    use crate::notify::LogNotifier;
    use crate::routes;

    struct TestApp {
        router: routes::HttpRouter,
        identity: StaticIdentity,
        db: MockDB,
        notifier: LogNotifier,
    }

    /// A mock-backed application with the dev tokens and one restaurant,
    /// driver, user, food and address synced in. The driver record is owned
    /// by the dev-driver user so settlement credits it.
    fn test_app() -> TestApp {
        let mut db = MockDB::new().unwrap();
        db.put_user(&User {
            id: "dev-client-user".to_string(),
            name: "Ada".to_string(),
            email: "ada@example.com".to_string(),
            phone: None,
            profile: None,
        })
        .unwrap();
        db.put_address(&Address {
            id: "a1".to_string(),
            line1: "1 rue de la Paix".to_string(),
            city: "Paris".to_string(),
            district: "2e".to_string(),
            postal_code: None,
        })
        .unwrap();
        db.put_food(&Food {
            id: "f1".to_string(),
            title: "Margherita".to_string(),
            image: None,
            time: None,
        })
        .unwrap();
        db.put_restaurant(&Restaurant {
            id: "r1".to_string(),
            title: "Da Mario".to_string(),
            image: None,
            time: None,
            coords: Coords {
                latitude: 48.87,
                longitude: 2.33,
                address: None,
            },
            is_available: true,
            earnings: 0.0,
        })
        .unwrap();
        db.put_driver(&Driver {
            id: "d1".to_string(),
            user_id: "dev-driver-user".to_string(),
            name: Some("Marco".to_string()),
            phone: None,
            is_available: true,
            current_location: None,
            total_deliveries: 0,
            total_earnings: 0.0,
        })
        .unwrap();

        TestApp {
            router: routes::create_http_router().unwrap(),
            identity: StaticIdentity::dev_tokens(),
            db,
            notifier: LogNotifier,
        }
    }

    impl TestApp {
        fn call(&mut self, request: Request) -> Result<Response> {
            self.router
                .route(request, &self.identity, &mut self.db, &self.notifier)
        }

        fn data(response: &Response) -> serde_json::Value {
            let envelope: serde_json::Value = serde_json::from_str(&response.body).unwrap();
            assert_eq!(envelope["status"], serde_json::Value::Bool(true));
            envelope["data"].clone()
        }
    }

    const PLACE_BODY: &str = r#"{
        "orderItems": [{
            "foodId": "f1",
            "quantity": 2,
            "price": 10.0,
            "additives": [{"id": "a1", "title": "Cheese", "price": 1.0}]
        }],
        "orderTotal": 20.0,
        "deliveryFee": 2.0,
        "grandTotal": 22.0,
        "deliveryAddress": "a1",
        "restaurantId": "r1"
    }"#;

    fn place(app: &mut TestApp) -> i64 {
        let response = app
            .call(Request::post(routes::paths::ORDERS, PLACE_BODY.to_string()).with_bearer("dev-client"))
            .unwrap();
        assert_eq!(response.status, Some(201));
        TestApp::data(&response)["id"].as_i64().unwrap()
    }

    #[test]
    fn test_full_delivery_scenario() {
        let mut app = test_app();
        let id = place(&mut app);

        // the restaurant works the order through its queue
        for status in ["Preparing", "Ready"] {
            let response = app
                .call(
                    Request::put(&routes::process_order(id, status), "".to_string())
                        .with_bearer("dev-vendor"),
                )
                .unwrap();
            assert_eq!(response.status, Some(200));
        }

        // a driver claims it
        let response = app
            .call(Request::put(&routes::add_driver(id, "d1"), "".to_string()).with_bearer("dev-driver"))
            .unwrap();
        let data = TestApp::data(&response);
        assert_eq!(data["orderStatus"], "Out_for_Delivery");
        assert_eq!(data["driverId"], "d1");

        // and completes the delivery
        let response = app
            .call(Request::put(&routes::mark_delivered(id), "".to_string()).with_bearer("dev-driver"))
            .unwrap();
        assert_eq!(TestApp::data(&response)["orderStatus"], "Delivered");

        assert_eq!(app.db.get_restaurant("r1").unwrap().earnings, 20.0);
        let driver = app.db.get_driver_by_user("dev-driver-user").unwrap().unwrap();
        assert_eq!(driver.total_deliveries, 1);
        assert_eq!(driver.total_earnings, 2.0);

        // the consumer can now rate it, once
        let response = app
            .call(
                Request::post(&routes::rate_order(id), r#"{"rating": 5}"#.to_string())
                    .with_bearer("dev-client"),
            )
            .unwrap();
        assert_eq!(response.status, Some(200));
        assert!(matches!(
            app.call(
                Request::post(&routes::rate_order(id), r#"{"rating": 4}"#.to_string())
                    .with_bearer("dev-client")
            ),
            Err(Error::Conflict(_))
        ));
    }

    #[test]
    fn test_placement_defaults_and_details() {
        let mut app = test_app();
        let id = place(&mut app);

        let response = app
            .call(Request::get(&routes::order_by_id(id)).with_bearer("dev-client"))
            .unwrap();
        let data = TestApp::data(&response);
        assert_eq!(data["orderStatus"], "Placed");
        assert_eq!(data["paymentStatus"], "Pending");
        assert!(data.get("driverId").is_none());
        assert_eq!(data["restaurant"]["title"], "Da Mario");
        assert_eq!(data["address"]["city"], "Paris");
        // items round-trip with their normalized additives
        assert_eq!(data["items"][0]["quantity"], 2);
        assert_eq!(data["items"][0]["additives"][0]["title"], "Cheese");
        assert_eq!(data["items"][0]["food"]["title"], "Margherita");
    }

    #[test]
    fn test_placement_rejects_bad_input() {
        let mut app = test_app();

        // missing grandTotal
        let body = r#"{
            "orderItems": [{"foodId": "f1", "quantity": 1, "price": 10.0}],
            "orderTotal": 10.0, "deliveryFee": 2.0,
            "deliveryAddress": "a1", "restaurantId": "r1"
        }"#;
        assert!(matches!(
            app.call(Request::post(routes::paths::ORDERS, body.to_string()).with_bearer("dev-client")),
            Err(Error::Validation(_))
        ));

        // zero quantity
        let body = PLACE_BODY.replace("\"quantity\": 2", "\"quantity\": 0");
        assert!(matches!(
            app.call(Request::post(routes::paths::ORDERS, body).with_bearer("dev-client")),
            Err(Error::Validation(_))
        ));

        // only clients place orders
        assert!(matches!(
            app.call(
                Request::post(routes::paths::ORDERS, PLACE_BODY.to_string()).with_bearer("dev-vendor")
            ),
            Err(Error::Forbidden(_))
        ));
    }

    #[test]
    fn test_process_order_rejections() {
        let mut app = test_app();
        let id = place(&mut app);

        assert!(matches!(
            app.call(
                Request::put(&routes::process_order(id, "Cooking"), "".to_string())
                    .with_bearer("dev-vendor")
            ),
            Err(Error::Validation(_))
        ));
        assert!(matches!(
            app.call(
                Request::put(&routes::process_order(id, "Delivered"), "".to_string())
                    .with_bearer("dev-vendor")
            ),
            Err(Error::Conflict(_))
        ));
        assert!(matches!(
            app.call(
                Request::put(&routes::process_order(999, "Preparing"), "".to_string())
                    .with_bearer("dev-vendor")
            ),
            Err(Error::NotFound(_))
        ));
    }

    #[test]
    fn test_assignment_conflict_over_http() {
        let mut app = test_app();
        let id = place(&mut app);
        for status in ["Preparing", "Ready"] {
            app.call(
                Request::put(&routes::process_order(id, status), "".to_string())
                    .with_bearer("dev-vendor"),
            )
            .unwrap();
        }

        app.call(Request::put(&routes::add_driver(id, "d1"), "".to_string()).with_bearer("dev-driver"))
            .unwrap();
        assert!(matches!(
            app.call(
                Request::put(&routes::add_driver(id, "d2"), "".to_string()).with_bearer("dev-driver")
            ),
            Err(Error::Conflict(_))
        ));
    }

    #[test]
    fn test_queues_and_keywords() {
        let mut app = test_app();
        let id = place(&mut app);

        // the fresh order shows up in the restaurant queue under "placed"
        let response = app
            .call(Request::get(&routes::restaurant_orders("r1", "placed")).with_bearer("dev-vendor"))
            .unwrap();
        let data = TestApp::data(&response);
        assert_eq!(data.as_array().unwrap().len(), 1);
        assert_eq!(data[0]["id"].as_i64(), Some(id));

        // unknown keywords fail closed instead of matching nothing
        assert!(matches!(
            app.call(
                Request::get(&routes::restaurant_orders("r1", "bogus")).with_bearer("dev-vendor")
            ),
            Err(Error::InvalidArgument(_))
        ));
        assert!(matches!(
            app.call(Request::get(&routes::restaurant_orders("r1", "")).with_bearer("dev-vendor")),
            Err(Error::InvalidArgument(_))
        ));

        // the pickup feed only lists paid orders
        let response = app
            .call(Request::get(&routes::nearby_orders("Placed")).with_bearer("dev-driver"))
            .unwrap();
        assert!(TestApp::data(&response).as_array().unwrap().is_empty());
        app.call(
            Request::post(
                &routes::payment_status(id),
                r#"{"paymentStatus": "Completed"}"#.to_string(),
            )
            .with_bearer("dev-admin"),
        )
        .unwrap();
        let response = app
            .call(Request::get(&routes::nearby_orders("Placed")).with_bearer("dev-driver"))
            .unwrap();
        assert_eq!(TestApp::data(&response).as_array().unwrap().len(), 1);

        // a driver queue only accepts its four statuses
        assert!(matches!(
            app.call(Request::get(&routes::picked_orders("Placed", "d1")).with_bearer("dev-driver")),
            Err(Error::InvalidArgument(_))
        ));
        let response = app
            .call(
                Request::get(&routes::picked_orders("Out_for_Delivery", "d1"))
                    .with_bearer("dev-driver"),
            )
            .unwrap();
        assert!(TestApp::data(&response).as_array().unwrap().is_empty());
    }

    #[test]
    fn test_user_orders_are_scoped_to_the_caller() {
        let mut app = test_app();
        place(&mut app);
        place(&mut app);

        let response = app
            .call(Request::get(routes::paths::USER_ORDERS).with_bearer("dev-client"))
            .unwrap();
        assert_eq!(TestApp::data(&response).as_array().unwrap().len(), 2);

        // another principal sees nothing
        let response = app
            .call(Request::get(routes::paths::USER_ORDERS).with_bearer("dev-driver"))
            .unwrap();
        assert!(TestApp::data(&response).as_array().unwrap().is_empty());
    }

    #[test]
    fn test_delete_order() {
        let mut app = test_app();
        let id = place(&mut app);

        let response = app
            .call(Request::delete(&routes::order_by_id(id), "".to_string()).with_bearer("dev-client"))
            .unwrap();
        assert_eq!(response.status, Some(200));
        assert!(matches!(
            app.call(Request::delete(&routes::order_by_id(id), "".to_string()).with_bearer("dev-client")),
            Err(Error::NotFound(_))
        ));
    }

    #[test]
    fn test_bad_order_id_is_invalid_argument() {
        let mut app = test_app();
        assert!(matches!(
            app.call(Request::get("/api/orders/not-a-number").with_bearer("dev-client")),
            Err(Error::InvalidArgument(_))
        ));
    }
}
