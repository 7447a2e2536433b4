use std::collections::HashMap;

use matchit::Router;

use crate::auth::{role_permits, Identity, Principal, Role};
use crate::database::Database;
use crate::endpoints;
use crate::errors::{Error, Result};
use crate::http::{Request, Response};
use crate::notify::Notifier;

/// Utility macro generating a constant for the HTTP endpoint, and associate
/// it with an identifier. Matchit requires both
macro_rules! make_paths {
        ($($name:ident: $path:expr,)*) => {

        pub mod paths {
                    $(
                        pub const $name: &str = concat!("/api", $path);
                    )*
        }
        pub mod endpoint_names {
            $(
                pub const $name: &str = stringify!($name);
            )*
        }

        }
    }

make_paths! {
    ORDERS: "/orders",
    USER_ORDERS: "/orders/userOrders",
    ORDER_BY_ID: "/orders/{order_id}",
    RATE_ORDER: "/orders/rate/{order_id}",
    ORDER_STATUS: "/orders/status/{order_id}",
    PAYMENT_STATUS: "/orders/payment-status/{order_id}",
    RESTAURANT_ORDERS: "/orders/orderslist/{restaurant_id}",
    NEARBY_ORDERS: "/orders/delivery/{status}",
    PROCESS_ORDER: "/orders/process/{order_id}/{status}",
    ADD_DRIVER: "/orders/picked-orders/{order_id}/{driver_id}",
    PICKED_ORDERS: "/orders/picked/{status}/{driver_id}",
    MARK_DELIVERED: "/orders/delivered/{order_id}",
}

/// Utility to add a list of paths to the router automatically
macro_rules! add_path{
    ($router:ident $(, $path:ident)*) => {
        $(
            $router.insert(paths::$path, endpoint_names::$path)?;
        )*
    }
}

/// Names of the parameters in the HTTP paths, used to extract them
/// from the parameters inside of request handling
pub mod params {
    /// Key of order ids in HTTP paths
    pub const ORDER_ID: &str = "order_id";

    /// Key of restaurant ids in HTTP paths
    pub const RESTAURANT_ID: &str = "restaurant_id";

    /// Key of driver ids in HTTP paths
    pub const DRIVER_ID: &str = "driver_id";

    /// Key of order statuses in HTTP paths
    pub const STATUS: &str = "status";
}

/// Return the HTTP path for an order based on its id
pub fn order_by_id(order_id: i64) -> String {
    paths::ORDER_BY_ID.replace("{order_id}", &order_id.to_string())
}

/// Return the HTTP path rating an order
pub fn rate_order(order_id: i64) -> String {
    paths::RATE_ORDER.replace("{order_id}", &order_id.to_string())
}

/// Return the HTTP path for a direct status write
pub fn order_status(order_id: i64) -> String {
    paths::ORDER_STATUS.replace("{order_id}", &order_id.to_string())
}

/// Return the HTTP path for a direct payment-status write
pub fn payment_status(order_id: i64) -> String {
    paths::PAYMENT_STATUS.replace("{order_id}", &order_id.to_string())
}

/// Return the HTTP path for a restaurant's queue filtered by status keyword
pub fn restaurant_orders(restaurant_id: &str, keyword: &str) -> String {
    format!(
        "{}?status={}",
        paths::RESTAURANT_ORDERS.replace("{restaurant_id}", restaurant_id),
        keyword
    )
}

/// Return the HTTP path for the pickup feed of one status
pub fn nearby_orders(status: &str) -> String {
    paths::NEARBY_ORDERS.replace("{status}", status)
}

/// Return the HTTP path for a state-machine transition
pub fn process_order(order_id: i64, status: &str) -> String {
    paths::PROCESS_ORDER
        .replace("{order_id}", &order_id.to_string())
        .replace("{status}", status)
}

/// Return the HTTP path claiming an order for a driver
pub fn add_driver(order_id: i64, driver_id: &str) -> String {
    paths::ADD_DRIVER
        .replace("{order_id}", &order_id.to_string())
        .replace("{driver_id}", driver_id)
}

/// Return the HTTP path for a driver's queue of one status
pub fn picked_orders(status: &str, driver_id: &str) -> String {
    paths::PICKED_ORDERS
        .replace("{status}", status)
        .replace("{driver_id}", driver_id)
}

/// Return the HTTP path completing a delivery
pub fn mark_delivered(order_id: i64) -> String {
    paths::MARK_DELIVERED.replace("{order_id}", &order_id.to_string())
}

// spurious warning, I am using this in tests
#[allow(unused_macros)]
/// Utility to create easily hashmaps of parameters for testing
macro_rules! make_params {
    () => {
        std::collections::HashMap::new()
    };
    ($name:ident: $value:expr $(, $name2:ident: $value2:expr)* ) => {
        {
            let mut map = std::collections::HashMap::new();
            map.insert($crate::routes::params::$name.to_string(), $value.to_string());
            $(
                map.insert($crate::routes::params::$name2.to_string(), $value2.to_string());
            )*
            map
        }
        }
    }

#[allow(unused_imports)]
pub(crate) use make_params;

/// Create a new router with the paths defined in this module
///
/// Errors from this function are programming errors, most likely stemming
/// from a misuse of matchit
fn new_router() -> Result<Router<&'static str>> {
    let mut router = Router::new();
    add_path!(
        router,
        ORDERS,
        USER_ORDERS,
        ORDER_BY_ID,
        RATE_ORDER,
        ORDER_STATUS,
        PAYMENT_STATUS,
        RESTAURANT_ORDERS,
        NEARBY_ORDERS,
        PROCESS_ORDER,
        ADD_DRIVER,
        PICKED_ORDERS,
        MARK_DELIVERED
    );
    Ok(router)
}

impl From<matchit::InsertError> for Error {
    fn from(err: matchit::InsertError) -> Error {
        Error::Internal(err.to_string())
    }
}

/// Type of the object containing the HTTP path parameters passed to handlers
pub type HttpParams = HashMap<String, String>;
/// Type of the function that handles HTTP requests
pub type HttpHandler =
    fn(Request, HttpParams, Principal, &mut dyn Database, &dyn Notifier) -> Result<Response>;

/// A handler together with the roles allowed to call it. An empty role list
/// means any authenticated caller; Admin passes every guard.
struct RouteEntry {
    roles: &'static [Role],
    handler: HttpHandler,
}

/// The router is in charge of taking in raw HTTP requests, authenticating
/// them and dispatching them to the appropriate handler function.
pub struct HttpRouter {
    routes: Router<&'static str>,
    handlers: HashMap<&'static str, HashMap<&'static str, RouteEntry>>,
}

impl HttpRouter {
    /// Creates a new empty router
    ///
    /// Although the matchit router is not empty, there are no methods
    /// associated to the routes yet, so no request can be processed.
    /// Errors in this function are programming errors.
    pub fn new() -> Result<Self> {
        let routes = new_router()?;
        Ok(HttpRouter {
            routes,
            handlers: HashMap::new(),
        })
    }

    /// Add a new route to the router, guarded by the given roles
    pub fn add_route(
        &mut self,
        method: &'static str,
        route: &'static str,
        roles: &'static [Role],
        handler: HttpHandler,
    ) {
        let method_to_handler = self.handlers.entry(route).or_default();
        method_to_handler.insert(method, RouteEntry { roles, handler });
    }

    /// Authenticate a request and send it to the appropriate handler.
    ///
    /// The route is matched on the path without its query string. An unknown
    /// path or method is NotFound, a missing or unknown bearer token is
    /// Unauthorized, a caller whose role is not allowed on the route is
    /// Forbidden. Checking path parameters and the body is the
    /// responsibility of the handler.
    pub fn route(
        &self,
        request: Request,
        identity: &dyn Identity,
        db: &mut dyn Database,
        notifier: &dyn Notifier,
    ) -> Result<Response> {
        let route = self
            .routes
            .at(request.route_path())
            .map_err(|err| Error::NotFound(err.to_string()))?;
        let method_to_handler = self.handlers.get(route.value).ok_or_else(|| {
            Error::NotFound(format!(
                "No method associated to this route: {}",
                route.value
            ))
        })?;
        let entry = method_to_handler
            .get(request.method.as_str())
            .ok_or_else(|| {
                Error::NotFound(format!(
                    "No handler for {} {}",
                    request.method.as_str(),
                    route.value
                ))
            })?;

        let token = request
            .bearer_token()
            .ok_or_else(|| Error::Unauthorized("missing bearer token".to_string()))?;
        let principal = identity.verify_bearer(token)?;
        if !role_permits(entry.roles, principal.user_type) {
            return Err(Error::Forbidden(format!(
                "role {} may not call this endpoint",
                principal.user_type.as_str()
            )));
        }

        let params: HashMap<String, String> = route
            .params
            .iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        (entry.handler)(request, params, principal, db, notifier)
    }
}

/// Create the application router with every lifecycle endpoint registered
/// under its role guard
pub fn create_http_router() -> Result<HttpRouter> {
    use self::endpoint_names as names;

    let mut router = HttpRouter::new()?;

    router.add_route("POST", names::ORDERS, &[Role::Client], endpoints::place_order);
    router.add_route("GET", names::USER_ORDERS, &[], endpoints::user_orders);
    router.add_route("GET", names::ORDER_BY_ID, &[], endpoints::get_order_details);
    router.add_route("DELETE", names::ORDER_BY_ID, &[], endpoints::delete_order);
    router.add_route("POST", names::RATE_ORDER, &[Role::Client], endpoints::rate_order);
    router.add_route("POST", names::ORDER_STATUS, &[], endpoints::update_order_status);
    router.add_route(
        "POST",
        names::PAYMENT_STATUS,
        &[],
        endpoints::update_payment_status,
    );
    router.add_route(
        "GET",
        names::RESTAURANT_ORDERS,
        &[Role::Vendor],
        endpoints::restaurant_orders,
    );
    router.add_route(
        "GET",
        names::NEARBY_ORDERS,
        &[Role::Driver],
        endpoints::nearby_orders,
    );
    router.add_route(
        "PUT",
        names::PROCESS_ORDER,
        &[Role::Vendor],
        endpoints::process_order,
    );
    router.add_route("PUT", names::ADD_DRIVER, &[Role::Driver], endpoints::add_driver);
    router.add_route(
        "GET",
        names::PICKED_ORDERS,
        &[Role::Driver],
        endpoints::picked_orders,
    );
    router.add_route(
        "PUT",
        names::MARK_DELIVERED,
        &[Role::Driver],
        endpoints::mark_delivered,
    );

    Ok(router)
}
