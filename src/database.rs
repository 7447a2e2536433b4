use crate::domain::{
    Address, Driver, Food, NewOrder, Order, OrderDetails, OrderStatus, PaymentStatus, Restaurant,
    User,
};
use crate::errors::Result;

pub mod sqlite;

/// Trait hiding the store implementation.
///
/// The mock below backs unit tests, the SQLite implementation backs the
/// server. The trait is the seam between the HTTP surface and persistence,
/// so the handlers never see SQL.
///
/// Methods that the concurrency model requires to be atomic (conditional
/// driver assignment, settlement credits) are atomic inside each
/// implementation, not in the callers.
pub trait Database: Send {
    /// Create a new empty store
    fn new() -> Result<Self>
    where
        Self: Sized;

    // Entity-store sync surface. These records are owned by external
    // services and fed in through seeding or their sync feeds.

    fn put_user(&mut self, user: &User) -> Result<()>;
    fn put_address(&mut self, address: &Address) -> Result<()>;
    fn put_food(&mut self, food: &Food) -> Result<()>;
    fn put_restaurant(&mut self, restaurant: &Restaurant) -> Result<()>;
    fn put_driver(&mut self, driver: &Driver) -> Result<()>;

    /// Fetch a restaurant record, NotFound if the id does not resolve.
    fn get_restaurant(&self, id: &str) -> Result<Restaurant>;

    /// Fetch the driver record owned by the given user account, if any.
    fn get_driver_by_user(&self, user_id: &str) -> Result<Option<Driver>>;

    // Order repository

    /// Persist a new order and return the stored record, with its id and
    /// the Placed/Pending defaults applied.
    fn insert_order(&mut self, order: NewOrder) -> Result<Order>;

    /// Fetch one order as stored. NotFound if the id does not resolve.
    fn get_order(&self, id: i64) -> Result<Order>;

    /// Fetch one order joined with its user, restaurant, driver, address
    /// and catalog records. NotFound if the id does not resolve.
    fn get_order_details(&self, id: i64) -> Result<OrderDetails>;

    /// Unconditional delete by id. Returns whether a record was removed.
    fn delete_order(&mut self, id: i64) -> Result<bool>;

    /// All orders of one user, populated, in insertion order.
    fn user_orders(&self, user_id: &str) -> Result<Vec<OrderDetails>>;

    // Status transition engine

    /// Direct status write, no adjacency check. The closed enum is the only
    /// invariant enforced here.
    fn set_order_status(&mut self, id: i64, status: OrderStatus) -> Result<Order>;

    /// Direct payment-status write.
    fn set_payment_status(&mut self, id: i64, status: PaymentStatus) -> Result<Order>;

    /// Move an order along the state machine. Conflict if the transition is
    /// not allowed from the current status, NotFound if the id does not
    /// resolve. Returns the populated order.
    fn transition_order(&mut self, id: i64, next: OrderStatus) -> Result<OrderDetails>;

    /// Record the consumer's rating. Only a delivered order can be rated,
    /// and only once; both violations are conflicts.
    fn rate_order(&mut self, id: i64, rating: u8, feedback: Option<String>) -> Result<Order>;

    // Assignment service

    /// Bind a driver to an order and move it to Out_for_Delivery, iff no
    /// driver is bound yet. The racing loser gets Conflict and the stored
    /// driver id is left untouched.
    fn assign_driver(&mut self, order_id: i64, driver_id: &str) -> Result<OrderDetails>;

    // Settlement service

    /// Complete a delivery: flip the order to Delivered, credit the
    /// restaurant with the order total and the driver (looked up by its
    /// owning user id) with the delivery fee plus one delivery, all in one
    /// transaction. Calling again on an already-delivered order is a no-op
    /// that never credits twice.
    fn settle_delivery(&mut self, order_id: i64, driver_user_id: &str) -> Result<OrderDetails>;

    // Listing service

    /// A restaurant's queue for one status, restricted to orders with
    /// payment status Completed or Pending.
    fn restaurant_orders(
        &self,
        restaurant_id: &str,
        status: OrderStatus,
    ) -> Result<Vec<OrderDetails>>;

    /// Orders with the exact given status and payment Completed, for the
    /// driver app's pickup feed.
    fn orders_by_status(&self, status: OrderStatus) -> Result<Vec<OrderDetails>>;

    /// A driver's own queue for one status.
    fn picked_orders(&self, driver_id: &str, status: OrderStatus) -> Result<Vec<OrderDetails>>;
}

pub mod mock {

    use std::collections::HashMap;

    use super::*;
    use crate::domain::{
        AddressSummary, DriverSummary, PopulatedItem, RestaurantSummary, UserSummary,
    };
    use crate::errors::Error;

    /// In-memory store mirroring the SQLite semantics, for unit tests.
    pub struct MockDB {
        orders: Vec<Order>,
        next_id: i64,
        users: HashMap<String, User>,
        addresses: HashMap<String, Address>,
        foods: HashMap<String, Food>,
        restaurants: HashMap<String, Restaurant>,
        drivers: HashMap<String, Driver>,
    }

    impl MockDB {
        fn order(&self, id: i64) -> Result<&Order> {
            self.orders
                .iter()
                .find(|order| order.id == id)
                .ok_or_else(|| Error::NotFound(format!("no order with id {}", id)))
        }

        fn order_mut(&mut self, id: i64) -> Result<&mut Order> {
            self.orders
                .iter_mut()
                .find(|order| order.id == id)
                .ok_or_else(|| Error::NotFound(format!("no order with id {}", id)))
        }

        fn populate(&self, order: Order) -> OrderDetails {
            let items = order
                .order_items
                .iter()
                .map(|item| PopulatedItem {
                    item: item.clone(),
                    food: self.foods.get(&item.food_id).cloned(),
                })
                .collect();
            let user = self.users.get(&order.user_id).map(|user| UserSummary {
                name: user.name.clone(),
                email: user.email.clone(),
                phone: user.phone.clone(),
                profile: user.profile.clone(),
            });
            let restaurant = self
                .restaurants
                .get(&order.restaurant_id)
                .map(|restaurant| RestaurantSummary {
                    title: restaurant.title.clone(),
                    image: restaurant.image.clone(),
                    time: restaurant.time.clone(),
                    coords: restaurant.coords.clone(),
                });
            let driver = order
                .driver_id
                .as_ref()
                .and_then(|id| self.drivers.get(id))
                .map(|driver| DriverSummary {
                    id: driver.id.clone(),
                    name: driver.name.clone(),
                    phone: driver.phone.clone(),
                });
            let address = self
                .addresses
                .get(&order.delivery_address)
                .map(|address| AddressSummary {
                    line1: address.line1.clone(),
                    city: address.city.clone(),
                    district: address.district.clone(),
                });
            OrderDetails {
                order,
                items,
                user,
                restaurant,
                driver,
                address,
            }
        }
    }

    impl Database for MockDB {
        fn new() -> Result<Self> {
            Ok(MockDB {
                orders: Vec::new(),
                next_id: 1,
                users: HashMap::new(),
                addresses: HashMap::new(),
                foods: HashMap::new(),
                restaurants: HashMap::new(),
                drivers: HashMap::new(),
            })
        }

        fn put_user(&mut self, user: &User) -> Result<()> {
            self.users.insert(user.id.clone(), user.clone());
            Ok(())
        }

        fn put_address(&mut self, address: &Address) -> Result<()> {
            self.addresses.insert(address.id.clone(), address.clone());
            Ok(())
        }

        fn put_food(&mut self, food: &Food) -> Result<()> {
            self.foods.insert(food.id.clone(), food.clone());
            Ok(())
        }

        fn put_restaurant(&mut self, restaurant: &Restaurant) -> Result<()> {
            self.restaurants
                .insert(restaurant.id.clone(), restaurant.clone());
            Ok(())
        }

        fn put_driver(&mut self, driver: &Driver) -> Result<()> {
            self.drivers.insert(driver.id.clone(), driver.clone());
            Ok(())
        }

        fn get_restaurant(&self, id: &str) -> Result<Restaurant> {
            self.restaurants
                .get(id)
                .cloned()
                .ok_or_else(|| Error::NotFound(format!("no restaurant with id {}", id)))
        }

        fn get_driver_by_user(&self, user_id: &str) -> Result<Option<Driver>> {
            Ok(self
                .drivers
                .values()
                .find(|driver| driver.user_id == user_id)
                .cloned())
        }

        fn insert_order(&mut self, order: NewOrder) -> Result<Order> {
            let id = self.next_id;
            self.next_id += 1;
            let order = Order {
                id,
                user_id: order.user_id,
                order_items: order.order_items,
                order_total: order.order_total,
                delivery_fee: order.delivery_fee,
                grand_total: order.grand_total,
                delivery_address: order.delivery_address,
                restaurant_id: order.restaurant_id,
                driver_id: None,
                payment_status: PaymentStatus::Pending,
                order_status: OrderStatus::Placed,
                payment_method: order.payment_method,
                rating: None,
                feedback: None,
                promo_code: order.promo_code,
                discount_amount: order.discount_amount,
                notes: order.notes,
                order_date: order.order_date,
            };
            self.orders.push(order.clone());
            Ok(order)
        }

        fn get_order(&self, id: i64) -> Result<Order> {
            self.order(id).cloned()
        }

        fn get_order_details(&self, id: i64) -> Result<OrderDetails> {
            let order = self.order(id)?.clone();
            Ok(self.populate(order))
        }

        fn delete_order(&mut self, id: i64) -> Result<bool> {
            let old_len = self.orders.len();
            self.orders.retain(|order| order.id != id);
            Ok(old_len != self.orders.len())
        }

        fn user_orders(&self, user_id: &str) -> Result<Vec<OrderDetails>> {
            Ok(self
                .orders
                .iter()
                .filter(|order| order.user_id == user_id)
                .map(|order| self.populate(order.clone()))
                .collect())
        }

        fn set_order_status(&mut self, id: i64, status: OrderStatus) -> Result<Order> {
            let order = self.order_mut(id)?;
            order.order_status = status;
            Ok(order.clone())
        }

        fn set_payment_status(&mut self, id: i64, status: PaymentStatus) -> Result<Order> {
            let order = self.order_mut(id)?;
            order.payment_status = status;
            Ok(order.clone())
        }

        fn transition_order(&mut self, id: i64, next: OrderStatus) -> Result<OrderDetails> {
            let order = self.order_mut(id)?;
            if !order.order_status.can_transition_to(next) {
                return Err(Error::Conflict(format!(
                    "order {} cannot move from {} to {}",
                    id, order.order_status, next
                )));
            }
            order.order_status = next;
            let order = order.clone();
            Ok(self.populate(order))
        }

        fn rate_order(&mut self, id: i64, rating: u8, feedback: Option<String>) -> Result<Order> {
            let order = self.order_mut(id)?;
            if order.order_status != OrderStatus::Delivered {
                return Err(Error::Conflict(format!(
                    "order {} has not been delivered yet",
                    id
                )));
            }
            if order.rating.is_some() {
                return Err(Error::Conflict(format!("order {} is already rated", id)));
            }
            order.rating = Some(rating);
            order.feedback = feedback;
            Ok(order.clone())
        }

        fn assign_driver(&mut self, order_id: i64, driver_id: &str) -> Result<OrderDetails> {
            let order = self.order_mut(order_id)?;
            if order.driver_id.is_some() {
                return Err(Error::Conflict(format!(
                    "order {} already has a driver",
                    order_id
                )));
            }
            order.driver_id = Some(driver_id.to_string());
            order.order_status = OrderStatus::OutForDelivery;
            let order = order.clone();
            Ok(self.populate(order))
        }

        fn settle_delivery(&mut self, order_id: i64, driver_user_id: &str) -> Result<OrderDetails> {
            let order = self.order_mut(order_id)?;
            match order.order_status {
                // Retried settlement: keep the order delivered, credit nothing
                OrderStatus::Delivered => {
                    let order = order.clone();
                    return Ok(self.populate(order));
                }
                OrderStatus::OutForDelivery => order.order_status = OrderStatus::Delivered,
                other => {
                    return Err(Error::Conflict(format!(
                        "order {} cannot be delivered from status {}",
                        order_id, other
                    )))
                }
            }
            let order = order.clone();
            if let Some(restaurant) = self.restaurants.get_mut(&order.restaurant_id) {
                restaurant.earnings += order.order_total;
            }
            if let Some(driver) = self
                .drivers
                .values_mut()
                .find(|driver| driver.user_id == driver_user_id)
            {
                driver.total_deliveries += 1;
                driver.total_earnings += order.delivery_fee;
            }
            Ok(self.populate(order))
        }

        fn restaurant_orders(
            &self,
            restaurant_id: &str,
            status: OrderStatus,
        ) -> Result<Vec<OrderDetails>> {
            Ok(self
                .orders
                .iter()
                .filter(|order| {
                    order.restaurant_id == restaurant_id
                        && order.order_status == status
                        && matches!(
                            order.payment_status,
                            PaymentStatus::Completed | PaymentStatus::Pending
                        )
                })
                .map(|order| self.populate(order.clone()))
                .collect())
        }

        fn orders_by_status(&self, status: OrderStatus) -> Result<Vec<OrderDetails>> {
            Ok(self
                .orders
                .iter()
                .filter(|order| {
                    order.order_status == status
                        && order.payment_status == PaymentStatus::Completed
                })
                .map(|order| self.populate(order.clone()))
                .collect())
        }

        fn picked_orders(&self, driver_id: &str, status: OrderStatus) -> Result<Vec<OrderDetails>> {
            Ok(self
                .orders
                .iter()
                .filter(|order| {
                    order.driver_id.as_deref() == Some(driver_id) && order.order_status == status
                })
                .map(|order| self.populate(order.clone()))
                .collect())
        }
    }

}
