use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSqlOutput, ValueRef};
use rusqlite::{params, Connection, OptionalExtension, Row, ToSql};

use crate::database::Database;
use crate::domain::{
    Address, AddressSummary, Coords, Driver, DriverSummary, Food, NewOrder, Order, OrderDetails,
    OrderItem, OrderStatus, PaymentStatus, PopulatedItem, Restaurant, RestaurantSummary, User,
    UserSummary,
};
use crate::errors::{Error, Result};

/// Contains the SQL statements used to interact with the database
pub mod sql_queries {
    pub const CREATE_ORDERS: &str = "CREATE TABLE IF NOT EXISTS orders (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id TEXT NOT NULL,
        items TEXT NOT NULL,
        order_total REAL NOT NULL,
        delivery_fee REAL NOT NULL,
        grand_total REAL NOT NULL,
        delivery_address TEXT NOT NULL,
        restaurant_id TEXT NOT NULL,
        driver_id TEXT,
        payment_status TEXT NOT NULL DEFAULT 'Pending',
        order_status TEXT NOT NULL DEFAULT 'Placed',
        payment_method TEXT,
        rating INTEGER,
        feedback TEXT,
        promo_code TEXT,
        discount_amount REAL,
        notes TEXT,
        order_date INTEGER NOT NULL)";

    pub const CREATE_USERS: &str = "CREATE TABLE IF NOT EXISTS users (
        id TEXT PRIMARY KEY, name TEXT NOT NULL, email TEXT NOT NULL,
        phone TEXT, profile TEXT)";

    pub const CREATE_ADDRESSES: &str = "CREATE TABLE IF NOT EXISTS addresses (
        id TEXT PRIMARY KEY, line1 TEXT NOT NULL, city TEXT NOT NULL,
        district TEXT NOT NULL, postal_code TEXT)";

    pub const CREATE_FOODS: &str = "CREATE TABLE IF NOT EXISTS foods (
        id TEXT PRIMARY KEY, title TEXT NOT NULL, image TEXT, time TEXT)";

    pub const CREATE_RESTAURANTS: &str = "CREATE TABLE IF NOT EXISTS restaurants (
        id TEXT PRIMARY KEY, title TEXT NOT NULL, image TEXT, time TEXT,
        latitude REAL NOT NULL, longitude REAL NOT NULL, address TEXT,
        is_available INTEGER NOT NULL DEFAULT 1,
        earnings REAL NOT NULL DEFAULT 0)";

    pub const CREATE_DRIVERS: &str = "CREATE TABLE IF NOT EXISTS drivers (
        id TEXT PRIMARY KEY, user_id TEXT NOT NULL, name TEXT, phone TEXT,
        is_available INTEGER NOT NULL DEFAULT 1,
        latitude REAL, longitude REAL,
        total_deliveries INTEGER NOT NULL DEFAULT 0,
        total_earnings REAL NOT NULL DEFAULT 0)";

    pub const INSERT_ORDER: &str = "INSERT INTO orders (
        user_id, items, order_total, delivery_fee, grand_total,
        delivery_address, restaurant_id, payment_status, order_status,
        payment_method, promo_code, discount_amount, notes, order_date)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)";

    pub const SELECT_ORDER: &str = "SELECT * FROM orders WHERE id = ?1";
    pub const DELETE_ORDER: &str = "DELETE FROM orders WHERE id = ?1";
    pub const SELECT_USER_ORDERS: &str = "SELECT * FROM orders WHERE user_id = ?1 ORDER BY id";

    pub const UPDATE_ORDER_STATUS: &str = "UPDATE orders SET order_status = ?2 WHERE id = ?1";
    pub const UPDATE_PAYMENT_STATUS: &str = "UPDATE orders SET payment_status = ?2 WHERE id = ?1";
    pub const UPDATE_RATING: &str = "UPDATE orders SET rating = ?2, feedback = ?3 WHERE id = ?1";

    /// Conditional claim: only a driverless order can be taken, so two racing
    /// drivers cannot both win.
    pub const ASSIGN_DRIVER: &str = "UPDATE orders
        SET driver_id = ?2, order_status = 'Out_for_Delivery'
        WHERE id = ?1 AND driver_id IS NULL";

    /// Conditional completion: the status precondition keeps a retried
    /// settlement from crediting earnings twice.
    pub const DELIVER_ORDER: &str = "UPDATE orders SET order_status = 'Delivered'
        WHERE id = ?1 AND order_status = 'Out_for_Delivery'";

    pub const SELECT_ORDER_STATUS: &str = "SELECT order_status FROM orders WHERE id = ?1";
    pub const SELECT_SETTLEMENT: &str =
        "SELECT restaurant_id, order_total, delivery_fee FROM orders WHERE id = ?1";
    pub const CREDIT_RESTAURANT: &str =
        "UPDATE restaurants SET earnings = earnings + ?2 WHERE id = ?1";
    pub const CREDIT_DRIVER: &str = "UPDATE drivers
        SET total_deliveries = total_deliveries + 1, total_earnings = total_earnings + ?2
        WHERE user_id = ?1";

    pub const SELECT_RESTAURANT_ORDERS: &str = "SELECT * FROM orders
        WHERE restaurant_id = ?1 AND order_status = ?2
        AND payment_status IN ('Completed', 'Pending') ORDER BY id";
    pub const SELECT_ORDERS_BY_STATUS: &str = "SELECT * FROM orders
        WHERE order_status = ?1 AND payment_status = 'Completed' ORDER BY id";
    pub const SELECT_PICKED_ORDERS: &str = "SELECT * FROM orders
        WHERE driver_id = ?1 AND order_status = ?2 ORDER BY id";

    pub const UPSERT_USER: &str = "INSERT OR REPLACE INTO users
        (id, name, email, phone, profile) VALUES (?1, ?2, ?3, ?4, ?5)";
    pub const UPSERT_ADDRESS: &str = "INSERT OR REPLACE INTO addresses
        (id, line1, city, district, postal_code) VALUES (?1, ?2, ?3, ?4, ?5)";
    pub const UPSERT_FOOD: &str = "INSERT OR REPLACE INTO foods
        (id, title, image, time) VALUES (?1, ?2, ?3, ?4)";
    pub const UPSERT_RESTAURANT: &str = "INSERT OR REPLACE INTO restaurants
        (id, title, image, time, latitude, longitude, address, is_available, earnings)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)";
    pub const UPSERT_DRIVER: &str = "INSERT OR REPLACE INTO drivers
        (id, user_id, name, phone, is_available, latitude, longitude,
        total_deliveries, total_earnings)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)";

    pub const SELECT_USER_SUMMARY: &str =
        "SELECT name, email, phone, profile FROM users WHERE id = ?1";
    pub const SELECT_ADDRESS_SUMMARY: &str =
        "SELECT line1, city, district FROM addresses WHERE id = ?1";
    pub const SELECT_FOOD: &str = "SELECT id, title, image, time FROM foods WHERE id = ?1";
    pub const SELECT_RESTAURANT_SUMMARY: &str =
        "SELECT title, image, time, latitude, longitude, address FROM restaurants WHERE id = ?1";
    pub const SELECT_DRIVER_SUMMARY: &str = "SELECT id, name, phone FROM drivers WHERE id = ?1";
    pub const SELECT_RESTAURANT: &str = "SELECT id, title, image, time, latitude, longitude,
        address, is_available, earnings FROM restaurants WHERE id = ?1";
    pub const SELECT_DRIVER_BY_USER: &str = "SELECT id, user_id, name, phone, is_available,
        latitude, longitude, total_deliveries, total_earnings FROM drivers WHERE user_id = ?1";
}

impl ToSql for OrderStatus {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for OrderStatus {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()
            .and_then(|text| OrderStatus::parse(text).ok_or(FromSqlError::InvalidType))
    }
}

impl ToSql for PaymentStatus {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for PaymentStatus {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()
            .and_then(|text| PaymentStatus::parse(text).ok_or(FromSqlError::InvalidType))
    }
}

/// Map one row of the orders table. The items column holds the line items as
/// JSON, everything else is flat.
fn order_from_row(row: &Row) -> rusqlite::Result<Order> {
    let items_json: String = row.get("items")?;
    let order_items: Vec<OrderItem> = serde_json::from_str(&items_json).map_err(|err| {
        rusqlite::Error::FromSqlConversionFailure(2, rusqlite::types::Type::Text, Box::new(err))
    })?;
    Ok(Order {
        id: row.get("id")?,
        user_id: row.get("user_id")?,
        order_items,
        order_total: row.get("order_total")?,
        delivery_fee: row.get("delivery_fee")?,
        grand_total: row.get("grand_total")?,
        delivery_address: row.get("delivery_address")?,
        restaurant_id: row.get("restaurant_id")?,
        driver_id: row.get("driver_id")?,
        payment_status: row.get("payment_status")?,
        order_status: row.get("order_status")?,
        payment_method: row.get("payment_method")?,
        rating: row.get("rating")?,
        feedback: row.get("feedback")?,
        promo_code: row.get("promo_code")?,
        discount_amount: row.get("discount_amount")?,
        notes: row.get("notes")?,
        order_date: row.get("order_date")?,
    })
}

fn restaurant_from_row(row: &Row) -> rusqlite::Result<Restaurant> {
    Ok(Restaurant {
        id: row.get(0)?,
        title: row.get(1)?,
        image: row.get(2)?,
        time: row.get(3)?,
        coords: Coords {
            latitude: row.get(4)?,
            longitude: row.get(5)?,
            address: row.get(6)?,
        },
        is_available: row.get(7)?,
        earnings: row.get(8)?,
    })
}

fn driver_from_row(row: &Row) -> rusqlite::Result<Driver> {
    let latitude: Option<f64> = row.get(5)?;
    let longitude: Option<f64> = row.get(6)?;
    let current_location = match (latitude, longitude) {
        (Some(latitude), Some(longitude)) => Some(Coords {
            latitude,
            longitude,
            address: None,
        }),
        _ => None,
    };
    Ok(Driver {
        id: row.get(0)?,
        user_id: row.get(1)?,
        name: row.get(2)?,
        phone: row.get(3)?,
        is_available: row.get(4)?,
        current_location,
        total_deliveries: row.get(7)?,
        total_earnings: row.get(8)?,
    })
}

pub struct SQLiteConnection {
    conn: Connection,
}

impl SQLiteConnection {
    /// Open a database file, creating the schema if needed.
    pub fn open(path: &str) -> Result<Self> {
        Self::prepare(Connection::open(path)?)
    }

    fn prepare(conn: Connection) -> Result<Self> {
        for statement in [
            sql_queries::CREATE_ORDERS,
            sql_queries::CREATE_USERS,
            sql_queries::CREATE_ADDRESSES,
            sql_queries::CREATE_FOODS,
            sql_queries::CREATE_RESTAURANTS,
            sql_queries::CREATE_DRIVERS,
        ] {
            conn.execute(statement, [])?;
        }
        Ok(SQLiteConnection { conn })
    }

    fn select_orders(&self, query: &str, query_params: &[&dyn ToSql]) -> Result<Vec<OrderDetails>> {
        let orders = self
            .conn
            .prepare(query)?
            .query_map(query_params, order_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        orders
            .into_iter()
            .map(|order| self.populate(order))
            .collect()
    }

    /// Join the referenced user, restaurant, driver, address and catalog
    /// records into the stable populated projection. References the owning
    /// services have not synced yet resolve to None.
    fn populate(&self, order: Order) -> Result<OrderDetails> {
        let user = self
            .conn
            .query_row(sql_queries::SELECT_USER_SUMMARY, params![order.user_id], |row| {
                Ok(UserSummary {
                    name: row.get(0)?,
                    email: row.get(1)?,
                    phone: row.get(2)?,
                    profile: row.get(3)?,
                })
            })
            .optional()?;
        let restaurant = self
            .conn
            .query_row(
                sql_queries::SELECT_RESTAURANT_SUMMARY,
                params![order.restaurant_id],
                |row| {
                    Ok(RestaurantSummary {
                        title: row.get(0)?,
                        image: row.get(1)?,
                        time: row.get(2)?,
                        coords: Coords {
                            latitude: row.get(3)?,
                            longitude: row.get(4)?,
                            address: row.get(5)?,
                        },
                    })
                },
            )
            .optional()?;
        let driver = match &order.driver_id {
            Some(driver_id) => self
                .conn
                .query_row(sql_queries::SELECT_DRIVER_SUMMARY, params![driver_id], |row| {
                    Ok(DriverSummary {
                        id: row.get(0)?,
                        name: row.get(1)?,
                        phone: row.get(2)?,
                    })
                })
                .optional()?,
            None => None,
        };
        let address = self
            .conn
            .query_row(
                sql_queries::SELECT_ADDRESS_SUMMARY,
                params![order.delivery_address],
                |row| {
                    Ok(AddressSummary {
                        line1: row.get(0)?,
                        city: row.get(1)?,
                        district: row.get(2)?,
                    })
                },
            )
            .optional()?;
        let mut items = Vec::with_capacity(order.order_items.len());
        for item in &order.order_items {
            let food = self
                .conn
                .query_row(sql_queries::SELECT_FOOD, params![item.food_id], |row| {
                    Ok(Food {
                        id: row.get(0)?,
                        title: row.get(1)?,
                        image: row.get(2)?,
                        time: row.get(3)?,
                    })
                })
                .optional()?;
            items.push(PopulatedItem {
                item: item.clone(),
                food,
            });
        }
        Ok(OrderDetails {
            order,
            items,
            user,
            restaurant,
            driver,
            address,
        })
    }
}

impl Database for SQLiteConnection {
    fn new() -> Result<Self> {
        Self::prepare(Connection::open_in_memory()?)
    }

    fn put_user(&mut self, user: &User) -> Result<()> {
        self.conn.execute(
            sql_queries::UPSERT_USER,
            params![user.id, user.name, user.email, user.phone, user.profile],
        )?;
        Ok(())
    }

    fn put_address(&mut self, address: &Address) -> Result<()> {
        self.conn.execute(
            sql_queries::UPSERT_ADDRESS,
            params![
                address.id,
                address.line1,
                address.city,
                address.district,
                address.postal_code
            ],
        )?;
        Ok(())
    }

    fn put_food(&mut self, food: &Food) -> Result<()> {
        self.conn.execute(
            sql_queries::UPSERT_FOOD,
            params![food.id, food.title, food.image, food.time],
        )?;
        Ok(())
    }

    fn put_restaurant(&mut self, restaurant: &Restaurant) -> Result<()> {
        self.conn.execute(
            sql_queries::UPSERT_RESTAURANT,
            params![
                restaurant.id,
                restaurant.title,
                restaurant.image,
                restaurant.time,
                restaurant.coords.latitude,
                restaurant.coords.longitude,
                restaurant.coords.address,
                restaurant.is_available,
                restaurant.earnings
            ],
        )?;
        Ok(())
    }

    fn put_driver(&mut self, driver: &Driver) -> Result<()> {
        let (latitude, longitude) = match &driver.current_location {
            Some(coords) => (Some(coords.latitude), Some(coords.longitude)),
            None => (None, None),
        };
        self.conn.execute(
            sql_queries::UPSERT_DRIVER,
            params![
                driver.id,
                driver.user_id,
                driver.name,
                driver.phone,
                driver.is_available,
                latitude,
                longitude,
                driver.total_deliveries,
                driver.total_earnings
            ],
        )?;
        Ok(())
    }

    fn get_restaurant(&self, id: &str) -> Result<Restaurant> {
        self.conn
            .query_row(sql_queries::SELECT_RESTAURANT, params![id], restaurant_from_row)
            .optional()?
            .ok_or_else(|| Error::NotFound(format!("no restaurant with id {}", id)))
    }

    fn get_driver_by_user(&self, user_id: &str) -> Result<Option<Driver>> {
        Ok(self
            .conn
            .query_row(sql_queries::SELECT_DRIVER_BY_USER, params![user_id], driver_from_row)
            .optional()?)
    }

    fn insert_order(&mut self, order: NewOrder) -> Result<Order> {
        let items = serde_json::to_string(&order.order_items)
            .map_err(|err| Error::Internal(err.to_string()))?;
        self.conn.execute(
            sql_queries::INSERT_ORDER,
            params![
                order.user_id,
                items,
                order.order_total,
                order.delivery_fee,
                order.grand_total,
                order.delivery_address,
                order.restaurant_id,
                PaymentStatus::Pending,
                OrderStatus::Placed,
                order.payment_method,
                order.promo_code,
                order.discount_amount,
                order.notes,
                order.order_date
            ],
        )?;
        self.get_order(self.conn.last_insert_rowid())
    }

    fn get_order(&self, id: i64) -> Result<Order> {
        self.conn
            .query_row(sql_queries::SELECT_ORDER, params![id], order_from_row)
            .optional()?
            .ok_or_else(|| Error::NotFound(format!("no order with id {}", id)))
    }

    fn get_order_details(&self, id: i64) -> Result<OrderDetails> {
        let order = self.get_order(id)?;
        self.populate(order)
    }

    fn delete_order(&mut self, id: i64) -> Result<bool> {
        let deleted = self.conn.execute(sql_queries::DELETE_ORDER, params![id])?;
        Ok(deleted > 0)
    }

    fn user_orders(&self, user_id: &str) -> Result<Vec<OrderDetails>> {
        self.select_orders(sql_queries::SELECT_USER_ORDERS, params![user_id])
    }

    fn set_order_status(&mut self, id: i64, status: OrderStatus) -> Result<Order> {
        let updated = self
            .conn
            .execute(sql_queries::UPDATE_ORDER_STATUS, params![id, status])?;
        if updated == 0 {
            return Err(Error::NotFound(format!("no order with id {}", id)));
        }
        self.get_order(id)
    }

    fn set_payment_status(&mut self, id: i64, status: PaymentStatus) -> Result<Order> {
        let updated = self
            .conn
            .execute(sql_queries::UPDATE_PAYMENT_STATUS, params![id, status])?;
        if updated == 0 {
            return Err(Error::NotFound(format!("no order with id {}", id)));
        }
        self.get_order(id)
    }

    fn transition_order(&mut self, id: i64, next: OrderStatus) -> Result<OrderDetails> {
        let order = self.get_order(id)?;
        if !order.order_status.can_transition_to(next) {
            return Err(Error::Conflict(format!(
                "order {} cannot move from {} to {}",
                id, order.order_status, next
            )));
        }
        self.conn
            .execute(sql_queries::UPDATE_ORDER_STATUS, params![id, next])?;
        self.get_order_details(id)
    }

    fn rate_order(&mut self, id: i64, rating: u8, feedback: Option<String>) -> Result<Order> {
        let order = self.get_order(id)?;
        if order.order_status != OrderStatus::Delivered {
            return Err(Error::Conflict(format!(
                "order {} has not been delivered yet",
                id
            )));
        }
        if order.rating.is_some() {
            return Err(Error::Conflict(format!("order {} is already rated", id)));
        }
        self.conn
            .execute(sql_queries::UPDATE_RATING, params![id, rating, feedback])?;
        self.get_order(id)
    }

    fn assign_driver(&mut self, order_id: i64, driver_id: &str) -> Result<OrderDetails> {
        let claimed = self
            .conn
            .execute(sql_queries::ASSIGN_DRIVER, params![order_id, driver_id])?;
        if claimed == 0 {
            // Either the order does not exist or another driver won the claim
            self.get_order(order_id)?;
            return Err(Error::Conflict(format!(
                "order {} already has a driver",
                order_id
            )));
        }
        self.get_order_details(order_id)
    }

    fn settle_delivery(&mut self, order_id: i64, driver_user_id: &str) -> Result<OrderDetails> {
        let tx = self.conn.transaction()?;
        let delivered = tx.execute(sql_queries::DELIVER_ORDER, params![order_id])?;
        if delivered == 0 {
            let current: Option<OrderStatus> = tx
                .query_row(sql_queries::SELECT_ORDER_STATUS, params![order_id], |row| {
                    row.get(0)
                })
                .optional()?;
            drop(tx);
            return match current {
                None => Err(Error::NotFound(format!("no order with id {}", order_id))),
                // Retried settlement: the order stays delivered, nothing is
                // credited a second time
                Some(OrderStatus::Delivered) => self.get_order_details(order_id),
                Some(other) => Err(Error::Conflict(format!(
                    "order {} cannot be delivered from status {}",
                    order_id, other
                ))),
            };
        }
        let (restaurant_id, order_total, delivery_fee): (String, f64, f64) = tx.query_row(
            sql_queries::SELECT_SETTLEMENT,
            params![order_id],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
        )?;
        tx.execute(
            sql_queries::CREDIT_RESTAURANT,
            params![restaurant_id, order_total],
        )?;
        // The driver record may not be synced yet, in which case the fee
        // credit is skipped
        tx.execute(
            sql_queries::CREDIT_DRIVER,
            params![driver_user_id, delivery_fee],
        )?;
        tx.commit()?;
        self.get_order_details(order_id)
    }

    fn restaurant_orders(
        &self,
        restaurant_id: &str,
        status: OrderStatus,
    ) -> Result<Vec<OrderDetails>> {
        self.select_orders(
            sql_queries::SELECT_RESTAURANT_ORDERS,
            params![restaurant_id, status],
        )
    }

    fn orders_by_status(&self, status: OrderStatus) -> Result<Vec<OrderDetails>> {
        self.select_orders(sql_queries::SELECT_ORDERS_BY_STATUS, params![status])
    }

    fn picked_orders(&self, driver_id: &str, status: OrderStatus) -> Result<Vec<OrderDetails>> {
        self.select_orders(sql_queries::SELECT_PICKED_ORDERS, params![driver_id, status])
    }
}

#[cfg(test)]
mod test {
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::domain::Additive;

    fn seeded_db() -> SQLiteConnection {
        let mut db = SQLiteConnection::new().unwrap();
        db.put_user(&User {
            id: "u1".to_string(),
            name: "Ada".to_string(),
            email: "ada@example.com".to_string(),
            phone: Some("+3312345".to_string()),
            profile: None,
        })
        .unwrap();
        db.put_address(&Address {
            id: "a1".to_string(),
            line1: "1 rue de la Paix".to_string(),
            city: "Paris".to_string(),
            district: "2e".to_string(),
            postal_code: Some("75002".to_string()),
        })
        .unwrap();
        db.put_food(&Food {
            id: "f1".to_string(),
            title: "Margherita".to_string(),
            image: None,
            time: Some("20 min".to_string()),
        })
        .unwrap();
        db.put_restaurant(&Restaurant {
            id: "r1".to_string(),
            title: "Da Mario".to_string(),
            image: None,
            time: Some("10:00 - 22:00".to_string()),
            coords: Coords {
                latitude: 48.87,
                longitude: 2.33,
                address: Some("3 rue Italienne".to_string()),
            },
            is_available: true,
            earnings: 0.0,
        })
        .unwrap();
        db.put_driver(&Driver {
            id: "d1".to_string(),
            user_id: "du1".to_string(),
            name: Some("Marco".to_string()),
            phone: Some("+3367890".to_string()),
            is_available: true,
            current_location: None,
            total_deliveries: 0,
            total_earnings: 0.0,
        })
        .unwrap();
        db
    }

    fn sample_order() -> NewOrder {
        NewOrder {
            user_id: "u1".to_string(),
            order_items: vec![OrderItem {
                food_id: "f1".to_string(),
                quantity: 2,
                price: 10.0,
                additives: vec![Additive {
                    id: "a1".to_string(),
                    title: "Cheese".to_string(),
                    price: 1.0,
                }],
                instructions: None,
            }],
            order_total: 20.0,
            delivery_fee: 2.0,
            grand_total: 22.0,
            delivery_address: "a1".to_string(),
            restaurant_id: "r1".to_string(),
            payment_method: Some("card".to_string()),
            promo_code: None,
            discount_amount: None,
            notes: None,
            order_date: 1_700_000_000,
        }
    }

    #[test]
    fn test_placement_defaults_and_round_trip() {
        let mut db = seeded_db();
        let order = db.insert_order(sample_order()).unwrap();
        assert_eq!(order.order_status, OrderStatus::Placed);
        assert_eq!(order.payment_status, PaymentStatus::Pending);
        assert!(order.driver_id.is_none());

        let details = db.get_order_details(order.id).unwrap();
        let item = &details.items[0];
        assert_eq!(item.item.quantity, 2);
        assert_eq!(item.item.price, 10.0);
        assert_eq!(
            item.item.additives,
            vec![Additive {
                id: "a1".to_string(),
                title: "Cheese".to_string(),
                price: 1.0,
            }]
        );
        assert_eq!(item.food.as_ref().unwrap().title, "Margherita");
        assert_eq!(details.user.as_ref().unwrap().name, "Ada");
        assert_eq!(details.restaurant.as_ref().unwrap().title, "Da Mario");
        assert_eq!(details.address.as_ref().unwrap().city, "Paris");
        assert!(details.driver.is_none());
    }

    #[test]
    fn test_full_lifecycle_settles_earnings() {
        let mut db = seeded_db();
        let order = db.insert_order(sample_order()).unwrap();

        db.transition_order(order.id, OrderStatus::Preparing).unwrap();
        db.transition_order(order.id, OrderStatus::Ready).unwrap();
        let assigned = db.assign_driver(order.id, "d1").unwrap();
        assert_eq!(assigned.order.order_status, OrderStatus::OutForDelivery);
        assert_eq!(assigned.order.driver_id.as_deref(), Some("d1"));
        assert_eq!(assigned.driver.as_ref().unwrap().id, "d1");

        let delivered = db.settle_delivery(order.id, "du1").unwrap();
        assert_eq!(delivered.order.order_status, OrderStatus::Delivered);

        let restaurant = db.get_restaurant("r1").unwrap();
        assert_eq!(restaurant.earnings, 20.0);
        let driver = db.get_driver_by_user("du1").unwrap().unwrap();
        assert_eq!(driver.total_deliveries, 1);
        assert_eq!(driver.total_earnings, 2.0);
    }

    #[test]
    fn test_settlement_is_idempotent() {
        let mut db = seeded_db();
        let order = db.insert_order(sample_order()).unwrap();
        db.transition_order(order.id, OrderStatus::Preparing).unwrap();
        db.transition_order(order.id, OrderStatus::Ready).unwrap();
        db.assign_driver(order.id, "d1").unwrap();

        db.settle_delivery(order.id, "du1").unwrap();
        let again = db.settle_delivery(order.id, "du1").unwrap();
        assert_eq!(again.order.order_status, OrderStatus::Delivered);

        // retrying never credits twice
        assert_eq!(db.get_restaurant("r1").unwrap().earnings, 20.0);
        let driver = db.get_driver_by_user("du1").unwrap().unwrap();
        assert_eq!(driver.total_deliveries, 1);
        assert_eq!(driver.total_earnings, 2.0);
    }

    #[test]
    fn test_settlement_requires_out_for_delivery() {
        let mut db = seeded_db();
        let order = db.insert_order(sample_order()).unwrap();
        assert!(matches!(
            db.settle_delivery(order.id, "du1"),
            Err(Error::Conflict(_))
        ));
        // a failed settlement credits nothing
        assert_eq!(db.get_restaurant("r1").unwrap().earnings, 0.0);
    }

    #[test]
    fn test_settlement_with_unknown_driver_still_delivers() {
        let mut db = seeded_db();
        let order = db.insert_order(sample_order()).unwrap();
        db.transition_order(order.id, OrderStatus::Preparing).unwrap();
        db.transition_order(order.id, OrderStatus::Ready).unwrap();
        db.assign_driver(order.id, "d1").unwrap();

        let delivered = db.settle_delivery(order.id, "not-synced").unwrap();
        assert_eq!(delivered.order.order_status, OrderStatus::Delivered);
        assert_eq!(db.get_restaurant("r1").unwrap().earnings, 20.0);
        // the known driver was not credited by mistake
        let driver = db.get_driver_by_user("du1").unwrap().unwrap();
        assert_eq!(driver.total_deliveries, 0);
    }

    #[test]
    fn test_assignment_is_a_conditional_claim() {
        let mut db = seeded_db();
        let order = db.insert_order(sample_order()).unwrap();
        db.transition_order(order.id, OrderStatus::Preparing).unwrap();
        db.transition_order(order.id, OrderStatus::Ready).unwrap();

        db.assign_driver(order.id, "d1").unwrap();
        assert!(matches!(
            db.assign_driver(order.id, "d2"),
            Err(Error::Conflict(_))
        ));
        assert_eq!(
            db.get_order(order.id).unwrap().driver_id.as_deref(),
            Some("d1")
        );
        assert!(matches!(
            db.assign_driver(999, "d1"),
            Err(Error::NotFound(_))
        ));
    }

    #[test]
    fn test_concurrent_claims_have_one_winner() {
        let db = Arc::new(Mutex::new(seeded_db()));
        let order = {
            let mut db = db.lock().unwrap();
            let order = db.insert_order(sample_order()).unwrap();
            db.transition_order(order.id, OrderStatus::Preparing).unwrap();
            db.transition_order(order.id, OrderStatus::Ready).unwrap();
            order
        };

        let handles: Vec<_> = ["d1", "d2"]
            .into_iter()
            .map(|driver| {
                let db = Arc::clone(&db);
                std::thread::spawn(move || db.lock().unwrap().assign_driver(order.id, driver))
            })
            .collect();
        let outcomes: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        assert_eq!(outcomes.iter().filter(|outcome| outcome.is_ok()).count(), 1);
        let stored = db.lock().unwrap().get_order(order.id).unwrap();
        assert!(stored.driver_id.is_some());
    }

    #[test]
    fn test_restaurant_queue_filters() {
        let mut db = seeded_db();
        let placed = db.insert_order(sample_order()).unwrap();

        let mut other = sample_order();
        other.restaurant_id = "r2".to_string();
        db.insert_order(other).unwrap();

        let preparing = db.insert_order(sample_order()).unwrap();
        db.transition_order(preparing.id, OrderStatus::Preparing).unwrap();

        let failed = db.insert_order(sample_order()).unwrap();
        db.set_payment_status(failed.id, PaymentStatus::Failed).unwrap();

        let queue = db.restaurant_orders("r1", OrderStatus::Placed).unwrap();
        assert_eq!(queue.len(), 1);
        assert_eq!(queue[0].order.id, placed.id);
        assert_eq!(queue[0].order.restaurant_id, "r1");
    }

    #[test]
    fn test_pickup_feed_needs_completed_payment() {
        let mut db = seeded_db();
        let pending = db.insert_order(sample_order()).unwrap();
        let paid = db.insert_order(sample_order()).unwrap();
        db.set_payment_status(paid.id, PaymentStatus::Completed).unwrap();

        let feed = db.orders_by_status(OrderStatus::Placed).unwrap();
        assert_eq!(feed.len(), 1);
        assert_eq!(feed[0].order.id, paid.id);
        assert_ne!(feed[0].order.id, pending.id);
    }

    #[test]
    fn test_driver_queue() {
        let mut db = seeded_db();
        let mine = db.insert_order(sample_order()).unwrap();
        db.transition_order(mine.id, OrderStatus::Preparing).unwrap();
        db.transition_order(mine.id, OrderStatus::Ready).unwrap();
        db.assign_driver(mine.id, "d1").unwrap();

        let other = db.insert_order(sample_order()).unwrap();
        db.transition_order(other.id, OrderStatus::Preparing).unwrap();
        db.transition_order(other.id, OrderStatus::Ready).unwrap();
        db.assign_driver(other.id, "d2").unwrap();

        let queue = db.picked_orders("d1", OrderStatus::OutForDelivery).unwrap();
        assert_eq!(queue.len(), 1);
        assert_eq!(queue[0].order.id, mine.id);

        assert!(db.picked_orders("d1", OrderStatus::Delivered).unwrap().is_empty());
    }

    #[test]
    fn test_user_orders_in_insertion_order() {
        let mut db = seeded_db();
        let first = db.insert_order(sample_order()).unwrap();
        let second = db.insert_order(sample_order()).unwrap();
        let mut foreign = sample_order();
        foreign.user_id = "u2".to_string();
        db.insert_order(foreign).unwrap();

        let orders = db.user_orders("u1").unwrap();
        assert_eq!(orders.len(), 2);
        assert_eq!(orders[0].order.id, first.id);
        assert_eq!(orders[1].order.id, second.id);
    }

    #[test]
    fn test_delete_order() {
        let mut db = seeded_db();
        let order = db.insert_order(sample_order()).unwrap();
        assert!(db.delete_order(order.id).unwrap());
        assert!(!db.delete_order(order.id).unwrap());
        assert!(matches!(db.get_order(order.id), Err(Error::NotFound(_))));
    }

    #[test]
    fn test_persists_to_file() {
        let path = std::env::temp_dir().join("food-courier-sqlite-test.db");
        let path = path.to_str().unwrap();
        let _ = std::fs::remove_file(path);

        let id = {
            let mut db = SQLiteConnection::open(path).unwrap();
            db.insert_order(sample_order()).unwrap().id
        };
        {
            let db = SQLiteConnection::open(path).unwrap();
            let order = db.get_order(id).unwrap();
            assert_eq!(order.order_total, 20.0);
        }
        let _ = std::fs::remove_file(path);
    }
}
