use common::api::ApiResponse;
use common::cli::*;
use common::errors::Result;
use common::http::{code_to_string, HttpClient, Response};
use common::routes;
use serde_json::json;

/// Operator actions mapped onto the API, one per lifecycle step.
#[derive(Debug)]
enum Action {
    /// get <order_id>
    Get,
    /// place <restaurant_id> <address_id>
    Place,
    /// process <order_id> <status>
    Process,
    /// assign <order_id> <driver_id>
    Assign,
    /// deliver <order_id>
    Deliver,
    /// picked <status> <driver_id>
    Picked,
    /// orders <restaurant_id> <keyword>
    Orders,
}

#[derive(Debug)]
struct CLIOptions {
    target: String,
    token: String,
    action: Action,
    args: Vec<String>,
}

fn parse_action(action: String) -> std::result::Result<Action, CLIError> {
    match action.to_ascii_lowercase().as_str() {
        "get" => Ok(Action::Get),
        "place" => Ok(Action::Place),
        "process" => Ok(Action::Process),
        "assign" => Ok(Action::Assign),
        "deliver" => Ok(Action::Deliver),
        "picked" => Ok(Action::Picked),
        "orders" => Ok(Action::Orders),
        _ => Err(CLIError::InvalidParameter),
    }
}

/// Parse `[target] <token> <action> <args...>`. The target may be omitted,
/// in which case the default address is used.
fn parse_cli_args<I>(mut args: I) -> Result<CLIOptions>
where
    I: Iterator<Item = String>,
{
    assert!(args.next().is_some()); // Skip the program name
    let maybe_target = args
        .next()
        .ok_or(CLIError::MissingParameter("target or token"))?;

    let (target, token) = match validate_address(&maybe_target) {
        Ok(target) => (
            target.to_string(),
            args.next().ok_or(CLIError::MissingParameter("token"))?,
        ),
        Err(_) => (env_or(ADDRESS_VAR, DEFAULT_ADDRESS), maybe_target),
    };

    let action = args
        .next()
        .ok_or(CLIError::MissingParameter("action"))
        .and_then(parse_action)?;

    Ok(CLIOptions {
        target,
        token,
        action,
        args: args.collect(),
    })
}

fn print_response(response: &Response) {
    match response.status {
        Some(code) => println!("Response Status: {} - {}", code, code_to_string(code)),
        None => println!("No status in response"),
    }
    if !response.body.is_empty() {
        match serde_json::from_str::<ApiResponse>(&response.body) {
            Ok(envelope) => println!("Response Body: {:#?}", envelope),
            Err(err) => println!("Error parsing response body: {}\n{:?}", err, response.body),
        }
    }
}

fn arg<'a>(options: &'a CLIOptions, index: usize, name: &'static str) -> Result<&'a str> {
    options
        .args
        .get(index)
        .map(String::as_str)
        .ok_or_else(|| CLIError::MissingParameter(name).into())
}

fn order_id_arg(options: &CLIOptions) -> Result<i64> {
    arg(options, 0, "order_id")?
        .parse::<i64>()
        .map_err(|_| CLIError::InvalidParameter.into())
}

/// A small sample order for the given restaurant and address, enough to walk
/// a full lifecycle against a seeded server.
fn sample_order(restaurant_id: &str, address_id: &str) -> String {
    json!({
        "orderItems": [{
            "foodId": "f1",
            "quantity": 1,
            "price": 10.0,
            "additives": [{"id": "a1", "title": "Cheese", "price": 1.0}]
        }],
        "orderTotal": 10.0,
        "deliveryFee": 2.0,
        "grandTotal": 12.0,
        "deliveryAddress": address_id,
        "restaurantId": restaurant_id,
        "paymentMethod": "card"
    })
    .to_string()
}

fn run(options: CLIOptions) -> Result<()> {
    let mut client = HttpClient::new(&options.target)?;
    let token = Some(options.token.as_str());

    let response = match options.action {
        Action::Get => {
            let id = order_id_arg(&options)?;
            client.send("GET", &routes::order_by_id(id), token, "")?
        }
        Action::Place => {
            let restaurant = arg(&options, 0, "restaurant_id")?;
            let address = arg(&options, 1, "address_id")?;
            let body = sample_order(restaurant, address);
            client.send("POST", routes::paths::ORDERS, token, &body)?
        }
        Action::Process => {
            let id = order_id_arg(&options)?;
            let status = arg(&options, 1, "status")?;
            client.send("PUT", &routes::process_order(id, status), token, "")?
        }
        Action::Assign => {
            let id = order_id_arg(&options)?;
            let driver = arg(&options, 1, "driver_id")?;
            client.send("PUT", &routes::add_driver(id, driver), token, "")?
        }
        Action::Deliver => {
            let id = order_id_arg(&options)?;
            client.send("PUT", &routes::mark_delivered(id), token, "")?
        }
        Action::Picked => {
            let status = arg(&options, 0, "status")?;
            let driver = arg(&options, 1, "driver_id")?;
            client.send("GET", &routes::picked_orders(status, driver), token, "")?
        }
        Action::Orders => {
            let restaurant = arg(&options, 0, "restaurant_id")?;
            let keyword = arg(&options, 1, "keyword")?;
            client.send("GET", &routes::restaurant_orders(restaurant, keyword), token, "")?
        }
    };

    print_response(&response);
    Ok(())
}

fn main() {
    env_logger::init();
    let options = match parse_cli_args(std::env::args()) {
        Ok(options) => options,
        Err(err) => {
            eprintln!("{}", err);
            eprintln!("Usage: client [target] <token> <get|place|process|assign|deliver|picked|orders> <args...>");
            std::process::exit(2);
        }
    };
    if let Err(err) = run(options) {
        eprintln!("{}", err);
        std::process::exit(1);
    }
}
