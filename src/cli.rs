use regex::Regex;

/// Default address for both the client and the server
///
/// This is a convenience value to avoid having to provide an address every
/// time the client or server is started. It can be overridden on the command
/// line or with the COURIER_ADDRESS environment variable.
pub const DEFAULT_ADDRESS: &str = "127.0.0.1:9898";

/// Default database location. In-memory keeps local runs self-contained;
/// pass a file path to keep orders across restarts.
pub const DEFAULT_DATABASE: &str = ":memory:";

/// Environment variable overriding the listen/connect address
pub const ADDRESS_VAR: &str = "COURIER_ADDRESS";
/// Environment variable overriding the database path
pub const DATABASE_VAR: &str = "COURIER_DATABASE";
/// Environment variable pointing at the bearer-token table (JSON)
pub const TOKENS_VAR: &str = "COURIER_TOKENS";
/// Environment variable pointing at the entity seed file (JSON)
pub const SEED_VAR: &str = "COURIER_SEED";

/// Errors that can occur when parsing the command line arguments
#[derive(Debug, Clone)]
pub enum CLIError {
    InvalidAddressFormat,
    MissingParameter(&'static str),
    InvalidParameter,
}

impl std::fmt::Display for CLIError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            CLIError::InvalidAddressFormat => {
                write!(f, "Invalid target format. Should be <host>:<port>")
            }
            CLIError::MissingParameter(missing) => write!(f, "Missing parameter '{}'", missing),
            CLIError::InvalidParameter => write!(f, "Invalid parameter"),
        }
    }
}

impl std::error::Error for CLIError {}

impl From<CLIError> for crate::errors::Error {
    fn from(err: CLIError) -> Self {
        crate::errors::Error::InvalidArgument(err.to_string())
    }
}

/// Validate the format of the TCP address provided by the user
///
/// Returns its input if the address is in the format <host>:<port>,
/// otherwise InvalidAddressFormat
pub fn validate_address(address: &str) -> std::result::Result<&str, CLIError> {
    let re = Regex::new(r"^[a-zA-Z0-9\.\-]+:\d{1,5}$").unwrap();
    if re.is_match(address) {
        Ok(address)
    } else {
        Err(CLIError::InvalidAddressFormat)
    }
}

/// Value of an environment variable, or the given default when unset
pub fn env_or(var: &str, default: &str) -> String {
    std::env::var(var).unwrap_or_else(|_| default.to_string())
}
