use std::io::{BufReader, Read};

use crate::errors::{Error, Result};
use crate::http::request::content_length;

/// An HTTP response to be sent to a client
#[derive(Debug)]
pub struct Response {
    /// Status code of the response. Optional because that's what httparse
    /// returns on the client side; responses built by the server always
    /// carry one.
    pub status: Option<u16>,
    /// Headers for the response. Content-Length is added on serialization.
    pub headers: Vec<(String, String)>,
    /// Body of the response. Give an empty string for an empty body
    pub body: String,
}

impl Response {
    /// Creates an empty OK response (204)
    pub fn ok() -> Response {
        Response {
            status: Some(204),
            headers: vec![],
            body: "".to_string(),
        }
    }

    /// Creates an OK (200) response with the given body
    pub fn ok_with_body(body: String) -> Response {
        Response {
            status: Some(200),
            headers: vec![],
            body,
        }
    }

    /// Creates a JSON response with the given status code and body
    pub fn json(code: u16, body: String) -> Response {
        Response {
            status: Some(code),
            headers: vec![(
                "Content-Type".to_string(),
                "application/json".to_string(),
            )],
            body,
        }
    }

    /// Creates an empty error response.
    ///
    /// The code must be in the 4xx or 5xx range.
    pub fn error(code: u16) -> Response {
        assert!((400..600).contains(&code), "Invalid error code");
        Response {
            status: Some(code),
            headers: vec![],
            body: "".to_string(),
        }
    }
}

/// Parse an HTTP response from a byte stream.
///
/// Mirror of request parsing, used by the client side.
pub fn parse_response<T>(mut buf_reader: BufReader<T>) -> Result<Response>
where
    T: Sized + Read,
{
    let mut buf = [0; 4096];
    let mut buf_str = String::new();

    let (body_len, parsed_len, mut response) = loop {
        let mut headers = [httparse::EMPTY_HEADER; 64];
        let mut resp = httparse::Response::new(&mut headers);
        let bytes_read = buf_reader.read(&mut buf)?;

        if bytes_read == 0 {
            return Err(Error::ConnectionReset);
        }

        buf_str.push_str(&String::from_utf8_lossy(&buf[..bytes_read]));

        match resp.parse(buf_str.as_bytes()) {
            Ok(httparse::Status::Complete(parsed_len)) => {
                let body_len = content_length(resp.headers);
                break (
                    body_len,
                    parsed_len,
                    Response {
                        status: resp.code,
                        headers: resp
                            .headers
                            .iter()
                            .map(|h| {
                                (
                                    h.name.to_string(),
                                    String::from_utf8_lossy(h.value).to_string(),
                                )
                            })
                            .collect(),
                        body: "".to_string(),
                    },
                );
            }
            Ok(httparse::Status::Partial) => continue,
            Err(err) => return Err(Error::Validation(format!("malformed response: {}", err))),
        }
    };

    while body_len > buf_str.len() - parsed_len {
        let bytes_read = buf_reader.read(&mut buf)?;
        if bytes_read == 0 {
            return Err(Error::ConnectionReset);
        }
        buf_str.push_str(&String::from_utf8_lossy(&buf[..bytes_read]));
    }
    response.body = buf_str[parsed_len..parsed_len + body_len].to_string();

    Ok(response)
}
