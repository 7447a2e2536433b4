use std::io::{BufReader, Read};

use crate::errors::{Error, Result};

/// Represents an HTTP request.
#[derive(Debug)]
pub struct Request {
    /// The HTTP method used in the request
    pub method: String,
    /// The full path of the request, query string included
    pub path: String,
    /// Headers of the request
    pub headers: Vec<(String, String)>,
    /// Body of the request
    pub body: String,
}

impl Request {
    /// Create a new GET request for the given path, with an empty body
    pub fn get(path: &str) -> Request {
        Request {
            method: "GET".to_string(),
            path: path.to_string(),
            headers: vec![],
            body: "".to_string(),
        }
    }

    /// Create a new POST request for the given path, with the given body
    pub fn post(path: &str, body: String) -> Request {
        Request {
            method: "POST".to_string(),
            path: path.to_string(),
            headers: vec![],
            body,
        }
    }

    /// Create a new PUT request for the given path, with the given body
    pub fn put(path: &str, body: String) -> Request {
        Request {
            method: "PUT".to_string(),
            path: path.to_string(),
            headers: vec![],
            body,
        }
    }

    /// Create a new DELETE request for the given path, with the given body
    pub fn delete(path: &str, body: String) -> Request {
        Request {
            method: "DELETE".to_string(),
            path: path.to_string(),
            headers: vec![],
            body,
        }
    }

    /// Attach a bearer token, builder style. Used by the client binary and
    /// the tests.
    pub fn with_bearer(mut self, token: &str) -> Request {
        self.headers
            .push(("Authorization".to_string(), format!("Bearer {}", token)));
        self
    }

    /// First header with the given name, compared case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// The bearer token of the Authorization header, if any.
    pub fn bearer_token(&self) -> Option<&str> {
        self.header("Authorization")
            .and_then(|value| value.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|token| !token.is_empty())
    }

    /// The path without its query string, the part routing matches on.
    pub fn route_path(&self) -> &str {
        self.path.split('?').next().unwrap_or(&self.path)
    }

    /// Value of one query-string parameter, if present.
    pub fn query_param(&self, name: &str) -> Option<&str> {
        let (_, query) = self.path.split_once('?')?;
        query.split('&').find_map(|pair| {
            let (key, value) = pair.split_once('=')?;
            (key == name).then_some(value)
        })
    }
}

/// Parse an HTTP request from a byte stream.
///
/// Reads until the head parses completely, then keeps reading until the body
/// matches Content-Length. A peer closing the connection mid-request is
/// reported as ConnectionReset, malformed bytes as a validation error the
/// server answers with a 400.
pub fn parse_request<T>(mut buf_reader: BufReader<T>) -> Result<Request>
where
    T: Sized + Read,
{
    let mut buf = [0; 4096];
    let mut buf_str = String::new();

    let (body_len, parsed_len, mut request) = loop {
        let mut headers = [httparse::EMPTY_HEADER; 64];
        let mut req = httparse::Request::new(&mut headers);
        let bytes_read = buf_reader.read(&mut buf)?;

        if bytes_read == 0 {
            return Err(Error::ConnectionReset);
        }

        buf_str.push_str(&String::from_utf8_lossy(&buf[..bytes_read]));

        match req.parse(buf_str.as_bytes()) {
            Ok(httparse::Status::Complete(parsed_len)) => {
                let body_len = content_length(req.headers);
                break (
                    body_len,
                    parsed_len,
                    Request {
                        method: req.method.unwrap_or("GET").to_string(),
                        path: req.path.unwrap_or("/").to_string(),
                        headers: req
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
            Err(err) => return Err(Error::Validation(format!("malformed request: {}", err))),
        }
    };

    while body_len > buf_str.len() - parsed_len {
        let bytes_read = buf_reader.read(&mut buf)?;
        if bytes_read == 0 {
            return Err(Error::ConnectionReset);
        }
        buf_str.push_str(&String::from_utf8_lossy(&buf[..bytes_read]));
    }
    request.body = buf_str[parsed_len..parsed_len + body_len].to_string();

    Ok(request)
}

/// Content-Length declared by a parsed header block, 0 if absent
pub(crate) fn content_length(headers: &[httparse::Header]) -> usize {
    headers
        .iter()
        .find(|h| h.name.eq_ignore_ascii_case("Content-Length"))
        .and_then(|length| String::from_utf8_lossy(length.value).parse::<usize>().ok())
        .unwrap_or(0)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_parse_simple_request() {
        let req_str = b"GET / HTTP/1.1\r\nHost: localhost:8080\r\nUser-Agent: curl/7.68.0\r\nAccept: */*\r\n\r\n";
        let buf_reader = BufReader::new(&req_str[..]);

        let parsed_req = parse_request(buf_reader).unwrap();

        assert_eq!(parsed_req.method, "GET");
        assert_eq!(parsed_req.path, "/");
        assert_eq!(parsed_req.headers.len(), 3);
        assert_eq!(parsed_req.body, "");
    }

    #[test]
    fn test_parse_incomplete_request() {
        let req_str =
            b"GET / HTTP/1.1\r\nHost: localhost:8080\r\nUser-Agent: curl/7.68.0\r\nAccept: */*";
        let buf_reader = BufReader::new(&req_str[..]);

        assert!(parse_request(buf_reader).is_err());
    }

    #[test]
    fn test_parse_request_with_body() {
        let body = "{ \"content\": \"Hello, world!\" }";
        let req_str = format!(
            "POST /api/orders HTTP/1.1\r\nHost: localhost:8080\r\nContent-Length: {}\r\n\r\n{}",
            body.len(),
            body
        );

        let parsed_req = parse_request(BufReader::new(req_str.as_bytes())).unwrap();

        assert_eq!(parsed_req.method, "POST");
        assert_eq!(parsed_req.path, "/api/orders");
        assert_eq!(parsed_req.body, body);
    }

    #[test]
    fn test_parse_request_with_body_split_across_reads() {
        // 5000 bytes of body forces at least two reads of the 4096 buffer
        let body = "x".repeat(5000);
        let req_str = format!(
            "POST / HTTP/1.1\r\nContent-Length: {}\r\n\r\n{}",
            body.len(),
            body
        );

        let parsed_req = parse_request(BufReader::new(req_str.as_bytes())).unwrap();
        assert_eq!(parsed_req.body, body);
    }

    #[test]
    fn test_bearer_token() {
        let req = Request::get("/api/orders/1").with_bearer("tok-123");
        assert_eq!(req.bearer_token(), Some("tok-123"));

        let req = Request::get("/api/orders/1");
        assert_eq!(req.bearer_token(), None);

        let mut req = Request::get("/api/orders/1");
        req.headers
            .push(("authorization".to_string(), "Bearer abc".to_string()));
        assert_eq!(req.bearer_token(), Some("abc"));
    }

    #[test]
    fn test_query_params() {
        let req = Request::get("/api/orders/orderslist/r1?status=placed&limit=5");
        assert_eq!(req.route_path(), "/api/orders/orderslist/r1");
        assert_eq!(req.query_param("status"), Some("placed"));
        assert_eq!(req.query_param("limit"), Some("5"));
        assert_eq!(req.query_param("missing"), None);

        let req = Request::get("/api/orders/1");
        assert_eq!(req.route_path(), "/api/orders/1");
        assert_eq!(req.query_param("status"), None);
    }
}
