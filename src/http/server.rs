use std::io::{BufReader, Write};
use std::net::{TcpListener, TcpStream};

use log::{debug, error};

use crate::errors;
use crate::http::{parse_request, Request, Response};
use crate::threadpool::ThreadPool;

/// Turn an HTTP status code into its reason phrase
pub fn code_to_string(code: u16) -> &'static str {
    match code {
        200 => "OK",
        201 => "Created",
        204 => "No Content",
        400 => "Bad Request",
        401 => "Unauthorized",
        403 => "Forbidden",
        404 => "Not Found",
        409 => "Conflict",
        500 => "Internal Server Error",
        c => panic!("Missing reason phrase for code {}", c),
    }
}

/// This is the main server.
///
/// It listens for incoming connections on a TCP socket, parses the requests
/// and dispatches them to a handler. Whatever the handler produces is then
/// converted into an HTTP response and sent back to the client.
pub struct HttpServer {
    listener: TcpListener,
}

impl HttpServer {
    /// Create a new server listening on the given address
    pub fn new(addr: &str) -> errors::Result<Self> {
        Ok(HttpServer {
            listener: TcpListener::bind(addr)?,
        })
    }

    /// Start the server
    ///
    /// Calls the handler with the incoming requests. Uses a threadpool
    /// internally to handle the requests concurrently on as many threads as
    /// the system can handle.
    ///
    /// This function is blocking, with no real way of stopping it (except
    /// the socket being forcefully closed by the OS or the program being
    /// killed)
    pub fn serve<F>(&self, handler: F)
    where
        F: Fn(Request) -> Response + Send + Sync + 'static + Clone,
    {
        let threadpool = ThreadPool::new(
            std::thread::available_parallelism()
                .map(|x| x.into())
                .unwrap_or(4),
        );
        for stream in self.listener.incoming() {
            let mut stream = match stream {
                Ok(stream) => stream,
                Err(err) => {
                    error!("failed to accept connection: {}", err);
                    continue;
                }
            };
            let handler = handler.clone();
            threadpool.execute(move || handle_stream(&mut stream, &handler))
        }
    }

    /// Utility function for one-shot servers.
    ///
    /// This is mostly for testing, it listens to a single connection,
    /// processes the request and exits.
    pub fn serve_once<F>(&self, handler: F)
    where
        F: Fn(Request) -> Response,
    {
        match self.listener.incoming().next() {
            Some(Ok(mut stream)) => handle_stream(&mut stream, &handler),
            Some(Err(err)) => error!("failed to accept connection: {}", err),
            None => (),
        }
    }

    /// The address the server actually bound, useful when listening on
    /// port 0.
    pub fn local_addr(&self) -> errors::Result<std::net::SocketAddr> {
        Ok(self.listener.local_addr()?)
    }
}

/// Parse an HTTP request from a TCP stream, call the handler and write back
/// the answer
fn handle_stream<F>(mut stream: &mut TcpStream, handler: F)
where
    F: Fn(Request) -> Response,
{
    let buf_reader = BufReader::new(&mut stream);
    match parse_request(buf_reader) {
        Ok(req) => {
            debug!("{} {}", req.method, req.path);
            respond(stream, handler(req))
        }
        Err(err) => {
            debug!("dropping unparseable request: {}", err);
            respond(stream, Response::error(400))
        }
    }
}

/// Writes an HTTP response to a stream
fn respond(stream: &mut TcpStream, resp: Response) {
    let code = resp.status.unwrap_or(500);
    let serialized = format!(
        "HTTP/1.1 {} {}\r\nContent-Length: {}\r\n{}\r\n{}",
        code,
        code_to_string(code),
        resp.body.len(),
        resp.headers
            .iter()
            .map(|(k, v)| format!("{}: {}\r\n", k, v))
            .collect::<Vec<_>>()
            .join(""),
        resp.body
    );

    if let Err(err) = stream.write_all(serialized.as_bytes()) {
        error!("failed to respond: {}", err);
    }
}
