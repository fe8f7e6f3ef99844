//! Routing, scenario 4 of the testable-properties list: a two-level
//! `HandlerByPath` table, exercised over real HTTP requests.

use std::collections::HashMap;
use std::io::{Read, Write};
use std::net::TcpStream;
use std::sync::Arc;

use netframe::chain::{DownstreamHandler, RequestContext};
use netframe::middleware::{EndPointHandler, HandlerByPath};
use netframe::server::http::{HttpConfig, HttpHandler};
use netframe::server::tcp::TcpServer;

struct Tagged(&'static str);

impl DownstreamHandler for Tagged {
	fn handle_request(&self, ctx: &mut RequestContext<'_>) {
		let body = format!("{}|{}", self.0, ctx.rel_path);
		ctx.handler.set_code_and_text(200, &body);
	}
}

struct HelloQuery;

impl DownstreamHandler for HelloQuery {
	fn handle_request(&self, ctx: &mut RequestContext<'_>) {
		let query = ctx.handler.get_request_query().to_string();
		let value = query.strip_prefix("key=").unwrap_or_default();
		let body = format!("HelloQuery|{}|{}", ctx.rel_path, value);
		ctx.handler.set_code_and_text(200, &body);
	}
}

fn root_handler() -> Arc<dyn DownstreamHandler> {
	let mut world = HashMap::new();
	world.insert("".to_string(), HashMap::from([("GET".to_string(), Arc::new(EndPointHandler::new(Arc::new(Tagged("HelloEmpty")))) as Arc<dyn DownstreamHandler>)]));
	world.insert("/".to_string(), HashMap::from([("GET".to_string(), Arc::new(Tagged("Hello")) as Arc<dyn DownstreamHandler>)]));
	world.insert(
		"/World".to_string(),
		HashMap::from([("POST".to_string(), Arc::new(EndPointHandler::new(Arc::new(Tagged("HelloWorld")))) as Arc<dyn DownstreamHandler>)]),
	);
	world.insert(
		"/Query".to_string(),
		HashMap::from([("GET".to_string(), Arc::new(EndPointHandler::new(Arc::new(HelloQuery))) as Arc<dyn DownstreamHandler>)]),
	);
	let world: Arc<dyn DownstreamHandler> = Arc::new(HandlerByPath::new(world));

	let mut root = HashMap::new();
	root.insert("".to_string(), HashMap::from([("GET".to_string(), Arc::new(EndPointHandler::new(Arc::new(Tagged("Empty")))) as Arc<dyn DownstreamHandler>)]));
	root.insert("/".to_string(), HashMap::from([("GET".to_string(), Arc::new(EndPointHandler::new(Arc::new(Tagged("Slash")))) as Arc<dyn DownstreamHandler>)]));
	root.insert(
		"/Hello".to_string(),
		HashMap::from([("GET".to_string(), world.clone()), ("POST".to_string(), world.clone())]),
	);
	root.insert("/Halo".to_string(), HashMap::from([("GET".to_string(), Arc::new(Tagged("Hello")) as Arc<dyn DownstreamHandler>)]));

	Arc::new(HandlerByPath::new(root))
}

fn request(port: u16, method: &str, target: &str) -> (u16, String) {
	let mut stream = TcpStream::connect(("127.0.0.1", port)).unwrap();
	stream.write_all(format!("{method} {target} HTTP/1.1\r\nHost: 127.0.0.1\r\n\r\n").as_bytes()).unwrap();
	let mut buf = Vec::new();
	stream.read_to_end(&mut buf).unwrap();
	let text = String::from_utf8_lossy(&buf).to_string();
	let mut lines = text.splitn(2, "\r\n");
	let status_line = lines.next().unwrap_or_default();
	let code: u16 = status_line.split_whitespace().nth(1).and_then(|s| s.parse().ok()).unwrap_or(0);
	let body = text.rsplit("\r\n\r\n").next().unwrap_or_default().to_string();
	(code, body)
}

#[test]
fn routes_requests_through_a_two_level_path_map() {
	let handler = Arc::new(HttpHandler::new(root_handler(), HttpConfig::default()));
	let server = TcpServer::bind("127.0.0.1:0".parse().unwrap(), handler).unwrap();
	server.start();
	let port = server.port();

	assert_eq!(request(port, "GET", "/"), (200, "Slash|".to_string()));
	assert_eq!(request(port, "GET", "/Hello"), (200, "HelloEmpty|".to_string()));
	assert_eq!(request(port, "GET", "/Hello/"), (200, "Hello|".to_string()));
	assert_eq!(request(port, "GET", "/Halo/World"), (200, "Hello|/World".to_string()));
	assert_eq!(request(port, "POST", "/Hello/World"), (200, "HelloWorld|".to_string()));
	assert_eq!(request(port, "GET", "/Hello/Query?key=123"), (200, "HelloQuery||123".to_string()));
	assert_eq!(request(port, "GET", "/Hello/World/").0, 404);
	assert_eq!(request(port, "GET", "/Hi").0, 404);

	server.terminate();
}
