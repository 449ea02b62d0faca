//! # waypost
//!
//! A small, composable request pipeline for HTTP services behind a load
//! balancer: an ordered chain of middleware in front of a router, plus a
//! liveness probe.
//!
//! ## The chain
//!
//! ```text
//! request ─▶ Timeout ─▶ Gzip ─▶ Cors ─▶ Auth ─▶ Router ─▶ your handler
//! ```
//!
//! - **Timeout**: races the rest of the chain against a deadline → `408`
//! - **Gzip**: compresses bodies for clients that accept it
//! - **Cors**: answers preflight, enforces origin / method allow-lists
//! - **Auth**: HTTP Basic, with `/health` always exempt
//!
//! Each one is switched on or off from configuration. The order above is what
//! [`Pipeline::from_config`] builds; [`Pipeline::builder`] lets you stack your
//! own.
//!
//! ## What waypost leaves to you
//!
//! Request parsing beyond method, origin and credentials. Body validation.
//! Anything your routes do. waypost hands your handler a [`Request`] and
//! sends whatever [`Response`] it returns.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use waypost::{Config, Request, Response, Service};
//!
//! #[tokio::main]
//! async fn main() {
//!     let service = Service::new(Config::default());
//!
//!     // `/health` is already registered.
//!     let app = service.router()
//!         .get("/users/{id}", get_user);
//!
//!     service.serve(app).await.unwrap();
//! }
//!
//! async fn get_user(req: Request) -> Response {
//!     let id = req.param("id").unwrap_or("unknown");
//!     Response::json(format!(r#"{{"id":"{id}"}}"#))
//! }
//! ```

mod error;
mod handler;
mod pipeline;
mod request;
mod response;
mod router;
mod server;
mod service;

pub mod config;
pub mod exception;
pub mod health;
pub mod logging;
pub mod middleware;
pub mod upstream;

pub use config::{Cli, Config};
pub use error::Error;
pub use exception::{ErrorWriter, Exception};
pub use handler::{BoxFuture, Handler};
pub use middleware::{Middleware, Next};
pub use pipeline::{Pipeline, PipelineBuilder};
pub use request::Request;
pub use response::{ContentType, IntoResponse, Json, Message, Response, ResponseBuilder, Xml};
pub use router::Router;
pub use server::Server;
pub use service::Service;
