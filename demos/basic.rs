//! Minimal waypost service: JSON endpoints behind the full middleware chain.
//!
//! Run with:
//!   cargo run --example basic -- --print-config
//!
//! Try:
//!   curl -i http://localhost:8080/health
//!   curl -i http://localhost:8080/users/42
//!   curl -i --compressed http://localhost:8080/users/42
//!   curl -i -X OPTIONS -H 'Origin: https://app.example.com' http://localhost:8080/users/42
//!   curl -i http://localhost:8080/slow          # 408 once the timeout elapses
//!
//! Turn on auth with API_USER / API_PASSWORD and a config file containing
//!   [middleware.auth]
//!   enabled = true

use std::time::Duration;

use clap::Parser;
use http::StatusCode;
use waypost::{Cli, Json, Message, Request, Response, Service, logging};

#[tokio::main]
async fn main() {
    let config = Cli::parse()
        .load()
        .unwrap_or_else(|e| logging::fatal(format!("error in config: {e}")));

    let service = Service::new(config);

    let app = service.router()
        .get("/users/{id}",    get_user)
        .post("/users",        create_user)
        .delete("/users/{id}", delete_user)
        .get("/slow",          slow);

    if let Err(e) = service.serve(app).await {
        logging::fatal(e);
    }
}

// GET /users/{id}
async fn get_user(req: Request) -> Response {
    let id = req.param("id").unwrap_or("unknown");
    Response::json(format!(r#"{{"id":"{id}","name":"alice"}}"#))
}

// POST /users
async fn create_user(req: Request) -> Response {
    if req.body().is_empty() {
        return waypost::ErrorWriter::default().bad_parameters("body");
    }

    Json(Message::new("created")).with_status(StatusCode::CREATED)
}

// DELETE /users/{id} → 204 No Content
async fn delete_user(_req: Request) -> StatusCode {
    StatusCode::NO_CONTENT
}

// Gives up as soon as the timeout middleware cancels the request.
async fn slow(req: Request) -> Response {
    tokio::select! {
        () = req.cancelled() => Response::status(StatusCode::SERVICE_UNAVAILABLE),
        () = tokio::time::sleep(Duration::from_secs(300)) => Response::text("finally"),
    }
}
