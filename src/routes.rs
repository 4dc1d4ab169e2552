use log::warn;
use std::sync::Arc;

use actix_web::{HttpRequest, HttpResponse, Responder, guard, http::Method, web};
use actix_ws::{Message, MessageStream, Session};
use tokio::sync::broadcast;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;

use crate::error::GestureError;
use crate::event::InputEvent;
use crate::hub::{DispatchedEvent, EventHub};

#[derive(Clone)]
pub struct AppState {
    pub hub: Arc<EventHub>,
}

// session-wide events (rotation, termination) pass every filter
fn passes_filter(line_filter: Option<usize>, event: &InputEvent) -> bool {
    match (line_filter, event.line()) {
        (Some(filter), Some(line)) => filter == line,
        _ => true,
    }
}

async fn handle_event_websocket(
    mut session: Session,
    mut client_stream: MessageStream,
    rx: broadcast::Receiver<DispatchedEvent>,
    line_filter: Option<usize>,
) {
    let mut events = BroadcastStream::new(rx);

    loop {
        tokio::select! {
            msg = client_stream.recv() => {
                let Some(msg) = msg else { break; };

                match msg {
                    Ok(Message::Ping(bytes)) => {
                        let _ = session.pong(&bytes).await;
                    }
                    Ok(Message::Close(reason)) => {
                        let _ = session.close(reason).await;
                        break;
                    }
                    Ok(Message::Text(_))
                    | Ok(Message::Binary(_))
                    | Ok(Message::Pong(_))
                    | Ok(Message::Continuation(_))
                    | Ok(Message::Nop) => {}
                    Err(_) => break,
                }
            }
            event = events.next() => {
                let Some(event) = event else { break; };

                match event {
                    Ok(event) => {
                        if passes_filter(line_filter, &event.event) {
                            if let Ok(text) = serde_json::to_string(&event) {
                                if session.text(text).await.is_err() {
                                    warn!("WebSocket client disconnected");
                                    break;
                                }
                            }
                        }
                    }
                    Err(BroadcastStreamRecvError::Lagged(n)) => {
                        let notice = GestureError::Read(format!("Event stream lagged by {n} messages"));
                        if session.text(notice.to_string()).await.is_err() {
                            warn!("WebSocket client lagged and disconnected");
                            break;
                        }
                    }
                }
            }
        }
    }
}

impl AppState {
    pub fn api_scope(&self, base_path: &str) -> actix_web::Scope {
        web::scope(base_path)
            .service(get_only("/lines").route(web::get().to(list_lines)))
            .service(get_only("/session").route(web::get().to(session_status)))
            .service(get_only("/events").route(web::get().to(events_ws_all)))
            .service(get_only("/line/{line}").route(web::get().to(line_descriptor)))
            .service(get_only("/line/{line}/held").route(web::get().to(line_held)))
            .service(get_only("/line/{line}/events").route(web::get().to(events_ws_line)))
    }
}

fn get_only(path: &str) -> actix_web::Resource {
    web::resource(path).route(
        web::route()
            .guard(guard_not_methods(&[Method::GET]))
            .to(method_not_allowed),
    )
}

async fn list_lines(state: web::Data<AppState>) -> Result<impl Responder, GestureError> {
    Ok(web::Json(state.hub.list_lines()))
}

async fn session_status(state: web::Data<AppState>) -> Result<impl Responder, GestureError> {
    Ok(web::Json(state.hub.status()))
}

async fn line_descriptor(
    req: HttpRequest,
    state: web::Data<AppState>,
) -> Result<impl Responder, GestureError> {
    let line = parse_line(&req)?;
    let desc = state.hub.line_descriptor(line)?;

    Ok(web::Json(desc))
}

async fn line_held(
    req: HttpRequest,
    state: web::Data<AppState>,
) -> Result<impl Responder, GestureError> {
    let line = parse_line(&req)?;
    let held = state.hub.is_held(line)?;

    Ok(web::Json(u8::from(held)))
}

async fn events_ws_all(
    req: HttpRequest,
    stream: web::Payload,
    state: web::Data<AppState>,
) -> Result<HttpResponse, GestureError> {
    start_event_websocket(&req, stream, &state, None)
}

async fn events_ws_line(
    req: HttpRequest,
    stream: web::Payload,
    state: web::Data<AppState>,
) -> Result<HttpResponse, GestureError> {
    let line = parse_line(&req)?;
    state.hub.line_descriptor(line)?;
    start_event_websocket(&req, stream, &state, Some(line))
}

fn start_event_websocket(
    req: &HttpRequest,
    stream: web::Payload,
    state: &AppState,
    line_filter: Option<usize>,
) -> Result<HttpResponse, GestureError> {
    let rx = state.hub.subscribe_events();
    let (response, session, client_stream) = actix_ws::handle(req, stream)
        .map_err(|e| GestureError::InvalidValue(format!("Websocket error: {e}")))?;

    actix_web::rt::spawn(async move {
        handle_event_websocket(session, client_stream, rx, line_filter).await;
    });

    Ok(response)
}

fn parse_line(req: &HttpRequest) -> Result<usize, GestureError> {
    let line = req
        .match_info()
        .get("line")
        .ok_or_else(|| GestureError::InvalidValue("Missing line".into()))?;
    let line = line
        .parse::<usize>()
        .map_err(|_| GestureError::InvalidValue("Invalid line".into()))?;

    Ok(line)
}

async fn method_not_allowed() -> HttpResponse {
    HttpResponse::MethodNotAllowed().finish()
}

fn guard_not_methods(methods: &[Method]) -> impl guard::Guard + use<> {
    let allowed: Vec<Method> = methods.to_vec();
    guard::fn_guard(move |ctx| !allowed.iter().any(|m| m == ctx.head().method))
}
