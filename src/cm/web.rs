use axum::body::Body;
use axum::extract::{Path as AxumPath, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use std::convert::Infallible;
use std::future::Future;
use std::sync::Arc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tokio_stream::StreamExt as _;

use crate::cm::activity::{self, LastAccess};
use crate::cm::build_info;
use crate::cm::config::MasterConfig;
use crate::cm::error::SupervisorError;
use crate::cm::html::Page;
use crate::cm::registry;
use crate::cm::runner::{OutputStream, Runner};
use crate::cm::service::{Service, DEFAULT_STOP_TIMEOUT_SECS};

const PRE_STYLE: &str = "word-break: break-all;font-size: 0.9em;";
const LINK_STYLE: &str = "margin: 0 0.25em;";

#[derive(Clone)]
pub struct WebState {
    pub cfg: Arc<MasterConfig>,
    pub runner: Runner,
}

pub fn build_router(state: WebState) -> Router {
    Router::new()
        .route("/", get(info_page))
        .route("/boot/:name", get(boot_page))
        .route("/start/:name", get(start_page))
        .route("/stop/:name", get(stop_page))
        .route("/kill/:name", get(kill_page))
        .route("/remove/:name", get(remove_page))
        .route("/logs/:name", get(logs_page))
        .with_state(state)
}

/// Spawn a page producer and hand its chunk stream back as the response
/// body. When the client disconnects, the receiver drops and the producer
/// observes failed writes.
fn stream_page<F, Fut>(f: F) -> Response
where
    F: FnOnce(Page) -> Fut,
    Fut: Future<Output = ()> + Send + 'static,
{
    let (page, rx) = Page::channel();
    tokio::spawn(f(page));
    let body = Body::from_stream(UnboundedReceiverStream::new(rx).map(Ok::<_, Infallible>));
    ([(header::CONTENT_TYPE, "text/html")], body).into_response()
}

fn breaks(pairs: &[(&str, bool)]) -> Vec<(String, bool)> {
    pairs.iter().map(|(p, f)| (p.to_string(), *f)).collect()
}

/// Follow a service's logs into the page until a break condition or EOF.
/// Returns false when the page should not proceed to its redirect (error
/// rendered inline, or client gone).
async fn follow_logs(
    page: &Page,
    runner: &Runner,
    service: &Service,
    break_on: Vec<(String, bool)>,
    tail: Option<u32>,
) -> bool {
    let mut logs = match service.logs(runner, break_on, tail) {
        Ok(logs) => logs,
        Err(e) => {
            page.text(&e.to_string());
            return false;
        }
    };
    loop {
        match logs.next_chunk().await {
            Ok(Some(chunk)) => {
                if !page.text_bytes(&chunk) {
                    return false;
                }
            }
            Ok(None) => return true,
            Err(e) => {
                page.text(&e.to_string());
                return false;
            }
        }
    }
}

/// Copy a captured-output stream into the page until it ends.
async fn pump_stream(page: &Page, mut stream: OutputStream) -> bool {
    while let Some(chunk) = stream.next_chunk().await {
        if !page.text_bytes(&chunk) {
            return false;
        }
    }
    match stream.wait_code().await {
        Ok(0) => true,
        Ok(code) => {
            page.text(&SupervisorError::ProcessExit(code).to_string());
            false
        }
        Err(e) => {
            page.text(&e.to_string());
            false
        }
    }
}

async fn info_page(State(st): State<WebState>) -> Response {
    stream_page(move |page| async move {
        let _doc = page.document();

        let services = match registry::discover(&st.runner, &st.cfg).await {
            Ok(services) => services,
            Err(e) => {
                page.text(&e.to_string());
                return;
            }
        };

        {
            let _table = page.table();
            {
                let _thead = page.thead();
                for key in ["name", "status", "instances", "actions"] {
                    let _th = page.th();
                    page.text(key);
                }
            }
            let _tbody = page.tbody();
            for service in &services {
                let _tr = page.tr();
                {
                    let _td = page.td();
                    page.text(&service.name);
                }
                {
                    let _td = page.td();
                    page.text(&service.status);
                }
                {
                    let _td = page.td();
                    for state in service.states() {
                        page.text(&state);
                        page.raw("<br/>");
                    }
                }
                let _td = page.td();
                {
                    let _a = page.a(&format!("/logs/{}", service.name), LINK_STYLE);
                    page.text("Logs");
                }
                if service.is_exited() {
                    let _a = page.a(&format!("/boot/{}", service.name), LINK_STYLE);
                    page.text("Boot");
                }
                if service.is_running() {
                    if let Ok(url) = service.url(&st.cfg) {
                        let _a = page.a(&url, LINK_STYLE);
                        page.text("Open");
                    }
                    let _a = page.a(&format!("/kill/{}", service.name), LINK_STYLE);
                    page.text("Kill");
                }
            }
        }

        {
            let _table = page.table();
            {
                let _thead = page.thead();
                for key in ["name", "last access", "last url"] {
                    let _th = page.th();
                    page.text(key);
                }
            }
            let _tbody = page.tbody();
            for service in &services {
                let access = match activity::last_access(service, &st.runner).await {
                    Ok(access) => access,
                    Err(e) => {
                        tracing::warn!("last_access failed for {}: {e}", service.name);
                        continue;
                    }
                };
                let LastAccess::At { at, url } = access else {
                    continue;
                };
                let _tr = page.tr();
                {
                    let _td = page.td();
                    page.text(&service.name);
                }
                {
                    let _td = page.td();
                    page.text(&at.format("%Y-%m-%d %H:%M:%S").to_string());
                }
                let _td = page.td();
                page.text(&url);
            }
        }

        let _footer = page.footer();
        page.text(&build_info::banner());
    })
}

async fn boot_page(State(st): State<WebState>, AxumPath(name): AxumPath<String>) -> Response {
    stream_page(move |page| async move {
        let _doc = page.document();
        page.with_scroll();

        let url = {
            let _pre = page.pre(PRE_STYLE);
            let service = match registry::get_by_name(&st.runner, &st.cfg, &name).await {
                Ok(service) => service,
                Err(e) => {
                    page.text(&e.to_string());
                    return;
                }
            };

            page.text(&format!("Booting, {name}...\n\n"));
            match service.boot(&st.runner).await {
                Ok(out) => page.text_bytes(&out),
                Err(e) => {
                    page.text(&e.to_string());
                    return;
                }
            };

            let break_on = breaks(&[("running on", false), ("exited with code", true)]);
            if !follow_logs(&page, &st.runner, &service, break_on, None).await {
                return;
            }
            service.url(&st.cfg)
        };

        match url {
            Ok(url) => page.redirect_after(&url).await,
            // No redirect target; the page simply ends.
            Err(e) => {
                page.text(&e.to_string());
            }
        }
    })
}

async fn start_page(State(st): State<WebState>, AxumPath(name): AxumPath<String>) -> Response {
    stream_page(move |page| async move {
        let _doc = page.document();
        page.with_scroll();

        let url = {
            let _pre = page.pre(PRE_STYLE);
            let service = match registry::get_by_name(&st.runner, &st.cfg, &name).await {
                Ok(service) => service,
                Err(e) => {
                    page.text(&e.to_string());
                    return;
                }
            };

            page.text(&format!("Starting, {name}...\n\n"));
            match service.start(&st.runner).await {
                Ok(out) => page.text_bytes(&out),
                Err(e) => {
                    page.text(&e.to_string());
                    return;
                }
            };

            let break_on = breaks(&[("running on", false), ("exited with code", true)]);
            if !follow_logs(&page, &st.runner, &service, break_on, Some(1)).await {
                return;
            }
            service.url(&st.cfg)
        };

        match url {
            Ok(url) => page.redirect_after(&url).await,
            Err(e) => {
                page.text(&e.to_string());
            }
        }
    })
}

async fn stop_page(State(st): State<WebState>, AxumPath(name): AxumPath<String>) -> Response {
    stream_page(move |page| async move {
        let _doc = page.document();
        page.with_scroll();

        let done = {
            let _pre = page.pre(PRE_STYLE);
            let service = match registry::get_by_name(&st.runner, &st.cfg, &name).await {
                Ok(service) => service,
                Err(e) => {
                    page.text(&e.to_string());
                    return;
                }
            };

            page.text(&format!("Stopping, {name}...\n\n"));
            let stop_stream = match service.stop_streaming(&st.runner, DEFAULT_STOP_TIMEOUT_SECS) {
                Ok(stream) => stream,
                Err(e) => {
                    page.text(&e.to_string());
                    return;
                }
            };

            // Interleave the stop output with the log tail that observes the
            // containers going down.
            let break_on = breaks(&[("exited with code", false)]);
            let (stopped, followed) = tokio::join!(
                pump_stream(&page, stop_stream),
                follow_logs(&page, &st.runner, &service, break_on, Some(1)),
            );
            stopped && followed
        };

        if done {
            page.redirect_after("/").await;
        }
    })
}

async fn kill_page(State(st): State<WebState>, AxumPath(name): AxumPath<String>) -> Response {
    stream_page(move |page| async move {
        let _doc = page.document();
        page.with_scroll();

        let done = {
            let _pre = page.pre(PRE_STYLE);
            let service = match registry::get_by_name(&st.runner, &st.cfg, &name).await {
                Ok(service) => service,
                Err(e) => {
                    page.text(&e.to_string());
                    return;
                }
            };

            page.text(&format!("Killing, {name}...\n\n"));
            match service.kill(&st.runner).await {
                Ok(out) => page.text_bytes(&out),
                Err(e) => {
                    page.text(&e.to_string());
                    return;
                }
            };

            let break_on = breaks(&[("exited with code", true)]);
            follow_logs(&page, &st.runner, &service, break_on, Some(50)).await
        };

        if done {
            page.redirect_after("/").await;
        }
    })
}

async fn remove_page(State(st): State<WebState>, AxumPath(name): AxumPath<String>) -> Response {
    stream_page(move |page| async move {
        let _doc = page.document();

        let done = {
            let _pre = page.pre(PRE_STYLE);
            let service = match registry::get_by_name(&st.runner, &st.cfg, &name).await {
                Ok(service) => service,
                Err(e) => {
                    page.text(&e.to_string());
                    return;
                }
            };

            page.text(&format!("Removing, {name}...\n\n"));
            match service.remove(&st.runner).await {
                Ok(()) => {
                    page.text("Removed.\n");
                    true
                }
                Err(e) => {
                    page.text(&e.to_string());
                    false
                }
            }
        };

        if done {
            page.redirect_after("/").await;
        }
    })
}

async fn logs_page(State(st): State<WebState>, AxumPath(name): AxumPath<String>) -> Response {
    stream_page(move |page| async move {
        let _doc = page.document();
        let _code = page.code();

        let service = match registry::get_by_name(&st.runner, &st.cfg, &name).await {
            Ok(service) => service,
            Err(e) => {
                page.text(&e.to_string());
                return;
            }
        };

        follow_logs(&page, &st.runner, &service, Vec::new(), None).await;
    })
}
