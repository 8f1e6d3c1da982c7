use crate::http::{make_boxed_error_response, make_boxed_response};
use http_body_util::combinators::BoxBody;
use hyper::body::{Bytes, Incoming};
use hyper::header::{CONTENT_TYPE, HeaderValue};
use hyper::service::Service;
use hyper::{Method, Request, Response, StatusCode};
use std::future::Future;
use std::marker::PhantomData;
use std::pin::Pin;

/// Serves the operational endpoints of a daemon:
///
/// - `/health` always answers `ok` while the process is up
/// - `/ready` answers `ok` once `is_ready` returns true, 503 before that
/// - `/stats` returns the JSON document produced by `stats`
pub struct AdminService<F, S, E> {
    is_ready: F,
    stats: S,
    _error: PhantomData<fn() -> E>,
}

impl<F, S, E> AdminService<F, S, E>
where
    F: Fn() -> bool,
    S: Fn() -> String,
{
    pub fn new(is_ready: F, stats: S) -> Self {
        Self {
            is_ready,
            stats,
            _error: PhantomData,
        }
    }
}

impl<F, S, E> Service<Request<Incoming>> for AdminService<F, S, E>
where
    F: Fn() -> bool + Send + Sync + 'static,
    S: Fn() -> String + Send + Sync + 'static,
    E: Send + 'static,
{
    type Response = Response<BoxBody<Bytes, E>>;
    type Error = E;
    type Future =
        Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send + 'static>>;

    fn call(&self, req: Request<Incoming>) -> Self::Future {
        let res = if req.method() != Method::GET {
            make_boxed_error_response(StatusCode::METHOD_NOT_ALLOWED)
        } else {
            match req.uri().path() {
                "/health" => make_boxed_response(StatusCode::OK, "ok\n"),
                "/ready" => match (self.is_ready)() {
                    true => make_boxed_response(StatusCode::OK, "ok\n"),
                    false => make_boxed_error_response(StatusCode::SERVICE_UNAVAILABLE),
                },
                "/stats" => {
                    let mut res = make_boxed_response(StatusCode::OK, (self.stats)());
                    res.headers_mut()
                        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
                    res
                }
                _ => make_boxed_error_response(StatusCode::NOT_FOUND),
            }
        };

        Box::pin(async move { Ok(res) })
    }
}
