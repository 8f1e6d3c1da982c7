use http_body_util::combinators::BoxBody;
use hyper::body::{Bytes, Incoming};
use hyper::service::Service;
use hyper::{Request, Response, StatusCode};
use parking_lot::Mutex;
use shared::http::{make_boxed_response, serve};
use std::future::Future;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

type Responder = dyn Fn(&str) -> (StatusCode, String) + Send + Sync;

/// In-process HTTP server answering every request through `respond`, which
/// receives the request's path and query. Stands in for CouchDB and the
/// tracker.
pub struct TestServer {
    addr: SocketAddr,
    requests: Arc<Mutex<Vec<String>>>,
    handle: JoinHandle<()>,
}

impl TestServer {
    pub async fn spawn<F>(respond: F) -> Self
    where
        F: Fn(&str) -> (StatusCode, String) + Send + Sync + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let requests = Arc::new(Mutex::new(Vec::new()));

        let service = RecordingService {
            respond: Arc::new(respond),
            requests: requests.clone(),
        };
        let handle = tokio::spawn(async move {
            let _ = serve::<_, std::io::Error>(listener, service).await;
        });

        TestServer {
            addr,
            requests,
            handle,
        }
    }

    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Path and query of every request received so far.
    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().clone()
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

struct RecordingService {
    respond: Arc<Responder>,
    requests: Arc<Mutex<Vec<String>>>,
}

impl Service<Request<Incoming>> for RecordingService {
    type Response = Response<BoxBody<Bytes, std::io::Error>>;
    type Error = std::io::Error;
    type Future =
        Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send + 'static>>;

    fn call(&self, req: Request<Incoming>) -> Self::Future {
        let path = req
            .uri()
            .path_and_query()
            .map(|pq| pq.as_str().to_string())
            .unwrap_or_default();
        self.requests.lock().push(path.clone());

        let (status, body) = (self.respond)(&path);
        Box::pin(async move { Ok(make_boxed_response(status, body)) })
    }
}
