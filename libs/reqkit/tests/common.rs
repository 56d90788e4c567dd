#![allow(dead_code)]
use parking_lot::Mutex;
use reqkit::{ApiClient, ErrorPolicy, Navigator, Notice, Notifier, StaticToken};
use std::sync::Arc;

/// Records every notice and redirect the policy emits.
#[derive(Default)]
pub struct Recorder {
    pub notices: Mutex<Vec<Notice>>,
    pub redirects: Mutex<Vec<String>>,
    pub location: Mutex<String>,
}

impl Notifier for Recorder {
    fn notify(&self, notice: Notice) {
        self.notices.lock().push(notice);
    }
}

impl Navigator for Recorder {
    fn current_location(&self) -> String {
        self.location.lock().clone()
    }

    fn redirect(&self, to: &str) {
        self.redirects.lock().push(to.to_string());
        *self.location.lock() = to.to_string();
    }
}

pub fn policy() -> (Arc<ErrorPolicy>, Arc<Recorder>) {
    let rec = Arc::new(Recorder::default());
    *rec.location.lock() = "/facility/1/patients".to_string();
    (Arc::new(ErrorPolicy::new(rec.clone(), rec.clone())), rec)
}

pub fn client(base_url: &str) -> ApiClient {
    ApiClient::builder(base_url).build()
}

pub fn client_with_token(base_url: &str, token: &str) -> ApiClient {
    ApiClient::builder(base_url)
        .tokens(Arc::new(StaticToken::new(token)))
        .build()
}

/// Base URL nothing listens on.
pub fn unreachable_base_url() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind");
    let port = listener.local_addr().expect("local addr").port();
    drop(listener);
    format!("http://127.0.0.1:{port}")
}
