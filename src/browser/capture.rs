//! CDP event capture: network request/response log, the main-document
//! response (status + headers), and page console output.
//!
//! Listeners are spawned per attempt and aborted at teardown; buffers are
//! owned by the watch structs, never process-global, so attempts stay
//! isolated from each other.

use anyhow::{Context, Result};
use chromiumoxide::cdp::browser_protocol::network::{
    EnableParams, EventRequestWillBeSent, EventResponseReceived, Headers,
};
use chromiumoxide::cdp::js_protocol::runtime::{EventConsoleApiCalled, RemoteObject};
use chromiumoxide::Page;
use futures::StreamExt;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use tokio::task::JoinHandle;

use crate::core::types::{ConsoleEntry, NetLogEntry};

/// The response that answered the top-level navigation.
#[derive(Debug, Clone, Default)]
pub struct MainResponse {
    pub status: u16,
    pub url: String,
    pub headers: BTreeMap<String, String>,
}

fn headers_to_map(headers: &Headers) -> BTreeMap<String, String> {
    let mut out = BTreeMap::new();
    if let Ok(serde_json::Value::Object(map)) = serde_json::to_value(headers) {
        for (k, v) in map {
            let val = match v {
                serde_json::Value::String(s) => s,
                other => other.to_string(),
            };
            out.insert(k.to_ascii_lowercase(), val);
        }
    }
    out
}

fn lock_push<T>(buf: &Arc<Mutex<Vec<T>>>, item: T) {
    let mut guard = buf.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    guard.push(item);
}

/// Network observer. Always tracks the main-document response; records the
/// full request/response log only when asked.
pub struct NetWatch {
    log: Arc<Mutex<Vec<NetLogEntry>>>,
    main: Arc<Mutex<Option<MainResponse>>>,
    tasks: Vec<JoinHandle<()>>,
}

impl NetWatch {
    pub async fn attach(page: &Page, record_log: bool) -> Result<Self> {
        page.execute(EnableParams::default())
            .await
            .context("enable network domain")?;

        let log: Arc<Mutex<Vec<NetLogEntry>>> = Arc::new(Mutex::new(Vec::new()));
        let main: Arc<Mutex<Option<MainResponse>>> = Arc::new(Mutex::new(None));
        let mut tasks = Vec::new();

        let mut responses = page
            .event_listener::<EventResponseReceived>()
            .await
            .context("subscribe to responses")?;
        {
            let log = Arc::clone(&log);
            let main = Arc::clone(&main);
            tasks.push(tokio::spawn(async move {
                while let Some(ev) = responses.next().await {
                    let headers = headers_to_map(&ev.response.headers);
                    let mime = ev.response.mime_type.to_ascii_lowercase();
                    // The first document response of a navigation answers it;
                    // later navigations (retry strategies) overwrite.
                    if mime.starts_with("text/html") || mime.starts_with("application/xhtml+xml")
                    {
                        let mut guard =
                            main.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
                        *guard = Some(MainResponse {
                            status: u16::try_from(ev.response.status).unwrap_or(0),
                            url: ev.response.url.clone(),
                            headers: headers.clone(),
                        });
                    }
                    if record_log {
                        lock_push(
                            &log,
                            NetLogEntry {
                                dir: "res".to_string(),
                                url: ev.response.url.clone(),
                                method: None,
                                headers,
                                post_data: None,
                                resource_type: None,
                                status: Some(ev.response.status),
                            },
                        );
                    }
                }
            }));
        }

        if record_log {
            let mut requests = page
                .event_listener::<EventRequestWillBeSent>()
                .await
                .context("subscribe to requests")?;
            let log = Arc::clone(&log);
            tasks.push(tokio::spawn(async move {
                while let Some(ev) = requests.next().await {
                    lock_push(
                        &log,
                        NetLogEntry {
                            dir: "req".to_string(),
                            url: ev.request.url.clone(),
                            method: Some(ev.request.method.clone()),
                            headers: headers_to_map(&ev.request.headers),
                            post_data: ev.request.post_data.clone(),
                            resource_type: ev
                                .r#type
                                .as_ref()
                                .map(|t| format!("{:?}", t).to_ascii_lowercase()),
                            status: None,
                        },
                    );
                }
            }));
        }

        Ok(Self { log, main, tasks })
    }

    pub fn main_response(&self) -> Option<MainResponse> {
        self.main
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Drain the log and stop listening.
    pub fn finish(mut self) -> Vec<NetLogEntry> {
        for task in self.tasks.drain(..) {
            task.abort();
        }
        let mut guard = self.log.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        std::mem::take(&mut *guard)
    }
}

impl Drop for NetWatch {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}

fn render_console_arg(arg: &RemoteObject) -> String {
    if let Some(value) = &arg.value {
        return match value {
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        };
    }
    arg.description.clone().unwrap_or_default()
}

/// Console observer: one ordered entry per console API call.
pub struct ConsoleWatch {
    entries: Arc<Mutex<Vec<ConsoleEntry>>>,
    task: Option<JoinHandle<()>>,
}

impl ConsoleWatch {
    pub async fn attach(page: &Page) -> Result<Self> {
        let entries: Arc<Mutex<Vec<ConsoleEntry>>> = Arc::new(Mutex::new(Vec::new()));
        let mut events = page
            .event_listener::<EventConsoleApiCalled>()
            .await
            .context("subscribe to console")?;

        let buf = Arc::clone(&entries);
        let task = tokio::spawn(async move {
            while let Some(ev) = events.next().await {
                let kind = format!("{:?}", ev.r#type).to_ascii_lowercase();
                let text = ev
                    .args
                    .iter()
                    .map(render_console_arg)
                    .collect::<Vec<_>>()
                    .join(" ");
                lock_push(&buf, ConsoleEntry { kind, text });
            }
        });

        Ok(Self {
            entries,
            task: Some(task),
        })
    }

    /// Drain collected entries and stop listening.
    pub fn finish(mut self) -> Vec<ConsoleEntry> {
        if let Some(task) = self.task.take() {
            task.abort();
        }
        let mut guard = self
            .entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        std::mem::take(&mut *guard)
    }
}

impl Drop for ConsoleWatch {
    fn drop(&mut self) {
        if let Some(task) = &self.task {
            task.abort();
        }
    }
}
