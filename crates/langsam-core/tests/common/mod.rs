#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{mpsc, Arc, Mutex};
use std::thread;
use std::time::Duration;

#[derive(Clone)]
pub struct Route {
    pub status: u16,
    pub content_type: &'static str,
    pub body: Vec<u8>,
}

impl Route {
    pub fn json(body: &str) -> Self {
        Self {
            status: 200,
            content_type: "application/json",
            body: body.as_bytes().to_vec(),
        }
    }

    pub fn text(content_type: &'static str, body: &str) -> Self {
        Self {
            status: 200,
            content_type,
            body: body.as_bytes().to_vec(),
        }
    }

    pub fn status(status: u16, body: &str) -> Self {
        Self {
            status,
            content_type: "text/plain",
            body: body.as_bytes().to_vec(),
        }
    }
}

/// Local HTTP server with swappable routes. Unknown paths answer 404.
pub struct StubServer {
    pub base_url: String,
    routes: Arc<Mutex<HashMap<String, Route>>>,
    hits: Arc<Mutex<Vec<String>>>,
    shutdown: mpsc::Sender<()>,
    handle: Option<thread::JoinHandle<()>>,
}

impl StubServer {
    pub fn start(routes: &[(&str, Route)]) -> Self {
        let server = tiny_http::Server::http("127.0.0.1:0").expect("start tiny_http server");
        let base_url = format!("http://{}/", server.server_addr());
        let routes = Arc::new(Mutex::new(
            routes
                .iter()
                .map(|(path, route)| (path.to_string(), route.clone()))
                .collect::<HashMap<_, _>>(),
        ));
        let hits = Arc::new(Mutex::new(Vec::new()));
        let (shutdown, shutdown_rx) = mpsc::channel::<()>();

        let handle = {
            let routes = routes.clone();
            let hits = hits.clone();
            thread::spawn(move || loop {
                if shutdown_rx.try_recv().is_ok() {
                    break;
                }
                let request = match server.recv_timeout(Duration::from_millis(20)) {
                    Ok(Some(request)) => request,
                    Ok(None) => continue,
                    Err(_) => break,
                };

                let url = request.url().to_string();
                let path = url.split('?').next().unwrap_or(&url).to_string();
                hits.lock().unwrap().push(path.clone());

                let route = routes
                    .lock()
                    .unwrap()
                    .get(&path)
                    .cloned()
                    .unwrap_or_else(|| Route::status(404, "not found"));
                let header = tiny_http::Header::from_bytes(
                    &b"Content-Type"[..],
                    route.content_type.as_bytes(),
                )
                .expect("build header");
                let response = tiny_http::Response::from_data(route.body)
                    .with_status_code(route.status)
                    .with_header(header);
                let _ = request.respond(response);
            })
        };

        Self {
            base_url,
            routes,
            hits,
            shutdown,
            handle: Some(handle),
        }
    }

    pub fn set(&self, path: &str, route: Route) {
        self.routes.lock().unwrap().insert(path.to_string(), route);
    }

    pub fn hits(&self, path: &str) -> usize {
        self.hits.lock().unwrap().iter().filter(|p| *p == path).count()
    }
}

impl Drop for StubServer {
    fn drop(&mut self) {
        let _ = self.shutdown.send(());
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

pub const DIGEST_JSON: &str = r#"{
  "schema_version": 1,
  "date": "2024-01-15",
  "generated_at": "2024-01-15T05:00:00Z",
  "stories": [
    {
      "id": "s1",
      "headline_en": "Rail strike ends",
      "headline_de": "Bahnstreik beendet",
      "summary_en": "Trains run again.",
      "source_url": "https://news.example/strike",
      "levels": {
        "1": {
          "text_de": "Die Züge fahren wieder.",
          "text_en": "The trains run again.",
          "audio_url": "audio/s1_l1.mp3",
          "audio_duration_seconds": 125
        },
        "2": {
          "text_de": "Der Streik ist vorbei.",
          "text_en": "The strike is over.",
          "audio_url": "audio/s1_l2.mp3",
          "audio_duration_seconds": 95.5
        }
      }
    },
    {
      "id": "s2",
      "headline_en": "Snow in April",
      "headline_de": "Schnee im April",
      "summary_en": "Unusual weather.",
      "levels": {
        "3": {
          "text_de": "Ungewöhnlicher Schneefall im Frühling.",
          "text_en": "Unusual snowfall in spring.",
          "audio_url": null
        }
      }
    }
  ]
}"#;
