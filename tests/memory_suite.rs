//! Runs the end-to-end suite against an in-memory backend.

use lifex::testing::{RecordingSender, TestContext};
use lifex::{App, AppConfig, gateway::MemoryBackend};
use reqwest::Client;

struct MemoryContext {
    config: AppConfig,
    backend: MemoryBackend,
    mailbox: RecordingSender,
}

impl TestContext for MemoryContext {
    type Backend = MemoryBackend;

    async fn spawn() -> (String, Client, Self) {
        let config = AppConfig {
            jwt_secret: "memory-suite-secret-0123456789abcdef".to_string(),
            email_link_base_url: Some("http://lifex.test".to_string()),
            email_from: Some("LifeX <hello@lifex.test>".to_string()),
            cookie_secure: false,
            ..Default::default()
        };
        let backend = MemoryBackend::new();
        let mailbox = RecordingSender::new();

        let app = App::new(config.clone(), backend.clone())
            .expect("valid config")
            .with_email_sender(mailbox.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind test listener");
        let addr = listener.local_addr().expect("local addr");

        tokio::spawn(async move {
            axum::serve(listener, app.router())
                .await
                .expect("test server");
        });

        (
            format!("http://{addr}"),
            Client::new(),
            Self {
                config,
                backend,
                mailbox,
            },
        )
    }

    fn config(&self) -> &AppConfig {
        &self.config
    }

    fn backend(&self) -> &MemoryBackend {
        &self.backend
    }

    fn mailbox(&self) -> &RecordingSender {
        &self.mailbox
    }

    async fn token_expire(&self, token_hash: &str) {
        self.backend.token_expire(token_hash);
    }
}

lifex::test_suite!(MemoryContext);
