//! Jitter stage.
//!
//! Sleeps for a random amount of jitter before passing the request
//! through, spreading out clients that fire simultaneously.

use std::time::Duration;

use async_trait::async_trait;
use axum::response::Response;
use rand::Rng;

use crate::pipeline::error::PipelineError;
use crate::pipeline::request::{InstantRequest, RangeRequest};
use crate::pipeline::QueryClient;

pub struct Jitterer {
    delay: Duration,
    client: Box<dyn QueryClient>,
}

impl Jitterer {
    pub fn new(client: Box<dyn QueryClient>, delay: Duration) -> Self {
        Self { delay, client }
    }

    async fn sleep(&self) {
        if self.delay.is_zero() {
            return;
        }

        // ThreadRng is not Send; draw before suspending.
        let jitter = {
            let mut rng = rand::thread_rng();
            rng.gen_range(0..self.delay.as_nanos() as u64)
        };
        tokio::time::sleep(Duration::from_nanos(jitter)).await;
    }
}

#[async_trait]
impl QueryClient for Jitterer {
    async fn query_instant(&self, req: InstantRequest) -> Result<Response, PipelineError> {
        self.sleep().await;
        self.client.query_instant(req).await
    }

    async fn query_range(&self, req: RangeRequest) -> Result<Response, PipelineError> {
        self.sleep().await;
        self.client.query_range(req).await
    }
}
