//! `sleep-then-post`: the one delayed invocable the probe registers.
//!
//! When it runs it calls the sleep worker synchronously, so a single delayed
//! task ends up holding its request for `sleep × times`.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::invocable::Invocable;
use super::invoker::Invoker;
use crate::domain::duration::{duration_text, format_duration};
use crate::domain::errors::ProbeError;
use crate::domain::outcome::Outcome;
use crate::domain::payload::FormPayload;
use crate::ports::PeerClient;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SleepThenPost {
    #[serde(with = "duration_text")]
    pub sleep: Duration,
    pub times: u32,
}

impl Invocable for SleepThenPost {
    const KIND: &'static str = "sleep-then-post";
}

impl SleepThenPost {
    /// Form sent to the sleep worker.
    pub fn to_form(&self) -> FormPayload {
        FormPayload::new()
            .with("sleep", format_duration(self.sleep))
            .with("times", self.times.to_string())
    }
}

pub struct SleepThenPostInvoker {
    peer: Arc<dyn PeerClient>,
    sleep_url: String,
    timeout: Duration,
}

impl SleepThenPostInvoker {
    pub fn new(peer: Arc<dyn PeerClient>, sleep_url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            peer,
            sleep_url: sleep_url.into(),
            timeout,
        }
    }
}

#[async_trait]
impl Invoker<SleepThenPost> for SleepThenPostInvoker {
    async fn invoke(&self, args: SleepThenPost) -> Result<Outcome, ProbeError> {
        let form = args.to_form();
        tracing::info!(
            url = %self.sleep_url,
            sleep = %format_duration(args.sleep),
            times = args.times,
            "posting to sleep worker"
        );

        let response = self
            .peer
            .post_form(&self.sleep_url, &form, self.timeout)
            .await?;

        if !response.is_success() {
            return Err(ProbeError::transport(format!(
                "POST {} returned {}: {}",
                self.sleep_url, response.status, response.body
            )));
        }

        tracing::info!(status = response.status, "sleep worker answered");
        Ok(Outcome::success())
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;
    use crate::ports::PeerResponse;
    use std::sync::Mutex;

    #[derive(Debug, Clone, PartialEq, Eq)]
    pub struct RecordedCall {
        pub url: String,
        pub body: String,
        pub timeout: Duration,
    }

    /// Peer that records every call and answers with a fixed status.
    pub struct RecordingPeer {
        status: u16,
        calls: Mutex<Vec<RecordedCall>>,
    }

    impl RecordingPeer {
        pub fn answering(status: u16) -> Self {
            Self {
                status,
                calls: Mutex::new(Vec::new()),
            }
        }

        pub fn calls(&self) -> Vec<RecordedCall> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl PeerClient for RecordingPeer {
        async fn post_form(
            &self,
            url: &str,
            form: &FormPayload,
            timeout: Duration,
        ) -> Result<PeerResponse, ProbeError> {
            self.calls.lock().unwrap().push(RecordedCall {
                url: url.to_string(),
                body: form.encode(),
                timeout,
            });
            Ok(PeerResponse {
                status: self.status,
                body: String::new(),
            })
        }
    }

    /// Peer whose every call fails before reaching the network.
    pub struct UnreachablePeer;

    #[async_trait]
    impl PeerClient for UnreachablePeer {
        async fn post_form(
            &self,
            url: &str,
            _form: &FormPayload,
            _timeout: Duration,
        ) -> Result<PeerResponse, ProbeError> {
            Err(ProbeError::transport(format!("connect to {url}: connection refused")))
        }
    }
}
