//! Scripted transformer for tests and offline runs.
//!
//! Each call pops the next [`Script`] step from a queue; once the queue is
//! empty the fallback step is replayed.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use artesia_core::{ConversionOutput, ImageFormat};

use crate::{TransformError, TransformationService};

/// Model name reported by scripted outputs.
const SCRIPTED_MODEL: &str = "scripted";

/// One scripted response.
#[derive(Debug, Clone)]
pub enum Script {
    /// Return this description.
    Succeed(String),
    /// Reject the request with this reason.
    Fail(String),
    /// Never resolve.
    Hang,
    /// Panic with this message.
    Panic(String),
    /// Sleep, then succeed with the description.
    Delay(Duration, String),
}

/// A [`TransformationService`] that replays scripted outcomes.
#[derive(Debug)]
pub struct ScriptedTransformer {
    queue: Mutex<VecDeque<Script>>,
    fallback: Script,
    calls: AtomicUsize,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedTransformer {
    /// Create a transformer that replays `fallback` for every call.
    #[must_use]
    pub fn new(fallback: Script) -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
            fallback,
            calls: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Always succeed with `description`.
    #[must_use]
    pub fn succeeding(description: impl Into<String>) -> Self {
        Self::new(Script::Succeed(description.into()))
    }

    /// Always fail with `reason`.
    #[must_use]
    pub fn failing(reason: impl Into<String>) -> Self {
        Self::new(Script::Fail(reason.into()))
    }

    /// Queue a step ahead of the fallback.
    #[must_use]
    pub fn then(self, step: Script) -> Self {
        self.queue
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(step);
        self
    }

    /// Number of `transform` calls so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Prompts received, in call order.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn next_step(&self) -> Script {
        self.queue
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone())
    }
}

fn output(description: String) -> ConversionOutput {
    ConversionOutput {
        description,
        model: SCRIPTED_MODEL.to_string(),
    }
}

#[async_trait::async_trait]
impl TransformationService for ScriptedTransformer {
    async fn transform(
        &self,
        prompt: &str,
        _image: &[u8],
        _format: ImageFormat,
    ) -> Result<ConversionOutput, TransformError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(prompt.to_string());

        match self.next_step() {
            Script::Succeed(description) => Ok(output(description)),
            Script::Fail(reason) => Err(TransformError::Rejected(reason)),
            Script::Hang => std::future::pending().await,
            Script::Panic(message) => panic!("{message}"),
            Script::Delay(duration, description) => {
                tokio::time::sleep(duration).await;
                Ok(output(description))
            }
        }
    }

    fn name(&self) -> &str {
        "scripted"
    }
}
