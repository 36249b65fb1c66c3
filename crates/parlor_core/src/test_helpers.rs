#![cfg(test)]

pub mod model {
    use std::collections::VecDeque;

    use async_trait::async_trait;
    use parking_lot::Mutex;

    use crate::model::CompletionModel;
    use crate::{CoreError, Result};

    /// Scriptable completion model that records every request.
    ///
    /// Scripted replies are consumed first; after that every call gets the
    /// fallback reply, or fails if there is none.
    #[derive(Debug, Default)]
    pub struct MockModel {
        script: Mutex<VecDeque<std::result::Result<String, String>>>,
        fallback: Option<String>,
        ready: bool,
        requests: Mutex<Vec<(String, Vec<String>)>>,
    }

    impl MockModel {
        pub fn replying(text: impl Into<String>) -> Self {
            Self {
                fallback: Some(text.into()),
                ready: true,
                ..Default::default()
            }
        }

        pub fn failing() -> Self {
            Self {
                ready: true,
                ..Default::default()
            }
        }

        pub fn not_ready() -> Self {
            Self::default()
        }

        /// Queue replies (`Ok`) and failures (`Err`) ahead of the fallback.
        pub fn then<I>(self, script: I) -> Self
        where
            I: IntoIterator<Item = std::result::Result<&'static str, &'static str>>,
        {
            self.script.lock().extend(
                script
                    .into_iter()
                    .map(|r| r.map(str::to_string).map_err(str::to_string)),
            );
            self
        }

        pub fn calls(&self) -> usize {
            self.requests.lock().len()
        }

        pub fn prompts(&self) -> Vec<String> {
            self.requests.lock().iter().map(|(p, _)| p.clone()).collect()
        }

        pub fn stops(&self) -> Vec<Vec<String>> {
            self.requests.lock().iter().map(|(_, s)| s.clone()).collect()
        }
    }

    #[async_trait]
    impl CompletionModel for MockModel {
        fn name(&self) -> &str {
            "mock"
        }

        fn ready(&self) -> Result<()> {
            if self.ready {
                Ok(())
            } else {
                Err(CoreError::BackendNotReady)
            }
        }

        async fn complete(&self, prompt: &str, stop: &[String]) -> Result<String> {
            self.requests.lock().push((prompt.to_string(), stop.to_vec()));
            let scripted = self.script.lock().pop_front();
            match scripted {
                Some(Ok(text)) => Ok(text),
                Some(Err(cause)) => Err(CoreError::generation("mock", cause)),
                None => self
                    .fallback
                    .clone()
                    .ok_or_else(|| CoreError::generation("mock", "no reply scripted")),
            }
        }
    }
}
