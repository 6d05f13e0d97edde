use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use std::time::Duration;
use log::{ info, warn };

use crate::error::{ PersonaError, Result };

pub const DEFAULT_DELAY_MS: u64 = 1500;

static YOUTUBE_URL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(https?://)?(www\.)?(youtube\.com|youtu\.?be)/.+$").expect("valid YouTube URL pattern")
});

pub fn is_youtube_url(url: &str) -> bool {
    YOUTUBE_URL.is_match(url)
}

#[async_trait]
pub trait TranscriptProvider: Send + Sync {
    async fn fetch_transcript(&self, url: &str) -> Result<String>;
}

/// Stand-in for a real transcript backend: validates the URL shape and
/// returns a canned transcript after a simulated network delay.
pub struct MockTranscriptProvider {
    delay: Duration,
}

impl MockTranscriptProvider {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

impl Default for MockTranscriptProvider {
    fn default() -> Self {
        Self::new(Duration::from_millis(DEFAULT_DELAY_MS))
    }
}

#[async_trait]
impl TranscriptProvider for MockTranscriptProvider {
    async fn fetch_transcript(&self, url: &str) -> Result<String> {
        if !is_youtube_url(url) {
            warn!("Rejected transcript request for '{}'", url);
            return Err(PersonaError::invalid_input("Invalid YouTube URL provided."));
        }
        info!("Fetching transcript for {} (simulated, {:?})", url, self.delay);
        tokio::time::sleep(self.delay).await;
        Ok(SAMPLE_TRANSCRIPT.to_string())
    }
}

const SAMPLE_TRANSCRIPT: &str = r#""Welcome back to QuantumLeap AI, the channel where we decode the future of artificial intelligence. I'm your host, Dr. Evelyn Reed. Today, we're diving deep into a fascinating topic: causal inference in large language models. How can we be sure that an AI's conclusion is a result of logical deduction and not just pattern matching? This is one of the biggest hurdles to achieving true Artificial General Intelligence.

First, let's break down what causality means. It's the relationship between cause and effect. If I drop a ball, it falls. The cause is gravity; the effect is the fall. Simple, right? But for an AI, it's not so straightforward. LLMs are trained on vast amounts of text data, and they excel at identifying correlations. For example, an AI might notice that the words 'ice cream sales' and 'shark attacks' often appear in similar contexts. It might conclude they are related, but it doesn't understand the hidden cause: summer weather. This is the classic 'correlation does not imply causation' problem.

So, how do we teach an AI to think like a scientist? One promising approach is using something called 'counterfactual reasoning.' We essentially ask the model, 'What would have happened if a certain event had *not* occurred?' By creating these hypothetical scenarios, we can force the model to isolate variables and identify true causal links. For example, if we remove 'summer' from the data, does the link between ice cream and shark attacks disappear? If so, we're getting closer to understanding the true causal structure.

Another key area of research is 'structural causal models' or SCMs. Think of this as creating a map of how different variables influence each other. By defining these relationships explicitly, we can guide the AI's reasoning process. It's a bit like giving it a cheat sheet for how the world works. But of course, creating these maps is incredibly complex and is a major research challenge in itself. The ultimate goal is to build models that can discover these causal relationships on their own, from scratch.

This isn't just an academic exercise. The implications are huge. Imagine a medical AI that can distinguish between a drug's direct effects and other confounding factors, leading to better treatments. Or an economic AI that can accurately predict the impact of policy changes. By embedding causal reasoning into AI, we move from simple prediction machines to true partners in problem-solving. It's a long road, but the journey is incredibly exciting. Join me next week when we'll be discussing the ethics of sentient AI with our guest, philosopher Dr. Kenji Tanaka. Until then, keep questioning.""#;
