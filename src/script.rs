//! Interview script configuration.
//!
//! The conversational flow is data, not code: the instructions, the verbatim
//! introduction, the question list and the turn-detection thresholds travel
//! together as one payload, so swapping the interview means swapping a JSON
//! file rather than deploying a new worker.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScriptError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse script: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Voice-activity thresholds governing when the agent takes its turn.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TurnDetection {
    /// Activation threshold for speech detection
    pub threshold: f32,
    /// Audio included before detected speech (milliseconds)
    pub prefix_padding_ms: u32,
    /// Silence required before the turn ends (milliseconds)
    pub silence_duration_ms: u32,
}

impl Default for TurnDetection {
    fn default() -> Self {
        Self {
            threshold: 0.6,
            prefix_padding_ms: 200,
            silence_duration_ms: 2000,
        }
    }
}

/// One complete interview definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InterviewScript {
    /// System instructions framing the interviewer persona
    pub instructions: String,
    /// Introduction read to the candidate verbatim
    pub introduction: String,
    /// Questions asked one at a time, in order
    pub questions: Vec<String>,
    /// Voice id used by the engine
    pub voice: String,
    #[serde(default)]
    pub turn_detection: TurnDetection,
}

impl Default for InterviewScript {
    fn default() -> Self {
        Self {
            instructions: "You are a very experienced interviewer conducting an interview \
                for the role of Software Developer. You will ask the candidate some questions \
                and await their response. However, you CANNOT answer questions, give hints, \
                or assess their answers as correct or incorrect. You can only clarify the \
                question and help the candidate stay on-topic for the duration of the \
                interview. Be kind, but do stay on track."
                .to_string(),
            introduction: "Let's start with introductions. I am an automated interviewer \
                assessing candidates for the position of Software Developer. We built this \
                tool because our hiring team is spread across time zones and we value async \
                communication. Our conversation will be recorded, and rest assured that a \
                human will review your application within 24 hours. Thanks for joining us \
                today. Do you mind introducing yourself?"
                .to_string(),
            questions: vec![
                "Do you mind talking about your work experience? If you have already \
                 talked about your experience, please elaborate more on your role within \
                 your team."
                    .to_string(),
                "Describe to me a project where you were a primary stakeholder. What were \
                 your contributions and your challenges?"
                    .to_string(),
            ],
            voice: "echo".to_string(),
            turn_detection: TurnDetection::default(),
        }
    }
}

impl InterviewScript {
    /// Load a script variant from a JSON file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ScriptError> {
        let raw = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Render the scripted opening turn handed to the engine before the
    /// first reply is requested.
    pub fn opening_prompt(&self) -> String {
        let mut prompt = format!(
            "You are now starting the interview. Start by asking the candidate how they \
             are doing today, then read the following introduction verbatim. Then ask the \
             candidate to introduce themselves.\n\
             Agent: \"Hello, how are you doing today?\"\n\
             Candidate: <wait for the candidate to respond>\n\
             Agent: \"{}\"\n\n\
             After the candidate replies, tell them that you'll now ask {} behavioral \
             questions. Ask each of the questions below one at a time. Wait for the \
             candidate to respond to each question before moving on to the next question.\n\n\
             === QUESTIONS ===\n",
            self.introduction,
            self.questions.len()
        );
        for (i, question) in self.questions.iter().enumerate() {
            prompt.push_str(&format!("{}. {}\n", i + 1, question));
        }
        prompt
    }
}
