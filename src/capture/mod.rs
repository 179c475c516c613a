pub mod frame;
pub mod transcript;

pub use frame::{FrameSource, ImageCapture};
pub use transcript::{RecognitionEvent, SpeechRecognizer, TranscriptState, TurnTranscriptSource};
