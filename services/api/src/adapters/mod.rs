pub mod db;
pub mod images;
pub mod llm;
pub mod tts;
pub mod video;

pub use db::DbAdapter;
pub use images::UnsplashImageAdapter;
pub use llm::OpenAiContentAdapter;
pub use tts::OpenAiSpeechAdapter;
pub use video::SynthesiaVideoAdapter;
