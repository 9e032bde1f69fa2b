pub use self::gemini::GeminiGenerator;
pub use self::generator::ContentGenerator;
pub use self::study_service::StudyService;

mod gemini;
mod generator;
mod library;
mod reply;
mod scoring;
mod study_service;
