pub mod error;
pub mod io;
pub mod llm;
pub mod models;
pub mod session;
pub mod stages;
pub mod store;

pub use error::{BatchError, IngestError, MalformedResponseError, StoreError, SynthesisError};
pub use io::{bundled_sample, load_transcripts, read_export_file, write_export_file, ExportRow};
pub use llm::{build_client, ChatModel, LlmConfig, Provider, Usage};
pub use models::{
    DemographicSelection, GeneratedAnswer, Persona, QuestionList, RespondentRecord,
    SurveyResponse, TranscriptTable,
};
pub use session::{SampleSize, SurveySession};
pub use stages::{
    filter_table, synthesize, BatchProgress, BatchResult, FilterOptions, ResultsConfig,
    ResultsView,
};
pub use store::ResponseStore;
