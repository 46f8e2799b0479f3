use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc, Mutex,
};

use async_trait::async_trait;
use common::{
    core::message_sink::{MessageSink, MessageSinkError},
    dtos::{
        extraction_request::ExtractionRequestMessage,
        extraction_request_info::ExtractionRequestInfoMessage, message_header::MessageHeader,
    },
    telemetry::{get_tracing_subscriber, init_tracing_subscriber},
};
use extraction_launcher::{
    domain::entities::extraction_job::ExtractionJobDetails,
    handlers::extract_messages_csv_handler::ExtractMessagesCsvHandler,
};
use once_cell::sync::Lazy;
use uuid::Uuid;

// Ensures that the `tracing` stack is only initialized once using `once_cell`
static TRACING: Lazy<()> = Lazy::new(|| {
    let default_filter_level = "info".to_string();
    let subscriber_name = "test".to_string();

    // The sink is part of the subscriber type, hence the 2 branches
    if std::env::var("TEST_LOG").is_ok() {
        let subscriber =
            get_tracing_subscriber(subscriber_name, default_filter_level, std::io::stdout);
        init_tracing_subscriber(subscriber).expect("Failed to init tracing");
    } else {
        let subscriber =
            get_tracing_subscriber(subscriber_name, default_filter_level, std::io::sink);
        init_tracing_subscriber(subscriber).expect("Failed to init tracing");
    };
});

/// Initializes the tracing system for the integration tests
pub fn init_test() {
    Lazy::force(&TRACING);
}

pub const PROJECT_NUMBER: &str = "MyProjectID";
pub const EXTRACTION_DIRECTORY: &str = "MyProjectFolder";

/// A message captured by `CapturingSink` with the arguments it was sent with
#[derive(Debug, Clone)]
pub struct SentMessage<M> {
    pub message: M,
    pub routing_key: String,
    pub is_in_response_to: Option<MessageHeader>,
}

/// Message sink keeping every sent message in memory
pub struct CapturingSink<M> {
    sent: Mutex<Vec<SentMessage<M>>>,
    confirm_waits: AtomicUsize,
}

impl<M> CapturingSink<M> {
    pub fn new() -> Self {
        Self {
            sent: Mutex::new(vec![]),
            confirm_waits: AtomicUsize::new(0),
        }
    }

    pub fn sent(&self) -> Vec<SentMessage<M>>
    where
        M: Clone,
    {
        self.sent.lock().unwrap().clone()
    }

    pub fn messages(&self) -> Vec<M>
    where
        M: Clone,
    {
        self.sent().into_iter().map(|sent| sent.message).collect()
    }

    pub fn confirm_waits(&self) -> usize {
        self.confirm_waits.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl<M> MessageSink<M> for CapturingSink<M>
where
    M: Clone + Send + Sync,
{
    async fn send_message(
        &self,
        message: &M,
        routing_key: &str,
        is_in_response_to: Option<&MessageHeader>,
    ) -> Result<MessageHeader, MessageSinkError> {
        self.sent.lock().unwrap().push(SentMessage {
            message: message.clone(),
            routing_key: routing_key.to_string(),
            is_in_response_to: is_in_response_to.cloned(),
        });

        Ok(MessageHeader::new(is_in_response_to))
    }

    async fn wait_for_confirms(&self) -> Result<(), MessageSinkError> {
        self.confirm_waits.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Message sink accepting `successful_sends` messages then failing every send
pub struct FailingSink {
    successful_sends: usize,
    attempts: AtomicUsize,
}

impl FailingSink {
    pub fn new(successful_sends: usize) -> Self {
        Self {
            successful_sends,
            attempts: AtomicUsize::new(0),
        }
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl<M> MessageSink<M> for FailingSink
where
    M: Send + Sync,
{
    async fn send_message(
        &self,
        _message: &M,
        _routing_key: &str,
        is_in_response_to: Option<&MessageHeader>,
    ) -> Result<MessageHeader, MessageSinkError> {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst);

        if attempt < self.successful_sends {
            Ok(MessageHeader::new(is_in_response_to))
        } else {
            Err(MessageSinkError::Transport("broker unreachable".to_string()))
        }
    }
}

pub type RequestSink = CapturingSink<ExtractionRequestMessage>;
pub type RequestInfoSink = CapturingSink<ExtractionRequestInfoMessage>;

pub fn job_details(job_id: Uuid) -> ExtractionJobDetails {
    ExtractionJobDetails::builder()
        .job_id(job_id)
        .project_number(PROJECT_NUMBER)
        .extraction_directory(EXTRACTION_DIRECTORY)
        .build()
}

/// Handler publishing to capturing sinks
pub struct TestHandler {
    pub job_id: Uuid,
    pub handler: ExtractMessagesCsvHandler,
    pub request_sink: Arc<RequestSink>,
    pub request_info_sink: Arc<RequestInfoSink>,
}

pub fn spawn_handler(key_column_index: usize) -> TestHandler {
    init_test();

    let job_id = Uuid::new_v4();
    let request_sink = Arc::new(RequestSink::new());
    let request_info_sink = Arc::new(RequestInfoSink::new());

    let handler = ExtractMessagesCsvHandler::try_new(
        job_details(job_id),
        key_column_index,
        request_sink.clone(),
        request_info_sink.clone(),
    )
    .unwrap();

    TestHandler {
        job_id,
        handler,
        request_sink,
        request_info_sink,
    }
}
