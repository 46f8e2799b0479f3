pub mod extraction_request;
pub mod extraction_request_info;
pub mod message_header;
