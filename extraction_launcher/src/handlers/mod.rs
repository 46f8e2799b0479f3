pub mod extract_messages_csv_handler;
