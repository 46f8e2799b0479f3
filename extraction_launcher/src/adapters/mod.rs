pub mod csv_identifier_reader;
