mod csv_identifier_reader;
mod helpers;
