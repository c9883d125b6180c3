pub mod decision_reader;
pub mod report_writer;
