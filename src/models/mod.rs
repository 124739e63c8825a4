pub mod answer;
pub mod result_record;
pub mod test_definition;
